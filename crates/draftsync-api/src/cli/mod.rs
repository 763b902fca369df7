//! CLI command definitions for the `draftsync` binary.

pub mod draft;
pub mod edit;

use clap::{Parser, Subcommand};

/// Autosaved, conflict-aware post drafts.
#[derive(Parser)]
#[command(name = "draftsync", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server over the local draft store.
    Serve {
        /// Port to listen on (default from config, 3000).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default from config, 127.0.0.1).
        #[arg(long)]
        host: Option<String>,

        /// Export spans to stdout through OpenTelemetry.
        #[arg(long)]
        otel: bool,
    },

    /// Inspect drafts in the local store.
    Draft {
        #[command(subcommand)]
        action: draft::DraftCommand,
    },

    /// Edit a draft line by line with autosave.
    Edit(edit::EditArgs),
}

impl Commands {
    pub fn wants_otel(&self) -> bool {
        matches!(self, Commands::Serve { otel: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["draftsync", "serve", "--port", "8080", "--otel"]).unwrap();
        assert!(cli.command.wants_otel());
        match cli.command {
            Commands::Serve { port, host, .. } => {
                assert_eq!(port, Some(8080));
                assert_eq!(host, None);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn parses_edit_with_global_flags() {
        let cli = Cli::try_parse_from([
            "draftsync", "edit", "--user", "1", "--board", "news", "--post", "7", "--json", "-vv",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Edit(args) => {
                assert_eq!(args.board, "news");
                assert_eq!(args.post.as_deref(), Some("7"));
                assert!(args.server.is_none());
            }
            _ => panic!("expected edit"),
        }
    }

    #[test]
    fn draft_delete_requires_id() {
        assert!(Cli::try_parse_from(["draftsync", "draft", "delete", "--user", "1"]).is_err());
    }
}
