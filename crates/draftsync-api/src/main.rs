//! DraftSync CLI and REST API entry point.
//!
//! Binary name: `draftsync`
//!
//! Parses CLI arguments, initializes tracing and the local draft store, then
//! dispatches to a command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};

use draftsync_infra::sqlite::SqliteDraftStore;
use draftsync_observe::tracing_setup::{directive_for, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use http::rate_limit::RateLimiter;
use state::AppState;

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(directive_for(cli.verbose, cli.quiet), cli.command.wants_otel())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Serve { port, host, .. } => serve(state, host, port, cli.json).await,
        Commands::Draft { action } => {
            cli::draft::handle_draft_command(action, &state, cli.json).await
        }
        Commands::Edit(args) => cli::edit::run_edit(&state, args, cli.json).await,
    };

    shutdown_tracing();
    result
}

async fn serve(
    state: AppState,
    host: Option<String>,
    port: Option<u16>,
    json: bool,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if json {
        println!("{}", serde_json::json!({ "listening": format!("http://{addr}") }));
    } else {
        println!(
            "  {} DraftSync API listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }
    info!(%addr, rate_limit_per_min = state.config.server.rate_limit_per_min, "server started");

    let purge = tokio::spawn(purge_loop(Arc::clone(&state.store), state.limiter.clone()));
    let router = http::router::build_router(state);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    purge.abort();
    served?;

    if !json {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Periodically drop drafts past their expiry and ended rate-limit windows.
async fn purge_loop(store: Arc<SqliteDraftStore>, limiter: RateLimiter) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "purged expired drafts"),
            Err(e) => warn!(error = %e, "expired draft purge failed"),
        }
        let swept = limiter.sweep();
        if swept > 0 {
            debug!(swept, "dropped ended rate-limit windows");
        }
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
