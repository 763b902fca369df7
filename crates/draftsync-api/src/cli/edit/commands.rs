//! Line command parsing for the edit session.
//!
//! Lines starting with `:` are commands; every other line is text appended
//! to the draft content.

use console::style;

#[derive(Debug, PartialEq, Eq)]
pub enum EditCommand {
    Title(String),
    Category(String),
    /// Save now.
    Flush,
    /// Resolve a conflict by keeping the local copy.
    Keep,
    /// Resolve a conflict by loading the remote copy.
    Reload,
    /// Hide the conflict banner.
    Dismiss,
    Status,
    Publish,
    Help,
    Quit,
    Unknown(String),
}

/// What one input line means.
#[derive(Debug, PartialEq, Eq)]
pub enum EditInput {
    Text(String),
    Command(EditCommand),
}

pub fn parse(line: &str) -> EditInput {
    let Some(rest) = line.trim_end().strip_prefix(':') else {
        return EditInput::Text(line.trim_end_matches(['\r', '\n']).to_string());
    };

    let (cmd, arg) = match rest.split_once(' ') {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (rest, ""),
    };

    let command = match cmd.to_lowercase().as_str() {
        "title" | "t" => EditCommand::Title(arg.to_string()),
        "category" | "cat" => {
            if arg.is_empty() {
                EditCommand::Unknown(":category requires a value".to_string())
            } else {
                EditCommand::Category(arg.to_string())
            }
        }
        "flush" | "save" | "w" => EditCommand::Flush,
        "keep" => EditCommand::Keep,
        "reload" => EditCommand::Reload,
        "dismiss" => EditCommand::Dismiss,
        "status" | "s" => EditCommand::Status,
        "publish" => EditCommand::Publish,
        "help" | "h" | "?" => EditCommand::Help,
        "quit" | "q" | "exit" => EditCommand::Quit,
        other => EditCommand::Unknown(format!(":{other}")),
    };
    EditInput::Command(command)
}

pub fn print_help() {
    println!();
    println!("  {}", style("Type text to append it to the draft. Commands:").bold());
    println!();
    for (cmd, what) in [
        (":title T", "Set the title"),
        (":category C", "Set the category"),
        (":flush", "Save now"),
        (":keep", "Resolve a conflict with your version"),
        (":reload", "Resolve a conflict with the saved version"),
        (":dismiss", "Hide the conflict banner"),
        (":status", "Show save status"),
        (":publish", "Save, publish the post, delete the draft"),
        (":quit", "Leave (the draft stays saved)"),
    ] {
        println!("  {:<12} {}", style(cmd).cyan(), what);
    }
    println!();
}
