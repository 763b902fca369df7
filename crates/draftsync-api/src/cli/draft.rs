//! `draftsync draft` subcommands: inspect the local draft store.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use draftsync_core::persistence::DraftPersistenceClient;
use draftsync_types::draft::{BoardId, Draft, DraftId, DraftKey, PostId};
use draftsync_types::error::PersistenceError;
use draftsync_types::identity::UserId;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum DraftCommand {
    /// List a user's live drafts, newest first.
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        user: String,

        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show the draft for a board (and post).
    Show {
        #[arg(long)]
        user: String,

        #[arg(long)]
        board: String,

        /// Post being edited; omit for a new post.
        #[arg(long)]
        post: Option<String>,
    },

    /// Delete a draft by id.
    #[command(alias = "rm")]
    Delete {
        #[arg(long)]
        user: String,

        id: String,
    },

    /// Remove expired drafts now.
    Purge,
}

pub async fn handle_draft_command(cmd: DraftCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        DraftCommand::List { user, limit } => list(state, &parse_user(&user)?, limit, json).await,
        DraftCommand::Show { user, board, post } => {
            let key = match post {
                Some(post) => DraftKey::existing_post(BoardId::new(board), PostId::new(post)),
                None => DraftKey::new_post(BoardId::new(board)),
            };
            show(state, &parse_user(&user)?, &key, json).await
        }
        DraftCommand::Delete { user, id } => delete(state, &parse_user(&user)?, &id, json).await,
        DraftCommand::Purge => purge(state, json).await,
    }
}

pub fn parse_user(raw: &str) -> Result<UserId> {
    let user = UserId::new(raw);
    if !user.is_valid() {
        bail!("invalid user id '{raw}'");
    }
    Ok(user)
}

/// First line of the content, cut to `max` characters.
fn preview(draft: &Draft, max: usize) -> String {
    let content = draft.content.as_deref().unwrap_or_default();
    let first = content.lines().next().unwrap_or_default();
    if first.chars().count() > max {
        let cut: String = first.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        first.to_string()
    }
}

async fn list(state: &AppState, user: &UserId, limit: u32, json: bool) -> Result<()> {
    let drafts = state.store.list_for_owner(user, limit, 0).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&drafts)?);
        return Ok(());
    }

    if drafts.is_empty() {
        println!();
        println!("  {} No drafts for user '{}'.", style("i").blue().bold(), style(user).cyan());
        println!("     Start one with: draftsync edit --user {user} --board <board>");
        println!();
        return Ok(());
    }

    println!();
    println!("  Drafts for '{}' ({} shown)", style(user).cyan(), drafts.len());
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Board").fg(Color::White),
        Cell::new("Post").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Preview").fg(Color::White),
        Cell::new("Version").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for draft in &drafts {
        table.add_row(vec![
            Cell::new(draft.id).fg(Color::DarkGrey),
            Cell::new(&draft.board_id).fg(Color::Cyan),
            Cell::new(draft.post_id.as_ref().map_or("(new)".to_string(), PostId::to_string)),
            Cell::new(draft.title.as_deref().unwrap_or_default()),
            Cell::new(preview(draft, 40)).fg(Color::DarkGrey),
            Cell::new(draft.version),
            Cell::new(draft.updated_at.format("%Y-%m-%d %H:%M")),
        ]);
    }

    println!("{table}");
    println!();
    Ok(())
}

async fn show(state: &AppState, user: &UserId, key: &DraftKey, json: bool) -> Result<()> {
    let draft = state.store.load_draft(user, key).await?;

    let Some(draft) = draft else {
        if json {
            println!("null");
        } else {
            println!();
            println!("  {} No draft for {}.", style("i").blue().bold(), style(key).cyan());
            println!();
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(draft.title.as_deref().filter(|t| !t.is_empty()).unwrap_or("(untitled)")).bold(),
        style(format!("{}", draft.version)).dim()
    );
    println!("  {} {}", style("key:").dim(), key);
    println!("  {} {}", style("id:").dim(), draft.id);
    if let Some(category) = draft.to_payload().category() {
        println!("  {} {}", style("category:").dim(), category);
    }
    println!(
        "  {} {}   {} {}",
        style("updated:").dim(),
        draft.updated_at.format("%Y-%m-%d %H:%M:%S"),
        style("expires:").dim(),
        draft.expires_at.format("%Y-%m-%d")
    );
    println!();
    for line in draft.content.as_deref().unwrap_or_default().lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}

async fn delete(state: &AppState, user: &UserId, id: &str, json: bool) -> Result<()> {
    let draft_id: DraftId = id.parse().with_context(|| format!("invalid draft id '{id}'"))?;

    match state.store.delete_draft(user, &draft_id).await {
        Ok(()) => {}
        Err(PersistenceError::NotFound) => bail!("draft {id} not found for user '{user}'"),
        Err(e) => return Err(e.into()),
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!();
        println!("  {} Deleted draft {}", style("ok").green(), style(id).cyan());
        println!();
    }
    Ok(())
}

async fn purge(state: &AppState, json: bool) -> Result<()> {
    let purged = state.store.purge_expired().await?;
    if json {
        println!("{}", serde_json::json!({ "purged": purged }));
    } else {
        println!();
        println!("  {} Purged {purged} expired draft(s)", style("ok").green());
        println!();
    }
    Ok(())
}
