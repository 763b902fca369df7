//! The edit loop: stdin lines in, save status and conflict prompts out.

use std::sync::Arc;

use anyhow::Result;
use console::style;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use draftsync_core::autosave::{DraftAutoSaveController, DraftHandle, DraftSession};
use draftsync_core::conflict::{ConflictPresenter, Notification, NotificationLevel, PresenterEvent};
use draftsync_core::form::{FieldMapping, FormStateBridge, SharedForm};
use draftsync_core::persistence::DraftPersistenceClient;
use draftsync_core::publish::{PostPublisher, PublishFlow};
use draftsync_types::config::AutoSaveConfig;
use draftsync_types::event::DraftTelemetry;
use draftsync_types::status::{ControllerState, DraftStatus, ResolutionMode};

use super::TerminalNavigator;
use super::commands::{self, EditCommand, EditInput};

/// Run one editing session until `:quit`, a successful `:publish` or EOF.
pub async fn run_session<C, P>(
    client: Arc<C>,
    publisher: Arc<P>,
    session: DraftSession,
    config: &AutoSaveConfig,
    json: bool,
) -> Result<()>
where
    C: DraftPersistenceClient + 'static,
    P: PostPublisher + 'static,
{
    let form = Arc::new(SharedForm::default());
    let bridge = FormStateBridge::new(session.key.clone(), FieldMapping::default());
    let handle = DraftAutoSaveController::spawn(
        client,
        Arc::clone(&form),
        bridge,
        session.clone(),
        config,
    );
    let flow = PublishFlow::new(publisher, Arc::new(TerminalNavigator), session.clone());

    let mut presenter = ConflictPresenter::new();
    let mut states = handle.subscribe();
    let mut telemetry = handle.telemetry().subscribe();
    let mut telemetry_open = true;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_status = handle.status();

    if !json {
        println!();
        println!(
            "  {} {} as {}",
            style("Editing").bold(),
            style(&session.key).cyan(),
            style(&session.identity.user_id).cyan()
        );
        println!("  {}", style("Type :help for commands.").dim());
        println!();
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed, ending edit session");
                    break;
                };
                match commands::parse(&line) {
                    EditInput::Text(text) => {
                        append_line(&form, &text);
                        handle.notify_edit();
                    }
                    EditInput::Command(EditCommand::Quit) => break,
                    EditInput::Command(command) => {
                        if run_command(command, &handle, &form, &mut presenter, &flow, json).await {
                            break;
                        }
                    }
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if state.status != last_status {
                    if last_status == DraftStatus::Loading {
                        report_restored(&form, json);
                    }
                    report_status(&state, json);
                    last_status = state.status;
                }
                for event in presenter.observe(&state) {
                    report_presenter(&event, json);
                }
            }
            event = telemetry.recv(), if telemetry_open => {
                match event {
                    Ok(event) => report_telemetry(&event, json),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "telemetry receiver lagged"),
                    Err(RecvError::Closed) => telemetry_open = false,
                }
            }
        }
    }

    handle.shutdown();
    Ok(())
}

/// Returns `true` when the session should end.
async fn run_command<P>(
    command: EditCommand,
    handle: &DraftHandle,
    form: &SharedForm,
    presenter: &mut ConflictPresenter,
    flow: &PublishFlow<P, TerminalNavigator>,
    json: bool,
) -> bool
where
    P: PostPublisher,
{
    match command {
        EditCommand::Title(title) => {
            form.set_field("title", title);
            handle.notify_edit();
        }
        EditCommand::Category(category) => {
            form.set_field("category", category);
            handle.notify_edit();
        }
        EditCommand::Flush => match handle.trigger_save().await {
            Ok(_) => notify(&Notification::info("Draft saved"), json),
            Err(e) => notify(&Notification::error(format!("Save failed: {e}")), json),
        },
        EditCommand::Keep => resolve(handle, presenter, ResolutionMode::KeepLocal, json).await,
        EditCommand::Reload => {
            resolve(handle, presenter, ResolutionMode::ReloadRemote, json).await;
        }
        EditCommand::Dismiss => {
            for event in presenter.dismiss_banner() {
                report_presenter(&event, json);
            }
        }
        EditCommand::Status => print_state(&handle.state(), form, json),
        EditCommand::Publish => match flow.publish(handle).await {
            Ok(post_id) => {
                if json {
                    println!("{}", json!({ "event": "published", "post_id": post_id }));
                } else {
                    println!("  {} published post {}", style("✓").green().bold(), post_id);
                }
                return true;
            }
            Err(e) => notify(&Notification::error(e.to_string()), json),
        },
        EditCommand::Help => {
            if !json {
                commands::print_help();
            }
        }
        EditCommand::Unknown(what) => {
            notify(&Notification::error(format!("Unknown command {what}, try :help")), json);
        }
        EditCommand::Quit => return true,
    }
    false
}

async fn resolve(
    handle: &DraftHandle,
    presenter: &mut ConflictPresenter,
    mode: ResolutionMode,
    json: bool,
) {
    if let Some(event) = presenter.choose_and_report(handle, mode).await {
        report_presenter(&event, json);
    }
}

fn append_line(form: &SharedForm, text: &str) {
    let mut content = form.text("content");
    if !content.is_empty() {
        content.push('\n');
    }
    content.push_str(text);
    form.set_field("content", content);
}

fn report_restored(form: &SharedForm, json: bool) {
    let title = form.text("title");
    let content = form.text("content");
    if title.is_empty() && content.is_empty() {
        return;
    }
    if json {
        println!("{}", json!({ "event": "restored", "title": title, "content": content }));
        return;
    }
    println!("  {} restored saved draft", style("i").blue().bold());
    if !title.is_empty() {
        println!("  {} {}", style("title:").dim(), title);
    }
    for line in content.lines() {
        println!("  {} {}", style("|").dim(), line);
    }
}

fn report_status(state: &ControllerState, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "event": "status",
                "status": state.status,
                "version": state.version,
                "draft_id": state.draft_id,
            })
        );
        return;
    }
    let label = match state.status {
        DraftStatus::Saved => style(state.status.describe()).green(),
        DraftStatus::Conflict | DraftStatus::Error(_) => style(state.status.describe()).red(),
        _ => style(state.status.describe()).dim(),
    };
    println!("  {label}");
}

fn print_state(state: &ControllerState, form: &SharedForm, json: bool) {
    if json {
        println!("{}", json!({ "event": "state", "state": state }));
        return;
    }
    println!();
    println!("  {:<10} {}", style("Status").bold(), state.status);
    println!("  {:<10} {}", style("Version").bold(), state.version);
    if let Some(id) = &state.draft_id {
        println!("  {:<10} {}", style("Draft").bold(), id);
    }
    if let Some(at) = state.last_saved_at {
        println!(
            "  {:<10} {}",
            style("Saved at").bold(),
            at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!(
        "  {:<10} {} chars",
        style("Content").bold(),
        form.text("content").chars().count()
    );
    println!();
}

fn report_presenter(event: &PresenterEvent, json: bool) {
    if json {
        let value = match event {
            PresenterEvent::BannerShown(view) => json!({
                "event": "banner_shown",
                "severity": view.severity,
                "message": view.message,
            }),
            PresenterEvent::BannerHidden => json!({ "event": "banner_hidden" }),
            PresenterEvent::ModalOpened(view) => json!({
                "event": "modal_opened",
                "severity": view.severity,
                "has_remote": view.has_remote,
            }),
            PresenterEvent::ModalClosed(note) => json!({
                "event": "modal_closed",
                "message": note.message,
            }),
            PresenterEvent::ResolutionFailed(note) => json!({
                "event": "resolution_failed",
                "message": note.message,
            }),
        };
        println!("{value}");
        return;
    }

    match event {
        PresenterEvent::BannerShown(view) => {
            println!(
                "  {} {} {}",
                style("!").yellow().bold(),
                style(view.title).yellow().bold(),
                view.message
            );
        }
        PresenterEvent::BannerHidden => {}
        PresenterEvent::ModalOpened(view) => {
            println!();
            println!("  {}", style(view.title).red().bold());
            println!("  {}", view.message);
            let reload = if view.has_remote {
                "load the saved version"
            } else {
                "fetch and load the saved version"
            };
            println!(
                "  {} keep your version   {} {}",
                style(":keep").cyan(),
                style(":reload").cyan(),
                reload
            );
            println!();
        }
        PresenterEvent::ModalClosed(note) | PresenterEvent::ResolutionFailed(note) => {
            notify(note, false);
        }
    }
}

fn report_telemetry(event: &DraftTelemetry, json: bool) {
    debug!(event = event.name(), "draft telemetry");
    if json && let Ok(value) = serde_json::to_value(event) {
        println!("{}", json!({ "event": "telemetry", "name": event.name(), "data": value }));
    }
}

fn notify(note: &Notification, json: bool) {
    if json {
        println!("{}", json!({ "event": "notification", "message": note.message }));
        return;
    }
    match note.level {
        NotificationLevel::Success => println!("  {} {}", style("✓").green().bold(), note.message),
        NotificationLevel::Info => println!("  {} {}", style("i").blue().bold(), note.message),
        NotificationLevel::Error => println!("  {} {}", style("✗").red().bold(), note.message),
    }
}
