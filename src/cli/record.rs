//! Interactive recording loop.

use anyhow::{anyhow, bail, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::io::{self, IsTerminal};
use tracing::{info, warn};

use super::args::RecordCliArgs;
use crate::app;
use crate::config::Config;
use crate::session::{RecordingSession, SessionError, SessionId, SessionManager, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Photo,
    Pause,
    Resume,
    Status,
    Stop,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::Photo => "Take photo",
            Action::Pause => "Pause",
            Action::Resume => "Resume",
            Action::Status => "Status",
            Action::Stop => "Stop and save",
        }
    }
}

fn actions_for(state: SessionState) -> Vec<Action> {
    match state {
        SessionState::Recording => vec![Action::Photo, Action::Pause, Action::Status, Action::Stop],
        SessionState::Paused => vec![Action::Resume, Action::Status, Action::Stop],
        _ => vec![Action::Status, Action::Stop],
    }
}

pub async fn handle_record_command(args: RecordCliArgs) -> Result<()> {
    if !io::stdin().is_terminal() {
        bail!("Recording needs an interactive terminal");
    }

    let config = Config::load()?;
    let store = app::open_store(&config)?;
    let manager = app::build_manager(&config, store)?;

    let id = manager
        .start_session(&args.project)
        .await
        .map_err(|e| explain(&e))?;
    println!();
    println!("Recording session {} for project {}", id, args.project);
    println!("Drop photos into the camera inbox, then choose \"Take photo\".");
    println!();

    let result = drive_session(&manager, &id).await;
    if result.is_err() {
        manager.shutdown().await;
    }
    result
}

/// Prompt for actions until the session is stopped or fails.
async fn drive_session(manager: &SessionManager, id: &SessionId) -> Result<()> {
    loop {
        let state = manager.state().await;
        let elapsed = manager.duration_seconds().await;
        let action = prompt_action(state, elapsed).await?;

        let result = match action {
            Action::Photo => {
                let caption = prompt_caption().await?;
                manager.capture_photo(caption).await.map(|photo| {
                    println!("Photo saved: {}", photo.reference);
                    if let Some(geo) = photo.geolocation {
                        println!("  at {:.5}, {:.5}", geo.latitude, geo.longitude);
                    }
                })
            }
            Action::Pause => manager.pause_session().await,
            Action::Resume => manager.resume_session().await,
            Action::Status => {
                print_status(manager).await;
                Ok(())
            }
            Action::Stop => {
                let session = stop_with_retry(manager).await?;
                print_summary(&session);
                return Ok(());
            }
        };

        if let Err(e) = result {
            eprintln!("{}", explain(&e));
            if manager.state().await.is_terminated() {
                bail!("Session {} ended because of a device failure", id);
            }
        }
    }
}

/// Stop the session, offering to retry while saving fails.
async fn stop_with_retry(manager: &SessionManager) -> Result<RecordingSession> {
    loop {
        match manager.stop_session().await {
            Ok(session) => return Ok(session),
            Err(e @ SessionError::Storage { .. }) => {
                eprintln!("{}", explain(&e));
                if confirm("Retry saving the session?").await? {
                    continue;
                }
                if let Some(session) = manager.discard_retained().await {
                    warn!("Session {} left unsaved", session.id);
                    if let Some(audio) = &session.audio_ref {
                        eprintln!("The audio is still on disk at {}", audio);
                    }
                }
                bail!("Session was not saved");
            }
            Err(e) => return Err(explain(&e)),
        }
    }
}

fn explain(e: &SessionError) -> anyhow::Error {
    anyhow!("{} ({})", e, e.recovery_hint())
}

async fn print_status(manager: &SessionManager) {
    let Some(session) = manager.snapshot().await else {
        println!("No session");
        return;
    };
    println!(
        "Session {} [{}] {} recorded, {} photo(s)",
        session.id,
        session.state,
        session.duration_label(),
        session.photo_count()
    );
}

fn print_summary(session: &RecordingSession) {
    info!("Session {} completed", session.id);
    println!();
    println!("Saved session {}", session.id);
    println!("  Project:  {}", session.project_id);
    println!("  Duration: {}", session.duration_label());
    println!("  Photos:   {}", session.photo_count());
    if let Some(audio) = &session.audio_ref {
        println!("  Audio:    {}", audio);
    }
}

async fn prompt_action(state: SessionState, elapsed: u64) -> Result<Action> {
    let actions = actions_for(state);
    let labels: Vec<&'static str> = actions.iter().map(Action::label).collect();
    let prompt = format!("{} {:02}:{:02}", state, elapsed / 60, elapsed % 60);

    let selection = tokio::task::spawn_blocking(move || {
        let theme = ColorfulTheme::default();
        Select::with_theme(&theme)
            .with_prompt(prompt)
            .items(&labels)
            .default(0)
            .interact()
    })
    .await??;

    Ok(actions[selection])
}

async fn prompt_caption() -> Result<Option<String>> {
    let caption: String = tokio::task::spawn_blocking(|| {
        let theme = ColorfulTheme::default();
        Input::<String>::with_theme(&theme)
            .with_prompt("Caption (optional)")
            .allow_empty(true)
            .interact_text()
    })
    .await??;

    Ok(Some(caption).filter(|c| !c.trim().is_empty()))
}

async fn confirm(prompt: &'static str) -> Result<bool> {
    let answer = tokio::task::spawn_blocking(move || {
        let theme = ColorfulTheme::default();
        Confirm::with_theme(&theme)
            .with_prompt(prompt)
            .default(true)
            .interact()
    })
    .await??;
    Ok(answer)
}
