use anyhow::{anyhow, Result};

use super::args::{SessionsCliArgs, ShowCliArgs};
use crate::app;
use crate::config::Config;
use crate::session::{RecordingSession, SessionId};
use crate::store::SessionStore;

pub async fn handle_sessions_command(args: SessionsCliArgs) -> Result<()> {
    let config = Config::load()?;
    let store = app::open_store(&config)?;
    let sessions = store.list_recent(args.limit).await?;

    if sessions.is_empty() {
        println!("No sessions recorded yet.");
        println!("\nStart one with: fieldrec record --project <PROJECT>");
        return Ok(());
    }

    println!("{} session(s):\n", sessions.len());
    for session in &sessions {
        println!("{}", summary_line(session));
    }
    println!("\nTo see one in detail, use: fieldrec show <ID>");

    Ok(())
}

pub async fn handle_show_command(args: ShowCliArgs) -> Result<()> {
    let config = Config::load()?;
    let store = app::open_store(&config)?;
    let session = store
        .get(&SessionId::from(args.id.as_str()))
        .await?
        .ok_or_else(|| anyhow!("Session {} not found", args.id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!("ID:       {}", session.id);
    println!("Project:  {}", session.project_id);
    println!("State:    {}", session.state);
    println!("Started:  {}", session.start_time.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(end) = session.end_time {
        println!("Ended:    {}", end.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("Duration: {}", session.duration_label());
    println!(
        "Audio:    {}",
        session
            .audio_ref
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );

    if session.photos.is_empty() {
        println!("Photos:   none");
    } else {
        println!("Photos:");
        for (i, photo) in session.photos.iter().enumerate() {
            println!("  [{}] {}", i, photo.reference);
        }
    }

    Ok(())
}

fn summary_line(session: &RecordingSession) -> String {
    format!(
        "{}  {}  {:<20} {}  {} photo(s)",
        session.id,
        session.start_time.format("%Y-%m-%d %H:%M"),
        session.project_id,
        session.duration_label(),
        session.photo_count()
    )
}
