//! Playback and photo browsing of a stored session.

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::args::{PhotosCliArgs, PlayCliArgs};
use crate::app;
use crate::config::Config;
use crate::session::{PhotoCapture, RecordingSession, SessionId};
use crate::store::SessionStore;
use crate::viewer::PlaybackState;

const REFRESH: Duration = Duration::from_millis(100);

async fn load_session(id: &str) -> Result<RecordingSession> {
    let config = Config::load()?;
    let store = app::open_store(&config)?;
    store
        .get(&SessionId::from(id))
        .await?
        .ok_or_else(|| anyhow!("Session {} not found", id))
}

pub async fn handle_play_command(args: PlayCliArgs) -> Result<()> {
    let session = load_session(&args.id).await?;
    let mut viewer = app::build_viewer(session)?;

    viewer.play().await?;
    let (_, total) = viewer.player().progress();
    let pb = create_progress_bar(total);
    pb.set_message(format!("Session {}", viewer.session().id));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                pb.abandon_with_message("Stopped");
                break;
            }
            _ = tokio::time::sleep(REFRESH) => {
                let state = viewer.player_mut().refresh();
                let (elapsed, _) = viewer.player().progress();
                pb.set_position(elapsed.as_millis() as u64);
                if state == PlaybackState::Finished {
                    pb.finish_with_message("Complete");
                    break;
                }
            }
        }
    }

    viewer.close();
    Ok(())
}

pub async fn handle_photos_command(args: PhotosCliArgs) -> Result<()> {
    let session = load_session(&args.id).await?;
    let mut viewer = app::build_viewer(session)?;

    if viewer.gallery().is_empty() {
        println!("Session {} has no photos.", viewer.session().id);
        return Ok(());
    }

    match args.index {
        Some(index) => {
            let count = viewer.gallery().len();
            let photo = viewer
                .gallery_mut()
                .select(index)
                .ok_or_else(|| anyhow!("Photo {} out of range (session has {})", index, count))?;
            print_photo(index, photo);
        }
        None => {
            for (i, photo) in viewer.gallery().photos().iter().enumerate() {
                print_photo(i, photo);
            }
        }
    }

    viewer.close();
    Ok(())
}

fn print_photo(index: usize, photo: &PhotoCapture) {
    println!("[{}] {}", index, photo.reference);
    println!("    Taken:    {}", photo.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(geo) = photo.geolocation {
        match geo.accuracy_meters {
            Some(accuracy) => println!(
                "    Location: {:.5}, {:.5} (±{:.0} m)",
                geo.latitude, geo.longitude, accuracy
            ),
            None => println!("    Location: {:.5}, {:.5}", geo.latitude, geo.longitude),
        }
    }
    if let Some(caption) = &photo.caption {
        println!("    Caption:  {}", caption);
    }
}

/// Progress in milliseconds of audio played.
fn create_progress_bar(total: Duration) -> ProgressBar {
    let pb = ProgressBar::new(total.as_millis() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {elapsed_precise} {msg}")
    {
        pb.set_style(style.progress_chars("━╸━"));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
