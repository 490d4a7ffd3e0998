//! Command-line front end. Terminal presentation and prompts live here; the
//! session logic lives in `session`, `store` and `viewer`.

pub mod args;
mod play;
mod record;
mod sessions;

pub use args::{Cli, CliCommand};
pub use play::{handle_photos_command, handle_play_command};
pub use record::handle_record_command;
pub use sessions::{handle_sessions_command, handle_show_command};
