//! SQLite persistence for finished sessions. Raw SQL with rusqlite, no ORM.

mod init;
mod sessions;


pub use init::{migrate, open, open_existing};
pub use sessions::SessionRepository;
