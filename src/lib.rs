pub mod app;
pub mod capture;
pub mod cli;
pub mod config;
pub mod db;
pub mod global;
pub mod session;
pub mod store;
pub mod sync;
pub mod viewer;
