pub mod clipboard;
pub mod config;
pub mod generate;
pub mod logging;
pub mod persistence;
pub mod session;
pub mod types;
pub mod ui;
pub mod utils;
