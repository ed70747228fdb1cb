// Core modules
pub mod bot;
pub mod config;
pub mod exchange;
pub mod execution;
pub mod feed;
pub mod models;
pub mod parser;
pub mod report;
pub mod signal;

// Re-export commonly used types
pub use config::Settings;
pub use models::{ParsedTransaction, Position, RawPost, Signal};
