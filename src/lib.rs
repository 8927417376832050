//! MongoVault library
//!
//! Orchestrates point-in-time backup and restore of MongoDB databases by
//! driving `mongodump`/`mongorestore`, either locally or on the far side of
//! an SSH session with the archive streamed through the channel.

pub mod backup;
pub mod catalog;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod exec;
pub mod metadata;
pub mod restore;
pub mod selection;
pub mod time_filter;

// Re-export commonly used types
pub use config::Config;
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
