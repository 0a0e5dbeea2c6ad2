//! # MGD Common Library
//!
//! Shared code for the MGD recommendation crates:
//! - Error type and result alias
//! - TOML configuration and root folder resolution
//! - Logging initialisation
//! - SQLite pool initialisation and catalog schema

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod logging;

pub use config::TomlConfig;
pub use error::{Error, Result};
