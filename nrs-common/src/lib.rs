//! # NRS Common Library
//!
//! Shared code for the NRS metadata crates including:
//! - Error type shared by configuration and bootstrap code
//! - TOML/environment configuration loading
//! - Logging bootstrap
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
