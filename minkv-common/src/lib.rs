//! # MiN KV Common Library
//!
//! Shared code for the MiN key-value annotation tools:
//! - Common error type
//! - TOML configuration model and config file discovery
//! - Annotation store schema initialisation

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
