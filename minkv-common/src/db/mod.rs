//! Annotation store database

pub mod init;

pub use init::*;
