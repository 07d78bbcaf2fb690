//! Utility modules for minkv-annotate

pub mod retry;

pub use retry::{retry_bounded, RetryPolicy};
