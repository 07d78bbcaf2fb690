//! minkv-annotate library interface
//!
//! Attaches key-value and tag annotations to objects of a containment
//! hierarchy (project/dataset/image, screen/plate/well/image), sourced from
//! delimited files or from a tag database.

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod merge;
pub mod model;
pub mod resolver;
pub mod snapshot;
pub mod store;
pub mod tabular;
pub mod tagdb;
pub mod utils;
pub mod workflow;
pub mod writer;

pub use crate::error::{AnnotateError, AnnotateResult};
