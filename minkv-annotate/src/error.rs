//! Error types for minkv-annotate
//!
//! Severity:
//! - Duplicate names / missing columns abort the current root entity
//! - A configuration inconsistency aborts the whole run
//! - Write failures are logged and counted; the run continues
//!
//! Records that resolve to no entity are not errors: they are counted as
//! "not found" and skipped.

use crate::model::{EntityId, EntityKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotateError {
    /// Two same-kind siblings share a name inside a uniqueness scope
    #[error("Names not unique: {kind} '{name}' appears twice in {scope}")]
    DuplicateName {
        scope: String,
        kind: EntityKind,
        name: String,
    },

    /// Header lacks a column required for the target kind
    #[error("Required column '{0}' missing from header")]
    MissingColumn(String),

    /// Delete / create / link failed
    #[error("Write failed ({operation}) on entity {entity}: {source}")]
    Write {
        operation: &'static str,
        entity: EntityId,
        #[source]
        source: minkv_common::Error,
    },

    /// Programming invariant: options and derived batch disagree
    #[error("Configuration inconsistency: {0}")]
    ConfigurationInconsistency(String),

    /// Malformed delimited input
    #[error("Tabular input error: {0}")]
    Csv(#[from] csv::Error),

    /// minkv-common error
    #[error(transparent)]
    Common(#[from] minkv_common::Error),
}

impl AnnotateError {
    pub fn write(operation: &'static str, entity: EntityId, source: minkv_common::Error) -> Self {
        AnnotateError::Write {
            operation,
            entity,
            source,
        }
    }

    /// True when the current root entity cannot be processed further
    pub fn aborts_root(&self) -> bool {
        matches!(
            self,
            AnnotateError::DuplicateName { .. } | AnnotateError::MissingColumn(_)
        )
    }

    /// True when the run must stop immediately
    pub fn aborts_run(&self) -> bool {
        matches!(self, AnnotateError::ConfigurationInconsistency(_))
    }
}

/// Result type for annotate operations
pub type AnnotateResult<T> = Result<T, AnnotateError>;
