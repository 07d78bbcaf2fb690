//! Domain model: entities, annotation values, input records

pub mod annotation;
pub mod entity;
pub mod record;

pub use annotation::{AnnotationSnapshot, KvGroup, KvPair, Namespace};
pub use entity::{Entity, EntityId, EntityKind, EntityTree};
pub use record::{InputRecord, TagTriple};
