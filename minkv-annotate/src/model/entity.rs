//! Containment hierarchy entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a node in the containment hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Dataset,
    Image,
    Screen,
    Plate,
    Well,
}

impl EntityKind {
    /// Storage / display name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Dataset => "dataset",
            EntityKind::Image => "image",
            EntityKind::Screen => "screen",
            EntityKind::Plate => "plate",
            EntityKind::Well => "well",
        }
    }

    /// Images contain nothing
    pub fn is_leaf(&self) -> bool {
        matches!(self, EntityKind::Image)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(EntityKind::Project),
            "dataset" => Ok(EntityKind::Dataset),
            "image" => Ok(EntityKind::Image),
            "screen" => Ok(EntityKind::Screen),
            "plate" => Ok(EntityKind::Plate),
            "well" => Ok(EntityKind::Well),
            other => Err(format!("Unknown entity kind: {}", other)),
        }
    }
}

/// Opaque stable identifier assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only reference to a store entity
///
/// `name` is the well label for wells. `parent` records the container the
/// entity was reached from; it is a lookup key only, never traversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub id: EntityId,
    pub name: String,
    pub parent: Option<EntityId>,
}

impl Entity {
    pub fn new(kind: EntityKind, id: i64, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: EntityId(id),
            name: name.into(),
            parent: None,
        }
    }

    /// Same entity, reached from `parent`
    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// An entity with its pre-fetched subtree
#[derive(Debug, Clone)]
pub struct EntityTree {
    pub entity: Entity,
    pub children: Vec<EntityTree>,
}

impl EntityTree {
    pub fn leaf(entity: Entity) -> Self {
        Self {
            entity,
            children: Vec::new(),
        }
    }

    /// Builder used by tests and fixtures: attach `children`, setting their parent key
    pub fn with_children(entity: Entity, children: Vec<EntityTree>) -> Self {
        let parent = entity.id;
        let children = children
            .into_iter()
            .map(|mut child| {
                child.entity.parent = Some(parent);
                child
            })
            .collect();
        Self { entity, children }
    }
}
