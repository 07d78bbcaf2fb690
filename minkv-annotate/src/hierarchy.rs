//! Name-indexed lookup tables over a containment tree
//!
//! Each root kind gets its own variant:
//! - Dataset: images by name (unique within the dataset)
//! - Plate: wells by label, images by name (unique within the plate)
//! - Screen: plates by name; wells and images nested per plate, since
//!   labels and image names repeat across plates
//!
//! The first same-kind sibling collision inside a uniqueness scope aborts
//! construction with `DuplicateName`.

use crate::error::{AnnotateError, AnnotateResult};
use crate::model::{Entity, EntityId, EntityKind, EntityTree};
use crate::store::AnnotationStore;
use std::collections::{HashMap, VecDeque};

/// `plate_name → well_label → image_name → image`
pub type ScreenImages = HashMap<String, HashMap<String, HashMap<String, Entity>>>;

#[derive(Debug, Clone)]
pub enum HierarchyIndex {
    Dataset {
        root: Entity,
        images: HashMap<String, Entity>,
    },
    Plate {
        root: Entity,
        wells: HashMap<String, Entity>,
        images: HashMap<String, Entity>,
    },
    Screen {
        root: Entity,
        plates: HashMap<String, Entity>,
        wells: HashMap<String, HashMap<String, Entity>>,
        images: ScreenImages,
    },
}

impl HierarchyIndex {
    /// Index a pre-fetched tree rooted at a dataset, plate or screen
    pub fn build(tree: &EntityTree) -> AnnotateResult<Self> {
        let root = tree.entity.clone();
        match root.kind {
            EntityKind::Dataset => {
                let scope = scope_name(&root);
                let mut images = HashMap::new();
                for image in children_of(tree, EntityKind::Image) {
                    insert_unique(&mut images, image, &scope)?;
                }
                Ok(HierarchyIndex::Dataset { root, images })
            }
            EntityKind::Plate => {
                let (wells, images) = index_plate(tree)?;
                Ok(HierarchyIndex::Plate {
                    root,
                    wells,
                    images,
                })
            }
            EntityKind::Screen => {
                let scope = scope_name(&root);
                let mut plates = HashMap::new();
                let mut wells = HashMap::new();
                let mut images: ScreenImages = HashMap::new();

                for plate_tree in tree
                    .children
                    .iter()
                    .filter(|c| c.entity.kind == EntityKind::Plate)
                {
                    let plate = &plate_tree.entity;
                    insert_unique(&mut plates, &plate_tree.entity, &scope)?;

                    let plate_scope = scope_name(plate);
                    let mut plate_wells = HashMap::new();
                    let mut plate_images = HashMap::new();
                    for well_tree in plate_tree
                        .children
                        .iter()
                        .filter(|c| c.entity.kind == EntityKind::Well)
                    {
                        let well = &well_tree.entity;
                        insert_unique(&mut plate_wells, well, &plate_scope)?;

                        let well_scope = format!("{} of {}", scope_name(well), plate_scope);
                        let mut well_images = HashMap::new();
                        for image in children_of(well_tree, EntityKind::Image) {
                            insert_unique(&mut well_images, image, &well_scope)?;
                        }
                        plate_images.insert(well.name.clone(), well_images);
                    }
                    wells.insert(plate.name.clone(), plate_wells);
                    images.insert(plate.name.clone(), plate_images);
                }

                Ok(HierarchyIndex::Screen {
                    root,
                    plates,
                    wells,
                    images,
                })
            }
            other => Err(AnnotateError::Common(minkv_common::Error::InvalidInput(format!(
                "{} objects cannot be indexed (expected dataset, plate or screen)",
                other
            )))),
        }
    }

    pub fn root(&self) -> &Entity {
        match self {
            HierarchyIndex::Dataset { root, .. }
            | HierarchyIndex::Plate { root, .. }
            | HierarchyIndex::Screen { root, .. } => root,
        }
    }

    pub fn root_kind(&self) -> EntityKind {
        self.root().kind
    }

    /// Number of indexed images
    pub fn image_count(&self) -> usize {
        match self {
            HierarchyIndex::Dataset { images, .. } | HierarchyIndex::Plate { images, .. } => {
                images.len()
            }
            HierarchyIndex::Screen { images, .. } => images
                .values()
                .flat_map(|wells| wells.values())
                .map(HashMap::len)
                .sum(),
        }
    }
}

fn scope_name(entity: &Entity) -> String {
    format!("{} '{}' ({})", entity.kind, entity.name, entity.id)
}

fn children_of(tree: &EntityTree, kind: EntityKind) -> impl Iterator<Item = &Entity> {
    tree.children
        .iter()
        .map(|c| &c.entity)
        .filter(move |e| e.kind == kind)
}

fn insert_unique(
    map: &mut HashMap<String, Entity>,
    entity: &Entity,
    scope: &str,
) -> AnnotateResult<()> {
    if map.contains_key(&entity.name) {
        return Err(AnnotateError::DuplicateName {
            scope: scope.to_string(),
            kind: entity.kind,
            name: entity.name.clone(),
        });
    }
    map.insert(entity.name.clone(), entity.clone());
    Ok(())
}

type PlateTables = (HashMap<String, Entity>, HashMap<String, Entity>);

fn index_plate(tree: &EntityTree) -> AnnotateResult<PlateTables> {
    let scope = scope_name(&tree.entity);
    let mut wells = HashMap::new();
    let mut images = HashMap::new();

    for well_tree in tree
        .children
        .iter()
        .filter(|c| c.entity.kind == EntityKind::Well)
    {
        insert_unique(&mut wells, &well_tree.entity, &scope)?;
        for image in children_of(well_tree, EntityKind::Image) {
            insert_unique(&mut images, image, &scope)?;
        }
    }

    Ok((wells, images))
}

/// Fetch `root` and its subtree from the store, breadth first
pub async fn load_tree(store: &dyn AnnotationStore, root: Entity) -> AnnotateResult<EntityTree> {
    let mut children_by_parent: HashMap<EntityId, Vec<Entity>> = HashMap::new();
    let mut queue = VecDeque::from([root.clone()]);

    while let Some(entity) = queue.pop_front() {
        if entity.kind.is_leaf() || children_by_parent.contains_key(&entity.id) {
            continue;
        }
        let children = store.list_children(&entity).await?;
        queue.extend(children.iter().cloned());
        children_by_parent.insert(entity.id, children);
    }

    tracing::debug!(
        root_id = %root.id,
        containers = children_by_parent.len(),
        "Loaded hierarchy"
    );

    Ok(assemble(root, &children_by_parent))
}

fn assemble(entity: Entity, children_by_parent: &HashMap<EntityId, Vec<Entity>>) -> EntityTree {
    let children = if entity.kind.is_leaf() {
        Vec::new()
    } else {
        children_by_parent
            .get(&entity.id)
            .map(|children| {
                children
                    .iter()
                    .map(|child| assemble(child.clone(), children_by_parent))
                    .collect()
            })
            .unwrap_or_default()
    };
    EntityTree { entity, children }
}
