//! Record → target entity resolution
//!
//! The finest level the record names decides the target: image name, else
//! well label, else plate name. A name that is supplied but not found makes
//! the record unresolved; it is never widened to a coarser container.

use crate::hierarchy::HierarchyIndex;
use crate::model::{Entity, InputRecord};
use tracing::{debug, info, warn};

/// Finest level a record names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLevel {
    Image,
    Well,
    Plate,
}

impl TargetLevel {
    /// Finest non-empty key of `record`
    pub fn of(record: &InputRecord) -> Option<Self> {
        if !record.image_name.is_empty() {
            Some(TargetLevel::Image)
        } else if record.well_label.is_some() {
            Some(TargetLevel::Well)
        } else if record.plate_name.is_some() {
            Some(TargetLevel::Plate)
        } else {
            None
        }
    }
}

/// Resolve `record` to a single entity of `index`, or `None`
pub fn resolve<'a>(record: &InputRecord, index: &'a HierarchyIndex) -> Option<&'a Entity> {
    let plate_name = record.plate_name.as_deref();
    let well_label = record.well_label.as_deref();

    let resolved = match index {
        HierarchyIndex::Dataset { images, .. } => first_match(
            record,
            |name| images.get(name),
            |_| None,
            |_| None,
        ),
        HierarchyIndex::Plate {
            root,
            wells,
            images,
        } => first_match(
            record,
            |name| images.get(name),
            |label| wells.get(label),
            |name| (name == root.name).then_some(root),
        ),
        HierarchyIndex::Screen {
            plates,
            wells,
            images,
            ..
        } => first_match(
            record,
            |name| {
                images
                    .get(plate_name?)?
                    .get(well_label?)?
                    .get(name)
            },
            |label| wells.get(plate_name?)?.get(label),
            |name| plates.get(name),
        ),
    };

    match resolved {
        Some(entity) => info!(
            kind = %entity.kind,
            entity_id = %entity.id,
            name = %entity.name,
            "Annotating {}",
            entity.kind
        ),
        None => warn!(
            image = %record.image_name,
            well = ?record.well_label,
            plate = ?record.plate_name,
            "Can't find object by image, well or plate name"
        ),
    }

    resolved
}

/// Shared fallback chain: look up the finest supplied key only
fn first_match<'a>(
    record: &InputRecord,
    image: impl FnOnce(&str) -> Option<&'a Entity>,
    well: impl FnOnce(&str) -> Option<&'a Entity>,
    plate: impl FnOnce(&str) -> Option<&'a Entity>,
) -> Option<&'a Entity> {
    let level = TargetLevel::of(record)?;
    let found = match level {
        TargetLevel::Image => image(&record.image_name),
        TargetLevel::Well => record.well_label.as_deref().and_then(well),
        TargetLevel::Plate => record.plate_name.as_deref().and_then(plate),
    };

    if found.is_none() {
        debug!(?level, "Finest supplied name not found; record left unresolved");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, EntityKind, EntityTree};

    fn image(id: i64, name: &str) -> EntityTree {
        EntityTree::leaf(Entity::new(EntityKind::Image, id, name))
    }

    fn well(id: i64, label: &str, images: Vec<EntityTree>) -> EntityTree {
        EntityTree::with_children(Entity::new(EntityKind::Well, id, label), images)
    }

    fn plate_tree(id: i64, name: &str, wells: Vec<EntityTree>) -> EntityTree {
        EntityTree::with_children(Entity::new(EntityKind::Plate, id, name), wells)
    }

    fn plate_index() -> HierarchyIndex {
        HierarchyIndex::build(&plate_tree(
            1,
            "P1",
            vec![
                well(2, "A1", vec![image(10, "a1_f1.tif")]),
                well(3, "B2", vec![image(11, "b2_f1.tif")]),
            ],
        ))
        .unwrap()
    }

    fn screen_index() -> HierarchyIndex {
        HierarchyIndex::build(&EntityTree::with_children(
            Entity::new(EntityKind::Screen, 100, "S"),
            vec![
                plate_tree(1, "P1", vec![well(2, "A1", vec![image(10, "f1.tif")])]),
                plate_tree(4, "P2", vec![well(5, "A1", vec![image(11, "f1.tif")])]),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn test_dataset_image_lookup() {
        let index = HierarchyIndex::build(&EntityTree::with_children(
            Entity::new(EntityKind::Dataset, 1, "ds"),
            vec![image(10, "cell01.tif")],
        ))
        .unwrap();

        let record = InputRecord::new("cell01.tif", None, None);
        assert_eq!(resolve(&record, &index).map(|e| e.id), Some(EntityId(10)));

        let missing = InputRecord::new("cell02.tif", None, None);
        assert!(resolve(&missing, &index).is_none());
    }

    #[test]
    fn test_dataset_ignores_well_and_plate_only_rows() {
        let index = HierarchyIndex::build(&EntityTree::with_children(
            Entity::new(EntityKind::Dataset, 1, "ds"),
            vec![image(10, "cell01.tif")],
        ))
        .unwrap();

        let record = InputRecord::new("", Some("A1"), Some("ds"));
        assert!(resolve(&record, &index).is_none());
    }

    #[test]
    fn test_image_match_wins_over_well_and_plate() {
        let index = plate_index();
        let record = InputRecord::new("b2_f1.tif", Some("A1"), Some("P1"));
        assert_eq!(resolve(&record, &index).map(|e| e.id), Some(EntityId(11)));
    }

    #[test]
    fn test_well_then_plate_fallback() {
        let index = plate_index();

        let well_row = InputRecord::new("", Some("B2"), Some("P1"));
        let target = resolve(&well_row, &index).unwrap();
        assert_eq!(target.kind, EntityKind::Well);
        assert_eq!(target.id, EntityId(3));

        let plate_row = InputRecord::new("", None, Some("P1"));
        let target = resolve(&plate_row, &index).unwrap();
        assert_eq!(target.kind, EntityKind::Plate);
        assert_eq!(target.id, EntityId(1));
    }

    #[test]
    fn test_bad_well_does_not_widen_to_plate() {
        let index = plate_index();
        let record = InputRecord::new("", Some("H12"), Some("P1"));
        assert!(resolve(&record, &index).is_none());
    }

    #[test]
    fn test_bad_image_does_not_widen_to_well() {
        let index = plate_index();
        let record = InputRecord::new("nope.tif", Some("A1"), Some("P1"));
        assert!(resolve(&record, &index).is_none());
    }

    #[test]
    fn test_plate_name_must_match_root() {
        let index = plate_index();
        let record = InputRecord::new("", None, Some("P9"));
        assert!(resolve(&record, &index).is_none());
    }

    #[test]
    fn test_screen_nested_image_lookup() {
        let index = screen_index();

        let record = InputRecord::new("f1.tif", Some("A1"), Some("P2"));
        assert_eq!(resolve(&record, &index).map(|e| e.id), Some(EntityId(11)));

        // Image names repeat across plates: no plate means no match
        let ambiguous = InputRecord::new("f1.tif", None, None);
        assert!(resolve(&ambiguous, &index).is_none());
    }

    #[test]
    fn test_screen_well_and_plate_lookup() {
        let index = screen_index();

        let well_row = InputRecord::new("", Some("A1"), Some("P2"));
        assert_eq!(resolve(&well_row, &index).map(|e| e.id), Some(EntityId(5)));

        let plate_row = InputRecord::new("", None, Some("P2"));
        assert_eq!(resolve(&plate_row, &index).map(|e| e.id), Some(EntityId(4)));

        let well_without_plate = InputRecord::new("", Some("A1"), None);
        assert!(resolve(&well_without_plate, &index).is_none());
    }

    #[test]
    fn test_empty_record_unresolved() {
        let index = plate_index();
        assert!(resolve(&InputRecord::default(), &index).is_none());
    }
}
