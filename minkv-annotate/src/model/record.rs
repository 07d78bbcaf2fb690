//! Input rows from the tabular file or the tag database

use indexmap::IndexMap;

/// One source row, consumed once by resolution and merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputRecord {
    /// Empty when the row does not name an image
    pub image_name: String,
    pub well_label: Option<String>,
    pub plate_name: Option<String>,
    /// key → values in cell order
    pub fields: IndexMap<String, Vec<String>>,
}

impl InputRecord {
    pub fn new(
        image_name: impl Into<String>,
        well_label: Option<&str>,
        plate_name: Option<&str>,
    ) -> Self {
        Self {
            image_name: image_name.into().trim().to_string(),
            well_label: non_empty(well_label),
            plate_name: non_empty(plate_name),
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, values: &[&str]) -> Self {
        self.fields
            .entry(key.to_string())
            .or_default()
            .extend(values.iter().map(|v| v.to_string()));
        self
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// One `(namespace, key, value)` row from the tag database
///
/// `key` is the parent tag and `namespace` the grand-parent tag; either may be
/// missing when the tag has no parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagTriple {
    pub namespace: Option<String>,
    pub key: Option<String>,
    pub value: String,
}

impl TagTriple {
    pub fn new(namespace: Option<&str>, key: Option<&str>, value: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            key: key.map(str::to_string),
            value: value.to_string(),
        }
    }
}
