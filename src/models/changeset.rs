//! Metadata changes produced by access classification

use indexmap::IndexMap;
use serde::Serialize;

use crate::metadata::MetadataMap;

/// meta.xml field names written by classification
pub mod fields {
    pub const COLLECTION: &str = "collection";
    pub const NOINDEX: &str = "noindex";
    pub const RIGHTS: &str = "rights";
    pub const GEO_RESTRICTED: &str = "geo_restricted";
    pub const BOOKREADER_DEFAULTS: &str = "bookreader-defaults";
}

/// Field to value(s) updates applied to an item's meta.xml in one write.
///
/// Setting a field replaces whatever the item had for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Changeset(IndexMap<String, Vec<String>>);

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to a single value
    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.0.insert(field.to_string(), vec![value.into()]);
    }

    /// Set `field` to several values
    pub fn set_all<I, S>(&mut self, field: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(field.to_string(), values.into_iter().map(Into::into).collect());
    }

    /// Add a value to `field` unless already present
    pub fn push_unique(&mut self, field: &str, value: &str) {
        let values = self.0.entry(field.to_string()).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Single-valued accessor, first value of `field`
    pub fn value(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Apply `other` on top: its fields replace ours, new fields go last
    pub fn overlay(&mut self, other: &Changeset) {
        for (field, values) in &other.0 {
            self.0.insert(field.clone(), values.clone());
        }
    }
}

impl From<&MetadataMap> for Changeset {
    fn from(metadata: &MetadataMap) -> Self {
        let mut changes = Changeset::new();
        for (field, values) in metadata.iter() {
            changes.set_all(field, values.iter().map(String::as_str));
        }
        changes
    }
}
