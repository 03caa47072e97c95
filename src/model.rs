use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known field names shared between the extractor and the record table.
///
/// The names match the column headers of the persisted table, so they are in
/// the source site's language. Everything else in a record is an open-ended
/// label/value pair taken verbatim from the detail page.
pub mod keys {
    /// Source listing URL; also the deduplication key.
    pub const URL: &str = "URL";
    pub const SCHOOL_NAME: &str = "Naam school";
    pub const SCHOOL_ID: &str = "ID-school";
    pub const JOB_TITLE: &str = "Functienaam";
    pub const POSTAL_CODE: &str = "Postcode";
    pub const PLACE_NAME: &str = "Plaatsnaam";
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";
}

/// One extracted vacancy listing: a mapping from field name to field value.
///
/// Field names are dynamic (different listings expose different label/value
/// pairs) plus the fixed derived fields in [`keys`]. The map is ordered
/// (sorted by key) so column order stays stable across table writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VacancyRecord {
    fields: BTreeMap<String, String>,
}

impl VacancyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field name/value pairs in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for VacancyRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
