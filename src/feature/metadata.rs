//! Feature metadata: typed key/value attributes stored outside the
//! feature record.
//!
//! Metadata lives in a separate container section and is deserialised by
//! an external [`crate::container::MetadataDeserializer`]. The decoder
//! only ever sees the materialised map or the `(field, record id)`
//! index.

use std::collections::BTreeMap;
use std::fmt;

/// A metadata attribute kind.
///
/// The discriminants are part of the container format; a container
/// written with one catalogue version must read back with a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MetaField {
    Website = 1,
    Phone = 2,
    OpeningHours = 3,
    Elevation = 4,
    Wikipedia = 5,
    HouseName = 6,
    PostCode = 7,
    Operator = 8,
}

impl MetaField {
    /// Decode a field kind from its wire discriminant.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Website),
            2 => Some(Self::Phone),
            3 => Some(Self::OpeningHours),
            4 => Some(Self::Elevation),
            5 => Some(Self::Wikipedia),
            6 => Some(Self::HouseName),
            7 => Some(Self::PostCode),
            8 => Some(Self::Operator),
            _ => None,
        }
    }
}

impl fmt::Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Website => "website",
            Self::Phone => "phone",
            Self::OpeningHours => "opening_hours",
            Self::Elevation => "elevation",
            Self::Wikipedia => "wikipedia",
            Self::HouseName => "house_name",
            Self::PostCode => "post_code",
            Self::Operator => "operator",
        };
        f.write_str(name)
    }
}

/// Materialised metadata of one feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    fields: BTreeMap<MetaField, String>,
}

impl Metadata {
    /// An empty metadata map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a field, if present and non-empty.
    pub fn get(&self, field: MetaField) -> Option<&str> {
        self.fields
            .get(&field)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Store a field value and return a borrow of it.
    pub fn set(&mut self, field: MetaField, value: String) -> &str {
        self.fields.entry(field).or_insert(value)
    }

    /// True if the field is present.
    pub fn has(&self, field: MetaField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Number of stored fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the stored fields in discriminant order.
    pub fn iter(&self) -> impl Iterator<Item = (MetaField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_field_wire_roundtrip() {
        for field in [
            MetaField::Website,
            MetaField::Phone,
            MetaField::OpeningHours,
            MetaField::Elevation,
            MetaField::Wikipedia,
            MetaField::HouseName,
            MetaField::PostCode,
            MetaField::Operator,
        ] {
            assert_eq!(MetaField::from_u8(field as u8), Some(field));
        }
        assert_eq!(MetaField::from_u8(0), None);
        assert_eq!(MetaField::from_u8(200), None);
    }

    #[test]
    fn test_metadata_get_set() {
        let mut meta = Metadata::new();
        assert!(meta.is_empty());
        assert_eq!(meta.get(MetaField::Phone), None);

        meta.set(MetaField::Phone, "+49 40 0000".to_string());
        assert_eq!(meta.get(MetaField::Phone), Some("+49 40 0000"));
        assert!(meta.has(MetaField::Phone));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn test_metadata_empty_value_reads_as_absent() {
        let mut meta = Metadata::new();
        meta.set(MetaField::Website, String::new());
        assert!(meta.has(MetaField::Website));
        assert_eq!(meta.get(MetaField::Website), None);
    }

    #[test]
    fn test_metadata_set_keeps_first_value() {
        let mut meta = Metadata::new();
        meta.set(MetaField::Operator, "first".to_string());
        meta.set(MetaField::Operator, "second".to_string());
        assert_eq!(meta.get(MetaField::Operator), Some("first"));
    }
}
