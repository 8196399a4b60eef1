//! Built-in field dictionaries for the two import variants.
//!
//! Each table is declared once, keyed by canonical name, with every CRM
//! label and CSV header spelling listed as an alias. The dictionaries are
//! built lazily on first use and shared for the life of the process.

mod buildings;
mod properties;

use std::sync::LazyLock;

use crate::field_dictionary::FieldDictionary;

pub use buildings::BUILDING_FIELDS;
pub use properties::PROPERTY_FIELDS;

static PROPERTIES: LazyLock<FieldDictionary> = LazyLock::new(|| {
    FieldDictionary::new("properties", PROPERTY_FIELDS).expect("valid property dictionary")
});

static BUILDINGS: LazyLock<FieldDictionary> = LazyLock::new(|| {
    FieldDictionary::new("buildings", BUILDING_FIELDS).expect("valid building dictionary")
});

/// Dictionary for rental property records.
pub fn properties() -> &'static FieldDictionary {
    &PROPERTIES
}

/// Dictionary for building records.
pub fn buildings() -> &'static FieldDictionary {
    &BUILDINGS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_dictionary::{TargetEntity, ValueType};

    #[test]
    fn property_dictionary_is_valid() {
        assert!(FieldDictionary::new("properties", PROPERTY_FIELDS).is_ok());
    }

    #[test]
    fn building_dictionary_is_valid() {
        assert!(FieldDictionary::new("buildings", BUILDING_FIELDS).is_ok());
    }

    #[test]
    fn both_dictionaries_share_identifier_column() {
        assert_eq!(properties().identifier().name, "external_id");
        assert_eq!(buildings().identifier().name, "external_id");
    }

    #[test]
    fn crm_and_csv_spellings_resolve_to_same_field() {
        let dict = properties();
        assert_eq!(dict.resolve("Record Id").unwrap().name, "external_id");
        assert_eq!(dict.resolve("id").unwrap().name, "external_id");
        assert_eq!(dict.resolve("Property Name").unwrap().name, "name");
        assert_eq!(dict.resolve("name").unwrap().name, "name");
        assert_eq!(dict.resolve("Monthly Rent").unwrap().name, "monthly_rent");
        assert_eq!(dict.resolve("rent").unwrap().name, "monthly_rent");
    }

    #[test]
    fn property_building_reference_is_primary_json() {
        let dict = properties();
        assert_eq!(
            dict.target_entity("associated_building"),
            Some(TargetEntity::Primary)
        );
        assert_eq!(dict.value_type("associated_building"), Some(ValueType::Json));
    }

    #[test]
    fn property_type_is_primary_on_both_entities() {
        assert_eq!(
            properties().target_entity("property_type"),
            Some(TargetEntity::Primary)
        );
        assert_eq!(
            buildings().target_entity("property_type"),
            Some(TargetEntity::Primary)
        );
    }

    #[test]
    fn den_has_field_specific_tokens() {
        let den = properties().field("has_den").unwrap();
        let overrides = den.boolean_overrides.unwrap();
        assert!(overrides.falsy.contains(&"no den"));
    }

    #[test]
    fn has_pool_is_detail_boolean() {
        let dict = properties();
        assert_eq!(dict.target_entity("has_pool"), Some(TargetEntity::Detail));
        assert_eq!(dict.value_type("has_pool"), Some(ValueType::Boolean));
    }
}
