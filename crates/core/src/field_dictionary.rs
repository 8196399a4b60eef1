//! Declarative field dictionary: external key spellings to typed canonical
//! fields.
//!
//! One [`FieldDictionary`] exists per import variant. Each canonical field
//! lists every external alias it accepts (CRM field labels and CSV headers
//! alike), the entity it is persisted on, and the value type the normalizer
//! coerces it to. Lookups are O(1) hash lookups on a folded key.
//!
//! This module has zero I/O. Dictionaries are built once and never mutated.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Column names managed by the store or the importer itself. No canonical
/// field may use them.
pub const RESERVED_COLUMNS: &[&str] = &[
    "id",
    "raw_data",
    "created_at",
    "updated_at",
    "property_id",
    "building_id",
];

/// Name of the overflow bag column on every detail table.
pub const RAW_DATA_COLUMN: &str = "raw_data";

static SQL_IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid regex"));

static KEY_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_\-.]+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Classification enums
// ---------------------------------------------------------------------------

/// Which half of a split record a canonical field lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetEntity {
    /// A column on the primary table.
    Primary,
    /// A column on the detail table.
    Detail,
    /// Recognised, coerced, but stored only inside the detail `raw_data` bag.
    RawData,
}

impl TargetEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Detail => "detail",
            Self::RawData => "raw_data",
        }
    }
}

impl std::fmt::Display for TargetEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value kind a canonical field is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    DateTime,
    Json,
    StringArray,
    String,
    Opaque,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::DateTime => "date_time",
            Self::Json => "json",
            Self::StringArray => "string_array",
            Self::String => "string",
            Self::Opaque => "opaque",
        }
    }

    /// All value types, in declaration order.
    pub const ALL: &'static [ValueType] = &[
        Self::Boolean,
        Self::Integer,
        Self::Float,
        Self::DateTime,
        Self::Json,
        Self::StringArray,
        Self::String,
        Self::Opaque,
    ];
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// Extra literal tokens a single boolean field accepts on top of the
/// general yes/no vocabulary. Matched after trim + lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanOverrides {
    pub truthy: &'static [&'static str],
    pub falsy: &'static [&'static str],
}

/// A named, typed slot in the internal domain model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Canonical name; also the column name on its target table.
    pub name: &'static str,
    /// External key spellings that map to this field.
    pub aliases: &'static [&'static str],
    pub target: TargetEntity,
    pub value_type: ValueType,
    /// Marks the natural key used to link primary and detail rows.
    pub is_identifier: bool,
    pub boolean_overrides: Option<BooleanOverrides>,
}

impl FieldSpec {
    const fn new(
        name: &'static str,
        target: TargetEntity,
        value_type: ValueType,
        aliases: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            aliases,
            target,
            value_type,
            is_identifier: false,
            boolean_overrides: None,
        }
    }

    pub const fn primary(
        name: &'static str,
        value_type: ValueType,
        aliases: &'static [&'static str],
    ) -> Self {
        Self::new(name, TargetEntity::Primary, value_type, aliases)
    }

    pub const fn detail(
        name: &'static str,
        value_type: ValueType,
        aliases: &'static [&'static str],
    ) -> Self {
        Self::new(name, TargetEntity::Detail, value_type, aliases)
    }

    pub const fn raw(
        name: &'static str,
        value_type: ValueType,
        aliases: &'static [&'static str],
    ) -> Self {
        Self::new(name, TargetEntity::RawData, value_type, aliases)
    }

    /// Mark this field as the natural key.
    pub const fn identifier(self) -> Self {
        Self {
            is_identifier: true,
            ..self
        }
    }

    pub const fn with_boolean_overrides(
        self,
        truthy: &'static [&'static str],
        falsy: &'static [&'static str],
    ) -> Self {
        Self {
            boolean_overrides: Some(BooleanOverrides { truthy, falsy }),
            ..self
        }
    }
}

// ---------------------------------------------------------------------------
// Key folding
// ---------------------------------------------------------------------------

/// Fold an external key for lookup: trim, lowercase, and collapse runs of
/// whitespace, `_`, `-` and `.` into a single `_`.
///
/// `"Property Name"`, `"property_name"` and `" PROPERTY-NAME "` all fold to
/// `"property_name"`.
pub fn fold_key(key: &str) -> String {
    let lowered = key.trim().to_lowercase();
    KEY_SEPARATOR_RE
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Whether `name` is safe to interpolate as an unquoted SQL identifier.
pub fn is_sql_identifier(name: &str) -> bool {
    SQL_IDENTIFIER_RE.is_match(name)
}

// ---------------------------------------------------------------------------
// FieldDictionary
// ---------------------------------------------------------------------------

/// Bidirectional mapping between external keys and canonical fields.
#[derive(Debug)]
pub struct FieldDictionary {
    name: &'static str,
    fields: Vec<FieldSpec>,
    by_name: HashMap<&'static str, usize>,
    by_alias: HashMap<String, usize>,
    identifier: usize,
}

impl FieldDictionary {
    /// Build and validate a dictionary.
    ///
    /// Fails if there is not exactly one identifier, if the identifier is
    /// not a primary string field, if a canonical name is not a valid SQL
    /// identifier or collides with a reserved column, or if two fields
    /// claim the same folded alias.
    pub fn new(name: &'static str, specs: &[FieldSpec]) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidDictionary {
            dictionary: name,
            reason,
        };

        let mut by_name = HashMap::with_capacity(specs.len());
        let mut by_alias: HashMap<String, usize> = HashMap::new();
        let mut identifier = None;

        for (idx, spec) in specs.iter().enumerate() {
            if !is_sql_identifier(spec.name) {
                return Err(invalid(format!(
                    "canonical name '{}' is not a valid column name",
                    spec.name
                )));
            }
            if RESERVED_COLUMNS.contains(&spec.name) {
                return Err(invalid(format!(
                    "canonical name '{}' is reserved",
                    spec.name
                )));
            }
            if by_name.insert(spec.name, idx).is_some() {
                return Err(invalid(format!("field '{}' declared twice", spec.name)));
            }

            if spec.is_identifier {
                if identifier.is_some() {
                    return Err(invalid("more than one identifier field".to_string()));
                }
                if spec.target != TargetEntity::Primary || spec.value_type != ValueType::String {
                    return Err(invalid(format!(
                        "identifier '{}' must be a primary string field",
                        spec.name
                    )));
                }
                identifier = Some(idx);
            }

            for alias in std::iter::once(&spec.name).chain(spec.aliases.iter()) {
                let folded = fold_key(alias);
                if let Some(&owner) = by_alias.get(&folded) {
                    if owner != idx {
                        return Err(invalid(format!(
                            "alias '{alias}' claimed by both '{}' and '{}'",
                            specs[owner].name, spec.name
                        )));
                    }
                    continue;
                }
                by_alias.insert(folded, idx);
            }
        }

        let identifier = identifier.ok_or_else(|| invalid("no identifier field".to_string()))?;

        Ok(Self {
            name,
            fields: specs.to_vec(),
            by_name,
            by_alias,
            identifier,
        })
    }

    /// Dictionary name, used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolve an external key to its canonical field, or `None` if the key
    /// is unrecognised.
    pub fn resolve(&self, external_key: &str) -> Option<&FieldSpec> {
        self.by_alias
            .get(&fold_key(external_key))
            .map(|&idx| &self.fields[idx])
    }

    pub fn target_entity(&self, canonical: &str) -> Option<TargetEntity> {
        self.field(canonical).map(|f| f.target)
    }

    pub fn value_type(&self, canonical: &str) -> Option<ValueType> {
        self.field(canonical).map(|f| f.value_type)
    }

    /// The natural-key field.
    pub fn identifier(&self) -> &FieldSpec {
        &self.fields[self.identifier]
    }

    pub fn field(&self, canonical: &str) -> Option<&FieldSpec> {
        self.by_name.get(canonical).map(|&idx| &self.fields[idx])
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Canonical names routed to `target`, in declaration order.
    pub fn columns(&self, target: TargetEntity) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.target == target)
            .map(|f| f.name)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[FieldSpec] = &[
        FieldSpec::primary("external_id", ValueType::String, &["Record Id", "id"]).identifier(),
        FieldSpec::primary("name", ValueType::String, &["Property Name", "Name"]),
        FieldSpec::detail("has_pool", ValueType::Boolean, &["Pool"]),
        FieldSpec::detail("has_den", ValueType::Boolean, &["Den"])
            .with_boolean_overrides(&["den"], &["no den"]),
        FieldSpec::raw("approval_state", ValueType::String, &["Approval State"]),
    ];

    fn dictionary() -> FieldDictionary {
        FieldDictionary::new("test", SPECS).unwrap()
    }

    // -- fold_key tests -------------------------------------------------------

    #[test]
    fn fold_key_collapses_separators() {
        assert_eq!(fold_key("Property Name"), "property_name");
        assert_eq!(fold_key(" PROPERTY-NAME "), "property_name");
        assert_eq!(fold_key("property__name"), "property_name");
        assert_eq!(fold_key("Zip.Code"), "zip_code");
    }

    #[test]
    fn fold_key_trims_edge_separators() {
        assert_eq!(fold_key("_id_"), "id");
    }

    // -- resolve tests --------------------------------------------------------

    #[test]
    fn resolves_aliases_case_insensitively() {
        let dict = dictionary();
        assert_eq!(dict.resolve("record id").unwrap().name, "external_id");
        assert_eq!(dict.resolve("RECORD_ID").unwrap().name, "external_id");
        assert_eq!(dict.resolve("Name").unwrap().name, "name");
    }

    #[test]
    fn canonical_name_is_an_alias() {
        let dict = dictionary();
        assert_eq!(dict.resolve("has_pool").unwrap().name, "has_pool");
    }

    #[test]
    fn unknown_key_is_unrecognised() {
        assert!(dictionary().resolve("Favourite Colour").is_none());
    }

    #[test]
    fn classification_queries() {
        let dict = dictionary();
        assert_eq!(dict.target_entity("has_pool"), Some(TargetEntity::Detail));
        assert_eq!(dict.value_type("has_pool"), Some(ValueType::Boolean));
        assert_eq!(dict.target_entity("approval_state"), Some(TargetEntity::RawData));
        assert_eq!(dict.target_entity("nope"), None);
        assert_eq!(dict.identifier().name, "external_id");
    }

    #[test]
    fn columns_by_target() {
        let dict = dictionary();
        assert_eq!(dict.columns(TargetEntity::Primary), vec!["external_id", "name"]);
        assert_eq!(dict.columns(TargetEntity::Detail), vec!["has_pool", "has_den"]);
    }

    // -- validation tests -----------------------------------------------------

    #[test]
    fn rejects_missing_identifier() {
        let specs = [FieldSpec::primary("name", ValueType::String, &[])];
        let err = FieldDictionary::new("bad", &specs).unwrap_err();
        assert!(err.to_string().contains("no identifier"));
    }

    #[test]
    fn rejects_two_identifiers() {
        let specs = [
            FieldSpec::primary("a", ValueType::String, &[]).identifier(),
            FieldSpec::primary("b", ValueType::String, &[]).identifier(),
        ];
        assert!(FieldDictionary::new("bad", &specs).is_err());
    }

    #[test]
    fn rejects_detail_identifier() {
        let specs = [FieldSpec::detail("a", ValueType::String, &[]).identifier()];
        assert!(FieldDictionary::new("bad", &specs).is_err());
    }

    #[test]
    fn rejects_alias_collision() {
        let specs = [
            FieldSpec::primary("external_id", ValueType::String, &["id"]).identifier(),
            FieldSpec::primary("name", ValueType::String, &["Title"]),
            FieldSpec::detail("title", ValueType::String, &[]),
        ];
        let err = FieldDictionary::new("bad", &specs).unwrap_err();
        assert!(err.to_string().contains("claimed by both"));
    }

    #[test]
    fn rejects_reserved_column() {
        let specs = [
            FieldSpec::primary("external_id", ValueType::String, &[]).identifier(),
            FieldSpec::detail("raw_data", ValueType::Json, &[]),
        ];
        assert!(FieldDictionary::new("bad", &specs).is_err());
    }

    #[test]
    fn rejects_invalid_column_name() {
        let specs = [FieldSpec::primary("External Id", ValueType::String, &[]).identifier()];
        assert!(FieldDictionary::new("bad", &specs).is_err());
    }

    #[test]
    fn boolean_overrides_are_attached() {
        let dict = dictionary();
        let den = dict.field("has_den").unwrap();
        assert_eq!(den.boolean_overrides.unwrap().falsy, &["no den"]);
        assert!(dict.field("has_pool").unwrap().boolean_overrides.is_none());
    }

    #[test]
    fn value_type_all_has_eight_entries() {
        assert_eq!(ValueType::ALL.len(), 8);
    }
}
