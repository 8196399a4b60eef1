//! Record normalizer: external record to typed canonical record.
//!
//! Coercion is total. Every recognised field produces either a value of its
//! declared [`ValueType`] or [`FieldValue::Null`]; nothing here returns an
//! error or drops a key. Unrecognised keys are carried through verbatim so
//! the splitter can fold them into the detail `raw_data` bag.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;

use crate::field_dictionary::{BooleanOverrides, FieldDictionary, FieldSpec, ValueType};
use crate::reference::ReferenceObject;
use crate::types::{ExternalRecord, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Tokens (after trim + lowercase) that coerce to `true`.
pub const TRUE_TOKENS: &[&str] = &["true", "yes", "1"];

/// Tokens (after trim + lowercase) that coerce to `false`.
pub const FALSE_TOKENS: &[&str] = &["false", "no", "0"];

/// Separators accepted between string-array elements.
pub const ARRAY_SEPARATORS: &[char] = &[',', ';', '|'];

/// Characters stripped from numeric input before parsing.
const CURRENCY_SYMBOLS: &[char] = &['$', '£', '€'];

/// Date-time layouts without offset, tried in order and read as UTC.
const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

/// Date-time layouts carrying an explicit offset.
const OFFSET_DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%z"];

/// Date-only layouts, read as midnight UTC.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

static THOUSANDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A coerced canonical value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    DateTime(Timestamp),
    Json(Value),
    StringArray(Vec<String>),
    Text(String),
    Opaque(Value),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// JSON representation as written to the store. Date-times serialise as
    /// RFC 3339 strings.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::DateTime(ts) => Value::String(ts.to_rfc3339()),
            Self::Json(v) | Self::Opaque(v) => v.clone(),
            Self::StringArray(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    /// Canonical field name to coerced value.
    pub fields: BTreeMap<&'static str, FieldValue>,
    /// External keys the dictionary does not recognise, plus aliases shadowed
    /// by an earlier spelling of the same field, with their original values.
    pub unrecognized: ExternalRecord,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize one external record against `dictionary`.
///
/// When two keys resolve to the same canonical field, the first non-null
/// coerced value wins and the other key/value pair is moved, unchanged, into
/// [`NormalizedRecord::unrecognized`].
pub fn normalize(dictionary: &FieldDictionary, record: &ExternalRecord) -> NormalizedRecord {
    let mut out = NormalizedRecord::default();
    let mut origin: HashMap<&'static str, &str> = HashMap::new();

    for (key, value) in record {
        let Some(spec) = dictionary.resolve(key) else {
            out.unrecognized.insert(key.clone(), value.clone());
            continue;
        };

        let coerced = coerce(spec, value);
        match out.fields.get(spec.name) {
            None => {}
            Some(existing) if !existing.is_null() || coerced.is_null() => {
                out.unrecognized.insert(key.clone(), value.clone());
                continue;
            }
            Some(_) => {
                // A null from an earlier alias gives way to this value.
                if let Some(prev_key) = origin.get(spec.name) {
                    if let Some(prev_value) = record.get(*prev_key) {
                        out.unrecognized
                            .insert((*prev_key).to_string(), prev_value.clone());
                    }
                }
            }
        }
        origin.insert(spec.name, key.as_str());
        out.fields.insert(spec.name, coerced);
    }

    out
}

/// Coerce a single raw value according to `spec`.
pub fn coerce(spec: &FieldSpec, value: &Value) -> FieldValue {
    match spec.value_type {
        ValueType::Boolean => coerce_boolean(value, spec.boolean_overrides.as_ref()),
        ValueType::Integer => coerce_integer(value),
        ValueType::Float => coerce_float(value),
        ValueType::DateTime => coerce_date_time(value),
        ValueType::Json => coerce_json(value),
        ValueType::StringArray => coerce_string_array(value),
        ValueType::String => coerce_string(value),
        ValueType::Opaque => match value {
            Value::Null => FieldValue::Null,
            other => FieldValue::Opaque(other.clone()),
        },
    }
}

// ---------------------------------------------------------------------------
// Per-type coercion
// ---------------------------------------------------------------------------

/// Empty or `n/a`, the null tokens shared by every typed kind.
pub fn is_semantic_null(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || t.eq_ignore_ascii_case("n/a")
}

/// Semantic nulls plus the literal `null` / `none` words, for kinds where
/// those can never be a real value.
fn is_null_word(s: &str) -> bool {
    let t = s.trim();
    is_semantic_null(t) || t.eq_ignore_ascii_case("null") || t.eq_ignore_ascii_case("none")
}

pub fn coerce_boolean(value: &Value, overrides: Option<&BooleanOverrides>) -> FieldValue {
    match value {
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => FieldValue::Bool(true),
            Some(0) => FieldValue::Bool(false),
            _ => FieldValue::Null,
        },
        Value::String(s) => {
            let token = s.trim().to_lowercase();
            if let Some(o) = overrides {
                if o.truthy.contains(&token.as_str()) {
                    return FieldValue::Bool(true);
                }
                if o.falsy.contains(&token.as_str()) {
                    return FieldValue::Bool(false);
                }
            }
            if TRUE_TOKENS.contains(&token.as_str()) {
                FieldValue::Bool(true)
            } else if FALSE_TOKENS.contains(&token.as_str()) {
                FieldValue::Bool(false)
            } else {
                FieldValue::Null
            }
        }
        _ => FieldValue::Null,
    }
}

/// Strip currency symbols, inner spaces and thousands separators.
/// Returns `None` for null tokens.
fn clean_numeric(s: &str) -> Option<String> {
    if is_null_word(s) {
        return None;
    }
    let stripped: String = s
        .trim()
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && !c.is_whitespace())
        .collect();
    if THOUSANDS_RE.is_match(&stripped) {
        Some(stripped.replace(',', ""))
    } else {
        Some(stripped)
    }
}

/// Convert a float to `i64` only when it is finite, integral and in range.
fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

pub fn coerce_integer(value: &Value) -> FieldValue {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => clean_numeric(s).and_then(|c| {
            c.parse::<i64>()
                .ok()
                .or_else(|| c.parse::<f64>().ok().and_then(integral))
        }),
        _ => None,
    };
    parsed.map_or(FieldValue::Null, FieldValue::Integer)
}

pub fn coerce_float(value: &Value) -> FieldValue {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => clean_numeric(s).and_then(|c| c.parse::<f64>().ok()),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => FieldValue::Float(f),
        _ => FieldValue::Null,
    }
}

pub fn coerce_date_time(value: &Value) -> FieldValue {
    match value {
        Value::String(s) => parse_date_time(s).map_or(FieldValue::Null, FieldValue::DateTime),
        _ => FieldValue::Null,
    }
}

/// Parse an ISO-8601 or common calendar representation. Values without an
/// offset are taken as UTC; date-only values as midnight UTC.
pub fn parse_date_time(s: &str) -> Option<Timestamp> {
    if is_null_word(s) {
        return None;
    }
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_DATE_TIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Structured values pass through. A string is parsed as JSON; if that
/// yields an object or array it is used, otherwise the string is treated as
/// a bare record ID and wrapped with [`ReferenceObject::from_legacy_id`].
pub fn coerce_json(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Object(_) | Value::Array(_) => FieldValue::Json(value.clone()),
        Value::String(s) => {
            if is_null_word(s) {
                return FieldValue::Null;
            }
            match serde_json::from_str::<Value>(s.trim()) {
                Ok(parsed @ (Value::Object(_) | Value::Array(_))) => FieldValue::Json(parsed),
                _ => FieldValue::Json(ReferenceObject::from_legacy_id(s.trim()).to_json()),
            }
        }
        Value::Number(n) => {
            FieldValue::Json(ReferenceObject::from_legacy_id(n.to_string()).to_json())
        }
        Value::Bool(_) => FieldValue::Null,
    }
}

pub fn coerce_string_array(value: &Value) -> FieldValue {
    let items = match value {
        Value::String(s) if !is_semantic_null(s) => s
            .split(ARRAY_SEPARATORS)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(elements) => elements
            .iter()
            .filter_map(|e| match e {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    FieldValue::StringArray(items)
}

/// Strings pass through unchanged, empty strings included. Scalars are
/// rendered as text; nested JSON as its compact encoding.
pub fn coerce_string(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::String(s) => FieldValue::Text(s.clone()),
        Value::Number(n) => FieldValue::Text(n.to_string()),
        Value::Bool(b) => FieldValue::Text(b.to_string()),
        other => FieldValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::json;

    const SPECS: &[FieldSpec] = &[
        FieldSpec::primary("external_id", ValueType::String, &["Record Id", "id"]).identifier(),
        FieldSpec::primary("name", ValueType::String, &["Name", "Property Name"]),
        FieldSpec::primary("bedrooms", ValueType::Integer, &["Beds"]),
        FieldSpec::detail("has_pool", ValueType::Boolean, &[]),
        FieldSpec::detail("has_den", ValueType::Boolean, &["Den"])
            .with_boolean_overrides(&["den"], &["no den"]),
    ];

    fn dict() -> FieldDictionary {
        FieldDictionary::new("test", SPECS).unwrap()
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    // -- boolean tests --------------------------------------------------------

    #[test]
    fn boolean_tokens() {
        for t in ["true", " Yes ", "1", "TRUE"] {
            assert_eq!(coerce_boolean(&s(t), None), FieldValue::Bool(true), "{t}");
        }
        for t in ["false", "No", " 0", "FALSE"] {
            assert_eq!(coerce_boolean(&s(t), None), FieldValue::Bool(false), "{t}");
        }
    }

    #[test]
    fn boolean_nulls() {
        for t in ["", "n/a", "N/A", "bogus", "maybe"] {
            assert_eq!(coerce_boolean(&s(t), None), FieldValue::Null, "{t}");
        }
        assert_eq!(coerce_boolean(&json!(2), None), FieldValue::Null);
        assert_eq!(coerce_boolean(&Value::Null, None), FieldValue::Null);
    }

    #[test]
    fn boolean_native_values() {
        assert_eq!(coerce_boolean(&json!(true), None), FieldValue::Bool(true));
        assert_eq!(coerce_boolean(&json!(0), None), FieldValue::Bool(false));
    }

    #[test]
    fn boolean_field_override_applies_only_to_that_field() {
        let overrides = BooleanOverrides {
            truthy: &["den"],
            falsy: &["no den"],
        };
        assert_eq!(
            coerce_boolean(&s("No Den"), Some(&overrides)),
            FieldValue::Bool(false)
        );
        assert_eq!(coerce_boolean(&s("no den"), None), FieldValue::Null);
    }

    // -- numeric tests --------------------------------------------------------

    #[test]
    fn integer_parsing() {
        assert_eq!(coerce_integer(&s(" 3 ")), FieldValue::Integer(3));
        assert_eq!(coerce_integer(&s("3.0")), FieldValue::Integer(3));
        assert_eq!(coerce_integer(&s("1,200")), FieldValue::Integer(1200));
        assert_eq!(coerce_integer(&json!(7)), FieldValue::Integer(7));
        assert_eq!(coerce_integer(&json!(7.0)), FieldValue::Integer(7));
    }

    #[test]
    fn integer_failures_are_null() {
        for t in ["", "n/a", "N/A", "2.5", "three", "1,20", "null"] {
            assert_eq!(coerce_integer(&s(t)), FieldValue::Null, "{t}");
        }
        assert_eq!(coerce_integer(&json!(true)), FieldValue::Null);
    }

    #[test]
    fn float_parsing() {
        assert_eq!(coerce_float(&s("$1,250.50")), FieldValue::Float(1250.5));
        assert_eq!(coerce_float(&s("€ 900")), FieldValue::Float(900.0));
        assert_eq!(coerce_float(&s("-0.25")), FieldValue::Float(-0.25));
        assert_eq!(coerce_float(&json!(2.5)), FieldValue::Float(2.5));
    }

    #[test]
    fn float_failures_are_null() {
        for t in ["", "n/a", "NaN", "inf", "abc", "1.2.3"] {
            assert_eq!(coerce_float(&s(t)), FieldValue::Null, "{t}");
        }
    }

    // -- date tests -----------------------------------------------------------

    #[test]
    fn date_time_formats() {
        let cases = [
            "2024-03-05T10:30:00Z",
            "2024-03-05T10:30:00+00:00",
            "2024-03-05T10:30:00",
            "2024-03-05 10:30:00",
            "2024-03-05",
            "03/05/2024",
            "05-Mar-2024",
            "Mar 05, 2024",
            "5 March 2024",
        ];
        for c in cases {
            let FieldValue::DateTime(ts) = coerce_date_time(&s(c)) else {
                panic!("expected date for {c}");
            };
            assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 3, 5), "{c}");
        }
    }

    #[test]
    fn offset_is_normalised_to_utc() {
        let FieldValue::DateTime(ts) = coerce_date_time(&s("2024-03-05T23:30:00-02:00")) else {
            panic!("expected date");
        };
        assert_eq!(ts.to_rfc3339(), "2024-03-06T01:30:00+00:00");
    }

    #[test]
    fn unparsable_dates_are_null() {
        for c in ["", "n/a", "yesterday", "2024-13-45", "31/31/2024"] {
            assert_eq!(coerce_date_time(&s(c)), FieldValue::Null, "{c}");
        }
        assert_eq!(coerce_date_time(&json!(1_700_000_000)), FieldValue::Null);
    }

    // -- json tests -----------------------------------------------------------

    #[test]
    fn json_object_passes_through() {
        let v = json!({ "id": "1", "name": "Ada" });
        assert_eq!(coerce_json(&v), FieldValue::Json(v.clone()));
        assert_eq!(
            coerce_json(&s(r#"{"id":"1","name":"Ada"}"#)),
            FieldValue::Json(v)
        );
    }

    #[test]
    fn json_bare_id_becomes_reference() {
        let expected = json!({ "id": "4876876000000123456", "name": "", "email": "" });
        assert_eq!(
            coerce_json(&s("4876876000000123456")),
            FieldValue::Json(expected.clone())
        );
        assert_eq!(
            coerce_json(&s("B-17")),
            FieldValue::Json(json!({ "id": "B-17", "name": "", "email": "" }))
        );
        assert_eq!(
            coerce_json(&json!(42)),
            FieldValue::Json(json!({ "id": "42", "name": "", "email": "" }))
        );
    }

    #[test]
    fn json_scalar_strings_are_bare_ids() {
        for t in ["123", "12.5", "true"] {
            assert_eq!(
                coerce_json(&s(t)),
                FieldValue::Json(json!({ "id": t, "name": "", "email": "" })),
                "{t}"
            );
        }
    }

    #[test]
    fn json_nulls() {
        for t in ["", "n/a", "null"] {
            assert_eq!(coerce_json(&s(t)), FieldValue::Null, "{t}");
        }
    }

    // -- string array tests ---------------------------------------------------

    #[test]
    fn string_array_splits_on_all_separators() {
        assert_eq!(
            coerce_string_array(&s("water, heat;gas | | internet")),
            FieldValue::StringArray(vec![
                "water".into(),
                "heat".into(),
                "gas".into(),
                "internet".into()
            ])
        );
    }

    #[test]
    fn string_array_degenerate_inputs_are_empty() {
        for v in [s(""), s("n/a"), s(" , ; "), json!(5), Value::Null] {
            assert_eq!(coerce_string_array(&v), FieldValue::StringArray(vec![]));
        }
    }

    #[test]
    fn string_array_from_json_array() {
        assert_eq!(
            coerce_string_array(&json!(["a", " b ", 3, null, ""])),
            FieldValue::StringArray(vec!["a".into(), "b".into(), "3".into()])
        );
    }

    // -- string / opaque tests ------------------------------------------------

    #[test]
    fn string_preserves_empty() {
        assert_eq!(coerce_string(&s("")), FieldValue::Text(String::new()));
        assert_eq!(coerce_string(&s(" n/a ")), FieldValue::Text(" n/a ".into()));
        assert_eq!(coerce_string(&json!(12)), FieldValue::Text("12".into()));
    }

    #[test]
    fn opaque_passes_through() {
        let spec = FieldSpec::detail("layout", ValueType::Opaque, &[]);
        assert_eq!(coerce(&spec, &json!(12)), FieldValue::Opaque(json!(12)));
        assert_eq!(coerce(&spec, &Value::Null), FieldValue::Null);
    }

    // -- totality -------------------------------------------------------------

    #[test]
    fn coercion_is_total_for_all_types() {
        let inputs = [
            "", " ", "n/a", "null", "yes", "0", "-1", "1e400", "∞", "{", "[1,", "💥",
            "2024-02-30", ",,,", "\u{0}", "9999999999999999999999",
        ];
        for vt in ValueType::ALL {
            let spec = FieldSpec::detail("f", *vt, &[]);
            for input in inputs {
                let out = coerce(&spec, &s(input));
                match (vt, &out) {
                    (ValueType::StringArray, FieldValue::StringArray(_)) => {}
                    (ValueType::StringArray, other) => panic!("{vt}: {other:?}"),
                    _ => {}
                }
            }
        }
    }

    // -- normalize tests ------------------------------------------------------

    #[test]
    fn normalize_resolves_and_coerces() {
        let record = json!({ "id": "A1", "Name": "X", "has_pool": "Yes", "Beds": "2" });
        let out = normalize(&dict(), record.as_object().unwrap());
        assert_eq!(out.fields["external_id"], FieldValue::Text("A1".into()));
        assert_eq!(out.fields["name"], FieldValue::Text("X".into()));
        assert_eq!(out.fields["has_pool"], FieldValue::Bool(true));
        assert_eq!(out.fields["bedrooms"], FieldValue::Integer(2));
        assert!(out.unrecognized.is_empty());
    }

    #[test]
    fn normalize_keeps_unparsable_fields_as_null() {
        let record = json!({ "id": "A2", "has_pool": "bogus", "Beds": "many" });
        let out = normalize(&dict(), record.as_object().unwrap());
        assert_eq!(out.fields["has_pool"], FieldValue::Null);
        assert_eq!(out.fields["bedrooms"], FieldValue::Null);
    }

    #[test]
    fn normalize_carries_unknown_keys_verbatim() {
        let record = json!({ "id": "A3", "Favourite Colour": "teal", "Score": 9 });
        let out = normalize(&dict(), record.as_object().unwrap());
        assert_eq!(out.unrecognized["Favourite Colour"], json!("teal"));
        assert_eq!(out.unrecognized["Score"], json!(9));
    }

    #[test]
    fn shadowed_alias_moves_to_unrecognized() {
        let record = json!({ "Name": "First", "Property Name": "Second", "id": "A4" });
        let out = normalize(&dict(), record.as_object().unwrap());
        // Map iteration is key-ordered: "Name" < "Property Name".
        assert_eq!(out.fields["name"], FieldValue::Text("First".into()));
        assert_eq!(out.unrecognized["Property Name"], json!("Second"));
    }

    #[test]
    fn non_null_alias_replaces_earlier_null() {
        let record = json!({ "Beds": "n/a", "bedrooms": "4", "id": "A5" });
        let out = normalize(&dict(), record.as_object().unwrap());
        assert_eq!(out.fields["bedrooms"], FieldValue::Integer(4));
        assert_eq!(out.unrecognized["Beds"], json!("n/a"));
    }

    #[test]
    fn field_value_to_json() {
        assert_eq!(FieldValue::Float(f64::NAN).to_json(), Value::Null);
        assert_eq!(
            FieldValue::StringArray(vec!["a".into()]).to_json(),
            json!(["a"])
        );
        assert_eq!(FieldValue::Integer(5).to_json(), json!(5));
    }
}
