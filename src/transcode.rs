//! Helpers shared by the model/SDK transcoders of every entity.
//!
//! Expand functions turn a model into an SDK request; flatten functions turn
//! an SDK response back into a model. Both directions go through these
//! helpers so enum tables, variant checks and empty-collection handling
//! behave the same across entities.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::ProviderError;
use crate::types::TfValue;

/// Result type for transcoding.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// A two-way mapping between schema strings and SDK enum values.
pub type EnumTable<E> = &'static [(&'static str, E)];

/// The schema strings of an enum table, for `one_of` validators.
pub fn enum_names<E>(table: EnumTable<E>) -> Vec<&'static str> {
    table.iter().map(|(name, _)| *name).collect()
}

/// Map a schema string to the SDK enum's wire value.
pub fn enum_to_sdk<E>(table: EnumTable<E>, path: &str, value: &str) -> Result<i32>
where
    E: Copy + Into<i32>,
{
    table
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, e)| (*e).into())
        .ok_or_else(|| {
            ProviderError::Validation(format!(
                "{}: unsupported value \"{}\", expected one of [{}]",
                path,
                value,
                enum_names(table).join(", ")
            ))
        })
}

/// Map an SDK enum wire value back to its schema string.
pub fn enum_from_sdk<E>(table: EnumTable<E>, path: &str, value: i32) -> Result<String>
where
    E: Copy + Into<i32>,
{
    table
        .iter()
        .find(|(_, e)| (*e).into() == value)
        .map(|(name, _)| (*name).to_string())
        .ok_or_else(|| {
            ProviderError::Validation(format!("{}: unexpected value {} from the API", path, value))
        })
}

/// Check that exactly one variant of a set is configured and return its name.
///
/// Zero or several configured variants are both rejected.
pub fn ensure_exactly_one<'a>(path: &str, variants: &[(&'a str, bool)]) -> Result<&'a str> {
    let set: Vec<&str> = variants
        .iter()
        .filter(|(_, is_set)| *is_set)
        .map(|(name, _)| *name)
        .collect();
    match set.as_slice() {
        [one] => Ok(*one),
        [] => Err(ProviderError::Validation(format!(
            "{}: exactly one of [{}] must be set, got none",
            path,
            names(variants)
        ))),
        many => Err(ProviderError::Validation(format!(
            "{}: exactly one of [{}] must be set, got [{}]",
            path,
            names(variants),
            many.join(", ")
        ))),
    }
}

/// Pick the one configured variant out of a set of optional variants.
///
/// Fails the same way as [`ensure_exactly_one`] when zero or several are set.
pub fn select_variant<T>(path: &str, variants: Vec<(&'static str, Option<T>)>) -> Result<T> {
    let flags: Vec<(&'static str, bool)> = variants
        .iter()
        .map(|(name, variant)| (*name, variant.is_some()))
        .collect();
    ensure_exactly_one(path, &flags)?;
    variants
        .into_iter()
        .find_map(|(_, variant)| variant)
        .ok_or_else(|| ProviderError::Validation(format!("{}: no variant is set", path)))
}

fn names(variants: &[(&str, bool)]) -> String {
    variants
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A required value; null or unknown at apply time is an error.
pub fn required<T: Clone>(path: &str, value: &TfValue<T>) -> Result<T> {
    match value {
        TfValue::Known(v) => Ok(v.clone()),
        TfValue::Null => Err(ProviderError::Validation(format!("{}: value is required", path))),
        TfValue::Unknown => Err(ProviderError::Validation(format!(
            "{}: value is still unknown at apply time",
            path
        ))),
    }
}

/// An optional SDK field from a model value.
pub fn optional<T: Clone>(value: &TfValue<T>) -> Option<T> {
    value.as_known().cloned()
}

/// Expand a string set into an SDK list. Null becomes an empty list.
pub fn expand_set(value: &TfValue<BTreeSet<String>>) -> Vec<String> {
    value
        .as_known()
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default()
}

/// Flatten an SDK list into a string set. An empty list becomes null.
pub fn flatten_set<I>(values: I) -> TfValue<BTreeSet<String>>
where
    I: IntoIterator<Item = String>,
{
    let set: BTreeSet<String> = values.into_iter().collect();
    if set.is_empty() {
        TfValue::Null
    } else {
        TfValue::Known(set)
    }
}

/// Expand an ordered string list. Null becomes an empty list.
pub fn expand_list(value: &TfValue<Vec<String>>) -> Vec<String> {
    value.value_or_default()
}

/// Flatten an SDK list into an ordered string list. An empty list becomes null.
pub fn flatten_list(values: Vec<String>) -> TfValue<Vec<String>> {
    if values.is_empty() {
        TfValue::Null
    } else {
        TfValue::Known(values)
    }
}

/// Expand a map into the SDK's `HashMap`. Null becomes an empty map.
pub fn expand_map<V: Clone>(value: &TfValue<BTreeMap<String, V>>) -> HashMap<String, V> {
    value
        .as_known()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// Flatten an SDK map. An empty map becomes null.
pub fn flatten_map<V>(values: HashMap<String, V>) -> TfValue<BTreeMap<String, V>> {
    if values.is_empty() {
        TfValue::Null
    } else {
        TfValue::Known(values.into_iter().collect())
    }
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.values().all(|v| v.is_null() || is_empty_value(v)),
        _ => false,
    }
}

/// Put back empty values the configuration spelled out but the API dropped.
///
/// The API does not tell an empty string, collection or block apart from an
/// unset one, so flattening yields null. Where `configured` holds an empty
/// value at the same path and `state` holds null, `state` takes the
/// configured value. Blocks and lists of blocks are walked pairwise.
pub fn keep_configured_empties(state: &mut serde_json::Value, configured: &serde_json::Value) {
    use serde_json::Value;
    if state.is_null() {
        if !configured.is_null() && is_empty_value(configured) {
            *state = configured.clone();
        }
        return;
    }
    match (state, configured) {
        (Value::Object(fields), Value::Object(configured)) => {
            for (name, value) in fields.iter_mut() {
                if let Some(configured) = configured.get(name) {
                    keep_configured_empties(value, configured);
                }
            }
        },
        (Value::Array(items), Value::Array(configured)) if items.len() == configured.len() => {
            for (item, configured) in items.iter_mut().zip(configured) {
                keep_configured_empties(item, configured);
            }
        },
        _ => {},
    }
}

/// Narrow a model integer to the SDK's field type.
pub fn narrow<T: TryFrom<i64>>(path: &str, value: i64) -> Result<T> {
    T::try_from(value)
        .map_err(|_| ProviderError::Validation(format!("{}: value {} is out of range", path, value)))
}

/// A message field the API must always fill in.
pub fn response_field<T>(rpc: &str, field: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| ProviderError::Rpc {
        rpc: rpc.to_string(),
        code: tonic::Code::Internal,
        message: format!("response is missing {}", field),
        request: String::new(),
    })
}

const SECONDS_PREFIX: &str = "seconds:";

/// Parse a duration token of the form `seconds:<n>`.
pub fn parse_seconds_token(path: &str, token: &str) -> Result<u32> {
    token
        .strip_prefix(SECONDS_PREFIX)
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| {
            ProviderError::Validation(format!(
                "{}: expected a duration of the form \"seconds:<n>\", got \"{}\"",
                path, token
            ))
        })
}

/// Format a number of seconds as a `seconds:<n>` token.
pub fn format_seconds_token(seconds: u32) -> String {
    format!("{}{}", SECONDS_PREFIX, seconds)
}

/// Parse a numeric id kept as a string in the model.
pub fn parse_id<T: std::str::FromStr>(path: &str, id: &str) -> Result<T> {
    id.parse::<T>()
        .map_err(|_| ProviderError::InvalidRequest(format!("{}: invalid id \"{}\"", path, id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Window {
        Five = 0,
        Ten = 1,
    }

    impl From<Window> for i32 {
        fn from(w: Window) -> i32 {
            w as i32
        }
    }

    const WINDOWS: EnumTable<Window> = &[("5_MINUTES", Window::Five), ("10_MINUTES", Window::Ten)];

    #[test]
    fn test_enum_table_both_ways() {
        assert_eq!(enum_to_sdk(WINDOWS, "w", "10_MINUTES").unwrap(), 1);
        assert_eq!(enum_from_sdk(WINDOWS, "w", 0).unwrap(), "5_MINUTES");
        assert_eq!(enum_names(WINDOWS), vec!["5_MINUTES", "10_MINUTES"]);

        let err = enum_to_sdk(WINDOWS, "w", "7_MINUTES").unwrap_err();
        assert!(err.to_string().contains("7_MINUTES"));
        assert!(enum_from_sdk(WINDOWS, "w", 9).is_err());
    }

    #[test]
    fn test_ensure_exactly_one() {
        assert_eq!(
            ensure_exactly_one("type_definition", &[("a", false), ("b", true)]).unwrap(),
            "b"
        );

        let none = ensure_exactly_one("type_definition", &[("a", false), ("b", false)]).unwrap_err();
        assert!(none.to_string().contains("got none"));

        let both = ensure_exactly_one("type_definition", &[("a", true), ("b", true)]).unwrap_err();
        assert!(matches!(both, ProviderError::Validation(_)));
        assert!(both.to_string().contains("got [a, b]"));
    }

    #[test]
    fn test_select_variant() {
        let chosen = select_variant("storage", vec![("s3", None), ("ibm", Some(2))]).unwrap();
        assert_eq!(chosen, 2);

        assert!(select_variant::<i32>("storage", vec![("s3", None), ("ibm", None)]).is_err());
        let both = select_variant("storage", vec![("s3", Some(1)), ("ibm", Some(2))]).unwrap_err();
        assert!(both.to_string().contains("got [s3, ibm]"));
    }

    #[test]
    fn test_narrow() {
        assert_eq!(narrow::<u32>("latency_threshold_ms", 250).unwrap(), 250);
        assert!(narrow::<u32>("latency_threshold_ms", -1).is_err());
    }

    #[test]
    fn test_required_value() {
        assert_eq!(required("name", &TfValue::<String>::known("x")).unwrap(), "x".to_string());
        assert!(required::<String>("name", &TfValue::Null).is_err());
        assert!(required::<String>("name", &TfValue::Unknown).is_err());
    }

    #[test]
    fn test_empty_collections_flatten_to_null() {
        assert!(flatten_set(Vec::new()).is_null());
        assert!(flatten_list(Vec::new()).is_null());
        assert!(flatten_map(HashMap::<String, String>::new()).is_null());

        let set = flatten_set(vec!["b".to_string(), "a".to_string(), "a".to_string()]);
        assert_eq!(expand_set(&set), vec!["a".to_string(), "b".to_string()]);
        assert!(expand_set(&TfValue::Null).is_empty());
    }

    #[test]
    fn test_keep_configured_empties() {
        use serde_json::json;

        let configured = json!({
            "caption": "",
            "permissions": [],
            "labels": {"team": "core"},
            "filter": {"query": null, "names": []},
            "rules": [{"tags": []}, {"tags": ["a"]}],
            "unset": null,
        });
        let mut state = json!({
            "caption": null,
            "permissions": null,
            "labels": null,
            "filter": null,
            "rules": [{"tags": null}, {"tags": ["a"]}],
            "unset": null,
        });
        keep_configured_empties(&mut state, &configured);

        assert_eq!(state["caption"], "");
        assert_eq!(state["permissions"], json!([]));
        assert!(state["labels"].is_null());
        assert_eq!(state["filter"], json!({"query": null, "names": []}));
        assert_eq!(state["rules"], json!([{"tags": []}, {"tags": ["a"]}]));
        assert!(state["unset"].is_null());
    }

    #[test]
    fn test_seconds_token() {
        assert_eq!(parse_seconds_token("duration", "seconds:900").unwrap(), 900);
        assert_eq!(format_seconds_token(900), "seconds:900");
        assert!(parse_seconds_token("duration", "900").is_err());
        assert!(parse_seconds_token("duration", "seconds:abc").is_err());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id::<u32>("id", "42").unwrap(), 42);
        assert!(matches!(
            parse_id::<u32>("id", "x").unwrap_err(),
            ProviderError::InvalidRequest(_)
        ));
    }
}
