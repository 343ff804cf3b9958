//! Test metadata values and the two merge rules applied to them.
//!
//! Metadata maps from the *same* path are merged with [`merge_disjoint`]: an
//! overlapping key is a `DuplicateMetadataKey` error. Maps from *different*
//! path depths are merged with [`merge_override`], applied shallow to deep so
//! the deeper value wins.

use std::collections::BTreeMap;
use std::fmt;

use rollup_error::{Result, RollupError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata attached to a test, keyed by metadata name.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A metadata value.
///
/// The recognized scalar kinds get their own variants; anything else is kept
/// verbatim as opaque JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    StringList(Vec<String>),
    Json(Value),
}

impl MetaValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// String entries of a list value; a single string is a one-item list.
    #[must_use]
    pub fn as_string_list(&self) -> Vec<&str> {
        match self {
            Self::String(value) => vec![value.as_str()],
            Self::StringList(values) => values.iter().map(String::as_str).collect(),
            Self::Json(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Text form of a scalar (strings unquoted), `None` for structured values.
    #[must_use]
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Bool(value) => Some(value.to_string()),
            Self::Number(value) => Some(value.to_string()),
            Self::String(value) => Some(value.clone()),
            Self::StringList(_) | Self::Json(_) => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(*value),
            Self::Number(value) => Value::Number(value.clone()),
            Self::String(value) => Value::String(value.clone()),
            Self::StringList(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
            Self::Json(value) => value.clone(),
        }
    }
}

impl From<Value> for MetaValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(value) => Self::Bool(value),
            Value::Number(value) => Self::Number(value),
            Value::String(value) => Self::String(value),
            Value::Array(items) if items.iter().all(Value::is_string) => Self::StringList(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(text) => Some(text),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Self::Json(other),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Merge `incoming` into `target`, failing on the first key present in both.
///
/// `test` names the identifier or path being merged and is only used for the
/// error.
pub fn merge_disjoint(test: &str, target: &mut Metadata, incoming: Metadata) -> Result<()> {
    if let Some(key) = incoming.keys().find(|key| target.contains_key(*key)) {
        return Err(RollupError::duplicate_metadata_key(test, key.clone()));
    }
    target.extend(incoming);
    Ok(())
}

/// Merge `incoming` into `target`; `incoming` wins on overlapping keys.
pub fn merge_override(target: &mut Metadata, incoming: &Metadata) {
    for (key, value) in incoming {
        target.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Metadata {
        serde_json::from_value(value).expect("metadata object")
    }

    #[test]
    fn untagged_decoding_picks_recognized_kinds() {
        let decoded = meta(json!({
            "flag": true,
            "count": 3,
            "group": "Path Gateway",
            "specs": ["specs.ipfs.tech/a", "specs.ipfs.tech/b"],
            "nested": {"x": 1},
            "mixed": [1, "two"],
        }));

        assert_eq!(decoded["flag"], MetaValue::Bool(true));
        assert_eq!(decoded["count"], MetaValue::Number(3.into()));
        assert_eq!(decoded["group"].as_str(), Some("Path Gateway"));
        assert_eq!(
            decoded["specs"].as_string_list(),
            vec!["specs.ipfs.tech/a", "specs.ipfs.tech/b"]
        );
        assert!(matches!(decoded["nested"], MetaValue::Json(_)));
        assert!(matches!(decoded["mixed"], MetaValue::Json(_)));
    }

    #[test]
    fn from_json_matches_serde_decoding() {
        let raw = json!(["a", "b"]);
        let direct = MetaValue::from(raw.clone());
        let decoded: MetaValue = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(direct, decoded);
        assert_eq!(direct.to_json(), raw);
    }

    #[test]
    fn disjoint_merge_rejects_overlap() {
        let mut target = meta(json!({"version": "v1"}));
        let err = merge_disjoint("TestA", &mut target, meta(json!({"version": "v2"})))
            .expect_err("overlap must fail");
        assert!(matches!(
            err,
            RollupError::DuplicateMetadataKey { ref test, ref key } if test == "TestA" && key == "version"
        ));
        assert_eq!(target["version"].as_str(), Some("v1"));
    }

    #[test]
    fn disjoint_merge_accepts_new_keys() {
        let mut target = meta(json!({"version": "v1"}));
        merge_disjoint("TestA", &mut target, meta(json!({"ipip": "0328"}))).expect("merge");
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn override_merge_prefers_incoming() {
        let mut target = meta(json!({"group": "shallow", "keep": 1}));
        merge_override(&mut target, &meta(json!({"group": "deep"})));
        assert_eq!(target["group"].as_str(), Some("deep"));
        assert_eq!(target["keep"], MetaValue::Number(1.into()));
    }

    #[test]
    fn scalar_text_unquotes_strings() {
        assert_eq!(MetaValue::from("v0.1").scalar_text().as_deref(), Some("v0.1"));
        assert_eq!(MetaValue::Bool(false).scalar_text().as_deref(), Some("false"));
        assert_eq!(MetaValue::StringList(vec![]).scalar_text(), None);
    }
}
