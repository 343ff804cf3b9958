use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::meta::Metadata;
use crate::outcome::Outcome;

/// Finish time of a terminal event.
///
/// `go test -json` emits RFC 3339 strings; numeric epoch values are accepted
/// too and kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    Seconds(serde_json::Number),
    Stamp(String),
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(value) => write!(f, "{value}"),
            Self::Stamp(value) => f.write_str(value),
        }
    }
}

/// One folded test identifier: merged output, resolved outcome, finish time
/// and metadata.
///
/// The full name is the key of the map the record lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<EventTime>,
    #[serde(
        default,
        deserialize_with = "nullable_metadata",
        skip_serializing_if = "Metadata::is_empty"
    )]
    pub meta: Metadata,
}

impl TestRecord {
    /// Record for `full_name` with the given outcome and nothing else.
    #[must_use]
    pub fn with_outcome(full_name: &str, outcome: Outcome) -> Self {
        Self {
            path: crate::path::display_path(full_name),
            outcome,
            ..Self::default()
        }
    }

    /// Last display segment, used as the short test name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

fn nullable_metadata<'de, D>(deserializer: D) -> Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Metadata>::deserialize(deserializer)?.unwrap_or_default())
}
