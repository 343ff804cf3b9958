//! Persisted run input: every test record of one run, plus run-level
//! metadata stored under a reserved key.

use std::collections::BTreeMap;

use rollup_error::{Result, RollupError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::{EventTime, TestRecord};

/// Reserved top-level key whose record carries run-level metadata.
pub const RUN_METADATA_KEY: &str = "TestMetadata";

/// Version rendered when a run does not declare one.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Run-level identity extracted from the reserved record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub version: Option<String>,
    pub job_url: Option<String>,
    pub time: Option<EventTime>,
}

impl RunInfo {
    #[must_use]
    pub fn version_or_unknown(&self) -> &str {
        self.version.as_deref().unwrap_or(UNKNOWN_VERSION)
    }

    fn from_record(record: &TestRecord) -> Self {
        Self {
            version: record.meta.get("version").and_then(|v| v.scalar_text()),
            job_url: record.meta.get("job_url").and_then(|v| v.scalar_text()),
            time: record.time.clone(),
        }
    }
}

/// All records of one run, split into test records and the run record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInput {
    pub tests: BTreeMap<String, TestRecord>,
    pub run_record: Option<TestRecord>,
}

impl RunInput {
    /// Split a full-name keyed record map, pulling out the reserved key.
    ///
    /// Records decoded without a `path` get one derived from their key.
    #[must_use]
    pub fn from_records(mut records: BTreeMap<String, TestRecord>) -> Self {
        let run_record = records.remove(RUN_METADATA_KEY);
        for (full_name, record) in &mut records {
            if record.path.is_empty() {
                record.path = crate::path::display_path(full_name);
            }
        }
        Self {
            tests: records,
            run_record,
        }
    }

    /// Decode the JSON document; `context` (usually the file path) is echoed
    /// in errors.
    pub fn from_json_str(context: &str, raw: &str) -> Result<Self> {
        let document: Map<String, Value> =
            serde_json::from_str(raw).map_err(|source| RollupError::InputParse {
                context: context.to_owned(),
                source,
            })?;

        let mut records = BTreeMap::new();
        for (full_name, value) in document {
            let record: TestRecord =
                serde_json::from_value(value).map_err(|source| RollupError::InputParse {
                    context: format!("{context}: {full_name}"),
                    source,
                })?;
            records.insert(full_name, record);
        }
        Ok(Self::from_records(records))
    }

    #[must_use]
    pub fn info(&self) -> RunInfo {
        self.run_record
            .as_ref()
            .map(RunInfo::from_record)
            .unwrap_or_default()
    }

    /// Encode back into the on-disk document shape.
    pub fn to_json_value(&self) -> Result<Value> {
        let mut document = Map::new();
        for (full_name, record) in self.records() {
            document.insert(full_name.to_owned(), serde_json::to_value(record)?);
        }
        Ok(Value::Object(document))
    }

    /// Every record, run record included, ordered by key.
    pub fn records(&self) -> impl Iterator<Item = (&str, &TestRecord)> {
        let mut all: Vec<(&str, &TestRecord)> = self
            .tests
            .iter()
            .map(|(name, record)| (name.as_str(), record))
            .collect();
        if let Some(record) = &self.run_record {
            all.push((RUN_METADATA_KEY, record));
        }
        all.sort_by(|a, b| a.0.cmp(b.0));
        all.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outcome;

    const RUN: &str = r#"{
        "TestMetadata": {
            "path": ["TestMetadata"],
            "output": "",
            "outcome": "pass",
            "time": "2023-06-01T10:00:00Z",
            "meta": {"version": "v0.8.0", "job_url": "https://ci.example/run/1"}
        },
        "a/b": {"outcome": "pass"},
        "a/c": {"outcome": "fail"}
    }"#;

    #[test]
    fn reserved_key_is_split_out() {
        let input = RunInput::from_json_str("run.json", RUN).expect("decode");
        assert_eq!(input.tests.len(), 2);
        assert!(!input.tests.contains_key(RUN_METADATA_KEY));

        let info = input.info();
        assert_eq!(info.version.as_deref(), Some("v0.8.0"));
        assert_eq!(info.job_url.as_deref(), Some("https://ci.example/run/1"));
        assert_eq!(
            info.time,
            Some(EventTime::Stamp("2023-06-01T10:00:00Z".to_owned()))
        );
    }

    #[test]
    fn missing_paths_are_derived_from_keys() {
        let input = RunInput::from_json_str("run.json", RUN).expect("decode");
        assert_eq!(input.tests["a/c"].path, vec!["a", "c"]);
        assert_eq!(input.tests["a/c"].outcome, Outcome::Fail);
    }

    #[test]
    fn run_without_reserved_record_is_unknown_version() {
        let input = RunInput::from_json_str("bare.json", r#"{"x": {"outcome": "skip"}}"#)
            .expect("decode");
        assert_eq!(input.info().version_or_unknown(), UNKNOWN_VERSION);
        assert_eq!(input.info().job_url, None);
    }

    #[test]
    fn bad_record_names_its_key() {
        let err = RunInput::from_json_str("bad.json", r#"{"x": {"outcome": "maybe"}}"#)
            .expect_err("invalid outcome");
        let message = err.to_string();
        assert!(message.contains("bad.json: x"), "{message}");
    }

    #[test]
    fn encode_keeps_reserved_record() {
        let input = RunInput::from_json_str("run.json", RUN).expect("decode");
        let encoded = input.to_json_value().expect("encode");
        assert!(encoded[RUN_METADATA_KEY].is_object());
        assert!(encoded.as_object().is_some_and(|doc| doc.values().all(Value::is_object)));
        let again = RunInput::from_json_str("again", &encoded.to_string()).expect("decode");
        assert_eq!(again, input);
    }
}
