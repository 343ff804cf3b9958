//! Error type shared by every stage of the rollup pipeline.
//!
//! The pipeline performs no partial recovery: each variant aborts the
//! transformation, load or render call that raised it. Variants carry the
//! offending identifier or raw payload so a failure can be diagnosed from the
//! message alone.

use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, RollupError>;

#[derive(Debug, Error)]
pub enum RollupError {
    /// A raw event line is not valid JSON.
    #[error("failed to parse event line {line}: {payload}: {source}")]
    EventParse {
        line: usize,
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    /// A `--- META:` marker carried a payload that is not a JSON object.
    #[error("malformed metadata marker for test {test:?}: {payload}: {source}")]
    MetadataParse {
        test: String,
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    /// Two metadata payloads for the same path declared the same key.
    #[error("duplicate metadata key {key:?} for test {test:?}")]
    DuplicateMetadataKey { test: String, key: String },

    /// Same `(run, full_name)` inserted twice during one load.
    #[error("duplicate test result {full_name:?} in run {implementation_id}@{version}")]
    DuplicateTestResult {
        implementation_id: String,
        version: String,
        full_name: String,
    },

    /// A matrix cell with no pass, fail or skip recorded.
    #[error("unhandled cell value for test {test:?}: {cell}")]
    UnhandledCellValue { test: String, cell: String },

    /// Sources disagree on a metadata value while strict mode is on.
    #[error("conflicting metadata key {key:?} for test {test:?} across sources")]
    ConflictingMetadata { test: String, key: String },

    #[error("aggregation depth must be at least 1, got {0}")]
    InvalidDepth(usize),

    /// A persisted run input (or another structured document) did not
    /// match its expected shape.
    #[error("invalid input {context}: {source}")]
    InputParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("invalid configuration {path}: {detail}")]
    Config { path: String, detail: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RollupError {
    /// Stable snake_case name of the variant, used as a structured log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EventParse { .. } => "event_parse",
            Self::MetadataParse { .. } => "metadata_parse",
            Self::DuplicateMetadataKey { .. } => "duplicate_metadata_key",
            Self::DuplicateTestResult { .. } => "duplicate_test_result",
            Self::UnhandledCellValue { .. } => "unhandled_cell_value",
            Self::ConflictingMetadata { .. } => "conflicting_metadata",
            Self::InvalidDepth(_) => "invalid_depth",
            Self::InputParse { .. } => "input_parse",
            Self::UnknownSource(_) => "unknown_source",
            Self::MissingInput(_) => "missing_input",
            Self::Config { .. } => "config",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }

    pub fn duplicate_metadata_key(test: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateMetadataKey {
            test: test.into(),
            key: key.into(),
        }
    }
}
