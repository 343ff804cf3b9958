//! Pipeline configuration, loaded from an optional TOML file.
//!
//! ```toml
//! depth = 2
//! strict_metadata = true
//! replace_existing_runs = false
//! spec_url_scheme = "https://"
//! ```

use std::path::Path;

use rollup_error::{Result, RollupError};
use serde::{Deserialize, Serialize};

use crate::matrix::MatrixOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollupConfig {
    /// Number of display segments in an aggregate group key.
    pub depth: usize,
    /// Reject conflicting per-test metadata across matrix sources instead of
    /// letting the last source win.
    pub strict_metadata: bool,
    /// Delete a run's rows before re-ingesting it.
    pub replace_existing_runs: bool,
    /// Scheme prepended to spec URLs in matrix labels.
    pub spec_url_scheme: String,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            depth: 1,
            strict_metadata: false,
            replace_existing_runs: false,
            spec_url_scheme: "https://".to_owned(),
        }
    }
}

impl RollupConfig {
    /// Parse and validate a TOML document; `context` names its origin.
    pub fn from_toml_str(context: &str, raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|error| RollupError::Config {
            path: context.to_owned(),
            detail: error.to_string(),
        })?;
        config.validate(context)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&path.display().to_string(), &raw)
    }

    fn validate(&self, context: &str) -> Result<()> {
        if self.depth == 0 {
            return Err(RollupError::Config {
                path: context.to_owned(),
                detail: "depth must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn matrix_options(&self) -> MatrixOptions {
        MatrixOptions {
            strict_metadata: self.strict_metadata,
            spec_url_scheme: self.spec_url_scheme.clone(),
        }
    }
}
