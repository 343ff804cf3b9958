//! Connection ownership, run upsert and transactional run loading.

use std::fmt;
use std::path::Path;

use rusqlite::{Connection, Transaction, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rollup_core::TestTree;
use rollup_error::{Result, RollupError};
use rollup_types::{
    Metadata, Outcome, RunInfo, RunInput, TestRecord, display_path, parent_full_name,
};

use crate::schema;

/// Identity of one persisted run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub implementation_id: String,
    pub version: String,
}

impl RunKey {
    pub fn new(implementation_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            implementation_id: implementation_id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.implementation_id, self.version)
    }
}

/// Counters reported after a run is committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub results: usize,
    /// Ancestors inserted without a record of their own.
    pub synthesized: usize,
    pub metadata: usize,
    pub logs: usize,
}

/// The relational store. Owns its SQLite connection.
#[derive(Debug)]
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::apply(&conn)?;
        debug!(path = %path.display(), "opened rollup store");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::apply(&conn)?;
        Ok(Self { conn })
    }

    /// Create or update a run; `time` and `job_url` are last-write-wins.
    pub fn upsert_run(&self, key: &RunKey, info: &RunInfo) -> Result<()> {
        upsert_run(&self.conn, key, info)
    }

    /// Start loading rows for `key` inside one transaction.
    ///
    /// Nothing is visible to readers until [`RunLoader::commit`]; dropping the
    /// loader rolls everything back.
    pub fn begin_load(&mut self, key: RunKey) -> Result<RunLoader<'_>> {
        let tx = self.conn.transaction()?;
        Ok(RunLoader { tx, key })
    }

    /// Load every record of `input` as run `(implementation_id, version)`.
    ///
    /// The run record is written to `TestRun`, never to `TestResult`.
    /// Ancestors without a record of their own are inserted with no outcome.
    /// With `replace`, rows already stored for the run are deleted first;
    /// without it, reloading a stored test fails with `DuplicateTestResult`.
    pub fn load_run(
        &mut self,
        implementation_id: &str,
        input: &RunInput,
        replace: bool,
    ) -> Result<LoadSummary> {
        let info = input.info();
        let key = RunKey::new(implementation_id, info.version_or_unknown());
        let tree = TestTree::from_full_names(input.tests.keys());

        let loader = self.begin_load(key.clone())?;
        upsert_run(&loader.tx, &key, &info)?;
        if replace {
            let removed = loader.clear()?;
            if removed > 0 {
                info!(run = %key, removed, "replacing stored run");
            }
        }

        let mut summary = LoadSummary::default();
        for id in tree.post_order() {
            let full_name = tree.node(id).full_name.as_str();
            let record = input.tests.get(full_name);
            let outcome = record.map_or(Outcome::Unknown, |record| record.outcome);
            loader.insert_result(full_name, &result_name(full_name, record), outcome)?;
            summary.results += 1;

            let Some(record) = record else {
                summary.synthesized += 1;
                continue;
            };
            summary.metadata += loader.insert_metadata(full_name, &record.meta)?;
            loader.insert_log(full_name, &record.output)?;
            summary.logs += 1;
        }

        loader.commit()?;
        info!(
            run = %key,
            results = summary.results,
            synthesized = summary.synthesized,
            metadata = summary.metadata,
            "loaded run"
        );
        Ok(summary)
    }
}

/// Short name of a result row: the record's last display segment, or the
/// name's own for synthesized ancestors.
fn result_name(full_name: &str, record: Option<&TestRecord>) -> String {
    record
        .and_then(TestRecord::name)
        .map(str::to_owned)
        .or_else(|| display_path(full_name).pop())
        .unwrap_or_default()
}

fn upsert_run(conn: &Connection, key: &RunKey, info: &RunInfo) -> Result<()> {
    conn.execute(
        "INSERT INTO TestRun (implementation_id, version, time, job_url)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (implementation_id, version) DO UPDATE SET
             time = excluded.time,
             job_url = excluded.job_url",
        params![
            key.implementation_id,
            key.version,
            info.time.as_ref().map(ToString::to_string),
            info.job_url,
        ],
    )?;
    Ok(())
}

/// Row writer for one run, wrapping an open transaction.
pub struct RunLoader<'conn> {
    tx: Transaction<'conn>,
    key: RunKey,
}

impl RunLoader<'_> {
    #[must_use]
    pub fn key(&self) -> &RunKey {
        &self.key
    }

    /// Insert one `TestResult` row; the parent is derived from the name.
    ///
    /// An unknown outcome is stored as `NULL`.
    pub fn insert_result(&self, full_name: &str, name: &str, outcome: Outcome) -> Result<()> {
        let outcome = outcome.is_known().then(|| outcome.as_str());
        self.tx
            .execute(
                "INSERT INTO TestResult (
                     test_run_implementation_id, test_run_version,
                     full_name, name, outcome, parent_test_full_name
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.key.implementation_id,
                    self.key.version,
                    full_name,
                    name,
                    outcome,
                    parent_full_name(full_name),
                ],
            )
            .map_err(|error| self.duplicate_or(error, full_name))?;
        Ok(())
    }

    /// Insert one row per metadata key, values JSON-encoded. Returns the row
    /// count.
    pub fn insert_metadata(&self, full_name: &str, meta: &Metadata) -> Result<usize> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO TestMetadata (
                 test_run_implementation_id, test_run_version, test_full_name, key, value
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (key, value) in meta {
            let encoded = serde_json::to_string(&value.to_json())?;
            stmt.execute(params![
                self.key.implementation_id,
                self.key.version,
                full_name,
                key,
                encoded,
            ])?;
        }
        Ok(meta.len())
    }

    pub fn insert_log(&self, full_name: &str, stdout: &str) -> Result<()> {
        self.tx.execute(
            "INSERT INTO TestLog (test_run_implementation_id, test_run_version, test_full_name, stdout)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.key.implementation_id, self.key.version, full_name, stdout],
        )?;
        Ok(())
    }

    /// Delete every result, metadata and log row of the run. Returns the
    /// number of results removed.
    fn clear(&self) -> Result<usize> {
        let run = params![self.key.implementation_id, self.key.version];
        self.tx.execute(
            "DELETE FROM TestLog WHERE test_run_implementation_id = ?1 AND test_run_version = ?2",
            run,
        )?;
        self.tx.execute(
            "DELETE FROM TestMetadata WHERE test_run_implementation_id = ?1 AND test_run_version = ?2",
            run,
        )?;
        let removed = self.tx.execute(
            "DELETE FROM TestResult WHERE test_run_implementation_id = ?1 AND test_run_version = ?2",
            run,
        )?;
        Ok(removed)
    }

    /// Commit the run. Deferred foreign keys are checked here; on failure the
    /// transaction is rolled back.
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn duplicate_or(&self, error: rusqlite::Error, full_name: &str) -> RollupError {
        match &error {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                RollupError::DuplicateTestResult {
                    implementation_id: self.key.implementation_id.clone(),
                    version: self.key.version.clone(),
                    full_name: full_name.to_owned(),
                }
            }
            _ => RollupError::Storage(error),
        }
    }
}
