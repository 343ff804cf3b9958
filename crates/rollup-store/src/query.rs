//! Read-side queries over stored runs.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rollup_core::slug::{percent_decode, slugify_test_name};
use rollup_error::Result;
use rollup_types::{EventTime, MetaValue, Metadata, Outcome, RunInfo};

use crate::store::{RunKey, Store};

/// One `TestRun` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub implementation_id: String,
    pub version: String,
    pub time: Option<String>,
    pub job_url: Option<String>,
}

impl RunSummary {
    #[must_use]
    pub fn key(&self) -> RunKey {
        RunKey::new(&self.implementation_id, &self.version)
    }

    #[must_use]
    pub fn info(&self) -> RunInfo {
        RunInfo {
            version: Some(self.version.clone()),
            job_url: self.job_url.clone(),
            time: self.time.clone().map(EventTime::Stamp),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            implementation_id: row.get(0)?,
            version: row.get(1)?,
            time: row.get(2)?,
            job_url: row.get(3)?,
        })
    }
}

/// One `TestResult` row of a run. A `NULL` outcome reads back as
/// [`Outcome::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub full_name: String,
    pub name: String,
    pub outcome: Outcome,
    pub parent_full_name: Option<String>,
}

/// A test across every stored run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIndexEntry {
    pub full_name: String,
    pub name: String,
    pub parent_full_name: Option<String>,
    /// Distinct run versions the test appears in, sorted.
    pub versions: Vec<String>,
    pub slug: String,
}

/// Taxonomy terms of one test: every metadata key pluralised (`ipip` becomes
/// `ipips`) with the distinct values seen across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub full_name: String,
    pub name: String,
    pub slug: String,
    pub versions: Vec<String>,
    #[serde(flatten)]
    pub terms: BTreeMap<String, Vec<Value>>,
}

const RUN_FILTER: &str = "test_run_implementation_id = ?1 AND test_run_version = ?2";

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

impl Store {
    /// Every run, ordered by implementation, version and time.
    pub fn runs(&self) -> Result<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT implementation_id, version, CAST(time AS TEXT), job_url
             FROM TestRun
             ORDER BY implementation_id, version, time",
        )?;
        let runs = stmt
            .query_map([], RunSummary::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    pub fn run(&self, key: &RunKey) -> Result<Option<RunSummary>> {
        let run = self
            .conn
            .query_row(
                "SELECT implementation_id, version, CAST(time AS TEXT), job_url
                 FROM TestRun
                 WHERE implementation_id = ?1 AND version = ?2",
                [&key.implementation_id, &key.version],
                RunSummary::from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Every result row of a run, ordered by full name.
    pub fn results(&self, key: &RunKey) -> Result<Vec<ResultRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT full_name, name, outcome, parent_test_full_name
             FROM TestResult
             WHERE {RUN_FILTER}
             ORDER BY full_name"
        ))?;
        let rows = stmt
            .query_map([&key.implementation_id, &key.version], |row| {
                let outcome: Option<String> = row.get(2)?;
                Ok(ResultRow {
                    full_name: row.get(0)?,
                    name: row.get(1)?,
                    outcome: outcome
                        .as_deref()
                        .and_then(Outcome::from_action)
                        .unwrap_or_default(),
                    parent_full_name: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Decoded metadata of a run, per full name.
    pub fn metadata(&self, key: &RunKey) -> Result<BTreeMap<String, Metadata>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT test_full_name, key, value
             FROM TestMetadata
             WHERE {RUN_FILTER}
             ORDER BY test_full_name, key"
        ))?;
        let rows = stmt
            .query_map([&key.implementation_id, &key.version], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut by_test: BTreeMap<String, Metadata> = BTreeMap::new();
        for (full_name, meta_key, encoded) in rows {
            let value: Value = match encoded {
                Some(encoded) => serde_json::from_str(&encoded)?,
                None => Value::Null,
            };
            by_test
                .entry(full_name)
                .or_default()
                .insert(meta_key, MetaValue::from(value));
        }
        Ok(by_test)
    }

    /// Captured output of a run, per full name.
    pub fn logs(&self, key: &RunKey) -> Result<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT test_full_name, stdout
             FROM TestLog
             WHERE {RUN_FILTER}
             ORDER BY test_full_name"
        ))?;
        let logs = stmt
            .query_map([&key.implementation_id, &key.version], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                ))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(logs)
    }

    /// Full names of the run with no child row, straight from SQL.
    pub fn leaf_names(&self, key: &RunKey) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT full_name
             FROM TestResult tr1
             WHERE tr1.test_run_implementation_id = ?1 AND tr1.test_run_version = ?2
             AND NOT EXISTS (
                 SELECT 1
                 FROM TestResult tr2
                 WHERE tr2.test_run_implementation_id = tr1.test_run_implementation_id
                     AND tr2.test_run_version = tr1.test_run_version
                     AND tr2.parent_test_full_name = tr1.full_name
             )",
        )?;
        let leaves = stmt
            .query_map([&key.implementation_id, &key.version], |row| row.get(0))?
            .collect::<rusqlite::Result<BTreeSet<String>>>()?;
        Ok(leaves)
    }

    /// Every test across runs, ordered by name then full name.
    pub fn test_index(&self) -> Result<Vec<TestIndexEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                 full_name,
                 name,
                 parent_test_full_name,
                 GROUP_CONCAT(DISTINCT test_run_version) AS versions
             FROM TestResult
             GROUP BY full_name, name
             ORDER BY name, full_name",
        )?;
        let entries = stmt
            .query_map([], |row| {
                let full_name: String = row.get(0)?;
                let versions: Option<String> = row.get(3)?;
                let mut versions: Vec<String> = versions
                    .as_deref()
                    .map(|joined| joined.split(',').map(str::to_owned).collect())
                    .unwrap_or_default();
                versions.sort();
                Ok(TestIndexEntry {
                    slug: slugify_test_name(&full_name),
                    name: row.get(1)?,
                    parent_full_name: row.get(2)?,
                    versions,
                    full_name,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Taxonomy terms per full name across every run.
    pub fn taxonomy(&self) -> Result<BTreeMap<String, TaxonomyEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT
                 tr.full_name,
                 tr.name,
                 tr.test_run_version,
                 tm.key,
                 tm.value
             FROM TestResult tr
             LEFT JOIN TestMetadata tm
                 ON tm.test_run_implementation_id = tr.test_run_implementation_id
                 AND tm.test_run_version = tr.test_run_version
                 AND tm.test_full_name = tr.full_name
             ORDER BY tr.full_name, tr.test_run_version, tm.key",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut taxonomy: BTreeMap<String, TaxonomyEntry> = BTreeMap::new();
        for (full_name, name, version, meta_key, encoded) in rows {
            let entry = taxonomy
                .entry(full_name.clone())
                .or_insert_with(|| TaxonomyEntry {
                    slug: slugify_test_name(&full_name),
                    name: percent_decode(&name),
                    full_name,
                    versions: Vec::new(),
                    terms: BTreeMap::new(),
                });
            push_unique(&mut entry.versions, version);

            let Some(meta_key) = meta_key else {
                continue;
            };
            let value: Value = match encoded {
                Some(encoded) => serde_json::from_str(&encoded)?,
                None => Value::Null,
            };
            push_unique(entry.terms.entry(format!("{meta_key}s")).or_default(), value);
        }
        Ok(taxonomy)
    }
}
