//! Relational schema: runs, results, metadata and logs.
//!
//! A run is one `(implementation_id, version)` pair. `TestResult` rows of a
//! run form a tree through `parent_test_full_name`; that foreign key is
//! deferred so a whole run can be inserted in any order inside one
//! transaction.

use rusqlite::Connection;

use rollup_error::Result;

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS TestRun (
    implementation_id TEXT NOT NULL,
    version TEXT NOT NULL,
    time DATETIME,
    job_url TEXT,

    PRIMARY KEY (implementation_id, version)
);

CREATE TABLE IF NOT EXISTS TestResult (
    test_run_implementation_id TEXT NOT NULL,
    test_run_version TEXT NOT NULL,

    full_name TEXT NOT NULL,
    name TEXT NOT NULL,
    outcome TEXT CHECK (outcome IS NULL OR outcome IN ('pass', 'fail', 'skip')),

    parent_test_full_name TEXT,

    PRIMARY KEY (test_run_implementation_id, test_run_version, full_name),

    FOREIGN KEY (test_run_implementation_id, test_run_version, parent_test_full_name)
        REFERENCES TestResult (test_run_implementation_id, test_run_version, full_name)
        DEFERRABLE INITIALLY DEFERRED,

    FOREIGN KEY (test_run_implementation_id, test_run_version)
        REFERENCES TestRun (implementation_id, version)
);

CREATE INDEX IF NOT EXISTS TestResult_parent
    ON TestResult (test_run_implementation_id, test_run_version, parent_test_full_name);

CREATE TABLE IF NOT EXISTS TestMetadata (
    test_run_implementation_id TEXT NOT NULL,
    test_run_version TEXT NOT NULL,
    test_full_name TEXT NOT NULL,

    key TEXT NOT NULL,
    value JSON,

    PRIMARY KEY (test_run_implementation_id, test_run_version, test_full_name, key),

    FOREIGN KEY (test_run_implementation_id, test_run_version, test_full_name)
        REFERENCES TestResult (test_run_implementation_id, test_run_version, full_name)
        DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS TestLog (
    test_run_implementation_id TEXT NOT NULL,
    test_run_version TEXT NOT NULL,
    test_full_name TEXT NOT NULL,

    stdout TEXT,

    FOREIGN KEY (test_run_implementation_id, test_run_version, test_full_name)
        REFERENCES TestResult (test_run_implementation_id, test_run_version, full_name)
        DEFERRABLE INITIALLY DEFERRED
);
";

/// Enable foreign keys and create any missing table.
pub(crate) fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
