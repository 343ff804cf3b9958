//! Relational store for test runs and the Rollup Query Engine.
//!
//! A run is loaded atomically with [`Store::load_run`] and read back with
//! [`Store::rollups`], [`Store::matrix_source`] and the site-generation
//! queries ([`Store::runs`], [`Store::test_index`], [`Store::logs`],
//! [`Store::taxonomy`]).

mod query;
mod rollup;
mod schema;
mod source;
mod store;

pub use query::{ResultRow, RunSummary, TaxonomyEntry, TestIndexEntry};
pub use rollup::{Rollup, compute_rollups};
pub use store::{LoadSummary, RunKey, RunLoader, Store};
