//! Core data model for the rollup pipeline.
//!
//! Everything here is plain data: the event normalizer produces
//! [`TestRecord`]s, the aggregator and rollup engine produce [`Counts`], and
//! [`RunInput`] is the persisted per-run document exchanged between stages.

pub mod meta;
pub mod outcome;
pub mod path;
pub mod record;
pub mod run;

pub use meta::{MetaValue, Metadata, merge_disjoint, merge_override};
pub use outcome::{Counts, Outcome};
pub use path::{
    GROUP_KEY_SEPARATOR, PATH_SEPARATOR, ancestors, display_path, is_path_prefix,
    parent_full_name,
};
pub use record::{EventTime, TestRecord};
pub use run::{RUN_METADATA_KEY, RunInfo, RunInput, UNKNOWN_VERSION};
