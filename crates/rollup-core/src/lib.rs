//! In-process stages of the rollup pipeline.
//!
//! ```text
//! raw events ──normalize──▶ TestRecord map ──hierarchy──▶ leaves
//!                                                │
//!                                   aggregate(depth) ──▶ AggregateGroup map
//!                                                │
//!                                    matrix::project ──▶ ComparisonMatrix
//! ```
//!
//! Every stage is a pure function over fully materialized input; nothing is
//! shared between invocations.

pub mod aggregate;
pub mod config;
pub mod hierarchy;
pub mod matrix;
pub mod normalize;
pub mod rename;
pub mod slug;

pub use aggregate::{AggregateGroup, aggregate, group_key};
pub use config::RollupConfig;
pub use hierarchy::{NodeId, TestNode, TestTree, leaf_records};
pub use matrix::{ComparisonMatrix, MatrixOptions, MatrixSource, project, render_cell};
pub use normalize::{RawEvent, normalize, parse_events};
