use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Resolved outcome of one test identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
    /// No terminal action was observed.
    #[default]
    Unknown,
}

impl Outcome {
    /// Map a raw event action to a terminal outcome.
    ///
    /// Returns `None` for non-terminal actions (`output`, `run`, `pause`, ...).
    #[must_use]
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "pass" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Unknown => "unknown",
        }
    }

    /// `true` for pass, fail and skip.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "unknown" => Ok(Self::Unknown),
            other => Self::from_action(other).ok_or_else(|| format!("unknown outcome: {other}")),
        }
    }
}

/// Pass/fail/skip counters for a group of leaves.
///
/// `total` is carried explicitly because leaves with an unknown outcome count
/// toward it without touching any of the three buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub pass: u64,
    pub fail: u64,
    pub skip: u64,
    pub total: u64,
}

impl Counts {
    /// Count one leaf: bump the outcome's bucket (if any) and `total`.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Pass => self.pass += 1,
            Outcome::Fail => self.fail += 1,
            Outcome::Skip => self.skip += 1,
            Outcome::Unknown => {}
        }
        self.total += 1;
    }

    pub fn add(&mut self, other: &Self) {
        self.pass += other.pass;
        self.fail += other.fail;
        self.skip += other.skip;
        self.total += other.total;
    }

    /// No pass, fail or skip recorded.
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        self.pass == 0 && self.fail == 0 && self.skip == 0
    }
}
