//! Matrix projector: rollups from many sources merged into one
//! implementations × tests comparison table.
//!
//! Rows are grouped by the `group` metadata key. Named groups sort first in
//! byte order, tests without a group go last under "Other", and each group
//! gets a header row before its first test. Cells follow a fixed precedence:
//! any failure, then any skip, then any pass. A present cell with none of the
//! three is an error; an absent cell renders empty.

use std::collections::{BTreeMap, BTreeSet};

use rollup_error::{Result, RollupError};
use rollup_types::{
    Counts, MetaValue, Metadata, RunInfo, RunInput, UNKNOWN_VERSION, merge_override,
};
use tracing::{debug, warn};

use crate::aggregate::aggregate;

/// Header of the leading (label) column.
pub const LEADING_HEADER: &str = "gateway";
/// Label of the per-source version row.
pub const VERSION_LABEL: &str = "version";
/// Metadata key holding a test's presentation group.
pub const GROUP_METADATA_KEY: &str = "group";
/// Metadata key holding a test's spec URLs (without scheme).
pub const SPECS_METADATA_KEY: &str = "specs";
/// Header label for tests without a group.
pub const OTHER_GROUP_LABEL: &str = "Other";

const TEST_NAME_PREFIX: &str = "Test";

/// Rendering switches for [`project`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixOptions {
    /// Fail with `ConflictingMetadata` instead of letting the last source win.
    pub strict_metadata: bool,
    /// Prepended to every spec URL when rendering links.
    pub spec_url_scheme: String,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            strict_metadata: false,
            spec_url_scheme: "https://".to_owned(),
        }
    }
}

/// Rollup cell and metadata of one test in one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixEntry {
    pub counts: Counts,
    pub meta: Metadata,
}

/// One column of the matrix: an implementation at a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixSource {
    pub name: String,
    pub version: String,
    pub job_url: Option<String>,
    pub entries: BTreeMap<String, MatrixEntry>,
}

impl MatrixSource {
    #[must_use]
    pub fn new(name: impl Into<String>, info: &RunInfo) -> Self {
        Self {
            name: name.into(),
            version: info
                .version
                .clone()
                .unwrap_or_else(|| UNKNOWN_VERSION.to_owned()),
            job_url: info.job_url.clone(),
            entries: BTreeMap::new(),
        }
    }

    /// Aggregate a run's test records at `depth` and use the groups as rows.
    pub fn from_aggregate(name: impl Into<String>, run: &RunInput, depth: usize) -> Result<Self> {
        let mut source = Self::new(name, &run.info());
        for (key, group) in aggregate(&run.tests, depth)? {
            source.insert(key, group.counts, group.meta);
        }
        Ok(source)
    }

    pub fn insert(&mut self, test: impl Into<String>, counts: Counts, meta: Metadata) {
        self.entries
            .insert(test.into(), MatrixEntry { counts, meta });
    }

    /// Fold another row into `test`: counts are summed, incoming metadata
    /// overrides existing keys.
    pub fn accumulate(&mut self, test: impl Into<String>, counts: &Counts, meta: &Metadata) {
        let entry = self.entries.entry(test.into()).or_default();
        entry.counts.add(counts);
        merge_override(&mut entry.meta, meta);
    }
}

/// Presentation group. Derived ordering puts every named group before
/// `Undefined`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupName {
    Named(String),
    Undefined,
}

impl GroupName {
    fn from_metadata(meta: &Metadata) -> Self {
        meta.get(GROUP_METADATA_KEY)
            .and_then(MetaValue::as_str)
            .filter(|name| !name.is_empty())
            .map_or(Self::Undefined, |name| Self::Named(name.to_owned()))
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Undefined => OTHER_GROUP_LABEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEntry {
    GroupHeader(GroupName),
    Test { group: GroupName, full_name: String },
}

/// Ordered rows plus the merged per-test metadata they were derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowIndex {
    pub rows: Vec<RowEntry>,
    pub metadata: BTreeMap<String, Metadata>,
}

/// Union of test names and metadata across sources, grouped and ordered.
///
/// Later sources override earlier ones key by key; with
/// `options.strict_metadata` a differing value is an error instead.
pub fn build_row_index(sources: &[MatrixSource], options: &MatrixOptions) -> Result<RowIndex> {
    let mut metadata: BTreeMap<String, Metadata> = BTreeMap::new();
    for source in sources {
        for (test, entry) in &source.entries {
            let merged = metadata.entry(test.clone()).or_default();
            for (key, value) in &entry.meta {
                if let Some(previous) = merged.get(key).filter(|previous| *previous != value) {
                    if options.strict_metadata {
                        return Err(RollupError::ConflictingMetadata {
                            test: test.clone(),
                            key: key.clone(),
                        });
                    }
                    warn!(
                        test = %test,
                        key = %key,
                        previous = %previous,
                        replacement = %value,
                        source = %source.name,
                        "metadata overridden by later source"
                    );
                }
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    let rows = {
        let mut groups: BTreeMap<GroupName, BTreeSet<&str>> = BTreeMap::new();
        for (test, meta) in &metadata {
            groups
                .entry(GroupName::from_metadata(meta))
                .or_default()
                .insert(test);
        }

        let mut rows = Vec::with_capacity(metadata.len() + groups.len());
        for (group, tests) in &groups {
            rows.push(RowEntry::GroupHeader(group.clone()));
            rows.extend(tests.iter().map(|test| RowEntry::Test {
                group: group.clone(),
                full_name: (*test).to_owned(),
            }));
        }
        rows
    };

    Ok(RowIndex { rows, metadata })
}

/// Row label: the identifier without its `Test` prefix, linked to its specs.
#[must_use]
pub fn render_label(full_name: &str, meta: &Metadata, spec_url_scheme: &str) -> String {
    let label = full_name
        .strip_prefix(TEST_NAME_PREFIX)
        .unwrap_or(full_name);
    let specs = meta
        .get(SPECS_METADATA_KEY)
        .map(MetaValue::as_string_list)
        .unwrap_or_default();

    match specs.as_slice() {
        [] => label.to_owned(),
        [single] => format!("[{label}]({spec_url_scheme}{single})"),
        many => {
            let links: Vec<String> = many
                .iter()
                .enumerate()
                .map(|(index, url)| format!("[{index}]({spec_url_scheme}{url})"))
                .collect();
            format!("{label} ({})", links.join(", "))
        }
    }
}

/// Render one cell; `None` (test absent from the source) renders empty.
pub fn render_cell(test: &str, cell: Option<&Counts>) -> Result<String> {
    let Some(cell) = cell else {
        return Ok(String::new());
    };

    if cell.fail > 0 {
        return Ok(format!(":red_circle: ({} / {})", cell.pass, cell.total));
    }
    if cell.skip > 0 {
        return Ok(":yellow_circle: (skipped)".to_owned());
    }
    if cell.pass > 0 {
        return Ok(format!(":green_circle: ({} / {})", cell.pass, cell.total));
    }

    Err(RollupError::UnhandledCellValue {
        test: test.to_owned(),
        cell: serde_json::to_string(cell)?,
    })
}

/// Rendered comparison table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonMatrix {
    pub header: Vec<String>,
    /// Version row followed by one row per group header or test.
    pub rows: Vec<Vec<String>>,
}

impl ComparisonMatrix {
    /// Alignment row: the label column is right-aligned, data columns
    /// left-aligned, each as wide as its header.
    #[must_use]
    pub fn separator(&self) -> Vec<String> {
        self.header
            .iter()
            .enumerate()
            .map(|(index, cell)| {
                let fill = "-".repeat(cell.chars().count().saturating_sub(2));
                if index == 0 {
                    format!("{fill}-:")
                } else {
                    format!(":-{fill}")
                }
            })
            .collect()
    }

    /// Header, separator and data rows, all of equal width.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        let mut all = Vec::with_capacity(self.rows.len() + 2);
        all.push(self.header.clone());
        all.push(self.separator());
        all.extend(self.rows.iter().cloned());
        all
    }

    #[must_use]
    pub fn to_markdown(&self) -> String {
        self.to_rows()
            .iter()
            .map(|row| format!("| {} |", row.join(" | ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Build the comparison matrix for `sources`, one column each, in order.
pub fn project(sources: &[MatrixSource], options: &MatrixOptions) -> Result<ComparisonMatrix> {
    let index = build_row_index(sources, options)?;

    let mut header = Vec::with_capacity(sources.len() + 1);
    header.push(LEADING_HEADER.to_owned());
    header.extend(sources.iter().map(|source| source.name.clone()));

    let mut version_row = Vec::with_capacity(sources.len() + 1);
    version_row.push(VERSION_LABEL.to_owned());
    version_row.extend(sources.iter().map(|source| match &source.job_url {
        Some(url) => format!("[{}]({url})", source.version),
        None => source.version.clone(),
    }));

    let mut rows = Vec::with_capacity(index.rows.len() + 1);
    rows.push(version_row);
    for entry in &index.rows {
        let row = match entry {
            RowEntry::GroupHeader(group) => {
                let mut row = vec![format!("**{}**", group.label())];
                row.extend(sources.iter().map(|_| String::new()));
                row
            }
            RowEntry::Test { full_name, .. } => {
                let meta = index.metadata.get(full_name).cloned().unwrap_or_default();
                let mut row = vec![render_label(full_name, &meta, &options.spec_url_scheme)];
                for source in sources {
                    let cell = source.entries.get(full_name).map(|entry| &entry.counts);
                    row.push(render_cell(full_name, cell)?);
                }
                row
            }
        };
        rows.push(row);
    }

    debug!(
        sources = sources.len(),
        rows = rows.len(),
        "projected comparison matrix"
    );
    Ok(ComparisonMatrix { header, rows })
}
