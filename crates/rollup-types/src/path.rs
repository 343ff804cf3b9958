//! Helpers over slash-delimited full test names.

/// Separator between hierarchy levels in a full name.
pub const PATH_SEPARATOR: char = '/';

/// Separator used to join display segments into an aggregate group key.
pub const GROUP_KEY_SEPARATOR: &str = " > ";

/// Human-readable path of a full name: one entry per segment, underscores
/// replaced by spaces.
#[must_use]
pub fn display_path(full_name: &str) -> Vec<String> {
    full_name
        .split(PATH_SEPARATOR)
        .map(|segment| segment.replace('_', " "))
        .collect()
}

/// Full name with the last segment removed, `None` for roots. A leading
/// separator is part of the root segment: `/lead` has no parent.
#[must_use]
pub fn parent_full_name(full_name: &str) -> Option<&str> {
    full_name
        .rsplit_once(PATH_SEPARATOR)
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

/// Proper ancestors of a full name, nearest first.
pub fn ancestors(full_name: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent_full_name(full_name), |current| {
        parent_full_name(current)
    })
}

/// `true` when `prefix` equals `full_name` or names one of its ancestors.
///
/// Matches on segment boundaries only: `A/B` is a prefix of `A/B/C` but not
/// of `A/B1`.
#[must_use]
pub fn is_path_prefix(prefix: &str, full_name: &str) -> bool {
    match full_name.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with(PATH_SEPARATOR),
        None => false,
    }
}
