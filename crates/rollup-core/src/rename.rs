//! Rewrite raw test identifiers in a rendered document into display names.

use std::collections::BTreeMap;

use rollup_error::{Result, RollupError};

/// Display name for an identifier, optionally linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName {
    pub name: String,
    pub url: Option<String>,
}

impl DisplayName {
    fn render(&self) -> String {
        match &self.url {
            Some(url) => format!("[{}]({url})", self.name),
            None => self.name.clone(),
        }
    }
}

/// Parse a names document: `{ "<identifier>": ["<name>", "<url>"?], ... }`.
pub fn parse_display_names(context: &str, raw: &str) -> Result<BTreeMap<String, DisplayName>> {
    let document: BTreeMap<String, Vec<Option<String>>> =
        serde_json::from_str(raw).map_err(|source| RollupError::InputParse {
            context: context.to_owned(),
            source,
        })?;

    let mut names = BTreeMap::new();
    for (identifier, parts) in document {
        let mut parts = parts.into_iter();
        let Some(Some(name)) = parts.next() else {
            return Err(RollupError::MissingInput(format!(
                "{context}: display name for {identifier}"
            )));
        };
        let url = parts.next().flatten().filter(|url| !url.is_empty());
        names.insert(identifier, DisplayName { name, url });
    }
    Ok(names)
}

/// Replace every literal occurrence of each identifier, longest first, so an
/// identifier is rewritten before any shorter identifier it contains.
#[must_use]
pub fn rename_identifiers(document: &str, names: &BTreeMap<String, DisplayName>) -> String {
    let mut ordered: Vec<(&String, &DisplayName)> = names.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    let mut rewritten = document.to_owned();
    for (identifier, display) in ordered {
        if identifier.is_empty() {
            continue;
        }
        rewritten = rewritten.replace(identifier.as_str(), &display.render());
    }
    rewritten
}
