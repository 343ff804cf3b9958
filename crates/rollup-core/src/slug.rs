//! URL slugs for test names, as used by the generated site.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use rollup_types::PATH_SEPARATOR;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.,()"/]"#).expect("static regex"));
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9 -/]").expect("static regex"));
static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").expect("static regex"));
static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("static regex"));
static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex"));

/// Lowercase slug; whitespace, punctuation and anything outside
/// `[a-z0-9 -/]` collapse to single dashes.
///
/// Text is NFKD-decomposed and combining diacritics (U+0300..=U+036F) are
/// dropped first, so `café` slugs to `cafe`.
#[must_use]
pub fn slugify(text: &str) -> String {
    let stripped: String = text
        .nfkd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect();
    let lowered = stripped.trim().to_lowercase();
    let slug = WHITESPACE.replace_all(&lowered, "_");
    let slug = PUNCTUATION.replace_all(&slug, "-");
    let slug = DISALLOWED.replace_all(&slug, "-");
    let slug = UNDERSCORES.replace_all(&slug, "_");
    DASHES.replace_all(&slug, "-").into_owned()
}

/// Slug of a full test name, segment by segment.
///
/// Each segment is percent-decoded and split at camelCase boundaries before
/// [`slugify`]; segments stay joined by `/`.
#[must_use]
pub fn slugify_test_name(full_name: &str) -> String {
    full_name
        .split(PATH_SEPARATOR)
        .map(|segment| {
            let decoded = percent_decode(segment);
            slugify(&CAMEL_BOUNDARY.replace_all(&decoded, "$1-$2"))
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim.
#[must_use]
pub fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[index + 1]), hex_value(bytes[index + 2]))
            {
                decoded.push((high << 4) | low);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
