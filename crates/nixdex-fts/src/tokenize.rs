//! Identifier tokenization.
//!
//! An identifier such as `python37Packages.test1_name-test2` is cut into
//! segments at case transitions, letter/digit transitions and the separators
//! `.`, `_` and `-`. Every run of consecutive segments, with trailing
//! separators stripped, becomes a token. Indexing all of them lets a query for
//! `name` or `Packages.test` match anywhere inside the attribute path.
//!
//! ```text
//! python37Packages.test1_name-test2
//!   segments: python | 37 | Packages. | test | 1_ | name- | test | 2
//!   from 0:   python, python37, python37Packages, python37Packages.test, ...
//!   from 1:   37, 37Packages, 37Packages.test, ...
//!   ...
//!   from 7:   2
//! ```

use std::sync::LazyLock;

use fancy_regex::Regex;

/// Characters stripped from the end of every token.
const TRAILING_SEPARATORS: &[char] = &['_', '.', '-'];

// Only 1-9 start a new segment after a lowercase letter; `0` does not.
const SEGMENT_PATTERN: &str =
    r".+?(?:(?<=[a-z])(?=[1-9A-Z])|(?<=[1-9A-Z])(?=[A-Z][a-z])|[._-]|$)";

static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SEGMENT_PATTERN).expect("Invalid identifier segment regex"));

/// Split an identifier into its boundary-aligned segments.
///
/// Concatenating the segments reproduces the identifier.
pub fn segments(identifier: &str) -> Vec<&str> {
    split_on(&SEGMENT, identifier)
}

/// Split at the matches of `pattern`, keeping unmatched text as segments of
/// its own. A matcher error ends splitting and the rest of the identifier
/// becomes the last segment.
fn split_on<'a>(pattern: &Regex, identifier: &'a str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut end = 0;
    for found in pattern.find_iter(identifier) {
        let found = match found {
            Ok(found) => found,
            Err(e) => {
                log::warn!("segments: stopped splitting '{identifier}' at byte {end}: {e}");
                break;
            }
        };
        if found.start() > end {
            parts.push(&identifier[end..found.start()]);
        }
        parts.push(found.as_str());
        end = found.end();
    }
    if end < identifier.len() {
        parts.push(&identifier[end..]);
    }
    parts
}

/// Produce every boundary-aligned token of an identifier.
///
/// For each start segment, tokens grow one segment at a time up to the end of
/// the identifier. Duplicates produced from different start positions are
/// kept; callers that need a set should collect into one.
pub fn tokenize(identifier: &str) -> Vec<String> {
    let parts = segments(identifier);
    let mut tokens = Vec::with_capacity(parts.len() * (parts.len() + 1) / 2);

    for start in 0..parts.len() {
        let mut prefix = String::new();
        for part in &parts[start..] {
            prefix.push_str(part);
            tokens.push(prefix.trim_end_matches(TRAILING_SEPARATORS).to_string());
        }
    }

    tokens
}

// ============================================================================
// Tests
// ============================================================================
