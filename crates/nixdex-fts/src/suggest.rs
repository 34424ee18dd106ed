//! Weighted autocomplete suggestions for dotted identifiers.
//!
//! `services.nginx.extraConfig` yields the full name plus each proper prefix
//! ending in `.`. Shorter prefixes carry higher weights so that broad
//! completions (`services.`) rank above deep ones.

use serde::{Deserialize, Serialize};

/// Base weight a single-part identifier receives.
const BASE_WEIGHT: i64 = 1000;

/// Weight lost per additional dotted part.
const DEPTH_PENALTY: i64 = 10;

/// One completion candidate, in the shape completion fields expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Text to complete to.
    pub input: String,
    /// Ranking weight; higher ranks first.
    pub weight: i64,
}

impl Suggestion {
    fn new(input: impl Into<String>, weight: i64) -> Self {
        Self {
            input: input.into(),
            weight,
        }
    }
}

/// Rank the completions of a dotted identifier.
///
/// For an identifier of `N` parts the result holds `N` suggestions: the full
/// identifier with weight `1000 - (N-1)*10`, followed by prefixes from the
/// longest to the shortest, where the prefix made of the first `N-1-i` parts
/// has weight `1000 - (N-2-i)*10 + 1`.
pub fn rank(identifier: &str) -> Vec<Suggestion> {
    let parts: Vec<&str> = identifier.split('.').collect();
    let n = parts.len() as i64;

    let mut suggestions = Vec::with_capacity(parts.len());
    suggestions.push(Suggestion::new(
        identifier,
        BASE_WEIGHT - (n - 1) * DEPTH_PENALTY,
    ));

    for i in 0..(n - 1) {
        let take = (n - 1 - i) as usize;
        let prefix = format!("{}.", parts[..take].join("."));
        let weight = BASE_WEIGHT - (n - 2 - i) * DEPTH_PENALTY + 1;
        suggestions.push(Suggestion::new(prefix, weight));
    }

    suggestions
}

// ============================================================================
// Tests
// ============================================================================
