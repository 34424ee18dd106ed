//! Reversed field variants for suffix search.
//!
//! Every searchable text field has a `_reverse` twin holding the same text
//! reversed. A trailing-substring query is then answered by reversing the
//! query and running a prefix search against the twin.
//!
//! Text containing a space is reversed word by word, keeping word order.
//! Only single spaces are treated as separators; runs of spaces produce empty
//! words that are kept as-is.

use nixdex_core::{Error, Result, Value};

/// Reverse a single string.
pub fn reverse_text(text: &str) -> String {
    if text.contains(' ') {
        text.split(' ')
            .map(|word| word.chars().rev().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        text.chars().rev().collect()
    }
}

/// Types whose string leaves can be reversed while keeping their shape.
pub trait Reversible {
    /// Return a copy with every string leaf reversed.
    fn reversed(&self) -> Self;
}

impl Reversible for String {
    fn reversed(&self) -> Self {
        reverse_text(self)
    }
}

impl<T: Reversible> Reversible for Option<T> {
    fn reversed(&self) -> Self {
        self.as_ref().map(Reversible::reversed)
    }
}

impl<T: Reversible> Reversible for Vec<T> {
    fn reversed(&self) -> Self {
        self.iter().map(Reversible::reversed).collect()
    }
}

impl<A: Reversible, B: Reversible> Reversible for (A, B) {
    fn reversed(&self) -> Self {
        (self.0.reversed(), self.1.reversed())
    }
}

impl<A: Reversible, B: Reversible, C: Reversible> Reversible for (A, B, C) {
    fn reversed(&self) -> Self {
        (self.0.reversed(), self.1.reversed(), self.2.reversed())
    }
}

/// Reverse a dynamically shaped value.
///
/// `null` passes through, text is reversed, and sequences are mapped element
/// by element. Booleans, numbers and mappings cannot be reversed.
pub fn reverse_value(value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Text(text) => Ok(Value::Text(reverse_text(text))),
        Value::Sequence(items) => items
            .iter()
            .map(reverse_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        Value::Bool(_) | Value::Number(_) | Value::Mapping(_) => {
            Err(Error::UnsupportedFieldType(value.to_string()))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
