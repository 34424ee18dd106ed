//! Rendering option values as Nix expressions.
//!
//! Option defaults and examples arrive as JSON. Search results show them in
//! the notation users write in their configuration:
//!
//! ```text
//! {
//!   name1 = "value1";
//!   "name.2" = true;
//!   name3 = [
//!     false
//!     "text"
//!   ];
//! }
//! ```
//!
//! Indentation grows by two spaces per nesting level. The output format is
//! relied upon by the search frontend and must not drift.

use nixdex_core::{Error, Result, Value};

const INDENT_STEP: &str = "  ";

/// `_type` tags marking a mapping as pre-rendered source text.
const LITERAL_TAGS: &[&str] = &["literalExample", "literalExpression"];

/// Render a value at the top level.
pub fn pretty_print(value: &Value) -> Result<String> {
    pretty_print_indented(value, "")
}

/// Render a value whose first line is already placed at `indent`.
pub fn pretty_print_indented(value: &Value, indent: &str) -> Result<String> {
    let next = format!("{indent}{INDENT_STEP}");

    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Text(text) => Ok(render_text(text, indent, &next)),
        Value::Sequence(items) => {
            if items.is_empty() {
                return Ok("[ ]".to_string());
            }
            let mut out = String::from("[\n");
            for item in items {
                out.push_str(&next);
                out.push_str(&pretty_print_indented(item, &next)?);
                out.push('\n');
            }
            out.push_str(indent);
            out.push(']');
            Ok(out)
        }
        Value::Mapping(map) => {
            if map.is_empty() {
                return Ok("{ }".to_string());
            }
            if let Some(tag) = value.get_str("_type")
                && LITERAL_TAGS.contains(&tag)
            {
                return match map.get("text") {
                    Some(Value::Text(text)) => Ok(text.clone()),
                    Some(other) => pretty_print_indented(other, &next),
                    None => Err(Error::UnsupportedValueType(format!(
                        "{tag} without text: {value}"
                    ))),
                };
            }
            let mut out = String::from("{\n");
            for (key, item) in map {
                out.push_str(&next);
                out.push_str(&render_key(key));
                out.push_str(" = ");
                out.push_str(&pretty_print_indented(item, &next)?);
                out.push_str(";\n");
            }
            out.push_str(indent);
            out.push('}');
            Ok(out)
        }
    }
}

/// Strings are trimmed. Multi-line text becomes an indented `''` block and is
/// not escaped; single-line text is double-quoted with `\` and `"` escaped.
fn render_text(text: &str, indent: &str, next: &str) -> String {
    let text = text.trim();
    if text.contains('\n') {
        let mut out = String::from("''\n");
        for line in text.split('\n') {
            out.push_str(next);
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(indent);
        out.push_str("''");
        out
    } else {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Attribute names containing a dot must be quoted.
fn render_key(key: &str) -> String {
    if key.contains('.') {
        render_text(key, "", INDENT_STEP)
    } else {
        key.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
