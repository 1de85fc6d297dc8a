//! `${...}` variable interpolation.
//!
//! Pure textual substitution over a flattened scope (inputs, variables,
//! `step.<id>.output`). An unresolved `${...}` token is left verbatim --
//! that is the contract, not an error path. This is deliberately separate
//! from any general templating: no expressions, no filters, no escaping.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder regex"));

/// Substitute `${name}` placeholders from the scope.
///
/// Scalars render bare; arrays and objects render as compact JSON.
pub fn interpolate(template: &str, scope: &HashMap<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = caps[1].trim();
            match scope.get(name) {
                Some(value) => value_to_string(value),
                // Unresolved tokens stay verbatim.
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Interpolate every string inside a JSON value, recursing through arrays
/// and objects. Used for plugin params and template variables.
pub fn interpolate_value(value: &Value, scope: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, scope)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| interpolate_value(v, scope)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Walk a dot path into a JSON value. Path segments index objects by key
/// and arrays by number; an empty path selects the whole value.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a JSON value for substitution into text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Arrays and objects render as compact JSON.
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
