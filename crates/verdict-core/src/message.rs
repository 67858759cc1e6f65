//! Failure-message templating.
//!
//! Failure messages may embed `@{property.path}` tokens which are
//! substituted from the data context's JSON snapshot when a condition
//! fails. Unresolvable tokens are left as written.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;

lazy_static! {
    /// `@{path.to.property}` token, dot-separated segments with optional
    /// array indices.
    static ref TOKEN_PATTERN: Regex = Regex::new(r"@\{([A-Za-z0-9_][A-Za-z0-9_.]*)\}").unwrap();
}

/// Walk a dot-separated path through a JSON value. Numeric segments index
/// into arrays.
pub fn lookup_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                current = items.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Render a failure-message template against a data snapshot.
pub fn render(template: &str, data: Option<&Value>) -> String {
    let Some(data) = data else {
        return template.to_string();
    };
    TOKEN_PATTERN
        .replace_all(template, |caps: &Captures<'_>| {
            match lookup_path(data, &caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
