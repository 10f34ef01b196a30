//! Coercion helpers shared by the node extractors.
//!
//! Upstream payload shapes are inconsistent across calls: a list field may
//! arrive as a bare string, a structured map may arrive as a stringified
//! Python dict. These helpers absorb that variance in one place instead of
//! duplicating the fallbacks in every extractor.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coerce a field expected to be a list of strings.
///
/// Accepts an actual list (non-string items are stringified), a single bare
/// string (wrapped as a one-element list), or absence (empty list).
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Detected technology stack of a repository, as reported by the
/// source/target agents' metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TechStack {
    pub framework: Option<String>,
    pub styling: Option<String>,
    pub typescript: Option<String>,
}

impl TechStack {
    pub fn is_empty(&self) -> bool {
        self.framework.is_none() && self.styling.is_none() && self.typescript.is_none()
    }
}

// Matches `framework='next.js'`, `framework: "next.js"` and the other
// quoting variants a stringified Python dict produces.
static KEY_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(framework|styling|typescript)['"]?\s*[:=]\s*['"]?([^'",}]+)"#)
        .expect("static regex must compile")
});

/// Coerce a field expected to be a structured metadata map.
///
/// A JSON object is consumed directly; a bare string is scanned for the
/// known `key='value'` pairs as a fallback. Anything else yields an empty
/// stack.
pub fn tech_stack(value: Option<&Value>) -> TechStack {
    match value {
        Some(Value::Object(map)) => TechStack {
            framework: field_string(map.get("framework")),
            styling: field_string(map.get("styling")),
            typescript: field_string(map.get("typescript")),
        },
        Some(Value::String(encoded)) => {
            let mut stack = TechStack::default();
            for caps in KEY_VALUE_RE.captures_iter(encoded) {
                let val = caps[2].trim().to_string();
                match &caps[1] {
                    "framework" => stack.framework = Some(val),
                    "styling" => stack.styling = Some(val),
                    "typescript" => stack.typescript = Some(val),
                    _ => {}
                }
            }
            stack
        }
        _ => TechStack::default(),
    }
}

/// Stringify scalar metadata values (`true` stays readable as "true").
fn field_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
