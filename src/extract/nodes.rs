//! Per-node extractors.
//!
//! One extractor per pipeline node kind. Each is a pure function from the
//! node's state delta to a typed record, returning `None` when the node's
//! defining field is absent - the signal that the node has not produced
//! data yet.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::coerce::{string_list, tech_stack, TechStack};

/// Planner output: the migration plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerData {
    pub end_goal: String,
    pub integration_instructions: Option<String>,
    pub source_exploration: Vec<String>,
    pub target_exploration: Vec<String>,
}

/// Source agent output: what was found and copied from the source repo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    pub summary: Vec<String>,
    pub tech: TechStack,
    pub paths: Vec<String>,
    pub copied_files: Vec<String>,
}

/// Target agent output: where the code should land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetData {
    pub summary: Vec<String>,
    pub tech: TechStack,
    pub paths: Vec<String>,
    pub paste_instructions: Vec<String>,
    pub components_to_replace: Vec<String>,
}

/// One file written by the paster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastedFile {
    pub path: String,
    pub status: Option<String>,
}

/// Paster agent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasterData {
    pub pasted_files: Vec<PastedFile>,
}

/// Integrator agent output: the wiring changes made in the target repo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratorData {
    pub summary: String,
    pub changeset: Vec<String>,
    pub wiring_changes: Vec<String>,
    pub dependency_changes: Vec<String>,
    pub config_changes: Vec<String>,
}

/// Check node output: static validation results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerData {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub checks_performed: Vec<String>,
}

impl Default for CheckerData {
    /// Zero errors, passed - the fallback when the payload is undecodable.
    fn default() -> Self {
        Self {
            passed: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            checks_performed: Vec::new(),
        }
    }
}

/// Extract planner data. Defining field: `end_goal`.
pub fn extract_planner(payload: &Value) -> Option<PlannerData> {
    let end_goal = payload.get("end_goal")?.as_str()?.to_string();
    Some(PlannerData {
        end_goal,
        integration_instructions: payload
            .get("integration_instructions")
            .and_then(Value::as_str)
            .map(str::to_string),
        source_exploration: string_list(payload.get("source_exploration")),
        target_exploration: string_list(payload.get("target_exploration")),
    })
}

/// Extract source agent data. Defining field: `source_summary`.
pub fn extract_source(payload: &Value) -> Option<SourceData> {
    payload.get("source_summary")?;
    Some(SourceData {
        summary: string_list(payload.get("source_summary")),
        tech: tech_stack(payload.get("source_metadata")),
        paths: string_list(payload.get("source_path")),
        copied_files: file_paths(payload.get("copied_files")),
    })
}

/// Extract target agent data. Defining field: `target_summary`.
pub fn extract_target(payload: &Value) -> Option<TargetData> {
    payload.get("target_summary")?;
    Some(TargetData {
        summary: string_list(payload.get("target_summary")),
        tech: tech_stack(payload.get("target_metadata")),
        paths: string_list(payload.get("target_path")),
        paste_instructions: string_list(payload.get("target_paste_instructions")),
        components_to_replace: string_list(payload.get("components_to_replace")),
    })
}

/// Extract paster data. Defining field: `pasted_files`.
pub fn extract_paster(payload: &Value) -> Option<PasterData> {
    let files = payload.get("pasted_files")?;
    let pasted_files = match files {
        Value::Array(items) => items.iter().filter_map(pasted_file).collect(),
        Value::String(path) => vec![PastedFile {
            path: path.clone(),
            status: None,
        }],
        _ => Vec::new(),
    };
    Some(PasterData { pasted_files })
}

/// Extract integrator data. Defining field: `integration_summary`.
pub fn extract_integrator(payload: &Value) -> Option<IntegratorData> {
    let summary = payload.get("integration_summary")?.as_str()?.to_string();
    Some(IntegratorData {
        summary,
        changeset: string_list(payload.get("changeset")),
        wiring_changes: string_list(payload.get("wiring_changes")),
        dependency_changes: string_list(payload.get("dependency_changes")),
        config_changes: string_list(payload.get("config_changes")),
    })
}

/// Extract checker data. Defining field: `check_output`.
///
/// The payload may be structured JSON or a JSON-encoded string; if the
/// inner decode fails, default to zero errors / passed.
pub fn extract_checker(payload: &Value) -> Option<CheckerData> {
    let output = payload.get("check_output")?;
    let structured: Value = match output {
        Value::String(encoded) => match serde_json::from_str(encoded) {
            Ok(inner) => inner,
            Err(_) => return Some(CheckerData::default()),
        },
        other => other.clone(),
    };

    Some(CheckerData {
        passed: structured
            .get("passed")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        errors: string_list(structured.get("errors")),
        warnings: string_list(structured.get("warnings")),
        checks_performed: string_list(structured.get("checks_performed")),
    })
}

/// `pasted_files` entries are objects with a `path` (sometimes `file`) key,
/// or bare path strings.
fn pasted_file(value: &Value) -> Option<PastedFile> {
    match value {
        Value::String(path) => Some(PastedFile {
            path: path.clone(),
            status: None,
        }),
        Value::Object(map) => {
            let path = map
                .get("path")
                .or_else(|| map.get("file"))
                .and_then(Value::as_str)?
                .to_string();
            Some(PastedFile {
                path,
                status: map.get("status").and_then(Value::as_str).map(str::to_string),
            })
        }
        _ => None,
    }
}

/// `copied_files` entries are `{path, ...}` objects from the copy tool.
fn file_paths(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map
                    .get("path")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
