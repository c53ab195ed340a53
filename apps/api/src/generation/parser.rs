//! Response parsing and schema validation for generated proposals.
//!
//! Pure and deterministic: raw provider text in, validated section map out.
//! A `ParseError` here is the only thing that triggers the orchestrator's
//! single stricter retry.

use serde_json::{Map, Value};
use thiserror::Error;

/// Every section the model must return. `objectives` and `main_modules`
/// must additionally be arrays.
pub const REQUIRED_KEYS: &[&str] = &[
    "project_title",
    "introduction",
    "objectives",
    "problem_statement",
    "proposed_system",
    "main_modules",
    "expected_outcomes",
    "tools_and_technology",
];

const ARRAY_KEYS: &[&str] = &["objectives", "main_modules"];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Response must be a JSON object")]
    NotAnObject,

    #[error("Response missing keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("Field '{0}' must be an array")]
    NotAnArray(&'static str),
}

/// Parses raw model output into a validated section map.
///
/// Step 1: strict parse of the whole text. Step 2: on failure, extract the
/// span between the first `{` and last `}` (models often wrap JSON in
/// prose). Step 3: validate against the required-field schema.
pub fn parse_sections(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(v) => v,
        Err(_) => {
            let span = extract_json_object(raw)?;
            serde_json::from_str::<Value>(span)
                .map_err(|e| ParseError::Malformed(e.to_string()))?
        }
    };

    let sections = match value {
        Value::Object(map) => map,
        _ => return Err(ParseError::NotAnObject),
    };

    validate_sections(&sections)?;
    Ok(sections)
}

/// Returns the substring between the first `{` and the last `}`.
fn extract_json_object(text: &str) -> Result<&str, ParseError> {
    let first = text.find('{');
    let last = text.rfind('}');
    match (first, last) {
        (Some(first), Some(last)) if last > first => Ok(&text[first..=last]),
        _ => Err(ParseError::Malformed("No JSON object found".to_string())),
    }
}

/// Checks the required-field schema. Missing keys are all named at once so
/// the caller (and the logs) see the complete violation.
pub fn validate_sections(sections: &Map<String, Value>) -> Result<(), ParseError> {
    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|key| !sections.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ParseError::MissingKeys(missing));
    }

    for &key in ARRAY_KEYS {
        if !sections.get(key).map(Value::is_array).unwrap_or(false) {
            return Err(ParseError::NotAnArray(match key {
                "objectives" => "objectives",
                _ => "main_modules",
            }));
        }
    }

    Ok(())
}
