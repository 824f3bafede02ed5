//! Input validation.
//!
//! - Entity names: trimmed, must not be empty
//! - Pipeline options: JSON Schema Draft 7, embedded at compile time from
//!   `schemas/pipeline-options.json`
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use covidash::validation::{validate_entity_name, is_valid_pipeline_options};
//!
//! assert_eq!(validate_entity_name("  France  ", 2).unwrap(), "France");
//! assert!(is_valid_pipeline_options(&json!({ "movingAverageWindow": 7 })));
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::{ValidationError, ValidationResult};

static PIPELINE_OPTIONS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/pipeline-options.json"))
        .expect("Invalid embedded schema")
});

/// Trim an entity name, rejecting names that are empty afterwards.
///
/// `line` is the source line, used in the error.
pub fn validate_entity_name(raw: &str, line: usize) -> ValidationResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyEntity { line });
    }
    Ok(trimmed.to_string())
}

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every error otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate raw pipeline options before deserializing them.
pub fn validate_pipeline_options(data: &Value) -> ValidationResult<()> {
    validate(&PIPELINE_OPTIONS_SCHEMA, data)
        .map_err(|errors| ValidationError::InvalidOptions { errors })
}

/// Quick check against the options schema.
pub fn is_valid_pipeline_options(data: &Value) -> bool {
    jsonschema::draft7::is_valid(&PIPELINE_OPTIONS_SCHEMA, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_name_trimmed() {
        assert_eq!(validate_entity_name("  France  ", 2).unwrap(), "France");
        assert_eq!(validate_entity_name("Korea, South", 2).unwrap(), "Korea, South");
    }

    #[test]
    fn test_entity_name_empty() {
        assert_eq!(
            validate_entity_name(" \t ", 9),
            Err(ValidationError::EmptyEntity { line: 9 })
        );
    }

    #[test]
    fn test_valid_options() {
        let options = json!({
            "entityColumn": "Country/Region",
            "dateFormats": ["%m/%d/%y"],
            "percentPrecision": 4,
            "movingAverageWindow": 7,
            "entities": ["France", "Italy"],
            "startDate": "2020-03-01",
            "endDate": null
        });
        assert!(is_valid_pipeline_options(&options));
        assert!(validate_pipeline_options(&json!({})).is_ok());
    }

    #[test]
    fn test_invalid_options() {
        let options = json!({
            "movingAverageWindow": 0,
            "dateFormats": [],
            "startDate": "March 1st"
        });
        let err = validate_pipeline_options(&options).unwrap_err();
        match err {
            ValidationError::InvalidOptions { errors } => assert!(errors.len() >= 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_option_rejected() {
        assert!(!is_valid_pipeline_options(&json!({ "colour": "red" })));
    }
}
