//! JSON Schema validation for transport rules.
//!
//! Rule payloads are validated against spec/rule.schema.json before
//! structural decode so malformed documents fail with a field-level
//! message instead of a serde error deep in a tree.

use std::sync::OnceLock;

/// Embedded rule schema (loaded at compile time).
const RULE_SCHEMA_JSON: &str = include_str!("../../../../spec/rule.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(RULE_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(e.clone()),
    }
}

/// Validate a rule JSON value against the schema.
///
/// Returns `Ok(())` if valid, or a list of validation error messages.
pub fn validate_rule_schema(rule_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(rule_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_rule_passes_schema() {
        let value = json!({
            "name": "Discount",
            "valueType": "f64",
            "failureValue": 0.0,
            "conditionSets": [
                {
                    "name": "Adults",
                    "value": 0.1,
                    "root": {
                        "conditionName": "IsAdult",
                        "contextType": "Customer",
                        "expression": "age >= 18"
                    }
                }
            ]
        });
        assert!(validate_rule_schema(&value).is_ok());
    }

    #[test]
    fn test_missing_name_fails() {
        let value = json!({ "valueType": "f64" });
        let errors = validate_rule_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_bad_operator_fails() {
        let value = json!({
            "name": "Discount",
            "valueType": "f64",
            "conditionSets": [
                {
                    "name": "Adults",
                    "root": { "operator": "Nand" }
                }
            ]
        });
        assert!(validate_rule_schema(&value).is_err());
    }

    #[test]
    fn test_wrong_type_fails() {
        let value = json!({ "name": 42, "valueType": "f64" });
        assert!(validate_rule_schema(&value).is_err());
    }
}
