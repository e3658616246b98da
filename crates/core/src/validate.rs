#![forbid(unsafe_code)]

use crate::contract::{FieldKind, ToolContract};
use serde_json::{Map, Value};

/// Validation stops at the first offending field so every error names exactly
/// one field and one expected kind. Unknown fields in the raw arguments are
/// ignored; clients may send extra keys without breaking older servers.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationError {
    NotAnObject,
    MissingField {
        field: &'static str,
    },
    KindMismatch {
        field: &'static str,
        expected: String,
        actual: Value,
    },
    NotInEnum {
        field: &'static str,
        expected: String,
        actual: String,
    },
}

impl ValidationError {
    pub fn message(&self) -> String {
        match self {
            Self::NotAnObject => "arguments must be an object".to_string(),
            Self::MissingField { field } => format!("{field} is required"),
            Self::KindMismatch {
                field,
                expected,
                actual,
            } => format!("{field} must be {expected}, got {actual}"),
            Self::NotInEnum {
                field,
                expected,
                actual,
            } => format!("{field} must be {expected}, got \"{actual}\""),
        }
    }
}

/// Check raw arguments against a contract and produce the validated mapping.
///
/// On success every contract field with a supplied value or a default is
/// present in the output with a value of its declared kind. Optional fields
/// without defaults stay absent. `null` counts as absent for optional fields
/// and as a kind mismatch for required ones.
pub fn validate(
    contract: &ToolContract,
    raw_args: &Value,
) -> Result<Map<String, Value>, ValidationError> {
    let empty = Map::new();
    let raw = match raw_args {
        Value::Null => &empty,
        Value::Object(obj) => obj,
        _ => return Err(ValidationError::NotAnObject),
    };

    let mut out = Map::new();
    for field in contract.fields() {
        let supplied = match raw.get(field.name) {
            None | Some(Value::Null) if !field.required => {
                if let Some(default) = field.default.as_ref() {
                    out.insert(field.name.to_string(), default.clone());
                }
                continue;
            }
            None => return Err(ValidationError::MissingField { field: field.name }),
            Some(value) => value,
        };

        if !field.kind.matches(supplied) {
            return Err(ValidationError::KindMismatch {
                field: field.name,
                expected: field.kind.label(),
                actual: supplied.clone(),
            });
        }

        if let FieldKind::Enum(values) = &field.kind {
            let actual = supplied.as_str().unwrap_or_default();
            if !values.contains(&actual) {
                return Err(ValidationError::NotInEnum {
                    field: field.name,
                    expected: field.kind.label(),
                    actual: actual.to_string(),
                });
            }
        }

        out.insert(field.name.to_string(), supplied.clone());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FieldSpec;
    use serde_json::json;

    fn echo_contract() -> ToolContract {
        ToolContract::new(vec![FieldSpec::required("msg", FieldKind::String)]).unwrap()
    }

    #[test]
    fn missing_required_field_names_the_field() {
        let err = validate(&echo_contract(), &json!({})).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "msg" });
    }

    #[test]
    fn kind_mismatch_reports_expected_kind() {
        let err = validate(&echo_contract(), &json!({ "msg": 7 })).unwrap_err();
        match err {
            ValidationError::KindMismatch { field, expected, .. } => {
                assert_eq!(field, "msg");
                assert_eq!(expected, "string");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_is_substituted_when_absent() {
        let contract = ToolContract::new(vec![FieldSpec::with_default(
            "lines",
            FieldKind::Integer,
            json!(100),
        )])
        .unwrap();

        let out = validate(&contract, &json!({})).unwrap();
        assert_eq!(out.get("lines"), Some(&json!(100)));
    }

    #[test]
    fn null_counts_as_absent_for_optional_fields() {
        let contract = ToolContract::new(vec![FieldSpec::with_default(
            "lines",
            FieldKind::Integer,
            json!(100),
        )])
        .unwrap();

        let out = validate(&contract, &json!({ "lines": null })).unwrap();
        assert_eq!(out.get("lines"), Some(&json!(100)));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let out = validate(&echo_contract(), &json!({ "msg": "hi", "extra": true })).unwrap();
        assert_eq!(out.get("msg"), Some(&json!("hi")));
        assert!(!out.contains_key("extra"));
    }

    #[test]
    fn enum_membership_is_enforced() {
        static STATES: &[&str] = &["open", "closed"];
        let contract =
            ToolContract::new(vec![FieldSpec::required("state", FieldKind::Enum(STATES))])
                .unwrap();

        assert!(validate(&contract, &json!({ "state": "open" })).is_ok());
        let err = validate(&contract, &json!({ "state": "merged" })).unwrap_err();
        match err {
            ValidationError::NotInEnum { field, actual, .. } => {
                assert_eq!(field, "state");
                assert_eq!(actual, "merged");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_stops_at_the_first_invalid_field() {
        let contract = ToolContract::new(vec![
            FieldSpec::required("a", FieldKind::String),
            FieldSpec::required("b", FieldKind::String),
        ])
        .unwrap();

        let err = validate(&contract, &json!({})).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "a" });
    }

    #[test]
    fn arguments_must_be_an_object() {
        let err = validate(&echo_contract(), &json!([1, 2])).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject);
    }

    #[test]
    fn null_arguments_behave_like_an_empty_object() {
        let contract = ToolContract::new(vec![FieldSpec::optional("path", FieldKind::String)])
            .unwrap();
        let out = validate(&contract, &Value::Null).unwrap();
        assert!(out.is_empty());
    }
}
