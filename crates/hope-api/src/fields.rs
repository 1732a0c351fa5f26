//! JSON request fields to SQL column values, driven by [`FieldSpec`] allow-lists.

use hope_db::Value;
use serde_json::{Map, Value as Json};

use hope_types::sanctuary::{DefaultValue, FieldKind, FieldSpec};

use crate::error::ApiError;

const INVALID: ApiError = ApiError::BadRequest("Invalid field value");
const MISSING: ApiError = ApiError::BadRequest("Missing required fields");

/// Converts one JSON value according to its field kind.
///
/// Text is trimmed and blank text is stored as NULL. Required fields may not
/// be cleared, and flags are never NULL.
pub fn sql_value(spec: &FieldSpec, value: &Json) -> Result<Value, ApiError> {
    let converted = match (spec.kind, value) {
        (FieldKind::Bool, Json::Null) => return Err(INVALID),
        (_, Json::Null) => Value::Null,
        (FieldKind::Text, Json::String(s)) => match s.trim() {
            "" => Value::Null,
            trimmed => Value::Text(trimmed.to_string()),
        },
        (FieldKind::Integer, Json::Number(n)) => Value::Integer(n.as_i64().ok_or(INVALID)?),
        (FieldKind::Bool, Json::Bool(b)) => Value::Integer(i64::from(*b)),
        _ => return Err(INVALID),
    };

    if spec.required && converted == Value::Null {
        return Err(INVALID);
    }
    Ok(converted)
}

/// Values for a new row: every required field must be present and non-blank;
/// absent optional fields fall back to their default, if any.
pub fn create_values(specs: &'static [FieldSpec], body: &Map<String, Json>) -> Result<Vec<(&'static str, Value)>, ApiError> {
    let mut values = Vec::with_capacity(specs.len());
    for spec in specs {
        match body.get(spec.name) {
            Some(value) if spec.required && is_blank(value) => return Err(MISSING),
            Some(value) => values.push((spec.name, sql_value(spec, value)?)),
            None if spec.required => return Err(MISSING),
            None => {
                if let Some(DefaultValue::Bool(b)) = spec.default {
                    values.push((spec.name, Value::Integer(i64::from(b))));
                }
            }
        }
    }
    Ok(values)
}

/// Changes for an update: only allow-listed keys present in the body.
pub fn update_values(specs: &'static [FieldSpec], body: &Map<String, Json>) -> Result<Vec<(&'static str, Value)>, ApiError> {
    specs
        .iter()
        .filter_map(|spec| body.get(spec.name).map(|value| (spec, value)))
        .map(|(spec, value)| Ok((spec.name, sql_value(spec, value)?)))
        .collect()
}

fn is_blank(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SPECS: &[FieldSpec] = &[
        FieldSpec::required_text("title"),
        FieldSpec::integer("severity"),
        FieldSpec::flag("completed", false),
        FieldSpec::text("notes"),
    ];

    fn body(value: Json) -> Map<String, Json> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn create_applies_defaults_and_trims() {
        let values = create_values(SPECS, &body(json!({ "title": "  Walk  ", "ignored": 1 }))).unwrap();
        assert_eq!(
            values,
            vec![
                ("title", Value::Text("Walk".into())),
                ("completed", Value::Integer(0)),
            ]
        );
    }

    #[test]
    fn create_requires_required_fields() {
        assert!(matches!(
            create_values(SPECS, &body(json!({ "notes": "x" }))),
            Err(ApiError::BadRequest("Missing required fields"))
        ));
        assert!(matches!(
            create_values(SPECS, &body(json!({ "title": "   " }))),
            Err(ApiError::BadRequest("Missing required fields"))
        ));
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(matches!(
            create_values(SPECS, &body(json!({ "title": "t", "severity": "high" }))),
            Err(ApiError::BadRequest("Invalid field value"))
        ));
        assert!(matches!(
            update_values(SPECS, &body(json!({ "completed": "yes" }))),
            Err(ApiError::BadRequest("Invalid field value"))
        ));
        assert!(matches!(
            create_values(SPECS, &body(json!({ "title": "t", "completed": null }))),
            Err(ApiError::BadRequest("Invalid field value"))
        ));
        assert!(matches!(
            update_values(SPECS, &body(json!({ "completed": null }))),
            Err(ApiError::BadRequest("Invalid field value"))
        ));
    }

    #[test]
    fn update_takes_only_present_fields() {
        let values = update_values(SPECS, &body(json!({ "completed": true, "notes": null }))).unwrap();
        assert_eq!(values, vec![("completed", Value::Integer(1)), ("notes", Value::Null)]);
        assert!(update_values(SPECS, &body(json!({ "other": 1 }))).unwrap().is_empty());
    }

    #[test]
    fn required_fields_cannot_be_cleared() {
        assert!(update_values(SPECS, &body(json!({ "title": null }))).is_err());
    }
}
