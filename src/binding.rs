//! Binding JSON values to type descriptors
//!
//! Binding checks a payload against a [`TypeDescriptor`] and produces a value
//! holding only the declared fields.

use serde_json::{Map, Number, Value};

use crate::descriptor::{FieldType, PrimitiveKind, TypeDescriptor};
use crate::error::{Result, SchemaError};

/// Bind `value` to `descriptor`.
///
/// Undeclared keys are dropped. Optional fields that are missing or `null`
/// are left out; required ones fail the bind.
pub fn bind(descriptor: &TypeDescriptor, value: &Value) -> Result<Value> {
    bind_object(descriptor, value, "")
}

fn bind_object(descriptor: &TypeDescriptor, value: &Value, path: &str) -> Result<Value> {
    let object = value.as_object().ok_or_else(|| {
        SchemaError::invalid_payload(path, format!("expected an object for {}", descriptor.name))
    })?;

    let mut bound = Map::new();
    for field in &descriptor.fields {
        let field_path = if path.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", path, field.name)
        };
        match object.get(&field.name) {
            None | Some(Value::Null) if field.required => {
                return Err(SchemaError::invalid_payload(&field_path, "field required"));
            }
            None | Some(Value::Null) => {}
            Some(raw) => {
                bound.insert(field.name.clone(), bind_field(&field.field_type, raw, &field_path)?);
            }
        }
    }
    Ok(Value::Object(bound))
}

fn bind_field(field_type: &FieldType, value: &Value, path: &str) -> Result<Value> {
    match field_type {
        FieldType::Primitive(kind) => bind_primitive(*kind, value, path),
        FieldType::Reference(target) => bind_object(target, value, path),
        FieldType::ArrayOf(element) => {
            let items = value
                .as_array()
                .ok_or_else(|| SchemaError::invalid_payload(path, "expected an array"))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| bind_field(element, item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
    }
}

fn bind_primitive(kind: PrimitiveKind, value: &Value, path: &str) -> Result<Value> {
    match (kind, value) {
        (PrimitiveKind::String, Value::String(_)) | (PrimitiveKind::Bool, Value::Bool(_)) => {
            Ok(value.clone())
        }
        (PrimitiveKind::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        (PrimitiveKind::Int, Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Ok(Value::Number(Number::from(f as i64)))
            }
            _ => Err(SchemaError::invalid_payload(path, format!("{} is not an integer", n))),
        },
        _ => Err(SchemaError::invalid_payload(
            path,
            format!("expected {}, got {}", kind.json_type(), value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group() -> TypeDescriptor {
        TypeDescriptor::new("Group")
            .field("id", FieldType::Primitive(PrimitiveKind::Int), true)
            .field("name", FieldType::Primitive(PrimitiveKind::String), true)
    }

    fn complex() -> TypeDescriptor {
        TypeDescriptor::new("ComplexModel")
            .field("name", FieldType::Primitive(PrimitiveKind::String), true)
            .field("active", FieldType::Primitive(PrimitiveKind::Bool), false)
            .field("groups", FieldType::array_of(FieldType::reference(group())), true)
    }

    fn failure_path(result: Result<Value>) -> String {
        match result {
            Err(SchemaError::InvalidPayload { path, .. }) => path,
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_binds_declared_fields() {
        let payload = json!({
            "name": "ozzeh",
            "groups": [{"id": 1, "name": "admins"}],
            "unknown": true
        });
        let bound = bind(&complex(), &payload).unwrap();
        assert_eq!(bound, json!({"name": "ozzeh", "groups": [{"id": 1, "name": "admins"}]}));
    }

    #[test]
    fn test_empty_array_is_valid() {
        let bound = bind(&complex(), &json!({"name": "n", "groups": []})).unwrap();
        assert_eq!(bound["groups"], json!([]));
    }

    #[test]
    fn test_null_optional_is_dropped() {
        let bound = bind(&complex(), &json!({"name": "n", "active": null, "groups": []})).unwrap();
        assert!(bound.get("active").is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let path = failure_path(bind(&complex(), &json!({"groups": []})));
        assert_eq!(path, "name");
    }

    #[test]
    fn test_nested_failure_path() {
        let payload = json!({"name": "n", "groups": [{"id": 1, "name": "a"}, {"id": "two", "name": "b"}]});
        assert_eq!(failure_path(bind(&complex(), &payload)), "groups[1].id");
    }

    #[test]
    fn test_integral_floats_are_normalized() {
        let bound = bind(&group(), &json!({"id": 3.0, "name": "g"})).unwrap();
        assert_eq!(bound["id"], json!(3));
        assert_eq!(failure_path(bind(&group(), &json!({"id": 3.5, "name": "g"}))), "id");
    }

    #[test]
    fn test_non_object_payload() {
        assert_eq!(failure_path(bind(&group(), &json!([1, 2]))), "$");
    }
}
