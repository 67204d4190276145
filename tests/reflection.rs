//! Reflection Tests
//!
//! Compiles fixture documents and binds payloads against the results.

use event_schemas::{
    bind, FieldType, PrimitiveKind, Reflector, SchemaDocument, SchemaError, TypeDescriptor,
};
use serde_json::json;

fn compile(content: &str) -> Result<TypeDescriptor, SchemaError> {
    Reflector::new().compile(&SchemaDocument::new(content))
}

// =============================================================================
// Field Reflection
// =============================================================================

#[test]
fn test_testing_model_fields() {
    let descriptor = compile(include_str!("fixtures/testing_model.json")).unwrap();
    assert_eq!(descriptor.name, "TestingModel");

    let name = descriptor.get_field("name").unwrap();
    assert_eq!(name.field_type, FieldType::Primitive(PrimitiveKind::String));
    assert!(name.required);

    let description = descriptor.get_field("description").unwrap();
    assert_eq!(description.field_type, FieldType::Primitive(PrimitiveKind::String));
    assert!(!description.required);
}

#[test]
fn test_fields_and_required_flags_match_document() {
    let content = include_str!("fixtures/complex_model.json");
    let document: serde_json::Value = serde_json::from_str(content).unwrap();
    let descriptor = compile(content).unwrap();

    let properties = document["properties"].as_object().unwrap();
    let declared: Vec<&str> = properties.keys().map(String::as_str).collect();
    let reflected: Vec<&str> = descriptor.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(reflected, declared);

    let required: Vec<&str> = descriptor.required_fields().collect();
    assert_eq!(required, vec!["id", "active"]);
    assert_eq!(descriptor.description.as_deref(), Some("Hi mom"));
    assert_eq!(
        descriptor.get_field("score").unwrap().field_type,
        FieldType::Primitive(PrimitiveKind::Int)
    );
}

#[test]
fn test_array_of_reference() {
    let descriptor = compile(include_str!("fixtures/complex_referenced_model.json")).unwrap();
    let group = descriptor.get_definition("Group").unwrap().clone();
    assert_eq!(group.required_fields().collect::<Vec<_>>(), vec!["id", "name"]);

    assert_eq!(
        descriptor.get_field("groups").unwrap().field_type,
        FieldType::array_of(FieldType::reference(group.clone()))
    );
    assert_eq!(
        descriptor.get_field("owner").unwrap().field_type,
        FieldType::reference(group)
    );
}

#[test]
fn test_serialized_descriptor_reflects_back() {
    let descriptor = compile(include_str!("fixtures/complex_referenced_model.json")).unwrap();
    let reflected = Reflector::new().compile(&descriptor.to_document()).unwrap();
    assert_eq!(reflected, descriptor);
    assert_eq!(reflected.handle(), descriptor.handle());
}

// =============================================================================
// Reference Ordering
// =============================================================================

#[test]
fn test_reference_to_earlier_definition() {
    let descriptor = compile(include_str!("fixtures/ordered_definitions.json")).unwrap();
    let a = descriptor.get_definition("A").unwrap();
    let b = descriptor.get_definition("B").unwrap();
    assert_eq!(b.get_field("a").unwrap().field_type, FieldType::reference(a.clone()));
    assert_eq!(descriptor.get_field("b").unwrap().field_type, FieldType::reference(b.clone()));
}

#[test]
fn test_reference_to_later_definition_fails() {
    let result = compile(include_str!("fixtures/forward_reference.json"));
    match result {
        Err(SchemaError::UnresolvableReference(_)) => {}
        other => panic!("Expected UnresolvableReference, got {:?}", other),
    }
}

// =============================================================================
// Binding
// =============================================================================

#[test]
fn test_empty_groups_accepted() {
    let descriptor = compile(include_str!("fixtures/complex_referenced_model.json")).unwrap();
    let bound = bind(&descriptor, &json!({"name": "team", "groups": []})).unwrap();
    assert_eq!(bound, json!({"name": "team", "groups": []}));
}

#[test]
fn test_nested_binding_failure_path() {
    let descriptor = compile(include_str!("fixtures/complex_referenced_model.json")).unwrap();
    let payload = json!({
        "name": "team",
        "groups": [
            {"id": 1, "name": "one"},
            {"id": "two", "name": "two"}
        ]
    });
    match bind(&descriptor, &payload) {
        Err(SchemaError::InvalidPayload { path, .. }) => assert_eq!(path, "groups[1].id"),
        other => panic!("Expected InvalidPayload, got {:?}", other),
    }
}

#[test]
fn test_binding_drops_undeclared_keys() {
    let descriptor = compile(include_str!("fixtures/complex_model.json")).unwrap();
    let bound = bind(
        &descriptor,
        &json!({"id": 3.0, "active": true, "label": null, "extra": "dropped"}),
    )
    .unwrap();
    assert_eq!(bound, json!({"id": 3, "active": true}));
}
