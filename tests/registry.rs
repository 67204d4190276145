//! Registry Tests
//!
//! Exercises the versioned store against the in-memory and filesystem
//! directories.

use std::sync::Arc;
use std::thread;

use event_schemas::{
    bind, FieldType, FsDirectory, MemoryDirectory, PrimitiveKind, QualifiedName, Reflector,
    SchemaDocument, SchemaError, SchemaRegistry, TypeDescriptor,
};
use serde_json::json;

const REGISTRY: &str = "TAPI-TEST";
const NAME: &str = "schema_registry.test.TestingModel";

fn testing_model() -> TypeDescriptor {
    Reflector::new()
        .compile(&SchemaDocument::new(include_str!("fixtures/testing_model.json")))
        .unwrap()
}

fn qualified() -> QualifiedName {
    NAME.parse().unwrap()
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_drains_every_page() {
    let directory = Arc::new(MemoryDirectory::with_page_size(1));
    for name in ["ns.One", "ns.Two", "ns.Three"] {
        for version in ["1", "2", "3"] {
            directory.insert_version(REGISTRY, name, version, format!(r#"{{"v":{}}}"#, version));
        }
    }

    let registry = SchemaRegistry::new(directory.clone(), REGISTRY);
    registry.load_all().unwrap();
    assert_eq!(registry.schema_names(), vec!["ns.One", "ns.Three", "ns.Two"]);
    assert_eq!(directory.calls().list_schemas, 3);

    // histories are fetched on first access
    assert_eq!(directory.calls().list_versions, 0);
    let record = registry.get("ns.Two").unwrap();
    assert_eq!(record.len(), 3);
    assert_eq!(directory.calls().list_versions, 3);
    assert_eq!(record.to_string(), "Schema<ns.Two, versions: 3, default version: 3>");
}

#[test]
fn test_default_version_after_out_of_order_inserts() {
    let directory = MemoryDirectory::new();
    directory.insert_version(REGISTRY, NAME, "2", r#"{"v":2}"#);
    directory.insert_version(REGISTRY, NAME, "3", r#"{"v":3}"#);
    directory.insert_version(REGISTRY, NAME, "1", r#"{"v":1}"#);

    let registry = SchemaRegistry::new(directory, REGISTRY);
    registry.load_all().unwrap();

    let content = registry.version_content(NAME, None).unwrap();
    assert_eq!(content.content(), r#"{"v":3}"#);
    let first = registry.version_content(NAME, Some("1")).unwrap();
    assert_eq!(first.content(), r#"{"v":1}"#);
}

#[test]
fn test_version_content_missing_version() {
    let directory = MemoryDirectory::new();
    directory.insert_version(REGISTRY, NAME, "1", "{}");
    let registry = SchemaRegistry::new(directory, REGISTRY);
    registry.load_all().unwrap();

    match registry.version_content(NAME, Some("7")) {
        Err(SchemaError::NotFound { name, version }) => {
            assert_eq!(name, NAME);
            assert_eq!(version, "7");
        }
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn test_register_twice_is_idempotent() {
    let directory = Arc::new(MemoryDirectory::new());
    let registry = SchemaRegistry::new(directory.clone(), REGISTRY);

    let first = registry.register_or_update(&qualified(), &testing_model()).unwrap();
    let second = registry.register_or_update(&qualified(), &testing_model()).unwrap();

    assert_eq!(first, second);
    assert_eq!(directory.version_count(REGISTRY, NAME), 1);
    assert_eq!(directory.calls().create, 1);
    assert_eq!(directory.calls().update, 1);
}

#[test]
fn test_register_existing_schema_from_another_process() {
    let directory = Arc::new(MemoryDirectory::new());
    SchemaRegistry::new(directory.clone(), REGISTRY)
        .register_or_update(&qualified(), &testing_model())
        .unwrap();

    // a fresh store sees the stored content as unchanged
    let registry = SchemaRegistry::new(directory.clone(), REGISTRY);
    let version = registry.register_or_update(&qualified(), &testing_model()).unwrap();
    assert_eq!(version.version.as_str(), "1");
    assert_eq!(registry.get(NAME).unwrap().len(), 1);
    assert!(registry.schema_for(&testing_model().handle()).is_ok());
}

#[test]
fn test_schema_for_unregistered_model() {
    let registry = SchemaRegistry::new(MemoryDirectory::new(), REGISTRY);
    match registry.schema_for(&testing_model().handle()) {
        Err(SchemaError::ModelNotRegistered(handle)) => assert_eq!(handle.name(), "TestingModel"),
        other => panic!("Expected ModelNotRegistered, got {:?}", other),
    }
}

#[test]
fn test_concurrent_registration_creates_one_version() {
    let directory = Arc::new(MemoryDirectory::new());
    let registry = Arc::new(SchemaRegistry::new(directory.clone(), REGISTRY));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.register_or_update(&qualified(), &testing_model()))
        })
        .collect();

    for handle in handles {
        let version = handle.join().unwrap().unwrap();
        assert_eq!(version.version.as_str(), "1");
    }
    assert_eq!(directory.version_count(REGISTRY, NAME), 1);
}

// =============================================================================
// Stored Documents
// =============================================================================

#[test]
fn test_nested_definitions_come_back_flattened() {
    let leaf = TypeDescriptor::new("Leaf").field("value", FieldType::Primitive(PrimitiveKind::String), true);
    let inner = TypeDescriptor::new("Inner")
        .definition("Leaf", leaf.clone())
        .field("leaf", FieldType::reference(leaf.clone()), true);
    let outer = TypeDescriptor::new("Outer")
        .definition("Inner", inner.clone())
        .field("inner", FieldType::reference(inner), true);

    let directory = Arc::new(MemoryDirectory::new());
    let registry = SchemaRegistry::new(directory.clone(), REGISTRY);
    let name: QualifiedName = "ns.Outer".parse().unwrap();
    registry.register_or_update(&name, &outer).unwrap();

    let reflected = registry.reflect("ns.Outer", None).unwrap();
    let names: Vec<&str> = reflected.definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Leaf", "Inner"]);
    assert_eq!(reflected.get_definition("Leaf"), Some(&leaf));

    let flattened = reflected.get_definition("Inner").unwrap();
    assert!(flattened.definitions.is_empty());
    assert_eq!(flattened.get_field("leaf").unwrap().field_type, FieldType::reference(leaf));
    assert_eq!(reflected.to_schema(), outer.to_schema());

    // the flattened form serializes to the stored content
    let again = registry.register_or_update(&name, &reflected).unwrap();
    assert_eq!(again.version.as_str(), "1");
    assert_eq!(directory.version_count(REGISTRY, "ns.Outer"), 1);
}

#[test]
fn test_same_named_references_stay_distinct() {
    let by_id = TypeDescriptor::new("Item").field("id", FieldType::Primitive(PrimitiveKind::Int), true);
    let by_label = TypeDescriptor::new("Item").field("label", FieldType::Primitive(PrimitiveKind::String), true);
    let order = TypeDescriptor::new("Order")
        .field("first", FieldType::reference(by_id), true)
        .field("second", FieldType::reference(by_label), true);

    let registry = SchemaRegistry::new(MemoryDirectory::new(), REGISTRY);
    let name: QualifiedName = "ns.Order".parse().unwrap();
    registry.register_or_update(&name, &order).unwrap();

    let reflected = registry.reflect("ns.Order", None).unwrap();
    assert_eq!(reflected.fields, order.fields);
    assert_eq!(reflected.handle(), order.handle());

    let payload = json!({"first": {"id": 1}, "second": {"label": "x"}});
    assert_eq!(bind(&reflected, &payload).unwrap(), payload);

    let other = TypeDescriptor::new("Order").field(
        "first",
        FieldType::reference(TypeDescriptor::new("Item").field("label", FieldType::Primitive(PrimitiveKind::String), true)),
        true,
    );
    assert!(matches!(
        registry.schema_for(&other.handle()),
        Err(SchemaError::ModelNotRegistered(_))
    ));
}

// =============================================================================
// Filesystem Directory
// =============================================================================

#[test]
fn test_filesystem_registry_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = testing_model();

    let registry = SchemaRegistry::new(FsDirectory::open(dir.path()).unwrap(), REGISTRY);
    let version = registry.register_or_update(&qualified(), &descriptor).unwrap();
    assert_eq!(version.version.as_str(), "1");

    let reopened = SchemaRegistry::new(FsDirectory::open(dir.path()).unwrap(), REGISTRY);
    reopened.load_all().unwrap();
    assert_eq!(reopened.schema_names(), vec![NAME.to_string()]);
    assert_eq!(reopened.version_content(NAME, None).unwrap(), descriptor.to_document());
    assert_eq!(reopened.reflect(NAME, Some("1")).unwrap(), descriptor);
}
