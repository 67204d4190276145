//! Structural type descriptors
//!
//! A [`TypeDescriptor`] is the data-only form of a reflected schema: an
//! ordered list of fields, each a primitive, a reference to another
//! descriptor, or an array of one of those. Descriptors serialize back to
//! draft-04 JSON Schema documents so they can be registered.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::checksum::Checksum;
use crate::schema::SchemaDocument;

/// Prefix of the only `$ref` form reflection understands
pub const DEFINITIONS_POINTER: &str = "#/definitions/";

/// Scalar kinds a field can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Bool,
    Int,
}

impl PrimitiveKind {
    /// JSON Schema `type` keyword for this kind
    pub fn json_type(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::Int => "integer",
        }
    }
}

/// Type of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    Primitive(PrimitiveKind),
    Reference(Box<TypeDescriptor>),
    ArrayOf(Box<FieldType>),
}

impl FieldType {
    pub fn reference(target: TypeDescriptor) -> Self {
        FieldType::Reference(Box::new(target))
    }

    pub fn array_of(element: FieldType) -> Self {
        FieldType::ArrayOf(Box::new(element))
    }

    /// The descriptor this type ultimately points at, looking through arrays
    pub fn target(&self) -> Option<&TypeDescriptor> {
        match self {
            FieldType::Primitive(_) => None,
            FieldType::Reference(target) => Some(target),
            FieldType::ArrayOf(element) => element.target(),
        }
    }
}

/// A named field of a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

/// A nested descriptor declared under `definitions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub descriptor: TypeDescriptor,
}

/// The reflected structural type of a schema document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// The document title
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fields in declaration order
    pub fields: Vec<Field>,
    /// Definitions in declaration order
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
            definitions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a field
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        self.fields.push(Field {
            name: name.into(),
            field_type,
            required,
        });
        self
    }

    /// Append a definition
    pub fn definition(mut self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.definitions.push(Definition {
            name: name.into(),
            descriptor,
        });
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_definition(&self, name: &str) -> Option<&TypeDescriptor> {
        self.definitions
            .iter()
            .find(|d| d.name == name)
            .map(|d| &d.descriptor)
    }

    /// Names of the required fields, in declaration order
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|f| f.required).map(|f| f.name.as_str())
    }

    /// Serialize to a JSON Schema document.
    ///
    /// Every descriptor reachable through a reference is emitted under the
    /// root `definitions`, dependencies before dependents, so the document
    /// reflects back in declaration order. Equal descriptors share one
    /// definition; different descriptors with the same name get numbered
    /// keys (`Item`, `Item2`, ...).
    pub fn to_schema(&self) -> Value {
        let mut hoisted = Vec::new();
        collect_definitions(self, &mut hoisted);

        let mut schema = object_schema(self, &hoisted);
        if !hoisted.is_empty() {
            let definitions: Map<String, Value> = hoisted
                .iter()
                .map(|(key, descriptor)| (key.clone(), Value::Object(object_schema(descriptor, &hoisted))))
                .collect();
            schema.insert("definitions".to_string(), Value::Object(definitions));
        }
        Value::Object(schema)
    }

    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument::from_value(self.to_schema())
    }

    /// Stable handle identifying this descriptor's registration
    pub fn handle(&self) -> ModelHandle {
        ModelHandle {
            name: self.name.clone(),
            checksum: Checksum::from_json(&self.to_schema()),
        }
    }
}

/// Definition keys assigned so far, in emission order
type Hoisted<'a> = Vec<(String, &'a TypeDescriptor)>;

fn collect_definitions<'a>(descriptor: &'a TypeDescriptor, out: &mut Hoisted<'a>) {
    for definition in &descriptor.definitions {
        hoist(&definition.name, &definition.descriptor, out);
    }
    for field in &descriptor.fields {
        if let Some(target) = field.field_type.target() {
            hoist(&target.name, target, out);
        }
    }
}

fn hoist<'a>(key: &str, descriptor: &'a TypeDescriptor, out: &mut Hoisted<'a>) {
    if out.iter().any(|(_, d)| *d == descriptor) {
        return;
    }
    collect_definitions(descriptor, out);
    let key = free_key(key, out);
    out.push((key, descriptor));
}

fn free_key(preferred: &str, hoisted: &[(String, &TypeDescriptor)]) -> String {
    let taken = |key: &str| hoisted.iter().any(|(k, _)| k == key);
    if !taken(preferred) {
        return preferred.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}{}", preferred, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn object_schema(descriptor: &TypeDescriptor, hoisted: &[(String, &TypeDescriptor)]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("title".to_string(), json!(descriptor.name));
    if let Some(description) = &descriptor.description {
        schema.insert("description".to_string(), json!(description));
    }
    schema.insert("type".to_string(), json!("object"));

    let properties: Map<String, Value> = descriptor
        .fields
        .iter()
        .map(|f| (f.name.clone(), field_schema(&f.field_type, hoisted)))
        .collect();
    schema.insert("properties".to_string(), Value::Object(properties));

    let required: Vec<&str> = descriptor.required_fields().collect();
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    schema
}

fn field_schema(field_type: &FieldType, hoisted: &[(String, &TypeDescriptor)]) -> Value {
    match field_type {
        FieldType::Primitive(kind) => json!({ "type": kind.json_type() }),
        FieldType::Reference(target) => {
            // every reference target was hoisted by collect_definitions
            let key = hoisted
                .iter()
                .find(|(_, d)| *d == target.as_ref())
                .map(|(k, _)| k.as_str())
                .unwrap_or(target.name.as_str());
            json!({ "$ref": format!("{}{}", DEFINITIONS_POINTER, key) })
        }
        FieldType::ArrayOf(element) => json!({
            "type": "array",
            "items": field_schema(element, hoisted),
        }),
    }
}

/// Handle returned for a registered descriptor, used to look up its schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelHandle {
    name: String,
    checksum: Checksum,
}

impl ModelHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.checksum.as_str().get(..12).unwrap_or(self.checksum.as_str());
        write!(f, "{}#{}", self.name, short)
    }
}
