//! Schema Reflection
//!
//! Compiles a JSON Schema document into a [`TypeDescriptor`]. Definitions are
//! reflected first, in declaration order, and `$ref` pointers resolve only
//! against definitions already reflected. A definition that points at a
//! sibling declared after it is therefore unresolvable.

use serde_json::{Map, Value};

use crate::descriptor::{Definition, Field, FieldType, PrimitiveKind, TypeDescriptor, DEFINITIONS_POINTER};
use crate::error::{Result, SchemaError};
use crate::schema::SchemaDocument;

/// Compiles schema documents into type descriptors
#[derive(Debug, Clone, Copy, Default)]
pub struct Reflector;

impl Reflector {
    pub fn new() -> Self {
        Self
    }

    /// Reflect a schema document
    pub fn compile(&self, document: &SchemaDocument) -> Result<TypeDescriptor> {
        self.compile_value(document.value()?)
    }

    /// Reflect an already parsed schema
    pub fn compile_value(&self, schema: &Value) -> Result<TypeDescriptor> {
        let descriptor = compile_object(schema, None)?;
        tracing::debug!(
            title = %descriptor.name,
            fields = descriptor.fields.len(),
            definitions = descriptor.definitions.len(),
            "reflected schema"
        );
        Ok(descriptor)
    }
}

/// Definitions resolved so far, chained to the enclosing documents
struct Scope<'a> {
    resolved: &'a [Definition],
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, name: &str) -> Option<&'a TypeDescriptor> {
        self.resolved
            .iter()
            .find(|d| d.name == name)
            .map(|d| &d.descriptor)
            .or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }
}

fn compile_object(schema: &Value, enclosing: Option<&Scope<'_>>) -> Result<TypeDescriptor> {
    let schema = schema
        .as_object()
        .ok_or_else(|| SchemaError::SchemaShape("schema must be a JSON object".to_string()))?;

    let title = schema
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::SchemaShape("schema needs a title field".to_string()))?;

    match schema.get("type") {
        Some(Value::String(t)) if t == "object" => {}
        Some(other) => {
            return Err(SchemaError::SchemaShape(format!(
                "cannot reflect {} of type {}, only objects",
                title, other
            )))
        }
        None => {
            return Err(SchemaError::SchemaShape(format!("schema {} needs a type field", title)))
        }
    }

    let mut definitions: Vec<Definition> = Vec::new();
    if let Some(declared) = schema.get("definitions") {
        let declared = declared.as_object().ok_or_else(|| {
            SchemaError::SchemaShape(format!("definitions of {} must be an object", title))
        })?;
        for (name, sub_schema) in declared {
            let scope = Scope {
                resolved: &definitions,
                parent: enclosing,
            };
            let descriptor = compile_object(sub_schema, Some(&scope))?;
            definitions.push(Definition {
                name: name.clone(),
                descriptor,
            });
        }
    }

    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::SchemaShape(format!("no properties are defined for {}", title)))?;
    let required = required_names(schema, title)?;

    let scope = Scope {
        resolved: &definitions,
        parent: enclosing,
    };
    let fields = properties
        .iter()
        .map(|(name, info)| -> Result<Field> {
            Ok(Field {
                name: name.clone(),
                field_type: resolve_property(name, info, &scope)?,
                required: required.contains(&name.as_str()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TypeDescriptor {
        name: title.to_string(),
        description: schema
            .get("description")
            .and_then(Value::as_str)
            .map(String::from),
        fields,
        definitions,
    })
}

// A missing `required` list means nothing is required.
fn required_names<'s>(schema: &'s Map<String, Value>, title: &str) -> Result<Vec<&'s str>> {
    match schema.get("required") {
        None => Ok(Vec::new()),
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| {
                n.as_str().ok_or_else(|| {
                    SchemaError::SchemaShape(format!("required list of {} must hold strings", title))
                })
            })
            .collect(),
        Some(_) => Err(SchemaError::SchemaShape(format!(
            "required of {} must be a list",
            title
        ))),
    }
}

fn resolve_property(name: &str, info: &Value, scope: &Scope<'_>) -> Result<FieldType> {
    let info = info.as_object().ok_or_else(|| {
        SchemaError::UnsupportedShape(format!("property {} is not a schema object", name))
    })?;

    match info.get("type") {
        Some(Value::String(t)) => match t.as_str() {
            "string" => Ok(FieldType::Primitive(PrimitiveKind::String)),
            "boolean" => Ok(FieldType::Primitive(PrimitiveKind::Bool)),
            "number" | "integer" => Ok(FieldType::Primitive(PrimitiveKind::Int)),
            "array" => resolve_array(name, info.get("items"), scope),
            other => Err(SchemaError::UnsupportedShape(format!(
                "property {} has type {}",
                name, other
            ))),
        },
        Some(other) => Err(SchemaError::UnsupportedShape(format!(
            "property {} has type {}",
            name, other
        ))),
        None => match info.get("$ref") {
            Some(pointer) => Ok(FieldType::reference(resolve_reference(pointer, scope)?)),
            None => Err(SchemaError::UnsupportedShape(format!(
                "property {} has neither a type nor a $ref",
                name
            ))),
        },
    }
}

fn resolve_array(name: &str, items: Option<&Value>, scope: &Scope<'_>) -> Result<FieldType> {
    match items.and_then(Value::as_object) {
        Some(items) if items.len() == 1 => match items.get("$ref") {
            Some(pointer) => Ok(FieldType::array_of(FieldType::reference(resolve_reference(
                pointer, scope,
            )?))),
            None => Err(SchemaError::UnsupportedShape(format!(
                "array items of {} must be a single $ref",
                name
            ))),
        },
        _ => Err(SchemaError::UnsupportedShape(format!(
            "array items of {} must be a single $ref",
            name
        ))),
    }
}

fn resolve_reference(pointer: &Value, scope: &Scope<'_>) -> Result<TypeDescriptor> {
    let pointer = pointer.as_str().ok_or_else(|| {
        SchemaError::UnresolvableReference(format!("$ref must be a string, got {}", pointer))
    })?;

    let name = pointer
        .strip_prefix(DEFINITIONS_POINTER)
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .ok_or_else(|| {
            SchemaError::UnresolvableReference(format!(
                "{} is not a local #/definitions/ pointer",
                pointer
            ))
        })?;

    scope.lookup(name).cloned().ok_or_else(|| {
        SchemaError::UnresolvableReference(format!(
            "{} does not name a definition declared before it",
            pointer
        ))
    })
}
