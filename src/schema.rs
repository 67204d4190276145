//! Schema names and documents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};

/// Document format accepted by the schema directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SchemaFormat {
    #[default]
    #[serde(rename = "JSONSchemaDraft4")]
    JsonSchemaDraft4,
    #[serde(rename = "OpenApi3")]
    OpenApi3,
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaFormat::JsonSchemaDraft4 => write!(f, "JSONSchemaDraft4"),
            SchemaFormat::OpenApi3 => write!(f, "OpenApi3"),
        }
    }
}

/// `namespace.TypeName`, the key of a schema in the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    namespace: String,
    type_name: String,
}

impl QualifiedName {
    /// Build a qualified name from its two parts
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let type_name = type_name.into();
        if namespace.is_empty() || type_name.is_empty() {
            return Err(SchemaError::InvalidIdentity(format!(
                "qualified name needs a namespace and a type name, got {:?} and {:?}",
                namespace, type_name
            )));
        }
        if type_name.contains('.') {
            return Err(SchemaError::InvalidIdentity(format!(
                "type name {:?} must not contain '.'",
                type_name
            )));
        }
        Ok(Self { namespace, type_name })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.type_name)
    }
}

impl FromStr for QualifiedName {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once('.') {
            Some((namespace, type_name)) => Self::new(namespace, type_name),
            None => Err(SchemaError::InvalidIdentity(format!(
                "{:?} is not of the form namespace.TypeName",
                s
            ))),
        }
    }
}

/// Raw JSON Schema text with its parsed form, computed on first use
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SchemaDocument {
    content: String,
    parsed: OnceLock<serde_json::Value>,
}

impl SchemaDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            parsed: OnceLock::new(),
        }
    }

    /// Build a document from an already parsed value
    pub fn from_value(value: serde_json::Value) -> Self {
        let parsed = OnceLock::new();
        let content = value.to_string();
        let _ = parsed.set(value);
        Self { content, parsed }
    }

    /// The raw document text, as stored in the directory
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The parsed document
    pub fn value(&self) -> Result<&serde_json::Value> {
        if let Some(value) = self.parsed.get() {
            return Ok(value);
        }
        let value: serde_json::Value = serde_json::from_str(&self.content)?;
        Ok(self.parsed.get_or_init(|| value))
    }

    /// The document's `title`, if it has one
    pub fn title(&self) -> Result<Option<&str>> {
        Ok(self.value()?.get("title").and_then(|t| t.as_str()))
    }

    /// The document's `description`, if it has one
    pub fn description(&self) -> Result<Option<&str>> {
        Ok(self.value()?.get("description").and_then(|d| d.as_str()))
    }

    pub fn checksum(&self) -> Checksum {
        Checksum::of_content(&self.content)
    }
}

impl fmt::Debug for SchemaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDocument")
            .field("content", &self.content)
            .finish()
    }
}

impl PartialEq for SchemaDocument {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl Eq for SchemaDocument {}

impl From<String> for SchemaDocument {
    fn from(content: String) -> Self {
        Self::new(content)
    }
}

impl From<SchemaDocument> for String {
    fn from(document: SchemaDocument) -> Self {
        document.content
    }
}
