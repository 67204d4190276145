//! Schema Directory
//!
//! The remote service holding schema documents, seen through the
//! [`SchemaDirectory`] trait. Request and response records use the
//! directory's PascalCase field names on the wire.

pub mod fs;
pub mod memory;

pub use fs::FsDirectory;
pub use memory::MemoryDirectory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DirectoryError;
use crate::schema::{SchemaDocument, SchemaFormat};
use crate::version::{SchemaVersion, VersionId};

/// Result type for directory calls
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Operations of a schema directory
///
/// `update_schema` must fail with [`DirectoryError::Conflict`] when the
/// submitted content equals the current version's content.
pub trait SchemaDirectory: Send + Sync {
    fn list_schemas(&self, request: &ListSchemasRequest) -> DirectoryResult<SchemaPage>;

    fn list_versions(
        &self,
        registry: &str,
        name: &str,
        next_token: Option<&str>,
    ) -> DirectoryResult<VersionPage>;

    /// Describe one version, or the latest one when `version` is `None`
    fn describe_schema(
        &self,
        registry: &str,
        name: &str,
        version: Option<&str>,
    ) -> DirectoryResult<DescribedSchema>;

    fn create_schema(&self, request: &PutSchemaRequest) -> DirectoryResult<SchemaReceipt>;

    fn update_schema(&self, request: &PutSchemaRequest) -> DirectoryResult<SchemaReceipt>;
}

impl<T: SchemaDirectory + ?Sized> SchemaDirectory for Arc<T> {
    fn list_schemas(&self, request: &ListSchemasRequest) -> DirectoryResult<SchemaPage> {
        (**self).list_schemas(request)
    }

    fn list_versions(
        &self,
        registry: &str,
        name: &str,
        next_token: Option<&str>,
    ) -> DirectoryResult<VersionPage> {
        (**self).list_versions(registry, name, next_token)
    }

    fn describe_schema(
        &self,
        registry: &str,
        name: &str,
        version: Option<&str>,
    ) -> DirectoryResult<DescribedSchema> {
        (**self).describe_schema(registry, name, version)
    }

    fn create_schema(&self, request: &PutSchemaRequest) -> DirectoryResult<SchemaReceipt> {
        (**self).create_schema(request)
    }

    fn update_schema(&self, request: &PutSchemaRequest) -> DirectoryResult<SchemaReceipt> {
        (**self).update_schema(request)
    }
}

/// Identifier the directory gives a schema
pub fn schema_arn(registry: &str, name: &str) -> String {
    format!("schema/{}/{}", registry, name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListSchemasRequest {
    pub registry_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaSummary {
    pub schema_arn: String,
    pub schema_name: String,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub version_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaPage {
    pub schemas: Vec<SchemaSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionSummary {
    pub schema_arn: String,
    pub schema_name: String,
    pub schema_version: String,
    #[serde(rename = "Type")]
    pub format: SchemaFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionPage {
    pub schema_versions: Vec<VersionSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Create or update request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutSchemaRequest {
    pub registry_name: String,
    pub schema_name: String,
    pub content: String,
    #[serde(rename = "Type")]
    pub format: SchemaFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response to a create or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub schema_arn: String,
    pub schema_name: String,
    pub schema_version: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(rename = "Type")]
    pub format: SchemaFormat,
    pub version_created_date: DateTime<Utc>,
}

impl SchemaReceipt {
    /// Combine with the submitted content into a version
    pub fn into_version(self, registry: &str, document: SchemaDocument) -> SchemaVersion {
        SchemaVersion {
            registry: registry.to_string(),
            name: self.schema_name,
            version: VersionId::new(self.schema_version),
            schema_id: self.schema_arn,
            format: self.format,
            description: self.description,
            checksum: document.checksum(),
            document,
            created_at: self.version_created_date,
            last_modified: self.last_modified,
            tags: self.tags,
        }
    }
}

/// A stored version with its content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribedSchema {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub schema_arn: String,
    pub schema_name: String,
    pub schema_version: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(rename = "Type")]
    pub format: SchemaFormat,
    pub version_created_date: DateTime<Utc>,
}

impl DescribedSchema {
    pub fn into_version(self, registry: &str) -> SchemaVersion {
        let document = SchemaDocument::new(self.content);
        SchemaVersion {
            registry: registry.to_string(),
            name: self.schema_name,
            version: VersionId::new(self.schema_version),
            schema_id: self.schema_arn,
            format: self.format,
            description: self.description,
            checksum: document.checksum(),
            document,
            created_at: self.version_created_date,
            last_modified: self.last_modified,
            tags: self.tags,
        }
    }

    /// The same metadata without the content
    pub fn receipt(&self) -> SchemaReceipt {
        SchemaReceipt {
            description: self.description.clone(),
            last_modified: self.last_modified,
            schema_arn: self.schema_arn.clone(),
            schema_name: self.schema_name.clone(),
            schema_version: self.schema_version.clone(),
            tags: self.tags.clone(),
            format: self.format,
            version_created_date: self.version_created_date,
        }
    }
}

/// Slice `items` into the page starting at `next_token`
pub(crate) fn paginate<T: Clone>(
    items: &[T],
    next_token: Option<&str>,
    page_size: usize,
) -> DirectoryResult<(Vec<T>, Option<String>)> {
    let start = match next_token {
        None => 0,
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| DirectoryError::Rejected(format!("invalid next token {:?}", token)))?,
    };
    let end = start.saturating_add(page_size.max(1)).min(items.len());
    let page = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    let next = (end < items.len()).then(|| end.to_string());
    Ok((page, next))
}
