//! In-memory schema directory

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};

use super::{
    paginate, schema_arn, DescribedSchema, DirectoryResult, ListSchemasRequest, PutSchemaRequest,
    SchemaDirectory, SchemaPage, SchemaReceipt, SchemaSummary, VersionPage, VersionSummary,
};
use crate::checksum::Checksum;
use crate::error::DirectoryError;
use crate::schema::SchemaFormat;
use crate::version::VersionId;

const DEFAULT_PAGE_SIZE: usize = 100;

/// Number of calls made against a [`MemoryDirectory`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryCalls {
    pub list_schemas: usize,
    pub list_versions: usize,
    pub describe: usize,
    pub create: usize,
    pub update: usize,
}

#[derive(Debug, Clone)]
struct StoredVersion {
    content: String,
    checksum: Checksum,
    description: Option<String>,
    format: SchemaFormat,
    created: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct StoredSchema {
    tags: HashMap<String, String>,
    versions: BTreeMap<VersionId, StoredVersion>,
}

impl StoredSchema {
    fn latest(&self) -> Option<(&VersionId, &StoredVersion)> {
        self.versions.iter().next_back()
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.versions
            .values()
            .map(|v| v.created)
            .max()
            .unwrap_or_else(Utc::now)
    }

    fn describe(&self, registry: &str, name: &str, version: &VersionId, stored: &StoredVersion) -> DescribedSchema {
        DescribedSchema {
            content: stored.content.clone(),
            description: stored.description.clone(),
            last_modified: self.last_modified(),
            schema_arn: schema_arn(registry, name),
            schema_name: name.to_string(),
            schema_version: version.to_string(),
            tags: self.tags.clone(),
            format: stored.format,
            version_created_date: stored.created,
        }
    }
}

/// Thread-safe in-memory directory
///
/// Versions are numbered "1", "2", ... per schema. An update whose content
/// matches the latest version is answered with a conflict.
#[derive(Debug)]
pub struct MemoryDirectory {
    registries: RwLock<HashMap<String, BTreeMap<String, StoredSchema>>>,
    page_size: usize,
    calls: Mutex<DirectoryCalls>,
    rejecting: Mutex<Option<String>>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Directory returning at most `page_size` entries per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            registries: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
            calls: Mutex::new(DirectoryCalls::default()),
            rejecting: Mutex::new(None),
        }
    }

    /// Store a version under an explicit identifier
    pub fn insert_version(&self, registry: &str, name: &str, version: &str, content: impl Into<String>) {
        let content = content.into();
        let stored = StoredVersion {
            checksum: Checksum::of_content(&content),
            content,
            description: None,
            format: SchemaFormat::JsonSchemaDraft4,
            created: Utc::now(),
        };
        self.registries
            .write()
            .entry(registry.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .versions
            .insert(VersionId::new(version), stored);
    }

    /// Reject every create and update with `reason` until cleared with `None`
    pub fn reject_writes(&self, reason: Option<&str>) {
        *self.rejecting.lock() = reason.map(String::from);
    }

    pub fn calls(&self) -> DirectoryCalls {
        *self.calls.lock()
    }

    /// Number of versions stored for a schema
    pub fn version_count(&self, registry: &str, name: &str) -> usize {
        self.registries
            .read()
            .get(registry)
            .and_then(|schemas| schemas.get(name))
            .map(|s| s.versions.len())
            .unwrap_or(0)
    }

    fn check_writable(&self) -> DirectoryResult<()> {
        match self.rejecting.lock().as_ref() {
            Some(reason) => Err(DirectoryError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    fn not_found(name: &str, version: Option<&str>) -> DirectoryError {
        DirectoryError::NotFound {
            name: name.to_string(),
            version: version.unwrap_or("latest").to_string(),
        }
    }

    fn write_version(&self, request: &PutSchemaRequest, schema: &mut StoredSchema, version: VersionId) -> SchemaReceipt {
        let stored = StoredVersion {
            content: request.content.clone(),
            checksum: Checksum::of_content(&request.content),
            description: request.description.clone(),
            format: request.format,
            created: Utc::now(),
        };
        schema.versions.insert(version.clone(), stored.clone());
        schema
            .describe(&request.registry_name, &request.schema_name, &version, &stored)
            .receipt()
    }
}

impl SchemaDirectory for MemoryDirectory {
    fn list_schemas(&self, request: &ListSchemasRequest) -> DirectoryResult<SchemaPage> {
        self.calls.lock().list_schemas += 1;
        let registries = self.registries.read();
        let summaries: Vec<SchemaSummary> = registries
            .get(&request.registry_name)
            .map(|schemas| {
                schemas
                    .iter()
                    .filter(|(name, _)| match &request.schema_name_prefix {
                        Some(prefix) => name.starts_with(prefix.as_str()),
                        None => true,
                    })
                    .map(|(name, schema)| SchemaSummary {
                        schema_arn: schema_arn(&request.registry_name, name),
                        schema_name: name.clone(),
                        last_modified: schema.last_modified(),
                        tags: schema.tags.clone(),
                        version_count: schema.versions.len() as u64,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let (schemas, next_token) = paginate(&summaries, request.next_token.as_deref(), self.page_size)?;
        Ok(SchemaPage { schemas, next_token })
    }

    fn list_versions(&self, registry: &str, name: &str, next_token: Option<&str>) -> DirectoryResult<VersionPage> {
        self.calls.lock().list_versions += 1;
        let registries = self.registries.read();
        let schema = registries
            .get(registry)
            .and_then(|schemas| schemas.get(name))
            .ok_or_else(|| Self::not_found(name, None))?;

        let summaries: Vec<VersionSummary> = schema
            .versions
            .iter()
            .map(|(version, stored)| VersionSummary {
                schema_arn: schema_arn(registry, name),
                schema_name: name.to_string(),
                schema_version: version.to_string(),
                format: stored.format,
            })
            .collect();

        let (schema_versions, next_token) = paginate(&summaries, next_token, self.page_size)?;
        Ok(VersionPage { schema_versions, next_token })
    }

    fn describe_schema(&self, registry: &str, name: &str, version: Option<&str>) -> DirectoryResult<DescribedSchema> {
        self.calls.lock().describe += 1;
        let registries = self.registries.read();
        let schema = registries
            .get(registry)
            .and_then(|schemas| schemas.get(name))
            .ok_or_else(|| Self::not_found(name, version))?;

        let found = match version {
            Some(v) => schema.versions.get_key_value(&VersionId::new(v)),
            None => schema.latest(),
        };
        let (version_id, stored) = found.ok_or_else(|| Self::not_found(name, version))?;
        Ok(schema.describe(registry, name, version_id, stored))
    }

    fn create_schema(&self, request: &PutSchemaRequest) -> DirectoryResult<SchemaReceipt> {
        self.calls.lock().create += 1;
        self.check_writable()?;
        let mut registries = self.registries.write();
        let schemas = registries.entry(request.registry_name.clone()).or_default();
        if schemas.contains_key(&request.schema_name) {
            return Err(DirectoryError::Rejected(format!(
                "schema {} already exists",
                request.schema_name
            )));
        }
        let schema = schemas.entry(request.schema_name.clone()).or_default();
        Ok(self.write_version(request, schema, VersionId::new("1")))
    }

    fn update_schema(&self, request: &PutSchemaRequest) -> DirectoryResult<SchemaReceipt> {
        self.calls.lock().update += 1;
        self.check_writable()?;
        let mut registries = self.registries.write();
        let schema = registries
            .get_mut(&request.registry_name)
            .and_then(|schemas| schemas.get_mut(&request.schema_name))
            .ok_or_else(|| Self::not_found(&request.schema_name, None))?;

        let next = match schema.latest() {
            Some((_, latest)) if latest.checksum == Checksum::of_content(&request.content) => {
                return Err(DirectoryError::Conflict {
                    name: request.schema_name.clone(),
                });
            }
            Some((version, _)) => version.next(),
            None => VersionId::new("1"),
        };
        Ok(self.write_version(request, schema, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(name: &str, content: &str) -> PutSchemaRequest {
        PutSchemaRequest {
            registry_name: "TAPI-TEST".to_string(),
            schema_name: name.to_string(),
            content: content.to_string(),
            format: SchemaFormat::JsonSchemaDraft4,
            description: None,
        }
    }

    #[test]
    fn test_create_then_update() {
        let directory = MemoryDirectory::new();
        let created = directory.create_schema(&put("ns.T", r#"{"a":1}"#)).unwrap();
        assert_eq!(created.schema_version, "1");

        let updated = directory.update_schema(&put("ns.T", r#"{"a":2}"#)).unwrap();
        assert_eq!(updated.schema_version, "2");

        let latest = directory.describe_schema("TAPI-TEST", "ns.T", None).unwrap();
        assert_eq!(latest.content, r#"{"a":2}"#);
    }

    #[test]
    fn test_unchanged_update_conflicts() {
        let directory = MemoryDirectory::new();
        directory.create_schema(&put("ns.T", r#"{"a":1}"#)).unwrap();
        let result = directory.update_schema(&put("ns.T", r#"{"a":1}"#));
        assert!(matches!(result, Err(DirectoryError::Conflict { .. })));
        assert_eq!(directory.version_count("TAPI-TEST", "ns.T"), 1);
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let directory = MemoryDirectory::new();
        directory.create_schema(&put("ns.T", "{}")).unwrap();
        let result = directory.create_schema(&put("ns.T", "{}"));
        assert!(matches!(result, Err(DirectoryError::Rejected(_))));
    }

    #[test]
    fn test_describe_missing() {
        let directory = MemoryDirectory::new();
        let result = directory.describe_schema("TAPI-TEST", "ns.Missing", None);
        assert!(matches!(result, Err(DirectoryError::NotFound { .. })));
    }

    #[test]
    fn test_list_schemas_with_prefix_and_pages() {
        let directory = MemoryDirectory::with_page_size(1);
        directory.insert_version("TAPI-TEST", "a.One", "1", "{}");
        directory.insert_version("TAPI-TEST", "a.Two", "1", "{}");
        directory.insert_version("TAPI-TEST", "b.Three", "1", "{}");

        let mut request = ListSchemasRequest {
            registry_name: "TAPI-TEST".to_string(),
            schema_name_prefix: Some("a.".to_string()),
            next_token: None,
        };
        let first = directory.list_schemas(&request).unwrap();
        assert_eq!(first.schemas[0].schema_name, "a.One");
        request.next_token = first.next_token;
        let second = directory.list_schemas(&request).unwrap();
        assert_eq!(second.schemas[0].schema_name, "a.Two");
        assert!(second.next_token.is_none());
    }

    #[test]
    fn test_rejecting_writes() {
        let directory = MemoryDirectory::new();
        directory.reject_writes(Some("throttled"));
        assert!(matches!(
            directory.create_schema(&put("ns.T", "{}")),
            Err(DirectoryError::Rejected(_))
        ));
        directory.reject_writes(None);
        assert!(directory.create_schema(&put("ns.T", "{}")).is_ok());
        assert_eq!(directory.calls().create, 2);
    }
}
