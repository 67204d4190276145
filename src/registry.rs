//! Schema Registry
//!
//! Versioned schema store backed by a [`SchemaDirectory`]. Version histories
//! are append-only; the default version of a schema is its greatest
//! version identifier.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::config::RegistryConfig;
use crate::descriptor::{ModelHandle, TypeDescriptor};
use crate::directory::{ListSchemasRequest, PutSchemaRequest, SchemaDirectory};
use crate::envelope::SchemaIdentity;
use crate::error::{DirectoryError, Result, SchemaError};
use crate::reflect::Reflector;
use crate::schema::{QualifiedName, SchemaDocument, SchemaFormat};
use crate::version::{SchemaRecord, SchemaVersion};

/// Registry used when none is named
pub const DEFAULT_REGISTRY: &str = "discovered-schemas";

#[derive(Debug, Default)]
struct RegistryState {
    /// Names known to exist in the directory
    listed: BTreeSet<String>,
    /// Version histories fetched so far
    records: HashMap<String, SchemaRecord>,
    /// Versions registered by this process
    models: HashMap<ModelHandle, SchemaVersion>,
}

/// The versioned schema store
///
/// All in-memory state sits behind one lock, held across directory calls so
/// concurrent registrations of the same name are serialized.
pub struct SchemaRegistry<D> {
    registry_name: String,
    prefix: Option<String>,
    directory: D,
    state: Mutex<RegistryState>,
}

impl<D: SchemaDirectory> SchemaRegistry<D> {
    /// Create an empty store for `registry_name`; call [`load_all`](Self::load_all) to populate it
    pub fn new(directory: D, registry_name: impl Into<String>) -> Self {
        Self {
            registry_name: registry_name.into(),
            prefix: None,
            directory,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Only load schemas whose name starts with `prefix`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Create a store from configuration and load it
    pub fn open(directory: D, config: &RegistryConfig) -> Result<Self> {
        let mut registry = Self::new(directory, config.name.clone());
        if let Some(prefix) = &config.prefix {
            registry = registry.with_prefix(prefix.clone());
        }
        registry.load_all()?;
        Ok(registry)
    }

    pub fn registry_name(&self) -> &str {
        &self.registry_name
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// List every schema name in the directory.
    ///
    /// Version histories are fetched on first access. Histories cached by an
    /// earlier load are dropped.
    pub fn load_all(&self) -> Result<()> {
        let mut request = ListSchemasRequest {
            registry_name: self.registry_name.clone(),
            schema_name_prefix: self.prefix.clone(),
            next_token: None,
        };
        let mut names = BTreeSet::new();
        loop {
            let page = self.directory.list_schemas(&request)?;
            tracing::debug!(
                registry = %self.registry_name,
                schemas = page.schemas.len(),
                "listed schema page"
            );
            names.extend(page.schemas.into_iter().map(|s| s.schema_name));
            match page.next_token {
                Some(token) => request.next_token = Some(token),
                None => break,
            }
        }

        let mut state = self.state.lock();
        let registered: Vec<String> = state.models.values().map(|v| v.name.clone()).collect();
        names.extend(registered);
        state.listed = names;
        state.records.clear();
        tracing::info!(
            registry = %self.registry_name,
            schemas = state.listed.len(),
            "loaded schema registry"
        );
        Ok(())
    }

    /// Names of all known schemas
    pub fn schema_names(&self) -> Vec<String> {
        self.state.lock().listed.iter().cloned().collect()
    }

    /// Version history of a loaded or registered schema
    pub fn get(&self, name: &str) -> Result<SchemaRecord> {
        let mut state = self.state.lock();
        self.record(&mut state, name).cloned()
    }

    /// Content of a version, or of the default version when `version` is `None`
    pub fn version_content(&self, name: &str, version: Option<&str>) -> Result<SchemaDocument> {
        let mut state = self.state.lock();
        let record = self.record(&mut state, name)?;
        Ok(record.get(version)?.document.clone())
    }

    /// Reflect a stored version
    pub fn reflect(&self, name: &str, version: Option<&str>) -> Result<TypeDescriptor> {
        let document = self.version_content(name, version)?;
        Reflector::new().compile(&document)
    }

    /// Create the schema `name` from `descriptor`, or add a version if its
    /// content changed. Unchanged content returns the current version.
    ///
    /// The returned version is remembered against `descriptor.handle()`.
    pub fn register_or_update(&self, name: &QualifiedName, descriptor: &TypeDescriptor) -> Result<SchemaVersion> {
        let schema_name = name.to_string();
        let document = descriptor.to_document();
        let request = PutSchemaRequest {
            registry_name: self.registry_name.clone(),
            schema_name: schema_name.clone(),
            content: document.content().to_string(),
            format: SchemaFormat::JsonSchemaDraft4,
            description: descriptor.description.clone(),
        };

        let mut state = self.state.lock();
        let exists = match self.directory.describe_schema(&self.registry_name, &schema_name, None) {
            Ok(_) => true,
            Err(DirectoryError::NotFound { .. }) => false,
            Err(e) => return Err(registration_error(&schema_name, e)),
        };

        let version = if exists {
            if !state.records.contains_key(&schema_name) {
                let record = self
                    .fetch_record(&schema_name)
                    .map_err(|e| registration_error(&schema_name, e))?;
                state.records.insert(schema_name.clone(), record);
            }
            let fetched = match self.directory.update_schema(&request) {
                Ok(receipt) => {
                    let version = receipt.into_version(&self.registry_name, document);
                    tracing::info!(schema = %schema_name, version = %version.version, "updated schema");
                    version
                }
                Err(DirectoryError::Conflict { .. }) => {
                    tracing::info!(schema = %schema_name, "schema did not change");
                    self.directory
                        .describe_schema(&self.registry_name, &schema_name, None)
                        .map_err(|e| registration_error(&schema_name, e))?
                        .into_version(&self.registry_name)
                }
                Err(e) => return Err(registration_error(&schema_name, e)),
            };
            self.append(&mut state, fetched)?
        } else {
            let receipt = self
                .directory
                .create_schema(&request)
                .map_err(|e| registration_error(&schema_name, e))?;
            let version = receipt.into_version(&self.registry_name, document);
            tracing::info!(schema = %schema_name, version = %version.version, "created schema");
            self.append(&mut state, version)?
        };

        state.listed.insert(schema_name);
        state.models.insert(descriptor.handle(), version.clone());
        Ok(version)
    }

    /// Identity of the version registered for `handle` by this process
    pub fn schema_for(&self, handle: &ModelHandle) -> Result<SchemaIdentity> {
        let state = self.state.lock();
        match state.models.get(handle) {
            Some(version) => version.identity(),
            None => Err(SchemaError::ModelNotRegistered(handle.clone())),
        }
    }

    /// Add a version to its record, returning the stored copy
    fn append(&self, state: &mut RegistryState, version: SchemaVersion) -> Result<SchemaVersion> {
        let name = version.name.clone();
        let id = version.version.clone();
        let record = state
            .records
            .entry(name.clone())
            .or_insert_with(|| SchemaRecord::new(&self.registry_name, &name));
        record.insert(version);
        Ok(record.get(Some(id.as_str()))?.clone())
    }

    fn record<'s>(&self, state: &'s mut RegistryState, name: &str) -> Result<&'s SchemaRecord> {
        if !state.records.contains_key(name) {
            if !state.listed.contains(name) {
                return Err(SchemaError::not_found(name, None));
            }
            let record = self.fetch_record(name)?;
            state.records.insert(name.to_string(), record);
        }
        state
            .records
            .get(name)
            .ok_or_else(|| SchemaError::not_found(name, None))
    }

    /// Drain the version history of `name` from the directory
    fn fetch_record(&self, name: &str) -> Result<SchemaRecord> {
        let mut record = SchemaRecord::new(&self.registry_name, name);
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .directory
                .list_versions(&self.registry_name, name, next_token.as_deref())?;
            for summary in page.schema_versions {
                let described = self.directory.describe_schema(
                    &self.registry_name,
                    name,
                    Some(&summary.schema_version),
                )?;
                record.insert(described.into_version(&self.registry_name));
            }
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        tracing::debug!(schema = %name, versions = record.len(), "fetched version history");
        Ok(record)
    }
}

impl<D> fmt::Debug for SchemaRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SchemaRegistry")
            .field("registry_name", &self.registry_name)
            .field("prefix", &self.prefix)
            .field("schemas", &state.listed.len())
            .field("registered_models", &state.models.len())
            .finish()
    }
}

fn registration_error(name: &str, err: impl fmt::Display) -> SchemaError {
    SchemaError::Registration {
        name: name.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldType, PrimitiveKind};
    use crate::directory::MemoryDirectory;
    use std::sync::Arc;

    fn testing_model() -> TypeDescriptor {
        TypeDescriptor::new("TestingModel")
            .field("name", FieldType::Primitive(PrimitiveKind::String), true)
            .field("description", FieldType::Primitive(PrimitiveKind::String), false)
    }

    fn qualified() -> QualifiedName {
        "schema_registry.test.TestingModel".parse().unwrap()
    }

    #[test]
    fn test_empty_directory_loads() {
        let registry = SchemaRegistry::new(MemoryDirectory::new(), "TAPI-TEST");
        registry.load_all().unwrap();
        assert!(registry.schema_names().is_empty());
    }

    #[test]
    fn test_get_unknown_name() {
        let registry = SchemaRegistry::new(MemoryDirectory::new(), "TAPI-TEST");
        assert!(matches!(registry.get("ns.Missing"), Err(SchemaError::NotFound { .. })));
    }

    #[test]
    fn test_register_creates_first_version() {
        let directory = Arc::new(MemoryDirectory::new());
        let registry = SchemaRegistry::new(directory.clone(), "TAPI-TEST");

        let version = registry.register_or_update(&qualified(), &testing_model()).unwrap();
        assert_eq!(version.version.as_str(), "1");
        assert_eq!(version.name, "schema_registry.test.TestingModel");
        assert_eq!(directory.calls().create, 1);

        let record = registry.get("schema_registry.test.TestingModel").unwrap();
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_changed_descriptor_adds_version() {
        let registry = SchemaRegistry::new(MemoryDirectory::new(), "TAPI-TEST");
        registry.register_or_update(&qualified(), &testing_model()).unwrap();

        let changed = testing_model().field("active", FieldType::Primitive(PrimitiveKind::Bool), false);
        let version = registry.register_or_update(&qualified(), &changed).unwrap();
        assert_eq!(version.version.as_str(), "2");

        let default = registry.version_content("schema_registry.test.TestingModel", None).unwrap();
        assert_eq!(default, changed.to_document());
    }

    #[test]
    fn test_directory_rejection_is_registration_error() {
        let directory = Arc::new(MemoryDirectory::new());
        directory.reject_writes(Some("throttled"));
        let registry = SchemaRegistry::new(directory, "TAPI-TEST");

        let result = registry.register_or_update(&qualified(), &testing_model());
        assert!(matches!(result, Err(SchemaError::Registration { .. })));
        assert!(matches!(
            registry.schema_for(&testing_model().handle()),
            Err(SchemaError::ModelNotRegistered(_))
        ));
    }

    #[test]
    fn test_schema_for_registered_model() {
        let registry = SchemaRegistry::new(MemoryDirectory::new(), "TAPI-TEST");
        registry.register_or_update(&qualified(), &testing_model()).unwrap();

        let identity = registry.schema_for(&testing_model().handle()).unwrap();
        assert_eq!(identity.correlation(), "TAPI-TEST/schema_registry.test.TestingModel:1");
    }

    #[test]
    fn test_prefix_filters_loaded_names() {
        let directory = MemoryDirectory::new();
        directory.insert_version("TAPI-TEST", "a.One", "1", "{}");
        directory.insert_version("TAPI-TEST", "b.Two", "1", "{}");
        let registry = SchemaRegistry::new(directory, "TAPI-TEST").with_prefix("a.");
        registry.load_all().unwrap();
        assert_eq!(registry.schema_names(), vec!["a.One".to_string()]);
        assert_eq!(registry.prefix(), Some("a."));
    }
}
