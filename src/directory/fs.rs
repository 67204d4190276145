//! Filesystem-backed schema directory
//!
//! ```text
//! <root>/
//! └── <registry>/
//!     └── <schema name>/
//!         ├── 1.json
//!         └── 2.json
//! ```
//!
//! Each version file holds the directory's describe record in its PascalCase
//! wire form.

use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{
    paginate, schema_arn, DescribedSchema, DirectoryResult, ListSchemasRequest, PutSchemaRequest,
    SchemaDirectory, SchemaPage, SchemaReceipt, SchemaSummary, VersionPage, VersionSummary,
};
use crate::checksum::Checksum;
use crate::error::DirectoryError;
use crate::version::VersionId;

const DEFAULT_PAGE_SIZE: usize = 100;

/// A registry or schema name usable as one path component
fn checked_component(part: &str) -> DirectoryResult<&str> {
    if part.is_empty() || part.starts_with('.') || part.contains(|c: char| c == '/' || c == '\\') {
        return Err(DirectoryError::Rejected(format!(
            "{:?} cannot be stored as a directory name",
            part
        )));
    }
    Ok(part)
}

/// Directory persisted under a root path
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
    page_size: usize,
}

impl FsDirectory {
    /// Open a directory rooted at `path`, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn registry_dir(&self, registry: &str) -> DirectoryResult<PathBuf> {
        Ok(self.root.join(checked_component(registry)?))
    }

    fn schema_dir(&self, registry: &str, name: &str) -> DirectoryResult<PathBuf> {
        Ok(self.registry_dir(registry)?.join(checked_component(name)?))
    }

    /// Stored versions of a schema, oldest first
    fn versions(&self, dir: &Path) -> DirectoryResult<Vec<(VersionId, PathBuf)>> {
        let mut versions = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| DirectoryError::Rejected(e.to_string()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                versions.push((VersionId::new(stem), path.to_path_buf()));
            }
        }
        versions.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(versions)
    }

    fn read_version(path: &Path) -> DirectoryResult<DescribedSchema> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_version(&self, dir: &Path, request: &PutSchemaRequest, version: &VersionId) -> DirectoryResult<SchemaReceipt> {
        fs::create_dir_all(dir)?;
        let now = Utc::now();
        let described = DescribedSchema {
            content: request.content.clone(),
            description: request.description.clone(),
            last_modified: now,
            schema_arn: schema_arn(&request.registry_name, &request.schema_name),
            schema_name: request.schema_name.clone(),
            schema_version: version.to_string(),
            tags: HashMap::new(),
            format: request.format,
            version_created_date: now,
        };
        let path = dir.join(format!("{}.json", version));
        fs::write(&path, serde_json::to_string_pretty(&described)?)?;
        tracing::debug!(path = %path.display(), "wrote schema version");
        Ok(described.receipt())
    }

    fn not_found(name: &str, version: Option<&str>) -> DirectoryError {
        DirectoryError::NotFound {
            name: name.to_string(),
            version: version.unwrap_or("latest").to_string(),
        }
    }
}

impl SchemaDirectory for FsDirectory {
    fn list_schemas(&self, request: &ListSchemasRequest) -> DirectoryResult<SchemaPage> {
        let registry_dir = self.registry_dir(&request.registry_name)?;
        let mut summaries = Vec::new();
        if registry_dir.is_dir() {
            for entry in WalkDir::new(&registry_dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| DirectoryError::Rejected(e.to_string()))?;
                if !entry.file_type().is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                if let Some(prefix) = &request.schema_name_prefix {
                    if !name.starts_with(prefix.as_str()) {
                        continue;
                    }
                }
                let versions = self.versions(entry.path())?;
                let last_modified = match versions.last() {
                    Some((_, path)) => Self::read_version(path)?.last_modified,
                    None => Utc::now(),
                };
                summaries.push(SchemaSummary {
                    schema_arn: schema_arn(&request.registry_name, &name),
                    schema_name: name,
                    last_modified,
                    tags: HashMap::new(),
                    version_count: versions.len() as u64,
                });
            }
        }

        let (schemas, next_token) = paginate(&summaries, request.next_token.as_deref(), self.page_size)?;
        Ok(SchemaPage { schemas, next_token })
    }

    fn list_versions(&self, registry: &str, name: &str, next_token: Option<&str>) -> DirectoryResult<VersionPage> {
        let dir = self.schema_dir(registry, name)?;
        if !dir.is_dir() {
            return Err(Self::not_found(name, None));
        }
        let mut summaries = Vec::new();
        for (_, path) in self.versions(&dir)? {
            let described = Self::read_version(&path)?;
            summaries.push(VersionSummary {
                schema_arn: described.schema_arn,
                schema_name: described.schema_name,
                schema_version: described.schema_version,
                format: described.format,
            });
        }
        let (schema_versions, next_token) = paginate(&summaries, next_token, self.page_size)?;
        Ok(VersionPage { schema_versions, next_token })
    }

    fn describe_schema(&self, registry: &str, name: &str, version: Option<&str>) -> DirectoryResult<DescribedSchema> {
        let dir = self.schema_dir(registry, name)?;
        if !dir.is_dir() {
            return Err(Self::not_found(name, version));
        }
        let versions = self.versions(&dir)?;
        let found = match version {
            Some(v) => versions.iter().find(|(id, _)| id.as_str() == v),
            None => versions.last(),
        };
        match found {
            Some((_, path)) => Self::read_version(path),
            None => Err(Self::not_found(name, version)),
        }
    }

    fn create_schema(&self, request: &PutSchemaRequest) -> DirectoryResult<SchemaReceipt> {
        let dir = self.schema_dir(&request.registry_name, &request.schema_name)?;
        if dir.is_dir() && !self.versions(&dir)?.is_empty() {
            return Err(DirectoryError::Rejected(format!(
                "schema {} already exists",
                request.schema_name
            )));
        }
        self.write_version(&dir, request, &VersionId::new("1"))
    }

    fn update_schema(&self, request: &PutSchemaRequest) -> DirectoryResult<SchemaReceipt> {
        let dir = self.schema_dir(&request.registry_name, &request.schema_name)?;
        let versions = if dir.is_dir() { self.versions(&dir)? } else { Vec::new() };
        let (latest, path) = versions
            .last()
            .ok_or_else(|| Self::not_found(&request.schema_name, None))?;

        let current = Self::read_version(path)?;
        if Checksum::of_content(&current.content) == Checksum::of_content(&request.content) {
            return Err(DirectoryError::Conflict {
                name: request.schema_name.clone(),
            });
        }
        self.write_version(&dir, request, &latest.next())
    }
}
