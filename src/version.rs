//! Schema versions and per-name version history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::checksum::Checksum;
use crate::envelope::SchemaIdentity;
use crate::error::{Result, SchemaError};
use crate::schema::{SchemaDocument, SchemaFormat};

/// A version identifier as assigned by the directory (e.g. "1", "2")
///
/// Identifiers made only of decimal digits compare numerically, so "10" sorts
/// after "9". Anything else compares lexically and sorts after every numeric
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// The successor of a numeric identifier; "1" for anything else
    pub fn next(&self) -> VersionId {
        match self.0.parse::<u64>() {
            Ok(n) if self.is_numeric() => VersionId((n + 1).to_string()),
            _ => VersionId("1".to_string()),
        }
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => {
                let a = self.0.trim_start_matches('0');
                let b = other.0.trim_start_matches('0');
                a.len()
                    .cmp(&b.len())
                    .then_with(|| a.cmp(b))
                    .then_with(|| self.0.cmp(&other.0))
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One immutable version of a schema, with its directory metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Registry the schema lives in
    pub registry: String,
    /// Qualified schema name
    pub name: String,
    /// Version identifier
    pub version: VersionId,
    /// Directory-assigned identifier of the schema
    pub schema_id: String,
    /// Document format
    pub format: SchemaFormat,
    pub description: Option<String>,
    /// The schema document
    pub document: SchemaDocument,
    /// SHA256 of the document text
    pub checksum: Checksum,
    /// When this version was created
    pub created_at: DateTime<Utc>,
    /// When the schema was last modified
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl SchemaVersion {
    /// The (registry, name, version) triple addressing this version
    pub fn identity(&self) -> Result<SchemaIdentity> {
        SchemaIdentity::new(&self.registry, &self.name, self.version.as_str())
    }
}

/// The version history of one schema name
///
/// Versions are only ever appended. The default version is always the
/// greatest identifier present.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRecord {
    registry: String,
    name: String,
    versions: BTreeMap<VersionId, SchemaVersion>,
}

impl SchemaRecord {
    pub fn new(registry: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            name: name.into(),
            versions: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a version. An identifier already present keeps its original
    /// content; returns whether the version was added.
    pub fn insert(&mut self, version: SchemaVersion) -> bool {
        if self.versions.contains_key(&version.version) {
            return false;
        }
        self.versions.insert(version.version.clone(), version);
        true
    }

    /// The greatest version identifier present
    pub fn default_version(&self) -> Option<&VersionId> {
        self.versions.keys().next_back()
    }

    /// Get a version, or the default one when `version` is `None`
    pub fn get(&self, version: Option<&str>) -> Result<&SchemaVersion> {
        let found = match version {
            Some(v) => self.versions.get(&VersionId::new(v)),
            None => self.versions.values().next_back(),
        };
        found.ok_or_else(|| SchemaError::not_found(&self.name, version))
    }

    /// All versions, oldest first
    pub fn versions(&self) -> impl Iterator<Item = &SchemaVersion> {
        self.versions.values()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl fmt::Display for SchemaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default = self
            .default_version()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "Schema<{}, versions: {}, default version: {}>",
            self.name,
            self.versions.len(),
            default
        )
    }
}
