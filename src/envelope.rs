//! Event Envelopes
//!
//! An envelope carries a payload plus the identity of the schema it was
//! produced from, encoded in the `detail-type` field as
//!
//! ```text
//! <registry>/<qualified schema name>:<version>     (canonical, always emitted)
//! <qualified schema name>:<version>                (accepted, codec's registry)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::binding::bind;
use crate::descriptor::TypeDescriptor;
use crate::directory::SchemaDirectory;
use crate::error::{Result, SchemaError};
use crate::reflect::Reflector;
use crate::registry::SchemaRegistry;

/// (registry, schema name, version) of one immutable schema document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaIdentity {
    registry: String,
    schema_name: String,
    version: String,
}

impl SchemaIdentity {
    /// Build an identity whose correlation string decodes back to it
    pub fn new(
        registry: impl Into<String>,
        schema_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self> {
        let identity = Self {
            registry: registry.into(),
            schema_name: schema_name.into(),
            version: version.into(),
        };
        if identity.registry.is_empty() || identity.schema_name.is_empty() || identity.version.is_empty() {
            return Err(SchemaError::InvalidIdentity(format!(
                "registry, schema name and version must be non-empty: {:?}",
                identity
            )));
        }
        if identity.registry.contains('/') {
            return Err(SchemaError::InvalidIdentity(format!(
                "registry {:?} must not contain '/'",
                identity.registry
            )));
        }
        if identity.version.contains(':') {
            return Err(SchemaError::InvalidIdentity(format!(
                "version {:?} must not contain ':'",
                identity.version
            )));
        }
        Ok(identity)
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Canonical correlation string
    pub fn correlation(&self) -> String {
        format!("{}/{}:{}", self.registry, self.schema_name, self.version)
    }
}

impl fmt::Display for SchemaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.schema_name, self.version)
    }
}

impl FromStr for SchemaIdentity {
    type Err = SchemaError;

    /// Parse the cross-registry form only
    fn from_str(s: &str) -> Result<Self> {
        if !s.contains('/') {
            return Err(SchemaError::MalformedCorrelation(s.to_string()));
        }
        parse_correlation(s, "")
    }
}

fn parse_correlation(correlation: &str, default_registry: &str) -> Result<SchemaIdentity> {
    let malformed = || SchemaError::MalformedCorrelation(correlation.to_string());

    let (registry, rest) = match correlation.split_once('/') {
        Some((registry, rest)) => (registry, rest),
        None => (default_registry, correlation),
    };
    let (schema_name, version) = rest.rsplit_once(':').ok_or_else(malformed)?;
    SchemaIdentity::new(registry, schema_name, version).map_err(|_| malformed())
}

/// Transport record published to the event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    /// Encoded [`SchemaIdentity`]
    #[serde(rename = "detail-type")]
    pub schema_correlation: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(rename = "detail")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_bus_name: Option<String>,
}

/// Encodes schema identities into envelopes and reflects incoming ones
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    default_registry: String,
    reflector: Reflector,
}

impl EnvelopeCodec {
    /// Codec resolving single-namespace correlations against `default_registry`
    pub fn new(default_registry: impl Into<String>) -> Self {
        Self {
            default_registry: default_registry.into(),
            reflector: Reflector::new(),
        }
    }

    pub fn default_registry(&self) -> &str {
        &self.default_registry
    }

    /// Build an envelope for `payload`; sending it is the bus's job
    pub fn encode<I, S>(&self, identity: &SchemaIdentity, resources: I, source: &str, payload: Value) -> EventEnvelope
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EventEnvelope {
            id: None,
            source: source.to_string(),
            schema_correlation: identity.correlation(),
            resources: resources.into_iter().map(Into::into).collect(),
            payload,
            time: None,
            account: None,
            region: None,
            event_bus_name: None,
        }
    }

    /// Schema identity carried by an envelope
    pub fn decode(&self, envelope: &EventEnvelope) -> Result<SchemaIdentity> {
        self.parse(&envelope.schema_correlation)
    }

    /// Parse either correlation form
    pub fn parse(&self, correlation: &str) -> Result<SchemaIdentity> {
        if self.default_registry.is_empty() && !correlation.contains('/') {
            return Err(SchemaError::MalformedCorrelation(correlation.to_string()));
        }
        parse_correlation(correlation, &self.default_registry)
    }

    /// Fetch the envelope's schema from `registry`, reflect it and bind the
    /// payload to the result
    pub fn reflect_payload<D: SchemaDirectory>(
        &self,
        envelope: &EventEnvelope,
        registry: &SchemaRegistry<D>,
    ) -> Result<(TypeDescriptor, Value)> {
        let identity = self.decode(envelope)?;
        if identity.registry() != registry.registry_name() {
            return Err(SchemaError::NotFound {
                name: format!("{}/{}", identity.registry(), identity.schema_name()),
                version: identity.version().to_string(),
            });
        }
        let document = registry.version_content(identity.schema_name(), Some(identity.version()))?;
        let descriptor = self.reflector.compile(&document)?;
        let value = bind(&descriptor, &envelope.payload)?;
        tracing::debug!(identity = %identity, source = %envelope.source, "reflected envelope payload");
        Ok((descriptor, value))
    }
}
