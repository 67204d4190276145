//! Event Schemas
//!
//! Keeps the JSON Schema of every event type in a versioned registry and
//! ties published events to the exact schema version they were produced
//! from.
//!
//! ## Features
//!
//! - **Append-only Versions**: registering changed content adds a version, unchanged content is a no-op
//! - **Reflection**: stored schema documents compile back into [`TypeDescriptor`]s
//! - **Correlation**: envelopes carry `registry/name:version` so consumers can fetch the schema
//! - **Checksums**: SHA256 checksums identify documents and models
//!
//! ## Architecture
//!
//! ```text
//! TypeDescriptor ──to_schema──▶ SchemaDocument ──register_or_update──▶ SchemaDirectory
//!       ▲                                                                  │
//!       └──────── Reflector::compile ◀── SchemaRegistry::version_content ◀─┘
//!
//! EventPublisher::send ──EnvelopeCodec::encode──▶ EventBus
//! EventEnvelope ──EnvelopeCodec::reflect_payload──▶ (TypeDescriptor, payload)
//! ```

pub mod binding;
pub mod bus;
pub mod checksum;
pub mod config;
pub mod descriptor;
pub mod directory;
pub mod envelope;
pub mod error;
pub mod reflect;
pub mod registry;
pub mod schema;
pub mod version;

pub use binding::bind;
pub use bus::{EventBus, EventPublisher, MemoryBus, PublishReceipt};
pub use checksum::Checksum;
pub use config::EventSchemasConfig;
pub use descriptor::{Field, FieldType, ModelHandle, PrimitiveKind, TypeDescriptor};
pub use directory::{FsDirectory, MemoryDirectory, SchemaDirectory};
pub use envelope::{EnvelopeCodec, EventEnvelope, SchemaIdentity};
pub use error::{BusError, DirectoryError, Result, SchemaError};
pub use reflect::Reflector;
pub use registry::SchemaRegistry;
pub use schema::{QualifiedName, SchemaDocument, SchemaFormat};
pub use version::{SchemaRecord, SchemaVersion, VersionId};
