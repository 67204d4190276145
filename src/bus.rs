//! Event Bus
//!
//! Publishing side of envelopes: an [`EventBus`] accepts encoded envelopes
//! and an [`EventPublisher`] ties a model to its registered schema before
//! handing the envelope over.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::binding::bind;
use crate::config::EventsConfig;
use crate::descriptor::TypeDescriptor;
use crate::directory::SchemaDirectory;
use crate::envelope::{EnvelopeCodec, EventEnvelope};
use crate::error::{BusError, Result, SchemaError};
use crate::registry::SchemaRegistry;
use crate::schema::QualifiedName;

/// Bus used when none is configured
pub const DEFAULT_BUS: &str = "default";

/// Resources attached to every published event
pub const STANDARD_RESOURCES: &[&str] = &["event-schemas"];

/// Acknowledgment of a published event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublishReceipt {
    pub event_id: String,
}

pub trait EventBus: Send + Sync {
    fn publish(&self, envelope: &EventEnvelope) -> std::result::Result<PublishReceipt, BusError>;
}

impl<T: EventBus + ?Sized> EventBus for Arc<T> {
    fn publish(&self, envelope: &EventEnvelope) -> std::result::Result<PublishReceipt, BusError> {
        (**self).publish(envelope)
    }
}

/// Bus that keeps every published envelope
#[derive(Debug, Default)]
pub struct MemoryBus {
    published: Mutex<Vec<EventEnvelope>>,
    rejecting: Mutex<Option<String>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Envelopes published so far, oldest first
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().clone()
    }

    /// Reject every publish with `reason` until cleared with `None`
    pub fn reject(&self, reason: Option<&str>) {
        *self.rejecting.lock() = reason.map(String::from);
    }
}

impl EventBus for MemoryBus {
    fn publish(&self, envelope: &EventEnvelope) -> std::result::Result<PublishReceipt, BusError> {
        if let Some(reason) = self.rejecting.lock().as_ref() {
            return Err(BusError::Rejected {
                bus: envelope.event_bus_name.clone().unwrap_or_default(),
                reason: reason.clone(),
            });
        }
        let mut published = self.published.lock();
        let event_id = format!("event-{:08}", published.len() + 1);
        let mut stored = envelope.clone();
        stored.id = Some(event_id.clone());
        published.push(stored);
        Ok(PublishReceipt { event_id })
    }
}

/// Publishes model payloads, registering each model's schema on first use
pub struct EventPublisher<D, B> {
    registry: Arc<SchemaRegistry<D>>,
    codec: EnvelopeCodec,
    bus: B,
    bus_name: String,
    standard_resources: Vec<String>,
}

impl<D: SchemaDirectory, B: EventBus> EventPublisher<D, B> {
    pub fn new(registry: Arc<SchemaRegistry<D>>, bus: B) -> Self {
        let codec = EnvelopeCodec::new(registry.registry_name());
        Self {
            registry,
            codec,
            bus,
            bus_name: DEFAULT_BUS.to_string(),
            standard_resources: STANDARD_RESOURCES.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Take the bus name and standard resources from configuration
    pub fn with_config(mut self, config: &EventsConfig) -> Self {
        self.bus_name = config.bus_name.clone();
        self.standard_resources = config.standard_resources.clone();
        self
    }

    pub fn registry(&self) -> &SchemaRegistry<D> {
        &self.registry
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    /// Bind `payload` to `descriptor` and publish it.
    ///
    /// A model not yet registered by this process is registered as
    /// `<source>.<descriptor name>` first. The envelope's resources are the
    /// standard resources followed by `extra_resources`.
    pub fn send<I, S>(
        &self,
        source: &str,
        descriptor: &TypeDescriptor,
        payload: &Value,
        extra_resources: I,
    ) -> Result<PublishReceipt>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let payload = bind(descriptor, payload)?;
        let handle = descriptor.handle();
        let identity = match self.registry.schema_for(&handle) {
            Ok(identity) => identity,
            Err(SchemaError::ModelNotRegistered(_)) => {
                let name = QualifiedName::new(source, descriptor.name.clone())?;
                self.registry.register_or_update(&name, descriptor)?.identity()?
            }
            Err(e) => return Err(e),
        };

        let resources = self
            .standard_resources
            .iter()
            .cloned()
            .chain(extra_resources.into_iter().map(Into::into));
        let mut envelope = self.codec.encode(&identity, resources, source, payload);
        envelope.event_bus_name = Some(self.bus_name.clone());
        envelope.time = Some(Utc::now());

        let receipt = self.bus.publish(&envelope)?;
        tracing::debug!(
            event_id = %receipt.event_id,
            correlation = %envelope.schema_correlation,
            bus = %self.bus_name,
            "published event"
        );
        Ok(receipt)
    }
}
