//! Event Envelope CLI
//!
//! Encode, decode and consume event envelopes against a filesystem-backed
//! registry.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use event_schemas::{
    BusError, EnvelopeCodec, EventBus, EventEnvelope, EventPublisher, EventSchemasConfig,
    FsDirectory, PublishReceipt, Reflector, SchemaDocument, SchemaIdentity, SchemaRegistry,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-events")]
#[command(about = "Encode, decode and consume event envelopes")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Directory root, overriding the configured path
    #[arg(short, long)]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap a payload in an envelope for a stored schema version
    Encode {
        /// Qualified schema name
        name: String,
        #[arg(short, long)]
        version: String,
        #[arg(short, long)]
        source: String,
        /// Payload JSON file
        payload: PathBuf,
        /// Extra resources
        #[arg(short, long)]
        resource: Vec<String>,
    },

    /// Print the schema identity an envelope refers to
    Decode {
        /// Envelope JSON file
        envelope: PathBuf,
    },

    /// Reflect an envelope's schema and bind its payload
    Consume {
        envelope: PathBuf,
    },

    /// Register a model schema if needed and print the published envelope
    Send {
        /// Schema document describing the model
        schema: PathBuf,
        #[arg(short, long)]
        source: String,
        payload: PathBuf,
        #[arg(short, long)]
        resource: Vec<String>,
    },
}

/// Writes each published envelope to stdout as one JSON line
struct StdoutBus;

impl EventBus for StdoutBus {
    fn publish(&self, envelope: &EventEnvelope) -> Result<PublishReceipt, BusError> {
        let line = serde_json::to_string(envelope)?;
        println!("{}", line);
        Ok(PublishReceipt {
            event_id: envelope.id.clone().unwrap_or_else(|| "stdout".to_string()),
        })
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn run(cli: Cli) -> Result<()> {
    let mut config = EventSchemasConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(directory) = cli.directory {
        config.directory.path = directory;
    }
    let codec = EnvelopeCodec::new(config.registry.name.clone());

    if let Commands::Decode { envelope } = &cli.command {
        let envelope: EventEnvelope = serde_json::from_value(read_json(envelope)?)?;
        let identity = codec.decode(&envelope)?;
        println!("registry: {}", identity.registry());
        println!("schema:   {}", identity.schema_name());
        println!("version:  {}", identity.version());
        return Ok(());
    }

    let directory = FsDirectory::open(config.directory_path())?.with_page_size(config.directory.page_size);
    let registry = SchemaRegistry::open(directory, &config.registry)?;

    match cli.command {
        Commands::Encode {
            name,
            version,
            source,
            payload,
            resource,
        } => {
            let identity = SchemaIdentity::new(registry.registry_name(), &name, &version)?;
            // the version must exist before anything refers to it
            registry.version_content(&name, Some(&version))?;
            let resources = config.events.standard_resources.iter().cloned().chain(resource);
            let mut envelope = codec.encode(&identity, resources, &source, read_json(&payload)?);
            envelope.event_bus_name = Some(config.events.bus_name.clone());
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }

        Commands::Consume { envelope } => {
            let envelope: EventEnvelope = serde_json::from_value(read_json(&envelope)?)?;
            let (descriptor, payload) = codec.reflect_payload(&envelope, &registry)?;
            println!("✅ {} from {}", descriptor.name, envelope.source);
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }

        Commands::Send {
            schema,
            source,
            payload,
            resource,
        } => {
            let content = std::fs::read_to_string(&schema)
                .with_context(|| format!("reading {}", schema.display()))?;
            let descriptor = Reflector::new().compile(&SchemaDocument::new(content))?;
            let publisher = EventPublisher::new(Arc::new(registry), StdoutBus).with_config(&config.events);
            publisher.send(&source, &descriptor, &read_json(&payload)?, resource)?;
        }

        Commands::Decode { .. } => {}
    }

    Ok(())
}
