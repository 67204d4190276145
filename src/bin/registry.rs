//! Schema Registry CLI
//!
//! Inspect and register schemas in a filesystem-backed registry.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use event_schemas::{
    EventSchemasConfig, FsDirectory, QualifiedName, Reflector, SchemaDocument, SchemaRegistry,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-registry")]
#[command(about = "Inspect and register event schemas")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Directory root, overriding the configured path
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Registry name, overriding the configured one
    #[arg(short, long)]
    registry: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List schema names
    List,

    /// Show the version history of a schema
    Show {
        /// Qualified schema name
        name: String,
    },

    /// Print a schema document
    Get {
        name: String,
        /// Version (defaults to the greatest)
        #[arg(short, long)]
        version: Option<String>,
    },

    /// Register a JSON Schema file
    Register {
        /// Schema document with a `title`
        file: PathBuf,
        /// Namespace the title is qualified with
        #[arg(short, long)]
        namespace: String,
    },

    /// Reflect a stored schema into its type descriptor
    Reflect {
        name: String,
        #[arg(short, long)]
        version: Option<String>,
    },

    /// Print the effective configuration, or save it
    Config {
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = EventSchemasConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(directory) = cli.directory {
        config.directory.path = directory;
    }
    if let Some(registry) = cli.registry {
        config.registry.name = registry;
    }

    if let Commands::Config { output } = &cli.command {
        match output {
            Some(path) => {
                config.save(path)?;
                println!("✅ Saved configuration to {}", path);
            }
            None => print!("{}", toml::to_string_pretty(&config)?),
        }
        return Ok(());
    }

    let directory = FsDirectory::open(config.directory_path())?.with_page_size(config.directory.page_size);
    let registry = SchemaRegistry::open(directory, &config.registry)?;

    match cli.command {
        Commands::List => {
            let names = registry.schema_names();
            if names.is_empty() {
                println!("No schemas in registry {}", registry.registry_name());
            }
            for name in names {
                println!("{}", name);
            }
        }

        Commands::Show { name } => {
            let record = registry.get(&name)?;
            println!("{}", record);
            for version in record.versions() {
                println!(
                    "  {} ({}, {}) {}",
                    version.version,
                    version.format,
                    version.created_at.format("%Y-%m-%d %H:%M:%S"),
                    version.checksum
                );
            }
        }

        Commands::Get { name, version } => {
            let document = registry.version_content(&name, version.as_deref())?;
            println!("{}", serde_json::to_string_pretty(document.value()?)?);
        }

        Commands::Register { file, namespace } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let descriptor = Reflector::new().compile(&SchemaDocument::new(content))?;
            let name = QualifiedName::new(namespace, descriptor.name.clone())?;
            let version = registry.register_or_update(&name, &descriptor)?;
            println!("✅ {} version {}", version.name, version.version);
            println!("   {}", version.identity()?.correlation());
        }

        Commands::Reflect { name, version } => {
            let descriptor = registry.reflect(&name, version.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}
