mod chat;
mod deferred;
mod logging;
mod output;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use askdoc_core::config::{expand_path, Config, Settings};
use askdoc_embed::{embedder_from_settings, HashEmbedder};
use askdoc_loader::default_registry;
use askdoc_rag::{IndexManager, Pipeline};
use askdoc_vector::{index_service_from_settings, MemoryIndexService};

use crate::deferred::DeferredGenerator;
use crate::output::{print_answer, print_cost, print_ingest};

#[derive(Parser)]
#[command(name = "askdoc", version, about = "Ask questions about a PDF or DOCX document")]
struct Cli {
    /// Directory holding config.toml and config.<env>.toml
    #[arg(short = 'C', long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, chunk, embed and index a document
    Ingest { path: String },
    /// Answer a question using the existing index
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive question loop
    Chat {
        /// Ingest this document before the first question
        #[arg(long)]
        file: Option<String>,
    },
    /// Estimate the embedding cost of a document without indexing it
    Cost { path: String },
    /// List indexes
    List,
    /// Delete the configured index, a named one, or all of them
    Delete {
        name: Option<String>,
        #[arg(long, conflicts_with = "name")]
        all: bool,
    },
}

fn build_pipeline(settings: &Settings) -> Result<Pipeline> {
    let embedder = embedder_from_settings(&settings.embedding)?;
    let service = index_service_from_settings(settings)?;
    let generator = Arc::new(DeferredGenerator::new(settings.generation.clone()));
    Ok(Pipeline::from_settings(settings, default_registry(), embedder, service, generator)?)
}

/// Estimation never embeds or indexes, so offline collaborators stand in and no API key is needed.
fn estimating_pipeline(settings: &Settings) -> Result<Pipeline> {
    let embedder = Arc::new(HashEmbedder::new(settings.embedding.dimension));
    let generator = Arc::new(DeferredGenerator::new(settings.generation.clone()));
    Ok(Pipeline::from_settings(settings, default_registry(), embedder, Arc::new(MemoryIndexService::new()), generator)?)
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let env_name = std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = Config::load_from(&cli.config_dir, &env_name)?;
    let settings = config.settings()?;
    tracing::debug!(env = config.env_name(), ?settings, "configuration loaded");

    match cli.command {
        Command::Ingest { path } => {
            let mut pipeline = build_pipeline(&settings)?;
            let report = pipeline.ingest(&expand_path(path))?;
            print_ingest(&report);
        }
        Command::Ask { question } => {
            let mut pipeline = build_pipeline(&settings)?;
            if !pipeline.resume()? {
                bail!("index '{}' does not exist; run `askdoc ingest <path>` first", settings.index.name);
            }
            let answer = pipeline.answer(&question.join(" "))?;
            print_answer(&answer);
        }
        Command::Chat { file } => {
            let mut pipeline = build_pipeline(&settings)?;
            chat::run(&mut pipeline, file.map(expand_path).as_deref())?;
        }
        Command::Cost { path } => {
            let report = estimating_pipeline(&settings)?.estimate(&expand_path(path))?;
            print_cost(report.chunks, &report.cost);
        }
        Command::List => {
            let manager = IndexManager::new(index_service_from_settings(&settings)?);
            let names = manager.list()?;
            if names.is_empty() {
                println!("No indexes.");
            }
            for name in names {
                match manager.open(&name)? {
                    Some(spec) => println!("{name}\t{} dims\t{}\t{}", spec.dimension, spec.metric, spec.embedder_id),
                    None => println!("{name}"),
                }
            }
        }
        Command::Delete { name, all } => {
            let manager = IndexManager::new(index_service_from_settings(&settings)?);
            if all {
                let deleted = manager.delete_all()?;
                println!("🗑️  Deleted {} index(es)", deleted.len());
            } else {
                let name = name.unwrap_or_else(|| settings.index.name.clone());
                manager.delete(&name)?;
                println!("🗑️  Deleted index '{name}'");
            }
        }
    }
    Ok(())
}
