mod chat;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lapadvisor_catalog::CatalogStore;
use lapadvisor_config::{AppConfig, DialogueArtifacts};
use lapadvisor_dialogue::DialogueEngine;
use lapadvisor_llm::{HttpLlmClient, LlmSettings};
use lapadvisor_vector::VectorStore;

#[derive(Debug, Parser)]
#[command(
    name = "lapadvisor",
    version,
    about = "Guided conversational laptop recommender"
)]
struct Cli {
    /// Path to the settings file.
    #[arg(long, global = true, default_value = "lapadvisor.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive chat over the dialogue engine.
    Chat,
    /// List the loaded models and series.
    Catalog,
    /// Validate the settings, artifacts, and catalog, then exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    match cli.command {
        Commands::Chat => {
            let engine = build_engine(&config)?;
            chat::run(&config, engine).await
        }
        Commands::Catalog => {
            let catalog = load_catalog(&config)?;
            println!("models ({}):", catalog.names().len());
            for name in catalog.names() {
                println!("  {name}");
            }
            println!("series ({}):", catalog.series().len());
            for series in catalog.series() {
                println!("  {series}");
            }
            Ok(())
        }
        Commands::Check => {
            let artifacts = DialogueArtifacts::load(&config.artifacts.dir)?;
            let catalog = load_catalog(&config)?;
            println!(
                "ok: {} topics, {} funnel features, {} scenarios, {} models, {} series",
                artifacts.intent_keywords.len(),
                artifacts.funnel.features.len(),
                artifacts.funnel.priorities.len(),
                catalog.names().len(),
                catalog.series().len(),
            );
            Ok(())
        }
    }
}

fn load_catalog(config: &AppConfig) -> Result<Arc<CatalogStore>> {
    Ok(Arc::new(CatalogStore::load_csv(&config.catalog.csv_path)?))
}

fn build_engine(config: &AppConfig) -> Result<DialogueEngine> {
    let artifacts = DialogueArtifacts::load(&config.artifacts.dir)?;
    let catalog = load_catalog(config)?;

    let vector = match &config.vector.index_path {
        Some(path) => Arc::new(VectorStore::load_json(path)?),
        None => Arc::new(VectorStore::from_catalog(&catalog)),
    };

    let backend = HttpLlmClient::new(LlmSettings {
        base_url: config.llm.base_url.clone(),
        model: config.llm.model.clone(),
        temperature: config.llm.temperature,
        max_tokens: config.llm.max_tokens,
        timeout: Duration::from_secs(config.llm.timeout_secs),
    })
    .context("building llm client")?;

    Ok(DialogueEngine::new(
        config,
        &artifacts,
        catalog,
        Some(vector),
        Arc::new(backend),
    ))
}
