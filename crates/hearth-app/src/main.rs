//! Hearth application entry point.
//!
//! Wires storage, the vector index, the optional Gemini collaborators and the
//! orchestrator together, then either answers a single `--ask` turn or serves
//! the chat API.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hearth_api::{start_server, AppState};
use hearth_chat::{GeminiGenerator, Orchestrator, OrchestratorDeps, TextGenerator};
use hearth_core::config::HearthConfig;
use hearth_core::types::Clock;
use hearth_storage::{seed_demo_listings, Database, ListingRepository, SqliteListingRepository};
use hearth_vector::{
    DynEmbeddingService, GeminiEmbedding, HashingEmbedding, InMemoryVectorIndex, ListingIndexer,
};

use cli::CliArgs;

/// Expand a leading `~` to the user's home directory.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Pick the embedding backend: Gemini when a key is configured, else hashing.
fn build_embedder(config: &HearthConfig, api_key: Option<&str>) -> Arc<dyn DynEmbeddingService> {
    if let Some(key) = api_key {
        match GeminiEmbedding::new(key, &config.gemini) {
            Ok(embedder) => {
                tracing::info!(model = %config.gemini.embedding_model, "Gemini embeddings enabled");
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Gemini embeddings unavailable, using hashing embedder")
            }
        }
    }
    Arc::new(HashingEmbedding::new())
}

fn build_generator(config: &HearthConfig, api_key: Option<&str>) -> Option<Arc<dyn TextGenerator>> {
    let key = api_key?;
    match GeminiGenerator::new(key, &config.gemini) {
        Ok(generator) => {
            tracing::info!(model = %config.gemini.chat_model, "Gemini generation enabled");
            Some(Arc::new(generator))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Gemini generation unavailable");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = HearthConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.general.port = args.resolve_port(config.general.port);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Hearth v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("hearth.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let sqlite_repo = SqliteListingRepository::new(db);
    if args.seed && sqlite_repo.count().await? == 0 {
        seed_demo_listings(&sqlite_repo, chrono::Local::now().date_naive())?;
    }
    let repo: Arc<dyn ListingRepository> = Arc::new(sqlite_repo);

    // Vector index.
    let api_key = config.gemini.resolve_api_key();
    let embedder = build_embedder(&config, api_key.as_deref());
    let index = InMemoryVectorIndex::new();
    match ListingIndexer::new(Arc::clone(&embedder), index.clone())
        .index_all(repo.as_ref())
        .await
    {
        Ok(report) => tracing::info!(
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed,
            "Listing index built"
        ),
        Err(e) => tracing::warn!(error = %e, "Listing index build failed, keyword search only"),
    }

    // Orchestrator.
    let orchestrator = Arc::new(Orchestrator::from_config(
        &config,
        OrchestratorDeps {
            repo: Arc::clone(&repo),
            embedder,
            index: Arc::new(index.clone()),
            generator: build_generator(&config, api_key.as_deref()),
            clock: Clock::System,
        },
    ));

    if let Some(message) = args.ask {
        orchestrator.validate(&message)?;
        let turn = orchestrator.handle_turn(&message, "cli").await;
        println!("{}", serde_json::to_string_pretty(&turn)?);
        return Ok(());
    }

    // === Background tasks ===

    // Idle conversation reaper.
    let reaper = Arc::clone(&orchestrator);
    let reap_every =
        Duration::from_secs(u64::from(config.conversation.reap_interval_minutes.max(1)) * 60);
    let idle_timeout =
        chrono::Duration::minutes(i64::from(config.conversation.idle_timeout_minutes));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reap_every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = reaper.store().reap_idle(idle_timeout) {
                tracing::warn!(error = %e, "Conversation reaper failed");
            }
        }
    });

    // === API server ===

    let state = AppState::new(config.clone(), orchestrator, repo, index);
    start_server(&config, state).await?;

    Ok(())
}
