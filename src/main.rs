use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use notedex::notes::{read_note_file, NotesDir};
use notedex::semantic::{build_provider, summarize_note, ProviderError};
use notedex::{Config, IndexError, SemanticIndex};

mod cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let base_path = Config::default_base_path()?;
    let mut config = Config::load_with(&base_path)?;
    config.apply_api_key_override(std::env::var("NOTEDEX_API_KEY").ok());
    tracing::debug!(base_path = %base_path.display(), provider = ?config.ai_service.provider, "config loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run(args.command, config))
}

async fn run(command: cli::Command, config: Config) -> anyhow::Result<()> {
    if let cli::Command::Summarize { note_id } = &command {
        return summarize(&config, note_id).await;
    }

    let index = SemanticIndex::from_config(&config).await?;

    match command {
        cli::Command::Index { path } => {
            let note = read_note_file(&path).await?;
            let summary = index.index_note(&note).await.map_err(explain)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        cli::Command::Reindex {} => {
            let notes = NotesDir::new(config.notes_dir()).load_all().await;
            log::info!("reindexing {} notes", notes.len());

            let summary = index.index_notes(&notes).await.map_err(explain)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        cli::Command::Delete { note_id } => {
            index.delete_note(&note_id).await?;
            println!("{}", serde_json::to_string_pretty(&json!({ "deleted": note_id }))?);
        }

        cli::Command::Search { query, limit } => {
            let results = index.search(&query, limit).await.map_err(explain)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        cli::Command::Stats {} => {
            let snapshot = index.records();
            let stats = json!({
                "path": index.store().path(),
                "provider": index.provider().map(|p| p.name()),
                "model": index.store().model(),
                "embeddings": index.has_embeddings(),
                "records": snapshot.len(),
                "notes": snapshot.note_count(),
                "dimensions": snapshot.dimensions(),
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        // handled before the index is opened
        cli::Command::Summarize { .. } => {}
    }

    Ok(())
}

async fn summarize(config: &Config, note_id: &str) -> anyhow::Result<()> {
    let note = NotesDir::new(config.notes_dir()).read(note_id).await?;

    let Some(provider) = build_provider(&config.ai_service)? else {
        anyhow::bail!("summaries need an AI provider: set ai_service.api_key (or NOTEDEX_API_KEY)");
    };

    let completion = summarize_note(provider.as_ref(), &note)
        .await
        .map_err(|err| match err {
            ProviderError::Unsupported { .. } => anyhow::Error::new(err)
                .context("the configured provider cannot generate completions"),
            err => err.into(),
        })?;

    println!("{}", serde_json::to_string_pretty(&completion)?);
    Ok(())
}

/// Attach a hint for the one error an operator can fix from config.
fn explain(err: IndexError) -> anyhow::Error {
    match err {
        IndexError::CapabilityUnavailable => anyhow::Error::new(err).context(
            "semantic search needs an embedding provider: set ai_service.api_key \
             (or NOTEDEX_API_KEY) with provider openai, and vector_db.enabled: true",
        ),
        err => err.into(),
    }
}
