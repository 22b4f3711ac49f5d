use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use codescout::config::Config;
use codescout::embedder::{Embedder, HashEmbedder};
use codescout::indexer::FolderIndexer;
use codescout::indexer::discover::WalkDiscoverer;
use codescout::search::{SearchEngine, SearchError};
use codescout::search::thesaurus::StaticThesaurus;
use codescout::store::vector::{ChunkMetadata, SqliteVectorStore, VectorStore};
use codescout::store::{StoreError, load_chunks, out_of_sync, save_chunks};

#[derive(Parser)]
#[command(name = "codescout", version, about = "Chunk a source tree and search it")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, default_value = codescout::config::DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a directory tree into chunks and embeddings
    Index {
        /// Root directory to index
        root: PathBuf,
    },
    /// Search the indexed chunks
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results
        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    config.validate()?;

    match cli.command {
        Command::Index { root } => run_index(&config, &root).await,
        Command::Search { query, top_k } => {
            run_search(&config, &query, top_k.unwrap_or(config.search_top_k)).await
        }
    }
}

async fn run_index(config: &Config, root: &std::path::Path) -> Result<()> {
    let discoverer = WalkDiscoverer::with_excluded_dirs(config.excluded_dirs.iter().cloned());
    let mut indexer = FolderIndexer::with_discoverer(discoverer);
    let outcome = indexer.index(root)?;

    save_chunks(std::path::Path::new(&config.chunks_path), &outcome.chunks)?;

    // Embedding problems degrade search to the text signals; the chunk file
    // is already on disk at this point.
    if let Err(e) = populate_vector_store(config, &outcome.chunks) {
        warn!("vector store population failed, search will be text-only: {e:#}");
    }

    println!(
        "Indexed {} of {} files ({} skipped, {} failed): {} chunks",
        outcome.files_indexed,
        outcome.files_discovered,
        outcome.files_skipped,
        outcome.files_failed,
        outcome.chunks.len(),
    );
    Ok(())
}

fn populate_vector_store(
    config: &Config,
    chunks: &[codescout::chunker::chunk::Chunk],
) -> Result<()> {
    let store = SqliteVectorStore::open(&config.db_path, config.dimensions)
        .context("failed to open vector store")?;
    store.clear()?;

    let embedder = HashEmbedder::new(config.dimensions);
    for chunk in chunks {
        let embedding = embedder.embed(&chunk.code)?;
        store.add(&chunk.chunk_id, &embedding, &ChunkMetadata::from(chunk))?;
    }
    info!(count = chunks.len(), "embeddings stored");
    Ok(())
}

async fn run_search(config: &Config, query: &str, top_k: usize) -> Result<()> {
    let chunks = match load_chunks(std::path::Path::new(&config.chunks_path)) {
        Ok(chunks) => chunks,
        Err(StoreError::NotIndexed(path)) => {
            println!("Nothing indexed yet ({path} not found). Run `codescout index <root>` first.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let store: Arc<dyn VectorStore> =
        match SqliteVectorStore::open(&config.db_path, config.dimensions) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!("vector store unavailable, falling back to text signals: {e}");
                Arc::new(SqliteVectorStore::open_in_memory(config.dimensions)?)
            }
        };

    match store.list_all_metadata() {
        Ok(stored) => {
            if out_of_sync(&chunks, &stored) {
                warn!(
                    "vector store does not match the chunk file; vector results may be stale, re-run `codescout index`"
                );
            }
        }
        Err(e) => warn!("could not inspect vector store: {e}"),
    }

    let engine = SearchEngine::new(
        chunks,
        store,
        Arc::new(HashEmbedder::new(config.dimensions)),
        Arc::new(StaticThesaurus::new()),
    )
    .with_weights(config.weights)
    .with_signal_timeout(Duration::from_millis(config.signal_timeout_ms));

    let hits = match engine.search(query, top_k).await {
        Ok(hits) => hits,
        Err(SearchError::EmptyQuery) => {
            println!("Query must not be empty.");
            return Ok(());
        }
        Err(SearchError::NotIndexed) => {
            println!("The index is empty. Run `codescout index <root>` first.");
            return Ok(());
        }
    };

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        let sources: Vec<&str> = hit.sources.iter().map(|s| s.as_str()).collect();
        println!(
            "{}. {} (score {:.3}, via {})",
            rank + 1,
            hit.chunk_id,
            hit.score,
            sources.join("+"),
        );
        println!(
            "   {}:{}-{} [{} {}]",
            hit.metadata.file_path,
            hit.metadata.start_line,
            hit.metadata.end_line,
            hit.metadata.language.as_str(),
            hit.metadata.kind.as_str(),
        );
        for line in hit.metadata.code.lines().take(3) {
            println!("   | {line}");
        }
    }
    Ok(())
}
