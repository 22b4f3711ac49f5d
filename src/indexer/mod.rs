//! Folder indexing.
//!
//! Walks a root directory, chunks every supported file, and assigns each
//! chunk an identifier that is unique across the whole run. Per-file
//! problems (unreadable content, empty files) are recorded in the outcome
//! counters instead of aborting the run.

pub mod discover;

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chunker::ChunkingEngine;
use crate::chunker::chunk::{Chunk, ChunkKind};
use crate::indexer::discover::{FileDiscoverer, WalkDiscoverer};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("root path is not a directory: {0}")]
    InvalidRoot(String),
}

/// Summary of one indexing run.
#[derive(Debug, Default)]
pub struct IndexOutcome {
    pub chunks: Vec<Chunk>,
    pub files_discovered: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
}

/// Run-scoped chunk id generator. The counter increments for every chunk in
/// the run and never resets between files, so two files with the same stem
/// can never collide.
struct IndexRun {
    counter: u64,
}

impl IndexRun {
    fn new() -> Self {
        Self { counter: 0 }
    }

    fn next_chunk_id(&mut self, file_path: &str, kind: ChunkKind) -> String {
        self.counter += 1;
        let stem = Path::new(file_path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        format!("{stem}_{}_{}", kind.as_str(), self.counter)
    }
}

pub struct FolderIndexer<D: FileDiscoverer = WalkDiscoverer> {
    discoverer: D,
    engine: ChunkingEngine,
}

impl FolderIndexer<WalkDiscoverer> {
    pub fn new() -> Self {
        Self::with_discoverer(WalkDiscoverer::new())
    }
}

impl Default for FolderIndexer<WalkDiscoverer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: FileDiscoverer> FolderIndexer<D> {
    pub fn with_discoverer(discoverer: D) -> Self {
        Self {
            discoverer,
            engine: ChunkingEngine::new(),
        }
    }

    pub fn index(&mut self, root: &Path) -> Result<IndexOutcome, IndexError> {
        let files = self.discoverer.discover(root)?;
        let mut outcome = IndexOutcome {
            files_discovered: files.len(),
            ..Default::default()
        };
        let mut run = IndexRun::new();

        for path in &files {
            let content = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %path.display(), "failed to read file: {e}");
                    outcome.files_failed += 1;
                    continue;
                }
            };
            if content.trim().is_empty() {
                debug!(file = %path.display(), "empty file, skipping");
                outcome.files_skipped += 1;
                continue;
            }

            let file_path = path.to_string_lossy().replace('\\', "/");
            let mut chunks = self.engine.chunk(&file_path, &content);
            if chunks.is_empty() {
                debug!(file = %file_path, "no chunks produced");
            }
            for chunk in &mut chunks {
                chunk.chunk_id = run.next_chunk_id(&file_path, chunk.kind);
            }

            outcome.files_indexed += 1;
            outcome.chunks.extend(chunks);
        }

        info!(
            discovered = outcome.files_discovered,
            indexed = outcome.files_indexed,
            skipped = outcome.files_skipped,
            failed = outcome.files_failed,
            chunks = outcome.chunks.len(),
            "indexing run finished"
        );
        Ok(outcome)
    }
}
