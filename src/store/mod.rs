//! Persistence for indexed chunks.
//!
//! Chunks live in two places after an indexing run: the full chunk list as a
//! JSON file, and their embeddings in a SQLite vector database. The JSON
//! file is the source of truth for search; the vector database only serves
//! similarity lookups.

pub mod vector;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::chunker::chunk::Chunk;
use crate::store::vector::ChunkMetadata;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no index found at {0}, run the index command first")]
    NotIndexed(String),
    #[error("chunk file at {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Write the chunk list as pretty-printed JSON, replacing any previous file.
pub fn save_chunks(path: &Path, chunks: &[Chunk]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(chunks).map_err(|e| StoreError::Malformed {
        path: path.display().to_string(),
        source: e,
    })?;
    fs::write(path, json)?;
    info!(path = %path.display(), count = chunks.len(), "chunk file written");
    Ok(())
}

/// True when the vector store's chunk ids no longer mirror the chunk file,
/// for example after an interrupted indexing run or a stale database. Vector
/// results are unreliable until the next full index.
pub fn out_of_sync(chunks: &[Chunk], stored: &[ChunkMetadata]) -> bool {
    let chunk_ids: HashSet<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
    let stored_ids: HashSet<&str> = stored.iter().map(|m| m.chunk_id.as_str()).collect();
    chunk_ids != stored_ids
}

pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotIndexed(path.display().to_string()));
    }
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| StoreError::Malformed {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk::{ChunkKind, Language};
    use tempfile::TempDir;

    fn sample_chunk() -> Chunk {
        Chunk {
            chunk_id: "util_function_1".to_string(),
            file_path: "src/util.py".to_string(),
            code: "def f():\n    return 1".to_string(),
            start_line: 1,
            end_line: 2,
            byte_range: (0, 21),
            language: Language::Python,
            kind: ChunkKind::Function,
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chunks.json");
        let chunks = vec![sample_chunk()];

        save_chunks(&path, &chunks).unwrap();
        let loaded = load_chunks(&path).unwrap();
        assert_eq!(loaded, chunks);
    }

    #[test]
    fn test_missing_file_means_not_indexed() {
        let tmp = TempDir::new().unwrap();
        let err = load_chunks(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::NotIndexed(_)));
    }

    #[test]
    fn test_out_of_sync_detects_id_divergence() {
        let chunk = sample_chunk();
        let matching = ChunkMetadata::from(&chunk);
        assert!(!out_of_sync(&[chunk.clone()], &[matching.clone()]));

        // Store empty while chunks exist, and vice versa.
        assert!(out_of_sync(&[chunk.clone()], &[]));
        assert!(out_of_sync(&[], &[matching.clone()]));

        // A stale extra entry in the store.
        let mut stale = matching.clone();
        stale.chunk_id = "util_function_999".to_string();
        assert!(out_of_sync(&[chunk], &[matching, stale]));
    }

    #[test]
    fn test_garbage_file_is_malformed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chunks.json");
        std::fs::write(&path, "{niet json").unwrap();

        let err = load_chunks(&path).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }
}
