//! SQLite-backed vector store using the sqlite-vec extension.

use std::path::Path;
use std::sync::{Mutex, Once, PoisonError};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sqlite_vec::sqlite3_vec_init;
use tracing::info;

use crate::chunker::chunk::{Chunk, ChunkKind, Language};
use crate::store::StoreError;

/// The per-chunk fields a search result carries. A subset of [`Chunk`];
/// the byte range stays behind in the chunk file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub file_path: String,
    pub code: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: Language,
    pub kind: ChunkKind,
}

impl From<&Chunk> for ChunkMetadata {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            file_path: chunk.file_path.clone(),
            code: chunk.code.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            language: chunk.language,
            kind: chunk.kind,
        }
    }
}

pub trait VectorStore: Send + Sync {
    fn add(
        &self,
        chunk_id: &str,
        embedding: &[f32],
        metadata: &ChunkMetadata,
    ) -> Result<(), StoreError>;

    /// Nearest neighbours by cosine distance, closest first. Each hit is the
    /// stored metadata plus its raw distance.
    fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkMetadata, f64)>, StoreError>;

    /// Every stored metadata row, in insertion order. Lets callers check the
    /// store's chunk ids against the chunk file before trusting vector hits.
    fn list_all_metadata(&self) -> Result<Vec<ChunkMetadata>, StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Serialize a float32 vector into bytes for the vec0 virtual table.
fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl SqliteVectorStore {
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self, StoreError> {
        init_sqlite_vec();
        let conn = Connection::open(path.as_ref())?;
        let store = Self::init(conn, dimensions)?;
        info!(path = %path.as_ref().display(), "vector store opened");
        Ok(store)
    }

    pub fn open_in_memory(dimensions: usize) -> Result<Self, StoreError> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self, StoreError> {
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {vec_version}");

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chunk_id TEXT NOT NULL UNIQUE,
                file_path TEXT NOT NULL,
                code TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                language TEXT NOT NULL,
                kind TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunk_id ON chunk_metadata(chunk_id);

            CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(
                embedding FLOAT[{dimensions}]
            );
            "#
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn map_metadata_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkMetadata> {
    let language: String = row.get(5)?;
    let kind: String = row.get(6)?;
    Ok(ChunkMetadata {
        chunk_id: row.get(0)?,
        file_path: row.get(1)?,
        code: row.get(2)?,
        start_line: row.get::<_, i64>(3)? as usize,
        end_line: row.get::<_, i64>(4)? as usize,
        language: Language::parse(&language),
        kind: ChunkKind::parse(&kind),
    })
}

impl VectorStore for SqliteVectorStore {
    fn add(
        &self,
        chunk_id: &str,
        embedding: &[f32],
        metadata: &ChunkMetadata,
    ) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        conn.execute(
            "INSERT OR REPLACE INTO chunk_metadata
                 (chunk_id, file_path, code, start_line, end_line, language, kind)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                chunk_id,
                metadata.file_path,
                metadata.code,
                metadata.start_line as i64,
                metadata.end_line as i64,
                metadata.language.as_str(),
                metadata.kind.as_str(),
            ],
        )?;
        let row_id: i64 = conn.query_row(
            "SELECT id FROM chunk_metadata WHERE chunk_id = ?1",
            [chunk_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO vec_chunks (rowid, embedding) VALUES (?1, ?2)",
            rusqlite::params![row_id, serialize_vector(embedding)],
        )?;
        Ok(())
    }

    fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkMetadata, f64)>, StoreError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut stmt = conn.prepare(
            "SELECT m.chunk_id, m.file_path, m.code, m.start_line, m.end_line,
                    m.language, m.kind,
                    vec_distance_cosine(v.embedding, ?1) AS distance
             FROM vec_chunks v
             JOIN chunk_metadata m ON v.rowid = m.id
             ORDER BY distance ASC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(
            rusqlite::params![serialize_vector(embedding), top_k as i64],
            |row| {
                let metadata = map_metadata_row(row)?;
                let distance: f64 = row.get(7)?;
                Ok((metadata, distance))
            },
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    fn list_all_metadata(&self) -> Result<Vec<ChunkMetadata>, StoreError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut stmt = conn.prepare(
            "SELECT chunk_id, file_path, code, start_line, end_line, language, kind
             FROM chunk_metadata ORDER BY id",
        )?;
        let rows = stmt.query_map([], map_metadata_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        conn.execute_batch("DELETE FROM vec_chunks; DELETE FROM chunk_metadata;")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(chunk_id: &str) -> ChunkMetadata {
        ChunkMetadata {
            chunk_id: chunk_id.to_string(),
            file_path: "src/demo.py".to_string(),
            code: "def f():\n    pass".to_string(),
            start_line: 1,
            end_line: 2,
            language: Language::Python,
            kind: ChunkKind::Function,
        }
    }

    #[test]
    fn test_serialize_vector() {
        let bytes = serialize_vector(&[1.0, 2.0, -3.5]);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x40]);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x60, 0xc0]);
    }

    #[test]
    fn test_add_and_query_orders_by_distance() {
        let store = SqliteVectorStore::open_in_memory(3).unwrap();
        store.add("a", &[1.0, 0.0, 0.0], &metadata("a")).unwrap();
        store.add("b", &[0.0, 1.0, 0.0], &metadata("b")).unwrap();
        store.add("c", &[0.9, 0.1, 0.0], &metadata("c")).unwrap();

        let hits = store.query(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.chunk_id, "a");
        assert_eq!(hits[1].0.chunk_id, "c");
        assert!(hits[0].1 < hits[1].1);
    }

    #[test]
    fn test_list_all_metadata_in_insertion_order() {
        let store = SqliteVectorStore::open_in_memory(2).unwrap();
        store.add("one", &[1.0, 0.0], &metadata("one")).unwrap();
        store.add("two", &[0.0, 1.0], &metadata("two")).unwrap();

        let all = store.list_all_metadata().unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["one", "two"]);
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = SqliteVectorStore::open_in_memory(2).unwrap();
        store.add("gone", &[1.0, 0.0], &metadata("gone")).unwrap();
        store.clear().unwrap();

        assert!(store.list_all_metadata().unwrap().is_empty());
        assert!(store.query(&[1.0, 0.0], 5).unwrap().is_empty());
    }
}
