/// End-to-end integration tests for the indexing and search pipeline.
///
/// Tests the complete flow:
///   Indexer → chunk file → vector store → SearchEngine
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use codescout::chunker::chunk::{Chunk, ChunkKind, Language};
use codescout::embedder::{Embedder, HashEmbedder};
use codescout::indexer::FolderIndexer;
use codescout::search::{SearchEngine, SearchError, Signal};
use codescout::search::thesaurus::StaticThesaurus;
use codescout::store::vector::{ChunkMetadata, SqliteVectorStore, VectorStore};
use codescout::store::{load_chunks, save_chunks};

fn write_sample_tree(root: &std::path::Path) {
    fs::write(
        root.join("handlers.py"),
        "\
import json

@app.route('/ping')
def ping(request):
    return json.dumps({'ok': True})

class Router:
    def dispatch(self, path):
        return ping(path)
",
    )
    .unwrap();

    fs::write(
        root.join("two_sum.js"),
        "\
function twoSum(nums, target) {
    const seen = new Map();
    for (let i = 0; i < nums.length; i++) {
        const need = target - nums[i];
        if (seen.has(need)) return [seen.get(need), i];
        seen.set(nums[i], i);
    }
    return [];
}
",
    )
    .unwrap();

    fs::write(
        root.join("main.c"),
        "\
#include <stdio.h>

int main(void) {
    printf(\"braces in strings: }{\");
    return 0;
}
",
    )
    .unwrap();

    fs::create_dir_all(root.join("node_modules")).unwrap();
    fs::write(root.join("node_modules/dep.js"), "function skip() {}\n").unwrap();
    fs::write(root.join("README.md"), "# not code\n").unwrap();
}

fn index_sample_tree() -> (tempfile::TempDir, Vec<Chunk>) {
    let temp_dir = tempdir().unwrap();
    write_sample_tree(temp_dir.path());

    let outcome = FolderIndexer::new().index(temp_dir.path()).unwrap();
    assert_eq!(outcome.files_indexed, 3, "py, js and c files only");
    (temp_dir, outcome.chunks)
}

fn engine_for(chunks: Vec<Chunk>) -> SearchEngine {
    let dims = 128;
    let embedder = Arc::new(HashEmbedder::new(dims));
    let store = Arc::new(SqliteVectorStore::open_in_memory(dims).unwrap());
    for chunk in &chunks {
        let embedding = embedder.embed(&chunk.code).unwrap();
        store
            .add(&chunk.chunk_id, &embedding, &ChunkMetadata::from(chunk))
            .unwrap();
    }
    SearchEngine::new(chunks, store, embedder, Arc::new(StaticThesaurus::new()))
}

#[test]
fn test_index_produces_unique_tiling_chunks() {
    let (_tmp, chunks) = index_sample_tree();
    assert!(!chunks.is_empty());

    let ids: HashSet<_> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids.len(), chunks.len(), "chunk ids must be unique run-wide");

    // Definitions were found in every file.
    for kind in [ChunkKind::Function, ChunkKind::Class] {
        assert!(chunks.iter().any(|c| c.kind == kind), "missing {kind:?}");
    }
    assert!(chunks.iter().any(|c| c.language == Language::C));

    // Within each file, chunks are ordered and non-overlapping.
    let mut by_file: std::collections::HashMap<&str, Vec<&Chunk>> = Default::default();
    for chunk in &chunks {
        by_file.entry(&chunk.file_path).or_default().push(chunk);
    }
    for file_chunks in by_file.values() {
        let mut prev_end = 0;
        for chunk in file_chunks.iter() {
            assert!(chunk.byte_range.0 >= prev_end, "overlap in {}", chunk.file_path);
            prev_end = chunk.byte_range.1;
        }
    }
}

#[test]
fn test_excluded_and_unsupported_files_ignored() {
    let (_tmp, chunks) = index_sample_tree();
    assert!(chunks.iter().all(|c| !c.file_path.contains("node_modules")));
    assert!(chunks.iter().all(|c| !c.file_path.ends_with(".md")));
}

#[test]
fn test_chunk_file_roundtrip() {
    let (tmp, chunks) = index_sample_tree();
    let path = tmp.path().join("chunks.json");

    save_chunks(&path, &chunks).unwrap();
    let loaded = load_chunks(&path).unwrap();
    assert_eq!(loaded, chunks);
}

#[tokio::test]
async fn test_search_finds_two_sum_by_text() {
    let (_tmp, chunks) = index_sample_tree();
    let engine = engine_for(chunks);

    let hits = engine.search("two sum", 10).await.unwrap();
    assert!(!hits.is_empty());

    let top = &hits[0];
    assert!(
        top.metadata.file_path.ends_with("two_sum.js"),
        "expected twoSum first, got {}",
        top.metadata.file_path
    );
    assert!(top.sources.contains(&Signal::Synonym));
}

#[tokio::test]
async fn test_search_rejects_empty_query() {
    let (_tmp, chunks) = index_sample_tree();
    let engine = engine_for(chunks);
    assert!(matches!(
        engine.search("  ", 5).await,
        Err(SearchError::EmptyQuery)
    ));
}

#[tokio::test]
async fn test_search_over_nothing_reports_not_indexed() {
    let engine = engine_for(Vec::new());
    assert!(matches!(
        engine.search("anything", 5).await,
        Err(SearchError::NotIndexed)
    ));
}

#[tokio::test]
async fn test_vector_signal_contributes_sources() {
    let (_tmp, chunks) = index_sample_tree();
    let engine = engine_for(chunks);

    let hits = engine.search("dispatch path", 5).await.unwrap();
    let router = hits
        .iter()
        .find(|h| h.metadata.code.contains("dispatch"))
        .expect("router chunk in results");
    assert!(router.sources.contains(&Signal::Vector));
}
