//! Hybrid search engine.
//!
//! Four independent signals score chunks for a query: vector similarity,
//! literal keyword matching, synonym-expanded matching, and vector
//! similarity of a rewritten query. The signals run concurrently, each under
//! its own timeout, and a failed or slow signal degrades the result set
//! instead of failing the search. Per-chunk scores are fused as a weighted
//! sum and returned ranked.

pub mod thesaurus;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::chunker::chunk::Chunk;
use crate::embedder::Embedder;
use crate::search::thesaurus::Thesaurus;
use crate::store::vector::{ChunkMetadata, VectorStore};

/// Guards the vector score against a zero distance on an exact match.
const DISTANCE_EPSILON: f64 = 1e-6;

const KEYWORD_SCORE_PER_MATCH: f64 = 0.1;
const SYNONYM_MATCH_SCORE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Vector,
    Keyword,
    Synonym,
    Rewritten,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Vector => "vector",
            Signal::Keyword => "keyword",
            Signal::Synonym => "synonym",
            Signal::Rewritten => "rewritten",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalWeights {
    pub vector: f64,
    pub keyword: f64,
    pub synonym: f64,
    pub rewritten: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            vector: 1.0,
            keyword: 0.7,
            synonym: 0.3,
            rewritten: 0.9,
        }
    }
}

impl SignalWeights {
    fn for_signal(&self, signal: Signal) -> f64 {
        match signal {
            Signal::Vector => self.vector,
            Signal::Keyword => self.keyword,
            Signal::Synonym => self.synonym,
            Signal::Rewritten => self.rewritten,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f64,
    pub sources: BTreeSet<Signal>,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("nothing has been indexed yet")]
    NotIndexed,
}

/// Raw per-signal output: chunk id, unweighted score, metadata.
type SignalHits = Vec<(String, f64, ChunkMetadata)>;

pub struct SearchEngine {
    chunks: Arc<Vec<Chunk>>,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    thesaurus: Arc<dyn Thesaurus>,
    weights: SignalWeights,
    signal_timeout: Duration,
}

impl SearchEngine {
    pub fn new(
        chunks: Vec<Chunk>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        thesaurus: Arc<dyn Thesaurus>,
    ) -> Self {
        Self {
            chunks: Arc::new(chunks),
            store,
            embedder,
            thesaurus,
            weights: SignalWeights::default(),
            signal_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_weights(mut self, weights: SignalWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_signal_timeout(mut self, signal_timeout: Duration) -> Self {
        self.signal_timeout = signal_timeout;
        self
    }

    /// Run all signals for `query` and return at most `top_k` fused hits,
    /// best first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if self.chunks.is_empty() {
            return Err(SearchError::NotIndexed);
        }

        let (vector, keyword, synonym, rewritten) = tokio::join!(
            self.run_signal(Signal::Vector, self.vector_signal(query.to_string(), top_k)),
            self.run_signal(Signal::Keyword, self.keyword_signal(query)),
            self.run_signal(Signal::Synonym, self.synonym_signal(query)),
            self.run_signal(Signal::Rewritten, self.rewritten_signal(query, top_k)),
        );

        let mut hits = fuse(
            [
                (Signal::Vector, vector),
                (Signal::Keyword, keyword),
                (Signal::Synonym, synonym),
                (Signal::Rewritten, rewritten),
            ],
            &self.weights,
        );
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn run_signal(
        &self,
        signal: Signal,
        fut: impl Future<Output = Result<SignalHits, anyhow::Error>>,
    ) -> SignalHits {
        match timeout(self.signal_timeout, fut).await {
            Ok(Ok(hits)) => {
                debug!(signal = signal.as_str(), hits = hits.len(), "signal done");
                hits
            }
            Ok(Err(e)) => {
                warn!(signal = signal.as_str(), "signal failed: {e:#}");
                Vec::new()
            }
            Err(_) => {
                warn!(signal = signal.as_str(), "signal timed out");
                Vec::new()
            }
        }
    }

    /// Embed the query and rank the `top_k` nearest chunks by cosine
    /// distance; smaller distance means a larger score.
    async fn vector_signal(&self, query: String, top_k: usize) -> Result<SignalHits, anyhow::Error> {
        let embedder = Arc::clone(&self.embedder);
        let embedding =
            task::spawn_blocking(move || embedder.embed(&query)).await??;

        let store = Arc::clone(&self.store);
        let neighbours =
            task::spawn_blocking(move || store.query(&embedding, top_k)).await??;

        Ok(neighbours
            .into_iter()
            .map(|(metadata, distance)| {
                let score = 1.0 / (distance + DISTANCE_EPSILON);
                (metadata.chunk_id.clone(), score, metadata)
            })
            .collect())
    }

    /// Case-insensitive literal occurrence count over chunk code and path.
    async fn keyword_signal(&self, query: &str) -> Result<SignalHits, anyhow::Error> {
        let pattern = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()?;

        let mut hits = Vec::new();
        for chunk in self.chunks.iter() {
            let matches =
                pattern.find_iter(&chunk.code).count() + pattern.find_iter(&chunk.file_path).count();
            if matches > 0 {
                let score = (KEYWORD_SCORE_PER_MATCH * matches as f64).min(1.0);
                hits.push((chunk.chunk_id.clone(), score, ChunkMetadata::from(chunk)));
            }
        }
        Ok(hits)
    }

    /// Flat score for any chunk matching a query term or one of its
    /// synonyms.
    async fn synonym_signal(&self, query: &str) -> Result<SignalHits, anyhow::Error> {
        let mut terms: BTreeSet<String> = BTreeSet::new();
        for word in query.split_whitespace() {
            let word = word.to_lowercase();
            terms.extend(self.thesaurus.related_words(&word));
            terms.insert(word);
        }
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()?;

        let mut hits = Vec::new();
        for chunk in self.chunks.iter() {
            if pattern.is_match(&chunk.code) || pattern.is_match(&chunk.file_path) {
                hits.push((
                    chunk.chunk_id.clone(),
                    SYNONYM_MATCH_SCORE,
                    ChunkMetadata::from(chunk),
                ));
            }
        }
        Ok(hits)
    }

    /// Vector search with the embedder's rewritten phrasing of the query.
    /// Falls back to the original query when no rewrite is available. The
    /// rewrite itself may call out to a model, so it runs off the runtime.
    async fn rewritten_signal(&self, query: &str, top_k: usize) -> Result<SignalHits, anyhow::Error> {
        let embedder = Arc::clone(&self.embedder);
        let query = query.to_string();
        let rewritten =
            task::spawn_blocking(move || embedder.rewrite(&query).unwrap_or(query)).await?;
        self.vector_signal(rewritten, top_k).await
    }
}

/// Weighted-sum fusion. Signals are folded in a fixed order and the sort is
/// stable, so equal scores keep that order and results are deterministic.
fn fuse(signals: [(Signal, SignalHits); 4], weights: &SignalWeights) -> Vec<SearchHit> {
    let mut fused: Vec<SearchHit> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (signal, hits) in signals {
        let weight = weights.for_signal(signal);
        for (chunk_id, score, metadata) in hits {
            match index.get(&chunk_id) {
                Some(&i) => {
                    fused[i].score += weight * score;
                    fused[i].sources.insert(signal);
                }
                None => {
                    index.insert(chunk_id.clone(), fused.len());
                    fused.push(SearchHit {
                        chunk_id,
                        score: weight * score,
                        sources: BTreeSet::from([signal]),
                        metadata,
                    });
                }
            }
        }
    }

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused
}
