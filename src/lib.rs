//! # CodeScout — Local Code Chunking and Hybrid Search
//!
//! Indexes a source tree into definition-level chunks, embeds them into a
//! local SQLite vector database, and answers queries by fusing several
//! search signals into one ranked result list.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading and validation
//! - **[`chunker`]** — Multi-language chunking (tree-sitter + brace matching)
//! - **[`indexer`]** — Directory walking and run-wide chunk id assignment
//! - **[`store`]** — Chunk persistence (JSON) and SQLite + sqlite-vec vectors
//! - **[`embedder`]** — Text embedding behind a trait
//! - **[`search`]** — Concurrent multi-signal search with weighted fusion

pub mod chunker;
pub mod config;
pub mod embedder;
pub mod indexer;
pub mod search;
pub mod store;
