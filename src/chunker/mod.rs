//! Multi-language chunking engine.
//!
//! Splits one file's content into an ordered, non-overlapping sequence of
//! [`Chunk`]s that together account for every non-blank line. Definitions are
//! located by a per-language strategy chain: tree-sitter structural parsing
//! where a grammar exists, brace-block regex matching otherwise or on parse
//! failure, and a whole-file `global` chunk as the last resort. Text between
//! definitions becomes `global` chunks.

pub mod brace;
pub mod chunk;
pub mod structural;

use std::collections::HashMap;

use tracing::{debug, warn};

use self::brace::BraceBlockStrategy;
use self::chunk::{Chunk, ChunkKind, DefSpan, Language};
use self::structural::StructuralStrategy;

pub struct ChunkingEngine {
    structural: HashMap<Language, StructuralStrategy>,
    brace: HashMap<Language, BraceBlockStrategy>,
}

impl ChunkingEngine {
    pub fn new() -> Self {
        let mut structural = HashMap::new();
        for language in [Language::Python, Language::Javascript] {
            match StructuralStrategy::try_new(language) {
                Ok(strategy) => {
                    structural.insert(language, strategy);
                }
                Err(e) => {
                    warn!(
                        language = language.as_str(),
                        "structural parser unavailable, brace-block matching only: {e}"
                    );
                }
            }
        }

        let brace = [
            Language::Python,
            Language::Javascript,
            Language::Java,
            Language::C,
            Language::Cpp,
        ]
        .into_iter()
        .map(|l| (l, BraceBlockStrategy::for_language(l)))
        .collect();

        Self { structural, brace }
    }

    /// Chunk one file. Unsupported extensions and blank files yield an empty
    /// sequence; they are never an error.
    pub fn chunk(&mut self, file_path: &str, content: &str) -> Vec<Chunk> {
        let language = Language::from_path(file_path);
        if language == Language::Unknown {
            debug!(file = file_path, "unsupported extension, skipping");
            return Vec::new();
        }
        if content.trim().is_empty() {
            return Vec::new();
        }

        let spans = self.definition_spans(language, file_path, content);
        if spans.is_empty() {
            debug!(
                file = file_path,
                "no definitions located, keeping whole file as one chunk"
            );
        }
        assemble(file_path, content, language, spans)
    }

    /// Run the strategy chain for `language`. A structural failure falls
    /// through to brace-block matching; a structural success with zero spans
    /// is final (a file of plain statements has no definitions to find).
    fn definition_spans(
        &mut self,
        language: Language,
        file_path: &str,
        content: &str,
    ) -> Vec<DefSpan> {
        if let Some(strategy) = self.structural.get_mut(&language) {
            match strategy.scan(content) {
                Ok(spans) => return spans,
                Err(e) => {
                    debug!(
                        file = file_path,
                        language = language.as_str(),
                        "structural pass failed ({e}), falling back to brace matching"
                    );
                }
            }
        }

        match self.brace.get(&language) {
            Some(strategy) => strategy.scan(content),
            None => Vec::new(),
        }
    }
}

impl Default for ChunkingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Sweep definition spans left to right, filling every non-blank gap with a
/// `global` chunk. Spans that begin before the previous emitted span's end
/// are skipped, which keeps nested definitions inside their parent chunk and
/// guarantees non-overlap.
fn assemble(
    file_path: &str,
    content: &str,
    language: Language,
    spans: Vec<DefSpan>,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut counter = 0usize;
    let mut cursor = 0usize;

    for span in spans {
        if span.start < cursor {
            continue;
        }
        if let Some((start, end)) = trim_gap(content, cursor, span.start) {
            counter += 1;
            chunks.push(make_chunk(
                file_path,
                content,
                language,
                ChunkKind::Global,
                start,
                end,
                counter,
            ));
        }
        counter += 1;
        chunks.push(make_chunk(
            file_path, content, language, span.kind, span.start, span.end, counter,
        ));
        cursor = span.end;
    }

    if let Some((start, end)) = trim_gap(content, cursor, content.len()) {
        counter += 1;
        chunks.push(make_chunk(
            file_path,
            content,
            language,
            ChunkKind::Global,
            start,
            end,
            counter,
        ));
    }

    chunks
}

/// Shrink a gap to its non-whitespace core; blank gaps are omitted entirely.
fn trim_gap(content: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &content[start..end];
    if slice.trim().is_empty() {
        return None;
    }
    let leading = slice.len() - slice.trim_start().len();
    let trimmed_len = slice.trim_end().len();
    Some((start + leading, start + trimmed_len))
}

fn make_chunk(
    file_path: &str,
    content: &str,
    language: Language,
    kind: ChunkKind,
    start: usize,
    end: usize,
    counter: usize,
) -> Chunk {
    Chunk {
        // Provisional per-file id; the folder indexer reassigns run-global
        // ids before anything is persisted.
        chunk_id: format!("{}_{}_{}", language.as_str(), kind.as_str(), counter),
        file_path: file_path.to_string(),
        code: content[start..end].to_string(),
        start_line: line_of(content, start),
        end_line: line_of_last(content, start, end),
        byte_range: (start, end),
        language,
        kind,
    }
}

/// 1-based line number of the byte at `offset`.
fn line_of(content: &str, offset: usize) -> usize {
    content.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// 1-based line number of the last byte in the half-open range `start..end`.
fn line_of_last(content: &str, start: usize, end: usize) -> usize {
    if end <= start {
        return line_of(content, start);
    }
    line_of(content, end - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(chunks: &[Chunk]) -> Vec<ChunkKind> {
        chunks.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn test_python_import_then_function() {
        let src = "import os\n\ndef f():\n    a = 1\n    return a\n";
        let mut engine = ChunkingEngine::new();
        let chunks = engine.chunk("demo.py", src);

        assert_eq!(kinds(&chunks), vec![ChunkKind::Global, ChunkKind::Function]);

        // Global chunk covers line 1 only; the blank line 2 belongs to no one.
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 1);
        assert_eq!(chunks[0].code, "import os");

        assert_eq!(chunks[1].start_line, 3);
        assert_eq!(chunks[1].end_line, 5);
        assert!(chunks[1].code.starts_with("def f():"));
    }

    #[test]
    fn test_chunks_tile_lines_without_overlap() {
        let src = "\
import sys

def first():
    return 1

CONSTANT = 42

def second():
    return 2

print(CONSTANT)
";
        let mut engine = ChunkingEngine::new();
        let chunks = engine.chunk("tiling.py", src);

        let mut covered = vec![false; src.lines().count() + 1];
        for chunk in &chunks {
            assert!(chunk.start_line <= chunk.end_line);
            assert!(chunk.byte_range.0 <= chunk.byte_range.1);
            for line in chunk.start_line..=chunk.end_line {
                assert!(!covered[line], "line {line} covered twice");
                covered[line] = true;
            }
        }

        for (i, line) in src.lines().enumerate() {
            if !line.trim().is_empty() {
                assert!(covered[i + 1], "non-blank line {} never covered", i + 1);
            }
        }
    }

    #[test]
    fn test_chunk_code_matches_byte_range() {
        let src = "const a = () => {\n    return 1;\n};\n\nconst b = 2;\n";
        let mut engine = ChunkingEngine::new();
        let chunks = engine.chunk("spans.js", src);

        for chunk in &chunks {
            assert_eq!(chunk.code, &src[chunk.byte_range.0..chunk.byte_range.1]);
        }
    }

    #[test]
    fn test_unknown_extension_yields_nothing() {
        let mut engine = ChunkingEngine::new();
        assert!(engine.chunk("notes.txt", "plain text").is_empty());
    }

    #[test]
    fn test_blank_content_yields_nothing() {
        let mut engine = ChunkingEngine::new();
        assert!(engine.chunk("empty.py", "   \n\n  ").is_empty());
    }

    #[test]
    fn test_statements_only_file_is_one_global_chunk() {
        let src = "x = 1\ny = 2\nprint(x + y)\n";
        let mut engine = ChunkingEngine::new();
        let chunks = engine.chunk("script.py", src);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Global);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn test_python_syntax_error_falls_back_to_whole_file() {
        // Broken syntax aborts the structural tier; the brace tier finds no
        // blocks in Python, so the whole file survives as one global chunk.
        let src = "def broken(:\n    pass\n";
        let mut engine = ChunkingEngine::new();
        let chunks = engine.chunk("broken.py", src);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Global);
    }

    #[test]
    fn test_c_brace_in_string_literal() {
        let src = "\
#include <stdio.h>

void shout(void) {
    printf(\"}{\");
}

int after = 1;
";
        let mut engine = ChunkingEngine::new();
        let chunks = engine.chunk("shout.c", src);

        let func = chunks
            .iter()
            .find(|c| c.kind == ChunkKind::Function)
            .expect("function chunk");
        assert!(func.code.contains("printf"));
        assert!(func.code.ends_with('}'));

        let trailing = chunks.last().unwrap();
        assert_eq!(trailing.kind, ChunkKind::Global);
        assert_eq!(trailing.code, "int after = 1;");
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let src = "\
import json

@decorator
def handler(event):
    return json.dumps(event)

class Router:
    def route(self, path):
        return handler(path)
";
        let mut engine = ChunkingEngine::new();
        let first = engine.chunk("app.py", src);
        let second = engine.chunk("app.py", src);
        assert_eq!(first, second);
    }

    #[test]
    fn test_namespace_kind_survives() {
        let src = "\
namespace util {
int add(int a, int b) {
    return a + b;
}
}
";
        let mut engine = ChunkingEngine::new();
        let chunks = engine.chunk("util.cpp", src);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Namespace);
        assert_eq!(chunks[0].end_line, 5);
    }
}
