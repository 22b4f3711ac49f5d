//! Structural language strategy backed by tree-sitter.
//!
//! Python and JavaScript get a full syntax-tree pass; everything the grammar
//! recognizes as a definition becomes a span snapped to whole lines. A file
//! that does not parse cleanly aborts this tier so the chunking engine can
//! fall back to brace-block matching.

use std::collections::HashSet;

use thiserror::Error;
use tree_sitter::{Node, Parser, Query, QueryCursor, StreamingIterator};

use super::chunk::{ChunkKind, DefSpan, Language};

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("no structural grammar for {0}")]
    Unsupported(&'static str),

    #[error("parser init failed: {0}")]
    ParserInit(String),

    #[error("syntax error in source, structural pass aborted")]
    Syntax,
}

const PYTHON_QUERY: &str = r#"
(function_definition) @function

(class_definition) @class

(decorated_definition) @decorated
"#;

const JAVASCRIPT_QUERY: &str = r#"
(function_declaration) @function

(generator_function_declaration) @function

(method_definition) @function

(lexical_declaration
  (variable_declarator
    value: (arrow_function))) @function

(variable_declaration
  (variable_declarator
    value: (arrow_function))) @function

(lexical_declaration
  (variable_declarator
    value: (function_expression))) @function

(class_declaration) @class
"#;

pub struct StructuralStrategy {
    parser: Parser,
    query: Query,
}

impl StructuralStrategy {
    pub fn try_new(language: Language) -> Result<Self, StrategyError> {
        let (ts_language, query_src) = match language {
            Language::Python => (
                tree_sitter::Language::from(tree_sitter_python::LANGUAGE),
                PYTHON_QUERY,
            ),
            Language::Javascript => (
                tree_sitter::Language::from(tree_sitter_javascript::LANGUAGE),
                JAVASCRIPT_QUERY,
            ),
            other => return Err(StrategyError::Unsupported(other.as_str())),
        };

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| StrategyError::ParserInit(e.to_string()))?;
        let query = Query::new(&ts_language, query_src)
            .map_err(|e| StrategyError::ParserInit(e.to_string()))?;

        Ok(Self { parser, query })
    }

    /// Extract definition spans from `content`, snapped to whole lines so a
    /// decorated Python definition starts on its first decorator line.
    pub fn scan(&mut self, content: &str) -> Result<Vec<DefSpan>, StrategyError> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or(StrategyError::Syntax)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(StrategyError::Syntax);
        }

        let source = content.as_bytes();
        let mut cursor = QueryCursor::new();
        let mut spans = Vec::new();
        let mut seen: HashSet<(usize, usize)> = HashSet::new();

        let mut matches = cursor.matches(&self.query, root, source);
        while let Some(m) = matches.next() {
            for cap in m.captures {
                let capture_name = self.query.capture_names()[cap.index as usize];
                let kind = match capture_name {
                    "function" => ChunkKind::Function,
                    "class" => ChunkKind::Class,
                    "decorated" => decorated_kind(cap.node),
                    _ => continue,
                };

                let start = line_start(content, cap.node.start_byte());
                let end = line_end(content, cap.node.end_byte());
                if end > start && seen.insert((start, end)) {
                    spans.push(DefSpan { start, end, kind });
                }
            }
        }

        spans.sort_by_key(|s| s.start);
        Ok(spans)
    }
}

/// Kind of the definition wrapped by a `decorated_definition` node. The
/// decorators themselves are part of the span, so the wrapper's position is
/// used but the inner node decides function vs class.
fn decorated_kind(node: Node) -> ChunkKind {
    match node.child_by_field_name("definition").map(|n| n.kind()) {
        Some("class_definition") => ChunkKind::Class,
        _ => ChunkKind::Function,
    }
}

/// Byte offset of the first byte of the line containing `offset`.
fn line_start(content: &str, offset: usize) -> usize {
    content[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Byte offset one past the last byte of the line containing `offset - 1`,
/// excluding the newline itself.
fn line_end(content: &str, offset: usize) -> usize {
    content[offset..]
        .find('\n')
        .map_or(content.len(), |i| offset + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_function_and_class() {
        let src = "\
import os

def walk(root):
    return os.listdir(root)

class Visitor:
    def visit(self, node):
        pass
";
        let mut strategy = StructuralStrategy::try_new(Language::Python).unwrap();
        let spans = strategy.scan(src).unwrap();

        assert_eq!(spans[0].kind, ChunkKind::Function);
        assert!(src[spans[0].start..spans[0].end].starts_with("def walk"));

        assert_eq!(spans[1].kind, ChunkKind::Class);
        assert!(src[spans[1].start..spans[1].end].starts_with("class Visitor"));
        // The nested method is also reported, after the class start.
        assert!(spans.iter().any(|s| src[s.start..s.end].trim_start().starts_with("def visit")));
    }

    #[test]
    fn test_python_decorator_included_in_span() {
        let src = "\
import functools

@functools.cache
@log_calls
def fib(n):
    return n
";
        let mut strategy = StructuralStrategy::try_new(Language::Python).unwrap();
        let spans = strategy.scan(src).unwrap();

        let decorated = spans
            .iter()
            .find(|s| src[s.start..s.end].starts_with("@functools.cache"))
            .expect("decorated span should start at the first decorator");
        assert_eq!(decorated.kind, ChunkKind::Function);
        assert!(src[decorated.start..decorated.end].ends_with("return n"));
    }

    #[test]
    fn test_python_syntax_error_aborts() {
        let src = "def broken(:\n    pass\n";
        let mut strategy = StructuralStrategy::try_new(Language::Python).unwrap();
        assert!(matches!(strategy.scan(src), Err(StrategyError::Syntax)));
    }

    #[test]
    fn test_javascript_declarations() {
        let src = "\
const twoSum = (nums, target) => {
    return [0, 1];
};

function helper() {
    return 1;
}

class Solver {
    solve() {}
}
";
        let mut strategy = StructuralStrategy::try_new(Language::Javascript).unwrap();
        let spans = strategy.scan(src).unwrap();

        assert!(src[spans[0].start..spans[0].end].starts_with("const twoSum"));
        assert_eq!(spans[0].kind, ChunkKind::Function);
        assert!(spans.iter().any(|s| s.kind == ChunkKind::Class));
    }

    #[test]
    fn test_unsupported_language() {
        assert!(StructuralStrategy::try_new(Language::Java).is_err());
    }

    #[test]
    fn test_scan_is_idempotent() {
        let src = "def f():\n    return 1\n\ndef g():\n    return 2\n";
        let mut strategy = StructuralStrategy::try_new(Language::Python).unwrap();
        let first = strategy.scan(src).unwrap();
        let second = strategy.scan(src).unwrap();
        assert_eq!(first, second);
    }
}
