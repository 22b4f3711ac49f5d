use serde::{Deserialize, Serialize};
use std::path::Path;

/// Content language of an indexed file, detected from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Java,
    C,
    Cpp,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Self::Python,
            "js" | "jsx" => Self::Javascript,
            "java" => Self::Java,
            "c" => Self::C,
            "cpp" | "cc" | "h" | "hpp" => Self::Cpp,
            _ => Self::Unknown,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    /// Extensions the indexer considers candidates for chunking.
    pub const fn supported_extensions() -> &'static [&'static str] {
        &["py", "js", "jsx", "java", "c", "cpp", "cc", "h", "hpp"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "python" => Self::Python,
            "javascript" => Self::Javascript,
            "java" => Self::Java,
            "c" => Self::C,
            "cpp" => Self::Cpp,
            _ => Self::Unknown,
        }
    }
}

/// What a chunk represents. `Global` covers unrecognized top-level material
/// (imports, statements, comments) between or around recognized definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    Namespace,
    Global,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Namespace => "namespace",
            Self::Global => "global",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => Self::Function,
            "class" => Self::Class,
            "namespace" => Self::Namespace,
            _ => Self::Global,
        }
    }
}

/// A contiguous, line-aligned span of one source file: either a recognized
/// definition or inter-definition filler text.
///
/// `start_line`/`end_line` are 1-based and inclusive, counted in the original
/// file. `byte_range` is half-open byte offsets into the original content.
/// Per file, chunks are non-overlapping and ordered by `start_line`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub file_path: String,
    pub code: String,
    pub start_line: usize,
    pub end_line: usize,
    pub byte_range: (usize, usize),
    pub language: Language,
    pub kind: ChunkKind,
}

/// A definition span located by a language strategy, in byte offsets of the
/// original content. Strategies emit these sorted by `start` ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefSpan {
    pub start: usize,
    pub end: usize,
    pub kind: ChunkKind,
}
