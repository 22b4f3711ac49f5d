//! Brace-block language strategy.
//!
//! Locates definitions by regular-expression signatures anchored to the first
//! `{` following the signature, then finds the matching `}` with a scanner
//! that is string-literal aware. Comments are blanked beforehand so signature
//! patterns never fire inside them. This is the fallback tier for languages
//! with a structural parser, and the primary tier for Java, C and C++.

use regex::Regex;
use tracing::trace;

use super::chunk::{ChunkKind, DefSpan, Language};

/// Comment syntax family used when blanking comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `//` line comments and `/* */` block comments.
    CFamily,
    /// `#` line comments.
    Hash,
}

/// Control-flow keywords that can precede a parenthesized expression and an
/// opening brace; matches whose candidate name is one of these are rejected.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "catch", "return", "sizeof", "new",
];

struct SignatureRule {
    kind: ChunkKind,
    pattern: Regex,
}

pub struct BraceBlockStrategy {
    rules: Vec<SignatureRule>,
    comment_style: CommentStyle,
}

impl BraceBlockStrategy {
    pub fn for_language(language: Language) -> Self {
        let (comment_style, raw_rules): (CommentStyle, &[(ChunkKind, &str)]) = match language {
            Language::Python => (
                CommentStyle::Hash,
                // Python has no brace blocks; these only ever match when the
                // signature happens to be followed by a literal `{`, so this
                // tier normally yields nothing and the whole-file fallback
                // takes over.
                &[
                    (
                        ChunkKind::Function,
                        r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+[A-Za-z_]\w*[ \t]*\(",
                    ),
                    (ChunkKind::Class, r"(?m)^[ \t]*class[ \t]+[A-Za-z_]\w*"),
                ],
            ),
            Language::Javascript => (
                CommentStyle::CFamily,
                &[
                    (
                        ChunkKind::Function,
                        r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?(?:async[ \t]+)?function[ \t]*\*?[ \t]*[A-Za-z_$][\w$]*[ \t]*\(",
                    ),
                    (
                        ChunkKind::Function,
                        r"(?m)^[ \t]*(?:export[ \t]+)?(?:const|let|var)[ \t]+[A-Za-z_$][\w$]*[ \t]*=[ \t]*(?:async[ \t]+)?(?:function\b|\([^)]*\)[ \t]*=>|[A-Za-z_$][\w$]*[ \t]*=>)",
                    ),
                    (
                        ChunkKind::Class,
                        r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?class[ \t]+[A-Za-z_$][\w$]*",
                    ),
                ],
            ),
            Language::Java => (
                CommentStyle::CFamily,
                &[
                    (
                        ChunkKind::Class,
                        r"(?m)^[ \t]*(?:(?:public|private|protected|abstract|final|static)[ \t]+)*(?:class|interface|enum)[ \t]+[A-Za-z_]\w*",
                    ),
                    (
                        ChunkKind::Function,
                        r"(?m)^[ \t]*(?:(?:public|private|protected|static|final|abstract|synchronized|native)[ \t]+)*[\w<>\[\],. \t]+?[ \t]+[A-Za-z_]\w*[ \t]*\([^)]*\)[ \t]*(?:throws[ \t]+[\w,. \t]+)?\{",
                    ),
                ],
            ),
            Language::C => (
                CommentStyle::CFamily,
                &[
                    (
                        ChunkKind::Function,
                        r"(?m)^[ \t]*[A-Za-z_][\w \t\*]*?[ \t\*]([A-Za-z_]\w*)[ \t]*\([^)]*\)[ \t]*\{",
                    ),
                    (ChunkKind::Class, r"(?m)^[ \t]*(?:typedef[ \t]+)?struct[ \t]+[A-Za-z_]\w*[ \t]*\{"),
                    (ChunkKind::Class, r"(?m)^[ \t]*(?:typedef[ \t]+)?union[ \t]+[A-Za-z_]\w*[ \t]*\{"),
                ],
            ),
            Language::Cpp | Language::Unknown => (
                CommentStyle::CFamily,
                &[
                    (
                        ChunkKind::Namespace,
                        r"(?m)^[ \t]*namespace[ \t]+[A-Za-z_][\w:]*[ \t]*\{",
                    ),
                    (
                        ChunkKind::Class,
                        r"(?m)^[ \t]*(?:template[ \t]*<[^>]*>[ \t\r\n]*)?(?:class|struct)[ \t]+[A-Za-z_]\w*(?:[ \t]*final)?(?:[ \t]*:[^{;]*)?\{",
                    ),
                    (
                        ChunkKind::Function,
                        r"(?m)^[ \t]*(?:(?:virtual|static|inline|constexpr|explicit)[ \t]+)*[A-Za-z_][\w:<>,&\* \t]*?[ \t\*&]([A-Za-z_][\w:]*)[ \t]*\([^)]*\)[ \t]*(?:const[ \t]*)?(?:noexcept[ \t]*)?(?:override[ \t]*)?\{",
                    ),
                ],
            ),
        };

        let rules = raw_rules
            .iter()
            .map(|(kind, pattern)| SignatureRule {
                kind: *kind,
                pattern: Regex::new(pattern).unwrap(),
            })
            .collect();

        Self {
            rules,
            comment_style,
        }
    }

    /// Locate definition spans in `content`. The returned spans are sorted by
    /// start offset (stable in rule order for identical starts) and refer to
    /// the original content, since blanking preserves every byte offset.
    pub fn scan(&self, content: &str) -> Vec<DefSpan> {
        let blanked = blank_comments(content, self.comment_style);
        let mut spans: Vec<DefSpan> = Vec::new();

        for rule in &self.rules {
            for m in rule.pattern.find_iter(&blanked) {
                if is_control_statement(m.as_str()) {
                    continue;
                }
                let Some(open) = blanked[m.start()..].find('{').map(|i| m.start() + i) else {
                    continue;
                };
                let Some(close) = find_matching_brace(&blanked, open) else {
                    trace!(offset = open, "unterminated brace block, signature skipped");
                    continue;
                };
                if spans.iter().any(|s| s.start == m.start()) {
                    continue;
                }
                spans.push(DefSpan {
                    start: m.start(),
                    end: close + 1,
                    kind: rule.kind,
                });
            }
        }

        spans.sort_by_key(|s| s.start);
        spans
    }
}

fn is_control_statement(signature: &str) -> bool {
    signature
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .any(|word| CONTROL_KEYWORDS.contains(&word))
}

/// Overwrite comment bytes with spaces, preserving newlines and the exact
/// byte length of the input so offsets found in the blanked text are valid in
/// the original. Comment markers inside string literals are left untouched.
pub fn blank_comments(content: &str, style: CommentStyle) -> String {
    #[derive(PartialEq)]
    enum State {
        Normal,
        LineComment,
        BlockComment,
        SingleQuote,
        DoubleQuote,
    }

    let bytes = content.as_bytes();
    let mut out = bytes.to_vec();
    let mut state = State::Normal;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuote,
                b'"' => state = State::DoubleQuote,
                b'#' if style == CommentStyle::Hash => {
                    state = State::LineComment;
                    out[i] = b' ';
                }
                b'/' if style == CommentStyle::CFamily && bytes.get(i + 1) == Some(&b'/') => {
                    state = State::LineComment;
                    out[i] = b' ';
                }
                b'/' if style == CommentStyle::CFamily && bytes.get(i + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                }
                _ => {}
            },
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                } else {
                    out[i] = b' ';
                }
            }
            State::BlockComment => {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                    state = State::Normal;
                } else if b != b'\n' {
                    out[i] = b' ';
                }
            }
            State::SingleQuote | State::DoubleQuote => {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'\n' {
                    // Unterminated literal; do not let it swallow the rest of
                    // the file.
                    state = State::Normal;
                } else if (b == b'\'' && state == State::SingleQuote)
                    || (b == b'"' && state == State::DoubleQuote)
                {
                    state = State::Normal;
                }
            }
        }
        i += 1;
    }

    // Only ASCII bytes are ever replaced, so the result is still valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|_| content.to_string())
}

/// Find the byte offset of the `}` matching the `{` at `open`.
///
/// Implemented as a small state machine (normal, in-single-quote,
/// in-double-quote, escaped) so braces inside string or character literals
/// never perturb nesting depth.
pub fn find_matching_brace(text: &str, open: usize) -> Option<usize> {
    #[derive(PartialEq, Clone, Copy)]
    enum State {
        Normal,
        SingleQuote,
        DoubleQuote,
    }

    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut state = State::Normal;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match state {
            State::Normal => match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                b'\'' => state = State::SingleQuote,
                b'"' => state = State::DoubleQuote,
                _ => {}
            },
            State::SingleQuote | State::DoubleQuote => {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'\n' {
                    state = State::Normal;
                } else if (b == b'\'' && state == State::SingleQuote)
                    || (b == b'"' && state == State::DoubleQuote)
                {
                    state = State::Normal;
                }
            }
        }
    }

    None
}
