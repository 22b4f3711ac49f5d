//! Synonym lookup for query expansion.

use std::collections::{HashMap, HashSet};

pub trait Thesaurus: Send + Sync {
    /// Words related to `word`, not including the word itself. Unknown words
    /// return an empty set.
    fn related_words(&self, word: &str) -> HashSet<String>;
}

/// Groups of words treated as mutually related. Biased toward the vocabulary
/// of code search queries.
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["two", "2", "pair", "couple", "dual"],
    &["sum", "add", "total", "plus", "accumulate"],
    &["get", "fetch", "retrieve", "read"],
    &["delete", "remove", "drop", "erase"],
    &["create", "make", "build", "construct"],
    &["search", "find", "query", "lookup"],
    &["list", "array", "vector", "sequence"],
    &["error", "fault", "failure", "exception"],
    &["start", "begin", "launch", "init"],
    &["stop", "halt", "end", "terminate"],
    &["string", "text", "str"],
    &["max", "maximum", "largest", "biggest"],
    &["min", "minimum", "smallest", "least"],
    &["sort", "order", "rank"],
    &["merge", "combine", "join", "concat"],
    &["parse", "decode", "deserialize"],
    &["file", "document", "path"],
];

/// In-process thesaurus built from a fixed synonym table.
pub struct StaticThesaurus {
    groups: HashMap<String, HashSet<String>>,
}

impl StaticThesaurus {
    pub fn new() -> Self {
        let mut groups: HashMap<String, HashSet<String>> = HashMap::new();
        for group in SYNONYM_GROUPS {
            for word in *group {
                let related = group
                    .iter()
                    .filter(|w| *w != word)
                    .map(|w| w.to_string())
                    .collect();
                groups.insert(word.to_string(), related);
            }
        }
        Self { groups }
    }
}

impl Default for StaticThesaurus {
    fn default() -> Self {
        Self::new()
    }
}

impl Thesaurus for StaticThesaurus {
    fn related_words(&self, word: &str) -> HashSet<String> {
        self.groups
            .get(&word.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_word_expands_to_group() {
        let thesaurus = StaticThesaurus::new();
        let related = thesaurus.related_words("two");
        assert!(related.contains("2"));
        assert!(related.contains("pair"));
        assert!(!related.contains("two"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let thesaurus = StaticThesaurus::new();
        assert_eq!(
            thesaurus.related_words("SUM"),
            thesaurus.related_words("sum")
        );
    }

    #[test]
    fn test_unknown_word_is_empty() {
        let thesaurus = StaticThesaurus::new();
        assert!(thesaurus.related_words("xylophone").is_empty());
    }
}
