//! Tokenization and stop-word filtering.
//!
//! The same analyzer is used at index time and query time; any divergence
//! between the two would silently break retrieval, so there is exactly one
//! code path.

use std::collections::HashSet;
use std::sync::Arc;

const MIN_TERM_LEN: usize = 2;
const MAX_TERM_LEN: usize = 32;

/// Lowercases runs of alphanumeric characters and drops stop-words and
/// out-of-range-length tokens.
#[derive(Clone)]
pub struct Analyzer {
    stopwords: Arc<HashSet<String>>,
}

impl Analyzer {
    pub fn new(stopwords: Arc<HashSet<String>>) -> Self {
        Self { stopwords }
    }

    pub fn empty() -> Self {
        Self {
            stopwords: Arc::new(HashSet::new()),
        }
    }

    /// Splits `text` into maximal runs of alphanumeric characters, lowercases
    /// each run, and drops stop-words and tokens outside `[2, 32]` characters.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let mut terms = Vec::new();
        let mut current = String::new();

        let mut flush = |current: &mut String, terms: &mut Vec<String>| {
            if !current.is_empty() {
                let len = current.chars().count();
                if len >= MIN_TERM_LEN
                    && len <= MAX_TERM_LEN
                    && !self.stopwords.contains(current.as_str())
                {
                    terms.push(std::mem::take(current));
                } else {
                    current.clear();
                }
            }
        };

        for ch in text.chars() {
            if ch.is_alphanumeric() {
                current.extend(ch.to_lowercase());
            } else {
                flush(&mut current, &mut terms);
            }
        }
        flush(&mut current, &mut terms);

        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer_with(words: &[&str]) -> Analyzer {
        Analyzer::new(Arc::new(words.iter().map(|s| s.to_string()).collect()))
    }

    #[test]
    fn lowercases_and_splits() {
        let a = Analyzer::empty();
        assert_eq!(a.analyze("Liberty AND Justice"), vec!["liberty", "and", "justice"]);
    }

    #[test]
    fn drops_stopwords() {
        let a = analyzer_with(&["and", "for", "is"]);
        assert_eq!(
            a.analyze("liberty and justice for all"),
            vec!["liberty", "justice", "all"]
        );
    }

    #[test]
    fn drops_short_and_long_tokens() {
        let a = Analyzer::empty();
        let long_token = "a".repeat(40);
        let text = format!("x ok {}", long_token);
        assert_eq!(a.analyze(&text), vec!["ok"]);
    }

    #[test]
    fn all_stopwords_yields_empty() {
        let a = analyzer_with(&["the", "quick", "brown", "fox"]);
        assert!(a.analyze("the quick brown fox").is_empty());
    }

    #[test]
    fn index_and_query_agree() {
        let a = analyzer_with(&["the"]);
        assert_eq!(
            a.analyze("the quick brown fox"),
            a.analyze("quick brown fox")
        );
    }
}
