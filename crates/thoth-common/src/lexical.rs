//! Lexical tokenization shared by C6 RAGIndex's chunk indexing and its
//! BM25-style query-side scoring — both sides must normalize text the same
//! way or lexical recall silently degrades.

/// Lowercase, punctuation-stripped whitespace tokens. Not a stemmer; good
/// enough for term-overlap scoring, not for linguistic analysis.
pub fn lexical_tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()).filter(|w| !w.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_lowercases() {
        assert_eq!(lexical_tokens("Hello, World!"), vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn drops_empty_tokens() {
        assert_eq!(lexical_tokens("-- --"), Vec::<String>::new());
    }
}
