//! Text normalization shared by the planner and the deduplicator

use std::collections::BTreeSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "about", "as", "at", "be", "by", "can", "do", "does", "for",
    "from", "how", "i", "in", "is", "it", "of", "on", "or", "should", "that", "the", "this",
    "to", "use", "what", "when", "where", "which", "who", "why", "with", "you",
];

/// Lowercase, keep alphanumerics, collapse whitespace
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Common title abbreviations and the word they stand for
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("intro", "introduction"),
    ("docs", "documentation"),
    ("doc", "documentation"),
    ("config", "configuration"),
    ("cfg", "configuration"),
    ("impl", "implementation"),
    ("perf", "performance"),
    ("auth", "authentication"),
    ("env", "environment"),
    ("dev", "development"),
    ("repo", "repository"),
    ("lib", "library"),
    ("db", "database"),
    ("app", "application"),
    ("k8s", "kubernetes"),
    ("vs", "versus"),
];

/// Title tokens: lowercased, whitespace-split, punctuation trimmed,
/// abbreviations expanded, plural "s" stripped
pub fn title_tokens(title: &str) -> BTreeSet<String> {
    title
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(|w| singularize(expand_abbreviation(w)))
        .collect()
}

fn expand_abbreviation(word: &str) -> &str {
    ABBREVIATIONS
        .iter()
        .find(|(short, _)| *short == word)
        .map(|(_, long)| *long)
        .unwrap_or(word)
}

fn singularize(word: &str) -> String {
    if word.chars().count() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Content words of a query, in order, without duplicates
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    normalize_text(text)
        .split_whitespace()
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .map(|w| w.to_string())
        .collect()
}

/// First `max` characters, cut on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Jaccard similarity of two token sets. Two empty sets are not similar
pub fn token_jaccard(left: &BTreeSet<String>, right: &BTreeSet<String>) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(right).count();
    let union = left.len() + right.len() - shared;
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text("  What IS   Rust's ownership?? "),
            "what is rust s ownership"
        );
    }

    #[test]
    fn test_abbreviated_titles_are_similar() {
        let a = title_tokens("Intro to Kubernetes Pods");
        let b = title_tokens("Introduction to Kubernetes Pod");
        assert!(token_jaccard(&a, &b) > 0.8);
        assert_eq!(token_jaccard(&a, &b), token_jaccard(&b, &a));
    }

    #[test]
    fn test_prefix_words_are_distinct() {
        let a = title_tokens("React Hooks Guide");
        let b = title_tokens("React Hooks Guidelines");
        assert_eq!(token_jaccard(&a, &b), 0.5);
        assert_eq!(title_tokens("K8s docs"), title_tokens("Kubernetes Documentation"));
    }

    #[test]
    fn test_unrelated_titles_are_not_similar() {
        let a = title_tokens("Rust async runtimes compared");
        let b = title_tokens("Gardening for beginners");
        assert_eq!(token_jaccard(&a, &b), 0.0);
        assert_eq!(token_jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_keywords_drop_stop_words() {
        assert_eq!(
            keywords("How do I use the Tokio runtime with Tokio?"),
            vec!["tokio".to_string(), "runtime".to_string()]
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
