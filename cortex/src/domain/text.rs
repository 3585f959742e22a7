// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lightweight text features shared by discovery summaries, dimension
//! extraction and constraint induction.

use std::collections::{BTreeMap, BTreeSet};

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "but", "by", "can", "could", "did", "do",
    "does", "doing", "for", "from", "had", "has", "have", "having", "he", "her", "here", "him",
    "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most", "my",
    "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over",
    "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your", "yours", "im", "dont", "ive", "thats",
];

/// Lowercased alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|t| t.replace('\'', "").to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Tokens that carry meaning: no stop-words, no one- or two-letter tokens
pub fn content_words(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() > 2 && !is_stopword(t))
        .collect()
}

/// Distinct content words of a text
pub fn word_set(text: &str) -> BTreeSet<String> {
    content_words(text).into_iter().collect()
}

/// Whether `word` appears as a whole token in `text` (case-insensitive)
pub fn contains_word(text: &str, word: &str) -> bool {
    let needle = word.to_lowercase();
    tokenize(text).iter().any(|t| *t == needle)
}

/// Most frequent content words of a text; ties broken alphabetically
pub fn top_keywords(text: &str, count: usize) -> Vec<String> {
    let mut frequencies: BTreeMap<String, usize> = BTreeMap::new();
    for word in content_words(text) {
        *frequencies.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = frequencies.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(count).map(|(word, _)| word).collect()
}

/// URL-safe slug built from the first `max_words` content words
pub fn slugify(text: &str, max_words: usize) -> String {
    let words: Vec<String> = content_words(text).into_iter().take(max_words).collect();
    if words.is_empty() {
        "pattern".to_string()
    } else {
        words.join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_words_drop_stopwords() {
        let words = content_words("The ship is sailing to the harbor, and I'm on it");
        assert_eq!(words, vec!["ship", "sailing", "harbor"]);
    }

    #[test]
    fn test_top_keywords_ranking() {
        let keywords = top_keywords("rust rust borrow checker borrow rust lifetimes", 2);
        assert_eq!(keywords, vec!["rust", "borrow"]);
    }

    #[test]
    fn test_contains_word_is_whole_token() {
        assert!(contains_word("Written by the User", "user"));
        assert!(!contains_word("users only", "user"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Conversations expressing philosophical uncertainty", 3), "conversations-expressing-philosophical");
        assert_eq!(slugify("a the of", 3), "pattern");
    }
}
