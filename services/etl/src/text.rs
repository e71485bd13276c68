//! Shared text cleaning for the keyword extractor and sentiment classifier.
//!
//! Cleaning rules: lowercase, drop characters that are neither alphanumeric,
//! underscore, nor whitespace, split on whitespace, then keep only fully
//! alphabetic tokens longer than two characters that are not stop words.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Baseline English stop words. Tokens of length <= 2 are filtered before
/// this set is consulted, so short entries are kept only for completeness.
pub static BASE_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your",
        "yours", "yourself", "yourselves", "he", "him", "his", "himself", "she",
        "her", "hers", "herself", "it", "its", "itself", "they", "them", "their",
        "theirs", "themselves", "what", "which", "who", "whom", "this", "that",
        "these", "those", "am", "is", "are", "was", "were", "be", "been", "being",
        "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
        "the", "and", "but", "if", "or", "because", "as", "until", "while", "of",
        "at", "by", "for", "with", "about", "against", "between", "into",
        "through", "during", "before", "after", "above", "below", "to", "from",
        "up", "down", "in", "out", "on", "off", "over", "under", "again",
        "further", "then", "once", "here", "there", "when", "where", "why", "how",
        "all", "any", "both", "each", "few", "more", "most", "other", "some",
        "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too",
        "very", "can", "will", "just", "don", "should", "now",
    ]
    .into_iter()
    .collect()
});

/// Domain noise words excluded from the corpus-level vocabulary on top of
/// [`BASE_STOP_WORDS`]. These name the reviewed entities themselves and carry
/// no signal when every review mentions them.
pub static DOMAIN_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "restaurant", "place", "food", "service", "experience", "was", "were",
        "is", "are",
    ]
    .into_iter()
    .collect()
});

fn qualifying(token: &str) -> bool {
    token.len() > 2 && token.chars().all(|c| c.is_alphabetic())
}

fn raw_tokens(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Tokens for a single review's own keyword extraction: cleaned, qualifying,
/// baseline stop words removed.
pub fn review_tokens(text: &str) -> Vec<String> {
    raw_tokens(text)
        .into_iter()
        .filter(|t| qualifying(t) && !BASE_STOP_WORDS.contains(t.as_str()))
        .collect()
}

/// Tokens contributing to the corpus-level vocabulary: as [`review_tokens`]
/// but additionally filtered by [`DOMAIN_STOP_WORDS`] and any caller-supplied
/// extras.
pub fn vocabulary_tokens(text: &str, extra_stop_words: &HashSet<String>) -> Vec<String> {
    review_tokens(text)
        .into_iter()
        .filter(|t| !DOMAIN_STOP_WORDS.contains(t.as_str()) && !extra_stop_words.contains(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_tokens_dropped() {
        assert_eq!(review_tokens("go to it ok yes"), vec!["yes"]);
    }

    #[test]
    fn punctuation_stripped_within_words() {
        // Apostrophes vanish rather than splitting the word
        assert_eq!(review_tokens("Didn't-like it!"), vec!["didntlike"]);
    }

    #[test]
    fn numeric_residue_dropped() {
        assert_eq!(review_tokens("table4two cost 100 dollars"), vec!["cost", "dollars"]);
    }

    #[test]
    fn stop_words_removed() {
        assert_eq!(
            review_tokens("the food was very delicious and the staff were nice"),
            vec!["food", "delicious", "staff", "nice"]
        );
    }

    #[test]
    fn vocabulary_drops_domain_noise() {
        let extra = HashSet::new();
        assert_eq!(
            vocabulary_tokens("great food great service at this place", &extra),
            vec!["great", "great"]
        );
    }

    #[test]
    fn vocabulary_honors_extra_stop_words() {
        let extra: HashSet<String> = ["pizza".to_string()].into_iter().collect();
        assert_eq!(
            vocabulary_tokens("amazing pizza amazing crust", &extra),
            vec!["amazing", "amazing", "crust"]
        );
    }
}
