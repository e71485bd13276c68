//! Keyword Extractor: builds the bounded corpus-level vocabulary dimension
//! from all review texts and assigns each keyword a topical bucket.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::model::{KeywordRow, SourceRow};
use crate::text::vocabulary_tokens;

/// Default vocabulary bound (top-K most frequent tokens).
pub const DEFAULT_TOP_KEYWORDS: usize = 200;

static FOOD_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "delicious", "tasty", "fresh", "hot", "cold", "spicy", "sweet", "sour",
        "salty", "bitter", "juicy", "crispy", "tender", "overcooked",
        "undercooked", "bland", "flavorful", "seasoned", "burnt", "raw",
        "frozen", "stale", "greasy", "dry", "moist", "creamy",
    ]
    .into_iter()
    .collect()
});

static SERVICE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "friendly", "rude", "slow", "fast", "quick", "attentive", "helpful",
        "polite", "professional", "unprofessional", "courteous", "patient",
        "impatient", "efficient", "inefficient", "responsive", "unresponsive",
        "knowledgeable", "clueless", "accommodating",
    ]
    .into_iter()
    .collect()
});

static LOCATION_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "clean", "dirty", "comfortable", "uncomfortable", "spacious", "cramped",
        "noisy", "quiet", "bright", "dark", "cozy", "cold", "warm", "modern",
        "outdated", "beautiful", "ugly", "convenient", "inconvenient",
        "accessible", "parking",
    ]
    .into_iter()
    .collect()
});

/// Topical bucket for a keyword. Membership is checked in priority order
/// food -> service -> location; first match wins.
pub fn bucket_for(keyword: &str) -> &'static str {
    if FOOD_WORDS.contains(keyword) {
        "food"
    } else if SERVICE_WORDS.contains(keyword) {
        "service"
    } else if LOCATION_WORDS.contains(keyword) {
        "location"
    } else {
        "general"
    }
}

/// Build the keyword dimension from the full corpus of review texts.
///
/// Tokens are counted across every non-empty review; the top `top_k` by
/// descending frequency survive, ties broken by first-seen order. Keys are
/// assigned sequentially from `start_key + 1`. Returns the dimension rows and
/// the `keyword -> keyword_key` lookup.
pub fn build_keyword_dimension(
    rows: &[SourceRow],
    top_k: usize,
    extra_stop_words: &HashSet<String>,
    start_key: i64,
) -> (Vec<KeywordRow>, HashMap<String, i64>) {
    // token -> (frequency, first-seen position)
    let mut counts: HashMap<String, (u64, usize)> = HashMap::new();
    let mut seen = 0usize;

    for row in rows {
        let Some(text) = row.trimmed_review_text() else {
            continue;
        };
        for token in vocabulary_tokens(text, extra_stop_words) {
            let entry = counts.entry(token).or_insert_with(|| {
                let slot = (0, seen);
                seen += 1;
                slot
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(String, u64, usize)> = counts
        .into_iter()
        .map(|(token, (freq, first))| (token, freq, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(top_k);

    let mut out = Vec::with_capacity(ranked.len());
    let mut lookup = HashMap::with_capacity(ranked.len());
    for (keyword, _, _) in ranked {
        let keyword_key = start_key + out.len() as i64 + 1;
        lookup.insert(keyword.clone(), keyword_key);
        out.push(KeywordRow {
            keyword_key,
            keyword_category: bucket_for(&keyword),
            keyword,
        });
    }
    (out, lookup)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(text: &str) -> SourceRow {
        SourceRow {
            review_text: Some(text.to_string()),
            ..SourceRow::default()
        }
    }

    fn no_extras() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn frequency_ranking_descends() {
        let rows = vec![
            review("delicious delicious delicious pasta pasta wine"),
        ];
        let (dim, lookup) = build_keyword_dimension(&rows, 10, &no_extras(), 0);
        assert_eq!(dim[0].keyword, "delicious");
        assert_eq!(dim[1].keyword, "pasta");
        assert_eq!(dim[2].keyword, "wine");
        assert_eq!(lookup["delicious"], 1);
        assert_eq!(lookup["wine"], 3);
    }

    #[test]
    fn ties_break_by_first_seen_order() {
        let rows = vec![review("alpha beta gamma"), review("gamma beta alpha")];
        let (dim, _) = build_keyword_dimension(&rows, 10, &no_extras(), 0);
        let words: Vec<&str> = dim.iter().map(|r| r.keyword.as_str()).collect();
        assert_eq!(words, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn vocabulary_is_bounded() {
        let rows = vec![review("one two three four alpha beta gamma delta epsilon zeta")];
        let (dim, _) = build_keyword_dimension(&rows, 3, &no_extras(), 0);
        assert_eq!(dim.len(), 3);
    }

    #[test]
    fn domain_noise_never_enters_vocabulary() {
        let rows = vec![review("great food great service at this restaurant")];
        let (dim, lookup) = build_keyword_dimension(&rows, 10, &no_extras(), 0);
        assert_eq!(dim.len(), 1);
        assert_eq!(dim[0].keyword, "great");
        assert!(!lookup.contains_key("food"));
        assert!(!lookup.contains_key("service"));
    }

    #[test]
    fn empty_corpus_yields_empty_dimension() {
        let rows = vec![SourceRow::default(), review("   ")];
        let (dim, lookup) = build_keyword_dimension(&rows, 10, &no_extras(), 0);
        assert!(dim.is_empty());
        assert!(lookup.is_empty());
    }

    #[test]
    fn bucket_priority_food_wins() {
        // "cold" belongs to both the food and location sets
        assert_eq!(bucket_for("cold"), "food");
        assert_eq!(bucket_for("friendly"), "service");
        assert_eq!(bucket_for("parking"), "location");
        assert_eq!(bucket_for("pasta"), "general");
    }

    #[test]
    fn start_key_offsets_sequence() {
        let rows = vec![review("delicious pasta")];
        let (dim, lookup) = build_keyword_dimension(&rows, 10, &no_extras(), 40);
        assert_eq!(dim[0].keyword_key, 41);
        assert_eq!(lookup["pasta"], 42);
    }

    #[test]
    fn determinism_across_runs() {
        let rows = vec![
            review("delicious pasta friendly staff"),
            review("pasta again pasta forever"),
        ];
        let a = build_keyword_dimension(&rows, 10, &no_extras(), 0);
        let b = build_keyword_dimension(&rows, 10, &no_extras(), 0);
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }
}
