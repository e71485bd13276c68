//! Sentiment Classifier: lexicon-based polarity scoring over review texts.
//!
//! Each eligible review (non-empty text, parseable rating) gets a compound
//! score in [-1, 1], a discrete label, its own top-5 keywords, and length
//! statistics. Keys are assigned in source-row order.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::model::{SentimentRow, SourceRow};
use crate::text::review_tokens;

/// Compound score at or above this labels a review positive.
pub const POSITIVE_THRESHOLD: f64 = 0.05;
/// Compound score at or below this labels a review negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

/// Stored review text is truncated to this many characters.
pub const MAX_STORED_TEXT: usize = 1000;

/// Number of per-review top keywords retained.
pub const TOP_KEYWORDS_PER_REVIEW: usize = 5;

// Normalization constant for the compound score; keeps typical review-length
// valence sums well inside (-1, 1).
const NORMALIZATION_ALPHA: f64 = 15.0;

static POSITIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "good", "great", "excellent", "amazing", "wonderful", "fantastic",
        "superb", "outstanding", "brilliant", "love", "loved", "best", "better",
        "delicious", "tasty", "fresh", "flavorful", "juicy", "tender", "crispy",
        "friendly", "attentive", "helpful", "polite", "courteous", "prompt",
        "clean", "cozy", "warm", "charming", "welcoming", "beautiful",
        "perfect", "awesome", "incredible", "delightful", "pleasant",
        "enjoyable", "enjoyed", "satisfying", "satisfied", "recommend",
        "recommended", "impressive", "exceptional", "remarkable", "favorite",
        "happy", "nice", "generous", "reasonable", "worth",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bad", "terrible", "awful", "horrible", "poor", "worst", "worse",
        "hate", "hated", "disappointing", "disappointed", "bland", "stale",
        "greasy", "soggy", "burnt", "undercooked", "overcooked", "inedible",
        "disgusting", "gross", "tasteless", "rude", "slow", "unfriendly",
        "unprofessional", "impatient", "dirty", "filthy", "noisy", "cramped",
        "smelly", "overpriced", "expensive", "mediocre", "unacceptable",
        "angry", "annoyed", "frustrating", "frustrated", "wrong", "mistake",
        "problem", "problems", "waste", "avoid", "nasty", "pathetic", "subpar",
        "inferior", "lousy", "sad",
    ]
    .into_iter()
    .collect()
});

// Apostrophes are stripped before tokenization, so contractions appear as
// their leading fragment ("don't" -> "don").
static NEGATORS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "not", "no", "never", "none", "cannot", "cant", "dont", "didnt",
        "doesnt", "isnt", "wasnt", "arent", "werent", "wont", "couldnt",
        "shouldnt", "hardly", "barely", "don", "didn", "doesn", "isn", "wasn",
        "aren", "weren", "won", "couldn", "shouldn",
    ]
    .into_iter()
    .collect()
});

/// Lexicon-based compound polarity score in [-1, 1]. Token valences (+1
/// positive, -1 negative, sign flipped after a negator) are summed and
/// normalized by `sum / sqrt(sum^2 + alpha)`.
pub fn compound_score(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    // Single-letter fragments (the "t" left behind by "didn't") are dropped
    // so negators stay adjacent to the word they modify.
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| t.len() > 1)
        .collect();

    let mut sum = 0.0f64;
    for (i, token) in tokens.iter().enumerate() {
        let valence = if POSITIVE_WORDS.contains(token) {
            1.0
        } else if NEGATIVE_WORDS.contains(token) {
            -1.0
        } else {
            continue;
        };
        let negated = i > 0 && NEGATORS.contains(tokens[i - 1]);
        sum += if negated { -valence } else { valence };
    }

    if sum == 0.0 {
        0.0
    } else {
        sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()
    }
}

/// Discrete label for a compound score. Thresholds are inclusive policy
/// constants: exactly +0.05 is positive, exactly -0.05 is negative.
pub fn label_for(score: f64) -> &'static str {
    if score >= POSITIVE_THRESHOLD {
        "positive"
    } else if score <= NEGATIVE_THRESHOLD {
        "negative"
    } else {
        "neutral"
    }
}

fn top_review_keywords(text: &str) -> Vec<String> {
    // token -> (frequency, first-seen position)
    let mut counts: HashMap<String, (u64, usize)> = HashMap::new();
    let mut seen = 0usize;
    for token in review_tokens(text) {
        let entry = counts.entry(token).or_insert_with(|| {
            let slot = (0, seen);
            seen += 1;
            slot
        });
        entry.0 += 1;
    }
    let mut ranked: Vec<(String, u64, usize)> = counts
        .into_iter()
        .map(|(token, (freq, first))| (token, freq, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(TOP_KEYWORDS_PER_REVIEW);
    ranked.into_iter().map(|(token, _, _)| token).collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Classify every eligible source row. Keys run sequentially from
/// `start_key + 1` in row order. Returns the sentiment rows plus the
/// `source-row index -> sentiment_key` map used for the content-based fact
/// join; rows skipped here never appear in that map.
pub fn build_sentiment_records(
    rows: &[SourceRow],
    start_key: i64,
) -> (Vec<SentimentRow>, HashMap<usize, i64>) {
    let mut out = Vec::new();
    let mut by_source_row = HashMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let Some(text) = row.trimmed_review_text() else {
            continue;
        };
        // Rating must be present and numeric for the review to carry a
        // sentiment record; the fact stage still defaults it independently.
        if row.parsed_rating().is_none() {
            continue;
        }

        let score = compound_score(text);
        let rounded = (score * 10_000.0).round() / 10_000.0;
        let sentiment_key = start_key + out.len() as i64 + 1;

        out.push(SentimentRow {
            sentiment_key,
            source_row: idx,
            review_text: truncate_chars(text, MAX_STORED_TEXT),
            sentiment_label: label_for(score),
            sentiment_score: rounded,
            top_keywords: top_review_keywords(text),
            word_count: text.split_whitespace().count() as i64,
            character_count: text.chars().count() as i64,
        });
        by_source_row.insert(idx, sentiment_key);
    }

    (out, by_source_row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(text: &str, rating: &str) -> SourceRow {
        SourceRow {
            review_text: Some(text.to_string()),
            rating: Some(rating.to_string()),
            ..SourceRow::default()
        }
    }

    // ------------------------------------------------------------------
    // Threshold boundaries
    // ------------------------------------------------------------------

    #[test]
    fn label_boundaries_are_inclusive() {
        assert_eq!(label_for(0.05), "positive");
        assert_eq!(label_for(-0.05), "negative");
        assert_eq!(label_for(0.049), "neutral");
        assert_eq!(label_for(-0.049), "neutral");
        assert_eq!(label_for(0.0), "neutral");
        assert_eq!(label_for(1.0), "positive");
        assert_eq!(label_for(-1.0), "negative");
    }

    // ------------------------------------------------------------------
    // Compound scoring
    // ------------------------------------------------------------------

    #[test]
    fn positive_text_scores_positive() {
        let score = compound_score("Great food great service");
        assert!(score >= POSITIVE_THRESHOLD, "score was {}", score);
    }

    #[test]
    fn negative_text_scores_negative() {
        let score = compound_score("Terrible food terrible service");
        assert!(score <= NEGATIVE_THRESHOLD, "score was {}", score);
    }

    #[test]
    fn scoring_is_symmetric() {
        let pos = compound_score("great great");
        let neg = compound_score("terrible terrible");
        assert!((pos + neg).abs() < 1e-12);
    }

    #[test]
    fn neutral_text_scores_zero() {
        assert_eq!(compound_score("The order arrived at noon"), 0.0);
    }

    #[test]
    fn negation_flips_valence() {
        assert!(compound_score("not good at all") < 0.0);
        assert!(compound_score("not bad at all") > 0.0);
        // Contraction fragment acts as a negator
        assert!(compound_score("didn't love it") < 0.0);
    }

    #[test]
    fn score_stays_within_unit_interval() {
        let long = "great ".repeat(500);
        let score = compound_score(&long);
        assert!(score < 1.0 && score > 0.9);
    }

    // ------------------------------------------------------------------
    // Record construction
    // ------------------------------------------------------------------

    #[test]
    fn empty_text_rows_get_no_key() {
        let rows = vec![
            review("Great food", "5"),
            SourceRow {
                rating: Some("3".to_string()),
                ..SourceRow::default()
            },
            review("Terrible food", "1"),
        ];
        let (records, by_row) = build_sentiment_records(&rows, 0);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sentiment_key, 1);
        assert_eq!(records[1].sentiment_key, 2);
        assert_eq!(by_row.get(&0), Some(&1));
        assert!(by_row.get(&1).is_none());
        assert_eq!(by_row.get(&2), Some(&2));
    }

    #[test]
    fn unparseable_rating_skips_row() {
        let rows = vec![review("Great food", "five stars")];
        let (records, by_row) = build_sentiment_records(&rows, 0);
        assert!(records.is_empty());
        assert!(by_row.is_empty());
    }

    #[test]
    fn stored_text_truncated_counts_untruncated() {
        let text = "word ".repeat(300); // 1500 chars, 300 words
        let rows = vec![review(text.trim_end(), "4")];
        let (records, _) = build_sentiment_records(&rows, 0);
        assert_eq!(records[0].review_text.chars().count(), MAX_STORED_TEXT);
        assert_eq!(records[0].word_count, 300);
        assert_eq!(records[0].character_count, 1499);
    }

    #[test]
    fn top_keywords_ranked_and_bounded() {
        let rows = vec![review(
            "pasta pasta pasta wine wine bread salad olives anchovies",
            "4",
        )];
        let (records, _) = build_sentiment_records(&rows, 0);
        let kws = &records[0].top_keywords;
        assert_eq!(kws.len(), TOP_KEYWORDS_PER_REVIEW);
        assert_eq!(kws[0], "pasta");
        assert_eq!(kws[1], "wine");
        // Remaining ties resolve in first-seen order
        assert_eq!(&kws[2..], &["bread", "salad", "olives"]);
    }

    #[test]
    fn score_rounded_to_four_places() {
        let rows = vec![review("great", "5")];
        let (records, _) = build_sentiment_records(&rows, 0);
        // 1 / sqrt(16) = 0.25
        assert_eq!(records[0].sentiment_score, 0.25);
        assert_eq!(records[0].sentiment_label, "positive");
    }

    #[test]
    fn start_key_offsets_sequence() {
        let rows = vec![review("Great food", "5")];
        let (records, by_row) = build_sentiment_records(&rows, 10);
        assert_eq!(records[0].sentiment_key, 11);
        assert_eq!(by_row[&0], 11);
    }
}
