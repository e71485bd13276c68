//! Bridge Builder: weighted sentiment-keyword associations.
//!
//! Intersection join between each sentiment record's top keywords and the
//! corpus vocabulary; a review's top words that never made the global top-K
//! produce no rows.

use std::collections::{BTreeMap, HashMap};

use crate::model::{BridgeRow, SentimentRow};

/// Build `bridge_sentiment_keywords`. For every (sentiment, top keyword)
/// pair where the keyword exists in the vocabulary, the weight is the
/// case-insensitive non-overlapping substring count of the keyword within
/// the record's stored review text; zero-count pairs are dropped and
/// duplicate pairs are summed. Output ordering is deterministic.
pub fn build_bridge(
    sentiments: &[SentimentRow],
    keyword_lookup: &HashMap<String, i64>,
) -> Vec<BridgeRow> {
    // BTreeMap keeps (sentiment_key, keyword_key) output order stable
    let mut weights: BTreeMap<(i64, i64), i64> = BTreeMap::new();

    for record in sentiments {
        let haystack = record.review_text.to_lowercase();
        for keyword in &record.top_keywords {
            let Some(&keyword_key) = keyword_lookup.get(keyword) else {
                continue;
            };
            let frequency = haystack.matches(keyword.as_str()).count() as i64;
            if frequency > 0 {
                *weights
                    .entry((record.sentiment_key, keyword_key))
                    .or_insert(0) += frequency;
            }
        }
    }

    weights
        .into_iter()
        .map(|((sentiment_key, keyword_key), keyword_frequency)| BridgeRow {
            sentiment_key,
            keyword_key,
            keyword_frequency,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentiment(key: i64, text: &str, top: &[&str]) -> SentimentRow {
        SentimentRow {
            sentiment_key: key,
            source_row: 0,
            review_text: text.to_string(),
            sentiment_label: "neutral",
            sentiment_score: 0.0,
            top_keywords: top.iter().map(|s| s.to_string()).collect(),
            word_count: 0,
            character_count: 0,
        }
    }

    fn vocab(words: &[(&str, i64)]) -> HashMap<String, i64> {
        words.iter().map(|(w, k)| (w.to_string(), *k)).collect()
    }

    #[test]
    fn keywords_outside_vocabulary_produce_no_rows() {
        let records = vec![sentiment(1, "quiet little bistro", &["quiet", "bistro"])];
        let rows = build_bridge(&records, &vocab(&[("pasta", 1)]));
        assert!(rows.is_empty());
    }

    #[test]
    fn keywords_in_vocabulary_produce_counted_rows() {
        let records = vec![sentiment(
            1,
            "pasta and more pasta with wine",
            &["pasta", "wine"],
        )];
        let rows = build_bridge(&records, &vocab(&[("pasta", 7), ("wine", 9)]));
        assert_eq!(
            rows,
            vec![
                BridgeRow { sentiment_key: 1, keyword_key: 7, keyword_frequency: 2 },
                BridgeRow { sentiment_key: 1, keyword_key: 9, keyword_frequency: 1 },
            ]
        );
    }

    #[test]
    fn duplicate_top_keywords_sum_frequencies() {
        let records = vec![sentiment(1, "wine wine wine", &["wine", "wine"])];
        let rows = build_bridge(&records, &vocab(&[("wine", 2)]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].keyword_frequency, 6);
    }

    #[test]
    fn counting_is_case_insensitive_against_stored_text() {
        let records = vec![sentiment(3, "Pasta PASTA pasta", &["pasta"])];
        let rows = build_bridge(&records, &vocab(&[("pasta", 1)]));
        assert_eq!(rows[0].keyword_frequency, 3);
    }

    #[test]
    fn keyword_absent_from_text_is_dropped() {
        // Top keyword derived before truncation may no longer occur in the
        // stored text
        let records = vec![sentiment(1, "short text", &["pasta"])];
        let rows = build_bridge(&records, &vocab(&[("pasta", 1)]));
        assert!(rows.is_empty());
    }

    #[test]
    fn output_order_is_deterministic() {
        let records = vec![
            sentiment(2, "wine pasta", &["wine", "pasta"]),
            sentiment(1, "pasta", &["pasta"]),
        ];
        let rows = build_bridge(&records, &vocab(&[("pasta", 5), ("wine", 4)]));
        let keys: Vec<(i64, i64)> = rows.iter().map(|r| (r.sentiment_key, r.keyword_key)).collect();
        assert_eq!(keys, vec![(1, 5), (2, 4), (2, 5)]);
    }
}
