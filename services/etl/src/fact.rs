//! Fact Assembler: joins every source row against the dimension lookups and
//! emits `fact_restaurant_reviews`.
//!
//! Resolution policy differs by dimension criticality: time and location are
//! mandatory (the row is skipped when either is unresolved), restaurant and
//! category fall back to the first key of the run's dimension.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::hash::Hash;

use crate::dimensions::{location_natural_key, restaurant_natural_key, LocationKey, RestaurantKey};
use crate::model::{normalize_label, FactRow, SourceRow};

/// Per-dimension resolution policy consumed uniformly by the assembler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyPolicy {
    /// No match excludes the row from the fact table.
    Strict,
    /// No match substitutes the given default surrogate key.
    Fallback(i64),
}

fn resolve<K>(lookup: &HashMap<K, i64>, natural_key: &K, policy: KeyPolicy) -> Option<i64>
where
    K: Eq + Hash,
{
    match lookup.get(natural_key) {
        Some(&key) => Some(key),
        None => match policy {
            KeyPolicy::Strict => None,
            KeyPolicy::Fallback(default_key) => Some(default_key),
        },
    }
}

/// Finished dimension lookups handed to the assembler. The assembler only
/// reads these; it never mutates a dimension.
pub struct FactInputs<'a> {
    pub time: &'a HashMap<NaiveDateTime, i64>,
    pub location: &'a HashMap<LocationKey, i64>,
    pub restaurant: &'a HashMap<RestaurantKey, i64>,
    pub category: &'a HashMap<String, i64>,
    pub restaurant_policy: KeyPolicy,
    pub category_policy: KeyPolicy,
    /// Content-based join: source-row index -> sentiment_key.
    pub sentiment_by_row: &'a HashMap<usize, i64>,
    pub sentiment_count: i64,
    /// Key offset the sentiment sequence started from this run.
    pub sentiment_start: i64,
    /// Key offset the fact review_id sequence starts from this run.
    pub fact_start: i64,
}

/// Assemble the fact table. `review_id` is assigned sequentially only to
/// rows that pass the mandatory time/location resolution.
pub fn assemble_facts(rows: &[SourceRow], inputs: &FactInputs) -> Vec<FactRow> {
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for (idx, row) in rows.iter().enumerate() {
        // Mandatory: exact same parse and normalization as the resolvers
        let Some(time_key) = row.parsed_timestamp().and_then(|ts| inputs.time.get(&ts).copied())
        else {
            skipped += 1;
            continue;
        };
        let Some(location_key) =
            resolve(inputs.location, &location_natural_key(row), KeyPolicy::Strict)
        else {
            skipped += 1;
            continue;
        };

        // Best-effort: unresolved keys substitute the dimension's first row
        let Some(restaurant_key) = resolve(
            inputs.restaurant,
            &restaurant_natural_key(row),
            inputs.restaurant_policy,
        ) else {
            skipped += 1;
            continue;
        };
        let Some(category_key) = resolve(
            inputs.category,
            &normalize_label(row.category.as_deref()),
            inputs.category_policy,
        ) else {
            skipped += 1;
            continue;
        };

        // Content-based sentiment join, positional heuristic only for rows
        // the classifier skipped
        let sentiment_key = match inputs.sentiment_by_row.get(&idx) {
            Some(&key) => key,
            None if inputs.sentiment_count == 0 => inputs.sentiment_start + 1,
            None => inputs.sentiment_start + (idx as i64 + 1).min(inputs.sentiment_count),
        };

        let review_length = row
            .review_text
            .as_deref()
            .map(|t| t.chars().count() as i64)
            .unwrap_or(0);

        out.push(FactRow {
            review_id: inputs.fact_start + out.len() as i64 + 1,
            restaurant_key,
            location_key,
            time_key,
            category_key,
            sentiment_key,
            rating: row.parsed_rating().unwrap_or(0.0),
            number_of_reviews: row.parsed_review_count().unwrap_or(1),
            review_length,
        });
    }

    if skipped > 0 {
        eprintln!(
            "Warning: {} rows excluded from the fact table (unresolved mandatory keys)",
            skipped
        );
    }
    out
}
