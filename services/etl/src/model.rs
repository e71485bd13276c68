//! Row types shared across the pipeline: the raw CSV record and the eight
//! warehouse tables it is transformed into.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::Path;

/// Timestamp format produced by the review exporter.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Placeholder for absent location / phone / auxiliary values.
pub const FIELD_SENTINEL: &str = "-";

/// Placeholder label for absent organization and category names.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// One raw record from the review export. Every column may be empty;
/// timestamp and rating are expected but defensively defaulted downstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceRow {
    #[serde(default, alias = "ID", alias = "id")]
    pub id: Option<String>,
    #[serde(default, alias = "Time_GMT", alias = "time_gmt", alias = "timestamp")]
    pub time_gmt: Option<String>,
    #[serde(default, alias = "Phone", alias = "phone")]
    pub phone: Option<String>,
    #[serde(default, alias = "Organization", alias = "organization")]
    pub organization: Option<String>,
    #[serde(default, alias = "OLF", alias = "olf")]
    pub auxiliary: Option<String>,
    #[serde(default, alias = "Rating", alias = "rating")]
    pub rating: Option<String>,
    #[serde(default, alias = "NumberReview", alias = "number_review")]
    pub number_review: Option<String>,
    #[serde(default, alias = "Category", alias = "category")]
    pub category: Option<String>,
    #[serde(default, alias = "Country", alias = "country")]
    pub country: Option<String>,
    #[serde(default, alias = "CountryCode", alias = "country_code")]
    pub country_code: Option<String>,
    #[serde(default, alias = "State", alias = "state")]
    pub state: Option<String>,
    #[serde(default, alias = "City", alias = "city")]
    pub city: Option<String>,
    #[serde(default, alias = "Street", alias = "street")]
    pub street: Option<String>,
    #[serde(default, alias = "Building", alias = "building")]
    pub building: Option<String>,
    #[serde(default, alias = "ReviewText", alias = "review_text")]
    pub review_text: Option<String>,
}

impl SourceRow {
    /// Timestamp parsed against [`TIMESTAMP_FORMAT`], `None` when absent or
    /// unparseable.
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        let raw = self.time_gmt.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
    }

    /// Rating as a number, `None` when absent or non-numeric.
    pub fn parsed_rating(&self) -> Option<f64> {
        self.rating.as_deref()?.trim().parse().ok()
    }

    /// Review count as an integer, `None` when absent or non-numeric.
    pub fn parsed_review_count(&self) -> Option<i64> {
        self.number_review.as_deref()?.trim().parse().ok()
    }

    /// Review text with surrounding whitespace trimmed, `None` when the cell
    /// is absent or blank.
    pub fn trimmed_review_text(&self) -> Option<&str> {
        let text = self.review_text.as_deref()?.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Normalize an optional field to the `"-"` sentinel. Never returns an empty
/// string, so tuples built from these values stay comparable.
pub fn normalize_field(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => FIELD_SENTINEL.to_string(),
    }
}

/// Normalize an optional label (organization, category) to `"Unknown"`.
pub fn normalize_label(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN_LABEL.to_string(),
    }
}

/// One row of `dim_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRow {
    pub time_key: i64,
    pub full_timestamp: NaiveDateTime,
    pub date_actual: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub week_of_year: i32,
    pub day_of_month: i32,
    pub day_of_week: i32,
    pub day_name: String,
}

/// One row of `dim_location`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRow {
    pub location_key: i64,
    pub country: String,
    pub country_code: String,
    pub state: String,
    pub city: String,
    pub street: String,
    pub building: String,
}

/// One row of `dim_restaurant`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantRow {
    pub restaurant_key: i64,
    pub organization_name: String,
    pub phone_number: String,
    pub auxiliary_info: String,
}

/// One row of `dim_category`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub category_key: i64,
    pub category_name: String,
}

/// One row of `dim_keywords`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRow {
    pub keyword_key: i64,
    pub keyword: String,
    pub keyword_category: &'static str,
}

/// One row of `dim_sentiment`. `source_row` is the zero-based index of the
/// originating CSV record; it drives the content-based fact join and is not
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentRow {
    pub sentiment_key: i64,
    pub source_row: usize,
    pub review_text: String,
    pub sentiment_label: &'static str,
    pub sentiment_score: f64,
    pub top_keywords: Vec<String>,
    pub word_count: i64,
    pub character_count: i64,
}

/// One row of `bridge_sentiment_keywords`.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeRow {
    pub sentiment_key: i64,
    pub keyword_key: i64,
    pub keyword_frequency: i64,
}

/// One row of `fact_restaurant_reviews`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub review_id: i64,
    pub restaurant_key: i64,
    pub location_key: i64,
    pub time_key: i64,
    pub category_key: i64,
    pub sentiment_key: i64,
    pub rating: f64,
    pub number_of_reviews: i64,
    pub review_length: i64,
}

/// Read the source CSV into memory. Rows that fail to deserialize are
/// skipped with a warning; the run only fails when the file itself cannot
/// be read.
pub fn read_source_rows(path: &Path) -> Result<Vec<SourceRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (line_idx, result) in reader.deserialize().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                // +2: 1-indexed plus header line
                eprintln!("Warning: skipping line {} due to error: {}", line_idx + 2, e);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        eprintln!("Warning: {} malformed rows skipped while reading input", skipped);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_with(field: &str, value: &str) -> SourceRow {
        let mut row = SourceRow::default();
        match field {
            "time" => row.time_gmt = Some(value.to_string()),
            "rating" => row.rating = Some(value.to_string()),
            "count" => row.number_review = Some(value.to_string()),
            "text" => row.review_text = Some(value.to_string()),
            _ => unreachable!(),
        }
        row
    }

    #[test]
    fn timestamp_parses_exporter_format() {
        let row = row_with("time", "03/01/2024 10:00");
        let ts = row.parsed_timestamp().unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 10:00:00");
    }

    #[test]
    fn timestamp_rejects_other_formats() {
        assert!(row_with("time", "2024-03-01 10:00").parsed_timestamp().is_none());
        assert!(row_with("time", "garbage").parsed_timestamp().is_none());
        assert!(row_with("time", "   ").parsed_timestamp().is_none());
        assert!(SourceRow::default().parsed_timestamp().is_none());
    }

    #[test]
    fn rating_defaults_on_garbage() {
        assert_eq!(row_with("rating", "4.5").parsed_rating(), Some(4.5));
        assert_eq!(row_with("rating", "five").parsed_rating(), None);
        assert_eq!(SourceRow::default().parsed_rating(), None);
    }

    #[test]
    fn review_count_parses_integers_only() {
        assert_eq!(row_with("count", "12").parsed_review_count(), Some(12));
        assert_eq!(row_with("count", "12.5").parsed_review_count(), None);
    }

    #[test]
    fn normalize_field_uses_sentinel() {
        assert_eq!(normalize_field(None), "-");
        assert_eq!(normalize_field(Some("")), "-");
        assert_eq!(normalize_field(Some("  ")), "-");
        assert_eq!(normalize_field(Some(" Paris ")), "Paris");
    }

    #[test]
    fn normalize_label_uses_unknown() {
        assert_eq!(normalize_label(None), "Unknown");
        assert_eq!(normalize_label(Some("")), "Unknown");
        assert_eq!(normalize_label(Some("Cafe X")), "Cafe X");
    }

    #[test]
    fn blank_review_text_is_none() {
        assert!(row_with("text", "   ").trimmed_review_text().is_none());
        assert_eq!(row_with("text", " ok ").trimmed_review_text(), Some("ok"));
    }
}
