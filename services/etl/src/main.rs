//! ETL Service - Materializes restaurant-review records into a star schema
//!
//! Responsibilities:
//! - Read one delimited review export into memory
//! - Build the time / location / restaurant / category dimensions
//! - Build the keyword vocabulary, sentiment table, and their bridge
//! - Assemble the central fact table against the dimension lookups
//! - Bulk-append all eight tables to PostgreSQL
//!
//! CRITICAL: This service must be DETERMINISTIC
//! Same input + empty target store = same keys, same row counts
//!
//! Usage:
//!   cargo run --bin etl -- --input data/reviews.csv
//!   cargo run --bin etl -- --input data/reviews.csv --retain-data
//!   cargo run --bin etl -- --input data/reviews.csv --dry-run

mod bridge;
mod dimensions;
mod fact;
mod keywords;
mod model;
mod sentiment;
mod text;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use bridge::build_bridge;
use dimensions::{
    build_category_dimension, build_location_dimension, build_restaurant_dimension,
    build_time_dimension, LocationKey, RestaurantKey,
};
use fact::{assemble_facts, FactInputs, KeyPolicy};
use keywords::{build_keyword_dimension, DEFAULT_TOP_KEYWORDS};
use model::{
    read_source_rows, BridgeRow, CategoryRow, FactRow, KeywordRow, LocationRow, RestaurantRow,
    SentimentRow, TimeRow,
};
use sentiment::build_sentiment_records;

#[derive(Parser, Debug)]
#[command(name = "etl", about = "Loads restaurant reviews into the star schema")]
struct Args {
    /// Path to the review export CSV
    #[arg(long)]
    input: PathBuf,

    /// Keep existing table contents and append instead of purging
    #[arg(long, default_value = "false")]
    retain_data: bool,

    /// Dry run - build everything, print counts, don't save to database
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Vocabulary bound: keep the K most frequent keywords
    #[arg(long, default_value_t = DEFAULT_TOP_KEYWORDS)]
    top_keywords: usize,

    /// Extra stop word excluded from the keyword vocabulary (repeatable)
    #[arg(long = "stop-word")]
    stop_words: Vec<String>,
}

// =============================================================================
// Configuration
// =============================================================================

/// Database URL from the environment: DATABASE_URL wins, otherwise composed
/// from DB_HOST / DB_PORT / DB_USER / DB_PASSWORD / DB_NAME with local
/// defaults.
fn database_url() -> String {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return url;
    }
    let host = std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let user = std::env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("DB_PASSWORD").unwrap_or_else(|_| "postgres".to_string());
    let name = std::env::var("DB_NAME").unwrap_or_else(|_| "dw_bi".to_string());
    format!("postgres://{user}:{password}@{host}:{port}/{name}")
}

// =============================================================================
// Pipeline stages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum PipelineStage {
    Clearing,
    BuildingDimensions,
    BuildingVocabularyAndSentiment,
    BuildingBridge,
    BuildingFact,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Clearing => "clearing",
            PipelineStage::BuildingDimensions => "building dimensions",
            PipelineStage::BuildingVocabularyAndSentiment => "building vocabulary and sentiment",
            PipelineStage::BuildingBridge => "building bridge",
            PipelineStage::BuildingFact => "building fact",
        };
        write!(f, "{}", name)
    }
}

/// Per-table row counts for the final summary. Stages never reached leave
/// their counts at zero; the summary prints every table regardless.
#[derive(Debug, Default, Clone, PartialEq)]
struct TableCounts {
    dim_time: usize,
    dim_location: usize,
    dim_restaurant: usize,
    dim_category: usize,
    dim_keywords: usize,
    dim_sentiment: usize,
    bridge_sentiment_keywords: usize,
    fact_restaurant_reviews: usize,
}

impl TableCounts {
    fn print(&self) {
        println!("  dim_time:                  {}", self.dim_time);
        println!("  dim_location:              {}", self.dim_location);
        println!("  dim_restaurant:            {}", self.dim_restaurant);
        println!("  dim_category:              {}", self.dim_category);
        println!("  dim_keywords:              {}", self.dim_keywords);
        println!("  dim_sentiment:             {}", self.dim_sentiment);
        println!("  bridge_sentiment_keywords: {}", self.bridge_sentiment_keywords);
        println!("  fact_restaurant_reviews:   {}", self.fact_restaurant_reviews);
    }
}

// =============================================================================
// Schema and table maintenance
// =============================================================================

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS dim_time (
    time_key        BIGINT PRIMARY KEY,
    full_timestamp  TIMESTAMP NOT NULL UNIQUE,
    date_actual     DATE NOT NULL,
    year            INT NOT NULL,
    month           INT NOT NULL,
    week_of_year    INT NOT NULL,
    day_of_month    INT NOT NULL,
    day_of_week     INT NOT NULL,
    day_name        TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_location (
    location_key  BIGINT PRIMARY KEY,
    country       TEXT NOT NULL,
    country_code  TEXT NOT NULL,
    state         TEXT NOT NULL,
    city          TEXT NOT NULL,
    street        TEXT NOT NULL,
    building      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_restaurant (
    restaurant_key     BIGINT PRIMARY KEY,
    organization_name  TEXT NOT NULL,
    phone_number       TEXT NOT NULL,
    auxiliary_info     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_category (
    category_key   BIGINT PRIMARY KEY,
    category_name  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_keywords (
    keyword_key       BIGINT PRIMARY KEY,
    keyword           TEXT NOT NULL,
    keyword_category  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_sentiment (
    sentiment_key    BIGINT PRIMARY KEY,
    review_text      TEXT NOT NULL,
    sentiment_label  TEXT NOT NULL,
    sentiment_score  DOUBLE PRECISION NOT NULL,
    top_keywords     JSONB NOT NULL,
    word_count       BIGINT NOT NULL,
    character_count  BIGINT NOT NULL
);
CREATE TABLE IF NOT EXISTS bridge_sentiment_keywords (
    sentiment_key      BIGINT NOT NULL REFERENCES dim_sentiment(sentiment_key),
    keyword_key        BIGINT NOT NULL REFERENCES dim_keywords(keyword_key),
    keyword_frequency  BIGINT NOT NULL,
    PRIMARY KEY (sentiment_key, keyword_key)
);
CREATE TABLE IF NOT EXISTS fact_restaurant_reviews (
    review_id          BIGINT PRIMARY KEY,
    restaurant_key     BIGINT NOT NULL REFERENCES dim_restaurant(restaurant_key),
    location_key       BIGINT NOT NULL REFERENCES dim_location(location_key),
    time_key           BIGINT NOT NULL REFERENCES dim_time(time_key),
    category_key       BIGINT NOT NULL REFERENCES dim_category(category_key),
    sentiment_key      BIGINT NOT NULL,
    rating             DOUBLE PRECISION NOT NULL,
    number_of_reviews  BIGINT NOT NULL,
    review_length      BIGINT NOT NULL
);
"#;

async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .context("Failed to create warehouse tables")?;
    Ok(())
}

/// Tables in deletion order: child before parent, so foreign keys never
/// block the purge.
const CLEAR_ORDER: &[&str] = &[
    "fact_restaurant_reviews",
    "bridge_sentiment_keywords",
    "dim_sentiment",
    "dim_keywords",
    "dim_category",
    "dim_restaurant",
    "dim_location",
    "dim_time",
];

async fn clear_all_tables(pool: &PgPool) -> Result<()> {
    for table in CLEAR_ORDER {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(pool)
            .await
            .with_context(|| format!("Failed to clear table {}", table))?;
    }
    Ok(())
}

/// Stored maximum surrogate key per table; surrogate sequences resume after
/// these under retain mode so appended keys never collide with prior runs.
#[derive(Debug, Default, Clone, Copy)]
struct KeyOffsets {
    time: i64,
    location: i64,
    restaurant: i64,
    category: i64,
    keyword: i64,
    sentiment: i64,
    fact: i64,
}

async fn max_key(pool: &PgPool, table: &str, column: &str) -> Result<i64> {
    let max: i64 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(MAX({}), 0) FROM {}",
        column, table
    ))
    .fetch_one(pool)
    .await
    .with_context(|| format!("Failed to read max {} from {}", column, table))?;
    Ok(max)
}

async fn load_key_offsets(pool: &PgPool) -> Result<KeyOffsets> {
    Ok(KeyOffsets {
        time: max_key(pool, "dim_time", "time_key").await?,
        location: max_key(pool, "dim_location", "location_key").await?,
        restaurant: max_key(pool, "dim_restaurant", "restaurant_key").await?,
        category: max_key(pool, "dim_category", "category_key").await?,
        keyword: max_key(pool, "dim_keywords", "keyword_key").await?,
        sentiment: max_key(pool, "dim_sentiment", "sentiment_key").await?,
        fact: max_key(pool, "fact_restaurant_reviews", "review_id").await?,
    })
}

/// Natural-key lookups of the base-dimension rows already in the warehouse.
/// Under retain mode the resolvers are seeded with these so an appended load
/// reuses stored keys instead of re-inserting shared rows (dim_time enforces
/// a UNIQUE timestamp, so re-inserting would abort the run).
#[derive(Debug, Default)]
struct StoredLookups {
    time: HashMap<NaiveDateTime, i64>,
    location: HashMap<LocationKey, i64>,
    restaurant: HashMap<RestaurantKey, i64>,
    category: HashMap<String, i64>,
}

async fn load_stored_lookups(pool: &PgPool) -> Result<StoredLookups> {
    let time: Vec<(i64, NaiveDateTime)> =
        sqlx::query_as("SELECT time_key, full_timestamp FROM dim_time")
            .fetch_all(pool)
            .await
            .context("Failed to load stored dim_time rows")?;
    let location: Vec<(i64, String, String, String, String, String)> = sqlx::query_as(
        "SELECT location_key, country, state, city, street, building FROM dim_location",
    )
    .fetch_all(pool)
    .await
    .context("Failed to load stored dim_location rows")?;
    let restaurant: Vec<(i64, String, String, String)> = sqlx::query_as(
        "SELECT restaurant_key, organization_name, phone_number, auxiliary_info FROM dim_restaurant",
    )
    .fetch_all(pool)
    .await
    .context("Failed to load stored dim_restaurant rows")?;
    let category: Vec<(i64, String)> =
        sqlx::query_as("SELECT category_key, category_name FROM dim_category")
            .fetch_all(pool)
            .await
            .context("Failed to load stored dim_category rows")?;

    Ok(StoredLookups {
        time: time.into_iter().map(|(key, ts)| (ts, key)).collect(),
        location: location
            .into_iter()
            .map(|(key, country, state, city, street, building)| {
                ((country, state, city, street, building), key)
            })
            .collect(),
        restaurant: restaurant
            .into_iter()
            .map(|(key, org, phone, aux)| ((org, phone, aux), key))
            .collect(),
        category: category.into_iter().map(|(key, name)| (name, key)).collect(),
    })
}

// =============================================================================
// Bulk appends
// =============================================================================

// Keeps every chunk well under the Postgres bind-parameter limit
const INSERT_CHUNK: usize = 500;

async fn persist_time(pool: Option<&PgPool>, rows: &[TimeRow]) -> Result<()> {
    let Some(pool) = pool else { return Ok(()) };
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO dim_time (time_key, full_timestamp, date_actual, year, month, \
             week_of_year, day_of_month, day_of_week, day_name) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.time_key)
                .push_bind(row.full_timestamp)
                .push_bind(row.date_actual)
                .push_bind(row.year)
                .push_bind(row.month)
                .push_bind(row.week_of_year)
                .push_bind(row.day_of_month)
                .push_bind(row.day_of_week)
                .push_bind(&row.day_name);
        });
        qb.build()
            .execute(pool)
            .await
            .context("Failed to insert dim_time rows")?;
    }
    Ok(())
}

async fn persist_locations(pool: Option<&PgPool>, rows: &[LocationRow]) -> Result<()> {
    let Some(pool) = pool else { return Ok(()) };
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO dim_location (location_key, country, country_code, state, city, \
             street, building) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.location_key)
                .push_bind(&row.country)
                .push_bind(&row.country_code)
                .push_bind(&row.state)
                .push_bind(&row.city)
                .push_bind(&row.street)
                .push_bind(&row.building);
        });
        qb.build()
            .execute(pool)
            .await
            .context("Failed to insert dim_location rows")?;
    }
    Ok(())
}

async fn persist_restaurants(pool: Option<&PgPool>, rows: &[RestaurantRow]) -> Result<()> {
    let Some(pool) = pool else { return Ok(()) };
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO dim_restaurant (restaurant_key, organization_name, phone_number, \
             auxiliary_info) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.restaurant_key)
                .push_bind(&row.organization_name)
                .push_bind(&row.phone_number)
                .push_bind(&row.auxiliary_info);
        });
        qb.build()
            .execute(pool)
            .await
            .context("Failed to insert dim_restaurant rows")?;
    }
    Ok(())
}

async fn persist_categories(pool: Option<&PgPool>, rows: &[CategoryRow]) -> Result<()> {
    let Some(pool) = pool else { return Ok(()) };
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO dim_category (category_key, category_name) ");
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.category_key).push_bind(&row.category_name);
        });
        qb.build()
            .execute(pool)
            .await
            .context("Failed to insert dim_category rows")?;
    }
    Ok(())
}

async fn persist_keywords(pool: Option<&PgPool>, rows: &[KeywordRow]) -> Result<()> {
    let Some(pool) = pool else { return Ok(()) };
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO dim_keywords (keyword_key, keyword, keyword_category) ");
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.keyword_key)
                .push_bind(&row.keyword)
                .push_bind(row.keyword_category);
        });
        qb.build()
            .execute(pool)
            .await
            .context("Failed to insert dim_keywords rows")?;
    }
    Ok(())
}

async fn persist_sentiments(pool: Option<&PgPool>, rows: &[SentimentRow]) -> Result<()> {
    let Some(pool) = pool else { return Ok(()) };
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO dim_sentiment (sentiment_key, review_text, sentiment_label, \
             sentiment_score, top_keywords, word_count, character_count) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.sentiment_key)
                .push_bind(&row.review_text)
                .push_bind(row.sentiment_label)
                .push_bind(row.sentiment_score)
                .push_bind(serde_json::json!(row.top_keywords))
                .push_bind(row.word_count)
                .push_bind(row.character_count);
        });
        qb.build()
            .execute(pool)
            .await
            .context("Failed to insert dim_sentiment rows")?;
    }
    Ok(())
}

async fn persist_bridge(pool: Option<&PgPool>, rows: &[BridgeRow]) -> Result<()> {
    let Some(pool) = pool else { return Ok(()) };
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO bridge_sentiment_keywords (sentiment_key, keyword_key, \
             keyword_frequency) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.sentiment_key)
                .push_bind(row.keyword_key)
                .push_bind(row.keyword_frequency);
        });
        qb.build()
            .execute(pool)
            .await
            .context("Failed to insert bridge_sentiment_keywords rows")?;
    }
    Ok(())
}

async fn persist_facts(pool: Option<&PgPool>, rows: &[FactRow]) -> Result<()> {
    let Some(pool) = pool else { return Ok(()) };
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO fact_restaurant_reviews (review_id, restaurant_key, location_key, \
             time_key, category_key, sentiment_key, rating, number_of_reviews, review_length) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.review_id)
                .push_bind(row.restaurant_key)
                .push_bind(row.location_key)
                .push_bind(row.time_key)
                .push_bind(row.category_key)
                .push_bind(row.sentiment_key)
                .push_bind(row.rating)
                .push_bind(row.number_of_reviews)
                .push_bind(row.review_length);
        });
        qb.build()
            .execute(pool)
            .await
            .context("Failed to insert fact_restaurant_reviews rows")?;
    }
    Ok(())
}

// =============================================================================
// Orchestration
// =============================================================================

async fn run_pipeline(pool: Option<&PgPool>, args: &Args) -> Result<TableCounts> {
    let mut counts = TableCounts::default();
    let mut stage = PipelineStage::Clearing;

    let rows = read_source_rows(&args.input)?;
    println!("Loaded {} records from {}", rows.len(), args.input.display());

    let result: Result<TableCounts> = async {
        // --- Clearing (optional) -----------------------------------------
        stage = PipelineStage::Clearing;
        if args.retain_data {
            println!("[{}] skipped (--retain-data)", stage);
        } else if let Some(pool) = pool {
            clear_all_tables(pool).await?;
            println!("[{}] all tables cleared", stage);
        } else {
            println!("[{}] skipped (dry run)", stage);
        }

        let (offsets, stored) = match (pool, args.retain_data) {
            (Some(pool), true) => (
                load_key_offsets(pool)
                    .await
                    .context("Failed to read stored key offsets")?,
                load_stored_lookups(pool).await?,
            ),
            _ => (KeyOffsets::default(), StoredLookups::default()),
        };

        // --- Base dimensions ---------------------------------------------
        stage = PipelineStage::BuildingDimensions;
        let (time_rows, time_lookup) = build_time_dimension(&rows, &stored.time, offsets.time);
        persist_time(pool, &time_rows).await?;
        counts.dim_time = time_rows.len();
        println!("[{}] dim_time: {} rows", stage, time_rows.len());

        let (location_rows, location_lookup) =
            build_location_dimension(&rows, &stored.location, offsets.location);
        persist_locations(pool, &location_rows).await?;
        counts.dim_location = location_rows.len();
        println!("[{}] dim_location: {} rows", stage, location_rows.len());

        let (restaurant_rows, restaurant_lookup) =
            build_restaurant_dimension(&rows, &stored.restaurant, offsets.restaurant);
        persist_restaurants(pool, &restaurant_rows).await?;
        counts.dim_restaurant = restaurant_rows.len();
        println!("[{}] dim_restaurant: {} rows", stage, restaurant_rows.len());

        let (category_rows, category_lookup) =
            build_category_dimension(&rows, &stored.category, offsets.category);
        persist_categories(pool, &category_rows).await?;
        counts.dim_category = category_rows.len();
        println!("[{}] dim_category: {} rows", stage, category_rows.len());

        // --- Vocabulary and sentiment ------------------------------------
        stage = PipelineStage::BuildingVocabularyAndSentiment;
        let extra_stop_words: HashSet<String> = args.stop_words.iter().cloned().collect();
        let (keyword_rows, keyword_lookup) =
            build_keyword_dimension(&rows, args.top_keywords, &extra_stop_words, offsets.keyword);
        persist_keywords(pool, &keyword_rows).await?;
        counts.dim_keywords = keyword_rows.len();
        println!("[{}] dim_keywords: {} rows", stage, keyword_rows.len());

        let (sentiment_rows, sentiment_by_row) = build_sentiment_records(&rows, offsets.sentiment);
        persist_sentiments(pool, &sentiment_rows).await?;
        counts.dim_sentiment = sentiment_rows.len();
        println!("[{}] dim_sentiment: {} rows", stage, sentiment_rows.len());

        // --- Bridge ------------------------------------------------------
        stage = PipelineStage::BuildingBridge;
        let bridge_rows = build_bridge(&sentiment_rows, &keyword_lookup);
        persist_bridge(pool, &bridge_rows).await?;
        counts.bridge_sentiment_keywords = bridge_rows.len();
        println!("[{}] bridge_sentiment_keywords: {} rows", stage, bridge_rows.len());

        // --- Fact --------------------------------------------------------
        stage = PipelineStage::BuildingFact;
        let inputs = FactInputs {
            time: &time_lookup,
            location: &location_lookup,
            restaurant: &restaurant_lookup,
            category: &category_lookup,
            restaurant_policy: KeyPolicy::Fallback(offsets.restaurant + 1),
            category_policy: KeyPolicy::Fallback(offsets.category + 1),
            sentiment_by_row: &sentiment_by_row,
            sentiment_count: sentiment_rows.len() as i64,
            sentiment_start: offsets.sentiment,
            fact_start: offsets.fact,
        };
        let fact_rows = assemble_facts(&rows, &inputs);
        persist_facts(pool, &fact_rows).await?;
        counts.fact_restaurant_reviews = fact_rows.len();
        println!("[{}] fact_restaurant_reviews: {} rows", stage, fact_rows.len());

        Ok(counts.clone())
    }
    .await;

    match result {
        Ok(counts) => Ok(counts),
        Err(e) => {
            eprintln!("Stage '{}' failed: {:#}", stage, e);
            eprintln!("Rows persisted before failure:");
            counts.print();
            Err(e).with_context(|| format!("Stage '{}' failed", stage))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("=== Review Warehouse ETL ===");
    println!("Input: {}", args.input.display());
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });
    println!(
        "Retain existing data: {}",
        if args.retain_data { "yes" } else { "no" }
    );

    let pool = if args.dry_run {
        None
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url())
            .await
            .context("Failed to connect to database")?;
        ensure_schema(&pool).await?;
        Some(pool)
    };

    let counts = run_pipeline(pool.as_ref(), &args).await?;

    println!("\n=== ETL Complete ===");
    counts.print();
    if args.dry_run {
        println!("Dry run - nothing was saved to the database");
    }
    Ok(())
}
