//! Base-dimension resolvers: time, location, restaurant, category.
//!
//! Each resolver deduplicates its natural key in first-seen order, assigns a
//! dense surrogate sequence starting at `start_key + 1`, and returns the
//! finished rows together with an immutable natural-key -> surrogate-key
//! lookup. Resolvers never share key state.
//!
//! Every builder also takes a `stored` lookup of natural keys already in the
//! warehouse (empty on a fresh load). Keys found there resolve to their
//! stored surrogate and are not re-emitted, so an appended load never
//! re-inserts a dimension row it shares with a previous run.

use chrono::{Datelike, NaiveDateTime};
use std::collections::HashMap;

use crate::model::{
    normalize_field, normalize_label, CategoryRow, LocationRow, RestaurantRow, SourceRow, TimeRow,
};

/// Natural key of a location: the normalized (country, state, city, street,
/// building) tuple. Tuple-typed so field values containing any delimiter
/// character can never collide.
pub type LocationKey = (String, String, String, String, String);

/// Natural key of a restaurant: the normalized (organization, phone,
/// auxiliary) tuple.
pub type RestaurantKey = (String, String, String);

/// Lookup key for a location. The Fact Assembler must build its keys through
/// this same function so both sides normalize identically.
pub fn location_natural_key(row: &SourceRow) -> LocationKey {
    (
        normalize_field(row.country.as_deref()),
        normalize_field(row.state.as_deref()),
        normalize_field(row.city.as_deref()),
        normalize_field(row.street.as_deref()),
        normalize_field(row.building.as_deref()),
    )
}

/// Lookup key for a restaurant.
pub fn restaurant_natural_key(row: &SourceRow) -> RestaurantKey {
    (
        normalize_label(row.organization.as_deref()),
        normalize_field(row.phone.as_deref()),
        normalize_field(row.auxiliary.as_deref()),
    )
}

/// Build `dim_time` from the raw timestamp column. Unparseable timestamps
/// are dropped with one aggregated diagnostic; deduplication is by exact
/// instant, not calendar day. Instants present in `stored` keep their stored
/// key and produce no new row.
pub fn build_time_dimension(
    rows: &[SourceRow],
    stored: &HashMap<NaiveDateTime, i64>,
    start_key: i64,
) -> (Vec<TimeRow>, HashMap<NaiveDateTime, i64>) {
    let mut out = Vec::new();
    let mut lookup = stored.clone();
    let mut unparseable = 0usize;

    for row in rows {
        let Some(raw) = row.time_gmt.as_deref().map(str::trim) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }
        let Some(instant) = row.parsed_timestamp() else {
            unparseable += 1;
            continue;
        };
        if lookup.contains_key(&instant) {
            continue;
        }
        let time_key = start_key + out.len() as i64 + 1;
        out.push(TimeRow {
            time_key,
            full_timestamp: instant,
            date_actual: instant.date(),
            year: instant.year(),
            month: instant.month() as i32,
            week_of_year: instant.iso_week().week() as i32,
            day_of_month: instant.day() as i32,
            day_of_week: instant.weekday().number_from_monday() as i32,
            day_name: instant.format("%A").to_string(),
        });
        lookup.insert(instant, time_key);
    }

    if unparseable > 0 {
        eprintln!(
            "Warning: {} rows with unparseable timestamps dropped from dim_time",
            unparseable
        );
    }
    (out, lookup)
}

/// Build `dim_location`. Absent fields are normalized to the sentinel before
/// deduplication, so two locations differing only in which field was missing
/// are conflated only when their full normalized tuples match.
pub fn build_location_dimension(
    rows: &[SourceRow],
    stored: &HashMap<LocationKey, i64>,
    start_key: i64,
) -> (Vec<LocationRow>, HashMap<LocationKey, i64>) {
    let mut out = Vec::new();
    let mut lookup = stored.clone();

    for row in rows {
        let natural_key = location_natural_key(row);
        if lookup.contains_key(&natural_key) {
            continue;
        }
        let location_key = start_key + out.len() as i64 + 1;
        out.push(LocationRow {
            location_key,
            country: normalize_field(row.country.as_deref()),
            country_code: normalize_field(row.country_code.as_deref()),
            state: normalize_field(row.state.as_deref()),
            city: normalize_field(row.city.as_deref()),
            street: normalize_field(row.street.as_deref()),
            building: normalize_field(row.building.as_deref()),
        });
        lookup.insert(natural_key, location_key);
    }
    (out, lookup)
}

/// Build `dim_restaurant` from the (organization, phone, auxiliary) tuple.
pub fn build_restaurant_dimension(
    rows: &[SourceRow],
    stored: &HashMap<RestaurantKey, i64>,
    start_key: i64,
) -> (Vec<RestaurantRow>, HashMap<RestaurantKey, i64>) {
    let mut out = Vec::new();
    let mut lookup = stored.clone();

    for row in rows {
        let natural_key = restaurant_natural_key(row);
        if lookup.contains_key(&natural_key) {
            continue;
        }
        let restaurant_key = start_key + out.len() as i64 + 1;
        out.push(RestaurantRow {
            restaurant_key,
            organization_name: normalize_label(row.organization.as_deref()),
            phone_number: normalize_field(row.phone.as_deref()),
            auxiliary_info: normalize_field(row.auxiliary.as_deref()),
        });
        lookup.insert(natural_key, restaurant_key);
    }
    (out, lookup)
}

/// Build `dim_category` from the category label column.
pub fn build_category_dimension(
    rows: &[SourceRow],
    stored: &HashMap<String, i64>,
    start_key: i64,
) -> (Vec<CategoryRow>, HashMap<String, i64>) {
    let mut out = Vec::new();
    let mut lookup = stored.clone();

    for row in rows {
        let category_name = normalize_label(row.category.as_deref());
        if lookup.contains_key(&category_name) {
            continue;
        }
        let category_key = start_key + out.len() as i64 + 1;
        out.push(CategoryRow {
            category_key,
            category_name: category_name.clone(),
        });
        lookup.insert(category_name, category_key);
    }
    (out, lookup)
}
