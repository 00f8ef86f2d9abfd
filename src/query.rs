//! Listing query engine.
//!
//! Turns a fully loaded vehicle collection plus a [`QuerySpec`] into the
//! ordered view shown to buyers. Stages run in a fixed order: text search,
//! category match, price range, then sort. The engine only borrows its
//! inputs and never performs I/O.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::VehicleRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    /// Keep the order the records arrived in.
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    Newest,
}

impl SortMode {
    /// Parses a sort key from the listing view. Unrecognized keys fall back
    /// to [`SortMode::Default`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "price-low" | "price-asc" => SortMode::PriceAsc,
            "price-high" | "price-desc" => SortMode::PriceDesc,
            "newest" => SortMode::Newest,
            "featured" | "relevance" | "default" | "" => SortMode::Default,
            other => {
                tracing::debug!("Unrecognized sort mode '{}', using default order", other);
                SortMode::Default
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub term: String,
    pub categories: Vec<String>,
    pub price_min: u64,
    pub price_max: u64,
    pub sort: SortMode,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            term: String::new(),
            categories: Vec::new(),
            price_min: 0,
            price_max: u64::MAX,
            sort: SortMode::Default,
        }
    }
}

impl QuerySpec {
    /// Trims the term, drops blank categories and clamps `price_min` down to
    /// `price_max`.
    pub fn normalized(mut self) -> Self {
        self.term = self.term.trim().to_string();
        self.categories = self
            .categories
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self.price_min = self.price_min.min(self.price_max);
        self
    }
}

/// Runs the full pipeline. The result borrows from `records` and keeps every
/// retained record exactly once.
pub fn apply<'a>(records: &'a [VehicleRecord], spec: &QuerySpec) -> Vec<&'a VehicleRecord> {
    let spec = spec.clone().normalized();

    let term = spec.term.to_lowercase();
    let categories: Vec<String> = spec.categories.iter().map(|c| c.to_lowercase()).collect();

    let retained: Vec<&VehicleRecord> = records
        .iter()
        .filter(|record| matches_term(record, &term))
        .filter(|record| matches_category(record, &categories))
        .filter(|record| within_price(record, spec.price_min, spec.price_max))
        .collect();

    sort_records(retained, spec.sort)
}

fn matches_term(record: &VehicleRecord, term: &str) -> bool {
    term.is_empty()
        || record.brand.to_lowercase().contains(term)
        || record.model.to_lowercase().contains(term)
        || record.description.to_lowercase().contains(term)
}

fn matches_category(record: &VehicleRecord, categories: &[String]) -> bool {
    if categories.is_empty() {
        return true;
    }
    let tag = record.vehicle_type.to_lowercase();
    categories.iter().any(|c| tag.contains(c.as_str()))
}

// Records without a usable price never pass
fn within_price(record: &VehicleRecord, min: u64, max: u64) -> bool {
    record.price.is_some_and(|price| (min..=max).contains(&price))
}

// `sort_by` is stable, so ties keep their relative input order in every mode
fn sort_records(mut records: Vec<&VehicleRecord>, mode: SortMode) -> Vec<&VehicleRecord> {
    match mode {
        SortMode::Default => records,
        SortMode::PriceAsc => {
            records.sort_by_key(|r| r.price);
            records
        }
        SortMode::PriceDesc => {
            records.sort_by(|a, b| b.price.cmp(&a.price));
            records
        }
        SortMode::Newest => {
            // Parse each timestamp once
            let mut keyed: Vec<(Option<DateTime<Utc>>, &VehicleRecord)> =
                records.into_iter().map(|r| (r.created_at(), r)).collect();
            keyed.sort_by(|(a, _), (b, _)| newest_first(a, b));
            keyed.into_iter().map(|(_, r)| r).collect()
        }
    }
}

fn newest_first(a: &Option<DateTime<Utc>>, b: &Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
