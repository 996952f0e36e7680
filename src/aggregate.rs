//! Listing dedup and room-rate grouping

use crate::capacity::CapacityEstimator;
use crate::models::{ListingRecord, RateQuote, RoomRateGroup};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Result of the top-level listing dedup
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated {
    pub records: Vec<ListingRecord>,
    pub removed: usize,
}

/// Keeps the first record seen for each `(external_id, parent_id)`
pub fn dedup_listings(records: Vec<ListingRecord>) -> Deduplicated {
    let total = records.len();
    let mut seen = HashSet::with_capacity(total);
    let records: Vec<ListingRecord> = records
        .into_iter()
        .filter(|r| {
            let (id, parent) = r.key();
            seen.insert((id.to_owned(), parent.to_owned()))
        })
        .collect();

    Deduplicated {
        removed: total - records.len(),
        records,
    }
}

/// Result of grouping one hotel's rate quotes
#[derive(Debug, Clone, PartialEq)]
pub struct Grouped {
    pub groups: Vec<RoomRateGroup>,
    /// Quotes dropped for lacking a group key
    pub ungrouped: usize,
}

/// Folds rate quotes into groups keyed by their content hash.
///
/// Groups come out in first-seen order. `url` is stamped on every group.
pub fn group_rate_quotes<E>(quotes: Vec<RateQuote>, estimator: &E, url: &str) -> Grouped
where
    E: CapacityEstimator + ?Sized,
{
    let mut groups: Vec<RoomRateGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut ungrouped = 0;

    for quote in quotes {
        let Some(key) = quote.group_key.clone() else {
            ungrouped += 1;
            continue;
        };

        match index.get(&key) {
            Some(&slot) => {
                let group = &mut groups[slot];
                group.occurrence_count += 1;
                group.price_min = group.price_min.lower(quote.price);
                group.price_max = group.price_max.upper(quote.price);
                group.available_units = group.available_units.max(quote.available_units);
            }
            None => {
                let capacity_per_unit =
                    estimator.estimate(&quote.room_name, &quote.bed_descriptors);
                index.insert(key.clone(), groups.len());
                groups.push(RoomRateGroup {
                    external_id: quote.external_id,
                    parent_id: quote.parent_id,
                    room_name: quote.room_name,
                    group_key: key,
                    occurrence_count: 1,
                    available_units: quote.available_units,
                    bedding_type: quote.bedding_type,
                    bed_descriptors: quote.bed_descriptors,
                    bed_detail_data: quote.bed_detail_data,
                    multi_bed_data: quote.multi_bed_data,
                    capacity_per_unit,
                    price_min: quote.price,
                    price_max: quote.price,
                    url: url.to_string(),
                });
            }
        }
    }

    if ungrouped > 0 {
        debug!(ungrouped, groups = groups.len(), "Dropped quotes without group key");
    }

    Grouped { groups, ungrouped }
}
