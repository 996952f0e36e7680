use crate::models::{HotelStatistic, ListingRecord, Price, RoomRateGroup};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct RoomTotals {
    available_units: u32,
    capacity: u32,
    price_min: Price,
}

/// Joins one day's listings against its room groups by external id.
///
/// Every listed hotel gets a row, even without room data. Availability is
/// not clamped: a source reporting more free units than rooms shows > 100.
pub fn compute_statistics(
    listings: &[ListingRecord],
    groups: &[RoomRateGroup],
    date: NaiveDate,
) -> Vec<HotelStatistic> {
    let mut totals: HashMap<&str, RoomTotals> = HashMap::new();
    for group in groups.iter().filter(|g| !g.external_id.is_empty()) {
        let entry = totals.entry(group.external_id.as_str()).or_default();
        entry.available_units = entry.available_units.saturating_add(group.available_units);
        if group.available_units > 0 && group.capacity_per_unit > 0 {
            let capacity = group.available_units.saturating_mul(group.capacity_per_unit);
            entry.capacity = entry.capacity.saturating_add(capacity);
        }
        entry.price_min = entry.price_min.lower(group.price_min);
    }

    let mut seen = HashSet::new();
    listings
        .iter()
        .filter(|l| !l.external_id.is_empty())
        .filter(|l| seen.insert(l.external_id.as_str()))
        .map(|listing| {
            let room_count = listing.room_count();
            let rooms = totals.get(listing.external_id.as_str());
            let available_units_total = rooms.map(|r| r.available_units).unwrap_or(0);

            HotelStatistic {
                external_id: listing.external_id.clone(),
                name: listing.name.clone(),
                room_count,
                available_units_total,
                capacity_total: rooms.map(|r| r.capacity).unwrap_or(0),
                availability_percent: availability_percent(available_units_total, room_count),
                date,
                price_min: rooms.map(|r| r.price_min).unwrap_or_default(),
            }
        })
        .collect()
}

/// Percentage rounded to two decimals; 0 when the room count is unknown
pub fn availability_percent(available: u32, room_count: u32) -> f64 {
    if room_count == 0 {
        return 0.0;
    }
    let percent = f64::from(available) / f64::from(room_count) * 100.0;
    (percent * 100.0).round() / 100.0
}
