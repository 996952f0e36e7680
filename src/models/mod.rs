use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One hotel as returned by the search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(default)]
    pub city: String,
    pub external_id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_localized: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub room_count: String,
}

impl ListingRecord {
    /// Natural identity of a listing across pages
    pub fn key(&self) -> (&str, &str) {
        (&self.external_id, &self.parent_id)
    }

    /// Declared room count, 0 when missing or unparsable
    pub fn room_count(&self) -> u32 {
        self.room_count.trim().parse().unwrap_or(0)
    }
}

/// A quoted price that may be missing.
///
/// Folding rules: for a lower bound a missing price acts as `+inf`, for an
/// upper bound as `-inf`, so it never wins against a present price.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Price(Option<f64>);

impl Price {
    pub const MISSING: Price = Price(None);

    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Price(Some(value))
        } else {
            Price(None)
        }
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_missing(self) -> bool {
        self.0.is_none()
    }

    /// Accepts JSON numbers and numeric strings; anything else is missing
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map(Price::new).unwrap_or_default(),
            Value::String(s) => Price::parse(s),
            _ => Price::MISSING,
        }
    }

    pub fn parse(text: &str) -> Self {
        text.trim().parse::<f64>().map(Price::new).unwrap_or_default()
    }

    pub fn lower(self, other: Price) -> Price {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Price(Some(a.min(b))),
            (Some(_), None) => self,
            (None, _) => other,
        }
    }

    pub fn upper(self, other: Price) -> Price {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Price(Some(a.max(b))),
            (Some(_), None) => self,
            (None, _) => other,
        }
    }

    /// Two-decimal text, empty when missing
    pub fn to_cell(self) -> String {
        self.value().map(|v| format!("{:.2}", v)).unwrap_or_default()
    }
}

/// One room entry of one rate inside a hotel's detail response
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub external_id: String,
    pub parent_id: String,
    pub room_name: String,
    pub group_key: Option<String>,
    pub available_units: u32,
    pub bedding_type: String,
    pub bed_descriptors: Vec<String>,
    pub bed_detail_data: Value,
    pub multi_bed_data: Value,
    pub price: Price,
}

/// Price quotes for one room configuration of one hotel
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRateGroup {
    pub external_id: String,
    pub parent_id: String,
    pub room_name: String,
    pub group_key: String,
    pub occurrence_count: u32,
    pub available_units: u32,
    pub bedding_type: String,
    pub bed_descriptors: Vec<String>,
    pub bed_detail_data: Value,
    pub multi_bed_data: Value,
    pub capacity_per_unit: u32,
    pub price_min: Price,
    pub price_max: Price,
    pub url: String,
}

/// Per-hotel occupancy rollup for one day
#[derive(Debug, Clone, PartialEq)]
pub struct HotelStatistic {
    pub external_id: String,
    pub name: String,
    pub room_count: u32,
    pub available_units_total: u32,
    pub capacity_total: u32,
    pub availability_percent: f64,
    pub date: chrono::NaiveDate,
    pub price_min: Price,
}
