//! Day-partitioned CSV tables.
//!
//! Files are UTF-8 with a byte-order mark, comma separated, with a header
//! row and quoting only where needed.

use crate::models::{HotelStatistic, ListingRecord, Price, RoomRateGroup};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const BOM: &str = "\u{feff}";

const LISTING_COLUMNS: &[&str] = &[
    "city",
    "external_id",
    "parent_id",
    "name",
    "name_localized",
    "address",
    "url",
    "room_count",
];

const ROOM_GROUP_COLUMNS: &[&str] = &[
    "external_id",
    "parent_id",
    "room_name",
    "group_key",
    "occurrence_count",
    "available_units",
    "bedding_type",
    "bed_descriptors",
    "bed_detail_data",
    "multi_bed_data",
    "capacity_per_unit",
    "price_min",
    "price_max",
    "url",
];

const STATISTIC_COLUMNS: &[&str] = &[
    "external_id",
    "name",
    "room_count",
    "available_units_total",
    "availability_percent",
    "capacity_total",
    "date",
    "price_min",
];

/// Where each table lives for a given day
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn hotels(&self, date: NaiveDate) -> PathBuf {
        self.table("hotels", date)
    }

    pub fn rooms(&self, date: NaiveDate) -> PathBuf {
        self.table("rooms", date)
    }

    pub fn statistics(&self, date: NaiveDate) -> PathBuf {
        self.table("statistics", date)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    fn table(&self, name: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join("tables")
            .join(name)
            .join(format!("{}.csv", date.format("%Y-%m-%d")))
    }
}

/// Flat CSV shape of a room group; JSON columns hold compact JSON text.
/// Field order must follow `ROOM_GROUP_COLUMNS`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RoomGroupRow {
    external_id: String,
    #[serde(default)]
    parent_id: String,
    #[serde(default)]
    room_name: String,
    #[serde(default)]
    group_key: String,
    #[serde(default)]
    occurrence_count: String,
    #[serde(default)]
    available_units: String,
    #[serde(default)]
    bedding_type: String,
    #[serde(default)]
    bed_descriptors: String,
    #[serde(default)]
    bed_detail_data: String,
    #[serde(default)]
    multi_bed_data: String,
    #[serde(default)]
    capacity_per_unit: String,
    #[serde(default)]
    price_min: String,
    #[serde(default)]
    price_max: String,
    #[serde(default)]
    url: String,
}

impl From<&RoomRateGroup> for RoomGroupRow {
    fn from(group: &RoomRateGroup) -> Self {
        Self {
            external_id: group.external_id.clone(),
            parent_id: group.parent_id.clone(),
            room_name: group.room_name.clone(),
            group_key: group.group_key.clone(),
            occurrence_count: group.occurrence_count.to_string(),
            available_units: group.available_units.to_string(),
            bedding_type: group.bedding_type.clone(),
            bed_descriptors: json_cell(
                &serde_json::to_value(&group.bed_descriptors).unwrap_or(Value::Null),
            ),
            bed_detail_data: json_cell(&group.bed_detail_data),
            multi_bed_data: json_cell(&group.multi_bed_data),
            capacity_per_unit: group.capacity_per_unit.to_string(),
            price_min: group.price_min.to_cell(),
            price_max: group.price_max.to_cell(),
            url: group.url.clone(),
        }
    }
}

impl From<RoomGroupRow> for RoomRateGroup {
    /// Lenient: unparsable numbers become 0 and bad JSON becomes null
    fn from(row: RoomGroupRow) -> Self {
        Self {
            external_id: row.external_id,
            parent_id: row.parent_id,
            room_name: row.room_name,
            group_key: row.group_key,
            occurrence_count: row.occurrence_count.trim().parse().unwrap_or(0),
            available_units: row.available_units.trim().parse().unwrap_or(0),
            bedding_type: row.bedding_type,
            bed_descriptors: serde_json::from_str(&row.bed_descriptors).unwrap_or_default(),
            bed_detail_data: parse_json_cell(&row.bed_detail_data),
            multi_bed_data: parse_json_cell(&row.multi_bed_data),
            capacity_per_unit: row.capacity_per_unit.trim().parse().unwrap_or(0),
            price_min: Price::parse(&row.price_min),
            price_max: Price::parse(&row.price_max),
            url: row.url,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatisticRow<'a> {
    external_id: &'a str,
    name: &'a str,
    room_count: u32,
    available_units_total: u32,
    availability_percent: f64,
    capacity_total: u32,
    date: String,
    price_min: String,
}

impl<'a> From<&'a HotelStatistic> for StatisticRow<'a> {
    fn from(stat: &'a HotelStatistic) -> Self {
        Self {
            external_id: &stat.external_id,
            name: &stat.name,
            room_count: stat.room_count,
            available_units_total: stat.available_units_total,
            availability_percent: stat.availability_percent,
            capacity_total: stat.capacity_total,
            date: stat.date.format("%Y-%m-%d").to_string(),
            price_min: stat.price_min.to_cell(),
        }
    }
}

fn json_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Array(items) if items.is_empty() => String::new(),
        other => other.to_string(),
    }
}

fn parse_json_cell(cell: &str) -> Value {
    if cell.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(cell).unwrap_or(Value::Null)
}

pub fn write_listings(path: &Path, records: &[ListingRecord]) -> Result<()> {
    write_table(path, LISTING_COLUMNS, records.iter())
}

pub fn read_listings(path: &Path) -> Result<Vec<ListingRecord>> {
    read_table(path)
}

pub fn write_room_groups(path: &Path, groups: &[RoomRateGroup]) -> Result<()> {
    write_table(path, ROOM_GROUP_COLUMNS, groups.iter().map(RoomGroupRow::from))
}

pub fn read_room_groups(path: &Path) -> Result<Vec<RoomRateGroup>> {
    let rows: Vec<RoomGroupRow> = read_table(path)?;
    Ok(rows.into_iter().map(RoomRateGroup::from).collect())
}

pub fn write_statistics(path: &Path, stats: &[HotelStatistic]) -> Result<()> {
    write_table(path, STATISTIC_COLUMNS, stats.iter().map(StatisticRow::from))
}

/// Writes `columns` as the header even when there are no rows
fn write_table<T, I>(path: &Path, columns: &[&str], rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let mut buffer = BOM.as_bytes().to_vec();
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b',')
            .quote_style(csv::QuoteStyle::Necessary)
            .has_headers(false)
            .from_writer(&mut buffer);
        writer.write_record(columns).context("Failed to write CSV header")?;
        for row in rows {
            writer.serialize(row).context("Failed to encode CSV row")?;
        }
        writer.flush().context("Failed to flush CSV writer")?;
    }

    fs::write(path, buffer).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let text = text.strip_prefix(BOM).unwrap_or(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .from_reader(text.as_bytes());

    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("Bad row {} in {}", i + 2, path.display())))
        .collect()
}
