//! Turns captured search and detail payloads into records.
//!
//! Both entry points are total: a malformed payload yields an empty result
//! and a log line, never an error for the caller.

use crate::models::{ListingRecord, Price, RateQuote};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Why a whole payload was rejected
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("payload has no `{0}` field")]
    MissingField(&'static str),
    #[error("`{field}` is {found}, expected an array or object")]
    NotACollection { field: &'static str, found: &'static str },
}

/// Extracts listing records from search endpoint responses
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    city_fallback: String,
    detail_url_template: String,
}

impl ListingExtractor {
    pub fn new(detail_url_template: impl Into<String>) -> Self {
        Self {
            city_fallback: String::new(),
            detail_url_template: detail_url_template.into(),
        }
    }

    /// City used when an entry does not name one
    pub fn with_city_fallback(mut self, city: impl Into<String>) -> Self {
        self.city_fallback = city.into();
        self
    }

    pub fn extract(&self, payload: &Value) -> Vec<ListingRecord> {
        match collection(payload, "hotels") {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|entry| self.extract_entry(entry))
                .collect(),
            Err(err) => {
                debug!(error = %err, "Dropping search payload");
                Vec::new()
            }
        }
    }

    fn extract_entry(&self, entry: &Value) -> Option<ListingRecord> {
        let static_vm = entry.get("static_vm").and_then(Value::as_object)?;
        if static_vm.is_empty() {
            return None;
        }

        let external_id = text(entry.get("ota_hotel_id"));
        let name = text(static_vm.get("name"));
        if external_id.is_empty() || name.is_empty() {
            debug!(external_id = %external_id, "Skipping hotel without id or name");
            return None;
        }

        let parent_id = first_text(&[entry.get("master_id"), static_vm.get("master_id")]);
        let url = self
            .detail_url_template
            .replace("{parent_id}", &parent_id)
            .replace("{external_id}", &external_id);

        let mut city = text(static_vm.get("city"));
        if city.is_empty() {
            city = self.city_fallback.clone();
        }

        Some(ListingRecord {
            city,
            external_id,
            parent_id,
            name,
            name_localized: text(static_vm.get("name_en")),
            address: text(static_vm.get("address")),
            url,
            room_count: text(static_vm.get("rooms_number")),
        })
    }
}

/// Flattens a hotel detail response into one quote per room of each rate.
///
/// A rate without rooms yields a single rate-level quote with no group key.
pub fn extract_rate_quotes(payload: &Value) -> Vec<RateQuote> {
    let Some(hotel) = payload.as_object() else {
        debug!("Dropping detail payload: not an object");
        return Vec::new();
    };
    let external_id = text(hotel.get("ota_hotel_id"));
    let parent_id = text(hotel.get("master_id"));

    let rates = match collection(payload, "rates") {
        Ok(rates) => rates,
        Err(err) => {
            debug!(external_id = %external_id, error = %err, "No rates in detail payload");
            return Vec::new();
        }
    };

    let mut quotes = Vec::new();
    for rate in rates {
        let price = rate_price(rate);
        let rooms = rate
            .get("rooms")
            .and_then(Value::as_array)
            .filter(|rooms| !rooms.is_empty());

        match rooms {
            Some(rooms) => {
                for room in rooms {
                    quotes.push(room_quote(&external_id, &parent_id, room, price));
                }
            }
            None => {
                let mut quote = room_quote(&external_id, &parent_id, rate, price);
                quote.group_key = None;
                quotes.push(quote);
            }
        }
    }
    quotes
}

fn room_quote(external_id: &str, parent_id: &str, room: &Value, price: Price) -> RateQuote {
    let trans = room
        .get("room_data_trans")
        .and_then(|t| t.get("ru"))
        .and_then(Value::as_object);
    let bedding_type = trans.map(|t| text(t.get("bedding_type"))).unwrap_or_default();
    let multi_bed_data = room.get("multi_bed_data").cloned().unwrap_or(Value::Null);
    let group_key = Some(text(room.get("rg_hash"))).filter(|k| !k.is_empty());

    RateQuote {
        external_id: external_id.to_string(),
        parent_id: parent_id.to_string(),
        room_name: text(room.get("room_name")),
        group_key,
        available_units: count(room.get("allotment")),
        bed_descriptors: bed_descriptors(&bedding_type, &multi_bed_data),
        bedding_type,
        bed_detail_data: room.get("bed_places").cloned().unwrap_or(Value::Null),
        multi_bed_data,
        price,
    }
}

/// First payment type's amount, else its display amount
fn rate_price(rate: &Value) -> Price {
    let Some(first) = rate
        .get("payment_options")
        .and_then(|p| p.get("payment_types"))
        .and_then(Value::as_array)
        .and_then(|types| types.first())
    else {
        return Price::MISSING;
    };

    let amount = first.get("amount").map(Price::from_json).unwrap_or_default();
    if amount.is_missing() {
        first.get("show_amount").map(Price::from_json).unwrap_or_default()
    } else {
        amount
    }
}

/// Bed names fed to the capacity estimator: the bedding type plus any bed
/// names carried by the multi-bed variants.
fn bed_descriptors(bedding_type: &str, multi_bed_data: &Value) -> Vec<String> {
    let mut beds = Vec::new();
    if !bedding_type.is_empty() {
        beds.push(bedding_type.to_string());
    }
    if let Some(variants) = multi_bed_data.as_array() {
        for variant in variants {
            let name = match variant {
                Value::String(s) => s.clone(),
                Value::Object(o) => {
                    first_text(&[o.get("name"), o.get("title"), o.get("bedding_type")])
                }
                _ => String::new(),
            };
            if !name.is_empty() && !beds.contains(&name) {
                beds.push(name);
            }
        }
    }
    beds
}

fn collection<'a>(payload: &'a Value, field: &'static str) -> Result<Vec<&'a Value>, PayloadError> {
    match payload.get(field) {
        None | Some(Value::Null) => Err(PayloadError::MissingField(field)),
        Some(Value::Array(items)) => Ok(items.iter().collect()),
        Some(item @ Value::Object(_)) => Ok(vec![item]),
        Some(other) => Err(PayloadError::NotACollection {
            field,
            found: kind(other),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Scalar JSON as text; null, absent and compound values become ""
pub(crate) fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn first_text(candidates: &[Option<&Value>]) -> String {
    candidates
        .iter()
        .map(|v| text(*v))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn count(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().map(|v| v.min(u32::MAX as u64) as u32).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEMPLATE: &str = "https://ostrovok.ru/hotel/russia/irkutsk/mid{parent_id}/{external_id}";

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(TEMPLATE)
    }

    fn hotel(id: &str, name: &str) -> Value {
        json!({
            "ota_hotel_id": id,
            "master_id": 77,
            "static_vm": {
                "name": name,
                "name_en": format!("{name} EN"),
                "city": "Иркутск",
                "address": "ул. Ленина, 1",
                "rooms_number": 40
            }
        })
    }

    #[test]
    fn missing_or_empty_collection_yields_nothing() {
        assert!(extractor().extract(&json!({})).is_empty());
        assert!(extractor().extract(&json!({ "hotels": [] })).is_empty());
        assert!(extractor().extract(&json!({ "hotels": null })).is_empty());
        assert!(extractor().extract(&json!({ "hotels": "oops" })).is_empty());
        assert!(extractor().extract(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn builds_full_record() {
        let records = extractor().extract(&json!({ "hotels": [hotel("baikal_inn", "Байкал")] }));
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.external_id, "baikal_inn");
        assert_eq!(r.parent_id, "77");
        assert_eq!(r.name, "Байкал");
        assert_eq!(r.name_localized, "Байкал EN");
        assert_eq!(r.city, "Иркутск");
        assert_eq!(r.room_count, "40");
        assert_eq!(r.url, "https://ostrovok.ru/hotel/russia/irkutsk/mid77/baikal_inn");
    }

    #[test]
    fn drops_only_entries_without_identity() {
        let payload = json!({ "hotels": [
            hotel("a", "A"),
            hotel("", "No id"),
            hotel("c", ""),
            { "ota_hotel_id": "d" },
            { "ota_hotel_id": "e", "static_vm": {} },
            hotel("f", "F"),
        ]});
        let ids: Vec<_> = extractor()
            .extract(&payload)
            .into_iter()
            .map(|r| r.external_id)
            .collect();
        assert_eq!(ids, vec!["a", "f"]);
    }

    #[test]
    fn single_object_is_one_entry() {
        let records = extractor().extract(&json!({ "hotels": hotel("solo", "Solo") }));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn parent_id_falls_back_to_static_view() {
        let payload = json!({ "hotels": [{
            "ota_hotel_id": "x",
            "master_id": null,
            "static_vm": { "name": "X", "master_id": "900" }
        }]});
        let records = extractor().extract(&payload);
        assert_eq!(records[0].parent_id, "900");
        assert!(records[0].url.ends_with("/mid900/x"));
    }

    #[test]
    fn absent_fields_default_to_empty_strings() {
        let payload = json!({ "hotels": [{ "ota_hotel_id": "x", "static_vm": { "name": "X" } }] });
        let r = &extractor().extract(&payload)[0];
        assert_eq!(r.parent_id, "");
        assert_eq!(r.address, "");
        assert_eq!(r.name_localized, "");
        assert_eq!(r.room_count, "");
        assert_eq!(r.city, "");
    }

    #[test]
    fn city_fallback_applies_when_missing() {
        let payload = json!({ "hotels": [{ "ota_hotel_id": "x", "static_vm": { "name": "X" } }] });
        let records = extractor().with_city_fallback("Иркутск").extract(&payload);
        assert_eq!(records[0].city, "Иркутск");
    }

    fn detail() -> Value {
        json!({
            "ota_hotel_id": "baikal_inn",
            "master_id": 77,
            "rates": [
                {
                    "payment_options": { "payment_types": [{ "amount": "1000.00" }] },
                    "rooms": [{
                        "room_name": "Стандарт двухместный",
                        "rg_hash": "h1",
                        "allotment": 3,
                        "room_data_trans": { "ru": { "bedding_type": "двуспальная кровать" } },
                        "bed_places": { "main_count": 2, "extra_count": 0 },
                        "multi_bed_data": [{ "name": "2 отдельные кровати" }]
                    }]
                },
                {
                    "payment_options": { "payment_types": [{ "show_amount": 1500 }] },
                    "room_name": "Без комнат"
                }
            ]
        })
    }

    #[test]
    fn flattens_rooms_of_rates() {
        let quotes = extract_rate_quotes(&detail());
        assert_eq!(quotes.len(), 2);

        let q = &quotes[0];
        assert_eq!(q.external_id, "baikal_inn");
        assert_eq!(q.parent_id, "77");
        assert_eq!(q.group_key.as_deref(), Some("h1"));
        assert_eq!(q.available_units, 3);
        assert_eq!(q.price.value(), Some(1000.0));
        assert_eq!(q.bedding_type, "двуспальная кровать");
        assert_eq!(
            q.bed_descriptors,
            vec!["двуспальная кровать".to_string(), "2 отдельные кровати".to_string()]
        );
        assert_eq!(q.bed_detail_data["main_count"], 2);

        let rate_level = &quotes[1];
        assert_eq!(rate_level.group_key, None);
        assert_eq!(rate_level.room_name, "Без комнат");
        assert_eq!(rate_level.price.value(), Some(1500.0));
    }

    #[test]
    fn malformed_detail_payload_yields_nothing() {
        assert!(extract_rate_quotes(&json!("nope")).is_empty());
        assert!(extract_rate_quotes(&json!({ "ota_hotel_id": "x" })).is_empty());
        assert!(extract_rate_quotes(&json!({ "ota_hotel_id": "x", "rates": 5 })).is_empty());
    }

    #[test]
    fn classifies_rejections() {
        assert_eq!(
            collection(&json!({}), "hotels").unwrap_err(),
            PayloadError::MissingField("hotels")
        );
        assert_eq!(
            collection(&json!({ "hotels": 1 }), "hotels").unwrap_err(),
            PayloadError::NotACollection { field: "hotels", found: "a number" }
        );
    }
}
