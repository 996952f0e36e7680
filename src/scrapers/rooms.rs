use crate::config::SiteConfig;
use crate::scrapers::traits::RoomRateSource;
use crate::scrapers::types::StayWindow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, ORIGIN, REFERER};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

/// Ostrovok hotel-page search API client
pub struct OstrovokRoomClient {
    client: Client,
    api_url: String,
    region_id: u64,
    currency: String,
    language: String,
}

impl OstrovokRoomClient {
    /// `cookies` are sent with every request, as the site only answers
    /// clients that look like a browser session.
    pub fn new(site: &SiteConfig, cookies: &[(String, String)]) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&site.home_url).context("Invalid origin")?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}/", site.home_url.trim_end_matches('/')))
                .context("Invalid referer")?,
        );
        if let Some(cookie) = cookie_header(cookies) {
            headers.insert(COOKIE, HeaderValue::from_str(&cookie).context("Invalid cookie value")?);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(site.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: site.rooms_api_url.clone(),
            region_id: site.region_id,
            currency: site.currency.clone(),
            language: site.language.clone(),
        })
    }

    fn payload(&self, hotel_slug: &str, stay: &StayWindow, adults: u32) -> Value {
        json!({
            "arrival_date": stay.arrival.format("%Y-%m-%d").to_string(),
            "departure_date": stay.departure.format("%Y-%m-%d").to_string(),
            "hotel": hotel_slug,
            "currency": self.currency,
            "lang": self.language,
            "region_id": self.region_id,
            "paxes": [{ "adults": adults }],
            "search_uuid": Uuid::new_v4().to_string(),
        })
    }
}

#[async_trait]
impl RoomRateSource for OstrovokRoomClient {
    async fn fetch_rates(
        &self,
        hotel_slug: &str,
        stay: &StayWindow,
        adults: u32,
    ) -> Result<Option<Value>> {
        debug!(hotel = hotel_slug, "Requesting rates");

        let response = self
            .client
            .post(&self.api_url)
            .json(&self.payload(hotel_slug, stay, adults))
            .send()
            .await
            .context("Failed to fetch hotel rates")?;

        if !response.status().is_success() {
            warn!(hotel = hotel_slug, status = %response.status(), "Rates request rejected");
            return Ok(None);
        }

        let body = response
            .json::<Value>()
            .await
            .context("Failed to read rates response body")?;
        Ok(Some(body))
    }

    fn source_name(&self) -> &'static str {
        "Ostrovok"
    }
}

/// Hotel slug from a detail URL: its last non-empty path segment
pub fn hotel_slug(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

fn cookie_header(cookies: &[(String, String)]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn slug_is_last_path_segment() {
        assert_eq!(
            hotel_slug("https://ostrovok.ru/hotel/russia/irkutsk/mid77/baikal_inn/").as_deref(),
            Some("baikal_inn")
        );
        assert_eq!(
            hotel_slug("https://ostrovok.ru/hotel/russia/irkutsk/mid77/baikal_inn?x=1").as_deref(),
            Some("baikal_inn")
        );
        assert_eq!(hotel_slug("https://ostrovok.ru/"), None);
        assert_eq!(hotel_slug("not a url"), None);
    }

    #[test]
    fn cookies_join_into_one_header() {
        let cookies = vec![
            ("uid".to_string(), "abc".to_string()),
            ("lang".to_string(), "ru".to_string()),
        ];
        assert_eq!(cookie_header(&cookies).as_deref(), Some("uid=abc; lang=ru"));
        assert_eq!(cookie_header(&[]), None);
    }

    #[test]
    fn payload_carries_stay_and_party() {
        let client = OstrovokRoomClient::new(&SiteConfig::default(), &[]).unwrap();
        let stay = StayWindow::rolling(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        let payload = client.payload("baikal_inn", &stay, 2);

        assert_eq!(payload["arrival_date"], "2025-06-02");
        assert_eq!(payload["departure_date"], "2025-06-03");
        assert_eq!(payload["hotel"], "baikal_inn");
        assert_eq!(payload["region_id"], 965821539u64);
        assert_eq!(payload["paxes"][0]["adults"], 2);
        assert_eq!(payload["search_uuid"].as_str().unwrap().len(), 36);
    }
}
