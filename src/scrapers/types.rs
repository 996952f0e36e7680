use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use url::Url;

/// Arrival/departure pair for the surveyed stay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayWindow {
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
}

impl StayWindow {
    /// One-night stay starting the day after `run_date`
    pub fn rolling(run_date: NaiveDate) -> Self {
        let arrival = run_date.checked_add_days(Days::new(1)).unwrap_or(run_date);
        let departure = arrival.checked_add_days(Days::new(1)).unwrap_or(arrival);
        Self { arrival, departure }
    }

    /// `DD.MM.YYYY-DD.MM.YYYY`, as the search page expects
    pub fn search_dates(&self) -> String {
        format!(
            "{}-{}",
            self.arrival.format("%d.%m.%Y"),
            self.departure.format("%d.%m.%Y")
        )
    }
}

/// Search parameters for the hotel listing crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub base_url: String,
    pub region_id: u64,
    pub stay: StayWindow,
    pub guests: u32,
}

impl SearchParams {
    /// Page 1 URL of the search
    pub fn search_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid search base URL: {}", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("type_group", "hotel")
            .append_pair("search", "yes")
            .append_pair("dates", &self.stay.search_dates())
            .append_pair("guests", &self.guests.to_string())
            .append_pair("q", &self.region_id.to_string());
        Ok(url)
    }
}

/// URL of page `page` of a search; page 1 is the base URL itself
pub fn page_url(base: &Url, page: u32) -> Url {
    if page <= 1 {
        return base.clone();
    }
    let pairs: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("page", &page.to_string());
    url
}
