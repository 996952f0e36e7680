use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Network environment class; every wait bound scales with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    Fast,
    Slow,
}

impl NetworkProfile {
    fn factor(self) -> u32 {
        match self {
            NetworkProfile::Fast => 1,
            NetworkProfile::Slow => 2,
        }
    }
}

/// Bounded waits used by the listing crawler while it waits for the
/// search endpoint to answer a navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    /// First wait after a navigation
    pub initial: Duration,
    /// Pause before the extended wait
    pub extended_pause: Duration,
    /// Wait after the pause and after every retry navigation
    pub extended: Duration,
    /// Re-navigations before giving up on a page
    pub retries: u32,
    /// Last wait once retries are spent
    pub final_wait: Duration,
    /// Grace period for in-flight responses after the last page
    pub drain: Duration,
    /// Pause before moving on to the next page
    pub between_pages: Duration,
    /// Browser-side navigation timeout
    pub navigation_timeout: Duration,
}

impl WaitPolicy {
    pub fn for_profile(profile: NetworkProfile) -> Self {
        let base = WaitPolicy {
            initial: Duration::from_secs(15),
            extended_pause: Duration::from_secs(2),
            extended: Duration::from_secs(10),
            retries: 2,
            final_wait: Duration::from_secs(20),
            drain: Duration::from_secs(3),
            between_pages: Duration::from_millis(500),
            navigation_timeout: Duration::from_secs(30),
        };
        base.scaled(profile.factor())
    }

    /// Multiplies every duration by `factor`; the retry budget is unchanged
    pub fn scaled(self, factor: u32) -> Self {
        WaitPolicy {
            initial: self.initial * factor,
            extended_pause: self.extended_pause * factor,
            extended: self.extended * factor,
            retries: self.retries,
            final_wait: self.final_wait * factor,
            drain: self.drain * factor,
            between_pages: self.between_pages * factor,
            navigation_timeout: self.navigation_timeout * factor,
        }
    }
}

/// Site-specific constants for the booking site and region being surveyed
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub city: String,
    pub search_base_url: String,
    pub search_endpoint_path: String,
    pub session_marker: String,
    pub region_id: u64,
    /// `{parent_id}` and `{external_id}` are substituted
    pub detail_url_template: String,
    pub home_url: String,
    pub rooms_api_url: String,
    pub currency: String,
    pub language: String,
    pub user_agent: String,
    pub accept_language: String,
}

const SEARCH_BASE_URL: &str =
    "https://ostrovok.ru/hotel/russia/western_siberia_irkutsk_oblast_multi/";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            city: "Иркутск".to_string(),
            search_base_url: SEARCH_BASE_URL.to_string(),
            search_endpoint_path: "/hotel/search/v2/site/serp".to_string(),
            session_marker: "session=".to_string(),
            region_id: 965821539,
            detail_url_template:
                "https://ostrovok.ru/hotel/russia/irkutsk/mid{parent_id}/{external_id}".to_string(),
            home_url: "https://ostrovok.ru".to_string(),
            rooms_api_url: "https://ostrovok.ru/hotel/search/v1/site/hp/search".to_string(),
            currency: "RUB".to_string(),
            language: "ru".to_string(),
            user_agent: USER_AGENT.to_string(),
            accept_language: "ru-RU".to_string(),
        }
    }
}

/// Everything the listing crawl needs besides the site constants
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub wait: WaitPolicy,
    pub max_pages: u32,
    pub guests: u32,
    pub check_next_link: bool,
    pub headless: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::for_profile(NetworkProfile::Fast),
            max_pages: 3,
            guests: 1,
            check_next_link: true,
            headless: true,
        }
    }
}
