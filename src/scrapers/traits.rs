use crate::scrapers::types::StayWindow;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A browser tab the listing crawler can drive.
///
/// Results never come back from these calls; they arrive through the
/// response observer registered on the same session.
pub trait SearchSession {
    /// Navigates to `url` and waits for the document to load
    fn navigate(&self, url: &str) -> Result<()>;

    /// Whether the rendered page links to page `page`
    fn has_page_link(&self, page: u32) -> Result<bool>;
}

/// Source of per-hotel room and rate detail
#[async_trait]
pub trait RoomRateSource: Send + Sync {
    /// Raw detail payload for one hotel, `None` when the source has nothing
    async fn fetch_rates(
        &self,
        hotel_slug: &str,
        stay: &StayWindow,
        adults: u32,
    ) -> Result<Option<Value>>;

    /// Get the name of the source
    fn source_name(&self) -> &'static str;
}
