use crate::aggregate::{dedup_listings, group_rate_quotes};
use crate::capacity::{CapacityEstimator, KeywordCapacityEstimator};
use crate::config::{CrawlConfig, SiteConfig};
use crate::extract::{extract_rate_quotes, ListingExtractor};
use crate::models::{ListingRecord, RoomRateGroup};
use crate::notify::RunSummary;
use crate::scrapers::capture::{CrawlSession, ResponseMatcher};
use crate::scrapers::listing_crawler::CrawlReport;
use crate::scrapers::rooms::{hotel_slug, OstrovokRoomClient};
use crate::scrapers::types::{SearchParams, StayWindow};
use crate::scrapers::{OstrovokBrowserScraper, RoomRateSource};
use crate::statistics::compute_statistics;
use crate::storage::{self, DataLayout};
use anyhow::{anyhow, Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Terminal state of a listing crawl
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlOutcome {
    Captured {
        records: Vec<ListingRecord>,
        duplicates_removed: usize,
        report: CrawlReport,
    },
    /// Nothing was captured; not an error, callers decide whether to alert
    Empty { report: CrawlReport },
}

impl CrawlOutcome {
    /// Dedups what the crawl captured
    pub fn from_capture(records: Vec<ListingRecord>, report: CrawlReport) -> Self {
        if records.is_empty() {
            return CrawlOutcome::Empty { report };
        }
        let deduped = dedup_listings(records);
        CrawlOutcome::Captured {
            records: deduped.records,
            duplicates_removed: deduped.removed,
            report,
        }
    }
}

/// Room groups collected for a set of hotels
#[derive(Debug, Default)]
pub struct RoomCollection {
    pub groups: Vec<RoomRateGroup>,
    pub hotels_without_rates: usize,
    pub ungrouped_quotes: usize,
}

/// One day's run of the three stages
pub struct Pipeline {
    pub site: SiteConfig,
    pub crawl: CrawlConfig,
    pub layout: DataLayout,
    pub date: NaiveDate,
    /// Pause between per-hotel detail requests
    pub request_pause: Duration,
}

impl Pipeline {
    pub fn stay(&self) -> StayWindow {
        StayWindow::rolling(self.date)
    }

    /// Crawl the listing search and write the day's hotels table
    pub async fn hotels(&self) -> Result<CrawlOutcome> {
        let params = SearchParams {
            base_url: self.site.search_base_url.clone(),
            region_id: self.site.region_id,
            stay: self.stay(),
            guests: self.crawl.guests,
        };
        let search_url = params.search_url()?;
        info!(
            arrival = %params.stay.arrival,
            departure = %params.stay.departure,
            "Stay window"
        );

        let site = self.site.clone();
        let crawl = self.crawl.clone();
        let (records, report) = tokio::task::spawn_blocking(move || -> Result<_> {
            let session = Arc::new(CrawlSession::new(
                ResponseMatcher::new(&site.search_endpoint_path, &site.session_marker),
                ListingExtractor::new(&site.detail_url_template).with_city_fallback(&site.city),
            ));
            let scraper = OstrovokBrowserScraper::new(&site, &crawl)?;
            let result = scraper.scrape_listings(&search_url, session);
            scraper.shutdown();
            result
        })
        .await
        .map_err(|e| anyhow!("join error - {e:?}"))??;

        info!(
            captured = records.len(),
            pages = report.pages_with_data,
            navigations = report.navigations,
            stop = ?report.stop,
            "Listing crawl finished"
        );

        let outcome = CrawlOutcome::from_capture(records, report);
        match &outcome {
            CrawlOutcome::Captured {
                records,
                duplicates_removed,
                ..
            } => {
                let path = self.layout.hotels(self.date);
                storage::write_listings(&path, records)?;
                info!(
                    hotels = records.len(),
                    duplicates_removed,
                    path = %path.display(),
                    "Saved hotels"
                );
            }
            CrawlOutcome::Empty { .. } => warn!("Could not extract any hotels"),
        }
        Ok(outcome)
    }

    /// Request every listed hotel's rates and write the day's rooms table
    pub async fn rooms(&self) -> Result<RoomCollection> {
        let listings = storage::read_listings(&self.layout.hotels(self.date))?;
        info!(hotels = listings.len(), "Loaded hotels for room crawl");

        let site = self.site.clone();
        let crawl = self.crawl.clone();
        let cookies = tokio::task::spawn_blocking(move || -> Result<_> {
            let scraper = OstrovokBrowserScraper::new(&site, &crawl)?;
            let cookies = scraper.harvest_cookies(&site.home_url);
            scraper.shutdown();
            cookies
        })
        .await
        .map_err(|e| anyhow!("join error - {e:?}"))?
        .unwrap_or_else(|err| {
            warn!(error = %err, "Could not collect cookies, requesting without them");
            Vec::new()
        });

        let client = OstrovokRoomClient::new(&self.site, &cookies)?;
        let collection = collect_room_groups(
            &client,
            &listings,
            &self.stay(),
            self.crawl.guests,
            &KeywordCapacityEstimator,
            self.request_pause,
        )
        .await;

        let path = self.layout.rooms(self.date);
        storage::write_room_groups(&path, &collection.groups)?;
        info!(
            groups = collection.groups.len(),
            hotels_without_rates = collection.hotels_without_rates,
            ungrouped = collection.ungrouped_quotes,
            path = %path.display(),
            "Saved room groups"
        );
        Ok(collection)
    }

    /// Join the day's hotels and rooms tables into the statistics table
    pub fn statistics(&self) -> Result<usize> {
        let listings = storage::read_listings(&self.layout.hotels(self.date))?;
        let groups = storage::read_room_groups(&self.layout.rooms(self.date))?;
        let stats = compute_statistics(&listings, &groups, self.date);

        let path = self.layout.statistics(self.date);
        storage::write_statistics(&path, &stats)?;
        info!(hotels = stats.len(), path = %path.display(), "Saved statistics");
        Ok(stats.len())
    }
}

/// The three stages of a daily run, in the order `run_stages` calls them
#[async_trait]
pub trait Stages: Sync {
    fn date(&self) -> NaiveDate;
    async fn hotels(&self) -> Result<CrawlOutcome>;
    async fn rooms(&self) -> Result<RoomCollection>;
    fn statistics(&self) -> Result<usize>;
}

#[async_trait]
impl Stages for Pipeline {
    fn date(&self) -> NaiveDate {
        self.date
    }

    async fn hotels(&self) -> Result<CrawlOutcome> {
        Pipeline::hotels(self).await
    }

    async fn rooms(&self) -> Result<RoomCollection> {
        Pipeline::rooms(self).await
    }

    fn statistics(&self) -> Result<usize> {
        Pipeline::statistics(self)
    }
}

/// Runs each stage while the previous one left something to work on.
///
/// The summary covers whatever finished. A stage error ends the run and
/// comes back alongside it; an empty crawl ends the run without one.
pub async fn run_stages(stages: &dyn Stages) -> (RunSummary, Option<Error>) {
    let mut summary = RunSummary::for_date(stages.date());

    match stages.hotels().await {
        Ok(CrawlOutcome::Captured {
            records,
            duplicates_removed,
            ..
        }) => {
            summary.hotels = Some(records.len());
            summary.duplicates_removed = Some(duplicates_removed);
        }
        Ok(CrawlOutcome::Empty { .. }) => {
            summary.empty_crawl = true;
            return (summary, None);
        }
        Err(err) => {
            error!(error = ?err, "Hotel stage failed");
            return (summary, Some(err.context("Hotel stage failed")));
        }
    }

    match stages.rooms().await {
        Ok(rooms) => {
            summary.room_groups = Some(rooms.groups.len());
            summary.hotels_without_rates = Some(rooms.hotels_without_rates);
        }
        Err(err) => {
            error!(error = ?err, "Room stage failed");
            return (summary, Some(err.context("Room stage failed")));
        }
    }

    match stages.statistics() {
        Ok(rows) => {
            summary.statistics = Some(rows);
            (summary, None)
        }
        Err(err) => {
            error!(error = ?err, "Statistics stage failed");
            (summary, Some(err.context("Statistics stage failed")))
        }
    }
}

/// Fetch and group rates hotel by hotel. A hotel that fails is logged and
/// skipped; it never stops the others.
pub async fn collect_room_groups<E>(
    source: &dyn RoomRateSource,
    listings: &[ListingRecord],
    stay: &StayWindow,
    adults: u32,
    estimator: &E,
    pause: Duration,
) -> RoomCollection
where
    E: CapacityEstimator + ?Sized,
{
    let mut collection = RoomCollection::default();

    for (i, listing) in listings.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let Some(slug) = hotel_slug(&listing.url) else {
            warn!(
                hotel = %listing.external_id,
                url = %listing.url,
                "Skipping hotel without usable URL"
            );
            collection.hotels_without_rates += 1;
            continue;
        };

        let payload = match source.fetch_rates(&slug, stay, adults).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                collection.hotels_without_rates += 1;
                continue;
            }
            Err(err) => {
                warn!(
                    hotel = %slug,
                    source = source.source_name(),
                    error = %err,
                    "Rates request failed"
                );
                collection.hotels_without_rates += 1;
                continue;
            }
        };

        let mut quotes = extract_rate_quotes(&payload);
        for quote in &mut quotes {
            if quote.external_id.is_empty() {
                quote.external_id.clone_from(&listing.external_id);
            }
            if quote.parent_id.is_empty() {
                quote.parent_id.clone_from(&listing.parent_id);
            }
        }

        let grouped = group_rate_quotes(quotes, estimator, &listing.url);
        info!(
            hotel = %slug,
            groups = grouped.groups.len(),
            ungrouped = grouped.ungrouped,
            "Grouped rates"
        );
        if grouped.groups.is_empty() {
            collection.hotels_without_rates += 1;
        }
        collection.ungrouped_quotes += grouped.ungrouped;
        collection.groups.extend(grouped.groups);
    }

    collection
}
