use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Counts reported once at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub date: Option<NaiveDate>,
    pub hotels: Option<usize>,
    pub duplicates_removed: Option<usize>,
    pub room_groups: Option<usize>,
    pub hotels_without_rates: Option<usize>,
    pub statistics: Option<usize>,
    /// Set when the listing crawl captured nothing
    pub empty_crawl: bool,
}

impl RunSummary {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Default::default()
        }
    }

    pub fn message(&self) -> String {
        let date = self
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let mut parts = vec![format!("Run {date}")];
        if self.empty_crawl {
            parts.push("listing crawl captured no hotels".to_string());
        }
        if let Some(n) = self.hotels {
            parts.push(format!("hotels: {n}"));
        }
        if let Some(n) = self.duplicates_removed {
            parts.push(format!("duplicates removed: {n}"));
        }
        if let Some(n) = self.room_groups {
            parts.push(format!("room groups: {n}"));
        }
        if let Some(n) = self.hotels_without_rates {
            parts.push(format!("hotels without rates: {n}"));
        }
        if let Some(n) = self.statistics {
            parts.push(format!("statistics rows: {n}"));
        }
        parts.join(", ")
    }
}

/// Delivers the run summary somewhere a human will see it
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary: &RunSummary) -> Result<()>;

    fn channel(&self) -> &'static str;
}

/// Writes the summary to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, summary: &RunSummary) -> Result<()> {
        info!("{}", summary.message());
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "log"
    }
}

/// Posts the summary as JSON to a webhook
pub struct WebhookNotifier {
    client: Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid webhook URL {url:?}"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, url })
    }
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    text: String,
    summary: &'a RunSummary,
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, summary: &RunSummary) -> Result<()> {
        let body = WebhookBody {
            text: summary.message(),
            summary,
        };
        self.client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .context("Failed to send summary")?
            .error_for_status()
            .context("Webhook rejected summary")?;
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "webhook"
    }
}

/// Webhook when one is configured and usable, the log otherwise
pub fn notifier_for(webhook_url: Option<&str>) -> Box<dyn Notifier> {
    let Some(url) = webhook_url else {
        return Box::new(LogNotifier);
    };
    match WebhookNotifier::new(url) {
        Ok(webhook) => Box::new(webhook),
        Err(err) => {
            warn!(error = %err, "Webhook unavailable, summary goes to the log");
            Box::new(LogNotifier)
        }
    }
}

/// Fire and forget: a failed delivery is logged and otherwise ignored
pub async fn deliver(notifier: &dyn Notifier, summary: &RunSummary) {
    if let Err(err) = notifier.notify(summary).await {
        warn!(error = %err, "Could not deliver run summary");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing(AtomicUsize);

    #[async_trait]
    impl Notifier for Failing {
        async fn notify(&self, _summary: &RunSummary) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("smtp down"))
        }

        fn channel(&self) -> &'static str {
            "failing"
        }
    }

    fn summary() -> RunSummary {
        RunSummary {
            hotels: Some(120),
            duplicates_removed: Some(3),
            room_groups: Some(410),
            statistics: Some(120),
            ..RunSummary::for_date(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap())
        }
    }

    #[test]
    fn message_lists_what_was_counted() {
        assert_eq!(
            summary().message(),
            "Run 2025-03-14, hotels: 120, duplicates removed: 3, room groups: 410, \
             statistics rows: 120"
        );
    }

    #[test]
    fn empty_crawl_is_called_out() {
        let mut s = RunSummary::for_date(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        s.empty_crawl = true;
        assert!(s.message().contains("captured no hotels"));
    }

    #[tokio::test]
    async fn failed_delivery_is_swallowed() {
        let notifier = Failing(AtomicUsize::new(0));
        deliver(&notifier, &summary()).await;
        assert_eq!(notifier.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unusable_webhook_falls_back_to_log() {
        assert_eq!(notifier_for(None).channel(), "log");
        assert_eq!(notifier_for(Some("not a url")).channel(), "log");
        assert_eq!(notifier_for(Some("https://hooks.example.com/run")).channel(), "webhook");
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        assert!(LogNotifier.notify(&summary()).await.is_ok());
    }
}
