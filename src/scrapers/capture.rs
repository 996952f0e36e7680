//! Passive capture of search endpoint responses.
//!
//! The browser delivers network responses on its own event thread. The
//! observer here only ever appends to the [`CaptureLog`]; the crawl loop
//! only reads its length and waits on it. Dedup happens after the crawl.
//!
//! Response events carry no request method, so the session also keeps the
//! method of every outgoing search request until its response shows up.

use crate::extract::ListingExtractor;
use crate::models::ListingRecord;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Append-only buffer of captured listings with a growth signal
#[derive(Debug, Default)]
pub struct CaptureLog {
    records: Mutex<Vec<ListingRecord>>,
    grew: Condvar,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ListingRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a batch and wakes any waiter; returns the new length
    pub fn append(&self, batch: Vec<ListingRecord>) -> usize {
        if batch.is_empty() {
            return self.len();
        }
        let mut records = self.lock();
        records.extend(batch);
        let total = records.len();
        drop(records);
        self.grew.notify_all();
        total
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Blocks until the log holds more than `baseline` records or `timeout`
    /// elapses. Returns whether it grew.
    pub fn wait_for_growth(&self, baseline: usize, timeout: Duration) -> bool {
        let records = self.lock();
        let (records, _) = self
            .grew
            .wait_timeout_while(records, timeout, |records| records.len() <= baseline)
            .unwrap_or_else(PoisonError::into_inner);
        records.len() > baseline
    }

    /// Copy of everything captured so far, in arrival order
    pub fn snapshot(&self) -> Vec<ListingRecord> {
        self.lock().clone()
    }
}

/// The parts of a network response the observer looks at
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedResponse {
    /// `None` when the request was never seen going out
    pub method: Option<String>,
    pub url: String,
    pub status: u32,
    pub mime_type: String,
}

/// Recognises responses from the paginated search endpoint
#[derive(Debug, Clone)]
pub struct ResponseMatcher {
    pub method: String,
    pub path: String,
    pub session_marker: String,
}

impl ResponseMatcher {
    pub fn new(path: impl Into<String>, session_marker: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.into(),
            session_marker: session_marker.into(),
        }
    }

    pub fn matches(&self, response: &ObservedResponse) -> bool {
        let method_ok = response
            .method
            .as_deref()
            .map(|m| m.eq_ignore_ascii_case(&self.method))
            .unwrap_or(true);

        method_ok
            && response.status == 200
            && response.url.contains(&self.path)
            && response.url.contains(&self.session_marker)
    }
}

/// State shared between the crawl loop and the response observer for one run
#[derive(Debug)]
pub struct CrawlSession {
    log: CaptureLog,
    matcher: ResponseMatcher,
    extractor: ListingExtractor,
    /// request id -> method, for search requests still awaiting a response
    pending: Mutex<HashMap<String, String>>,
}

impl CrawlSession {
    pub fn new(matcher: ResponseMatcher, extractor: ListingExtractor) -> Self {
        Self {
            log: CaptureLog::new(),
            matcher,
            extractor,
            pending: Mutex::default(),
        }
    }

    pub fn log(&self) -> &CaptureLog {
        &self.log
    }

    /// Request listener callback; only search endpoint requests are kept
    pub fn record_request(&self, request_id: &str, method: &str, url: &str) {
        if !url.contains(&self.matcher.path) {
            return;
        }
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id.to_string(), method.to_string());
    }

    /// Pairs a response with the method recorded for its request. The
    /// record is consumed.
    pub fn response_for(
        &self,
        request_id: &str,
        url: String,
        status: u32,
        mime_type: String,
    ) -> ObservedResponse {
        let method = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(request_id);
        ObservedResponse {
            method,
            url,
            status,
            mime_type,
        }
    }

    /// Observer callback. `body` is only called for matching JSON responses;
    /// any failure drops this response and nothing else.
    pub fn observe<F>(&self, response: &ObservedResponse, body: F)
    where
        F: FnOnce() -> Result<String>,
    {
        if !self.matcher.matches(response) {
            return;
        }
        if !response.mime_type.to_ascii_lowercase().contains("json") {
            debug!(
                url = %response.url,
                mime = %response.mime_type,
                "Search response is not JSON"
            );
            return;
        }

        let body = match body() {
            Ok(body) => body,
            Err(err) => {
                // Usually the tab went away while the body was being fetched
                debug!(
                    url = %response.url,
                    error = %err,
                    "Could not read search response body"
                );
                return;
            }
        };

        let payload: Value = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(
                    url = %response.url,
                    error = %err,
                    "Search response body is not valid JSON"
                );
                return;
            }
        };

        let has_hotels = payload
            .get("hotels")
            .and_then(Value::as_array)
            .map(|hotels| !hotels.is_empty())
            .unwrap_or(false);
        if !has_hotels {
            return;
        }

        let records = self.extractor.extract(&payload);
        let added = records.len();
        if added > 0 {
            let total = self.log.append(records);
            info!(added, total, "Captured hotels from search response");
        }
    }
}
