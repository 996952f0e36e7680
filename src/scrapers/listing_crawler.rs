use crate::config::WaitPolicy;
use crate::scrapers::capture::CaptureLog;
use crate::scrapers::traits::SearchSession;
use crate::scrapers::types::page_url;
use std::thread;
use tracing::{debug, info, warn};
use url::Url;

/// Why pagination ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page produced nothing after every wait and retry
    NoNewRecords { page: u32 },
    /// The rendered page had no link to the next page
    NoNextLink { page: u32 },
    /// The page ceiling was reached
    PageLimit { pages: u32 },
}

/// How a pagination run went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub pages_with_data: u32,
    pub navigations: u32,
    pub stop: StopReason,
}

/// Drives pagination against one search while the observer fills the log
pub struct ListingCrawler<'a, S: SearchSession + ?Sized> {
    session: &'a S,
    log: &'a CaptureLog,
    policy: &'a WaitPolicy,
    max_pages: u32,
    check_next_link: bool,
}

impl<'a, S: SearchSession + ?Sized> ListingCrawler<'a, S> {
    pub fn new(session: &'a S, log: &'a CaptureLog, policy: &'a WaitPolicy) -> Self {
        Self {
            session,
            log,
            policy,
            max_pages: 3,
            check_next_link: true,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_next_link_check(mut self, enabled: bool) -> Self {
        self.check_next_link = enabled;
        self
    }

    /// Walks pages from 1 until a page yields nothing, the next-page link
    /// disappears, or the ceiling is hit; then lets late responses drain.
    pub fn crawl(&self, base: &Url) -> CrawlReport {
        let mut navigations = 0;
        let mut pages_with_data = 0;
        let mut page = 1;

        let stop = loop {
            info!(page, "Crawling search page");
            let url = page_url(base, page);
            let before = self.log.len();

            if !self.wait_for_page(url.as_str(), before, &mut navigations) {
                info!(page, "No hotels arrived for page, treating it as the last one");
                break StopReason::NoNewRecords { page };
            }

            pages_with_data += 1;
            info!(
                page,
                added = self.log.len() - before,
                total = self.log.len(),
                "Page produced hotels"
            );

            if page >= self.max_pages {
                break StopReason::PageLimit { pages: page };
            }

            if self.check_next_link {
                match self.session.has_page_link(page + 1) {
                    Ok(true) => {}
                    Ok(false) => {
                        info!(next = page + 1, "No link to next page");
                        break StopReason::NoNextLink { page };
                    }
                    Err(err) => debug!(error = %err, "Next page link check failed, continuing"),
                }
            }

            page += 1;
            thread::sleep(self.policy.between_pages);
        };

        debug!(grace = ?self.policy.drain, "Draining in-flight responses");
        thread::sleep(self.policy.drain);

        CrawlReport {
            pages_with_data,
            navigations,
            stop,
        }
    }

    /// One page's NAVIGATE / WAIT / RETRY cycle; true once the log grows
    fn wait_for_page(&self, url: &str, before: usize, navigations: &mut u32) -> bool {
        let policy = self.policy;

        self.navigate(url, navigations);
        if self.log.wait_for_growth(before, policy.initial) {
            return true;
        }

        debug!(url, "Nothing yet, extending wait");
        thread::sleep(policy.extended_pause);
        if self.log.wait_for_growth(before, policy.extended) {
            return true;
        }

        for attempt in 1..=policy.retries {
            warn!(url, attempt, retries = policy.retries, "Retrying navigation");
            self.navigate(url, navigations);
            if self.log.wait_for_growth(before, policy.extended) {
                return true;
            }
        }

        debug!(url, "Retries spent, final wait");
        self.log.wait_for_growth(before, policy.final_wait)
    }

    fn navigate(&self, url: &str, navigations: &mut u32) {
        *navigations += 1;
        if let Err(err) = self.session.navigate(url) {
            // A half-loaded page can still fire the search request
            warn!(url, error = %err, "Navigation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingRecord;
    use anyhow::{anyhow, Result};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Appends scripted batches to the log as if the observer had seen them.
    /// Each navigation to a page pops that page's next scripted batch.
    struct ScriptedSession<'a> {
        log: &'a CaptureLog,
        script: Mutex<HashMap<u32, VecDeque<Vec<ListingRecord>>>>,
        visits: Mutex<Vec<u32>>,
        fail_navigation: bool,
        links: Option<u32>,
    }

    impl<'a> ScriptedSession<'a> {
        fn new(log: &'a CaptureLog) -> Self {
            Self {
                log,
                script: Mutex::new(HashMap::new()),
                visits: Mutex::new(Vec::new()),
                fail_navigation: false,
                links: None,
            }
        }

        fn on(self, page: u32, batches: Vec<Vec<ListingRecord>>) -> Self {
            self.script.lock().unwrap().insert(page, batches.into());
            self
        }

        fn visits(&self) -> Vec<u32> {
            self.visits.lock().unwrap().clone()
        }
    }

    fn page_of(url: &str) -> u32 {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "page")
            .map(|(_, v)| v.parse().unwrap())
            .unwrap_or(1)
    }

    impl SearchSession for ScriptedSession<'_> {
        fn navigate(&self, url: &str) -> Result<()> {
            let page = page_of(url);
            self.visits.lock().unwrap().push(page);
            let batch = self
                .script
                .lock()
                .unwrap()
                .get_mut(&page)
                .and_then(VecDeque::pop_front)
                .unwrap_or_default();
            self.log.append(batch);
            if self.fail_navigation {
                Err(anyhow!("net::ERR_TIMED_OUT"))
            } else {
                Ok(())
            }
        }

        fn has_page_link(&self, page: u32) -> Result<bool> {
            match self.links {
                Some(last) => Ok(page <= last),
                None => Err(anyhow!("no document")),
            }
        }
    }

    fn hotels(prefix: &str, n: usize) -> Vec<ListingRecord> {
        (0..n)
            .map(|i| ListingRecord {
                external_id: format!("{prefix}{i}"),
                name: format!("Hotel {prefix}{i}"),
                ..Default::default()
            })
            .collect()
    }

    fn quick_policy() -> WaitPolicy {
        WaitPolicy {
            initial: Duration::from_millis(20),
            extended_pause: Duration::from_millis(1),
            extended: Duration::from_millis(10),
            retries: 2,
            final_wait: Duration::from_millis(10),
            drain: Duration::from_millis(1),
            between_pages: Duration::from_millis(1),
            navigation_timeout: Duration::from_millis(50),
        }
    }

    fn base() -> Url {
        Url::parse("https://ostrovok.ru/hotel/russia/irkutsk/?q=1").unwrap()
    }

    #[test]
    fn stops_at_first_empty_page_and_keeps_earlier_results() {
        let log = CaptureLog::new();
        let session = ScriptedSession::new(&log)
            .on(1, vec![hotels("a", 3)])
            .on(2, vec![hotels("b", 2)]);
        let policy = quick_policy();

        let report = ListingCrawler::new(&session, &log, &policy)
            .with_max_pages(10)
            .with_next_link_check(false)
            .crawl(&base());

        assert_eq!(report.stop, StopReason::NoNewRecords { page: 3 });
        assert_eq!(report.pages_with_data, 2);
        assert_eq!(log.len(), 5);
        // page 3: first navigation plus the full retry budget
        assert_eq!(session.visits(), vec![1, 2, 3, 3, 3]);
        assert_eq!(report.navigations, 5);
    }

    #[test]
    fn retry_recovers_a_slow_page() {
        let log = CaptureLog::new();
        let session = ScriptedSession::new(&log)
            .on(1, vec![hotels("a", 1)])
            .on(2, vec![Vec::new(), hotels("b", 4)]);
        let policy = quick_policy();

        let report = ListingCrawler::new(&session, &log, &policy)
            .with_max_pages(2)
            .with_next_link_check(false)
            .crawl(&base());

        assert_eq!(report.stop, StopReason::PageLimit { pages: 2 });
        assert_eq!(log.len(), 5);
        assert_eq!(session.visits(), vec![1, 2, 2]);
    }

    #[test]
    fn late_response_lands_during_extended_wait() {
        let log = CaptureLog::new();
        let session = ScriptedSession::new(&log);
        let policy = WaitPolicy {
            initial: Duration::from_millis(30),
            extended_pause: Duration::from_millis(5),
            extended: Duration::from_secs(5),
            ..quick_policy()
        };

        let report = thread::scope(|scope| {
            scope.spawn(|| {
                // Past the initial wait, well inside the extended one
                thread::sleep(Duration::from_millis(200));
                log.append(hotels("late", 2));
            });
            ListingCrawler::new(&session, &log, &policy)
                .with_max_pages(1)
                .with_next_link_check(false)
                .crawl(&base())
        });

        assert_eq!(report.stop, StopReason::PageLimit { pages: 1 });
        assert_eq!(report.pages_with_data, 1);
        assert_eq!(report.navigations, 1);
        assert_eq!(session.visits(), vec![1]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn navigation_errors_do_not_stop_the_crawl() {
        let log = CaptureLog::new();
        let mut session = ScriptedSession::new(&log).on(1, vec![hotels("a", 2)]);
        session.fail_navigation = true;
        let policy = quick_policy();

        let report = ListingCrawler::new(&session, &log, &policy)
            .with_max_pages(3)
            .with_next_link_check(false)
            .crawl(&base());

        assert_eq!(log.len(), 2);
        assert_eq!(report.pages_with_data, 1);
        assert_eq!(report.stop, StopReason::NoNewRecords { page: 2 });
    }

    #[test]
    fn page_ceiling_bounds_the_crawl() {
        let log = CaptureLog::new();
        let mut session = ScriptedSession::new(&log);
        for page in 1..=10 {
            session = session.on(page, vec![hotels(&format!("p{page}-"), 1)]);
        }
        let policy = quick_policy();

        let report = ListingCrawler::new(&session, &log, &policy)
            .with_max_pages(3)
            .with_next_link_check(false)
            .crawl(&base());

        assert_eq!(report.stop, StopReason::PageLimit { pages: 3 });
        assert_eq!(session.visits(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_next_link_stops_early() {
        let log = CaptureLog::new();
        let mut session = ScriptedSession::new(&log)
            .on(1, vec![hotels("a", 1)])
            .on(2, vec![hotels("b", 1)])
            .on(3, vec![hotels("c", 1)]);
        session.links = Some(2);
        let policy = quick_policy();

        let report = ListingCrawler::new(&session, &log, &policy)
            .with_max_pages(5)
            .crawl(&base());

        assert_eq!(report.stop, StopReason::NoNextLink { page: 2 });
        assert_eq!(session.visits(), vec![1, 2]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn failed_link_check_falls_back_to_record_heuristic() {
        let log = CaptureLog::new();
        let session = ScriptedSession::new(&log).on(1, vec![hotels("a", 1)]);
        let policy = quick_policy();

        let report = ListingCrawler::new(&session, &log, &policy)
            .with_max_pages(5)
            .crawl(&base());

        assert_eq!(report.stop, StopReason::NoNewRecords { page: 2 });
    }
}
