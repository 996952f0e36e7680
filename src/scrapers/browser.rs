use crate::config::{CrawlConfig, SiteConfig};
use crate::models::ListingRecord;
use crate::scrapers::capture::CrawlSession;
use crate::scrapers::listing_crawler::{CrawlReport, ListingCrawler};
use crate::scrapers::traits::SearchSession;
use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Network::GetResponseBodyReturnObject;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const OBSERVER_NAME: &str = "serp-observer";

/// Browser-based scraper for Ostrovok using headless Chrome
pub struct OstrovokBrowserScraper {
    // Dropping the browser kills the Chrome process
    _browser: Browser,
    tab: Arc<Tab>,
    config: CrawlConfig,
}

impl OstrovokBrowserScraper {
    /// Launch Chrome and open the tab all navigation goes through
    pub fn new(site: &SiteConfig, config: &CrawlConfig) -> Result<Self> {
        info!(headless = config.headless, "Launching Chrome...");

        // The browser must outlive the longest wait without tripping its idle timer
        let idle = config.wait.final_wait + config.wait.navigation_timeout * 2;
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(idle.max(Duration::from_secs(60)))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open tab")?;
        tab.set_default_timeout(config.wait.navigation_timeout);
        tab.set_user_agent(&site.user_agent, Some(site.accept_language.as_str()), None)
            .context("Failed to set user agent")?;

        Ok(Self {
            _browser: browser,
            tab,
            config: config.clone(),
        })
    }

    /// Crawl every search page reachable from `search_url`.
    ///
    /// The request listener and the response observer are attached before
    /// the first navigation so no search response can slip past them.
    pub fn scrape_listings(
        &self,
        search_url: &Url,
        session: Arc<CrawlSession>,
    ) -> Result<(Vec<ListingRecord>, CrawlReport)> {
        let requests = Arc::clone(&session);
        let listener = self
            .tab
            .add_event_listener(Arc::new(move |event: &Event| {
                if let Event::NetworkRequestWillBeSent(sent) = event {
                    requests.record_request(
                        &sent.params.request_id,
                        &sent.params.request.method,
                        &sent.params.request.url,
                    );
                }
            }))
            .context("Failed to register request listener")?;

        let observer = Arc::clone(&session);
        self.tab
            .register_response_handling(
                OBSERVER_NAME,
                Box::new(
                    move |event: ResponseReceivedEventParams,
                          fetch_body: &dyn Fn() -> Result<GetResponseBodyReturnObject>| {
                        let response = observer.response_for(
                            &event.request_id,
                            event.response.url.clone(),
                            event.response.status as u32,
                            event.response.mime_type.clone(),
                        );
                        observer.observe(&response, || fetch_body().map(|body| body.body));
                    },
                ),
            )
            .context("Failed to register response observer")?;

        info!(url = %search_url, "Opening search page...");
        let report = ListingCrawler::new(self, session.log(), &self.config.wait)
            .with_max_pages(self.config.max_pages)
            .with_next_link_check(self.config.check_next_link)
            .crawl(search_url);

        if let Err(err) = self.tab.deregister_response_handling(OBSERVER_NAME) {
            debug!(error = %err, "Observer already gone");
        }
        if let Err(err) = self.tab.remove_event_listener(&listener) {
            debug!(error = %err, "Request listener already gone");
        }

        Ok((session.log().snapshot(), report))
    }

    /// Visit `home_url` and return the cookies the site set, as name/value pairs
    pub fn harvest_cookies(&self, home_url: &str) -> Result<Vec<(String, String)>> {
        info!(url = home_url, "Collecting session cookies...");
        self.navigate(home_url)?;
        let cookies = self
            .tab
            .get_cookies()
            .context("Failed to read cookies")?
            .into_iter()
            .map(|cookie| (cookie.name, cookie.value))
            .collect::<Vec<_>>();
        info!(count = cookies.len(), "Collected cookies");
        Ok(cookies)
    }

    /// Close the tab; a tab that is already gone is not an error
    pub fn shutdown(self) {
        if let Err(err) = self.tab.close(false) {
            warn!(error = %err, "Tab already closed during teardown");
        }
    }

    fn page_html(&self) -> Result<String> {
        let html = self
            .tab
            .evaluate("document.documentElement.outerHTML", false)?
            .value
            .and_then(|value| value.as_str().map(str::to_string))
            .ok_or_else(|| anyhow!("Could not get HTML from page"))?;
        Ok(html)
    }
}

impl SearchSession for OstrovokBrowserScraper {
    fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {url}"))?
            .wait_until_navigated()
            .context("Page did not finish loading")?;
        Ok(())
    }

    fn has_page_link(&self, page: u32) -> Result<bool> {
        let html = self.page_html()?;
        links_to_page(&html, page)
    }
}

/// Whether the document has an anchor whose text is exactly `page`
pub fn links_to_page(html: &str, page: u32) -> Result<bool> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a").map_err(|e| anyhow!("Invalid selector: {e:?}"))?;
    let wanted = page.to_string();

    Ok(document
        .select(&anchors)
        .any(|a| a.text().collect::<String>().trim() == wanted))
}
