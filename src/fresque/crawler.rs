use super::assemble::assemble;
use super::extract::{self, HEADING_CSS, IFRAME_CSS, LISTING_LINK_CSS, NEXT_PAGE_CSS};
use crate::geocode::AddressResolver;
use crate::{BrowserSession, CrawlerError, ElementHandle, EventRecord, Source};
use reqwest::Url;
use scraper::Html;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

const IFRAME_TIMEOUT: Duration = Duration::from_secs(10);
const DETAIL_TIMEOUT: Duration = Duration::from_secs(10);
const PAGINATION_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(250);
// No DOM signal marks the start of the re-render after a pagination click.
const CLICK_SETTLE: Duration = Duration::from_millis(500);

/// Drives one browser session through listing → detail → back traversal and
/// pagination. Sole owner of the session and its active-frame context.
pub struct FresqueCrawler<B, R> {
    session: B,
    resolver: R,
    cancelled: Arc<AtomicBool>,
}

impl<B, R> FresqueCrawler<B, R>
where
    B: BrowserSession + Send,
    R: AddressResolver + Sync,
{
    pub fn new(session: B, resolver: R, cancelled: Arc<AtomicBool>) -> Self {
        FresqueCrawler {
            session,
            resolver,
            cancelled,
        }
    }

    pub fn into_session(self) -> B {
        self.session
    }

    /// Crawl one source to pagination exhaustion, appending accepted records
    /// to `records` in traversal order. On a crawl-fatal error the records
    /// accepted so far stay in `records`.
    pub async fn run(
        &mut self,
        source: Source,
        records: &mut Vec<EventRecord>,
    ) -> Result<(), CrawlerError> {
        let base = Url::parse(source.url).map_err(|e| {
            CrawlerError::StructuralPage(format!("invalid source url {}: {e}", source.url))
        })?;

        self.open_listing(source.url).await?;
        loop {
            let links = self.collect_links(&base).await?;
            info!("{} candidate links on current page", links.len());

            for link in links {
                if self.cancelled.load(Ordering::Relaxed) {
                    info!("cancellation requested, stopping source {}", source.id);
                    return Ok(());
                }
                debug!("processing {link}");
                let outcome = self.process_detail(source.id, &link).await;
                // Accepted or rejected, the session must land back inside the
                // listing iframe before the next link.
                self.return_to_listing().await?;
                if let Some(record) = outcome? {
                    info!("[{}] accepted {link}", records.len() + 1);
                    records.push(record);
                }
            }

            if !self.advance_page().await? {
                info!("pagination exhausted for source {}", source.id);
                return Ok(());
            }
        }
    }

    async fn open_listing(&mut self, url: &str) -> Result<(), CrawlerError> {
        self.session.navigate(url).await?;
        match self.wait_for(IFRAME_CSS, IFRAME_TIMEOUT).await? {
            Some(frame) => self.session.switch_to_frame(&frame).await,
            None => Err(CrawlerError::StructuralPage(format!(
                "no iframe on listing page {url}"
            ))),
        }
    }

    // Losing the iframe here means the session is unrecoverable: crawl-fatal.
    async fn return_to_listing(&mut self) -> Result<(), CrawlerError> {
        self.session.go_back().await?;
        match self.wait_for(IFRAME_CSS, IFRAME_TIMEOUT).await? {
            Some(frame) => self.session.switch_to_frame(&frame).await,
            None => Err(CrawlerError::Timeout {
                what: "listing iframe after go_back".to_string(),
                waited: IFRAME_TIMEOUT,
            }),
        }
    }

    async fn collect_links(&mut self, base: &Url) -> Result<Vec<String>, CrawlerError> {
        let html = self.session.page_source().await?;
        Ok(extract::listing_links(&Html::parse_document(&html), base))
    }

    async fn process_detail(
        &mut self,
        source_id: u32,
        url: &str,
    ) -> Result<Option<EventRecord>, CrawlerError> {
        self.session.navigate(url).await?;
        if self.wait_for(HEADING_CSS, DETAIL_TIMEOUT).await?.is_none() {
            warn!("skipping {url}: detail heading never appeared");
            return Ok(None);
        }

        let html = self.session.page_source().await?;
        let raw = extract::extract_event(&Html::parse_document(&html));
        if raw.title.is_empty() {
            warn!("skipping {url}: empty title");
            return Ok(None);
        }

        match assemble(source_id, url, &raw, &self.resolver).await {
            Ok(record) => Ok(Some(record)),
            Err(rejection) => {
                warn!("rejecting record: {rejection} ({url})");
                Ok(None)
            }
        }
    }

    /// `Ok(false)` is the sole pagination termination signal: the control was
    /// not found, or not clickable, within its bounded wait.
    async fn advance_page(&mut self) -> Result<bool, CrawlerError> {
        self.session
            .execute_script("window.scrollTo(0, document.body.scrollHeight);")
            .await?;
        let Some(next) = self.wait_for(NEXT_PAGE_CSS, PAGINATION_TIMEOUT).await? else {
            debug!("no next-page control within {PAGINATION_TIMEOUT:?}");
            return Ok(false);
        };
        match self.session.click(&next).await {
            Ok(()) => {}
            Err(CrawlerError::WebDriver { name, message }) => {
                debug!("next-page control not clickable ({name}: {message})");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        sleep(CLICK_SETTLE).await;
        Ok(self.wait_for(LISTING_LINK_CSS, DETAIL_TIMEOUT).await?.is_some())
    }

    async fn wait_for(
        &mut self,
        css: &str,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>, CrawlerError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.session.find_element(css).await? {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::ResolvedAddress;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::collections::HashMap;

    const LISTING_URL: &str = "https://site.test/listing";

    struct StubResolver;

    #[async_trait]
    impl AddressResolver for StubResolver {
        async fn resolve(&self, _: &str, _: &str) -> Result<ResolvedAddress, CrawlerError> {
            Ok(ResolvedAddress {
                department_code: "69".to_string(),
                postal_code: "69002".to_string(),
                latitude: "45.764043".to_string(),
                longitude: "4.835659".to_string(),
            })
        }
    }

    /// Scripted in-memory site: one listing page with an iframe rendering
    /// `frames[page_index]`, plus top-level detail pages.
    struct MockBrowser {
        frames: Vec<String>,
        details: HashMap<String, String>,
        has_iframe: bool,
        page_index: usize,
        current: String,
        history: Vec<String>,
        in_frame: bool,
        visited_details: Vec<String>,
    }

    impl MockBrowser {
        fn new(frames: Vec<&str>, details: &[(&str, &str)]) -> Self {
            MockBrowser {
                frames: frames.into_iter().map(ToString::to_string).collect(),
                details: details
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
                has_iframe: true,
                page_index: 0,
                current: String::new(),
                history: vec![],
                in_frame: false,
                visited_details: vec![],
            }
        }

        fn handle(id: &str) -> ElementHandle {
            ElementHandle(id.to_string())
        }
    }

    #[async_trait]
    impl BrowserSession for MockBrowser {
        async fn navigate(&mut self, url: &str) -> Result<(), CrawlerError> {
            if !self.current.is_empty() {
                self.history.push(self.current.clone());
            }
            self.current = url.to_string();
            self.in_frame = false;
            if url != LISTING_URL {
                self.visited_details.push(url.to_string());
            }
            Ok(())
        }

        async fn go_back(&mut self) -> Result<(), CrawlerError> {
            self.current = self.history.pop().unwrap_or_default();
            self.in_frame = false;
            Ok(())
        }

        async fn find_element(
            &mut self,
            css: &str,
        ) -> Result<Option<ElementHandle>, CrawlerError> {
            let found = match css {
                IFRAME_CSS => self.current == LISTING_URL && self.has_iframe,
                HEADING_CSS => self
                    .details
                    .get(&self.current)
                    .is_some_and(|html| html.contains("<h3")),
                NEXT_PAGE_CSS => self.in_frame && self.page_index + 1 < self.frames.len(),
                LISTING_LINK_CSS => {
                    self.in_frame && self.frames[self.page_index].contains("link-dark")
                }
                _ => false,
            };
            Ok(found.then(|| Self::handle(css)))
        }

        async fn find_elements(&mut self, css: &str) -> Result<Vec<ElementHandle>, CrawlerError> {
            Ok(self.find_element(css).await?.into_iter().collect())
        }

        async fn click(&mut self, element: &ElementHandle) -> Result<(), CrawlerError> {
            assert_eq!(element.0, NEXT_PAGE_CSS);
            self.page_index += 1;
            Ok(())
        }

        async fn switch_to_frame(&mut self, _: &ElementHandle) -> Result<(), CrawlerError> {
            assert_eq!(self.current, LISTING_URL, "no iframe outside the listing");
            self.in_frame = true;
            Ok(())
        }

        async fn execute_script(&mut self, _: &str) -> Result<Value, CrawlerError> {
            Ok(Value::Null)
        }

        async fn page_source(&mut self) -> Result<String, CrawlerError> {
            if self.in_frame {
                Ok(self.frames[self.page_index].clone())
            } else {
                Ok(self.details.get(&self.current).cloned().unwrap_or_default())
            }
        }

        async fn quit(&mut self) -> Result<(), CrawlerError> {
            Ok(())
        }
    }

    const SOURCE: Source = Source {
        id: 200,
        url: LISTING_URL,
    };

    const PAGE_ONE: &str = r#"
        <a class="link-dark" href="https://site.test/e/1">Atelier à Lyon</a>
        <a class="link-dark" href="https://site.test/e/2">Atelier mal daté</a>
        <a class="link-dark" href="https://site.test/e/3">Atelier à Paris - Complet</a>
    "#;

    const PAGE_TWO: &str = r#"
        <a class="link-dark" href="https://site.test/e/4">Formation en ligne</a>
    "#;

    const DETAIL_OK: &str = r#"
        <h3>Fresque du Climat à Lyon</h3>
        <div><i class="fa-clock"></i> 25 janvier 2024, de 14h00 à 16h30</div>
        <div><i class="fa-map-pin"></i> 12 Rue de Paris, Lyon, France</div>
    "#;

    const DETAIL_BAD_TIME: &str = r#"
        <h3>Atelier mal daté</h3>
        <div><i class="fa-clock"></i> 25 janvier 2024, de 14h à 16h30</div>
        <div><i class="fa-map-pin"></i> 12 Rue de Paris, Lyon, France</div>
    "#;

    const DETAIL_ONLINE: &str = r#"
        <h3>Formation des animateurs</h3>
        <div><i class="fa-clock"></i> 3 février 2024, de 18h00 à 20h00</div>
        <div><i class="fa-video"></i> En ligne</div>
    "#;

    fn two_page_site() -> MockBrowser {
        MockBrowser::new(
            vec![PAGE_ONE, PAGE_TWO],
            &[
                ("https://site.test/e/1", DETAIL_OK),
                ("https://site.test/e/2", DETAIL_BAD_TIME),
                ("https://site.test/e/4", DETAIL_ONLINE),
            ],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn crawls_both_pages_recovering_from_rejections() {
        let mut crawler = FresqueCrawler::new(
            two_page_site(),
            StubResolver,
            Arc::new(AtomicBool::new(false)),
        );
        let mut records = Vec::new();
        crawler.run(SOURCE, &mut records).await.unwrap();

        let urls: Vec<&str> = records.iter().map(|r| r.event_page_url.as_str()).collect();
        assert_eq!(urls, vec!["https://site.test/e/1", "https://site.test/e/4"]);
        assert_eq!(records[0].department_code, "69");
        assert!(records[1].is_online);
        assert_eq!(records[1].street_address, "");

        let session = crawler.into_session();
        // the full event was filtered out at link collection
        assert!(!session
            .visited_details
            .contains(&"https://site.test/e/3".to_string()));
        // the bad-time rejection was visited, then recovered from
        assert!(session
            .visited_details
            .contains(&"https://site.test/e/2".to_string()));
        assert!(session.in_frame, "crawl must end inside the listing iframe");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_iframe_is_crawl_fatal() {
        let mut site = two_page_site();
        site.has_iframe = false;
        let mut crawler =
            FresqueCrawler::new(site, StubResolver, Arc::new(AtomicBool::new(false)));
        let mut records = Vec::new();
        let err = crawler.run(SOURCE, &mut records).await.unwrap_err();
        assert!(matches!(err, CrawlerError::StructuralPage(_)));
        assert!(records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_before_the_next_detail_visit() {
        let cancelled = Arc::new(AtomicBool::new(true));
        let mut crawler = FresqueCrawler::new(two_page_site(), StubResolver, cancelled);
        let mut records = Vec::new();
        crawler.run(SOURCE, &mut records).await.unwrap();
        assert!(records.is_empty());
        assert!(crawler.into_session().visited_details.is_empty());
    }
}
