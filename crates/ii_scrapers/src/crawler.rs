use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use ii_core::{ArticleRecord, Corpus, Error, Result};
use ii_inference::EntityExtractor;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetcher::{HttpFetcher, PageFetcher, DEFAULT_USER_AGENT};
use crate::parsers::{PageParser, SiteLayout};

/// Which article text is handed to the entity recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntitySource {
    #[default]
    Title,
    Body,
    TitleAndBody,
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Listing pages or articles fetched at once.
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub layout: SiteLayout,
    pub entity_source: EntitySource,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            layout: SiteLayout::default(),
            entity_source: EntitySource::default(),
        }
    }
}

/// Counters for one crawl run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_requested: usize,
    pub pages_failed: usize,
    pub links_discovered: usize,
    pub duplicate_links: usize,
    pub articles_failed: usize,
    pub articles_collected: usize,
}

/// Walks a range of listing pages and collects their articles into a [`Corpus`].
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    extractor: EntityExtractor,
    parser: PageParser,
    config: CrawlConfig,
}

impl Crawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: EntityExtractor,
        config: CrawlConfig,
    ) -> Result<Self> {
        let parser = config.layout.compile()?;
        Ok(Self {
            fetcher,
            extractor,
            parser,
            config,
        })
    }

    /// A crawler that fetches over HTTP.
    pub fn with_http(extractor: EntityExtractor, config: CrawlConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.request_timeout, &config.user_agent)?;
        Self::new(Arc::new(fetcher), extractor, config)
    }

    pub async fn crawl(
        &self,
        base_url: &str,
        start_page: u32,
        end_page: u32,
        step: u32,
    ) -> Result<Corpus> {
        self.crawl_with_stats(base_url, start_page, end_page, step)
            .await
            .map(|(corpus, _)| corpus)
    }

    /// Crawls pages `start_page, start_page + step, ...` below `end_page`.
    ///
    /// A page or article that cannot be fetched is logged and skipped. The returned corpus
    /// keeps discovery order and holds each article URL once.
    #[instrument(level = "info", skip(self))]
    pub async fn crawl_with_stats(
        &self,
        base_url: &str,
        start_page: u32,
        end_page: u32,
        step: u32,
    ) -> Result<(Corpus, CrawlStats)> {
        let base = parse_base_url(base_url)?;
        if step == 0 {
            return Err(Error::InvalidInput("step must be greater than zero".to_string()));
        }

        let mut stats = CrawlStats::default();
        if start_page >= end_page {
            info!("Empty page range, nothing to crawl");
            return Ok((Corpus::new(), stats));
        }

        let pages: Vec<u32> = (start_page..end_page).step_by(step as usize).collect();
        stats.pages_requested = pages.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        let listing_futures = pages.iter().map(|&page| {
            let semaphore = semaphore.clone();
            let base = &base;
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                match self.fetch_listing(base, page).await {
                    Ok(links) => Some(links),
                    Err(e) => {
                        warn!(page, error = %e, "Skipping listing page");
                        None
                    }
                }
            }
        });
        let listings = join_all(listing_futures).await;

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for listing in listings {
            let Some(listing) = listing else {
                stats.pages_failed += 1;
                continue;
            };
            for link in listing {
                stats.links_discovered += 1;
                if seen.insert(link.as_str().to_string()) {
                    links.push(link);
                } else {
                    stats.duplicate_links += 1;
                }
            }
        }
        debug!(articles = links.len(), "Discovered article links");

        // The permit covers the recognizer calls too, so inference traffic stays bounded.
        let article_futures = links.iter().map(|url| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                match self.fetcher.fetch(url).await {
                    Ok(html) => Some(self.build_record(url, &html).await),
                    Err(e) => {
                        warn!(%url, error = %e, "Skipping article");
                        None
                    }
                }
            }
        });
        let records = join_all(article_futures).await;

        let mut corpus = Corpus::new();
        for record in records {
            match record {
                Some(record) => {
                    corpus.push(record);
                }
                None => stats.articles_failed += 1,
            }
        }
        stats.articles_collected = corpus.len();

        info!(
            pages = stats.pages_requested,
            pages_failed = stats.pages_failed,
            articles = stats.articles_collected,
            articles_failed = stats.articles_failed,
            duplicates = stats.duplicate_links,
            recognizer = self.extractor.recognizer_name(),
            "Crawl finished"
        );
        Ok((corpus, stats))
    }

    async fn fetch_listing(&self, base: &Url, page: u32) -> Result<Vec<Url>> {
        let listing_url = listing_url(base, page)?;
        let html = self.fetcher.fetch(&listing_url).await?;
        let links = self
            .parser
            .parse_listing(&html)
            .into_iter()
            .filter_map(|href| match resolve_link(base, &href) {
                Some(url) => Some(url),
                None => {
                    debug!(%href, "Ignoring unusable link");
                    None
                }
            })
            .collect::<Vec<_>>();
        debug!(%listing_url, links = links.len(), "Parsed listing page");
        Ok(links)
    }

    async fn build_record(&self, url: &Url, html: &str) -> ArticleRecord {
        let article = self.parser.extract_article(html);
        let title_spans = match self.config.entity_source {
            EntitySource::Title | EntitySource::TitleAndBody => {
                self.extractor.extract_organization_spans(&article.title).await
            }
            EntitySource::Body => Vec::new(),
        };
        let mut organizations: Vec<String> = title_spans.iter().map(|s| s.text.clone()).collect();
        if matches!(
            self.config.entity_source,
            EntitySource::Body | EntitySource::TitleAndBody
        ) {
            organizations.extend(self.extractor.extract_organizations(&article.body).await);
        }
        ArticleRecord::new(url.as_str(), article.title, article.body)
            .with_organizations(organizations)
            .with_title_spans(title_spans)
    }
}

/// Accepts only absolute http(s) URLs with a host.
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim())
        .map_err(|e| Error::InvalidInput(format!("invalid base URL {:?}: {}", base_url, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::InvalidInput(format!(
            "base URL must be an absolute http(s) URL: {}",
            base_url
        )));
    }
    Ok(url)
}

/// `base` with the page index appended as one more path segment.
pub fn listing_url(base: &Url, page: u32) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::InvalidInput(format!("cannot append a path to {}", base)))?
        .pop_if_empty()
        .push(&page.to_string());
    Ok(url)
}

/// Resolves an href against the base URL and drops the fragment. Non-http links yield `None`.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ii_core::{EntityRecognizer, EntitySpan, EntityType, SpanTag};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        fn with(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| Error::fetch(url.as_str(), "status 404 Not Found"))
        }
    }

    /// Tags every capitalized word as an organization.
    #[derive(Debug)]
    struct CapitalizedRecognizer;

    #[async_trait]
    impl EntityRecognizer for CapitalizedRecognizer {
        fn name(&self) -> &str {
            "capitalized"
        }

        async fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>> {
            let mut spans = Vec::new();
            let mut offset = 0;
            for word in text.split(' ') {
                if word.chars().next().is_some_and(char::is_uppercase) {
                    spans.push(
                        EntitySpan::new(word, EntityType::Organization, SpanTag::Begin)
                            .with_offsets(offset, offset + word.len()),
                    );
                }
                offset += word.len() + 1;
            }
            Ok(spans)
        }
    }

    /// Records the peak number of concurrent calls.
    #[derive(Debug, Default)]
    struct CountingRecognizer {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl EntityRecognizer for CountingRecognizer {
        fn name(&self) -> &str {
            "counting"
        }

        async fn recognize(&self, _text: &str) -> Result<Vec<EntitySpan>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn listing(hrefs: &[&str]) -> String {
        hrefs
            .iter()
            .map(|href| format!(r#"<div class="col-md-6 lineg"><a href="{}">x</a></div>"#, href))
            .collect()
    }

    fn article(title: &str, body: &str) -> String {
        format!(
            r#"<h1>{}</h1><header class="inner-content"><p>{}</p></header>"#,
            title, body
        )
    }

    fn crawler(fetcher: Arc<MockFetcher>) -> Crawler {
        let extractor =
            EntityExtractor::new(Arc::new(CapitalizedRecognizer), Duration::from_secs(1));
        Crawler::new(fetcher, extractor, CrawlConfig::default()).unwrap()
    }

    #[test]
    fn test_listing_url() {
        let base = Url::parse("https://economynext.com/news").unwrap();
        assert_eq!(
            listing_url(&base, 30).unwrap().as_str(),
            "https://economynext.com/news/30"
        );
        let base = Url::parse("https://economynext.com/news/").unwrap();
        assert_eq!(
            listing_url(&base, 60).unwrap().as_str(),
            "https://economynext.com/news/60"
        );
    }

    #[test]
    fn test_resolve_link() {
        let base = Url::parse("https://x.lk/news").unwrap();
        assert_eq!(resolve_link(&base, "/a-1#top").unwrap().as_str(), "https://x.lk/a-1");
        assert_eq!(resolve_link(&base, "https://y.lk/b").unwrap().as_str(), "https://y.lk/b");
        assert!(resolve_link(&base, "mailto:desk@x.lk").is_none());
    }

    #[test]
    fn test_parse_base_url() {
        assert!(parse_base_url("https://x.lk").is_ok());
        assert!(matches!(parse_base_url("x.lk/news"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_base_url("ftp://x.lk"), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_invalid_inputs() {
        let crawler = crawler(Arc::new(MockFetcher::default()));
        assert!(matches!(
            crawler.crawl("not a url", 0, 10, 1).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            crawler.crawl("https://x.lk", 0, 10, 0).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_non_advancing_range_is_empty() {
        let fetcher = Arc::new(MockFetcher::default());
        let crawler = crawler(fetcher.clone());
        assert!(crawler.crawl("https://x.lk", 30, 30, 30).await.unwrap().is_empty());
        assert!(crawler.crawl("https://x.lk", 90, 30, 30).await.unwrap().is_empty());
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_crawl_dedups_and_skips_failures() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .with("https://x.lk/news/30", &listing(&["/a", "/b", "/a", "/missing"]))
                // page 60 is missing and must not abort the crawl
                .with("https://x.lk/news/90", &listing(&["https://x.lk/b", "/c"]))
                .with("https://x.lk/a", &article("Dialog signs deal", "Dialog signed a deal"))
                .with("https://x.lk/b", &article("Hemas profit", "Hemas reported profit"))
                .with("https://x.lk/c", "<p>no structure</p>"),
        );
        let crawler = crawler(fetcher.clone());
        let (corpus, stats) = crawler
            .crawl_with_stats("https://x.lk/news", 30, 100, 30)
            .await
            .unwrap();

        let urls: Vec<_> = corpus.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.lk/a", "https://x.lk/b", "https://x.lk/c"]);
        assert_eq!(corpus.articles()[0].detected_organizations, vec!["Dialog"]);
        assert_eq!(corpus.articles()[2].title, "No Title");
        assert_eq!(corpus.articles()[2].body, "No content found.");

        assert_eq!(stats.pages_requested, 3);
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.duplicate_links, 2);
        assert_eq!(stats.articles_failed, 1);
        assert_eq!(stats.articles_collected, 3);

        let article_requests = fetcher
            .requests()
            .into_iter()
            .filter(|u| u == "https://x.lk/b")
            .count();
        assert_eq!(article_requests, 1);
    }

    #[tokio::test]
    async fn test_entity_source_title_and_body() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .with("https://x.lk/1", &listing(&["/a"]))
                .with("https://x.lk/a", &article("Dialog news", "CSE closes higher")),
        );
        let extractor =
            EntityExtractor::new(Arc::new(CapitalizedRecognizer), Duration::from_secs(1));
        let config = CrawlConfig {
            entity_source: EntitySource::TitleAndBody,
            ..CrawlConfig::default()
        };
        let crawler = Crawler::new(fetcher, extractor, config).unwrap();
        let corpus = crawler.crawl("https://x.lk", 1, 2, 1).await.unwrap();
        assert_eq!(corpus.articles()[0].detected_organizations, vec!["Dialog", "CSE"]);
    }

    #[tokio::test]
    async fn test_title_spans_carry_positions() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .with("https://x.lk/1", &listing(&["/a"]))
                .with("https://x.lk/a", &article("Shares of Dialog rise", "Body text")),
        );
        let corpus = crawler(fetcher).crawl("https://x.lk", 1, 2, 1).await.unwrap();
        let record = &corpus.articles()[0];
        let located: Vec<_> = record
            .title_spans
            .iter()
            .filter_map(|span| span.range())
            .map(|range| &record.title[range])
            .collect();
        assert_eq!(located, vec!["Shares", "Dialog"]);
    }

    #[tokio::test]
    async fn test_body_source_leaves_title_spans_empty() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .with("https://x.lk/1", &listing(&["/a"]))
                .with("https://x.lk/a", &article("Dialog news", "Hemas results")),
        );
        let extractor =
            EntityExtractor::new(Arc::new(CapitalizedRecognizer), Duration::from_secs(1));
        let config = CrawlConfig {
            entity_source: EntitySource::Body,
            ..CrawlConfig::default()
        };
        let crawler = Crawler::new(fetcher, extractor, config).unwrap();
        let corpus = crawler.crawl("https://x.lk", 1, 2, 1).await.unwrap();
        assert_eq!(corpus.articles()[0].detected_organizations, vec!["Hemas"]);
        assert!(corpus.articles()[0].title_spans.is_empty());
    }

    #[tokio::test]
    async fn test_recognizer_calls_respect_concurrency() {
        let hrefs: Vec<String> = (0..20).map(|i| format!("/a{}", i)).collect();
        let hrefs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
        let mut fetcher = MockFetcher::default().with("https://x.lk/1", &listing(&hrefs));
        for href in &hrefs {
            fetcher = fetcher.with(&format!("https://x.lk{}", href), &article("Title", "Body"));
        }

        let recognizer = Arc::new(CountingRecognizer::default());
        let extractor = EntityExtractor::new(recognizer.clone(), Duration::from_secs(5));
        let config = CrawlConfig {
            concurrency: 2,
            ..CrawlConfig::default()
        };
        let crawler = Crawler::new(Arc::new(fetcher), extractor, config).unwrap();
        let corpus = crawler.crawl("https://x.lk", 1, 2, 1).await.unwrap();

        assert_eq!(corpus.len(), 20);
        assert!(recognizer.peak.load(Ordering::SeqCst) <= 2);
        assert!(recognizer.peak.load(Ordering::SeqCst) >= 1);
    }
}
