pub mod crawler;
pub mod fetcher;
pub mod logging;
pub mod parsers;

pub use crawler::{CrawlConfig, CrawlStats, Crawler, EntitySource};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use logging::init_logging;
pub use parsers::{ExtractedArticle, PageParser, SiteLayout, NO_CONTENT, NO_TITLE};
