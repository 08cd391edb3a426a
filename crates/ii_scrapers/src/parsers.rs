use ii_core::{Error, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

pub const NO_TITLE: &str = "No Title";
pub const NO_CONTENT: &str = "No content found.";

/// CSS selectors describing where links, headings and paragraphs live on the target site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    /// One element per article teaser on a listing page.
    pub listing_item: String,
    /// The link inside a teaser. Only the first match per teaser is used.
    pub listing_link: String,
    pub title: String,
    pub content: String,
    pub paragraph: String,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            listing_item: "div.col-md-6.lineg".to_string(),
            listing_link: "a[href]".to_string(),
            title: "h1".to_string(),
            content: "header.inner-content".to_string(),
            paragraph: "p".to_string(),
        }
    }
}

impl SiteLayout {
    pub fn compile(&self) -> Result<PageParser> {
        Ok(PageParser {
            listing_item: parse_selector(&self.listing_item)?,
            listing_link: parse_selector(&self.listing_link)?,
            title: parse_selector(&self.title)?,
            content: parse_selector(&self.content)?,
            paragraph: parse_selector(&self.paragraph)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| Error::InvalidInput(format!("Invalid selector {:?}: {}", selector, e)))
}

/// Title and body pulled from an article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub body: String,
}

/// Compiled [`SiteLayout`].
#[derive(Debug, Clone)]
pub struct PageParser {
    listing_item: Selector,
    listing_link: Selector,
    title: Selector,
    content: Selector,
    paragraph: Selector,
}

impl PageParser {
    /// Raw hrefs of the article links on a listing page, in document order.
    pub fn parse_listing(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.listing_item)
            .filter_map(|item| item.select(&self.listing_link).next())
            .filter_map(|link| link.value().attr("href"))
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty())
            .collect()
    }

    /// Title and body of an article page. Missing structure is replaced by placeholders.
    pub fn extract_article(&self, html: &str) -> ExtractedArticle {
        let document = Html::parse_document(html);

        let title = self.extract_title(&document).unwrap_or_else(|e| {
            debug!(error = %e, "Using title placeholder");
            NO_TITLE.to_string()
        });
        let body = self.extract_body(&document).unwrap_or_else(|e| {
            debug!(error = %e, "Using body placeholder");
            NO_CONTENT.to_string()
        });

        ExtractedArticle { title, body }
    }

    fn extract_title(&self, document: &Html) -> Result<String> {
        document
            .select(&self.title)
            .next()
            .map(element_text)
            .ok_or_else(|| Error::Extraction("no heading found".to_string()))
    }

    fn extract_body(&self, document: &Html) -> Result<String> {
        let container = document
            .select(&self.content)
            .next()
            .ok_or_else(|| Error::Extraction("no content container found".to_string()))?;

        Ok(container
            .select(&self.paragraph)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Text of an element with runs of whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
