//! Data models produced by the scrapers.
//!
//! This module defines the records passed between the scrapers and the JSON output:
//! - [`PageSummary`]: title, headings, images, outbound links and body preview of one page
//! - [`Article`]: the main body of an article page plus its images
//! - [`FeedSource`] / [`FeedItem`]: RSS feeds and the entries they list
//! - [`SearchResult`]: one organic search hit
//! - [`NewsRecord`]: a feed entry merged with its scraped article
//!
//! Every URL stored in these records is absolute.

use serde::{Deserialize, Serialize};

/// Snapshot of one fetched HTML page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PageSummary {
    /// The page URL as requested.
    pub url: String,
    /// `host[:port]` of the page.
    pub domain: String,
    /// Text of the first `<title>`, or empty.
    pub title: String,
    /// Text of every `<h1>`, in document order.
    pub headings: Vec<String>,
    /// Absolute `src` of every `<img>` that has one.
    pub image_urls: Vec<String>,
    /// Absolute links pointing at another host.
    pub external_links: Vec<String>,
    /// Normalized visible text, cut at 1000 characters with a `...` marker.
    pub body_text: String,
}

/// An image found on an article page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleImage {
    /// Absolute `http(s)` URL.
    pub src: String,
    pub alt: String,
}

/// Main content of an article page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Article {
    pub url: String,
    pub domain: String,
    /// Text of the page's `<title>`.
    pub page_title: String,
    /// First `<h1>`, falling back to the page title.
    pub article_title: String,
    /// Full cleaned body; paragraphs separated by a blank line.
    pub body_text: String,
    pub images: Vec<ArticleImage>,
    pub image_count: usize,
}

impl Article {
    /// Placeholder returned when a page could not be fetched or parsed.
    pub fn empty(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// True for the placeholder built by [`Article::empty`].
    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
            && self.page_title.is_empty()
            && self.article_title.is_empty()
            && self.body_text.is_empty()
            && self.images.is_empty()
    }
}

/// A named RSS feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedSource {
    pub category: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(category: &str, url: &str) -> Self {
        Self {
            category: category.to_string(),
            url: url.to_string(),
        }
    }
}

/// One `<item>` of an RSS feed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub url: String,
    pub description: String,
    /// `pubDate` exactly as the feed wrote it.
    pub pub_date: String,
    /// `pubDate` converted to RFC 3339 when it parses as RFC 2822.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub published: Option<String>,
    pub category: String,
    pub domain: String,
}

/// One organic search hit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub domain: String,
    /// Snippet text, or `"N/A"` when the engine showed none.
    pub description: String,
}

/// A feed entry, optionally enriched with the article it links to.
///
/// Serialized flat: the feed fields first, then the article fields when the
/// article was scraped. `category` always comes from the feed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewsRecord {
    pub category: String,
    pub title: String,
    pub url: String,
    pub domain: String,
    pub description: String,
    pub pub_date: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub published: Option<String>,
    #[serde(flatten)]
    pub content: Option<ArticleContent>,
}

/// Article fields merged into a [`NewsRecord`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleContent {
    pub page_title: String,
    pub article_title: String,
    pub body_text: String,
    pub images: Vec<ArticleImage>,
    pub image_count: usize,
}

impl NewsRecord {
    /// Record carrying only what the feed said.
    pub fn from_item(item: FeedItem) -> Self {
        Self {
            category: item.category,
            title: item.title,
            url: item.url,
            domain: item.domain,
            description: item.description,
            pub_date: item.pub_date,
            published: item.published,
            content: None,
        }
    }

    /// Merge a scraped article into a feed entry. The article's domain wins when
    /// it has one, the feed category always wins.
    pub fn merge(item: FeedItem, article: Article) -> Self {
        let mut record = Self::from_item(item);
        if article.is_empty() {
            return record;
        }
        if !article.domain.is_empty() {
            record.domain = article.domain;
        }
        record.content = Some(ArticleContent {
            page_title: article.page_title,
            article_title: article.article_title,
            body_text: article.body_text,
            images: article.images,
            image_count: article.image_count,
        });
        record
    }

    /// Best title available: the article headline, then the feed title.
    pub fn display_title(&self) -> &str {
        self.content
            .as_ref()
            .map(|c| c.article_title.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.title)
    }
}
