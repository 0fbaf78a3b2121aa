//! RSS feeds: parsing `<item>` lists and discovering feed links on a page.

use chrono::DateTime;
use html_escape::decode_html_entities;
use itertools::Itertools;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};
use url::Url;

use crate::dom::inline_text;
use crate::error::ParseError;
use crate::fetcher::{FetchPolicy, Fetcher, SendRequest};
use crate::models::{FeedItem, FeedSource};
use crate::utils::{extract_domain, parse_url, truncate_for_log};

/// Category given to discovered feeds whose link has no text.
pub const DEFAULT_CATEGORY: &str = "General";

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static RSS_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"link[type="application/rss+xml"][href]"#).expect("static selector")
});

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"description" => Some(Self::Description),
            b"pubDate" => Some(Self::PubDate),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RawItem {
    title: String,
    link: String,
    description: String,
    pub_date: String,
}

impl RawItem {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::PubDate => &mut self.pub_date,
        };
        target.push_str(text);
    }

    fn into_item(self, category: &str) -> Result<FeedItem, ParseError> {
        let title = self.title.trim().to_string();
        let url = self.link.trim().to_string();
        if title.is_empty() && url.is_empty() {
            return Err(ParseError::EmptyItem);
        }
        let pub_date = self.pub_date.trim().to_string();
        let published = DateTime::parse_from_rfc2822(&pub_date)
            .ok()
            .map(|d| d.to_rfc3339());
        let domain = if url.is_empty() {
            String::new()
        } else {
            extract_domain(&url, false)
        };

        Ok(FeedItem {
            title,
            domain,
            url,
            description: self.description.trim().to_string(),
            pub_date,
            published,
            category: category.to_string(),
        })
    }
}

/// Parse every `<item>` of an RSS document.
///
/// Only the direct `title`, `link`, `description` and `pubDate` children are
/// read; namespaced variants such as `dc:title` are ignored. On malformed XML
/// the item being read is dropped and the items already complete are
/// returned. Repeated links keep their first occurrence.
///
/// # Arguments
///
/// * `xml` - RSS document text
/// * `category` - Category copied onto every item
///
/// # Returns
///
/// The items in document order, without duplicates.
pub fn parse_feed(xml: &str, category: &str) -> Vec<FeedItem> {
    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();
    let mut current: Option<RawItem> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"item" {
                    current = Some(RawItem::default());
                    field = None;
                } else if current.is_some() {
                    field = Field::from_tag(e.name().as_ref());
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                if e.name().as_ref() == b"item" {
                    if let Some(raw) = current.take() {
                        match raw.into_item(category) {
                            Ok(item) => items.push(item),
                            Err(e) => warn!(%category, error = %e, "Skipping feed item"),
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(raw), Some(f)) = (current.as_mut(), field) {
                    raw.push(f, &String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::CData(t)) => {
                if let (Some(raw), Some(f)) = (current.as_mut(), field) {
                    raw.push(f, &String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::GeneralRef(r)) => {
                if let (Some(raw), Some(f)) = (current.as_mut(), field) {
                    let entity = format!("&{};", String::from_utf8_lossy(&r));
                    raw.push(f, &decode_html_entities(&entity));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                let err = ParseError::Xml {
                    position: reader.error_position() as u64,
                    message: e.to_string(),
                };
                warn!(%category, error = %err, kept = items.len(), "Malformed feed, keeping complete items");
                break;
            }
        }
    }

    let items: Vec<FeedItem> = items
        .into_iter()
        .unique_by(|item| {
            if item.url.is_empty() {
                (String::new(), item.title.clone())
            } else {
                (item.url.clone(), String::new())
            }
        })
        .collect();
    info!(%category, count = items.len(), "Parsed feed");
    items
}

/// Fetch and parse one feed. Failures are logged and give an empty list.
#[instrument(level = "info", skip_all, fields(category = %source.category, url = %source.url))]
pub async fn fetch_feed<T: SendRequest>(
    fetcher: &mut Fetcher<T>,
    source: &FeedSource,
    policy: &FetchPolicy,
) -> Vec<FeedItem> {
    match fetcher.get_text(&source.url, policy).await {
        Ok(xml) => parse_feed(&xml, &source.category),
        Err(e) => {
            warn!(error = %e, status = ?e.status(), "Feed fetch failed");
            Vec::new()
        }
    }
}

/// Feed links on an HTML page: anchors whose `href` mentions `rss` and
/// `<link type="application/rss+xml">` declarations, resolved against `base`.
pub fn feeds_in_html(base: &Url, html: &str) -> Vec<FeedSource> {
    let document = Html::parse_document(html);

    let anchors = document.select(&ANCHOR).filter_map(|a| {
        let href = a.value().attr("href")?.trim();
        href.to_ascii_lowercase()
            .contains("rss")
            .then(|| (inline_text(a, &[]), href))
    });
    let declared = document.select(&RSS_LINK).filter_map(|link| {
        let href = link.value().attr("href")?.trim();
        let title = link.value().attr("title").unwrap_or_default().trim();
        Some((title.to_string(), href))
    });

    declared
        .chain(anchors)
        .filter(|(_, href)| !href.is_empty())
        .filter_map(|(text, href)| match base.join(href) {
            Ok(url) => Some(FeedSource {
                category: if text.is_empty() {
                    DEFAULT_CATEGORY.to_string()
                } else {
                    text
                },
                url: url.to_string(),
            }),
            Err(e) => {
                warn!(href = %truncate_for_log(href, 120), error = %e, "Unresolvable feed link");
                None
            }
        })
        .unique_by(|source| source.url.clone())
        .collect()
}

/// Fetch `page_url` and list the feeds it links to. Empty on failure.
#[instrument(level = "info", skip(fetcher, policy))]
pub async fn discover_feeds<T: SendRequest>(
    fetcher: &mut Fetcher<T>,
    page_url: &str,
    policy: &FetchPolicy,
) -> Vec<FeedSource> {
    let base = match parse_url(page_url) {
        Ok(base) => base,
        Err(e) => {
            warn!(error = %e, "Invalid feed page URL");
            return Vec::new();
        }
    };
    match fetcher.get_text(page_url, policy).await {
        Ok(html) => {
            let feeds = feeds_in_html(&base, &html);
            info!(count = feeds.len(), "Discovered feeds");
            feeds
        }
        Err(e) => {
            warn!(error = %e, status = ?e.status(), "Feed page fetch failed");
            Vec::new()
        }
    }
}
