//! Page summaries.
//!
//! A [`PageSummary`] captures what a quick look at a page gives you: its
//! `<title>`, every `<h1>`, absolute image URLs, links leaving the site and
//! the first 1000 characters of visible text (navigation, header and footer
//! excluded).

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use crate::dom::{PAGE_CHROME_TAGS, collect_text, inline_text};
use crate::error::{ParseError, ScrapeError};
use crate::fetcher::{FetchPolicy, Fetcher, SendRequest};
use crate::models::PageSummary;
use crate::utils::{authority, normalize_text, parse_url, truncate_chars};

/// Characters of body text kept in a summary.
pub const BODY_PREVIEW_CHARS: usize = 1000;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("static selector"));
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("static selector"));
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("static selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

/// Fetch `url` and summarize it.
///
/// # Errors
///
/// [`ScrapeError::Parse`] if `url` is not absolute, [`ScrapeError::Fetch`]
/// once the fetcher has given up.
#[instrument(level = "info", skip(fetcher, policy))]
pub async fn parse_page<T: SendRequest>(
    fetcher: &mut Fetcher<T>,
    url: &str,
    policy: &FetchPolicy,
) -> Result<PageSummary, ScrapeError> {
    let base = parse_url(url)?;
    let html = fetcher.get_text(url, policy).await?;
    let document = Html::parse_document(&html);
    let summary = summarize_document(url, &base, &document);
    info!(
        title = %summary.title,
        headings = summary.headings.len(),
        images = summary.image_urls.len(),
        external_links = summary.external_links.len(),
        "Parsed page"
    );
    Ok(summary)
}

/// Summarize already downloaded HTML.
///
/// # Arguments
///
/// * `url` - Address the HTML came from; relative links resolve against it
/// * `html` - Page markup
///
/// # Returns
///
/// The summary, or [`ParseError::Url`] when `url` is not absolute.
pub fn summarize_html(url: &str, html: &str) -> Result<PageSummary, ParseError> {
    let base = parse_url(url)?;
    Ok(summarize_document(url, &base, &Html::parse_document(html)))
}

pub(crate) fn summarize_document(url: &str, base: &Url, document: &Html) -> PageSummary {
    let title = document
        .select(&TITLE)
        .next()
        .map(|t| inline_text(t, &[]))
        .unwrap_or_default();

    let headings = document
        .select(&H1)
        .map(|h| inline_text(h, &[]))
        .collect();

    let image_urls = document
        .select(&IMG)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .filter_map(|src| base.join(src).ok())
        .map(|u| u.to_string())
        .collect();

    // `url` lowercases hosts, so a plain string compare is enough.
    let page_host = authority(base);
    let external_links = document
        .select(&LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| base.join(href).ok())
        .filter(|link| {
            let host = authority(link);
            !host.is_empty() && host != page_host
        })
        .map(|u| u.to_string())
        .collect();

    let text = normalize_text(&collect_text(document.root_element(), PAGE_CHROME_TAGS));
    debug!(chars = text.chars().count(), "Extracted page text");

    PageSummary {
        url: url.to_string(),
        domain: page_host,
        title,
        headings,
        image_urls,
        external_links,
        body_text: truncate_chars(&text, BODY_PREVIEW_CHARS),
    }
}
