//! RSS news pipeline.
//!
//! Walks a list of feeds one after the other, reads a bounded number of
//! items from each and, when full content is requested, extracts the
//! article behind every item. Fixed pauses between articles and between
//! feeds keep the load on the target sites low.
//!
//! A feed that cannot be fetched contributes nothing; an article that cannot
//! be extracted leaves its record with the feed fields only. Neither stops
//! the batch.

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::fetcher::{FetchPolicy, Fetcher, SendRequest};
use crate::models::{FeedSource, NewsRecord};
use crate::scrapers::article::extract_article;
use crate::scrapers::feeds::fetch_feed;
use crate::utils::truncate_for_log;

/// Limits, pacing and fetch policy for one [`scrape_news`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsSettings {
    pub max_feeds: usize,
    pub max_articles_per_feed: usize,
    /// Extract the article behind each item instead of keeping feed fields only.
    pub full_content: bool,
    /// Pause before each article request.
    pub article_pause: Duration,
    /// Pause after each feed.
    pub feed_pause: Duration,
    pub policy: FetchPolicy,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            max_feeds: 5,
            max_articles_per_feed: 5,
            full_content: true,
            article_pause: Duration::from_secs(1),
            feed_pause: Duration::from_secs(2),
            policy: FetchPolicy::default().with_timeout(Duration::from_secs(15)),
        }
    }
}

/// Scrape `feeds` into a flat list of records, feed order then item order.
///
/// Feeds are read one at a time, at most `settings.max_feeds` of them, and
/// each contributes its first `settings.max_articles_per_feed` items. With
/// `full_content`, every item's article is extracted and merged into the
/// record. A feed or article that fails is logged and skipped.
///
/// # Arguments
///
/// * `fetcher` - HTTP session shared by every request of the run
/// * `feeds` - Sources in the order they should be read
/// * `settings` - Limits, pauses and the fetch policy for the pipeline
///
/// # Returns
///
/// One [`NewsRecord`] per kept feed item. Empty when every feed failed.
#[instrument(level = "info", skip_all, fields(feeds = feeds.len()))]
pub async fn scrape_news<T: SendRequest>(
    fetcher: &mut Fetcher<T>,
    feeds: &[FeedSource],
    settings: &NewsSettings,
) -> Vec<NewsRecord> {
    let start_time = Instant::now();
    let mut records = Vec::new();

    for source in feeds.iter().take(settings.max_feeds) {
        if source.url.trim().is_empty() {
            warn!(category = %source.category, "Feed without URL; skipping");
            continue;
        }

        let items = fetch_feed(fetcher, source, &settings.policy).await;
        let total_items = items.len();

        for item in items.into_iter().take(settings.max_articles_per_feed) {
            if !settings.full_content || item.url.is_empty() {
                records.push(NewsRecord::from_item(item));
                continue;
            }

            sleep(settings.article_pause).await;
            debug!(url = %truncate_for_log(&item.url, 80), "Scraping article");
            let article = extract_article(fetcher, &item.url, &settings.policy).await;
            if article.is_empty() {
                warn!(url = %item.url, "Keeping feed fields only");
            }
            records.push(NewsRecord::merge(item, article));
        }

        info!(
            category = %source.category,
            items = total_items,
            records = records.len(),
            "Feed done"
        );
        sleep(settings.feed_pause).await;
    }

    let elapsed = start_time.elapsed();
    info!(count = records.len(), secs = elapsed.as_secs(), "News scrape complete");
    records
}
