//! Command-line interface definitions for Awful News Scraper.
//!
//! Global options tune the HTTP client and override the config file; each
//! subcommand runs one scraper and prints JSON to stdout.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::models::FeedSource;

/// Command-line arguments for the Awful News Scraper application.
///
/// # Examples
///
/// ```sh
/// # Summarize a page
/// awful_news_scraper page https://www.lemonde.fr/
///
/// # Search with five results and a longer retry delay
/// awful_news_scraper --retry-delay 2 search "rust web scraping" -n 5
///
/// # News from two feeds, two articles each
/// awful_news_scraper news \
///     --feed International=https://www.lemonde.fr/international/rss_full.xml \
///     --feed Politique=https://www.lemonde.fr/politique/rss_full.xml \
///     --max-articles 2 -o ./out/news.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "AWFUL_NEWS_SCRAPER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub http: HttpArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the fetch policy and identity rotation.
#[derive(Args, Debug, Clone, Default)]
pub struct HttpArgs {
    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<f64>,

    /// Retries after the first failed attempt
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Fixed pause between attempts, in seconds
    #[arg(long, global = true)]
    pub retry_delay: Option<f64>,

    /// Always send the first configured user agent
    #[arg(long, global = true)]
    pub no_rotate: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a URL and print status, headers and body
    Fetch {
        url: String,
        /// POST this JSON document instead of sending a GET
        #[arg(long, conflicts_with_all = ["post_text", "post_form"])]
        post_json: Option<String>,
        /// POST this text as the raw body
        #[arg(long, conflicts_with = "post_form")]
        post_text: Option<String>,
        /// POST a form field as KEY=VALUE; repeatable
        #[arg(long, value_parser = parse_form_field)]
        post_form: Vec<(String, String)>,
    },

    /// Summarize a page: title, headings, images, external links, text preview
    Page {
        url: String,
        /// Read the HTML from this file instead of fetching; URL resolves relative links
        #[arg(long)]
        html_file: Option<PathBuf>,
    },

    /// Extract the main article of a page
    Article {
        url: String,
        /// Read the HTML from this file instead of fetching; URL resolves relative links
        #[arg(long)]
        html_file: Option<PathBuf>,
    },

    /// Search DuckDuckGo
    Search {
        query: String,
        /// Number of results
        #[arg(short = 'n', long, default_value_t = 10)]
        num_results: usize,
    },

    /// List the RSS feeds linked from a page
    Feeds { url: String },

    /// Parse one RSS feed
    Feed {
        url: String,
        #[arg(long, default_value = "General")]
        category: String,
    },

    /// Scrape news from RSS feeds and write them to a JSON file
    News {
        /// Feed as CATEGORY=URL; repeatable. Replaces the configured feeds.
        #[arg(long = "feed", value_parser = parse_feed_arg)]
        feeds: Vec<FeedSource>,

        /// Output JSON file
        #[arg(short, long, default_value = "news_articles.json")]
        output: PathBuf,

        /// Items taken from each feed
        #[arg(long)]
        max_articles: Option<usize>,

        /// Feeds read at most
        #[arg(long)]
        max_feeds: Option<usize>,

        /// Keep feed fields only, skip article extraction
        #[arg(long)]
        feeds_only: bool,
    },

    /// Convert a local HTML file to plain text
    Text {
        path: PathBuf,
        /// Keep the contents of script and style elements
        #[arg(long)]
        keep_scripts: bool,
    },

    /// Print the domain of a URL
    Domain {
        url: String,
        #[arg(long)]
        include_subdomain: bool,
    },
}

/// Parse `KEY=VALUE`; the value may be empty.
fn parse_form_field(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, field)) if !key.trim().is_empty() => Ok((key.trim().to_string(), field.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {value:?}")),
    }
}

/// Parse `CATEGORY=URL`.
fn parse_feed_arg(value: &str) -> Result<FeedSource, String> {
    let (category, url) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=URL, got {value:?}"))?;
    let (category, url) = (category.trim(), url.trim());
    if category.is_empty() || url.is_empty() {
        return Err(format!("expected CATEGORY=URL, got {value:?}"));
    }
    Ok(FeedSource::new(category, url))
}
