//! # Awful News Scraper
//!
//! A web-scraping toolkit: an HTTP client with bounded retry and user-agent
//! rotation, page summaries, article extraction, DuckDuckGo search and an
//! RSS news pipeline that writes its results as JSON.
//!
//! ## Usage
//!
//! ```sh
//! awful_news_scraper article https://www.lemonde.fr/international/article/...
//! awful_news_scraper news --max-articles 2 -o news_articles.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: [`fetcher::Fetcher`] owns the HTTP session and runs the retry loop
//! 2. **Scraping**: [`scrapers`] turn fetched HTML or XML into typed records
//! 3. **Pipeline**: [`news`] chains feeds and article extraction with fixed pauses
//! 4. **Output**: [`outputs::json`] writes the collected records
//!
//! Everything runs sequentially on a single-threaded runtime.

use clap::Parser;
use reqwest::header::HeaderMap;
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dom;
mod error;
mod fetcher;
mod models;
mod news;
mod outputs;
mod scrapers;
mod utils;

use cli::{Cli, Command, HttpArgs};
use config::ScraperConfig;
use fetcher::{FetchOptions, Fetcher, ReqwestTransport, RequestBody, SendRequest};
use models::FeedSource;
use outputs::json as json_output;
use utils::{extract_domain, html_to_text, truncate_for_log};

/// Apply command-line overrides on top of the file configuration.
fn apply_overrides(config: &mut ScraperConfig, http: &HttpArgs) {
    if let Some(timeout) = http.timeout {
        config.timeout_secs = timeout;
        config.news_timeout_secs = timeout;
    }
    if let Some(max_retries) = http.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(retry_delay) = http.retry_delay {
        config.retry_delay_secs = retry_delay;
    }
    if http.no_rotate {
        config.rotate_user_agent = false;
    }
}

fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Request payload from the `fetch` flags; `None` means a plain GET.
fn request_body(
    post_json: Option<String>,
    post_text: Option<String>,
    post_form: Vec<(String, String)>,
) -> Result<Option<RequestBody>, serde_json::Error> {
    Ok(match (post_json, post_text) {
        (Some(json), _) => Some(RequestBody::Json(serde_json::from_str(&json)?)),
        (None, Some(text)) => Some(RequestBody::Text(text)),
        (None, None) if !post_form.is_empty() => Some(RequestBody::Form(post_form)),
        (None, None) => None,
    })
}

fn print_json<S: serde::Serialize>(value: &S) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one subcommand, printing its result to stdout.
async fn run<T: SendRequest>(
    fetcher: &mut Fetcher<T>,
    command: Command,
    config: &ScraperConfig,
) -> Result<(), Box<dyn Error>> {
    let policy = config.fetch_policy();

    match command {
        Command::Fetch {
            url,
            post_json,
            post_text,
            post_form,
        } => {
            let outcome = match request_body(post_json, post_text, post_form)? {
                Some(body) => {
                    let options = FetchOptions {
                        body: Some(body),
                        ..FetchOptions::default()
                    };
                    fetcher.post(&url, &policy, &options).await
                }
                None => fetcher.get(&url, &policy).await,
            };
            let result = outcome.inspect_err(|e| {
                if let Some(status) = e.status() {
                    warn!(%url, status, "Server refused the request");
                }
            })?;
            let text = result.text();
            debug!(body = %truncate_for_log(&text, 200), "Response body");
            print_json(&json!({
                "url": url,
                "status": result.status,
                "headers": headers_to_map(&result.headers),
                "body": text,
            }))?;
        }
        Command::Page { url, html_file } => {
            let summary = match html_file {
                Some(path) => {
                    let html = tokio::fs::read_to_string(&path).await?;
                    scrapers::page::summarize_html(&url, &html)?
                }
                None => scrapers::page::parse_page(fetcher, &url, &policy).await?,
            };
            print_json(&summary)?;
        }
        Command::Article { url, html_file } => {
            let extraction = match html_file {
                Some(path) => {
                    let html = tokio::fs::read_to_string(&path).await?;
                    scrapers::article::extract_from_html(&url, &html)?
                }
                None => scrapers::article::try_extract_article(fetcher, &url, &policy).await?,
            };
            match extraction.body_selector {
                Some(selector) => info!(selector, "Article body located"),
                None => warn!("No article body; printed text is the page preview"),
            }
            print_json(&extraction.article)?;
        }
        Command::Search { query, num_results } => {
            let results = scrapers::search::search(fetcher, &query, num_results, &policy).await;
            print_json(&results)?;
        }
        Command::Feeds { url } => {
            let feeds = scrapers::feeds::discover_feeds(fetcher, &url, &policy).await;
            print_json(&feeds)?;
        }
        Command::Feed { url, category } => {
            let source = FeedSource::new(&category, &url);
            let settings = config.news_settings();
            let items = scrapers::feeds::fetch_feed(fetcher, &source, &settings.policy).await;
            print_json(&items)?;
        }
        Command::News {
            feeds,
            output,
            max_articles,
            max_feeds,
            feeds_only,
        } => {
            let feeds = if feeds.is_empty() {
                config.feeds.clone()
            } else {
                feeds
            };
            let mut settings = config.news_settings();
            if let Some(n) = max_articles {
                settings.max_articles_per_feed = n;
            }
            if let Some(n) = max_feeds {
                settings.max_feeds = n;
            }
            if feeds_only {
                settings.full_content = false;
            }
            info!(
                feeds = feeds.len(),
                max_feeds = settings.max_feeds,
                max_articles_per_feed = settings.max_articles_per_feed,
                full_content = settings.full_content,
                "Starting news scrape"
            );

            let records = news::scrape_news(fetcher, &feeds, &settings).await;
            json_output::write_records(&records, &output).await?;

            for record in &records {
                println!(
                    "[{}] {} <{}>",
                    record.category,
                    record.display_title(),
                    record.url
                );
            }
            println!("{} records written to {}", records.len(), output.display());
        }
        Command::Text { path, keep_scripts } => {
            let html = tokio::fs::read_to_string(&path).await?;
            println!("{}", html_to_text(&html, !keep_scripts));
        }
        Command::Domain {
            url,
            include_subdomain,
        } => {
            println!("{}", extract_domain(&url, include_subdomain));
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args.config, ?args.http, "Parsed CLI arguments");

    let mut config = match &args.config {
        Some(path) => ScraperConfig::load(path)?,
        None => ScraperConfig::default(),
    };
    apply_overrides(&mut config, &args.http);
    config.validate()?;

    let transport = ReqwestTransport::new()?;
    let mut fetcher = Fetcher::new(
        transport,
        config.user_agent_pool(),
        config.rotate_user_agent,
    )?;
    info!(
        user_agents = fetcher.user_agents().len(),
        user_agent = fetcher.user_agent(),
        rotate = config.rotate_user_agent,
        "HTTP session ready"
    );

    let outcome = run(&mut fetcher, args.command, &config).await;
    fetcher.close();

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = ScraperConfig::default();
        let http = HttpArgs {
            timeout: Some(4.0),
            max_retries: Some(0),
            retry_delay: Some(0.5),
            no_rotate: true,
        };

        apply_overrides(&mut config, &http);

        let policy = config.fetch_policy();
        assert_eq!(policy.timeout, Duration::from_secs(4));
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.retry_delay, Duration::from_millis(500));
        assert_eq!(config.news_settings().policy.timeout, Duration::from_secs(4));
        assert!(!config.rotate_user_agent);
    }

    #[test]
    fn test_no_overrides_keep_file_values() {
        let mut config = ScraperConfig::default();
        apply_overrides(&mut config, &HttpArgs::default());
        assert_eq!(config, ScraperConfig::default());
    }

    #[test]
    fn test_request_body_from_fetch_flags() {
        assert!(request_body(None, None, Vec::new()).unwrap().is_none());

        match request_body(Some(r#"{"a": 1}"#.to_string()), None, Vec::new()).unwrap() {
            Some(RequestBody::Json(value)) => assert_eq!(value, json!({"a": 1})),
            other => panic!("unexpected body: {other:?}"),
        }
        match request_body(None, Some("hello".to_string()), Vec::new()).unwrap() {
            Some(RequestBody::Text(text)) => assert_eq!(text, "hello"),
            other => panic!("unexpected body: {other:?}"),
        }
        let form = vec![("k".to_string(), "v".to_string())];
        match request_body(None, None, form.clone()).unwrap() {
            Some(RequestBody::Form(pairs)) => assert_eq!(pairs, form),
            other => panic!("unexpected body: {other:?}"),
        }
        assert!(request_body(Some("{not json".to_string()), None, Vec::new()).is_err());
    }

    #[test]
    fn test_headers_to_map() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/html".parse().unwrap());
        let map = headers_to_map(&headers);
        assert_eq!(map.get("content-type").map(String::as_str), Some("text/html"));
    }
}
