//! Search results from DuckDuckGo's HTML endpoint.
//!
//! Result links point at a `/l/?uddg=<target>` redirect; the target is
//! unwrapped so callers get the real destination.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::dom::inline_text;
use crate::fetcher::{FetchPolicy, Fetcher, SendRequest};
use crate::models::SearchResult;
use crate::utils::{extract_domain, is_http_url, normalize_text};

pub const DUCKDUCKGO_HTML: &str = "https://html.duckduckgo.com/html/";

/// Timeout applied to search requests regardless of the caller's policy.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

static RESULT: Lazy<Selector> = Lazy::new(|| Selector::parse("div.result").expect("static selector"));
static RESULT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a").expect("static selector"));
static SNIPPET: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result__snippet").expect("static selector"));

/// Query URL for `query`.
pub fn search_url(query: &str) -> String {
    format!("{DUCKDUCKGO_HTML}?q={}", urlencoding::encode(query))
}

/// Make a result href absolute and strip DuckDuckGo's redirect wrapper.
pub fn resolve_result_url(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = match Url::parse(&absolute) {
        Ok(url) => url,
        Err(_) => Url::parse(DUCKDUCKGO_HTML).ok()?.join(href).ok()?,
    };

    let target = match parsed.query_pairs().find(|(k, _)| k == "uddg") {
        Some((_, target)) if parsed.path().starts_with("/l/") => target.into_owned(),
        _ => parsed.to_string(),
    };
    is_http_url(&target).then_some(target)
}

fn parse_result(result: ElementRef<'_>) -> Option<SearchResult> {
    let link = result.select(&RESULT_LINK).next()?;
    let title = normalize_text(&inline_text(link, &[]));
    let url = link.value().attr("href").and_then(resolve_result_url)?;
    if title.is_empty() {
        return None;
    }
    let description = result
        .select(&SNIPPET)
        .next()
        .map(|s| normalize_text(&inline_text(s, &[])))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "N/A".to_string());

    Some(SearchResult {
        domain: extract_domain(&url, false),
        title,
        url,
        description,
    })
}

/// Parse a DuckDuckGo HTML results page, looking at the first `num_results` result blocks.
pub fn parse_results(html: &str, num_results: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let blocks: Vec<ElementRef<'_>> = document.select(&RESULT).collect();
    debug!(blocks = blocks.len(), "Search result blocks");

    blocks
        .into_iter()
        .take(num_results)
        .filter_map(|block| {
            let parsed = parse_result(block);
            if parsed.is_none() {
                debug!("Skipping result without title or link");
            }
            parsed
        })
        .collect()
}

/// Run a search. Failures are logged and give an empty list.
///
/// # Arguments
///
/// * `query` - Free-text query, URL-encoded here
/// * `num_results` - Result blocks examined; invalid ones are dropped, so fewer may come back
/// * `policy` - Retry settings; the timeout is replaced by [`SEARCH_TIMEOUT`]
#[instrument(level = "info", skip(fetcher, policy))]
pub async fn search<T: SendRequest>(
    fetcher: &mut Fetcher<T>,
    query: &str,
    num_results: usize,
    policy: &FetchPolicy,
) -> Vec<SearchResult> {
    let url = search_url(query);
    let policy = policy.clone().with_timeout(SEARCH_TIMEOUT);
    match fetcher.get_text(&url, &policy).await {
        Ok(html) => {
            let results = parse_results(&html, num_results);
            info!(count = results.len(), "Search finished");
            results
        }
        Err(e) => {
            warn!(error = %e, status = ?e.status(), "Search failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::mock::{MockTransport, fetcher, quick_policy};

    const RESULTS: &str = r##"<html><body>
      <div class="results">
        <div class="result results_links web-result">
          <h2 class="result__title">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdocs.python.org%2F3%2Flibrary%2Fhtml.parser.html&amp;rut=abc">
              Python   <b>HTML</b> parser
            </a>
          </h2>
          <a class="result__snippet" href="#">A   simple parser
            for HTML.</a>
        </div>
        <div class="result results_links web-result">
          <a class="result__a" href="https://www.crummy.com/software/BeautifulSoup/">Beautiful Soup</a>
        </div>
        <div class="result">
          <a class="result__a" href="https://empty.example.com/">   </a>
        </div>
        <div class="result">
          <a class="result__a" href="https://scrapy.org/">Scrapy</a>
        </div>
      </div>
    </body></html>"##;

    #[test]
    fn test_search_url_encodes_query() {
        assert_eq!(
            search_url("rust web scraping & more"),
            "https://html.duckduckgo.com/html/?q=rust%20web%20scraping%20%26%20more"
        );
    }

    #[test]
    fn test_parse_results() {
        let results = parse_results(RESULTS, 10);

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0],
            SearchResult {
                title: "Python HTML parser".to_string(),
                url: "https://docs.python.org/3/library/html.parser.html".to_string(),
                domain: "python.org".to_string(),
                description: "A simple parser for HTML.".to_string(),
            }
        );
        assert_eq!(results[1].title, "Beautiful Soup");
        assert_eq!(results[1].domain, "crummy.com");
        assert_eq!(results[1].description, "N/A");
        assert_eq!(results[2].url, "https://scrapy.org/");
    }

    #[test]
    fn test_parse_results_limits_blocks() {
        // The third block is invalid, so only two of the first three survive.
        let results = parse_results(RESULTS, 3);
        assert_eq!(results.len(), 2);
        assert!(parse_results(RESULTS, 0).is_empty());
    }

    #[test]
    fn test_resolve_result_url() {
        assert_eq!(
            resolve_result_url("/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1").as_deref(),
            Some("https://example.com/a?b=1")
        );
        assert_eq!(
            resolve_result_url("//example.com/path").as_deref(),
            Some("https://example.com/path")
        );
        assert_eq!(
            resolve_result_url("https://example.com/").as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(resolve_result_url("  "), None);
    }

    #[test]
    fn test_redirect_targets_must_be_web_urls() {
        assert_eq!(resolve_result_url("/l/?uddg=javascript%3Aalert(1)"), None);
        assert_eq!(resolve_result_url("/l/?uddg=%2Frelative%2Fpage"), None);
        assert_eq!(resolve_result_url("//duckduckgo.com/l/?uddg=mailto%3Aa%40b.c"), None);
        assert_eq!(resolve_result_url("javascript:void(0)"), None);
        assert_eq!(
            resolve_result_url("//duckduckgo.com/l/?uddg=http%3A%2F%2Fplain.example%2F").as_deref(),
            Some("http://plain.example/")
        );
    }

    #[tokio::test]
    async fn test_search_uses_long_timeout() {
        let url = search_url("python parser");
        let mut fetcher = fetcher(MockTransport::new().with_page(&url, RESULTS));

        let results = search(&mut fetcher, "python parser", 2, &quick_policy()).await;
        assert_eq!(results.len(), 2);
        let calls = fetcher.transport().unwrap().calls();
        assert_eq!(calls[0].timeout, SEARCH_TIMEOUT);
    }

    #[tokio::test]
    async fn test_search_failure_is_empty() {
        let mut fetcher = fetcher(MockTransport::new());
        assert!(search(&mut fetcher, "anything", 5, &quick_policy()).await.is_empty());
    }
}
