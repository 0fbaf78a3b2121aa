//! Text cleaning, domain extraction and small string helpers.
//!
//! This module provides the leaf functions every scraper relies on:
//! - Whitespace normalization for scraped text
//! - HTML to plain-text conversion
//! - Registrable-domain extraction from URLs
//! - Truncation for summaries and log lines
//! - File system validation for output directories

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

use crate::dom::{SCRIPT_TAGS, collect_text};
use crate::error::ParseError;

static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").expect("static regex"));
static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").expect("static regex"));

/// Second-to-last labels that usually mark a two-part public suffix (`.co.uk`, `.com.au`).
const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "ac", "gov", "org", "net"];

/// Collapse redundant whitespace in scraped text.
///
/// - Runs of spaces become one space
/// - Runs of newlines become one newline
/// - Every line is trimmed and blank lines are dropped
///
/// Only ASCII spaces and `\n` are collapsed; other whitespace survives
/// inside a line. The function is idempotent.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_text("a   b\n\n\nc  "), "a b\nc");
/// ```
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let spaced = SPACE_RUNS.replace_all(text, " ");
    let lined = NEWLINE_RUNS.replace_all(&spaced, "\n");
    lined
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert an HTML string to readable text.
///
/// The markup is parsed with a tolerant HTML5 parser, so malformed input is
/// never an error. With `remove_scripts`, `<script>` and `<style>` contents
/// are dropped. Entities left over after parsing (double-escaped input such
/// as `&amp;eacute;`) are decoded before the text is normalized.
pub fn html_to_text(html: &str, remove_scripts: bool) -> String {
    if html.is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);
    let skip: &[&str] = if remove_scripts { SCRIPT_TAGS } else { &[] };
    let text = collect_text(document.root_element(), skip);
    normalize_text(&decode_html_entities(&text))
}

/// `host[:port]` of a parsed URL, the way it appears in the authority.
pub fn authority(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Parse an absolute URL, keeping the offending input in the error.
pub fn parse_url(url: &str) -> Result<Url, ParseError> {
    Url::parse(url.trim()).map_err(|source| ParseError::Url {
        url: url.to_string(),
        source,
    })
}

/// True for absolute `http`/`https` URLs that have a host.
pub fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// Text between `://` and the first `/`, `?` or `#`.
fn raw_authority(candidate: &str) -> &str {
    let rest = candidate
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(candidate);
    rest.split(['/', '?', '#']).next().unwrap_or_default()
}

/// Extract the domain of a URL.
///
/// Scheme-less input is treated as `http://...`, so `"api.github.com"` works.
/// The authority is taken verbatim from the input: no punycode conversion,
/// no case folding, and an explicit port stays attached even when it is the
/// scheme's default. With `include_subdomain` that authority is returned as
/// is. Otherwise it is reduced to its last two labels, or three when the
/// second-to-last label is one of `co`, `com`, `ac`, `gov`, `org`, `net`.
///
/// This is a heuristic, not a public-suffix lookup: `foo.bar.baz` becomes
/// `bar.baz` even when `baz` is not a real TLD, suffixes such as `.gouv.fr`
/// are not recognised, and an IPv4 address is cut like any other host
/// (`192.168.1.10` gives `1.10`).
///
/// # Arguments
///
/// * `url` - Absolute URL, protocol-relative URL or bare `host/path`
/// * `include_subdomain` - Return the whole authority instead of the reduced domain
///
/// # Returns
///
/// The domain, or an empty string for empty input.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(extract_domain("https://www.example.com/path?q=1", false), "example.com");
/// assert_eq!(extract_domain("https://www.example.com/path?q=1", true), "www.example.com");
/// assert_eq!(extract_domain("https://subdomain.example.co.uk/page", false), "example.co.uk");
/// ```
pub fn extract_domain(url: &str, include_subdomain: bool) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }

    let candidate = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with("//") {
        format!("http:{url}")
    } else {
        format!("http://{url}")
    };
    let host = raw_authority(&candidate);

    if include_subdomain {
        return host.to_string();
    }

    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();
    if n <= 2 {
        return host.to_string();
    }
    if SECOND_LEVEL_LABELS.contains(&labels[n - 2]) {
        labels[n - 3..].join(".")
    } else {
        labels[n - 2..].join(".")
    }
}

/// Keep the first `max` characters, appending `...` when something was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
        None => s.to_string(),
    }
}

/// Ensure the parent directory of `path` exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_parent(path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).await?;
    // Check with a real write.
    let probe_path = dir.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!(dir = %dir.display(), "Output directory is writable");
    Ok(())
}
