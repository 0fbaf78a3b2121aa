//! Article extraction.
//!
//! The main text of an article page is located with an ordered list of CSS
//! selectors. The first selector that matches anything wins, even when a
//! later one would have found a richer region. When none matches, the page
//! summary's body text is used instead.
//!
//! Page chrome (`script`, `style`, `nav`, `footer`, `header`, `aside`,
//! `iframe`) is invisible to every selection made here.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::dom::{ARTICLE_NOISE_TAGS, first_attr, inline_text, select_visible};
use crate::error::{ParseError, ScrapeError};
use crate::fetcher::{FetchPolicy, Fetcher, SendRequest};
use crate::models::{Article, ArticleImage, PageSummary};
use crate::scrapers::page::summarize_document;
use crate::utils::{authority, is_http_url, normalize_text, parse_url};

/// Body selectors, tried in this order.
pub const BODY_SELECTOR_CSS: &[&str] = &[
    "article",
    r#"[class*="article-content"]"#,
    r#"[class*="article-body"]"#,
    r#"[class*="post-content"]"#,
    r#"[id*="article-content"]"#,
    "main",
];

static BODY_SELECTORS: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    BODY_SELECTOR_CSS
        .iter()
        .map(|css| (*css, Selector::parse(css).expect("static selector")))
        .collect()
});
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("static selector"));
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("static selector"));

/// An extracted article and the selector that located its body.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub article: Article,
    /// `None` when the body fell back to the page text.
    pub body_selector: Option<&'static str>,
}

/// First body selector with a visible match, and that match.
fn find_article_body(document: &Html) -> Option<(&'static str, ElementRef<'_>)> {
    let root = document.root_element();
    BODY_SELECTORS.iter().find_map(|(label, selector)| {
        select_visible(root, selector, ARTICLE_NOISE_TAGS)
            .into_iter()
            .next()
            .map(|el| (*label, el))
    })
}

/// Non-empty paragraphs of `body`, each normalized, separated by a blank line.
fn body_paragraphs(body: ElementRef<'_>) -> String {
    select_visible(body, &PARAGRAPH, ARTICLE_NOISE_TAGS)
        .into_iter()
        .map(|p| normalize_text(&inline_text(p, ARTICLE_NOISE_TAGS)))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Turn an image reference into an absolute `http(s)` URL.
///
/// - `//host/path` gets `https:`
/// - `/path` gets the page's scheme and authority
/// - anything else must already be an `http(s)` URL
pub fn resolve_image_src(src: &str, page: &Url) -> Option<String> {
    let src = src.trim();
    let candidate = if src.starts_with("//") {
        format!("https:{src}")
    } else if src.starts_with('/') {
        format!("{}://{}{}", page.scheme(), authority(page), src)
    } else {
        src.to_string()
    };
    is_http_url(&candidate).then_some(candidate)
}

fn collect_images(document: &Html, page: &Url) -> Vec<ArticleImage> {
    select_visible(document.root_element(), &IMG, ARTICLE_NOISE_TAGS)
        .into_iter()
        .filter_map(|img| {
            let src = first_attr(img, &["src", "data-src"])?;
            let Some(resolved) = resolve_image_src(src, page) else {
                debug!(%src, "Dropping image with unusable source");
                return None;
            };
            Some(ArticleImage {
                src: resolved,
                alt: img.value().attr("alt").unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

fn build_article(url: &str, page: &Url, document: &Html, summary: PageSummary) -> Extraction {
    let (body_text, body_selector) = match find_article_body(document) {
        Some((label, body)) => {
            debug!(selector = label, "Article body found");
            (body_paragraphs(body), Some(label))
        }
        None => {
            info!(%url, "No article body found, using page text");
            (normalize_text(&summary.body_text), None)
        }
    };

    let images = collect_images(document, page);
    let article_title = summary
        .headings
        .iter()
        .find(|h| !h.is_empty())
        .cloned()
        .unwrap_or_else(|| summary.title.clone());

    Extraction {
        article: Article {
            url: url.to_string(),
            domain: summary.domain,
            page_title: summary.title,
            article_title,
            body_text,
            image_count: images.len(),
            images,
        },
        body_selector,
    }
}

/// Extract an article from HTML that is already in hand, such as a saved page.
pub fn extract_from_html(url: &str, html: &str) -> Result<Extraction, ParseError> {
    let page = parse_url(url)?;
    let document = Html::parse_document(html);
    let summary = summarize_document(url, &page, &document);
    Ok(build_article(url, &page, &document, summary))
}

/// Fetch `url` once and extract its article.
#[instrument(level = "info", skip(fetcher, policy))]
pub async fn try_extract_article<T: SendRequest>(
    fetcher: &mut Fetcher<T>,
    url: &str,
    policy: &FetchPolicy,
) -> Result<Extraction, ScrapeError> {
    let page = parse_url(url)?;
    let html = fetcher.get_text(url, policy).await?;
    let document = Html::parse_document(&html);
    let summary = summarize_document(url, &page, &document);
    let extraction = build_article(url, &page, &document, summary);
    info!(
        title = %extraction.article.article_title,
        chars = extraction.article.body_text.chars().count(),
        images = extraction.article.image_count,
        "Extracted article"
    );
    Ok(extraction)
}

/// Like [`try_extract_article`], but failures are logged and yield [`Article::empty`].
pub async fn extract_article<T: SendRequest>(
    fetcher: &mut Fetcher<T>,
    url: &str,
    policy: &FetchPolicy,
) -> Article {
    match try_extract_article(fetcher, url, policy).await {
        Ok(extraction) => extraction.article,
        Err(e) => {
            warn!(%url, error = %e, "Article extraction failed");
            Article::empty(url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::mock::{MockTransport, fetcher, quick_policy};

    const URL: &str = "https://site.com/news/story";

    fn page() -> Url {
        Url::parse(URL).unwrap()
    }

    #[test]
    fn test_two_paragraphs_are_separated_by_blank_line() {
        let html = r#"<html><head><title>Story | Site</title></head><body>
            <h1>The   Story</h1>
            <article><p>First   paragraph.</p><p>   </p><p>Second
            paragraph.</p></article>
        </body></html>"#;
        let extraction = extract_from_html(URL, html).unwrap();

        assert_eq!(extraction.body_selector, Some("article"));
        assert_eq!(
            extraction.article.body_text,
            "First paragraph.\n\nSecond paragraph."
        );
        assert_eq!(extraction.article.article_title, "The Story");
        assert_eq!(extraction.article.page_title, "Story | Site");
        assert_eq!(extraction.article.domain, "site.com");
    }

    #[test]
    fn test_article_wins_over_later_selectors() {
        let html = r#"<body>
            <main><div class="post-content"><p>Long rich text.</p><p>More.</p></div></main>
            <article><p>Short.</p></article>
        </body>"#;
        let extraction = extract_from_html(URL, html).unwrap();

        assert_eq!(extraction.body_selector, Some("article"));
        assert_eq!(extraction.article.body_text, "Short.");
    }

    #[test]
    fn test_class_substring_selector_matches() {
        let html = r#"<body><div class="x-article-body-y"><p>Body.</p></div><main><p>Main.</p></main></body>"#;
        let extraction = extract_from_html(URL, html).unwrap();

        assert_eq!(extraction.body_selector, Some(r#"[class*="article-body"]"#));
        assert_eq!(extraction.article.body_text, "Body.");
    }

    #[test]
    fn test_selectors_inside_chrome_are_ignored() {
        let html = r#"<body>
            <header><article><p>Teaser in header.</p></article></header>
            <aside><article><p>Related.</p></article></aside>
            <main><p>Real text.</p><nav><p>Menu</p></nav></main>
        </body>"#;
        let extraction = extract_from_html(URL, html).unwrap();

        assert_eq!(extraction.body_selector, Some("main"));
        assert_eq!(extraction.article.body_text, "Real text.");
    }

    #[test]
    fn test_falls_back_to_page_text() {
        let html = r#"<html><head><title>Plain</title></head><body>
            <div><p>Just   some text.</p></div><footer>Foot</footer>
        </body></html>"#;
        let extraction = extract_from_html(URL, html).unwrap();

        assert_eq!(extraction.body_selector, None);
        assert!(extraction.article.body_text.contains("Just some text."));
        assert!(!extraction.article.body_text.contains("Foot"));
        assert_eq!(extraction.article.article_title, "Plain");
    }

    #[test]
    fn test_article_title_skips_empty_headings() {
        let html = "<title>T</title><h1> </h1><h1>Real</h1><article><p>x</p></article>";
        let extraction = extract_from_html(URL, html).unwrap();
        assert_eq!(extraction.article.article_title, "Real");
    }

    #[test]
    fn test_resolve_image_src_rules() {
        let page = page();
        assert_eq!(
            resolve_image_src("//cdn.x/img.png", &page).as_deref(),
            Some("https://cdn.x/img.png")
        );
        assert_eq!(
            resolve_image_src("/img.png", &page).as_deref(),
            Some("https://site.com/img.png")
        );
        assert_eq!(
            resolve_image_src("http://other.org/a.jpg", &page).as_deref(),
            Some("http://other.org/a.jpg")
        );
        assert_eq!(resolve_image_src("img.png", &page), None);
        assert_eq!(resolve_image_src("data:image/gif;base64,R0lG", &page), None);
    }

    #[test]
    fn test_root_relative_image_keeps_port_and_scheme() {
        let page = Url::parse("http://localhost:8080/a/b").unwrap();
        assert_eq!(
            resolve_image_src("/img.png", &page).as_deref(),
            Some("http://localhost:8080/img.png")
        );
    }

    #[test]
    fn test_images_use_data_src_and_skip_chrome() {
        let html = r#"<body>
            <header><img src="/logo.png"></header>
            <article>
              <img src="//cdn.x/a.png" alt=" A ">
              <img data-src="/lazy.png">
              <img src="relative.png">
              <img>
            </article>
        </body>"#;
        let article = extract_from_html(URL, html).unwrap().article;

        assert_eq!(
            article.images,
            vec![
                ArticleImage {
                    src: "https://cdn.x/a.png".to_string(),
                    alt: "A".to_string()
                },
                ArticleImage {
                    src: "https://site.com/lazy.png".to_string(),
                    alt: String::new()
                },
            ]
        );
        assert_eq!(article.image_count, 2);
    }

    #[tokio::test]
    async fn test_extract_article_fetches_once() {
        let html = "<title>T</title><article><p>Body.</p></article>";
        let mut fetcher = fetcher(MockTransport::new().with_page(URL, html));

        let article = extract_article(&mut fetcher, URL, &quick_policy()).await;
        assert_eq!(article.body_text, "Body.");
        assert_eq!(fetcher.transport().unwrap().calls_to(URL), 1);
    }

    #[tokio::test]
    async fn test_extract_article_failure_yields_empty() {
        let mut fetcher = fetcher(MockTransport::new());

        let article = extract_article(&mut fetcher, URL, &quick_policy()).await;
        assert!(article.is_empty());
        assert_eq!(article.url, URL);

        let err = try_extract_article(&mut fetcher, URL, &quick_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Fetch(_)));
    }
}
