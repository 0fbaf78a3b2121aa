//! DOM walking helpers on top of `scraper`.
//!
//! Stripping noise (`script`, `nav`, ...) is done by skipping those subtrees
//! while walking instead of mutating the parsed tree, so one parsed document
//! can serve the page summary and the article extraction at the same time.

use scraper::node::Node;
use scraper::{ElementRef, Selector};

/// Removed before any plain-text conversion.
pub const SCRIPT_TAGS: &[&str] = &["script", "style"];

/// Page chrome excluded from a page summary's body text.
pub const PAGE_CHROME_TAGS: &[&str] = &["script", "style", "nav", "footer", "header"];

/// Excluded from every selection made while extracting an article.
pub const ARTICLE_NOISE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "iframe",
];

fn is_skipped(name: &str, skip: &[&str]) -> bool {
    skip.iter().any(|tag| name.eq_ignore_ascii_case(tag))
}

/// True when `el` or any of its ancestors is one of the `skip` tags.
pub fn is_excluded(el: ElementRef<'_>, skip: &[&str]) -> bool {
    if skip.is_empty() {
        return false;
    }
    std::iter::once(el.value().name())
        .chain(
            el.ancestors()
                .filter_map(|node| node.value().as_element().map(|e| e.name())),
        )
        .any(|name| is_skipped(name, skip))
}

/// Elements under `root` matching `selector` that are not inside a skipped subtree,
/// in document order.
pub fn select_visible<'a>(
    root: ElementRef<'a>,
    selector: &Selector,
    skip: &[&str],
) -> Vec<ElementRef<'a>> {
    root.select(selector)
        .filter(|el| !is_excluded(*el, skip))
        .collect()
}

/// Concatenate every text node under `el` in document order, leaving out
/// the subtrees of `skip` tags. Whitespace is kept exactly as parsed.
pub fn collect_text(el: ElementRef<'_>, skip: &[&str]) -> String {
    let mut out = String::new();
    push_text(el, skip, &mut out);
    out
}

fn push_text(el: ElementRef<'_>, skip: &[&str], out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(element) => {
                if is_skipped(element.name(), skip) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_text(child_el, skip, out);
                }
            }
            _ => {}
        }
    }
}

/// Text of an inline element with all whitespace runs collapsed to one space.
pub fn inline_text(el: ElementRef<'_>, skip: &[&str]) -> String {
    squash_whitespace(&collect_text(el, skip))
}

pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-empty value among `attrs` on `el`, trimmed.
pub fn first_attr<'a>(el: ElementRef<'a>, attrs: &[&str]) -> Option<&'a str> {
    attrs
        .iter()
        .filter_map(|name| el.value().attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
}
