// Resource discovery from markup and CSS

use crate::urls::resolve;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\s*\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("css url pattern")
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static IMG: Lazy<Selector> = Lazy::new(|| selector("img"));
static SCRIPT: Lazy<Selector> = Lazy::new(|| selector("script[src]"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("link"));
static MEDIA: Lazy<Selector> = Lazy::new(|| selector("video, audio, source"));
static IFRAME: Lazy<Selector> = Lazy::new(|| selector("iframe[src]"));
static EMBED: Lazy<Selector> = Lazy::new(|| selector("embed[src]"));
static OBJECT: Lazy<Selector> = Lazy::new(|| selector("object[data]"));
static STYLE: Lazy<Selector> = Lazy::new(|| selector("style"));
static INLINE_STYLE: Lazy<Selector> = Lazy::new(|| selector("[style]"));

/// Insertion-ordered set of absolute resource URLs.
#[derive(Debug, Default)]
struct UrlSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl UrlSet {
    fn insert(&mut self, url: Option<String>) {
        if let Some(url) = url
            && self.seen.insert(url.clone())
        {
            self.ordered.push(url);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}

/// Check whether an image source is a lazy-loading stand-in rather than the real asset.
pub fn is_placeholder(src: Option<&str>) -> bool {
    let Some(src) = src else {
        return true;
    };
    if src.is_empty() {
        return true;
    }
    let lower = src.to_lowercase();
    lower.starts_with("data:")
        || lower.contains("placeholder")
        || lower.contains("blank")
        || lower.contains("space")
}

/// Attribute value, treating an empty string like a missing attribute.
fn attr<'a>(element: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    element.value().attr(name).filter(|v| !v.is_empty())
}

/// Collect every resource URL referenced by an HTML document.
///
/// Unresolvable references are skipped; discovery itself never fails.
pub fn collect_resource_urls(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls = UrlSet::default();

    for img in document.select(&IMG) {
        let mut src = attr(&img, "src").or_else(|| attr(&img, "data-src"));

        if is_placeholder(src) {
            src = attr(&img, "data-src");
        }

        if is_placeholder(src)
            && let Some(srcset) = attr(&img, "srcset").or_else(|| attr(&img, "data-srcset"))
        {
            for candidate in srcset_candidates(srcset) {
                urls.insert(resolve(base, candidate));
            }
        }

        if let Some(src) = src {
            urls.insert(resolve(base, src));
        }
    }

    for script in document.select(&SCRIPT) {
        urls.insert(attr(&script, "src").and_then(|src| resolve(base, src)));
    }

    for link in document.select(&LINK) {
        let rel = link.value().attr("rel").unwrap_or_default().to_lowercase();
        if rel.contains("stylesheet") || rel.contains("icon") {
            urls.insert(attr(&link, "href").and_then(|href| resolve(base, href)));
        }
    }

    for media in document.select(&MEDIA) {
        let src = attr(&media, "src").or_else(|| attr(&media, "data-src"));
        urls.insert(src.and_then(|src| resolve(base, src)));
    }

    for iframe in document.select(&IFRAME) {
        urls.insert(attr(&iframe, "src").and_then(|src| resolve(base, src)));
    }

    for embed in document.select(&EMBED) {
        urls.insert(attr(&embed, "src").and_then(|src| resolve(base, src)));
    }

    for object in document.select(&OBJECT) {
        urls.insert(attr(&object, "data").and_then(|data| resolve(base, data)));
    }

    for style in document.select(&STYLE) {
        let css: String = style.text().collect();
        for url in collect_css_urls(&css, base) {
            urls.insert(Some(url));
        }
    }

    for element in document.select(&INLINE_STYLE) {
        if let Some(css) = element.value().attr("style") {
            for url in collect_css_urls(css, base) {
                urls.insert(Some(url));
            }
        }
    }

    let urls = urls.into_vec();
    debug!("Discovered {} resource URLs on {}", urls.len(), base);
    urls
}

/// Extract `url(...)` references from CSS text and resolve them against `base`.
pub fn collect_css_urls(css: &str, base: &Url) -> Vec<String> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| resolve(base, m.as_str()))
        .collect()
}

/// Leading URL token of every comma separated srcset candidate.
fn srcset_candidates(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}
