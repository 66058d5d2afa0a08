use std::collections::HashSet;
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ArticleLink;
use crate::services::{cancellable, parse_selectors, HttpFetch};

pub const MAX_ARTICLES_PER_SOURCE: usize = 10;

/// Raw matches considered per rule before validation.
const MAX_MATCHES_PER_RULE: usize = 20;

/// Link rules in priority order.
const LINK_SELECTORS: [&str; 8] = [
    r#"a[href*="/article"]"#,
    r#"a[href*="/post"]"#,
    r#"a[href*="/story"]"#,
    r#"a[href*="/news"]"#,
    "article a",
    ".article a",
    ".post a",
    ".story a",
];

const EXCLUDED_PATH_PATTERNS: [&str; 10] = [
    "/tag/",
    "/category/",
    "/author/",
    "/about/",
    "/contact/",
    "/privacy/",
    "/terms/",
    "/login/",
    "/signup/",
    "/search",
];

/// Finds candidate article links on a news source's landing page.
pub struct ArticleCrawler {
    http: Arc<dyn HttpFetch>,
    rules: Vec<Selector>,
}

impl ArticleCrawler {
    pub fn new(http: Arc<dyn HttpFetch>) -> Result<Self> {
        Ok(Self {
            http,
            rules: parse_selectors(&LINK_SELECTORS)?,
        })
    }

    /// Fetch `base_url` and return up to [`MAX_ARTICLES_PER_SOURCE`] article
    /// links in discovery order.
    ///
    /// An unreachable page or non-success status yields an empty list.
    pub async fn crawl(&self, base_url: &str, cancel: &CancellationToken) -> Result<Vec<ArticleLink>> {
        let page = match cancellable(cancel, self.http.get(base_url)).await {
            Ok(page) => page,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::error!(url = %base_url, error = %e, "failed to fetch source page");
                return Ok(Vec::new());
            }
        };

        if !page.is_success() {
            tracing::error!(url = %base_url, status = page.status, "source page returned non-success status");
            return Ok(Vec::new());
        }

        let links = self.article_links(base_url, &page.body);
        tracing::info!(url = %base_url, count = links.len(), "crawled article links");
        Ok(links)
    }

    pub fn article_links(&self, base_url: &str, html: &str) -> Vec<ArticleLink> {
        let base = match Url::parse(base_url) {
            Ok(base) => base,
            Err(e) => {
                tracing::error!(url = %base_url, error = %e, "invalid source URL");
                return Vec::new();
            }
        };

        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for rule in &self.rules {
            for anchor in document.select(rule).take(MAX_MATCHES_PER_RULE) {
                let Some(link) = resolve_link(&base, anchor) else {
                    continue;
                };
                if seen.insert(link.url.clone()) {
                    links.push(link);
                }
            }
        }

        links.truncate(MAX_ARTICLES_PER_SOURCE);
        links
    }
}

fn resolve_link(base: &Url, anchor: ElementRef<'_>) -> Option<ArticleLink> {
    let href = anchor.value().attr("href")?;
    let resolved = base.join(href).ok()?;

    if resolved.host_str() != base.host_str() || resolved.port() != base.port() {
        return None;
    }

    let path = resolved.path();
    if path.is_empty() || path == "/" {
        return None;
    }
    if EXCLUDED_PATH_PATTERNS.iter().any(|p| path.contains(p)) {
        return None;
    }

    // Each text node is trimmed before joining, so nested markup collapses.
    let title: String = anchor.text().map(str::trim).collect();
    if title.is_empty() {
        return None;
    }

    Some(ArticleLink {
        url: resolved.to_string(),
        title,
        base_url: base.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::FetchedPage;
    use async_trait::async_trait;

    struct OnePage {
        status: u16,
        body: String,
    }

    #[async_trait]
    impl HttpFetch for OnePage {
        async fn get(&self, _url: &str) -> Result<FetchedPage> {
            Ok(FetchedPage {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    struct Unreachable;

    #[async_trait]
    impl HttpFetch for Unreachable {
        async fn get(&self, url: &str) -> Result<FetchedPage> {
            Err(AppError::fetch(url, "dns error"))
        }
    }

    fn crawler() -> ArticleCrawler {
        ArticleCrawler::new(Arc::new(Unreachable)).unwrap()
    }

    const BASE: &str = "https://news.example.com/";

    #[test]
    fn resolves_filters_and_orders_links() {
        let html = r#"<html><body>
            <a href="/article/rust-2026">Rust in 2026</a>
            <a href="https://other.example.org/article/offsite">Offsite</a>
            <a href="/tag/article-tips">Tagged</a>
            <a href="/post/">   </a>
            <a href="/news/quantum">Quantum chips</a>
            <a href="/article/rust-2026">Rust in 2026 (again)</a>
            <article><a href="/2026/10/edge-db">Edge databases</a></article>
            <a href="/search?q=article">Search</a>
            <a href="/">Home</a>
        </body></html>"#;

        let links = crawler().article_links(BASE, html);
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://news.example.com/article/rust-2026",
                "https://news.example.com/news/quantum",
                "https://news.example.com/2026/10/edge-db",
            ]
        );
        assert_eq!(links[0].title, "Rust in 2026");
        assert_eq!(links[0].base_url, BASE);
    }

    #[test]
    fn nested_anchor_text_is_trimmed_per_node() {
        let html = "<body><a href=\"/article/x\"><span>Foo</span>\n  <span>Bar</span></a></body>";
        let links = crawler().article_links(BASE, html);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "FooBar");
    }

    #[test]
    fn caps_at_ten_links() {
        let anchors: String = (0..30)
            .map(|i| format!(r#"<a href="/article/{i}">Story {i}</a>"#))
            .collect();
        let links = crawler().article_links(BASE, &format!("<body>{anchors}</body>"));
        assert_eq!(links.len(), MAX_ARTICLES_PER_SOURCE);
        assert_eq!(links[9].url, "https://news.example.com/article/9");
    }

    #[test]
    fn only_first_twenty_matches_per_rule_are_considered() {
        // The first 20 "/article" anchors are all offsite, so that rule
        // contributes nothing even though valid anchors follow.
        let mut html = String::from("<body>");
        for i in 0..20 {
            html.push_str(&format!(r#"<a href="https://elsewhere.test/article/{i}">x</a>"#));
        }
        html.push_str(r#"<a href="/article/late">Late</a>"#);
        html.push_str(r#"<a href="/story/kept">Kept</a></body>"#);

        let links = crawler().article_links(BASE, &html);
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://news.example.com/story/kept"]);
    }

    #[tokio::test]
    async fn failed_fetches_yield_no_links() {
        let cancel = CancellationToken::new();
        assert!(crawler().crawl(BASE, &cancel).await.unwrap().is_empty());

        let blocked = ArticleCrawler::new(Arc::new(OnePage {
            status: 403,
            body: r#"<a href="/article/1">One</a>"#.into(),
        }))
        .unwrap();
        assert!(blocked.crawl(BASE, &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn crawl_parses_fetched_page() {
        let ok = ArticleCrawler::new(Arc::new(OnePage {
            status: 200,
            body: r#"<a href="/article/1">One</a><a href="/post/2">Two</a>"#.into(),
        }))
        .unwrap();
        let links = ok.crawl(BASE, &CancellationToken::new()).await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].title, "Two");
    }

    #[tokio::test]
    async fn cancelled_crawl_is_an_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            crawler().crawl(BASE, &cancel).await,
            Err(AppError::Cancelled)
        ));
    }
}
