use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::ContentDocument;
use crate::utils::{collapse_whitespace, truncate_chars};

use super::{cancellable, parse_selectors, HttpFetch};

pub const MAX_CONTENT_CHARS: usize = 5000;

/// Main-content containers, most specific first. The first selector that
/// matches anything wins.
const CONTENT_SELECTORS: [&str; 7] = [
    "article",
    ".article-content",
    ".post-content",
    ".story-content",
    ".entry-content",
    "main",
    ".content",
];

const SKIPPED_TAGS: [&str; 2] = ["script", "style"];

pub struct ContentExtractor {
    http: Arc<dyn HttpFetch>,
    selectors: Vec<Selector>,
}

impl ContentExtractor {
    pub fn new(http: Arc<dyn HttpFetch>) -> Result<Self> {
        Ok(Self {
            http,
            selectors: parse_selectors(&CONTENT_SELECTORS)?,
        })
    }

    /// Fetch an article and reduce it to plain text.
    ///
    /// Returns `Ok(None)` when the page cannot be fetched or has no text; the
    /// caller skips that article. Only cancellation is an error.
    pub async fn extract(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ContentDocument>> {
        let page = match cancellable(cancel, self.http.get(url)).await {
            Ok(page) => page,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(%url, error = %e, "article fetch failed");
                return Ok(None);
            }
        };

        if !page.is_success() {
            tracing::warn!(%url, status = page.status, "article fetch returned non-success status");
            return Ok(None);
        }

        let text = self.main_text(&page.body);
        if text.is_empty() {
            tracing::debug!(%url, "no text content extracted");
            return Ok(None);
        }

        Ok(Some(ContentDocument {
            url: url.to_string(),
            text,
        }))
    }

    /// Plain text of the main content, whitespace-collapsed and capped at
    /// [`MAX_CONTENT_CHARS`] characters.
    pub fn main_text(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        let mut raw = String::new();
        for selector in &self.selectors {
            let mut matched = false;
            for element in document.select(selector) {
                if matched {
                    raw.push(' ');
                }
                collect_text(element, &mut raw);
                matched = true;
            }
            if matched {
                break;
            }
        }

        // Whitespace-only container text still counts as a match.
        if raw.is_empty() {
            collect_text(document.root_element(), &mut raw);
        }

        let cleaned = collapse_whitespace(&raw);
        truncate_chars(&cleaned, MAX_CONTENT_CHARS).to_string()
    }
}

/// Concatenate descendant text, leaving out script and style bodies.
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !SKIPPED_TAGS.contains(&child_element.value().name()) {
                collect_text(child_element, out);
            }
        }
    }
}
