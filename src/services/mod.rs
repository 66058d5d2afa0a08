mod content_extractor;
mod http;
mod retry;

use std::future::Future;

use scraper::Selector;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

pub use content_extractor::ContentExtractor;
pub use http::{BrowserClient, HttpFetch, DEFAULT_USER_AGENT};
#[cfg(test)]
pub use http::FetchedPage;
pub use retry::RetryPolicy;

/// Race `fut` against `cancel`. Dropping the losing future abandons any
/// in-flight request.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        result = fut => result,
    }
}

pub(crate) fn parse_selectors(selectors: &[&str]) -> Result<Vec<Selector>> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s)
                .map_err(|e| AppError::from(anyhow::anyhow!("invalid CSS selector {s:?}: {e:?}")))
        })
        .collect()
}
