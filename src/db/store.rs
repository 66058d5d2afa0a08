use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    DiscoveryFilter, DiscoveryStatus, NewDiscovery, NewsSource, TechnologyDiscovery,
};

/// Read access to configured sources plus the one mutation discovery needs.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<NewsSource>>;

    /// Fails with `NotFound` when the id is unknown.
    async fn get_source(&self, id: i64) -> Result<NewsSource>;

    async fn update_last_checked(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Active sources whose cadence has elapsed at `now`.
    async fn sources_due(&self, now: DateTime<Utc>) -> Result<Vec<NewsSource>> {
        let sources = self.list_sources().await?;
        Ok(sources.into_iter().filter(|s| s.is_due(now)).collect())
    }
}

#[async_trait]
pub trait DiscoveryStore: Send + Sync {
    /// Newest first.
    async fn list_discoveries(&self, filter: &DiscoveryFilter) -> Result<Vec<TechnologyDiscovery>>;

    /// Rejects a second discovery with the same case-insensitive name for the
    /// same source with `PersistenceConflict`.
    async fn create_discovery(&self, new: NewDiscovery) -> Result<TechnologyDiscovery>;

    /// Any status may follow any other.
    async fn update_discovery_status(
        &self,
        id: i64,
        status: DiscoveryStatus,
    ) -> Result<TechnologyDiscovery>;

    async fn list_discoveries_by_category(&self, category: &str) -> Result<Vec<TechnologyDiscovery>> {
        let filter = DiscoveryFilter {
            category: Some(category.to_string()),
            ..DiscoveryFilter::default()
        };
        self.list_discoveries(&filter).await
    }

    async fn list_discoveries_min_confidence(&self, threshold: f64) -> Result<Vec<TechnologyDiscovery>> {
        let filter = DiscoveryFilter {
            min_confidence: Some(threshold),
            ..DiscoveryFilter::default()
        };
        self.list_discoveries(&filter).await
    }

    async fn list_discoveries_since(
        &self,
        news_source_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<TechnologyDiscovery>> {
        let filter = DiscoveryFilter {
            news_source_id: Some(news_source_id),
            since: Some(since),
            ..DiscoveryFilter::default()
        };
        self.list_discoveries(&filter).await
    }
}
