use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::ai::{CompletionProvider, ExtractionSettings, TechExtractor};
use crate::crawl::ArticleCrawler;
use crate::db::{DiscoveryStore, SourceStore};
use crate::error::{AppError, ErrorKind, Result};
use crate::models::{ArticleLink, DiscoveryFilter, NewDiscovery, NewsSource, TechnologyDiscovery};
use crate::services::{ContentExtractor, HttpFetch};

use super::dedup::deduplicate;

/// Which sources an all-sources run visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Active sources whose cadence has elapsed.
    Due,
    /// Every active source, regardless of cadence.
    All,
}

#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub article_concurrency: usize,
    pub source_concurrency: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            article_concurrency: 4,
            source_concurrency: 2,
        }
    }
}

/// Outcome of `discover_for_all_active_sources`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryRun {
    /// New discoveries keyed by source name. A source whose pipeline failed
    /// maps to an empty list; one whose `last_checked` update failed keeps
    /// what it persisted and is also listed in `failed_sources`.
    pub results: BTreeMap<String, Vec<TechnologyDiscovery>>,
    pub failed_sources: Vec<String>,
    /// Sources not processed because the run was cancelled.
    pub skipped_sources: Vec<String>,
    pub cancelled: bool,
}

impl DiscoveryRun {
    pub fn total_discoveries(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }
}

enum SourceOutcome {
    /// `failed` is set when the pipeline or the `last_checked` update failed.
    /// Discoveries persisted before a bookkeeping failure are still reported.
    Finished {
        found: Vec<TechnologyDiscovery>,
        failed: bool,
    },
    Skipped,
}

/// Crawls news sources, asks the model for technologies in each article and
/// records the ones not seen before.
pub struct DiscoveryAgent {
    sources: Arc<dyn SourceStore>,
    discoveries: Arc<dyn DiscoveryStore>,
    crawler: ArticleCrawler,
    content: ContentExtractor,
    extractor: TechExtractor,
    settings: AgentSettings,
}

impl DiscoveryAgent {
    pub fn new(
        sources: Arc<dyn SourceStore>,
        discoveries: Arc<dyn DiscoveryStore>,
        http: Arc<dyn HttpFetch>,
        provider: Arc<dyn CompletionProvider>,
        extraction: ExtractionSettings,
        settings: AgentSettings,
    ) -> Result<Self> {
        Ok(Self {
            sources,
            discoveries,
            crawler: ArticleCrawler::new(http.clone())?,
            content: ContentExtractor::new(http)?,
            extractor: TechExtractor::new(provider, extraction)?,
            settings,
        })
    }

    /// Run the pipeline for one source and return the discoveries persisted.
    ///
    /// Article-level failures are logged and skipped. Does not touch the
    /// source's `last_checked`.
    #[tracing::instrument(skip_all, fields(source = %source.name))]
    pub async fn discover_for_source(
        &self,
        source: &NewsSource,
        cancel: &CancellationToken,
    ) -> Result<Vec<TechnologyDiscovery>> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let discovered_at = Utc::now();

        let links = self.crawler.crawl(&source.url, cancel).await?;
        if links.is_empty() {
            tracing::info!("no article links found");
            return Ok(Vec::new());
        }

        let per_article: Vec<Vec<NewDiscovery>> = stream::iter(&links)
            .map(|link| self.process_article(source, link, discovered_at, cancel))
            .buffered(self.settings.article_concurrency.max(1))
            .try_collect()
            .await?;
        let candidates: Vec<NewDiscovery> = per_article.into_iter().flatten().collect();
        let candidate_count = candidates.len();

        let existing = self
            .discoveries
            .list_discoveries(&DiscoveryFilter::for_source(source.id))
            .await?;
        let fresh = deduplicate(candidates, existing.iter().map(|d| d.name.as_str()));

        let mut persisted = Vec::with_capacity(fresh.len());
        for new in fresh {
            let name = new.name.clone();
            match self.discoveries.create_discovery(new).await {
                Ok(discovery) => persisted.push(discovery),
                Err(e) if e.kind() == ErrorKind::Conflict => {
                    tracing::info!(technology = %name, "already recorded, skipping");
                }
                Err(e) => {
                    tracing::warn!(technology = %name, error = %e, "failed to persist discovery");
                }
            }
        }

        tracing::info!(
            articles = links.len(),
            candidates = candidate_count,
            persisted = persisted.len(),
            "source processed"
        );
        Ok(persisted)
    }

    /// Content fetch and extraction for one article. Anything but
    /// cancellation is logged and yields no candidates.
    async fn process_article(
        &self,
        source: &NewsSource,
        link: &ArticleLink,
        discovered_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<NewDiscovery>> {
        let Some(document) = self.content.extract(&link.url, cancel).await? else {
            return Ok(Vec::new());
        };

        let candidates = match self
            .extractor
            .extract(&link.title, &link.url, &document.text, cancel)
            .await
        {
            Ok(candidates) => candidates,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(url = %link.url, error = %e, "technology extraction failed");
                return Ok(Vec::new());
            }
        };

        tracing::debug!(url = %link.url, count = candidates.len(), "candidates extracted");
        Ok(candidates
            .into_iter()
            .map(|c| NewDiscovery {
                name: c.name,
                description: c.description,
                source_url: source.url.clone(),
                news_source_id: source.id,
                discovered_at,
                article_title: Some(link.title.clone()),
                article_url: Some(link.url.clone()),
                confidence_score: c.confidence,
                category: c.category,
            })
            .collect())
    }

    /// Visit due (or all active) sources, isolating failures per source, and
    /// advance `last_checked` for every source that ran to completion or
    /// failed. Sources skipped by cancellation keep their old timestamp.
    #[tracing::instrument(skip_all, fields(mode = ?mode))]
    pub async fn discover_for_all_active_sources(
        &self,
        now: DateTime<Utc>,
        mode: RunMode,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryRun> {
        let listed = match mode {
            RunMode::Due => self.sources.sources_due(now).await,
            RunMode::All => self
                .sources
                .list_sources()
                .await
                .map(|all| all.into_iter().filter(|s| s.is_active).collect()),
        };
        let sources: Vec<NewsSource> =
            listed.map_err(|e| AppError::DiscoveryRun(format!("failed to list sources: {e}")))?;
        tracing::info!(count = sources.len(), "starting discovery run");

        let outcomes: Vec<(String, SourceOutcome)> = stream::iter(sources)
            .map(|source| async move {
                let outcome = self.run_source(&source, now, cancel).await;
                (source.name, outcome)
            })
            .buffer_unordered(self.settings.source_concurrency.max(1))
            .collect()
            .await;

        let mut run = DiscoveryRun::default();
        for (name, outcome) in outcomes {
            match outcome {
                SourceOutcome::Finished { found, failed } => {
                    if failed {
                        run.failed_sources.push(name.clone());
                    }
                    run.results.insert(name, found);
                }
                SourceOutcome::Skipped => {
                    run.cancelled = true;
                    run.skipped_sources.push(name);
                }
            }
        }
        run.failed_sources.sort();
        run.skipped_sources.sort();

        tracing::info!(
            sources = run.results.len(),
            discoveries = run.total_discoveries(),
            failed = run.failed_sources.len(),
            skipped = run.skipped_sources.len(),
            cancelled = run.cancelled,
            "discovery run finished"
        );
        Ok(run)
    }

    /// One source of an all-sources run. Never fails the run as a whole.
    async fn run_source(
        &self,
        source: &NewsSource,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> SourceOutcome {
        let (found, mut failed) = match self.discover_for_source(source, cancel).await {
            Ok(found) => (found, false),
            Err(AppError::Cancelled) => {
                tracing::warn!(source = %source.name, "cancelled before completion");
                return SourceOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(source = %source.name, error = %e, "source run failed");
                (Vec::new(), true)
            }
        };

        if let Err(e) = self.sources.update_last_checked(source.id, now).await {
            tracing::error!(source = %source.name, error = %e, "failed to update last_checked");
            failed = true;
        }
        SourceOutcome::Finished { found, failed }
    }
}
