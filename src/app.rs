use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use crate::ai::{ExtractionSettings, OpenAiProvider};
use crate::config::Config;
use crate::db::{DiscoveryStore, Repository, SourceStore};
use crate::discovery::{AgentSettings, DiscoveryAgent, DiscoveryRun, DiscoveryStats, RunMode};
use crate::error::Result;
use crate::models::{
    DiscoveryFilter, DiscoveryStatus, DiscoveryUpdate, NewNewsSource, NewsSource, SourceUpdate,
    TechnologyDiscovery,
};
use crate::services::BrowserClient;

pub const DEFAULT_SINCE_DAYS: i64 = 7;

/// Wires the repository, HTTP client and model provider together and
/// exposes the operations the command line needs.
pub struct App {
    config: Config,
    repository: Arc<Repository>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);
        Ok(Self { config, repository })
    }

    /// Built on demand so that read-only commands work without an API key.
    fn agent(&self) -> Result<DiscoveryAgent> {
        let retry = self.config.retry_policy();
        let http = BrowserClient::new(&self.config.user_agent, self.config.fetch_timeout(), retry)?;
        let provider = OpenAiProvider::new(
            self.config.require_api_key()?.to_string(),
            &self.config.openai_base_url,
            self.config.ai_timeout(),
            retry,
        )?;

        DiscoveryAgent::new(
            self.repository.clone(),
            self.repository.clone(),
            Arc::new(http),
            Arc::new(provider),
            ExtractionSettings {
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            },
            AgentSettings {
                article_concurrency: self.config.article_concurrency,
                source_concurrency: self.config.source_concurrency,
            },
        )
    }

    pub async fn run(&self, mode: RunMode, cancel: &CancellationToken) -> Result<DiscoveryRun> {
        self.agent()?
            .discover_for_all_active_sources(Utc::now(), mode, cancel)
            .await
    }

    /// Single-source discovery. `last_checked` is left as is.
    pub async fn run_source(
        &self,
        source_id: i64,
        cancel: &CancellationToken,
    ) -> Result<(NewsSource, Vec<TechnologyDiscovery>)> {
        let source = self.repository.get_source(source_id).await?;
        let found = self.agent()?.discover_for_source(&source, cancel).await?;
        Ok((source, found))
    }

    pub async fn add_source(&self, source: NewNewsSource) -> Result<NewsSource> {
        self.repository.create_source(source).await
    }

    pub async fn update_source(&self, id: i64, update: SourceUpdate) -> Result<NewsSource> {
        self.repository.update_source(id, update).await
    }

    pub async fn delete_source(&self, id: i64) -> Result<()> {
        self.repository.delete_source(id).await
    }

    pub async fn sources(&self) -> Result<Vec<NewsSource>> {
        self.repository.list_sources().await
    }

    pub async fn due_sources(&self) -> Result<Vec<NewsSource>> {
        self.repository.sources_due(Utc::now()).await
    }

    /// Single-criterion filters go through the dedicated store queries.
    pub async fn discoveries(&self, filter: &DiscoveryFilter) -> Result<Vec<TechnologyDiscovery>> {
        match filter {
            DiscoveryFilter {
                news_source_id: None,
                status: None,
                category: Some(category),
                min_confidence: None,
                since: None,
            } => self.repository.list_discoveries_by_category(category).await,
            DiscoveryFilter {
                news_source_id: None,
                status: None,
                category: None,
                min_confidence: Some(threshold),
                since: None,
            } => self.repository.list_discoveries_min_confidence(*threshold).await,
            _ => self.repository.list_discoveries(filter).await,
        }
    }

    pub async fn discoveries_since(&self, source_id: i64, days: i64) -> Result<Vec<TechnologyDiscovery>> {
        self.repository.get_source(source_id).await?;
        let since = Utc::now() - Duration::days(days);
        self.repository.list_discoveries_since(source_id, since).await
    }

    pub async fn discovery(&self, id: i64) -> Result<TechnologyDiscovery> {
        self.repository.get_discovery(id).await
    }

    pub async fn set_status(&self, id: i64, status: DiscoveryStatus) -> Result<TechnologyDiscovery> {
        self.repository.update_discovery_status(id, status).await
    }

    pub async fn update_discovery(&self, id: i64, update: DiscoveryUpdate) -> Result<TechnologyDiscovery> {
        self.repository.update_discovery(id, update).await
    }

    pub async fn delete_discovery(&self, id: i64) -> Result<()> {
        self.repository.delete_discovery(id).await
    }

    pub async fn stats(&self) -> Result<DiscoveryStats> {
        let all = self.repository.list_discoveries(&DiscoveryFilter::default()).await?;
        Ok(DiscoveryStats::from_discoveries(&all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::NewDiscovery;

    async fn app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("radar.db").to_string_lossy().to_string(),
            openai_api_key: None,
            ..Config::default()
        };
        let app = App::new(config).await.unwrap();
        (dir, app)
    }

    #[tokio::test]
    async fn read_only_commands_need_no_api_key() {
        let (_dir, app) = app().await;
        let source = app
            .add_source(NewNewsSource {
                name: "Alpha".into(),
                url: "https://alpha.example.com".into(),
                description: None,
                cadence_days: 3,
                is_active: true,
            })
            .await
            .unwrap();

        assert_eq!(app.sources().await.unwrap().len(), 1);
        assert_eq!(app.due_sources().await.unwrap()[0].id, source.id);
        assert!(app.discoveries_since(source.id, DEFAULT_SINCE_DAYS).await.unwrap().is_empty());
        assert_eq!(app.stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn list_filters_by_category_and_confidence() {
        let (_dir, app) = app().await;
        let source = app
            .add_source(NewNewsSource {
                name: "Alpha".into(),
                url: "https://alpha.example.com".into(),
                description: None,
                cadence_days: 1,
                is_active: true,
            })
            .await
            .unwrap();
        for (name, category, confidence) in [("FooDB", "Database", 0.9), ("BarQueue", "Messaging", 0.5)] {
            app.repository
                .create_discovery(NewDiscovery {
                    name: name.into(),
                    description: format!("{name} description"),
                    source_url: source.url.clone(),
                    news_source_id: source.id,
                    discovered_at: Utc::now(),
                    article_title: None,
                    article_url: None,
                    confidence_score: confidence,
                    category: Some(category.into()),
                })
                .await
                .unwrap();
        }

        let by_category = app
            .discoveries(&DiscoveryFilter {
                category: Some("Messaging".into()),
                ..DiscoveryFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].name, "BarQueue");

        let confident = app
            .discoveries(&DiscoveryFilter {
                min_confidence: Some(0.8),
                ..DiscoveryFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(confident.len(), 1);
        assert_eq!(confident[0].name, "FooDB");

        let combined = app
            .discoveries(&DiscoveryFilter {
                category: Some("Database".into()),
                min_confidence: Some(0.95),
                ..DiscoveryFilter::default()
            })
            .await
            .unwrap();
        assert!(combined.is_empty());
        assert_eq!(app.discoveries(&DiscoveryFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn discovery_runs_require_an_api_key() {
        let (_dir, app) = app().await;
        let err = app.run(RunMode::Due, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn since_reports_unknown_sources() {
        let (_dir, app) = app().await;
        assert!(matches!(
            app.discoveries_since(42, 7).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
