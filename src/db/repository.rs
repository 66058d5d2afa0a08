use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{
    DiscoveryFilter, DiscoveryStatus, DiscoveryUpdate, NewDiscovery, NewNewsSource, NewsSource,
    SourceUpdate, TechnologyDiscovery,
};

use super::schema::SCHEMA;
use super::store::{DiscoveryStore, SourceStore};

const SOURCE_COLUMNS: &str =
    "id, name, url, description, cadence_days, is_active, last_checked, created_at, updated_at";

const DISCOVERY_COLUMNS: &str = "id, name, description, source_url, news_source_id, discovered_at, \
     article_title, article_url, confidence_score, category, status, created_at, updated_at";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Source operations

    pub async fn create_source(&self, source: NewNewsSource) -> Result<NewsSource> {
        source.validate()?;
        let now = Utc::now();
        let stamp = format_datetime(now);
        let id = self
            .conn
            .call({
                let source = source.clone();
                move |conn| {
                    conn.execute(
                        r#"INSERT INTO news_sources (name, url, description, cadence_days, is_active, created_at, updated_at)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"#,
                        params![
                            source.name,
                            source.url,
                            source.description,
                            source.cadence_days,
                            source.is_active,
                            stamp,
                        ],
                    )?;
                    Ok(conn.last_insert_rowid())
                }
            })
            .await?;

        Ok(NewsSource {
            id,
            name: source.name,
            url: source.url,
            description: source.description,
            cadence_days: source.cadence_days,
            is_active: source.is_active,
            last_checked: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn update_source(&self, id: i64, update: SourceUpdate) -> Result<NewsSource> {
        update.validate()?;
        let mut source = self.get_source(id).await?;
        if update.is_empty() {
            return Ok(source);
        }
        update.apply(&mut source);
        source.updated_at = Utc::now();

        let row = source.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE news_sources
                       SET name = ?1, url = ?2, description = ?3, cadence_days = ?4, is_active = ?5, updated_at = ?6
                       WHERE id = ?7"#,
                    params![
                        row.name,
                        row.url,
                        row.description,
                        row.cadence_days,
                        row.is_active,
                        format_datetime(row.updated_at),
                        row.id,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(source)
    }

    pub async fn delete_source(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM news_sources WHERE id = ?1", params![id])?))
            .await?;
        if deleted == 0 {
            return Err(AppError::not_found("Source", id));
        }
        Ok(())
    }

    // Discovery operations beyond the pipeline's needs

    pub async fn get_discovery(&self, id: i64) -> Result<TechnologyDiscovery> {
        let discovery = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {DISCOVERY_COLUMNS} FROM technology_discoveries WHERE id = ?1");
                let mut stmt = conn.prepare(&sql)?;
                let discovery = stmt.query_row(params![id], discovery_from_row).optional()?;
                Ok(discovery)
            })
            .await?;
        discovery.ok_or_else(|| AppError::not_found("Discovery", id))
    }

    pub async fn update_discovery(
        &self,
        id: i64,
        update: DiscoveryUpdate,
    ) -> Result<TechnologyDiscovery> {
        let mut discovery = self.get_discovery(id).await?;
        if update.is_empty() {
            return Ok(discovery);
        }
        if let Some(description) = update.description {
            discovery.description = description;
        }
        if let Some(category) = update.category {
            discovery.category = Some(category);
        }
        if let Some(status) = update.status {
            discovery.status = status;
        }
        discovery.updated_at = Utc::now();

        let row = discovery.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE technology_discoveries
                       SET description = ?1, category = ?2, status = ?3, updated_at = ?4
                       WHERE id = ?5"#,
                    params![
                        row.description,
                        row.category,
                        row.status.as_str(),
                        format_datetime(row.updated_at),
                        row.id,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(discovery)
    }

    pub async fn delete_discovery(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM technology_discoveries WHERE id = ?1", params![id])?)
            })
            .await?;
        if deleted == 0 {
            return Err(AppError::not_found("Discovery", id));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceStore for Repository {
    async fn list_sources(&self) -> Result<Vec<NewsSource>> {
        let sources = self
            .conn
            .call(|conn| {
                let sql = format!("SELECT {SOURCE_COLUMNS} FROM news_sources ORDER BY name, id");
                let mut stmt = conn.prepare(&sql)?;
                let sources = stmt
                    .query_map([], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    async fn get_source(&self, id: i64) -> Result<NewsSource> {
        let source = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {SOURCE_COLUMNS} FROM news_sources WHERE id = ?1");
                let mut stmt = conn.prepare(&sql)?;
                let source = stmt.query_row(params![id], source_from_row).optional()?;
                Ok(source)
            })
            .await?;
        source.ok_or_else(|| AppError::not_found("Source", id))
    }

    async fn update_last_checked(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let stamp = format_datetime(at);
        let updated = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE news_sources SET last_checked = ?1, updated_at = ?1 WHERE id = ?2",
                    params![stamp, id],
                )?)
            })
            .await?;
        if updated == 0 {
            return Err(AppError::not_found("Source", id));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscoveryStore for Repository {
    async fn list_discoveries(&self, filter: &DiscoveryFilter) -> Result<Vec<TechnologyDiscovery>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(source_id) = filter.news_source_id {
            clauses.push("news_source_id = ?");
            values.push(Value::Integer(source_id));
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(category) = &filter.category {
            clauses.push("category = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(min) = filter.min_confidence {
            clauses.push("confidence_score >= ?");
            values.push(Value::Real(min));
        }
        if let Some(since) = filter.since {
            clauses.push("discovered_at >= ?");
            values.push(Value::Text(format_datetime(since)));
        }

        let mut sql = format!("SELECT {DISCOVERY_COLUMNS} FROM technology_discoveries");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY discovered_at DESC, id DESC");

        let discoveries = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let discoveries = stmt
                    .query_map(params_from_iter(values.iter()), discovery_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(discoveries)
            })
            .await?;
        Ok(discoveries)
    }

    async fn create_discovery(&self, new: NewDiscovery) -> Result<TechnologyDiscovery> {
        new.validate()?;
        let now = Utc::now();
        let stamp = format_datetime(now);
        let key = new.name_key();

        let inserted = self
            .conn
            .call({
                let new = new.clone();
                move |conn| {
                    let tx = conn.transaction()?;
                    let existing: Option<i64> = tx
                        .query_row(
                            "SELECT id FROM technology_discoveries WHERE news_source_id = ?1 AND name_key = ?2",
                            params![new.news_source_id, key],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if existing.is_some() {
                        return Ok(None);
                    }
                    tx.execute(
                        r#"INSERT INTO technology_discoveries
                           (name, name_key, description, source_url, news_source_id, discovered_at,
                            article_title, article_url, confidence_score, category, status, created_at, updated_at)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)"#,
                        params![
                            new.name,
                            key,
                            new.description,
                            new.source_url,
                            new.news_source_id,
                            format_datetime(new.discovered_at),
                            new.article_title,
                            new.article_url,
                            new.confidence_score,
                            new.category,
                            DiscoveryStatus::Discovered.as_str(),
                            stamp,
                        ],
                    )?;
                    let id = tx.last_insert_rowid();
                    tx.commit()?;
                    Ok(Some(id))
                }
            })
            .await?;

        let id = inserted.ok_or_else(|| AppError::PersistenceConflict {
            source_id: new.news_source_id,
            name: new.name.clone(),
        })?;

        Ok(TechnologyDiscovery {
            id,
            name: new.name,
            description: new.description,
            source_url: new.source_url,
            news_source_id: new.news_source_id,
            discovered_at: new.discovered_at,
            article_title: new.article_title,
            article_url: new.article_url,
            confidence_score: new.confidence_score,
            category: new.category,
            status: DiscoveryStatus::Discovered,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_discovery_status(
        &self,
        id: i64,
        status: DiscoveryStatus,
    ) -> Result<TechnologyDiscovery> {
        self.update_discovery(id, DiscoveryUpdate::status(status)).await
    }
}

/// Fixed-precision UTC so that text comparison in SQL matches time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format, for rows written by hand
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| invalid_column(idx, format!("bad timestamp '{raw}'")))
}

fn optional_datetime_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_datetime(&raw)
            .map(Some)
            .ok_or_else(|| invalid_column(idx, format!("bad timestamp '{raw}'"))),
        None => Ok(None),
    }
}

fn invalid_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn source_from_row(row: &Row) -> rusqlite::Result<NewsSource> {
    Ok(NewsSource {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        description: row.get(3)?,
        cadence_days: row.get(4)?,
        is_active: row.get(5)?,
        last_checked: optional_datetime_column(row, 6)?,
        created_at: datetime_column(row, 7)?,
        updated_at: datetime_column(row, 8)?,
    })
}

fn discovery_from_row(row: &Row) -> rusqlite::Result<TechnologyDiscovery> {
    let status: String = row.get(10)?;
    Ok(TechnologyDiscovery {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        source_url: row.get(3)?,
        news_source_id: row.get(4)?,
        discovered_at: datetime_column(row, 5)?,
        article_title: row.get(6)?,
        article_url: row.get(7)?,
        confidence_score: row.get(8)?,
        category: row.get(9)?,
        status: status
            .parse()
            .map_err(|e: AppError| invalid_column(10, e.to_string()))?,
        created_at: datetime_column(row, 11)?,
        updated_at: datetime_column(row, 12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn test_repo() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radar.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (dir, repo)
    }

    fn new_source(name: &str) -> NewNewsSource {
        NewNewsSource {
            name: name.to_string(),
            url: format!("https://{}.example.com", name.to_lowercase()),
            description: None,
            cadence_days: 7,
            is_active: true,
        }
    }

    fn new_discovery(source_id: i64, name: &str, confidence: f64) -> NewDiscovery {
        NewDiscovery {
            name: name.to_string(),
            description: format!("{name} description"),
            source_url: "https://example.com".into(),
            news_source_id: source_id,
            discovered_at: Utc::now(),
            article_title: Some("Article".into()),
            article_url: Some("https://example.com/article/1".into()),
            confidence_score: confidence,
            category: Some("Database".into()),
        }
    }

    #[tokio::test]
    async fn source_crud_and_last_checked() {
        let (_dir, repo) = test_repo().await;
        let created = repo.create_source(new_source("Alpha")).await.unwrap();
        assert!(created.last_checked.is_none());

        let fetched = repo.get_source(created.id).await.unwrap();
        assert_eq!(fetched.name, "Alpha");
        assert_eq!(fetched.cadence_days, 7);

        let at = Utc::now();
        repo.update_last_checked(created.id, at).await.unwrap();
        let fetched = repo.get_source(created.id).await.unwrap();
        let stored = fetched.last_checked.unwrap();
        assert!((stored - at).num_milliseconds().abs() < 1);

        assert!(matches!(
            repo.update_last_checked(999, at).await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            repo.get_source(999).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn create_source_rejects_invalid_cadence() {
        let (_dir, repo) = test_repo().await;
        let mut source = new_source("Bad");
        source.cadence_days = 0;
        assert!(matches!(
            repo.create_source(source).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn sources_due_uses_cadence() {
        let (_dir, repo) = test_repo().await;
        let fresh = repo.create_source(new_source("Fresh")).await.unwrap();
        let never = repo.create_source(new_source("Never")).await.unwrap();
        let stale = repo.create_source(new_source("Stale")).await.unwrap();
        let inactive = repo.create_source(new_source("Inactive")).await.unwrap();
        repo.update_source(inactive.id, SourceUpdate::from_json(r#"{"is_active": false}"#).unwrap())
            .await
            .unwrap();

        let now = Utc::now();
        repo.update_last_checked(fresh.id, now - Duration::days(2)).await.unwrap();
        repo.update_last_checked(stale.id, now - Duration::days(7)).await.unwrap();

        let due: Vec<i64> = repo.sources_due(now).await.unwrap().iter().map(|s| s.id).collect();
        assert!(due.contains(&never.id));
        assert!(due.contains(&stale.id));
        assert!(!due.contains(&fresh.id));
        assert!(!due.contains(&inactive.id));
    }

    #[tokio::test]
    async fn create_discovery_rejects_case_insensitive_duplicate() {
        let (_dir, repo) = test_repo().await;
        let created = repo
            .create_discovery(new_discovery(1, "Kubernetes", 0.9))
            .await
            .unwrap();
        assert_eq!(created.status, DiscoveryStatus::Discovered);

        let err = repo
            .create_discovery(new_discovery(1, "kubernetes", 0.7))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PersistenceConflict { source_id: 1, .. }));

        // Same name under another source is a different logical key.
        assert!(repo.create_discovery(new_discovery(2, "KUBERNETES", 0.7)).await.is_ok());
    }

    #[tokio::test]
    async fn list_discoveries_filters() {
        let (_dir, repo) = test_repo().await;
        repo.create_discovery(new_discovery(1, "FooDB", 0.9)).await.unwrap();
        let mut lang = new_discovery(1, "Barlang", 0.4);
        lang.category = Some("Programming Language".into());
        let lang = repo.create_discovery(lang).await.unwrap();
        repo.create_discovery(new_discovery(2, "BazDB", 0.6)).await.unwrap();

        let all = repo.list_discoveries(&DiscoveryFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let source_one = repo.list_discoveries(&DiscoveryFilter::for_source(1)).await.unwrap();
        assert_eq!(source_one.len(), 2);

        let databases = repo.list_discoveries_by_category("Database").await.unwrap();
        assert_eq!(databases.len(), 2);

        let confident = repo.list_discoveries_min_confidence(0.6).await.unwrap();
        let names: Vec<_> = confident.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(confident.len(), 2);
        assert!(!names.contains(&"Barlang"));

        repo.update_discovery_status(lang.id, DiscoveryStatus::Ignored)
            .await
            .unwrap();
        let ignored = repo
            .list_discoveries(&DiscoveryFilter {
                status: Some(DiscoveryStatus::Ignored),
                ..DiscoveryFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(ignored.len(), 1);
        assert_eq!(ignored[0].name, "Barlang");
    }

    #[tokio::test]
    async fn list_discoveries_since_cuts_off_older_rows() {
        let (_dir, repo) = test_repo().await;
        let now = Utc::now();
        let mut old = new_discovery(1, "OldTech", 0.5);
        old.discovered_at = now - Duration::days(10);
        repo.create_discovery(old).await.unwrap();
        repo.create_discovery(new_discovery(1, "NewTech", 0.5)).await.unwrap();

        let recent = repo
            .list_discoveries_since(1, now - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].name, "NewTech");
    }

    #[tokio::test]
    async fn status_transitions_are_unconstrained() {
        let (_dir, repo) = test_repo().await;
        let d = repo.create_discovery(new_discovery(1, "FooDB", 0.9)).await.unwrap();

        let d2 = repo.update_discovery_status(d.id, DiscoveryStatus::Ignored).await.unwrap();
        assert_eq!(d2.status, DiscoveryStatus::Ignored);
        let d3 = repo.update_discovery_status(d.id, DiscoveryStatus::Discovered).await.unwrap();
        assert_eq!(d3.status, DiscoveryStatus::Discovered);
        assert_eq!(repo.get_discovery(d.id).await.unwrap().status, DiscoveryStatus::Discovered);

        assert!(matches!(
            repo.update_discovery_status(42, DiscoveryStatus::Assessed).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_discovery_reports_missing_ids() {
        let (_dir, repo) = test_repo().await;
        let d = repo.create_discovery(new_discovery(1, "FooDB", 0.9)).await.unwrap();
        repo.delete_discovery(d.id).await.unwrap();
        assert!(matches!(
            repo.delete_discovery(d.id).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
