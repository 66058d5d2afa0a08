use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyDiscovery {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub source_url: String,
    pub news_source_id: i64,
    pub discovered_at: DateTime<Utc>,
    pub article_title: Option<String>,
    pub article_url: Option<String>,
    pub confidence_score: f64,
    pub category: Option<String>,
    pub status: DiscoveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TechnologyDiscovery {
    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence_score)
    }
}

/// Insert payload; the store assigns id, status and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscovery {
    pub name: String,
    pub description: String,
    pub source_url: String,
    pub news_source_id: i64,
    pub discovered_at: DateTime<Utc>,
    pub article_title: Option<String>,
    pub article_url: Option<String>,
    pub confidence_score: f64,
    pub category: Option<String>,
}

impl NewDiscovery {
    /// Lower-cased name used for the logical (source, name) key.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("discovery name must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(AppError::Validation(format!(
                "confidence_score must be within 0.0..=1.0, got {}",
                self.confidence_score
            )));
        }
        Ok(())
    }
}

pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStatus {
    #[default]
    Discovered,
    Assessed,
    Ignored,
}

impl DiscoveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Assessed => "assessed",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for DiscoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discovered" => Ok(Self::Discovered),
            "assessed" => Ok(Self::Assessed),
            "ignored" => Ok(Self::Ignored),
            other => Err(AppError::Validation(format!(
                "unknown discovery status '{other}' (expected discovered, assessed or ignored)"
            ))),
        }
    }
}

/// Reporting bucket for a confidence score. Never used to gate persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Filters for `list_discoveries`. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryFilter {
    pub news_source_id: Option<i64>,
    pub status: Option<DiscoveryStatus>,
    pub category: Option<String>,
    pub min_confidence: Option<f64>,
    pub since: Option<DateTime<Utc>>,
}

impl DiscoveryFilter {
    pub fn for_source(news_source_id: i64) -> Self {
        Self {
            news_source_id: Some(news_source_id),
            ..Self::default()
        }
    }
}

/// Partial update of a discovery coming from the review workflow.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryUpdate {
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<DiscoveryStatus>,
}

impl DiscoveryUpdate {
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| AppError::Validation(e.to_string()))
    }

    pub fn status(status: DiscoveryStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.category.is_none() && self.status.is_none()
    }
}
