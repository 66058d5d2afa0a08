use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

pub const MAX_CADENCE_DAYS: u32 = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSource {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub cadence_days: u32,
    pub is_active: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewsSource {
    /// A source is due when it has never been checked, or when at least
    /// `cadence_days` days (inclusive) have elapsed since the last check.
    /// Inactive sources are never due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.last_checked {
            None => true,
            Some(last) => now - last >= Duration::days(i64::from(self.cadence_days.max(1))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNewsSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    pub cadence_days: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewNewsSource {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("source name must not be empty".into()));
        }
        validate_url(&self.url)?;
        validate_cadence(self.cadence_days)
    }
}

/// Partial update of a source. Only the listed fields may change; any other
/// key in the JSON payload is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub cadence_days: Option<u32>,
    pub is_active: Option<bool>,
}

impl SourceUpdate {
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| AppError::Validation(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.url.is_none()
            && self.description.is_none()
            && self.cadence_days.is_none()
            && self.is_active.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("source name must not be empty".into()));
            }
        }
        if let Some(url) = &self.url {
            validate_url(url)?;
        }
        if let Some(cadence) = self.cadence_days {
            validate_cadence(cadence)?;
        }
        Ok(())
    }

    pub fn apply(self, source: &mut NewsSource) {
        if let Some(name) = self.name {
            source.name = name;
        }
        if let Some(url) = self.url {
            source.url = url;
        }
        if let Some(description) = self.description {
            source.description = Some(description);
        }
        if let Some(cadence) = self.cadence_days {
            source.cadence_days = cadence;
        }
        if let Some(active) = self.is_active {
            source.is_active = active;
        }
    }
}

fn validate_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        _ => Err(AppError::Validation(format!(
            "source url must be an http(s) address: {raw}"
        ))),
    }
}

fn validate_cadence(days: u32) -> Result<()> {
    if (1..=MAX_CADENCE_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "cadence_days must be between 1 and {MAX_CADENCE_DAYS}, got {days}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(cadence_days: u32, last_checked: Option<DateTime<Utc>>) -> NewsSource {
        let now = Utc::now();
        NewsSource {
            id: 1,
            name: "Example".into(),
            url: "https://example.com".into(),
            description: None,
            cadence_days,
            is_active: true,
            last_checked,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn never_checked_source_is_always_due() {
        let now = Utc::now();
        for cadence in [1, 7, 30, MAX_CADENCE_DAYS] {
            assert!(source(cadence, None).is_due(now));
        }
    }

    #[test]
    fn weekly_cadence_boundaries() {
        let now = Utc::now();
        assert!(source(7, Some(now - Duration::days(8))).is_due(now));
        assert!(!source(7, Some(now - Duration::days(6))).is_due(now));
        assert!(source(7, Some(now - Duration::days(7))).is_due(now));
        assert!(!source(7, Some(now - Duration::days(7) + Duration::seconds(1))).is_due(now));
    }

    #[test]
    fn inactive_source_is_never_due() {
        let mut s = source(1, None);
        s.is_active = false;
        assert!(!s.is_due(Utc::now()));
    }

    #[test]
    fn new_source_validation() {
        let mut new = NewNewsSource {
            name: "Tech Blog".into(),
            url: "https://blog.example.com".into(),
            description: None,
            cadence_days: 7,
            is_active: true,
        };
        assert!(new.validate().is_ok());

        new.cadence_days = 0;
        assert!(matches!(new.validate(), Err(AppError::Validation(_))));

        new.cadence_days = 366;
        assert!(new.validate().is_err());

        new.cadence_days = 7;
        new.url = "ftp://example.com".into();
        assert!(new.validate().is_err());
    }

    #[test]
    fn source_update_rejects_unknown_fields() {
        let err = SourceUpdate::from_json(r#"{"cadence_days": 3, "last_checked": null}"#)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("last_checked"));
    }

    #[test]
    fn source_update_applies_only_present_fields() {
        let update = SourceUpdate::from_json(r#"{"cadence_days": 3, "is_active": false}"#).unwrap();
        update.validate().unwrap();
        let mut s = source(7, None);
        update.apply(&mut s);
        assert_eq!(s.cadence_days, 3);
        assert!(!s.is_active);
        assert_eq!(s.name, "Example");
    }
}
