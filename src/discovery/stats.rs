use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{ConfidenceLevel, DiscoveryStatus, TechnologyDiscovery};

/// Summary counts over a set of discoveries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryStats {
    pub total: usize,
    pub by_status: BTreeMap<DiscoveryStatus, usize>,
    /// Uncategorised discoveries are not counted here.
    pub by_category: BTreeMap<String, usize>,
    pub by_confidence: BTreeMap<ConfidenceLevel, usize>,
}

impl DiscoveryStats {
    pub fn from_discoveries(discoveries: &[TechnologyDiscovery]) -> Self {
        let mut stats = Self {
            total: discoveries.len(),
            ..Self::default()
        };
        for level in [ConfidenceLevel::High, ConfidenceLevel::Medium, ConfidenceLevel::Low] {
            stats.by_confidence.insert(level, 0);
        }

        for discovery in discoveries {
            *stats.by_status.entry(discovery.status).or_default() += 1;
            if let Some(category) = &discovery.category {
                *stats.by_category.entry(category.clone()).or_default() += 1;
            }
            *stats.by_confidence.entry(discovery.confidence_level()).or_default() += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn discovery(name: &str, confidence: f64, category: Option<&str>, status: DiscoveryStatus) -> TechnologyDiscovery {
        let now = Utc::now();
        TechnologyDiscovery {
            id: 0,
            name: name.into(),
            description: String::new(),
            source_url: "https://news.example.com".into(),
            news_source_id: 1,
            discovered_at: now,
            article_title: None,
            article_url: None,
            confidence_score: confidence,
            category: category.map(str::to_string),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn counts_by_status_category_and_bucket() {
        let stats = DiscoveryStats::from_discoveries(&[
            discovery("FooDB", 0.85, Some("Database"), DiscoveryStatus::Discovered),
            discovery("BarDB", 0.62, Some("Database"), DiscoveryStatus::Assessed),
            discovery("Qux", 0.10, None, DiscoveryStatus::Discovered),
            discovery("Edge", 0.8, Some("Platform"), DiscoveryStatus::Ignored),
        ]);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status[&DiscoveryStatus::Discovered], 2);
        assert_eq!(stats.by_status[&DiscoveryStatus::Assessed], 1);
        assert_eq!(stats.by_status[&DiscoveryStatus::Ignored], 1);
        assert_eq!(stats.by_category["Database"], 2);
        assert_eq!(stats.by_category["Platform"], 1);
        assert_eq!(stats.by_category.len(), 2);
        assert_eq!(stats.by_confidence[&ConfidenceLevel::High], 2);
        assert_eq!(stats.by_confidence[&ConfidenceLevel::Medium], 1);
        assert_eq!(stats.by_confidence[&ConfidenceLevel::Low], 1);
    }

    #[test]
    fn empty_input_reports_zero_buckets() {
        let stats = DiscoveryStats::from_discoveries(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.by_status.is_empty());
        assert_eq!(stats.by_confidence.values().sum::<usize>(), 0);
        assert_eq!(stats.by_confidence.len(), 3);
    }
}
