use serde::{Deserialize, Serialize};

/// A link found on a source's front page. Lives only for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleLink {
    pub url: String,
    pub title: String,
    pub base_url: String,
}

/// Cleaned article text, already bounded in length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDocument {
    pub url: String,
    pub text: String,
}

/// A technology mention as reported by the model, before dedup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub confidence: f64,
}
