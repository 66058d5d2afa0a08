use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::Candidate;
use crate::services::cancellable;
use crate::utils::{looks_truncated, truncate_chars, truncate_for_log};

use super::provider::{ChatMessage, CompletionProvider, CompletionRequest};

/// Content characters sent to the model per article.
pub const PROMPT_CONTENT_CHARS: usize = 3000;

const SYSTEM_PROMPT: &str = "You are a technology analyst. Extract only new or emerging technologies from articles. Be precise and avoid false positives.";

/// Model parameters for candidate extraction.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

/// Turns article text into technology candidates via a completion provider.
pub struct TechExtractor {
    provider: Arc<dyn CompletionProvider>,
    settings: ExtractionSettings,
    fence: Regex,
}

impl TechExtractor {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: ExtractionSettings) -> Result<Self> {
        let fence = Regex::new(r"(?s)^\s*```(?:json|JSON)?\s*(.*?)\s*```\s*$")
            .map_err(|e| AppError::from(anyhow::anyhow!("invalid fence pattern: {e}")))?;
        Ok(Self {
            provider,
            settings,
            fence,
        })
    }

    pub fn build_request(&self, title: &str, url: &str, content: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(title, url, content)),
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }

    /// Ask the model for technologies mentioned in one article.
    ///
    /// Provider failures, unparseable output and schema mismatches are all
    /// returned as errors so the caller can log the cause and skip the
    /// article.
    pub async fn extract(
        &self,
        title: &str,
        url: &str,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>> {
        let request = self.build_request(title, url, content);
        let raw = cancellable(cancel, self.provider.complete(&request)).await?;
        self.parse_candidates(&raw)
    }

    pub fn parse_candidates(&self, raw: &str) -> Result<Vec<Candidate>> {
        let body = match self.fence.captures(raw).and_then(|c| c.get(1)) {
            Some(inner) => inner.as_str(),
            None => raw.trim(),
        };

        let value: Value = serde_json::from_str(body).map_err(|e| {
            if looks_truncated(&e) {
                tracing::warn!("model response ended early; max_tokens may be too low");
            }
            AppError::ExtractionParse(format!(
                "{e}; response: {}",
                truncate_for_log(body, 200)
            ))
        })?;

        let Value::Array(items) = value else {
            return Err(AppError::SchemaViolation(format!(
                "expected a JSON array, got {}",
                json_type(&value)
            )));
        };

        items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                let candidate: Candidate = serde_json::from_value(item)
                    .map_err(|e| AppError::SchemaViolation(format!("item {idx}: {e}")))?;
                validate_candidate(idx, candidate)
            })
            .collect()
    }
}

fn validate_candidate(idx: usize, mut candidate: Candidate) -> Result<Candidate> {
    candidate.name = candidate.name.trim().to_string();
    if candidate.name.is_empty() {
        return Err(AppError::SchemaViolation(format!("item {idx}: empty name")));
    }
    if !(0.0..=1.0).contains(&candidate.confidence) {
        return Err(AppError::SchemaViolation(format!(
            "item {idx}: confidence {} outside 0.0..=1.0",
            candidate.confidence
        )));
    }
    candidate.category = candidate
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    Ok(candidate)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn build_prompt(title: &str, url: &str, content: &str) -> String {
    format!(
        "Analyze the following technology article and extract any new or emerging technologies mentioned.

Article Title: {title}
Article URL: {url}
Article Content: {content}

For each technology you identify, provide:
1. Technology name (be specific)
2. Brief description of what it is/does
3. Category (AI/ML, Programming Language, Framework, Tool, Platform, Database, etc.)
4. Confidence score (0.0-1.0) based on how clearly it's described

Only include technologies that are:
- New or emerging
- Clearly described in the article
- Not just mentioned in passing

Return your response as a JSON array of objects with these fields:
- name: string
- description: string
- category: string
- confidence: float (0.0-1.0)

If no relevant technologies are found, return an empty array.",
        content = truncate_chars(content, PROMPT_CONTENT_CHARS)
    )
}
