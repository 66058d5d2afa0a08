use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailure {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("AI response is not valid JSON: {0}")]
    ExtractionParse(String),

    #[error("AI response does not match the candidate schema: {0}")]
    SchemaViolation(String),

    #[error("Discovery '{name}' already recorded for source {source_id}")]
    PersistenceConflict { source_id: i64, name: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Discovery run failed: {0}")]
    DiscoveryRun(String),

    #[error("AI provider error{}: {}", status_suffix(.status), .message)]
    AiProvider { status: Option<u16>, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Coarse classification used at the command boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Invalid,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal error",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Internal => 1,
            Self::NotFound => 2,
            Self::Conflict => 3,
            Self::Invalid => 4,
            Self::Cancelled => 130,
        }
    }
}

impl AppError {
    #[cfg(test)]
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailure {
            url: url.into(),
            status: None,
            reason: reason.into(),
        }
    }

    pub fn fetch_status(url: impl Into<String>, status: u16) -> Self {
        Self::FetchFailure {
            url: url.into(),
            status: Some(status),
            reason: format!("HTTP {status}"),
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PersistenceConflict { .. } => ErrorKind::Conflict,
            Self::Validation(_) | Self::Config(_) | Self::Url(_) => ErrorKind::Invalid,
            Self::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Internal,
        }
    }

    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::FetchFailure {
                status: Some(status),
                ..
            } => is_transient_status(*status),
            Self::AiProvider { status: None, .. } => true,
            Self::AiProvider {
                status: Some(status),
                ..
            } => is_transient_status(*status),
            _ => false,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub type Result<T> = std::result::Result<T, AppError>;
