pub const SCHEMA: &str = r#"
-- news_sources table
CREATE TABLE IF NOT EXISTS news_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    description TEXT,
    cadence_days INTEGER NOT NULL CHECK (cadence_days BETWEEN 1 AND 365),
    is_active INTEGER NOT NULL DEFAULT 1,
    last_checked TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_news_sources_active ON news_sources(is_active);

-- technology_discoveries table
-- news_source_id is a lookup reference only; discoveries outlive their source.
-- (news_source_id, name_key) is unique by convention, checked on insert.
CREATE TABLE IF NOT EXISTS technology_discoveries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL,
    description TEXT NOT NULL,
    source_url TEXT NOT NULL,
    news_source_id INTEGER NOT NULL,
    discovered_at TEXT NOT NULL,
    article_title TEXT,
    article_url TEXT,
    confidence_score REAL NOT NULL CHECK (confidence_score BETWEEN 0.0 AND 1.0),
    category TEXT,
    status TEXT NOT NULL DEFAULT 'discovered',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_discoveries_source_name ON technology_discoveries(news_source_id, name_key);
CREATE INDEX IF NOT EXISTS idx_discoveries_status ON technology_discoveries(status);
CREATE INDEX IF NOT EXISTS idx_discoveries_category ON technology_discoveries(category);
CREATE INDEX IF NOT EXISTS idx_discoveries_discovered_at ON technology_discoveries(discovered_at DESC);
"#;
