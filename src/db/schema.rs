/// Complete database schema for tagmark.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
pub const INITIAL_SCHEMA: &str = r#"
-- Key/value documents (the settings JSON lives under key 'settings')
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- API keys and tokens, referenced by name from settings
CREATE TABLE IF NOT EXISTS secrets (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Saved pages; tags is a JSON array of slugs in resolution order
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    domain TEXT NOT NULL,
    title TEXT NOT NULL,
    excerpt TEXT,
    created_at INTEGER NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL,
    last_error TEXT
);

-- Tag ledger: one row per canonical slug
CREATE TABLE IF NOT EXISTS tags (
    slug TEXT PRIMARY KEY,
    display TEXT,
    count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
    aliases TEXT NOT NULL DEFAULT '[]'
);

-- Per-item, per-service sync state
CREATE TABLE IF NOT EXISTS sync_records (
    item_id TEXT NOT NULL,
    service TEXT NOT NULL,
    last_hash TEXT,
    status TEXT NOT NULL,
    last_error TEXT,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (item_id, service),
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_items_created ON items(created_at);
CREATE INDEX IF NOT EXISTS idx_tags_count ON tags(count);
"#;
