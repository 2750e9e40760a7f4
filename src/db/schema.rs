/// Schema for the offline store. Applied on every open; all statements are idempotent.
pub const SCHEMA: &str = r#"
-- Mutations waiting to be replayed against the API
CREATE TABLE IF NOT EXISTS pending_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    method TEXT NOT NULL,
    headers TEXT NOT NULL,
    body TEXT,
    entity_type TEXT,
    entity_id TEXT,
    queued_at TEXT NOT NULL
);

-- Singleton sync state (pending count is derived from pending_requests).
-- sync_owner and sync_heartbeat (unix millis) form the cross-process claim.
CREATE TABLE IF NOT EXISTS sync_metadata (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_sync_time TEXT,
    sync_in_progress INTEGER NOT NULL DEFAULT 0,
    sync_owner TEXT,
    sync_heartbeat INTEGER
);

INSERT OR IGNORE INTO sync_metadata (id, last_sync_time, sync_in_progress) VALUES (1, NULL, 0);

-- Append-only diagnostic log of replay attempts
CREATE TABLE IF NOT EXISTS sync_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    action TEXT NOT NULL,
    status TEXT NOT NULL,
    details TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL
);

-- Service-worker style response cache, one logical cache per version key
CREATE TABLE IF NOT EXISTS response_cache (
    cache_name TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (cache_name, key_hash)
);

CREATE INDEX IF NOT EXISTS idx_response_cache_name ON response_cache(cache_name);
"#;
