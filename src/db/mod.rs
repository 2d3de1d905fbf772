//! Persistent schema and connection handling.
//!
//! Mirrors `signals::db_storage`'s approach: WAL mode for concurrent
//! reads during writes, a single schema string applied at startup, and
//! a `parking_lot::Mutex`-guarded `rusqlite::Connection` shared behind
//! an `Arc` so every component can hold a cheap clone.

pub mod pattern_store;
pub mod repo;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS stores (
    domain TEXT PRIMARY KEY,
    active INTEGER NOT NULL DEFAULT 1,
    rate_limit_seconds REAL NOT NULL DEFAULT 2.0,
    currency_hint TEXT
);

CREATE TABLE IF NOT EXISTS patterns (
    domain TEXT PRIMARY KEY REFERENCES stores(domain),
    pattern_json TEXT NOT NULL,
    last_validated TEXT,
    total_attempts INTEGER NOT NULL DEFAULT 0,
    successful_attempts INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0.0,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pattern_versions (
    domain TEXT NOT NULL REFERENCES stores(domain),
    version_number INTEGER NOT NULL,
    pattern_json TEXT NOT NULL,
    content_digest TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    change_reason TEXT,
    change_type TEXT NOT NULL,
    total_attempts INTEGER NOT NULL DEFAULT 0,
    successful_attempts INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0.0,
    PRIMARY KEY (domain, version_number)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_pattern_versions_active
    ON pattern_versions(domain) WHERE is_active = 1;

CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    canonical_name TEXT,
    brand TEXT,
    ean TEXT,
    upc TEXT,
    isbn TEXT,
    image_url TEXT,
    subscriber_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS listings (
    id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL REFERENCES products(id),
    domain TEXT NOT NULL REFERENCES stores(domain),
    url TEXT NOT NULL,
    url_base TEXT NOT NULL,
    current_price REAL,
    currency TEXT,
    available INTEGER NOT NULL DEFAULT 0,
    last_checked TEXT,
    last_available TEXT,
    extractor_version INTEGER,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_listings_store_urlbase_active
    ON listings(domain, url_base) WHERE active = 1;

CREATE INDEX IF NOT EXISTS idx_listings_last_checked ON listings(last_checked);

CREATE TABLE IF NOT EXISTS price_history (
    id TEXT PRIMARY KEY,
    listing_id TEXT NOT NULL REFERENCES listings(id),
    price REAL NOT NULL,
    currency TEXT,
    available INTEGER NOT NULL,
    recorded_at TEXT NOT NULL,
    extraction_method TEXT,
    confidence REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_price_history_listing_recorded
    ON price_history(listing_id, recorded_at DESC);

CREATE TABLE IF NOT EXISTS subscriptions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    product_id TEXT NOT NULL REFERENCES products(id),
    priority TEXT NOT NULL DEFAULT 'normal',
    target_price REAL,
    notify_on_drop INTEGER NOT NULL DEFAULT 1,
    notify_on_restock INTEGER NOT NULL DEFAULT 1,
    notify_on_target INTEGER NOT NULL DEFAULT 1,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_subscriptions_user_product
    ON subscriptions(user_id, product_id);

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    product_id TEXT NOT NULL REFERENCES products(id),
    notification_type TEXT NOT NULL,
    old_price REAL,
    new_price REAL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_notifications_dedup
    ON notifications(user_id, product_id, notification_type, created_at DESC);
"#;

#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("opening database at {path}"))?;
        conn.execute_batch(SCHEMA_SQL)
            .context("applying schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory database")?;
        conn.execute_batch(SCHEMA_SQL)
            .context("applying schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        f(&guard)
    }
}
