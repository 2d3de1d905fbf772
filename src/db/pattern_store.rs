//! Pattern Store (C2).
//!
//! All mutations are single-row transactions with row-level locking
//! (the `parking_lot::Mutex` around the shared `rusqlite::Connection`
//! serializes writers), using an atomic increment expression rather
//! than read-modify-write for `record_attempt`.

use super::Db;
use crate::models::{ChangeType, Pattern, PatternJson, PatternVersion};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

/// Emitted when a domain crosses the unhealthy threshold. The
/// Pattern Store only emits the flag; an
/// external consumer (wired in via `lifecycle::PatternLifecycleManager`)
/// decides what to do with it.
#[derive(Debug, Clone)]
pub struct HealthFlag {
    pub domain: String,
    pub total_attempts: i64,
    pub success_rate: f64,
}

pub fn content_digest(pattern_json: &PatternJson) -> Result<String> {
    let bytes = serde_json::to_vec(pattern_json)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn get_active(db: &Db, domain: &str) -> Result<Option<Pattern>> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT domain, pattern_json, last_validated, total_attempts,
                        successful_attempts, success_rate, updated_at
                 FROM patterns WHERE domain = ?1",
                params![domain],
                map_pattern_row,
            )
            .optional()
            .context("querying active pattern")?;
        Ok(row)
    })
}

fn map_pattern_row(row: &rusqlite::Row) -> rusqlite::Result<Pattern> {
    let pattern_json: String = row.get(1)?;
    let last_validated: Option<String> = row.get(2)?;
    Ok(Pattern {
        domain: row.get(0)?,
        pattern_json: serde_json::from_str(&pattern_json).unwrap_or(PatternJson {
            store_domain: row.get::<_, String>(0)?,
            patterns: Default::default(),
        }),
        last_validated: last_validated.and_then(|s| s.parse().ok()),
        total_attempts: row.get(3)?,
        successful_attempts: row.get(4)?,
        success_rate: row.get(5)?,
        updated_at: row.get::<_, String>(6)?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

/// Creates the first pattern version (v1) for a domain that has none
/// yet, and the corresponding `patterns` row.
pub fn put_initial(
    db: &Db,
    domain: &str,
    pattern_json: &PatternJson,
    change_type: ChangeType,
) -> Result<PatternVersion> {
    let digest = content_digest(pattern_json)?;
    let json = serde_json::to_string(pattern_json)?;
    let now = Utc::now();

    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO stores (domain) VALUES (?1)",
            params![domain],
        )?;
        conn.execute(
            "INSERT INTO pattern_versions
                (domain, version_number, pattern_json, content_digest, is_active,
                 created_at, change_reason, change_type, total_attempts,
                 successful_attempts, success_rate)
             VALUES (?1, 1, ?2, ?3, 1, ?4, NULL, ?5, 0, 0, 0.0)",
            params![domain, json, digest, now.to_rfc3339(), change_type.as_str()],
        )?;
        conn.execute(
            "INSERT INTO patterns (domain, pattern_json, last_validated, total_attempts,
                                    successful_attempts, success_rate, updated_at)
             VALUES (?1, ?2, ?3, 0, 0, 0.0, ?3)",
            params![domain, json, now.to_rfc3339()],
        )?;
        Ok(())
    })?;

    Ok(PatternVersion {
        domain: domain.to_string(),
        version_number: 1,
        pattern_json: pattern_json.clone(),
        content_digest: digest,
        is_active: true,
        created_at: now,
        change_reason: None,
        change_type,
        total_attempts: 0,
        successful_attempts: 0,
        success_rate: 0.0,
    })
}

/// Atomically commits a new version: writes the new `PatternVersion`
/// (version = max+1, active), deactivates every other version for the
/// domain, updates the `patterns` row, and copies the prior aggregate
/// stats into the version being superseded.
pub fn replace(
    db: &Db,
    domain: &str,
    pattern_json: &PatternJson,
    change_reason: Option<&str>,
    change_type: ChangeType,
) -> Result<PatternVersion> {
    let digest = content_digest(pattern_json)?;
    let json = serde_json::to_string(pattern_json)?;
    let now = Utc::now();

    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;

        let current = tx.query_row(
            "SELECT total_attempts, successful_attempts, success_rate
             FROM patterns WHERE domain = ?1",
            params![domain],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, f64>(2)?)),
        ).optional()?;
        let (total_attempts, successful_attempts, success_rate) =
            current.unwrap_or((0, 0, 0.0));

        let next_version: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(version_number), 0) + 1 FROM pattern_versions WHERE domain = ?1",
                params![domain],
                |row| row.get(0),
            )?;

        tx.execute(
            "UPDATE pattern_versions SET total_attempts = ?2, successful_attempts = ?3,
                success_rate = ?4
             WHERE domain = ?1 AND is_active = 1",
            params![domain, total_attempts, successful_attempts, success_rate],
        )?;
        tx.execute(
            "UPDATE pattern_versions SET is_active = 0 WHERE domain = ?1",
            params![domain],
        )?;
        tx.execute(
            "INSERT INTO pattern_versions
                (domain, version_number, pattern_json, content_digest, is_active,
                 created_at, change_reason, change_type, total_attempts,
                 successful_attempts, success_rate)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, 0, 0, 0.0)",
            params![
                domain,
                next_version,
                json,
                digest,
                now.to_rfc3339(),
                change_reason,
                change_type.as_str()
            ],
        )?;
        tx.execute(
            "INSERT INTO stores (domain) VALUES (?1) ON CONFLICT(domain) DO NOTHING",
            params![domain],
        )?;
        tx.execute(
            "INSERT INTO patterns (domain, pattern_json, last_validated, total_attempts,
                                    successful_attempts, success_rate, updated_at)
             VALUES (?1, ?2, ?3, 0, 0, 0.0, ?3)
             ON CONFLICT(domain) DO UPDATE SET
                pattern_json = excluded.pattern_json,
                last_validated = excluded.last_validated,
                updated_at = excluded.updated_at",
            params![domain, json, now.to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(PatternVersion {
            domain: domain.to_string(),
            version_number: next_version,
            pattern_json: pattern_json.clone(),
            content_digest: digest.clone(),
            is_active: true,
            created_at: now,
            change_reason: change_reason.map(|s| s.to_string()),
            change_type,
            total_attempts: 0,
            successful_attempts: 0,
            success_rate: 0.0,
        })
    })
}

/// Atomically increments attempt counters via a single `UPDATE`
/// expression (never read-then-write in application code), and
/// returns a health flag if the domain crosses the unhealthy
/// threshold (`total_attempts >= 10 && success_rate < 0.6`).
pub fn record_attempt(db: &Db, domain: &str, success: bool) -> Result<Option<HealthFlag>> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE patterns SET
                total_attempts = total_attempts + 1,
                successful_attempts = successful_attempts + ?2,
                success_rate = CAST(successful_attempts + ?2 AS REAL) / CAST(total_attempts + 1 AS REAL)
             WHERE domain = ?1",
            params![domain, success as i64],
        )?;
        conn.execute(
            "UPDATE pattern_versions SET
                total_attempts = total_attempts + 1,
                successful_attempts = successful_attempts + ?2,
                success_rate = CAST(successful_attempts + ?2 AS REAL) / CAST(total_attempts + 1 AS REAL)
             WHERE domain = ?1 AND is_active = 1",
            params![domain, success as i64],
        )?;

        let row = conn
            .query_row(
                "SELECT total_attempts, success_rate FROM patterns WHERE domain = ?1",
                params![domain],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(total, rate)| {
            if total >= 10 && rate < 0.6 {
                Some(HealthFlag {
                    domain: domain.to_string(),
                    total_attempts: total,
                    success_rate: rate,
                })
            } else {
                None
            }
        }))
    })
}

/// Re-activates `version_number`, deactivates every other version for
/// the domain, and points the `patterns` row at it. Stats are left
/// intact (not reset).
pub fn rollback(db: &Db, domain: &str, version_number: i64) -> Result<()> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let pattern_json: String = tx.query_row(
            "SELECT pattern_json FROM pattern_versions WHERE domain = ?1 AND version_number = ?2",
            params![domain, version_number],
            |row| row.get(0),
        ).context("version not found")?;

        tx.execute(
            "UPDATE pattern_versions SET is_active = 0 WHERE domain = ?1",
            params![domain],
        )?;
        tx.execute(
            "UPDATE pattern_versions SET is_active = 1, change_type = 'rollback'
             WHERE domain = ?1 AND version_number = ?2",
            params![domain, version_number],
        )?;
        tx.execute(
            "UPDATE patterns SET pattern_json = ?2, updated_at = ?3 WHERE domain = ?1",
            params![domain, pattern_json, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    })
}

/// Recomputes `total_attempts`/`successful_attempts` for one version
/// from `price_history`, via the listings that point at it.
/// Idempotent.
pub fn backfill_stats_from_history(db: &Db, domain: &str, version_number: i64) -> Result<()> {
    db.with_conn(|conn| {
        let (total, successful): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), SUM(CASE WHEN ph.price IS NOT NULL THEN 1 ELSE 0 END)
             FROM price_history ph
             JOIN listings l ON l.id = ph.listing_id
             WHERE l.extractor_version = ?1 AND l.domain = ?2",
            params![version_number, domain],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0))),
        )?;
        let rate = if total > 0 {
            successful as f64 / total as f64
        } else {
            0.0
        };
        conn.execute(
            "UPDATE pattern_versions SET total_attempts = ?3, successful_attempts = ?4,
                success_rate = ?5
             WHERE domain = ?1 AND version_number = ?2",
            params![domain, version_number, total, successful, rate],
        )?;
        Ok(())
    })
}
