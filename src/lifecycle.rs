//! Pattern Lifecycle Manager (C8).
//!
//! Owns the write path into the Pattern Store (C2): first-sight
//! requests, version commits, the activation sweep, and stats
//! backfill. Mirrors `route_quality::mitigation`'s split between
//! "detect a condition" and "hand the decision to an external consumer
//! over a channel" — here the condition is an unhealthy pattern,
//! surfaced as a `PatternHealthEvent`.

use crate::db::pattern_store::{self, HealthFlag};
use crate::db::Db;
use crate::generator::PatternGenerator;
use crate::models::{ChangeType, Pattern, PatternJson, PatternVersion};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct PatternHealthEvent {
    pub domain: String,
    pub total_attempts: i64,
    pub success_rate: f64,
}

impl From<HealthFlag> for PatternHealthEvent {
    fn from(flag: HealthFlag) -> Self {
        Self {
            domain: flag.domain,
            total_attempts: flag.total_attempts,
            success_rate: flag.success_rate,
        }
    }
}

pub struct PatternLifecycleManager {
    db: Db,
    generator: Arc<dyn PatternGenerator>,
    health_events: mpsc::UnboundedSender<PatternHealthEvent>,
}

impl PatternLifecycleManager {
    pub fn new(
        db: Db,
        generator: Arc<dyn PatternGenerator>,
        health_events: mpsc::UnboundedSender<PatternHealthEvent>,
    ) -> Self {
        Self {
            db,
            generator,
            health_events,
        }
    }

    /// Returns the active pattern, or requests generation and returns
    /// `None` ("pending") without blocking the caller.
    pub fn ensure_pattern(&self, domain: &str, sample_url: &str) -> Result<Option<Pattern>> {
        if let Some(pattern) = pattern_store::get_active(&self.db, domain)? {
            return Ok(Some(pattern));
        }
        self.generator.request(domain, sample_url, Utc::now());
        Ok(None)
    }

    pub fn commit_new_version(
        &self,
        domain: &str,
        pattern_json: &PatternJson,
        reason: Option<&str>,
        change_type: ChangeType,
    ) -> Result<PatternVersion> {
        let existing = pattern_store::get_active(&self.db, domain)?;
        if existing.is_none() {
            return pattern_store::put_initial(&self.db, domain, pattern_json, change_type);
        }
        pattern_store::replace(&self.db, domain, pattern_json, reason, change_type)
    }

    /// Reports an attempt outcome and forwards a health event if the
    /// domain crosses the unhealthy threshold.
    pub fn record_attempt(&self, domain: &str, success: bool) -> Result<()> {
        if let Some(flag) = pattern_store::record_attempt(&self.db, domain, success)? {
            let _ = self.health_events.send(flag.into());
        }
        Ok(())
    }

    /// Activation sweep, with the sticky-rollback resolution recorded
    /// in DESIGN.md: for each domain,
    /// activates the newest-by-created-at version, UNLESS the
    /// currently active version is itself a rollback performed within
    /// the last 7 days — that domain is left untouched so a rollback
    /// made because a newer auto-generated version was bad cannot be
    /// silently reverted by the very sweep meant to promote it.
    /// Idempotent.
    pub fn activate_latest(&self, now: DateTime<Utc>, dry_run: bool) -> Result<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut domains_stmt = conn.prepare("SELECT domain FROM stores")?;
            let domains = domains_stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            drop(domains_stmt);

            let mut activated = Vec::new();
            for domain in domains {
                let sticky = conn
                    .query_row(
                        "SELECT created_at FROM pattern_versions
                         WHERE domain = ?1 AND is_active = 1 AND change_type = 'rollback'",
                        params![domain],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;

                if let Some(created_at) = sticky {
                    let created_at: DateTime<Utc> = created_at.parse().unwrap_or(now);
                    if now - created_at < Duration::days(7) {
                        continue;
                    }
                }

                let latest: Option<i64> = conn
                    .query_row(
                        "SELECT version_number FROM pattern_versions WHERE domain = ?1
                         ORDER BY created_at DESC LIMIT 1",
                        params![domain],
                        |row| row.get(0),
                    )
                    .optional()?;
                let currently_active: Option<i64> = conn
                    .query_row(
                        "SELECT version_number FROM pattern_versions WHERE domain = ?1 AND is_active = 1",
                        params![domain],
                        |row| row.get(0),
                    )
                    .optional()?;

                if let Some(latest) = latest {
                    if currently_active != Some(latest) {
                        if !dry_run {
                            conn.execute(
                                "UPDATE pattern_versions SET is_active = 0 WHERE domain = ?1",
                                params![domain],
                            )?;
                            conn.execute(
                                "UPDATE pattern_versions SET is_active = 1 WHERE domain = ?1 AND version_number = ?2",
                                params![domain, latest],
                            )?;
                            let pattern_json: String = conn.query_row(
                                "SELECT pattern_json FROM pattern_versions WHERE domain = ?1 AND version_number = ?2",
                                params![domain, latest],
                                |row| row.get(0),
                            )?;
                            conn.execute(
                                "UPDATE patterns SET pattern_json = ?2, updated_at = ?3 WHERE domain = ?1",
                                params![domain, pattern_json, now.to_rfc3339()],
                            )?;
                        }
                        activated.push(domain);
                    }
                }
            }
            Ok(activated)
        })
    }

    pub fn backfill_stats(&self, dry_run: bool) -> Result<usize> {
        let pairs: Vec<(String, i64)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT domain, version_number FROM pattern_versions")?;
            Ok(stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?)
        })?;

        if dry_run {
            return Ok(pairs.len());
        }
        for (domain, version) in &pairs {
            pattern_store::backfill_stats_from_history(&self.db, domain, *version)?;
        }
        Ok(pairs.len())
    }
}
