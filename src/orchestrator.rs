//! Fetch Orchestrator (C10).
//!
//! Wires C1 (normalize, already applied at `track` time), C2/C8
//! (pattern store / lifecycle), C4 (extractor), C5 (validator), C6
//! (fetcher), C7 (rate limiter) and C11 (notifier) around one claimed
//! listing. Retry/backoff follows `scrapers::binance_session::BackoffCalculator`'s
//! shape: exponential growth from a base delay, capped, with jitter.

use crate::config::Config;
use crate::db::{pattern_store, repo, Db};
use crate::error::{FetchError, OrchestratorError};
use crate::extractor;
use crate::fetcher::{FetchOptions, Fetcher};
use crate::lifecycle::PatternLifecycleManager;
use crate::models::ListingOutcome;
use crate::notifier;
use crate::objectstore::ObjectStore;
use crate::rate_limiter::DomainRateLimiter;
use crate::validator;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

pub struct FetchOrchestrator {
    db: Db,
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    object_store: Arc<dyn ObjectStore>,
    rate_limiter: DomainRateLimiter,
    lifecycle: Arc<PatternLifecycleManager>,
}

impl FetchOrchestrator {
    pub fn new(
        db: Db,
        config: Arc<Config>,
        fetcher: Arc<dyn Fetcher>,
        object_store: Arc<dyn ObjectStore>,
        rate_limiter: DomainRateLimiter,
        lifecycle: Arc<PatternLifecycleManager>,
    ) -> Self {
        Self {
            db,
            config,
            fetcher,
            object_store,
            rate_limiter,
            lifecycle,
        }
    }

    /// Runs the fetch-validate-commit algorithm for one claimed
    /// listing, returning its outcome. Never panics; every failure
    /// mode maps to a
    /// `ListingOutcome { success: false, error: Some(..) }`.
    pub async fn run_one(&self, listing_id: Uuid) -> ListingOutcome {
        let start = Instant::now();
        match self.run_one_inner(listing_id).await {
            Ok(()) => repo::outcome(listing_id, true, start.elapsed().as_millis() as u64, None),
            Err(e) => {
                warn!(listing_id = %listing_id, error = %e, "fetch cycle failed");
                repo::outcome(listing_id, false, start.elapsed().as_millis() as u64, Some(e.to_string()))
            }
        }
    }

    async fn run_one_inner(&self, listing_id: Uuid) -> Result<(), OrchestratorError> {
        let now = Utc::now();
        let listing = repo::get_listing(&self.db, listing_id)
            .map_err(|e| OrchestratorError::Persistence { listing_id, source: e })?
            .ok_or_else(|| OrchestratorError::PatternMissing { domain: "unknown".to_string() })?;

        let domain = listing.domain.clone();

        // Step 1: pattern must already be active, else request generation.
        let pattern = pattern_store::get_active(&self.db, &domain)
            .map_err(|e| OrchestratorError::Persistence { listing_id, source: e })?;
        let Some(pattern) = pattern else {
            self.lifecycle
                .ensure_pattern(&domain, &listing.url)
                .map_err(|e| OrchestratorError::Persistence { listing_id, source: e })?;
            repo::advance_last_checked(&self.db, listing_id, now)
                .map_err(|e| OrchestratorError::Persistence { listing_id, source: e })?;
            return Err(OrchestratorError::PatternMissing { domain });
        };

        // Step 2.
        self.rate_limiter.acquire(&domain).await;

        // Step 3: fetch with retry policy.
        let fetch_result = self.fetch_with_retries(&domain, &listing.url).await;

        let outcome = match fetch_result {
            Ok(fetched) => {
                // Step 4: persist artifacts, best-effort.
                if let Err(e) = self.object_store.put_html(&domain, &listing.url, &fetched.html).await {
                    warn!(listing_id = %listing_id, error = %e, "artifact html persistence failed");
                }
                if let Some(png) = &fetched.screenshot {
                    if let Err(e) = self.object_store.put_screenshot(&domain, &listing.url, png).await {
                        warn!(listing_id = %listing_id, error = %e, "artifact screenshot persistence failed");
                    }
                }

                // Step 5.
                let extraction = extractor::extract(&fetched.html, &pattern.pattern_json, &listing.url);

                // Step 6.
                let prior_price = repo::last_price_history(&self.db, listing_id)
                    .map_err(|e| OrchestratorError::Persistence { listing_id, source: e })?
                    .map(|h| h.price);
                let validation = validator::validate(&self.config.validation, &extraction, prior_price);

                if !validation.valid {
                    Err(OrchestratorError::ValidationFailed(validation.errors.clone()))
                } else {
                    let price = extraction.price_numeric();
                    let available = derive_availability(&extraction, price.is_some());
                    let currency = self.db_currency_hint(&domain)?;
                    let method = extraction
                        .get("price")
                        .and_then(|f| f.method)
                        .map(|m| m.as_str().to_string());

                    // Step 7: atomic persistence + attempt accounting.
                    let prior_listing = listing.clone();
                    repo::persist_fetch_result(
                        &self.db,
                        listing_id,
                        now,
                        price,
                        currency.as_deref(),
                        available,
                        Some(active_version_number(&self.db, &domain).unwrap_or_default()),
                        method.as_deref(),
                        validation.confidence,
                    )
                    .map_err(|e| OrchestratorError::Persistence { listing_id, source: e })?;

                    self.lifecycle
                        .record_attempt(&domain, true)
                        .map_err(|e| OrchestratorError::Persistence { listing_id, source: e })?;

                    // Step 8: hand off to the notification evaluator.
                    let new_listing = repo::get_listing(&self.db, listing_id)
                        .map_err(|e| OrchestratorError::Persistence { listing_id, source: e })?
                        .unwrap_or(prior_listing.clone());
                    if let Err(e) = notifier::evaluate(&self.db, &prior_listing, &new_listing) {
                        warn!(listing_id = %listing_id, error = %e, "notification evaluation failed");
                    }

                    Ok(())
                }
            }
            Err(fetch_error) => Err(OrchestratorError::Fetch(fetch_error)),
        };

        if let Err(ref e) = outcome {
            if e.counts_as_attempt() {
                let _ = self.lifecycle.record_attempt(&domain, false);
            }
            if e.should_advance_last_checked() {
                let _ = repo::advance_last_checked(&self.db, listing_id, now);
            }
        }

        info!(listing_id = %listing_id, domain = %domain, ok = outcome.is_ok(), "fetch cycle complete");
        outcome
    }

    fn db_currency_hint(&self, domain: &str) -> Result<Option<String>, OrchestratorError> {
        self.db
            .with_conn(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT currency_hint FROM stores WHERE domain = ?1",
                        rusqlite::params![domain],
                        |row| row.get(0),
                    )
                    .unwrap_or(None))
            })
            .map_err(|e| OrchestratorError::Persistence {
                listing_id: Uuid::nil(),
                source: e,
            })
    }

    /// Retries `FetchTimeout`/`FetchIOError` up to `max_retries` with
    /// exponential backoff + jitter starting at `request_delay`;
    /// `FetchBlocked` is never retried within a tick.
    async fn fetch_with_retries(
        &self,
        domain: &str,
        url: &str,
    ) -> Result<crate::fetcher::FetchOutcome, FetchError> {
        let options = FetchOptions {
            simulate_human: self.config.difficult_domains.iter().any(|d| d == domain),
        };
        let mut attempt = 0u32;
        loop {
            match self.fetcher.fetch(url, &options).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() && attempt < self.config.fetcher.max_retries => {
                    let delay = backoff_delay(self.config.fetcher.request_delay, attempt);
                    warn!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn active_version_number(db: &Db, domain: &str) -> anyhow::Result<i64> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT version_number FROM pattern_versions WHERE domain = ?1 AND is_active = 1",
                rusqlite::params![domain],
                |row| row.get(0),
            )
            .unwrap_or(0))
    })
}

/// Availability defaults to "a price was extracted" unless the
/// `availability` field's text contains a known out-of-stock phrase.
fn derive_availability(extraction: &crate::models::ExtractionResult, has_price: bool) -> bool {
    const OUT_OF_STOCK_PHRASES: &[&str] = &["out of stock", "sold out", "unavailable", "currently unavailable"];
    if let Some(value) = extraction.get("availability").and_then(|f| f.value.as_deref()) {
        let lower = value.to_lowercase();
        if OUT_OF_STOCK_PHRASES.iter().any(|p| lower.contains(p)) {
            return false;
        }
    }
    has_price
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let capped_secs = (base.as_secs_f64() * 2f64.powi(attempt as i32)).min(60.0);
    let jitter_range = capped_secs * 0.3;
    let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
    Duration::from_secs_f64((capped_secs + jitter).max(base.as_secs_f64() / 2.0))
}
