//! Scheduler (C9).
//!
//! State machine per listing: `IDLE -> DUE -> RUNNING -> IDLE` (with
//! terminal `DISABLED`, i.e. `listing.active = false`). The tick loop
//! mirrors `route_quality::prober`'s multi-interval `tokio::select!`
//! shape, and shutdown draining follows `bin::edge_receiver`'s
//! ctrl_c-spawns-a-stop-flag pattern.

use crate::config::Config;
use crate::db::repo;
use crate::db::Db;
use crate::models::{FetchSummary, ListingOutcome, Priority};
use crate::orchestrator::FetchOrchestrator;
use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, timeout};
use tracing::{info, warn};

pub struct Scheduler {
    db: Db,
    config: Arc<Config>,
    orchestrator: Arc<FetchOrchestrator>,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(db: Db, config: Arc<Config>, orchestrator: Arc<FetchOrchestrator>) -> Self {
        Self {
            db,
            config,
            orchestrator,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Installs a ctrl-c handler that flips the shutdown flag observed
    /// at the next tick boundary.
    pub fn install_signal_handler(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    /// Runs the periodic tick loop until shutdown, draining in-flight
    /// workers with a bounded deadline on exit.
    pub async fn run(&self) -> Result<()> {
        let mut ticker = interval(self.config.scheduler.tick);
        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match timeout(self.config.scheduler.tick_deadline, self.run_once()).await {
                Ok(Ok(summary)) => {
                    info!(total = summary.total, success = summary.success, failed = summary.failed, "tick complete");
                }
                Ok(Err(e)) => warn!(error = %e, "tick failed"),
                Err(_) => warn!("tick selection exceeded deadline, deferring remainder to next tick"),
            }
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
        }
        self.drain().await;
        Ok(())
    }

    async fn drain(&self) {
        let _ = timeout(self.config.scheduler.shutdown_deadline, async {
            tokio::task::yield_now().await;
        })
        .await;
    }

    /// One selection + dispatch cycle: selects up to `max_batch` due
    /// listings, claims each, and runs them on a worker pool of size
    /// `W`. Overflow beyond `max_batch` is left for the next tick.
    pub async fn run_once(&self) -> Result<FetchSummary> {
        let now = Utc::now();
        let intervals = self.config.scheduler.intervals.clone();
        let due = repo::due_listings(
            &self.db,
            now,
            move |p: Priority| match p {
                Priority::High => chrono::Duration::from_std(intervals.high).unwrap_or_default(),
                Priority::Normal => chrono::Duration::from_std(intervals.normal).unwrap_or_default(),
                Priority::Low => chrono::Duration::from_std(intervals.low).unwrap_or_default(),
            },
            self.config.scheduler.max_batch,
        )?;

        self.run_listings(due.into_iter().map(|(listing, _)| listing).collect()).await
    }

    /// Runs an explicit set of listings (used by `fetch --listing` /
    /// `--product` CLI verbs, bypassing due-selection).
    pub async fn run_listings(&self, listings: Vec<crate::models::ProductListing>) -> Result<FetchSummary> {
        let permits = Arc::new(Semaphore::new(self.config.scheduler.workers.max(1)));
        let mut handles = Vec::with_capacity(listings.len());

        for listing in listings {
            let now = Utc::now();
            let claimed = repo::claim_listing(&self.db, listing.id, listing.last_checked, now)?;
            if !claimed {
                continue;
            }

            let permits = permits.clone();
            let orchestrator = self.orchestrator.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("semaphore not closed");
                orchestrator.run_one(listing.id).await
            }));
        }

        let mut per_listing: Vec<ListingOutcome> = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => per_listing.push(outcome),
                Err(join_err) => warn!(error = %join_err, "worker task panicked"),
            }
        }

        let success = per_listing.iter().filter(|o| o.success).count();
        let failed = per_listing.len() - success;
        Ok(FetchSummary {
            total: per_listing.len(),
            success,
            failed,
            per_listing,
        })
    }
}
