//! Operator CLI, plus the `track`/`untrack`/`list-tracked` inbound
//! interfaces exposed as verbs for an operator/test harness to drive
//! without a separate UI layer. `clap` derive mirrors
//! `bin/route_quality_monitor.rs`'s `Args` style.

use crate::config::Config;
use crate::db::{repo, Db};
use crate::fetcher::stealth::StealthFetcher;
use crate::fetcher::Fetcher;
use crate::generator::ChannelPatternGenerator;
use crate::lifecycle::PatternLifecycleManager;
use crate::models::{FetchSummary, Priority};
use crate::objectstore::FilesystemObjectStore;
use crate::orchestrator::FetchOrchestrator;
use crate::rate_limiter::DomainRateLimiter;
use crate::scheduler::Scheduler;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "pricewatch")]
#[command(about = "Tracks product prices across e-commerce sites and notifies subscribers")]
pub struct Cli {
    /// Path to the SQLite database file (overrides DATABASE_PATH)
    #[arg(long, env = "DATABASE_PATH")]
    pub database: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "PRICEWATCH_LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drives one fetch cycle over due listings, an explicit listing, or a product's listings.
    Fetch {
        #[arg(long)]
        all: bool,
        #[arg(long = "listing")]
        listing_id: Option<Uuid>,
        #[arg(long = "product")]
        product_id: Option<Uuid>,
        /// Print the FetchSummary as JSON instead of a human-readable line.
        #[arg(long)]
        json: bool,
    },
    /// Idempotent version activation sweep.
    ActivateLatestExtractors {
        #[arg(long)]
        dry_run: bool,
    },
    /// Idempotent stats recompute from PriceHistory.
    BackfillExtractorStats {
        #[arg(long)]
        dry_run: bool,
    },
    /// Deletes PriceHistory rows older than the configured retention window.
    RetentionSweep {
        #[arg(long)]
        dry_run: bool,
    },
    /// Tracks a product URL on behalf of a user.
    Track {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "normal")]
        priority: String,
    },
    /// Untracks a product URL for a user.
    Untrack {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        url: String,
    },
    /// Lists a user's active subscriptions.
    ListTracked {
        #[arg(long)]
        user: Uuid,
    },
}

pub async fn run(cli: Cli) -> Result<i32> {
    init_tracing(&cli.log_level);

    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    let config = Arc::new(config);

    let db = Db::open(&config.database_path).context("opening database")?;

    match cli.command {
        Command::Fetch { all, listing_id, product_id, json } => {
            let scheduler = build_scheduler(db.clone(), config.clone());
            let summary = run_fetch(&db, &scheduler, all, listing_id, product_id).await?;
            print_summary(&summary, json);
            Ok(if summary.failed > 0 && summary.success == 0 { 1 } else if summary.failed > 0 { 1 } else { 0 })
        }
        Command::ActivateLatestExtractors { dry_run } => {
            let lifecycle = build_lifecycle(db.clone());
            let activated = lifecycle.activate_latest(chrono::Utc::now(), dry_run)?;
            info!(count = activated.len(), dry_run, "activation sweep complete");
            for domain in &activated {
                println!("activated: {domain}");
            }
            Ok(0)
        }
        Command::BackfillExtractorStats { dry_run } => {
            let lifecycle = build_lifecycle(db.clone());
            let count = lifecycle.backfill_stats(dry_run)?;
            info!(count, dry_run, "stats backfill complete");
            println!("backfilled {count} pattern versions");
            Ok(0)
        }
        Command::RetentionSweep { dry_run } => {
            let deleted = repo::sweep_price_history(&db, chrono::Utc::now(), config.retention.pricehistory_days, dry_run)?;
            info!(deleted, dry_run, "retention sweep complete");
            println!("{} price_history rows {}", deleted, if dry_run { "would be deleted" } else { "deleted" });
            Ok(0)
        }
        Command::Track { user, url, priority } => {
            let priority: Priority = priority.parse().context("invalid priority")?;
            let (product, _subscription, listing, created) = repo::track(&db, user, &url, priority)?;

            let lifecycle = build_lifecycle(db.clone());
            match lifecycle.ensure_pattern(&listing.domain, &listing.url)? {
                Some(_pattern) => {
                    let scheduler = build_scheduler(db.clone(), config.clone());
                    let summary = scheduler.run_listings(vec![listing.clone()]).await?;
                    info!(
                        listing_id = %listing.id,
                        success = summary.success,
                        "requested immediate fetch for newly tracked listing"
                    );
                }
                None => {
                    info!(domain = %listing.domain, "no pattern yet; requested pattern generation");
                }
            }

            println!(
                "tracked product={} listing={} created_new_listing={}",
                product.id, listing.id, created
            );
            Ok(0)
        }
        Command::Untrack { user, url } => {
            repo::untrack(&db, user, &url)?;
            println!("untracked {url} for user {user}");
            Ok(0)
        }
        Command::ListTracked { user } => {
            let tracked = repo::list_tracked(&db, user)?;
            for (product, subscription, listing) in &tracked {
                println!(
                    "{}\t{}\t{:?}\tprice={:?}",
                    listing.url, product.id, subscription.priority, listing.current_price
                );
            }
            Ok(0)
        }
    }
}

async fn run_fetch(
    db: &Db,
    scheduler: &Scheduler,
    all: bool,
    listing_id: Option<Uuid>,
    product_id: Option<Uuid>,
) -> Result<FetchSummary> {
    if let Some(listing_id) = listing_id {
        let listing = repo::get_listing(db, listing_id)?.context("listing not found")?;
        return scheduler.run_listings(vec![listing]).await;
    }
    if let Some(product_id) = product_id {
        let listings = repo::listings_for_product(db, product_id)?;
        return scheduler.run_listings(listings).await;
    }
    if all {
        return scheduler.run_once().await;
    }
    anyhow::bail!("fetch requires one of --all, --listing, --product")
}

fn print_summary(summary: &FetchSummary, json: bool) {
    if json {
        match serde_json::to_string(summary) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to serialize summary: {e}"),
        }
    } else {
        println!(
            "total={} success={} failed={}",
            summary.total, summary.success, summary.failed
        );
        for outcome in &summary.per_listing {
            if !outcome.success {
                println!("  FAILED listing={} error={:?}", outcome.listing_id, outcome.error);
            }
        }
    }
}

fn build_lifecycle(db: Db) -> Arc<PatternLifecycleManager> {
    let (generator, _receiver) = ChannelPatternGenerator::new();
    let (health_tx, _health_rx) = tokio::sync::mpsc::unbounded_channel();
    Arc::new(PatternLifecycleManager::new(db, Arc::new(generator), health_tx))
}

fn build_scheduler(db: Db, config: Arc<Config>) -> Scheduler {
    let lifecycle = build_lifecycle(db.clone());
    let fetcher: Arc<dyn Fetcher> = Arc::new(StealthFetcher::new(
        config.fetcher.browser_timeout,
        config.difficult_domains.clone(),
    ));
    let object_store = Arc::new(FilesystemObjectStore::new(config.artifacts_dir.clone()));
    let rate_limiter = DomainRateLimiter::new(config.fetcher.request_delay, config.fetcher.domain_delays.clone());
    let orchestrator = Arc::new(FetchOrchestrator::new(
        db.clone(),
        config.clone(),
        fetcher,
        object_store,
        rate_limiter,
        lifecycle,
    ));
    Scheduler::new(db, config, orchestrator)
}

fn init_tracing(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
