//! Scenario 5 from the seeded end-to-end list: two listings on the
//! same domain must be spaced by at least the configured per-domain
//! delay, and due-selection orders by priority then by staleness.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use pricewatch_core::config::Config;
use pricewatch_core::db::{repo, Db};
use pricewatch_core::error::FetchError;
use pricewatch_core::fetcher::{FetchOptions, FetchOutcome, Fetcher};
use pricewatch_core::generator::ChannelPatternGenerator;
use pricewatch_core::lifecycle::PatternLifecycleManager;
use pricewatch_core::models::{ChangeType, FieldPattern, PatternJson, Priority, Selector, SelectorType};
use pricewatch_core::objectstore::FilesystemObjectStore;
use pricewatch_core::orchestrator::FetchOrchestrator;
use pricewatch_core::rate_limiter::DomainRateLimiter;
use pricewatch_core::scheduler::Scheduler;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

struct TimestampingFetcher {
    stamps: Mutex<Vec<tokio::time::Instant>>,
}

impl TimestampingFetcher {
    fn new() -> Self {
        Self { stamps: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Fetcher for TimestampingFetcher {
    async fn fetch(&self, _url: &str, _options: &FetchOptions) -> Result<FetchOutcome, FetchError> {
        self.stamps.lock().unwrap().push(tokio::time::Instant::now());
        Ok(FetchOutcome {
            html: r#"<span class="price">$9.99</span>"#.to_string(),
            screenshot: None,
            page_title: Some("Widget".to_string()),
            fetch_duration_s: 0.0,
        })
    }
}

fn simple_pattern() -> PatternJson {
    let mut patterns = HashMap::new();
    patterns.insert(
        "price".to_string(),
        FieldPattern {
            primary: Selector {
                kind: SelectorType::Css,
                selector: ".price".to_string(),
                attribute: None,
                confidence: 0.9,
            },
            fallbacks: vec![],
        },
    );
    PatternJson {
        store_domain: "shop.example.com".to_string(),
        patterns,
    }
}

#[tokio::test(start_paused = true)]
async fn same_domain_listings_are_spaced_by_the_configured_delay() {
    let db = Db::open_in_memory().unwrap();
    let (generator, _gen_rx) = ChannelPatternGenerator::new();
    let (health_tx, _health_rx) = tokio::sync::mpsc::unbounded_channel();
    let lifecycle = Arc::new(PatternLifecycleManager::new(db.clone(), Arc::new(generator), health_tx));
    lifecycle
        .commit_new_version("shop.example.com", &simple_pattern(), None, ChangeType::AutoGenerated)
        .unwrap();

    let (_p1, _s1, listing1, _c1) =
        repo::track(&db, Uuid::new_v4(), "https://shop.example.com/item/1", Priority::Normal).unwrap();
    let (_p2, _s2, listing2, _c2) =
        repo::track(&db, Uuid::new_v4(), "https://shop.example.com/item/2", Priority::Normal).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(Config {
        artifacts_dir: dir.path().to_string_lossy().to_string(),
        ..Config::default()
    });
    let fetcher = Arc::new(TimestampingFetcher::new());
    let orchestrator = Arc::new(FetchOrchestrator::new(
        db.clone(),
        config.clone(),
        fetcher.clone(),
        Arc::new(FilesystemObjectStore::new(dir.path())),
        DomainRateLimiter::new(Duration::from_secs(2), HashMap::new()),
        lifecycle,
    ));
    let scheduler = Scheduler::new(db.clone(), config, orchestrator);

    let summary = scheduler.run_listings(vec![listing1, listing2]).await.unwrap();
    assert_eq!(summary.success, 2);

    let mut stamps = fetcher.stamps.lock().unwrap().clone();
    stamps.sort();
    assert_eq!(stamps.len(), 2);
    assert!(stamps[1] - stamps[0] >= Duration::from_secs(2));
}

#[tokio::test]
async fn due_listings_prefer_higher_priority_then_staleness() {
    let db = Db::open_in_memory().unwrap();
    let now = Utc::now();

    let (_p_low, _s_low, low_listing, _) =
        repo::track(&db, Uuid::new_v4(), "https://shop.example.com/low", Priority::Low).unwrap();
    let (_p_high, _s_high, high_listing, _) =
        repo::track(&db, Uuid::new_v4(), "https://shop.example.com/high", Priority::High).unwrap();

    // Both listings start with last_checked = NULL (immediately due);
    // stamp the low-priority one as freshly checked so only priority
    // ordering, not staleness, can explain which comes first.
    repo::advance_last_checked(&db, low_listing.id, now).unwrap();
    repo::advance_last_checked(&db, high_listing.id, now - ChronoDuration::hours(1)).unwrap();

    let due = repo::due_listings(
        &db,
        now + ChronoDuration::minutes(20),
        |p| match p {
            Priority::High => ChronoDuration::minutes(15),
            Priority::Normal => ChronoDuration::hours(1),
            Priority::Low => ChronoDuration::hours(24),
        },
        10,
    )
    .unwrap();

    assert_eq!(due.len(), 1);
    assert_eq!(due[0].0.id, high_listing.id);
    assert_eq!(due[0].1, Priority::High);
}
