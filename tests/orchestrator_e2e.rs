//! End-to-end scenarios seeded in SPEC_FULL.md's "testable properties"
//! section: fresh-domain pattern generation, cached-pattern success,
//! fallback selectors, price-drop dedup, and pattern rollback vs the
//! activation sweep.

use async_trait::async_trait;
use pricewatch_core::config::Config;
use pricewatch_core::db::{pattern_store, repo, Db};
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

struct ScriptedFetcher {
    html: Mutex<String>,
}

impl ScriptedFetcher {
    fn new(html: &str) -> Self {
        Self { html: Mutex::new(html.to_string()) }
    }

    fn set_html(&self, html: &str) {
        *self.html.lock().unwrap() = html.to_string();
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str, _options: &FetchOptions) -> Result<FetchOutcome, FetchError> {
        Ok(FetchOutcome {
            html: self.html.lock().unwrap().clone(),
            screenshot: None,
            page_title: Some("Widget".to_string()),
            fetch_duration_s: 0.0,
        })
    }
}

fn price_pattern(primary: (&str, f64), fallback: Option<(&str, &str, f64)>) -> PatternJson {
    let mut patterns = HashMap::new();
    patterns.insert(
        "price".to_string(),
        FieldPattern {
            primary: Selector {
                kind: SelectorType::Css,
                selector: primary.0.to_string(),
                attribute: None,
                confidence: primary.1,
            },
            fallbacks: fallback
                .map(|(sel, attr, conf)| {
                    vec![Selector {
                        kind: SelectorType::Css,
                        selector: sel.to_string(),
                        attribute: Some(attr.to_string()),
                        confidence: conf,
                    }]
                })
                .unwrap_or_default(),
        },
    );
    PatternJson {
        store_domain: "shop.example.com".to_string(),
        patterns,
    }
}

struct Harness {
    db: Db,
    config: Arc<Config>,
    fetcher: Arc<ScriptedFetcher>,
    lifecycle: Arc<PatternLifecycleManager>,
    scheduler: Scheduler,
    _artifacts_dir: tempfile::TempDir,
}

fn build_harness(html: &str) -> Harness {
    let db = Db::open_in_memory().unwrap();
    let (generator, _gen_rx) = ChannelPatternGenerator::new();
    let (health_tx, _health_rx) = tokio::sync::mpsc::unbounded_channel();
    let lifecycle = Arc::new(PatternLifecycleManager::new(db.clone(), Arc::new(generator), health_tx));

    let artifacts_dir = tempfile::tempdir().unwrap();
    let config = Arc::new(Config {
        artifacts_dir: artifacts_dir.path().to_string_lossy().to_string(),
        ..Config::default()
    });

    let fetcher = Arc::new(ScriptedFetcher::new(html));
    let orchestrator = Arc::new(FetchOrchestrator::new(
        db.clone(),
        config.clone(),
        fetcher.clone(),
        Arc::new(FilesystemObjectStore::new(artifacts_dir.path())),
        DomainRateLimiter::new(Duration::from_millis(1), HashMap::new()),
        lifecycle.clone(),
    ));
    let scheduler = Scheduler::new(db.clone(), config.clone(), orchestrator);

    Harness {
        db,
        config,
        fetcher,
        lifecycle,
        scheduler,
        _artifacts_dir: artifacts_dir,
    }
}

#[tokio::test]
async fn fresh_domain_requests_pattern_generation_and_leaves_listing_alive() {
    let db = Db::open_in_memory().unwrap();
    let (generator, mut gen_rx) = ChannelPatternGenerator::new();
    let (health_tx, _health_rx) = tokio::sync::mpsc::unbounded_channel();
    let lifecycle = Arc::new(PatternLifecycleManager::new(db.clone(), Arc::new(generator), health_tx));

    let (product, _sub, listing, created) =
        repo::track(&db, Uuid::new_v4(), "https://shop.example.com/p/42", Priority::Normal).unwrap();
    assert!(created);
    assert_eq!(listing.url_base, "https://shop.example.com/p/42");

    let result = lifecycle.ensure_pattern(&listing.domain, &listing.url).unwrap();
    assert!(result.is_none());
    let request = gen_rx.recv().await.unwrap();
    assert_eq!(request.domain, "shop.example.com");

    let history = repo::last_price_history(&db, listing.id).unwrap();
    assert!(history.is_none());
    let notifications: i64 = db
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))?))
        .unwrap();
    assert_eq!(notifications, 0);
    assert_eq!(product.subscriber_count, 1);
}

#[tokio::test]
async fn cached_pattern_successful_fetch_records_price_and_history() {
    let harness = build_harness(r#"<span class="price">$29.99</span>"#);
    let (_product, _sub, listing, _created) = repo::track(
        &harness.db,
        Uuid::new_v4(),
        "https://shop.example.com/p/42",
        Priority::Normal,
    )
    .unwrap();
    harness
        .lifecycle
        .commit_new_version(
            "shop.example.com",
            &price_pattern((".price", 0.9), None),
            None,
            ChangeType::AutoGenerated,
        )
        .unwrap();

    let summary = harness.scheduler.run_listings(vec![listing.clone()]).await.unwrap();
    assert_eq!(summary.success, 1);

    let updated = repo::get_listing(&harness.db, listing.id).unwrap().unwrap();
    assert_eq!(updated.current_price, Some(29.99));
    assert!(updated.available);

    let history = repo::last_price_history(&harness.db, listing.id).unwrap().unwrap();
    assert_eq!(history.price, 29.99);
    assert_eq!(history.extraction_method.as_deref(), Some("css"));
    assert!((history.confidence - 0.9).abs() < 1e-9);

    let pattern = pattern_store::get_active(&harness.db, "shop.example.com").unwrap().unwrap();
    assert_eq!(pattern.total_attempts, 1);
    assert_eq!(pattern.successful_attempts, 1);
}

#[tokio::test]
async fn primary_selector_fails_fallback_succeeds_with_its_own_confidence() {
    let harness = build_harness(r#"<span data-price="49,00"></span>"#);
    let (_product, _sub, listing, _created) = repo::track(
        &harness.db,
        Uuid::new_v4(),
        "https://shop.example.com/p/42",
        Priority::Normal,
    )
    .unwrap();
    harness
        .lifecycle
        .commit_new_version(
            "shop.example.com",
            &price_pattern((".price", 0.9), Some(("[data-price]", "data-price", 0.7))),
            None,
            ChangeType::AutoGenerated,
        )
        .unwrap();

    let summary = harness.scheduler.run_listings(vec![listing.clone()]).await.unwrap();
    assert_eq!(summary.success, 1);

    let updated = repo::get_listing(&harness.db, listing.id).unwrap().unwrap();
    assert_eq!(updated.current_price, Some(49.0));

    let history = repo::last_price_history(&harness.db, listing.id).unwrap().unwrap();
    assert!((history.confidence - 0.7).abs() < 1e-9);
    let _ = &harness.config;
}

#[tokio::test]
async fn price_drop_notifies_once_then_dedupes_within_24h() {
    let harness = build_harness(r#"<span class="price">$100.00</span>"#);
    let (_product, mut sub, listing, _created) = repo::track(
        &harness.db,
        Uuid::new_v4(),
        "https://shop.example.com/p/42",
        Priority::Normal,
    )
    .unwrap();
    let _ = &mut sub;
    harness
        .lifecycle
        .commit_new_version(
            "shop.example.com",
            &price_pattern((".price", 0.9), None),
            None,
            ChangeType::AutoGenerated,
        )
        .unwrap();

    harness.scheduler.run_listings(vec![listing.clone()]).await.unwrap();

    harness.fetcher.set_html(r#"<span class="price">$79.00</span>"#);
    let listing_after_first = repo::get_listing(&harness.db, listing.id).unwrap().unwrap();
    harness.scheduler.run_listings(vec![listing_after_first.clone()]).await.unwrap();

    let notification_count: i64 = harness
        .db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE notification_type = 'price_drop'",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(notification_count, 1);

    // Second fetch at the same (already-dropped) price must not notify again.
    let listing_after_second = repo::get_listing(&harness.db, listing.id).unwrap().unwrap();
    harness.scheduler.run_listings(vec![listing_after_second]).await.unwrap();
    let notification_count_after: i64 = harness
        .db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE notification_type = 'price_drop'",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(notification_count_after, 1);
}

#[tokio::test]
async fn rollback_then_activation_sweep_leaves_rollback_sticky() {
    let db = Db::open_in_memory().unwrap();
    let (generator, _gen_rx) = ChannelPatternGenerator::new();
    let (health_tx, _health_rx) = tokio::sync::mpsc::unbounded_channel();
    let lifecycle = PatternLifecycleManager::new(db.clone(), Arc::new(generator), health_tx);

    let p1 = price_pattern((".price", 0.9), None);
    lifecycle.commit_new_version("shop.example.com", &p1, None, ChangeType::AutoGenerated).unwrap();
    lifecycle.commit_new_version("shop.example.com", &p1, None, ChangeType::AutoGenerated).unwrap();
    lifecycle.commit_new_version("shop.example.com", &p1, None, ChangeType::AutoGenerated).unwrap();

    pattern_store::rollback(&db, "shop.example.com", 1).unwrap();

    let activated = lifecycle.activate_latest(chrono::Utc::now(), false).unwrap();
    assert!(!activated.contains(&"shop.example.com".to_string()));

    let active_version: i64 = db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT version_number FROM pattern_versions WHERE domain = ?1 AND is_active = 1",
                rusqlite::params!["shop.example.com"],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(active_version, 1);
}
