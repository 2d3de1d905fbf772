//! Application configuration.
//!
//! Immutable after process start: every component takes a `&Config`
//! (or a cloned `Arc<Config>`) at construction rather than reaching
//! for a global.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub request_delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub browser_timeout: Duration,
    pub wait_for_js: bool,
    pub domain_delays: HashMap<String, Duration>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs_f64(2.0),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            browser_timeout: Duration::from_secs(60),
            wait_for_js: true,
            domain_delays: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub min_confidence: f64,
    pub max_price_change_pct: f64,
    pub max_plausible_price: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            max_price_change_pct: 50.0,
            max_plausible_price: 100_000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriorityIntervals {
    pub high: Duration,
    pub normal: Duration,
    pub low: Duration,
}

impl Default for PriorityIntervals {
    fn default() -> Self {
        Self {
            high: Duration::from_secs(15 * 60),
            normal: Duration::from_secs(60 * 60),
            low: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl PriorityIntervals {
    pub fn for_priority(&self, priority: crate::models::Priority) -> Duration {
        match priority {
            crate::models::Priority::High => self.high,
            crate::models::Priority::Normal => self.normal,
            crate::models::Priority::Low => self.low,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick: Duration,
    pub workers: usize,
    pub max_batch: usize,
    pub intervals: PriorityIntervals,
    pub tick_deadline: Duration,
    pub shutdown_deadline: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5 * 60),
            workers: 4,
            max_batch: 200,
            intervals: PriorityIntervals::default(),
            tick_deadline: Duration::from_secs(60),
            shutdown_deadline: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub pricehistory_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            pricehistory_days: 30,
        }
    }
}

/// Top-level immutable configuration, loaded once at process start.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub fetcher: FetcherConfig,
    pub validation: ValidationConfig,
    pub scheduler: SchedulerConfig,
    pub retention: RetentionConfig,
    /// Domains that receive extra human-simulation before reading content().
    pub difficult_domains: Vec<String>,
    pub artifacts_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./pricewatch.db".to_string(),
            fetcher: FetcherConfig::default(),
            validation: ValidationConfig::default(),
            scheduler: SchedulerConfig::default(),
            retention: RetentionConfig::default(),
            difficult_domains: Vec::new(),
            artifacts_dir: "./artifacts".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DATABASE_PATH") {
            config.database_path = v;
        }
        if let Ok(v) = std::env::var("ARTIFACTS_DIR") {
            config.artifacts_dir = v;
        }

        if let Ok(v) = env_f64("FETCHER_REQUEST_DELAY_SECONDS") {
            config.fetcher.request_delay = Duration::from_secs_f64(v);
        }
        if let Ok(v) = env_f64("FETCHER_TIMEOUT_SECONDS") {
            config.fetcher.timeout = Duration::from_secs_f64(v);
        }
        if let Ok(v) = env_u32("FETCHER_MAX_RETRIES") {
            config.fetcher.max_retries = v;
        }
        if let Ok(v) = env_f64("FETCHER_BROWSER_TIMEOUT_SECONDS") {
            config.fetcher.browser_timeout = Duration::from_secs_f64(v);
        }
        if let Ok(v) = std::env::var("FETCHER_WAIT_FOR_JS") {
            config.fetcher.wait_for_js = matches!(v.as_str(), "1" | "true" | "TRUE" | "on");
        }
        if let Ok(v) = std::env::var("FETCHER_DOMAIN_DELAYS") {
            config.fetcher.domain_delays = parse_domain_delays(&v);
        }
        if let Ok(v) = std::env::var("FETCHER_DIFFICULT_DOMAINS") {
            config.difficult_domains = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(v) = env_f64("VALIDATION_MIN_CONFIDENCE") {
            config.validation.min_confidence = v;
        }
        if let Ok(v) = env_f64("VALIDATION_MAX_PRICE_CHANGE_PCT") {
            config.validation.max_price_change_pct = v;
        }
        if let Ok(v) = env_f64("VALIDATION_MAX_PLAUSIBLE_PRICE") {
            config.validation.max_plausible_price = v;
        }

        if let Ok(v) = env_f64("SCHEDULER_TICK_SECONDS") {
            config.scheduler.tick = Duration::from_secs_f64(v);
        }
        if let Ok(v) = env_usize("SCHEDULER_WORKERS") {
            config.scheduler.workers = v;
        }
        if let Ok(v) = env_usize("SCHEDULER_MAX_BATCH") {
            config.scheduler.max_batch = v;
        }
        if let Ok(v) = env_f64("PRIORITY_INTERVAL_HIGH_SECONDS") {
            config.scheduler.intervals.high = Duration::from_secs_f64(v);
        }
        if let Ok(v) = env_f64("PRIORITY_INTERVAL_NORMAL_SECONDS") {
            config.scheduler.intervals.normal = Duration::from_secs_f64(v);
        }
        if let Ok(v) = env_f64("PRIORITY_INTERVAL_LOW_SECONDS") {
            config.scheduler.intervals.low = Duration::from_secs_f64(v);
        }

        if let Ok(v) = env_i64("RETENTION_PRICEHISTORY_DAYS") {
            config.retention.pricehistory_days = v;
        }

        Ok(config)
    }
}

fn env_f64(key: &str) -> anyhow::Result<f64> {
    Ok(std::env::var(key)?.parse()?)
}

fn env_u32(key: &str) -> anyhow::Result<u32> {
    Ok(std::env::var(key)?.parse()?)
}

fn env_usize(key: &str) -> anyhow::Result<usize> {
    Ok(std::env::var(key)?.parse()?)
}

fn env_i64(key: &str) -> anyhow::Result<i64> {
    Ok(std::env::var(key)?.parse()?)
}

/// Parses `domain:seconds,domain:seconds` pairs.
fn parse_domain_delays(raw: &str) -> HashMap<String, Duration> {
    raw.split(',')
        .filter_map(|pair| {
            let (domain, secs) = pair.split_once(':')?;
            let secs: f64 = secs.trim().parse().ok()?;
            Some((domain.trim().to_string(), Duration::from_secs_f64(secs)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_delays_parse_pairs() {
        let parsed = parse_domain_delays("shop.example.com:5,slow.example.com:10.5");
        assert_eq!(
            parsed.get("shop.example.com").copied(),
            Some(Duration::from_secs_f64(5.0))
        );
        assert_eq!(
            parsed.get("slow.example.com").copied(),
            Some(Duration::from_secs_f64(10.5))
        );
    }

    #[test]
    fn priority_intervals_match_defaults() {
        let intervals = PriorityIntervals::default();
        assert_eq!(
            intervals.for_priority(crate::models::Priority::High),
            Duration::from_secs(15 * 60)
        );
        assert_eq!(
            intervals.for_priority(crate::models::Priority::Low),
            Duration::from_secs(24 * 60 * 60)
        );
    }
}
