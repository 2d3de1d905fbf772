//! `chromiumoxide`-backed implementation of [`Fetcher`].
//!
//! `chromiumoxide` is picked because it is the async, tokio-native CDP
//! driver, consistent with the tokio-first crates used throughout
//! `scrapers/`; documented in DESIGN.md as an enrichment pick.

use super::{looks_blocked, FetchOptions, FetchOutcome, Fetcher, COOKIE_DIALOG_SELECTORS};
use crate::error::FetchError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTimezoneOverrideParams,
};
use futures_util::StreamExt;
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Injected via `Page::evaluate_on_new_document` before any page
/// script runs. Overrides the navigator properties commonly used as
/// automation tells.
const STEALTH_INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'platform', { get: () => 'Win32' });
Object.defineProperty(navigator, 'vendor', { get: () => 'Google Inc.' });
Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => 8 });
Object.defineProperty(navigator, 'deviceMemory', { get: () => 8 });
Object.defineProperty(navigator, 'maxTouchPoints', { get: () => 0 });
if (navigator.connection) {
  Object.defineProperty(navigator.connection, 'rtt', { get: () => 50 });
}
navigator.getBattery = () => Promise.resolve({
  charging: true, level: 1.0, chargingTime: 0, dischargingTime: Infinity,
});
navigator.permissions.query = (params) => (
  params && params.name === 'notifications'
    ? Promise.resolve({ state: Notification.permission })
    : Promise.resolve({ state: 'granted' })
);
Object.defineProperty(navigator, 'mediaDevices', { get: () => ({ enumerateDevices: () => Promise.resolve([]) }) });
Object.defineProperty(screen, 'width', { get: () => 1920 });
Object.defineProperty(screen, 'height', { get: () => 1080 });
const getParameterProxied = WebGLRenderingContext.prototype.getParameter;
WebGLRenderingContext.prototype.getParameter = function (parameter) {
  if (parameter === 37445) return 'Intel Inc.';
  if (parameter === 37446) return 'Intel Iris OpenGL Engine';
  return getParameterProxied.call(this, parameter);
};
"#;

pub struct StealthFetcher {
    browser_timeout: Duration,
    difficult_domains: Vec<String>,
}

impl StealthFetcher {
    pub fn new(browser_timeout: Duration, difficult_domains: Vec<String>) -> Self {
        Self {
            browser_timeout,
            difficult_domains,
        }
    }

    fn is_difficult(&self, url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        self.difficult_domains.iter().any(|d| host == d || host.ends_with(&format!(".{d}")))
    }

    async fn launch(&self) -> Result<(Browser, chromiumoxide::Handler), FetchError> {
        let config = BrowserConfig::builder()
            .args([
                "--disable-blink-features=AutomationControlled",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-infobars",
            ])
            .user_data_dir(std::env::temp_dir().join("pricewatch-chromium"))
            .window_size(1920, 1080)
            .build()
            .map_err(|e| FetchError::IoError {
                url: String::new(),
                source: anyhow::anyhow!(e),
            })?;

        Browser::launch(config).await.map_err(|e| FetchError::IoError {
            url: String::new(),
            source: anyhow::anyhow!(e),
        })
    }
}

#[async_trait]
impl Fetcher for StealthFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome, FetchError> {
        let start = Instant::now();
        let (browser, mut handler) = self.launch().await?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let result = self.fetch_inner(&browser, url, options).await;

        let _ = browser.close().await;
        handler_task.abort();
        result.map(|mut outcome| {
            outcome.fetch_duration_s = start.elapsed().as_secs_f64();
            outcome
        })
    }
}

impl StealthFetcher {
    async fn fetch_inner(
        &self,
        browser: &Browser,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, FetchError> {
        let page = browser.new_page("about:blank").await.map_err(|e| FetchError::IoError {
            url: url.to_string(),
            source: anyhow::anyhow!(e),
        })?;

        page.evaluate_on_new_document(STEALTH_INIT_SCRIPT)
            .await
            .map_err(|e| FetchError::IoError {
                url: url.to_string(),
                source: anyhow::anyhow!(e),
            })?;
        let _ = page
            .execute(SetDeviceMetricsOverrideParams::builder()
                .width(1920)
                .height(1080)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .unwrap())
            .await;
        let _ = page
            .execute(SetTimezoneOverrideParams::new("UTC"))
            .await;

        let navigation = timeout(self.browser_timeout, page.goto(url));
        match navigation.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(FetchError::IoError {
                    url: url.to_string(),
                    source: anyhow::anyhow!(e),
                })
            }
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    elapsed_ms: self.browser_timeout.as_millis() as u64,
                })
            }
        }

        // load event + unconditional grace.
        tokio::time::sleep(Duration::from_secs(2)).await;

        let networkidle = timeout(self.browser_timeout, page.wait_for_navigation());
        let _ = networkidle.await;

        let tail: u64 = rand::thread_rng().gen_range(1_000..=2_000);
        tokio::time::sleep(Duration::from_millis(tail)).await;

        try_accept_cookie_dialog(&page).await;

        if options.simulate_human || self.is_difficult(url) {
            simulate_human(&page).await;
        }

        let html = page.content().await.map_err(|e| FetchError::IoError {
            url: url.to_string(),
            source: anyhow::anyhow!(e),
        })?;

        if looks_blocked(&html) {
            return Err(FetchError::Blocked { url: url.to_string() });
        }

        let page_title = page.get_title().await.ok().flatten();
        let screenshot = page
            .screenshot(chromiumoxide::page::ScreenshotParams::builder().full_page(true).build())
            .await
            .ok();

        Ok(FetchOutcome {
            html,
            screenshot,
            page_title,
            fetch_duration_s: 0.0,
        })
    }
}

/// Tries each cookie-dialog selector in order with a 1s timeout;
/// first visible clickable wins; failure is silent.
async fn try_accept_cookie_dialog(page: &chromiumoxide::Page) {
    for selector in COOKIE_DIALOG_SELECTORS {
        let find = timeout(Duration::from_secs(1), page.find_element(*selector));
        if let Ok(Ok(element)) = find.await {
            let _ = element.click().await;
            return;
        }
    }
}

/// 3-7 randomised mouse moves and 2-4 scroll increments for
/// "difficult" domains before reading `content()`.
async fn simulate_human(page: &chromiumoxide::Page) {
    let mut rng = rand::thread_rng();
    let moves = rng.gen_range(3..=7);
    for _ in 0..moves {
        let x = rng.gen_range(0.0..1920.0);
        let y = rng.gen_range(0.0..1080.0);
        let _ = page
            .evaluate(format!(
                "window.dispatchEvent(new MouseEvent('mousemove', {{clientX: {x}, clientY: {y}}}))"
            ))
            .await;
        tokio::time::sleep(Duration::from_millis(rng.gen_range(50..200))).await;
    }

    let scrolls = rng.gen_range(2..=4);
    for _ in 0..scrolls {
        let delta = rng.gen_range(200.0..800.0);
        let _ = page
            .evaluate(format!("window.scrollBy(0, {delta})"))
            .await;
        tokio::time::sleep(Duration::from_millis(rng.gen_range(150..400))).await;
    }
}
