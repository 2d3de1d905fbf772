//! Stealth Fetcher (C6).
//!
//! `Fetcher` is the narrow trait the orchestrator depends on; `stealth`
//! holds the `chromiumoxide`-backed implementation. Splitting the
//! trait out lets orchestrator tests substitute a canned fetcher
//! without a real browser, the same way `scrapers::mod::MarketDataSource`
//! decouples consumers from one concrete feed.

pub mod stealth;

use crate::error::FetchError;
use async_trait::async_trait;

/// One fetch attempt's raw output, before extraction.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub html: String,
    pub screenshot: Option<Vec<u8>>,
    pub page_title: Option<String>,
    pub fetch_duration_s: f64,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub simulate_human: bool,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome, FetchError>;
}

/// Cookie-dialog selectors, tried in order, ≤ 1s each, first visible
/// clickable wins. Union of the source's two near-duplicate lists
/// (generic multi-language accept buttons, Cookiebot, OneTrust) — see
/// DESIGN.md "cookie-dialog selector unification".
pub const COOKIE_DIALOG_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    "#CybotCookiebotDialogBodyButtonAccept",
    "button#accept-cookies",
    "button[data-testid='cookie-accept']",
    "button[aria-label='Accept cookies']",
    "button[aria-label='Accept all']",
    "button[aria-label='Alle akzeptieren']",
    "button[aria-label='Tout accepter']",
    "button[aria-label='Aceptar todo']",
    ".cookie-consent button.accept",
    ".cc-allow",
    "//button[contains(translate(text(), 'ACEPT', 'acept'), 'accept all')]",
    "//button[contains(translate(text(), 'ACEPT', 'acept'), 'accept cookies')]",
    "//button[contains(text(), 'Alle akzeptieren')]",
    "//button[contains(text(), 'Tout accepter')]",
];

/// Page-content substrings that indicate a bot wall rather than the
/// requested page (see `FetchError::Blocked`).
pub const BOT_WALL_SENTINELS: &[&str] = &[
    "captcha",
    "are you a human",
    "unusual traffic",
    "access denied",
    "cloudflare ray id",
    "checking your browser before accessing",
];

pub fn looks_blocked(html: &str) -> bool {
    let lower = html.to_lowercase();
    BOT_WALL_SENTINELS.iter().any(|needle| lower.contains(needle))
}
