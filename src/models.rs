//! Data model.
//!
//! Identifiers are opaque 128-bit values (`Uuid`); timestamps are UTC
//! instants (`DateTime<Utc>`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Subscriber priority tier. Ordered so `max()` picks the highest tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 1,
    Normal = 2,
    High = 3,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(anyhow::anyhow!("unknown priority '{other}'")),
        }
    }
}

/// One domain-level store. `domain` is globally unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub domain: String,
    pub active: bool,
    pub rate_limit_seconds: f64,
    pub currency_hint: Option<String>,
}

/// Recognized extraction field names.
pub const KNOWN_FIELDS: &[&str] = &[
    "price",
    "title",
    "image",
    "availability",
    "article_number",
    "model_number",
];

pub fn is_critical_field(field: &str) -> bool {
    matches!(field, "price" | "title")
}

/// A single typed selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selector {
    #[serde(rename = "type")]
    pub kind: SelectorType,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    Css,
    Xpath,
    Jsonld,
    Meta,
}

impl SelectorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorType::Css => "css",
            SelectorType::Xpath => "xpath",
            SelectorType::Jsonld => "jsonld",
            SelectorType::Meta => "meta",
        }
    }
}

/// Primary selector plus an ordered fallback chain for one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPattern {
    pub primary: Selector,
    #[serde(default)]
    pub fallbacks: Vec<Selector>,
}

/// `pattern_json` shape. Unknown field names are preserved
/// but ignored by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternJson {
    pub store_domain: String,
    #[serde(default)]
    pub patterns: HashMap<String, FieldPattern>,
}

/// The active extraction recipe for a store (one row per domain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub domain: String,
    pub pattern_json: PatternJson,
    pub last_validated: Option<DateTime<Utc>>,
    pub total_attempts: i64,
    pub successful_attempts: i64,
    pub success_rate: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    ManualEdit,
    AutoGenerated,
    ApiUpdate,
    Rollback,
    AutoSave,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::ManualEdit => "manual_edit",
            ChangeType::AutoGenerated => "auto_generated",
            ChangeType::ApiUpdate => "api_update",
            ChangeType::Rollback => "rollback",
            ChangeType::AutoSave => "auto_save",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "manual_edit" => ChangeType::ManualEdit,
            "auto_generated" => ChangeType::AutoGenerated,
            "api_update" => ChangeType::ApiUpdate,
            "rollback" => ChangeType::Rollback,
            "auto_save" => ChangeType::AutoSave,
            other => anyhow::bail!("unknown change_type '{other}'"),
        })
    }
}

/// Immutable historical snapshot of a pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternVersion {
    pub domain: String,
    pub version_number: i64,
    pub pattern_json: PatternJson,
    pub content_digest: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub change_reason: Option<String>,
    pub change_type: ChangeType,
    pub total_attempts: i64,
    pub successful_attempts: i64,
    pub success_rate: f64,
}

/// A logical product, possibly tracked across several stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub canonical_name: Option<String>,
    pub brand: Option<String>,
    pub ean: Option<String>,
    pub upc: Option<String>,
    pub isbn: Option<String>,
    pub image_url: Option<String>,
    pub subscriber_count: i64,
}

/// A (Product, Store) pair with a concrete URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListing {
    pub id: Uuid,
    pub product_id: Uuid,
    pub domain: String,
    pub url: String,
    pub url_base: String,
    pub current_price: Option<f64>,
    pub currency: Option<String>,
    pub available: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_available: Option<DateTime<Utc>>,
    pub extractor_version: Option<i64>,
    pub active: bool,
}

/// Append-only price observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub price: f64,
    pub currency: Option<String>,
    pub available: bool,
    pub recorded_at: DateTime<Utc>,
    pub extraction_method: Option<String>,
    pub confidence: f64,
}

/// A user's tracking of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub priority: Priority,
    pub target_price: Option<f64>,
    pub notify_on_drop: bool,
    pub notify_on_restock: bool,
    pub notify_on_target: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PriceDrop,
    Restock,
    TargetReached,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::PriceDrop => "price_drop",
            NotificationType::Restock => "restock",
            NotificationType::TargetReached => "target_reached",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub notification_type: NotificationType,
    pub old_price: Option<f64>,
    pub new_price: Option<f64>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Per-field extraction outcome (C4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldResult {
    pub value: Option<String>,
    pub method: Option<SelectorType>,
    pub confidence: f64,
}

/// Extraction result keyed by field name (C4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub fields: HashMap<String, FieldResult>,
}

impl ExtractionResult {
    pub fn get(&self, field: &str) -> Option<&FieldResult> {
        self.fields.get(field)
    }

    pub fn price_numeric(&self) -> Option<f64> {
        self.fields
            .get("price")
            .and_then(|f| f.value.as_deref())
            .and_then(crate::extractor::parse_numeric_price)
    }
}

/// Validation outcome (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub confidence: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Per-listing outcome of one fetch cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingOutcome {
    pub listing_id: Uuid,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Summary of one fetch cycle over N listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub per_listing: Vec<ListingOutcome>,
}
