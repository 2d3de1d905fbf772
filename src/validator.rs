//! Validator (C5).
//!
//! Enforces field invariants against a fresh `ExtractionResult`,
//! optionally compared against the prior extraction, and produces a
//! `ValidationResult` carrying separate error and warning lists.
//! Errors make the attempt a failure; warnings never do.

use crate::config::ValidationConfig;
use crate::extractor::parse_numeric_price;
use crate::models::{ExtractionResult, ValidationResult};

pub fn validate(
    config: &ValidationConfig,
    current: &ExtractionResult,
    prior_price: Option<f64>,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let price_field = current.get("price");
    let price_value = price_field.and_then(|f| f.value.as_deref());
    let numeric_price = price_value.and_then(parse_numeric_price);

    match price_value {
        None => errors.push("Price not found".to_string()),
        Some(raw) => {
            if numeric_price.is_none() {
                errors.push("No numeric value in price".to_string());
            } else if let Some(price) = numeric_price {
                if price <= 0.0 {
                    errors.push("Price is zero or negative".to_string());
                } else if price > config.max_plausible_price {
                    warnings.push(format!(
                        "Price {raw} is unusually high (> {})",
                        config.max_plausible_price
                    ));
                }
            }
        }
    }

    let price_confidence = price_field.map(|f| f.confidence).unwrap_or(0.0);
    if price_value.is_some() && price_confidence < config.min_confidence {
        errors.push(format!(
            "confidence {price_confidence:.2} below threshold {:.2}",
            config.min_confidence
        ));
    }

    if let (Some(prior), Some(current_price)) = (prior_price, numeric_price) {
        if prior > 0.0 {
            let delta_pct = ((current_price - prior).abs() / prior) * 100.0;
            if delta_pct > config.max_price_change_pct {
                warnings.push(format!("price changed by {delta_pct:.1}%"));
            }
        }
    }

    if let Some(title) = current.get("title").and_then(|f| f.value.as_deref()) {
        if title.trim().chars().count() < 3 {
            warnings.push("title too short".to_string());
        }
    }

    // Result confidence is the minimum confidence across non-null critical fields.
    let confidence = ["price", "title"]
        .iter()
        .filter_map(|field| current.get(*field))
        .filter(|f| f.value.is_some())
        .map(|f| f.confidence)
        .fold(f64::INFINITY, f64::min);
    let confidence = if confidence.is_finite() { confidence } else { 0.0 };

    ValidationResult {
        valid: errors.is_empty(),
        confidence,
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionResult, FieldResult, SelectorType};
    use std::collections::HashMap;

    fn result_with(fields: Vec<(&str, Option<&str>, f64)>) -> ExtractionResult {
        let mut map = HashMap::new();
        for (name, value, confidence) in fields {
            map.insert(
                name.to_string(),
                FieldResult {
                    value: value.map(|s| s.to_string()),
                    method: value.map(|_| SelectorType::Css),
                    confidence,
                },
            );
        }
        ExtractionResult { fields: map }
    }

    #[test]
    fn null_price_is_an_error() {
        let config = ValidationConfig::default();
        let extraction = result_with(vec![("price", None, 0.0)]);
        let result = validate(&config, &extraction, None);
        assert!(!result.valid);
        assert!(result.errors.contains(&"Price not found".to_string()));
    }

    #[test]
    fn non_numeric_price_is_an_error() {
        let config = ValidationConfig::default();
        let extraction = result_with(vec![("price", Some("Sold out"), 0.9)]);
        let result = validate(&config, &extraction, None);
        assert!(!result.valid);
    }

    #[test]
    fn low_confidence_is_an_error() {
        let config = ValidationConfig::default();
        let extraction = result_with(vec![("price", Some("29.99"), 0.2)]);
        let result = validate(&config, &extraction, None);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("confidence")));
    }

    #[test]
    fn large_price_swing_is_a_warning_not_an_error() {
        let config = ValidationConfig::default();
        let extraction = result_with(vec![("price", Some("10.00"), 0.9)]);
        let result = validate(&config, &extraction, Some(100.0));
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("price changed")));
    }

    #[test]
    fn short_title_is_a_warning() {
        let config = ValidationConfig::default();
        let extraction = result_with(vec![
            ("price", Some("29.99"), 0.9),
            ("title", Some("Hi"), 0.9),
        ]);
        let result = validate(&config, &extraction, None);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("title too short")));
    }

    #[test]
    fn valid_extraction_has_no_errors() {
        let config = ValidationConfig::default();
        let extraction = result_with(vec![
            ("price", Some("29.99"), 0.9),
            ("title", Some("A Nice Widget"), 0.9),
        ]);
        let result = validate(&config, &extraction, Some(30.0));
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.confidence, 0.9);
    }
}
