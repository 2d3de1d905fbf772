//! Extractor (C4).
//!
//! Applies a full pattern (primary + ordered fallbacks per field) via
//! the selector engine and emits a typed `ExtractionResult`. The
//! extractor never fails the overall call: any subset of fields may
//! come back `None`.

use crate::models::{ExtractionResult, FieldResult, PatternJson};
use crate::selector;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use url::Url;

static NUMERIC_SUBSTRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:[.,]\d+)?").expect("static regex is valid"));

/// Extracts every field named in `pattern` from `html`. `page_url` is
/// used to resolve relative `image` URLs.
pub fn extract(html: &str, pattern: &PatternJson, page_url: &str) -> ExtractionResult {
    let document = Html::parse_document(html);
    let mut result = ExtractionResult::default();

    for (field, field_pattern) in &pattern.patterns {
        let mut resolved = match selector::evaluate(&document, html, &field_pattern.primary) {
            Some(value) if !value.is_empty() => FieldResult {
                value: Some(value),
                method: Some(field_pattern.primary.kind),
                confidence: field_pattern.primary.confidence,
            },
            _ => {
                let mut found = None;
                for fallback in &field_pattern.fallbacks {
                    if let Some(value) = selector::evaluate(&document, html, fallback) {
                        if !value.is_empty() {
                            found = Some(FieldResult {
                                value: Some(value),
                                method: Some(fallback.kind),
                                confidence: fallback.confidence,
                            });
                            break;
                        }
                    }
                }
                found.unwrap_or_default()
            }
        };

        post_process(field, &mut resolved, page_url);
        result.fields.insert(field.clone(), resolved);
    }

    result
}

fn post_process(field: &str, result: &mut FieldResult, page_url: &str) {
    match field {
        "price" => {
            let Some(raw) = result.value.as_deref() else {
                return;
            };
            match parse_numeric_price(raw) {
                Some(price) if price > 0.0 => {
                    result.value = Some(format_price(price));
                }
                _ => {
                    // Non-positive or unparsable price is an extraction failure.
                    result.value = None;
                    result.method = None;
                    result.confidence = 0.0;
                }
            }
        }
        "image" => {
            if let Some(raw) = result.value.clone() {
                result.value = Some(resolve_image_url(&raw, page_url));
            }
        }
        _ => {}
    }
}

/// Normalizes to the first numeric substring, treating both `.` and
/// `,` as decimal separators (locale-agnostic, not thousands-aware —
/// a known limitation, see DESIGN.md).
pub fn parse_numeric_price(raw: &str) -> Option<f64> {
    let m = NUMERIC_SUBSTRING.find(raw)?;
    let normalized = m.as_str().replace(',', ".");
    normalized.parse::<f64>().ok()
}

fn format_price(price: f64) -> String {
    let rounded = (price * 100.0).round() / 100.0;
    format!("{rounded:.2}")
}

fn resolve_image_url(raw: &str, page_url: &str) -> String {
    if Url::parse(raw).is_ok() {
        return raw.to_string();
    }
    match Url::parse(page_url).and_then(|base| base.join(raw)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldPattern, Selector, SelectorType};
    use std::collections::HashMap;

    fn css(selector: &str, confidence: f64) -> Selector {
        Selector {
            kind: SelectorType::Css,
            selector: selector.to_string(),
            attribute: None,
            confidence,
        }
    }

    fn pattern(fields: Vec<(&str, FieldPattern)>) -> PatternJson {
        let mut patterns = HashMap::new();
        for (name, fp) in fields {
            patterns.insert(name.to_string(), fp);
        }
        PatternJson {
            store_domain: "shop.example.com".to_string(),
            patterns,
        }
    }

    #[test]
    fn primary_hit_records_primary_method_and_confidence() {
        let html = r#"<span class="price">$29.99</span>"#;
        let p = pattern(vec![(
            "price",
            FieldPattern {
                primary: css(".price", 0.9),
                fallbacks: vec![css("[data-price]", 0.7)],
            },
        )]);
        let result = extract(html, &p, "https://shop.example.com/p/1");
        let price = result.get("price").unwrap();
        assert_eq!(price.value.as_deref(), Some("29.99"));
        assert_eq!(price.confidence, 0.9);
    }

    #[test]
    fn fallback_hit_records_fallback_confidence_not_primary() {
        let html = r#"<span data-price="49,00"></span>"#;
        let p = pattern(vec![(
            "price",
            FieldPattern {
                primary: css(".price", 0.9),
                fallbacks: vec![Selector {
                    kind: SelectorType::Css,
                    selector: "[data-price]".to_string(),
                    attribute: Some("data-price".to_string()),
                    confidence: 0.7,
                }],
            },
        )]);
        let result = extract(html, &p, "https://shop.example.com/p/1");
        let price = result.get("price").unwrap();
        assert_eq!(price.value.as_deref(), Some("49.00"));
        assert_eq!(price.confidence, 0.7);
    }

    #[test]
    fn missing_field_is_null_with_zero_confidence() {
        let html = "<div></div>";
        let p = pattern(vec![(
            "price",
            FieldPattern {
                primary: css(".price", 0.9),
                fallbacks: vec![],
            },
        )]);
        let result = extract(html, &p, "https://shop.example.com/p/1");
        let price = result.get("price").unwrap();
        assert!(price.value.is_none());
        assert!(price.method.is_none());
        assert_eq!(price.confidence, 0.0);
    }

    #[test]
    fn zero_price_is_extraction_failure() {
        let html = r#"<span class="price">0.00</span>"#;
        let p = pattern(vec![(
            "price",
            FieldPattern {
                primary: css(".price", 0.9),
                fallbacks: vec![],
            },
        )]);
        let result = extract(html, &p, "https://shop.example.com/p/1");
        assert!(result.get("price").unwrap().value.is_none());
    }

    #[test]
    fn relative_image_is_resolved_against_page_url() {
        let html = r#"<img class="pic" src="/images/a.png">"#;
        let p = pattern(vec![(
            "image",
            FieldPattern {
                primary: Selector {
                    kind: SelectorType::Css,
                    selector: ".pic".to_string(),
                    attribute: Some("src".to_string()),
                    confidence: 0.8,
                },
                fallbacks: vec![],
            },
        )]);
        let result = extract(html, &p, "https://shop.example.com/p/1");
        assert_eq!(
            result.get("image").unwrap().value.as_deref(),
            Some("https://shop.example.com/images/a.png")
        );
    }

    #[test]
    fn never_panics_on_arbitrary_html() {
        let inputs = [
            "",
            "<<<not html",
            "<div><span></div>",
            "\u{0}\u{1}binary-ish",
        ];
        let p = pattern(vec![(
            "price",
            FieldPattern {
                primary: css(".price", 0.9),
                fallbacks: vec![css("[data-price]", 0.5)],
            },
        )]);
        for input in inputs {
            let _ = extract(input, &p, "https://shop.example.com/p/1");
        }
    }

    #[test]
    fn parses_comma_decimal() {
        assert_eq!(parse_numeric_price("49,00 kr"), Some(49.0));
    }

    #[test]
    fn parses_dot_decimal() {
        assert_eq!(parse_numeric_price("$29.99"), Some(29.99));
    }

    #[test]
    fn returns_none_with_no_digits() {
        assert_eq!(parse_numeric_price("Sold out"), None);
    }
}
