//! Selector Engine (C3).
//!
//! Evaluates a single typed `Selector` against parsed HTML and
//! returns a raw string or `None`. Every selector kind is caught at
//! its own boundary: a parse error or missing match in one selector
//! must never poison a fallback chain, so this module never panics
//! and never propagates an `Err` across a selector evaluation.

mod jsonld;

use crate::models::{Selector, SelectorType};
use scraper::{Html, Selector as CssSelector};

/// Evaluates `selector` against `html`. Returns `None` on any parse
/// or lookup failure — callers (the extractor's fallback chain) treat
/// `None` as "try the next selector", never as an error.
pub fn evaluate(html: &Html, raw_html: &str, selector: &Selector) -> Option<String> {
    match selector.kind {
        SelectorType::Css => evaluate_css(html, selector),
        SelectorType::Xpath => evaluate_xpath(raw_html, selector),
        SelectorType::Jsonld => jsonld::evaluate(html, &selector.selector),
        SelectorType::Meta => evaluate_meta(html, selector),
    }
}

fn evaluate_css(html: &Html, selector: &Selector) -> Option<String> {
    let css = CssSelector::parse(&selector.selector).ok()?;
    let element = html.select(&css).next()?;
    match selector.attribute.as_deref() {
        Some(attr) => element.value().attr(attr).map(normalize_text),
        None => Some(normalize_text(&element.text().collect::<String>())),
    }
}

fn evaluate_meta(html: &Html, selector: &Selector) -> Option<String> {
    let meta = CssSelector::parse("meta").ok()?;
    html.select(&meta)
        .find(|el| {
            let value = el.value();
            value.attr("property") == Some(selector.selector.as_str())
                || value.attr("name") == Some(selector.selector.as_str())
        })
        .and_then(|el| el.value().attr("content"))
        .map(normalize_text)
}

fn evaluate_xpath(raw_html: &str, selector: &Selector) -> Option<String> {
    use libxml::parser::Parser;
    use libxml::xpath::Context;

    let parser = Parser::default_html();
    let document = parser.parse_string(raw_html).ok()?;
    let context = Context::new(&document).ok()?;
    let result = context.evaluate(&selector.selector).ok()?;
    let node = result.get_nodes_as_vec().into_iter().next()?;

    let raw = match selector.attribute.as_deref() {
        Some(attr) => node.get_attribute(attr)?,
        None => node.get_content(),
    };
    Some(normalize_text(&raw))
}

/// Collapses whitespace runs and trims, the normalized-text
/// requirement for CSS/XPath text extraction.
fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SelectorType;

    fn sel(kind: SelectorType, selector: &str, attribute: Option<&str>) -> Selector {
        Selector {
            kind,
            selector: selector.to_string(),
            attribute: attribute.map(|s| s.to_string()),
            confidence: 0.9,
        }
    }

    #[test]
    fn css_returns_normalized_text() {
        let raw = r#"<span class="price">  $29.99  </span>"#;
        let html = Html::parse_document(raw);
        let s = sel(SelectorType::Css, ".price", None);
        assert_eq!(evaluate(&html, raw, &s), Some("$29.99".to_string()));
    }

    #[test]
    fn css_returns_attribute_value() {
        let raw = r#"<img class="prod" src="/a.png">"#;
        let html = Html::parse_document(raw);
        let s = sel(SelectorType::Css, ".prod", Some("src"));
        assert_eq!(evaluate(&html, raw, &s), Some("/a.png".to_string()));
    }

    #[test]
    fn css_missing_selector_returns_none() {
        let raw = r#"<span class="price">$1</span>"#;
        let html = Html::parse_document(raw);
        let s = sel(SelectorType::Css, "[data-price]", None);
        assert_eq!(evaluate(&html, raw, &s), None);
    }

    #[test]
    fn css_invalid_selector_returns_none_not_panic() {
        let raw = "<div></div>";
        let html = Html::parse_document(raw);
        let s = sel(SelectorType::Css, ":::not-a-selector", None);
        assert_eq!(evaluate(&html, raw, &s), None);
    }

    #[test]
    fn meta_matches_property_or_name() {
        let raw = r#"<meta property="og:price:amount" content="49.00">"#;
        let html = Html::parse_document(raw);
        let s = sel(SelectorType::Meta, "og:price:amount", None);
        assert_eq!(evaluate(&html, raw, &s), Some("49.00".to_string()));
    }

    #[test]
    fn jsonld_resolves_dot_path() {
        let raw = r#"<script type="application/ld+json">{"offers":{"price":"12.50"}}</script>"#;
        let html = Html::parse_document(raw);
        let s = sel(SelectorType::Jsonld, "offers.price", None);
        assert_eq!(evaluate(&html, raw, &s), Some("12.50".to_string()));
    }
}
