//! JSON-LD selector evaluation (part of C3).
//!
//! Collects every `<script type="application/ld+json">` block,
//! parses each as JSON, flattens `@graph` arrays and top-level
//! arrays, then walks a dot-separated path against each flattened
//! node in document order, returning the first scalar match.

use scraper::{Html, Selector as CssSelector};
use serde_json::Value;

/// Evaluates a dot-separated path (e.g. `offers.price`) against all
/// JSON-LD blocks in `html`. Returns the raw scalar as a string, or
/// `None` if nothing resolves. Never panics on malformed JSON or
/// missing paths.
pub fn evaluate(html: &Html, path: &str) -> Option<String> {
    let selector = CssSelector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }

    for script in html.select(&selector) {
        let text: String = script.text().collect();
        let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        for node in flatten(parsed) {
            if let Some(value) = resolve_path(&node, &segments) {
                if let Some(s) = scalar_to_string(&value) {
                    return Some(s);
                }
            }
        }
    }
    None
}

/// Flattens `@graph` arrays and top-level arrays into a flat list of
/// candidate nodes, preserving document order.
fn flatten(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.into_iter().flat_map(flatten).collect(),
        Value::Object(ref map) => {
            if let Some(graph) = map.get("@graph") {
                let mut out = vec![value.clone()];
                out.extend(flatten(graph.clone()));
                out
            } else {
                vec![value]
            }
        }
        other => vec![other],
    }
}

/// Walks `segments` against `node`. If an intermediate value is an
/// array, each element is tried with the remaining path (schema.org
/// `offers` is frequently an array of Offer objects).
fn resolve_path(node: &Value, segments: &[&str]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(node.clone());
    };

    match node {
        Value::Object(map) => {
            let next = map.get(*head)?;
            resolve_path(next, rest)
        }
        Value::Array(items) => items.iter().find_map(|item| resolve_path(item, segments)),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
