//! URL Normalizer (C1).
//!
//! Produces a canonical base URL used for listing identity/dedup:
//! lowercase host, leading `www.` stripped, query string and fragment
//! dropped, trailing slash stripped on non-root paths, path case
//! preserved.

use url::Url;

/// Canonicalizes `raw` into a `url_base`. Returns an error if `raw` is
/// not a parseable absolute URL.
pub fn normalize(raw: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(raw)?;
    url.set_query(None);
    url.set_fragment(None);

    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL has no host: {raw}"))?;
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))?;

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    let scheme = url.scheme();
    let port_suffix = match url.port() {
        Some(p) if !is_default_port(scheme, p) => format!(":{p}"),
        _ => String::new(),
    };

    let mut path = url.path().to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    Ok(format!("{scheme}://{host}{port_suffix}{path}"))
}

/// Returns the normalized host only (no `www.`, lowercase).
pub fn domain(raw: &str) -> anyhow::Result<String> {
    let url = Url::parse(raw)?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL has no host: {raw}"))?
        .to_lowercase();
    Ok(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn is_default_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("http", 80) | ("https", 443))
}
