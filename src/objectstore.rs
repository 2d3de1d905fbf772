//! Object store collaborator, explicitly out of core scope as a real
//! bucket client. `ObjectStore` is the narrow trait the orchestrator
//! depends on; `FilesystemObjectStore` is the in-process default that
//! makes the CLI and tests runnable without a real object-storage
//! client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// `(normalised-domain, 16-char SHA-256(url)) -> latest.html / latest.png`.
pub fn artifact_key(domain: &str, url: &str) -> (String, String) {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    (domain.to_string(), digest[..16].to_string())
}

/// `SHA256(image_url)[0:16] + ext`, not domain-prefixed (unlike
/// `artifact_key`): cached product images are addressed by the image
/// URL alone, since the same CDN-hosted image can be linked from more
/// than one listing. `ext` is taken from the image URL's path suffix,
/// defaulting to `jpg` when absent or unrecognised.
pub fn image_key(image_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}.{}", &digest[..16], image_extension(image_url))
}

fn image_extension(image_url: &str) -> &'static str {
    let path = image_url
        .split(['?', '#'])
        .next()
        .unwrap_or(image_url)
        .to_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "jpg"
    } else if path.ends_with(".png") {
        "png"
    } else if path.ends_with(".webp") {
        "webp"
    } else if path.ends_with(".gif") {
        "gif"
    } else {
        "jpg"
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_html(&self, domain: &str, url: &str, html: &str) -> Result<()>;
    async fn put_screenshot(&self, domain: &str, url: &str, png: &[u8]) -> Result<()>;
    /// Caches product image bytes keyed by [`image_key`], returning the
    /// stored key. Callers are expected to have already fetched
    /// `bytes` via a plain HTTP GET against `image_url` (image bytes
    /// need no headless browser); this crate's fetch cycle does not do
    /// that fetch itself — see DESIGN.md.
    async fn put_image(&self, image_url: &str, bytes: &[u8]) -> Result<String>;
}

pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn artifact_dir(&self, domain: &str, url: &str) -> PathBuf {
        let (domain, hash) = artifact_key(domain, url);
        self.root.join(domain).join(hash)
    }

    fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put_html(&self, domain: &str, url: &str, html: &str) -> Result<()> {
        let dir = self.artifact_dir(domain, url);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating artifact dir {}", dir.display()))?;
        tokio::fs::write(dir.join("latest.html"), html)
            .await
            .context("writing latest.html")
    }

    async fn put_screenshot(&self, domain: &str, url: &str, png: &[u8]) -> Result<()> {
        let dir = self.artifact_dir(domain, url);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating artifact dir {}", dir.display()))?;
        tokio::fs::write(dir.join("latest.png"), png)
            .await
            .context("writing latest.png")
    }

    async fn put_image(&self, image_url: &str, bytes: &[u8]) -> Result<String> {
        let key = image_key(image_url);
        let dir = self.images_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating images dir {}", dir.display()))?;
        tokio::fs::write(dir.join(&key), bytes)
            .await
            .with_context(|| format!("writing cached image {key}"))?;
        Ok(key)
    }
}
