//! Widget asset loader
//!
//! Resolves a widget name to its pre-rendered HTML bundle on disk. Builds
//! emit either `<name>.html` or content-hashed `<name>-<hash>.html` files.
//! Loading never fails toward the caller: a missing bundle yields a
//! diagnostic placeholder document instead.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WidgetAssetError {
    #[error("no bundle named '{name}' in {}", .dir.display())]
    Missing { name: String, dir: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct WidgetAssets {
    /// Directory containing the built HTML bundles.
    assets_dir: PathBuf,
}

impl WidgetAssets {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
        }
    }

    /// Uses `configured` when given, otherwise searches from the working
    /// directory.
    pub fn locate(configured: Option<PathBuf>) -> Self {
        let assets_dir = configured.unwrap_or_else(|| {
            let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            Self::locate_assets_directory(&current_dir)
        });
        Self::new(assets_dir)
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    /// Attempts to locate the assets directory using a multi-step strategy
    fn locate_assets_directory(current_dir: &Path) -> PathBuf {
        // Strategy to locate assets:
        // 1. ./assets
        // 2. ../assets (if running from a subdir)
        // 3. Fallback to "assets" relative path

        if current_dir.join("assets").exists() {
            return current_dir.join("assets");
        }

        if let Some(parent) = current_dir.parent() {
            if parent.join("assets").exists() {
                return parent.join("assets");
            }
        }

        PathBuf::from("assets") // Fallback
    }

    /// Returns the widget's markup, or a placeholder describing why it could
    /// not be loaded.
    pub async fn load(&self, name: &str) -> String {
        match self.read(name).await {
            Ok(html) => html,
            Err(err) => {
                warn!(widget = name, error = %err, "widget bundle unavailable; serving placeholder");
                placeholder_html(name, &err)
            }
        }
    }

    /// Reads `<name>.html`, falling back to the latest hashed build.
    pub async fn read(&self, name: &str) -> Result<String, WidgetAssetError> {
        let primary = self.assets_dir.join(format!("{name}.html"));
        let path = if primary.is_file() {
            primary
        } else {
            self.find_hashed_bundle(name).await?
        };

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| WidgetAssetError::Io { path, source })
    }

    /// Finds a hashed build (e.g. `shopping-cart-1a2b.html`) when the plain
    /// file is not available.
    async fn find_hashed_bundle(&self, name: &str) -> Result<PathBuf, WidgetAssetError> {
        let missing = || WidgetAssetError::Missing {
            name: name.to_string(),
            dir: self.assets_dir.clone(),
        };
        let mut entries = tokio::fs::read_dir(&self.assets_dir)
            .await
            .map_err(|_| missing())?;

        let prefix = format!("{name}-");
        let mut candidates = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
                if file_name.starts_with(&prefix) && file_name.ends_with(".html") {
                    candidates.push(path);
                }
            }
        }

        // The lexicographically last candidate is taken as the latest build.
        candidates.sort();
        candidates.pop().ok_or_else(missing)
    }
}

fn placeholder_html(name: &str, err: &WidgetAssetError) -> String {
    format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{name}</title></head>\n\
         <body>\n<div role=\"alert\" data-widget-error=\"{name}\">\n\
         <p>Widget <code>{name}</code> is not available.</p>\n<pre>{detail}</pre>\n\
         </div>\n</body>\n</html>\n",
        name = escape_html(name),
        detail = escape_html(&err.to_string()),
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
