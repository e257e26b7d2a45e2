//! Bulk loading of image URLs into a category's collection.

use tracing::{info, warn};
use url::Url;

use crate::category::CategoryRegistry;
use crate::error::FetchError;
use crate::redis_store::RedisStore;

/// Outcome of a seed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub parsed: usize,
    pub skipped: usize,
    pub added: usize,
}

/// Valid absolute http(s) URLs in `contents`, one per line.
///
/// Blank lines and lines starting with `#` are ignored. Returns the URLs and
/// the number of lines that were rejected.
pub fn parse_urls(contents: &str) -> (Vec<String>, usize) {
    let mut urls = Vec::new();
    let mut rejected = 0;

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match Url::parse(line) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => urls.push(line.to_string()),
            Ok(url) => {
                warn!(line = index + 1, scheme = url.scheme(), "skipping non-http URL");
                rejected += 1;
            }
            Err(err) => {
                warn!(line = index + 1, error = %err, "skipping malformed URL");
                rejected += 1;
            }
        }
    }

    (urls, rejected)
}

/// Add every valid URL in `contents` to the collection behind `category_key`.
pub async fn seed_category(
    store: &RedisStore,
    registry: &CategoryRegistry,
    category_key: &str,
    contents: &str,
) -> Result<SeedReport, FetchError> {
    let category = registry.resolve(&category_key.trim().to_lowercase())?;
    let (urls, skipped) = parse_urls(contents);

    let added = store.add(category.collection, &urls).await?;
    info!(
        category = category.key,
        collection = category.collection,
        parsed = urls.len(),
        skipped,
        added,
        "seed complete"
    );

    Ok(SeedReport {
        parsed: urls.len(),
        skipped,
        added,
    })
}
