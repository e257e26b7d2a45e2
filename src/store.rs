use async_trait::async_trait;

use crate::error::StoreError;

/// The backing document store the cache is filled from.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Short name used in logs and health reports.
    fn name(&self) -> &str;

    /// Make sure a live connection exists. Reuses the current one if any, so
    /// concurrent callers share a single connection.
    async fn connect(&self) -> Result<(), StoreError>;

    /// A random sample of at most `count` URLs from `collection`.
    async fn sample(&self, collection: &str, count: usize) -> Result<Vec<String>, StoreError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}
