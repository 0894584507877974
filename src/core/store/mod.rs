mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

/// Narrow interface over the external key-value store. Values are opaque
/// strings; each key is independently read-modify-written with no cross-key
/// transaction.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
}

/// Keys used by the synchronization pipeline.
pub mod keys {
    /// SyncToken: the Last-Modified validator of the cached snapshot.
    pub const SUMMARY_LAST_MODIFIED: &str = "summary:last-modified";
    /// The cached summary snapshot (raw validated JSON).
    pub const SUMMARY_DATA: &str = "summary:data";
    /// Epoch milliseconds of the last republished summary post.
    pub const SUMMARY_LAST_REPOSTED: &str = "summary:last-reposted";
    /// Schedule handle of the data-update job.
    pub const SUMMARY_JOB_ID: &str = "summary:job:id";
    /// Last notification record, for duplicate suppression.
    pub const LAST_NOTIFICATION: &str = "noti:last";

    pub fn post_metadata(post_id: &str) -> String {
        format!("postmeta:{post_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_metadata_key_embeds_post_id() {
        assert_eq!(keys::post_metadata("abc123"), "postmeta:abc123");
    }
}
