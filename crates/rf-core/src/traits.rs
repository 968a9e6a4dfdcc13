//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{Fields, Post, TopicFields};

/// Key/value object store with sorted sets, sets, and atomic counters.
///
/// Sorted-set scores are integers (in practice, epoch milliseconds).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    // Object Operations
    /// Merges `fields` into the object at `key`, creating it if needed.
    async fn set_object(&self, key: &str, fields: &Fields) -> anyhow::Result<()>;
    async fn set_object_field(&self, key: &str, field: &str, value: Value) -> anyhow::Result<()>;
    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Fields>>;
    /// Returns only the requested fields that exist.
    async fn get_object_fields(&self, key: &str, fields: &[&str]) -> anyhow::Result<Fields>;

    /// Atomically adds `by` to an integer field (missing counts as 0) and
    /// returns the new value. Must be race-free across concurrent callers.
    async fn increment_object_field_by(&self, key: &str, field: &str, by: i64) -> anyhow::Result<i64>;

    async fn increment_object_field(&self, key: &str, field: &str) -> anyhow::Result<i64> {
        self.increment_object_field_by(key, field, 1).await
    }

    // Sorted Set Operations
    /// Adds `member`, or moves it to `score` if already present.
    async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> anyhow::Result<()>;
    async fn sorted_set_remove(&self, key: &str, member: &str) -> anyhow::Result<()>;
    /// All members ascending by score, ties broken by member.
    async fn sorted_set_members(&self, key: &str) -> anyhow::Result<Vec<(String, i64)>>;
    async fn sorted_set_score(&self, key: &str, member: &str) -> anyhow::Result<Option<i64>>;

    // Set Operations
    async fn set_add(&self, key: &str, member: &str) -> anyhow::Result<()>;
    /// Members in ascending order.
    async fn set_members(&self, key: &str) -> anyhow::Result<Vec<String>>;
}

/// User-side bookkeeping for new posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserPosts: Send + Sync {
    async fn on_new_post(&self, post: &Post) -> anyhow::Result<()>;
}

/// Topic-side bookkeeping, plus the topic fields post creation reads.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TopicPosts: Send + Sync {
    async fn topic_fields(&self, topic_id: u64) -> anyhow::Result<TopicFields>;
    async fn on_new_post(&self, post: &Post) -> anyhow::Result<()>;
}

/// Category-side bookkeeping. `category_id` is `None` when the topic has none.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CategoryPosts: Send + Sync {
    async fn on_new_post(&self, category_id: Option<u64>, pinned: bool, post: &Post) -> anyhow::Result<()>;
}

/// Group-side bookkeeping for the author's memberships.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GroupPosts: Send + Sync {
    async fn on_new_post(&self, post: &Post) -> anyhow::Result<()>;
}

/// Keeps the uploads referenced by a post's content associated with it.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UploadSync: Send + Sync {
    async fn sync(&self, post_id: u64) -> anyhow::Result<()>;
}

/// Site-wide settings the post workflow consults.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait SiteConfig: Send + Sync {
    /// Whether the poster's IP is stored on each post.
    fn track_ip_per_post(&self) -> bool;
}

/// The sibling subsystems notified when a post is created.
#[derive(Clone)]
pub struct Subsystems {
    pub users: Arc<dyn UserPosts>,
    pub topics: Arc<dyn TopicPosts>,
    pub categories: Arc<dyn CategoryPosts>,
    pub groups: Arc<dyn GroupPosts>,
    pub uploads: Arc<dyn UploadSync>,
}
