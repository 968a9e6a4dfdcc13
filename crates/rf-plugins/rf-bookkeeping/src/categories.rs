use std::sync::Arc;

use async_trait::async_trait;
use rf_core::keys;
use rf_core::models::Post;
use rf_core::traits::{CategoryPosts, ObjectStore};

pub struct KvCategories {
    store: Arc<dyn ObjectStore>,
}

impl KvCategories {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CategoryPosts for KvCategories {
    /// Pinned topics keep their place in the category listing, so only
    /// unpinned ones get bumped in `cid:{cid}:tids`.
    async fn on_new_post(&self, category_id: Option<u64>, pinned: bool, post: &Post) -> anyhow::Result<()> {
        let Some(cid) = category_id else {
            return Ok(());
        };
        let pid = post.id.to_string();
        let tid = post.topic_id.to_string();
        let pids_key = keys::category_pids(cid);
        let category_key = keys::category(cid);
        let recent_key = keys::category_recent_tids(cid);

        futures::try_join!(
            self.store.sorted_set_add(&pids_key, post.timestamp, &pid),
            self.store.increment_object_field(&category_key, "post_count"),
            self.store.sorted_set_add(&recent_key, post.timestamp, &tid),
        )?;

        if !pinned {
            self.store
                .sorted_set_add(&keys::category_tids(cid), post.timestamp, &tid)
                .await?;
        }
        Ok(())
    }
}
