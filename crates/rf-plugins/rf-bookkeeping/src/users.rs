use std::sync::Arc;

use async_trait::async_trait;
use rf_core::keys;
use rf_core::models::Post;
use rf_core::traits::{ObjectStore, UserPosts};
use serde_json::json;

/// Per-user post index, post count, and last-post time.
pub struct KvUsers {
    store: Arc<dyn ObjectStore>,
}

impl KvUsers {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UserPosts for KvUsers {
    /// Guests have no user object, so there is nothing to update for them.
    async fn on_new_post(&self, post: &Post) -> anyhow::Result<()> {
        if post.author_id.is_guest() {
            return Ok(());
        }
        let uid = post.author_id.0;
        let user_key = keys::user(uid);
        let posts_key = keys::user_posts(uid);
        let pid = post.id.to_string();

        futures::try_join!(
            self.store.sorted_set_add(&posts_key, post.timestamp, &pid),
            self.store.increment_object_field(&user_key, "postcount"),
            self.store.set_object_field(&user_key, "lastposttime", json!(post.timestamp)),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::post;
    use rf_db_memory::MemoryStore;

    #[tokio::test]
    async fn records_post_on_the_author() {
        let store = Arc::new(MemoryStore::new());
        let users = KvUsers::new(store.clone());

        users.on_new_post(&post(1, 5, 10, 1000)).await.unwrap();
        users.on_new_post(&post(2, 5, 10, 2000)).await.unwrap();

        let user = store.get_object("user:5").await.unwrap().unwrap();
        assert_eq!(user["postcount"], json!(2));
        assert_eq!(user["lastposttime"], json!(2000));
        assert_eq!(store.sorted_set_score("uid:5:posts", "1").await.unwrap(), Some(1000));
        assert_eq!(store.sorted_set_score("uid:5:posts", "2").await.unwrap(), Some(2000));
    }

    #[tokio::test]
    async fn skips_guests() {
        let store = Arc::new(MemoryStore::new());
        let users = KvUsers::new(store.clone());

        users.on_new_post(&post(1, 0, 10, 1000)).await.unwrap();

        assert!(store.get_object("user:0").await.unwrap().is_none());
        assert!(store.sorted_set_members("uid:0:posts").await.unwrap().is_empty());
    }
}
