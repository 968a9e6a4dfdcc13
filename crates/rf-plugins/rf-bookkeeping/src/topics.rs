use std::sync::Arc;

use async_trait::async_trait;
use rf_core::keys;
use rf_core::models::{Post, TopicFields};
use rf_core::traits::{ObjectStore, TopicPosts};
use serde_json::json;

use crate::{as_id, truthy};

/// Topic objects live at `topic:{tid}`; replies are indexed in `tid:{tid}:posts`.
pub struct KvTopics {
    store: Arc<dyn ObjectStore>,
}

impl KvTopics {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TopicPosts for KvTopics {
    /// A topic that does not exist yet reads as uncategorized and unpinned.
    async fn topic_fields(&self, topic_id: u64) -> anyhow::Result<TopicFields> {
        let fields = self
            .store
            .get_object_fields(&keys::topic(topic_id), &["cid", "pinned"])
            .await?;

        Ok(TopicFields {
            category_id: fields.get("cid").and_then(as_id),
            pinned: fields.get("pinned").is_some_and(truthy),
        })
    }

    /// The first post a topic sees becomes its main post; later ones are
    /// indexed as replies.
    async fn on_new_post(&self, post: &Post) -> anyhow::Result<()> {
        let topic_key = keys::topic(post.topic_id);
        let pid = post.id.to_string();

        let current = self.store.get_object_fields(&topic_key, &["mainPid"]).await?;
        let has_main = current
            .get("mainPid")
            .and_then(as_id)
            .is_some_and(|main| main != 0);

        if has_main {
            self.store
                .sorted_set_add(&keys::topic_posts(post.topic_id), post.timestamp, &pid)
                .await?;
        } else {
            self.store
                .set_object_field(&topic_key, "mainPid", json!(post.id))
                .await?;
        }

        futures::try_join!(
            self.store.increment_object_field(&topic_key, "postcount"),
            self.store.set_object_field(&topic_key, "lastposttime", json!(post.timestamp)),
        )?;
        Ok(())
    }
}
