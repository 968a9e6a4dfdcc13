use std::sync::Arc;

use async_trait::async_trait;
use rf_core::keys;
use rf_core::models::{Post, Uid};
use rf_core::traits::{GroupPosts, ObjectStore};

/// Group membership is the set `uid:{uid}:groups`; each group keeps the
/// posts its members made in `group:{name}:member:pids`.
pub struct KvGroups {
    store: Arc<dyn ObjectStore>,
}

impl KvGroups {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn join(&self, uid: Uid, group: &str) -> anyhow::Result<()> {
        self.store.set_add(&keys::user_groups(uid.0), group).await
    }

    pub async fn groups_of(&self, uid: Uid) -> anyhow::Result<Vec<String>> {
        self.store.set_members(&keys::user_groups(uid.0)).await
    }
}

#[async_trait]
impl GroupPosts for KvGroups {
    async fn on_new_post(&self, post: &Post) -> anyhow::Result<()> {
        if post.author_id.is_guest() {
            return Ok(());
        }
        let pid = post.id.to_string();
        let groups = self.groups_of(post.author_id).await?;

        let writes = groups.iter().map(|name| {
            let key = keys::group_member_pids(name);
            let pid = &pid;
            async move { self.store.sorted_set_add(&key, post.timestamp, pid).await }
        });
        futures::future::try_join_all(writes).await?;
        Ok(())
    }
}
