use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rf_core::keys;
use rf_core::traits::{ObjectStore, UploadSync};
use serde_json::Value;
use sha2::{Digest, Sha256};

static UPLOAD_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"/assets/uploads/(files/[^\s"'()<>\[\]]+)"#).expect("upload path pattern is valid")
});

/// Upload paths (relative to the uploads root) referenced by `content`.
pub fn upload_paths(content: &str) -> BTreeSet<String> {
    UPLOAD_PATH
        .captures_iter(content)
        .map(|captures| captures[1].to_string())
        .collect()
}

fn path_hash(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

/// Associates uploaded files with the posts that reference them, in both
/// directions: `post:{pid}:uploads` and `upload:{sha256(path)}:pids`.
pub struct KvUploads {
    store: Arc<dyn ObjectStore>,
}

impl KvUploads {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    async fn associate(&self, pid: &str, post_key: &str, path: &str, now: i64) -> anyhow::Result<()> {
        let reverse_key = keys::upload_pids(&path_hash(path));
        futures::try_join!(
            self.store.sorted_set_add(post_key, now, path),
            self.store.sorted_set_add(&reverse_key, now, pid),
        )?;
        Ok(())
    }

    async fn dissociate(&self, pid: &str, post_key: &str, path: &str) -> anyhow::Result<()> {
        let reverse_key = keys::upload_pids(&path_hash(path));
        futures::try_join!(
            self.store.sorted_set_remove(post_key, path),
            self.store.sorted_set_remove(&reverse_key, pid),
        )?;
        Ok(())
    }
}

#[async_trait]
impl UploadSync for KvUploads {
    /// Brings the post's upload associations in line with its current content.
    async fn sync(&self, post_id: u64) -> anyhow::Result<()> {
        let content = self
            .store
            .get_object_fields(&keys::post(post_id), &["content"])
            .await?;
        let referenced = upload_paths(content.get("content").and_then(Value::as_str).unwrap_or_default());

        let uploads_key = keys::post_uploads(post_id);
        let associated: BTreeSet<String> = self
            .store
            .sorted_set_members(&uploads_key)
            .await?
            .into_iter()
            .map(|(path, _)| path)
            .collect();

        let pid = post_id.to_string();
        let now = Utc::now().timestamp_millis();

        let added = referenced
            .difference(&associated)
            .map(|path| self.associate(&pid, &uploads_key, path, now));
        futures::future::try_join_all(added).await?;

        let removed = associated
            .difference(&referenced)
            .map(|path| self.dissociate(&pid, &uploads_key, path));
        futures::future::try_join_all(removed).await?;

        tracing::trace!(pid = post_id, uploads = referenced.len(), "uploads synced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_db_memory::MemoryStore;
    use serde_json::json;

    #[test]
    fn finds_upload_paths_in_markdown_and_html() {
        let content = r#"look ![cat](/assets/uploads/files/cat.png) and
            <img src="/assets/uploads/files/2024/dog.jpg"> again ![cat](/assets/uploads/files/cat.png)
            but not https://example.com/files/other.png"#;

        let paths: Vec<String> = upload_paths(content).into_iter().collect();
        assert_eq!(paths, vec!["files/2024/dog.jpg", "files/cat.png"]);
    }

    #[tokio::test]
    async fn associates_referenced_uploads_both_ways() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_object_field("post:1", "content", json!("![a](/assets/uploads/files/a.png)"))
            .await
            .unwrap();
        let uploads = KvUploads::new(store.clone());

        uploads.sync(1).await.unwrap();

        let members = store.sorted_set_members("post:1:uploads").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].0, "files/a.png");

        let reverse = keys::upload_pids(&path_hash("files/a.png"));
        assert!(store.sorted_set_score(&reverse, "1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn drops_uploads_no_longer_referenced() {
        let store = Arc::new(MemoryStore::new());
        store.sorted_set_add("post:1:uploads", 1, "files/old.png").await.unwrap();
        let reverse = keys::upload_pids(&path_hash("files/old.png"));
        store.sorted_set_add(&reverse, 1, "1").await.unwrap();
        store.set_object_field("post:1", "content", json!("no images")).await.unwrap();

        KvUploads::new(store.clone()).sync(1).await.unwrap();

        assert!(store.sorted_set_members("post:1:uploads").await.unwrap().is_empty());
        assert!(store.sorted_set_members(&reverse).await.unwrap().is_empty());
    }
}
