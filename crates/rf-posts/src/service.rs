//! # Post Creation
//!
//! Coordinates the flow from caller input to a persisted post: validate,
//! allocate an id, let plugins shape the record, write it, then notify every
//! subsystem that keeps denormalized state about posts.

use std::sync::Arc;

use chrono::Utc;
use rf_core::error::{AppError, Result};
use rf_core::hooks::PostHooks;
use rf_core::keys;
use rf_core::models::{NewPost, Post, PostCreate, PostGet, PostSaved, TopicFields, Uid};
use rf_core::traits::{ObjectStore, SiteConfig, Subsystems};
use tokio::task::JoinHandle;

pub struct PostService {
    store: Arc<dyn ObjectStore>,
    hooks: Arc<PostHooks>,
    subsystems: Subsystems,
    config: Arc<dyn SiteConfig>,
}

impl PostService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        hooks: Arc<PostHooks>,
        subsystems: Subsystems,
        config: Arc<dyn SiteConfig>,
    ) -> Self {
        Self { store, hooks, subsystems, config }
    }

    /// Creates and persists a post, returning the record as plugins left it.
    ///
    /// Input is validated before anything is written. Past that point any
    /// port failure aborts the call as-is; work already done (the id, the
    /// record, finished fan-out writes) stays in place.
    #[tracing::instrument(name = "post.create", skip_all, fields(tid = data.topic_id))]
    pub async fn create(&self, data: NewPost) -> Result<Post> {
        let uid = validate_author(data.author_id.as_deref())?;
        let reply_to = validate_reply_target(data.reply_to.as_deref())?;
        let timestamp = data
            .timestamp
            .filter(|ts| *ts != 0)
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        let topic_id = data.topic_id;
        let is_main = data.is_main;

        let next = self
            .store
            .increment_object_field(keys::GLOBAL, keys::NEXT_PID)
            .await?;
        let pid = u64::try_from(next)
            .map_err(|_| AppError::Internal(format!("post id counter is negative: {next}")))?;

        let mut post = Post::new(pid, uid, topic_id, data.content.clone(), timestamp);
        post.reply_to = reply_to;
        if self.config.track_ip_per_post() {
            post.origin_ip = data.origin_ip.clone().filter(|ip| !ip.is_empty());
        }
        if uid.is_guest() {
            post.guest_handle = data.guest_handle.clone().filter(|handle| !handle.is_empty());
        }

        let mut post = self.hooks.create.fire(PostCreate { post, data }).await?.post;

        let fields = post
            .to_fields()
            .map_err(|e| AppError::Internal(format!("post {} is not serializable: {e}", post.id)))?;
        self.store.set_object(&keys::post(post.id), &fields).await?;

        let topic = self.subsystems.topics.topic_fields(topic_id).await?;
        post.category_id = topic.category_id;

        self.fan_out(&post, topic, timestamp).await?;

        let mut post = self.hooks.get.fire(PostGet { post, uid }).await?.post;
        post.is_main = Some(is_main);

        // Detached: listeners finish on their own.
        drop(self.hooks.saved.fire(PostSaved { post: post.clone() }));

        tracing::debug!(pid = post.id, "post created");
        Ok(post)
    }

    /// Starts every independent side effect before waiting on any of them.
    /// Each runs on its own task, so when one fails the others still run to
    /// completion; nothing is rolled back.
    async fn fan_out(&self, post: &Post, topic: TopicFields, timestamp: i64) -> Result<()> {
        let shared = Arc::new(post.clone());
        let mut tasks: Vec<JoinHandle<anyhow::Result<()>>> = Vec::with_capacity(8);

        let store = Arc::clone(&self.store);
        let member = post.id.to_string();
        tasks.push(tokio::spawn(async move {
            store.sorted_set_add(keys::POSTS_BY_TIME, timestamp, &member).await
        }));

        let store = Arc::clone(&self.store);
        tasks.push(tokio::spawn(async move {
            store
                .increment_object_field(keys::GLOBAL, keys::POST_COUNT)
                .await
                .map(drop)
        }));

        let (users, post_ref) = (Arc::clone(&self.subsystems.users), Arc::clone(&shared));
        tasks.push(tokio::spawn(async move { users.on_new_post(&post_ref).await }));

        let (topics, post_ref) = (Arc::clone(&self.subsystems.topics), Arc::clone(&shared));
        tasks.push(tokio::spawn(async move { topics.on_new_post(&post_ref).await }));

        let (categories, post_ref) = (Arc::clone(&self.subsystems.categories), Arc::clone(&shared));
        tasks.push(tokio::spawn(async move {
            categories
                .on_new_post(topic.category_id, topic.pinned, &post_ref)
                .await
        }));

        let (groups, post_ref) = (Arc::clone(&self.subsystems.groups), Arc::clone(&shared));
        tasks.push(tokio::spawn(async move { groups.on_new_post(&post_ref).await }));

        if let Some(parent) = post.reply_to {
            tasks.push(tokio::spawn(add_reply_to(
                Arc::clone(&self.store),
                parent,
                post.id,
                timestamp,
            )));
        }

        let uploads = Arc::clone(&self.subsystems.uploads);
        let pid = post.id;
        tasks.push(tokio::spawn(async move { uploads.sync(pid).await }));

        futures::future::try_join_all(tasks.into_iter().map(settle)).await?;
        Ok(())
    }
}

/// Links a reply to its parent: bumps the parent's reply counter and
/// indexes the reply under the parent, both at the reply's timestamp.
async fn add_reply_to(
    store: Arc<dyn ObjectStore>,
    parent: u64,
    pid: u64,
    timestamp: i64,
) -> anyhow::Result<()> {
    let replies_key = keys::post_replies(parent);
    let parent_key = keys::post(parent);
    let member = pid.to_string();

    futures::try_join!(
        store.sorted_set_add(&replies_key, timestamp, &member),
        store.increment_object_field(&parent_key, "replies"),
    )?;
    Ok(())
}

async fn settle(task: JoinHandle<anyhow::Result<()>>) -> Result<()> {
    match task.await {
        Ok(outcome) => outcome.map_err(AppError::from),
        Err(join_error) => Err(AppError::Internal(format!("fan-out task failed: {join_error}"))),
    }
}

/// The author must be a user id; `0` is the guest identity.
fn validate_author(raw: Option<&str>) -> Result<Uid> {
    raw.and_then(|uid| uid.parse::<Uid>().ok())
        .ok_or(AppError::InvalidAuthor)
}

/// An empty or zero target means "not a reply"; anything else must be a post id.
fn validate_reply_target(raw: Option<&str>) -> Result<Option<u64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(target) => match target.parse::<u64>() {
            Ok(0) => Ok(None),
            Ok(pid) => Ok(Some(pid)),
            Err(_) => Err(AppError::InvalidReplyTarget(target.to_string())),
        },
    }
}
