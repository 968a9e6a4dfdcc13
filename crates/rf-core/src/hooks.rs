//! # Plugin Hooks
//!
//! Extension points plugins attach to. A *filter* chain threads a payload
//! through every handler in registration order and the last output wins.
//! An *action* is a notification: listeners run in the background and
//! whatever they return is dropped.
//!
//! Handlers are registered while the app is assembled (`&mut self`); the
//! finished registry is shared read-only behind an `Arc`.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{PostCreate, PostGet, PostSaved};

pub const POST_CREATE: &str = "post.create";
pub const POST_GET: &str = "post.get";
pub const POST_SAVED: &str = "post.saved";

/// A transform step in a filter chain.
#[async_trait]
pub trait FilterHook<P>: Send + Sync {
    async fn filter(&self, payload: P) -> anyhow::Result<P>;
}

/// A listener on a notification-only hook.
#[async_trait]
pub trait ActionHook<P>: Send + Sync {
    async fn act(&self, payload: P) -> anyhow::Result<()>;
}

/// Adapts an async closure into a hook handler.
struct FnHook<F>(F);

#[async_trait]
impl<P, F, Fut> FilterHook<P> for FnHook<F>
where
    P: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<P>> + Send + 'static,
{
    async fn filter(&self, payload: P) -> anyhow::Result<P> {
        (self.0)(payload).await
    }
}

#[async_trait]
impl<P, F, Fut> ActionHook<P> for FnHook<F>
where
    P: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn act(&self, payload: P) -> anyhow::Result<()> {
        (self.0)(payload).await
    }
}

/// An ordered chain of [`FilterHook`]s under one hook name.
pub struct FilterChain<P> {
    name: &'static str,
    handlers: Vec<Arc<dyn FilterHook<P>>>,
}

impl<P: Send + 'static> FilterChain<P> {
    pub fn new(name: &'static str) -> Self {
        Self { name, handlers: Vec::new() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn register<H>(&mut self, handler: H) -> &mut Self
    where
        H: FilterHook<P> + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn register_fn<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<P>> + Send + 'static,
    {
        self.register(FnHook(f))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs every handler in registration order, each on the previous
    /// handler's output. The first failure stops the chain.
    pub async fn fire(&self, mut payload: P) -> Result<P> {
        for handler in &self.handlers {
            payload = handler
                .filter(payload)
                .await
                .map_err(|source| AppError::Hook { hook: self.name, source })?;
        }
        Ok(payload)
    }
}

/// Listeners on a notification-only hook.
pub struct ActionHooks<P> {
    name: &'static str,
    listeners: Vec<Arc<dyn ActionHook<P>>>,
}

impl<P: Clone + Send + 'static> ActionHooks<P> {
    pub fn new(name: &'static str) -> Self {
        Self { name, listeners: Vec::new() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn register<H>(&mut self, listener: H) -> &mut Self
    where
        H: ActionHook<P> + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn register_fn<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(FnHook(f))
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Dispatches `payload` to every listener on a background task and
    /// returns immediately. Each listener gets its own clone; a failing
    /// listener is logged and does not stop the ones after it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn fire(&self, payload: P) -> JoinHandle<()> {
        let name = self.name;
        let listeners = self.listeners.clone();
        tokio::spawn(async move {
            for listener in listeners {
                if let Err(error) = listener.act(payload.clone()).await {
                    tracing::warn!(hook = name, error = %error, "action listener failed");
                }
            }
        })
    }
}

/// Every hook the post workflow fires.
pub struct PostHooks {
    /// Runs before the record is written; may rewrite any field.
    pub create: FilterChain<PostCreate>,
    /// Runs on the record about to be returned.
    pub get: FilterChain<PostGet>,
    pub saved: ActionHooks<PostSaved>,
}

impl PostHooks {
    pub fn new() -> Self {
        Self {
            create: FilterChain::new(POST_CREATE),
            get: FilterChain::new(POST_GET),
            saved: ActionHooks::new(POST_SAVED),
        }
    }
}

impl Default for PostHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    struct Append(&'static str);

    #[async_trait]
    impl FilterHook<Vec<&'static str>> for Append {
        async fn filter(&self, mut payload: Vec<&'static str>) -> anyhow::Result<Vec<&'static str>> {
            payload.push(self.0);
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn filters_run_in_registration_order() {
        let mut chain = FilterChain::new("test.filter");
        chain.register(Append("a")).register(Append("b"));
        chain.register_fn(|mut v: Vec<&'static str>| async move {
            v.push("c");
            Ok(v)
        });

        let out = assert_ok!(chain.fire(vec![]).await);
        assert_eq!(out, vec!["a", "b", "c"]);
        assert_eq!(chain.len(), 3);
    }

    #[tokio::test]
    async fn empty_chain_returns_payload_unchanged() {
        let chain: FilterChain<u32> = FilterChain::new("test.filter");
        assert!(chain.is_empty());
        assert_eq!(assert_ok!(chain.fire(7).await), 7);
    }

    #[tokio::test]
    async fn failing_filter_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let after = Arc::clone(&calls);

        let mut chain = FilterChain::new("test.filter");
        chain.register_fn(|_: u32| async { Err::<u32, _>(anyhow::anyhow!("nope")) });
        chain.register_fn(move |v: u32| {
            let after = Arc::clone(&after);
            async move {
                after.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            }
        });

        let err = assert_err!(chain.fire(1).await);
        assert!(matches!(err, AppError::Hook { hook: "test.filter", .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn actions_run_in_background_and_survive_listener_errors() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut hooks = ActionHooks::new("test.action");
        hooks.register_fn(|_: u32| async { Err::<(), _>(anyhow::anyhow!("listener down")) });
        hooks.register_fn(move |v: u32| {
            let tx = tx.clone();
            async move {
                tx.send(v)?;
                Ok(())
            }
        });

        let handle = hooks.fire(42);
        assert_ok!(handle.await);
        assert_eq!(rx.recv().await, Some(42));
    }

    #[test]
    fn post_hooks_use_the_post_hook_names() {
        let hooks = PostHooks::default();
        assert_eq!(hooks.create.name(), POST_CREATE);
        assert_eq!(hooks.get.name(), POST_GET);
        assert_eq!(hooks.saved.name(), POST_SAVED);
    }
}
