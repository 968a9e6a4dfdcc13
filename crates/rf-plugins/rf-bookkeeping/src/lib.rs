//! # rf-bookkeeping
//!
//! Store-backed implementations of the sibling subsystems a new post
//! notifies: users, topics, categories, groups, and upload associations.
//! Each one keeps its own denormalized counters and indexes in the shared
//! `ObjectStore` (see `rf_core::keys` for the layout).

use std::sync::Arc;

use rf_core::traits::{ObjectStore, Subsystems};
use serde_json::Value;

mod categories;
mod groups;
mod topics;
mod uploads;
mod users;

pub use categories::KvCategories;
pub use groups::KvGroups;
pub use topics::KvTopics;
pub use uploads::{upload_paths, KvUploads};
pub use users::KvUsers;

/// Wires every subsystem to the same store.
pub fn subsystems(store: Arc<dyn ObjectStore>) -> Subsystems {
    Subsystems {
        users: Arc::new(KvUsers::new(Arc::clone(&store))),
        topics: Arc::new(KvTopics::new(Arc::clone(&store))),
        categories: Arc::new(KvCategories::new(Arc::clone(&store))),
        groups: Arc::new(KvGroups::new(Arc::clone(&store))),
        uploads: Arc::new(KvUploads::new(store)),
    }
}

/// Reads an id written either as a number or a numeric string.
fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Flags are stored as booleans, 0/1, or "0"/"1" depending on who wrote them.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    }
}
