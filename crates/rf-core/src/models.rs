//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Forum.
//! Post ids come from a global store counter, so they are plain integers
//! that only ever grow.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A flat field map, the shape every object in the store takes.
pub type Fields = serde_json::Map<String, Value>;

/// Identifies a forum user. `Uid(0)` is the guest identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u64);

impl Uid {
    pub const GUEST: Uid = Uid(0);

    pub fn is_guest(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for Uid {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Uid)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The fundamental unit of conversation.
///
/// Field names on the wire and in the store follow the forum's object
/// layout (`pid`, `uid`, `tid`, ...). Anything a plugin adds lands in
/// `extra` and is persisted alongside the known fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "pid")]
    pub id: u64,
    #[serde(rename = "uid")]
    pub author_id: Uid,
    #[serde(rename = "tid")]
    pub topic_id: u64,
    pub content: String,
    /// Creation time in Unix epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "toPid", default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u64>,
    #[serde(rename = "ip", default, skip_serializing_if = "Option::is_none")]
    pub origin_ip: Option<String>,
    #[serde(rename = "handle", default, skip_serializing_if = "Option::is_none")]
    pub guest_handle: Option<String>,
    /// Copied from the owning topic after the record is written.
    #[serde(rename = "cid", default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    /// Transient: only ever set on the record handed back to the caller.
    #[serde(rename = "isMain", default, skip_serializing_if = "Option::is_none")]
    pub is_main: Option<bool>,
    /// Plugin-owned fields.
    #[serde(flatten)]
    pub extra: Fields,
}

impl Post {
    pub fn new(id: u64, author_id: Uid, topic_id: u64, content: String, timestamp: i64) -> Self {
        Self {
            id,
            author_id,
            topic_id,
            content,
            timestamp,
            reply_to: None,
            origin_ip: None,
            guest_handle: None,
            category_id: None,
            is_main: None,
            extra: Fields::new(),
        }
    }

    /// Flattens the post into the field map written to `post:{pid}`.
    pub fn to_fields(&self) -> serde_json::Result<Fields> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Fields::new()),
        }
    }

    pub fn from_fields(fields: Fields) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(fields))
    }
}

/// Caller input for post creation.
///
/// Identifiers stay raw because validating them is part of creating the post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPost {
    pub topic_id: u64,
    pub author_id: Option<String>,
    pub content: String,
    pub timestamp: Option<i64>,
    pub is_main: bool,
    pub reply_to: Option<String>,
    pub origin_ip: Option<String>,
    pub guest_handle: Option<String>,
}

impl NewPost {
    pub fn new(topic_id: u64, author_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            topic_id,
            author_id: Some(author_id.into()),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Marks the post as the one that opens its topic.
    pub fn main(mut self) -> Self {
        self.is_main = true;
        self
    }

    pub fn reply_to(mut self, pid: impl ToString) -> Self {
        self.reply_to = Some(pid.to_string());
        self
    }

    pub fn from_ip(mut self, ip: impl Into<String>) -> Self {
        self.origin_ip = Some(ip.into());
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.guest_handle = Some(handle.into());
        self
    }
}

/// The topic fields post creation depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicFields {
    pub category_id: Option<u64>,
    pub pinned: bool,
}

/// Payload of the `post.create` filter: the assembled record plus the raw input.
#[derive(Debug, Clone)]
pub struct PostCreate {
    pub post: Post,
    pub data: NewPost,
}

/// Payload of the `post.get` filter.
#[derive(Debug, Clone)]
pub struct PostGet {
    pub post: Post,
    pub uid: Uid,
}

/// Payload of the `post.saved` action. Listeners each get their own copy.
#[derive(Debug, Clone)]
pub struct PostSaved {
    pub post: Post,
}
