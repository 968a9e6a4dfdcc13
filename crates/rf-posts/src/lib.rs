//! # rf-posts
//!
//! The post creation workflow. Everything it touches is behind an `rf-core`
//! port, so the same service runs against any store and any plugin set.

mod service;

pub use service::PostService;
