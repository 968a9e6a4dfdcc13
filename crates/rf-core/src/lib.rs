//! rusty-forum/crates/rf-core/src/lib.rs
//!
//! The central domain types and interface definitions for Rusty-Forum.

pub mod error;
pub mod hooks;
pub mod keys;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use hooks::*;
pub use models::*;
pub use traits::*;
