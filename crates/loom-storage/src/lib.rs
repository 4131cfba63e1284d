//! Loom Storage - File-backed implementation of the storage handle
//! consumed by workflow executors (§6.1, §4.13).
//!
//! The distilled spec treats storage as an opaque contract without naming
//! an implementation. This crate supplies the one concrete backend the
//! workspace ships: one JSON document per collection (issues, knowledge,
//! flows, pond) plus a single state-document value, all rooted under a
//! configurable data directory. Physical layout beyond the durability
//! invariants in the spec is explicitly out of scope — this is not a claim
//! about any production store's on-disk format.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use loom_storage::FileStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = FileStorage::new("./data").await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;

pub use backend::file::FileStorage;

// Re-export the trait and value types this backend implements, so
// downstream crates only need `loom_storage::{FileStorage, Storage, ...}`.
pub use loom_core::storage::{Collection, Query, Record, Storage};
