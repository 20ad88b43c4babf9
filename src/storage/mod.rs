//! Storage backends
//!
//! The ingestion pipeline talks to the graph through the `GraphStore` trait.
//! The primary implementation is `SqliteStore` for persistent storage.
//! `RehearsalStore` wraps any store for dry runs.

mod rehearsal;
mod sqlite;
mod traits;

pub use rehearsal::RehearsalStore;
pub use sqlite::SqliteStore;
pub use traits::{
    EdgeFilter, GraphStats, GraphStore, NodeFilter, OpenStore, StorageError, StorageResult,
    UnitOfWork, WorkFn,
};
