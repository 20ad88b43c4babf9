//! biokg: idempotent ingestion for a space-biology knowledge graph
//!
//! Line-delimited JSON records from upstream extractors (research findings,
//! and external items such as news and explainers) are resolved to stable
//! identities and merged into a property graph. Loading the same input twice
//! leaves the graph unchanged apart from occurrence counts and last-seen
//! timestamps.
//!
//! # Core Concepts
//!
//! - **Nodes**: one per `(label, identity key)`, never keyed by display text
//! - **Edges**: at most one per `(type, source, target)`; evidence is written once
//! - **Units of work**: each input record commits or rolls back as a whole
//!
//! # Example
//!
//! ```
//! use biokg::{BatchCoordinator, FindingAdapter, LoaderConfig, OpenStore, SqliteStore};
//! use std::io::Cursor;
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteStore::open_in_memory().unwrap());
//! let loader = BatchCoordinator::new(store, FindingAdapter::new(), LoaderConfig::new()).unwrap();
//! let metrics = loader.load_reader(Cursor::new(r#"{"uuid": "f-1", "pmcid": "PMC1"}"#));
//! assert_eq!(metrics.total_loaded, 1);
//! ```

pub mod graph;
pub mod identity;
pub mod ingest;
pub mod record;
pub mod storage;

pub use graph::{
    EdgeType, IdentityKey, KeyKind, MatchPolicy, NodeLabel, Outcome, Properties, PropertyValue,
    StoredEdge, StoredNode,
};
pub use identity::{FindingIdPolicy, IdentityError};
pub use ingest::{
    BatchCoordinator, CancellationToken, ExternalItemAdapter, FindingAdapter, IngestError,
    LoaderConfig, RecordAdapter, RunMetrics,
};
pub use storage::{GraphStore, OpenStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
