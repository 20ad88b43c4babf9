//! Storage trait definitions

use crate::graph::{
    EdgeRef, EdgeType, IdentityKey, MatchPolicy, NodeLabel, NodeRef, NodeUpsert, Outcome,
    Properties, SchemaError, StoredEdge, StoredNode,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another writer holds the store; the unit of work was rolled back
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Schema violation: {0}")]
    Schema(#[from] SchemaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Whether retrying the same unit of work may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }

    /// Turn SQLite busy/locked failures into [`StorageError::Conflict`].
    pub fn classified(self) -> Self {
        match self {
            StorageError::Database(err) if is_contention(&err) => {
                StorageError::Conflict(err.to_string())
            }
            other => other,
        }
    }
}

fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Filter criteria for querying nodes
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub label: Option<NodeLabel>,
    /// Only nodes that lack this descriptive field (skeletal placeholders)
    pub missing_property: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: NodeLabel) -> Self {
        self.label = Some(label);
        self
    }

    pub fn missing(mut self, property: impl Into<String>) -> Self {
        self.missing_property = Some(property.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filter criteria for querying edges
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub edge_type: Option<EdgeType>,
    pub source: Option<(NodeLabel, IdentityKey)>,
    pub target: Option<(NodeLabel, IdentityKey)>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl EdgeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, edge_type: EdgeType) -> Self {
        self.edge_type = Some(edge_type);
        self
    }

    pub fn from_node(mut self, label: NodeLabel, key: IdentityKey) -> Self {
        self.source = Some((label, key));
        self
    }

    pub fn to_node(mut self, label: NodeLabel, key: IdentityKey) -> Self {
        self.target = Some((label, key));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Element counts per label and relationship type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStats {
    pub nodes: BTreeMap<NodeLabel, u64>,
    pub edges: BTreeMap<EdgeType, u64>,
}

impl GraphStats {
    pub fn node_count(&self, label: NodeLabel) -> u64 {
        self.nodes.get(&label).copied().unwrap_or(0)
    }

    pub fn edge_count(&self, edge_type: EdgeType) -> u64 {
        self.edges.get(&edge_type).copied().unwrap_or(0)
    }

    pub fn total_nodes(&self) -> u64 {
        self.nodes.values().sum()
    }

    pub fn total_edges(&self) -> u64 {
        self.edges.values().sum()
    }

    /// Flatten into `node_count_<Label>` / `rel_count_<TYPE>` counters.
    pub fn to_counters(&self) -> BTreeMap<String, u64> {
        let mut counters = BTreeMap::new();
        for (label, count) in &self.nodes {
            counters.insert(format!("node_count_{}", label), *count);
        }
        for (edge_type, count) in &self.edges {
            counters.insert(format!("rel_count_{}", edge_type), *count);
        }
        counters
    }
}

/// Write operations available inside one atomic unit of work
///
/// Nothing written through a unit is visible to other readers until the
/// enclosing [`GraphStore::write_unit`] call commits it. Units run by
/// [`GraphStore::rehearse_unit`] are never committed.
pub trait UnitOfWork {
    /// Create the node if its (label, key) is new, otherwise match it.
    ///
    /// On create, `on_create` fields are written and the occurrence count
    /// starts at 1. On match, `last_seen` moves to `at`, the count goes up by
    /// one, and descriptive fields follow `policy`.
    fn merge_node(
        &mut self,
        upsert: &NodeUpsert,
        policy: MatchPolicy,
        at: DateTime<Utc>,
    ) -> StorageResult<(NodeRef, Outcome)>;

    /// Create the relationship if no (type, source, target) edge exists.
    ///
    /// Evidence is written on creation only. Endpoint labels are not checked
    /// here.
    fn merge_edge(
        &mut self,
        edge_type: EdgeType,
        source: &NodeRef,
        target: &NodeRef,
        evidence: &Properties,
        at: DateTime<Utc>,
    ) -> StorageResult<(EdgeRef, Outcome)>;
}

/// Closure run inside a unit of work
pub type WorkFn<'a> = dyn FnMut(&mut dyn UnitOfWork) -> StorageResult<()> + 'a;

/// Trait for graph storage backends
///
/// Implementations must be thread-safe (Send + Sync) so batches can be
/// dispatched from several worker threads against one store.
pub trait GraphStore: Send + Sync {
    /// Cheap liveness check, run before any record is processed
    fn ping(&self) -> StorageResult<()>;

    /// Run `work` as one atomic unit: commit if it returns `Ok`, roll back
    /// everything it wrote otherwise.
    ///
    /// Contention with another writer surfaces as [`StorageError::Conflict`].
    fn write_unit(&self, work: &mut WorkFn<'_>) -> StorageResult<()>;

    /// Run `work` exactly as [`write_unit`](GraphStore::write_unit) would,
    /// against the current graph, then roll it back whatever the outcome.
    ///
    /// Outcomes reported to `work` are the ones a real write would see.
    fn rehearse_unit(&self, work: &mut WorkFn<'_>) -> StorageResult<()>;

    // === Read side ===

    /// Load a node by its identity
    fn load_node(&self, label: NodeLabel, key: &IdentityKey) -> StorageResult<Option<StoredNode>>;

    /// Find nodes matching filter criteria
    fn find_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<StoredNode>>;

    /// Find edges matching filter criteria
    fn find_edges(&self, filter: &EdgeFilter) -> StorageResult<Vec<StoredEdge>>;

    /// Count nodes per label and edges per type
    fn stats(&self) -> StorageResult<GraphStats>;

    /// Edges whose source or target no longer resolves to a node
    fn dangling_edge_count(&self) -> StorageResult<u64>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
