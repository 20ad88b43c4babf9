//! Relationship representation

use super::node::{IdentityKey, Properties};
use super::schema::{EdgeType, NodeLabel};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Handle to a relationship that exists in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRef {
    id: i64,
    edge_type: EdgeType,
    source: i64,
    target: i64,
}

impl EdgeRef {
    pub(crate) fn new(id: i64, edge_type: EdgeType, source: i64, target: i64) -> Self {
        Self {
            id,
            edge_type,
            source,
            target,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn edge_type(&self) -> EdgeType {
        self.edge_type
    }

    pub fn source(&self) -> i64 {
        self.source
    }

    pub fn target(&self) -> i64 {
        self.target
    }
}

/// One end of a stored relationship, by identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub label: NodeLabel,
    pub key: IdentityKey,
}

/// A relationship as persisted
///
/// At most one exists per (type, source, target). Evidence is whatever the
/// first source to assert the relationship supplied.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEdge {
    pub id: i64,
    pub edge_type: EdgeType,
    pub source: Endpoint,
    pub target: Endpoint,
    pub evidence: Properties,
    pub created_at: DateTime<Utc>,
}
