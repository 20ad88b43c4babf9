//! Dry-run store
//!
//! `RehearsalStore` wraps a real store and runs every unit through
//! [`GraphStore::rehearse_unit`], so nothing is ever committed. Each rehearsed
//! unit sees the real graph, but not what earlier rehearsed units would have
//! written; the store remembers those elements and reports them as touched the
//! next time they come up, as a live run would.

use super::traits::{
    EdgeFilter, GraphStats, GraphStore, NodeFilter, StorageError, StorageResult, UnitOfWork,
    WorkFn,
};
use crate::graph::{
    EdgeRef, EdgeType, IdentityKey, MatchPolicy, NodeLabel, NodeRef, NodeUpsert, Outcome,
    Properties, StoredEdge, StoredNode,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Element {
    Node(NodeLabel, IdentityKey),
    Edge(EdgeType, NodeLabel, IdentityKey, NodeLabel, IdentityKey),
}

impl Element {
    fn node(node: &NodeRef) -> Self {
        Element::Node(node.label(), node.key().clone())
    }

    fn edge(edge_type: EdgeType, source: &NodeRef, target: &NodeRef) -> Self {
        Element::Edge(
            edge_type,
            source.label(),
            source.key().clone(),
            target.label(),
            target.key().clone(),
        )
    }
}

pub struct RehearsalStore {
    inner: Arc<dyn GraphStore>,
    /// Elements a rehearsed unit has already reported as created
    created: Mutex<HashSet<Element>>,
}

impl RehearsalStore {
    pub fn new(inner: Arc<dyn GraphStore>) -> Self {
        Self {
            inner,
            created: Mutex::new(HashSet::new()),
        }
    }
}

struct RehearsedUnit<'a> {
    inner: &'a mut dyn UnitOfWork,
    created: &'a HashSet<Element>,
    pending: &'a mut Vec<Element>,
}

impl RehearsedUnit<'_> {
    fn settle(&mut self, element: Element, outcome: Outcome) -> Outcome {
        match outcome {
            Outcome::Created if self.created.contains(&element) => Outcome::Touched,
            Outcome::Created => {
                self.pending.push(element);
                Outcome::Created
            }
            Outcome::Touched => Outcome::Touched,
        }
    }
}

impl UnitOfWork for RehearsedUnit<'_> {
    fn merge_node(
        &mut self,
        upsert: &NodeUpsert,
        policy: MatchPolicy,
        at: DateTime<Utc>,
    ) -> StorageResult<(NodeRef, Outcome)> {
        let (node, outcome) = self.inner.merge_node(upsert, policy, at)?;
        let outcome = self.settle(Element::node(&node), outcome);
        Ok((node, outcome))
    }

    fn merge_edge(
        &mut self,
        edge_type: EdgeType,
        source: &NodeRef,
        target: &NodeRef,
        evidence: &Properties,
        at: DateTime<Utc>,
    ) -> StorageResult<(EdgeRef, Outcome)> {
        let (edge, outcome) = self.inner.merge_edge(edge_type, source, target, evidence, at)?;
        let outcome = self.settle(Element::edge(edge_type, source, target), outcome);
        Ok((edge, outcome))
    }
}

impl GraphStore for RehearsalStore {
    fn ping(&self) -> StorageResult<()> {
        self.inner.ping()
    }

    fn write_unit(&self, work: &mut WorkFn<'_>) -> StorageResult<()> {
        // Held across the unit so concurrent batches agree on who created what
        let mut created = self.created.lock().map_err(|_| StorageError::LockPoisoned)?;
        let mut pending = Vec::new();
        self.inner.rehearse_unit(&mut |unit: &mut dyn UnitOfWork| {
            let mut rehearsed = RehearsedUnit {
                inner: unit,
                created: &*created,
                pending: &mut pending,
            };
            work(&mut rehearsed)
        })?;
        created.extend(pending);
        Ok(())
    }

    fn rehearse_unit(&self, work: &mut WorkFn<'_>) -> StorageResult<()> {
        self.write_unit(work)
    }

    fn load_node(&self, label: NodeLabel, key: &IdentityKey) -> StorageResult<Option<StoredNode>> {
        self.inner.load_node(label, key)
    }

    fn find_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<StoredNode>> {
        self.inner.find_nodes(filter)
    }

    fn find_edges(&self, filter: &EdgeFilter) -> StorageResult<Vec<StoredEdge>> {
        self.inner.find_edges(filter)
    }

    fn stats(&self) -> StorageResult<GraphStats> {
        self.inner.stats()
    }

    fn dangling_edge_count(&self) -> StorageResult<u64> {
        self.inner.dangling_edge_count()
    }
}
