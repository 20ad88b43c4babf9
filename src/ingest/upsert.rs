//! Node and relationship upserts inside one unit of work
//!
//! `GraphWriter` is the only path records take into the store. It checks
//! relationship endpoints against the schema, delegates the merge to the
//! store's unit of work, and tallies what was created and what was matched.

use super::metrics::RunMetrics;
use crate::graph::{EdgeRef, EdgeType, MatchPolicy, NodeRef, NodeUpsert, Properties};
use crate::storage::{StorageResult, UnitOfWork};
use chrono::{DateTime, Utc};
use tracing::debug;

pub struct GraphWriter<'u, 'm> {
    unit: &'u mut dyn UnitOfWork,
    metrics: &'m mut RunMetrics,
    policy: MatchPolicy,
    at: DateTime<Utc>,
}

impl<'u, 'm> GraphWriter<'u, 'm> {
    /// `at` stamps every element touched through this writer, so a record's
    /// nodes and edges share one timestamp.
    pub fn new(
        unit: &'u mut dyn UnitOfWork,
        metrics: &'m mut RunMetrics,
        policy: MatchPolicy,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            unit,
            metrics,
            policy,
            at,
        }
    }

    /// Create-or-match a node by its identity key.
    pub fn upsert_node(&mut self, upsert: &NodeUpsert) -> StorageResult<NodeRef> {
        let (node, outcome) = self.unit.merge_node(upsert, self.policy, self.at)?;
        debug!(label = %node.label(), key = %node.key(), ?outcome, "node upserted");
        self.metrics.record_node(node.label(), outcome);
        Ok(node)
    }

    /// Create-or-match the single relationship of `edge_type` between two
    /// nodes already upserted in this unit.
    pub fn upsert_edge(
        &mut self,
        edge_type: EdgeType,
        source: &NodeRef,
        target: &NodeRef,
        evidence: &Properties,
    ) -> StorageResult<EdgeRef> {
        edge_type.check(source.label(), target.label())?;
        let (edge, outcome) = self
            .unit
            .merge_edge(edge_type, source, target, evidence, self.at)?;
        debug!(%edge_type, source = source.id(), target = target.id(), ?outcome, "edge upserted");
        self.metrics.record_edge(edge_type, outcome);
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{IdentityKey, KeyKind, NodeLabel, SchemaError};
    use crate::storage::{GraphStore, OpenStore, SqliteStore, StorageError};

    fn paper() -> NodeUpsert {
        NodeUpsert::new(NodeLabel::Paper, IdentityKey::new(KeyKind::PaperId, "PMC7"))
    }

    fn finding() -> NodeUpsert {
        NodeUpsert::new(NodeLabel::Finding, IdentityKey::new(KeyKind::FindingId, "f-7"))
    }

    #[test]
    fn writer_tallies_created_then_touched() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut metrics = RunMetrics::new();

        for _ in 0..2 {
            store
                .write_unit(&mut |unit: &mut dyn UnitOfWork| {
                    let mut writer =
                        GraphWriter::new(unit, &mut metrics, MatchPolicy::default(), Utc::now());
                    let p = writer.upsert_node(&paper())?;
                    let f = writer.upsert_node(&finding())?;
                    writer.upsert_edge(EdgeType::Reports, &p, &f, &Properties::new())?;
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(metrics.created(NodeLabel::Paper), 1);
        assert_eq!(metrics.node_count(NodeLabel::Paper), 2);
        assert_eq!(metrics.edges_created(EdgeType::Reports), 1);
        assert_eq!(metrics.edges_touched.get(&EdgeType::Reports), Some(&1));
    }

    #[test]
    fn edge_with_wrong_endpoints_is_rejected_before_writing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut metrics = RunMetrics::new();

        let result = store.write_unit(&mut |unit: &mut dyn UnitOfWork| {
            let mut writer =
                GraphWriter::new(unit, &mut metrics, MatchPolicy::default(), Utc::now());
            let p = writer.upsert_node(&paper())?;
            let f = writer.upsert_node(&finding())?;
            writer.upsert_edge(EdgeType::Reports, &f, &p, &Properties::new())?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(StorageError::Schema(SchemaError::InvalidEndpoints { .. }))
        ));
        // The whole unit rolled back
        assert_eq!(store.stats().unwrap().total_nodes(), 0);
        assert_eq!(store.stats().unwrap().total_edges(), 0);
    }
}
