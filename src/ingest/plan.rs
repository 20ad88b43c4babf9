//! Record plans
//!
//! An adapter turns one input record into a `RecordPlan`: the nodes it
//! upserts and the relationships between them, with every identity already
//! resolved. Planning happens before the unit of work opens, so a record that
//! cannot be keyed never touches the store, and a retried unit replays the
//! exact same writes.

use super::upsert::GraphWriter;
use crate::graph::{EdgeType, NodeUpsert, Properties};
use crate::identity::IdentityError;
use crate::storage::StorageResult;

/// Position of a node within its plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSlot(usize);

#[derive(Debug, Clone)]
struct PlannedEdge {
    edge_type: EdgeType,
    source: NodeSlot,
    target: NodeSlot,
    evidence: Properties,
}

#[derive(Debug, Clone, Default)]
pub struct RecordPlan {
    nodes: Vec<NodeUpsert>,
    edges: Vec<PlannedEdge>,
    skipped: Vec<IdentityError>,
}

impl RecordPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or return the slot of the same (label, key) already added.
    ///
    /// A record counts once toward a node's occurrences however many times it
    /// mentions it.
    pub fn node(&mut self, upsert: NodeUpsert) -> NodeSlot {
        if let Some(i) = self
            .nodes
            .iter()
            .position(|n| n.label == upsert.label && n.key == upsert.key)
        {
            return NodeSlot(i);
        }
        self.nodes.push(upsert);
        NodeSlot(self.nodes.len() - 1)
    }

    /// Add a relationship between two slots of this plan.
    pub fn edge(&mut self, edge_type: EdgeType, source: NodeSlot, target: NodeSlot, evidence: Properties) {
        if self
            .edges
            .iter()
            .any(|e| e.edge_type == edge_type && e.source == source && e.target == target)
        {
            return;
        }
        self.edges.push(PlannedEdge {
            edge_type,
            source,
            target,
            evidence,
        });
    }

    /// Note a sub-entity that was dropped because it could not be keyed.
    pub fn skip(&mut self, err: IdentityError) {
        self.skipped.push(err);
    }

    pub fn nodes(&self) -> &[NodeUpsert] {
        &self.nodes
    }

    pub fn node_at(&self, slot: NodeSlot) -> &NodeUpsert {
        &self.nodes[slot.0]
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges_of(&self, edge_type: EdgeType) -> impl Iterator<Item = (&NodeUpsert, &NodeUpsert, &Properties)> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.edge_type == edge_type)
            .map(move |e| (&self.nodes[e.source.0], &self.nodes[e.target.0], &e.evidence))
    }

    pub fn skipped(&self) -> &[IdentityError] {
        &self.skipped
    }

    /// Write the plan: all nodes first, then the relationships between them.
    pub fn apply(&self, writer: &mut GraphWriter<'_, '_>) -> StorageResult<()> {
        let refs = self
            .nodes
            .iter()
            .map(|node| writer.upsert_node(node))
            .collect::<StorageResult<Vec<_>>>()?;

        for edge in &self.edges {
            writer.upsert_edge(
                edge.edge_type,
                &refs[edge.source.0],
                &refs[edge.target.0],
                &edge.evidence,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{IdentityKey, KeyKind, NodeLabel, PropertyValue};

    fn tissue(id: &str) -> NodeUpsert {
        NodeUpsert::new(NodeLabel::Tissue, IdentityKey::new(KeyKind::Ontology, id))
    }

    #[test]
    fn repeated_nodes_share_a_slot() {
        let mut plan = RecordPlan::new();
        let a = plan.node(tissue("UBERON:1").with_property("label", "liver"));
        let b = plan.node(tissue("UBERON:1").with_property("label", "Liver"));
        let c = plan.node(tissue("UBERON:2"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(plan.nodes().len(), 2);
        assert_eq!(plan.node_at(a).on_create["label"], PropertyValue::from("liver"));
    }

    #[test]
    fn repeated_edges_are_planned_once() {
        let mut plan = RecordPlan::new();
        let item = plan.node(NodeUpsert::new(
            NodeLabel::NewsItem,
            IdentityKey::new(KeyKind::SourceUrl, "https://example.org"),
        ));
        let t = plan.node(tissue("UBERON:1"));
        plan.edge(EdgeType::Mentions, item, t, Properties::new());
        plan.edge(EdgeType::Mentions, item, t, Properties::new());

        assert_eq!(plan.edge_count(), 1);
        assert_eq!(plan.edges_of(EdgeType::Mentions).count(), 1);
    }
}
