//! Closed vocabulary of node labels and relationship types
//!
//! Every label and relationship type that can reach the store is one of these
//! variants. Free-form strings from input records are mapped here, at the
//! boundary, and anything unrecognized is rejected before a statement is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when input names do not fit the graph schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown node label: {0}")]
    UnknownLabel(String),

    #[error("unknown relationship type: {0}")]
    UnknownEdgeType(String),

    #[error("{edge_type} cannot connect {from} to {to}")]
    InvalidEndpoints {
        edge_type: EdgeType,
        from: NodeLabel,
        to: NodeLabel,
    },
}

/// Node labels of the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLabel {
    Paper,
    Finding,
    // Ontology-backed biomedical entities
    Organism,
    Tissue,
    CellType,
    Phenotype,
    Chemical,
    Pathway,
    // Biomedical entities keyed by source-local identifiers
    Exposure,
    Platform,
    Mission,
    Assay,
    Duration,
    // External content, keyed by source URL
    NewsItem,
    Explainer,
    NewsletterIssue,
    LibraryRecord,
    // LINKS_TO placeholders
    Dataset,
    Grant,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 19] = [
        NodeLabel::Paper,
        NodeLabel::Finding,
        NodeLabel::Organism,
        NodeLabel::Tissue,
        NodeLabel::CellType,
        NodeLabel::Phenotype,
        NodeLabel::Chemical,
        NodeLabel::Pathway,
        NodeLabel::Exposure,
        NodeLabel::Platform,
        NodeLabel::Mission,
        NodeLabel::Assay,
        NodeLabel::Duration,
        NodeLabel::NewsItem,
        NodeLabel::Explainer,
        NodeLabel::NewsletterIssue,
        NodeLabel::LibraryRecord,
        NodeLabel::Dataset,
        NodeLabel::Grant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Paper => "Paper",
            NodeLabel::Finding => "Finding",
            NodeLabel::Organism => "Organism",
            NodeLabel::Tissue => "Tissue",
            NodeLabel::CellType => "CellType",
            NodeLabel::Phenotype => "Phenotype",
            NodeLabel::Chemical => "Chemical",
            NodeLabel::Pathway => "Pathway",
            NodeLabel::Exposure => "Exposure",
            NodeLabel::Platform => "Platform",
            NodeLabel::Mission => "Mission",
            NodeLabel::Assay => "Assay",
            NodeLabel::Duration => "Duration",
            NodeLabel::NewsItem => "NewsItem",
            NodeLabel::Explainer => "Explainer",
            NodeLabel::NewsletterIssue => "NewsletterIssue",
            NodeLabel::LibraryRecord => "LibraryRecord",
            NodeLabel::Dataset => "Dataset",
            NodeLabel::Grant => "Grant",
        }
    }

    /// Entities that may be grounded to a shared ontology term
    pub fn is_ontology_backed(&self) -> bool {
        matches!(
            self,
            NodeLabel::Organism
                | NodeLabel::Tissue
                | NodeLabel::CellType
                | NodeLabel::Phenotype
                | NodeLabel::Chemical
                | NodeLabel::Pathway
        )
    }

    /// Any biomedical entity an external item can mention
    pub fn is_biomedical(&self) -> bool {
        self.is_ontology_backed()
            || matches!(
                self,
                NodeLabel::Exposure
                    | NodeLabel::Platform
                    | NodeLabel::Mission
                    | NodeLabel::Assay
                    | NodeLabel::Duration
            )
    }

    pub fn is_external_item(&self) -> bool {
        matches!(
            self,
            NodeLabel::NewsItem
                | NodeLabel::Explainer
                | NodeLabel::NewsletterIssue
                | NodeLabel::LibraryRecord
        )
    }

    /// Map a grounded entity's `entity_type` (e.g. "cell_type") to a label.
    pub fn from_entity_type(entity_type: &str) -> Option<Self> {
        let label = match entity_type.trim().to_ascii_lowercase().as_str() {
            "organism" => NodeLabel::Organism,
            "tissue" => NodeLabel::Tissue,
            "cell_type" => NodeLabel::CellType,
            "phenotype" => NodeLabel::Phenotype,
            "chemical" => NodeLabel::Chemical,
            "pathway" => NodeLabel::Pathway,
            "exposure" => NodeLabel::Exposure,
            "platform" => NodeLabel::Platform,
            "mission" => NodeLabel::Mission,
            "assay" => NodeLabel::Assay,
            "duration" => NodeLabel::Duration,
            _ => return None,
        };
        Some(label)
    }

    /// Map an external item's `type` (e.g. "newsletter") to a label.
    pub fn from_item_type(item_type: &str) -> Option<Self> {
        let label = match item_type.trim().to_ascii_lowercase().as_str() {
            "news" => NodeLabel::NewsItem,
            "explainer" => NodeLabel::Explainer,
            "newsletter" => NodeLabel::NewsletterIssue,
            "library_record" => NodeLabel::LibraryRecord,
            _ => return None,
        };
        Some(label)
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeLabel {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownLabel(s.to_string()))
    }
}

/// Relationship types of the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeType {
    /// Paper → Finding
    Reports,
    /// Finding → Phenotype, carries direction/magnitude/p-value
    Affects,
    /// Finding → Tissue | CellType
    ObservedIn,
    /// Finding → Organism
    InOrganism,
    /// External item → biomedical entity, carries extraction confidence
    Mentions,
    /// External item → Paper | Dataset | Grant
    LinksTo,
}

impl EdgeType {
    pub const ALL: [EdgeType; 6] = [
        EdgeType::Reports,
        EdgeType::Affects,
        EdgeType::ObservedIn,
        EdgeType::InOrganism,
        EdgeType::Mentions,
        EdgeType::LinksTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Reports => "REPORTS",
            EdgeType::Affects => "AFFECTS",
            EdgeType::ObservedIn => "OBSERVED_IN",
            EdgeType::InOrganism => "IN_ORGANISM",
            EdgeType::Mentions => "MENTIONS",
            EdgeType::LinksTo => "LINKS_TO",
        }
    }

    /// Whether this relationship type may connect `source` to `target`.
    pub fn allows(&self, source: NodeLabel, target: NodeLabel) -> bool {
        match self {
            EdgeType::Reports => source == NodeLabel::Paper && target == NodeLabel::Finding,
            EdgeType::Affects => source == NodeLabel::Finding && target == NodeLabel::Phenotype,
            EdgeType::ObservedIn => {
                source == NodeLabel::Finding
                    && matches!(target, NodeLabel::Tissue | NodeLabel::CellType)
            }
            EdgeType::InOrganism => {
                source == NodeLabel::Finding && target == NodeLabel::Organism
            }
            EdgeType::Mentions => source.is_external_item() && target.is_biomedical(),
            EdgeType::LinksTo => {
                source.is_external_item()
                    && matches!(
                        target,
                        NodeLabel::Paper | NodeLabel::Dataset | NodeLabel::Grant
                    )
            }
        }
    }

    /// Fail with [`SchemaError::InvalidEndpoints`] unless `allows` holds.
    pub fn check(&self, source: NodeLabel, target: NodeLabel) -> Result<(), SchemaError> {
        if self.allows(source, target) {
            Ok(())
        } else {
            Err(SchemaError::InvalidEndpoints {
                edge_type: *self,
                from: source,
                to: target,
            })
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeType::ALL
            .into_iter()
            .find(|edge_type| edge_type.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownEdgeType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_their_names() {
        for label in NodeLabel::ALL {
            assert_eq!(label.as_str().parse::<NodeLabel>().unwrap(), label);
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "Paper) DETACH DELETE n //".parse::<NodeLabel>().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownLabel(_)));
    }

    #[test]
    fn entity_types_map_to_biomedical_labels() {
        assert_eq!(NodeLabel::from_entity_type("cell_type"), Some(NodeLabel::CellType));
        assert_eq!(NodeLabel::from_entity_type(" Mission "), Some(NodeLabel::Mission));
        assert_eq!(NodeLabel::from_entity_type("gene"), None);
        assert!(NodeLabel::Phenotype.is_ontology_backed());
        assert!(!NodeLabel::Exposure.is_ontology_backed());
        assert!(NodeLabel::Exposure.is_biomedical());
        assert!(!NodeLabel::Paper.is_biomedical());
    }

    #[test]
    fn item_types_map_to_external_labels() {
        assert_eq!(NodeLabel::from_item_type("newsletter"), Some(NodeLabel::NewsletterIssue));
        assert_eq!(NodeLabel::from_item_type("library_record"), Some(NodeLabel::LibraryRecord));
        assert_eq!(NodeLabel::from_item_type("podcast"), None);
    }

    #[test]
    fn edge_signatures_are_enforced() {
        assert!(EdgeType::Reports.allows(NodeLabel::Paper, NodeLabel::Finding));
        assert!(!EdgeType::Reports.allows(NodeLabel::Finding, NodeLabel::Paper));
        assert!(EdgeType::ObservedIn.allows(NodeLabel::Finding, NodeLabel::CellType));
        assert!(!EdgeType::ObservedIn.allows(NodeLabel::Finding, NodeLabel::Organism));
        assert!(EdgeType::Mentions.allows(NodeLabel::Explainer, NodeLabel::Mission));
        assert!(!EdgeType::Mentions.allows(NodeLabel::Explainer, NodeLabel::Paper));
        assert!(EdgeType::LinksTo.allows(NodeLabel::NewsItem, NodeLabel::Grant));

        let err = EdgeType::Affects
            .check(NodeLabel::Finding, NodeLabel::Tissue)
            .unwrap_err();
        assert_eq!(err.to_string(), "AFFECTS cannot connect Finding to Tissue");
    }

    #[test]
    fn endpoint_violation_names_both_labels_without_a_cause() {
        let err = EdgeType::LinksTo
            .check(NodeLabel::NewsItem, NodeLabel::Phenotype)
            .unwrap_err();
        match &err {
            SchemaError::InvalidEndpoints { edge_type, from, to } => {
                assert_eq!(*edge_type, EdgeType::LinksTo);
                assert_eq!(*from, NodeLabel::NewsItem);
                assert_eq!(*to, NodeLabel::Phenotype);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn edge_types_parse_from_wire_names() {
        assert_eq!("OBSERVED_IN".parse::<EdgeType>().unwrap(), EdgeType::ObservedIn);
        assert!("observed_in".parse::<EdgeType>().is_err());
    }
}
