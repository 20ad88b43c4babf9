//! Normalized external content items (news, explainers, newsletters, library records)

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalItemRecord {
    pub normalized_item: Option<NormalizedItem>,
    pub grounded_entities: Option<Vec<GroundedEntity>>,
    /// Category (`pmcid`, `osdr_id`, `taskbook_id`) to referenced identifiers
    pub referenced_ids: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormalizedItem {
    /// `news`, `explainer`, `newsletter` or `library_record`; absent means news
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub source_url: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<String>,
    pub authors: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub body_text: Option<String>,
}

/// An entity the extraction step found in the item and grounded
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundedEntity {
    pub entity_type: Option<String>,
    pub id: Option<String>,
    pub label: Option<String>,
    #[serde(alias = "source_obo")]
    pub source: Option<String>,
    pub confidence: Option<f64>,
}
