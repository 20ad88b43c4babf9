//! Structured findings extracted from papers

use crate::graph::PropertyValue;
use serde::Deserialize;

/// One extracted finding, as emitted by the extraction pipeline
///
/// Measurement fields are kept loosely typed: extractors emit `p_value` as a
/// number or as text like `"<0.05"`, and either is stored as given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindingRecord {
    pub uuid: Option<String>,
    pub pmcid: Option<String>,
    pub direction: Option<String>,
    pub p_value: Option<PropertyValue>,
    pub sample_size: Option<PropertyValue>,
    pub timepoint: Option<PropertyValue>,
    pub qualifiers: Option<Vec<String>>,
    pub quotes: Option<Vec<String>>,
    pub magnitude: Option<Magnitude>,
    pub evidence_strength: Option<EvidenceStrength>,
    pub provenance: Option<Provenance>,
    pub paper: Option<PaperMetadata>,
    pub phenotype: Option<EntityRef>,
    pub tissue: Option<EntityRef>,
    pub cell_type: Option<EntityRef>,
    pub organism: Option<OrganismRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Magnitude {
    pub value: Option<PropertyValue>,
    pub unit: Option<String>,
    /// How the magnitude was measured, e.g. `"qPCR"`
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvidenceStrength {
    /// Extractor confidence in `[0, 1]`
    pub score: Option<f64>,
}

/// Where in the paper the finding was read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Provenance {
    pub section: Option<String>,
    /// Kind of text the section came from, e.g. `"abstract"` or `"full_text"`
    pub source_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperMetadata {
    pub title: Option<String>,
    pub doi: Option<String>,
    pub year: Option<i64>,
    pub journal: Option<String>,
    pub authors: Option<Vec<String>>,
}

/// A grounding to an ontology term
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OntologyTerm {
    pub id: Option<String>,
    pub label: Option<String>,
    /// Ontology prefix, or the custom sentinel for ungrounded terms
    #[serde(alias = "source_obo")]
    pub source: Option<String>,
    pub synonyms: Option<Vec<String>>,
}

/// A biomedical entity referenced by a finding
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityRef {
    pub ontology_term: Option<OntologyTerm>,
    /// Source-local identifier, used when no ontology grounding exists
    #[serde(alias = "id")]
    pub local_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganismRef {
    #[serde(flatten)]
    pub entity: EntityRef,
    pub strain: Option<String>,
    pub sex: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_finding_deserializes() {
        let record: FindingRecord = serde_json::from_value(json!({
            "uuid": "6f1c2d1e-0000-4000-8000-000000000001",
            "pmcid": "PMC3630201",
            "direction": "decrease",
            "p_value": "<0.05",
            "sample_size": 12,
            "magnitude": { "value": 0.35, "unit": "fold", "method": "micro-CT" },
            "evidence_strength": { "score": 0.9 },
            "provenance": { "section": "results", "source_type": "full_text" },
            "paper": { "title": "Bone loss", "year": 2013, "authors": ["A", "B"] },
            "phenotype": { "ontology_term": { "id": "HP:0000938", "label": "Osteopenia", "source_obo": "HP" } },
            "organism": { "ontology_term": { "id": "NCBITaxon:10090", "label": "Mus musculus" }, "strain": "C57BL/6J", "sex": "female" }
        }))
        .unwrap();

        assert_eq!(record.p_value, Some(PropertyValue::String("<0.05".into())));
        assert_eq!(record.sample_size, Some(PropertyValue::Int(12)));
        assert_eq!(record.magnitude.unwrap().method.as_deref(), Some("micro-CT"));
        assert_eq!(record.evidence_strength.unwrap().score, Some(0.9));
        assert_eq!(record.provenance.unwrap().source_type.as_deref(), Some("full_text"));
        let phenotype = record.phenotype.unwrap().ontology_term.unwrap();
        assert_eq!(phenotype.source.as_deref(), Some("HP"));
        let organism = record.organism.unwrap();
        assert_eq!(organism.strain.as_deref(), Some("C57BL/6J"));
        assert_eq!(
            organism.entity.ontology_term.unwrap().id.as_deref(),
            Some("NCBITaxon:10090")
        );
    }

    #[test]
    fn sparse_finding_deserializes() {
        let record: FindingRecord = serde_json::from_value(json!({
            "pmcid": "PMC1",
            "tissue": { "id": "local-tissue-7" },
            "qualifiers": null
        }))
        .unwrap();

        assert!(record.uuid.is_none());
        assert!(record.qualifiers.is_none());
        assert_eq!(record.tissue.unwrap().local_id.as_deref(), Some("local-tissue-7"));
    }
}
