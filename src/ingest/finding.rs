//! Finding adapter
//!
//! One finding record yields a Paper, the Finding it reports, and up to four
//! biomedical entities the finding is about:
//!
//! ```text
//! Paper -REPORTS-> Finding -AFFECTS-> Phenotype
//!                          -OBSERVED_IN-> Tissue | CellType
//!                          -IN_ORGANISM-> Organism
//! ```

use super::adapter::{RecordAdapter, RecordContext};
use super::plan::{NodeSlot, RecordPlan};
use crate::graph::{put, EdgeType, NodeLabel, NodeUpsert, Properties};
use crate::identity::{self, FindingIdPolicy, IdentityError, RawIdentity, CUSTOM_SOURCE};
use crate::record::{EntityRef, FindingRecord, PaperMetadata};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct FindingAdapter {
    ids: FindingIdPolicy,
}

impl FindingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_policy(mut self, ids: FindingIdPolicy) -> Self {
        self.ids = ids;
        self
    }
}

impl RecordAdapter for FindingAdapter {
    type Record = FindingRecord;

    fn id(&self) -> &str {
        "findings"
    }

    fn record_key(&self, record: &FindingRecord, line: usize) -> String {
        match record.uuid.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(uuid) => uuid.to_string(),
            None => format!("line {}", line),
        }
    }

    fn plan(&self, record: &FindingRecord, ctx: &RecordContext<'_>) -> Result<RecordPlan, IdentityError> {
        let mut plan = RecordPlan::new();

        let paper_key = identity::resolve(NodeLabel::Paper, &RawIdentity::local(record.pmcid.as_deref()))?;
        let pmcid = paper_key.value().to_string();
        let paper = plan.node(
            NodeUpsert::new(NodeLabel::Paper, paper_key).with_properties(paper_fields(record.paper.as_ref())),
        );

        let finding_key = identity::resolve_finding(record.uuid.as_deref(), self.ids, ctx.raw);
        let finding = plan.node(
            NodeUpsert::new(NodeLabel::Finding, finding_key).with_properties(finding_fields(record, pmcid)),
        );
        plan.edge(EdgeType::Reports, paper, finding, reports_evidence(record));

        if let Some(phenotype) = &record.phenotype {
            if let Some(slot) = entity_node(&mut plan, NodeLabel::Phenotype, phenotype, Properties::new(), ctx) {
                plan.edge(EdgeType::Affects, finding, slot, affects_evidence(record));
            }
        }
        for (label, entity) in [
            (NodeLabel::Tissue, &record.tissue),
            (NodeLabel::CellType, &record.cell_type),
        ] {
            if let Some(entity) = entity {
                if let Some(slot) = entity_node(&mut plan, label, entity, Properties::new(), ctx) {
                    plan.edge(EdgeType::ObservedIn, finding, slot, Properties::new());
                }
            }
        }
        if let Some(organism) = &record.organism {
            let mut extra = Properties::new();
            put(&mut extra, "strain", organism.strain.clone());
            put(&mut extra, "sex", organism.sex.clone());
            if let Some(slot) = entity_node(&mut plan, NodeLabel::Organism, &organism.entity, extra, ctx) {
                plan.edge(EdgeType::InOrganism, finding, slot, Properties::new());
            }
        }

        Ok(plan)
    }
}

/// Plan an entity node, or note it as skipped when it has no usable key.
fn entity_node(
    plan: &mut RecordPlan,
    label: NodeLabel,
    entity: &EntityRef,
    mut fields: Properties,
    ctx: &RecordContext<'_>,
) -> Option<NodeSlot> {
    let term = entity.ontology_term.as_ref();
    let term_id = term.and_then(|t| t.id.as_deref());
    let term_source = term.and_then(|t| t.source.as_deref());
    let raw = RawIdentity {
        ontology_id: term_id,
        ontology_source: term_source,
        // Ungrounded terms are keyed by the extractor's own id
        local_id: entity.local_id.as_deref().or(term_id),
    };

    match identity::resolve(label, &raw) {
        Ok(key) => {
            if let Some(term) = term {
                put(&mut fields, "label", term.label.clone());
                put(&mut fields, "synonyms", term.synonyms.clone());
                let source = match term_id {
                    Some(id) if !identity::is_custom(term_source, id) => term_source.map(str::to_string),
                    _ => Some(CUSTOM_SOURCE.to_string()),
                };
                put(&mut fields, "source", source);
            }
            Some(plan.node(NodeUpsert::new(label, key).with_properties(fields)))
        }
        Err(err) => {
            warn!(line = ctx.line, %label, error = %err, "skipping entity");
            plan.skip(err);
            None
        }
    }
}

fn paper_fields(paper: Option<&PaperMetadata>) -> Properties {
    let mut props = Properties::new();
    if let Some(paper) = paper {
        put(&mut props, "title", paper.title.clone());
        put(&mut props, "doi", paper.doi.clone());
        put(&mut props, "year", paper.year);
        put(&mut props, "journal", paper.journal.clone());
        put(&mut props, "authors", paper.authors.clone());
    }
    props
}

fn finding_fields(record: &FindingRecord, pmcid: String) -> Properties {
    let mut props = Properties::new();
    put(&mut props, "pmcid", Some(pmcid));
    put(&mut props, "direction", record.direction.clone());
    put(&mut props, "p_value", record.p_value.clone());
    put(
        &mut props,
        "evidence_strength",
        record.evidence_strength.as_ref().and_then(|s| s.score),
    );
    put(&mut props, "sample_size", record.sample_size.clone());
    put(&mut props, "timepoint", record.timepoint.clone());
    put(&mut props, "qualifiers", record.qualifiers.clone());
    put(&mut props, "quotes", record.quotes.clone());
    if let Some(magnitude) = &record.magnitude {
        put(&mut props, "magnitude_value", magnitude.value.clone());
        put(&mut props, "magnitude_unit", magnitude.unit.clone());
        put(&mut props, "magnitude_method", magnitude.method.clone());
    }
    if let Some(provenance) = &record.provenance {
        put(&mut props, "provenance_section", provenance.section.clone());
        put(&mut props, "provenance_source_type", provenance.source_type.clone());
    }
    props
}

fn reports_evidence(record: &FindingRecord) -> Properties {
    let mut evidence = Properties::new();
    if let Some(provenance) = &record.provenance {
        put(&mut evidence, "section", provenance.section.clone());
    }
    put(
        &mut evidence,
        "extraction_confidence",
        record.evidence_strength.as_ref().and_then(|s| s.score),
    );
    evidence
}

fn affects_evidence(record: &FindingRecord) -> Properties {
    let mut evidence = Properties::new();
    put(&mut evidence, "direction", record.direction.clone());
    put(
        &mut evidence,
        "magnitude",
        record.magnitude.as_ref().and_then(|m| m.value.clone()),
    );
    put(&mut evidence, "p_value", record.p_value.clone());
    evidence
}
