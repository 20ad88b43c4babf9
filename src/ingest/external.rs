//! External item adapter
//!
//! News items, explainers, newsletter issues and library records are keyed by
//! canonical source URL. Each item MENTIONS the biomedical entities grounded
//! in it and LINKS_TO the papers, datasets and grants it references. Referenced
//! targets that do not exist yet are created as bare placeholders carrying
//! only their identity, to be filled in when their own source is loaded.

use super::adapter::{RecordAdapter, RecordContext};
use super::plan::RecordPlan;
use crate::graph::{put, EdgeType, NodeLabel, NodeUpsert, Properties};
use crate::identity::{self, IdentityError, RawIdentity, CUSTOM_SOURCE};
use crate::record::{ExternalItemRecord, GroundedEntity, NormalizedItem};
use tracing::warn;

/// Longest body text stored on an item node, in characters
pub const BODY_TEXT_LIMIT: usize = 5000;

#[derive(Debug, Clone, Default)]
pub struct ExternalItemAdapter;

impl ExternalItemAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Resolve the item's label along with the type name it is recorded under.
fn item_label(item: &NormalizedItem) -> Result<(NodeLabel, String), IdentityError> {
    match item.item_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok((NodeLabel::NewsItem, "news".to_string())),
        Some(t) => NodeLabel::from_item_type(t)
            .map(|label| (label, t.to_ascii_lowercase()))
            .ok_or_else(|| IdentityError::Unrecognized {
                field: "item type",
                value: t.to_string(),
            }),
    }
}

fn reference_label(category: &str) -> Option<NodeLabel> {
    match category {
        "pmcid" => Some(NodeLabel::Paper),
        "osdr_id" => Some(NodeLabel::Dataset),
        "taskbook_id" => Some(NodeLabel::Grant),
        _ => None,
    }
}

fn item_fields(item: &NormalizedItem, source_type: String) -> Properties {
    let mut props = Properties::new();
    put(&mut props, "title", item.title.clone());
    put(&mut props, "summary", item.summary.clone());
    put(&mut props, "published_at", item.published_at.clone());
    put(&mut props, "authors", item.authors.clone());
    put(&mut props, "tags", item.tags.clone());
    put(
        &mut props,
        "body_text",
        item.body_text
            .as_ref()
            .map(|body| body.chars().take(BODY_TEXT_LIMIT).collect::<String>()),
    );
    put(&mut props, "source_type", Some(source_type));
    props
}

fn entity_upsert(entity: &GroundedEntity) -> Result<NodeUpsert, IdentityError> {
    let entity_type = entity.entity_type.as_deref().unwrap_or_default();
    let label = NodeLabel::from_entity_type(entity_type).ok_or_else(|| IdentityError::Unrecognized {
        field: "entity type",
        value: entity_type.to_string(),
    })?;

    let id = entity.id.as_deref();
    let key = identity::resolve(
        label,
        &RawIdentity {
            ontology_id: id,
            ontology_source: entity.source.as_deref(),
            local_id: id,
        },
    )?;

    let mut fields = Properties::new();
    put(&mut fields, "label", entity.label.clone());
    let source = match id {
        Some(id) if !identity::is_custom(entity.source.as_deref(), id) => entity.source.clone(),
        _ => Some(CUSTOM_SOURCE.to_string()),
    };
    put(&mut fields, "source", source);
    Ok(NodeUpsert::new(label, key).with_properties(fields))
}

impl RecordAdapter for ExternalItemAdapter {
    type Record = ExternalItemRecord;

    fn id(&self) -> &str {
        "external"
    }

    fn default_batch_size(&self) -> usize {
        50
    }

    fn record_key(&self, record: &ExternalItemRecord, line: usize) -> String {
        record
            .normalized_item
            .as_ref()
            .and_then(|item| item.source_url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("line {}", line))
    }

    fn plan(&self, record: &ExternalItemRecord, ctx: &RecordContext<'_>) -> Result<RecordPlan, IdentityError> {
        let item = record
            .normalized_item
            .as_ref()
            .ok_or(IdentityError::MissingKey { label: NodeLabel::NewsItem })?;
        let (label, source_type) = item_label(item)?;
        let url = item
            .source_url
            .as_deref()
            .ok_or(IdentityError::MissingKey { label })?;
        let key = identity::resolve_source_url(url)?;

        let mut plan = RecordPlan::new();
        let mut fields = item_fields(item, source_type);
        put(&mut fields, "source_url", Some(key.value().to_string()));
        let item_slot = plan.node(NodeUpsert::new(label, key).with_properties(fields));

        for entity in record.grounded_entities.iter().flatten() {
            match entity_upsert(entity) {
                Ok(upsert) => {
                    let slot = plan.node(upsert);
                    let mut evidence = Properties::new();
                    put(&mut evidence, "source_type", Some("external"));
                    put(&mut evidence, "extraction_confidence", entity.confidence);
                    plan.edge(EdgeType::Mentions, item_slot, slot, evidence);
                }
                Err(err) => {
                    warn!(line = ctx.line, error = %err, "skipping grounded entity");
                    plan.skip(err);
                }
            }
        }

        for (category, ids) in record.referenced_ids.iter().flatten() {
            let Some(target_label) = reference_label(category) else {
                let err = IdentityError::Unrecognized {
                    field: "reference category",
                    value: category.clone(),
                };
                warn!(line = ctx.line, error = %err, "skipping references");
                plan.skip(err);
                continue;
            };
            for id in ids {
                match identity::resolve(target_label, &RawIdentity::local(Some(id))) {
                    Ok(target_key) => {
                        let slot = plan.node(NodeUpsert::new(target_label, target_key));
                        plan.edge(EdgeType::LinksTo, item_slot, slot, Properties::new());
                    }
                    Err(err) => {
                        warn!(line = ctx.line, error = %err, "skipping reference");
                        plan.skip(err);
                    }
                }
            }
        }

        Ok(plan)
    }
}
