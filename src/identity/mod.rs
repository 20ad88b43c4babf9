//! Identity resolution
//!
//! Every node is identified by exactly one [`IdentityKey`], derived here from
//! the raw fields of an input record. Resolution is pure: the same raw fields
//! always yield the same key, and two sources that ground an entity to the
//! same ontology term yield the same key regardless of how they spell its
//! display label. Display labels are never used as keys.

use crate::graph::{IdentityKey, KeyKind, NodeLabel};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Marker an extractor uses in place of an ontology prefix for terms it
/// could not ground
pub const CUSTOM_SOURCE: &str = "CUSTOM";

/// Namespace for content-derived finding identifiers
const FINDING_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_4e2a_9c3d_4f5e_8a7b_1c2d_3e4f_5a6b);

/// Why no identity key could be derived
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("{label} has neither an ontology id nor a local id")]
    MissingKey { label: NodeLabel },

    #[error("unrecognized {field}: {value}")]
    Unrecognized { field: &'static str, value: String },

    #[error("invalid source url: {0}")]
    InvalidUrl(String),
}

/// Raw identifying fields for a biomedical entity
#[derive(Debug, Clone, Copy, Default)]
pub struct RawIdentity<'a> {
    pub ontology_id: Option<&'a str>,
    pub ontology_source: Option<&'a str>,
    pub local_id: Option<&'a str>,
}

impl<'a> RawIdentity<'a> {
    pub fn local(id: Option<&'a str>) -> Self {
        Self {
            local_id: id,
            ..Self::default()
        }
    }
}

/// How findings without a usable UUID get one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FindingIdPolicy {
    /// A fresh random UUID per occurrence; re-ingesting such a record
    /// creates another finding
    #[default]
    Random,
    /// A UUID derived from the record's raw line, so re-ingesting the same
    /// line resolves to the same finding
    ContentHash,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// True for terms marked as ungrounded by the extractor
pub fn is_custom(source: Option<&str>, id: &str) -> bool {
    let custom_source = present(source).is_some_and(|s| s.eq_ignore_ascii_case(CUSTOM_SOURCE));
    let custom_prefix = id
        .get(..CUSTOM_SOURCE.len() + 1)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("CUSTOM:"));
    custom_source || custom_prefix
}

/// Resolve the identity key for a node of `label`.
///
/// Ontology-backed labels prefer a grounded ontology id and fall back to the
/// local id. Other biomedical labels are keyed by their local id. Papers,
/// datasets and grants are keyed by their respective accession. Findings and
/// external items have dedicated resolvers.
///
/// A local id is only as good as the source that minted it. Two sources that
/// describe the same entity without a shared ontology id produce two nodes;
/// they are never merged after the fact.
pub fn resolve(label: NodeLabel, raw: &RawIdentity<'_>) -> Result<IdentityKey, IdentityError> {
    let missing = || IdentityError::MissingKey { label };
    match label {
        l if l.is_ontology_backed() => {
            if let Some(id) = present(raw.ontology_id) {
                if !is_custom(raw.ontology_source, id) {
                    return Ok(IdentityKey::new(KeyKind::Ontology, id));
                }
            }
            present(raw.local_id)
                .map(|id| IdentityKey::new(KeyKind::Local, id))
                .ok_or_else(missing)
        }
        l if l.is_biomedical() => present(raw.local_id)
            .or(present(raw.ontology_id))
            .map(|id| IdentityKey::new(KeyKind::Local, id))
            .ok_or_else(missing),
        NodeLabel::Paper => present(raw.local_id)
            .map(|id| IdentityKey::new(KeyKind::PaperId, id.to_ascii_uppercase()))
            .ok_or_else(missing),
        NodeLabel::Dataset => present(raw.local_id)
            .map(|id| IdentityKey::new(KeyKind::DatasetId, id))
            .ok_or_else(missing),
        NodeLabel::Grant => present(raw.local_id)
            .map(|id| IdentityKey::new(KeyKind::GrantId, id))
            .ok_or_else(missing),
        NodeLabel::Finding => present(raw.local_id)
            .map(|id| IdentityKey::new(KeyKind::FindingId, id))
            .ok_or_else(missing),
        _ => present(raw.local_id)
            .map(resolve_source_url)
            .unwrap_or_else(|| Err(missing())),
    }
}

/// Resolve a finding's key from its UUID, generating one per `policy` when
/// the record carries none.
pub fn resolve_finding(uuid: Option<&str>, policy: FindingIdPolicy, raw_line: &str) -> IdentityKey {
    let id = match present(uuid) {
        Some(id) => id.to_string(),
        None => match policy {
            FindingIdPolicy::Random => Uuid::new_v4().to_string(),
            FindingIdPolicy::ContentHash => {
                Uuid::new_v5(&FINDING_NAMESPACE, raw_line.trim().as_bytes()).to_string()
            }
        },
    };
    IdentityKey::new(KeyKind::FindingId, id)
}

/// Canonicalize an external item's source URL into its identity key.
///
/// The URL is parsed per the WHATWG rules, so scheme and host are
/// lowercased, default ports are dropped and dot segments are resolved. The
/// fragment and a trailing slash on the path are dropped; a non-empty query
/// is kept.
pub fn resolve_source_url(raw: &str) -> Result<IdentityKey, IdentityError> {
    let raw = raw.trim();
    let invalid = || IdentityError::InvalidUrl(raw.to_string());

    let url = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;

    let mut canonical = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        canonical.push_str(&format!(":{}", port));
    }
    canonical.push_str(url.path().trim_end_matches('/'));
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        canonical.push('?');
        canonical.push_str(query);
    }
    Ok(IdentityKey::new(KeyKind::SourceUrl, canonical))
}
