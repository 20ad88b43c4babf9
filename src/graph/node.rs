//! Node representation in the knowledge graph

use super::schema::NodeLabel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How an identity key was derived
///
/// The kind is part of a node's identity: an ontology id and a local id
/// with the same text resolve to different nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyKind {
    /// Ontology term identifier, e.g. `UBERON:0002107`
    Ontology,
    /// Identifier local to the extraction source
    Local,
    /// Paper identifier (PMCID)
    PaperId,
    /// Finding UUID
    FindingId,
    /// Canonical source URL of an external item
    SourceUrl,
    /// Dataset accession, e.g. `OSD-48`
    DatasetId,
    /// Grant / taskbook identifier
    GrantId,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Ontology => "ontology",
            KeyKind::Local => "local",
            KeyKind::PaperId => "pmcid",
            KeyKind::FindingId => "uuid",
            KeyKind::SourceUrl => "source_url",
            KeyKind::DatasetId => "osdr_id",
            KeyKind::GrantId => "taskbook_id",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ontology" => Ok(KeyKind::Ontology),
            "local" => Ok(KeyKind::Local),
            "pmcid" => Ok(KeyKind::PaperId),
            "uuid" => Ok(KeyKind::FindingId),
            "source_url" => Ok(KeyKind::SourceUrl),
            "osdr_id" => Ok(KeyKind::DatasetId),
            "taskbook_id" => Ok(KeyKind::GrantId),
            other => Err(format!("unknown key kind: {}", other)),
        }
    }
}

/// The single field combination that defines a node's identity within its label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    kind: KeyKind,
    value: String,
}

impl IdentityKey {
    pub fn new(kind: KeyKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

/// Typed property values
///
/// Absent values are never stored; callers skip them with [`put`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<PropertyValue>),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::Array(values.into_iter().map(PropertyValue::String).collect())
    }
}

/// Properties collection
pub type Properties = BTreeMap<String, PropertyValue>;

/// Insert `value` under `key` if it is present.
pub fn put<V: Into<PropertyValue>>(props: &mut Properties, key: &str, value: Option<V>) {
    if let Some(value) = value {
        props.insert(key.to_string(), value.into());
    }
}

/// What happens to a node's descriptive fields when it is matched again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Fields are written on creation only; later sources never overwrite them
    #[default]
    KeepCreationFields,
    /// Fields missing from the stored node are filled from the later source;
    /// fields already set are left alone
    FillMissing,
}

/// Whether an upsert created a new element or matched an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Created,
    Touched,
}

/// Request to create-or-match one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpsert {
    pub label: NodeLabel,
    pub key: IdentityKey,
    /// Descriptive fields, set on creation only
    pub on_create: Properties,
}

impl NodeUpsert {
    pub fn new(label: NodeLabel, key: IdentityKey) -> Self {
        Self {
            label,
            key,
            on_create: Properties::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.on_create = properties;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.on_create.insert(key.into(), value.into());
        self
    }
}

/// Handle to a node that exists in the store
///
/// Only the store hands these out, so holding one means the node was upserted
/// (or loaded) in the current unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    id: i64,
    label: NodeLabel,
    key: IdentityKey,
}

impl NodeRef {
    pub(crate) fn new(id: i64, label: NodeLabel, key: IdentityKey) -> Self {
        Self { id, label, key }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn label(&self) -> NodeLabel {
        self.label
    }

    pub fn key(&self) -> &IdentityKey {
        &self.key
    }
}

/// A node as persisted, with its bookkeeping fields
#[derive(Debug, Clone, Serialize)]
pub struct StoredNode {
    pub id: i64,
    pub label: NodeLabel,
    pub key: IdentityKey,
    pub properties: Properties,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Number of source records that have referenced this node
    pub occurrence_count: u64,
}

impl StoredNode {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }
}
