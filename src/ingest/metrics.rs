//! Per-run counters
//!
//! A `RunMetrics` value is owned by whoever is doing the work: each record
//! attempt tallies into its own value, which is merged into the batch's only
//! once the record commits, and each batch's value is merged into the run's.
//! Nothing is shared between workers.

use super::error::{IngestError, RecordError};
use crate::graph::{EdgeType, NodeLabel, Outcome};
use crate::record::ParseError;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    pub nodes_created: BTreeMap<NodeLabel, u64>,
    pub nodes_touched: BTreeMap<NodeLabel, u64>,
    pub edges_created: BTreeMap<EdgeType, u64>,
    pub edges_touched: BTreeMap<EdgeType, u64>,
    /// Records that parsed and were handed to an adapter
    pub records_seen: u64,
    /// Records whose unit of work committed
    pub total_loaded: u64,
    pub parse_errors: u64,
    pub identity_errors: u64,
    /// Sub-entities dropped from otherwise loaded records
    pub skipped_entities: u64,
    pub write_errors: u64,
    pub conflict_retries: u64,
    pub cancelled: bool,
    /// Failure message per `<record key> (line N)`, or per `line N` for
    /// records without a key of their own
    pub failed_records: BTreeMap<String, String>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_node(&mut self, label: NodeLabel, outcome: Outcome) {
        let map = match outcome {
            Outcome::Created => &mut self.nodes_created,
            Outcome::Touched => &mut self.nodes_touched,
        };
        *map.entry(label).or_insert(0) += 1;
    }

    pub fn record_edge(&mut self, edge_type: EdgeType, outcome: Outcome) {
        let map = match outcome {
            Outcome::Created => &mut self.edges_created,
            Outcome::Touched => &mut self.edges_touched,
        };
        *map.entry(edge_type).or_insert(0) += 1;
    }

    pub fn record_parse_error(&mut self, err: &ParseError) {
        self.parse_errors += 1;
        self.failed_records
            .insert(format!("line {}", err.line), err.message.clone());
    }

    /// Count a failed record. The line number is part of the entry's key,
    /// so repeated record keys never hide one another.
    pub fn record_failure(&mut self, record_key: &str, line: usize, err: &RecordError) {
        match err {
            RecordError::Identity(_) => self.identity_errors += 1,
            RecordError::Write { .. } => self.write_errors += 1,
        }
        let line_key = format!("line {}", line);
        let entry = if record_key == line_key {
            line_key
        } else {
            format!("{} ({})", record_key, line_key)
        };
        self.failed_records.insert(entry, err.to_string());
    }

    /// Fold another worker's counters into this one.
    pub fn merge(&mut self, other: RunMetrics) {
        fn add<K: Ord>(into: &mut BTreeMap<K, u64>, from: BTreeMap<K, u64>) {
            for (k, v) in from {
                *into.entry(k).or_insert(0) += v;
            }
        }
        add(&mut self.nodes_created, other.nodes_created);
        add(&mut self.nodes_touched, other.nodes_touched);
        add(&mut self.edges_created, other.edges_created);
        add(&mut self.edges_touched, other.edges_touched);
        self.records_seen += other.records_seen;
        self.total_loaded += other.total_loaded;
        self.parse_errors += other.parse_errors;
        self.identity_errors += other.identity_errors;
        self.skipped_entities += other.skipped_entities;
        self.write_errors += other.write_errors;
        self.conflict_retries += other.conflict_retries;
        self.cancelled |= other.cancelled;
        self.failed_records.extend(other.failed_records);
    }

    /// Nodes of `label` created or matched
    pub fn node_count(&self, label: NodeLabel) -> u64 {
        self.nodes_created.get(&label).copied().unwrap_or(0)
            + self.nodes_touched.get(&label).copied().unwrap_or(0)
    }

    pub fn created(&self, label: NodeLabel) -> u64 {
        self.nodes_created.get(&label).copied().unwrap_or(0)
    }

    pub fn edges_created(&self, edge_type: EdgeType) -> u64 {
        self.edges_created.get(&edge_type).copied().unwrap_or(0)
    }

    pub fn total_nodes_created(&self) -> u64 {
        self.nodes_created.values().sum()
    }

    pub fn total_edges_created(&self) -> u64 {
        self.edges_created.values().sum()
    }

    /// Records that failed outright, for any reason other than parsing
    pub fn errors(&self) -> u64 {
        self.identity_errors + self.write_errors
    }

    /// Flat counter view, as printed and logged
    pub fn counters(&self) -> BTreeMap<String, u64> {
        let mut counters = BTreeMap::new();
        for (label, n) in &self.nodes_created {
            counters.insert(format!("node_created_{}", label), *n);
        }
        for (label, n) in &self.nodes_touched {
            counters.insert(format!("node_touched_{}", label), *n);
        }
        for (edge_type, n) in &self.edges_created {
            counters.insert(format!("rel_created_{}", edge_type), *n);
        }
        for (edge_type, n) in &self.edges_touched {
            counters.insert(format!("rel_touched_{}", edge_type), *n);
        }
        counters.insert("records_seen".into(), self.records_seen);
        counters.insert("total_loaded".into(), self.total_loaded);
        counters.insert("parse_errors".into(), self.parse_errors);
        counters.insert("identity_errors".into(), self.identity_errors);
        counters.insert("skipped_entities".into(), self.skipped_entities);
        counters.insert("write_errors".into(), self.write_errors);
        counters.insert("errors".into(), self.errors());
        counters.insert("conflict_retries".into(), self.conflict_retries);
        counters.insert("cancelled".into(), u64::from(self.cancelled));
        counters
    }

    /// Emit the run summary through `tracing`.
    pub fn log_summary(&self, input: &str) {
        info!(
            input,
            records_seen = self.records_seen,
            total_loaded = self.total_loaded,
            nodes_created = self.total_nodes_created(),
            edges_created = self.total_edges_created(),
            parse_errors = self.parse_errors,
            identity_errors = self.identity_errors,
            write_errors = self.write_errors,
            skipped_entities = self.skipped_entities,
            conflict_retries = self.conflict_retries,
            cancelled = self.cancelled,
            "load finished"
        );
    }

    /// Append one NDJSON line for this run to `path`.
    ///
    /// `extra` carries counters gathered outside the run itself, such as
    /// graph statistics after a live load.
    pub fn append_to_log(
        &self,
        path: &Path,
        input_file: &str,
        extra: &BTreeMap<String, u64>,
    ) -> Result<(), IngestError> {
        let mut line = Map::new();
        for (name, value) in self.counters().into_iter().chain(extra.clone()) {
            line.insert(name, Value::from(value));
        }
        line.insert(
            "timestamp".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        line.insert("input_file".into(), Value::from(input_file));
        if !self.failed_records.is_empty() {
            line.insert("failed_records".into(), serde_json::to_value(&self.failed_records)?);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(&line)?)?;
        Ok(())
    }
}
