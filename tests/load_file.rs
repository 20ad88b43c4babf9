//! End-to-end loads from files on disk into a file-backed store.

use biokg::graph::NodeLabel;
use biokg::{
    BatchCoordinator, ExternalItemAdapter, FindingAdapter, GraphStore, IngestError, LoaderConfig,
    OpenStore, SqliteStore, StorageError,
};
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write_lines(dir: &Path, name: &str, lines: &[Value]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    path
}

fn findings(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "uuid": format!("finding-{}", i),
                "pmcid": format!("PMC{}", i % 5),
                "direction": "increase",
                "paper": { "title": format!("Paper {}", i % 5), "year": 2020 },
                "phenotype": { "ontology_term": { "id": format!("HP:{:07}", i % 7), "label": "phenotype", "source": "HP" } },
                "organism": { "ontology_term": { "id": "NCBITaxon:10090", "label": "Mus musculus" }, "strain": "C57BL/6J" }
            })
        })
        .collect()
}

fn open(dir: &Path) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open(dir.join("graph").join("biokg.db")).unwrap())
}

#[test]
fn file_load_is_idempotent_across_store_reopen() {
    let dir = TempDir::new().unwrap();
    let input = write_lines(dir.path(), "findings.jsonl", &findings(20));

    let first = {
        let store = open(dir.path());
        BatchCoordinator::new(store, FindingAdapter::new(), LoaderConfig::new().with_batch_size(6))
            .unwrap()
            .load_file(&input)
            .unwrap()
    };
    assert_eq!(first.total_loaded, 20);
    assert_eq!(first.created(NodeLabel::Paper), 5);
    assert_eq!(first.created(NodeLabel::Phenotype), 7);
    assert_eq!(first.created(NodeLabel::Organism), 1);

    let store = open(dir.path());
    let before = store.stats().unwrap();
    let second = BatchCoordinator::new(store.clone(), FindingAdapter::new(), LoaderConfig::new())
        .unwrap()
        .load_file(&input)
        .unwrap();

    assert_eq!(store.stats().unwrap(), before);
    assert_eq!(second.total_nodes_created(), 0);
    assert_eq!(second.total_edges_created(), 0);
    assert_eq!(store.dangling_edge_count().unwrap(), 0);
}

#[test]
fn missing_input_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let coordinator =
        BatchCoordinator::new(open(dir.path()), FindingAdapter::new(), LoaderConfig::new()).unwrap();

    let err = coordinator.load_file(&dir.path().join("absent.jsonl")).unwrap_err();
    assert!(matches!(err, IngestError::InputNotFound(path) if path.ends_with("absent.jsonl")));
}

#[test]
fn store_under_a_regular_file_cannot_open() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();

    let result = SqliteStore::open(blocker.join("biokg.db"));
    assert!(matches!(result, Err(StorageError::Io(_)) | Err(StorageError::Database(_))));
}

#[test]
fn metrics_log_gets_one_line_per_run() {
    let dir = TempDir::new().unwrap();
    let input = write_lines(
        dir.path(),
        "items.jsonl",
        &[
            json!({ "normalized_item": { "type": "news", "source_url": "https://example.org/a" },
                    "referenced_ids": { "pmcid": ["PMC1"] } }),
            json!({ "normalized_item": { "type": "news" } }),
        ],
    );
    let log = dir.path().join("logs").join("metrics.jsonl");
    let store = open(dir.path());

    for _ in 0..2 {
        let metrics = BatchCoordinator::new(store.clone(), ExternalItemAdapter::new(), LoaderConfig::new())
            .unwrap()
            .load_file(&input)
            .unwrap();
        metrics
            .append_to_log(&log, "items.jsonl", &store.stats().unwrap().to_counters())
            .unwrap();
    }

    let text = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["input_file"], "items.jsonl");
    assert_eq!(lines[0]["total_loaded"], 1);
    assert_eq!(lines[0]["identity_errors"], 1);
    assert_eq!(lines[0]["node_created_NewsItem"], 1);
    assert!(lines[1].get("node_created_NewsItem").is_none());
    assert_eq!(lines[1]["node_touched_NewsItem"], 1);
    assert_eq!(lines[1]["node_count_Paper"], 1);
    assert!(lines[1]["failed_records"]["line 2"].is_string());
}

#[tokio::test]
async fn concurrent_load_matches_sequential_counts() {
    let dir = TempDir::new().unwrap();
    let mut lines = findings(40);
    lines.insert(10, json!({ "uuid": "no-paper" }));
    let input = write_lines(dir.path(), "findings.jsonl", &lines);

    let sequential_store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let sequential = BatchCoordinator::new(
        sequential_store.clone(),
        FindingAdapter::new(),
        LoaderConfig::new().with_batch_size(4),
    )
    .unwrap()
    .load_file(&input)
    .unwrap();

    let store = open(dir.path());
    let coordinator = Arc::new(
        BatchCoordinator::new(store.clone(), FindingAdapter::new(), LoaderConfig::new().with_batch_size(4))
            .unwrap(),
    );
    let concurrent = coordinator.load_file_concurrent(input, 4).await.unwrap();

    assert_eq!(concurrent.total_loaded, 40);
    assert_eq!(concurrent.identity_errors, 1);
    assert_eq!(concurrent.records_seen, sequential.records_seen);
    assert_eq!(store.stats().unwrap(), sequential_store.stats().unwrap());
    assert_eq!(store.dangling_edge_count().unwrap(), 0);
}

#[test]
fn dry_run_leaves_the_file_store_empty() {
    let dir = TempDir::new().unwrap();
    let input = write_lines(dir.path(), "findings.jsonl", &findings(8));
    let store = open(dir.path());

    let metrics = BatchCoordinator::new(store.clone(), FindingAdapter::new(), LoaderConfig::new().with_dry_run(true))
        .unwrap()
        .load_file(&input)
        .unwrap();

    assert_eq!(metrics.total_loaded, 8);
    assert_eq!(metrics.created(NodeLabel::Finding), 8);
    assert_eq!(store.stats().unwrap().total_nodes(), 0);
}
