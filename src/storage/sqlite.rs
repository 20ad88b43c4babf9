//! SQLite storage backend

use super::traits::{
    EdgeFilter, GraphStats, GraphStore, NodeFilter, OpenStore, StorageError, StorageResult,
    UnitOfWork, WorkFn,
};
use crate::graph::{
    EdgeRef, EdgeType, Endpoint, IdentityKey, KeyKind, MatchPolicy, NodeLabel, NodeRef,
    NodeUpsert, Outcome, Properties, StoredEdge, StoredNode,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long a writer waits on another connection's lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

const MERGE_NODE: &str = r#"
    INSERT INTO nodes (label, key_kind, key, properties_json, first_seen, last_seen, occurrence_count)
    VALUES (?1, ?2, ?3, ?4, ?5, ?5, 1)
    ON CONFLICT (label, key_kind, key) DO UPDATE SET
        last_seen = MAX(nodes.last_seen, excluded.last_seen),
        occurrence_count = nodes.occurrence_count + 1,
        properties_json = CASE
            WHEN ?6 THEN json_patch(excluded.properties_json, nodes.properties_json)
            ELSE nodes.properties_json
        END
    RETURNING id, occurrence_count
"#;

const INSERT_EDGE: &str = r#"
    INSERT INTO edges (edge_type, source_id, target_id, evidence_json, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (edge_type, source_id, target_id) DO NOTHING
    RETURNING id
"#;

const NODE_COLUMNS: &str =
    "id, label, key_kind, key, properties_json, first_seen, last_seen, occurrence_count";

/// Raw node columns, in `NODE_COLUMNS` order
type NodeRow = (i64, String, String, String, String, String, String, i64);

/// Raw edge columns joined with both endpoints' identities
type EdgeRow = (
    i64,
    String,
    (String, String, String),
    (String, String, String),
    String,
    String,
);

/// SQLite-backed graph store
///
/// One database file with a `nodes` and an `edges` table. Node identity is
/// enforced by a UNIQUE (label, key_kind, key) constraint and relationship
/// uniqueness by UNIQUE (edge_type, source_id, target_id), so concurrent
/// writers converge on one element per identity.
///
/// Thread-safe via internal mutex on the connection. Separate stores opened
/// on the same file coordinate through SQLite's own locking.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                key_kind TEXT NOT NULL,
                key TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                occurrence_count INTEGER NOT NULL DEFAULT 1,
                UNIQUE (label, key_kind, key)
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label);

            CREATE TABLE IF NOT EXISTS edges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                edge_type TEXT NOT NULL,
                source_id INTEGER NOT NULL REFERENCES nodes(id),
                target_id INTEGER NOT NULL REFERENCES nodes(id),
                evidence_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (edge_type, source_id, target_id)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);

            PRAGMA foreign_keys = ON;

            -- Readers keep working while a batch is being written
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn run_unit(conn: &mut Connection, work: &mut WorkFn<'_>, commit: bool) -> StorageResult<()> {
        // IMMEDIATE takes the write lock up front, so contention shows up here
        // rather than halfway through the unit.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        work(&mut SqliteUnit { tx: &tx })?;
        if commit {
            tx.commit()?;
        } else {
            tx.rollback()?;
        }
        Ok(())
    }

    fn read_node_row(row: &Row<'_>) -> rusqlite::Result<NodeRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    /// Deserialize a node from database columns
    fn row_to_node(row: NodeRow) -> StorageResult<StoredNode> {
        let (id, label, key_kind, key, properties_json, first_seen, last_seen, count) = row;
        Ok(StoredNode {
            id,
            label: label.parse()?,
            key: IdentityKey::new(parse_key_kind(&key_kind)?, key),
            properties: serde_json::from_str(&properties_json)?,
            first_seen: parse_time(&first_seen)?,
            last_seen: parse_time(&last_seen)?,
            occurrence_count: u64::try_from(count)
                .map_err(|_| StorageError::CorruptRow(format!("node {} count {}", id, count)))?,
        })
    }

    fn read_edge_row(row: &Row<'_>) -> rusqlite::Result<EdgeRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            (row.get(2)?, row.get(3)?, row.get(4)?),
            (row.get(5)?, row.get(6)?, row.get(7)?),
            row.get(8)?,
            row.get(9)?,
        ))
    }

    /// Deserialize an edge and its endpoint identities
    fn row_to_edge(row: EdgeRow) -> StorageResult<StoredEdge> {
        let (id, edge_type, source, target, evidence_json, created_at) = row;
        Ok(StoredEdge {
            id,
            edge_type: edge_type.parse()?,
            source: to_endpoint(source)?,
            target: to_endpoint(target)?,
            evidence: serde_json::from_str(&evidence_json)?,
            created_at: parse_time(&created_at)?,
        })
    }
}

fn to_endpoint((label, kind, key): (String, String, String)) -> StorageResult<Endpoint> {
    Ok(Endpoint {
        label: label.parse()?,
        key: IdentityKey::new(parse_key_kind(&kind)?, key),
    })
}

fn parse_key_kind(kind: &str) -> StorageResult<KeyKind> {
    kind.parse().map_err(StorageError::CorruptRow)
}

/// Fixed-width so that stored timestamps also order correctly as text
fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(s: &str) -> StorageResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| StorageError::DateParse(e.to_string()))?
        .with_timezone(&Utc))
}

/// Writes issued inside one IMMEDIATE transaction
struct SqliteUnit<'t, 'c> {
    tx: &'t Transaction<'c>,
}

impl UnitOfWork for SqliteUnit<'_, '_> {
    fn merge_node(
        &mut self,
        upsert: &NodeUpsert,
        policy: MatchPolicy,
        at: DateTime<Utc>,
    ) -> StorageResult<(NodeRef, Outcome)> {
        let properties_json = serde_json::to_string(&upsert.on_create)?;
        let (id, count): (i64, i64) = self.tx.prepare_cached(MERGE_NODE)?.query_row(
            params![
                upsert.label.as_str(),
                upsert.key.kind().as_str(),
                upsert.key.value(),
                properties_json,
                format_time(at),
                policy == MatchPolicy::FillMissing,
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let outcome = if count == 1 {
            Outcome::Created
        } else {
            Outcome::Touched
        };
        Ok((NodeRef::new(id, upsert.label, upsert.key.clone()), outcome))
    }

    fn merge_edge(
        &mut self,
        edge_type: EdgeType,
        source: &NodeRef,
        target: &NodeRef,
        evidence: &Properties,
        at: DateTime<Utc>,
    ) -> StorageResult<(EdgeRef, Outcome)> {
        let evidence_json = serde_json::to_string(evidence)?;
        let inserted: Option<i64> = self
            .tx
            .prepare_cached(INSERT_EDGE)?
            .query_row(
                params![
                    edge_type.as_str(),
                    source.id(),
                    target.id(),
                    evidence_json,
                    format_time(at),
                ],
                |row| row.get(0),
            )
            .optional()?;

        let (id, outcome) = match inserted {
            Some(id) => (id, Outcome::Created),
            None => {
                let id = self.tx.query_row(
                    "SELECT id FROM edges WHERE edge_type = ?1 AND source_id = ?2 AND target_id = ?3",
                    params![edge_type.as_str(), source.id(), target.id()],
                    |row| row.get(0),
                )?;
                (id, Outcome::Touched)
            }
        };
        Ok((EdgeRef::new(id, edge_type, source.id(), target.id()), outcome))
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl GraphStore for SqliteStore {
    fn ping(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn write_unit(&self, work: &mut WorkFn<'_>) -> StorageResult<()> {
        let mut conn = self.lock()?;
        Self::run_unit(&mut conn, work, true).map_err(StorageError::classified)
    }

    fn rehearse_unit(&self, work: &mut WorkFn<'_>) -> StorageResult<()> {
        let mut conn = self.lock()?;
        Self::run_unit(&mut conn, work, false).map_err(StorageError::classified)
    }

    fn load_node(&self, label: NodeLabel, key: &IdentityKey) -> StorageResult<Option<StoredNode>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM nodes WHERE label = ?1 AND key_kind = ?2 AND key = ?3",
                    NODE_COLUMNS
                ),
                params![label.as_str(), key.kind().as_str(), key.value()],
                Self::read_node_row,
            )
            .optional()?;

        row.map(Self::row_to_node).transpose()
    }

    fn find_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<StoredNode>> {
        let conn = self.lock()?;

        let mut sql = format!("SELECT {} FROM nodes WHERE 1 = 1", NODE_COLUMNS);
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(label) = filter.label {
            sql.push_str(" AND label = ?");
            params_vec.push(Box::new(label.as_str()));
        }

        if let Some(ref property) = filter.missing_property {
            sql.push_str(" AND json_extract(properties_json, ?) IS NULL");
            params_vec.push(Box::new(format!("$.\"{}\"", property.replace('"', ""))));
        }

        sql.push_str(" ORDER BY id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), Self::read_node_row)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(Self::row_to_node(row?)?);
        }
        Ok(nodes)
    }

    fn find_edges(&self, filter: &EdgeFilter) -> StorageResult<Vec<StoredEdge>> {
        let conn = self.lock()?;

        let mut sql = String::from(
            "SELECT e.id, e.edge_type, s.label, s.key_kind, s.key, t.label, t.key_kind, t.key, \
             e.evidence_json, e.created_at \
             FROM edges e \
             JOIN nodes s ON s.id = e.source_id \
             JOIN nodes t ON t.id = e.target_id \
             WHERE 1 = 1",
        );
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(edge_type) = filter.edge_type {
            sql.push_str(" AND e.edge_type = ?");
            params_vec.push(Box::new(edge_type.as_str()));
        }

        for (alias, endpoint) in [("s", &filter.source), ("t", &filter.target)] {
            if let Some((label, key)) = endpoint {
                sql.push_str(&format!(
                    " AND {a}.label = ? AND {a}.key_kind = ? AND {a}.key = ?",
                    a = alias
                ));
                params_vec.push(Box::new(label.as_str()));
                params_vec.push(Box::new(key.kind().as_str()));
                params_vec.push(Box::new(key.value().to_string()));
            }
        }

        sql.push_str(" ORDER BY e.id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), Self::read_edge_row)?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(Self::row_to_edge(row?)?);
        }
        Ok(edges)
    }

    fn stats(&self) -> StorageResult<GraphStats> {
        let conn = self.lock()?;
        let mut stats = GraphStats::default();

        let mut stmt = conn.prepare("SELECT label, COUNT(*) FROM nodes GROUP BY label")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (label, count) = row?;
            stats.nodes.insert(label.parse()?, count as u64);
        }

        let mut stmt = conn.prepare("SELECT edge_type, COUNT(*) FROM edges GROUP BY edge_type")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (edge_type, count) = row?;
            stats.edges.insert(edge_type.parse()?, count as u64);
        }

        Ok(stats)
    }

    fn dangling_edge_count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges e \
             WHERE NOT EXISTS (SELECT 1 FROM nodes n WHERE n.id = e.source_id) \
                OR NOT EXISTS (SELECT 1 FROM nodes n WHERE n.id = e.target_id)",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;
    use chrono::Duration as ChronoDuration;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn phenotype(id: &str) -> NodeUpsert {
        NodeUpsert::new(NodeLabel::Phenotype, IdentityKey::new(KeyKind::Ontology, id))
    }

    fn merge_one(
        store: &SqliteStore,
        upsert: &NodeUpsert,
        policy: MatchPolicy,
        at: DateTime<Utc>,
    ) -> (NodeRef, Outcome) {
        let mut result = None;
        store
            .write_unit(&mut |unit: &mut dyn UnitOfWork| {
                result = Some(unit.merge_node(upsert, policy, at)?);
                Ok(())
            })
            .unwrap();
        result.unwrap()
    }

    #[test]
    fn test_merge_node_creates_then_touches() {
        let store = create_test_store();
        let t0 = Utc::now();
        let t1 = t0 + ChronoDuration::seconds(5);
        let upsert = phenotype("HP:0001824").with_property("label", "weight loss");

        let (first, outcome) = merge_one(&store, &upsert, MatchPolicy::default(), t0);
        assert_eq!(outcome, Outcome::Created);

        let renamed = phenotype("HP:0001824").with_property("label", "WEIGHT LOSS");
        let (second, outcome) = merge_one(&store, &renamed, MatchPolicy::default(), t1);
        assert_eq!(outcome, Outcome::Touched);
        assert_eq!(first.id(), second.id());

        let stored = store
            .load_node(NodeLabel::Phenotype, &upsert.key)
            .unwrap()
            .unwrap();
        assert_eq!(stored.occurrence_count, 2);
        assert_eq!(stored.property_str("label"), Some("weight loss"));
        assert_eq!(format_time(stored.first_seen), format_time(t0));
        assert_eq!(format_time(stored.last_seen), format_time(t1));
    }

    #[test]
    fn test_last_seen_never_moves_backwards() {
        let store = create_test_store();
        let later = Utc::now();
        let earlier = later - ChronoDuration::minutes(1);
        let upsert = phenotype("HP:1");

        merge_one(&store, &upsert, MatchPolicy::default(), later);
        merge_one(&store, &upsert, MatchPolicy::default(), earlier);

        let stored = store.load_node(NodeLabel::Phenotype, &upsert.key).unwrap().unwrap();
        assert_eq!(format_time(stored.last_seen), format_time(later));
    }

    #[test]
    fn test_fill_missing_policy_only_adds_fields() {
        let store = create_test_store();
        let key = IdentityKey::new(KeyKind::PaperId, "PMC123");
        let skeleton = NodeUpsert::new(NodeLabel::Paper, key.clone())
            .with_property("doi", "10.1/original");
        let full = NodeUpsert::new(NodeLabel::Paper, key.clone())
            .with_property("doi", "10.1/other")
            .with_property("title", "Spaceflight and bone");

        merge_one(&store, &skeleton, MatchPolicy::default(), Utc::now());
        merge_one(&store, &full, MatchPolicy::FillMissing, Utc::now());

        let stored = store.load_node(NodeLabel::Paper, &key).unwrap().unwrap();
        assert_eq!(stored.property_str("doi"), Some("10.1/original"));
        assert_eq!(stored.property_str("title"), Some("Spaceflight and bone"));
    }

    #[test]
    fn test_key_kind_is_part_of_identity() {
        let store = create_test_store();
        let ontology = phenotype("X:1");
        let local = NodeUpsert::new(NodeLabel::Phenotype, IdentityKey::new(KeyKind::Local, "X:1"));

        let (a, _) = merge_one(&store, &ontology, MatchPolicy::default(), Utc::now());
        let (b, outcome) = merge_one(&store, &local, MatchPolicy::default(), Utc::now());

        assert_ne!(a.id(), b.id());
        assert_eq!(outcome, Outcome::Created);
        assert_eq!(store.stats().unwrap().node_count(NodeLabel::Phenotype), 2);
    }

    #[test]
    fn test_merge_edge_keeps_first_evidence() {
        let store = create_test_store();
        let finding = NodeUpsert::new(NodeLabel::Finding, IdentityKey::new(KeyKind::FindingId, "f-1"));
        let target = phenotype("HP:2");
        let mut first = Properties::new();
        first.insert("direction".into(), PropertyValue::from("increase"));
        let mut second = Properties::new();
        second.insert("direction".into(), PropertyValue::from("decrease"));

        let mut outcomes = Vec::new();
        for evidence in [&first, &second] {
            store
                .write_unit(&mut |unit: &mut dyn UnitOfWork| {
                    let (f, _) = unit.merge_node(&finding, MatchPolicy::default(), Utc::now())?;
                    let (p, _) = unit.merge_node(&target, MatchPolicy::default(), Utc::now())?;
                    let (_, outcome) =
                        unit.merge_edge(EdgeType::Affects, &f, &p, evidence, Utc::now())?;
                    outcomes.push(outcome);
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(outcomes, vec![Outcome::Created, Outcome::Touched]);
        let edges = store.find_edges(&EdgeFilter::new().with_type(EdgeType::Affects)).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].evidence["direction"], PropertyValue::from("increase"));
        assert_eq!(edges[0].source.key, finding.key);
        assert_eq!(edges[0].target.label, NodeLabel::Phenotype);
    }

    #[test]
    fn test_failed_unit_rolls_back_everything() {
        let store = create_test_store();
        let upsert = phenotype("HP:3");

        let result = store.write_unit(&mut |unit: &mut dyn UnitOfWork| {
            unit.merge_node(&upsert, MatchPolicy::default(), Utc::now())?;
            Err(StorageError::CorruptRow("forced".into()))
        });

        assert!(matches!(result, Err(StorageError::CorruptRow(_))));
        assert!(store.load_node(NodeLabel::Phenotype, &upsert.key).unwrap().is_none());
        assert_eq!(store.stats().unwrap().total_nodes(), 0);
    }

    #[test]
    fn test_rehearsed_unit_sees_the_graph_but_leaves_it_unchanged() {
        let store = create_test_store();
        let existing = phenotype("HP:4");
        let fresh = phenotype("HP:5");
        merge_one(&store, &existing, MatchPolicy::default(), Utc::now());

        let mut outcomes = Vec::new();
        store
            .rehearse_unit(&mut |unit: &mut dyn UnitOfWork| {
                outcomes.push(unit.merge_node(&existing, MatchPolicy::default(), Utc::now())?.1);
                outcomes.push(unit.merge_node(&fresh, MatchPolicy::default(), Utc::now())?.1);
                Ok(())
            })
            .unwrap();

        assert_eq!(outcomes, vec![Outcome::Touched, Outcome::Created]);
        assert!(store.load_node(NodeLabel::Phenotype, &fresh.key).unwrap().is_none());
        let stored = store.load_node(NodeLabel::Phenotype, &existing.key).unwrap().unwrap();
        assert_eq!(stored.occurrence_count, 1);
        assert_eq!(store.stats().unwrap().total_nodes(), 1);
    }

    #[test]
    fn test_find_nodes_missing_property() {
        let store = create_test_store();
        let bare = NodeUpsert::new(NodeLabel::Paper, IdentityKey::new(KeyKind::PaperId, "PMC1"));
        let titled = NodeUpsert::new(NodeLabel::Paper, IdentityKey::new(KeyKind::PaperId, "PMC2"))
            .with_property("title", "Radiation and retina");
        merge_one(&store, &bare, MatchPolicy::default(), Utc::now());
        merge_one(&store, &titled, MatchPolicy::default(), Utc::now());

        let skeletal = store
            .find_nodes(&NodeFilter::new().with_label(NodeLabel::Paper).missing("title"))
            .unwrap();
        assert_eq!(skeletal.len(), 1);
        assert_eq!(skeletal[0].key.value(), "PMC1");

        let limited = store.find_nodes(&NodeFilter::new().with_limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_dangling_edges_are_counted() {
        let store = create_test_store();
        assert_eq!(store.dangling_edge_count().unwrap(), 0);

        {
            let conn = store.conn.lock().unwrap();
            conn.execute_batch(
                "PRAGMA foreign_keys = OFF;
                 INSERT INTO edges (edge_type, source_id, target_id, evidence_json, created_at)
                 VALUES ('MENTIONS', 998, 999, '{}', '2025-01-01T00:00:00.000000Z');",
            )
            .unwrap();
        }

        assert_eq!(store.dangling_edge_count().unwrap(), 1);
    }

    #[test]
    fn test_stats_to_counters() {
        let store = create_test_store();
        merge_one(&store, &phenotype("HP:4"), MatchPolicy::default(), Utc::now());

        let counters = store.stats().unwrap().to_counters();
        assert_eq!(counters.get("node_count_Phenotype"), Some(&1));
        assert!(!counters.contains_key("rel_count_AFFECTS"));
    }

    #[test]
    fn test_wal_mode_enabled_at_connection() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("nested/graph.db")).unwrap();

        let journal_mode: String = store
            .conn
            .lock()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();

        assert_eq!(journal_mode, "wal");
    }

    #[test]
    fn test_contention_surfaces_as_retryable_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("contended.db");
        let store_a = SqliteStore::open(&db_path).unwrap();
        let store_b = SqliteStore::open(&db_path).unwrap();
        store_b
            .conn
            .lock()
            .unwrap()
            .busy_timeout(Duration::from_millis(10))
            .unwrap();

        let conn_a = store_a.conn.lock().unwrap();
        conn_a.execute_batch("BEGIN IMMEDIATE").unwrap();

        let err = store_b
            .write_unit(&mut |unit: &mut dyn UnitOfWork| {
                unit.merge_node(&phenotype("HP:5"), MatchPolicy::default(), Utc::now())?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)), "got {err:?}");
        assert!(err.is_retryable());

        conn_a.execute_batch("COMMIT").unwrap();
    }

    #[test]
    fn test_concurrent_read_during_write() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test-concurrent.db");
        let store_a = SqliteStore::open(&db_path).unwrap();
        let store_b = SqliteStore::open(&db_path).unwrap();

        let conn_a = store_a.conn.lock().unwrap();
        conn_a.execute_batch("BEGIN IMMEDIATE").unwrap();
        conn_a
            .execute(
                "INSERT INTO nodes (label, key_kind, key, properties_json, first_seen, last_seen) \
                 VALUES ('Tissue', 'ontology', 'UBERON:1', '{}', 'x', 'x')",
                [],
            )
            .unwrap();

        // Uncommitted writes are invisible to the other reader
        assert_eq!(store_b.stats().unwrap().total_nodes(), 0);

        conn_a.execute_batch("COMMIT").unwrap();
        assert_eq!(store_b.stats().unwrap().node_count(NodeLabel::Tissue), 1);
    }
}
