//! Batch transaction coordinator
//!
//! Reads records in batches and loads each record as its own atomic unit of
//! work, so one bad record never takes its neighbours down with it. Failures
//! are counted and the run continues; only an unreachable store or a missing
//! input file ends a run early.

use super::adapter::{RecordAdapter, RecordContext};
use super::cancel::CancellationToken;
use super::error::{IngestError, RecordError};
use super::metrics::RunMetrics;
use super::upsert::GraphWriter;
use crate::graph::MatchPolicy;
use crate::record::{Batch, ParsedRecord, RecordReader};
use crate::storage::{GraphStore, RehearsalStore, UnitOfWork};
use chrono::Utc;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Knobs for a load run
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Records per batch; `None` uses the adapter's default
    pub batch_size: Option<usize>,
    /// Run every unit against the store but roll it back instead of committing
    pub dry_run: bool,
    /// Extra attempts for a record whose unit hit a write conflict
    pub max_retries: u32,
    /// Wait before retry `n` is `n * retry_backoff`
    pub retry_backoff: Duration,
    pub match_policy: MatchPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            dry_run: false,
            max_retries: 3,
            retry_backoff: Duration::from_millis(50),
            match_policy: MatchPolicy::KeepCreationFields,
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }
}

pub struct BatchCoordinator<A: RecordAdapter> {
    store: Arc<dyn GraphStore>,
    adapter: A,
    config: LoaderConfig,
    cancel: CancellationToken,
}

impl<A: RecordAdapter> BatchCoordinator<A> {
    /// Coordinate loads into `store`.
    ///
    /// The store is pinged first; if it is unreachable no record is read.
    /// With `dry_run` set, `store` is wrapped in a [`RehearsalStore`]: every
    /// unit runs against the real graph and is rolled back, and the counts are
    /// those a live run would report right now.
    pub fn new(store: Arc<dyn GraphStore>, adapter: A, config: LoaderConfig) -> Result<Self, IngestError> {
        store.ping().map_err(IngestError::Connection)?;
        let store: Arc<dyn GraphStore> = if config.dry_run {
            info!(adapter = adapter.id(), "dry run, every unit will be rolled back");
            Arc::new(RehearsalStore::new(store))
        } else {
            store
        };
        Ok(Self {
            store,
            adapter,
            config,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn batch_size(&self) -> usize {
        self.config
            .batch_size
            .unwrap_or_else(|| self.adapter.default_batch_size())
            .max(1)
    }

    /// Load every record in a line-delimited JSON file.
    pub fn load_file(&self, path: &Path) -> Result<RunMetrics, IngestError> {
        let file = open_input(path)?;
        info!(
            adapter = self.adapter.id(),
            input = %path.display(),
            batch_size = self.batch_size(),
            dry_run = self.config.dry_run,
            "load started"
        );
        Ok(self.load_reader(BufReader::new(file)))
    }

    /// Load every record from `reader`, one batch at a time.
    pub fn load_reader<R: BufRead>(&self, reader: R) -> RunMetrics {
        let mut metrics = RunMetrics::new();
        for batch in RecordReader::<R, A::Record>::new(reader).batches(self.batch_size()) {
            if self.cancel.is_cancelled() {
                warn!(adapter = self.adapter.id(), "load cancelled, remaining batches skipped");
                metrics.cancelled = true;
                break;
            }
            metrics.merge(self.load_batch(batch));
        }
        metrics
    }

    /// Load one batch. Each record commits or rolls back on its own.
    pub fn load_batch(&self, batch: Batch<A::Record>) -> RunMetrics {
        let mut metrics = RunMetrics::new();
        for err in &batch.parse_errors {
            error!(line = err.line, error = %err.message, "unparseable record");
            metrics.record_parse_error(err);
        }
        for parsed in &batch.records {
            self.load_record(parsed, &mut metrics);
        }
        info!(
            adapter = self.adapter.id(),
            records = batch.records.len(),
            loaded = metrics.total_loaded,
            "batch done"
        );
        metrics
    }

    fn load_record(&self, parsed: &ParsedRecord<A::Record>, metrics: &mut RunMetrics) {
        metrics.records_seen += 1;
        let key = self.adapter.record_key(&parsed.record, parsed.line);
        let ctx = RecordContext {
            line: parsed.line,
            raw: &parsed.raw,
        };

        let plan = match self.adapter.plan(&parsed.record, &ctx) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(record = %key, line = parsed.line, error = %err, "record has no usable identity");
                metrics.record_failure(&key, parsed.line, &RecordError::Identity(err));
                return;
            }
        };

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let mut tally = RunMetrics::new();
            let at = Utc::now();
            let result = self.store.write_unit(&mut |unit: &mut dyn UnitOfWork| {
                let mut writer = GraphWriter::new(unit, &mut tally, self.config.match_policy, at);
                plan.apply(&mut writer)
            });

            match result {
                Ok(()) => {
                    tally.total_loaded = 1;
                    tally.skipped_entities = plan.skipped().len() as u64;
                    metrics.merge(tally);
                    return;
                }
                Err(err) if err.is_retryable() && attempts <= self.config.max_retries => {
                    metrics.conflict_retries += 1;
                    let delay = self.config.retry_backoff * attempts;
                    warn!(record = %key, attempt = attempts, ?delay, error = %err, "write conflict, retrying");
                    std::thread::sleep(delay);
                }
                Err(err) => {
                    error!(record = %key, line = parsed.line, attempts, error = %err, "record not loaded");
                    metrics.record_failure(&key, parsed.line, &RecordError::Write { attempts, source: err });
                    return;
                }
            }
        }
    }
}

impl<A: RecordAdapter + 'static> BatchCoordinator<A> {
    /// Load a file with up to `concurrency` batches in flight on the blocking
    /// pool. Each batch reports its own metrics, merged here as batches finish.
    pub async fn load_file_concurrent(
        self: Arc<Self>,
        path: PathBuf,
        concurrency: usize,
    ) -> Result<RunMetrics, IngestError> {
        let file = open_input(&path)?;
        let concurrency = concurrency.max(1);
        info!(
            adapter = self.adapter.id(),
            input = %path.display(),
            batch_size = self.batch_size(),
            concurrency,
            dry_run = self.config.dry_run,
            "concurrent load started"
        );

        let mut metrics = RunMetrics::new();
        let mut in_flight = JoinSet::new();
        let batches = RecordReader::<_, A::Record>::new(BufReader::new(file)).batches(self.batch_size());

        for batch in batches {
            if self.cancel.is_cancelled() {
                warn!(adapter = self.adapter.id(), "load cancelled, remaining batches skipped");
                metrics.cancelled = true;
                break;
            }
            while in_flight.len() >= concurrency {
                if let Some(joined) = in_flight.join_next().await {
                    metrics.merge(joined.map_err(|e| IngestError::Worker(e.to_string()))?);
                }
            }
            let this = Arc::clone(&self);
            in_flight.spawn_blocking(move || this.load_batch(batch));
        }

        while let Some(joined) = in_flight.join_next().await {
            metrics.merge(joined.map_err(|e| IngestError::Worker(e.to_string()))?);
        }
        Ok(metrics)
    }
}

fn open_input(path: &Path) -> Result<File, IngestError> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IngestError::InputNotFound(path.to_path_buf()),
        _ => IngestError::Io(e),
    })
}
