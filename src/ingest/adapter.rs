//! RecordAdapter trait, the contract each input source implements
//!
//! An adapter declares the record shape it reads and turns each record into a
//! [`RecordPlan`]. It never talks to the store; the coordinator applies the
//! plan inside a unit of work.

use super::plan::RecordPlan;
use crate::identity::IdentityError;
use serde::de::DeserializeOwned;

/// Where a record came from
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    /// 1-based line number in the input
    pub line: usize,
    /// The input line as read
    pub raw: &'a str,
}

pub trait RecordAdapter: Send + Sync {
    /// The per-line record shape
    type Record: DeserializeOwned + Send + Sync + 'static;

    /// Unique identifier for this adapter, used in logs
    fn id(&self) -> &str;

    /// Records per batch when the caller does not choose
    fn default_batch_size(&self) -> usize {
        100
    }

    /// Identity used to report this record's failures; falls back to the
    /// line number when the record carries none.
    fn record_key(&self, record: &Self::Record, line: usize) -> String;

    /// Resolve every identity in `record` and lay out its writes.
    ///
    /// Returns `Err` when the record's primary node cannot be keyed; the
    /// record is then not loaded at all. Sub-entities that cannot be keyed
    /// are left out and noted with [`RecordPlan::skip`].
    fn plan(&self, record: &Self::Record, ctx: &RecordContext<'_>) -> Result<RecordPlan, IdentityError>;
}
