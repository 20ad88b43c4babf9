//! Ingestion pipeline
//!
//! Input records flow through three stages:
//!
//! 1. A [`RecordAdapter`] resolves every identity in a record and lays out
//!    its writes as a [`RecordPlan`].
//! 2. The [`BatchCoordinator`] applies each plan as one atomic unit of work,
//!    retrying write conflicts and counting everything else as a failure.
//! 3. Inside the unit, a [`GraphWriter`] upserts nodes first, then the
//!    relationships between them.

mod adapter;
mod cancel;
mod coordinator;
mod error;
mod external;
mod finding;
mod metrics;
mod plan;
mod upsert;


pub use adapter::{RecordAdapter, RecordContext};
pub use cancel::CancellationToken;
pub use coordinator::{BatchCoordinator, LoaderConfig};
pub use error::{IngestError, RecordError};
pub use external::{ExternalItemAdapter, BODY_TEXT_LIMIT};
pub use finding::FindingAdapter;
pub use metrics::RunMetrics;
pub use plan::{NodeSlot, RecordPlan};
pub use upsert::GraphWriter;
