//! Selective concurrent aggregation engine
//!
//! A request names a root entity and a selection of report fields. The
//! engine looks up the cached report for that root, dispatches one worker
//! per selected field (cached fields short-circuit), collects the outcomes
//! under a deadline and merges what arrived back into the cache.
//!
//! ```text
//!  selection ──► dispatch ──► N field workers ──► outcome channel ─┐
//!                  │                         └──► error channel ───┤
//!                  └── closer (waits on tracker, drops senders)    ▼
//!                                                        collect (deadline)
//!                                                                  │
//!                                                    cache merge ◄─┘
//! ```

pub mod cache;
mod collect;
mod dispatch;
pub mod field;
pub mod resolve;

pub use cache::ReportCache;
pub use field::{filled, FieldPlan, Report, ReportField, Selection};

use crate::source::SourceError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Errors that abort a whole aggregation
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Aggregation aborted while fetching {field}: {source}")]
    Fatal {
        field: &'static str,
        #[source]
        source: SourceError,
    },
}

/// Result of one aggregation request
#[derive(Debug, Clone)]
pub struct Aggregation<R: Report> {
    /// Values delivered for selected fields only
    pub report: R,
    /// Every selected field settled before the deadline
    pub complete: bool,
    /// Keys of selected fields that had not settled when the deadline fired
    pub unsettled: Vec<&'static str>,
}

/// Aggregation driver for one root kind
pub struct Aggregator<R: Report> {
    cache: Arc<ReportCache<R>>,
    deadline: Duration,
}

impl<R: Report> Clone for Aggregator<R> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            deadline: self.deadline,
        }
    }
}

impl<R: Report> Aggregator<R> {
    pub fn new(cache: Arc<ReportCache<R>>, deadline: Duration) -> Self {
        Self { cache, deadline }
    }

    pub fn cache(&self) -> &Arc<ReportCache<R>> {
        &self.cache
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Aggregate the selected fields of `root_id` using `plan` for fetches
    ///
    /// Delivered values are merged into the cache on completion and on
    /// deadline expiry, never after a fatal error.
    pub async fn run<P: FieldPlan<R>>(
        &self,
        root_id: &str,
        selection: &Selection<R::Field>,
        plan: Arc<P>,
    ) -> Result<Aggregation<R>, AggregationError> {
        let span = info_span!(
            "aggregate",
            request_id = %Uuid::new_v4(),
            kind = R::KIND,
            root = %root_id,
        );

        async move {
            let cached = self.cache.get(root_id).await;
            info!(
                selected = selection.len(),
                cache_hit = cached.is_some(),
                "Starting aggregation"
            );

            let cancel = CancellationToken::new();
            let channels = dispatch::dispatch(selection, cached.as_ref(), plan, &cancel);
            let collected = collect::collect(channels, selection, self.deadline, &cancel).await?;

            // Workers may still be draining after a deadline; make sure they stop
            cancel.cancel();

            self.cache.merge_and_store(root_id, &collected.report).await;

            let complete = !collected.timed_out && collected.unsettled.is_empty();
            let unsettled: Vec<&'static str> =
                collected.unsettled.iter().map(|f| f.key()).collect();

            info!(complete, unsettled = unsettled.len(), "Aggregation finished");

            Ok(Aggregation {
                report: collected.report,
                complete,
                unsettled,
            })
        }
        .instrument(span)
        .await
    }
}
