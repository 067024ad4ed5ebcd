//! Task dispatch: one worker per selected field
//!
//! Cached fields are delivered straight from the cache entry; the rest run
//! their fetch operation. Every worker reports on one shared outcome channel
//! (or the fatal error channel). A closer task holds the original senders and
//! drops them once the tracker reports every worker finished, which is what
//! lets the collector see the channels close.

use super::field::{FieldPlan, Report, ReportField, Selection};
use super::AggregationError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace, warn, Instrument, Span};

/// What one field worker produced
pub(crate) enum FieldOutcome<R: Report> {
    Delivered(R::Value),
    /// Worker finished without a value (fetch failed, non-fatally)
    Absent(R::Field),
}

/// Receiving half of one request's channels
pub(crate) struct TaskChannels<R: Report> {
    pub outcomes: mpsc::Receiver<FieldOutcome<R>>,
    pub errors: mpsc::Receiver<AggregationError>,
}

pub(crate) fn dispatch<R, P>(
    selection: &Selection<R::Field>,
    cached: Option<&R>,
    plan: Arc<P>,
    cancel: &CancellationToken,
) -> TaskChannels<R>
where
    R: Report,
    P: FieldPlan<R>,
{
    let (outcome_tx, outcomes) = mpsc::channel::<FieldOutcome<R>>(selection.len().max(1));
    let (error_tx, errors) = mpsc::channel::<AggregationError>(1);
    let tracker = TaskTracker::new();

    for field in selection.iter() {
        let key = field.key();
        let outcome_tx = outcome_tx.clone();

        if let Some(value) = cached.and_then(|report| report.value(field)) {
            debug!(field = key, "Cache hit, short-circuiting fetch");
            tracker.spawn(
                async move {
                    let _ = outcome_tx.send(FieldOutcome::Delivered(value)).await;
                }
                .instrument(Span::current()),
            );
            continue;
        }

        let error_tx = error_tx.clone();
        let plan = plan.clone();
        let cancel = cancel.clone();

        debug!(field = key, "Dispatching fetch");
        tracker.spawn(
            async move {
                let result = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(field = key, "Fetch cancelled");
                        return;
                    }
                    result = plan.fetch(field, cancel.clone()) => result,
                };

                match result {
                    Ok(value) => {
                        trace!(field = key, "Fetch succeeded");
                        let _ = outcome_tx.send(FieldOutcome::Delivered(value)).await;
                    }
                    Err(source) if source.is_fatal() => {
                        error!(field = key, error = %source, "Fatal fetch failure");
                        let _ = error_tx
                            .send(AggregationError::Fatal { field: key, source })
                            .await;
                    }
                    Err(source) => {
                        warn!(field = key, error = %source, "Fetch failed, omitting field");
                        let _ = outcome_tx.send(FieldOutcome::Absent(field)).await;
                    }
                }
            }
            .instrument(Span::current()),
        );
    }

    tracker.close();
    tokio::spawn(
        async move {
            tracker.wait().await;
            drop(outcome_tx);
            drop(error_tx);
            trace!("All field workers finished, channels closed");
        }
        .instrument(Span::current()),
    );

    TaskChannels { outcomes, errors }
}
