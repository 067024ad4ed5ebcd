//! Result collection under a deadline

use super::dispatch::{FieldOutcome, TaskChannels};
use super::field::{Report, ReportField, Selection};
use super::AggregationError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub(crate) struct Collected<R: Report> {
    pub report: R,
    /// Selected fields still outstanding when collection stopped
    pub unsettled: Vec<R::Field>,
    pub timed_out: bool,
}

/// Drain the outcome and error channels until both close or the deadline fires
///
/// The first fatal error aborts collection. Deadline expiry and fatal errors
/// both cancel `cancel` so outstanding workers stop.
pub(crate) async fn collect<R: Report>(
    channels: TaskChannels<R>,
    selection: &Selection<R::Field>,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<Collected<R>, AggregationError> {
    let TaskChannels {
        mut outcomes,
        mut errors,
    } = channels;

    let mut report = R::default();
    let mut pending: Vec<R::Field> = selection.iter().collect();
    let mut outcomes_open = true;
    let mut errors_open = true;

    let expiry = tokio::time::sleep(deadline);
    tokio::pin!(expiry);

    while outcomes_open || errors_open {
        tokio::select! {
            biased;

            error = errors.recv(), if errors_open => match error {
                Some(error) => {
                    cancel.cancel();
                    error!(error = %error, "Aborting aggregation");
                    return Err(error);
                }
                None => errors_open = false,
            },

            outcome = outcomes.recv(), if outcomes_open => match outcome {
                Some(FieldOutcome::Delivered(value)) => {
                    let field = R::field_of(&value);
                    pending.retain(|f| *f != field);
                    debug!(field = field.key(), "Field delivered");
                    report.set(value);
                }
                Some(FieldOutcome::Absent(field)) => {
                    pending.retain(|f| *f != field);
                    debug!(field = field.key(), "Field settled without value");
                }
                None => outcomes_open = false,
            },

            _ = &mut expiry => {
                cancel.cancel();
                warn!(
                    unsettled = %keys(&pending),
                    deadline_ms = deadline.as_millis() as u64,
                    "Deadline expired, returning partial report"
                );
                return Ok(Collected { report, unsettled: pending, timed_out: true });
            }
        }
    }

    Ok(Collected {
        report,
        unsettled: pending,
        timed_out: false,
    })
}

fn keys<F: ReportField>(fields: &[F]) -> String {
    fields
        .iter()
        .map(|f| f.key())
        .collect::<Vec<_>>()
        .join(",")
}
