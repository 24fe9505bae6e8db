//! Bulk operation executor
//!
//! Applies one operation to every member of a selection and reports one
//! outcome per target, in input order. Continue-on-error is the contract:
//! a failing target never stops or skips the targets after it.
//!
//! Sequential execution is the default - the management API is shared
//! across many operators and unthrottled fan-out risks rate-limit
//! rejections. [`execute_bounded`] is the opt-in concurrent variant with a
//! capped in-flight count.

use futures::{stream, StreamExt};
use std::future::Future;

/// A resolved bulk target: remote id plus the display name for the report.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: String,
    pub name: String,
}

impl Target {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Per-target result record. Always produced, success or not.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub target_id: String,
    pub target_name: String,
    pub success: bool,
    pub message: String,
    /// Raw HTTP status when the target got far enough to receive one.
    pub status: Option<u16>,
}

/// Success/failure counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Full result of one bulk run: the ordered outcome sequence plus counts.
/// Both are exposed - reports always show the per-target breakdown, never
/// just the aggregate.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<OperationOutcome>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: Vec<OperationOutcome>) -> Self {
        let summary = BatchSummary {
            succeeded: outcomes.iter().filter(|o| o.success).count(),
            failed: outcomes.iter().filter(|o| !o.success).count(),
        };
        Self { outcomes, summary }
    }

    pub fn all_succeeded(&self) -> bool {
        self.summary.failed == 0
    }
}

/// Apply `operation` to every target sequentially, in input order.
pub async fn execute<T, F, Fut>(targets: Vec<T>, mut operation: F) -> BatchReport
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = OperationOutcome>,
{
    let mut outcomes = Vec::with_capacity(targets.len());
    for target in targets {
        outcomes.push(operation(target).await);
    }
    BatchReport::from_outcomes(outcomes)
}

/// Bounded-concurrency variant: at most `max_in_flight` operations run at
/// once. Outcomes still land in input order - a buffered stream yields in
/// submission order, not completion order.
pub async fn execute_bounded<T, F, Fut>(
    targets: Vec<T>,
    max_in_flight: usize,
    operation: F,
) -> BatchReport
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = OperationOutcome>,
{
    let outcomes = stream::iter(targets)
        .map(operation)
        .buffered(max_in_flight.max(1))
        .collect::<Vec<_>>()
        .await;
    BatchReport::from_outcomes(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome_for(id: &str, success: bool) -> OperationOutcome {
        OperationOutcome {
            target_id: id.to_string(),
            target_name: id.to_uppercase(),
            success,
            message: if success { "done" } else { "boom" }.to_string(),
            status: None,
        }
    }

    #[tokio::test]
    async fn sequential_preserves_order_and_never_aborts() {
        let targets = vec![("a", true), ("b", false), ("c", true), ("d", false)];
        let report = execute(targets, |(id, success)| async move {
            outcome_for(id, success)
        })
        .await;

        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.target_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(report.summary.succeeded, 2);
        assert_eq!(report.summary.failed, 2);
        assert!(!report.all_succeeded());
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_report() {
        let report = execute(Vec::<Target>::new(), |t| async move {
            outcome_for(&t.id, true)
        })
        .await;
        assert!(report.outcomes.is_empty());
        assert_eq!(report.summary.total(), 0);
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn bounded_preserves_input_order_despite_completion_order() {
        // earlier targets sleep longer, so completion order is reversed
        let targets: Vec<usize> = (0..6).collect();
        let report = execute_bounded(targets, 4, |i| async move {
            tokio::time::sleep(Duration::from_millis(60 - (i as u64) * 10)).await;
            outcome_for(&format!("t{i}"), i % 2 == 0)
        })
        .await;

        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.target_id.as_str()).collect();
        assert_eq!(ids, vec!["t0", "t1", "t2", "t3", "t4", "t5"]);
        assert_eq!(report.summary.succeeded, 3);
        assert_eq!(report.summary.failed, 3);
    }

    #[tokio::test]
    async fn bounded_clamps_zero_in_flight_to_one() {
        let report = execute_bounded(vec!["x"], 0, |id| async move {
            outcome_for(id, true)
        })
        .await;
        assert_eq!(report.outcomes.len(), 1);
    }
}
