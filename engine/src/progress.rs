//! Progress reporting trait.
//!
//! This module defines the ProgressSink trait, which decouples the
//! reconciliation engine from any specific UI technology. The CLI prints one
//! line per operation; tests record the calls.
//!
//! A sink only observes. Nothing it does changes the course of a run.

use crate::model::{Operation, Outcome, SyncIssue, SyncJob, SyncReport};

/// Trait for receiving status events from a sync run.
///
/// All methods are called synchronously, in the order the engine performs
/// the corresponding work.
pub trait ProgressSink: Send {
    /// Called once the plan is known, before the first remote mutation.
    fn on_sync_started(&self, job: &SyncJob);

    /// Called for every non-fatal problem as it is recorded.
    fn on_notice(&self, issue: &SyncIssue);

    /// Called right before an operation is attempted.
    fn on_operation_started(&self, operation: &Operation);

    /// Called when an operation ended, or was skipped due to cancellation.
    fn on_operation_completed(&self, operation: &Operation, outcome: &Outcome);

    /// Called when the run reached its final state.
    fn on_sync_completed(&self, report: &SyncReport);
}
