//! Job orchestration module.
//!
//! This module provides the reconciliation lifecycle:
//! - Creating a job from a configuration
//! - Planning a job (previous manifest, local scan, classification)
//! - Running a job (applying the plan and persisting the new manifest)
//!
//! A run moves through `Init -> ManifestLoaded -> LocalScanned -> Classified
//! -> Applied` and ends in `ManifestPersisted`, `NoOpCompleted` or `Failed`.
//! Only a local scan failure is fatal; every remote problem is recorded on
//! the job and the run continues with the next operation.

use chrono::Utc;
use std::io::Write;
use tracing::{debug, info, info_span, warn};

use crate::config::{ManifestPolicy, SyncConfig};
use crate::digest::compute_file_digest;
use crate::error::{EngineError, RemoteError};
use crate::manifest::{self, Manifest};
use crate::model::{
    NodeKind, Operation, OperationKind, OperationRecord, Outcome, SyncIssue, SyncJob,
    SyncOutcome, SyncReport, SyncState,
};
use crate::plan::{build_plan, ObservedNode, Observation};
use crate::progress::ProgressSink;
use crate::remote::{remote_path, RemoteFilesystem};
use crate::scan::{self, local_path};

/// Create a new sync job.
///
/// Validates that the local root exists and is a directory. Nothing is read
/// from the remote side yet.
///
/// # Errors
/// Returns EngineError if the local root is missing or not a directory.
pub fn create_job(config: SyncConfig) -> Result<SyncJob, EngineError> {
    scan::check_root(&config.local_root)?;
    Ok(SyncJob::new(config))
}

/// Plan a job: load the previous manifest, scan the local tree and classify.
///
/// A manifest that cannot be fetched is recorded as an issue and replaced by
/// an empty one, which turns the run into a full upload.
///
/// # Errors
/// Returns EngineError if the job is not in `Init` state or the local scan
/// fails; in the latter case the job ends in `Failed`.
pub fn plan_job(
    job: &mut SyncJob,
    remote: &mut dyn RemoteFilesystem,
    progress: Option<&dyn ProgressSink>,
) -> Result<(), EngineError> {
    require_state(job, SyncState::Init)?;
    let _span = info_span!("sync", run = %job.id).entered();

    info!("Downloading checksum file '{}'", job.config.manifest_path);
    match remote.get(&job.config.manifest_path) {
        Ok(raw) => {
            job.previous_manifest = manifest::decode(&raw, job.config.algorithm);
            debug!(entries = job.previous_manifest.len(), "Previous manifest loaded");
        }
        Err(e) => {
            job.previous_manifest = Manifest::new();
            let issue = SyncIssue::ManifestLoad { message: e.to_string() };
            record_issue(job, progress, issue);
        }
    }
    job.state = SyncState::ManifestLoaded;

    match scan::scan(&job.config.local_root, &job.config.excludes) {
        Ok(nodes) => job.nodes = nodes,
        Err(e) => {
            warn!("Local path '{}' cannot be opened: {e}", job.config.local_root.display());
            job.state = SyncState::Failed;
            job.finished_at = Some(Utc::now());
            return Err(e);
        }
    }
    job.state = SyncState::LocalScanned;

    let observed = observe_nodes(job, progress);
    let plan = build_plan(&job.previous_manifest, &observed, job.config.algorithm);
    info!(
        create = plan.dirs_to_create.len(),
        upload = plan.files_to_upload.len(),
        remove_files = plan.files_to_remove.len(),
        remove_dirs = plan.dirs_to_remove.len(),
        unchanged = plan.unchanged.len(),
        "Plan ready"
    );
    job.plan = Some(plan);
    job.state = SyncState::Classified;

    Ok(())
}

/// Run a planned job.
///
/// Operations are applied strictly in plan order, each attempted once.
/// Failures are recorded and reported but do NOT stop the job. If at least
/// one operation succeeded the new manifest is uploaded to the manifest path.
///
/// # Errors
/// Returns EngineError only if the job has not been planned.
pub fn run_job(
    job: &mut SyncJob,
    remote: &mut dyn RemoteFilesystem,
    progress: Option<&dyn ProgressSink>,
) -> Result<SyncReport, EngineError> {
    require_state(job, SyncState::Classified)?;
    let _span = info_span!("sync", run = %job.id).entered();

    let operations = job.plan.as_ref().map(|p| p.operations()).unwrap_or_default();
    let cancel = job.cancel_token();
    job.started_at = Some(Utc::now());

    if let Some(sink) = progress {
        sink.on_sync_started(job);
    }

    for operation in operations {
        if cancel.is_cancelled() {
            debug!(op = %operation.kind, path = %operation.path, "Cancelled");
            if let Some(sink) = progress {
                sink.on_operation_completed(&operation, &Outcome::Cancelled);
            }
            job.records.push(OperationRecord { operation, outcome: Outcome::Cancelled });
            continue;
        }

        if let Some(sink) = progress {
            sink.on_operation_started(&operation);
        }
        let outcome = match apply_operation(remote, &job.config, &operation) {
            Ok(()) => {
                debug!(op = %operation.kind, path = %operation.path, "Done");
                Outcome::Success
            }
            Err(e) if already_in_place(operation.kind, &e) => {
                info!(op = %operation.kind, path = %operation.path, "Already in place: {e}");
                Outcome::Success
            }
            Err(e) => {
                let message = e.to_string();
                let issue = SyncIssue::RemoteOperation {
                    operation: operation.clone(),
                    message: message.clone(),
                };
                job.issues.push(issue.clone());
                warn!("{issue}");
                Outcome::Failure(message)
            }
        };
        if let Some(sink) = progress {
            sink.on_operation_completed(&operation, &outcome);
        }
        job.records.push(OperationRecord { operation, outcome });
    }
    job.state = SyncState::Applied;

    let report = finalize(job, remote, progress);
    if let Some(sink) = progress {
        sink.on_sync_completed(&report);
    }
    Ok(report)
}

/// Create, plan and run a job in one go.
pub fn sync(
    config: SyncConfig,
    remote: &mut dyn RemoteFilesystem,
    progress: Option<&dyn ProgressSink>,
) -> Result<SyncReport, EngineError> {
    let mut job = create_job(config)?;
    plan_job(&mut job, remote, progress)?;
    run_job(&mut job, remote, progress)
}

fn require_state(job: &SyncJob, expected: SyncState) -> Result<(), EngineError> {
    if job.state != expected {
        return Err(EngineError::InvalidState {
            expected,
            actual: job.state,
        });
    }
    Ok(())
}

fn record_issue(job: &mut SyncJob, progress: Option<&dyn ProgressSink>, issue: SyncIssue) {
    warn!("{issue}");
    if let Some(sink) = progress {
        sink.on_notice(&issue);
    }
    job.issues.push(issue);
}

/// Digest every scanned file; unreadable files are reported and abstain.
fn observe_nodes(job: &mut SyncJob, progress: Option<&dyn ProgressSink>) -> Vec<ObservedNode> {
    let nodes = std::mem::take(&mut job.nodes);
    let mut observed = Vec::with_capacity(nodes.len());

    for node in &nodes {
        let observation = match node.kind {
            NodeKind::Directory => Observation::Directory,
            NodeKind::File => {
                let path = local_path(&job.config.local_root, &node.path);
                match compute_file_digest(&path, job.config.algorithm) {
                    Ok(digest) => Observation::File(digest),
                    Err(e) => {
                        let issue = SyncIssue::LocalRead {
                            path: node.path.clone(),
                            message: e.to_string(),
                        };
                        record_issue(job, progress, issue);
                        Observation::Unreadable(e.to_string())
                    }
                }
            }
        };
        observed.push(ObservedNode {
            path: node.path.clone(),
            observation,
        });
    }

    job.nodes = nodes;
    observed
}

fn apply_operation(
    remote: &mut dyn RemoteFilesystem,
    config: &SyncConfig,
    operation: &Operation,
) -> Result<(), RemoteError> {
    let target = remote_path(&config.remote_root, &operation.path);
    match operation.kind {
        OperationKind::CreateDir => remote.mkdir(&target),
        OperationKind::Upload => remote.put(&local_path(&config.local_root, &operation.path), &target),
        OperationKind::RemoveFile => remote.remove(&target),
        OperationKind::RemoveDir => remote.rmdir(&target),
        OperationKind::PersistManifest => Err(RemoteError::InvalidPath {
            path: operation.path.clone(),
            reason: "the manifest is not part of the synchronized tree".to_string(),
        }),
    }
}

/// True when a failed operation left the remote tree exactly as planned, such
/// as a directory that already exists or a file that is already gone.
fn already_in_place(kind: OperationKind, error: &RemoteError) -> bool {
    matches!(
        (kind, error),
        (OperationKind::CreateDir, RemoteError::AlreadyExists { .. })
            | (
                OperationKind::RemoveFile | OperationKind::RemoveDir,
                RemoteError::NotFound { .. }
            )
    )
}

/// Stage the encoded manifest in a temp file and upload it.
fn persist_manifest(
    remote: &mut dyn RemoteFilesystem,
    manifest: &Manifest,
    manifest_path: &str,
) -> Result<(), RemoteError> {
    let staging_failed = |source: std::io::Error| RemoteError::LocalRead {
        path: std::env::temp_dir(),
        source,
    };
    let mut staged = tempfile::NamedTempFile::new().map_err(staging_failed)?;
    staged.write_all(&manifest::encode(manifest)).map_err(staging_failed)?;
    staged.flush().map_err(staging_failed)?;

    remote.put(staged.path(), manifest_path)
}

fn finalize(
    job: &mut SyncJob,
    remote: &mut dyn RemoteFilesystem,
    progress: Option<&dyn ProgressSink>,
) -> SyncReport {
    let succeeded = job.records.iter().filter(|r| r.outcome.is_success()).count();
    let cancelled = job
        .records
        .iter()
        .filter(|r| r.outcome == Outcome::Cancelled)
        .count();
    let failed = job.records.len() - succeeded - cancelled;

    let (outcome, manifest_entries, manifest_stale) = if succeeded == 0 {
        info!("Deploy target has not been modified - nothing done");
        job.state = SyncState::NoOpCompleted;
        let outcome = if job.records.is_empty() {
            SyncOutcome::NothingToDo
        } else {
            SyncOutcome::NoOperationSucceeded
        };
        (outcome, job.previous_manifest.len(), false)
    } else {
        let policy = job.config.manifest_policy;
        let next = match &job.plan {
            Some(plan) => plan.manifest_after(&job.previous_manifest, &job.records, policy),
            None => Manifest::new(),
        };

        let operation = Operation::new(OperationKind::PersistManifest, job.config.manifest_path.clone());
        info!("Uploading new checksum file to '{}'", operation.path);
        if let Some(sink) = progress {
            sink.on_operation_started(&operation);
        }
        let result = persist_manifest(remote, &next, &operation.path);
        let persist_outcome = match &result {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failure(e.to_string()),
        };
        if let Some(sink) = progress {
            sink.on_operation_completed(&operation, &persist_outcome);
        }

        match result {
            Ok(()) => {
                job.state = SyncState::ManifestPersisted;
                let stale = policy == ManifestPolicy::Legacy && failed + cancelled > 0;
                (SyncOutcome::Persisted, next.len(), stale)
            }
            Err(e) => {
                let issue = SyncIssue::ManifestPersist { message: e.to_string() };
                warn!("{issue}");
                job.issues.push(issue);
                (SyncOutcome::PersistFailed, next.len(), true)
            }
        }
    };

    let finished_at = Utc::now();
    job.finished_at = Some(finished_at);
    info!(succeeded, failed, cancelled, outcome = ?outcome, "Sync finished");

    SyncReport {
        run_id: job.id,
        state: job.state,
        outcome,
        records: job.records.clone(),
        issues: job.issues.clone(),
        succeeded,
        failed,
        cancelled,
        manifest_entries,
        manifest_stale,
        started_at: job.started_at.unwrap_or(job.created_at),
        finished_at,
    }
}
