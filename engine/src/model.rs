//! Core data model for sync runs.
//!
//! This module defines the main data structures for representing a deploy:
//! - SyncJob: one reconciliation run and everything it learned along the way
//! - LocalNode: a file or directory found by the scanner
//! - Operation, Outcome: the remote mutations a run performs and how they went
//! - SyncIssue: non-fatal problems recorded instead of aborting
//! - SyncReport: the final, explicit account of a run

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::manifest::Manifest;
use crate::plan::SyncPlan;

/// Whether a scanned node is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// A file or directory below the local root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNode {
    /// Path relative to the local root, `/`-separated
    pub path: String,
    pub kind: NodeKind,
}

impl LocalNode {
    pub fn file(path: impl Into<String>) -> Self {
        LocalNode { path: path.into(), kind: NodeKind::File }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        LocalNode { path: path.into(), kind: NodeKind::Directory }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// The kinds of remote mutation a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateDir,
    Upload,
    RemoveFile,
    RemoveDir,
    /// Upload of the new manifest after the tree operations
    PersistManifest,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::CreateDir => "mkdir",
            OperationKind::Upload => "upload",
            OperationKind::RemoveFile => "remove",
            OperationKind::RemoveDir => "rmdir",
            OperationKind::PersistManifest => "manifest",
        };
        f.pad(name)
    }
}

/// One remote mutation, addressed by path relative to the sync roots.
///
/// For `PersistManifest` the path is the manifest path itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    pub kind: OperationKind,
    pub path: String,
}

impl Operation {
    pub fn new(kind: OperationKind, path: impl Into<String>) -> Self {
        Operation { kind, path: path.into() }
    }
}

/// Result of attempting one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
    /// Never attempted because the run was cancelled first
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// An operation together with how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub operation: Operation,
    pub outcome: Outcome,
}

/// Lifecycle of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Created, nothing read yet
    Init,
    /// Previous manifest fetched (or replaced by an empty one)
    ManifestLoaded,
    /// Local tree enumerated
    LocalScanned,
    /// Plan computed; ready to apply
    Classified,
    /// Remote operations attempted
    Applied,
    /// New manifest uploaded
    ManifestPersisted,
    /// No operation succeeded; manifest left untouched
    NoOpCompleted,
    /// Aborted by a fatal error
    Failed,
}

/// Problems that are reported but do not stop a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIssue {
    /// Previous manifest could not be fetched; everything is treated as new
    ManifestLoad { message: String },
    /// A local file could not be read and was left out of this run
    LocalRead { path: String, message: String },
    /// A remote operation failed
    RemoteOperation { operation: Operation, message: String },
    /// The new manifest could not be uploaded
    ManifestPersist { message: String },
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncIssue::ManifestLoad { message } => {
                write!(f, "No checksum file on deploy target, uploading everything ({message})")
            }
            SyncIssue::LocalRead { path, message } => {
                write!(f, "Cannot read file '{path}', skipping ({message})")
            }
            SyncIssue::RemoteOperation { operation, message } => {
                write!(f, "{} '{}' failed: {message}", operation.kind, operation.path)
            }
            SyncIssue::ManifestPersist { message } => {
                write!(f, "Uploading checksum file failed: {message}")
            }
        }
    }
}

/// How a run ended, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// At least one operation succeeded and the manifest was uploaded
    Persisted,
    /// At least one operation succeeded but the manifest upload failed
    PersistFailed,
    /// The plan was empty
    NothingToDo,
    /// Operations were planned but none of them succeeded
    NoOperationSucceeded,
}

/// Explicit account of a finished run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub state: SyncState,
    pub outcome: SyncOutcome,
    /// Tree operations in the order they were applied
    pub records: Vec<OperationRecord>,
    pub issues: Vec<SyncIssue>,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Entries in the manifest that was (or would have been) uploaded
    pub manifest_entries: usize,
    /// True when the manifest on the remote side may not describe the remote
    /// tree: operations failed but their plan was recorded anyway, or the
    /// manifest upload itself failed after the tree changed.
    pub manifest_stale: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// No failures, no cancellations, and the manifest matches the tree.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0 && !self.manifest_stale
    }

    pub fn failed_operations(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failure(_)))
    }
}

/// Shared flag for cooperative cancellation between operations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Represents one reconciliation run.
///
/// A SyncJob encompasses:
/// - The configuration it runs with
/// - The previous manifest and the local listing it was compared against
/// - The plan derived from them
/// - Per-operation results and non-fatal issues
#[derive(Debug)]
pub struct SyncJob {
    /// Unique identifier for this run
    pub id: Uuid,

    pub config: SyncConfig,

    /// Current lifecycle state
    pub state: SyncState,

    /// Manifest fetched from the remote side (empty if unavailable)
    pub previous_manifest: Manifest,

    /// Scanned local tree, sorted parent before child
    pub nodes: Vec<LocalNode>,

    /// Set once the job reaches `Classified`
    pub plan: Option<SyncPlan>,

    /// Tree operations attempted so far
    pub records: Vec<OperationRecord>,

    /// Non-fatal problems encountered so far
    pub issues: Vec<SyncIssue>,

    /// When job was created
    pub created_at: DateTime<Utc>,

    /// When applying operations started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run reached its final state
    pub finished_at: Option<DateTime<Utc>>,

    cancel: CancelToken,
}

impl SyncJob {
    pub(crate) fn new(config: SyncConfig) -> Self {
        SyncJob {
            id: Uuid::new_v4(),
            config,
            state: SyncState::Init,
            previous_manifest: Manifest::new(),
            nodes: Vec::new(),
            plan: None,
            records: Vec::new(),
            issues: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            cancel: CancelToken::new(),
        }
    }

    /// Token that stops the run before its next remote operation.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
