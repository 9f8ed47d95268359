//! # rdeploy Engine - Manifest-Based Deploy Library
//!
//! A headless engine that mirrors a local directory tree onto a remote one.
//! Designed as the foundation for multiple front ends (CLI, automation).
//!
//! ## Overview
//!
//! The remote side keeps a manifest of content digests describing what was
//! deployed last time. Each run compares the local tree against it and only
//! transfers what changed:
//! - New directories are created, parents before children
//! - New and modified files are uploaded
//! - Files and directories that disappeared locally are removed, children
//!   before parents
//! - The new manifest is uploaded once anything on the remote side changed
//!
//! Individual failures never stop a run; they are reported through the
//! [`ProgressSink`] and collected in the final [`SyncReport`].
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{create_job, plan_job, run_job, LocalDirRemote, SyncConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::new("site", "/htdocs");
//! let mut remote = LocalDirRemote::new("/mnt/webserver")?;
//!
//! // Load the previous manifest, scan and classify
//! let mut job = create_job(config)?;
//! plan_job(&mut job, &mut remote, None)?;
//! if let Some(plan) = &job.plan {
//!     println!("{} operations planned", plan.operation_count());
//! }
//!
//! // Apply the plan and persist the new manifest
//! let report = run_job(&mut job, &mut remote, None)?;
//! println!("{} succeeded, {} failed", report.succeeded, report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (SyncJob, Operation, SyncReport, enums)
//! - **error**: Error types and handling
//! - **config**: Run configuration and config file loading
//! - **digest**: Content digests and the directory sentinel
//! - **manifest**: The manifest and its text format
//! - **scan**: Local tree enumeration and exclude patterns
//! - **plan**: Classification of local nodes against the manifest
//! - **remote**: Remote filesystem capability and the local-directory transport
//! - **job**: Job orchestration (create, plan, run)
//! - **progress**: Progress sink trait

pub mod config;
pub mod digest;
pub mod error;
pub mod job;
pub mod manifest;
pub mod model;
pub mod plan;
pub mod progress;
pub mod remote;
pub mod scan;

// Re-export main types and functions
pub use config::{ManifestPolicy, SyncConfig, DEFAULT_MANIFEST_PATH};
pub use digest::{Digest, DigestAlgorithm};
pub use error::{EngineError, RemoteError};
pub use job::{create_job, plan_job, run_job, sync};
pub use manifest::{Manifest, ManifestEntry};
pub use model::{
    CancelToken, LocalNode, NodeKind, Operation, OperationKind, OperationRecord, Outcome,
    SyncIssue, SyncJob, SyncOutcome, SyncReport, SyncState,
};
pub use plan::SyncPlan;
pub use progress::ProgressSink;
pub use remote::{LocalDirRemote, RemoteFilesystem};
pub use scan::ExcludeSet;
