//! Error types for the deploy engine.
//!
//! `EngineError` represents job-level failures that stop a sync run before or
//! during planning. Everything that can go wrong for a single item (one upload,
//! one unreadable file, the manifest fetch) is recorded as a
//! [`SyncIssue`](crate::model::SyncIssue) on the job instead, and the run
//! carries on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::SyncState;

/// Errors that abort a sync run.
///
/// Only local-side problems end up here; no remote mutation has happened yet
/// when any of these is returned.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Local root directory does not exist
    #[error("Local root not found: {}", path.display())]
    RootNotFound { path: PathBuf },

    /// Local root exists but is a file or something else
    #[error("Local root is not a directory: {}", path.display())]
    RootNotADirectory { path: PathBuf },

    /// Local root exists but cannot be inspected
    #[error("Local root is not accessible: {}", path.display())]
    RootAccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A directory below the local root could not be listed
    #[error("Failed to scan directory: {}", path.display())]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The exclude pattern file could not be read
    #[error("Could not read exclude file: {}", path.display())]
    ExcludeFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file could not be read
    #[error("Could not read config file: {}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for this tool
    #[error("Invalid config file {}: {source}", path.display())]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A job function was called out of order
    #[error("Job must be in {expected:?} state; current state: {actual:?}")]
    InvalidState { expected: SyncState, actual: SyncState },
}

impl EngineError {
    /// True for failures detected while walking the local tree.
    pub fn is_scan_error(&self) -> bool {
        matches!(
            self,
            Self::RootNotFound { .. }
                | Self::RootNotADirectory { .. }
                | Self::RootAccessDenied { .. }
                | Self::ScanFailed { .. }
        )
    }
}

/// A failed primitive against the remote tree.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote path does not exist
    #[error("Remote path not found: {path}")]
    NotFound { path: String },

    /// The remote path is already taken by the kind of node being created
    #[error("Remote path already exists: {path}")]
    AlreadyExists { path: String },

    /// The remote path is not acceptable for this transport
    #[error("Invalid remote path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The transfer or filesystem call itself failed
    #[error("Remote operation on '{path}' failed: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The local side of a transfer could not be read
    #[error("Could not read local file {}: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The transport has no usable connection
    #[error("Remote unavailable: {message}")]
    Unavailable { message: String },
}

impl RemoteError {
    /// Map an I/O failure on `path`, folding `NotFound` and `AlreadyExists`
    /// into their own variants.
    pub fn from_io(path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => RemoteError::NotFound { path },
            io::ErrorKind::AlreadyExists => RemoteError::AlreadyExists { path },
            _ => RemoteError::Io { path, source },
        }
    }
}
