//! Run configuration.
//!
//! `SyncConfig` is what the engine consumes. It can be built in code or loaded
//! from a TOML file:
//!
//! ```toml
//! local_root = "site"
//! remote_root = "/htdocs"
//! manifest_path = "/htdocs/DEPLOY_CHECKSUMS"
//! exclude = [".git", "node_modules"]
//! exclude_file = "deploy.exclude"
//! algorithm = "md5"
//! manifest_policy = "track-failures"
//! ```
//!
//! Relative `exclude_file` paths are resolved against the config file's
//! directory.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::digest::DigestAlgorithm;
use crate::error::EngineError;
use crate::scan::ExcludeSet;

/// Default name of the manifest on the remote side.
pub const DEFAULT_MANIFEST_PATH: &str = "DEPLOY_CHECKSUMS";

/// What to record for operations that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestPolicy {
    /// Record the planned state, including items whose operation failed.
    /// Failed uploads are then not retried until the file changes again.
    Legacy,
    /// Fold failed and cancelled operations back to their previous state so
    /// the next run retries them.
    #[default]
    TrackFailures,
}

/// Everything a sync run needs besides the transport.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local directory to deploy
    pub local_root: PathBuf,

    /// Remote directory the local root maps onto
    pub remote_root: String,

    /// Remote manifest location (not joined to `remote_root`)
    pub manifest_path: String,

    pub excludes: ExcludeSet,

    pub algorithm: DigestAlgorithm,

    pub manifest_policy: ManifestPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            local_root: PathBuf::from("."),
            remote_root: ".".to_string(),
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
            excludes: ExcludeSet::default(),
            algorithm: DigestAlgorithm::default(),
            manifest_policy: ManifestPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn new(local_root: impl Into<PathBuf>, remote_root: impl Into<String>) -> Self {
        SyncConfig {
            local_root: local_root.into(),
            remote_root: remote_root.into(),
            ..Self::default()
        }
    }

    /// Load a config file, starting from the defaults.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|e| EngineError::ConfigUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: FileConfig = toml::from_str(&content).map_err(|e| EngineError::ConfigInvalid {
            path: path.to_path_buf(),
            source: e,
        })?;

        let base = path.parent().unwrap_or(Path::new(""));
        let mut config = SyncConfig::default();
        file.apply(&mut config, base)?;
        Ok(config)
    }
}

/// On-disk shape of the config file; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    local_root: Option<PathBuf>,
    remote_root: Option<String>,
    manifest_path: Option<String>,
    #[serde(default)]
    exclude: Vec<String>,
    exclude_file: Option<PathBuf>,
    algorithm: Option<DigestAlgorithm>,
    manifest_policy: Option<ManifestPolicy>,
}

impl FileConfig {
    fn apply(self, config: &mut SyncConfig, base: &Path) -> Result<(), EngineError> {
        if let Some(local_root) = self.local_root {
            config.local_root = base.join(local_root);
        }
        if let Some(remote_root) = self.remote_root {
            config.remote_root = remote_root;
        }
        if let Some(manifest_path) = self.manifest_path {
            config.manifest_path = manifest_path;
        }
        if let Some(exclude_file) = self.exclude_file {
            let from_file = ExcludeSet::from_file(&base.join(exclude_file))?;
            config.excludes.extend(from_file.patterns().iter().cloned());
        }
        config.excludes.extend(self.exclude);
        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        if let Some(policy) = self.manifest_policy {
            config.manifest_policy = policy;
        }
        Ok(())
    }
}
