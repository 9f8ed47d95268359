//! Remote filesystem capability.
//!
//! The engine never talks to a transport directly. Anything that can fetch,
//! store and delete files and create and delete directories on the deploy
//! target implements [`RemoteFilesystem`]; an FTP or SFTP session would be one
//! implementation, [`LocalDirRemote`] (a local or mounted directory) is the one
//! shipped here.
//!
//! Remote paths are plain `/`-separated strings interpreted by the transport.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

use crate::error::RemoteError;

/// Primitive operations against the remote tree.
///
/// Every method is a single attempt; the engine never retries.
pub trait RemoteFilesystem {
    /// Download the content of a remote file.
    fn get(&mut self, remote_path: &str) -> Result<Vec<u8>, RemoteError>;

    /// Upload a local file, replacing any existing remote file.
    /// The remote parent directory must already exist.
    fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<(), RemoteError>;

    /// Delete a remote file.
    fn remove(&mut self, remote_path: &str) -> Result<(), RemoteError>;

    /// Create a single remote directory (not recursive).
    fn mkdir(&mut self, remote_path: &str) -> Result<(), RemoteError>;

    /// Delete an empty remote directory; a non-empty one is an error.
    fn rmdir(&mut self, remote_path: &str) -> Result<(), RemoteError>;
}

/// Join a relative node path onto the remote root.
pub fn remote_path(root: &str, relative: &str) -> String {
    if root.is_empty() {
        return relative.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), relative)
}

/// A deploy target that is a directory on this machine, such as a mounted
/// share or a staging copy.
///
/// Remote paths are resolved below the base directory. Leading `/` and `.`
/// components are ignored and `..` is rejected, so nothing outside the base
/// can be touched.
#[derive(Debug, Clone)]
pub struct LocalDirRemote {
    base: PathBuf,
}

impl LocalDirRemote {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, RemoteError> {
        let base = base.into();
        match fs::metadata(&base) {
            Ok(metadata) if metadata.is_dir() => Ok(LocalDirRemote { base }),
            Ok(_) => Err(RemoteError::Unavailable {
                message: format!("target is not a directory: {}", base.display()),
            }),
            Err(e) => Err(RemoteError::Unavailable {
                message: format!("cannot open target {}: {e}", base.display()),
            }),
        }
    }

    fn resolve(&self, remote_path: &str) -> Result<PathBuf, RemoteError> {
        let mut path = self.base.clone();
        for part in remote_path.split('/') {
            match part {
                "" | "." => continue,
                ".." => {
                    return Err(RemoteError::InvalidPath {
                        path: remote_path.to_string(),
                        reason: "parent components are not allowed".to_string(),
                    })
                }
                part => path.push(part),
            }
        }
        if path == self.base {
            return Err(RemoteError::InvalidPath {
                path: remote_path.to_string(),
                reason: "path resolves to the target root".to_string(),
            });
        }
        Ok(path)
    }
}

impl RemoteFilesystem for LocalDirRemote {
    fn get(&mut self, remote_path: &str) -> Result<Vec<u8>, RemoteError> {
        let path = self.resolve(remote_path)?;
        trace!(path = %path.display(), "get");
        fs::read(&path).map_err(|e| RemoteError::from_io(remote_path, e))
    }

    fn put(&mut self, local_path: &Path, remote_path: &str) -> Result<(), RemoteError> {
        let dst = self.resolve(remote_path)?;
        trace!(src = %local_path.display(), dst = %dst.display(), "put");

        let local_read = |source: io::Error| RemoteError::LocalRead {
            path: local_path.to_path_buf(),
            source,
        };
        let mut src_file = fs::File::open(local_path).map_err(local_read)?;
        let src_mtime = src_file.metadata().map_err(local_read)?.modified().ok();

        let mut dst_file =
            fs::File::create(&dst).map_err(|e| RemoteError::from_io(remote_path, e))?;
        io::copy(&mut src_file, &mut dst_file).map_err(|e| RemoteError::Io {
            path: remote_path.to_string(),
            source: e,
        })?;
        drop(dst_file);

        // Keep the deployed copy's mtime in step with the source.
        if let Some(mtime) = src_mtime {
            let mtime = filetime::FileTime::from_system_time(mtime);
            if let Err(e) = filetime::set_file_mtime(&dst, mtime) {
                warn!(path = %dst.display(), "Could not set modification time: {e}");
            }
        }
        Ok(())
    }

    fn remove(&mut self, remote_path: &str) -> Result<(), RemoteError> {
        let path = self.resolve(remote_path)?;
        trace!(path = %path.display(), "remove");
        fs::remove_file(&path).map_err(|e| RemoteError::from_io(remote_path, e))
    }

    fn mkdir(&mut self, remote_path: &str) -> Result<(), RemoteError> {
        let path = self.resolve(remote_path)?;
        trace!(path = %path.display(), "mkdir");
        fs::create_dir(&path).map_err(|e| {
            // Only an existing directory counts as already created.
            if e.kind() == io::ErrorKind::AlreadyExists && !path.is_dir() {
                RemoteError::Io {
                    path: remote_path.to_string(),
                    source: e,
                }
            } else {
                RemoteError::from_io(remote_path, e)
            }
        })
    }

    fn rmdir(&mut self, remote_path: &str) -> Result<(), RemoteError> {
        let path = self.resolve(remote_path)?;
        trace!(path = %path.display(), "rmdir");
        fs::remove_dir(&path).map_err(|e| RemoteError::from_io(remote_path, e))
    }
}
