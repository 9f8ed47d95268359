//! Classification of the local tree against the previous manifest.
//!
//! Pure functions only: the digests of local files are computed by the caller
//! and handed in as [`Observation`]s, so every rule here can be exercised
//! without touching a filesystem.

use std::collections::HashSet;

use crate::config::ManifestPolicy;
use crate::digest::{Digest, DigestAlgorithm};
use crate::manifest::Manifest;
use crate::model::{Operation, OperationKind, OperationRecord};
use crate::scan::natural_cmp;

/// What was found at a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Directory,
    File(Digest),
    /// The file exists but its content could not be read
    Unreadable(String),
}

/// A scanned path together with its observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedNode {
    pub path: String,
    pub observation: Observation,
}

/// The operations needed to bring the remote tree in line with the local one.
///
/// The four operation lists are disjoint and are applied strictly in field
/// order, see [`SyncPlan::operations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// New directories, parent before child
    pub dirs_to_create: Vec<String>,
    /// New or modified files, in scan order
    pub files_to_upload: Vec<String>,
    /// Files known to the previous manifest but gone locally or replaced by
    /// a directory
    pub files_to_remove: Vec<String>,
    /// Directories gone locally or replaced by a file, deepest first
    pub dirs_to_remove: Vec<String>,
    /// Local paths that need no remote change
    pub unchanged: Vec<String>,
    /// Unreadable files left out of this run
    pub skipped: Vec<String>,
    /// Manifest describing the remote tree once every operation succeeded
    pub next_manifest: Manifest,
}

impl SyncPlan {
    /// All operations in apply order: create directories, upload files,
    /// remove files, remove directories.
    pub fn operations(&self) -> Vec<Operation> {
        let with = |kind: OperationKind, paths: &[String]| {
            paths
                .iter()
                .map(move |p| Operation::new(kind, p.clone()))
                .collect::<Vec<_>>()
        };

        let mut ops = with(OperationKind::CreateDir, &self.dirs_to_create);
        ops.extend(with(OperationKind::Upload, &self.files_to_upload));
        ops.extend(with(OperationKind::RemoveFile, &self.files_to_remove));
        ops.extend(with(OperationKind::RemoveDir, &self.dirs_to_remove));
        ops
    }

    pub fn operation_count(&self) -> usize {
        self.dirs_to_create.len()
            + self.files_to_upload.len()
            + self.files_to_remove.len()
            + self.dirs_to_remove.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    /// The manifest to persist after applying, given what actually happened.
    ///
    /// Under [`ManifestPolicy::TrackFailures`] every operation that did not
    /// succeed is reverted to the state the previous manifest recorded, so the
    /// result describes the remote tree rather than the plan.
    ///
    /// When a path changed kind, a failed creation drops the entry and a
    /// failed removal of the old node restores it, so the next run repeats
    /// the whole replacement.
    pub fn manifest_after(
        &self,
        previous: &Manifest,
        records: &[OperationRecord],
        policy: ManifestPolicy,
    ) -> Manifest {
        let mut manifest = self.next_manifest.clone();
        if policy == ManifestPolicy::Legacy {
            return manifest;
        }

        for record in records.iter().filter(|r| !r.outcome.is_success()) {
            let path = record.operation.path.as_str();
            match record.operation.kind {
                OperationKind::CreateDir => {
                    manifest.remove(path);
                }
                OperationKind::Upload => match previous.get(path) {
                    Some(digest) if !digest.is_directory() => {
                        manifest.insert(path, digest.clone())
                    }
                    _ => {
                        manifest.remove(path);
                    }
                },
                OperationKind::RemoveFile | OperationKind::RemoveDir => {
                    // A replacement created at this path owns the entry.
                    if manifest.contains(path) {
                        continue;
                    }
                    if let Some(digest) = previous.get(path) {
                        manifest.insert(path, digest.clone());
                    }
                }
                OperationKind::PersistManifest => {}
            }
        }

        manifest
    }
}

/// Classify observed local nodes against the previous manifest.
///
/// `observed` must be in scan order (parent before child); the plan keeps that
/// order for creations and uploads. Paths in `previous` that no observed node
/// accounts for, including paths that still exist but are now excluded, are
/// scheduled for removal.
///
/// A node only accounts for a manifest entry of its own kind. A directory
/// found where a file was recorded is created anew and the file is removed,
/// and likewise the other way round. Since removals run last, the creation
/// fails on the first run and succeeds on the next.
pub fn build_plan(
    previous: &Manifest,
    observed: &[ObservedNode],
    algorithm: DigestAlgorithm,
) -> SyncPlan {
    let sentinel = Digest::directory(algorithm);
    let mut plan = SyncPlan::default();
    let mut accounted: HashSet<&str> = HashSet::new();

    for node in observed {
        let path = node.path.as_str();
        let recorded = previous.get(path).filter(|digest| match node.observation {
            Observation::Directory => digest.is_directory(),
            Observation::File(_) => !digest.is_directory(),
            Observation::Unreadable(_) => true,
        });
        if recorded.is_some() {
            accounted.insert(path);
        }

        match (&node.observation, recorded) {
            (Observation::Directory, Some(_)) => {
                plan.unchanged.push(node.path.clone());
                plan.next_manifest.insert(path, sentinel.clone());
            }
            (Observation::Directory, None) => {
                plan.dirs_to_create.push(node.path.clone());
                plan.next_manifest.insert(path, sentinel.clone());
            }
            (Observation::File(digest), Some(old)) => {
                if digest == old {
                    plan.unchanged.push(node.path.clone());
                } else {
                    plan.files_to_upload.push(node.path.clone());
                }
                plan.next_manifest.insert(path, digest.clone());
            }
            (Observation::File(digest), None) => {
                plan.files_to_upload.push(node.path.clone());
                plan.next_manifest.insert(path, digest.clone());
            }
            // Abstain: keep whatever the remote side is known to have.
            (Observation::Unreadable(_), Some(old)) => {
                plan.skipped.push(node.path.clone());
                plan.next_manifest.insert(path, old.clone());
            }
            (Observation::Unreadable(_), None) => {
                plan.skipped.push(node.path.clone());
            }
        }
    }

    for entry in previous.iter() {
        if accounted.contains(entry.path.as_str()) {
            continue;
        }
        if entry.digest.is_directory() {
            plan.dirs_to_remove.push(entry.path.clone());
        } else {
            plan.files_to_remove.push(entry.path.clone());
        }
    }

    // Children strictly after their parents, then reversed: deepest first.
    plan.dirs_to_remove.sort_by(|a, b| natural_cmp(a, b));
    plan.dirs_to_remove.reverse();

    plan
}
