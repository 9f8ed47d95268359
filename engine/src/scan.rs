//! Local tree enumeration.
//!
//! Walks the local root, drops excluded paths and returns every remaining file
//! and directory as a path relative to the root, sorted so that a directory
//! always comes before anything inside it.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::model::LocalNode;

/// Ordered substring patterns.
///
/// A relative path is excluded when any pattern occurs anywhere in it. This is
/// plain substring matching, not globbing: `"tmp"` excludes `"tmp"`,
/// `"a/tmp/b"` and `"attempt.txt"` alike. Each path is tested on its own, so
/// excluding a directory does not by itself exclude its children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeSet {
    patterns: Vec<String>,
}

impl ExcludeSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = ExcludeSet::default();
        set.extend(patterns);
        set
    }

    /// Read one pattern per line; blank lines are skipped.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|e| EngineError::ExcludeFileUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::new(
            content.lines().map(|line| line.strip_suffix('\r').unwrap_or(line)),
        ))
    }

    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // An empty pattern would match every path.
        self.patterns
            .extend(patterns.into_iter().map(Into::into).filter(|p| !p.is_empty()));
    }

    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.patterns.iter().any(|p| relative_path.contains(p.as_str()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Enumerate the local tree below `root`.
///
/// # Errors
/// Any directory that cannot be listed, the root included, fails the whole
/// scan: removals are derived from what is missing here, so a partial listing
/// would delete remote files that still exist locally.
pub fn scan(root: &Path, excludes: &ExcludeSet) -> Result<Vec<LocalNode>, EngineError> {
    check_root(root)?;

    let mut nodes = Vec::new();
    recurse(root, "", excludes, &mut nodes)?;
    nodes.sort_by(|a, b| natural_cmp(&a.path, &b.path));

    debug!(root = %root.display(), count = nodes.len(), "Local tree scanned");
    Ok(nodes)
}

/// Check that `root` exists and is a directory.
pub fn check_root(root: &Path) -> Result<(), EngineError> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::RootNotADirectory {
            path: root.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(EngineError::RootNotFound {
            path: root.to_path_buf(),
        }),
        Err(e) => Err(EngineError::RootAccessDenied {
            path: root.to_path_buf(),
            source: e,
        }),
    }
}

fn recurse(
    dir: &Path,
    rel_dir: &str,
    excludes: &ExcludeSet,
    nodes: &mut Vec<LocalNode>,
) -> Result<(), EngineError> {
    let scan_failed = |source: io::Error| EngineError::ScanFailed {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(scan_failed)? {
        let entry = entry.map_err(scan_failed)?;
        let file_type = entry.file_type().map_err(scan_failed)?;

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            warn!(path = %entry.path().display(), "Skipping entry with non UTF-8 name");
            continue;
        };
        let rel_path = if rel_dir.is_empty() {
            name.to_string()
        } else {
            format!("{rel_dir}/{name}")
        };

        let node = if file_type.is_dir() {
            LocalNode::directory(rel_path)
        } else {
            LocalNode::file(rel_path)
        };

        // Descend before deciding on this node; exclusion is per path.
        if node.is_dir() {
            recurse(&entry.path(), &node.path, excludes, nodes)?;
        }

        if excludes.is_excluded(&node.path) {
            debug!(path = %node.path, "Excluded");
            continue;
        }
        nodes.push(node);
    }

    Ok(())
}

/// Absolute local path for a node path relative to `root`.
pub fn local_path(root: &Path, relative_path: &str) -> PathBuf {
    relative_path
        .split('/')
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Natural, case-insensitive path ordering.
///
/// Runs of ASCII digits compare by numeric value (`file2` < `file10`), other
/// characters compare case-insensitively. Paths equal under those rules fall
/// back to exact byte order so the result is total. A path is always ordered
/// before any path it is a prefix of, so parents precede their children.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = take_digits(&mut left);
                let r_run = take_digits(&mut right);
                let ord = cmp_digit_runs(&l_run, &r_run);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_ascii_lowercase().cmp(&r.to_ascii_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn cmp_digit_runs(l: &str, r: &str) -> Ordering {
    let l = l.trim_start_matches('0');
    let r = r.trim_start_matches('0');
    l.len().cmp(&r.len()).then_with(|| l.cmp(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;
    use std::fs::File;
    use std::io::Write;

    fn paths(nodes: &[LocalNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.path.as_str()).collect()
    }

    #[test]
    fn test_scan_nested_tree() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("dir/sub")).expect("Failed to create dirs");
        File::create(root.join("a.txt")).expect("Failed to create a.txt");
        let mut b = File::create(root.join("dir/b.txt")).expect("Failed to create b.txt");
        b.write_all(b"b").expect("Failed to write b.txt");
        File::create(root.join("dir/sub/c.txt")).expect("Failed to create c.txt");

        let nodes = scan(root, &ExcludeSet::default()).expect("Failed to scan");

        assert_eq!(
            paths(&nodes),
            vec!["a.txt", "dir", "dir/b.txt", "dir/sub", "dir/sub/c.txt"]
        );
        let dirs: Vec<_> = nodes.iter().filter(|n| n.kind == NodeKind::Directory).collect();
        assert_eq!(dirs.len(), 2);
    }

    #[test]
    fn test_scan_excludes_by_substring() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("cache/inner")).expect("Failed to create dirs");
        fs::create_dir_all(root.join("src")).expect("Failed to create src");
        File::create(root.join("cache/inner/x.bin")).expect("Failed to create x.bin");
        File::create(root.join("src/main.rs")).expect("Failed to create main.rs");
        File::create(root.join("src/cached.rs")).expect("Failed to create cached.rs");

        let excludes = ExcludeSet::new(["cache"]);
        let nodes = scan(root, &excludes).expect("Failed to scan");
        assert_eq!(paths(&nodes), vec!["src", "src/main.rs"]);

        // Only the children match "cache/", the directory itself survives.
        let excludes = ExcludeSet::new(["cache/"]);
        let nodes = scan(root, &excludes).expect("Failed to scan");
        assert_eq!(paths(&nodes), vec!["cache", "src", "src/cached.rs", "src/main.rs"]);
    }

    #[test]
    fn test_scan_missing_root() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = scan(&temp_dir.path().join("nonexistent"), &ExcludeSet::default());
        assert!(matches!(result, Err(EngineError::RootNotFound { .. })));
    }

    #[test]
    fn test_scan_file_as_root() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("file.txt");
        File::create(&file).expect("Failed to create file");

        let result = scan(&file, &ExcludeSet::default());
        assert!(matches!(result, Err(EngineError::RootNotADirectory { .. })));
        assert!(matches!(check_root(&file), Err(EngineError::RootNotADirectory { .. })));
        assert!(check_root(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_scan_empty_root() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let nodes = scan(temp_dir.path(), &ExcludeSet::default()).expect("Failed to scan");
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_exclude_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("excludes");
        fs::write(&path, ".git\r\n\nnode_modules\n").expect("Failed to write excludes");

        let excludes = ExcludeSet::from_file(&path).expect("Failed to read excludes");
        assert_eq!(excludes.patterns(), &[".git".to_string(), "node_modules".to_string()]);
        assert!(excludes.is_excluded("web/node_modules/x.js"));
        assert!(!excludes.is_excluded("web/index.js"));

        let missing = ExcludeSet::from_file(&temp_dir.path().join("missing"));
        assert!(matches!(missing, Err(EngineError::ExcludeFileUnreadable { .. })));
    }

    #[test]
    fn test_empty_patterns_are_dropped() {
        let excludes = ExcludeSet::new(["", "x"]);
        assert_eq!(excludes.patterns().len(), 1);
        assert!(!excludes.is_excluded("abc"));
    }

    #[test]
    fn test_natural_cmp() {
        let mut names = vec!["file10", "File2", "dir/b", "dir", "Dir-x", "file1", "a"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["a", "dir", "Dir-x", "dir/b", "file1", "File2", "file10"]);
    }

    #[test]
    fn test_natural_cmp_parent_first() {
        for (parent, child) in [("a", "a/b"), ("v2", "v2/x"), ("Docs", "Docs/A"), ("a1", "a1/0")] {
            assert_eq!(natural_cmp(parent, child), Ordering::Less, "{parent} vs {child}");
        }
        assert_ne!(natural_cmp("a", "A"), Ordering::Equal);
    }

    #[test]
    fn test_local_path_joins_components() {
        let path = local_path(Path::new("/srv/site"), "dir/sub/file.txt");
        assert_eq!(path, Path::new("/srv/site").join("dir").join("sub").join("file.txt"));
    }
}
