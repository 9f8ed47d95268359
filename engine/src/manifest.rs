//! The checksum manifest and its line-oriented text format.
//!
//! A manifest maps each synchronized path (relative, `/`-separated) to the
//! digest it had when it was last deployed. Directories carry the all-zero
//! sentinel. On disk every record is one line:
//!
//! ```text
//! 5d41402abc4b2a76b9719d911017c592 docs/hello.txt
//! 00000000000000000000000000000000 docs
//! ```

use std::collections::HashMap;

use crate::digest::{Digest, DigestAlgorithm};

/// One `path -> digest` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub digest: Digest,
}

/// Insertion-ordered set of entries with unique paths.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    index: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the digest for `path`.
    ///
    /// A replaced entry keeps its original position.
    pub fn insert(&mut self, path: impl Into<String>, digest: Digest) {
        let path = path.into();
        match self.index.get(&path) {
            Some(&i) => self.entries[i].digest = digest,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push(ManifestEntry { path, digest });
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&Digest> {
        self.index.get(path).map(|&i| &self.entries[i].digest)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Drop the entry for `path`, returning its digest.
    pub fn remove(&mut self, path: &str) -> Option<Digest> {
        let i = self.index.remove(path)?;
        let entry = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(entry.digest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }
}

impl PartialEq for Manifest {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Manifest {}

impl FromIterator<(String, Digest)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, Digest)>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for (path, digest) in iter {
            manifest.insert(path, digest);
        }
        manifest
    }
}

/// Parse a manifest written with `algorithm`.
///
/// Lines that do not start with a token of the algorithm's width followed by
/// whitespace and a path are ignored, so truncated or hand-edited files still
/// yield whatever records are intact. A later duplicate of a path overrides the
/// earlier digest.
pub fn decode(raw: &[u8], algorithm: DigestAlgorithm) -> Manifest {
    let text = String::from_utf8_lossy(raw);
    let width = algorithm.hex_len();
    let mut manifest = Manifest::new();

    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some((digest, path)) = parse_line(line, width) {
            manifest.insert(path, Digest::new(digest));
        }
    }

    manifest
}

fn parse_line(line: &str, width: usize) -> Option<(&str, &str)> {
    let split = line.char_indices().nth(width).map(|(i, _)| i)?;
    let (digest, rest) = line.split_at(split);
    if digest.chars().any(char::is_whitespace) {
        return None;
    }
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let path = rest.trim_start();
    if path.is_empty() {
        return None;
    }
    Some((digest, path))
}

/// Serialize a manifest, one `"<digest> <path>\n"` line per entry in order.
pub fn encode(manifest: &Manifest) -> Vec<u8> {
    let mut out = String::new();
    for entry in manifest.iter() {
        out.push_str(entry.digest.as_str());
        out.push(' ');
        out.push_str(&entry.path);
        out.push('\n');
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::digest_bytes;
    use proptest::prelude::*;

    const MD5_HELLO: &str = "5d41402abc4b2a76b9719d911017c592";
    const DIR: &str = "00000000000000000000000000000000";

    #[test]
    fn test_decode_legacy_file() {
        let raw = format!("{MD5_HELLO} a.txt\n{DIR}\tdir\n{MD5_HELLO}   dir/b c.txt\n");
        let manifest = decode(raw.as_bytes(), DigestAlgorithm::Md5);

        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.get("a.txt").map(Digest::as_str), Some(MD5_HELLO));
        assert!(manifest.get("dir").is_some_and(Digest::is_directory));
        assert_eq!(manifest.get("dir/b c.txt").map(Digest::as_str), Some(MD5_HELLO));
    }

    #[test]
    fn test_decode_skips_malformed_lines() {
        let raw = format!(
            "garbage\n\n{MD5_HELLO}\n{MD5_HELLO}nospace\nshort a.txt\n{MD5_HELLO} ok.txt\r\n{DIR}    \n"
        );
        let manifest = decode(raw.as_bytes(), DigestAlgorithm::Md5);

        assert_eq!(manifest.len(), 1);
        assert!(manifest.contains("ok.txt"));
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode(b"", DigestAlgorithm::Md5).is_empty());
    }

    #[test]
    fn test_decode_duplicate_keeps_first_position_last_digest() {
        let raw = format!("{MD5_HELLO} a\n{DIR} b\n{DIR} a\n");
        let manifest = decode(raw.as_bytes(), DigestAlgorithm::Md5);

        let paths: Vec<_> = manifest.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);
        assert!(manifest.get("a").is_some_and(Digest::is_directory));
    }

    #[test]
    fn test_decode_with_other_width_ignores_md5_lines() {
        let raw = format!("{MD5_HELLO} a.txt\n");
        assert!(decode(raw.as_bytes(), DigestAlgorithm::Sha256).is_empty());
    }

    #[test]
    fn test_encode_preserves_insertion_order() {
        let mut manifest = Manifest::new();
        manifest.insert("z.txt", Digest::new(MD5_HELLO));
        manifest.insert("a", Digest::directory(DigestAlgorithm::Md5));

        let text = String::from_utf8(encode(&manifest)).expect("utf-8");
        assert_eq!(text, format!("{MD5_HELLO} z.txt\n{DIR} a\n"));
    }

    #[test]
    fn test_round_trip() {
        let manifest: Manifest = vec![
            ("docs".to_string(), Digest::directory(DigestAlgorithm::Sha256)),
            ("docs/read me.md".to_string(), digest_bytes(b"readme", DigestAlgorithm::Sha256)),
            ("Ünïcode.txt".to_string(), digest_bytes(b"u", DigestAlgorithm::Sha256)),
        ]
        .into_iter()
        .collect();

        let decoded = decode(&encode(&manifest), DigestAlgorithm::Sha256);
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut manifest = Manifest::new();
        manifest.insert("a", Digest::new(MD5_HELLO));
        manifest.insert("b", Digest::new(DIR));
        manifest.insert("c", Digest::new(MD5_HELLO));

        assert_eq!(manifest.remove("a").map(|d| d.to_string()), Some(MD5_HELLO.to_string()));
        assert_eq!(manifest.remove("a"), None);
        assert_eq!(manifest.len(), 2);
        assert!(manifest.get("c").is_some());

        manifest.insert("c", Digest::new(DIR));
        let paths: Vec<_> = manifest.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["b", "c"]);
        assert!(manifest.get("c").is_some_and(Digest::is_directory));
    }

    proptest! {
        #[test]
        fn test_round_trip_any_manifest(
            entries in prop::collection::vec(
                ("[a-zA-Z0-9_.é-][a-zA-Z0-9_. é/-]{0,24}", "[0-9a-f]{32}"),
                0..24,
            )
        ) {
            let manifest: Manifest = entries
                .into_iter()
                .map(|(path, hex)| (path, Digest::new(hex)))
                .collect();

            let decoded = decode(&encode(&manifest), DigestAlgorithm::Md5);
            prop_assert_eq!(decoded, manifest);
        }
    }
}
