//! Content digests used for change detection.
//!
//! This module provides:
//! - The digest algorithms a manifest can be written with (MD5, SHA-256, BLAKE3)
//! - File-level digest computation
//! - The all-zero sentinel that marks directories in a manifest
//!
//! Digests only detect changes between runs; they are not an integrity check.

use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// MD5, the format of existing checksum files
    #[default]
    Md5,
    /// SHA-256 (256-bit)
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl DigestAlgorithm {
    /// Parse algorithm from string
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }

    /// Width of the hex token this algorithm produces.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 | Self::Blake3 => 64,
        }
    }
}

/// A lowercase hex digest token as stored in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest(String);

impl Digest {
    /// Wrap an already formatted token.
    pub fn new(hex: impl Into<String>) -> Self {
        Digest(hex.into())
    }

    /// The directory sentinel for `algorithm`: all zeros, full token width.
    pub fn directory(algorithm: DigestAlgorithm) -> Self {
        Digest("0".repeat(algorithm.hex_len()))
    }

    pub fn is_directory(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental hashing over one of the supported algorithms.
enum Hasher {
    Md5(md5::Context),
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
            DigestAlgorithm::Sha256 => Hasher::Sha256(sha2::Sha256::default()),
            DigestAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(context) => context.consume(data),
            Hasher::Sha256(hasher) => {
                use sha2::Digest as _;
                hasher.update(data);
            }
            Hasher::Blake3(hasher) => {
                hasher.update(data);
            }
        }
    }

    fn finalize(self) -> Digest {
        match self {
            Hasher::Md5(context) => Digest(format!("{:x}", context.compute())),
            Hasher::Sha256(hasher) => {
                use sha2::Digest as _;
                Digest(format!("{:x}", hasher.finalize()))
            }
            Hasher::Blake3(hasher) => Digest(hasher.finalize().to_hex().to_string()),
        }
    }
}

/// Digest an in-memory buffer.
pub fn digest_bytes(data: &[u8], algorithm: DigestAlgorithm) -> Digest {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Compute the digest of a file's content.
///
/// The file is streamed in 64 KiB blocks. An empty file digests as empty input.
pub fn compute_file_digest(path: &Path, algorithm: DigestAlgorithm) -> io::Result<Digest> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_algorithm_display() {
        assert_eq!(DigestAlgorithm::Md5.to_string(), "md5");
        assert_eq!(DigestAlgorithm::Sha256.to_string(), "sha256");
        assert_eq!(DigestAlgorithm::Blake3.to_string(), "blake3");
    }

    #[test]
    fn test_algorithm_from_name() {
        assert_eq!(DigestAlgorithm::from_name("MD5"), Some(DigestAlgorithm::Md5));
        assert_eq!(DigestAlgorithm::from_name("sha256"), Some(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::from_name("blake3"), Some(DigestAlgorithm::Blake3));
        assert_eq!(DigestAlgorithm::from_name("crc32"), None);
    }

    #[test]
    fn test_md5_digest() {
        let digest = digest_bytes(b"hello", DigestAlgorithm::Md5);
        assert_eq!(digest.as_str(), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_sha256_digest() {
        let digest = digest_bytes(b"hello", DigestAlgorithm::Sha256);
        assert_eq!(
            digest.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_blake3_digest_width() {
        let digest = digest_bytes(b"hello", DigestAlgorithm::Blake3);
        assert_eq!(digest.as_str().len(), DigestAlgorithm::Blake3.hex_len());
        assert_eq!(digest, digest_bytes(b"hello", DigestAlgorithm::Blake3));
    }

    #[test]
    fn test_directory_sentinel() {
        let sentinel = Digest::directory(DigestAlgorithm::Md5);
        assert_eq!(sentinel.as_str(), "00000000000000000000000000000000");
        assert!(sentinel.is_directory());
        assert_eq!(Digest::directory(DigestAlgorithm::Sha256).as_str().len(), 64);
        assert!(!digest_bytes(b"x", DigestAlgorithm::Md5).is_directory());
        assert!(!Digest::new("").is_directory());
    }

    #[test]
    fn test_file_digest_matches_buffer_digest() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("data.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut file = File::create(&path).expect("Failed to create file");
        file.write_all(&content).expect("Failed to write file");
        drop(file);

        let from_file = compute_file_digest(&path, DigestAlgorithm::Sha256)
            .expect("Digest should succeed");
        assert_eq!(from_file, digest_bytes(&content, DigestAlgorithm::Sha256));
    }

    #[test]
    fn test_empty_file_digest() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("empty.txt");
        File::create(&path).expect("Failed to create file");

        let digest = compute_file_digest(&path, DigestAlgorithm::Md5).expect("Digest should succeed");
        assert_eq!(digest.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = compute_file_digest(&temp_dir.path().join("missing"), DigestAlgorithm::Md5);
        assert!(result.is_err());
    }
}
