//! Checksum model: digest algorithms and their side-file conventions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Digest algorithms a layout may maintain side files for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 4] = [
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha512,
    ];

    /// Side-file extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Relative path of the side file belonging to `artifact_path`.
    pub fn side_file(&self, artifact_path: &str) -> String {
        format!("{}.{}", artifact_path, self.extension())
    }

    /// If `path` names a checksum side file, return the artifact path and algorithm.
    pub fn parse_side_file(path: &str) -> Option<(&str, DigestAlgorithm)> {
        Self::ALL.iter().find_map(|algorithm| {
            path.strip_suffix(algorithm.extension())
                .and_then(|rest| rest.strip_suffix('.'))
                .filter(|base| !base.is_empty() && !base.ends_with('/'))
                .map(|base| (base, *algorithm))
        })
    }

    pub fn is_side_file(path: &str) -> bool {
        Self::parse_side_file(path).is_some()
    }

    pub fn hasher(&self) -> Hasher {
        match self {
            Self::Md5 => Hasher::Md5(md5::Md5::new()),
            Self::Sha1 => Hasher::Sha1(Sha1::new()),
            Self::Sha256 => Hasher::Sha256(Sha256::new()),
            Self::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "MD5"),
            Self::Sha1 => write!(f, "SHA-1"),
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Sha512 => write!(f, "SHA-512"),
        }
    }
}

/// Incremental hasher for one algorithm.
pub enum Hasher {
    Md5(md5::Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => md5::Digest::update(h, data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    /// Lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(h) => format!("{:x}", md5::Digest::finalize(h)),
            Hasher::Sha1(h) => format!("{:x}", h.finalize()),
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Sha512(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Algorithm name → hex digest, one entry per algorithm of the owning layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChecksumSet(BTreeMap<DigestAlgorithm, String>);

impl ChecksumSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, algorithm: DigestAlgorithm, digest: String) {
        self.0.insert(algorithm, digest);
    }

    pub fn get(&self, algorithm: DigestAlgorithm) -> Option<&str> {
        self.0.get(&algorithm).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DigestAlgorithm, &str)> {
        self.0.iter().map(|(a, d)| (*a, d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compute every requested digest over an in-memory buffer.
    pub fn compute(algorithms: &[DigestAlgorithm], content: &[u8]) -> Self {
        let mut set = Self::new();
        for algorithm in algorithms {
            let mut hasher = algorithm.hasher();
            hasher.update(content);
            set.insert(*algorithm, hasher.finalize_hex());
        }
        set
    }
}
