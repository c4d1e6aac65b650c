//! Digest oracle
//!
//! Validates recovered content against the caller's expected digest. The
//! digest string is always `"<algorithm>:<hex>"`; it is parsed and checked
//! once, before any candidate is evaluated.

use crate::error::{RecoveryError, Result};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

/// Hash functions accepted in an expected digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 6] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Md5 => compute::<Md5>(data),
            HashAlgorithm::Sha1 => compute::<Sha1>(data),
            HashAlgorithm::Sha224 => compute::<Sha224>(data),
            HashAlgorithm::Sha256 => compute::<Sha256>(data),
            HashAlgorithm::Sha384 => compute::<Sha384>(data),
            HashAlgorithm::Sha512 => compute::<Sha512>(data),
        }
    }

    /// Lowercase hex digest of `data`
    pub fn hex_digest(&self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }
}

#[inline]
fn compute<D: Digest>(data: &[u8]) -> Vec<u8> {
    D::digest(data).to_vec()
}

impl FromStr for HashAlgorithm {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        HashAlgorithm::ALL
            .into_iter()
            .find(|alg| alg.name() == normalized)
            .ok_or_else(|| RecoveryError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Algorithm plus the digest the recovered entry must hash to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl ExpectedDigest {
    /// Build from an algorithm and a hex string (either case).
    pub fn new(algorithm: HashAlgorithm, hex_digest: &str) -> Result<Self> {
        let hex_digest = hex_digest.trim();
        let bytes = hex::decode(hex_digest).map_err(|e| {
            RecoveryError::MalformedDigest(format!("{hex_digest:?} is not valid hex: {e}"))
        })?;

        if bytes.len() != algorithm.output_len() {
            return Err(RecoveryError::MalformedDigest(format!(
                "{} digests are {} hex characters, got {}",
                algorithm,
                algorithm.output_len() * 2,
                hex_digest.len()
            )));
        }

        Ok(Self { algorithm, bytes })
    }

    /// Expected digest of `content` under `algorithm`
    pub fn of(algorithm: HashAlgorithm, content: &[u8]) -> Self {
        Self {
            algorithm,
            bytes: algorithm.digest(content),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Canonical lowercase hex of the expected digest
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl FromStr for ExpectedDigest {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self> {
        let (algorithm, hex_digest) = s.trim().split_once(':').ok_or_else(|| {
            RecoveryError::MalformedDigest(format!(
                "{s:?} is not in \"<algorithm>:<hex-digest>\" form"
            ))
        })?;
        ExpectedDigest::new(algorithm.parse()?, hex_digest)
    }
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex())
    }
}

/// True iff `content` hashes to `expected`.
///
/// The hex comparison is case-insensitive: both sides are compared as decoded
/// digest bytes.
#[inline]
pub fn matches(content: &[u8], expected: &ExpectedDigest) -> bool {
    expected.algorithm.digest(content) == expected.bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_known_vectors() {
        assert_eq!(HashAlgorithm::Sha256.hex_digest(b"hello world"), HELLO_SHA256);
        assert_eq!(
            HashAlgorithm::Md5.hex_digest(b"hello world"),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            HashAlgorithm::Sha1.hex_digest(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn test_parse_prefixed_digest() {
        let expected: ExpectedDigest = format!("sha256:{HELLO_SHA256}").parse().unwrap();
        assert_eq!(expected.algorithm(), HashAlgorithm::Sha256);
        assert!(matches(b"hello world", &expected));
        assert_eq!(expected.to_string(), format!("sha256:{HELLO_SHA256}"));
    }

    #[test]
    fn test_comparison_ignores_hex_case() {
        let upper = format!("SHA256:{}", HELLO_SHA256.to_ascii_uppercase());
        let expected: ExpectedDigest = upper.parse().unwrap();
        assert!(matches(b"hello world", &expected));
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!("sha-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("MD5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert!(matches!(
            "whirlpool".parse::<HashAlgorithm>(),
            Err(RecoveryError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_malformed_digests() {
        assert!(matches!(
            HELLO_SHA256.parse::<ExpectedDigest>(),
            Err(RecoveryError::MalformedDigest(_))
        ));
        assert!(matches!(
            "sha256:xyz".parse::<ExpectedDigest>(),
            Err(RecoveryError::MalformedDigest(_))
        ));
        // md5-length hex under a sha256 label
        assert!(matches!(
            "sha256:5eb63bbbe01eeed093cb22bb8f5acdc3".parse::<ExpectedDigest>(),
            Err(RecoveryError::MalformedDigest(_))
        ));
        assert!(matches!(
            format!("blake9:{HELLO_SHA256}").parse::<ExpectedDigest>(),
            Err(RecoveryError::UnsupportedAlgorithm(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_oracle_accepts_own_digest_and_rejects_bit_flips(
            content in proptest::collection::vec(any::<u8>(), 1..256),
            alg_index in 0usize..HashAlgorithm::ALL.len(),
            flip in any::<usize>(),
        ) {
            let algorithm = HashAlgorithm::ALL[alg_index];
            let expected = ExpectedDigest::new(algorithm, &algorithm.hex_digest(&content)).unwrap();
            prop_assert!(matches(&content, &expected));

            let bit = flip % (content.len() * 8);
            let mut mutated = content.clone();
            mutated[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(!matches(&mutated, &expected));
        }
    }
}
