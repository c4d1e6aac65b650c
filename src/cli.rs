use crate::digest::{ExpectedDigest, HashAlgorithm};
use crate::error::{RecoveryError, Result};
use crate::types::{MissingBytes, SearchConfig, SearchOrder};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Trailer Recovery
/// Rebuilds the lost trailing bytes of a ZIP archive from a known entry digest
#[derive(Parser, Debug, Clone)]
#[command(name = "trailer-recovery")]
#[command(version)]
#[command(about = "Recover the missing trailing bytes of a truncated ZIP archive", long_about = None)]
pub struct Args {
    /// Truncated archive to repair
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Entry inside the archive whose digest is known
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    /// Expected digest of the entry, "<algorithm>:<hex>" or bare hex with --algorithm
    #[arg(value_name = "DIGEST")]
    pub digest: String,

    /// Number of bytes missing from the end of the archive
    #[arg(short = 'k', long = "missing-bytes", default_value = "4")]
    pub missing_bytes: usize,

    /// Hash algorithm for a bare hex digest (md5, sha1, sha224, sha256, sha384, sha512)
    #[arg(short = 'a', long = "algorithm")]
    pub algorithm: Option<String>,

    /// Worker threads (0 = one per core)
    #[arg(short = 'j', long = "workers", default_value = "0")]
    pub workers: usize,

    /// Return the first matching trailer in enumeration order
    #[arg(long = "ordered")]
    pub ordered: bool,

    /// Where to write the repaired archive (default: <name>_fixed.<ext> next to the input)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Search only; do not write the repaired archive
    #[arg(long = "no-write")]
    pub no_write: bool,

    /// Print the run summary as JSON
    #[arg(long = "json")]
    pub json: bool,

    /// Candidates per partition between progress updates
    #[arg(long = "progress-interval", default_value = "65536")]
    pub progress_interval: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

pub const DEFAULT_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

impl Args {
    /// Validate the arguments
    pub fn validate(&self) -> Result<()> {
        if self.archive.as_os_str().is_empty() {
            return Err(RecoveryError::InvalidArgument(
                "Archive path cannot be empty".to_string(),
            ));
        }

        if self.entry_name().is_empty() {
            return Err(RecoveryError::InvalidArgument(
                "Entry name cannot be empty".to_string(),
            ));
        }

        if self.progress_interval == 0 {
            return Err(RecoveryError::InvalidArgument(
                "progress-interval must be greater than 0".to_string(),
            ));
        }

        MissingBytes::new(self.missing_bytes)?;
        self.expected_digest()?;
        Ok(())
    }

    /// Entry name in archive form: `/` separators, no leading `/` or `./`.
    pub fn entry_name(&self) -> String {
        normalize_entry_name(&self.entry)
    }

    /// Parse DIGEST, applying --algorithm to a bare hex digest.
    pub fn expected_digest(&self) -> Result<ExpectedDigest> {
        let explicit = self
            .algorithm
            .as_deref()
            .map(str::parse::<HashAlgorithm>)
            .transpose()?;

        if self.digest.contains(':') {
            let expected: ExpectedDigest = self.digest.parse()?;
            if let Some(algorithm) = explicit {
                if algorithm != expected.algorithm() {
                    return Err(RecoveryError::Config(format!(
                        "digest is labelled {} but --algorithm is {}",
                        expected.algorithm(),
                        algorithm
                    )));
                }
            }
            Ok(expected)
        } else {
            ExpectedDigest::new(explicit.unwrap_or(DEFAULT_ALGORITHM), &self.digest)
        }
    }

    pub fn search_config(&self) -> Result<SearchConfig> {
        let order = if self.ordered {
            SearchOrder::Lexicographic
        } else {
            SearchOrder::FirstFound
        };
        let mut config = SearchConfig::new(self.missing_bytes, self.workers)?.with_order(order);
        config.progress_interval = self.progress_interval;
        Ok(config)
    }

    /// Output file, or `None` with --no-write
    pub fn output_path(&self) -> Option<PathBuf> {
        if self.no_write {
            return None;
        }
        Some(
            self.output
                .clone()
                .unwrap_or_else(|| crate::recovery::fixed_output_path(&self.archive)),
        )
    }
}

pub fn normalize_entry_name(name: &str) -> String {
    let mut name = name.replace('\\', "/");
    loop {
        if let Some(rest) = name.strip_prefix("./") {
            name = rest.to_string();
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest.to_string();
        } else {
            return name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["trailer-recovery", "test_truncated.zip", "test.txt"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_args_validation() {
        let digest = format!("sha256:{HELLO_SHA256}");
        let args = args(&[digest.as_str(), "-k", "1", "-j", "4"]);
        assert!(args.validate().is_ok());

        let config = args.search_config().unwrap();
        assert_eq!(config.missing_bytes.get(), 1);
        assert_eq!(config.workers, 4);
        assert_eq!(config.order, SearchOrder::FirstFound);
    }

    #[test]
    fn test_defaults() {
        let digest = format!("sha256:{HELLO_SHA256}");
        let args = args(&[digest.as_str()]);
        assert_eq!(args.missing_bytes, 4);
        assert_eq!(args.workers, 0);
        assert_eq!(
            args.output_path(),
            Some(PathBuf::from("test_truncated_fixed.zip"))
        );
    }

    #[test]
    fn test_bare_digest_uses_algorithm_flag() {
        let args_default = args(&[HELLO_SHA256]);
        assert_eq!(
            args_default.expected_digest().unwrap().algorithm(),
            HashAlgorithm::Sha256
        );

        let md5 = args(&["5eb63bbbe01eeed093cb22bb8f5acdc3", "-a", "md5"]);
        assert_eq!(md5.expected_digest().unwrap().algorithm(), HashAlgorithm::Md5);
    }

    #[test]
    fn test_conflicting_algorithm_is_rejected() {
        let digest = format!("sha256:{HELLO_SHA256}");
        let args = args(&[digest.as_str(), "--algorithm", "sha1"]);
        assert!(matches!(args.validate(), Err(RecoveryError::Config(_))));
    }

    #[test]
    fn test_invalid_missing_bytes() {
        let digest = format!("sha256:{HELLO_SHA256}");
        assert!(args(&[digest.as_str(), "-k", "16"]).validate().is_err());
        assert!(Args::try_parse_from([
            "trailer-recovery",
            "a.zip",
            "test.txt",
            HELLO_SHA256,
            "-k",
            "-1",
        ])
        .is_err());
    }

    #[test]
    fn test_unsupported_algorithm() {
        let err = args(&[format!("crc32:{HELLO_SHA256}").as_str()]).validate().unwrap_err();
        assert!(matches!(err, RecoveryError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_no_write_and_output_override() {
        let digest = format!("sha256:{HELLO_SHA256}");
        assert_eq!(args(&[digest.as_str(), "--no-write"]).output_path(), None);
        assert_eq!(
            args(&[digest.as_str(), "-o", "out.zip"]).output_path(),
            Some(PathBuf::from("out.zip"))
        );
    }

    #[test]
    fn test_entry_name_normalization() {
        assert_eq!(normalize_entry_name("test.txt"), "test.txt");
        assert_eq!(normalize_entry_name("/Users/a/test.txt"), "Users/a/test.txt");
        assert_eq!(normalize_entry_name("./dir\\file.txt"), "dir/file.txt");
        assert_eq!(normalize_entry_name(".//x"), "x");
    }
}
