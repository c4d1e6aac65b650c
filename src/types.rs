use crate::error::{RecoveryError, Result};
use serde::Serialize;

/// Newtype wrapper for the number of trailing bytes lost from the archive (K)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MissingBytes(usize);

impl MissingBytes {
    /// Largest K whose keyspace (256^K) still fits in a u128 index.
    pub const MAX: usize = 15;

    pub fn new(value: usize) -> Result<Self> {
        if value > Self::MAX {
            return Err(RecoveryError::Config(format!(
                "missing byte count {} exceeds the supported maximum of {}",
                value,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> usize {
        self.0
    }

    /// Number of distinct trailers of this width.
    pub fn keyspace_size(&self) -> u128 {
        1u128 << (8 * self.0 as u32)
    }
}

impl std::fmt::Display for MissingBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

/// How concurrent partitions decide which match wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOrder {
    /// The first worker to validate a candidate stops everyone.
    #[default]
    FirstFound,
    /// A match in partition `i` only stops partitions after `i`, so the
    /// lowest matching candidate in enumeration order is returned.
    Lexicographic,
}

/// Search engine configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Width of the trailer being searched for
    pub missing_bytes: MissingBytes,

    /// Number of worker threads (0 = auto)
    pub workers: usize,

    /// Winner selection across partitions
    pub order: SearchOrder,

    /// Candidates between progress updates for a single partition
    pub progress_interval: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            missing_bytes: MissingBytes(4),
            workers: 0,
            order: SearchOrder::FirstFound,
            progress_interval: 65_536,
        }
    }
}

impl SearchConfig {
    pub fn new(missing_bytes: usize, workers: usize) -> Result<Self> {
        Ok(Self {
            missing_bytes: MissingBytes::new(missing_bytes)?,
            workers,
            ..Default::default()
        })
    }

    pub fn with_order(mut self, order: SearchOrder) -> Self {
        self.order = order;
        self
    }

    /// Resolve `workers == 0` to the number of available cores.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// Progress update sent via tokio channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchProgress {
    /// A worker picked up its partition
    PartitionStarted { partition: usize, size: u128 },
    /// Cumulative candidates evaluated in a partition
    Evaluated { partition: usize, evaluated: u64 },
    /// Partition drained without a match
    PartitionExhausted { partition: usize, evaluated: u64 },
    /// A candidate validated against the digest
    Found { partition: usize, index: u128 },
}

/// Search statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub candidates_evaluated: u64,
    /// No readable central directory
    pub directory_failures: u64,
    /// Directory parsed, entry name absent
    pub entry_missing: u64,
    /// Entry header unreadable (bad local header, unsupported method)
    pub entry_failures: u64,
    /// Compressed stream or CRC check failed
    pub decompression_failures: u64,
    /// Parser panicked and was isolated
    pub probe_panics: u64,
    /// Content extracted but the digest differed
    pub digest_mismatches: u64,
    pub partitions: usize,
    pub cancelled_partitions: usize,
    pub duration_ms: u64,
}

impl SearchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a worker's local counters into the run totals.
    pub fn merge(&mut self, other: &SearchStats) {
        self.candidates_evaluated += other.candidates_evaluated;
        self.directory_failures += other.directory_failures;
        self.entry_missing += other.entry_missing;
        self.entry_failures += other.entry_failures;
        self.decompression_failures += other.decompression_failures;
        self.probe_panics += other.probe_panics;
        self.digest_mismatches += other.digest_mismatches;
        self.partitions += other.partitions;
        self.cancelled_partitions += other.cancelled_partitions;
    }

    pub fn structural_failures(&self) -> u64 {
        self.directory_failures
            + self.entry_missing
            + self.entry_failures
            + self.decompression_failures
            + self.probe_panics
    }

    pub fn candidates_per_sec(&self) -> f64 {
        if self.duration_ms == 0 {
            0.0
        } else {
            self.candidates_evaluated as f64 * 1000.0 / self.duration_ms as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bytes_bounds() {
        assert_eq!(MissingBytes::new(0).unwrap().keyspace_size(), 1);
        assert_eq!(MissingBytes::new(2).unwrap().keyspace_size(), 65_536);
        assert_eq!(
            MissingBytes::new(15).unwrap().keyspace_size(),
            1u128 << 120
        );
        assert!(MissingBytes::new(16).is_err());
    }

    #[test]
    fn test_effective_workers() {
        let config = SearchConfig::new(1, 3).unwrap();
        assert_eq!(config.effective_workers(), 3);

        let auto = SearchConfig::new(1, 0).unwrap();
        assert!(auto.effective_workers() >= 1);
    }

    #[test]
    fn test_stats_merge() {
        let mut total = SearchStats::new();
        let worker = SearchStats {
            candidates_evaluated: 10,
            directory_failures: 7,
            entry_missing: 1,
            decompression_failures: 1,
            digest_mismatches: 1,
            partitions: 1,
            ..Default::default()
        };
        total.merge(&worker);
        total.merge(&worker);

        assert_eq!(total.candidates_evaluated, 20);
        assert_eq!(total.structural_failures(), 18);
        assert_eq!(total.partitions, 2);
    }
}
