//! Repair search engine
//!
//! Appends every candidate trailer to the truncated archive, probes the
//! result, and checks the extracted entry against the expected digest. The
//! first verified candidate ends the search.

pub mod parallel;

use crate::blob::TruncatedBlob;
use crate::candidate::{Candidate, CandidateRange, Keyspace};
use crate::digest::{self, ExpectedDigest};
use crate::error::Result;
use crate::probe::{self, ProbeFailure, ProbeOutcome};
use crate::types::{SearchConfig, SearchProgress, SearchStats};
use parallel::{drain_partition, PartitionResult, SharedState};
use std::time::Instant;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info};

pub use parallel::ParallelSearch;

/// A verified repair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    /// The trailer that was appended
    pub candidate: Candidate,
    /// Position of the trailer in keyspace order
    pub index: u128,
    /// Partition whose worker found it
    pub partition: usize,
    /// Truncated blob followed by the trailer
    pub repaired: Vec<u8>,
    /// Decompressed entry content, digest-verified
    pub content: Vec<u8>,
}

/// Terminal state of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Succeeded(Repair),
    /// No trailer in the keyspace reproduces the entry
    Exhausted,
}

impl SearchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SearchOutcome::Succeeded(_))
    }

    pub fn repair(&self) -> Option<&Repair> {
        match self {
            SearchOutcome::Succeeded(repair) => Some(repair),
            SearchOutcome::Exhausted => None,
        }
    }

    pub fn into_repair(self) -> Option<Repair> {
        match self {
            SearchOutcome::Succeeded(repair) => Some(repair),
            SearchOutcome::Exhausted => None,
        }
    }
}

/// Outcome plus the counters gathered while reaching it
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub outcome: SearchOutcome,
    pub stats: SearchStats,
}

/// Result of evaluating one repaired blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Verified(Vec<u8>),
    DigestMismatch,
    Rejected(ProbeFailure),
}

/// Everything needed to search for one missing trailer
pub struct RepairSearch {
    blob: TruncatedBlob,
    entry_name: String,
    expected: ExpectedDigest,
    config: SearchConfig,
    progress: Option<Sender<SearchProgress>>,
}

impl RepairSearch {
    pub fn new(
        blob: TruncatedBlob,
        entry_name: impl Into<String>,
        expected: ExpectedDigest,
        config: SearchConfig,
    ) -> Self {
        Self {
            blob,
            entry_name: entry_name.into(),
            expected,
            config,
            progress: None,
        }
    }

    /// Stream [`SearchProgress`] updates to `sender`.
    pub fn with_progress(mut self, sender: Sender<SearchProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn blob(&self) -> &TruncatedBlob {
        &self.blob
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn expected(&self) -> &ExpectedDigest {
        &self.expected
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(self.config.missing_bytes)
    }

    pub(crate) fn progress(&self) -> Option<&Sender<SearchProgress>> {
        self.progress.as_ref()
    }

    /// Probe `repaired` and check the entry's digest.
    #[inline]
    pub fn evaluate(&self, repaired: &[u8]) -> Evaluation {
        match probe::probe(repaired, &self.entry_name) {
            ProbeOutcome::Content(content) => {
                if digest::matches(&content, &self.expected) {
                    Evaluation::Verified(content)
                } else {
                    Evaluation::DigestMismatch
                }
            }
            ProbeOutcome::Rejected(failure) => Evaluation::Rejected(failure),
        }
    }

    /// Partition the keyspace across the configured worker pool.
    pub fn run(&self) -> Result<SearchReport> {
        ParallelSearch::new(self).run()
    }

    /// Scan the whole keyspace on the calling thread.
    pub fn run_sequential(&self) -> SearchReport {
        self.run_partitions(vec![self.keyspace().iter()])
    }

    /// Drain `ranges` one after another in the given order, stopping at the
    /// first verified candidate.
    pub fn run_partitions(&self, ranges: Vec<CandidateRange>) -> SearchReport {
        let start_time = Instant::now();
        let shared = SharedState::new(self.config.order, ranges.len());
        let mut stats = SearchStats::new();
        let mut outcome = SearchOutcome::Exhausted;

        self.log_start(ranges.len());

        for (partition, range) in ranges.into_iter().enumerate() {
            let (result, partition_stats) = drain_partition(self, partition, range, &shared);
            stats.merge(&partition_stats);
            if let PartitionResult::Found(repair) = result {
                outcome = SearchOutcome::Succeeded(repair);
                break;
            }
        }

        stats.duration_ms = start_time.elapsed().as_millis() as u64;
        self.log_finish(&outcome, &stats);
        SearchReport { outcome, stats }
    }

    pub(crate) fn log_start(&self, partitions: usize) {
        info!(
            entry = %self.entry_name,
            digest = %self.expected,
            missing_bytes = self.config.missing_bytes.get(),
            keyspace = %self.keyspace().size(),
            partitions,
            prefix_len = self.blob.len(),
            "starting trailer search"
        );
    }

    pub(crate) fn log_finish(&self, outcome: &SearchOutcome, stats: &SearchStats) {
        match outcome {
            SearchOutcome::Succeeded(repair) => info!(
                trailer = %repair.candidate.to_hex(),
                index = %repair.index,
                partition = repair.partition,
                content_len = repair.content.len(),
                evaluated = stats.candidates_evaluated,
                "archive repaired"
            ),
            SearchOutcome::Exhausted => info!(
                evaluated = stats.candidates_evaluated,
                structural_failures = stats.structural_failures(),
                digest_mismatches = stats.digest_mismatches,
                "keyspace exhausted without a match"
            ),
        }
        debug!(?stats, "search statistics");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Keyspace;
    use crate::digest::HashAlgorithm;
    use crate::types::MissingBytes;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn hello_archive() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "test.txt",
                FileOptions::default().compression_method(CompressionMethod::Deflated),
            )
            .unwrap();
        writer.write_all(b"hello world").unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn search_for(archive: &[u8], cut: usize, k: usize) -> RepairSearch {
        let blob = TruncatedBlob::from(&archive[..archive.len() - cut]);
        let expected = ExpectedDigest::of(HashAlgorithm::Sha256, b"hello world");
        RepairSearch::new(blob, "test.txt", expected, SearchConfig::new(k, 2).unwrap())
    }

    #[test]
    fn test_evaluate_classifies_candidates() {
        let archive = hello_archive();
        let search = search_for(&archive, 1, 1);

        assert_eq!(search.evaluate(&archive), Evaluation::Verified(b"hello world".to_vec()));
        assert_eq!(
            search.evaluate(&archive[..archive.len() - 1]),
            Evaluation::Rejected(ProbeFailure::Directory)
        );

        let wrong = RepairSearch::new(
            TruncatedBlob::from(Vec::new()),
            "test.txt",
            ExpectedDigest::of(HashAlgorithm::Sha256, b"goodbye"),
            SearchConfig::default(),
        );
        assert_eq!(wrong.evaluate(&archive), Evaluation::DigestMismatch);
    }

    #[test]
    fn test_sequential_search_recovers_last_byte() {
        let archive = hello_archive();
        let report = search_for(&archive, 1, 1).run_sequential();

        let repair = report.outcome.into_repair().expect("repair");
        assert_eq!(repair.repaired, archive);
        assert_eq!(repair.content, b"hello world");
        assert_eq!(repair.candidate.0, archive[archive.len() - 1..].to_vec());
        assert_eq!(report.stats.candidates_evaluated as u128, repair.index + 1);
    }

    #[test]
    fn test_zero_missing_bytes_checks_blob_as_is() {
        let archive = hello_archive();
        let report = search_for(&archive, 0, 0).run_sequential();
        let repair = report.outcome.repair().expect("repair");
        assert!(repair.candidate.0.is_empty());
        assert_eq!(report.stats.candidates_evaluated, 1);
    }

    #[test]
    fn test_exhausted_search_counts_every_candidate() {
        let archive = hello_archive();
        let report = search_for(&archive, 2, 1).run_sequential();
        assert_eq!(report.outcome, SearchOutcome::Exhausted);
        assert_eq!(report.stats.candidates_evaluated, 256);
        assert_eq!(report.stats.structural_failures(), 256);
    }

    #[test]
    fn test_empty_partitions_are_skipped() {
        let archive = hello_archive();
        let search = search_for(&archive, 1, 1);
        let space = Keyspace::new(MissingBytes::new(1).unwrap());
        let report = search.run_partitions(vec![space.range(0, 0), space.iter()]);
        assert_eq!(report.outcome.repair().map(|r| r.partition), Some(1));
    }
}
