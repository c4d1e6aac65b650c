use crate::candidate::{Candidate, CandidateRange};
use crate::error::{RecoveryError, Result};
use crate::probe::ProbeFailure;
use crate::search::{Evaluation, Repair, RepairSearch, SearchOutcome, SearchReport};
use crate::types::{SearchOrder, SearchProgress, SearchStats};
use cache_padded::CachePadded;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

const NO_WINNER: usize = usize::MAX;

/// How a single partition ended
#[derive(Debug)]
pub(crate) enum PartitionResult {
    Found(Repair),
    Exhausted,
    /// Another partition's success made this one irrelevant
    Cancelled,
}

/// Cross-worker state: the cancellation signal and live counters
///
/// `winner` holds the lowest partition index that has verified a candidate.
/// It only ever decreases, so simultaneous finds resolve without a lock.
pub(crate) struct SharedState {
    winner: AtomicUsize,
    order: SearchOrder,
    evaluated: Vec<CachePadded<AtomicU64>>,
}

impl SharedState {
    pub(crate) fn new(order: SearchOrder, partitions: usize) -> Self {
        Self {
            winner: AtomicUsize::new(NO_WINNER),
            order,
            evaluated: (0..partitions)
                .map(|_| CachePadded::new(AtomicU64::new(0)))
                .collect(),
        }
    }

    #[inline]
    fn should_stop(&self, partition: usize) -> bool {
        let winner = self.winner.load(Ordering::Acquire);
        match self.order {
            SearchOrder::FirstFound => winner != NO_WINNER,
            SearchOrder::Lexicographic => winner < partition,
        }
    }

    fn announce(&self, partition: usize) {
        self.winner.fetch_min(partition, Ordering::AcqRel);
    }

    fn publish(&self, partition: usize, evaluated: u64) {
        if let Some(counter) = self.evaluated.get(partition) {
            counter.store(evaluated, Ordering::Relaxed);
        }
    }

    /// Candidates evaluated so far across all partitions
    pub(crate) fn total_evaluated(&self) -> u64 {
        self.evaluated
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .sum()
    }
}

/// Partition-parallel driver over a rayon thread pool
pub struct ParallelSearch<'a> {
    search: &'a RepairSearch,
    workers: usize,
}

impl<'a> ParallelSearch<'a> {
    /// Worker count is capped at the keyspace size; a worker never gets an
    /// empty partition.
    pub fn new(search: &'a RepairSearch) -> Self {
        let candidates = usize::try_from(search.keyspace().size()).unwrap_or(usize::MAX);
        let workers = search.config().effective_workers().min(candidates).max(1);
        Self { search, workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Split the keyspace into one contiguous range per worker and drain
    /// them concurrently.
    pub fn run(&self) -> Result<SearchReport> {
        let ranges = self.search.keyspace().partition(self.workers);
        self.run_ranges(ranges)
    }

    /// Drain caller-chosen ranges concurrently. Partition indices follow the
    /// order of `ranges`.
    pub fn run_ranges(&self, ranges: Vec<CandidateRange>) -> Result<SearchReport> {
        let start_time = Instant::now();
        let threads = self.workers.min(ranges.len()).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("repair-worker-{i}"))
            .build()
            .map_err(|e| RecoveryError::WorkerPool(e.to_string()))?;

        let shared = SharedState::new(self.search.config().order, ranges.len());
        let search = self.search;
        search.log_start(ranges.len());
        debug!(threads, "worker pool built");

        let results: Vec<(PartitionResult, SearchStats)> = pool.install(|| {
            ranges
                .into_par_iter()
                .enumerate()
                .map(|(partition, range)| drain_partition(search, partition, range, &shared))
                .collect()
        });

        let mut stats = SearchStats::new();
        let mut winner: Option<Repair> = None;
        for (result, partition_stats) in results {
            stats.merge(&partition_stats);
            // Results arrive in partition order; keep the lowest-index find
            if let PartitionResult::Found(repair) = result {
                if winner.is_none() {
                    winner = Some(repair);
                }
            }
        }

        stats.duration_ms = start_time.elapsed().as_millis() as u64;
        debug_assert!(stats.candidates_evaluated >= shared.total_evaluated());

        let outcome = match winner {
            Some(repair) => SearchOutcome::Succeeded(repair),
            None => SearchOutcome::Exhausted,
        };
        search.log_finish(&outcome, &stats);
        Ok(SearchReport { outcome, stats })
    }
}

/// Run one worker over its range until it verifies a candidate, runs out, or
/// observes the stop signal. The stop signal is checked before every
/// candidate.
pub(crate) fn drain_partition(
    search: &RepairSearch,
    partition: usize,
    mut range: CandidateRange,
    shared: &SharedState,
) -> (PartitionResult, SearchStats) {
    let mut stats = SearchStats {
        partitions: 1,
        ..Default::default()
    };
    let progress = search.progress();
    let interval = search.config().progress_interval.max(1);

    if let Some(sender) = progress {
        let _ = sender.try_send(SearchProgress::PartitionStarted {
            partition,
            size: range.len(),
        });
    }
    debug!(partition, start = %range.start(), end = %range.end(), "partition started");

    let prefix_len = search.blob().len();
    let mut repaired = search.blob().with_trailer_capacity(range.width());

    loop {
        if shared.should_stop(partition) {
            stats.cancelled_partitions = 1;
            shared.publish(partition, stats.candidates_evaluated);
            debug!(partition, evaluated = stats.candidates_evaluated, "partition cancelled");
            return (PartitionResult::Cancelled, stats);
        }

        let Some(index) = range.fill_next(&mut repaired[prefix_len..]) else {
            break;
        };
        stats.candidates_evaluated += 1;

        match search.evaluate(&repaired) {
            Evaluation::Verified(content) => {
                shared.announce(partition);
                shared.publish(partition, stats.candidates_evaluated);
                if let Some(sender) = progress {
                    let _ = sender.try_send(SearchProgress::Found { partition, index });
                }
                let candidate = Candidate(repaired[prefix_len..].to_vec());
                debug!(partition, index = %index, trailer = %candidate.to_hex(), "candidate verified");
                let repair = Repair {
                    candidate,
                    index,
                    partition,
                    repaired,
                    content,
                };
                return (PartitionResult::Found(repair), stats);
            }
            Evaluation::DigestMismatch => {
                stats.digest_mismatches += 1;
                trace!(partition, index = %index, "entry extracted, digest mismatch");
            }
            Evaluation::Rejected(failure) => {
                record_failure(&mut stats, failure);
                trace!(partition, index = %index, ?failure, "candidate rejected");
            }
        }

        if stats.candidates_evaluated % interval == 0 {
            shared.publish(partition, stats.candidates_evaluated);
            if let Some(sender) = progress {
                let _ = sender.try_send(SearchProgress::Evaluated {
                    partition,
                    evaluated: stats.candidates_evaluated,
                });
            }
        }
    }

    shared.publish(partition, stats.candidates_evaluated);
    if let Some(sender) = progress {
        let _ = sender.try_send(SearchProgress::PartitionExhausted {
            partition,
            evaluated: stats.candidates_evaluated,
        });
    }
    debug!(partition, evaluated = stats.candidates_evaluated, "partition exhausted");
    (PartitionResult::Exhausted, stats)
}

fn record_failure(stats: &mut SearchStats, failure: ProbeFailure) {
    match failure {
        ProbeFailure::Directory => stats.directory_failures += 1,
        ProbeFailure::EntryMissing => stats.entry_missing += 1,
        ProbeFailure::Entry => stats.entry_failures += 1,
        ProbeFailure::Decompression => stats.decompression_failures += 1,
        ProbeFailure::Panicked => stats.probe_panics += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_found_stops_every_partition() {
        let shared = SharedState::new(SearchOrder::FirstFound, 4);
        assert!(!shared.should_stop(0));
        shared.announce(2);
        assert!(shared.should_stop(0));
        assert!(shared.should_stop(3));
    }

    #[test]
    fn test_lexicographic_only_stops_later_partitions() {
        let shared = SharedState::new(SearchOrder::Lexicographic, 4);
        shared.announce(2);
        assert!(!shared.should_stop(0));
        assert!(!shared.should_stop(1));
        assert!(!shared.should_stop(2));
        assert!(shared.should_stop(3));

        // A lower find tightens the bound
        shared.announce(0);
        assert!(shared.should_stop(1));
        shared.announce(3);
        assert!(shared.should_stop(1));
    }

    #[test]
    fn test_live_counters() {
        let shared = SharedState::new(SearchOrder::FirstFound, 2);
        shared.publish(0, 10);
        shared.publish(1, 5);
        shared.publish(7, 100);
        assert_eq!(shared.total_evaluated(), 15);
    }
}
