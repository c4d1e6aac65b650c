//! Truncated ZIP trailer recovery
//!
//! Rebuilds the last K bytes of an archive by brute force:
//! - Lazy, partitionable enumeration of all 256^K trailers
//! - Panic-isolated ZIP probe that reports structural failures as values
//! - Digest oracle (md5, sha1, sha2 family) as the acceptance test
//! - Partition-parallel search on a rayon pool with atomic cancellation
//! - Progress streaming via tokio::sync::mpsc

pub mod blob;
pub mod candidate;
pub mod cli;
pub mod digest;
pub mod error;
pub mod probe;
pub mod recovery;
pub mod search;
pub mod types;

// Re-export commonly used types
pub use blob::TruncatedBlob;
pub use candidate::{Candidate, CandidateRange, Keyspace};
pub use digest::{ExpectedDigest, HashAlgorithm};
pub use error::{RecoveryError, Result};
pub use probe::{extract, probe, ProbeFailure, ProbeOutcome};
pub use recovery::{fixed_output_path, write_recovered, RecoveryReport, RecoveryStatus};
pub use search::{Evaluation, ParallelSearch, Repair, RepairSearch, SearchOutcome, SearchReport};
pub use types::{MissingBytes, SearchConfig, SearchOrder, SearchProgress, SearchStats};
