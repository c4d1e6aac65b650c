//! Candidate trailer enumeration
//!
//! The keyspace of a K-byte trailer is every value of a K-digit base-256
//! number, enumerated in counting order (last byte varies fastest). Index
//! `i` always maps to the big-endian K-byte encoding of `i`, so ranges of the
//! keyspace can be handed to workers by index alone.

use crate::types::MissingBytes;

/// One candidate trailer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate(pub Vec<u8>);

impl Candidate {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// All trailers of a fixed width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keyspace {
    width: MissingBytes,
}

impl Keyspace {
    pub fn new(width: MissingBytes) -> Self {
        Self { width }
    }

    pub fn width(&self) -> usize {
        self.width.get()
    }

    /// 256^K
    pub fn size(&self) -> u128 {
        self.width.keyspace_size()
    }

    /// The trailer at `index` in enumeration order.
    pub fn candidate_at(&self, index: u128) -> Candidate {
        let mut bytes = vec![0u8; self.width()];
        encode_index(index, &mut bytes);
        Candidate(bytes)
    }

    /// Iterate the whole keyspace.
    pub fn iter(&self) -> CandidateRange {
        self.range(0, self.size())
    }

    /// Iterate indices `start..end`, clamped to the keyspace.
    pub fn range(&self, start: u128, end: u128) -> CandidateRange {
        let end = end.min(self.size());
        let start = start.min(end);
        CandidateRange::new(self.width(), start, end)
    }

    /// Split the keyspace into `parts` disjoint contiguous ranges that cover
    /// it in order. Earlier ranges absorb the remainder, so sizes differ by at
    /// most one; when `parts` exceeds the keyspace the tail ranges are empty.
    pub fn partition(&self, parts: usize) -> Vec<CandidateRange> {
        let parts = parts.max(1) as u128;
        let size = self.size();
        let base = size / parts;
        let remainder = size % parts;

        let mut ranges = Vec::with_capacity(parts as usize);
        let mut start = 0u128;
        for i in 0..parts {
            let len = base + u128::from(i < remainder);
            ranges.push(self.range(start, start + len));
            start += len;
        }
        ranges
    }
}

/// A contiguous slice of the keyspace
///
/// Iteration is incremental: the next trailer is produced by a base-256
/// carry on the previous one, never by re-encoding the index. Cloning or
/// calling [`CandidateRange::restart`] replays the range from its start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRange {
    start: u128,
    end: u128,
    cursor: u128,
    odometer: Vec<u8>,
}

impl CandidateRange {
    fn new(width: usize, start: u128, end: u128) -> Self {
        let mut odometer = vec![0u8; width];
        encode_index(start, &mut odometer);
        Self {
            start,
            end,
            cursor: start,
            odometer,
        }
    }

    pub fn start(&self) -> u128 {
        self.start
    }

    pub fn end(&self) -> u128 {
        self.end
    }

    pub fn width(&self) -> usize {
        self.odometer.len()
    }

    /// Total candidates in the range, independent of iteration progress
    pub fn len(&self) -> u128 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Candidates not yet produced
    pub fn remaining(&self) -> u128 {
        self.end - self.cursor
    }

    pub fn contains(&self, index: u128) -> bool {
        (self.start..self.end).contains(&index)
    }

    pub fn restart(&mut self) {
        self.cursor = self.start;
        encode_index(self.start, &mut self.odometer);
    }

    /// Write the next trailer into `out` and return its index.
    ///
    /// `out` must be exactly [`CandidateRange::width`] bytes long. This is the
    /// allocation-free path used by the search workers.
    #[inline]
    pub fn fill_next(&mut self, out: &mut [u8]) -> Option<u128> {
        if self.cursor >= self.end {
            return None;
        }
        out.copy_from_slice(&self.odometer);
        let index = self.cursor;
        self.cursor += 1;
        increment(&mut self.odometer);
        Some(index)
    }
}

impl Iterator for CandidateRange {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        let mut bytes = vec![0u8; self.width()];
        self.fill_next(&mut bytes).map(|_| Candidate(bytes))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Big-endian base-256 digits of `index`, truncated to `out.len()` digits.
fn encode_index(index: u128, out: &mut [u8]) {
    let be = index.to_be_bytes();
    let width = out.len();
    out.copy_from_slice(&be[be.len() - width..]);
}

/// Add one, last byte fastest; wraps to all zeros past the end.
#[inline]
fn increment(odometer: &mut [u8]) {
    for byte in odometer.iter_mut().rev() {
        let (next, carry) = byte.overflowing_add(1);
        *byte = next;
        if !carry {
            return;
        }
    }
}
