//! Archive probe
//!
//! Parses an in-memory blob as a ZIP container (central directory at the
//! end) and pulls one entry out of it. Every structural problem is reported
//! as a [`ProbeFailure`] value; nothing here returns an error or lets a
//! parser panic escape.

use std::cell::Cell;
use std::io::{Cursor, Read};
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::Once;
use tracing::trace;
use zip::result::ZipError;
use zip::ZipArchive;

/// Upper bound on a declared entry size we are willing to allocate up front.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

thread_local! {
    static PARSING: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Route parser panics to trace logging instead of stderr. Panics raised
/// outside the parser still reach the previously installed hook.
fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if PARSING.with(Cell::get) {
                trace!(%info, "archive parser panicked");
            } else {
                previous(info);
            }
        }));
    });
}

/// Run `f` with its panics caught and kept off stderr.
fn isolated<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    install_quiet_hook();
    PARSING.with(|flag| flag.set(true));
    let result = catch_unwind(AssertUnwindSafe(f));
    PARSING.with(|flag| flag.set(false));
    result
}

/// Why a blob did not yield the entry's content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// End of central directory missing or central directory unreadable
    Directory,
    /// Directory parsed but has no entry with that name
    EntryMissing,
    /// Local header corrupt or compression method unsupported
    Entry,
    /// Compressed stream corrupt, short, or CRC mismatch
    Decompression,
    /// The parser panicked on this input
    Panicked,
}

/// Typed result of probing one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Content(Vec<u8>),
    Rejected(ProbeFailure),
}

impl ProbeOutcome {
    pub fn into_content(self) -> Option<Vec<u8>> {
        match self {
            ProbeOutcome::Content(content) => Some(content),
            ProbeOutcome::Rejected(_) => None,
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, ProbeOutcome::Content(_))
    }
}

/// Decompressed content of `entry_name`, or `None` on any structural failure.
pub fn extract(blob: &[u8], entry_name: &str) -> Option<Vec<u8>> {
    probe(blob, entry_name).into_content()
}

/// Like [`extract`], but reports which stage rejected the blob.
pub fn probe(blob: &[u8], entry_name: &str) -> ProbeOutcome {
    match isolated(|| read_entry(blob, entry_name)) {
        Ok(Ok(content)) => ProbeOutcome::Content(content),
        Ok(Err(failure)) => ProbeOutcome::Rejected(failure),
        Err(_) => ProbeOutcome::Rejected(ProbeFailure::Panicked),
    }
}

fn read_entry(blob: &[u8], entry_name: &str) -> Result<Vec<u8>, ProbeFailure> {
    let mut archive = ZipArchive::new(Cursor::new(blob)).map_err(|_| ProbeFailure::Directory)?;

    let mut entry = archive.by_name(entry_name).map_err(|e| match e {
        ZipError::FileNotFound => ProbeFailure::EntryMissing,
        _ => ProbeFailure::Entry,
    })?;

    // The declared size comes from the candidate bytes, so it is only a hint
    let capacity = entry.size().min(MAX_PREALLOC).min(blob.len() as u64 * 1032) as usize;
    let mut content = Vec::with_capacity(capacity);

    // The CRC check runs when the entry is read to its end
    entry
        .read_to_end(&mut content)
        .map_err(|_| ProbeFailure::Decompression)?;

    Ok(content)
}

/// Names listed in the central directory, if it can be parsed at all.
pub fn entry_names(blob: &[u8]) -> Option<Vec<String>> {
    isolated(|| {
        ZipArchive::new(Cursor::new(blob))
            .ok()
            .map(|archive| archive.file_names().map(str::to_string).collect())
    })
    .ok()
    .flatten()
}
