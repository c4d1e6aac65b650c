use crate::error::{RecoveryError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Owned(bytes) => &bytes[..],
        }
    }
}

/// Read-only bytes of a truncated archive, shared across search workers
///
/// The data is never mutated after construction. Cloning only bumps a
/// reference count.
#[derive(Clone)]
pub struct TruncatedBlob {
    data: Arc<Backing>,
    path: Option<PathBuf>,
}

impl TruncatedBlob {
    /// Open a truncated archive with memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let file = File::open(path_ref).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RecoveryError::FileNotFound(path_ref.display().to_string())
            } else {
                RecoveryError::Io(e)
            }
        })?;

        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(RecoveryError::InvalidArgument(format!(
                "{} is not a regular file",
                path_ref.display()
            )));
        }

        // Zero-length mappings are rejected by the OS
        let backing = if metadata.len() == 0 {
            Backing::Owned(Vec::new())
        } else {
            let mmap = unsafe {
                Mmap::map(&file)
                    .map_err(|e| RecoveryError::Mmap(format!("Failed to mmap file: {}", e)))?
            };
            Backing::Mapped(mmap)
        };

        Ok(Self {
            data: Arc::new(backing),
            path: Some(path_ref.to_path_buf()),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Source path, if the blob was opened from disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the blob with room for a trailer of `width` zero bytes.
    pub fn with_trailer_capacity(&self, width: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len() + width);
        buf.extend_from_slice(self.as_bytes());
        buf.resize(self.len() + width, 0);
        buf
    }
}

impl From<Vec<u8>> for TruncatedBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Backing::Owned(bytes)),
            path: None,
        }
    }
}

impl From<&[u8]> for TruncatedBlob {
    fn from(bytes: &[u8]) -> Self {
        Self::from(bytes.to_vec())
    }
}

impl AsRef<[u8]> for TruncatedBlob {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Debug for TruncatedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TruncatedBlob")
            .field("len", &self.len())
            .field("path", &self.path)
            .finish()
    }
}
