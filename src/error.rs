use thiserror::Error;

/// Main error type for the recovery tool
///
/// Only configuration and I/O failures live here. A candidate trailer that
/// does not produce a readable archive is an ordinary probe outcome, see
/// [`crate::probe::ProbeOutcome`].
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Memory mapping error: {0}")]
    Mmap(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Malformed digest: {0}")]
    MalformedDigest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl RecoveryError {
    /// True for errors caused by the caller's settings rather than the environment.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RecoveryError::InvalidArgument(_)
                | RecoveryError::UnsupportedAlgorithm(_)
                | RecoveryError::MalformedDigest(_)
                | RecoveryError::Config(_)
        )
    }
}

impl From<serde_json::Error> for RecoveryError {
    fn from(err: serde_json::Error) -> Self {
        RecoveryError::Serialize(err.to_string())
    }
}

/// Result type alias for recovery operations
pub type Result<T> = std::result::Result<T, RecoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(RecoveryError::UnsupportedAlgorithm("whirlpool".into()).is_configuration());
        assert!(RecoveryError::MalformedDigest("zz".into()).is_configuration());
        assert!(!RecoveryError::FileNotFound("a.zip".into()).is_configuration());
        assert!(!RecoveryError::Io(std::io::Error::other("boom")).is_configuration());
    }
}
