//! Error type shared by the backend and the harness.

use thiserror::Error;

/// Everything that can abort a benchmark routine.
#[derive(Debug, Error)]
pub enum Error {
    /// Degree, modulus chain or plain modulus rejected.
    #[error("invalid encryption parameters: {0}")]
    InvalidParameters(String),

    /// The operation has no meaning for this scheme.
    #[error("operation `{operation}` is not supported by the {scheme} scheme")]
    UnsupportedScheme {
        /// Scheme name.
        scheme: &'static str,
        /// What was attempted.
        operation: &'static str,
    },

    /// Values do not fit the encoder.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// A key, plaintext or ciphertext was made under different parameters.
    #[error("object does not belong to this context: {0}")]
    ContextMismatch(String),

    /// Bad magic, version or object kind in a saved object.
    #[error("invalid serialized object: {0}")]
    InvalidFormat(String),

    /// Reading or writing an artifact failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// bincode could not encode or decode an object.
    #[error("serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    /// Raised after `FailureMode::ReportAndContinue` when some routines failed.
    #[error("{failed} of {total} scheme benchmarks failed: {schemes}")]
    IncompleteRun {
        /// Routines that failed.
        failed: usize,
        /// Routines attempted.
        total: usize,
        /// Names of the failed schemes, comma separated.
        schemes: String,
    },
}

/// Result with the crate's `Error`.
pub type Result<T> = std::result::Result<T, Error>;
