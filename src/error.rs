//! Error types for the Tessera library.
//!
//! All fallible operations return [`Result`], whose error is the
//! [`TesseraError`] enum. Every variant maps onto an [`ErrorKind`] so callers
//! can tell format corruption apart from bad input, I/O failures and misuse
//! of a closed resource without matching on message text.
//!
//! # Examples
//!
//! ```
//! use tessera::error::{ErrorKind, Result, TesseraError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(TesseraError::invalid_argument("document id must be non-negative"))
//! }
//!
//! let err = example_operation().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidInput);
//! ```

use std::io;

use thiserror::Error;

use crate::storage::StorageError;

/// The main error type for Tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// I/O errors from the underlying files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors raised by a storage backend.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A segment file header failed validation.
    #[error("Invalid header in {file}: {reason}")]
    InvalidHeader { file: String, reason: String },

    /// Segment metadata failed its checksum or layout check.
    #[error("Corrupt metadata: {0}")]
    CorruptMetadata(String),

    /// Structural corruption in a segment or commit file.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// A caller supplied a value that violates an invariant.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration rejected at construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Analysis-related errors (tokenization).
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Index-related errors.
    #[error("Index error: {0}")]
    Index(String),

    /// Operation not allowed in the current state (e.g. writer closed).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A segment flush failed; partial files were removed.
    #[error("Failed to flush segment {segment}: {source}")]
    Flush {
        segment: String,
        #[source]
        source: Box<TesseraError>,
    },
}

/// Result type alias for operations that may fail with TesseraError.
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Coarse classification of a [`TesseraError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// On-disk data failed validation. Never retried, never repaired.
    Corruption,
    /// A bad value was rejected before any I/O happened.
    InvalidInput,
    /// The underlying storage failed.
    Io,
    /// The storage or writer was already closed.
    Closed,
    /// Anything else.
    Other,
}

impl TesseraError {
    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidArgument(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidConfig(msg.into())
    }

    /// Create a new corruption error.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        TesseraError::Corruption(msg.into())
    }

    /// Create a new corrupt metadata error.
    pub fn corrupt_metadata<S: Into<String>>(msg: S) -> Self {
        TesseraError::CorruptMetadata(msg.into())
    }

    /// Create a new invalid header error.
    pub fn invalid_header<F: Into<String>, R: Into<String>>(file: F, reason: R) -> Self {
        TesseraError::InvalidHeader {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        TesseraError::Analysis(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        TesseraError::Index(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidOperation(msg.into())
    }

    /// Wrap a failure that happened while flushing `segment`.
    pub fn flush<S: Into<String>>(segment: S, source: TesseraError) -> Self {
        TesseraError::Flush {
            segment: segment.into(),
            source: Box::new(source),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TesseraError::Io(_) => ErrorKind::Io,
            TesseraError::Storage(StorageError::StorageClosed) => ErrorKind::Closed,
            TesseraError::Storage(_) => ErrorKind::Io,
            TesseraError::InvalidHeader { .. }
            | TesseraError::CorruptMetadata(_)
            | TesseraError::Corruption(_) => ErrorKind::Corruption,
            TesseraError::InvalidArgument(_)
            | TesseraError::InvalidConfig(_)
            | TesseraError::Analysis(_) => ErrorKind::InvalidInput,
            TesseraError::InvalidOperation(_) => ErrorKind::Closed,
            TesseraError::Index(_) => ErrorKind::Other,
            TesseraError::Flush { source, .. } => source.kind(),
        }
    }

    /// Whether retrying the same operation could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Io
    }
}
