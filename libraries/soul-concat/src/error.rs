//! Error types for playlist concatenation

use thiserror::Error;

/// Concatenation errors
#[derive(Debug, Error)]
pub enum ConcatError {
    /// Index outside the playlist
    #[error("Index out of bounds: {index} (size {size})")]
    IndexOutOfBounds { index: usize, size: usize },

    /// Range with `from > to`
    #[error("Invalid range: {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    /// Shuffle order is not a permutation of `0..len`
    #[error("Invalid shuffle order: {0}")]
    InvalidShuffleOrder(String),

    /// Error reported by a child source, forwarded unchanged
    #[error("Child source failed to prepare: {0}")]
    ChildPrepare(#[from] SourceError),

    /// Lifecycle misuse (e.g. preparing an engine twice)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A command could not be applied to the engine's holder list.
    ///
    /// The mirror only ever emits commands that fit the list, so this means
    /// engine state is corrupted.
    #[error("Engine invariant violated: {0}")]
    InvariantViolation(String),
}

/// Errors raised by child sources and their periods
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source could not produce its timeline or period
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for concatenation operations
pub type Result<T> = std::result::Result<T, ConcatError>;
