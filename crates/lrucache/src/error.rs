//! Error types for lrucache

use std::io;

use thiserror::Error;

/// Result type alias for lrucache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache construction and traversal
///
/// A missing key is not an error: `find` and `remove` report it as `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// Capacity must hold at least one entry
    #[error("Invalid capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    /// The traversal worker thread could not be started
    #[error("Failed to spawn traversal worker: {0}")]
    Spawn(#[from] io::Error),

    /// The traversal worker ended before it acquired the read lock
    #[error("Traversal worker exited before acquiring the read lock")]
    WorkerExited,
}
