//! Engine error type.

use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced at the engine API boundary.
///
/// The type is cheap to clone so the epoch registry can hand one build
/// failure to every thread that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A progress callback returned `false`.
    #[error("operation cancelled by progress callback")]
    Cancelled,

    /// The Keccak primitive reported a failure.
    #[error("hash backend failure: {0}")]
    HashBackend(String),

    /// Magic, reserved bytes, offsets or sizes of a DAG file failed
    /// validation.
    #[error("DAG file is corrupt: {0}")]
    DagCorrupt(String),

    /// The file carries a major version or revision this build does not
    /// understand.
    #[error("unsupported DAG file version {major}.{revision}")]
    VersionMismatch { major: u32, revision: u32 },

    /// Underlying read, write or seek failure, including truncation.
    #[error("i/o error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// Allocation of a cache or dataset failed.
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),

    /// The epoch registry could not be acquired (poisoned lock).
    #[error("epoch registry is busy")]
    RegistryBusy,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
