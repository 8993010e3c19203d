use std::any::Any;
use std::fmt;
use std::io;

/// Errors produced by the pool and the parallel operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A thread budget or worker count that cannot be used
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A reduction that has no value for an empty sequence
    #[error("operation is undefined on an empty sequence")]
    EmptyInput,

    /// The pool shut down while the caller was waiting on its results
    #[error("interrupted: pool closed before all results were produced")]
    Interrupted,

    /// One or more chunks panicked; every failure is kept
    #[error("{} of the chunk computations failed: {}", .failures.len(), FailureList(.failures))]
    AggregatedChunkFailure { failures: Vec<ChunkFailure> },

    /// The operating system refused to start a thread
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A single failed chunk or task, identified by its position
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("chunk {index} panicked: {message}")]
pub struct ChunkFailure {
    pub index: usize,
    pub message: String,
}

impl ChunkFailure {
    pub(crate) fn from_panic(index: usize, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_owned()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            String::from("non-string panic payload")
        };
        ChunkFailure { index, message }
    }
}

struct FailureList<'a>(&'a [ChunkFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, failure) in self.0.iter().enumerate() {
            if n > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl Error {
    /// Failures carried by an aggregated error, empty for every other kind
    pub fn failures(&self) -> &[ChunkFailure] {
        match self {
            Error::AggregatedChunkFailure { failures } => failures,
            _ => &[],
        }
    }

    pub(crate) fn aggregate(failures: Vec<ChunkFailure>) -> Result<()> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::AggregatedChunkFailure { failures })
        }
    }
}
