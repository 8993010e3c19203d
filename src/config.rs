use std::env::{self, VarError};
use std::num::NonZeroUsize;

use crate::error::{Error, Result};
use crate::pool::ThreadPool;

/// Environment variable that overrides the default worker count
pub const WORKERS_ENV: &str = "CHUNK_POOL_WORKERS";

/// Prefix for worker thread names, followed by the worker id
pub const DEFAULT_THREAD_NAME: &str = "cp";

/// Worker count used when none is configured
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Parse a worker count from configuration text
///
/// The text is read as a signed integer so that a negative count is reported
/// as an [`Error::InvalidConfiguration`] rather than as a parse failure.
pub fn parse_worker_count(text: &str) -> Result<usize> {
    let value: i64 = text.trim().parse().map_err(|_| {
        Error::InvalidConfiguration(format!("worker count {text:?} is not an integer"))
    })?;
    usize::try_from(value).map_err(|_| {
        Error::InvalidConfiguration(format!("worker count must not be negative, got {value}"))
    })
}

/// Configures and starts a [`ThreadPool`]
///
/// ```
/// let pool = chunk_pool::ThreadPool::builder()
///     .workers(2)
///     .thread_name("render")
///     .build()
///     .unwrap();
/// assert_eq!(pool.worker_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    pub(crate) workers: Option<usize>,
    pub(crate) thread_name: String,
    pub(crate) stack_size: Option<usize>,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            workers: None,
            thread_name: String::from(DEFAULT_THREAD_NAME),
            stack_size: None,
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from defaults, taking the worker count from [`WORKERS_ENV`] if set
    pub fn from_env() -> Result<Self> {
        match env::var(WORKERS_ENV) {
            Ok(text) => Ok(Self::new().workers(parse_worker_count(&text)?)),
            Err(VarError::NotPresent) => Ok(Self::new()),
            Err(VarError::NotUnicode(_)) => Err(Error::InvalidConfiguration(format!(
                "{WORKERS_ENV} is not valid unicode"
            ))),
        }
    }

    /// Number of workers; zero is allowed but such a pool never runs a task
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = Some(count);
        self
    }

    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count)
    }

    pub fn build(self) -> Result<ThreadPool> {
        ThreadPool::from_builder(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_counts() {
        assert_eq!(parse_worker_count("4").unwrap(), 4);
        assert_eq!(parse_worker_count(" 0\n").unwrap(), 0);
    }

    #[test]
    fn negative_count_is_invalid_configuration() {
        let err = parse_worker_count("-1").unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn garbage_is_invalid_configuration() {
        assert!(matches!(
            parse_worker_count("many"),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn builder_defaults() {
        let builder = Builder::new();
        assert_eq!(builder.thread_name, DEFAULT_THREAD_NAME);
        assert!(builder.stack_size.is_none());
        assert_eq!(builder.worker_count(), default_worker_count());
        assert!(default_worker_count() >= 1);
        assert_eq!(Builder::new().workers(3).worker_count(), 3);
    }

    // one test owns the variable, so no other test observes it half-set
    #[test]
    fn workers_env_overrides_default() {
        unsafe { env::set_var(WORKERS_ENV, "3") };
        assert_eq!(Builder::from_env().unwrap().worker_count(), 3);

        unsafe { env::set_var(WORKERS_ENV, "-2") };
        let err = Builder::from_env().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(err.to_string().contains("negative"));

        unsafe { env::set_var(WORKERS_ENV, "lots") };
        assert!(matches!(
            Builder::from_env(),
            Err(Error::InvalidConfiguration(_))
        ));

        #[cfg(unix)]
        {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;

            unsafe { env::set_var(WORKERS_ENV, OsStr::from_bytes(&[0x34, 0xff])) };
            assert!(matches!(
                Builder::from_env(),
                Err(Error::InvalidConfiguration(_))
            ));
        }

        unsafe { env::remove_var(WORKERS_ENV) };
        let builder = Builder::from_env().unwrap();
        assert!(builder.workers.is_none());
        assert_eq!(builder.worker_count(), default_worker_count());
    }
}
