//! Multiplexer configuration.

use std::time::Duration;

use crate::error::Error;

/// Default bound of the submission queue.
pub const DEFAULT_SUBMISSION_CAPACITY: usize = 32;

/// Tunables fixed at construction time.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use muxer::Config;
///
/// let config = Config::new(Duration::from_secs(5))
///     .unwrap()
///     .with_submission_capacity(8)
///     .unwrap();
/// assert_eq!(config.submission_capacity(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    request_timeout: Duration,
    submission_capacity: usize,
}

impl Config {
    /// Build a validated configuration.
    ///
    /// `request_timeout` is the total deadline applied to every request,
    /// measured from the moment `send` is entered. It must be strictly
    /// positive.
    pub fn new(request_timeout: Duration) -> Result<Self, Error> {
        if request_timeout.is_zero() {
            return Err(Error::InvalidArgument(
                "request_timeout must be strictly positive",
            ));
        }
        Ok(Self {
            request_timeout,
            submission_capacity: DEFAULT_SUBMISSION_CAPACITY,
        })
    }

    /// Override the bound of the submission queue. Must be at least 1.
    ///
    /// A full queue backpressures `send` until space frees up, the caller
    /// cancels, or the request's deadline expires.
    pub fn with_submission_capacity(mut self, capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidArgument(
                "submission_capacity must be at least 1",
            ));
        }
        self.submission_capacity = capacity;
        Ok(self)
    }

    /// Per-request total deadline.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Bound of the submission queue.
    pub fn submission_capacity(&self) -> usize {
        self.submission_capacity
    }
}
