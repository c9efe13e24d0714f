//! Wait configuration.
//!
//! A [`WaitSpec`] is immutable for the duration of a wait call. The defaults
//! (10 s timeout, 500 ms polling, three stale-element retries) suit a typical
//! storefront; every one of them can be overridden.

use crate::classify::{Classifier, ErrorClass};
use crate::result::WaitError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default polling interval (500ms)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default transient error budget
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Parameters of a single wait call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSpec {
    /// Total time budget
    pub timeout: Duration,
    /// Sleep between unmet poll ticks or retry attempts
    pub poll_interval: Duration,
    /// Whether transient errors are absorbed instead of ending the wait
    pub retry_on_transient_error: bool,
    /// Transient error budget; `None` means unlimited within the timeout.
    ///
    /// For condition waits this is the number of consecutive transient
    /// errors tolerated. For [`retrying`](crate::ConditionWaiter::retrying)
    /// it is the total number of attempts.
    pub max_retries: Option<usize>,
    /// Decides which raised errors are transient
    #[serde(skip)]
    classifier: Classifier,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_on_transient_error: true,
            max_retries: Some(DEFAULT_MAX_RETRIES),
            classifier: Classifier::default(),
        }
    }
}

impl WaitSpec {
    /// Create a spec with the default timing and the given timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Short timeout, fast polling
    #[must_use]
    pub fn fast() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
            ..Self::default()
        }
    }

    /// Long timeout, slower polling
    #[must_use]
    pub fn slow() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Set the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable absorbing transient errors
    #[must_use]
    pub const fn with_retry_on_transient(mut self, retry: bool) -> Self {
        self.retry_on_transient_error = retry;
        self
    }

    /// Set the transient error budget
    #[must_use]
    pub const fn with_max_retries(mut self, max: usize) -> Self {
        self.max_retries = Some(max);
        self
    }

    /// Allow any number of transient errors within the timeout
    #[must_use]
    pub const fn with_unlimited_retries(mut self) -> Self {
        self.max_retries = None;
        self
    }

    /// Set the error classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// The error classifier
    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Classify a raised error with this configuration's classifier
    #[must_use]
    pub fn classify<E: Error + 'static>(&self, err: &E) -> ErrorClass {
        self.classifier.classify(err)
    }

    /// Check that the timing parameters are usable
    pub fn validate<E>(&self) -> Result<(), WaitError<E>> {
        if self.timeout.is_zero() {
            return Err(WaitError::invalid_spec("timeout must be positive"));
        }
        if self.poll_interval.is_zero() {
            return Err(WaitError::invalid_spec("poll interval must be positive"));
        }
        Ok(())
    }

    /// Whether `consecutive` transient errors still fit in the budget
    #[must_use]
    pub const fn tolerates(&self, consecutive: usize) -> bool {
        if !self.retry_on_transient_error {
            return false;
        }
        match self.max_retries {
            Some(max) => consecutive <= max,
            None => true,
        }
    }
}
