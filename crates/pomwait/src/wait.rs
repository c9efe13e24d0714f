//! Condition Waits
//!
//! Polling primitives that turn an eventually-true UI predicate into a
//! bounded wait with explicit results.
//!
//! - [`ConditionWaiter::wait_until`] polls one condition.
//! - [`ConditionWaiter::wait_for_any`] races several conditions per tick and
//!   reports the first one, in list order, that is satisfied.
//! - [`ConditionWaiter::retrying`] re-runs a one-shot action that failed with a
//!   transient error.
//!
//! A wait ends in one of three ways: satisfied, timed out, or cancelled. All
//! three are ordinary values. Only a misconfigured [`WaitSpec`] or a permanent error
//! raised by the condition comes back as `Err`.

use crate::cancel::CancellationToken;
use crate::clock::{Clock, SystemClock};
use crate::result::WaitError;
use crate::spec::WaitSpec;
use std::convert::Infallible;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

// =============================================================================
// CONDITIONS
// =============================================================================

/// What a single evaluation of a condition observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// Not there yet, poll again
    Pending,
    /// The awaited state was reached
    Satisfied(T),
    /// The handle failed in a way that is expected to resolve itself
    TransientError(E),
}

impl<T, E> Outcome<T, E> {
    /// Check if the outcome is satisfied
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied(_))
    }

    /// Check if the outcome is pending
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Map the satisfied value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U, E> {
        match self {
            Self::Pending => Outcome::Pending,
            Self::Satisfied(v) => Outcome::Satisfied(f(v)),
            Self::TransientError(e) => Outcome::TransientError(e),
        }
    }
}

impl<T, E> From<Option<T>> for Outcome<T, E> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Pending, Self::Satisfied)
    }
}

/// A re-evaluatable predicate over a live UI handle.
///
/// Conditions must not keep state between evaluations; the waiter may call
/// them any number of times.
///
/// A condition reports transient failures it recognises itself as
/// [`Outcome::TransientError`]. Anything it raises through `Err` is handed to
/// the [`WaitSpec`]'s [`Classifier`](crate::Classifier), and is fatal to the wait
/// unless classified transient.
pub trait Condition<H: ?Sized> {
    /// Value produced once satisfied
    type Output;
    /// Error raised by the handle
    type Error;

    /// Evaluate against the handle
    fn evaluate(&self, handle: &H) -> Result<Outcome<Self::Output, Self::Error>, Self::Error>;

    /// Description for logs and timeout reports
    fn description(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl<H: ?Sized, C: Condition<H> + ?Sized> Condition<H> for Box<C> {
    type Output = C::Output;
    type Error = C::Error;

    fn evaluate(&self, handle: &H) -> Result<Outcome<Self::Output, Self::Error>, Self::Error> {
        (**self).evaluate(handle)
    }

    fn description(&self) -> String {
        (**self).description()
    }
}

impl<H: ?Sized, C: Condition<H> + ?Sized> Condition<H> for &C {
    type Output = C::Output;
    type Error = C::Error;

    fn evaluate(&self, handle: &H) -> Result<Outcome<Self::Output, Self::Error>, Self::Error> {
        (**self).evaluate(handle)
    }

    fn description(&self) -> String {
        (**self).description()
    }
}

/// A function-based condition
pub struct FnCondition<F, T, E> {
    func: F,
    description: String,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<F, T, E> fmt::Debug for FnCondition<F, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F, T, E> FnCondition<F, T, E> {
    /// Create a new function condition
    pub fn new(func: F, description: impl Into<String>) -> Self {
        Self {
            func,
            description: description.into(),
            _marker: PhantomData,
        }
    }
}

impl<H, F, T, E> Condition<H> for FnCondition<F, T, E>
where
    H: ?Sized,
    F: Fn(&H) -> Result<Outcome<T, E>, E>,
{
    type Output = T;
    type Error = E;

    fn evaluate(&self, handle: &H) -> Result<Outcome<T, E>, E> {
        (self.func)(handle)
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Build a condition from a closure
pub fn condition<H, T, E, F>(description: impl Into<String>, func: F) -> FnCondition<F, T, E>
where
    H: ?Sized,
    F: Fn(&H) -> Result<Outcome<T, E>, E>,
{
    FnCondition::new(func, description)
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Bookkeeping for a finished wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitReport {
    /// Number of poll ticks (or operation attempts) performed
    pub attempts: usize,
    /// Time spent waiting
    pub elapsed: Duration,
}

/// Why a wait gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutReason {
    /// The time budget ran out
    Deadline,
    /// Too many transient errors in a row
    RetriesExhausted,
}

/// A wait that ran out of budget
#[derive(Debug, Clone)]
pub struct TimedOut<E> {
    /// Attempts and elapsed time
    pub report: WaitReport,
    /// The configured timeout
    pub timeout: Duration,
    /// Which budget ran out
    pub reason: TimeoutReason,
    /// Last transient error seen, for diagnostics
    pub last_error: Option<E>,
    /// What was waited for
    pub waited_for: String,
}

impl<E: fmt::Display> fmt::Display for TimedOut<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.reason {
            TimeoutReason::Deadline => "timed out",
            TimeoutReason::RetriesExhausted => "gave up after repeated transient errors",
        };
        write!(
            f,
            "{} {what} after {} attempt(s) ({:.2}s, timeout {:.2}s)",
            self.waited_for,
            self.report.attempts,
            self.report.elapsed.as_secs_f64(),
            self.timeout.as_secs_f64()
        )?;
        if let Some(ref err) = self.last_error {
            write!(f, ": last error: {err}")?;
        }
        Ok(())
    }
}

/// Terminal state of a wait call
#[derive(Debug, Clone)]
#[must_use]
pub enum WaitResult<T, E> {
    /// The condition was satisfied
    Satisfied {
        /// Produced value
        value: T,
        /// Attempts and elapsed time
        report: WaitReport,
    },
    /// The budget ran out
    TimedOut(TimedOut<E>),
    /// The caller cancelled the wait
    Cancelled(WaitReport),
}

impl<T, E> WaitResult<T, E> {
    /// Check if the wait was satisfied
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Check if the wait timed out
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// Check if the wait was cancelled
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Borrow the satisfied value
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Satisfied { value, .. } => Some(value),
            Self::TimedOut(_) | Self::Cancelled(_) => None,
        }
    }

    /// Take the satisfied value
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Satisfied { value, .. } => Some(value),
            Self::TimedOut(_) | Self::Cancelled(_) => None,
        }
    }

    /// Timeout details, if timed out
    #[must_use]
    pub const fn timed_out(&self) -> Option<&TimedOut<E>> {
        match self {
            Self::TimedOut(t) => Some(t),
            Self::Satisfied { .. } | Self::Cancelled(_) => None,
        }
    }

    /// Attempts and elapsed time, whatever the outcome
    #[must_use]
    pub const fn report(&self) -> &WaitReport {
        match self {
            Self::Satisfied { report, .. } | Self::Cancelled(report) => report,
            Self::TimedOut(t) => &t.report,
        }
    }

    /// Map the satisfied value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> WaitResult<U, E> {
        match self {
            Self::Satisfied { value, report } => WaitResult::Satisfied {
                value: f(value),
                report,
            },
            Self::TimedOut(t) => WaitResult::TimedOut(t),
            Self::Cancelled(r) => WaitResult::Cancelled(r),
        }
    }

    /// Treat anything but success as an error.
    ///
    /// The waiter never does this on its own; callers opt in.
    pub fn into_result(self) -> Result<T, Unmet<E>> {
        match self {
            Self::Satisfied { value, .. } => Ok(value),
            Self::TimedOut(t) => Err(Unmet::TimedOut(t)),
            Self::Cancelled(r) => Err(Unmet::Cancelled(r)),
        }
    }

    /// Split off the satisfied value, keeping an unmet result re-typed to `U`.
    ///
    /// Lets a multi-step wait bail out with the step that failed.
    pub fn into_satisfied<U>(self) -> Result<(T, WaitReport), WaitResult<U, E>> {
        match self {
            Self::Satisfied { value, report } => Ok((value, report)),
            Self::TimedOut(t) => Err(WaitResult::TimedOut(t)),
            Self::Cancelled(r) => Err(WaitResult::Cancelled(r)),
        }
    }
}

/// A wait that ended without its condition being satisfied
#[derive(Debug, Error)]
pub enum Unmet<E> {
    /// The budget ran out
    #[error("{0}")]
    TimedOut(TimedOut<E>),
    /// The caller cancelled the wait
    #[error("wait cancelled after {} attempt(s)", .0.attempts)]
    Cancelled(WaitReport),
}

// =============================================================================
// WAITER
// =============================================================================

/// Polls conditions against a handle until satisfied, timed out or cancelled.
///
/// The waiter holds no per-call state, so one instance can be shared by a
/// page object and used from several threads. Handles are passed into each
/// call rather than looked up from ambient state.
#[derive(Debug, Clone)]
pub struct ConditionWaiter {
    clock: Arc<dyn Clock>,
    cancellation: Option<CancellationToken>,
}

impl Default for ConditionWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionWaiter {
    /// Create a waiter on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            cancellation: None,
        }
    }

    /// Use a different clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Observe a cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The cancellation token, if any
    #[must_use]
    pub const fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn elapsed_since(&self, start: Instant) -> Duration {
        self.clock.now().saturating_duration_since(start)
    }

    /// Poll `condition` until it is satisfied.
    ///
    /// Returns immediately on the first satisfied evaluation. Otherwise
    /// sleeps `poll_interval` between evaluations, so the call takes at most
    /// `timeout + poll_interval` plus evaluation time.
    pub fn wait_until<H, C>(
        &self,
        handle: &H,
        condition: &C,
        spec: &WaitSpec,
    ) -> Result<WaitResult<C::Output, C::Error>, WaitError<C::Error>>
    where
        H: ?Sized,
        C: Condition<H> + ?Sized,
        C::Error: Error + 'static,
    {
        let description = condition.description();
        self.poll(spec, &description, || {
            settle(spec, condition.evaluate(handle))
        })
    }

    /// Poll several conditions, returning the first satisfied one.
    ///
    /// Every tick evaluates the conditions in list order and stops at the
    /// first satisfied one, so when several are satisfied on the same tick
    /// the lowest index wins. The result carries that index.
    pub fn wait_for_any<H, C>(
        &self,
        handle: &H,
        conditions: &[C],
        spec: &WaitSpec,
    ) -> Result<WaitResult<(usize, C::Output), C::Error>, WaitError<C::Error>>
    where
        H: ?Sized,
        C: Condition<H>,
        C::Error: Error + 'static,
    {
        if conditions.is_empty() {
            return Err(WaitError::invalid_spec("no conditions to wait for"));
        }
        let description = conditions
            .iter()
            .map(|c| c.description())
            .collect::<Vec<_>>()
            .join(" | ");

        self.poll(spec, &description, || {
            let mut transient = None;
            for (index, condition) in conditions.iter().enumerate() {
                match settle(spec, condition.evaluate(handle))? {
                    Outcome::Satisfied(value) => return Ok(Outcome::Satisfied((index, value))),
                    Outcome::TransientError(err) => transient = Some(err),
                    Outcome::Pending => {}
                }
            }
            Ok(transient.map_or(Outcome::Pending, Outcome::TransientError))
        })
    }

    /// Poll a plain predicate until it returns true
    pub fn wait_for_function<H, F>(
        &self,
        handle: &H,
        predicate: F,
        spec: &WaitSpec,
    ) -> Result<WaitResult<(), Infallible>, WaitError<Infallible>>
    where
        H: ?Sized,
        F: Fn(&H) -> bool,
    {
        self.poll(spec, "custom function", || {
            Ok(if predicate(handle) {
                Outcome::Satisfied(())
            } else {
                Outcome::Pending
            })
        })
    }

    /// Run a one-shot action, retrying it after transient failures.
    ///
    /// `max_retries` is the total number of attempts here. A permanent error
    /// is returned on the spot; running out of attempts or time yields
    /// [`WaitResult::TimedOut`] with the last transient error attached.
    pub fn retrying<H, T, E, F>(
        &self,
        handle: &H,
        mut operation: F,
        spec: &WaitSpec,
    ) -> Result<WaitResult<T, E>, WaitError<E>>
    where
        H: ?Sized,
        E: Error + 'static,
        F: FnMut(&H) -> Result<T, E>,
    {
        spec.validate()?;
        if spec.max_retries == Some(0) {
            return Err(WaitError::invalid_spec(
                "max_retries must allow at least one attempt",
            ));
        }

        let start = self.clock.now();
        let mut attempts = 0;

        loop {
            if self.is_cancelled() {
                debug!(attempts, "retry cancelled");
                return Ok(WaitResult::Cancelled(WaitReport {
                    attempts,
                    elapsed: self.elapsed_since(start),
                }));
            }

            attempts += 1;
            let err = match operation(handle) {
                Ok(value) => {
                    let report = WaitReport {
                        attempts,
                        elapsed: self.elapsed_since(start),
                    };
                    debug!(attempts, elapsed = ?report.elapsed, "operation succeeded");
                    return Ok(WaitResult::Satisfied { value, report });
                }
                Err(err) => err,
            };

            if !spec.classify(&err).is_transient() {
                debug!(attempts, error = %err, "operation failed permanently");
                return Err(WaitError::Condition(err));
            }

            let elapsed = self.elapsed_since(start);
            let out_of_attempts = !spec.retry_on_transient_error
                || spec.max_retries.is_some_and(|max| attempts >= max);
            let reason = if out_of_attempts {
                Some(TimeoutReason::RetriesExhausted)
            } else if elapsed >= spec.timeout {
                Some(TimeoutReason::Deadline)
            } else {
                None
            };

            if let Some(reason) = reason {
                warn!(attempts, error = %err, ?reason, "giving up on operation");
                return Ok(WaitResult::TimedOut(TimedOut {
                    report: WaitReport { attempts, elapsed },
                    timeout: spec.timeout,
                    reason,
                    last_error: Some(err),
                    waited_for: "operation".to_string(),
                }));
            }

            warn!(attempts, error = %err, "transient failure, retrying");
            self.clock.sleep(spec.poll_interval);
        }
    }

    fn poll<T, E, F>(
        &self,
        spec: &WaitSpec,
        description: &str,
        mut tick: F,
    ) -> Result<WaitResult<T, E>, WaitError<E>>
    where
        E: Error + 'static,
        F: FnMut() -> Result<Outcome<T, E>, WaitError<E>>,
    {
        spec.validate()?;

        let start = self.clock.now();
        let mut attempts = 0;
        let mut consecutive_transient = 0;
        let mut last_error = None;

        loop {
            if self.is_cancelled() {
                debug!(waiting_for = description, attempts, "wait cancelled");
                return Ok(WaitResult::Cancelled(WaitReport {
                    attempts,
                    elapsed: self.elapsed_since(start),
                }));
            }

            attempts += 1;
            match tick()? {
                Outcome::Satisfied(value) => {
                    let report = WaitReport {
                        attempts,
                        elapsed: self.elapsed_since(start),
                    };
                    debug!(waiting_for = description, attempts, elapsed = ?report.elapsed, "condition satisfied");
                    return Ok(WaitResult::Satisfied { value, report });
                }
                Outcome::Pending => {
                    consecutive_transient = 0;
                    trace!(waiting_for = description, attempts, "condition pending");
                }
                Outcome::TransientError(err) => {
                    consecutive_transient += 1;
                    if !spec.tolerates(consecutive_transient) {
                        warn!(waiting_for = description, consecutive_transient, error = %err, "transient error budget exhausted");
                        return Ok(WaitResult::TimedOut(TimedOut {
                            report: WaitReport {
                                attempts,
                                elapsed: self.elapsed_since(start),
                            },
                            timeout: spec.timeout,
                            reason: TimeoutReason::RetriesExhausted,
                            last_error: Some(err),
                            waited_for: description.to_string(),
                        }));
                    }
                    warn!(waiting_for = description, consecutive_transient, error = %err, "transient error, polling again");
                    last_error = Some(err);
                }
            }

            let elapsed = self.elapsed_since(start);
            if elapsed >= spec.timeout {
                debug!(waiting_for = description, attempts, ?elapsed, "wait timed out");
                return Ok(WaitResult::TimedOut(TimedOut {
                    report: WaitReport { attempts, elapsed },
                    timeout: spec.timeout,
                    reason: TimeoutReason::Deadline,
                    last_error,
                    waited_for: description.to_string(),
                }));
            }

            self.clock.sleep(spec.poll_interval);
        }
    }
}

/// Route a raised error through the [`WaitSpec`] classifier
fn settle<T, E: Error + 'static>(
    spec: &WaitSpec,
    raised: Result<Outcome<T, E>, E>,
) -> Result<Outcome<T, E>, WaitError<E>> {
    match raised {
        Ok(outcome) => Ok(outcome),
        Err(err) if spec.classify(&err).is_transient() => Ok(Outcome::TransientError(err)),
        Err(err) => Err(WaitError::Condition(err)),
    }
}

// =============================================================================
// TESTS
// =============================================================================
