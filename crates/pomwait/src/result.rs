//! Result and error types for pomwait.

use crate::classify::ErrorClass;
use thiserror::Error;

/// Result type for wait operations whose conditions raise `E`
pub type WaitOpResult<T, E> = Result<T, WaitError<E>>;

/// Errors that abort a wait instead of ending it with a result.
///
/// A timeout or a cancellation is not an error: both come back as a
/// [`WaitResult`](crate::WaitResult) the caller has to branch on.
#[derive(Debug, Error)]
pub enum WaitError<E> {
    /// The wait was configured incorrectly (non-positive timeout or poll
    /// interval, empty condition list). Never retried.
    #[error("Invalid wait spec: {message}")]
    InvalidSpec {
        /// What was wrong with the configuration
        message: String,
    },

    /// A condition or operation raised an error classified as permanent
    #[error("Condition failed: {0}")]
    Condition(#[source] E),
}

impl<E> WaitError<E> {
    /// Create an invalid spec error
    #[must_use]
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// Check if this is a spec validation error
    #[must_use]
    pub const fn is_invalid_spec(&self) -> bool {
        matches!(self, Self::InvalidSpec { .. })
    }

    /// The permanent error raised by the condition, if any
    #[must_use]
    pub const fn condition_error(&self) -> Option<&E> {
        match self {
            Self::Condition(e) => Some(e),
            Self::InvalidSpec { .. } => None,
        }
    }
}

/// Errors reported by a live page handle when it is queried or driven
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The element reference went stale (the DOM was re-rendered)
    #[error("Stale element: {selector}")]
    StaleElement {
        /// Selector that produced the stale reference
        selector: String,
    },

    /// The node was temporarily detached from the document
    #[error("Element detached from document: {selector}")]
    Detached {
        /// Selector of the detached node
        selector: String,
    },

    /// No element matched the selector
    #[error("No element matches {selector}")]
    NoSuchElement {
        /// Selector that matched nothing
        selector: String,
    },

    /// Another element received the click (overlay, popup, animation)
    #[error("Click on {selector} intercepted")]
    ClickIntercepted {
        /// Selector that was clicked
        selector: String,
    },

    /// The selector is malformed
    #[error("Invalid selector {selector}: {message}")]
    InvalidSelector {
        /// Offending selector
        selector: String,
        /// Parser message
        message: String,
    },

    /// Script evaluation failed in the page
    #[error("Script error: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// The browser session or driver failed
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },
}

impl QueryError {
    /// Create a stale element error
    #[must_use]
    pub fn stale(selector: impl Into<String>) -> Self {
        Self::StaleElement {
            selector: selector.into(),
        }
    }

    /// Create a detached element error
    #[must_use]
    pub fn detached(selector: impl Into<String>) -> Self {
        Self::Detached {
            selector: selector.into(),
        }
    }

    /// Create a no-such-element error
    #[must_use]
    pub fn no_such_element(selector: impl Into<String>) -> Self {
        Self::NoSuchElement {
            selector: selector.into(),
        }
    }

    /// Create a click intercepted error
    #[must_use]
    pub fn click_intercepted(selector: impl Into<String>) -> Self {
        Self::ClickIntercepted {
            selector: selector.into(),
        }
    }

    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Whether retrying the same query can reasonably succeed
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::StaleElement { .. }
            | Self::Detached { .. }
            | Self::NoSuchElement { .. }
            | Self::ClickIntercepted { .. } => ErrorClass::Transient,
            Self::InvalidSelector { .. } | Self::Script { .. } | Self::Driver { .. } => {
                ErrorClass::Permanent
            }
        }
    }

    /// Shorthand for `class() == ErrorClass::Transient`
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient)
    }
}
