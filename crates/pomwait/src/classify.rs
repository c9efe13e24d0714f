//! Transient vs permanent error classification.
//!
//! The engine never decides on its own whether an error is worth retrying.
//! Callers hand a [`Classifier`] to the [`WaitSpec`](crate::WaitSpec); the
//! waiter asks it about every error a condition or operation raises.

use crate::result::QueryError;
use regex::Regex;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Whether a failure is expected to resolve itself on retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Likely to self-resolve (stale reference, detached node)
    Transient,
    /// Retrying will not help (malformed locator, dead session)
    Permanent,
}

impl ErrorClass {
    /// Check if the class is transient
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Transient)
    }
}

type ClassifyFn = dyn Fn(&(dyn Error + 'static)) -> ErrorClass + Send + Sync;

/// Predicate that sorts raised errors into [`ErrorClass`]es.
///
/// Cheap to clone; the underlying function is shared.
#[derive(Clone)]
pub struct Classifier {
    func: Arc<ClassifyFn>,
    description: String,
}

impl Classifier {
    /// Create a classifier from a function over type-erased errors
    pub fn new<F>(func: F, description: impl Into<String>) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> ErrorClass + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            description: description.into(),
        }
    }

    /// Every raised error is permanent
    #[must_use]
    pub fn all_permanent() -> Self {
        Self::new(|_| ErrorClass::Permanent, "all permanent")
    }

    /// Every raised error is transient
    #[must_use]
    pub fn all_transient() -> Self {
        Self::new(|_| ErrorClass::Transient, "all transient")
    }

    /// Classify errors of a concrete type `T` with `func`.
    ///
    /// The error and its `source()` chain are searched for a `T`; errors that
    /// contain none are permanent.
    pub fn for_type<T, F>(func: F) -> Self
    where
        T: Error + 'static,
        F: Fn(&T) -> ErrorClass + Send + Sync + 'static,
    {
        Self::new(
            move |err| find_in_chain::<T>(err).map_or(ErrorClass::Permanent, &func),
            std::any::type_name::<T>(),
        )
    }

    /// Classify [`QueryError`]s by their own [`QueryError::class`]
    #[must_use]
    pub fn query_errors() -> Self {
        Self::for_type::<QueryError, _>(QueryError::class)
    }

    /// Errors whose message mentions a known-failing URL are transient
    #[must_use]
    pub fn ignoring_urls(urls: IgnoredUrls) -> Self {
        Self::new(
            move |err| {
                if urls.should_ignore(&err.to_string()) {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Permanent
                }
            },
            "ignored urls",
        )
    }

    /// Transient if either classifier says so
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        let description = format!("{} | {}", self.description, other.description);
        Self::new(
            move |err| {
                if self.classify(err).is_transient() || other.classify(err).is_transient() {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Permanent
                }
            },
            description,
        )
    }

    /// Classify an error
    #[must_use]
    pub fn classify(&self, err: &(dyn Error + 'static)) -> ErrorClass {
        (self.func)(err)
    }

    /// Human readable description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::all_permanent()
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

fn find_in_chain<'a, T: Error + 'static>(err: &'a (dyn Error + 'static)) -> Option<&'a T> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

/// Default URL fragments known to fail on the demo storefront
pub const DEFAULT_IGNORED_URL_FRAGMENTS: &[&str] = &[
    "failed-request",
    "analytics",
    "tracking",
    "ads",
    "advertisement",
];

#[derive(Debug, Clone)]
enum UrlRule {
    Fragment(String),
    Pattern(Regex),
}

impl UrlRule {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Self::Fragment(fragment) => lowered.contains(fragment.as_str()),
            Self::Pattern(re) => re.is_match(lowered),
        }
    }
}

/// Allowlist of URLs whose failures should not fail a test
#[derive(Debug, Clone)]
pub struct IgnoredUrls {
    rules: Vec<UrlRule>,
}

impl Default for IgnoredUrls {
    fn default() -> Self {
        DEFAULT_IGNORED_URL_FRAGMENTS
            .iter()
            .fold(Self::empty(), |urls, fragment| urls.with_fragment(*fragment))
    }
}

impl IgnoredUrls {
    /// Allowlist with no rules
    #[must_use]
    pub const fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Ignore URLs containing `fragment` (case-insensitive)
    #[must_use]
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.rules
            .push(UrlRule::Fragment(fragment.into().to_lowercase()));
        self
    }

    /// Ignore URLs matching a regular expression.
    ///
    /// The pattern is compiled case-insensitively.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!("(?i){pattern}"))?;
        self.rules.push(UrlRule::Pattern(re));
        Ok(self)
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if there are no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check whether a failure involving `url` should be ignored
    #[must_use]
    pub fn should_ignore(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        let lowered = url.to_lowercase();
        self.rules.iter().any(|rule| rule.matches(&lowered))
    }

    /// Check whether a browser console message is an error worth failing on.
    ///
    /// Messages about ignored URLs and favicon misses are never critical.
    #[must_use]
    pub fn is_critical(&self, console_message: &str) -> bool {
        let lowered = console_message.to_lowercase();
        lowered.contains("error") && !lowered.contains("favicon") && !self.should_ignore(&lowered)
    }
}
