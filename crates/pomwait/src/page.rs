//! Page objects and waited actions.
//!
//! A page object owns a [`ConditionWaiter`] and describes how to tell that
//! its page is loaded. Actions wait for their element first and then drive it
//! through [`ConditionWaiter::retrying`], so a stale or intercepted click is
//! retried instead of failing the test.

use crate::classify::Classifier;
use crate::conditions::{document_ready, wait_for_locator, ElementWait, Located, PageQuery};
use crate::locator::{Locator, Selector};
use crate::result::{QueryError, WaitError};
use crate::spec::WaitSpec;
use crate::wait::{condition, ConditionWaiter, Outcome, WaitReport, WaitResult};
use std::collections::HashMap;
use tracing::{debug, warn};

// =============================================================================
// URL MATCHING
// =============================================================================

/// URL pattern matcher for page objects
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    pattern: String,
    segments: Vec<UrlSegment>,
}

#[derive(Debug, Clone)]
enum UrlSegment {
    Literal(String),
    Wildcard,
    Parameter(String),
}

impl UrlMatcher {
    /// Create a matcher from a path pattern.
    ///
    /// Patterns support:
    /// - Literal segments: `/signin`
    /// - Wildcards: `/orders/*`
    /// - Named parameters: `/product/:id`
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s {
                "*" => UrlSegment::Wildcard,
                _ => s.strip_prefix(':').map_or_else(
                    || UrlSegment::Literal(s.to_string()),
                    |name| UrlSegment::Parameter(name.to_string()),
                ),
            })
            .collect();

        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    /// Check whether a URL or bare path matches.
    ///
    /// Scheme, host, query string and fragment are ignored.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let path: Vec<&str> = split_path(path_of(url)).collect();
        path.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(&path)
                .all(|(segment, actual)| match segment {
                    UrlSegment::Literal(lit) => lit == actual,
                    UrlSegment::Wildcard | UrlSegment::Parameter(_) => true,
                })
    }

    /// Extract named parameters from a matching URL
    #[must_use]
    pub fn extract_params(&self, url: &str) -> HashMap<String, String> {
        self.segments
            .iter()
            .zip(split_path(path_of(url)))
            .filter_map(|(segment, actual)| match segment {
                UrlSegment::Parameter(name) => Some((name.clone(), actual.to_string())),
                UrlSegment::Literal(_) | UrlSegment::Wildcard => None,
            })
            .collect()
    }

    /// The original pattern
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Path component of an absolute URL, or the input itself if it has no scheme
fn path_of(url: &str) -> &str {
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => url,
    };
    path.split(['?', '#']).next().unwrap_or(path)
}

// =============================================================================
// PAGE OBJECTS
// =============================================================================

/// A page or component of the application under test.
///
/// Page objects compose a waiter instead of inheriting wait helpers; the
/// handle type `H` is whatever drives the browser.
///
/// # Example
///
/// ```
/// use pomwait::{ConditionWaiter, Locator, PageObject, PageQuery, Selector};
///
/// struct SignInPage {
///     waiter: ConditionWaiter,
/// }
///
/// impl<H: PageQuery + ?Sized> PageObject<H> for SignInPage {
///     fn url_pattern(&self) -> &str {
///         "/signin"
///     }
///
///     fn ready_conditions(&self) -> Vec<Locator> {
///         vec![Locator::new(Selector::id("username"))]
///     }
///
///     fn waiter(&self) -> &ConditionWaiter {
///         &self.waiter
///     }
/// }
/// ```
pub trait PageObject<H: PageQuery + ?Sized> {
    /// URL path pattern of this page (see [`UrlMatcher`])
    fn url_pattern(&self) -> &str;

    /// Locators that must all be visible before the page counts as loaded
    fn ready_conditions(&self) -> Vec<Locator> {
        Vec::new()
    }

    /// Name for logs
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// The waiter this page polls with
    fn waiter(&self) -> &ConditionWaiter;

    /// Timing for this page's waits
    fn wait_spec(&self) -> WaitSpec {
        WaitSpec::default()
    }
}

/// What [`wait_until_loaded`] observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    /// URL the page loaded at
    pub url: String,
    /// Named parameters captured by the URL pattern
    pub params: HashMap<String, String>,
    /// Readiness elements, in [`PageObject::ready_conditions`] order
    pub ready: Vec<Located>,
}

/// Wait for `page` to be loaded in `handle`.
///
/// Waits in turn for the URL to match, the document to be ready, and every
/// readiness locator to be visible. Each step gets the page's full
/// [`WaitSpec`]. On success the report sums all steps; otherwise the first
/// unmet step's result is returned as is.
pub fn wait_until_loaded<H, P>(
    page: &P,
    handle: &H,
) -> Result<WaitResult<LoadedPage, QueryError>, WaitError<QueryError>>
where
    H: PageQuery + ?Sized,
    P: PageObject<H> + ?Sized,
{
    let waiter = page.waiter();
    let spec = page.wait_spec();
    let matcher = UrlMatcher::new(page.url_pattern());
    let mut total = WaitReport {
        attempts: 0,
        elapsed: std::time::Duration::ZERO,
    };
    let mut add = |report: WaitReport| {
        total.attempts += report.attempts;
        total.elapsed += report.elapsed;
    };

    let at_url = condition(
        format!("{} url to match {}", page.page_name(), matcher.pattern()),
        |h: &H| match h.current_url() {
            Ok(url) if matcher.matches(&url) => Ok(Outcome::Satisfied(url)),
            Ok(_) => Ok(Outcome::Pending),
            Err(err) if err.is_transient() => Ok(Outcome::TransientError(err)),
            Err(err) => Err(err),
        },
    );
    let (url, report) = match waiter.wait_until(handle, &at_url, &spec)?.into_satisfied() {
        Ok(found) => found,
        Err(unmet) => return Ok(unmet),
    };
    add(report);

    match waiter.wait_until(handle, &document_ready(), &spec)?.into_satisfied() {
        Ok(((), report)) => add(report),
        Err(unmet) => return Ok(unmet),
    }

    let mut ready = Vec::new();
    for locator in page.ready_conditions() {
        match wait_for_locator(waiter, handle, &locator, ElementWait::Visible, &spec)?
            .into_satisfied()
        {
            Ok((located, report)) => {
                add(report);
                ready.push(located);
            }
            Err(unmet) => return Ok(unmet),
        }
    }

    debug!(page = page.page_name(), %url, attempts = total.attempts, elapsed = ?total.elapsed, "page loaded");
    Ok(WaitResult::Satisfied {
        value: LoadedPage {
            params: matcher.extract_params(&url),
            url,
            ready,
        },
        report: total,
    })
}

// =============================================================================
// ACTIONS
// =============================================================================

/// A page handle that can also be driven
pub trait PageActions: PageQuery {
    /// Click the first element matching `selector`
    fn click(&self, selector: &Selector) -> Result<(), QueryError>;

    /// Type `text` into the first element matching `selector`
    fn type_text(&self, selector: &Selector, text: &str) -> Result<(), QueryError>;

    /// Clear the value of the first element matching `selector`
    fn clear(&self, selector: &Selector) -> Result<(), QueryError>;

    /// Run `script` in the page for its side effects.
    ///
    /// Handles that cannot evaluate scripts keep this default.
    fn execute_script(&self, script: &str) -> Result<(), QueryError> {
        let _ = script;
        Err(QueryError::script("script execution not supported"))
    }

    /// Click through the DOM instead of the input pipeline, so an overlay
    /// sitting on top of the element cannot swallow the click
    fn script_click(&self, selector: &Selector) -> Result<(), QueryError> {
        self.execute_script(&selector.click_script())
    }
}

/// Native click; an intercepted one is retried once as a script click.
///
/// If the script click fails too, the interception is what gets reported.
fn click_once<P>(page: &P, selector: &Selector) -> Result<(), QueryError>
where
    P: PageActions + ?Sized,
{
    match page.click(selector) {
        Err(intercepted @ QueryError::ClickIntercepted { .. }) => {
            page.script_click(selector).map_err(|err| {
                debug!(%selector, error = %err, "script click failed");
                intercepted
            })
        }
        clicked => clicked,
    }
}

/// `spec` with transient [`QueryError`]s added to its classifier
fn action_spec(spec: &WaitSpec) -> WaitSpec {
    spec.clone()
        .with_classifier(spec.classifier().clone().or(Classifier::query_errors()))
}

/// Wait until `locator` is clickable, then click it.
///
/// An intercepted click falls back to [`PageActions::script_click`]. Stale
/// and still-intercepted clicks are retried up to `max_retries` attempts.
pub fn click<P>(
    waiter: &ConditionWaiter,
    page: &P,
    locator: &Locator,
    spec: &WaitSpec,
) -> Result<WaitResult<Located, QueryError>, WaitError<QueryError>>
where
    P: PageActions + ?Sized,
{
    let (located, _) =
        match wait_for_locator(waiter, page, locator, ElementWait::Clickable, spec)?
            .into_satisfied()
        {
            Ok(found) => found,
            Err(unmet) => return Ok(unmet),
        };

    let selector = located.selector.clone();
    let clicked = waiter.retrying(page, |p: &P| click_once(p, &selector), &action_spec(spec))?;
    debug!(locator = %locator, %selector, clicked = clicked.is_satisfied(), "click");
    Ok(clicked.map(|()| located))
}

/// Wait until `locator` is visible, clear it and type `text`.
///
/// A failed clear is logged and ignored; typing is retried like [`click`].
pub fn fill<P>(
    waiter: &ConditionWaiter,
    page: &P,
    locator: &Locator,
    text: &str,
    spec: &WaitSpec,
) -> Result<WaitResult<Located, QueryError>, WaitError<QueryError>>
where
    P: PageActions + ?Sized,
{
    let (located, _) =
        match wait_for_locator(waiter, page, locator, ElementWait::Visible, spec)?
            .into_satisfied()
        {
            Ok(found) => found,
            Err(unmet) => return Ok(unmet),
        };

    let selector = located.selector.clone();
    if let Err(err) = page.clear(&selector) {
        warn!(%selector, error = %err, "clear failed, typing anyway");
    }
    let typed = waiter.retrying(page, |p: &P| p.type_text(&selector, text), &action_spec(spec))?;
    Ok(typed.map(|()| located))
}

/// Click `locator` if it shows up within `spec`.
///
/// For optional overlays such as permission prompts. An element that never
/// becomes visible is not a failure: the result is satisfied with `None`.
/// Once it is shown it has to become clickable like any [`click`] target.
pub fn click_if_shown<P>(
    waiter: &ConditionWaiter,
    page: &P,
    locator: &Locator,
    spec: &WaitSpec,
) -> Result<WaitResult<Option<Located>, QueryError>, WaitError<QueryError>>
where
    P: PageActions + ?Sized,
{
    match wait_for_locator(waiter, page, locator, ElementWait::Visible, spec)? {
        WaitResult::Satisfied { .. } => {}
        WaitResult::TimedOut(t) if t.last_error.is_none() => {
            debug!(locator = %locator, "not shown, nothing to click");
            return Ok(WaitResult::Satisfied {
                value: None,
                report: t.report,
            });
        }
        unmet => return Ok(unmet.map(Some)),
    }
    Ok(click(waiter, page, locator, spec)?.map(Some))
}

// =============================================================================
// TESTS
// =============================================================================
