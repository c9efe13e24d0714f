//! Ready-made conditions over a queryable page.
//!
//! Every constructor returns a [`Condition`] that can be handed to
//! [`ConditionWaiter::wait_until`]. Query errors that are expected to clear up
//! on their own (stale or detached nodes) surface as
//! [`Outcome::TransientError`]; a selector that matches nothing yet is simply
//! pending. Anything else is raised and ends the wait.

use crate::locator::{Locator, Selector};
use crate::result::{QueryError, WaitError};
use crate::spec::WaitSpec;
use crate::wait::{condition, Condition, ConditionWaiter, Outcome, WaitResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// =============================================================================
// PAGE HANDLE
// =============================================================================

/// Snapshot of one element, as reported by the page handle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Rendered and not hidden
    pub displayed: bool,
    /// Accepts input
    pub enabled: bool,
    /// Visible text content
    pub text: String,
    /// Attribute values by name
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ElementState {
    /// A displayed, enabled element with the given text
    #[must_use]
    pub fn shown(text: impl Into<String>) -> Self {
        Self {
            displayed: true,
            enabled: true,
            text: text.into(),
            attributes: HashMap::new(),
        }
    }

    /// An element that is in the DOM but not displayed
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Mark the element disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attribute value by name
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Displayed and enabled
    #[must_use]
    pub const fn is_clickable(&self) -> bool {
        self.displayed && self.enabled
    }
}

/// `document.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    /// Still parsing
    Loading,
    /// Parsed, subresources loading
    Interactive,
    /// Fully loaded
    Complete,
}

impl FromStr for ReadyState {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "loading" => Ok(Self::Loading),
            "interactive" => Ok(Self::Interactive),
            "complete" => Ok(Self::Complete),
            other => Err(QueryError::script(format!(
                "unexpected document.readyState {other:?}"
            ))),
        }
    }
}

/// A live page that can be inspected without side effects.
///
/// Implemented by whatever drives the browser. Every call reflects the page at
/// the moment it is made; nothing is cached between calls.
pub trait PageQuery {
    /// First element matching `selector`, or `None` if there is none yet
    fn element(&self, selector: &Selector) -> Result<Option<ElementState>, QueryError>;

    /// Number of elements matching `selector`
    fn count(&self, selector: &Selector) -> Result<usize, QueryError>;

    /// Current document ready state
    fn ready_state(&self) -> Result<ReadyState, QueryError>;

    /// Current URL
    fn current_url(&self) -> Result<String, QueryError>;
}

impl<P: PageQuery + ?Sized> PageQuery for &P {
    fn element(&self, selector: &Selector) -> Result<Option<ElementState>, QueryError> {
        (**self).element(selector)
    }

    fn count(&self, selector: &Selector) -> Result<usize, QueryError> {
        (**self).count(selector)
    }

    fn ready_state(&self) -> Result<ReadyState, QueryError> {
        (**self).ready_state()
    }

    fn current_url(&self) -> Result<String, QueryError> {
        (**self).current_url()
    }
}

// =============================================================================
// ELEMENT CONDITIONS
// =============================================================================

/// State an element is waited into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementWait {
    /// In the DOM
    Present,
    /// In the DOM and displayed
    Visible,
    /// Displayed and enabled
    Clickable,
}

impl ElementWait {
    /// Check whether `state` satisfies this wait
    #[must_use]
    pub const fn accepts(self, state: &ElementState) -> bool {
        match self {
            Self::Present => true,
            Self::Visible => state.displayed,
            Self::Clickable => state.is_clickable(),
        }
    }
}

impl fmt::Display for ElementWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Present => "present",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
        })
    }
}

/// Turn a query result into an outcome.
///
/// A missing element is pending; transient errors are reported, not raised.
fn lift<T, U>(
    queried: Result<T, QueryError>,
    judge: impl FnOnce(T) -> Option<U>,
) -> Result<Outcome<U, QueryError>, QueryError> {
    match queried {
        Ok(value) => Ok(judge(value).into()),
        Err(QueryError::NoSuchElement { .. }) => Ok(Outcome::Pending),
        Err(err) if err.is_transient() => Ok(Outcome::TransientError(err)),
        Err(err) => Err(err),
    }
}

/// Element matching `selector` reaches `wait`
pub fn element_in<P>(
    selector: Selector,
    wait: ElementWait,
) -> impl Condition<P, Output = ElementState, Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    let description = format!("{selector} to be {wait}");
    condition(description, move |page: &P| {
        lift(page.element(&selector), |found| {
            found.filter(|state| wait.accepts(state))
        })
    })
}

/// Element is in the DOM
pub fn present<P>(selector: Selector) -> impl Condition<P, Output = ElementState, Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    element_in(selector, ElementWait::Present)
}

/// Element is displayed
pub fn visible<P>(selector: Selector) -> impl Condition<P, Output = ElementState, Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    element_in(selector, ElementWait::Visible)
}

/// Element is displayed and enabled
pub fn clickable<P>(
    selector: Selector,
) -> impl Condition<P, Output = ElementState, Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    element_in(selector, ElementWait::Clickable)
}

/// Element's trimmed text contains `expected`; yields the trimmed text
pub fn text_contains<P>(
    selector: Selector,
    expected: impl Into<String>,
) -> impl Condition<P, Output = String, Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    let expected = expected.into();
    let description = format!("{selector} text to contain {expected:?}");
    condition(description, move |page: &P| {
        lift(page.element(&selector), |found| {
            found
                .map(|state| state.text.trim().to_string())
                .filter(|text| text.contains(expected.as_str()))
        })
    })
}

/// Element's attribute `name` equals `value`
pub fn attribute_equals<P>(
    selector: Selector,
    name: impl Into<String>,
    value: impl Into<String>,
) -> impl Condition<P, Output = ElementState, Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    let name = name.into();
    let value = value.into();
    let description = format!("{selector} attribute {name}={value:?}");
    condition(description, move |page: &P| {
        lift(page.element(&selector), |found| {
            found.filter(|state| state.attribute(&name) == Some(value.as_str()))
        })
    })
}

/// Element is gone or hidden.
///
/// A stale or detached node counts as gone.
pub fn disappeared<P>(selector: Selector) -> impl Condition<P, Output = (), Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    let description = format!("{selector} to disappear");
    condition(description, move |page: &P| match page.element(&selector) {
        Ok(Some(state)) if state.displayed => Ok(Outcome::Pending),
        Ok(_)
        | Err(
            QueryError::NoSuchElement { .. }
            | QueryError::StaleElement { .. }
            | QueryError::Detached { .. },
        ) => Ok(Outcome::Satisfied(())),
        Err(err) if err.is_transient() => Ok(Outcome::TransientError(err)),
        Err(err) => Err(err),
    })
}

/// At least `min` elements match; yields the count
pub fn count_at_least<P>(
    selector: Selector,
    min: usize,
) -> impl Condition<P, Output = usize, Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    let description = format!("at least {min} of {selector}");
    condition(description, move |page: &P| {
        lift(page.count(&selector), |count| (count >= min).then_some(count))
    })
}

/// `document.readyState` is `complete`
pub fn document_ready<P>() -> impl Condition<P, Output = (), Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    condition("document ready", |page: &P| {
        lift(page.ready_state(), |state| {
            (state == ReadyState::Complete).then_some(())
        })
    })
}

/// Current URL contains `fragment`; yields the URL
pub fn url_contains<P>(
    fragment: impl Into<String>,
) -> impl Condition<P, Output = String, Error = QueryError>
where
    P: PageQuery + ?Sized,
{
    let fragment = fragment.into();
    let description = format!("url to contain {fragment:?}");
    condition(description, move |page: &P| {
        lift(page.current_url(), |url| {
            url.contains(fragment.as_str()).then_some(url)
        })
    })
}

// =============================================================================
// LOCATOR FALLBACK
// =============================================================================

/// One condition per selector of `locator`, primary first.
///
/// Feed the result to [`ConditionWaiter::wait_for_any`]; the winning index is
/// the selector's position in [`Locator::selectors`].
pub fn first_in<P>(
    locator: &Locator,
    wait: ElementWait,
) -> Vec<impl Condition<P, Output = ElementState, Error = QueryError>>
where
    P: PageQuery + ?Sized,
{
    locator
        .selectors()
        .map(|selector| element_in(selector.clone(), wait))
        .collect()
}

/// [`first_in`] for visibility
pub fn first_visible<P>(
    locator: &Locator,
) -> Vec<impl Condition<P, Output = ElementState, Error = QueryError>>
where
    P: PageQuery + ?Sized,
{
    first_in(locator, ElementWait::Visible)
}

/// An element found through one of a locator's selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Position of the matching selector, 0 for the primary
    pub index: usize,
    /// The selector that matched
    pub selector: Selector,
    /// Element state when it matched
    pub state: ElementState,
}

impl Located {
    /// Whether a fallback selector had to be used
    #[must_use]
    pub const fn used_fallback(&self) -> bool {
        self.index > 0
    }
}

/// Wait until any selector of `locator` reaches `wait`.
///
/// Selectors are tried in order each tick, so the primary wins whenever it
/// matches on the same tick as a fallback.
pub fn wait_for_locator<P>(
    waiter: &ConditionWaiter,
    page: &P,
    locator: &Locator,
    wait: ElementWait,
    spec: &WaitSpec,
) -> Result<WaitResult<Located, QueryError>, WaitError<QueryError>>
where
    P: PageQuery + ?Sized,
{
    let selectors: Vec<&Selector> = locator.selectors().collect();
    let conditions = first_in::<P>(locator, wait);
    let result = waiter.wait_for_any(page, &conditions, spec)?;
    Ok(result.map(|(index, state)| {
        // one condition per selector, so the winning index is always in range
        let selector = selectors[index].clone();
        if index > 0 {
            debug!(locator = %locator, %selector, "matched fallback selector");
        }
        Located {
            index,
            selector,
            state,
        }
    }))
}

// =============================================================================
// TESTS
// =============================================================================
