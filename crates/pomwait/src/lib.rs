//! Pomwait: condition waits for page-object UI tests
//!
//! Browser tests fail for two boring reasons: the page is not there yet, or
//! the element that was there a moment ago got re-rendered. Pomwait turns both
//! into bounded, explicit waits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   evaluate    ┌───────────────┐   query   ┌─────────────┐
//! │ PageObject   │──────────────►│ Condition     │──────────►│ PageQuery   │
//! │ (composes a  │               │ (Pending /    │           │ (browser    │
//! │  waiter)     │◄──────────────│  Satisfied /  │◄──────────│  handle)    │
//! └──────────────┘  WaitResult   │  Transient)   │ QueryError└─────────────┘
//!        │                       └───────────────┘
//!        ▼
//! ┌──────────────────────────────────────────────┐
//! │ ConditionWaiter: Clock + CancellationToken   │
//! │ wait_until / wait_for_any / retrying         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use pomwait::{condition, ConditionWaiter, Outcome, QueryError, WaitSpec};
//! use std::cell::Cell;
//!
//! let polls = Cell::new(0_u32);
//! let third_poll = condition("third poll", |n: &Cell<u32>| {
//!     n.set(n.get() + 1);
//!     Ok::<_, QueryError>(if n.get() >= 3 {
//!         Outcome::Satisfied(n.get())
//!     } else {
//!         Outcome::Pending
//!     })
//! });
//!
//! let result = ConditionWaiter::new().wait_until(&polls, &third_poll, &WaitSpec::fast())?;
//! assert_eq!(result.into_value(), Some(3));
//! # Ok::<(), pomwait::WaitError<QueryError>>(())
//! ```

#![warn(missing_docs)]

mod cancel;
mod classify;
mod clock;
pub mod conditions;
mod locator;
pub mod page;
mod result;
mod spec;
mod wait;

pub use cancel::CancellationToken;
pub use classify::{Classifier, ErrorClass, IgnoredUrls, DEFAULT_IGNORED_URL_FRAGMENTS};
pub use clock::{Clock, FakeClock, SystemClock};
pub use conditions::{ElementState, ElementWait, Located, PageQuery, ReadyState};
pub use locator::{Locator, Selector};
pub use page::{LoadedPage, PageActions, PageObject, UrlMatcher};
pub use result::{QueryError, WaitError, WaitOpResult};
pub use spec::{WaitSpec, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
pub use wait::{
    condition, Condition, ConditionWaiter, FnCondition, Outcome, TimedOut, TimeoutReason, Unmet,
    WaitReport, WaitResult,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::conditions::{
        attribute_equals, clickable, count_at_least, disappeared, document_ready, first_visible,
        present, text_contains, url_contains, visible, wait_for_locator,
    };
    pub use super::page::{click, click_if_shown, fill, wait_until_loaded};
    pub use super::{
        condition, CancellationToken, Classifier, Condition, ConditionWaiter, ElementState,
        ElementWait, ErrorClass, IgnoredUrls, LoadedPage, Located, Locator, Outcome, PageActions,
        PageObject,
        PageQuery, QueryError, ReadyState, Selector, TimeoutReason, WaitError, WaitResult,
        WaitSpec,
    };
}
