//! In-memory storefront used by the integration tests.
//!
//! Elements appear and disappear on a schedule driven by a shared
//! [`FakeClock`], so every "slow page" scenario runs instantly and
//! deterministically.

#![allow(dead_code)]

use pomwait::{ElementState, FakeClock, PageActions, PageQuery, QueryError, ReadyState, Selector};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "https://testathon.live";

/// Time a navigation needs before `document.readyState` is complete
pub const LOAD_TIME: Duration = Duration::from_millis(300);

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
struct Scheduled {
    state: ElementState,
    from: Duration,
    until: Option<Duration>,
}

impl Scheduled {
    fn live_at(&self, now: Duration) -> bool {
        now >= self.from && !matches!(self.until, Some(until) if now >= until)
    }
}

#[derive(Debug, Default)]
struct State {
    url: String,
    loaded_at: Duration,
    elements: HashMap<Selector, Scheduled>,
    items: HashMap<Selector, Vec<Duration>>,
    stale_reads: HashMap<Selector, usize>,
    intercepted: HashMap<Selector, usize>,
    on_click: HashMap<Selector, String>,
    values: HashMap<Selector, String>,
    console: Vec<String>,
    actions: Vec<String>,
}

/// Fake browser tab on the demo storefront
#[derive(Debug)]
pub struct Storefront {
    clock: Arc<FakeClock>,
    state: RefCell<State>,
}

impl Storefront {
    pub fn new(clock: Arc<FakeClock>) -> Self {
        let state = State {
            url: format!("{BASE_URL}/"),
            loaded_at: clock.elapsed(),
            ..State::default()
        };
        Self {
            clock,
            state: RefCell::new(state),
        }
    }

    fn now(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Show `selector` from `at` on (virtual time since clock creation)
    pub fn show_at(&self, selector: Selector, state: ElementState, at: Duration) -> &Self {
        let _ = self.state.borrow_mut().elements.insert(
            selector,
            Scheduled {
                state,
                from: at,
                until: None,
            },
        );
        self
    }

    pub fn show(&self, selector: Selector, state: ElementState) -> &Self {
        let now = self.now();
        self.show_at(selector, state, now)
    }

    /// Remove `selector` from the DOM at `at`
    pub fn remove_at(&self, selector: &Selector, at: Duration) -> &Self {
        if let Some(scheduled) = self.state.borrow_mut().elements.get_mut(selector) {
            scheduled.until = Some(at);
        }
        self
    }

    /// Render one more list item matching `selector` at each of `times`
    pub fn items_at(&self, selector: Selector, times: &[Duration]) -> &Self {
        self.state
            .borrow_mut()
            .items
            .entry(selector)
            .or_default()
            .extend_from_slice(times);
        self
    }

    /// The next `n` reads of `selector` hit a re-rendered node
    pub fn stale_reads(&self, selector: Selector, n: usize) -> &Self {
        let _ = self.state.borrow_mut().stale_reads.insert(selector, n);
        self
    }

    /// The next `n` clicks on `selector` land on an overlay
    pub fn intercept_clicks(&self, selector: Selector, n: usize) -> &Self {
        let _ = self.state.borrow_mut().intercepted.insert(selector, n);
        self
    }

    /// Clicking `selector` navigates to `path`
    pub fn navigate_on_click(&self, selector: Selector, path: &str) -> &Self {
        let _ = self
            .state
            .borrow_mut()
            .on_click
            .insert(selector, format!("{BASE_URL}{path}"));
        self
    }

    pub fn navigate(&self, path: &str) {
        let now = self.now();
        let mut state = self.state.borrow_mut();
        state.url = format!("{BASE_URL}{path}");
        state.loaded_at = now;
    }

    pub fn log_console(&self, message: &str) {
        self.state.borrow_mut().console.push(message.to_string());
    }

    pub fn console(&self) -> Vec<String> {
        self.state.borrow().console.clone()
    }

    pub fn value(&self, selector: &Selector) -> Option<String> {
        self.state.borrow().values.get(selector).cloned()
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.borrow().actions.clone()
    }

    fn take_one(counter: &mut HashMap<Selector, usize>, selector: &Selector) -> bool {
        match counter.get_mut(selector) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    fn live(&self, selector: &Selector) -> Option<ElementState> {
        let now = self.now();
        self.state
            .borrow()
            .elements
            .get(selector)
            .filter(|scheduled| scheduled.live_at(now))
            .map(|scheduled| scheduled.state.clone())
    }

    fn require_visible(&self, selector: &Selector) -> Result<(), QueryError> {
        match self.live(selector) {
            Some(state) if state.displayed => Ok(()),
            _ => Err(QueryError::no_such_element(selector.to_string())),
        }
    }
}

impl PageQuery for Storefront {
    fn element(&self, selector: &Selector) -> Result<Option<ElementState>, QueryError> {
        if Self::take_one(&mut self.state.borrow_mut().stale_reads, selector) {
            return Err(QueryError::stale(selector.to_string()));
        }
        Ok(self.live(selector))
    }

    fn count(&self, selector: &Selector) -> Result<usize, QueryError> {
        let now = self.now();
        let state = self.state.borrow();
        Ok(state
            .items
            .get(selector)
            .map_or(0, |times| times.iter().filter(|at| **at <= now).count()))
    }

    fn ready_state(&self) -> Result<ReadyState, QueryError> {
        let since_load = self.now().saturating_sub(self.state.borrow().loaded_at);
        Ok(if since_load >= LOAD_TIME {
            ReadyState::Complete
        } else if since_load >= LOAD_TIME / 2 {
            ReadyState::Interactive
        } else {
            ReadyState::Loading
        })
    }

    fn current_url(&self) -> Result<String, QueryError> {
        Ok(self.state.borrow().url.clone())
    }
}

impl PageActions for Storefront {
    fn click(&self, selector: &Selector) -> Result<(), QueryError> {
        self.require_visible(selector)?;
        if Self::take_one(&mut self.state.borrow_mut().intercepted, selector) {
            return Err(QueryError::click_intercepted(selector.to_string()));
        }
        let target = {
            let mut state = self.state.borrow_mut();
            state.actions.push(format!("click {selector}"));
            state.on_click.get(selector).cloned()
        };
        if let Some(url) = target {
            let now = self.now();
            let mut state = self.state.borrow_mut();
            state.url = url;
            state.loaded_at = now;
        }
        Ok(())
    }

    fn type_text(&self, selector: &Selector, text: &str) -> Result<(), QueryError> {
        self.require_visible(selector)?;
        let mut state = self.state.borrow_mut();
        state.actions.push(format!("type {selector}"));
        state
            .values
            .entry(selector.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }

    fn clear(&self, selector: &Selector) -> Result<(), QueryError> {
        self.require_visible(selector)?;
        let mut state = self.state.borrow_mut();
        state.actions.push(format!("clear {selector}"));
        let _ = state.values.remove(selector);
        Ok(())
    }
}
