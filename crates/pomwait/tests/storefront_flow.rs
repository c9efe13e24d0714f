//! End-to-end flows against the fake storefront.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{init_tracing, ms, Storefront};
use pomwait::prelude::*;
use pomwait::{FakeClock, Unmet};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (ConditionWaiter, Arc<FakeClock>, Storefront) {
    init_tracing();
    let clock = Arc::new(FakeClock::new());
    let waiter = ConditionWaiter::new().with_clock(clock.clone());
    let storefront = Storefront::new(clock.clone());
    (waiter, clock, storefront)
}

fn spec() -> WaitSpec {
    WaitSpec::default()
        .with_timeout(Duration::from_secs(3))
        .with_poll_interval(ms(100))
}

// =============================================================================
// PAGE OBJECTS
// =============================================================================

struct HomePage {
    waiter: ConditionWaiter,
}

impl HomePage {
    fn sign_in_link() -> Locator {
        Locator::named("sign in link", Selector::id("signin"))
    }

    fn logged_in_user() -> Selector {
        Selector::css(".username")
    }
}

impl PageObject<Storefront> for HomePage {
    fn url_pattern(&self) -> &str {
        "/"
    }

    fn ready_conditions(&self) -> Vec<Locator> {
        vec![Self::sign_in_link()]
    }

    fn waiter(&self) -> &ConditionWaiter {
        &self.waiter
    }

    fn wait_spec(&self) -> WaitSpec {
        spec()
    }
}

struct SignInPage {
    waiter: ConditionWaiter,
}

impl SignInPage {
    fn username() -> Locator {
        Locator::named("username", Selector::css("#username input"))
            .or(Selector::id("react-select-2-input"))
    }

    fn password() -> Locator {
        Locator::named("password", Selector::css("#password input"))
            .or(Selector::id("react-select-3-input"))
    }

    fn login_button() -> Locator {
        Locator::named("log in", Selector::id("login-btn"))
    }

    fn sign_in(&self, tab: &Storefront, user: &str, password: &str) -> WaitResult<Located, QueryError> {
        let spec = spec();
        let typed = fill(&self.waiter, tab, &Self::username(), user, &spec).unwrap();
        if !typed.is_satisfied() {
            return typed;
        }
        let typed = fill(&self.waiter, tab, &Self::password(), password, &spec).unwrap();
        if !typed.is_satisfied() {
            return typed;
        }
        click(&self.waiter, tab, &Self::login_button(), &spec).unwrap()
    }
}

impl PageObject<Storefront> for SignInPage {
    fn url_pattern(&self) -> &str {
        "/signin"
    }

    fn ready_conditions(&self) -> Vec<Locator> {
        vec![Self::username(), Self::password()]
    }

    fn waiter(&self) -> &ConditionWaiter {
        &self.waiter
    }

    fn wait_spec(&self) -> WaitSpec {
        spec()
    }
}

// =============================================================================
// FLOWS
// =============================================================================

#[test]
fn test_sign_in_flow() {
    let (waiter, clock, tab) = setup();
    tab.show(Selector::id("signin"), ElementState::shown("Sign In"))
        .navigate_on_click(Selector::id("signin"), "/signin")
        .show_at(Selector::id("react-select-2-input"), ElementState::shown(""), ms(700))
        .show_at(Selector::id("react-select-3-input"), ElementState::shown(""), ms(700))
        .show_at(Selector::id("login-btn"), ElementState::shown("Log In"), ms(700))
        .intercept_clicks(Selector::id("login-btn"), 1)
        .navigate_on_click(Selector::id("login-btn"), "/?signin=true")
        .show_at(HomePage::logged_in_user(), ElementState::shown(" demouser "), ms(1500));

    let home = HomePage {
        waiter: waiter.clone(),
    };
    let loaded = wait_until_loaded(&home, &tab).unwrap();
    assert!(loaded.is_satisfied());
    assert!(click(&waiter, &tab, &HomePage::sign_in_link(), &spec())
        .unwrap()
        .is_satisfied());

    let sign_in = SignInPage {
        waiter: waiter.clone(),
    };
    let loaded = wait_until_loaded(&sign_in, &tab).unwrap().into_value().unwrap();
    assert!(loaded.ready.iter().all(Located::used_fallback));

    let logged_in = sign_in.sign_in(&tab, "demouser", "testingisfun99");
    assert_eq!(logged_in.report().attempts, 2);
    assert_eq!(
        tab.value(&Selector::id("react-select-2-input")).as_deref(),
        Some("demouser")
    );

    let user = waiter
        .wait_until(&tab, &text_contains(HomePage::logged_in_user(), "demouser"), &spec())
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(user, "demouser");
    assert!(tab.current_url().unwrap().ends_with("/?signin=true"));
    assert!(clock.elapsed() >= ms(1500));
    assert!(clock.elapsed() < ms(1500) + spec().poll_interval);
}

#[test]
fn test_products_render_progressively() {
    let (waiter, clock, tab) = setup();
    let times: Vec<Duration> = (1..=25).map(|i| ms(i * 100)).collect();
    tab.items_at(Selector::css(".shelf-item"), &times);

    let result = waiter
        .wait_until(&tab, &count_at_least(Selector::css(".shelf-item"), 25), &spec())
        .unwrap();
    assert_eq!(result.value(), Some(&25));
    assert_eq!(clock.elapsed(), ms(2500));
}

#[test]
fn test_cart_count_survives_rerender() {
    let (waiter, _, tab) = setup();
    tab.show(Selector::css(".bag__quantity"), ElementState::shown("1"))
        .stale_reads(Selector::css(".bag__quantity"), 2);

    let result = waiter
        .wait_until(&tab, &text_contains(Selector::css(".bag__quantity"), "1"), &spec())
        .unwrap();
    assert!(result.is_satisfied());
    assert_eq!(result.report().attempts, 3);
}

#[test]
fn test_endless_rerender_surfaces_cause() {
    let (waiter, _, tab) = setup();
    tab.show(Selector::css(".bag__quantity"), ElementState::shown("1"))
        .stale_reads(Selector::css(".bag__quantity"), 100);

    let err = waiter
        .wait_until(&tab, &visible(Selector::css(".bag__quantity")), &spec())
        .unwrap()
        .into_result()
        .unwrap_err();
    match err {
        Unmet::TimedOut(ref t) => assert_eq!(t.reason, TimeoutReason::RetriesExhausted),
        Unmet::Cancelled(_) => panic!("not cancelled"),
    }
    assert!(err.to_string().contains("Stale element: css=.bag__quantity"));
}

#[test]
fn test_empty_cart_or_items() {
    let (waiter, _, tab) = setup();
    tab.show_at(Selector::css(".shelf-empty"), ElementState::shown("Add some products"), ms(400));

    let states = [
        visible(Selector::css(".float-cart__shelf-container .shelf-item")),
        visible(Selector::css(".shelf-empty")),
    ];
    let (index, state) = waiter
        .wait_for_any(&tab, &states, &spec())
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(index, 1);
    assert_eq!(state.text, "Add some products");
}

#[test]
fn test_spinner_disappears() {
    let (waiter, clock, tab) = setup();
    tab.show(Selector::css(".spinner"), ElementState::shown(""))
        .remove_at(&Selector::css(".spinner"), ms(1200));

    let result = waiter
        .wait_until(&tab, &disappeared(Selector::css(".spinner")), &spec())
        .unwrap();
    assert!(result.is_satisfied());
    assert_eq!(clock.elapsed(), ms(1200));
}

#[test]
fn test_location_prompt_is_optional() {
    let (waiter, _, tab) = setup();
    tab.navigate("/offers");
    let allow = Locator::named("allow location", Selector::css(".permission-allow"))
        .or(Selector::css_with_text("button", "Allow"));
    let short = WaitSpec::fast();

    let skipped = click_if_shown(&waiter, &tab, &allow, &short).unwrap();
    assert_eq!(skipped.into_value(), Some(None));

    tab.show(Selector::css_with_text("button", "Allow"), ElementState::shown("Allow"));
    let clicked = click_if_shown(&waiter, &tab, &allow, &short)
        .unwrap()
        .into_value()
        .flatten()
        .unwrap();
    assert_eq!(clicked.index, 1);
    assert_eq!(tab.actions(), vec!["click css=button >> text=Allow"]);
}

#[test]
fn test_checkout_with_empty_cart_is_a_value() {
    let (waiter, _, tab) = setup();
    tab.show(Selector::css(".buy-btn"), ElementState::shown("Checkout").disabled());

    let result = click(&waiter, &tab, &Locator::new(Selector::css(".buy-btn")), &spec()).unwrap();
    let timed_out = result.timed_out().unwrap();
    assert_eq!(timed_out.reason, TimeoutReason::Deadline);
    assert!(timed_out.last_error.is_none());
    assert!(tab.actions().is_empty());
}

#[test]
fn test_teardown_cancels_wait() {
    let (_, _, tab) = setup();
    let token = CancellationToken::new();
    let waiter = ConditionWaiter::new()
        .with_clock(Arc::new(FakeClock::new()))
        .with_cancellation(token.clone());
    let calls = std::cell::Cell::new(0);

    let result = waiter
        .wait_for_function(
            &tab,
            |_| {
                calls.set(calls.get() + 1);
                if calls.get() == 3 {
                    token.cancel();
                }
                false
            },
            &spec(),
        )
        .unwrap();
    assert!(result.is_cancelled());
    assert_eq!(result.report().attempts, 3);
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_console_errors_filtered() {
    let (_, _, tab) = setup();
    tab.log_console("GET https://testathon.live/failed-request 500 error");
    tab.log_console("error loading https://www.google-analytics.com/collect");
    tab.log_console("GET /favicon.ico 404 (error)");
    tab.log_console("Uncaught TypeError: Cannot read properties of undefined (reading 'price')");

    let ignored = IgnoredUrls::default();
    let critical: Vec<String> = tab
        .console()
        .into_iter()
        .filter(|m| ignored.is_critical(m))
        .collect();
    assert_eq!(critical.len(), 1);
    assert!(critical[0].contains("TypeError"));
}

#[test]
fn test_spec_from_config() {
    let (waiter, clock, tab) = setup();
    let spec: WaitSpec =
        serde_json::from_str(r#"{"timeout":{"secs":1,"nanos":0},"poll_interval":{"secs":0,"nanos":250000000}}"#)
            .unwrap();
    tab.navigate("/orders");

    let result = waiter
        .wait_until(&tab, &url_contains("/favourites"), &spec)
        .unwrap();
    assert!(result.is_timed_out());
    assert_eq!(result.report().attempts, 5);
    assert_eq!(clock.elapsed(), Duration::from_secs(1));
}
