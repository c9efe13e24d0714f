//! Selectors and multi-selector locators.
//!
//! Storefront markup changes between releases, so a [`Locator`] carries a
//! primary selector plus ordered fallbacks. Waiting on a locator races all of
//! them and reports which one matched.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// XPath selector
    XPath(String),
    /// Element id attribute
    Id(String),
    /// Text content selector
    Text(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// Combined selector with text filter
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Create an id selector
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Narrow a CSS selector to elements containing `text`
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// JavaScript expression evaluating to the first matching element, or
    /// `null`/`undefined` when nothing matches.
    ///
    /// Text selectors match the innermost element whose trimmed text contains
    /// the needle, so a wrapper `div` never wins over the button inside it.
    #[must_use]
    pub fn element_script(&self) -> String {
        match self {
            Self::Css(css) => format!("document.querySelector({css:?})"),
            Self::XPath(expr) => format!(
                "document.evaluate({expr:?}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
            ),
            Self::Id(id) => format!("document.getElementById({id:?})"),
            Self::Text(text) => format!(
                "[...document.body.querySelectorAll('*')].find(el => el.childElementCount === 0 && el.textContent.trim().includes({text:?}))"
            ),
            Self::TestId(id) => {
                let css = format!("[data-testid=\"{id}\"]");
                format!("document.querySelector({css:?})")
            }
            Self::CssWithText { css, text } => format!(
                "[...document.querySelectorAll({css:?})].find(el => el.textContent.trim().includes({text:?}))"
            ),
        }
    }

    /// Script that clicks the matching element through the DOM.
    ///
    /// Throws when nothing matches, so the driver reports a script error.
    #[must_use]
    pub fn click_script(&self) -> String {
        let missing = format!("no element matches {self}");
        format!(
            "{{ const el = {}; if (!el) {{ throw new Error({missing:?}); }} el.click(); }}",
            self.element_script()
        )
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::Id(s) => write!(f, "id={s}"),
            Self::Text(s) => write!(f, "text={s}"),
            Self::TestId(s) => write!(f, "data-testid={s}"),
            Self::CssWithText { css, text } => write!(f, "css={css} >> text={text}"),
        }
    }
}

/// A named element with a primary selector and ordered fallbacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Name used in logs
    pub name: String,
    /// Preferred selector
    pub primary: Selector,
    /// Alternatives tried after the primary, in order
    #[serde(default)]
    pub fallbacks: Vec<Selector>,
}

impl Locator {
    /// Create a locator with a single selector, named after it
    #[must_use]
    pub fn new(primary: Selector) -> Self {
        Self {
            name: primary.to_string(),
            primary,
            fallbacks: Vec::new(),
        }
    }

    /// Create a named locator
    #[must_use]
    pub fn named(name: impl Into<String>, primary: Selector) -> Self {
        Self {
            name: name.into(),
            primary,
            fallbacks: Vec::new(),
        }
    }

    /// Add a fallback selector
    #[must_use]
    pub fn or(mut self, fallback: Selector) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    /// All selectors, primary first
    pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }

    /// Number of selectors including the primary
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.fallbacks.len()
    }

    /// A locator always has at least its primary selector
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::new(selector)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
