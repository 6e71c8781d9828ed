//! Browser automation capability consumed by the crawler.
//!
//! The crawl logic only talks to a [`PageDriver`]. Two implementations ship
//! with the crate:
//!
//! - [`ChromeDriver`] drives a headless Chromium page (feature `chrome`)
//! - [`HtmlSnapshot`] answers read-only queries against a saved document

#[cfg(feature = "chrome")]
mod chrome;
mod snapshot;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::{Instant, sleep};

use crate::error::Result;

#[cfg(feature = "chrome")]
pub use chrome::ChromeDriver;
pub use snapshot::HtmlSnapshot;

/// Interval between visibility probes in [`PageDriver::wait_for`].
const WAIT_POLL: Duration = Duration::from_millis(100);

/// How an element is found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocatorKind {
    /// CSS selector
    Css { value: String },

    /// XPath expression
    #[serde(rename = "xpath")]
    XPath { value: String },

    /// Form control associated with a `<label>` (or `title`/`aria-label`)
    Label { value: String },

    /// Element whose visible text matches
    Text { value: String, exact: bool },

    /// Value cell(s) of a table row whose header cell contains `label`,
    /// optionally narrowed to descendants matching `descend`
    Cell {
        label: String,
        descend: Option<String>,
    },
}

/// A query for zero or more elements, optionally narrowed to one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locator {
    #[serde(flatten)]
    pub kind: LocatorKind,
    pub nth: Option<usize>,
}

impl Locator {
    pub fn css(value: impl Into<String>) -> Self {
        Self::from_kind(LocatorKind::Css {
            value: value.into(),
        })
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::from_kind(LocatorKind::XPath {
            value: value.into(),
        })
    }

    pub fn label(value: impl Into<String>) -> Self {
        Self::from_kind(LocatorKind::Label {
            value: value.into(),
        })
    }

    pub fn text(value: impl Into<String>, exact: bool) -> Self {
        Self::from_kind(LocatorKind::Text {
            value: value.into(),
            exact,
        })
    }

    /// Value cell next to the header cell containing `label`.
    pub fn cell(label: impl Into<String>) -> Self {
        Self::from_kind(LocatorKind::Cell {
            label: label.into(),
            descend: None,
        })
    }

    /// Descendants of the value cell next to the header containing `label`.
    pub fn cell_descendants(label: impl Into<String>, descend: impl Into<String>) -> Self {
        Self::from_kind(LocatorKind::Cell {
            label: label.into(),
            descend: Some(descend.into()),
        })
    }

    /// Narrow to the `index`-th match (0-based).
    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }

    fn from_kind(kind: LocatorKind) -> Self {
        Self { kind, nth: None }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LocatorKind::Css { value } => write!(f, "css={value}")?,
            LocatorKind::XPath { value } => write!(f, "xpath={value}")?,
            LocatorKind::Label { value } => write!(f, "label={value}")?,
            LocatorKind::Text { value, exact } => {
                write!(f, "text{}={value}", if *exact { "(exact)" } else { "" })?
            }
            LocatorKind::Cell { label, descend } => match descend {
                Some(d) => write!(f, "cell={label} >> {d}")?,
                None => write!(f, "cell={label}")?,
            },
        }
        if let Some(n) = self.nth {
            write!(f, " >> nth={n}")?;
        }
        Ok(())
    }
}

/// Element state awaited by [`PageDriver::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Visible,
    Hidden,
}

/// How a click is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickOptions {
    /// Skip actionability checks (overlays, animations)
    pub force: bool,

    /// Call the element's own `click()` instead of simulating the pointer
    pub dom: bool,
}

impl ClickOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            dom: false,
        }
    }

    pub fn dom() -> Self {
        Self {
            force: false,
            dom: true,
        }
    }
}

/// Browser page automation.
///
/// Every method operates on the single page owned by the driver. Calls that
/// target a locator with no match return an error, except [`count`],
/// [`is_visible`] and [`texts`], which report absence as `0`, `false` and an
/// empty list.
///
/// [`count`]: PageDriver::count
/// [`is_visible`]: PageDriver::is_visible
/// [`texts`]: PageDriver::texts
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait until the page stops loading, at most `timeout`.
    async fn wait_for_idle(&self, timeout: Duration) -> Result<()>;

    async fn count(&self, locator: &Locator) -> Result<usize>;

    async fn is_visible(&self, locator: &Locator) -> Result<bool>;

    /// Rendered text of the first match.
    async fn text(&self, locator: &Locator) -> Result<String>;

    /// Rendered text of every match, in document order.
    async fn texts(&self, locator: &Locator) -> Result<Vec<String>>;

    async fn click(&self, locator: &Locator, options: ClickOptions) -> Result<()>;

    async fn hover(&self, locator: &Locator) -> Result<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> Result<()>;

    /// Select the option whose visible label equals `label`.
    async fn select_option(&self, locator: &Locator, label: &str) -> Result<()>;

    /// Send a named key (e.g. `"Tab"`) to the element.
    async fn press(&self, locator: &Locator, key: &str) -> Result<()>;

    /// Drop `readonly`/`disabled` so the element accepts typed input.
    async fn unlock(&self, locator: &Locator) -> Result<()>;

    async fn go_back(&self) -> Result<()>;

    /// Poll until the first match reaches `state`. Returns `false` on timeout.
    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let visible = self.is_visible(locator).await?;
            let reached = match state {
                WaitState::Visible => visible,
                WaitState::Hidden => !visible,
            };
            if reached {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            sleep(WAIT_POLL.min(deadline - now)).await;
        }
    }
}
