//! Element locator: logical references resolved to live elements.
//!
//! A [`LocatorSpec`] names *how* to find an element (id, XPath, class name,
//! CSS selector or link text) and *what* to look for. Resolution polls the
//! page through a [`PageDriver`] until a match is ready or the
//! [`WaitPolicy`] runs out.

use std::fmt;
use std::str::FromStr;

use tokio::time::{sleep, Instant};

use crate::driver::{ElementHandle, PageDriver};
use crate::result::{ProbeError, ProbeResult};
use crate::wait::WaitPolicy;

/// Strategy used to find an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorKind {
    /// Element id attribute
    Id,
    /// XPath expression
    XPath,
    /// Single CSS class name
    ClassName,
    /// CSS selector
    CssSelector,
    /// Exact visible text of a link
    LinkText,
}

impl LocatorKind {
    /// Every supported kind
    pub const ALL: [Self; 5] = [
        Self::Id,
        Self::XPath,
        Self::ClassName,
        Self::CssSelector,
        Self::LinkText,
    ];

    /// Name used in configuration and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::XPath => "xpath",
            Self::ClassName => "class_name",
            Self::CssSelector => "css_selector",
            Self::LinkText => "link_text",
        }
    }
}

impl FromStr for LocatorKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProbeError::UnsupportedLocatorKind {
                kind: s.to_string(),
            })
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical reference to one or more elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocatorSpec {
    kind: LocatorKind,
    value: String,
}

impl LocatorSpec {
    /// Create a locator from a kind and a value
    #[must_use]
    pub fn new(kind: LocatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Parse the kind from its string name
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedLocatorKind` for names outside the supported set
    pub fn parse(kind: &str, value: impl Into<String>) -> ProbeResult<Self> {
        Ok(Self::new(kind.parse()?, value))
    }

    /// Locate by id
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Id, value)
    }

    /// Locate by XPath
    #[must_use]
    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::XPath, value)
    }

    /// Locate by class name
    #[must_use]
    pub fn class_name(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::ClassName, value)
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::CssSelector, value)
    }

    /// Locate a link by its text
    #[must_use]
    pub fn link_text(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::LinkText, value)
    }

    /// Locator strategy
    #[must_use]
    pub const fn kind(&self) -> LocatorKind {
        self.kind
    }

    /// Locator value
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

/// What a match must satisfy before resolution succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    /// Element exists in the document
    Present,
    /// Element is visible and enabled
    #[default]
    Interactable,
}

impl Readiness {
    fn accepts(self, element: &ElementHandle) -> bool {
        match self {
            Self::Present => true,
            Self::Interactable => element.is_interactable(),
        }
    }
}

/// Poll until at least one element matching `spec` satisfies `readiness`.
///
/// Returns every ready match in document order. Query faults during a tick
/// count as "no match yet".
///
/// # Errors
///
/// `LocatorNotFound` if nothing matched during the whole wait,
/// `LocatorTimeout` if matches existed but never became ready.
pub async fn locate_all(
    driver: &dyn PageDriver,
    spec: &LocatorSpec,
    policy: &WaitPolicy,
    readiness: Readiness,
) -> ProbeResult<Vec<ElementHandle>> {
    resolve(policy, spec, readiness, || driver.query_all(spec)).await
}

/// Like [`locate_all`] but returns only the first match
///
/// # Errors
///
/// Same as [`locate_all`]
pub async fn locate(
    driver: &dyn PageDriver,
    spec: &LocatorSpec,
    policy: &WaitPolicy,
    readiness: Readiness,
) -> ProbeResult<ElementHandle> {
    let mut matches = locate_all(driver, spec, policy, readiness).await?;
    Ok(matches.swap_remove(0))
}

/// Resolve `spec` relative to `parent` instead of the whole document
///
/// # Errors
///
/// Same as [`locate_all`]
pub async fn locate_within(
    driver: &dyn PageDriver,
    parent: &ElementHandle,
    spec: &LocatorSpec,
    policy: &WaitPolicy,
) -> ProbeResult<Vec<ElementHandle>> {
    resolve(policy, spec, Readiness::Present, || {
        driver.query_within(parent, spec)
    })
    .await
}

async fn resolve<F, Fut>(
    policy: &WaitPolicy,
    spec: &LocatorSpec,
    readiness: Readiness,
    mut query: F,
) -> ProbeResult<Vec<ElementHandle>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ProbeResult<Vec<ElementHandle>>>,
{
    let start = Instant::now();
    let mut seen = false;

    loop {
        match query().await {
            Ok(matches) => {
                seen |= !matches.is_empty();
                let ready: Vec<ElementHandle> = matches
                    .into_iter()
                    .filter(|e| readiness.accepts(e))
                    .collect();
                if !ready.is_empty() {
                    return Ok(ready);
                }
            }
            Err(err) => tracing::debug!(locator = %spec, error = %err, "query failed"),
        }

        if start.elapsed() >= policy.timeout() {
            break;
        }
        sleep(policy.poll_interval()).await;
    }

    let waited = start.elapsed();
    let locator = spec.to_string();
    if seen {
        Err(ProbeError::LocatorTimeout { locator, waited })
    } else {
        Err(ProbeError::LocatorNotFound { locator, waited })
    }
}
