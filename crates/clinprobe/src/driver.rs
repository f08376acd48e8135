//! Page driver seam.
//!
//! Everything above this module talks to the browser through the
//! [`PageDriver`] trait, so the workflow runs the same against a real
//! Chromium session ([`crate::CdpDriver`], `browser` feature) and against the
//! scripted [`MockPage`] used in tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::locator::LocatorSpec;
use crate::result::{ProbeError, ProbeResult};

/// Snapshot of a matched element, taken when the page was queried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned reference, stable for the lifetime of the DOM node
    pub id: String,
    /// Lower-case tag name
    pub tag_name: String,
    /// Visible text, trimmed
    pub text: String,
    /// Rendered with a non-empty box
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
}

impl ElementHandle {
    /// Create a visible, enabled handle with no text
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            text: String::new(),
            visible: true,
            enabled: true,
        }
    }

    /// Set the visible text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set visibility
    #[must_use]
    pub const fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set enabled state
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Visible and enabled
    #[must_use]
    pub const fn is_interactable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Browser page operations the workflow depends on
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to URL
    async fn navigate(&self, url: &str) -> ProbeResult<()>;

    /// Address of the current document
    async fn current_url(&self) -> ProbeResult<String>;

    /// All elements matching the locator, in document order
    async fn query_all(&self, locator: &LocatorSpec) -> ProbeResult<Vec<ElementHandle>>;

    /// Matches of `locator` inside `parent`
    async fn query_within(
        &self,
        parent: &ElementHandle,
        locator: &LocatorSpec,
    ) -> ProbeResult<Vec<ElementHandle>>;

    /// Click element
    async fn click(&self, element: &ElementHandle) -> ProbeResult<()>;

    /// Empty a form field
    async fn clear(&self, element: &ElementHandle) -> ProbeResult<()>;

    /// Type text into element
    async fn type_text(&self, element: &ElementHandle, text: &str) -> ProbeResult<()>;

    /// Read an attribute of an element
    async fn attribute(&self, element: &ElementHandle, name: &str) -> ProbeResult<Option<String>>;

    /// Set the files of an `<input type="file">`
    async fn set_input_files(&self, element: &ElementHandle, files: &[PathBuf]) -> ProbeResult<()>;

    /// Whether any element's own text contains `fragment` (case-sensitive)
    async fn text_present(&self, fragment: &str) -> ProbeResult<bool>;

    /// Close the browser session
    async fn close(&self) -> ProbeResult<()>;
}

// =============================================================================
// MOCK PAGE
// =============================================================================

/// Side effect applied when a mock element is clicked
#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// Set an attribute on an element
    SetAttribute {
        /// Target element id
        element: String,
        /// Attribute name
        name: String,
        /// New value
        value: String,
    },
    /// Stop rendering every text containing the fragment
    HideText(String),
    /// Change the current URL
    Navigate(String),
    /// Add a matching element
    Reveal(LocatorSpec, ElementHandle),
}

#[derive(Debug)]
struct MockElement {
    handle: ElementHandle,
    hidden_for_queries: u32,
}

#[derive(Debug)]
struct RenderedText {
    content: String,
    until: Option<Instant>,
}

#[derive(Debug, Default)]
struct MockState {
    current_url: String,
    elements: Vec<(LocatorSpec, MockElement)>,
    children: HashMap<(String, LocatorSpec), Vec<ElementHandle>>,
    attributes: HashMap<(String, String), String>,
    texts: Vec<RenderedText>,
    text_query_error: Option<String>,
    effects: HashMap<String, Vec<ClickEffect>>,
    values: HashMap<String, String>,
    files: HashMap<String, Vec<PathBuf>>,
    history: Vec<String>,
    closed: bool,
}

/// Scripted in-memory page for unit testing
#[derive(Debug, Default)]
pub struct MockPage {
    state: Mutex<MockState>,
}

impl MockPage {
    /// Create an empty page at `about:blank`
    #[must_use]
    pub fn new() -> Self {
        let page = Self::default();
        page.lock().current_url = "about:blank".to_string();
        page
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Set the current URL
    pub fn set_url(&self, url: impl Into<String>) {
        self.lock().current_url = url.into();
    }

    /// Register an element matched by `locator`
    pub fn add_element(&self, locator: LocatorSpec, handle: ElementHandle) {
        self.add_element_after(locator, handle, 0);
    }

    /// Register an element that only matches after `queries` lookups of `locator`
    pub fn add_element_after(&self, locator: LocatorSpec, handle: ElementHandle, queries: u32) {
        self.lock().elements.push((
            locator,
            MockElement {
                handle,
                hidden_for_queries: queries,
            },
        ));
    }

    /// Register a child of `parent` matched by `locator`
    pub fn add_child(&self, parent: &str, locator: LocatorSpec, handle: ElementHandle) {
        self.lock()
            .children
            .entry((parent.to_string(), locator))
            .or_default()
            .push(handle);
    }

    /// Set an attribute value
    pub fn set_attribute(&self, element: &str, name: &str, value: impl Into<String>) {
        self.lock()
            .attributes
            .insert((element.to_string(), name.to_string()), value.into());
    }

    /// Render text until removed
    pub fn show_text(&self, content: impl Into<String>) {
        self.lock().texts.push(RenderedText {
            content: content.into(),
            until: None,
        });
    }

    /// Render text for `duration` from now
    pub fn show_text_for(&self, content: impl Into<String>, duration: Duration) {
        self.lock().texts.push(RenderedText {
            content: content.into(),
            until: Some(Instant::now() + duration),
        });
    }

    /// Make every text-presence query fail with `message`
    pub fn fail_text_queries(&self, message: impl Into<String>) {
        self.lock().text_query_error = Some(message.into());
    }

    /// Apply `effect` whenever `element` is clicked
    pub fn on_click(&self, element: &str, effect: ClickEffect) {
        self.lock()
            .effects
            .entry(element.to_string())
            .or_default()
            .push(effect);
    }

    /// Value typed into a field
    #[must_use]
    pub fn value_of(&self, element: &str) -> Option<String> {
        self.lock().values.get(element).cloned()
    }

    /// Files set on a file input
    #[must_use]
    pub fn files_of(&self, element: &str) -> Vec<PathBuf> {
        self.lock().files.get(element).cloned().unwrap_or_default()
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn apply(state: &mut MockState, effect: ClickEffect) {
        match effect {
            ClickEffect::SetAttribute {
                element,
                name,
                value,
            } => {
                state.attributes.insert((element, name), value);
            }
            ClickEffect::HideText(fragment) => {
                state.texts.retain(|t| !t.content.contains(&fragment));
            }
            ClickEffect::Navigate(url) => state.current_url = url,
            ClickEffect::Reveal(locator, handle) => state.elements.push((
                locator,
                MockElement {
                    handle,
                    hidden_for_queries: 0,
                },
            )),
        }
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push(format!("navigate:{url}"));
        state.current_url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self.lock().current_url.clone())
    }

    async fn query_all(&self, locator: &LocatorSpec) -> ProbeResult<Vec<ElementHandle>> {
        let mut state = self.lock();
        let mut found = Vec::new();
        for (spec, element) in &mut state.elements {
            if spec != locator {
                continue;
            }
            if element.hidden_for_queries > 0 {
                element.hidden_for_queries -= 1;
            } else {
                found.push(element.handle.clone());
            }
        }
        Ok(found)
    }

    async fn query_within(
        &self,
        parent: &ElementHandle,
        locator: &LocatorSpec,
    ) -> ProbeResult<Vec<ElementHandle>> {
        Ok(self
            .lock()
            .children
            .get(&(parent.id.clone(), locator.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn click(&self, element: &ElementHandle) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push(format!("click:{}", element.id));
        let effects = state.effects.get(&element.id).cloned().unwrap_or_default();
        for effect in effects {
            Self::apply(&mut state, effect);
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push(format!("clear:{}", element.id));
        state.values.insert(element.id.clone(), String::new());
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push(format!("type:{}", element.id));
        state
            .values
            .entry(element.id.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> ProbeResult<Option<String>> {
        Ok(self
            .lock()
            .attributes
            .get(&(element.id.clone(), name.to_string()))
            .cloned())
    }

    async fn set_input_files(&self, element: &ElementHandle, files: &[PathBuf]) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push(format!("files:{}", element.id));
        state.files.insert(element.id.clone(), files.to_vec());
        Ok(())
    }

    async fn text_present(&self, fragment: &str) -> ProbeResult<bool> {
        let state = self.lock();
        if let Some(ref message) = state.text_query_error {
            return Err(ProbeError::driver(message.clone()));
        }
        let now = Instant::now();
        Ok(state
            .texts
            .iter()
            .filter(|t| t.until.map_or(true, |until| now < until))
            .any(|t| t.content.contains(fragment)))
    }

    async fn close(&self) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}
