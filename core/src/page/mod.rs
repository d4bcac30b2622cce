//! The document under test.
//!
//! [`Page`] is the seam between the harness and whatever renders the site. The
//! harness only ever talks to the page through this trait, one awaited call at
//! a time. [`MemoryPage`] is the in-process implementation used by the CLI and
//! the test suite: an element tree loaded from XHTML markup with a small
//! selector engine, computed style, focus tracking, session history and a
//! viewport.

mod document;
mod markup;
mod memory;
pub(crate) mod selector;

pub use document::Document;
pub use memory::{EventRecord, MemoryPage, Viewport};

use crate::error::PageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type PageResult<T> = Result<T, PageError>;

/// Opaque handle to an element in the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub usize);

/// Synthetic events the harness dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageEvent {
    Click,
    Input,
    Change,
    Focus,
    Blur,
    MouseEnter,
    Resize,
    PopState,
    Load,
}

impl PageEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageEvent::Click => "click",
            PageEvent::Input => "input",
            PageEvent::Change => "change",
            PageEvent::Focus => "focus",
            PageEvent::Blur => "blur",
            PageEvent::MouseEnter => "mouseenter",
            PageEvent::Resize => "resize",
            PageEvent::PopState => "popstate",
            PageEvent::Load => "load",
        }
    }
}

impl fmt::Display for PageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of computed style the visibility checks read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f32,
}

impl ComputedStyle {
    pub fn is_visible(&self) -> bool {
        self.display != "none" && self.visibility != "hidden" && self.opacity != 0.0
    }
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
        }
    }
}

#[async_trait]
pub trait Page: Send + Sync {
    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> PageResult<Vec<ElementId>>;

    async fn query(&self, selector: &str) -> PageResult<Option<ElementId>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn computed_style(&self, element: ElementId) -> PageResult<ComputedStyle>;

    /// The element's form value, `None` for elements without one.
    async fn value(&self, element: ElementId) -> PageResult<Option<String>>;

    async fn set_value(&mut self, element: ElementId, value: &str) -> PageResult<()>;

    async fn dispatch(&mut self, element: ElementId, event: PageEvent) -> PageResult<()>;

    async fn focus(&mut self, element: ElementId) -> PageResult<()>;

    async fn blur(&mut self, element: ElementId) -> PageResult<()>;

    async fn active_element(&self) -> PageResult<Option<ElementId>>;

    async fn scroll_into_view(&mut self, element: ElementId) -> PageResult<()>;

    /// Push a history entry and notify the app of the location change.
    async fn push_state(&mut self, url: &str) -> PageResult<()>;

    async fn location_path(&self) -> PageResult<String>;

    async fn history_back(&mut self) -> PageResult<()>;

    async fn history_forward(&mut self) -> PageResult<()>;

    async fn reload(&mut self) -> PageResult<()>;

    async fn set_viewport(&mut self, width: u32, height: u32) -> PageResult<()>;

    /// Monotonic counter bumped on every DOM or location mutation.
    fn revision(&self) -> u64;
}
