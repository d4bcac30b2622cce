use super::document::Document;
use super::{ComputedStyle, ElementId, Page, PageEvent, PageResult};
use crate::error::PageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// One dispatched event, kept for inspection in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: PageEvent,
    pub target: Option<ElementId>,
}

/// In-process page: a document per route, session history, focus and a
/// viewport.
///
/// Clicking `<a href="/path">` navigates like a client-side router link, and
/// clicking an element with `data-toggle="<selector>"` flips the `hidden`
/// attribute of every match, which is enough to drive menus and dialogs.
#[derive(Debug, Clone)]
pub struct MemoryPage {
    routes: BTreeMap<String, String>,
    fallback: String,
    document: Document,
    history: Vec<String>,
    position: usize,
    viewport: Viewport,
    focused: Option<ElementId>,
    scrolled_to: Option<ElementId>,
    events: Vec<EventRecord>,
    revision: u64,
    reloads: usize,
    closed: bool,
}

impl MemoryPage {
    /// A page showing `markup` at `/`, used for every route without its own
    /// markup.
    pub fn from_markup(markup: &str) -> PageResult<Self> {
        let document = Document::parse(markup)?;
        Ok(Self {
            routes: BTreeMap::new(),
            fallback: markup.to_string(),
            document,
            history: vec!["/".to_string()],
            position: 0,
            viewport: Viewport::default(),
            focused: None,
            scrolled_to: None,
            events: Vec::new(),
            revision: 0,
            reloads: 0,
            closed: false,
        })
    }

    /// Register markup for `path`. Validated eagerly so a bad route fails at
    /// setup rather than mid-run.
    pub fn with_route(mut self, path: &str, markup: &str) -> PageResult<Self> {
        Document::parse(markup)?;
        self.routes.insert(path.to_string(), markup.to_string());
        if self.current_path() == path {
            self.load_current()?;
        }
        Ok(self)
    }

    /// Start at `url` instead of `/`.
    pub fn start_at(mut self, url: &str) -> PageResult<Self> {
        self.history = vec![url.to_string()];
        self.position = 0;
        self.load_current()?;
        Ok(self)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn scrolled_to(&self) -> Option<ElementId> {
        self.scrolled_to
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Simulate the page going away. Every later call fails with
    /// [`PageError::Closed`].
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn ensure_open(&self) -> PageResult<()> {
        if self.closed {
            Err(PageError::Closed)
        } else {
            Ok(())
        }
    }

    fn ensure_element(&self, element: ElementId) -> PageResult<()> {
        self.ensure_open()?;
        if self.document.contains(element) {
            Ok(())
        } else {
            Err(PageError::StaleElement(element.0))
        }
    }

    fn current_url(&self) -> &str {
        self.history
            .get(self.position)
            .map(String::as_str)
            .unwrap_or("/")
    }

    fn current_path(&self) -> &str {
        path_of(self.current_url())
    }

    fn load_current(&mut self) -> PageResult<()> {
        let markup = self
            .routes
            .get(self.current_path())
            .unwrap_or(&self.fallback);
        self.document = Document::parse(markup)?;
        self.focused = None;
        self.scrolled_to = None;
        self.bump();
        Ok(())
    }

    fn record(&mut self, event: PageEvent, target: Option<ElementId>) {
        trace!(event = %event, target = ?target, "dispatch");
        self.events.push(EventRecord { event, target });
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    fn navigate_to(&mut self, url: &str) -> PageResult<()> {
        self.history.truncate(self.position + 1);
        self.history.push(url.to_string());
        self.position = self.history.len() - 1;
        self.load_current()?;
        self.record(PageEvent::PopState, None);
        Ok(())
    }

    /// Default actions a browser (or the app's router) performs after a click.
    fn activate(&mut self, element: ElementId) -> PageResult<()> {
        if let Some(targets) = self.document.attr(element, "data-toggle").map(str::to_string) {
            for target in self.document.select(&targets)? {
                self.document.toggle_attr(target, "hidden")?;
            }
            self.bump();
        }

        if self.document.tag_name(element) == Some("a") {
            if let Some(href) = self.document.attr(element, "href").map(str::to_string) {
                if href.starts_with('/') {
                    self.navigate_to(&href)?;
                }
            }
        }
        Ok(())
    }
}

fn path_of(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

#[async_trait]
impl Page for MemoryPage {
    async fn query_all(&self, selector: &str) -> PageResult<Vec<ElementId>> {
        self.ensure_open()?;
        self.document.select(selector)
    }

    async fn computed_style(&self, element: ElementId) -> PageResult<ComputedStyle> {
        self.ensure_element(element)?;
        self.document.computed_style(element)
    }

    async fn value(&self, element: ElementId) -> PageResult<Option<String>> {
        self.ensure_element(element)?;
        Ok(self.document.value(element))
    }

    async fn set_value(&mut self, element: ElementId, value: &str) -> PageResult<()> {
        self.ensure_element(element)?;
        self.document.set_value(element, value)?;
        self.bump();
        Ok(())
    }

    async fn dispatch(&mut self, element: ElementId, event: PageEvent) -> PageResult<()> {
        self.ensure_element(element)?;
        self.record(event, Some(element));
        if event == PageEvent::Click && !self.document.has_attr(element, "disabled") {
            self.activate(element)?;
        }
        Ok(())
    }

    async fn focus(&mut self, element: ElementId) -> PageResult<()> {
        self.ensure_element(element)?;
        if !self.document.is_focusable(element) || self.focused == Some(element) {
            return Ok(());
        }
        if let Some(previous) = self.focused.take() {
            self.record(PageEvent::Blur, Some(previous));
        }
        self.focused = Some(element);
        self.record(PageEvent::Focus, Some(element));
        Ok(())
    }

    async fn blur(&mut self, element: ElementId) -> PageResult<()> {
        self.ensure_element(element)?;
        if self.focused == Some(element) {
            self.focused = None;
            self.record(PageEvent::Blur, Some(element));
        }
        Ok(())
    }

    async fn active_element(&self) -> PageResult<Option<ElementId>> {
        self.ensure_open()?;
        Ok(self.focused)
    }

    async fn scroll_into_view(&mut self, element: ElementId) -> PageResult<()> {
        self.ensure_element(element)?;
        self.scrolled_to = Some(element);
        self.bump();
        Ok(())
    }

    async fn push_state(&mut self, url: &str) -> PageResult<()> {
        self.ensure_open()?;
        self.navigate_to(url)
    }

    async fn location_path(&self) -> PageResult<String> {
        self.ensure_open()?;
        Ok(self.current_path().to_string())
    }

    async fn history_back(&mut self) -> PageResult<()> {
        self.ensure_open()?;
        if self.position > 0 {
            self.position -= 1;
            self.load_current()?;
            self.record(PageEvent::PopState, None);
        }
        Ok(())
    }

    async fn history_forward(&mut self) -> PageResult<()> {
        self.ensure_open()?;
        if self.position + 1 < self.history.len() {
            self.position += 1;
            self.load_current()?;
            self.record(PageEvent::PopState, None);
        }
        Ok(())
    }

    async fn reload(&mut self) -> PageResult<()> {
        self.ensure_open()?;
        self.load_current()?;
        self.reloads += 1;
        self.record(PageEvent::Load, None);
        Ok(())
    }

    async fn set_viewport(&mut self, width: u32, height: u32) -> PageResult<()> {
        self.ensure_open()?;
        self.viewport = Viewport { width, height };
        self.bump();
        self.record(PageEvent::Resize, None);
        Ok(())
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = r##"
<body>
  <header>
    <a id="about-link" href="/about">About</a>
    <button id="menu-toggle" data-toggle="#menu">Menu</button>
    <ul id="menu" hidden="hidden"><li>Theatre</li></ul>
  </header>
  <input id="search" type="search"/>
  <div id="plain">Not focusable</div>
</body>
"##;

    const ABOUT: &str = r#"<body><h1 class="about">About the club</h1></body>"#;

    fn page() -> MemoryPage {
        MemoryPage::from_markup(HOME)
            .and_then(|page| page.with_route("/about", ABOUT))
            .expect("page builds")
    }

    async fn first(page: &MemoryPage, selector: &str) -> ElementId {
        page.query(selector)
            .await
            .expect("query")
            .expect("element present")
    }

    #[tokio::test]
    async fn link_click_swaps_route_and_history() {
        let mut page = page();
        let link = first(&page, "#about-link").await;
        page.dispatch(link, PageEvent::Click).await.expect("click");

        assert_eq!(page.location_path().await.unwrap(), "/about");
        assert_eq!(page.query_all(".about").await.unwrap().len(), 1);

        page.history_back().await.unwrap();
        assert_eq!(page.location_path().await.unwrap(), "/");
        assert!(page.query(".about").await.unwrap().is_none());

        page.history_forward().await.unwrap();
        assert_eq!(page.location_path().await.unwrap(), "/about");
    }

    #[tokio::test]
    async fn toggle_flips_hidden_attribute() {
        let mut page = page();
        let menu = first(&page, "#menu").await;
        assert!(!page.computed_style(menu).await.unwrap().is_visible());

        let toggle = first(&page, "#menu-toggle").await;
        page.dispatch(toggle, PageEvent::Click).await.unwrap();
        assert!(page.computed_style(menu).await.unwrap().is_visible());
    }

    #[tokio::test]
    async fn focus_ignores_non_focusable_elements() {
        let mut page = page();
        let plain = first(&page, "#plain").await;
        page.focus(plain).await.unwrap();
        assert_eq!(page.active_element().await.unwrap(), None);

        let search = first(&page, "#search").await;
        page.focus(search).await.unwrap();
        assert_eq!(page.active_element().await.unwrap(), Some(search));
        page.blur(search).await.unwrap();
        assert_eq!(page.active_element().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_routes_keep_fallback_markup() {
        let mut page = page();
        page.push_state("/gallery?page=2").await.unwrap();
        assert_eq!(page.location_path().await.unwrap(), "/gallery");
        assert!(page.query("#about-link").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn closed_page_rejects_calls() {
        let mut page = page();
        page.close();
        assert_eq!(page.query("body").await, Err(PageError::Closed));
        assert_eq!(page.reload().await, Err(PageError::Closed));
    }
}
