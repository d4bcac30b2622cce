use crate::error::{ActionError, PageError};
use crate::page::{ElementId, Page, PageEvent};
use crate::scenario::{Step, SuiteKind};
use crate::settle::Settle;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// What an action returned. Only `Bool(false)` means the check failed; see
/// [`crate::PassRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionOutcome {
    Bool(bool),
    Count(usize),
    Done,
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Bool(value) => write!(f, "{value}"),
            ActionOutcome::Count(count) => write!(f, "{count}"),
            ActionOutcome::Done => f.write_str("done"),
        }
    }
}

/// Performs one step against the page.
pub struct ActionExecutor<'a, P: Page> {
    page: &'a mut P,
    settle: &'a dyn Settle,
    kind: SuiteKind,
}

impl<'a, P: Page> ActionExecutor<'a, P> {
    pub fn new(page: &'a mut P, settle: &'a dyn Settle, kind: SuiteKind) -> Self {
        Self { page, settle, kind }
    }

    /// Perform the step, then wait for the page if it mutated anything.
    pub async fn execute(&mut self, step: &Step) -> Result<ActionOutcome, ActionError> {
        let outcome = self.perform(step).await?;
        self.settle_after(step, outcome).await
    }

    /// The page operation alone, without waiting for the page afterwards.
    pub async fn perform(&mut self, step: &Step) -> Result<ActionOutcome, ActionError> {
        if !self.kind.allows(step) {
            return Err(ActionError::Unsupported {
                action: step.action_name(),
                kind: self.kind.to_string(),
            });
        }

        debug!(action = step.action_name(), selector = step.selector(), "execute");
        let outcome = match step {
            Step::Click { selector } => {
                let element = self.require(selector).await?;
                self.page.dispatch(element, PageEvent::Click).await?;
                ActionOutcome::Bool(true)
            }
            Step::Type { selector, value } => {
                let element = self.require(selector).await?;
                self.page.focus(element).await?;
                self.page.set_value(element, value).await?;
                self.page.dispatch(element, PageEvent::Input).await?;
                self.page.dispatch(element, PageEvent::Change).await?;
                ActionOutcome::Bool(true)
            }
            Step::Select { selector, value } => {
                let element = self.require(selector).await?;
                self.page.set_value(element, value).await?;
                self.page.dispatch(element, PageEvent::Change).await?;
                ActionOutcome::Bool(true)
            }
            Step::Clear { selector } => {
                let element = self.require(selector).await?;
                self.page.set_value(element, "").await?;
                self.page.dispatch(element, PageEvent::Input).await?;
                self.page.dispatch(element, PageEvent::Change).await?;
                ActionOutcome::Bool(true)
            }
            Step::Navigate { url } => {
                best_effort("navigate", self.page.push_state(url).await)?;
                self.at_location(url).await?
            }
            Step::Visible { selector } => ActionOutcome::Bool(self.is_visible(selector).await?),
            Step::Hidden { selector } => ActionOutcome::Bool(!self.is_visible(selector).await?),
            Step::Focus { selector } => {
                let element = self.require(selector).await?;
                self.page.focus(element).await?;
                let active = self.page.active_element().await?;
                ActionOutcome::Bool(active == Some(element))
            }
            Step::Blur { selector } => {
                let element = self.require(selector).await?;
                self.page.blur(element).await?;
                let active = self.page.active_element().await?;
                ActionOutcome::Bool(active != Some(element))
            }
            Step::Hover { selector } => {
                let element = self.require(selector).await?;
                self.page.dispatch(element, PageEvent::MouseEnter).await?;
                ActionOutcome::Done
            }
            Step::Scroll { selector } => {
                let element = self.require(selector).await?;
                self.page.scroll_into_view(element).await?;
                ActionOutcome::Done
            }
            Step::Resize { width, height } => {
                best_effort("resize", self.page.set_viewport(*width, *height).await)?;
                ActionOutcome::Done
            }
            Step::Back => {
                best_effort("back", self.page.history_back().await)?;
                ActionOutcome::Done
            }
            Step::Forward => {
                best_effort("forward", self.page.history_forward().await)?;
                ActionOutcome::Done
            }
            Step::Refresh => {
                best_effort("refresh", self.page.reload().await)?;
                ActionOutcome::Done
            }
            Step::Count { selector } => ActionOutcome::Count(self.matching(selector).await?.len()),
            Step::Check { selector, value } => {
                let element = self.require(selector).await?;
                let current = self.page.value(element).await?;
                ActionOutcome::Bool(current.as_deref() == Some(value.as_str()))
            }
        };
        Ok(outcome)
    }

    /// Wait for the page after a mutating step. Navigation is judged on the
    /// settled location.
    pub async fn settle_after(
        &mut self,
        step: &Step,
        outcome: ActionOutcome,
    ) -> Result<ActionOutcome, ActionError> {
        if !step.is_mutating() {
            return Ok(outcome);
        }
        self.settle().await;
        match step {
            Step::Navigate { url } => self.at_location(url).await,
            _ => Ok(outcome),
        }
    }

    async fn at_location(&self, url: &str) -> Result<ActionOutcome, ActionError> {
        let path = best_effort_value("navigate", self.page.location_path().await)?;
        Ok(ActionOutcome::Bool(path.as_deref() == Some(url)))
    }

    async fn settle(&self) {
        self.settle.settle(&*self.page).await;
    }

    async fn require(&self, selector: &str) -> Result<ElementId, ActionError> {
        self.page
            .query(selector)
            .await?
            .ok_or_else(|| ActionError::TargetNotFound(selector.to_string()))
    }

    /// Read-only lookups never fail on a bad selector; it just matches nothing.
    async fn matching(&self, selector: &str) -> Result<Vec<ElementId>, ActionError> {
        match self.page.query_all(selector).await {
            Ok(found) => Ok(found),
            Err(PageError::Selector(_)) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, ActionError> {
        let Some(element) = self.matching(selector).await?.into_iter().next() else {
            return Ok(false);
        };
        let style = self.page.computed_style(element).await?;
        Ok(style.is_visible())
    }
}

/// History and viewport operations never fail a step; only a closed page
/// gets through.
fn best_effort(action: &'static str, result: Result<(), PageError>) -> Result<(), ActionError> {
    best_effort_value(action, result).map(|_| ())
}

fn best_effort_value<T>(
    action: &'static str,
    result: Result<T, PageError>,
) -> Result<Option<T>, ActionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PageError::Closed) => Err(PageError::Closed.into()),
        Err(err) => {
            warn!(action, error = %err, "ignoring page error");
            Ok(None)
        }
    }
}
