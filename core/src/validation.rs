use crate::page::selector::Selector;
use crate::scenario::{Scenario, Step, Suite, SuiteKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub location: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn error(location: Option<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            location,
            message: message.into(),
        }
    }

    fn warning(location: Option<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            location,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.level, DiagnosticLevel::Error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        };
        match &self.location {
            Some(location) => write!(f, "{level}: {location}: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

/// Check a suite before running it. Errors mark steps that can never pass;
/// warnings mark suites that probably do not test what was intended.
pub fn validate_suite(suite: &Suite) -> Vec<Diagnostic> {
    let mut ctx = ValidationContext::new();
    if suite.categories.is_empty() {
        ctx.warning("suite has no categories");
    }
    for category in &suite.categories {
        ctx.push(category.name.clone());
        if category.scenarios.is_empty() {
            ctx.warning("category has no scenarios");
        }
        let mut seen = HashSet::new();
        for scenario in &category.scenarios {
            if !seen.insert(scenario.name.as_str()) {
                ctx.warning(format!("duplicate scenario name '{}'", scenario.name));
            }
            ctx.push(scenario.name.clone());
            validate_scenario(scenario, suite.kind, &mut ctx);
            ctx.pop();
        }
        ctx.pop();
    }
    ctx.finish()
}

struct ValidationContext {
    stack: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl ValidationContext {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, label: String) {
        self.stack.push(label);
    }

    fn pop(&mut self) {
        self.stack.pop();
    }

    fn location(&self) -> Option<String> {
        if self.stack.is_empty() {
            None
        } else {
            Some(self.stack.join(" > "))
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        let diag = Diagnostic::error(self.location(), message);
        self.diagnostics.push(diag);
    }

    fn warning(&mut self, message: impl Into<String>) {
        let diag = Diagnostic::warning(self.location(), message);
        self.diagnostics.push(diag);
    }

    fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

fn validate_scenario(scenario: &Scenario, kind: SuiteKind, ctx: &mut ValidationContext) {
    if scenario.steps.is_empty() {
        ctx.warning("scenario has no steps and passes vacuously");
    }
    for (index, step) in scenario.steps.iter().enumerate() {
        ctx.push(format!("step {} ({})", index + 1, step.action_name()));
        validate_step(step, kind, ctx);
        ctx.pop();
    }
}

fn validate_step(step: &Step, kind: SuiteKind, ctx: &mut ValidationContext) {
    if !kind.allows(step) {
        ctx.error(format!(
            "action '{}' is not available in {kind} suites",
            step.action_name()
        ));
    }

    if let Some(selector) = step.selector() {
        if let Err(err) = Selector::parse(selector) {
            match step {
                // These read as "no match" at run time instead of failing.
                Step::Visible { .. } | Step::Hidden { .. } | Step::Count { .. } => {
                    ctx.warning(format!("{err}; the step will never match"))
                }
                _ => ctx.error(err.to_string()),
            }
        }
    }

    match step {
        Step::Navigate { url } if url.trim().is_empty() => ctx.error("url cannot be empty"),
        Step::Navigate { url } if !url.starts_with('/') => {
            ctx.error(format!("url '{url}' must be a path starting with '/'"))
        }
        Step::Resize { width, height } if *width == 0 || *height == 0 => {
            ctx.error(format!("viewport {width}x{height} must be non-zero"))
        }
        _ => {}
    }
}

/// One entry of the action catalog printed by `stagecheck actions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    pub description: String,
    pub params: Vec<String>,
    pub mutating: bool,
    pub kinds: Vec<SuiteKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSchemaBundle {
    pub version: String,
    pub generated_at: String,
    pub actions: Vec<ActionSchema>,
}

const SCHEMA_VERSION: &str = "1";

struct ActionSchemaDef {
    example: Step,
    params: &'static [&'static str],
    description: &'static str,
}

fn def(example: Step, params: &'static [&'static str], description: &'static str) -> ActionSchemaDef {
    ActionSchemaDef {
        example,
        params,
        description,
    }
}

fn builtin_actions() -> Vec<ActionSchemaDef> {
    let target = || "#target".to_string();
    vec![
        def(
            Step::Click { selector: target() },
            &["selector"],
            "Dispatch a click on the first match.",
        ),
        def(
            Step::Type {
                selector: target(),
                value: String::new(),
            },
            &["selector", "value"],
            "Focus, set the value, dispatch input and change.",
        ),
        def(
            Step::Select {
                selector: target(),
                value: String::new(),
            },
            &["selector", "value"],
            "Choose an option and dispatch change.",
        ),
        def(
            Step::Navigate { url: "/".into() },
            &["url"],
            "Push a history entry; passes when the resulting path equals url.",
        ),
        def(
            Step::Visible { selector: target() },
            &["selector"],
            "Passes when the first match is displayed, visible and opaque.",
        ),
        def(
            Step::Hidden { selector: target() },
            &["selector"],
            "Passes when there is no match or it is not visible.",
        ),
        def(
            Step::Focus { selector: target() },
            &["selector"],
            "Move focus; passes when the element became active.",
        ),
        def(
            Step::Blur { selector: target() },
            &["selector"],
            "Remove focus; passes when the element is no longer active.",
        ),
        def(
            Step::Hover { selector: target() },
            &["selector"],
            "Dispatch mouseenter.",
        ),
        def(
            Step::Scroll { selector: target() },
            &["selector"],
            "Scroll the element into view.",
        ),
        def(
            Step::Resize {
                width: 1280,
                height: 720,
            },
            &["width", "height"],
            "Override the viewport and dispatch resize.",
        ),
        def(
            Step::Back,
            &[],
            "Go back one history entry.",
        ),
        def(
            Step::Forward,
            &[],
            "Go forward one history entry.",
        ),
        def(
            Step::Refresh,
            &[],
            "Reload the current document.",
        ),
        def(
            Step::Clear { selector: target() },
            &["selector"],
            "Empty the value, dispatch input and change.",
        ),
        def(
            Step::Count { selector: target() },
            &["selector"],
            "Number of matches; zero still passes unless strict.",
        ),
        def(
            Step::Check {
                selector: target(),
                value: String::new(),
            },
            &["selector", "value"],
            "Passes when the current value equals value.",
        ),
    ]
}

pub fn builtin_action_schemas() -> Vec<ActionSchema> {
    builtin_actions()
        .into_iter()
        .map(|def| {
            let step = def.example;
            ActionSchema {
                name: step.action_name().to_string(),
                description: def.description.to_string(),
                params: def.params.iter().map(|s| (*s).to_string()).collect(),
                mutating: step.is_mutating(),
                kinds: [SuiteKind::Functional, SuiteKind::Visual]
                    .into_iter()
                    .filter(|kind| kind.allows(&step))
                    .collect(),
            }
        })
        .collect()
}

pub fn builtin_action_schema_bundle() -> ActionSchemaBundle {
    ActionSchemaBundle {
        version: SCHEMA_VERSION.to_string(),
        generated_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        actions: builtin_action_schemas(),
    }
}
