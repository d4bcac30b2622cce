use crate::action::ActionOutcome;
use crate::scenario::{Step, SuiteKind};
use comfy_table::{presets::ASCII_FULL, Table};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Category recorded for errors that escaped a scenario instead of failing a
/// step inside it.
pub const HARNESS_CATEGORY: &str = "test-suite";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: Step,
    pub passed: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Raw return value of the action, for diagnostics only.
    pub actual: Option<ActionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub step: String,
    pub selector: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub description: String,
    pub steps: Vec<StepResult>,
    pub passed: bool,
    pub duration_ms: u64,
    pub errors: Vec<StepError>,
}

impl ScenarioResult {
    /// Derive `passed` and `errors` from the step results.
    pub fn from_steps(
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<StepResult>,
        duration_ms: u64,
    ) -> Self {
        let passed = steps.iter().all(|step| step.passed);
        let errors = steps
            .iter()
            .filter(|step| !step.passed)
            .map(|step| StepError {
                step: step.step.action_name().to_string(),
                selector: step.step.selector().map(str::to_string),
                error: step.error.clone(),
            })
            .collect();
        Self {
            name: name.into(),
            description: description.into(),
            steps,
            passed,
            duration_ms,
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub name: String,
    pub scenarios: Vec<ScenarioResult>,
    pub passed_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteError {
    pub category: String,
    pub scenario: Option<String>,
    pub step: Option<String>,
    pub selector: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total_scenarios: usize,
    pub passed_scenarios: usize,
    pub failed_scenarios: usize,
    pub total_steps: usize,
    pub passed_steps: usize,
    pub failed_steps: usize,
    pub errors: Vec<SuiteError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    pub kind: SuiteKind,
    pub timestamp: String,
    pub duration_ms: u64,
    pub categories: Vec<CategoryResult>,
    pub summary: SuiteSummary,
}

impl SuiteResult {
    pub fn has_failures(&self) -> bool {
        self.summary.failed_scenarios > 0
    }

    /// `YYYY-MM-DD` part of the timestamp.
    pub fn date(&self) -> &str {
        self.timestamp
            .get(..10)
            .filter(|date| date.as_bytes().get(4) == Some(&b'-'))
            .unwrap_or("unknown-date")
    }

    pub fn success_rate(&self) -> f64 {
        if self.summary.total_scenarios == 0 {
            return 100.0;
        }
        self.summary.passed_scenarios as f64 * 100.0 / self.summary.total_scenarios as f64
    }
}

impl fmt::Display for SuiteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table.load_preset(ASCII_FULL);
        table.set_header(vec!["Category", "Scenarios", "Passed", "Failed"]);
        for category in &self.categories {
            table.add_row(vec![
                category.name.clone(),
                category.scenarios.len().to_string(),
                category.passed_count.to_string(),
                category.failed_count.to_string(),
            ]);
        }
        writeln!(f, "{} suite, {}", self.kind, self.timestamp)?;
        writeln!(f, "{table}")?;
        writeln!(
            f,
            "Scenarios: {} passed, {} failed, {} total ({:.1}%)",
            self.summary.passed_scenarios,
            self.summary.failed_scenarios,
            self.summary.total_scenarios,
            self.success_rate()
        )?;
        writeln!(
            f,
            "Steps: {} passed, {} failed, {} total",
            self.summary.passed_steps, self.summary.failed_steps, self.summary.total_steps
        )?;
        for error in &self.summary.errors {
            let location = [error.scenario.as_deref(), error.step.as_deref(), error.selector.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" > ");
            writeln!(
                f,
                "  - [{}] {}: {}",
                error.category,
                location,
                error.error.as_deref().unwrap_or("assertion failed")
            )?;
        }
        Ok(())
    }
}

/// Accumulates category and summary totals as scenarios finish.
#[derive(Debug)]
pub struct SuiteBuilder {
    kind: SuiteKind,
    timestamp: String,
    categories: Vec<CategoryResult>,
    summary: SuiteSummary,
}

impl SuiteBuilder {
    pub fn new(kind: SuiteKind) -> Self {
        Self {
            kind,
            timestamp: now_rfc3339(),
            categories: Vec::new(),
            summary: SuiteSummary::default(),
        }
    }

    pub fn begin_category(&mut self, name: &str) {
        self.categories.push(CategoryResult {
            name: name.to_string(),
            scenarios: Vec::new(),
            passed_count: 0,
            failed_count: 0,
        });
    }

    /// Add a finished scenario to the most recently started category.
    pub fn record(&mut self, result: ScenarioResult) {
        let Some(category) = self.categories.last_mut() else {
            return;
        };
        let summary = &mut self.summary;

        summary.total_scenarios += 1;
        if result.passed {
            summary.passed_scenarios += 1;
            category.passed_count += 1;
        } else {
            summary.failed_scenarios += 1;
            category.failed_count += 1;
        }
        summary.total_steps += result.steps.len();
        let passed_steps = result.steps.iter().filter(|step| step.passed).count();
        summary.passed_steps += passed_steps;
        summary.failed_steps += result.steps.len() - passed_steps;

        summary
            .errors
            .extend(result.errors.iter().map(|error| SuiteError {
                category: category.name.clone(),
                scenario: Some(result.name.clone()),
                step: Some(error.step.clone()),
                selector: error.selector.clone(),
                error: error.error.clone(),
            }));
        category.scenarios.push(result);
    }

    /// Note an error that aborted a scenario. The scenario itself is not
    /// counted anywhere.
    pub fn record_harness_error(&mut self, scenario: &str, error: impl fmt::Display) {
        self.summary.errors.push(SuiteError {
            category: HARNESS_CATEGORY.to_string(),
            scenario: Some(scenario.to_string()),
            step: None,
            selector: None,
            error: Some(error.to_string()),
        });
    }

    pub fn finish(self, duration_ms: u64) -> SuiteResult {
        SuiteResult {
            kind: self.kind,
            timestamp: self.timestamp,
            duration_ms,
            categories: self.categories,
            summary: self.summary,
        }
    }
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
