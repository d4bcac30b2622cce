pub mod action;
pub mod config;
pub mod error;
pub mod outcome;
pub mod page;
pub mod report;
pub mod runtime;
pub mod scenario;
pub mod settle;
pub mod simulate;
pub mod validation;

pub use action::{ActionExecutor, ActionOutcome};
pub use config::{HarnessConfig, PassRule};
pub use error::{ActionError, HarnessError, LoadError, PageError, ParseError};
pub use outcome::{
    CategoryResult, ScenarioResult, StepError, StepResult, SuiteBuilder, SuiteError, SuiteResult,
    SuiteSummary, HARNESS_CATEGORY,
};
pub use page::{ComputedStyle, Document, ElementId, MemoryPage, Page, PageEvent, Viewport};
pub use report::{render, report_file_name, write_report, ReportFormat, DEFAULT_REPORT_DIR};
pub use runtime::{run_full_test_suite, run_suite_with_report, Harness};
pub use scenario::{
    parse_step, parse_suite, Category, CategoryOutline, Scenario, Step, Suite, SuiteKind,
    SuiteOutline,
};
pub use settle::{FixedDelay, Immediate, Quiescence, Settle, DEFAULT_SETTLE_DELAY};
pub use simulate::{simulate_suite, SimulationOptions, DEFAULT_PASS_RATE};
pub use validation::{
    builtin_action_schema_bundle, builtin_action_schemas, validate_suite, ActionSchema,
    ActionSchemaBundle, Diagnostic, DiagnosticLevel,
};
