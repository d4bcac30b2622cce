use crate::action::{ActionExecutor, ActionOutcome};
use crate::config::HarnessConfig;
use crate::error::{ActionError, HarnessError};
use crate::outcome::{ScenarioResult, StepResult, SuiteBuilder, SuiteResult};
use crate::page::Page;
use crate::report;
use crate::scenario::{Scenario, Step, Suite, SuiteKind};
use crate::settle::{FixedDelay, Settle};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Runs steps, scenarios and suites against one page.
///
/// The harness holds the page mutably for its whole lifetime, so a page can
/// only ever be driven by one run at a time.
pub struct Harness<'p, P: Page> {
    page: &'p mut P,
    config: HarnessConfig,
    settle: Box<dyn Settle>,
    kind: SuiteKind,
}

impl<'p, P: Page> Harness<'p, P> {
    pub fn new(page: &'p mut P, config: HarnessConfig) -> Self {
        let settle = Box::new(FixedDelay(config.settle_delay));
        Self {
            page,
            config,
            settle,
            kind: SuiteKind::default(),
        }
    }

    /// Replace the fixed settle delay with another strategy.
    pub fn with_settle(mut self, settle: impl Settle + 'static) -> Self {
        self.settle = Box::new(settle);
        self
    }

    /// Action set used by [`Harness::run_step`] and [`Harness::run_scenario`].
    /// [`Harness::run_suite`] takes it from the suite instead.
    pub fn with_kind(mut self, kind: SuiteKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn page(&self) -> &P {
        &*self.page
    }

    pub async fn run_step(&mut self, step: &Step) -> Result<StepResult, HarnessError> {
        let started = Instant::now();
        let result = self.execute(step).await;
        let duration_ms = elapsed_ms(started);

        let (passed, error, actual) = match result {
            Ok(outcome) => (self.config.pass_rule.accepts(outcome), None, Some(outcome)),
            Err(err) if err.is_fatal() => {
                return Err(HarnessError::PageClosed {
                    step: step.to_string(),
                })
            }
            Err(err) => (false, Some(err.to_string()), None),
        };
        debug!(step = %step, passed, duration_ms, "step finished");

        Ok(StepResult {
            step: step.clone(),
            passed,
            error,
            duration_ms,
            actual,
        })
    }

    /// The timeout bounds the page operation only; settling afterwards is
    /// not part of the action.
    async fn execute(&mut self, step: &Step) -> Result<ActionOutcome, ActionError> {
        let limit = self.config.action_timeout;
        let mut executor = ActionExecutor::new(&mut *self.page, self.settle.as_ref(), self.kind);
        let outcome = match limit {
            Some(after) => timeout(after, executor.perform(step))
                .await
                .unwrap_or(Err(ActionError::Timeout {
                    action: step.action_name(),
                    after,
                }))?,
            None => executor.perform(step).await?,
        };
        executor.settle_after(step, outcome).await
    }

    /// Run every step in order. A failing step never stops the scenario.
    pub async fn run_scenario(
        &mut self,
        scenario: &Scenario,
    ) -> Result<ScenarioResult, HarnessError> {
        let started = Instant::now();
        let mut steps = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            steps.push(self.run_step(step).await?);
            if index + 1 < scenario.steps.len() {
                self.settle.settle(&*self.page).await;
            }
        }

        let result = ScenarioResult::from_steps(
            scenario.name.clone(),
            scenario.description.clone(),
            steps,
            elapsed_ms(started),
        );
        info!(
            scenario = %result.name,
            passed = result.passed,
            duration_ms = result.duration_ms,
            "scenario finished"
        );
        Ok(result)
    }

    /// Run every category in order. Never fails: errors that abort a
    /// scenario are recorded under the `test-suite` category.
    pub async fn run_suite(&mut self, suite: &Suite) -> SuiteResult {
        let started = Instant::now();
        self.kind = suite.kind;
        let mut builder = SuiteBuilder::new(suite.kind);

        for category in &suite.categories {
            debug!(category = %category.name, "running category");
            builder.begin_category(&category.name);
            for scenario in &category.scenarios {
                match self.run_scenario(scenario).await {
                    Ok(result) => builder.record(result),
                    Err(err) => {
                        warn!(scenario = %scenario.name, error = %err, "scenario aborted");
                        builder.record_harness_error(&scenario.name, err);
                    }
                }
            }
        }

        let result = builder.finish(elapsed_ms(started));
        info!(
            kind = %result.kind,
            passed = result.summary.passed_scenarios,
            failed = result.summary.failed_scenarios,
            duration_ms = result.duration_ms,
            "suite finished"
        );
        result
    }
}

/// Run a whole suite against `page` with the fixed settle delay from `config`.
pub async fn run_full_test_suite<P: Page>(
    page: &mut P,
    suite: &Suite,
    config: HarnessConfig,
) -> SuiteResult {
    Harness::new(page, config).run_suite(suite).await
}

/// Like [`run_full_test_suite`], also rendering the HTML report.
pub async fn run_suite_with_report<P: Page>(
    page: &mut P,
    suite: &Suite,
    config: HarnessConfig,
) -> (SuiteResult, String) {
    let result = run_full_test_suite(page, suite, config).await;
    let html = report::render_html(&result);
    (result, html)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PassRule;
    use crate::outcome::HARNESS_CATEGORY;
    use crate::page::{ComputedStyle, ElementId, MemoryPage, PageEvent, PageResult};
    use crate::scenario::Category;
    use crate::settle::Immediate;
    use std::time::Duration;

    const SITE: &str = r##"
<body>
  <nav>
    <a id="home-link" href="/">Home</a>
    <a id="events-link" href="/events">Events</a>
  </nav>
  <div class="modal" style="display: none">Signed up!</div>
  <form id="signup">
    <input id="email" type="email"/>
    <button id="submit" type="submit">Join</button>
  </form>
</body>
"##;

    fn page() -> MemoryPage {
        MemoryPage::from_markup(SITE).expect("page")
    }

    fn scenario(name: &str, steps: Vec<Step>) -> Scenario {
        Scenario {
            name: name.into(),
            description: String::new(),
            steps,
        }
    }

    fn click(selector: &str) -> Step {
        Step::Click {
            selector: selector.into(),
        }
    }

    fn visible(selector: &str) -> Step {
        Step::Visible {
            selector: selector.into(),
        }
    }

    async fn run_one(page: &mut MemoryPage, scenario: &Scenario) -> ScenarioResult {
        Harness::new(page, HarnessConfig::default())
            .with_settle(Immediate)
            .run_scenario(scenario)
            .await
            .expect("scenario runs")
    }

    #[tokio::test]
    async fn missing_target_fails_with_not_found() {
        let mut page = page();
        let result = run_one(&mut page, &scenario("missing", vec![click("#missing")])).await;
        let step = &result.steps[0];
        assert!(!step.passed);
        let error = step.error.as_deref().expect("error recorded");
        assert!(error.contains("not found"), "{error}");
    }

    #[tokio::test]
    async fn hidden_modal_fails_without_error() {
        let mut page = page();
        let result = run_one(&mut page, &scenario("modal", vec![visible(".modal")])).await;
        let step = &result.steps[0];
        assert!(!step.passed);
        assert_eq!(step.error, None);
        assert_eq!(step.actual, Some(ActionOutcome::Bool(false)));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].error, None);
    }

    #[tokio::test]
    async fn suite_counts_categories_in_order() {
        let suite = Suite {
            kind: SuiteKind::Functional,
            categories: vec![
                Category {
                    name: "nav".into(),
                    scenarios: vec![
                        scenario("home", vec![click("#home-link")]),
                        scenario("events", vec![click("#events-link")]),
                    ],
                },
                Category {
                    name: "forms".into(),
                    scenarios: vec![scenario("signup", vec![click("#submit"), visible(".modal")])],
                },
            ],
        };
        let mut page = page();
        let result = Harness::new(&mut page, HarnessConfig::default())
            .with_settle(Immediate)
            .run_suite(&suite)
            .await;

        assert_eq!(result.summary.total_scenarios, 3);
        assert_eq!(result.summary.passed_scenarios, 2);
        assert_eq!(result.summary.failed_scenarios, 1);
        assert_eq!(result.summary.errors.len(), 1);
        let names: Vec<&str> = result.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["nav", "forms"]);
        assert_eq!(result.categories[1].failed_count, 1);
        assert_eq!(result.summary.total_steps, 4);
        assert_eq!(result.summary.failed_steps, 1);
    }

    #[tokio::test]
    async fn empty_scenario_passes_vacuously() {
        let mut page = page();
        let result = run_one(&mut page, &scenario("nothing", Vec::new())).await;
        assert!(result.passed);
        assert!(result.errors.is_empty());
        assert!(result.steps.is_empty());
    }

    // Surprising but deliberate: an empty count is still a pass by default.
    #[tokio::test]
    async fn empty_count_passes_unless_strict() {
        let steps = vec![Step::Count {
            selector: ".no-such-thing".into(),
        }];
        let mut page = page();
        let lenient = run_one(&mut page, &scenario("count", steps.clone())).await;
        assert!(lenient.passed);
        assert_eq!(lenient.steps[0].actual, Some(ActionOutcome::Count(0)));

        let strict = Harness::new(
            &mut page,
            HarnessConfig::default().with_pass_rule(PassRule::Strict),
        )
        .with_settle(Immediate)
        .run_scenario(&scenario("count", steps))
        .await
        .expect("scenario runs");
        assert!(!strict.passed);
        assert_eq!(strict.steps[0].error, None);
    }

    #[tokio::test]
    async fn failing_step_does_not_stop_scenario() {
        let mut page = page();
        let result = run_one(
            &mut page,
            &scenario(
                "keeps going",
                vec![
                    click("#missing"),
                    Step::Type {
                        selector: "#email".into(),
                        value: "ada@example.org".into(),
                    },
                    visible("#signup"),
                ],
            ),
        )
        .await;
        let passes: Vec<bool> = result.steps.iter().map(|step| step.passed).collect();
        assert_eq!(passes, vec![false, true, true]);
        assert!(!result.passed);
        assert_eq!(result.passed, passes.iter().all(|passed| *passed));
    }

    #[tokio::test]
    async fn repeated_runs_agree_on_pass_flags() {
        let target = scenario(
            "repeat",
            vec![visible("#signup"), visible(".modal"), click("#submit")],
        );
        let flags = |result: &ScenarioResult| {
            result
                .steps
                .iter()
                .map(|step| step.passed)
                .collect::<Vec<_>>()
        };
        let first = run_one(&mut page(), &target).await;
        let second = run_one(&mut page(), &target).await;
        assert_eq!(flags(&first), flags(&second));
    }

    #[tokio::test]
    async fn closed_page_is_recorded_as_suite_error() {
        let suite = Suite {
            kind: SuiteKind::Functional,
            categories: vec![Category {
                name: "nav".into(),
                scenarios: vec![
                    scenario("broken", vec![click("#home-link")]),
                    scenario("empty", Vec::new()),
                ],
            }],
        };
        let mut page = page();
        page.close();
        let result = run_full_test_suite(
            &mut page,
            &suite,
            HarnessConfig::default().with_settle_delay(Duration::ZERO),
        )
        .await;

        assert_eq!(result.summary.errors.len(), 1);
        assert_eq!(result.summary.errors[0].category, HARNESS_CATEGORY);
        assert_eq!(result.summary.total_scenarios, 1);
        assert_eq!(result.categories[0].scenarios[0].name, "empty");
    }

    #[tokio::test]
    async fn visual_suite_rejects_form_actions() {
        let suite = Suite {
            kind: SuiteKind::Visual,
            categories: vec![Category {
                name: "layout".into(),
                scenarios: vec![scenario(
                    "typing",
                    vec![Step::Type {
                        selector: "#email".into(),
                        value: "x".into(),
                    }],
                )],
            }],
        };
        let mut page = page();
        let result = Harness::new(&mut page, HarnessConfig::default())
            .with_settle(Immediate)
            .run_suite(&suite)
            .await;
        assert_eq!(result.summary.failed_scenarios, 1);
        let error = result.summary.errors[0].error.as_deref().unwrap_or_default();
        assert!(error.contains("visual"), "{error}");
    }

    /// A page whose event dispatch never finishes in time.
    struct StalledDispatch(MemoryPage);

    #[async_trait::async_trait]
    impl Page for StalledDispatch {
        async fn query_all(&self, selector: &str) -> PageResult<Vec<ElementId>> {
            self.0.query_all(selector).await
        }
        async fn computed_style(&self, element: ElementId) -> PageResult<ComputedStyle> {
            self.0.computed_style(element).await
        }
        async fn value(&self, element: ElementId) -> PageResult<Option<String>> {
            self.0.value(element).await
        }
        async fn set_value(&mut self, element: ElementId, value: &str) -> PageResult<()> {
            self.0.set_value(element, value).await
        }
        async fn dispatch(&mut self, element: ElementId, event: PageEvent) -> PageResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            self.0.dispatch(element, event).await
        }
        async fn focus(&mut self, element: ElementId) -> PageResult<()> {
            self.0.focus(element).await
        }
        async fn blur(&mut self, element: ElementId) -> PageResult<()> {
            self.0.blur(element).await
        }
        async fn active_element(&self) -> PageResult<Option<ElementId>> {
            self.0.active_element().await
        }
        async fn scroll_into_view(&mut self, element: ElementId) -> PageResult<()> {
            self.0.scroll_into_view(element).await
        }
        async fn push_state(&mut self, url: &str) -> PageResult<()> {
            self.0.push_state(url).await
        }
        async fn location_path(&self) -> PageResult<String> {
            self.0.location_path().await
        }
        async fn history_back(&mut self) -> PageResult<()> {
            self.0.history_back().await
        }
        async fn history_forward(&mut self) -> PageResult<()> {
            self.0.history_forward().await
        }
        async fn reload(&mut self) -> PageResult<()> {
            self.0.reload().await
        }
        async fn set_viewport(&mut self, width: u32, height: u32) -> PageResult<()> {
            self.0.set_viewport(width, height).await
        }
        fn revision(&self) -> u64 {
            self.0.revision()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_action_times_out() {
        let mut page = StalledDispatch(page());
        let config = HarnessConfig::default()
            .with_settle_delay(Duration::from_millis(100))
            .with_action_timeout(Some(Duration::from_millis(50)));
        let result = Harness::new(&mut page, config)
            .run_step(&click("#submit"))
            .await
            .expect("step runs");
        assert!(!result.passed);
        let error = result.error.unwrap_or_default();
        assert!(error.contains("timed out after 50ms"), "{error}");
        assert!(result.duration_ms < 100, "{}", result.duration_ms);
        assert!(page.0.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_is_outside_the_action_timeout() {
        let mut page = page();
        let config = HarnessConfig::default()
            .with_settle_delay(Duration::from_millis(100))
            .with_action_timeout(Some(Duration::from_millis(50)));
        let result = Harness::new(&mut page, config)
            .run_step(&click("#submit"))
            .await
            .expect("step runs");
        assert!(result.passed, "{:?}", result.error);
        assert_eq!(result.error, None);
        assert!(result.duration_ms >= 100, "{}", result.duration_ms);
        assert_eq!(page.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_time_counts_toward_duration() {
        let mut page = page();
        let result = Harness::new(&mut page, HarnessConfig::default())
            .run_scenario(&scenario(
                "two clicks",
                vec![click("#submit"), click("#submit")],
            ))
            .await
            .expect("scenario runs");
        // Two post-click settles plus one between steps.
        assert!(result.duration_ms >= 300, "{}", result.duration_ms);
    }

    #[tokio::test]
    async fn report_entry_point_renders_html() {
        let suite = Suite {
            kind: SuiteKind::Functional,
            categories: vec![Category {
                name: "nav".into(),
                scenarios: vec![scenario("home", vec![visible("nav")])],
            }],
        };
        let mut page = page();
        let (result, html) = run_suite_with_report(
            &mut page,
            &suite,
            HarnessConfig::default().with_settle_delay(Duration::ZERO),
        )
        .await;
        assert!(!result.has_failures());
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("home"));
    }
}
