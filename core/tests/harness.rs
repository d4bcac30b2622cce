use pretty_assertions::assert_eq;
use stagecheck_core::{
    run_full_test_suite, run_suite_with_report, validate_suite, write_report, ActionOutcome,
    Harness, HarnessConfig, Immediate, MemoryPage, Quiescence, ReportFormat, Suite, SuiteKind,
    SuiteResult,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn demos() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos")
}

fn demo_page() -> MemoryPage {
    let read = |name: &str| fs::read_to_string(demos().join(name)).expect("demo markup");
    MemoryPage::from_markup(&read("site.xhtml"))
        .and_then(|page| page.with_route("/events", &read("events.xhtml")))
        .and_then(|page| page.with_route("/join", &read("join.xhtml")))
        .expect("demo page builds")
}

fn fast() -> HarnessConfig {
    HarnessConfig::default().with_settle_delay(Duration::ZERO)
}

fn scenario_flags(result: &SuiteResult) -> Vec<(String, bool)> {
    result
        .categories
        .iter()
        .flat_map(|category| &category.scenarios)
        .map(|scenario| (scenario.name.clone(), scenario.passed))
        .collect()
}

#[tokio::test]
async fn functional_demo_suite_passes() {
    let suite = Suite::from_path(&demos().join("functional.scn")).expect("suite loads");
    assert!(validate_suite(&suite).is_empty());

    let mut page = demo_page();
    let result = run_full_test_suite(&mut page, &suite, fast()).await;

    assert_eq!(
        scenario_flags(&result),
        vec![
            ("Menu opens".to_string(), true),
            ("Events page".to_string(), true),
            ("Join the club".to_string(), true),
            ("Clear a field".to_string(), true),
        ]
    );
    assert_eq!(result.summary.total_steps, 20);
    assert!(result.summary.errors.is_empty());

    let events = &result.categories[0].scenarios[1];
    assert_eq!(events.steps[3].actual, Some(ActionOutcome::Count(3)));
}

#[tokio::test]
async fn visual_demo_suite_passes_from_yaml() {
    let suite = Suite::from_path(&demos().join("visual.yaml")).expect("suite loads");
    assert_eq!(suite.kind, SuiteKind::Visual);

    let mut page = demo_page();
    let result = Harness::new(&mut page, HarnessConfig::default())
        .with_settle(Immediate)
        .run_suite(&suite)
        .await;

    assert_eq!(result.kind, SuiteKind::Visual);
    assert_eq!(result.summary.passed_scenarios, 2);
    assert_eq!(page.viewport().width, 375);
}

#[tokio::test]
async fn summary_totals_are_consistent() {
    let suite = Suite::from_path(&demos().join("functional.scn")).expect("suite loads");
    let mut page = MemoryPage::from_markup("<body><p>Under construction</p></body>").expect("page");
    let result = run_full_test_suite(&mut page, &suite, fast()).await;

    let per_category: usize = result.categories.iter().map(|c| c.scenarios.len()).sum();
    assert_eq!(result.summary.total_scenarios, per_category);
    assert_eq!(
        result.summary.passed_scenarios + result.summary.failed_scenarios,
        result.summary.total_scenarios
    );
    for scenario in result.categories.iter().flat_map(|c| &c.scenarios) {
        assert_eq!(scenario.passed, scenario.steps.iter().all(|step| step.passed));
    }
    assert!(result.has_failures());
}

#[tokio::test]
async fn identical_runs_produce_identical_flags() {
    let suite = Suite::from_path(&demos().join("functional.scn")).expect("suite loads");
    let step_flags = |result: &SuiteResult| {
        result
            .categories
            .iter()
            .flat_map(|c| &c.scenarios)
            .flat_map(|s| &s.steps)
            .map(|step| step.passed)
            .collect::<Vec<_>>()
    };

    let first = run_full_test_suite(&mut demo_page(), &suite, fast()).await;
    let second = run_full_test_suite(&mut demo_page(), &suite, fast()).await;
    assert_eq!(step_flags(&first), step_flags(&second));
}

#[tokio::test(start_paused = true)]
async fn quiescence_settle_runs_suite() {
    let suite = Suite::from_path(&demos().join("functional.scn")).expect("suite loads");
    let mut page = demo_page();
    let result = Harness::new(&mut page, HarnessConfig::default())
        .with_settle(Quiescence::default())
        .run_suite(&suite)
        .await;
    assert!(!result.has_failures());
}

#[tokio::test]
async fn report_is_written_with_dated_name() {
    let suite = Suite::from_path(&demos().join("functional.scn")).expect("suite loads");
    let mut page = demo_page();
    let (result, html) = run_suite_with_report(&mut page, &suite, fast()).await;
    assert!(html.contains("Functional test report"));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_report(&result, ReportFormat::Markdown, dir.path()).expect("report written");
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .expect("file name");
    assert_eq!(name, format!("functional-test-report-{}.md", result.date()));
    let contents = fs::read_to_string(&path).expect("readable");
    assert!(contents.contains("## navigation"));
    assert!(contents.contains("## forms"));
}
