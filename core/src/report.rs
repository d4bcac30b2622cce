//! Rendering a [`SuiteResult`] for people: HTML, Markdown or JSON.

use crate::outcome::{ScenarioResult, SuiteResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_REPORT_DIR: &str = "reports";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Html,
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Markdown => "markdown",
            ReportFormat::Json => "json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "html" => Ok(ReportFormat::Html),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{other}'")),
        }
    }
}

pub fn render(result: &SuiteResult, format: ReportFormat) -> String {
    match format {
        ReportFormat::Html => render_html(result),
        ReportFormat::Markdown => render_markdown(result),
        ReportFormat::Json => render_json(result),
    }
}

/// `<kind>-test-report-<YYYY-MM-DD>.<ext>`
pub fn report_file_name(result: &SuiteResult, format: ReportFormat) -> String {
    format!(
        "{}-test-report-{}.{}",
        result.kind,
        result.date(),
        format.extension()
    )
}

/// Render and write the report into `dir`, creating it if needed.
pub fn write_report(
    result: &SuiteResult,
    format: ReportFormat,
    dir: &Path,
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(result, format));
    let mut file = fs::File::create(&path)?;
    file.write_all(render(result, format).as_bytes())?;
    Ok(path)
}

pub fn render_json(result: &SuiteResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|err| format!("{{\"error\":\"{err}\"}}"))
}

pub fn render_html(result: &SuiteResult) -> String {
    let title = format!("{} test report", capitalize(result.kind.as_str()));
    let summary = &result.summary;

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(&title)));
    html.push_str("<style>");
    html.push_str(
        "body{font-family:system-ui,-apple-system,\"Segoe UI\",sans-serif;background:#f8fafc;color:#0f172a;margin:0;padding:0;}\
        header{background:#1e293b;color:#f8fafc;padding:24px 32px;}\
        h1{margin:0;font-size:28px;}\
        h2{margin-top:32px;margin-bottom:12px;font-size:22px;}\
        main{padding:32px;}\
        section{margin-bottom:32px;background:#fff;padding:24px;border-radius:12px;border:1px solid #e2e8f0;}\
        .stats{display:flex;gap:16px;flex-wrap:wrap;}\
        .stat{flex:1;min-width:140px;padding:16px;border-radius:8px;background:#f1f5f9;}\
        .stat strong{display:block;font-size:24px;}\
        table{width:100%;border-collapse:collapse;margin-top:16px;font-size:14px;}\
        th,td{border:1px solid #e2e8f0;padding:8px 10px;text-align:left;}\
        th{background:#f1f5f9;font-weight:600;}\
        .passed{color:#15803d;font-weight:600;}\
        .failed{color:#b91c1c;font-weight:600;}\
        code{font-family:\"Fira Code\",Consolas,monospace;}\
        footer{padding:16px 32px;color:#64748b;font-size:13px;}",
    );
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str("<header>");
    html.push_str(&format!("<h1>{}</h1>", escape_html(&title)));
    html.push_str(&format!(
        "<p>Generated at {} in {} ms</p>",
        escape_html(&result.timestamp),
        result.duration_ms
    ));
    html.push_str("</header>\n<main>\n");

    html.push_str("<section><h2>Summary</h2><div class=\"stats\">");
    for (label, value) in [
        ("Scenarios", summary.total_scenarios.to_string()),
        ("Passed", summary.passed_scenarios.to_string()),
        ("Failed", summary.failed_scenarios.to_string()),
        ("Steps", summary.total_steps.to_string()),
        ("Success rate", format!("{:.1}%", result.success_rate())),
    ] {
        html.push_str(&format!(
            "<div class=\"stat\"><strong>{}</strong>{}</div>",
            escape_html(&value),
            label
        ));
    }
    html.push_str("</div></section>\n");

    for category in &result.categories {
        html.push_str("<section>");
        html.push_str(&format!(
            "<h2>{} <small>({} passed, {} failed)</small></h2>",
            escape_html(&category.name),
            category.passed_count,
            category.failed_count
        ));
        if category.scenarios.is_empty() {
            html.push_str("<p>No scenarios ran in this category.</p>");
        }
        for scenario in &category.scenarios {
            html.push_str(&render_html_scenario(scenario));
        }
        html.push_str("</section>\n");
    }

    if !summary.errors.is_empty() {
        html.push_str("<section><h2>Errors</h2><table><thead><tr>");
        for column in ["Category", "Scenario", "Step", "Selector", "Error"] {
            html.push_str(&format!("<th>{column}</th>"));
        }
        html.push_str("</tr></thead><tbody>");
        for error in &summary.errors {
            html.push_str("<tr>");
            for cell in [
                Some(error.category.as_str()),
                error.scenario.as_deref(),
                error.step.as_deref(),
                error.selector.as_deref(),
                error.error.as_deref(),
            ] {
                html.push_str(&format!("<td>{}</td>", escape_html(cell.unwrap_or(""))));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table></section>\n");
    }

    html.push_str("</main>\n<footer>Generated by stagecheck</footer>\n</body>\n</html>");
    html
}

fn render_html_scenario(scenario: &ScenarioResult) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        "<h3><span class=\"{}\">{}</span> {}</h3>",
        status_class(scenario.passed),
        status_label(scenario.passed),
        escape_html(&scenario.name)
    ));
    if !scenario.description.is_empty() {
        html.push_str(&format!("<p>{}</p>", escape_html(&scenario.description)));
    }
    html.push_str("<table><thead><tr><th>Step</th><th>Status</th><th>Duration</th><th>Error</th></tr></thead><tbody>");
    for step in &scenario.steps {
        html.push_str(&format!(
            "<tr><td><code>{}</code></td><td class=\"{}\">{}</td><td>{} ms</td><td>{}</td></tr>",
            escape_html(&step.step.to_string()),
            status_class(step.passed),
            status_label(step.passed),
            step.duration_ms,
            escape_html(step.error.as_deref().unwrap_or(""))
        ));
    }
    html.push_str("</tbody></table>");
    html
}

pub fn render_markdown(result: &SuiteResult) -> String {
    let summary = &result.summary;
    let mut md = String::new();
    md.push_str(&format!(
        "# {} test report\n\n",
        capitalize(result.kind.as_str())
    ));
    md.push_str(&format!(
        "_Generated at {} in {} ms_\n\n",
        result.timestamp, result.duration_ms
    ));
    md.push_str(&format!(
        "**Scenarios:** {} passed, {} failed, {} total ({:.1}%)  \n",
        summary.passed_scenarios,
        summary.failed_scenarios,
        summary.total_scenarios,
        result.success_rate()
    ));
    md.push_str(&format!(
        "**Steps:** {} passed, {} failed, {} total\n\n",
        summary.passed_steps, summary.failed_steps, summary.total_steps
    ));

    for category in &result.categories {
        md.push_str(&format!("## {}\n\n", category.name));
        if category.scenarios.is_empty() {
            md.push_str("No scenarios ran in this category.\n\n");
            continue;
        }
        md.push_str("| Scenario | Status | Steps | Duration |\n| --- | --- | --- | --- |\n");
        for scenario in &category.scenarios {
            md.push_str(&format!(
                "| {} | {} | {} | {} ms |\n",
                sanitize_markdown_cell(&scenario.name),
                status_label(scenario.passed),
                scenario.steps.len(),
                scenario.duration_ms
            ));
        }
        md.push('\n');
    }

    if !summary.errors.is_empty() {
        md.push_str("## Errors\n\n");
        for error in &summary.errors {
            let location = [error.scenario.as_deref(), error.step.as_deref(), error.selector.as_deref()]
                .into_iter()
                .flatten()
                .map(|part| format!("`{part}`"))
                .collect::<Vec<_>>()
                .join(" / ");
            md.push_str(&format!(
                "- **{}** {}: {}\n",
                error.category,
                location,
                error.error.as_deref().unwrap_or("assertion failed")
            ));
        }
    }

    md
}

fn status_label(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

fn status_class(passed: bool) -> &'static str {
    if passed {
        "passed"
    } else {
        "failed"
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn sanitize_markdown_cell(value: &str) -> String {
    let replaced = value.replace('\n', "<br>");
    replaced.replace('|', "\\|")
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{ScenarioResult, StepResult, SuiteBuilder};
    use crate::scenario::{Step, SuiteKind};

    fn sample() -> SuiteResult {
        let mut builder = SuiteBuilder::new(SuiteKind::Visual);
        builder.begin_category("layout");
        builder.record(ScenarioResult::from_steps(
            "mobile <menu>",
            "Menu collapses | stacks",
            vec![StepResult {
                step: Step::Visible {
                    selector: ".menu".into(),
                },
                passed: false,
                error: None,
                duration_ms: 3,
                actual: None,
            }],
            3,
        ));
        let mut result = builder.finish(7);
        result.timestamp = "2026-03-14T09:26:53Z".into();
        result
    }

    #[test]
    fn file_name_uses_kind_and_date() {
        let result = sample();
        assert_eq!(
            report_file_name(&result, ReportFormat::Html),
            "visual-test-report-2026-03-14.html"
        );
        assert_eq!(
            report_file_name(&result, ReportFormat::Markdown),
            "visual-test-report-2026-03-14.md"
        );
    }

    #[test]
    fn html_escapes_user_text() {
        let html = render_html(&sample());
        assert!(html.contains("<title>Visual test report</title>"));
        assert!(html.contains("mobile &lt;menu&gt;"));
        assert!(html.contains("class=\"failed\""));
        assert!(!html.contains("<menu>"));
    }

    #[test]
    fn markdown_lists_scenarios_and_errors() {
        let md = render_markdown(&sample());
        assert!(md.starts_with("# Visual test report"));
        assert!(md.contains("| mobile <menu> | FAIL | 1 | 3 ms |"));
        assert!(md.contains("- **layout** `mobile <menu>` / `visible` / `.menu`: assertion failed"));
    }

    #[test]
    fn json_round_trips() {
        let result = sample();
        let parsed: SuiteResult =
            serde_json::from_str(&render_json(&result)).expect("valid json");
        assert_eq!(parsed, result);
    }

    #[test]
    fn write_report_creates_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("nested").join("reports");
        let path = write_report(&sample(), ReportFormat::Html, &out).expect("report written");
        assert!(path.ends_with("visual-test-report-2026-03-14.html"));
        let contents = fs::read_to_string(path).expect("readable");
        assert!(contents.contains("Generated by stagecheck"));
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("HTML".parse::<ReportFormat>(), Ok(ReportFormat::Html));
        assert_eq!("md".parse::<ReportFormat>(), Ok(ReportFormat::Markdown));
        assert!("pdf".parse::<ReportFormat>().is_err());
    }
}
