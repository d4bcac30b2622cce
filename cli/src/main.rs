use anyhow::Context;
use clap::{builder::BoolishValueParser, ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use stagecheck_core::{
    builtin_action_schema_bundle, report, simulate_suite, validate_suite, write_report,
    ActionSchema, Diagnostic, DiagnosticLevel, Harness, HarnessConfig, Immediate, MemoryPage,
    PassRule, Quiescence, ReportFormat, SimulationOptions, Suite, SuiteOutline, SuiteResult,
    DEFAULT_PASS_RATE, DEFAULT_REPORT_DIR,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "Run declarative page scenarios and write test reports")]
struct StagecheckCli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse and validate a suite file
    Check {
        /// Suite file (.scn, .yaml or .json)
        suite: PathBuf,
        /// Output JSON instead of a human-readable summary
        #[arg(long)]
        json: bool,
    },
    /// Run a suite against a page loaded from XHTML markup
    Run {
        /// Suite file (.scn, .yaml or .json)
        suite: PathBuf,
        /// Markup served for every route without its own
        #[arg(long)]
        page: PathBuf,
        /// Markup for a specific route (format: /path=file.xhtml). Repeat for multiple routes.
        #[arg(long = "route", value_parser = parse_key_val, value_name = "PATH=FILE", action = ArgAction::Append)]
        routes: Vec<(String, String)>,
        /// Location to start at
        #[arg(long, default_value = "/")]
        url: String,
        #[command(flatten)]
        output: OutputArgs,
        /// Settle delay after mutating steps, in milliseconds
        #[arg(long, env = "STAGECHECK_SETTLE_MS")]
        settle_ms: Option<u64>,
        /// How to wait for the page after mutating steps
        #[arg(long, default_value_t = SettleMode::Fixed)]
        settle: SettleMode,
        /// Fail any single action that takes longer than this, in milliseconds
        #[arg(long, env = "STAGECHECK_ACTION_TIMEOUT_MS")]
        timeout_ms: Option<u64>,
        /// Treat `count` steps that match nothing as failures
        #[arg(long, env = "STAGECHECK_STRICT", value_parser = BoolishValueParser::new(), action = ArgAction::SetTrue)]
        strict: bool,
    },
    /// Produce a synthetic result with random pass/fail per step
    Simulate {
        /// Suite file (.scn, .yaml or .json)
        suite: PathBuf,
        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
        /// Probability that a step passes
        #[arg(long, default_value_t = DEFAULT_PASS_RATE)]
        pass_rate: f64,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Export the builtin action catalog
    Actions {
        /// Filter by action name
        #[arg(long)]
        action: Option<String>,
        /// Output format
        #[arg(long, default_value_t = SchemaFormat::Json)]
        format: SchemaFormat,
    },
}

#[derive(Debug, clap::Args)]
struct OutputArgs {
    /// Report format
    #[arg(long, default_value_t = ReportFormat::Html, value_parser = parse_report_format)]
    format: ReportFormat,
    /// Directory the report is written to
    #[arg(long, default_value = DEFAULT_REPORT_DIR)]
    out_dir: PathBuf,
    /// Print the full result as JSON instead of the summary table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SettleMode {
    Fixed,
    Quiescence,
    Immediate,
}

impl std::fmt::Display for SettleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            SettleMode::Fixed => "fixed",
            SettleMode::Quiescence => "quiescence",
            SettleMode::Immediate => "immediate",
        };
        write!(f, "{value}")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = StagecheckCli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Check { suite, json } => {
            let suite = load_suite(&suite)?;
            let diagnostics = validate_suite(&suite);
            let has_errors = output_check(suite.outline(), &diagnostics, json)?;
            if has_errors {
                anyhow::bail!("validation failed");
            }
        }
        Command::Run {
            suite,
            page,
            routes,
            url,
            output,
            settle_ms,
            settle,
            timeout_ms,
            strict,
        } => {
            let suite = load_checked_suite(&suite, output.json)?;
            let mut page = load_page(&page, &routes, &url)?;

            let mut config = HarnessConfig::from_env()
                .with_action_timeout(timeout_ms.map(Duration::from_millis));
            if let Some(ms) = settle_ms {
                config = config.with_settle_delay(Duration::from_millis(ms));
            }
            if strict {
                config = config.with_pass_rule(PassRule::Strict);
            }

            let harness = Harness::new(&mut page, config);
            let mut harness = match settle {
                SettleMode::Fixed => harness,
                SettleMode::Quiescence => harness.with_settle(Quiescence::default()),
                SettleMode::Immediate => harness.with_settle(Immediate),
            };
            let result = harness.run_suite(&suite).await;
            finish(&result, &output)?;
        }
        Command::Simulate {
            suite,
            seed,
            pass_rate,
            output,
        } => {
            let suite = load_checked_suite(&suite, output.json)?;
            let result = simulate_suite(&suite, SimulationOptions { pass_rate, seed });
            finish(&result, &output)?;
        }
        Command::Actions { action, format } => {
            output_actions(action, format)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_suite(path: &Path) -> anyhow::Result<Suite> {
    Suite::from_path(path).with_context(|| format!("failed to load suite {}", path.display()))
}

/// Load a suite and refuse to run it when validation reports errors.
fn load_checked_suite(path: &Path, json: bool) -> anyhow::Result<Suite> {
    let suite = load_suite(path)?;
    let diagnostics = validate_suite(&suite);
    if !json {
        print_diagnostics(&diagnostics);
    }
    let errors = diagnostics.iter().filter(|diag| diag.is_error()).count();
    if errors > 0 {
        anyhow::bail!("validation failed with {errors} error(s)");
    }
    Ok(suite)
}

fn load_page(path: &Path, routes: &[(String, String)], url: &str) -> anyhow::Result<MemoryPage> {
    let markup = fs::read_to_string(path)
        .with_context(|| format!("failed to read page {}", path.display()))?;
    let mut page = MemoryPage::from_markup(&markup)
        .with_context(|| format!("invalid markup in {}", path.display()))?;
    for (route, file) in routes {
        let markup =
            fs::read_to_string(file).with_context(|| format!("failed to read route page {file}"))?;
        page = page
            .with_route(route, &markup)
            .with_context(|| format!("invalid markup in {file}"))?;
    }
    Ok(page.start_at(url)?)
}

/// Write the report, print the outcome and exit non-zero on failures.
fn finish(result: &SuiteResult, output: &OutputArgs) -> anyhow::Result<()> {
    let path = write_report(result, output.format, &output.out_dir).with_context(|| {
        format!("failed to write report into {}", output.out_dir.display())
    })?;
    info!(path = %path.display(), format = output.format.as_str(), "report written");

    if output.json {
        println!("{}", report::render_json(result));
    } else {
        print!("{result}");
        println!("\nReport: {}", path.display());
    }

    if result.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CheckResponse<'a> {
    outline: SuiteOutline,
    diagnostics: &'a [Diagnostic],
}

fn output_check(
    outline: SuiteOutline,
    diagnostics: &[Diagnostic],
    json: bool,
) -> anyhow::Result<bool> {
    let has_errors = diagnostics.iter().any(Diagnostic::is_error);

    if json {
        let payload = CheckResponse {
            outline,
            diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_diagnostics(diagnostics);
        print!("{outline}");
    }

    Ok(has_errors)
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaFormat {
    Json,
    Yaml,
}

impl std::fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            SchemaFormat::Json => "json",
            SchemaFormat::Yaml => "yaml",
        };
        write!(f, "{value}")
    }
}

#[derive(Debug, Serialize)]
struct SchemaResponse {
    version: String,
    generated_at: String,
    actions: Vec<ActionSchema>,
}

fn output_actions(action: Option<String>, format: SchemaFormat) -> anyhow::Result<()> {
    let bundle = builtin_action_schema_bundle();
    let mut actions = bundle.actions;

    if let Some(filter) = action {
        actions.retain(|schema| schema.name == filter);
        if actions.is_empty() {
            anyhow::bail!("unknown action '{filter}'");
        }
    }

    let response = SchemaResponse {
        version: bundle.version,
        generated_at: bundle.generated_at,
        actions,
    };

    match format {
        SchemaFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        SchemaFormat::Yaml => {
            let yaml = serde_yaml::to_string(&response)?;
            print!("{yaml}");
        }
    }

    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    println!("Diagnostics:");
    for diagnostic in diagnostics {
        let level = match diagnostic.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warn",
        };
        match &diagnostic.location {
            Some(location) => println!("  - [{level}] {location}: {}", diagnostic.message),
            None => println!("  - [{level}] {}", diagnostic.message),
        }
    }
    println!();
}

fn parse_report_format(s: &str) -> Result<ReportFormat, String> {
    s.parse()
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 || parts[0].trim().is_empty() {
        return Err(format!("expected PATH=FILE, got '{s}'"));
    }
    Ok((parts[0].trim().to_string(), parts[1].to_string()))
}
