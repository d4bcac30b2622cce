use crate::error::{LoadError, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// A complete suite: categories of scenarios, run in the order given.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Suite {
    #[serde(default)]
    pub kind: SuiteKind,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

/// A named, ordered list of steps describing one workflow or visual check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Which action vocabulary a suite may use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SuiteKind {
    #[default]
    Functional,
    Visual,
}

/// One declarative page action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Click { selector: String },
    Type { selector: String, value: String },
    Select { selector: String, value: String },
    Navigate { url: String },
    Visible { selector: String },
    Hidden { selector: String },
    Focus { selector: String },
    Blur { selector: String },
    Hover { selector: String },
    Scroll { selector: String },
    Resize { width: u32, height: u32 },
    Back,
    Forward,
    Refresh,
    Clear { selector: String },
    Count { selector: String },
    Check { selector: String, value: String },
}

impl Step {
    pub fn action_name(&self) -> &'static str {
        match self {
            Step::Click { .. } => "click",
            Step::Type { .. } => "type",
            Step::Select { .. } => "select",
            Step::Navigate { .. } => "navigate",
            Step::Visible { .. } => "visible",
            Step::Hidden { .. } => "hidden",
            Step::Focus { .. } => "focus",
            Step::Blur { .. } => "blur",
            Step::Hover { .. } => "hover",
            Step::Scroll { .. } => "scroll",
            Step::Resize { .. } => "resize",
            Step::Back => "back",
            Step::Forward => "forward",
            Step::Refresh => "refresh",
            Step::Clear { .. } => "clear",
            Step::Count { .. } => "count",
            Step::Check { .. } => "check",
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            Step::Click { selector }
            | Step::Type { selector, .. }
            | Step::Select { selector, .. }
            | Step::Visible { selector }
            | Step::Hidden { selector }
            | Step::Focus { selector }
            | Step::Blur { selector }
            | Step::Hover { selector }
            | Step::Scroll { selector }
            | Step::Clear { selector }
            | Step::Count { selector }
            | Step::Check { selector, .. } => Some(selector),
            Step::Navigate { .. }
            | Step::Resize { .. }
            | Step::Back
            | Step::Forward
            | Step::Refresh => None,
        }
    }

    /// Actions that change page state and are followed by a settle.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Step::Visible { .. } | Step::Hidden { .. } | Step::Count { .. } | Step::Check { .. }
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Type { selector, value }
            | Step::Select { selector, value }
            | Step::Check { selector, value } => {
                write!(f, "{} {} {:?}", self.action_name(), selector, value)
            }
            Step::Navigate { url } => write!(f, "navigate {url}"),
            Step::Resize { width, height } => write!(f, "resize {width}x{height}"),
            other => match other.selector() {
                Some(selector) => write!(f, "{} {}", other.action_name(), selector),
                None => write!(f, "{}", other.action_name()),
            },
        }
    }
}

impl SuiteKind {
    /// Visual suites only look at layout and navigation; form interaction
    /// belongs to functional suites.
    pub fn allows(&self, step: &Step) -> bool {
        match self {
            SuiteKind::Functional => true,
            SuiteKind::Visual => !matches!(
                step,
                Step::Click { .. }
                    | Step::Type { .. }
                    | Step::Select { .. }
                    | Step::Focus { .. }
                    | Step::Blur { .. }
                    | Step::Clear { .. }
                    | Step::Check { .. }
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteKind::Functional => "functional",
            SuiteKind::Visual => "visual",
        }
    }
}

impl fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Suite {
    /// Load a suite from YAML, JSON or the line-oriented `.scn` format,
    /// chosen by file extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let content = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
            "json" => Ok(serde_json::from_str(&content)?),
            _ => Ok(parse_suite(&content)?),
        }
    }

    pub fn scenario_count(&self) -> usize {
        self.categories.iter().map(|c| c.scenarios.len()).sum()
    }

    pub fn step_count(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.scenarios.iter())
            .map(|s| s.steps.len())
            .sum()
    }

    pub fn outline(&self) -> SuiteOutline {
        SuiteOutline {
            kind: self.kind,
            total_scenarios: self.scenario_count(),
            total_steps: self.step_count(),
            categories: self
                .categories
                .iter()
                .map(|category| CategoryOutline {
                    name: category.name.clone(),
                    scenarios: category
                        .scenarios
                        .iter()
                        .map(|s| (s.name.clone(), s.steps.len()))
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteOutline {
    pub kind: SuiteKind,
    pub total_scenarios: usize,
    pub total_steps: usize,
    pub categories: Vec<CategoryOutline>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOutline {
    pub name: String,
    pub scenarios: Vec<(String, usize)>,
}

impl fmt::Display for SuiteOutline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Kind: {}", self.kind)?;
        writeln!(
            f,
            "Scenarios: {} ({} steps)",
            self.total_scenarios, self.total_steps
        )?;
        for category in &self.categories {
            writeln!(f, "Category {}:", category.name)?;
            if category.scenarios.is_empty() {
                writeln!(f, "  <empty>")?;
            }
            for (name, steps) in &category.scenarios {
                writeln!(f, "  - {name} ({steps} steps)")?;
            }
        }
        Ok(())
    }
}

/// Parse the `.scn` suite format.
///
/// ```text
/// kind visual
///
/// category nav {
///   scenario "Home link" "Header link returns home" {
///     navigate /about
///     click "#home-link"
///     visible .hero
///   }
/// }
/// ```
///
/// Lines are split with shell quoting rules, so selectors starting with `#`
/// must be quoted.
pub fn parse_suite(source: &str) -> Result<Suite, ParseError> {
    let mut lines = source.lines().enumerate();
    let mut suite = Suite::default();

    while let Some((idx, raw_line)) = next_non_empty(&mut lines) {
        let line_no = idx + 1;
        let tokens = tokenize(line_no, raw_line)?;
        match tokens.first().map(String::as_str) {
            Some("kind") => {
                suite.kind = parse_kind(line_no, raw_line, &tokens)?;
            }
            Some("category") => {
                let category = parse_category(line_no, raw_line, &tokens, &mut lines)?;
                suite.categories.push(category);
            }
            _ => {
                return Err(ParseError::InvalidDirective {
                    line: line_no,
                    text: raw_line.trim().to_string(),
                })
            }
        }
    }

    Ok(suite)
}

fn parse_kind(line: usize, raw: &str, tokens: &[String]) -> Result<SuiteKind, ParseError> {
    match tokens {
        [_, kind] => match kind.as_str() {
            "functional" => Ok(SuiteKind::Functional),
            "visual" => Ok(SuiteKind::Visual),
            _ => Err(ParseError::InvalidSyntax {
                line,
                text: raw.trim().to_string(),
            }),
        },
        [_] => Err(ParseError::MissingValue {
            line,
            what: "suite kind",
        }),
        _ => Err(ParseError::InvalidSyntax {
            line,
            text: raw.trim().to_string(),
        }),
    }
}

fn parse_category<'a, I>(
    line: usize,
    raw: &str,
    tokens: &[String],
    lines: &mut I,
) -> Result<Category, ParseError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let header = block_header(line, raw, tokens)?;
    let name = match header {
        [_, name] => name.clone(),
        [_] => {
            return Err(ParseError::MissingValue {
                line,
                what: "category name",
            })
        }
        _ => {
            return Err(ParseError::InvalidSyntax {
                line,
                text: raw.trim().to_string(),
            })
        }
    };

    let mut scenarios = Vec::new();
    loop {
        let (idx, raw_line) =
            next_non_empty(lines).ok_or(ParseError::UnexpectedEof("category block"))?;
        let line_no = idx + 1;
        if raw_line.trim() == "}" {
            break;
        }
        let tokens = tokenize(line_no, raw_line)?;
        if tokens.first().map(String::as_str) == Some("scenario") {
            scenarios.push(parse_scenario_block(line_no, raw_line, &tokens, lines)?);
        } else {
            return Err(ParseError::InvalidDirective {
                line: line_no,
                text: raw_line.trim().to_string(),
            });
        }
    }

    Ok(Category { name, scenarios })
}

fn parse_scenario_block<'a, I>(
    line: usize,
    raw: &str,
    tokens: &[String],
    lines: &mut I,
) -> Result<Scenario, ParseError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let header = block_header(line, raw, tokens)?;
    let (name, description) = match header {
        [_, name] => (name.clone(), String::new()),
        [_, name, description] => (name.clone(), description.clone()),
        [_] => {
            return Err(ParseError::MissingValue {
                line,
                what: "scenario name",
            })
        }
        _ => {
            return Err(ParseError::InvalidSyntax {
                line,
                text: raw.trim().to_string(),
            })
        }
    };

    let mut steps = Vec::new();
    loop {
        let (idx, raw_line) =
            next_non_empty(lines).ok_or(ParseError::UnexpectedEof("scenario block"))?;
        let line_no = idx + 1;
        if raw_line.trim() == "}" {
            break;
        }
        let tokens = tokenize(line_no, raw_line)?;
        steps.push(parse_step(line_no, raw_line, &tokens)?);
    }

    Ok(Scenario {
        name,
        description,
        steps,
    })
}

/// Parse one step line that has already been split into tokens.
pub fn parse_step(line: usize, raw: &str, tokens: &[String]) -> Result<Step, ParseError> {
    let (action, args) = tokens.split_first().ok_or(ParseError::InvalidSyntax {
        line,
        text: raw.trim().to_string(),
    })?;

    let selector = |what: &'static str| -> Result<String, ParseError> {
        match args {
            [selector] => Ok(selector.clone()),
            [] => Err(ParseError::MissingValue { line, what }),
            _ => Err(ParseError::InvalidSyntax {
                line,
                text: raw.trim().to_string(),
            }),
        }
    };
    let selector_and_value = || -> Result<(String, String), ParseError> {
        match args {
            [selector, value] => Ok((selector.clone(), value.clone())),
            [] => Err(ParseError::MissingValue {
                line,
                what: "selector",
            }),
            [_] => Err(ParseError::MissingValue {
                line,
                what: "value",
            }),
            _ => Err(ParseError::InvalidSyntax {
                line,
                text: raw.trim().to_string(),
            }),
        }
    };
    let no_args = |step: Step| -> Result<Step, ParseError> {
        if args.is_empty() {
            Ok(step)
        } else {
            Err(ParseError::InvalidSyntax {
                line,
                text: raw.trim().to_string(),
            })
        }
    };

    let step = match action.as_str() {
        "click" => Step::Click {
            selector: selector("selector")?,
        },
        "type" => {
            let (selector, value) = selector_and_value()?;
            Step::Type { selector, value }
        }
        "select" => {
            let (selector, value) = selector_and_value()?;
            Step::Select { selector, value }
        }
        "check" => {
            let (selector, value) = selector_and_value()?;
            Step::Check { selector, value }
        }
        "navigate" => Step::Navigate {
            url: selector("url")?,
        },
        "visible" => Step::Visible {
            selector: selector("selector")?,
        },
        "hidden" => Step::Hidden {
            selector: selector("selector")?,
        },
        "focus" => Step::Focus {
            selector: selector("selector")?,
        },
        "blur" => Step::Blur {
            selector: selector("selector")?,
        },
        "hover" => Step::Hover {
            selector: selector("selector")?,
        },
        "scroll" => Step::Scroll {
            selector: selector("selector")?,
        },
        "clear" => Step::Clear {
            selector: selector("selector")?,
        },
        "count" => Step::Count {
            selector: selector("selector")?,
        },
        "resize" => {
            let (width, height) = parse_dimensions(line, raw, args)?;
            Step::Resize { width, height }
        }
        "back" => no_args(Step::Back)?,
        "forward" => no_args(Step::Forward)?,
        "refresh" => no_args(Step::Refresh)?,
        other => {
            return Err(ParseError::UnknownAction {
                line,
                action: other.to_string(),
            })
        }
    };

    Ok(step)
}

/// Accepts `resize 375 667` as well as `resize 375x667`.
fn parse_dimensions(line: usize, raw: &str, args: &[String]) -> Result<(u32, u32), ParseError> {
    let invalid = || ParseError::InvalidSyntax {
        line,
        text: raw.trim().to_string(),
    };
    let (width, height) = match args {
        [combined] => combined.split_once('x').ok_or_else(invalid)?,
        [width, height] => (width.as_str(), height.as_str()),
        [] => {
            return Err(ParseError::MissingValue {
                line,
                what: "width and height",
            })
        }
        _ => return Err(invalid()),
    };
    let width = width.trim().parse().map_err(|_| invalid())?;
    let height = height.trim().parse().map_err(|_| invalid())?;
    Ok((width, height))
}

/// Strip the trailing `{` from a block header.
fn block_header<'t>(line: usize, raw: &str, tokens: &'t [String]) -> Result<&'t [String], ParseError> {
    match tokens.split_last() {
        Some((last, rest)) if last == "{" => Ok(rest),
        _ => Err(ParseError::InvalidSyntax {
            line,
            text: raw.trim().to_string(),
        }),
    }
}

fn tokenize(line: usize, raw: &str) -> Result<Vec<String>, ParseError> {
    shell_words::split(raw.trim()).map_err(|_| ParseError::InvalidSyntax {
        line,
        text: raw.trim().to_string(),
    })
}

fn next_non_empty<'a, I>(lines: &mut I) -> Option<(usize, &'a str)>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    for (idx, line) in lines.by_ref() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }
        return Some((idx, line));
    }
    None
}
