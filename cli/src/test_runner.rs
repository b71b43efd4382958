use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use renderer::{DiagnosticError, HandlerRegistry, KeyValueStore, PositionalPolicy, RenderOptions};

const FIXTURE_SUFFIX: &str = ".test.txt";

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning's span must start on this 1-based template line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Expected exact output.
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected error: the parse or render error message must contain this.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the template must fail to parse.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,

    /// Render with the strict positional policy.
    #[serde(default)]
    pub strict_positional: bool,

    /// Key-value CSV preloaded before rendering, relative to the fixture.
    #[serde(default)]
    pub store: Option<String>,
}

/// Split a fixture into its TOML frontmatter and the template below it.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---\r\n")
        .or_else(|| content.strip_prefix("---\n"))
        .ok_or("missing opening --- frontmatter delimiter")?;

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let template = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, template))
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    /// `None` on success, the failure reason otherwise.
    pub failure: Option<String>,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_suffix(FIXTURE_SUFFIX))
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let (description, failure) = match std::fs::read_to_string(path) {
        Err(e) => (None, Some(format!("cannot read file: {}", e))),
        Ok(content) => match parse_test_file(&content) {
            Err(e) => (None, Some(format!("frontmatter error: {}", e))),
            Ok((config, template)) => {
                let base_dir = path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| PathBuf::from("."));
                (
                    config.description.clone(),
                    check_fixture(&config, template, base_dir).err(),
                )
            }
        },
    };

    TestResult {
        path: path.to_path_buf(),
        description,
        failure,
    }
}

/// Render one fixture and compare against its expectations.
fn check_fixture(config: &TestConfig, source: &str, base_dir: PathBuf) -> Result<(), String> {
    let parse_result = cst::parser::Parser::new(source.to_string(), 0).parse();

    let template = match (parse_result, config.expect_parse_error) {
        (Err(e), true) => return expect_error_message(config, &e.to_string()),
        (Ok(_), true) => return Err("expected parse error, but parsing succeeded".into()),
        (Err(e), false) => return Err(format!("unexpected parse error: {}", e)),
        (Ok(template), false) => template,
    };

    let initial_store = match &config.store {
        Some(store) => Some(
            KeyValueStore::load(&base_dir.join(store))
                .map_err(|e| format!("cannot load store: {}", e))?
                .store,
        ),
        None => None,
    };
    let options = RenderOptions {
        base_dir,
        positional_policy: if config.strict_positional {
            PositionalPolicy::Strict
        } else {
            PositionalPolicy::Lenient
        },
        initial_store,
    };

    let mut output = Vec::new();
    let result = renderer::render_template_with(
        &template,
        &mut output,
        &options,
        &HandlerRegistry::builtin(),
    );

    let warnings = match (result, &config.expect_error) {
        (Err(err), Some(_)) => return expect_error_message(config, &err.to_string()),
        (Err(err), None) => return Err(format!("unexpected render error: {}", err)),
        (Ok(_), Some(expected)) => {
            return Err(format!(
                "expected error containing \"{}\", but rendering succeeded",
                expected
            ));
        }
        (Ok(warnings), None) => warnings,
    };

    if let Some(expected) = &config.expect_output {
        let actual = String::from_utf8_lossy(&output);
        if actual != expected.as_str() {
            return Err(format!(
                "output mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    if let Some(expected) = &config.expect_warnings {
        check_warnings(source, &warnings, expected)?;
    }

    Ok(())
}

fn expect_error_message(config: &TestConfig, actual: &str) -> Result<(), String> {
    match &config.expect_error {
        Some(expected) if !actual.contains(expected.as_str()) => Err(format!(
            "expected error containing \"{}\", got: {}",
            expected, actual
        )),
        _ => Ok(()),
    }
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

fn check_warnings(
    source: &str,
    diagnostics: &[DiagnosticError],
    expected: &[ExpectedWarning],
) -> Result<(), String> {
    let actual: Vec<&DiagnosticError> = diagnostics.iter().filter(|d| d.is_warning).collect();

    if actual.len() != expected.len() {
        let listed: Vec<String> = actual.iter().map(|w| format!("    - {}", w)).collect();
        return Err(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            actual.len(),
            if listed.is_empty() {
                "    (none)".to_string()
            } else {
                listed.join("\n")
            }
        ));
    }

    for (i, (warning, want)) in actual.iter().zip(expected).enumerate() {
        let msg = warning.to_string();
        if !msg.contains(&want.contains) {
            return Err(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, want.contains, msg
            ));
        }

        let Some(want_line) = want.line else {
            continue;
        };
        let got_line = warning
            .span
            .as_ref()
            .map(|span| byte_offset_to_line(source, span.start));
        if got_line != Some(want_line) {
            return Err(format!(
                "warning[{}]: expected on line {}, got {:?}",
                i, want_line, got_line
            ));
        }
    }

    Ok(())
}

/// Fixture files grouped by category (directory relative to `root`, "" for
/// `root` itself). Sorted by category, then by path.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(FIXTURE_SUFFIX));
        if is_fixture {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(cat), files.len());
    }
}

/// ANSI styling for the report, or plain text.
struct Palette {
    color: bool,
}

impl Palette {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }
}

/// Pick which categories to run. An empty request runs everything.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let req = request.trim_matches('/');
        let matched = matching_categories(all, req);
        if matched.is_empty() {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                available.join(", ")
            );
        }
        selected.extend(matched);
    }
    selected
}

/// Categories equal to `req` or nested below it.
fn matching_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    req: &str,
) -> Vec<(&'a str, &'a Vec<PathBuf>)> {
    let prefix = format!("{}/", req);
    all.iter()
        .filter(|(cat, _)| cat.as_str() == req || cat.starts_with(&prefix))
        .map(|(cat, files)| (cat.as_str(), files))
        .collect()
}

/// Run all fixtures under `path` (or a single file).
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let palette = Palette { color: !no_color };

    let all: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover_categorized(path)
    };
    if all.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return 1;
    }

    let selected = select_categories(&all, categories);
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &selected {
        eprintln!();
        eprintln!("{}", palette.bold(category_label(cat)));

        for file in *files {
            let result = run_single_test(file);
            if result.failure.is_none() {
                passed += 1;
                eprintln!("  {}  {}", palette.pass(), result.label());
            } else {
                eprintln!("  {}  {}", palette.fail(), result.label());
                failures.push(result);
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            for line in f.failure.as_deref().unwrap_or_default().lines() {
                eprintln!("  {}", line);
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", palette.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            palette.paint("31", "FAILED"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}
