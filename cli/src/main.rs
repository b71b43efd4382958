mod test_runner;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::info;
use tracing_subscriber::EnvFilter;

use renderer::{
    DiagnosticError, HandlerRegistry, KeyValueStore, PositionalPolicy, RenderOptions,
};

const SUBCOMMANDS: &[&str] = &["render", "check", "test", "help"];

#[derive(Parser)]
#[command(
    name = "cst",
    version,
    about = "Command shell template renderer",
    long_about = "Renders a line-oriented template into a text file, using CSV files as data \
                  sources. Block definitions inside the template name the CSV files to read: \
                  `(block-start;type:foreach;source:<path>)` ... `(block-end)` repeats its rows \
                  once per record with `{0}`, `{1}`, ... replaced by the record's cells, and \
                  `(store;source:<path>)` loads a two-column key-value file whose values replace \
                  `{{key}}` tokens in every later line."
)]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log parser and template engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template to an output file (default)
    Render(RenderArgs),

    /// Parse and lint a template without rendering it
    Check(CheckArgs),

    /// Run .test.txt fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Template file to render
    #[arg(short, long, default_value = "source.txt")]
    input: PathBuf,

    /// Output file (`-` for stdout)
    #[arg(short, long, default_value = "output.txt")]
    output: PathBuf,

    /// Two-column CSV file loaded as the key-value store before rendering
    #[arg(short = 'k', long = "store")]
    store: Option<PathBuf>,

    /// Directory that relative CSV sources are resolved against
    /// [default: the template's directory]
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Fail on `{i}` tokens past the end of a record instead of leaving them
    #[arg(long)]
    strict_positional: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Template file to check
    file: PathBuf,

    /// Print every block definition
    #[arg(long)]
    blocks: bool,

    /// Print the block definitions as JSON
    #[arg(long, conflicts_with = "blocks")]
    json: bool,

    /// Directory that relative CSV sources are resolved against
    #[arg(long)]
    base_dir: Option<PathBuf>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.txt file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `cst -i a.txt -o b.txt` means `cst render -i a.txt -o b.txt`.
    let mut args: Vec<String> = std::env::args().collect();
    let first = args
        .iter()
        .skip(1)
        .position(|a| !matches!(a.as_str(), "--no-color" | "-v" | "--verbose"))
        .map(|p| p + 1);
    let needs_render = match first.map(|p| args[p].as_str()) {
        None => true,
        Some(arg) => {
            !SUBCOMMANDS.contains(&arg) && !matches!(arg, "-h" | "--help" | "-V" | "--version")
        }
    };
    if needs_render {
        args.insert(first.unwrap_or(args.len()), "render".to_string());
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);

    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    match cli.command {
        Command::Render(render_args) => do_render(render_args, color_choice),
        Command::Check(check_args) => do_check(check_args, color_choice),
        Command::Test(test_args) => {
            if test_args.list_categories {
                test_runner::list_categories(&test_args.path);
                return;
            }
            let exit_code =
                test_runner::run_tests(&test_args.path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// A template loaded into the codespan file database.
struct LoadedTemplate {
    files: SimpleFiles<String, String>,
    template: cst::Template,
}

/// Read and parse a template, printing a diagnostic and exiting on failure.
fn load_template(path: &Path, color_choice: ColorChoice) -> LoadedTemplate {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(path.display().to_string(), source.clone());

    info!(input = %path.display(), "parsing template");
    let parser = cst::parser::Parser::new(source, file_id);
    match parser.parse() {
        Ok(template) => {
            info!(blocks = template.blocks.len(), "parsing done");
            LoadedTemplate { files, template }
        }
        Err(error) => {
            let writer = StandardStream::stderr(color_choice);
            let config = term::Config::default();
            let _ = term::emit_to_write_style(
                &mut writer.lock(),
                &config,
                &files,
                &error.to_diagnostic(),
            );
            process::exit(1);
        }
    }
}

fn base_dir_for(template: &Path, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        template
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

fn do_render(args: RenderArgs, color_choice: ColorChoice) {
    let LoadedTemplate { files, template } = load_template(&args.input, color_choice);

    let initial_store = args.store.as_deref().map(|path| match KeyValueStore::load(path) {
        Ok(loaded) => {
            for line in &loaded.skipped_lines {
                eprintln!(
                    "warning: '{}' line {}: key-value row needs two cells, row skipped",
                    path.display(),
                    line
                );
            }
            loaded.store
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    });

    let options = RenderOptions {
        base_dir: base_dir_for(&args.input, args.base_dir),
        positional_policy: if args.strict_positional {
            PositionalPolicy::Strict
        } else {
            PositionalPolicy::Lenient
        },
        initial_store,
    };

    let mut output: Box<dyn Write> = if args.output.as_os_str() == "-" {
        Box::new(io::stdout().lock())
    } else {
        match File::create(&args.output) {
            Ok(file) => Box::new(BufWriter::new(file)),
            Err(e) => {
                eprintln!("error: cannot create '{}': {}", args.output.display(), e);
                process::exit(1);
            }
        }
    };

    info!(output = %args.output.display(), "rendering");
    let result = renderer::render_template_with(
        &template,
        &mut output,
        &options,
        &HandlerRegistry::builtin(),
    );
    // Close the output before reporting, so a failed run still leaves
    // whatever was written so far.
    drop(output);

    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    match result {
        Ok(warnings) => {
            emit_diagnostics(&writer, &config, &files, &warnings);
        }
        Err(error) => {
            emit_diagnostic_error(&writer, &config, &files, &error);
            process::exit(1);
        }
    }
}

fn do_check(args: CheckArgs, color_choice: ColorChoice) {
    let LoadedTemplate { files, template } = load_template(&args.file, color_choice);

    if args.json {
        match serde_json::to_string_pretty(&template) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: cannot serialize blocks: {}", e);
                process::exit(1);
            }
        }
    }

    if args.blocks {
        print_blocks(&template);
    }

    let options = RenderOptions::with_base_dir(base_dir_for(&args.file, args.base_dir));
    let findings = renderer::lint_template(&template, &HandlerRegistry::builtin(), &options);

    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    emit_diagnostics(&writer, &config, &files, &findings);

    let errors = findings.iter().filter(|d| !d.is_warning).count();
    if errors > 0 {
        eprintln!("{}: {} error(s)", args.file.display(), errors);
        process::exit(1);
    }
    eprintln!(
        "ok: {} is valid ({} blocks)",
        args.file.display(),
        template.blocks.len()
    );
}

fn print_blocks(template: &cst::Template) {
    for (index, block) in template.blocks.iter().enumerate() {
        println!("#{} [{}] line {}", index, block.kind, block.line);
        if let Some(source) = &block.source {
            println!("   source: {}", source);
        }
        for field in &block.fields {
            println!("   field:  {}:{}", field.name, field.value);
        }
        for (i, row) in block.rows.iter().enumerate() {
            println!("   {:>4} | {}", i, row);
        }
    }
}

fn emit_diagnostic_error(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    error: &DiagnosticError,
) {
    if let Some(span) = &error.span {
        let severity = if error.is_warning {
            Severity::Warning
        } else {
            Severity::Error
        };
        let diagnostic = Diagnostic::new(severity)
            .with_message(error.to_string())
            .with_labels(vec![Label::primary(error.source_id, span.clone())]);
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
    } else {
        let prefix = if error.is_warning { "warning" } else { "error" };
        eprintln!("{}: {}", prefix, error);
    }
}

fn emit_diagnostics(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    diagnostics: &[DiagnosticError],
) {
    for diag in diagnostics {
        emit_diagnostic_error(writer, config, files, diag);
    }
}
