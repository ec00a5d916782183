mod config;
mod logging;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use typemap_core::{
    Conflict, MergeOutcome, MergeReport, Rule, Typemap, ValidationError, detect_conflicts,
    merge_template, parse_indexed_record, parse_template, parse_typemap_text, render_line,
    render_spec, resolve, validate_rules,
};

use crate::config::{CliConfig, OutputFormat};
use crate::logging::{LogConfig, init_logging};

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Text,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(fmt: CliOutputFormat) -> Self {
        match fmt {
            CliOutputFormat::Json => Self::Json,
            CliOutputFormat::Yaml => Self::Yaml,
            CliOutputFormat::Text => Self::Text,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "typemap")]
#[command(about = "Inspect, check and merge version-control typemaps")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// YAML config file (default: .typemap.yml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Match paths case-insensitively, overriding the config file.
    #[arg(long, global = true)]
    ignore_case: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a typemap and print its rules.
    Parse(ParseArgs),
    /// Validate rules and report which ones are overridden or duplicated.
    Check(CheckArgs),
    /// Show which rule assigns the filetype for each depot path.
    TestPath(TestPathArgs),
    /// Merge template rules into a typemap.
    Merge(MergeArgs),
    /// Rewrite a typemap in normalized spec form.
    Format(FormatArgs),
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Typemap file, or `-` for stdin.
    input: PathBuf,
    /// Treat the input as a JSON object with `TypeMap<i>` keys.
    /// Detected automatically when the input starts with `{`.
    #[arg(long)]
    record: bool,
}

#[derive(Debug, Args)]
struct ParseArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output format (default: from config, else text).
    #[arg(long)]
    format: Option<CliOutputFormat>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Fail on advisory problems too, not only on unwritable rules.
    #[arg(long)]
    strict: bool,
    /// Output format (default: from config, else text).
    #[arg(long)]
    format: Option<CliOutputFormat>,
}

#[derive(Debug, Args)]
struct TestPathArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Depot paths to resolve.
    #[arg(required = true)]
    paths: Vec<String>,
    /// Output format (default: from config, else text).
    #[arg(long)]
    format: Option<CliOutputFormat>,
}

#[derive(Debug, Args)]
struct MergeArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Template file containing a `TypeMap:` section.
    #[arg(long)]
    template: PathBuf,
    /// Write the merged spec to this file.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Output format for the merge report (default: from config, else text).
    #[arg(long)]
    format: Option<CliOutputFormat>,
}

#[derive(Debug, Args)]
struct FormatArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Write to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose));

    let result = load_config(&cli).and_then(|config| match cli.command {
        Command::Parse(args) => run_parse(args, &config),
        Command::Check(args) => run_check(args, &config),
        Command::TestPath(args) => run_test_path(args, &config),
        Command::Merge(args) => run_merge(args, &config),
        Command::Format(args) => run_format(args),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<CliConfig, String> {
    let mut config = CliConfig::resolve(cli.config.as_deref()).map_err(|err| err.to_string())?;
    if cli.ignore_case {
        config.matching.case_sensitive = false;
    }
    debug!(?config, "Resolved configuration");
    Ok(config)
}

// ---------------------------------------------------------------------------
// Input and output helpers
// ---------------------------------------------------------------------------

fn read_text(path: &Path) -> Result<String, String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|err| format!("Failed to read stdin: {err}"))?;
        return Ok(text);
    }
    fs::read_to_string(path).map_err(|err| format!("Failed to read '{}': {err}", path.display()))
}

fn load_rules(args: &InputArgs) -> Result<Vec<Rule>, String> {
    let text = read_text(&args.input)?;
    let rules = if args.record || text.trim_start().starts_with('{') {
        let record: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)
            .map_err(|err| format!("Failed to parse record '{}': {err}", args.input.display()))?;
        parse_indexed_record(
            record
                .iter()
                .filter_map(|(key, value)| value.as_str().map(|value| (key.as_str(), value))),
        )
    } else {
        parse_typemap_text(&text)
    };
    info!(input = %args.input.display(), rules = rules.len(), "Loaded typemap");
    Ok(rules)
}

fn output_format(flag: Option<CliOutputFormat>, config: &CliConfig) -> OutputFormat {
    flag.map(OutputFormat::from).unwrap_or(config.output.format)
}

/// Prints `value` as JSON or YAML. Returns `false` for text output, which
/// each command renders itself.
fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<bool, String> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| format!("Failed to serialize output: {e}"))?;
            println!("{json}");
            Ok(true)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(value)
                .map_err(|e| format!("Failed to serialize output: {e}"))?;
            print!("{yaml}");
            Ok(true)
        }
        OutputFormat::Text => Ok(false),
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<(), String> {
    match path {
        Some(path) => {
            fs::write(path, text)
                .map_err(|err| format!("Failed to write '{}': {err}", path.display()))?;
            info!(output = %path.display(), "Wrote typemap spec");
            Ok(())
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

fn run_parse(args: ParseArgs, config: &CliConfig) -> Result<(), String> {
    let rules = load_rules(&args.input)?;
    if !print_structured(&rules, output_format(args.format, config))? {
        for rule in &rules {
            println!("{:>4}  {}", rule.order, render_line(rule));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Finding {
    blocking: bool,
    message: String,
}

impl From<&ValidationError> for Finding {
    fn from(err: &ValidationError) -> Self {
        Self {
            blocking: err.is_blocking(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RuleConflicts<'a> {
    order: u32,
    filetype: &'a str,
    pattern: &'a str,
    conflicts: Vec<Conflict>,
}

#[derive(Debug, Serialize)]
struct CheckOutput<'a> {
    rules: usize,
    findings: Vec<Finding>,
    conflicts: Vec<RuleConflicts<'a>>,
}

fn run_check(args: CheckArgs, config: &CliConfig) -> Result<(), String> {
    let rules = load_rules(&args.input)?;
    let findings: Vec<Finding> = validate_rules(&rules).iter().map(Finding::from).collect();

    let mut report = detect_conflicts(&rules, &config.matching);
    let conflicts: Vec<RuleConflicts<'_>> = rules
        .iter()
        .filter_map(|rule| {
            let conflicts = report.remove(&rule.id)?;
            Some(RuleConflicts {
                order: rule.order,
                filetype: &rule.filetype,
                pattern: &rule.pattern,
                conflicts,
            })
        })
        .collect();

    let output = CheckOutput {
        rules: rules.len(),
        findings,
        conflicts,
    };
    if !print_structured(&output, output_format(args.format, config))? {
        print_check_text(&output);
    }

    let blocking = output.findings.iter().filter(|f| f.blocking).count();
    let failing = if args.strict {
        output.findings.len()
    } else {
        blocking
    };
    if failing > 0 {
        return Err(format!("{failing} problem(s) found ({blocking} blocking)"));
    }
    Ok(())
}

fn print_check_text(output: &CheckOutput<'_>) {
    for finding in &output.findings {
        let label = if finding.blocking { "error" } else { "warning" };
        println!("{label}: {}", finding.message);
    }
    for entry in &output.conflicts {
        for conflict in &entry.conflicts {
            println!(
                "rule {} ({} {}) {conflict}",
                entry.order, entry.filetype, entry.pattern
            );
        }
    }
    println!(
        "{} rules, {} findings, {} rules with conflicts",
        output.rules,
        output.findings.len(),
        output.conflicts.len()
    );
}

// ---------------------------------------------------------------------------
// test-path
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Resolution<'a> {
    path: &'a str,
    filetype: Option<&'a str>,
    order: Option<u32>,
    pattern: Option<&'a str>,
}

fn run_test_path(args: TestPathArgs, config: &CliConfig) -> Result<(), String> {
    let rules = load_rules(&args.input)?;
    let resolutions: Vec<Resolution<'_>> = args
        .paths
        .iter()
        .map(|path| {
            let rule = resolve(path, &rules, &config.matching);
            Resolution {
                path,
                filetype: rule.map(|rule| rule.filetype.as_str()),
                order: rule.map(|rule| rule.order),
                pattern: rule.map(|rule| rule.pattern.as_str()),
            }
        })
        .collect();

    if !print_structured(&resolutions, output_format(args.format, config))? {
        for resolution in &resolutions {
            match (resolution.filetype, resolution.order, resolution.pattern) {
                (Some(filetype), Some(order), Some(pattern)) => {
                    println!("{}\t{filetype}\t(rule {order}: {pattern})", resolution.path);
                }
                _ => println!("{}\t(no match)", resolution.path),
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

fn run_merge(args: MergeArgs, config: &CliConfig) -> Result<(), String> {
    let mut typemap = Typemap::from_rules(load_rules(&args.input)?);
    let template_text = read_text(&args.template)?;
    let template = parse_template(Some(&template_text)).map_err(|err| {
        format!("Failed to load template '{}': {err}", args.template.display())
    })?;

    let report = merge_template(&mut typemap, &template);
    if let Some(output) = args.output.as_deref() {
        let spec = render_spec(typemap.rules()).map_err(|err| err.to_string())?;
        write_output(Some(output), &spec)?;
    }

    if !print_structured(&report, output_format(args.format, config))? {
        print_merge_text(&report);
    }
    Ok(())
}

fn print_merge_text(report: &MergeReport) {
    for entry in &report.entries {
        let outcome = match &entry.outcome {
            MergeOutcome::Added { .. } => "added".to_string(),
            MergeOutcome::Skipped { reason } => format!("skipped ({reason})"),
            MergeOutcome::Conflict {
                existing_filetype, ..
            } => format!("conflict (existing: {existing_filetype})"),
        };
        println!("{}\t{}\t{outcome}", entry.filetype, entry.pattern);
    }
    println!("{}", report.summary());
}

// ---------------------------------------------------------------------------
// format
// ---------------------------------------------------------------------------

fn run_format(args: FormatArgs) -> Result<(), String> {
    let rules = load_rules(&args.input)?;
    let spec = render_spec(&rules).map_err(|err| err.to_string())?;
    write_output(args.output.as_deref(), &spec)
}
