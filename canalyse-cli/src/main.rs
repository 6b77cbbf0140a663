//! canalyse CLI - metrix++ exports to HTML reports, data files and tagged CSV

#![deny(warnings)]

// Global invariants enforced:
// - Fatal errors abort before any output file is touched where possible
// - Exit code is non-zero on every fatal error

use anyhow::Context;
use canalyse_core::config::{self, ResolvedConfig, Verbosity};
use canalyse_core::tags::{apply_plan, TagPlan, TagRequest, TagTable};
use canalyse_core::{generate_distributions, generate_report, read_csv_file, read_view_file};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "canalyse")]
#[command(about = "Turn metrix++ exports into HTML reports and JavaScript data files")]
#[command(version = env!("CANALYSE_VERSION"))]
struct Cli {
    /// No output except in case of error
    #[arg(long, global = true, conflicts_with = "verbose")]
    silent: bool,

    /// More elaborate output
    #[arg(long, global = true)]
    verbose: bool,

    /// Path to config file (default: auto-discover)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate source pages and the combined data file from a `metrix++ export` CSV
    Report(ReportArgs),
    /// Generate distribution charts from a `metrix++ view --format=python` dump
    View(ViewArgs),
    /// Add, remove or rename tags in the `tag` column of a CSV export
    ///
    /// All adds run first, then all removes, then all changes. Operations
    /// are NOT applied in command-line order across those groups.
    Tag(TagArgs),
    /// Validate or show the configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// CSV export to read (default: <data-dir>/<module-base>.csv)
    csv: Option<PathBuf>,

    /// Directory containing the source code root folder
    #[arg(short = 's', long)]
    src_path: Option<String>,

    /// Name of the source code root folder
    #[arg(short = 'm', long)]
    module_base: Option<String>,

    /// Directory for data files
    #[arg(short = 'd', long)]
    data_dir: Option<PathBuf>,

    /// Output directory of the generated HTML files
    #[arg(short = 'r', long)]
    report_dir: Option<PathBuf>,

    /// Location where the highlight package is installed
    #[arg(short = 'i', long, alias = "installdir")]
    highlight_dir: Option<PathBuf>,

    /// Stylesheet used for syntax highlighting, relative to the highlight dir
    #[arg(short = 'c', long)]
    highlight_css: Option<String>,

    /// Directory containing the generic style.css
    #[arg(short = 'y', long)]
    style_dir: Option<PathBuf>,

    /// Dict literal mapping criteria to labels, e.g. "{'std.code.lines.code': 'lines of code'}"
    #[arg(short = 'l', long)]
    criteria_labels: Option<String>,

    /// Generate only the JavaScript data file
    #[arg(long)]
    gen_datafile_only: bool,
}

#[derive(Args)]
struct ViewArgs {
    /// View dump to read (default: <data-dir>/<module-base>.py)
    in_file: Option<PathBuf>,

    /// Name of the source code root folder
    #[arg(short = 'm', long)]
    module_base: Option<String>,

    /// Directory for data files
    #[arg(short = 'd', long)]
    data_dir: Option<PathBuf>,

    /// Output directory of the generated HTML files
    #[arg(short = 'r', long)]
    report_dir: Option<PathBuf>,

    /// Directory containing the generic style.css
    #[arg(short = 'y', long)]
    style_dir: Option<PathBuf>,

    /// Dict literal mapping criteria to labels or styles
    /// ({'label', 'background-color', 'border-color', 'index'})
    #[arg(short = 'l', long)]
    criteria_labels: Option<String>,

    /// Generate only the JavaScript data files
    #[arg(long)]
    gen_datafile_only: bool,

    /// URL of chart.min.js
    #[arg(short = 'c', long)]
    chart_js: Option<String>,

    /// Width of the chart canvas
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u32).range(1..))]
    diagram_width: Option<u32>,

    /// Height of the chart canvas
    #[arg(short = 't', long, value_parser = clap::value_parser!(u32).range(1..))]
    diagram_height: Option<u32>,
}

#[derive(Args)]
struct TagArgs {
    /// CSV export to edit
    csv: PathBuf,

    /// Add TAG to rows matching SELECTOR (SELECTOR:TAG)
    #[arg(short = 'a', long = "add", value_name = "SELECTOR:TAG")]
    add: Vec<String>,

    /// Remove TAG from rows matching SELECTOR (SELECTOR:TAG)
    #[arg(short = 'r', long = "remove", value_name = "SELECTOR:TAG")]
    remove: Vec<String>,

    /// Replace OLD by NEW in rows matching SELECTOR (SELECTOR:OLD=NEW)
    #[arg(short = 'c', long = "change", value_name = "SELECTOR:OLD=NEW")]
    change: Vec<String>,

    /// Write to this file instead of replacing the input
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without generating anything
    Validate,
    /// Show the resolved configuration (merged defaults + config file)
    Show,
}

impl ReportArgs {
    fn apply(&self, config: &mut ResolvedConfig) -> anyhow::Result<()> {
        if let Some(ref v) = self.src_path {
            config.src_path = v.clone();
        }
        if let Some(ref v) = self.module_base {
            config.module_base = v.clone();
        }
        if let Some(ref v) = self.data_dir {
            config.data_dir = v.clone();
        }
        if let Some(ref v) = self.report_dir {
            config.report_dir = v.clone();
        }
        if let Some(ref v) = self.highlight_dir {
            config.highlight_dir = v.clone();
        }
        if let Some(ref v) = self.highlight_css {
            config.highlight_css = v.clone();
        }
        if let Some(ref v) = self.style_dir {
            config.style_dir = v.clone();
        }
        if let Some(ref v) = self.criteria_labels {
            config.criteria_labels = Some(
                config::parse_criteria_labels(v)
                    .with_context(|| format!("invalid --criteria-labels: {}", v))?,
            );
        }
        if self.gen_datafile_only {
            config.gen_datafile_only = true;
        }
        Ok(())
    }
}

impl ViewArgs {
    fn apply(&self, config: &mut ResolvedConfig) -> anyhow::Result<()> {
        if let Some(ref v) = self.module_base {
            config.module_base = v.clone();
        }
        if let Some(ref v) = self.data_dir {
            config.data_dir = v.clone();
        }
        if let Some(ref v) = self.report_dir {
            config.report_dir = v.clone();
        }
        if let Some(ref v) = self.style_dir {
            config.style_dir = v.clone();
        }
        if let Some(ref v) = self.criteria_labels {
            config.criteria_labels = Some(
                config::parse_criteria_labels(v)
                    .with_context(|| format!("invalid --criteria-labels: {}", v))?,
            );
        }
        if self.gen_datafile_only {
            config.gen_datafile_only = true;
        }
        if let Some(ref v) = self.chart_js {
            config.chart_js = v.clone();
        }
        if let Some(v) = self.diagram_width {
            config.diagram_width = v;
        }
        if let Some(v) = self.diagram_height {
            config.diagram_height = v;
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let project_root = std::env::current_dir()?;

    if let Commands::Config { ref action } = cli.command {
        return run_config(action, &project_root, cli.config.as_deref());
    }

    let mut config = config::load_and_resolve(&project_root, cli.config.as_deref())
        .context("failed to load configuration")?;

    // CLI flags override config file values
    if cli.silent {
        config.verbosity = Verbosity::Silent;
    } else if cli.verbose {
        config.verbosity = Verbosity::Verbose;
    }
    init_logging(config.verbosity);

    if let Some(ref config_path) = config.config_path {
        log::info!("Using config: {}", config_path.display());
    }

    match cli.command {
        Commands::Report(args) => {
            args.apply(&mut config)?;
            log_parameters(&config);
            let csv_path = args.csv.unwrap_or_else(|| config.default_csv_path());
            run_report(&csv_path, &config)
        }
        Commands::View(args) => {
            args.apply(&mut config)?;
            log_parameters(&config);
            let in_file = args.in_file.unwrap_or_else(|| config.default_view_path());
            run_view(&in_file, &config)
        }
        Commands::Tag(args) => run_tag(args),
        Commands::Config { .. } => Ok(()),
    }
}

fn init_logging(verbosity: Verbosity) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", verbosity.level_filter().as_str());

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(verbosity == Verbosity::Verbose)
        .init();
}

fn log_parameters(config: &ResolvedConfig) {
    log::debug!("Parameters set as");
    log::debug!("  src_path          = {}", config.src_path);
    log::debug!("  module_base       = {}", config.module_base);
    log::debug!("  data_dir          = {}", config.data_dir.display());
    log::debug!("  report_dir        = {}", config.report_dir.display());
    log::debug!("  highlight_dir     = {}", config.highlight_dir.display());
    log::debug!("  highlight_css     = {}", config.highlight_css);
    log::debug!("  style_dir         = {}", config.style_dir.display());
    log::debug!("  gen_datafile_only = {}", config.gen_datafile_only);
}

fn run_report(csv_path: &Path, config: &ResolvedConfig) -> anyhow::Result<()> {
    let ingested = read_csv_file(csv_path)?;

    let pages = if config.gen_datafile_only {
        0
    } else {
        ingested.store.len()
    };
    let pb = page_progress(pages, config.verbosity)?;

    let summary = generate_report(&ingested, config, |filename| {
        pb.inc(1);
        pb.set_message(filename.to_string());
    });
    pb.finish_and_clear();
    let summary = summary?;

    log::info!(
        "Wrote {} page(s) and {}",
        summary.pages,
        summary.datafile.display()
    );
    Ok(())
}

/// Progress bar over written pages; hidden unless at standard verbosity
fn page_progress(total: usize, verbosity: Verbosity) -> anyhow::Result<ProgressBar> {
    if verbosity != Verbosity::Standard || total < 2 {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

fn run_view(in_file: &Path, config: &ResolvedConfig) -> anyhow::Result<()> {
    let dump = read_view_file(in_file)?;
    let summary = generate_distributions(&dump, config)?;

    log::info!(
        "{} criteria written, {} without data",
        summary.written.len(),
        summary.missing.len()
    );
    Ok(())
}

fn run_tag(args: TagArgs) -> anyhow::Result<()> {
    let mut plan = TagPlan::new();
    for arg in &args.add {
        plan.push(TagRequest::add(arg)?);
    }
    for arg in &args.remove {
        plan.push(TagRequest::remove(arg)?);
    }
    for arg in &args.change {
        plan.push(TagRequest::change(arg)?);
    }

    let mut table = TagTable::read_file(&args.csv)?;
    let applied = apply_plan(&mut table, &plan)?;

    let output = args.output.unwrap_or(args.csv);
    table.write_file(&output)?;

    log::info!(
        "{} operation(s) applied, {} row(s) written to {}",
        applied,
        table.rows().len(),
        output.display()
    );
    Ok(())
}

fn run_config(
    action: &ConfigAction,
    project_root: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Validate => {
            match config::load_and_resolve(project_root, config_path) {
                Ok(config) => {
                    if let Some(ref p) = config.config_path {
                        println!("Config valid: {}", p.display());
                    } else {
                        println!("No config file found. Using defaults.");
                    }
                }
                Err(e) => {
                    eprintln!("Config validation failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Show => {
            let resolved = config::load_and_resolve(project_root, config_path)
                .context("failed to load configuration")?;

            println!("Configuration:");
            if let Some(ref p) = resolved.config_path {
                println!("  Source: {}", p.display());
            } else {
                println!("  Source: defaults (no config file found)");
            }
            println!();
            println!("Paths:");
            println!("  src_path: {}", resolved.src_path);
            println!("  module_base: {}", resolved.module_base);
            println!("  data_dir: {}", resolved.data_dir.display());
            println!("  report_dir: {}", resolved.report_dir.display());
            println!("  highlight_dir: {}", resolved.highlight_dir.display());
            println!("  highlight_css: {}", resolved.highlight_css);
            println!("  style_dir: {}", resolved.style_dir.display());
            println!();
            println!("Output:");
            println!("  gen_datafile_only: {}", resolved.gen_datafile_only);
            println!("  verbosity: {:?}", resolved.verbosity);
            println!("  chart_js: {}", resolved.chart_js);
            println!(
                "  diagram: {}x{}",
                resolved.diagram_width, resolved.diagram_height
            );
            println!();
            println!(
                "Criteria labels ({}):",
                if resolved.criteria_labels.is_some() {
                    "custom"
                } else {
                    "default"
                }
            );
            for (criterion, label) in resolved.report_labels() {
                println!("  {}: {}", criterion, label.label());
            }
        }
    }
    Ok(())
}
