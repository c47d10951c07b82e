//! Command-line interface for codelens.

use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use crate::aggregate::{self, ProjectSummary};
use crate::analysis::{display_path, load_sql_dump, Pipeline, PipelineOptions};
use crate::chunk::{ContentChunker, TiktokenTokenizer, Tokenizer};
use crate::config::{self, Config};
use crate::insights;
use crate::report::{self, ReportFormat};
use crate::selection::{run_menu, ExclusionPolicy, MenuOutcome, SelectionStore, SelectionTree};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Template written by `codelens init`.
const CONFIG_TEMPLATE: &str = include_str!("templates/codelens.yaml");

/// Bounded, LLM-friendly digests of source trees.
///
/// codelens walks a project, lets you pick which files to include, analyzes
/// them with per-language parsers and writes a compact report. With `--full`
/// it also exports the raw files split into chunks that fit a token budget.
#[derive(Parser)]
#[command(name = "codelens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a project and write a report
    #[command(visible_alias = "run")]
    Analyze(AnalyzeArgs),
    /// Write a commented config file
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Project directory to analyze
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Output directory (default: from config, `.codelens`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format: txt or json
    #[arg(short, long)]
    pub format: Option<String>,

    /// Also export full file contents as token-bounded chunks
    #[arg(long)]
    pub full: bool,

    /// Token budget per exported chunk
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Extra exclusion patterns (repeatable)
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// JSON dump of database objects to include
    #[arg(long)]
    pub sql_objects: Option<PathBuf>,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to keep the saved selection (default: user data directory)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Choose files interactively before analyzing
    #[arg(short, long)]
    pub interactive: bool,

    /// Ignore the saved selection and do not save a new one
    #[arg(long)]
    pub no_state: bool,

    /// Analyze files sequentially
    #[arg(long)]
    pub no_parallel: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "codelens.yaml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Settings for one analyze run after config and flags are combined.
struct RunSettings {
    root: PathBuf,
    config: Config,
    output: PathBuf,
    format: ReportFormat,
    max_tokens: usize,
}

fn resolve_settings(args: &AnalyzeArgs) -> anyhow::Result<RunSettings> {
    let root = args
        .path
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("cannot access path {:?}: {}", args.path, e))?;
    if !root.is_dir() {
        anyhow::bail!("not a directory: {}", root.display());
    }

    let (mut config, config_path) = Config::load(args.config.as_deref(), &root)?;
    match &config_path {
        Some(p) => info!(config = %p.display(), "loaded config"),
        None => debug!("no config file found, using defaults"),
    }

    if let Some(format) = &args.format {
        config.format = format.clone();
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens = max_tokens;
    }
    if args.no_parallel {
        config.parallel = false;
    }
    config::validate(&config)?;

    let output = match &args.output {
        Some(p) => p.clone(),
        None if config.output.is_absolute() => config.output.clone(),
        None => root.join(&config.output),
    };
    let format = ReportFormat::parse(&config.format)?;
    let max_tokens = config.max_tokens;

    Ok(RunSettings {
        root,
        config,
        output,
        format,
        max_tokens,
    })
}

/// Exclusion pattern for the output directory when it lives inside the root.
fn output_exclusion(root: &Path, output: &Path) -> Option<String> {
    let absolute = if output.is_absolute() {
        output.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(output)
    };
    let rel = absolute.strip_prefix(root).ok()?;
    let key = display_path(rel);
    (!key.is_empty()).then_some(key)
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let settings = match resolve_settings(args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let root = settings.root.as_path();

    // Build the selection tree
    let mut extra = args.exclude.clone();
    extra.extend(output_exclusion(root, &settings.output));
    let policy = ExclusionPolicy::from_config(root, &settings.config, &extra)?;
    let mut tree = SelectionTree::build(root, policy)?;

    let store = if args.no_state {
        None
    } else {
        match &args.state_file {
            Some(p) => Some(SelectionStore::new(p)),
            None => SelectionStore::for_root(root),
        }
    };

    if let Some(store) = &store {
        let restored = store.restore(&mut tree);
        if restored.applied > 0 || !restored.dropped.is_empty() {
            info!(
                applied = restored.applied,
                dropped = restored.dropped.len(),
                "restored saved selection"
            );
        }
    }

    if args.interactive {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        if run_menu(&mut tree, stdin.lock(), &mut stdout)? == MenuOutcome::Aborted {
            eprintln!("Selection aborted, nothing analyzed");
            return Ok(EXIT_FAILED);
        }
        if let Some(store) = &store {
            if let Err(e) = store.persist(&tree) {
                warn!(error = %e, "could not save selection");
            }
        }
    }

    let paths: Vec<PathBuf> = tree.included_paths().map(Path::to_path_buf).collect();
    let sql_dump = match &args.sql_objects {
        Some(p) => load_sql_dump(p)?,
        None => Vec::new(),
    };
    if paths.is_empty() && sql_dump.is_empty() {
        eprintln!("Warning: no files selected");
        return Ok(EXIT_SUCCESS);
    }

    // Analyze and aggregate
    let pipeline = Pipeline::new(root).with_options(PipelineOptions {
        parallel: settings.config.parallel,
        progress: true,
        complex_function_lines: settings.config.insights.complex_function_lines,
    });
    let output = pipeline.run(&paths[..]);
    if !output.unsupported.is_empty() {
        debug!(count = output.unsupported.len(), "skipped unsupported files");
    }
    if !output.binary.is_empty() {
        debug!(count = output.binary.len(), "skipped binary files");
    }

    let summary = summarize(output.records, sql_dump);
    let insights = insights::generate(&summary, &settings.config.insights);

    // Write the report
    report::clear_previous(&settings.output)?;
    let report_path = report::write_report(&settings.output, settings.format, &summary, &insights)?;

    let mut exports = Vec::new();
    if args.full {
        let tokenizer = TiktokenTokenizer::cl100k();
        let chunker = match &tokenizer {
            Ok(t) => ContentChunker::new(t as &dyn Tokenizer),
            Err(e) => {
                warn!(error = %e, "tokenizer unavailable, using approximate token counts");
                ContentChunker::approximate()
            }
        };

        exports.push(report::export_files(
            root,
            &paths[..],
            &settings.output,
            &chunker,
            settings.max_tokens,
        )?);
        exports.push(report::export_sql(
            summary.sql_objects(),
            &settings.output,
            &chunker,
            settings.max_tokens,
        )?);
    }

    let export_refs: Vec<_> = exports.iter().collect();
    report::print_run_summary(root, &report_path, &summary, &insights, &export_refs);

    Ok(EXIT_SUCCESS)
}

/// Merge analyzed records with the objects from a SQL dump.
///
/// Dump objects that duplicate an object found in a `.sql` file are dropped
/// with a warning.
fn summarize(
    records: Vec<aggregate::AnalysisRecord>,
    sql_dump: Vec<aggregate::SqlObjectAnalysis>,
) -> ProjectSummary {
    let mut aggregator = aggregate::Aggregator::new();
    for record in records {
        aggregator.push(record);
    }
    for obj in sql_dump {
        aggregator.push(aggregate::AnalysisRecord::Sql(obj));
    }
    aggregator.finish()
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Use --force to overwrite it or --output to pick another path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, CONFIG_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!("  2. Run: codelens analyze . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}
