use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use template_bridge_convert::validate::describe_mismatch;
use template_bridge_convert::{
    BatchRunner, BridgeConfig, ScoreBreakdown, convert_template, export_templates, rank_templates,
    write_report,
};
use template_bridge_core::{
    Strategy, Template, TemplateFilter, TemplateFormat, TemplateRepository,
};
use template_bridge_sqlite::{Migration, TemplateStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_PREFIX: &str = "tb_";

/// CLI strategy override with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliStrategy {
    Table,
    Paragraph,
    MultiSection,
}

impl From<CliStrategy> for Strategy {
    fn from(strategy: CliStrategy) -> Self {
        match strategy {
            CliStrategy::Table => Self::Table,
            CliStrategy::Paragraph => Self::Paragraph,
            CliStrategy::MultiSection => Self::MultiSection,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFormat {
    Source,
    Target,
}

impl From<CliFormat> for TemplateFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Source => Self::Source,
            CliFormat::Target => Self::Target,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "template-bridge")]
#[command(about = "Convert state-machine parsing templates into placeholder templates")]
struct Cli {
    /// Debug logging; `match` also prints the best candidate's records.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert stored source templates in a batch.
    Convert(ConvertArgs),
    /// Convert a single template file against a sample file.
    ConvertFile(ConvertFileArgs),
    /// Rank stored templates by how well they parse some text.
    Match(MatchArgs),
    /// SQLite table migration and seeding operations.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Table prefix.
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Key filter; terms split on `_`, `-` and spaces must all appear in the key.
    #[arg(long)]
    filter: Option<String>,
    /// Comma-separated vendor prefixes (e.g. cisco,arista).
    #[arg(long)]
    vendors: Option<String>,
    /// Convert at most this many templates.
    #[arg(long)]
    limit: Option<usize>,
    /// Worker threads (default: adaptive).
    #[arg(long)]
    workers: Option<usize>,
    /// Per-template time ceiling in seconds.
    #[arg(long)]
    timeout: Option<u64>,
    /// Force one strategy instead of classifying each template.
    #[arg(long)]
    strategy: Option<CliStrategy>,
    /// Write accepted templates, sidecars and the report here.
    #[arg(long)]
    export: Option<PathBuf>,
    /// Also export templates that fell short of the acceptance threshold.
    #[arg(long)]
    include_low_confidence: bool,
    /// Store accepted templates back into the database.
    #[arg(long)]
    save: bool,
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ConvertFileArgs {
    /// Template file.
    #[arg(long)]
    template: PathBuf,
    /// Sample text the template parses.
    #[arg(long)]
    sample: PathBuf,
    /// Template format (default: from the file extension, `.ttp` is target).
    #[arg(long)]
    format: Option<CliFormat>,
    /// Force one strategy instead of classifying.
    #[arg(long)]
    strategy: Option<CliStrategy>,
    /// Write the converted template here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MatchArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Text to match; reads stdin when omitted.
    input: Option<PathBuf>,
    /// Key filter applied to the candidate templates.
    #[arg(long)]
    filter: Option<String>,
    /// Comma-separated vendor prefixes.
    #[arg(long)]
    vendors: Option<String>,
    /// Number of ranked candidates to show.
    #[arg(long, default_value_t = 5)]
    top: usize,
    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
    /// List the candidate templates without scoring.
    #[arg(long)]
    list: bool,
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(subcommand)]
    operation: MigrateOperation,
}

#[derive(Debug, Subcommand)]
enum MigrateOperation {
    /// Create the template table.
    Up(StoreArgs),
    /// Drop the template table.
    Down(StoreArgs),
    /// Upsert `.textfsm` and `.ttp` files from a directory.
    Seed(MigrateSeedArgs),
    /// Drop, recreate, and reseed from a directory.
    Refresh(MigrateSeedArgs),
    /// Show table status.
    Status(StoreArgs),
}

#[derive(Debug, Args)]
struct MigrateSeedArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Directory with template files and their samples.
    #[arg(long)]
    source: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Convert(args) => run_convert(args),
        Command::ConvertFile(args) => run_convert_file(args),
        Command::Match(args) => run_match(args, cli.verbose),
        Command::Migrate(args) => run_migrate(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_convert(args: ConvertArgs) -> Result<(), String> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(workers) = args.workers {
        config.batch.workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.batch.job_timeout_secs = timeout;
    }

    let store = open_store(&args.store)?;
    let mut filter = TemplateFilter::for_format(TemplateFormat::Source)
        .with_vendors(parse_csv_list(args.vendors))
        .with_limit(args.limit);
    if let Some(query) = &args.filter {
        filter = filter.with_query(query);
    }

    let runner = BatchRunner::new(config.conversion, config.batch);
    let result = runner
        .run_from_store(&store, &filter, args.strategy.map(Strategy::from))
        .map_err(|e| format!("Failed to read templates: {e}"))?;

    if args.save {
        let mut saved = 0usize;
        for converted in result.accepted() {
            store
                .upsert_conversion(&converted.synthesized, converted.validation.match_ratio())
                .map_err(|e| {
                    format!(
                        "Failed to store '{}': {e}",
                        converted.synthesized.template.key
                    )
                })?;
            saved += 1;
        }
        info!(saved, "stored converted templates");
    }
    store
        .close()
        .map_err(|e| format!("Failed to close database: {e}"))?;

    if let Some(dir) = &args.export {
        let summary = export_templates(dir, &result.templates, args.include_low_confidence)
            .map_err(|e| format!("Export failed: {e}"))?;
        let report_path =
            write_report(dir, &result.report).map_err(|e| format!("Report failed: {e}"))?;
        println!(
            "Exported {} templates ({} low confidence) to '{}'",
            summary.accepted + summary.low_confidence,
            summary.low_confidence,
            dir.display()
        );
        println!("Report: {}", report_path.display());
    }

    let report = &result.report;
    println!(
        "Converted {} templates in {:.2}s ({:.1}/s)",
        report.total, report.elapsed_secs, report.throughput
    );
    for (outcome, count) in report.outcome_summary() {
        println!("  {outcome}: {count}");
    }
    println!("  mean match ratio: {:.3}", report.mean_match_ratio);
    if report.abandoned > 0 {
        println!("  abandoned job threads: {}", report.abandoned);
    }
    Ok(())
}

fn run_convert_file(args: ConvertFileArgs) -> Result<(), String> {
    let config = load_config(args.config.as_deref())?;
    let body = read_file(&args.template)?;
    let sample = read_file(&args.sample)?;
    let format = match args.format {
        Some(format) => format.into(),
        None => format_from_extension(&args.template),
    };
    let key = args
        .template
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("template");

    let template = Template::new(key, format, body).with_sample(sample);
    let conversion = convert_template(
        &template,
        args.strategy.map(Strategy::from),
        &config.conversion,
    )
    .map_err(|e| format!("Conversion failed: {e}"))?;

    let mut target = conversion.synthesized.template.body.clone();
    if !target.ends_with('\n') {
        target.push('\n');
    }
    match &args.output {
        Some(path) => fs::write(path, &target)
            .map_err(|e| format!("Failed to write '{}': {e}", path.display()))?,
        None => print!("{target}"),
    }

    let validation = &conversion.validation;
    eprintln!("strategy: {}", conversion.synthesized.strategy);
    eprintln!(
        "rows: {} expected, {} parsed",
        validation.oracle_rows, validation.target_rows
    );
    eprintln!("match ratio: {:.3}", validation.match_ratio());
    if !conversion.synthesized.unanchored.is_empty() {
        eprintln!("unanchored: {}", conversion.synthesized.unanchored.join(", "));
    }
    for mismatch in validation.mismatches.iter().take(5) {
        eprintln!("  {}", describe_mismatch(mismatch));
    }
    eprintln!(
        "{}",
        if conversion.accepted {
            "accepted"
        } else {
            "low confidence"
        }
    );
    Ok(())
}

fn run_match(args: MatchArgs, verbose: bool) -> Result<(), String> {
    let config = load_config(args.config.as_deref())?;
    let store = open_store(&args.store)?;
    let mut filter = TemplateFilter::new().with_vendors(parse_csv_list(args.vendors));
    if let Some(query) = &args.filter {
        filter = filter.with_query(query);
    }
    let candidates = store
        .fetch(&filter)
        .map_err(|e| format!("Failed to read templates: {e}"))?;
    store
        .close()
        .map_err(|e| format!("Failed to close database: {e}"))?;

    if args.list {
        for template in &candidates {
            println!("{}\t{}", template.key, template.format);
        }
        return Ok(());
    }
    if candidates.is_empty() {
        return Err("No templates match the filter".to_string());
    }

    let text = read_input(args.input.as_deref())?;
    let result = rank_templates(&text, &candidates, &config.scoring);

    if args.json {
        let output = serde_json::json!({
            "best": result.best,
            "ranked": result.top(args.top),
            "failed": result.failed,
        });
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| format!("JSON serialization failed: {e}"))?;
        println!("{json}");
        return if result.best.is_some() {
            Ok(())
        } else {
            Err("No template parsed the input".to_string())
        };
    }

    let Some(best) = &result.best else {
        return Err(format!(
            "No template parsed the input ({} candidates, {} failed)",
            candidates.len(),
            result.failed.len()
        ));
    };
    println!(
        "Best match: {} ({}) score {:.1}",
        best.key, best.format, best.score.total
    );
    println!("{:>4}  {:>5}  {:>7}  Template", "Rank", "Score", "Records");
    for (rank, scored) in result.top(args.top).iter().enumerate() {
        println!(
            "{:>4}  {:>5.1}  {:>7}  {} ({})",
            rank + 1,
            scored.score.total,
            scored.records.len(),
            scored.key,
            scored.format
        );
    }
    if verbose {
        print_breakdown(&best.score);
        let records = serde_json::to_string_pretty(&best.records)
            .map_err(|e| format!("JSON serialization failed: {e}"))?;
        println!("{records}");
    }
    Ok(())
}

fn print_breakdown(score: &ScoreBreakdown) {
    println!(
        "  records {:.1}, fields {:.1}, population {:.1}, consistency {:.1}",
        score.records, score.fields, score.population, score.consistency
    );
}

fn run_migrate(args: MigrateArgs) -> Result<(), String> {
    match args.operation {
        MigrateOperation::Up(a) => run_migrate_up(a),
        MigrateOperation::Down(a) => run_migrate_down(a),
        MigrateOperation::Seed(a) => run_migrate_seed(a, false),
        MigrateOperation::Refresh(a) => run_migrate_seed(a, true),
        MigrateOperation::Status(a) => run_migrate_status(a),
    }
}

fn open_migration(args: &StoreArgs) -> Result<Migration, String> {
    let conn = rusqlite::Connection::open(&args.db)
        .map_err(|e| format!("Failed to open database '{}': {e}", args.db.display()))?;
    Migration::new(conn, &args.prefix).map_err(|e| format!("Failed to initialize migration: {e}"))
}

fn run_migrate_up(args: StoreArgs) -> Result<(), String> {
    open_migration(&args)?
        .up()
        .map_err(|e| format!("Migration up failed: {e}"))?;
    println!(
        "Migration up complete. Tables created with prefix '{}' in '{}'.",
        args.prefix,
        args.db.display()
    );
    Ok(())
}

fn run_migrate_down(args: StoreArgs) -> Result<(), String> {
    open_migration(&args)?
        .down()
        .map_err(|e| format!("Migration down failed: {e}"))?;
    println!(
        "Migration down complete. Tables with prefix '{}' dropped from '{}'.",
        args.prefix,
        args.db.display()
    );
    Ok(())
}

fn run_migrate_seed(args: MigrateSeedArgs, refresh: bool) -> Result<(), String> {
    let mut migration = open_migration(&args.store)?;
    let report = if refresh {
        migration.refresh(&args.source)
    } else {
        migration
            .up()
            .and_then(|()| migration.seed(&args.source))
    }
    .map_err(|e| format!("Seed failed: {e}"))?;

    println!("{} complete:", if refresh { "Refresh" } else { "Seed" });
    println!("  Inserted: {}", report.inserted);
    println!("  Replaced: {}", report.replaced);
    println!("  Unchanged: {}", report.unchanged);
    println!("  Skipped: {}", report.skipped.len());
    for (path, reason) in &report.skipped {
        println!("    {}: {reason}", path.display());
    }
    Ok(())
}

fn run_migrate_status(args: StoreArgs) -> Result<(), String> {
    let status = open_migration(&args)?
        .status()
        .map_err(|e| format!("Failed to get migration status: {e}"))?;
    println!("Migration Status:");
    println!(
        "  Tables exist: {}",
        if status.tables_exist { "yes" } else { "no" }
    );
    println!("  Templates: {}", status.template_count);
    println!("  Source templates: {}", status.source_count);
    println!("  Target templates: {}", status.target_count);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<BridgeConfig, String> {
    match path {
        Some(path) => BridgeConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display())),
        None => Ok(BridgeConfig::default()),
    }
}

fn open_store(args: &StoreArgs) -> Result<TemplateStore, String> {
    TemplateStore::open(&args.db, &args.prefix)
        .map_err(|e| format!("Failed to open database '{}': {e}", args.db.display()))
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {e}", path.display()))
}

fn read_input(path: Option<&Path>) -> Result<String, String> {
    match path {
        Some(path) => read_file(path),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("Failed to read stdin: {e}"))?;
            Ok(text)
        }
    }
}

fn format_from_extension(path: &Path) -> TemplateFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(TemplateFormat::Target.file_extension()) => {
            TemplateFormat::Target
        }
        _ => TemplateFormat::Source,
    }
}

fn parse_csv_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    })
    .unwrap_or_default()
}
