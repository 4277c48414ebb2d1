//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use probank_core::{
    BundleOptions, CorpusConfig, CorpusReport, DocumentCounts, ListOptions, ProgressReporter,
    build_bundle, extract_corpus, render_problem_list,
};
use probank_shared::{AppConfig, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// probank: split problem-set documents into a numbered problem corpus.
#[derive(Parser)]
#[command(
    name = "probank",
    version,
    about = "Split typeset competition-problem documents into a numbered problem corpus.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.probank/probank.toml.
    #[arg(long, global = true, env = "PROBANK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract problems from every document under a root.
    Extract {
        /// Root of the source document tree.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Output directory for problem files, metadata and the log.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Do not carry hand-edited fields over from existing metadata.
        #[arg(long)]
        no_merge: bool,
    },

    /// Build per-problem JSON records from an extracted corpus.
    Bundle {
        /// Directory the corpus was extracted into.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Bundle output directory (defaults to `<out>/<bundle.dist_dir>`).
        #[arg(long)]
        dist: Option<PathBuf>,

        /// Rebuild every record, ignoring the build cache.
        #[arg(long)]
        force: bool,
    },

    /// Print a TeX file that inputs problems START through END.
    List {
        /// First problem number.
        start: usize,

        /// Last problem number.
        end: usize,

        /// Directory the corpus was extracted into.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Omit `\stepcounter{prob}` before each problem.
        #[arg(long)]
        no_counter: bool,

        /// Input each problem's solution after it.
        #[arg(long)]
        solutions: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = ["probank_cli", "probank_core", "probank_extract", "probank_shared"]
        .map(|target| format!("{target}={level}"))
        .join(",");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Extract { root, out, no_merge } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_extract(&config, root, out, no_merge)
        }
        Command::Bundle { out, dist, force } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_bundle(&config, out, dist, force)
        }
        Command::List {
            start,
            end,
            out,
            output,
            no_counter,
            solutions,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            let options = ListOptions {
                start,
                end,
                include_counter: !no_counter,
                include_solutions: solutions,
            };
            cmd_list(&config, &out, output.as_deref(), &options)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_extract(config: &AppConfig, root: PathBuf, out: PathBuf, no_merge: bool) -> Result<()> {
    let mut corpus = CorpusConfig::from_app(root, out, config);
    if no_merge {
        corpus.output.merge_prior_metadata = false;
    }

    info!(
        root = %corpus.root.display(),
        out = %corpus.output_root.display(),
        merge = corpus.output.merge_prior_metadata,
        "extracting problems"
    );

    let reporter = CliProgress::new();
    let report = extract_corpus(corpus, &reporter)?;

    println!();
    println!("  Extraction complete!");
    println!("  Documents:  {}", report.documents);
    println!("  Problems:   {}", report.units_written);
    println!("  Discarded:  {} (too short)", report.units_discarded);
    if report.malformed_endnotes > 0 {
        println!("  Malformed:  {} endnote(s) treated as absent", report.malformed_endnotes);
    }
    if report.merged > 0 {
        println!("  Merged:     {} hand-edited record(s) kept", report.merged);
    }
    if report.units_failed > 0 {
        println!("  Failed:     {} problem file(s) not written", report.units_failed);
    }
    for skipped in &report.documents_skipped {
        println!("  Skipped:    {} ({})", skipped.path, skipped.reason);
    }
    println!("  Metadata:   {}", report.metadata_path.display());
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_bundle(config: &AppConfig, out: PathBuf, dist: Option<PathBuf>, force: bool) -> Result<()> {
    let dist_dir = dist.unwrap_or_else(|| out.join(&config.bundle.dist_dir));
    let options = BundleOptions {
        output_root: out,
        dist_dir,
        force,
        output: config.output.clone(),
        bundle: config.bundle.clone(),
    };

    info!(dist = %options.dist_dir.display(), force, "building bundle");
    let report = build_bundle(&options)?;

    println!();
    println!("  Bundle complete!");
    println!("  Built:    {}", report.built);
    println!("  Skipped:  {} (unchanged)", report.skipped);
    if !report.missing.is_empty() {
        println!("  Missing:  {}", report.missing.join(", "));
    }
    if !report.pruned.is_empty() {
        println!("  Pruned:   {}", report.pruned.join(", "));
    }
    println!("  Total:    {}", report.total);
    println!("  Output:   {}", options.dist_dir.display());
    println!();

    Ok(())
}

fn cmd_list(config: &AppConfig, out: &Path, output: Option<&Path>, options: &ListOptions) -> Result<()> {
    let list = render_problem_list(out, &config.output, options)?;

    match output {
        Some(path) => {
            std::fs::write(path, &list)
                .map_err(|e| eyre!("cannot write '{}': {e}", path.display()))?;
            println!(
                "Problem list written to {} ({} to {})",
                path.display(),
                options.start,
                options.end
            );
        }
        None => println!("{list}"),
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

// Clears the spinner when a run fails before `done` is reached.
impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_started(&self, path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Extracting [{current}/{total}] {path}"));
    }

    fn document_finished(&self, path: &str, counts: DocumentCounts) {
        if counts.located > 0 {
            self.spinner.println(format!(
                "  {path}: {} problem(s), {} discarded",
                counts.written, counts.discarded
            ));
        }
    }

    fn done(&self, _report: &CorpusReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_cleared_when_run_fails() {
        let progress = CliProgress::new();
        let spinner = progress.spinner.clone();

        let missing = std::env::temp_dir().join(format!("probank-cli-missing-{}", std::process::id()));
        let config = CorpusConfig::from_app(missing.join("src"), missing.join("out"), &AppConfig::default());
        assert!(extract_corpus(config, &progress).is_err());
        assert!(!spinner.is_finished());

        drop(progress);
        assert!(spinner.is_finished());
    }
}
