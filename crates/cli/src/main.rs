use anyhow::{bail, Result};
use clap::{ArgAction, Parser, ValueEnum};
use music_renamer_core::{
    app_paths, load_config, run_batch, undo_last, validate_template, AutoConfirm,
    CollisionPolicy, Confirm, LinePrompt, LoftyTagReader, PlanOptions, RenamePlan, RunOptions,
    RunOutcome, RunReport, SkipReason,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const FORMAT_HELP: &str = "\
Formatting:
  The words album, artist, composer, title, track and disc in the format are
  replaced by values read from each file's tags. Missing tags become empty.

  --format=\"artist - album [track] title\" names files like
  Sample Artist - Sample Album [1] Sample Title.mp3

  (=) becomes a directory separator, so \"artist(=)album(=)track - title\"
  moves files into artist and album subdirectories.

  The characters \\ / : * ? \" < > | are removed from names.";

#[derive(Debug, Parser)]
#[command(name = "music-renamer", version)]
#[command(about = "Renames audio files based on their metadata")]
#[command(after_help = FORMAT_HELP)]
struct Cli {
    /// Directory to work in (defaults to the current directory)
    #[arg(short, long, value_name = "PATH")]
    directory: Option<PathBuf>,
    /// Naming format; an empty string selects the default
    #[arg(short, long, value_name = "STRING")]
    format: Option<String>,
    /// Zero-pad track and disc numbers to this many digits
    #[arg(short, long, value_name = "N")]
    padding: Option<usize>,
    /// Move all files into the root directory
    #[arg(short = 'l', long, overrides_with = "no_flatten")]
    flatten: bool,
    /// Keep files in their directories even if the config flattens
    #[arg(long, overrides_with = "flatten")]
    no_flatten: bool,
    /// Work recursively on the directory
    #[arg(short, long, overrides_with = "no_recursive")]
    recursive: bool,
    /// Only look at the top level even if the config is recursive
    #[arg(long, overrides_with = "recursive")]
    no_recursive: bool,
    /// Only display the new file names; nothing is renamed
    #[arg(short, long)]
    test: bool,
    /// Do not ask for confirmation
    #[arg(short, long)]
    noconfirm: bool,
    /// Include files and directories whose names start with a dot
    #[arg(long, overrides_with = "no_include_hidden")]
    include_hidden: bool,
    /// Skip dot files even if the config includes them
    #[arg(long, overrides_with = "include_hidden")]
    no_include_hidden: bool,
    /// What to do when a target name is already taken
    #[arg(long, value_enum)]
    on_collision: Option<CollisionArg>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Revert the last applied batch
    #[arg(long, conflicts_with_all = ["test", "show_config"])]
    undo: bool,
    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CollisionArg {
    Number,
    Skip,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(value: CollisionArg) -> Self {
        match value {
            CollisionArg::Number => CollisionPolicy::Number,
            CollisionArg::Skip => CollisionPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.show_config {
        return cmd_show_config();
    }
    if cli.undo {
        return cmd_undo();
    }
    cmd_rename(cli)
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_rename(cli: Cli) -> Result<()> {
    let config = load_config()?;
    let directory = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let mut plan = PlanOptions::from_config(directory, &config);
    if let Some(format) = cli.format {
        validate_template(&format)?;
        plan.format = format;
    }
    if let Some(padding) = cli.padding {
        plan.padding = padding;
    }
    plan.flatten = toggle(plan.flatten, cli.flatten, cli.no_flatten);
    plan.recursive = toggle(plan.recursive, cli.recursive, cli.no_recursive);
    plan.include_hidden = toggle(
        plan.include_hidden,
        cli.include_hidden,
        cli.no_include_hidden,
    );
    if let Some(policy) = cli.on_collision {
        plan.on_collision = policy.into();
    }

    let options = RunOptions {
        plan,
        test: cli.test,
        no_confirm: cli.noconfirm,
        undo_log: Some(app_paths()?.undo_path),
    };

    let started = Instant::now();
    let (report, previewed) = if cli.noconfirm {
        (run_batch(&options, &LoftyTagReader, &mut AutoConfirm)?, false)
    } else {
        let mut prompt = Preview::new(LinePrompt::stdio());
        let report = run_batch(&options, &LoftyTagReader, &mut prompt)?;
        (report, prompt.shown)
    };

    match cli.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_table(&report, previewed)?,
    }

    match &report.outcome {
        RunOutcome::DryRun => {
            eprintln!("Test mode: nothing was renamed.");
        }
        RunOutcome::NothingToRename => {
            eprintln!("All files already match the format.");
        }
        RunOutcome::Declined => {
            eprintln!("Aborting: nothing was renamed.");
        }
        RunOutcome::Applied(result) => {
            eprintln!(
                "{} file(s) renamed in {:.3} seconds ({} unchanged)",
                result.applied,
                started.elapsed().as_secs_f64(),
                result.unchanged
            );
            if !result.failed.is_empty() {
                bail!("{} file(s) could not be renamed", result.failed.len());
            }
        }
    }

    Ok(())
}

/// A command-line flag pair overrides the configured value; neither keeps it.
fn toggle(configured: bool, on: bool, off: bool) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        configured
    }
}

/// Lists the pending renames on stderr before asking.
struct Preview<C> {
    inner: C,
    shown: bool,
}

impl<C> Preview<C> {
    fn new(inner: C) -> Self {
        Self {
            inner,
            shown: false,
        }
    }
}

impl<C: Confirm> Confirm for Preview<C> {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        self.inner.confirm(message)
    }

    fn confirm_plan(&mut self, plan: &RenamePlan, message: &str) -> Result<bool> {
        print_mapping(plan, &mut io::stderr().lock())?;
        self.shown = true;
        self.inner.confirm(message)
    }
}

fn cmd_undo() -> Result<()> {
    let paths = app_paths()?;
    let result = undo_last(&paths.undo_path)?;
    println!(
        "Restored {} file(s) ({} skipped)",
        result.restored, result.skipped
    );
    Ok(())
}

fn cmd_show_config() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("Config file: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_mapping(plan: &RenamePlan, out: &mut impl Write) -> io::Result<()> {
    for candidate in plan.changed() {
        writeln!(
            out,
            "{} -> {}",
            relative(plan, &candidate.original_path).display(),
            relative(plan, &candidate.target_path).display()
        )?;
    }
    Ok(())
}

fn print_table(report: &RunReport, previewed: bool) -> Result<()> {
    let plan = &report.plan;
    if !previewed {
        print_mapping(plan, &mut io::stdout().lock())?;
    }
    for skipped in &plan.skipped {
        let reason = match &skipped.reason {
            SkipReason::UnreadableMetadata { message } => message.clone(),
            SkipReason::TargetCollision { target } => {
                format!("{} is taken", relative(plan, target).display())
            }
        };
        println!(
            "skipped {} ({})",
            relative(plan, &skipped.path).display(),
            reason
        );
    }

    let stats = &plan.stats;
    println!(
        "\nSummary: scanned={} audio={} planned={} unchanged={} disambiguated={} unreadable={} collisions={} unsupported={} hidden={}",
        stats.scanned_files,
        stats.audio_files,
        stats.planned,
        stats.unchanged,
        stats.disambiguated,
        stats.skipped_unreadable,
        stats.skipped_collision,
        stats.skipped_unsupported,
        stats.skipped_hidden
    );
    Ok(())
}

fn relative<'a>(plan: &RenamePlan, path: &'a Path) -> &'a Path {
    path.strip_prefix(&plan.root).unwrap_or(path)
}
