use clap::{Parser, Subcommand, ValueEnum};
use flowstate::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect, diff and replay edits on flow-chart documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log session and store-of-record events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a chart for dangling edges and duplicate ids
    Validate {
        /// Path to the flow chart JSON file
        chart: PathBuf,
    },
    /// Print the patches turning one chart into another
    Diff { base: PathBuf, target: PathBuf },
    /// Apply a JSON list of patches to a chart and print the result
    Apply { chart: PathBuf, patches: PathBuf },
    /// Replay an intent script through an editing session and save the result
    Edit {
        chart: PathBuf,
        /// JSON list of intents, `{"command": "undo"}`, `{"command": "redo"}` or `{"command": "save"}`
        script: PathBuf,
        /// How the session submits saves
        #[arg(short, long, value_enum)]
        mode: Option<ModeCli>,
        /// Optional JSON config file; the environment is used otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeCli {
    Replace,
    Patch,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScriptCommand {
    Undo,
    Redo,
    Save,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptStep {
    Command { command: ScriptCommand },
    Intent(Intent),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::WARN
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(level)
        .init();

    let outcome = match cli.command {
        Command::Validate { chart } => run_validate(&chart),
        Command::Diff { base, target } => run_diff(&base, &target),
        Command::Apply { chart, patches } => run_apply(&chart, &patches),
        Command::Edit {
            chart,
            script,
            mode,
            config,
        } => run_edit(&chart, &script, mode, config.as_deref()).await,
    };

    if let Err(e) = outcome {
        exit_with_error(&e.to_string());
    }
}

fn run_validate(path: &Path) -> Result<()> {
    let chart: FlowChart = read_json(path)?;
    let report = validate(&chart);
    if report.is_valid() {
        println!(
            "'{}' is valid: {} nodes, {} edges",
            chart.name,
            chart.nodes.len(),
            chart.edges.len()
        );
        return Ok(());
    }
    for violation in report.violations() {
        println!("  - {}", violation);
    }
    exit_with_error(&format!("{} violation(s) found", report.len()));
}

fn run_diff(base: &Path, target: &Path) -> Result<()> {
    let base: FlowChart = read_json(base)?;
    let target: FlowChart = read_json(target)?;
    let patches = diff(&base, &target);
    println!("{}", serde_json::to_string_pretty(&patches)?);
    Ok(())
}

fn run_apply(chart: &Path, patches: &Path) -> Result<()> {
    let chart: FlowChart = read_json(chart)?;
    let patches: Vec<ChartPatch> = read_json(patches)?;
    let next = apply_patches(&chart, &patches)?;
    validate(&next).into_result()?;
    println!("{}", serde_json::to_string_pretty(&next)?);
    Ok(())
}

async fn run_edit(
    chart: &Path,
    script: &Path,
    mode: Option<ModeCli>,
    config: Option<&Path>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => FlowConfig::from_file(path)?,
        None => FlowConfig::from_env()?,
    };
    if let Some(mode) = mode {
        config.store.save_mode = match mode {
            ModeCli::Replace => SaveMode::Replace,
            ModeCli::Patch => SaveMode::Patch,
        };
    }

    let mut chart: FlowChart = read_json(chart)?;
    chart.version = chart.version.max(1);
    let steps: Vec<ScriptStep> = read_json(script)?;

    let repository = Arc::new(MemoryStore::new().with_base_path(config.client.base_path.clone()));
    let id = chart.id;
    repository.insert(chart).await;
    let http = Arc::new(HttpFlowRepository::with_config(
        Arc::clone(&repository),
        config.client.clone(),
    ));

    let mut store = EditingStore::with_config(http, config.store);
    store.load(id).await?;
    for (index, step) in steps.into_iter().enumerate() {
        let result = match step {
            ScriptStep::Intent(intent) => store.dispatch(intent),
            ScriptStep::Command {
                command: ScriptCommand::Undo,
            } => store.undo(),
            ScriptStep::Command {
                command: ScriptCommand::Redo,
            } => store.redo(),
            ScriptStep::Command {
                command: ScriptCommand::Save,
            } => store.save().await,
        };
        match result {
            Ok(_) => {}
            Err(e) if e.is_noop() => eprintln!("Step {}: {}", index + 1, e),
            Err(e) => return Err(format!("Step {} failed: {}", index + 1, e).into()),
        }
    }
    if store.is_dirty() {
        store.save().await?;
    }

    let saved = repository
        .get(id)
        .await
        .ok_or_else(|| format!("Flow chart '{}' vanished from the store", id))?;
    println!("{}", serde_json::to_string_pretty(&saved)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
    Ok(value)
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
