//! # singlerun-cli
//!
//! CLI for registry definitions: scaffold, validate, render and run them
//! with the local engine.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use singlerun_core::config::{ConfigBuilder, EngineConfig, ENV_PREFIX};
use singlerun_core::engine::{invoker_fn, record_success_invoker, UnitOutcome};
use singlerun_core::visualization::{visualize, VisualizationFormat, VisualizationOptions};
use singlerun_core::{finalize, spawn_trigger, ExecutionReport, Invoker, LocalEngine, RegistryDef};
use singlerun_state::{FileStateStore, InMemoryStateStore, StateStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "singlerun")]
#[command(about = "singlerun - Run-once step plans for deployment hooks", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a template registry definition
    Init {
        /// Plan name
        name: String,

        /// Output file (defaults to <name>.yaml)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Validate a YAML registry definition
    Validate {
        /// Path to YAML file
        file: PathBuf,
    },

    /// Render the plan built from a definition
    Plan {
        /// Path to YAML file
        file: PathBuf,

        /// Output format: ascii (default), mermaid, dot, states
        #[arg(short, long, default_value = "ascii")]
        format: String,

        /// Annotate nodes with step kinds
        #[arg(short, long)]
        details: bool,
    },

    /// Run the plan with the local engine
    ///
    /// Every unit records success when invoked, so idempotent units are
    /// skipped on later runs sharing the same state file. Without `--watch`
    /// the plan runs once and any schedule in the definition is ignored.
    Run {
        /// Path to YAML file
        file: PathBuf,

        /// Tenant override
        #[arg(short, long)]
        tenant: Option<String>,

        /// JSON file holding success markers (in-memory when omitted)
        #[arg(short, long)]
        state_file: Option<PathBuf>,

        /// Make a unit fail when invoked (repeatable)
        #[arg(long = "fail", value_name = "UNIT")]
        fail: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// After the first run, keep running on the definition's schedule
        /// until interrupted
        #[arg(short, long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(rust_log)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { name, path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(format!("{}.yaml", name)));
            init_definition(&name, &path)
        }
        Commands::Validate { file } => validate_definition(&file),
        Commands::Plan {
            file,
            format,
            details,
        } => render_plan(&file, &format, details),
        Commands::Run {
            file,
            tenant,
            state_file,
            fail,
            json,
            watch,
        } => {
            let overrides = EngineConfig {
                tenant,
                state_file,
                ..Default::default()
            };
            run_plan(&file, overrides, &fail, json, watch).await
        }
    }
}

fn load(file: &Path) -> anyhow::Result<RegistryDef> {
    RegistryDef::from_file(file).with_context(|| format!("failed to load {}", file.display()))
}

fn init_definition(name: &str, path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let def = RegistryDef::template(name);
    def.validate()
        .with_context(|| format!("'{}' is not a valid plan name", name))?;
    std::fs::write(path, def.to_yaml()?)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("✓ Created {}", path.display());
    println!("\nNext steps:");
    println!("  singlerun validate {}", path.display());
    println!("  singlerun run {} --state-file state.json", path.display());
    Ok(())
}

fn validate_definition(file: &Path) -> anyhow::Result<()> {
    let def = load(file)?;
    def.validate()
        .with_context(|| format!("{} is invalid", file.display()))?;

    println!("✓ Definition is valid");
    println!("  Plan name: {}", def.name);
    if let Some(description) = &def.description {
        println!("  Description: {}", description);
    }
    println!("  Tenant: {}", def.tenant);
    println!("  Timeout: {}s", def.timeout_secs);
    if let Some(schedule) = def.schedule()? {
        println!("  Schedule: {}", schedule);
    }
    println!("\nUnits ({}):", def.units.len());
    for unit in &def.units {
        let kind = if unit.idempotent { "run-once" } else { "every run" };
        println!("  - {} ({})", unit.name, kind);
        if let Some(description) = &unit.description {
            println!("    {}", description);
        }
    }
    Ok(())
}

fn render_plan(file: &Path, format: &str, details: bool) -> anyhow::Result<()> {
    let format: VisualizationFormat = format.parse()?;
    let def = load(file)?;
    let plan = def.build_plan()?;

    let mut options = VisualizationOptions::new(format).with_title(def.name.as_str());
    if details {
        options = options.with_details();
    }
    print!("{}", visualize(&plan, &options)?);
    if format == VisualizationFormat::States {
        println!();
    }
    Ok(())
}

async fn run_plan(
    file: &Path,
    overrides: EngineConfig,
    fail: &[String],
    json: bool,
    watch: bool,
) -> anyhow::Result<()> {
    let mut def = load(file)?;

    let mut config = EngineConfig::from_env_with_defaults(ENV_PREFIX)?;
    config.merge(overrides);
    config.validate()?;
    config.apply(&mut def);

    let plan = def.build_plan()?;
    let schedule = match (watch, def.schedule()?) {
        (false, _) => None,
        (true, Some(schedule)) => Some(schedule),
        (true, None) => bail!(
            "--watch needs a schedule in {} or {}SCHEDULE_RATE_MINUTES",
            file.display(),
            ENV_PREFIX
        ),
    };
    for unit in fail {
        if !plan.unit_names().contains(&unit.as_str()) {
            bail!("--fail names unknown unit '{}'", unit);
        }
    }

    let store: Arc<dyn StateStore> = match &config.state_file {
        Some(path) => Arc::new(
            FileStateStore::open(path)
                .await
                .with_context(|| format!("failed to open state file {}", path.display()))?,
        ),
        None => {
            info!("no state file given, success markers are kept in memory");
            Arc::new(InMemoryStateStore::new())
        }
    };

    let engine = LocalEngine::new(store);
    for unit in &def.units {
        let invoker = if fail.contains(&unit.name) {
            failing_invoker()
        } else {
            record_success_invoker()
        };
        engine.register_invoker(unit.name.clone(), invoker).await;
    }

    finalize(&engine, plan, def.name.as_str(), def.timeout()).await?;
    debug!(plan = %def.name, "registered with local engine");

    let report = engine.execute(&def.name).await?;
    print_report(&report, json)?;

    if let Some(schedule) = schedule {
        let handle = spawn_trigger(engine, def.name.as_str(), schedule);
        println!("Watching '{}' on {} (Ctrl-C to stop)", def.name, schedule);
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        println!("Stopping after {} scheduled runs ({} failed)", handle.runs(), handle.failures());
        handle.stop().await;
    }
    Ok(())
}

fn print_report(report: &ExecutionReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("✓ {}", report.summary());
    for unit in &report.units {
        let outcome = match unit.outcome {
            UnitOutcome::Invoked { .. } => "invoked",
            UnitOutcome::Skipped => "skipped",
        };
        println!("  {:<8} {}", outcome, unit.unit);
    }
    Ok(())
}

fn failing_invoker() -> Arc<dyn Invoker> {
    invoker_fn(|ctx| {
        Box::pin(async move { Err(format!("unit '{}' forced to fail", ctx.unit).into()) })
    })
}
