//! Effect Model CLI
//!
//! Inspect the kernel effect registry and explore scenarios against it.
//!
//! # Usage
//!
//! ```bash
//! # List every registered model
//! cargo run --bin effect-model -- list
//!
//! # Show one model's signature and effect
//! cargo run --bin effect-model -- show kmalloc
//!
//! # Validate a configuration file
//! cargo run --bin effect-model -- check --config effect-model.yaml
//!
//! # Explore a scenario
//! cargo run --bin effect-model -- run tests/scenarios/double_free.yaml --format json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use effect_model::features::defect_sink::TracingSink;
use effect_model::{
    build_registry, EffectEvaluator, EffectRegistry, ModelConfig, ModelError, Scenario,
    ScenarioRunner,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "effect-model")]
#[command(about = "Kernel primitive effect models", long_about = None)]
struct Cli {
    /// Configuration file (version 1 schema)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models
    List {
        /// Only names, one per line
        #[arg(long)]
        names_only: bool,
    },

    /// Show one model
    Show {
        /// Function name
        name: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate the configuration and build the registry
    Check,

    /// Explore a scenario file
    Run {
        /// Scenario YAML file
        scenario: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Exit with failure when any defect is found
        #[arg(long)]
        fail_on_defect: bool,
    },
}

#[derive(Clone, Copy, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_deref())?;
    let registry = build_registry(&config.registry).map_err(ModelError::from)?;

    match cli.command {
        Commands::List { names_only } => list_models(&registry, names_only),
        Commands::Show { name, format } => return show_model(&registry, &name, format),
        Commands::Check => {
            println!(
                "configuration ok: {} models (experimental: {})",
                registry.len(),
                config.registry.include_experimental
            );
        }
        Commands::Run {
            scenario,
            format,
            fail_on_defect,
        } => return run_scenario(&registry, &config, &scenario, format, fail_on_defect),
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<ModelConfig, ModelError> {
    match path {
        Some(path) => {
            tracing::debug!("loading configuration from {}", path.display());
            Ok(ModelConfig::from_yaml(path)?)
        }
        None => Ok(ModelConfig::default()),
    }
}

fn list_models(registry: &EffectRegistry, names_only: bool) {
    for entry in registry.entries() {
        if names_only {
            println!("{}", entry.name());
        } else {
            println!("{:<48} {}", entry.signature.to_string(), entry.effect.kind_name());
        }
    }
}

fn show_model(
    registry: &EffectRegistry,
    name: &str,
    format: OutputFormat,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let Some(entry) = registry.entry(name) else {
        eprintln!("no model for '{}'", name);
        return Ok(ExitCode::FAILURE);
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entry)?),
        OutputFormat::Text => {
            println!("{}", entry.signature);
            println!("  effect: {}", entry.effect);
            let params = entry.effect.referenced_params();
            if !params.is_empty() {
                let params: Vec<String> = params.iter().map(|p| format!("${}", p)).collect();
                println!("  reads:  {}", params.join(", "));
            }
            if entry.effect.never_returns() {
                println!("  never returns");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_scenario(
    registry: &EffectRegistry,
    config: &ModelConfig,
    path: &Path,
    format: OutputFormat,
    fail_on_defect: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let scenario = Scenario::from_yaml(path).map_err(ModelError::from)?;
    let evaluator = EffectEvaluator::new(config.evaluator.clone(), Arc::new(TracingSink));
    let runner = ScenarioRunner::new(registry, evaluator, config.scenario.clone());
    let report = runner.run(&scenario).map_err(ModelError::from)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", report),
    }

    if fail_on_defect && !report.defects().is_empty() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
