//! Frete E2E runner
//!
//! Runs the YAML suites under `specs/` against the mock responder (CI) or the
//! live frete API.
//! Run with: cargo run --package frete-e2e -- --tag regressivo

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use frete_e2e::{Environment, RunnerConfig, ScenarioRunner};

#[derive(Parser, Debug)]
#[command(name = "frete-e2e")]
#[command(about = "Contract tests for the frete calculation API")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "frete-e2e.toml")]
    config: PathBuf,

    /// Path to scenario suites directory
    #[arg(short, long)]
    specs: Option<PathBuf>,

    /// Path to fixtures directory
    #[arg(short, long)]
    fixtures: Option<PathBuf>,

    /// Run only scenarios carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the scenario with this name
    #[arg(short, long)]
    name: Option<String>,

    /// Base URL for scenario paths
    #[arg(long, env = "FRETE_E2E_BASE_URL")]
    base_url: Option<String>,

    /// Force mocked requests
    #[arg(long, conflicts_with = "live")]
    mock: bool,

    /// Force live requests
    #[arg(long)]
    live: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> anyhow::Result<bool> {
    let mut config = RunnerConfig::load(&args.config)?;
    if let Some(specs) = args.specs {
        config.specs_dir = specs;
    }
    if let Some(fixtures) = args.fixtures {
        config.fixtures_dir = fixtures;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }

    let environment = if args.mock {
        Environment::mocked()
    } else if args.live {
        Environment::live()
    } else {
        Environment::detect(&config.ci_env_var)
    };

    let mut runner = ScenarioRunner::with_config(config, environment)?;

    let results = if let Some(name) = args.name {
        runner.run_named(&name).await?
    } else if let Some(tag) = args.tag {
        runner.run_tagged(&tag).await?
    } else {
        runner.run_all().await?
    };

    runner.write_results(&results)?;

    Ok(results.success())
}
