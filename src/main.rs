//! Dispatch optimizer entry point: CLI wiring and config-driven run construction.

mod cli;

use anyhow::{Context, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pv_dispatch::config::ScenarioConfig;
use pv_dispatch::io::{export_cost_json, export_csv, read_series};
use pv_dispatch::profiles;
use pv_dispatch::sim::accounting::CostComparison;
use pv_dispatch::sim::controller::{RollingController, Termination};

use cli::{Cli, Commands, RunArgs};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pv_dispatch=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(&args),
        Commands::Presets => {
            for name in ScenarioConfig::PRESETS {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn load_config(args: &RunArgs) -> anyhow::Result<ScenarioConfig> {
    let mut config = match (&args.config, &args.preset) {
        (Some(path), _) => ScenarioConfig::from_toml_file(path)?,
        (None, Some(name)) => ScenarioConfig::from_preset(name)?,
        (None, None) => ScenarioConfig::baseline(),
    };
    args.apply_overrides(&mut config);

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("configuration has {} error(s)", errors.len());
    }
    Ok(config)
}

fn run(args: &RunArgs) -> anyhow::Result<()> {
    let config = load_config(args)?;

    let series = match &args.series {
        Some(path) => read_series(path)
            .with_context(|| format!("cannot load series \"{}\"", path.display()))?,
        None => profiles::generate(&config.profiles).context("cannot generate profiles")?,
    };
    let series = series.period(config.run.start, config.run.end)?;

    let battery = config.battery();
    let controller =
        RollingController::new(battery.clone(), config.grid(), config.plan(), config.run_settings())?;
    let outcome = controller.run(&series)?;

    let trajectory = &outcome.trajectory;
    for v in trajectory.audit(&battery) {
        tracing::warn!(step = v.step, kind = ?v.kind, value = v.value, "invariant violated");
    }

    let report = CostComparison::from_trajectory(trajectory, &config.tariffs());
    println!("{report}");
    println!(
        "Steps completed: {} / {}",
        outcome.completed_steps(),
        outcome.requested_steps
    );
    let fallbacks = outcome.fallback_steps();
    if fallbacks.is_empty() {
        println!("Fallback steps: none");
    } else {
        println!("Fallback steps: {fallbacks:?}");
    }

    if let Some(path) = &args.trajectory_out {
        export_csv(trajectory.rows(), path)
            .with_context(|| format!("cannot write \"{}\"", path.display()))?;
        tracing::info!(path = %path.display(), rows = trajectory.len(), "trajectory written");
    }
    if let Some(path) = &args.costs_out {
        export_cost_json(&report, path)
            .with_context(|| format!("cannot write \"{}\"", path.display()))?;
        tracing::info!(path = %path.display(), "cost comparison written");
    }

    match outcome.termination {
        Termination::Completed => Ok(()),
        Termination::Cancelled { at_step } => bail!("run cancelled at step {at_step}"),
        Termination::Aborted { at_step, error } => {
            Err(error).with_context(|| format!("run aborted at step {at_step}"))
        }
    }
}
