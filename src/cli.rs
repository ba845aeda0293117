//! Command-line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use pv_dispatch::config::ScenarioConfig;
use pv_dispatch::tariff::PlanKind;

#[derive(Debug, Parser)]
#[command(name = "pv-dispatch")]
#[command(author, version, about = "Rolling-horizon PV and battery dispatch optimizer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Dispatch a series and compare the flat and market tariffs
    #[command(
        long_about = "Run the rolling-horizon optimizer over a half-hourly series.\n\
        \nInput (choose one):\n  \
        - Recorded: --series <csv> with columns timestamp,demand_kw,pv_kw,spot_price\n  \
        - Synthetic: omit --series to generate profiles from the [profiles] section\n\
        \nExamples:\n  \
        pv-dispatch run --preset baseline --max-steps 96\n  \
        pv-dispatch run --config site.toml --series fy2024.csv --trajectory-out out.csv"
    )]
    Run(RunArgs),

    /// List the built-in configuration presets
    Presets,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// TOML configuration file
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Built-in preset (baseline, no_storage, market)
    #[arg(long)]
    pub preset: Option<String>,

    /// Aligned input series CSV; synthetic profiles are used when omitted
    #[arg(long)]
    pub series: Option<PathBuf>,

    /// Write the committed trajectory to this CSV file
    #[arg(long)]
    pub trajectory_out: Option<PathBuf>,

    /// Write the cost comparison to this JSON file
    #[arg(long)]
    pub costs_out: Option<PathBuf>,

    /// Override the look-ahead horizon (steps)
    #[arg(long)]
    pub horizon: Option<usize>,

    /// Stop after this many steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Override the per-window time budget (seconds)
    #[arg(long)]
    pub time_limit: Option<f64>,

    /// Plan whose prices drive the optimizer
    #[arg(long, value_enum)]
    pub plan: Option<PlanArg>,

    /// Override the synthetic profile seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the number of synthetic days
    #[arg(long)]
    pub days: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanArg {
    Flat,
    Market,
}

impl From<PlanArg> for PlanKind {
    fn from(arg: PlanArg) -> Self {
        match arg {
            PlanArg::Flat => PlanKind::Flat,
            PlanArg::Market => PlanKind::Market,
        }
    }
}

impl RunArgs {
    /// Applies command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut ScenarioConfig) {
        if let Some(h) = self.horizon {
            config.run.horizon = h;
        }
        if let Some(m) = self.max_steps {
            config.run.max_steps = Some(m);
        }
        if let Some(t) = self.time_limit {
            config.run.time_limit_secs = t;
        }
        if let Some(p) = self.plan {
            config.run.plan = p.into();
        }
        if let Some(s) = self.seed {
            config.profiles.seed = s;
        }
        if let Some(d) = self.days {
            config.profiles.days = d;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("pv-dispatch").chain(args.iter().copied()))
    }

    #[test]
    fn test_supports_preset_run() {
        let cli = parse(&["run", "--preset", "market", "--max-steps", "10"]).expect("parse");
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.preset.as_deref(), Some("market"));
        assert_eq!(args.max_steps, Some(10));
    }

    #[test]
    fn test_config_and_preset_conflict() {
        assert!(parse(&["run", "--config", "a.toml", "--preset", "baseline"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = parse(&["run", "--horizon", "48", "--plan", "market", "--time-limit", "2"])
            .expect("parse");
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let mut cfg = ScenarioConfig::baseline();
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.run.horizon, 48);
        assert_eq!(cfg.run.plan, PlanKind::Market);
        assert_eq!(cfg.run.time_limit_secs, 2.0);
    }

    #[test]
    fn test_presets_command_parses() {
        assert!(matches!(parse(&["presets"]).map(|c| c.command), Ok(Commands::Presets)));
    }
}
