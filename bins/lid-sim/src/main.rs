//! LID presale simulator.
//!
//! Deploys a sale from configuration, replays a JSON scenario of calls
//! against in-memory ledgers and a recording router, and prints the final
//! state as JSON on stdout. Logs go to stderr.

mod scenario;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lid_core::units::parse_units;
use lid_presale::SaleConfig;
use tracing::info;

use crate::scenario::{Scenario, Simulation};

#[derive(Parser, Debug)]
#[command(name = "lid-sim", version, about = "Replay a LID presale scenario")]
struct Args {
    /// Sale config (TOML). Built-in defaults are used when omitted;
    /// `LID__SECTION__KEY` environment variables override either.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scenario file (JSON)
    #[arg(long)]
    scenario: PathBuf,

    /// Stop at the first rejected step
    #[arg(long)]
    fail_fast: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    let cfg = SaleConfig::load(args.config.as_deref()).context("loading sale config")?;
    let raw = fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading scenario {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw).context("parsing scenario")?;
    let supply = parse_units(&scenario.token_supply).context("token_supply")?;

    info!("LID presale simulator v{}", env!("CARGO_PKG_VERSION"));
    info!(steps = scenario.steps.len(), token_supply = %scenario.token_supply, "replaying scenario");

    let mut sim = Simulation::new(&cfg, supply)?;
    let outcomes = sim.run(&scenario.steps, args.fail_fast);
    let rejected = outcomes.iter().filter(|o| !o.ok).count();
    let report = sim.report(outcomes);

    let out = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{out}");

    info!(rejected, state = ?report.presale.state, "replay finished");
    if args.fail_fast && rejected > 0 {
        anyhow::bail!("scenario stopped at a rejected step");
    }
    Ok(())
}

/// Initialize tracing on stderr with the given level and output format.
///
/// `format = "json"` gives one JSON object per event; anything else is
/// human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
