#![forbid(unsafe_code)]

use std::env;

use anyhow::Result;
use clap::Parser;
use presets_sim::campaign::{CampaignConfig, format_violation, replay_seed, run_campaign};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "presets-sim: seeded invariant campaigns for preset collections",
    long_about = None
)]
struct Cli {
    /// First seed of the campaign.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of seeds to run.
    #[arg(long, default_value_t = 100)]
    seeds: u64,

    /// Operations per seed.
    #[arg(long, default_value_t = 64)]
    steps: usize,

    /// Distinct match keys upserts draw from.
    #[arg(long, default_value_t = 4)]
    keys: u8,

    /// Replay only `--seed` and print its step trace.
    #[arg(long)]
    replay: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PRESETS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "presets=debug,info"
        } else {
            "presets=info,warn"
        })
    });

    let format = env::var("PRESETS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = CampaignConfig {
        seed_range: cli.seed..cli.seed.saturating_add(cli.seeds.max(1)),
        steps: cli.steps,
        key_space: cli.keys,
        ..CampaignConfig::default()
    };

    if cli.replay {
        let result = replay_seed(cli.seed, &config)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&result.trace)?);
        } else {
            for record in &result.trace {
                println!(
                    "{:>4} {:<8} len={} selected={}",
                    record.step,
                    record.op.label(),
                    record.len,
                    record.selected.as_deref().unwrap_or("-")
                );
            }
            for violation in &result.oracle.violations {
                println!("violation: {}", format_violation(violation));
            }
        }
        return Ok(());
    }

    info!(seeds = cli.seeds, steps = cli.steps, "running campaign");
    let report = run_campaign(&config)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "campaign complete: seeds_run={} passed={} notifications={}",
            report.seeds_run, report.seeds_passed, report.notifications
        );
        if let Some(seed) = report.first_failure {
            println!("first failure at seed {seed} (replay with --replay --seed {seed})");
        }
        for failure in &report.failures {
            for violation in &failure.violations {
                println!("  seed {}: {violation}", failure.seed);
            }
        }
    }

    if report.all_passed() {
        Ok(())
    } else {
        anyhow::bail!("{} seed(s) failed", report.failures.len())
    }
}
