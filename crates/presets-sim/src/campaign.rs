//! Campaign runner for deterministic simulation campaigns.
//!
//! Executes many seeds with shared parameters, collecting pass/fail results
//! and identifying the first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::oracle::InvariantViolation;
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Campaign-level configuration: which seeds to run and the simulation
/// parameters shared by every seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    /// Operations per seed.
    pub steps: usize,
    /// Number of distinct match keys.
    pub key_space: u8,
    /// Intentional upsert probability (percent, 0-100).
    pub intent_percent: u8,
    /// Save probability per step (percent, 0-100).
    pub save_percent: u8,
    /// Remove probability per step (percent, 0-100).
    pub remove_percent: u8,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            steps: sim.steps,
            key_space: sim.key_space,
            intent_percent: sim.intent_percent,
            save_percent: sim.save_percent,
            remove_percent: sim.remove_percent,
        }
    }
}

impl CampaignConfig {
    /// Build a [`SimulationConfig`] for a specific seed.
    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            steps: self.steps,
            key_space: self.key_space,
            intent_percent: self.intent_percent,
            save_percent: self.save_percent,
            remove_percent: self.remove_percent,
        }
    }

    /// Validate configuration before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.steps == 0 {
            bail!("steps must be > 0");
        }
        if self.key_space == 0 {
            bail!("key_space must be > 0");
        }
        Ok(())
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Notifications delivered across every seed.
    pub notifications: usize,
}

impl CampaignReport {
    /// True if every seed passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation encounters
/// an internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut seeds_run = 0_usize;
    let mut seeds_passed = 0_usize;
    let mut first_failure: Option<u64> = None;
    let mut failures = Vec::new();
    let mut notifications = 0_usize;

    for seed in config.seed_range.clone() {
        seeds_run += 1;
        let result = replay_seed(seed, config)?;
        notifications += result.notifications;

        if result.oracle.passed {
            seeds_passed += 1;
        } else {
            first_failure.get_or_insert(seed);
            failures.push(SeedFailure {
                seed,
                violations: result.oracle.violations.iter().map(format_violation).collect(),
            });
        }
    }

    info!(seeds_run, seeds_passed, "campaign finished");

    Ok(CampaignReport {
        seeds_run,
        seeds_passed,
        first_failure,
        failures,
        notifications,
    })
}

/// Replay a single seed with its full step trace.
///
/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<SimulationResult> {
    config.validate()?;
    Simulator::new(config.sim_config_for_seed(seed))?.run()
}

/// Format an invariant violation into a human-readable string.
pub fn format_violation(v: &InvariantViolation) -> String {
    match v {
        InvariantViolation::DuplicateId { step, id } => {
            format!("DuplicateId: step {step} holds id {id} twice")
        }
        InvariantViolation::DanglingSelection { step, id } => {
            format!("DanglingSelection: step {step} selects missing id {id}")
        }
        InvariantViolation::InputMutated { step } => {
            format!("InputMutated: step {step} changed its input collection")
        }
        InvariantViolation::NotificationCount {
            step,
            scheduled,
            delivered,
        } => {
            format!(
                "NotificationCount: step {step} scheduled {scheduled} \
                 but delivered {delivered}"
            )
        }
        InvariantViolation::NotificationTarget {
            step,
            notified,
            selected,
        } => {
            format!(
                "NotificationTarget: step {step} last notified {notified:?} \
                 but selected {selected:?}"
            )
        }
        InvariantViolation::SilentSelectionChange {
            step,
            before,
            after,
        } => {
            format!(
                "SilentSelectionChange: step {step} moved selection \
                 {before:?} -> {after:?} without notifying"
            )
        }
        InvariantViolation::UpsertNotSelected { step, key } => {
            format!("UpsertNotSelected: step {step} upserted key {key} but selection does not match")
        }
    }
}
