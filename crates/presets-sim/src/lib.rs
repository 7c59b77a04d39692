//! presets-sim library.
//!
//! Drives a [`PresetCollection`] through seeded random operation streams and
//! checks collection invariants after every step.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod campaign;
pub mod oracle;
pub mod rng;

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use presets_core::{
    CollectionConfig, Detail, PresetCollection, PresetsSettings, SelectOptions, UpsertFlags,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::oracle::{CollectionOracle, OracleResult};
use crate::rng::SimRng;

/// Payload of [`SimDetail`]: a match key and a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedValue {
    pub key: u8,
    pub value: u32,
}

/// Detail matched by key and compared by key and value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimDetail(KeyedValue);

impl Detail for SimDetail {
    type Data = KeyedValue;

    fn from_data(data: KeyedValue) -> Self {
        Self(data)
    }

    fn data(&self) -> &KeyedValue {
        &self.0
    }

    fn into_data(self) -> KeyedValue {
        self.0
    }

    fn equals(&self, other: &Self) -> bool {
        self.0 == other.0
    }

    fn satisfies(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }

    fn merge(&self, overlay: &Self) -> Self {
        Self(overlay.0)
    }
}

pub type SimPresets = PresetCollection<SimDetail>;

/// One simulated user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimOp {
    Upsert { data: KeyedValue, intent: bool },
    Select { id: String },
    Click { id: String },
    Deselect,
    Save { id: String },
    Remove { id: String, fallback: Option<String> },
}

impl SimOp {
    /// Short name for traces.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Upsert { .. } => "upsert",
            Self::Select { .. } => "select",
            Self::Click { .. } => "click",
            Self::Deselect => "deselect",
            Self::Save { .. } => "save",
            Self::Remove { .. } => "remove",
        }
    }

    /// Apply to `presets`, producing the next collection value.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection rejects the operation.
    pub fn apply(&self, presets: &SimPresets) -> Result<SimPresets> {
        let next = match self {
            Self::Upsert { data, intent } => presets.set_detail_data_with(
                *data,
                UpsertFlags {
                    by_intent: *intent,
                    ..UpsertFlags::default()
                },
            ),
            Self::Select { id } => presets.select_preset(Some(id), SelectOptions::default()),
            Self::Click { id } => presets.select_preset(Some(id), SelectOptions::click()),
            Self::Deselect => presets.select_preset(None, SelectOptions::default()),
            Self::Save { id } => presets.save_preset(id),
            Self::Remove { id, fallback } => presets.remove_by_id(id, fallback.as_deref()),
        };
        next.with_context(|| format!("{} failed", self.label()))
    }
}

/// Parameters for one simulated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Operations per run.
    pub steps: usize,
    /// Number of distinct match keys upserts draw from.
    pub key_space: u8,
    /// Share of upserts flagged intentional (percent, 0-100).
    pub intent_percent: u8,
    /// Share of steps that save a preset (percent, 0-100).
    pub save_percent: u8,
    /// Share of steps that remove a preset (percent, 0-100).
    pub remove_percent: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            steps: 64,
            key_space: 4,
            intent_percent: 10,
            save_percent: 15,
            remove_percent: 10,
        }
    }
}

/// What happened at one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub op: SimOp,
    pub len: usize,
    pub selected: Option<String>,
    /// Select notifications delivered after the step.
    pub notifications: usize,
}

/// Outcome of [`Simulator::run`].
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub trace: Vec<StepRecord>,
    pub oracle: OracleResult,
    /// Total notifications delivered over the run.
    pub notifications: usize,
    pub final_len: usize,
}

/// Runs one seeded operation stream against a fresh collection.
#[derive(Debug)]
pub struct Simulator {
    config: SimulationConfig,
    rng: SimRng,
}

impl Simulator {
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if config.key_space == 0 {
            bail!("key_space must be > 0");
        }
        if u16::from(config.save_percent) + u16::from(config.remove_percent) > 100 {
            bail!("save_percent + remove_percent must not exceed 100");
        }
        Ok(Self {
            rng: SimRng::seeded(config.seed),
            config,
        })
    }

    fn random_id(&mut self, presets: &SimPresets) -> Option<String> {
        self.rng
            .pick(presets.items().as_slice())
            .map(|preset| preset.id.clone())
    }

    /// Choose the next operation for `presets`.
    pub fn next_op(&mut self, presets: &SimPresets) -> SimOp {
        let roll = self.rng.below(100);
        let save = u64::from(self.config.save_percent);
        let remove = save + u64::from(self.config.remove_percent);

        if roll < save
            && let Some(id) = self.random_id(presets)
        {
            return SimOp::Save { id };
        }
        if (save..remove).contains(&roll)
            && let Some(id) = self.random_id(presets)
        {
            let fallback = self.random_id(presets);
            return SimOp::Remove { id, fallback };
        }

        match self.rng.below(10) {
            0..=4 => SimOp::Upsert {
                data: KeyedValue {
                    key: u8::try_from(self.rng.below(u64::from(self.config.key_space)))
                        .unwrap_or(0),
                    value: u32::try_from(self.rng.below(4)).unwrap_or(0),
                },
                intent: self.rng.chance(self.config.intent_percent),
            },
            5..=6 => self
                .random_id(presets)
                .map_or(SimOp::Deselect, |id| SimOp::Select { id }),
            7..=8 => self
                .random_id(presets)
                .map_or(SimOp::Deselect, |id| SimOp::Click { id }),
            _ => SimOp::Deselect,
        }
    }

    /// Run every step, checking invariants as it goes.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection rejects a generated operation.
    pub fn run(&mut self) -> Result<SimulationResult> {
        let settings = PresetsSettings::from_env();
        let mut presets: SimPresets =
            PresetCollection::new(CollectionConfig::default().settings(settings))?;

        let delivered = Rc::new(RefCell::new(Vec::<Option<String>>::new()));
        let sink = Rc::clone(&delivered);
        presets.subscribe(move |event| {
            sink.borrow_mut()
                .push(event.next.as_ref().map(|p| p.id.clone()));
        });

        let mut trace = Vec::with_capacity(self.config.steps);
        let mut oracle = OracleResult::pass();

        for step in 0..self.config.steps {
            let op = self.next_op(&presets);
            let before = CollectionOracle::observe(&presets)?;
            let next = op.apply(&presets)?;

            let scheduled = next.queue().pending();
            let seen_before = delivered.borrow().len();
            next.flush_events();
            let notifications = delivered.borrow().len() - seen_before;
            let last_notified = delivered.borrow().last().cloned();

            oracle = oracle
                .merge(CollectionOracle::check_unchanged(step, &presets, &before)?)
                .merge(CollectionOracle::check_structure(step, &next))
                .merge(CollectionOracle::check_notifications(
                    step,
                    scheduled,
                    notifications,
                    last_notified.as_ref(),
                    &presets,
                    &next,
                ));
            if let SimOp::Upsert { data, .. } = &op {
                oracle = oracle.merge(CollectionOracle::check_upsert_selection(
                    step,
                    &SimDetail::from_data(*data),
                    &next,
                ));
            }

            trace!(step, op = op.label(), len = next.len(), "simulated step");
            trace.push(StepRecord {
                step,
                op,
                len: next.len(),
                selected: next.selected_preset_id().map(str::to_owned),
                notifications,
            });
            presets = next;
        }

        let notifications = delivered.borrow().len();
        debug!(
            seed = self.config.seed,
            steps = self.config.steps,
            notifications,
            passed = oracle.passed,
            "simulation finished"
        );

        Ok(SimulationResult {
            trace,
            oracle,
            notifications,
            final_len: presets.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key_space() {
        let config = SimulationConfig {
            key_space: 0,
            ..SimulationConfig::default()
        };
        assert!(Simulator::new(config).is_err());
    }

    #[test]
    fn rejects_overfull_percentages() {
        let config = SimulationConfig {
            save_percent: 60,
            remove_percent: 50,
            ..SimulationConfig::default()
        };
        assert!(Simulator::new(config).is_err());
    }

    #[test]
    fn default_run_passes_oracle() {
        let mut sim = Simulator::new(SimulationConfig::default()).unwrap();
        let result = sim.run().unwrap();
        assert_eq!(result.trace.len(), 64);
        assert!(result.oracle.passed, "{:?}", result.oracle.violations);
    }

    #[test]
    fn runs_are_reproducible() {
        let config = SimulationConfig {
            seed: 11,
            ..SimulationConfig::default()
        };
        let a = Simulator::new(config.clone()).unwrap().run().unwrap();
        let b = Simulator::new(config).unwrap().run().unwrap();
        let ops = |r: &SimulationResult| r.trace.iter().map(|s| s.op.label()).collect::<Vec<_>>();
        assert_eq!(ops(&a), ops(&b));
        assert_eq!(a.final_len, b.final_len);
    }

    #[test]
    fn sim_detail_matches_by_key() {
        let a = SimDetail::from_data(KeyedValue { key: 1, value: 1 });
        let b = SimDetail::from_data(KeyedValue { key: 1, value: 2 });
        assert!(a.satisfies(&b));
        assert!(!a.equals(&b));
        assert_eq!(a.merge(&b).data(), b.data());
    }
}
