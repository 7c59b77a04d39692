use std::collections::HashSet;

use anyhow::{Context, Result};
use presets_core::Detail;
use serde_json::Value;

use crate::{SimDetail, SimPresets};

// ── Core result types ─────────────────────────────────────────────────────────

/// Accumulated outcome of invariant checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub fn fail(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Merge another result into this one (failures accumulate).
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

/// Diagnostic information for a single failed invariant check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Two presets share an id.
    DuplicateId { step: usize, id: String },

    /// The selected id does not resolve to a preset.
    DanglingSelection { step: usize, id: String },

    /// An operation changed the collection value it was called on.
    InputMutated { step: usize },

    /// Scheduled and delivered notification counts differ.
    NotificationCount {
        step: usize,
        scheduled: usize,
        delivered: usize,
    },

    /// The last notification of a step names a different preset than the
    /// resulting selection.
    NotificationTarget {
        step: usize,
        notified: Option<String>,
        selected: Option<String>,
    },

    /// The selection changed without any notification.
    SilentSelectionChange {
        step: usize,
        before: Option<String>,
        after: Option<String>,
    },

    /// After an upsert the selection does not satisfy the upserted detail.
    UpsertNotSelected { step: usize, key: u8 },
}

// ── Checks ────────────────────────────────────────────────────────────────────

/// Invariant checks run after every simulated step.
pub struct CollectionOracle;

impl CollectionOracle {
    /// Observable state of `presets`: items, spare and selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized.
    pub fn observe(presets: &SimPresets) -> Result<Value> {
        serde_json::to_value(presets.snapshot()).context("Failed to snapshot collection")
    }

    /// The operation's input must look exactly as it did before the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized.
    pub fn check_unchanged(step: usize, input: &SimPresets, before: &Value) -> Result<OracleResult> {
        if &Self::observe(input)? == before {
            Ok(OracleResult::pass())
        } else {
            Ok(OracleResult::fail(vec![InvariantViolation::InputMutated {
                step,
            }]))
        }
    }

    /// Ids are unique and the selection resolves.
    #[must_use]
    pub fn check_structure(step: usize, presets: &SimPresets) -> OracleResult {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();
        for preset in presets.items().iter() {
            if !seen.insert(preset.id.as_str()) {
                violations.push(InvariantViolation::DuplicateId {
                    step,
                    id: preset.id.clone(),
                });
            }
        }
        if let Some(id) = presets.selected_preset_id()
            && !presets.has_id(id)
        {
            violations.push(InvariantViolation::DanglingSelection {
                step,
                id: id.to_string(),
            });
        }
        OracleResult::fail(violations)
    }

    /// Every scheduled notification is delivered, the last one names the
    /// final selection, and selection never changes silently.
    #[must_use]
    pub fn check_notifications(
        step: usize,
        scheduled: usize,
        delivered: usize,
        last_notified: Option<&Option<String>>,
        prev: &SimPresets,
        next: &SimPresets,
    ) -> OracleResult {
        let mut violations = Vec::new();
        let selected = next.selected_preset_id().map(str::to_owned);

        if scheduled != delivered {
            violations.push(InvariantViolation::NotificationCount {
                step,
                scheduled,
                delivered,
            });
        }

        if delivered > 0 {
            let notified = last_notified.cloned().flatten();
            if notified != selected {
                violations.push(InvariantViolation::NotificationTarget {
                    step,
                    notified,
                    selected,
                });
            }
        } else if prev.selected_preset_id() != next.selected_preset_id() {
            violations.push(InvariantViolation::SilentSelectionChange {
                step,
                before: prev.selected_preset_id().map(str::to_owned),
                after: selected,
            });
        }

        OracleResult::fail(violations)
    }

    /// An upsert always leaves a selection matching what was upserted.
    #[must_use]
    pub fn check_upsert_selection(step: usize, upserted: &SimDetail, next: &SimPresets) -> OracleResult {
        let matches = next
            .selected_preset()
            .is_some_and(|preset| preset.detail.satisfies(upserted));
        if matches {
            OracleResult::pass()
        } else {
            OracleResult::fail(vec![InvariantViolation::UpsertNotSelected {
                step,
                key: upserted.data().key,
            }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyedValue;
    use presets_core::SelectOptions;

    fn keyed(key: u8) -> KeyedValue {
        KeyedValue { key, value: 0 }
    }

    #[test]
    fn merge_accumulates_failures() {
        let failed = OracleResult::fail(vec![InvariantViolation::InputMutated { step: 1 }]);
        let merged = OracleResult::pass().merge(failed).merge(OracleResult::pass());
        assert!(!merged.passed);
        assert_eq!(merged.violations.len(), 1);
    }

    #[test]
    fn fail_with_no_violations_passes() {
        assert!(OracleResult::fail(Vec::new()).passed);
    }

    #[test]
    fn upsert_selection_check() {
        let presets = SimPresets::default().set_detail_data(keyed(2)).unwrap();
        let ok = CollectionOracle::check_upsert_selection(0, &SimDetail::from_data(keyed(2)), &presets);
        assert!(ok.passed);

        let bad = CollectionOracle::check_upsert_selection(0, &SimDetail::from_data(keyed(3)), &presets);
        assert_eq!(
            bad.violations,
            [InvariantViolation::UpsertNotSelected { step: 0, key: 3 }]
        );
    }

    #[test]
    fn silent_selection_change_is_flagged() {
        let prev = SimPresets::default().set_detail_data(keyed(1)).unwrap();
        let next = prev.select_preset(None, SelectOptions::default()).unwrap();
        let result = CollectionOracle::check_notifications(4, 0, 0, None, &prev, &next);
        assert!(matches!(
            result.violations.as_slice(),
            [InvariantViolation::SilentSelectionChange { step: 4, .. }]
        ));
    }

    #[test]
    fn unchanged_input_passes() {
        let presets = SimPresets::default().set_detail_data(keyed(1)).unwrap();
        let before = CollectionOracle::observe(&presets).unwrap();
        let _ = presets.set_detail_data(keyed(2)).unwrap();
        assert!(CollectionOracle::check_unchanged(0, &presets, &before).unwrap().passed);
    }
}
