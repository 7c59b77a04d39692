//! Preset entity: a stable id, lifecycle flags and an owned detail.
//!
//! # Lifecycle
//!
//! - Born as a draft (`is_draft = true`, `is_intent = false`).
//! - Marked intentional by a click-selection or a protected upsert; an
//!   intentional draft is never pruned automatically.
//! - Persisted by an explicit save (`is_draft = false`).
//! - Removed outright; `is_removed` is carried for persisted data only.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::detail::Detail;
use crate::id::{DEFAULT_ID_LENGTH, cheap_random_id};

/// A user-selectable named snapshot of a detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset<D> {
    pub id: String,
    pub detail: D,
    pub is_intent: bool,
    pub is_draft: bool,
    #[serde(default)]
    pub is_removed: bool,
}

impl<D: Detail> Preset<D> {
    /// Value equality: id, all three flags and `detail.equals`.
    pub fn equals(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || (self.id == other.id
                && self.is_intent == other.is_intent
                && self.is_draft == other.is_draft
                && self.is_removed == other.is_removed
                && self.detail.equals(&other.detail))
    }

    /// Equality over shared presets, short-circuiting on identity.
    pub fn same(a: &Rc<Self>, b: &Rc<Self>) -> bool {
        Rc::ptr_eq(a, b) || a.equals(b)
    }

    /// A copy of this preset carrying a different detail.
    #[must_use]
    pub fn with_detail(&self, detail: D) -> Self {
        Self {
            detail,
            ..self.clone()
        }
    }
}

/// Caller overrides applied by a [`PresetFactory`].
#[derive(Debug, Clone)]
pub struct PresetInit<D> {
    pub id: Option<String>,
    pub detail: D,
    pub is_intent: bool,
    pub is_draft: bool,
    pub is_removed: bool,
}

impl<D> PresetInit<D> {
    /// Overrides for a fresh draft holding `detail`.
    pub fn new(detail: D) -> Self {
        Self {
            id: None,
            detail,
            is_intent: false,
            is_draft: true,
            is_removed: false,
        }
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn intent(mut self, is_intent: bool) -> Self {
        self.is_intent = is_intent;
        self
    }

    #[must_use]
    pub fn draft(mut self, is_draft: bool) -> Self {
        self.is_draft = is_draft;
        self
    }

    /// Build the preset, generating an id of `id_length` when none was given.
    pub fn build(self, id_length: usize) -> Preset<D> {
        Preset {
            id: self.id.unwrap_or_else(|| cheap_random_id(id_length)),
            detail: self.detail,
            is_intent: self.is_intent,
            is_draft: self.is_draft,
            is_removed: self.is_removed,
        }
    }

    /// Build with the default id length.
    pub fn build_default(self) -> Preset<D> {
        self.build(DEFAULT_ID_LENGTH)
    }
}

/// Builds presets for a collection.
pub type PresetFactory<D> = Rc<dyn Fn(PresetInit<D>) -> Preset<D>>;

/// The base preset shape: default flags plus a generated id.
pub fn default_factory<D: 'static>(id_length: usize) -> PresetFactory<D> {
    Rc::new(move |init: PresetInit<D>| init.build(id_length))
}
