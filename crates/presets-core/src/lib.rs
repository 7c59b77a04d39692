//! presets-core library.
//!
//! An ordered, immutable collection of presets: named snapshots of a domain
//! payload (a [`Detail`]) with draft/intent lifecycle flags, merge-based upsert
//! and deferred selection notifications. [`GroupDetail`] composes the current
//! selections of several collections into a single detail.
//!
//! ```text
//! Detail (contract)        NoopDetail, GroupDetail, domain types
//!   └── Preset             id + flags + owned detail
//!         └── PresetSequence   copy-on-write ordered id index
//!               └── PresetCollection  selection, spare slot, upsert/prune
//!                     └── SelectEmitter + TaskQueue   deferred notifications
//! ```
//!
//! # Conventions
//!
//! - **Errors**: write-path operations return `Result<_, PresetError>`;
//!   configuration parsing uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`debug!`, `warn!`, `trace!`).

pub mod collection;
pub mod config;
pub mod detail;
pub mod error;
pub mod events;
pub mod group;
pub mod id;
pub mod preset;
pub mod sequence;
pub mod snapshot;
pub mod trace;

pub use collection::{
    CollectionConfig, DetailFactory, PresetCollection, SelectOptions, Spare, UpsertFlags,
};
pub use config::PresetsSettings;
pub use detail::{Detail, NoopDetail};
pub use error::{PresetError, Result};
pub use events::{ListenerId, SelectEmitter, SelectEvent, TaskQueue};
pub use group::{GroupData, GroupDetail, SourceMap};
pub use preset::{Preset, PresetFactory, PresetInit};
pub use sequence::PresetSequence;
pub use snapshot::{CollectionSnapshot, SpareSnapshot};
