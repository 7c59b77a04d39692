//! The preset collection state machine.
//!
//! A [`PresetCollection`] is an immutable value: every operation returns a new
//! collection and leaves the receiver untouched. Untouched presets, the
//! listener registry and the notification queue are shared between the two.
//!
//! # Selection
//!
//! The selection is either empty or the id of a preset that existed in the
//! collection value it was set on. Removing the selected preset clears it, or
//! moves it to a caller-supplied fallback that survived the removal. Every
//! successful selection change schedules exactly one deferred
//! [`SelectEvent`] when a listener is subscribed. Owners that subscribe must
//! drain the shared queue with [`PresetCollection::flush_events`] (or
//! [`TaskQueue::run_pending`]); jobs wait there until then.
//!
//! # Upsert
//!
//! [`PresetCollection::set_detail`] folds edits into the collection:
//!
//! 1. With nothing selected, recycle the spare draft or append a new draft.
//! 2. Otherwise merge the edit onto the selected detail.
//! 3. Look for a preset satisfying the merged detail and bring its detail up
//!    to date.
//! 4. Adopt that preset unless doing so would abandon a protected
//!    (intentional) draft in favour of another draft.
//! 5. When adopting a different preset, select it and either prune the
//!    unintentional drafts left behind or, for deliberate calls, mark every
//!    preset intentional.
//! 6. Otherwise keep editing the selected draft in place.
//! 7. A persisted selection with no match gets a fresh draft (or the spare).
//!
//! Continuous edits therefore accumulate in a single scratch draft, and an
//! edit that lands on a persisted preset snaps the selection onto it.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, instrument, warn};

use crate::config::PresetsSettings;
use crate::detail::{Detail, NoopDetail};
use crate::error::Result;
use crate::events::{ListenerId, SelectEmitter, SelectEvent, TaskQueue};
use crate::preset::{Preset, PresetFactory, PresetInit, default_factory};
use crate::sequence::PresetSequence;
use crate::trace::OperationTrace;

/// Builds details from raw payloads.
pub type DetailFactory<D> = Rc<dyn Fn(<D as Detail>::Data) -> D>;

fn default_detail_factory<D: Detail + 'static>() -> DetailFactory<D> {
    Rc::new(D::from_data)
}

/// The most recently inserted preset, kept for recycling.
#[derive(Debug)]
pub struct Spare<D> {
    /// Clamped index the preset was inserted at.
    pub index: isize,
    pub preset: Rc<Preset<D>>,
}

impl<D> Clone for Spare<D> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            preset: Rc::clone(&self.preset),
        }
    }
}

/// Flags steering [`PresetCollection::set_detail`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertFlags {
    /// The edit comes from an explicit selection.
    pub by_select: bool,
    /// The edit is deliberate; drafts it touches are protected from pruning.
    pub by_intent: bool,
    /// The edit is driven by a group preset.
    pub by_group: bool,
}

impl UpsertFlags {
    /// Flags used when a group preset writes back into its sources.
    #[must_use]
    pub const fn group() -> Self {
        Self {
            by_select: false,
            by_intent: false,
            by_group: true,
        }
    }
}

/// Options for [`PresetCollection::select_preset`].
#[derive(Debug, Clone)]
pub struct SelectOptions<D> {
    /// `Some(true)` for an explicit user click.
    pub by_click: Option<bool>,
    /// Detail merged onto the target before it is selected.
    pub overlay: Option<D>,
    pub by_group: Option<bool>,
}

impl<D> Default for SelectOptions<D> {
    fn default() -> Self {
        Self {
            by_click: None,
            overlay: None,
            by_group: None,
        }
    }
}

impl<D> SelectOptions<D> {
    /// An explicit user click.
    #[must_use]
    pub fn click() -> Self {
        Self::default().with_click(true)
    }

    #[must_use]
    pub fn with_click(mut self, by_click: bool) -> Self {
        self.by_click = Some(by_click);
        self
    }

    #[must_use]
    pub fn with_overlay(mut self, overlay: D) -> Self {
        self.overlay = Some(overlay);
        self
    }

    #[must_use]
    pub fn with_group(mut self, by_group: bool) -> Self {
        self.by_group = Some(by_group);
        self
    }
}

/// Construction options for [`PresetCollection::new`].
pub struct CollectionConfig<D: Detail> {
    pub items: Vec<Preset<D>>,
    pub selected_preset_id: Option<String>,
    pub spare: Option<Spare<D>>,
    /// Defaults to the base preset shape with generated ids.
    pub preset_factory: Option<PresetFactory<D>>,
    /// Defaults to [`Detail::from_data`].
    pub detail_factory: Option<DetailFactory<D>>,
    /// Defaults to a fresh queue.
    pub queue: Option<TaskQueue>,
    pub settings: PresetsSettings,
}

impl<D: Detail> Default for CollectionConfig<D> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected_preset_id: None,
            spare: None,
            preset_factory: None,
            detail_factory: None,
            queue: None,
            settings: PresetsSettings::default(),
        }
    }
}

impl<D: Detail> CollectionConfig<D> {
    #[must_use]
    pub fn items(mut self, items: Vec<Preset<D>>) -> Self {
        self.items = items;
        self
    }

    #[must_use]
    pub fn selected(mut self, id: impl Into<String>) -> Self {
        self.selected_preset_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn spare(mut self, spare: Spare<D>) -> Self {
        self.spare = Some(spare);
        self
    }

    #[must_use]
    pub fn preset_factory(mut self, factory: PresetFactory<D>) -> Self {
        self.preset_factory = Some(factory);
        self
    }

    #[must_use]
    pub fn detail_factory(mut self, factory: DetailFactory<D>) -> Self {
        self.detail_factory = Some(factory);
        self
    }

    /// Share a notification queue with other collections.
    #[must_use]
    pub fn queue(mut self, queue: TaskQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: PresetsSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Ordered, id-unique, immutable collection of presets with a selection.
pub struct PresetCollection<D: Detail = NoopDetail<serde_json::Value>> {
    items: PresetSequence<D>,
    selected_preset_id: Option<String>,
    spare: Option<Spare<D>>,
    preset_factory: PresetFactory<D>,
    detail_factory: DetailFactory<D>,
    emitter: SelectEmitter<D>,
    queue: TaskQueue,
    trace: bool,
}

impl<D: Detail> Clone for PresetCollection<D> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            selected_preset_id: self.selected_preset_id.clone(),
            spare: self.spare.clone(),
            preset_factory: Rc::clone(&self.preset_factory),
            detail_factory: Rc::clone(&self.detail_factory),
            emitter: self.emitter.clone(),
            queue: self.queue.clone(),
            trace: self.trace,
        }
    }
}

impl<D: Detail> fmt::Debug for PresetCollection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresetCollection")
            .field("items", &self.items)
            .field("selected_preset_id", &self.selected_preset_id)
            .field("spare", &self.spare)
            .finish_non_exhaustive()
    }
}

impl<D: Detail + 'static> Default for PresetCollection<D> {
    fn default() -> Self {
        let settings = PresetsSettings::default();
        Self {
            items: PresetSequence::default(),
            selected_preset_id: None,
            spare: None,
            preset_factory: default_factory(settings.id_length),
            detail_factory: default_detail_factory(),
            emitter: SelectEmitter::default(),
            queue: TaskQueue::default(),
            trace: settings.trace_operations,
        }
    }
}

impl<D: Detail + 'static> PresetCollection<D> {
    /// Build a collection from `config`.
    ///
    /// The selected id is taken as given; a stale id reads as no selection.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::DuplicateId`](crate::PresetError::DuplicateId)
    /// if two items share an id.
    pub fn new(config: CollectionConfig<D>) -> Result<Self> {
        let CollectionConfig {
            items,
            selected_preset_id,
            spare,
            preset_factory,
            detail_factory,
            queue,
            settings,
        } = config;

        Ok(Self {
            items: PresetSequence::from_presets(items)?,
            selected_preset_id,
            spare,
            preset_factory: preset_factory.unwrap_or_else(|| default_factory(settings.id_length)),
            detail_factory: detail_factory.unwrap_or_else(default_detail_factory),
            emitter: SelectEmitter::default(),
            queue: queue.unwrap_or_default(),
            trace: settings.trace_operations,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub const fn items(&self) -> &PresetSequence<D> {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`](crate::PresetError::NotFound) if `id`
    /// is not present.
    pub fn get_by_id(&self, id: &str) -> Result<&Rc<Preset<D>>> {
        self.items.get_by_id(id)
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.items.has_id(id)
    }

    pub fn selected_preset_id(&self) -> Option<&str> {
        self.selected_preset_id.as_deref()
    }

    /// The selected preset, or `None` when nothing is selected.
    ///
    /// A selected id that no longer resolves also yields `None`, with a
    /// warning.
    pub fn selected_preset(&self) -> Option<Rc<Preset<D>>> {
        let id = self.selected_preset_id.as_deref()?;
        match self.items.get_by_id(id) {
            Ok(preset) => Some(Rc::clone(preset)),
            Err(err) => {
                warn!(%err, "selected preset id does not resolve");
                None
            }
        }
    }

    pub const fn spare(&self) -> Option<&Spare<D>> {
        self.spare.as_ref()
    }

    /// The queue select notifications are scheduled on.
    pub const fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Deliver every pending notification. Returns how many jobs ran.
    pub fn flush_events(&self) -> usize {
        self.queue.run_pending()
    }

    pub const fn emitter(&self) -> &SelectEmitter<D> {
        &self.emitter
    }

    /// Listen for `select` events on this collection and every value derived
    /// from it.
    pub fn subscribe(&self, listener: impl Fn(&SelectEvent<D>) + 'static) -> ListenerId {
        self.emitter.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.emitter.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Factories
    // -----------------------------------------------------------------------

    /// Wrap a payload with this collection's detail factory.
    pub fn detail(&self, data: D::Data) -> D {
        (self.detail_factory)(data)
    }

    /// Build a preset with this collection's preset factory.
    ///
    /// The collection itself is not modified.
    pub fn create(&self, init: PresetInit<D>) -> Preset<D> {
        (self.preset_factory)(init)
    }

    pub fn create_with_detail(&self, detail: D) -> Preset<D> {
        self.create(PresetInit::new(detail))
    }

    pub fn create_with_detail_data(&self, data: D::Data) -> Preset<D> {
        self.create_with_detail(self.detail(data))
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Find a preset whose detail satisfies `detail`.
    ///
    /// Among several matches the first persisted one wins, else the first
    /// match in sequence order.
    pub fn get_by_detail(&self, detail: &D) -> Option<Rc<Preset<D>>> {
        let mut first = None;
        for preset in self.items.iter() {
            if !preset.detail.satisfies(detail) {
                continue;
            }
            if !preset.is_draft {
                return Some(Rc::clone(preset));
            }
            first.get_or_insert_with(|| Rc::clone(preset));
        }
        first
    }

    /// Value equality, independent of preset order.
    pub fn equals(&self, other: &Self) -> bool {
        if self.len() != other.len() || self.selected_preset_id != other.selected_preset_id {
            return false;
        }
        let selected_match = match (self.selected_preset(), other.selected_preset()) {
            (Some(a), Some(b)) => Preset::same(&a, &b),
            (None, None) => true,
            _ => false,
        };
        selected_match
            && self
                .items
                .iter()
                .all(|a| other.items.iter().any(|b| Preset::same(a, b)))
    }

    // -----------------------------------------------------------------------
    // Structural edits
    // -----------------------------------------------------------------------

    /// Insert `preset` at `index` (clamped to `[-1, len]`) and remember it as
    /// the spare.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::DuplicateId`](crate::PresetError::DuplicateId)
    /// if the id is already present.
    pub fn insert_at(&self, index: isize, preset: Preset<D>) -> Result<Self> {
        let result = self.insert_shared(index, Rc::new(preset));
        self.traced("insert_at", result)
    }

    fn insert_shared(&self, index: isize, preset: Rc<Preset<D>>) -> Result<Self> {
        let index = self.items.clamp_index(index);
        let mut next = self.clone();
        next.items = self.items.insert_at(index, Rc::clone(&preset))?;
        next.spare = Some(Spare { index, preset });
        Ok(next)
    }

    fn tail_index(&self) -> isize {
        isize::try_from(self.items.len()).unwrap_or(isize::MAX)
    }

    /// Remove the preset `id`.
    ///
    /// If it was selected, the selection moves to `fallback_id` when that id
    /// survives the removal, and is cleared otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`](crate::PresetError::NotFound) if `id`
    /// is not present.
    pub fn remove_by_id(&self, id: &str, fallback_id: Option<&str>) -> Result<Self> {
        let result = self.remove_inner(id, fallback_id);
        self.traced("remove_by_id", result)
    }

    fn remove_inner(&self, id: &str, fallback_id: Option<&str>) -> Result<Self> {
        let mut next = self.clone();
        next.items = self.items.remove_by_id(id)?;

        if self.selected_preset_id() != Some(id) {
            return Ok(next);
        }

        let reselect = fallback_id.filter(|fallback| next.has_id(fallback));
        debug!(removed = id, ?reselect, "removed selected preset");
        next.select_inner(
            reselect,
            SelectOptions::default().with_click(false),
            self.selected_preset(),
        )
    }

    /// Mark `id` as persisted.
    ///
    /// A saved preset stops being the spare.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`](crate::PresetError::NotFound) if `id`
    /// is not present.
    pub fn save_preset(&self, id: &str) -> Result<Self> {
        let result = self
            .items
            .update_by_id(id, |p| Preset {
                is_draft: false,
                ..p.clone()
            })
            .map(|items| {
                let mut next = self.clone();
                next.items = items;
                if next.spare.as_ref().is_some_and(|s| s.preset.id == id) {
                    next.spare = None;
                }
                next
            });
        self.traced("save_preset", result)
    }

    fn prune_drafts(&self, keep_id: &str) -> Result<Self> {
        let doomed: Vec<String> = self
            .items
            .iter()
            .filter(|p| p.id != keep_id && p.is_draft && !p.is_intent)
            .map(|p| p.id.clone())
            .collect();

        if !doomed.is_empty() {
            debug!(count = doomed.len(), kept = keep_id, "pruning abandoned drafts");
        }

        doomed
            .iter()
            .try_fold(self.clone(), |presets, id| presets.remove_by_id(id, None))
    }

    fn mark_all_intentional(&self) -> Self {
        let mut next = self.clone();
        next.items = self.items.merge_each(|p| Preset {
            is_intent: true,
            ..p.clone()
        });
        next
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Select `next_id`, or clear the selection with `None`.
    ///
    /// - A click (`by_click = Some(true)`) marks every preset intentional and
    ///   forfeits the spare.
    /// - An overlay is merged onto the target's detail, which is stored
    ///   before the selection is finalized.
    ///
    /// A notification is scheduled for every successful call.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`](crate::PresetError::NotFound) if
    /// `next_id` is not present.
    pub fn select_preset(&self, next_id: Option<&str>, options: SelectOptions<D>) -> Result<Self> {
        let result = self.select_inner(next_id, options, self.selected_preset());
        self.traced("select_preset", result)
    }

    fn select_inner(
        &self,
        next_id: Option<&str>,
        options: SelectOptions<D>,
        prev: Option<Rc<Preset<D>>>,
    ) -> Result<Self> {
        let SelectOptions {
            by_click,
            overlay,
            by_group,
        } = options;
        let clicked = by_click == Some(true);

        let target = next_id
            .map(|id| self.items.get_by_id(id).cloned())
            .transpose()?;
        let merged = target
            .as_ref()
            .zip(overlay.as_ref())
            .map(|(preset, overlay)| preset.detail.merge(overlay));

        let mut presets = if clicked {
            let mut marked = self.mark_all_intentional();
            marked.spare = None;
            marked
        } else {
            self.clone()
        };

        if let (Some(id), Some(detail)) = (next_id, merged) {
            presets.items = presets.items.update_by_id(id, |p| p.with_detail(detail))?;
        }

        let next = match next_id {
            Some(id) => Some(Rc::clone(presets.items.get_by_id(id)?)),
            None => None,
        };
        presets.selected_preset_id = next_id.map(str::to_owned);

        debug!(
            next = ?next_id,
            prev = ?prev.as_ref().map(|p| p.id.as_str()),
            ?by_click,
            ?by_group,
            "selection scheduled for notification"
        );

        let event = SelectEvent {
            next_detail: next.as_ref().map(|p| p.detail.copy()),
            prev_detail: prev.as_ref().map(|p| p.detail.copy()),
            next,
            prev,
            by_click,
            by_group,
        };
        presets.emitter.schedule(&presets.queue, event);

        Ok(presets)
    }

    /// Re-select the spare draft with `overlay` merged in.
    ///
    /// A spare that was removed since it was inserted is appended again.
    /// Returns `None` when there is no spare, or it has been saved or marked
    /// intentional.
    ///
    /// # Errors
    ///
    /// Propagates failures from re-inserting or selecting the spare.
    pub fn restore_spare(&self, overlay: &D) -> Result<Option<Self>> {
        let Some(spare) = &self.spare else {
            return Ok(None);
        };
        if spare.preset.is_intent || !spare.preset.is_draft {
            return Ok(None);
        }

        let preset = Rc::clone(&spare.preset);
        let presets = if self.has_id(&preset.id) {
            self.clone()
        } else {
            debug!(id = %preset.id, "re-inserting removed spare draft");
            self.insert_shared(self.tail_index(), Rc::clone(&preset))?
        };

        presets
            .select_preset(
                Some(&preset.id),
                SelectOptions::default()
                    .with_click(false)
                    .with_overlay(overlay.clone()),
            )
            .map(Some)
    }

    fn append_and_select(&self, preset: Preset<D>) -> Result<Self> {
        let id = preset.id.clone();
        self.insert_shared(self.tail_index(), Rc::new(preset))?
            .select_preset(Some(&id), SelectOptions::default())
    }

    // -----------------------------------------------------------------------
    // Upsert
    // -----------------------------------------------------------------------

    /// Fold `data` into the collection with default flags.
    ///
    /// # Errors
    ///
    /// See [`PresetCollection::set_detail`].
    pub fn set_detail_data(&self, data: D::Data) -> Result<Self> {
        self.set_detail_data_with(data, UpsertFlags::default())
    }

    /// Fold `data` into the collection.
    ///
    /// # Errors
    ///
    /// See [`PresetCollection::set_detail`].
    pub fn set_detail_data_with(&self, data: D::Data, flags: UpsertFlags) -> Result<Self> {
        self.set_detail(self.detail(data), flags)
    }

    /// Fold `new_detail` into the collection: the match-or-create upsert.
    ///
    /// # Errors
    ///
    /// Only fails if the collection is internally inconsistent, e.g. a spare
    /// whose id collides with another preset.
    #[instrument(level = "trace", skip(self, new_detail))]
    pub fn set_detail(&self, new_detail: D, flags: UpsertFlags) -> Result<Self> {
        let result = self.upsert(new_detail, flags);
        self.traced("set_detail", result)
    }

    fn upsert(&self, new_detail: D, flags: UpsertFlags) -> Result<Self> {
        let Some(current) = self.selected_preset() else {
            if let Some(restored) = self.restore_spare(&new_detail)? {
                debug!("nothing selected: recycled spare draft");
                return Ok(restored);
            }
            let preset = self.create(PresetInit::new(new_detail).intent(flags.by_intent));
            debug!(id = %preset.id, "nothing selected: appending new draft");
            return self.append_and_select(preset);
        };

        let merged = current.detail.merge(&new_detail);
        let mut presets = self.clone();

        if let Some(found) = self.get_by_detail(&merged) {
            if !merged.equals(&found.detail) {
                let detail = merged.clone();
                presets.items = presets
                    .items
                    .update_by_id(&found.id, |p| p.with_detail(detail))?;
            }

            let protected_draft = current.is_draft && current.is_intent && found.is_draft;
            if Rc::ptr_eq(&current, &found) || !protected_draft {
                if flags.by_select || presets.selected_preset_id() != Some(found.id.as_str()) {
                    debug!(id = %found.id, "adopting matching preset");
                    presets = presets.select_preset(
                        Some(&found.id),
                        SelectOptions::default().with_click(flags.by_select),
                    )?;
                    return if flags.by_intent || flags.by_select {
                        Ok(presets.mark_all_intentional())
                    } else {
                        presets.prune_drafts(&found.id)
                    };
                }
                // Already selected, draft or not: the detail update is all.
                return Ok(presets);
            }
        }

        if current.is_draft {
            debug!(id = %current.id, "editing selected draft in place");
            return presets.select_preset(
                Some(&current.id),
                SelectOptions::default()
                    .with_click(false)
                    .with_overlay(new_detail)
                    .with_group(flags.by_group),
            );
        }

        if let Some(restored) = presets.restore_spare(&new_detail)? {
            debug!("persisted selection: recycled spare draft");
            return Ok(restored);
        }

        let preset = self.create(PresetInit::new(merged).intent(flags.by_intent));
        debug!(id = %preset.id, "persisted selection: appending new draft");
        presets.append_and_select(preset)
    }

    fn traced(&self, operation: &str, result: Result<Self>) -> Result<Self> {
        if self.trace
            && let Ok(next) = &result
        {
            OperationTrace {
                operation: operation.to_string(),
                len_before: self.len(),
                len_after: next.len(),
                selected_before: self.selected_preset_id.clone(),
                selected_after: next.selected_preset_id.clone(),
            }
            .emit();
        }
        result
    }
}
