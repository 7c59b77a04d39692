//! Copy-on-write ordered sequence of presets with an id index.
//!
//! Every operation returns a new sequence. Presets are held behind `Rc`, so a
//! derived sequence shares every untouched preset with its source; only the
//! pointer vector and the id index are rebuilt.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{PresetError, Result};
use crate::preset::Preset;

/// Ordered, id-unique, immutable list of presets.
#[derive(Debug)]
pub struct PresetSequence<D> {
    items: Vec<Rc<Preset<D>>>,
    index: HashMap<String, usize>,
}

impl<D> Clone for PresetSequence<D> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            index: self.index.clone(),
        }
    }
}

impl<D> Default for PresetSequence<D> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<D> PresetSequence<D> {
    /// Build from shared presets.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::DuplicateId`] if two presets share an id.
    pub fn from_shared(items: Vec<Rc<Preset<D>>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (i, preset) in items.iter().enumerate() {
            if index.insert(preset.id.clone(), i).is_some() {
                return Err(PresetError::DuplicateId {
                    id: preset.id.clone(),
                });
            }
        }
        Ok(Self { items, index })
    }

    /// Build from owned presets.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::DuplicateId`] if two presets share an id.
    pub fn from_presets(items: impl IntoIterator<Item = Preset<D>>) -> Result<Self> {
        Self::from_shared(items.into_iter().map(Rc::new).collect())
    }

    fn reindexed(items: Vec<Rc<Preset<D>>>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        Self { items, index }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Preset<D>>> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Rc<Preset<D>>] {
        &self.items
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of `id` in sequence order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Look up a preset by id.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] if `id` is not present.
    pub fn get_by_id(&self, id: &str) -> Result<&Rc<Preset<D>>> {
        self.position(id)
            .map(|i| &self.items[i])
            .ok_or_else(|| PresetError::not_found(id))
    }

    /// Replace the preset at `id` with `f(old)`.
    ///
    /// The replacement keeps its position. Its id must stay the same.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] if `id` is not present.
    pub fn update_by_id(&self, id: &str, f: impl FnOnce(&Preset<D>) -> Preset<D>) -> Result<Self> {
        let i = self.position(id).ok_or_else(|| PresetError::not_found(id))?;
        let updated = f(&self.items[i]);
        debug_assert_eq!(updated.id, id, "update must not change the preset id");
        let mut next = self.clone();
        next.items[i] = Rc::new(updated);
        Ok(next)
    }

    /// Remove the preset at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] if `id` is not present.
    pub fn remove_by_id(&self, id: &str) -> Result<Self> {
        let i = self.position(id).ok_or_else(|| PresetError::not_found(id))?;
        let mut items = self.items.clone();
        items.remove(i);
        Ok(Self::reindexed(items))
    }

    /// Clamp a requested insertion index to `[-1, len]`.
    pub fn clamp_index(&self, index: isize) -> isize {
        let len = isize::try_from(self.items.len()).unwrap_or(isize::MAX);
        index.clamp(-1, len)
    }

    /// Insert `preset` at `index`, clamped to `[-1, len]`.
    ///
    /// `-1` inserts before the last element, as a negative splice index does.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::DuplicateId`] if the id is already present.
    pub fn insert_at(&self, index: isize, preset: Rc<Preset<D>>) -> Result<Self> {
        if self.has_id(&preset.id) {
            return Err(PresetError::DuplicateId {
                id: preset.id.clone(),
            });
        }
        let at = match usize::try_from(self.clamp_index(index)) {
            Ok(at) => at,
            Err(_) => self.items.len().saturating_sub(1),
        };
        let mut items = self.items.clone();
        items.insert(at, preset);
        Ok(Self::reindexed(items))
    }

    /// Apply `f` to every preset.
    #[must_use]
    pub fn merge_each(&self, f: impl Fn(&Preset<D>) -> Preset<D>) -> Self {
        Self::reindexed(self.items.iter().map(|p| Rc::new(f(p))).collect())
    }
}
