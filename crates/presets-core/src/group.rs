//! Group presets: one detail composed from the selections of several named
//! collections.
//!
//! A [`GroupDetail`] stores `(name, detail)` pairs captured from its sources.
//! Applying it writes each captured detail back into the same-named source
//! through the regular upsert path, flagged as group-driven, so the sources
//! re-select, adopt or draft exactly as they would for a direct edit.
//!
//! Only the captured pairs are serialized. Live source collections are a
//! runtime attachment and never leave the process.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collection::{PresetCollection, UpsertFlags};
use crate::detail::Detail;
use crate::error::{PresetError, Result};

/// Named source collections, in insertion order.
pub struct SourceMap<D: Detail> {
    entries: Vec<(String, PresetCollection<D>)>,
}

impl<D: Detail> Clone for SourceMap<D> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<D: Detail> Default for SourceMap<D> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<D: Detail> std::fmt::Debug for SourceMap<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, coll)| (name, coll)))
            .finish()
    }
}

impl<D: Detail> SourceMap<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`. A replaced entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, presets: PresetCollection<D>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = presets,
            None => self.entries.push((name, presets)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PresetCollection<D>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, presets)| presets)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PresetCollection<D>)> {
        self.entries.iter().map(|(name, presets)| (name.as_str(), presets))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<D: Detail, S: Into<String>> FromIterator<(S, PresetCollection<D>)> for SourceMap<D> {
    fn from_iter<I: IntoIterator<Item = (S, PresetCollection<D>)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (name, presets) in iter {
            map.insert(name, presets);
        }
        map
    }
}

/// Payload of a [`GroupDetail`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "D: Serialize", deserialize = "D: Deserialize<'de>"))]
pub struct GroupData<D: Detail> {
    /// Captured `(source name, detail)` pairs.
    pub details: Vec<(String, D)>,
    /// Live source collections, present only at runtime.
    #[serde(skip)]
    pub sources: Option<SourceMap<D>>,
}

impl<D: Detail> Default for GroupData<D> {
    fn default() -> Self {
        Self {
            details: Vec::new(),
            sources: None,
        }
    }
}

/// Detail whose payload is the selections of several named collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(serialize = "D: Serialize", deserialize = "D: Deserialize<'de>"))]
pub struct GroupDetail<D: Detail> {
    data: GroupData<D>,
}

impl<D: Detail> Default for GroupDetail<D> {
    fn default() -> Self {
        Self {
            data: GroupData::default(),
        }
    }
}

impl<D: Detail + 'static> GroupDetail<D> {
    /// A group holding `details` with no live sources attached.
    pub fn new(details: Vec<(String, D)>) -> Self {
        Self {
            data: GroupData {
                details,
                sources: None,
            },
        }
    }

    pub fn details(&self) -> &[(String, D)] {
        &self.data.details
    }

    pub const fn sources(&self) -> Option<&SourceMap<D>> {
        self.data.sources.as_ref()
    }

    /// Capture the current selection of every source.
    ///
    /// Sources with nothing selected (or a stale selection) contribute no
    /// entry. The sources themselves are attached to the result.
    #[must_use]
    pub fn collect_data(&self, sources: &SourceMap<D>) -> Self {
        let details = sources
            .iter()
            .filter_map(|(name, presets)| {
                presets
                    .selected_preset()
                    .map(|preset| (name.to_string(), preset.detail.copy()))
            })
            .collect::<Vec<_>>();

        debug!(
            sources = sources.len(),
            captured = details.len(),
            "collected group detail"
        );

        Self {
            data: GroupData {
                details,
                sources: Some(sources.clone()),
            },
        }
    }

    /// Shorthand for [`Self::collect_data`] on an empty group.
    pub fn from_sources(sources: &SourceMap<D>) -> Self {
        Self::default().collect_data(sources)
    }

    /// Write each captured detail into its named source.
    ///
    /// A source whose selection already equals the captured detail is
    /// returned as-is; any other source goes through
    /// [`PresetCollection::set_detail`] flagged as group-driven. Entries
    /// naming an unknown source are skipped. Without attached sources the
    /// result is empty.
    ///
    /// # Errors
    ///
    /// Propagates failures from a source's upsert.
    pub fn apply_data(&self, data: &GroupData<D>) -> Result<SourceMap<D>> {
        self.apply_with(data, false)
    }

    /// Like [`Self::apply_data`], but an entry naming an unknown source is an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::UnknownSource`] for an unknown name, or
    /// propagates failures from a source's upsert.
    pub fn apply_data_strict(&self, data: &GroupData<D>) -> Result<SourceMap<D>> {
        self.apply_with(data, true)
    }

    /// Apply this group's own data to its attached sources.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_data`].
    pub fn apply(&self) -> Result<SourceMap<D>> {
        self.apply_data(&self.data)
    }

    fn apply_with(&self, data: &GroupData<D>, strict: bool) -> Result<SourceMap<D>> {
        let Some(sources) = &data.sources else {
            return Ok(SourceMap::default());
        };

        let mut applied = SourceMap::new();
        for (name, detail) in &data.details {
            let Some(presets) = sources.get(name) else {
                if strict {
                    return Err(PresetError::UnknownSource { name: name.clone() });
                }
                warn!(source = %name, "group detail names an unknown source, skipping");
                continue;
            };

            let in_sync = presets
                .selected_preset()
                .is_some_and(|selected| selected.detail.equals(detail));

            let next = if in_sync {
                presets.clone()
            } else {
                debug!(source = %name, "applying group detail to source");
                presets.set_detail(detail.copy(), UpsertFlags::group())?
            };
            applied.insert(name.clone(), next);
        }
        Ok(applied)
    }
}

impl<D: Detail + 'static> Detail for GroupDetail<D> {
    type Data = GroupData<D>;

    fn from_data(data: GroupData<D>) -> Self {
        Self { data }
    }

    fn data(&self) -> &GroupData<D> {
        &self.data
    }

    fn into_data(self) -> GroupData<D> {
        self.data
    }

    /// Same number of entries, each matched by name and detail equality.
    fn equals(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || (self.data.details.len() == other.data.details.len()
                && self.data.details.iter().all(|(name, detail)| {
                    other
                        .data
                        .details
                        .iter()
                        .any(|(other_name, other_detail)| {
                            name == other_name && detail.equals(other_detail)
                        })
                }))
    }

    /// Every own entry satisfies some entry of `other`, whatever its name.
    fn satisfies(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || self.data.details.iter().all(|(_, detail)| {
                other
                    .data
                    .details
                    .iter()
                    .any(|(_, other_detail)| detail.satisfies(other_detail))
            })
    }

    /// The overlay replaces every entry and its sources are adopted.
    fn merge(&self, overlay: &Self) -> Self {
        Self {
            data: GroupData {
                details: overlay
                    .data
                    .details
                    .iter()
                    .map(|(name, detail)| (name.clone(), detail.copy()))
                    .collect(),
                sources: overlay.data.sources.clone(),
            },
        }
    }

    /// Captured entries are copied; live sources are dropped.
    fn copy(&self) -> Self {
        Self::new(
            self.data
                .details
                .iter()
                .map(|(name, detail)| (name.clone(), detail.copy()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CollectionConfig, SelectOptions};
    use crate::detail::NoopDetail;
    use serde_json::{Value, json};

    type Inner = NoopDetail<Value>;

    fn selected_source(data: Value) -> PresetCollection<Inner> {
        let presets = PresetCollection::<Inner>::default();
        let p = presets.create_with_detail_data(data);
        let id = p.id.clone();
        PresetCollection::new(CollectionConfig::default().items(vec![p]))
            .unwrap()
            .select_preset(Some(&id), SelectOptions::default())
            .unwrap()
    }

    #[test]
    fn source_map_insert_replaces_in_place() {
        let mut map: SourceMap<Inner> = SourceMap::new();
        map.insert("a", PresetCollection::default());
        map.insert("b", PresetCollection::default());
        map.insert("a", selected_source(json!(1)));
        assert_eq!(map.names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(map.get("a").map(PresetCollection::len), Some(1));
    }

    #[test]
    fn collect_skips_sources_without_selection() {
        let sources: SourceMap<Inner> = [
            ("a", selected_source(json!({"x": 1}))),
            ("b", PresetCollection::default()),
        ]
        .into_iter()
        .collect();

        let group = GroupDetail::from_sources(&sources);
        assert_eq!(group.details().len(), 1);
        assert_eq!(group.details()[0].0, "a");
        assert_eq!(group.sources().map(SourceMap::len), Some(2));
    }

    #[test]
    fn apply_without_sources_is_empty() {
        let group = GroupDetail::new(vec![("a".to_string(), NoopDetail::new(json!(1)))]);
        assert!(group.apply().unwrap().is_empty());
    }

    #[test]
    fn unknown_source_is_skipped_or_rejected() {
        let sources: SourceMap<Inner> = [("a", selected_source(json!(1)))].into_iter().collect();
        let data = GroupData {
            details: vec![("ghost".to_string(), NoopDetail::new(json!(2)))],
            sources: Some(sources),
        };
        let group = GroupDetail::default();

        assert!(group.apply_data(&data).unwrap().is_empty());
        let err = group.apply_data_strict(&data).unwrap_err();
        assert_eq!(
            err,
            PresetError::UnknownSource {
                name: "ghost".into()
            }
        );
    }

    #[test]
    fn copy_drops_sources() {
        let sources: SourceMap<Inner> = [("a", selected_source(json!(1)))].into_iter().collect();
        let group = GroupDetail::from_sources(&sources);
        let copied = group.copy();
        assert!(copied.sources().is_none());
        assert!(copied.equals(&group));
    }

    #[test]
    fn serializes_details_only() {
        let sources: SourceMap<Inner> = [("a", selected_source(json!({"x": 1})))]
            .into_iter()
            .collect();
        let group = GroupDetail::from_sources(&sources);
        let value = serde_json::to_value(&group).unwrap();
        assert_eq!(value, json!({"details": [["a", {"x": 1}]]}));
    }
}
