//! Serializable form of a collection.
//!
//! ```json
//! {
//!   "items": [{ "id": "...", "detail": ..., "isIntent": false, "isDraft": true }],
//!   "spare": { "index": 0, "preset": { ... } },
//!   "selectedPresetId": "..."
//! }
//! ```
//!
//! An empty selection is written as `false`. Factories, listeners and the
//! notification queue are runtime attachments and are supplied again when a
//! snapshot is loaded.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::collection::{CollectionConfig, PresetCollection, Spare};
use crate::detail::Detail;
use crate::error::Result;
use crate::preset::Preset;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpareSnapshot<D> {
    pub index: isize,
    pub preset: Preset<D>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSnapshot<D> {
    pub items: Vec<Preset<D>>,
    #[serde(default)]
    pub spare: Option<SpareSnapshot<D>>,
    #[serde(default, with = "selected_id")]
    pub selected_preset_id: Option<String>,
}

/// `Option<String>` as either the id or `false`.
mod selected_id {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Id(String),
        Flag(bool),
    }

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => serializer.serialize_str(id),
            None => serializer.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Repr>::deserialize(deserializer)? {
            Some(Repr::Id(id)) if !id.is_empty() => Some(id),
            _ => None,
        })
    }
}

impl<D: Detail + 'static> PresetCollection<D> {
    /// Capture items, spare and selection.
    pub fn snapshot(&self) -> CollectionSnapshot<D> {
        CollectionSnapshot {
            items: self.items().iter().map(|p| (**p).clone()).collect(),
            spare: self.spare().map(|spare| SpareSnapshot {
                index: spare.index,
                preset: (*spare.preset).clone(),
            }),
            selected_preset_id: self.selected_preset_id().map(str::to_owned),
        }
    }

    /// Rebuild a collection from `snapshot`.
    ///
    /// Factories, queue and settings come from `config`; its items, spare and
    /// selection are replaced by the snapshot's.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::DuplicateId`](crate::PresetError::DuplicateId)
    /// if the snapshot holds two presets with one id.
    pub fn from_snapshot(snapshot: CollectionSnapshot<D>, config: CollectionConfig<D>) -> Result<Self> {
        let CollectionSnapshot {
            items,
            spare,
            selected_preset_id,
        } = snapshot;

        Self::new(CollectionConfig {
            items,
            selected_preset_id,
            spare: spare.map(|s| Spare {
                index: s.index,
                preset: Rc::new(s.preset),
            }),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::SelectOptions;
    use crate::detail::NoopDetail;
    use serde_json::{Value, json};

    type Presets = PresetCollection<NoopDetail<Value>>;

    #[test]
    fn empty_selection_is_false() {
        let presets = Presets::default();
        let value = serde_json::to_value(presets.snapshot()).unwrap();
        assert_eq!(value, json!({"items": [], "spare": null, "selectedPresetId": false}));
    }

    #[test]
    fn load_accepts_false_and_missing_selection() {
        let snapshot: CollectionSnapshot<NoopDetail<Value>> =
            serde_json::from_value(json!({"items": [], "selectedPresetId": false})).unwrap();
        assert_eq!(snapshot.selected_preset_id, None);

        let snapshot: CollectionSnapshot<NoopDetail<Value>> =
            serde_json::from_value(json!({"items": []})).unwrap();
        assert_eq!(snapshot.selected_preset_id, None);
        assert!(snapshot.spare.is_none());
    }

    #[test]
    fn snapshot_survives_json() {
        let presets = Presets::default().set_detail_data(json!({"x": "a"})).unwrap();
        let id = presets.selected_preset_id().unwrap().to_string();

        let text = serde_json::to_string(&presets.snapshot()).unwrap();
        let loaded = Presets::from_snapshot(
            serde_json::from_str(&text).unwrap(),
            CollectionConfig::default(),
        )
        .unwrap();

        assert!(loaded.equals(&presets));
        assert_eq!(loaded.spare().map(|s| s.preset.id.as_str()), Some(id.as_str()));
        let selected = loaded
            .select_preset(Some(&id), SelectOptions::default())
            .unwrap();
        assert_eq!(selected.get_by_id(&id).unwrap().detail.data(), &json!({"x": "a"}));
    }
}
