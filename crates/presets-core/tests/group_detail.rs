use presets_core::*;

use generators::*;

type Group = GroupDetail<XyDetail>;
type GroupPresets = PresetCollection<Group>;

fn sources_with(a: XyData, b: XyData) -> SourceMap<XyDetail> {
    [
        ("a", Presets::default().set_detail_data(a).unwrap()),
        ("b", Presets::default().set_detail_data(b).unwrap()),
    ]
    .into_iter()
    .collect()
}

fn selected_data(sources: &SourceMap<XyDetail>, name: &str) -> XyData {
    sources
        .get(name)
        .and_then(|presets| presets.selected_preset())
        .map(|p| p.detail.data().clone())
        .unwrap()
}

fn entry_data(group: &Group) -> Vec<(String, XyData)> {
    group
        .details()
        .iter()
        .map(|(name, d)| (name.clone(), d.data().clone()))
        .collect()
}

/// A group collection holding one empty group preset, selected.
fn group_presets() -> GroupPresets {
    let base = GroupPresets::default();
    let preset = base.create_with_detail(Group::default());
    let id = preset.id.clone();
    GroupPresets::new(CollectionConfig::default().items(vec![preset]).selected(id)).unwrap()
}

fn selected_group(presets: &GroupPresets) -> Group {
    presets.selected_preset().unwrap().detail.clone()
}

#[test]
fn collect_from_empty_sources() {
    let sources: SourceMap<XyDetail> = [("a", Presets::default()), ("b", Presets::default())]
        .into_iter()
        .collect();
    let group = selected_group(&group_presets()).collect_data(&sources);

    assert!(group.details().is_empty());
    let attached: Vec<_> = group.sources().unwrap().names().collect();
    assert_eq!(attached, ["a", "b"]);
}

#[test]
fn collect_captures_each_selection() {
    let sources = sources_with(xy("a"), xy("b"));
    let group = selected_group(&group_presets()).collect_data(&sources);

    assert_eq!(
        entry_data(&group),
        [("a".to_string(), xy("a")), ("b".to_string(), xy("b"))]
    );
}

#[test]
fn collected_details_are_independent_copies() {
    let sources = sources_with(xy("a"), xy("b"));
    let group = Group::from_sources(&sources);

    let edited: SourceMap<XyDetail> = sources
        .iter()
        .map(|(name, presets)| (name, presets.set_detail_data(xy_y(name, 9)).unwrap()))
        .collect();

    assert_eq!(selected_data(&edited, "a"), xy_y("a", 9));
    assert_eq!(entry_data(&group)[0].1, xy("a"));
}

#[test]
fn apply_restores_captured_selections() {
    let mut sources = sources_with(xy("a"), xy("b"));
    let group = Group::from_sources(&sources);

    for name in ["a", "b"] {
        let edited = sources
            .get(name)
            .unwrap()
            .set_detail_data(xy(&format!("{name}2")))
            .unwrap();
        sources.insert(name, edited);
    }
    assert_eq!(sources.get("a").unwrap().len(), 1);
    assert_eq!(selected_data(&sources, "a"), xy("a2"));
    assert_eq!(selected_data(&sources, "b"), xy("b2"));

    let empty = GroupData::default();
    assert!(group.apply_data(&empty).unwrap().is_empty());

    let applied = group.apply_data(group.data()).unwrap();
    assert_eq!(applied.get("a").unwrap().len(), 1);
    assert_eq!(applied.get("b").unwrap().len(), 1);
    assert_eq!(selected_data(&applied, "a"), xy("a"));
    assert_eq!(selected_data(&applied, "b"), xy("b"));
}

#[test]
fn apply_writes_into_current_sources() {
    let sources = sources_with(xy("a"), xy("b"));
    let group = Group::from_sources(&sources);

    let drifted: SourceMap<XyDetail> = sources
        .iter()
        .map(|(name, presets)| (name, presets.set_detail_data(xy(&format!("{name}2"))).unwrap()))
        .collect();

    let data = GroupData {
        details: group.details().to_vec(),
        sources: Some(drifted),
    };
    let applied = group.apply_data(&data).unwrap();
    assert_eq!(selected_data(&applied, "a"), xy("a"));
    assert_eq!(selected_data(&applied, "b"), xy("b"));
}

#[test]
fn apply_marks_source_events_as_group_driven() {
    let sources = sources_with(xy("a"), xy("b"));
    let group = Group::from_sources(&sources);
    let drifted = sources
        .get("a")
        .unwrap()
        .set_detail_data(xy("a2"))
        .unwrap();
    drifted.flush_events();

    let flags = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&flags);
    drifted.subscribe(move |event| sink.borrow_mut().push(event.by_group));

    let data = GroupData {
        details: group.details().to_vec(),
        sources: Some([("a", drifted.clone())].into_iter().collect()),
    };
    // "b" is captured but not attached.
    let lenient = group.apply_data(&data).unwrap();
    assert_eq!(lenient.names().collect::<Vec<_>>(), ["a"]);
    lenient.get("a").unwrap().flush_events();
    assert_eq!(*flags.borrow(), [Some(true)]);

    let err = group.apply_data_strict(&data).unwrap_err();
    assert_eq!(err.code(), error::ErrorCode::UnknownGroupSource);
}

#[test]
fn in_sync_sources_are_returned_unchanged() {
    let sources = sources_with(xy("a"), xy("b"));
    for (_, presets) in sources.iter() {
        presets.flush_events();
    }
    let group = Group::from_sources(&sources);
    let applied = group.apply().unwrap();

    assert!(applied.get("a").unwrap().equals(sources.get("a").unwrap()));
    assert_eq!(applied.get("a").unwrap().queue().pending(), 0);
}

#[test]
fn satisfies_and_equals() {
    let mut sources = sources_with(xy_y("a", 1), xy_y("b", 2));
    let a = Group::from_sources(&sources);
    assert_eq!(
        entry_data(&a),
        [("a".to_string(), xy_y("a", 1)), ("b".to_string(), xy_y("b", 2))]
    );

    for (name, y) in [("a", 11), ("b", 22)] {
        let edited = sources.get(name).unwrap().set_detail_data(xy_y(name, y)).unwrap();
        sources.insert(name, edited);
    }
    let b = Group::from_sources(&sources);

    assert!(a.satisfies(&b));
    assert!(!a.equals(&b));
    assert!(a.satisfies(&Group::from_data(b.data().clone())));
    assert!(!a.equals(&Group::from_data(b.data().clone())));
    assert!(!a.satisfies(&Group::default()));
    assert!(!a.equals(&Group::default()));
}

#[test]
fn equality_ignores_entry_order() {
    let a = Group::new(vec![
        ("a".into(), detail(xy_y("a", 1))),
        ("b".into(), detail(xy_y("b", 2))),
    ]);
    let reordered = Group::new(vec![
        ("b".into(), detail(xy_y("b", 2))),
        ("a".into(), detail(xy_y("a", 1))),
    ]);
    let renamed = Group::new(vec![
        ("b".into(), detail(xy_y("a", 1))),
        ("a".into(), detail(xy_y("b", 2))),
    ]);

    assert!(a.equals(&reordered));
    assert!(!a.equals(&renamed));
    assert!(a.satisfies(&renamed));
}

#[test]
fn merge_adopts_overlay() {
    let mut sources = sources_with(xy_y("a", 1), xy_y("b", 2));
    let a = Group::from_sources(&sources);
    for (name, y) in [("a", 11), ("b", 22)] {
        let edited = sources.get(name).unwrap().set_detail_data(xy_y(name, y)).unwrap();
        sources.insert(name, edited);
    }
    let b = Group::from_sources(&sources);

    assert!(a.satisfies(&b));
    assert!(!a.equals(&b));
    let c = a.merge(&b);
    assert!(c.satisfies(&b));
    assert!(c.equals(&b));
    assert_eq!(c.sources().map(SourceMap::len), Some(2));
}

#[test]
fn save_then_upsert_same_group_data() {
    let mut sources = sources_with(xy_y("a", 1), xy_y("b", 2));
    let presets = group_presets();
    for (name, y) in [("a", 11), ("b", 22)] {
        let edited = sources.get(name).unwrap().set_detail_data(xy_y(name, y)).unwrap();
        sources.insert(name, edited);
    }
    let b = selected_group(&presets).collect_data(&sources);

    let x = presets.set_detail_data(b.data().clone()).unwrap();
    assert_eq!(x.len(), 1);
    let captured = entry_data(&x.items().as_slice()[0].detail);
    assert_eq!(captured[0].1, xy_y("a", 11));
    assert_eq!(captured[1].1, xy_y("b", 22));

    let id = x.selected_preset_id().unwrap().to_string();
    let y = x
        .save_preset(&id)
        .unwrap()
        .set_detail_data(b.data().clone())
        .unwrap();
    assert_eq!(y.len(), 1);
    let captured = entry_data(&y.items().as_slice()[0].detail);
    assert_eq!(captured[0].1, xy_y("a", 11));
    assert_eq!(captured[1].1, xy_y("b", 22));
}

#[test]
fn group_collection_snapshot_omits_sources() {
    let sources = sources_with(xy("a"), xy("b"));
    let presets = group_presets()
        .set_detail_data(Group::from_sources(&sources).into_data())
        .unwrap();

    let value = serde_json::to_value(presets.snapshot()).unwrap();
    let detail = &value["items"][0]["detail"];
    assert_eq!(detail["details"][0][0], "a");
    assert_eq!(detail["details"][0][1]["x"], "a");
    assert!(detail.get("sources").is_none());

    let loaded: CollectionSnapshot<Group> = serde_json::from_value(value).unwrap();
    assert!(loaded.items[0].detail.sources().is_none());
    assert_eq!(loaded.items[0].detail.details().len(), 2);
}

#[test]
fn group_detail_loads_from_json() {
    let group = Group::from_sources(&sources_with(xy("a"), xy_y("b", 3)));
    let json = serde_json::to_string(&group).unwrap();
    assert_eq!(json, r#"{"details":[["a",{"x":"a"}],["b",{"x":"b","y":3}]]}"#);

    let loaded: Group = serde_json::from_str(&json).unwrap();
    assert!(loaded.sources().is_none());
    assert!(loaded.equals(&group));
    assert_eq!(entry_data(&loaded), entry_data(&group));
}

#[test]
fn group_collection_restores_from_snapshot() {
    let sources = sources_with(xy("a"), xy("b"));
    let presets = group_presets()
        .set_detail_data(Group::from_sources(&sources).into_data())
        .unwrap();

    let json = serde_json::to_string(&presets.snapshot()).unwrap();
    let snapshot: CollectionSnapshot<Group> = serde_json::from_str(&json).unwrap();
    let restored = GroupPresets::from_snapshot(snapshot, CollectionConfig::default()).unwrap();

    assert!(restored.equals(&presets));
    assert_eq!(restored.selected_preset_id(), presets.selected_preset_id());
    assert_eq!(entry_data(&selected_group(&restored)), entry_data(&selected_group(&presets)));
}
