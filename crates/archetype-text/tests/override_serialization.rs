mod common;

use std::fs::File;
use std::sync::Arc;

use archetype_core::{Asset, Index, ObjectPath, OverrideType};
use archetype_text::{deserialize, read_from, serialize, write_to, Settings, TextError};
use common::fixtures::{base_with_items, derive, id, schema, NIL};
use proptest::prelude::*;
use serde_json::{json, Value};

fn strings_base() -> Arc<Asset> {
    base_with_items(
        "MyAsset2",
        "MyStrings",
        &[(10, Index::Empty, json!("String1")), (20, Index::Empty, json!("String2"))],
    )
}

fn dictionary_base() -> Arc<Asset> {
    base_with_items(
        "MyAsset3",
        "MyDictionary",
        &[(10, "Key1".into(), json!("String1")), (20, "Key2".into(), json!("String2"))],
    )
}

#[test]
fn list_item_override_round_trips() {
    let base = strings_base();
    let mut derived = derive(&base);
    derived
        .root_mut()
        .child("MyStrings")
        .unwrap()
        .update(json!("MyDerivedString"), &Index::Position(0))
        .unwrap();

    let expected = format!(
        "!MyAsset2
Id: {NIL}
Struct:
    MyStrings: {{}}
MyStrings:
    0a0000000a0000000a0000000a000000*: MyDerivedString
    14000000140000001400000014000000: String2
~Base:
    Location: MyAsset
    Asset: !MyAsset2
        Id: {NIL}
        Struct:
            MyStrings: {{}}
        MyStrings:
            0a0000000a0000000a0000000a000000: String1
            14000000140000001400000014000000: String2
"
    );
    let text = serialize(&derived, &Settings::default());
    assert_eq!(text, expected);

    let loaded = deserialize(&text, &schema()).unwrap();
    let strings = loaded.root().child("MyStrings").unwrap();
    assert_eq!(strings.value(), json!(["MyDerivedString", "String2"]));
    assert_eq!(strings.get_override(&Index::Empty), OverrideType::Base);
    assert_eq!(strings.get_override(&Index::Position(0)), OverrideType::New);
    assert_eq!(strings.get_override(&Index::Position(1)), OverrideType::Base);
    assert_eq!(strings.item_id(&Index::Position(0)).unwrap(), id(10));
    assert_eq!(loaded.overrides(), derived.overrides());

    let loaded_base = &loaded.base().unwrap().asset;
    assert_eq!(loaded_base.flatten()["MyStrings"], json!(["String1", "String2"]));
    assert_eq!(serialize(&loaded, &Settings::default()), text);
}

#[test]
fn dictionary_value_override_round_trips() {
    let base = dictionary_base();
    let mut derived = derive(&base);
    derived
        .root_mut()
        .child("MyDictionary")
        .unwrap()
        .update(json!("MyDerivedString"), &"Key1".into())
        .unwrap();

    let text = serialize(&derived, &Settings::default());
    assert!(text.starts_with(&format!(
        "!MyAsset3
Id: {NIL}
MyDictionary:
    0a0000000a0000000a0000000a000000~Key1*: MyDerivedString
    14000000140000001400000014000000~Key2: String2
~Base:
"
    )));

    let loaded = deserialize(&text, &schema()).unwrap();
    let dict = loaded.root().child("MyDictionary").unwrap();
    assert_eq!(dict.value(), json!({"Key1": "MyDerivedString", "Key2": "String2"}));
    assert_eq!(dict.get_override(&"Key1".into()), OverrideType::New);
    assert_eq!(dict.get_override(&"Key2".into()), OverrideType::Base);
}

#[test]
fn added_dictionary_entry_is_new_after_load() {
    let text = format!(
        "!MyAsset3
Id: {NIL}
MyDictionary:
    0a0000000a0000000a0000000a000000~Key1: String1
    14000000140000001400000014000000~Key2: String2
    1e0000001e0000001e0000001e000000~Key3*: String3
~Base:
    Location: MyAsset
    Asset: !MyAsset3
        Id: {NIL}
        MyDictionary:
            0a0000000a0000000a0000000a000000~Key1: String1
            14000000140000001400000014000000~Key2: String2
"
    );
    let loaded = deserialize(&text, &schema()).unwrap();
    let dict = loaded.root().child("MyDictionary").unwrap();
    assert_eq!(dict.len(), 3);
    assert_eq!(dict.get_override(&"Key1".into()), OverrideType::Base);
    assert_eq!(dict.get_override(&"Key2".into()), OverrideType::Base);
    assert_eq!(dict.get_override(&"Key3".into()), OverrideType::New);
    assert_eq!(dict.item_id(&"Key3".into()).unwrap(), id(30));

    let base = &loaded.base().unwrap().asset;
    assert_eq!(base.root().child("MyDictionary").unwrap().len(), 2);
    assert_eq!(serialize(&loaded, &Settings::default()), text);
}

#[test]
fn unmarked_values_come_from_the_embedded_base() {
    // The body holds a stale value for an inherited item.
    let text = format!(
        "!MyAsset2
Id: {NIL}
Struct: {{}}
MyStrings:
    0a0000000a0000000a0000000a000000: Stale
~Base:
    Location: MyAsset
    Asset: !MyAsset2
        Id: {NIL}
        Struct: {{}}
        MyStrings:
            0a0000000a0000000a0000000a000000: String1
"
    );
    let loaded = deserialize(&text, &schema()).unwrap();
    assert_eq!(loaded.flatten()["MyStrings"], json!(["String1"]));
    assert!(loaded.overrides().is_empty());
}

#[test]
fn object_items_nest_their_members() {
    let base = base_with_items("MyAsset4", "MyObjects", &[(10, Index::Empty, json!({"Value": "a"}))]);
    let mut derived = derive(&base);
    {
        let mut objects = derived.root_mut().child("MyObjects").unwrap();
        objects.add_with_id(json!({"Value": "c"}), Index::Empty, id(30)).unwrap();
        objects
            .item_by_id(id(10))
            .unwrap()
            .child("Value")
            .unwrap()
            .update(json!("b"), &Index::Empty)
            .unwrap();
    }

    let text = serialize(&derived, &Settings::default());
    assert!(text.starts_with(&format!(
        "!MyAsset4
Id: {NIL}
MyObjects:
    0a0000000a0000000a0000000a000000:
        Value*: b
    1e0000001e0000001e0000001e000000*:
        Value: c
~Base:
"
    )));

    let loaded = deserialize(&text, &schema()).unwrap();
    assert_eq!(loaded.flatten(), json!({"MyObjects": [{"Value": "b"}, {"Value": "c"}]}));
    let value_path = ObjectPath::root().member("MyObjects").item(id(10)).member("Value");
    assert_eq!(loaded.get_override(&value_path), OverrideType::New);
    assert_eq!(
        loaded.get_override(&ObjectPath::root().member("MyObjects").item(id(10))),
        OverrideType::Base
    );
    assert_eq!(
        loaded.get_override(&ObjectPath::root().member("MyObjects").item(id(30)).member("Value")),
        OverrideType::New
    );
}

#[test]
fn deletion_records_survive_a_round_trip() {
    let base = strings_base();
    let mut derived = derive(&base);
    derived.root_mut().child("MyStrings").unwrap().remove(&Index::Position(0)).unwrap();

    let text = serialize(&derived, &Settings::default());
    assert!(text.contains(
        "MyStrings:
    14000000140000001400000014000000: String2
    0a0000000a0000000a0000000a000000: ~(Deleted)
"
    ));

    let mut loaded = deserialize(&text, &schema()).unwrap();
    let report = loaded.reconcile();
    assert!(report.restored.is_empty());
    assert_eq!(loaded.flatten()["MyStrings"], json!(["String2"]));
    let strings = loaded.root().child("MyStrings").unwrap();
    assert!(strings.item_ids().unwrap().is_deleted(id(10)));
    assert_eq!(serialize(&loaded, &Settings::default()), text);
}

#[test]
fn removed_dictionary_entries_stay_removed_after_reload() {
    let base = dictionary_base();
    let mut derived = derive(&base);
    derived.root_mut().child("MyDictionary").unwrap().remove(&"Key1".into()).unwrap();

    let settings = Settings { indent: 2 };
    let text = serialize(&derived, &settings);
    assert!(text.contains("\n  0a0000000a0000000a0000000a000000: ~(Deleted)\n"));

    let mut loaded = deserialize(&text, &schema()).unwrap();
    let report = loaded.reconcile();
    assert!(report.restored.is_empty());
    let dict = loaded.root().child("MyDictionary").unwrap();
    assert_eq!(dict.value(), json!({"Key2": "String2"}));
    assert!(dict.item_ids().unwrap().is_deleted(id(10)));
    assert_eq!(serialize(&loaded, &settings), text);
}

#[test]
fn keys_with_quotes_round_trip() {
    let base = dictionary_base();
    let mut derived = derive(&base);
    derived
        .root_mut()
        .child("MyDictionary")
        .unwrap()
        .add_with_id(json!("quoted"), "a\"b".into(), id(30))
        .unwrap();

    let text = serialize(&derived, &Settings::default());
    assert!(text.contains("    1e0000001e0000001e0000001e000000~\"a\\\"b\"*: quoted\n"));

    let loaded = deserialize(&text, &schema()).unwrap();
    let dict = loaded.root().child("MyDictionary").unwrap();
    assert_eq!(dict.item_id(&"a\"b".into()).unwrap(), id(30));
    assert_eq!(dict.get_override(&"a\"b".into()), OverrideType::New);
    assert_eq!(loaded.flatten(), derived.flatten());
    assert_eq!(serialize(&loaded, &Settings::default()), text);
}

#[test]
fn sealed_marker_round_trips() {
    let base = strings_base();
    let mut derived = derive(&base);
    derived
        .root_mut()
        .child("MyStrings")
        .unwrap()
        .set_override(&Index::Position(1), OverrideType::Sealed)
        .unwrap();

    let text = serialize(&derived, &Settings::default());
    assert!(text.contains("    14000000140000001400000014000000!: String2\n"));

    let loaded = deserialize(&text, &schema()).unwrap();
    let strings = loaded.root().child("MyStrings").unwrap();
    assert_eq!(strings.explicit_override(&Index::Position(1)), Some(OverrideType::Sealed));
    assert_eq!(strings.explicit_override(&Index::Position(0)), None);
}

fn with_base(body: &str, base_body: &str) -> String {
    format!(
        "!MyAsset2
Id: {NIL}
Struct: {{}}
MyStrings:
{body}~Base:
    Location: MyAsset
    Asset: !MyAsset2
        Id: {NIL}
        Struct: {{}}
        MyStrings:
{base_body}"
    )
}

#[test]
fn inconsistent_deltas_are_malformed() {
    let s = schema();
    let base_items = "            0a0000000a0000000a0000000a000000: String1\n";

    let unknown_item = with_base("    14000000140000001400000014000000: String2\n", base_items);
    assert!(deserialize(&unknown_item, &s).unwrap_err().is_malformed_delta());

    let unknown_deletion = with_base("    14000000140000001400000014000000: ~(Deleted)\n", base_items);
    assert!(deserialize(&unknown_deletion, &s).unwrap_err().is_malformed_delta());

    let live_and_deleted = with_base(
        "    0a0000000a0000000a0000000a000000: String1\n    0a0000000a0000000a0000000a000000: ~(Deleted)\n",
        base_items,
    );
    assert!(deserialize(&live_and_deleted, &s).unwrap_err().is_malformed_delta());

    let bad_id = "!MyAsset2\nId: not-a-uuid\n";
    assert!(deserialize(bad_id, &s).unwrap_err().is_malformed_delta());

    let no_location = format!("!MyAsset2\n~Base:\n    Asset: !MyAsset2\n        Id: {NIL}\n");
    assert!(deserialize(&no_location, &s).unwrap_err().is_malformed_delta());
}

#[test]
fn grammar_errors_carry_the_line() {
    let text = "!MyAsset1\nMyString: a\n\tMyString: b\n";
    assert!(matches!(deserialize(text, &schema()), Err(TextError::Syntax { line: 3, .. })));
    assert!(matches!(deserialize("MyString: a\n", &schema()), Err(TextError::Syntax { line: 1, .. })));
}

#[test]
fn files_round_trip_with_custom_indent() {
    let base = dictionary_base();
    let mut derived = derive(&base);
    derived
        .root_mut()
        .child("MyDictionary")
        .unwrap()
        .add_with_id(json!("String3"), "Key3".into(), id(30))
        .unwrap();

    let settings = Settings::from_toml_str("indent = 2\n").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("derived.txt");
    write_to(&derived, &settings, File::create(&path).unwrap()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n  1e0000001e0000001e0000001e000000~Key3*: String3\n"));

    let loaded = read_from(File::open(&path).unwrap(), &schema()).unwrap();
    assert_eq!(loaded.flatten(), derived.flatten());
    assert_eq!(loaded.overrides(), derived.overrides());
    assert_eq!(serialize(&loaded, &settings), text);
}

/// Reloads `derived` from its own text and checks nothing drifts.
fn assert_reloads_unchanged(derived: &Asset) -> Result<(), TestCaseError> {
    let text = serialize(derived, &Settings::default());
    let loaded = deserialize(&text, &schema()).map_err(|e| TestCaseError::fail(format!("{e}\n{text}")))?;
    prop_assert_eq!(serialize(&loaded, &Settings::default()), text);
    prop_assert_eq!(loaded.flatten(), derived.flatten());
    prop_assert_eq!(loaded.overrides(), derived.overrides());
    Ok(())
}

#[derive(Debug, Clone)]
enum Edit {
    Update(usize, String),
    Add(String),
    Remove(usize),
    Move(usize, usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    let word = "[a-z][a-z0-9]{0,6}";
    prop_oneof![
        (any::<usize>(), word).prop_map(|(i, s)| Edit::Update(i, s)),
        word.prop_map(Edit::Add),
        any::<usize>().prop_map(Edit::Remove),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Edit::Move(a, b)),
    ]
}

proptest! {
    #[test]
    fn serialized_deltas_are_stable(
        base_items in prop::collection::vec("[a-z][a-z0-9]{0,6}", 0..5),
        edits in prop::collection::vec(edit(), 0..12),
    ) {
        let items: Vec<_> = base_items
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32 + 1, Index::Empty, json!(s)))
            .collect();
        let base = base_with_items("MyAsset2", "MyStrings", &items);
        let mut derived = derive(&base);
        {
            let mut strings = derived.root_mut().child("MyStrings").unwrap();
            for edit in edits {
                let len = strings.len();
                match edit {
                    Edit::Add(s) => {
                        strings.add(json!(s), Index::Empty).unwrap();
                    }
                    Edit::Update(i, s) if len > 0 => {
                        strings.update(json!(s), &Index::Position(i % len)).unwrap();
                    }
                    Edit::Remove(i) if len > 0 => {
                        strings.remove(&Index::Position(i % len)).unwrap();
                    }
                    Edit::Move(a, b) if len > 0 => {
                        strings.move_item(a % len, b % len).unwrap();
                    }
                    _ => {}
                }
            }
        }

        assert_reloads_unchanged(&derived)?;
    }
}

#[derive(Debug, Clone)]
enum KeyedEdit {
    Add(String, String),
    Update(usize, String),
    Remove(usize),
    Rekey(usize, String),
}

fn keyed_edit() -> impl Strategy<Value = KeyedEdit> {
    prop_oneof![
        (any::<String>(), any::<String>()).prop_map(|(k, v)| KeyedEdit::Add(k, v)),
        (any::<usize>(), any::<String>()).prop_map(|(i, v)| KeyedEdit::Update(i, v)),
        any::<usize>().prop_map(KeyedEdit::Remove),
        (any::<usize>(), any::<String>()).prop_map(|(i, k)| KeyedEdit::Rekey(i, k)),
    ]
}

fn nth_key(keys: &[String], i: usize) -> Option<String> {
    (!keys.is_empty()).then(|| keys[i % keys.len()].clone())
}

#[derive(Debug, Clone)]
enum ObjectEdit {
    Add(Option<String>),
    SetValue(usize, String),
    Replace(usize, Option<String>),
    Remove(usize),
    Move(usize, usize),
}

fn object_edit() -> impl Strategy<Value = ObjectEdit> {
    prop_oneof![
        prop::option::of(any::<String>()).prop_map(ObjectEdit::Add),
        (any::<usize>(), any::<String>()).prop_map(|(i, s)| ObjectEdit::SetValue(i, s)),
        (any::<usize>(), prop::option::of(any::<String>())).prop_map(|(i, v)| ObjectEdit::Replace(i, v)),
        any::<usize>().prop_map(ObjectEdit::Remove),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| ObjectEdit::Move(a, b)),
    ]
}

fn object_value(value: &Option<String>) -> Value {
    match value {
        Some(s) => json!({ "Value": s }),
        None => Value::Null,
    }
}

proptest! {
    #[test]
    fn dictionary_deltas_are_stable(
        base_items in prop::collection::btree_map(any::<String>(), any::<String>(), 0..4),
        edits in prop::collection::vec(keyed_edit(), 0..12),
    ) {
        let items: Vec<_> = base_items
            .iter()
            .enumerate()
            .map(|(i, (k, v))| (i as u32 + 1, Index::Key(k.clone()), json!(v)))
            .collect();
        let base = base_with_items("MyAsset3", "MyDictionary", &items);
        let mut derived = derive(&base);
        {
            let mut dict = derived.root_mut().child("MyDictionary").unwrap();
            for edit in edits {
                let keys: Vec<String> = dict
                    .as_node()
                    .items()
                    .into_iter()
                    .filter_map(|(index, _, _)| index.key().map(str::to_string))
                    .collect();
                match edit {
                    KeyedEdit::Add(k, v) if !keys.contains(&k) => {
                        dict.add(json!(v), Index::Key(k)).unwrap();
                    }
                    KeyedEdit::Update(i, v) => {
                        if let Some(k) = nth_key(&keys, i) {
                            dict.update(json!(v), &Index::Key(k)).unwrap();
                        }
                    }
                    KeyedEdit::Remove(i) => {
                        if let Some(k) = nth_key(&keys, i) {
                            dict.remove(&Index::Key(k)).unwrap();
                        }
                    }
                    KeyedEdit::Rekey(i, new) if !keys.contains(&new) => {
                        if let Some(old) = nth_key(&keys, i) {
                            dict.rekey(&old, &new).unwrap();
                        }
                    }
                    _ => {}
                }
            }
        }
        assert_reloads_unchanged(&derived)?;
    }

    #[test]
    fn object_list_deltas_are_stable(
        base_items in prop::collection::vec(prop::option::of(any::<String>()), 0..4),
        edits in prop::collection::vec(object_edit(), 0..12),
    ) {
        let items: Vec<_> = base_items
            .iter()
            .enumerate()
            .map(|(i, v)| (i as u32 + 1, Index::Empty, object_value(v)))
            .collect();
        let base = base_with_items("MyAsset4", "MyObjects", &items);
        let mut derived = derive(&base);
        {
            let mut objects = derived.root_mut().child("MyObjects").unwrap();
            for edit in edits {
                let len = objects.len();
                match edit {
                    ObjectEdit::Add(v) => {
                        objects.add(object_value(&v), Index::Empty).unwrap();
                    }
                    ObjectEdit::SetValue(i, s) if len > 0 => {
                        let at = Index::Position(i % len);
                        if !objects.as_node().item(&at).unwrap().is_null() {
                            objects
                                .reborrow()
                                .item(&at)
                                .unwrap()
                                .child("Value")
                                .unwrap()
                                .update(json!(s), &Index::Empty)
                                .unwrap();
                        }
                    }
                    ObjectEdit::Replace(i, v) if len > 0 => {
                        objects.update(object_value(&v), &Index::Position(i % len)).unwrap();
                    }
                    ObjectEdit::Remove(i) if len > 0 => {
                        objects.remove(&Index::Position(i % len)).unwrap();
                    }
                    ObjectEdit::Move(a, b) if len > 0 => {
                        objects.move_item(a % len, b % len).unwrap();
                    }
                    _ => {}
                }
            }
        }
        assert_reloads_unchanged(&derived)?;
    }
}
