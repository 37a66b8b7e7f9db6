//! NodeState through the editor: import, export, promotion and collisions

use lexical_editor::{
    Editor, EditorConfig, EditorError, NodeConfig, NodeKey, SerializedNode, StateConfig, NODE_STATE_KEY,
};
use serde_json::{json, Value};

fn validating() -> EditorConfig {
    EditorConfig {
        validation: true,
        ..EditorConfig::default()
    }
}

fn lang() -> StateConfig<String> {
    StateConfig::new("lang", |raw| raw.and_then(Value::as_str).unwrap_or("en").to_string())
}

fn envelope(value: Value) -> SerializedNode {
    serde_json::from_value(value).unwrap()
}

/// Import `serialized` under a fresh paragraph and commit
fn import_attached(editor: &mut Editor, serialized: &SerializedNode) -> NodeKey {
    editor
        .update(|editor| {
            let paragraph = editor.create_paragraph()?;
            let key = editor.import_node(serialized)?;
            editor.append(&paragraph, &key)?;
            editor.append(&NodeKey::root(), &paragraph)?;
            Ok(key)
        })
        .unwrap()
}

fn exported(editor: &Editor, key: &NodeKey) -> SerializedNode {
    let state = editor.editor_state();
    lexical_editor::export_node(&state, state.get_node(key).unwrap())
}

#[test]
fn test_known_and_unknown_state_import() {
    let lang = lang();
    let mut editor = Editor::new(validating());
    editor.reregister_node(NodeConfig::text("text").with_state(&lang)).unwrap();

    let text = import_attached(
        &mut editor,
        &envelope(json!({"type": "text", "version": 1, "$state": {"lang": "fr", "mystery": 42}})),
    );

    let value = editor.read(|editor| editor.get_state(&text, &lang)).unwrap();
    assert_eq!(value, "fr");
    let state_handle = editor.editor_state();
    let state = state_handle.get_node(&text).unwrap().state().unwrap();
    assert_eq!(state.size(), 2);
    assert!(state.is_known("lang"));
    assert_eq!(state.unknown_state().unwrap().get("mystery"), Some(&json!(42)));

    assert_eq!(
        exported(&editor, &text).get(NODE_STATE_KEY),
        Some(&json!({"lang": "fr", "mystery": 42}))
    );
}

#[test]
fn test_missing_state_reads_default_and_is_omitted() {
    let lang = lang();
    let mut editor = Editor::new(validating());
    editor.reregister_node(NodeConfig::text("text").with_state(&lang)).unwrap();

    let text = import_attached(&mut editor, &envelope(json!({"type": "text", "version": 1})));
    assert_eq!(editor.read(|editor| editor.get_state(&text, &lang)).unwrap(), "en");
    assert_eq!(exported(&editor, &text).get(NODE_STATE_KEY), None);

    // an explicit default is omitted too
    editor
        .update(|editor| editor.set_state(&text, &lang, "de".to_string()))
        .unwrap();
    editor
        .update(|editor| editor.set_state(&text, &lang, "en".to_string()))
        .unwrap();
    assert_eq!(exported(&editor, &text).get(NODE_STATE_KEY), None);
}

#[test]
fn test_unknown_keys_round_trip_unchanged() {
    let mut editor = Editor::new(validating());
    let raw = json!({"mystery": {"deep": [1, "two", null, {"x": 1.5}]}, "flag": true});
    let text = import_attached(
        &mut editor,
        &envelope(json!({"type": "text", "text": "hi", "$state": raw.clone()})),
    );

    let out = exported(&editor, &text);
    assert_eq!(out.get(NODE_STATE_KEY), Some(&raw));
    assert_eq!(out.get("text"), Some(&json!("hi")));

    let mut other = Editor::new(validating());
    let again = import_attached(&mut other, &out);
    assert_eq!(exported(&other, &again).get(NODE_STATE_KEY), Some(&raw));
}

#[test]
fn test_unknown_key_is_promoted_on_next_write() {
    let mut editor = Editor::new(validating());
    let text = import_attached(
        &mut editor,
        &envelope(json!({"type": "text", "$state": {"lang": "fr", "mystery": 42}})),
    );
    {
        let state_handle = editor.editor_state();
        let state = state_handle.get_node(&text).unwrap().state().unwrap();
        assert!(!state.is_known("lang"));
        assert_eq!(state.size(), 2);
    }

    // reading with a config makes the key known to the node type
    let lang = lang();
    assert_eq!(editor.read(|editor| editor.get_state(&text, &lang)).unwrap(), "fr");

    editor
        .update(|editor| {
            let state = editor.get_writable_state(&text)?;
            assert!(state.is_known("lang"));
            assert_eq!(state.size(), 2);
            let unknown = state.unknown_state().unwrap();
            assert_eq!(unknown.len(), 1);
            assert!(unknown.contains_key("mystery"));
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_flat_state_lives_at_top_level() {
    let id = StateConfig::new("id", |raw| raw.and_then(Value::as_u64).unwrap_or(0));
    let mut editor = Editor::new(validating());
    editor
        .register_node(NodeConfig::text("tagged-text").with_flat_state(&id))
        .unwrap();

    let text = import_attached(
        &mut editor,
        &envelope(json!({"type": "tagged-text", "text": "x", "id": 7, "$state": {"note": "n"}})),
    );
    assert_eq!(editor.read(|editor| editor.get_state(&text, &id)).unwrap(), 7);

    let out = exported(&editor, &text);
    assert_eq!(out.get("id"), Some(&json!(7)));
    assert_eq!(out.get(NODE_STATE_KEY), Some(&json!({"note": "n"})));
}

#[test]
fn test_decorator_props_exclude_state() {
    let id = StateConfig::new("id", |raw| raw.and_then(Value::as_u64).unwrap_or(0));
    let mut editor = Editor::new(validating());
    editor
        .register_node(NodeConfig::decorator("image").with_flat_state(&id))
        .unwrap();

    let image = import_attached(
        &mut editor,
        &envelope(json!({"type": "image", "src": "cat.png", "id": 3, "$state": {"alt": "cat"}})),
    );
    let state = editor.editor_state();
    let props = &state.get_node(&image).unwrap().as_decorator().unwrap().props;
    assert_eq!(props.len(), 1);
    assert_eq!(props.get("src"), Some(&json!("cat.png")));

    let out = exported(&editor, &image);
    assert_eq!(out.get("src"), Some(&json!("cat.png")));
    assert_eq!(out.get("id"), Some(&json!(3)));
    assert_eq!(out.get(NODE_STATE_KEY), Some(&json!({"alt": "cat"})));
}

#[test]
fn test_update_state_with_equal_value_is_a_no_op() {
    let lang = lang();
    let mut editor = Editor::new(validating());
    let text = import_attached(&mut editor, &envelope(json!({"type": "text", "$state": {"lang": "fr"}})));
    let before = editor.editor_state();

    editor
        .update(|editor| editor.update_state(&text, &lang, |current| current.clone()))
        .unwrap();
    assert!(std::rc::Rc::ptr_eq(&before, &editor.editor_state()));

    editor
        .update(|editor| editor.update_state(&text, &lang, |current| format!("{}-CA", current)))
        .unwrap();
    assert_eq!(editor.read(|editor| editor.get_state(&text, &lang)).unwrap(), "fr-CA");
}

#[test]
fn test_state_copy_on_write_keeps_old_snapshot() {
    let lang = lang();
    let mut editor = Editor::new(validating());
    let text = import_attached(&mut editor, &envelope(json!({"type": "text", "$state": {"lang": "fr"}})));
    let before = editor.editor_state();

    editor
        .update(|editor| editor.set_state(&text, &lang, "it".to_string()))
        .unwrap();

    assert_eq!(before.get_node(&text).unwrap().state_value(&lang), "fr");
    assert_eq!(editor.editor_state().get_node(&text).unwrap().state_value(&lang), "it");
}

#[test]
fn test_two_configs_with_one_key_collide() {
    let first = lang();
    let second = lang();
    let mut editor = Editor::new(validating());
    let text = import_attached(&mut editor, &envelope(json!({"type": "text", "text": "x"})));

    editor
        .update(|editor| editor.set_state(&text, &first, "fr".to_string()))
        .unwrap();
    let err = editor
        .update(|editor| editor.set_state(&text, &second, "de".to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        EditorError::StateKeyCollision { state_key, node_type, .. } if state_key == "lang" && node_type == "text"
    ));
}

#[test]
fn test_set_unknown_state_counts_each_key_once() {
    let mut editor = Editor::new(validating());
    let text = import_attached(&mut editor, &envelope(json!({"type": "text", "$state": {"a": 1}})));
    editor
        .update(|editor| {
            editor.set_unknown_state(&text, "a", json!(2))?;
            editor.set_unknown_state(&text, "b", json!(3))?;
            Ok(())
        })
        .unwrap();
    let state_handle = editor.editor_state();
    let state = state_handle.get_node(&text).unwrap().state().unwrap();
    assert_eq!(state.size(), 2);
    assert_eq!(Value::Object(state.to_json()), json!({"$state": {"a": 2, "b": 3}}));
}

#[test]
fn test_state_outside_update_is_context_error() {
    let lang = lang();
    let mut editor = Editor::new(validating());
    let err = editor
        .set_state(&NodeKey::root(), &lang, "fr".to_string())
        .unwrap_err();
    assert!(matches!(err, EditorError::NoActiveEditor { .. }));
    let err = editor.get_state(&NodeKey::root(), &lang).unwrap_err();
    assert!(err.is_context_error());
}
