//! End-to-end tests of updates, commits and the JSON boundary

use lexical_editor::{
    Editor, EditorConfig, EditorError, ElementDirt, ElementFormatType, NodeKey, TextFormatType, TextMode,
    UpdatePayload,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn validating() -> EditorConfig {
    EditorConfig {
        validation: true,
        ..EditorConfig::default()
    }
}

/// root > paragraph > text("Hello")
fn hello_world(editor: &mut Editor) -> (NodeKey, NodeKey) {
    editor
        .update(|editor| {
            let paragraph = editor.create_paragraph()?;
            let text = editor.create_text_node("Hello")?;
            editor.append(&paragraph, &text)?;
            editor.append(&NodeKey::root(), &paragraph)?;
            Ok((paragraph, text))
        })
        .unwrap()
}

#[test]
fn test_build_tree_in_one_update() {
    let mut editor = Editor::new(validating());
    let (paragraph, text) = hello_world(&mut editor);

    let state = editor.editor_state();
    let element = state.get_node(&paragraph).unwrap().as_element().unwrap();
    assert_eq!(element.child_count(), 1);
    assert_eq!(element.first_child(), Some(&text));
    assert_eq!(element.last_child(), Some(&text));
    assert_eq!(state.get_node(&text).unwrap().parent(), Some(&paragraph));
    assert_eq!(state.text_content(&NodeKey::root()), "Hello");
    assert_eq!(state.len(), 3);
    state.validate().unwrap();
}

#[test]
fn test_dirty_sets_after_construction() {
    let mut editor = Editor::new(validating());
    let (paragraph, text) = hello_world(&mut editor);

    let payload = editor.last_update().unwrap();
    assert_eq!(payload.dirty_elements.get(&paragraph), Some(&ElementDirt::Own));
    // the root's child list was written, so it is dirty in its own right
    assert_eq!(payload.dirty_elements.get(&NodeKey::root()), Some(&ElementDirt::Own));
    assert_eq!(payload.dirty_elements.len(), 2);
    assert_eq!(payload.dirty_leaves.len(), 1);
    assert!(payload.dirty_leaves.contains(&text));
}

#[test]
fn test_text_edit_marks_ancestors_only_as_ancestors() {
    let mut editor = Editor::new(validating());
    let (paragraph, text) = hello_world(&mut editor);

    editor.update(|editor| editor.set_text(&text, "Goodbye")).unwrap();

    let payload = editor.last_update().unwrap();
    assert!(payload.dirty_leaves.contains(&text));
    assert_eq!(payload.dirty_elements.get(&paragraph), Some(&ElementDirt::Ancestor));
    assert_eq!(payload.dirty_elements.get(&NodeKey::root()), Some(&ElementDirt::Ancestor));
    assert!(payload.own_dirty_elements().is_empty());
    assert_eq!(payload.ancestor_dirty_elements().len(), 2);
}

#[test]
fn test_construction_outside_update_is_context_error() {
    let mut editor = Editor::new(validating());
    let err = editor.create_text_node("orphan").unwrap_err();
    assert!(matches!(err, EditorError::NoActiveEditor { .. }));

    let err = editor.get_writable(&NodeKey::root()).unwrap_err();
    assert!(err.is_context_error());
    assert_eq!(editor.editor_state().len(), 1);
}

#[test]
fn test_construction_inside_read_is_read_only_error() {
    let mut editor = Editor::new(validating());
    let err = editor.read(|editor| editor.create_paragraph()).unwrap_err();
    assert!(matches!(err, EditorError::ReadOnly { operation: "create_node" }));
}

#[test]
fn test_read_sees_committed_state() {
    let mut editor = Editor::new(validating());
    let (paragraph, _) = hello_world(&mut editor);
    let content = editor
        .read(|editor| {
            assert_eq!(editor.children(&NodeKey::root())?, vec![paragraph.clone()]);
            editor.text_content(&paragraph)
        })
        .unwrap();
    assert_eq!(content, "Hello");
}

#[test]
fn test_failed_update_rolls_back() {
    let mut editor = Editor::new(validating());
    let (_, text) = hello_world(&mut editor);
    let before = editor.editor_state();

    let err = editor
        .update(|editor| {
            editor.set_text(&text, "changed")?;
            let extra = editor.create_paragraph()?;
            editor.append(&NodeKey::root(), &extra)?;
            editor.set_text(&NodeKey::root(), "roots have no text")
        })
        .unwrap_err();
    assert!(matches!(err, EditorError::NotText(_)));

    assert!(Rc::ptr_eq(&before, &editor.editor_state()));
    assert!(!editor.in_transaction());
    editor.update(|editor| editor.set_text(&text, "again")).unwrap();
    assert_eq!(editor.editor_state().text_content(&text), "again");
}

#[test]
fn test_panicking_update_rolls_back() {
    let mut editor = Editor::new(validating());
    let (_, text) = hello_world(&mut editor);
    let before = editor.editor_state();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = editor.update(|editor| -> Result<(), EditorError> {
            editor.set_text(&text, "half done")?;
            panic!("listener blew up");
        });
    }));
    assert!(result.is_err());
    assert!(!editor.in_transaction());
    assert!(Rc::ptr_eq(&before, &editor.editor_state()));
}

#[test]
fn test_listeners_receive_payload_and_tags() {
    let mut editor = Editor::new(validating());
    let seen: Rc<RefCell<Vec<(usize, Vec<String>)>>> = Rc::default();
    let sink = Rc::clone(&seen);
    editor.register_update_listener(move |payload: &UpdatePayload| {
        sink.borrow_mut().push((
            payload.editor_state.len() - payload.prev_editor_state.len(),
            payload.tags.iter().cloned().collect(),
        ));
    });

    editor
        .update(|editor| {
            editor.add_update_tag("paste")?;
            let paragraph = editor.create_paragraph()?;
            editor.append(&NodeKey::root(), &paragraph)
        })
        .unwrap();

    assert_eq!(*seen.borrow(), vec![(1, vec!["paste".to_string()])]);
}

#[test]
fn test_detached_nodes_are_not_committed() {
    let mut editor = Editor::new(validating());
    let orphan = editor
        .update(|editor| {
            let orphan = editor.create_text_node("nobody's child")?;
            let paragraph = editor.create_paragraph()?;
            editor.append(&NodeKey::root(), &paragraph)?;
            Ok(orphan)
        })
        .unwrap();

    let state = editor.editor_state();
    assert!(!state.contains(&orphan));
    assert!(!editor.last_update().unwrap().dirty_leaves.contains(&orphan));
    assert_eq!(state.len(), 2);
}

#[test]
fn test_insert_and_remove_keep_links_consistent() {
    let mut editor = Editor::new(validating());
    let (paragraph, hello) = hello_world(&mut editor);

    let (first, last) = editor
        .update(|editor| {
            let first = editor.create_text_node("A")?;
            let last = editor.create_text_node("Z")?;
            editor.insert_before(&hello, &first)?;
            editor.insert_after(&hello, &last)?;
            Ok((first, last))
        })
        .unwrap();
    let state = editor.editor_state();
    assert_eq!(state.children(&paragraph), vec![first.clone(), hello.clone(), last.clone()]);
    assert_eq!(state.text_content(&paragraph), "AHelloZ");

    editor.update(|editor| editor.remove(&hello)).unwrap();
    let state = editor.editor_state();
    assert_eq!(state.children(&paragraph), vec![first.clone(), last.clone()]);
    assert!(!state.contains(&hello));
    assert_eq!(state.get_node(&first).unwrap().next_sibling(), Some(&last));
    assert_eq!(state.get_node(&last).unwrap().prev_sibling(), Some(&first));
    state.validate().unwrap();
}

#[test]
fn test_remove_drops_subtree() {
    let mut editor = Editor::new(validating());
    let (paragraph, text) = hello_world(&mut editor);
    editor.update(|editor| editor.remove(&paragraph)).unwrap();

    let state = editor.editor_state();
    assert!(!state.contains(&paragraph));
    assert!(!state.contains(&text));
    assert!(state.is_empty());
    let payload = editor.last_update().unwrap();
    assert_eq!(payload.dirty_elements.get(&NodeKey::root()), Some(&ElementDirt::Own));
}

#[test]
fn test_invalid_moves_are_rejected() {
    let mut editor = Editor::new(validating());
    let (paragraph, text) = hello_world(&mut editor);

    let err = editor.update(|editor| editor.append(&paragraph, &paragraph)).unwrap_err();
    assert!(matches!(err, EditorError::InvalidInsertion { .. }));

    let err = editor
        .update(|editor| editor.append(&paragraph, &NodeKey::root()))
        .unwrap_err();
    assert!(matches!(err, EditorError::InvalidInsertion { .. }));

    let err = editor.update(|editor| editor.append(&text, &paragraph)).unwrap_err();
    assert!(matches!(err, EditorError::NotAnElement(_)));

    let err = editor.update(|editor| editor.remove(&NodeKey::root())).unwrap_err();
    assert!(matches!(err, EditorError::CannotRemoveRoot));
}

#[test]
fn test_moving_a_node_between_parents() {
    let mut editor = Editor::new(validating());
    let (first_paragraph, text) = hello_world(&mut editor);
    let second_paragraph = editor
        .update(|editor| {
            let second = editor.create_paragraph()?;
            editor.append(&NodeKey::root(), &second)?;
            editor.append(&second, &text)?;
            Ok(second)
        })
        .unwrap();

    let state = editor.editor_state();
    assert!(state.get_node(&first_paragraph).unwrap().as_element().unwrap().is_empty());
    assert_eq!(state.children(&second_paragraph), vec![text.clone()]);
    assert_eq!(state.get_node(&text).unwrap().parent(), Some(&second_paragraph));
}

#[test]
fn test_formatting_setters() {
    let mut editor = Editor::new(validating());
    let (paragraph, text) = hello_world(&mut editor);
    editor
        .update(|editor| {
            editor.toggle_format(&text, TextFormatType::Bold)?;
            editor.set_text_mode(&text, TextMode::Token)?;
            editor.set_style(&text, "color: red")?;
            editor.set_element_format(&paragraph, ElementFormatType::Center)?;
            editor.set_indent(&paragraph, 2)
        })
        .unwrap();

    let state = editor.editor_state();
    let data = state.get_node(&text).unwrap().as_text().unwrap();
    assert!(data.has_format(TextFormatType::Bold));
    assert_eq!(data.mode, TextMode::Token);
    assert_eq!(data.style, "color: red");
    let element = state.get_node(&paragraph).unwrap().as_element().unwrap();
    assert_eq!(element.format, ElementFormatType::Center);
    assert_eq!(element.indent, 2);
}

#[test]
fn test_setting_equal_value_does_not_dirty() {
    let mut editor = Editor::new(validating());
    let (_, text) = hello_world(&mut editor);
    let before = editor.editor_state();
    editor.update(|editor| editor.set_text(&text, "Hello")).unwrap();
    assert!(Rc::ptr_eq(&before, &editor.editor_state()));
}

#[test]
fn test_json_round_trip() {
    let mut editor = Editor::new(validating());
    let (_, text) = hello_world(&mut editor);
    editor
        .update(|editor| editor.toggle_format(&text, TextFormatType::Italic))
        .unwrap();

    let exported = editor.export_json().unwrap();
    let value: Value = serde_json::from_str(&exported).unwrap();
    assert_eq!(
        value,
        json!({
            "root": {
                "type": "root",
                "version": 1,
                "direction": null,
                "format": "",
                "indent": 0,
                "textFormat": 0,
                "textStyle": "",
                "children": [{
                    "type": "paragraph",
                    "version": 1,
                    "direction": null,
                    "format": "",
                    "indent": 0,
                    "textFormat": 0,
                    "textStyle": "",
                    "children": [{
                        "type": "text",
                        "version": 1,
                        "detail": 0,
                        "format": 2,
                        "mode": "normal",
                        "style": "",
                        "text": "Hello"
                    }]
                }]
            }
        })
    );

    let mut other = Editor::new(validating());
    let parsed = other.parse_editor_state(&exported).unwrap();
    other.set_editor_state(parsed).unwrap();
    assert_eq!(other.export_json().unwrap(), exported);
}

#[test]
fn test_parse_rejects_unknown_types_and_bad_roots() {
    let mut editor = Editor::new(validating());
    let err = editor
        .parse_editor_state(r#"{"root": {"type": "root", "children": [{"type": "heading"}]}}"#)
        .unwrap_err();
    assert!(matches!(err, EditorError::UnregisteredNodeType(t) if t == "heading"));

    let err = editor
        .parse_editor_state(r#"{"root": {"type": "paragraph"}}"#)
        .unwrap_err();
    assert!(matches!(err, EditorError::InvalidSerializedNode(_)));

    let err = editor.parse_editor_state("not json").unwrap_err();
    assert!(matches!(err, EditorError::Json(_)));
    assert!(!editor.in_transaction());
}

#[test]
fn test_parse_inside_update_is_nested() {
    let mut editor = Editor::new(validating());
    let err = editor
        .update(|editor| editor.parse_editor_state(r#"{"root": {"type": "root"}}"#).map(|_| ()))
        .unwrap_err();
    assert!(matches!(err, EditorError::NestedUpdate));
}
