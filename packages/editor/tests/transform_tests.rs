//! Node transforms run before commit

use lexical_editor::{Editor, EditorConfig, EditorError, NodeKey, TextFormatType};
use std::cell::RefCell;
use std::rc::Rc;

fn config(max_transform_passes: usize) -> EditorConfig {
    EditorConfig {
        validation: true,
        max_transform_passes,
        ..EditorConfig::default()
    }
}

fn paragraph_with_text(editor: &mut Editor, text: &str) -> (NodeKey, NodeKey) {
    editor
        .update(|editor| {
            let paragraph = editor.create_paragraph()?;
            let node = editor.create_text_node(text)?;
            editor.append(&paragraph, &node)?;
            editor.append(&NodeKey::root(), &paragraph)?;
            Ok((paragraph, node))
        })
        .unwrap()
}

#[test]
fn test_transform_runs_on_written_nodes() {
    let mut editor = Editor::new(config(10));
    editor
        .register_node_transform("text", |editor, key| {
            let upper = editor.get_latest(key)?.as_text().map(|t| t.text.to_uppercase());
            match upper {
                Some(upper) => editor.set_text(key, upper),
                None => Ok(()),
            }
        })
        .unwrap();

    let (_, text) = paragraph_with_text(&mut editor, "shout");
    assert_eq!(editor.editor_state().text_content(&text), "SHOUT");

    editor.update(|editor| editor.set_text(&text, "again")).unwrap();
    assert_eq!(editor.editor_state().text_content(&text), "AGAIN");
}

#[test]
fn test_transform_that_never_settles_fails_and_rolls_back() {
    let mut editor = Editor::new(config(5));
    let (_, text) = paragraph_with_text(&mut editor, "blink");
    let before = editor.editor_state();

    editor
        .register_node_transform("text", |editor, key| editor.toggle_format(key, TextFormatType::Bold))
        .unwrap();
    let err = editor.update(|editor| editor.set_text(&text, "blink!")).unwrap_err();
    assert!(matches!(err, EditorError::TransformLoop { passes: 5 }));
    assert!(Rc::ptr_eq(&before, &editor.editor_state()));
}

#[test]
fn test_leaves_run_before_elements() {
    let mut editor = Editor::new(config(10));
    let order: Rc<RefCell<Vec<String>>> = Rc::default();
    for node_type in ["text", "paragraph"] {
        let sink = Rc::clone(&order);
        editor
            .register_node_transform(node_type, move |_, _| {
                sink.borrow_mut().push(node_type.to_string());
                Ok(())
            })
            .unwrap();
    }

    paragraph_with_text(&mut editor, "x");
    assert_eq!(*order.borrow(), vec!["text".to_string(), "paragraph".to_string()]);
}

#[test]
fn test_ancestors_are_not_transformed() {
    let mut editor = Editor::new(config(10));
    let (_, text) = paragraph_with_text(&mut editor, "x");
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    editor
        .register_node_transform("paragraph", move |_, _| {
            *counter.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();

    editor.update(|editor| editor.set_text(&text, "y")).unwrap();
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn test_detached_nodes_are_skipped() {
    let mut editor = Editor::new(config(10));
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    editor
        .register_node_transform("text", move |_, _| {
            *counter.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();

    editor
        .update(|editor| editor.create_text_node("floating").map(|_| ()))
        .unwrap();
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn test_transform_for_unregistered_type_fails() {
    let mut editor = Editor::new(config(10));
    let err = editor
        .register_node_transform("heading", |_, _| Ok(()))
        .unwrap_err();
    assert!(matches!(err, EditorError::UnregisteredNodeType(_)));
}
