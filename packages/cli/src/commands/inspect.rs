use super::load_document;
use crate::config::LexicalConfig;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use lexical_editor::{EditorState, LexicalNode, NodeKey, TextFormatType};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Exported editor state (.json)
    pub input: PathBuf,

    /// Show node state records next to each node
    #[arg(short, long)]
    pub state: bool,

    /// Show node keys
    #[arg(short, long)]
    pub keys: bool,
}

pub fn inspect(args: InspectArgs, config: &LexicalConfig) -> Result<()> {
    let mut editor = config.build_editor()?;
    load_document(&mut editor, &args.input)?;
    let state = editor.editor_state();

    println!("🔎 {} {}", "Inspecting".green().bold(), args.input.display());
    println!();
    for line in render_tree(&state, &args) {
        println!("{}", line);
    }

    println!();
    println!("   Nodes: {}", state.len());
    for (node_type, count) in type_counts(&state) {
        println!("   {:>6} × {}", count, node_type.bright_white());
    }

    Ok(())
}

/// One line per attached node, indented by depth
fn render_tree(state: &EditorState, args: &InspectArgs) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack = vec![(NodeKey::root(), 0usize)];
    while let Some((key, depth)) = stack.pop() {
        let Some(node) = state.get_node(&key) else {
            continue;
        };
        lines.push(format!("{}{}", "  ".repeat(depth), describe(node, args)));
        for child in state.children(&key).into_iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    lines
}

fn describe(node: &LexicalNode, args: &InspectArgs) -> String {
    let mut line = node.node_type().cyan().to_string();
    if args.keys {
        line.push_str(&format!(" {}", format!("#{}", node.key()).dimmed()));
    }
    if let Some(text) = node.as_text() {
        line.push_str(&format!(" {:?}", text.text));
        if text.format != 0 {
            let names: Vec<&str> = TextFormatType::flags(text.format).into_iter().map(TextFormatType::name).collect();
            line.push_str(&format!(" {}", format!("[{}]", names.join(",")).yellow()));
        }
    } else if let Some(element) = node.as_element() {
        if element.indent > 0 {
            line.push_str(&format!(" indent={}", element.indent));
        }
    } else if let Some(decorator) = node.as_decorator() {
        let props = serde_json::Value::Object(decorator.props.clone());
        line.push_str(&format!(" {}", props));
    }
    if args.state {
        if let Some(state) = node.state() {
            let record = state.to_json();
            if !record.is_empty() {
                line.push_str(&format!(" {}", serde_json::Value::Object(record).to_string().magenta()));
            }
        }
    }
    line
}

fn type_counts(state: &EditorState) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for node in state.nodes() {
        *counts.entry(node.node_type()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{"root":{"type":"root","version":1,"children":[
        {"type":"paragraph","version":1,"children":[
            {"type":"text","version":1,"text":"Hello","format":1},
            {"type":"text","version":1,"text":"world","$state":{"lang":"en"}}
        ]}
    ]}}"#;

    fn args(state: bool) -> InspectArgs {
        InspectArgs {
            input: PathBuf::from("unused.json"),
            state,
            keys: false,
        }
    }

    fn editor_state() -> std::rc::Rc<EditorState> {
        let mut editor = LexicalConfig::default().build_editor().unwrap();
        let parsed = editor.parse_editor_state(DOCUMENT).unwrap();
        editor.set_editor_state(parsed).unwrap();
        editor.editor_state()
    }

    #[test]
    fn test_tree_is_rendered_in_document_order() {
        colored::control::set_override(false);
        let lines = render_tree(&editor_state(), &args(false));
        assert_eq!(
            lines,
            vec![
                "root".to_string(),
                "  paragraph".to_string(),
                "    text \"Hello\" [bold]".to_string(),
                "    text \"world\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_state_flag_shows_records() {
        colored::control::set_override(false);
        let lines = render_tree(&editor_state(), &args(true));
        assert_eq!(lines[3], "    text \"world\" {\"$state\":{\"lang\":\"en\"}}");
    }

    #[test]
    fn test_type_counts() {
        let state = editor_state();
        let counts = type_counts(&state);
        assert_eq!(counts.get("text"), Some(&2));
        assert_eq!(counts.get("paragraph"), Some(&1));
        assert_eq!(counts.get("root"), Some(&1));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = inspect(
            InspectArgs {
                input: dir.path().join("nope.json"),
                state: false,
                keys: false,
            },
            &LexicalConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
