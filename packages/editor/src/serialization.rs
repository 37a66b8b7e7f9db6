//! # JSON Envelope
//!
//! Every node serializes as
//!
//! ```text
//! { "type": "...", "version": 1, <variant fields>, <flat state keys>,
//!   "$state": { <nested state> }, "children": [ ... ] }
//! ```
//!
//! Element fields: `format`, `indent`, `direction`, `textFormat`,
//! `textStyle`. Text fields: `text`, `format`, `style`, `mode`, `detail`.
//! Decorators carry their props as top-level fields. State keys the current
//! registry does not know about are carried through untouched.

use crate::editor::Editor;
use crate::editor_state::EditorState;
use crate::errors::{EditorError, EditorResult};
use crate::node::{LexicalNode, NodeKind};
use crate::node_state::{StateRecord, NODE_STATE_KEY};
use lexical_common::{Direction, ElementFormatType, NodeKey, TextMode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope fields owned by the node base, never read as variant fields
const RESERVED_FIELDS: &[&str] = &["type", "version", "children", NODE_STATE_KEY];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SerializedNode>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn default_version() -> u32 {
    1
}

impl SerializedNode {
    pub fn new(node_type: impl Into<String>, version: u32) -> Self {
        Self {
            node_type: node_type.into(),
            version,
            children: None,
            fields: Map::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Read an optional typed field
    pub fn field<T: DeserializeOwned>(&self, field: &str) -> EditorResult<Option<T>> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|err| {
                EditorError::InvalidSerializedNode(format!(
                    "field '{}' of '{}': {}",
                    field, self.node_type, err
                ))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEditorState {
    pub root: SerializedNode,
}

/// Export `node` and its subtree as found in `state`
pub fn export_node(state: &EditorState, node: &LexicalNode) -> SerializedNode {
    let mut out = SerializedNode::new(node.node_type(), node.class().version());
    match node.kind() {
        NodeKind::Root(element) | NodeKind::Element(element) => {
            out.insert("direction", serde_json::to_value(element.direction).unwrap_or(Value::Null));
            out.insert("format", serde_json::to_value(element.format).unwrap_or(Value::Null));
            out.insert("indent", element.indent);
            out.insert("textFormat", element.text_format);
            out.insert("textStyle", element.text_style.clone());
            if !element.style.is_empty() {
                out.insert("style", element.style.clone());
            }
            out.children = Some(
                state
                    .children(node.key())
                    .iter()
                    .filter_map(|child| state.get_node(child))
                    .map(|child| export_node(state, child))
                    .collect(),
            );
        }
        NodeKind::Text(text) => {
            out.insert("detail", text.detail);
            out.insert("format", text.format);
            out.insert("mode", serde_json::to_value(text.mode).unwrap_or(Value::Null));
            out.insert("style", text.style.clone());
            out.insert("text", text.text.clone());
        }
        NodeKind::Decorator(decorator) => {
            for (prop, value) in &decorator.props {
                out.insert(prop.clone(), value.clone());
            }
        }
    }
    if let Some(state) = node.state() {
        out.fields.extend(state.to_json());
    }
    if let Some(export) = node.class().export_fn() {
        export(node, &mut out);
    }
    out
}

impl Editor {
    /// Import `serialized` and its subtree as new, detached nodes. Returns
    /// the key of the imported top node.
    pub fn import_node(&mut self, serialized: &SerializedNode) -> EditorResult<NodeKey> {
        let class = self.registry.class(&serialized.node_type)?;
        let key = match class.import_fn() {
            Some(import) => import(self, serialized)?,
            None => {
                let key = self.create_node(&serialized.node_type)?;
                self.apply_serialized(&key, serialized)?;
                key
            }
        };
        self.import_children(&key, serialized)?;
        Ok(key)
    }

    /// Default import: apply the envelope's variant fields and state to an
    /// existing node. Custom import hooks build on this.
    pub fn apply_serialized(&mut self, key: &NodeKey, serialized: &SerializedNode) -> EditorResult<()> {
        let direction: Option<Direction> = serialized.field("direction")?;
        let element_format: Option<ElementFormatType> = match serialized.get("format") {
            Some(Value::String(_)) => serialized.field("format")?,
            _ => None,
        };
        let text_format: Option<u32> = match serialized.get("format") {
            Some(Value::Number(_)) => serialized.field("format")?,
            _ => None,
        };
        let mode: Option<TextMode> = serialized.field("mode")?;
        let flat_keys: Vec<String> = {
            let node = self.get_latest(key)?;
            let shared = node.class().shared_state().borrow();
            shared.flat_keys().cloned().collect()
        };

        let node = self.get_writable(key)?;
        if let Some(element) = node.as_element_mut() {
            element.direction = direction;
            element.format = element_format.unwrap_or_default();
            element.indent = serialized.field("indent")?.unwrap_or(0);
            element.text_format = serialized.field("textFormat")?.unwrap_or(0);
            element.text_style = serialized.field("textStyle")?.unwrap_or_default();
            element.style = serialized.field("style")?.unwrap_or_default();
        } else if let Some(text) = node.as_text_mut() {
            text.text = serialized.field("text")?.unwrap_or_default();
            text.format = text_format.unwrap_or(0);
            text.style = serialized.field("style")?.unwrap_or_default();
            text.mode = mode.unwrap_or_default();
            text.detail = serialized.field("detail")?.unwrap_or(0);
        } else if let Some(decorator) = node.as_decorator_mut() {
            decorator.props = serialized
                .fields
                .iter()
                .filter(|(field, _)| !RESERVED_FIELDS.contains(&field.as_str()) && !flat_keys.contains(field))
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect();
        }

        let record = state_record(serialized, &flat_keys)?;
        let has_state = self.get_latest(key)?.state().is_some();
        if record.is_some() || has_state {
            self.get_writable_state(key)?.update_from_json(record);
        }
        Ok(())
    }

    fn import_children(&mut self, key: &NodeKey, serialized: &SerializedNode) -> EditorResult<()> {
        let Some(children) = &serialized.children else {
            return Ok(());
        };
        if !children.is_empty() && !self.get_latest(key)?.is_element() {
            return Err(EditorError::InvalidSerializedNode(format!(
                "'{}' node cannot have children",
                serialized.node_type
            )));
        }
        for child in children {
            let child_key = self.import_node(child)?;
            self.append(key, &child_key)?;
        }
        Ok(())
    }

    /// Build a new state from exported JSON without committing it. Keys are
    /// freshly allocated.
    pub fn parse_editor_state(&mut self, json: &str) -> EditorResult<EditorState> {
        let serialized: SerializedEditorState = serde_json::from_str(json)?;
        self.parse_serialized_state(&serialized)
    }

    pub fn parse_serialized_state(&mut self, serialized: &SerializedEditorState) -> EditorResult<EditorState> {
        if serialized.root.node_type != crate::registry::ROOT_TYPE {
            return Err(EditorError::InvalidSerializedNode(format!(
                "top-level node has type '{}', expected 'root'",
                serialized.root.node_type
            )));
        }
        let root = LexicalNode::instantiate(self.registry.root_class(), NodeKey::root());
        self.with_private_state(EditorState::with_root(root), |editor| {
            let root = NodeKey::root();
            editor.apply_serialized(&root, &serialized.root)?;
            editor.import_children(&root, &serialized.root)
        })
    }

    /// Export the committed state as a JSON string
    pub fn export_json(&self) -> EditorResult<String> {
        let serialized = self.editor_state().to_json()?;
        Ok(serde_json::to_string(&serialized)?)
    }
}

/// Nested `$state` merged with any flat-declared keys at the top level
fn state_record(serialized: &SerializedNode, flat_keys: &[String]) -> EditorResult<Option<StateRecord>> {
    let mut record = match serialized.get(NODE_STATE_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::Object(nested)) => Some(nested.clone()),
        Some(other) => {
            return Err(EditorError::InvalidSerializedNode(format!(
                "'{}' must be an object, found {}",
                NODE_STATE_KEY, other
            )))
        }
    };
    for key in flat_keys {
        if let Some(value) = serialized.get(key) {
            record
                .get_or_insert_with(Map::new)
                .insert(key.clone(), value.clone());
        }
    }
    Ok(record)
}
