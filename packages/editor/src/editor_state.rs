//! # Editor State
//!
//! One committed snapshot of the document: a flat `NodeMap` plus an optional
//! selection. Snapshots are never mutated after commit; an update works on a
//! pending copy whose map shares every untouched `Rc<LexicalNode>` with the
//! committed one.

use crate::errors::{EditorError, EditorResult};
use crate::node::LexicalNode;
use crate::selection::RangeSelection;
use crate::serialization::{export_node, SerializedEditorState};
use lexical_common::NodeKey;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub type NodeMap = HashMap<NodeKey, Rc<LexicalNode>>;

#[derive(Debug, Clone, Default)]
pub struct EditorState {
    pub(crate) node_map: NodeMap,
    pub(crate) selection: Option<RangeSelection>,
}

impl EditorState {
    pub(crate) fn with_root(root: LexicalNode) -> Self {
        let mut node_map = NodeMap::new();
        node_map.insert(root.key().clone(), Rc::new(root));
        Self {
            node_map,
            selection: None,
        }
    }

    pub fn get_node(&self, key: &NodeKey) -> Option<&LexicalNode> {
        self.node_map.get(key).map(Rc::as_ref)
    }

    /// The shared handle for `key`, for identity checks across snapshots
    pub fn get_node_rc(&self, key: &NodeKey) -> Option<&Rc<LexicalNode>> {
        self.node_map.get(key)
    }

    pub fn root(&self) -> Option<&LexicalNode> {
        self.get_node(&NodeKey::root())
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.node_map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root()
            .and_then(LexicalNode::as_element)
            .map_or(true, |root| root.is_empty())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LexicalNode> {
        self.node_map.values().map(Rc::as_ref)
    }

    pub fn node_map(&self) -> &NodeMap {
        &self.node_map
    }

    pub fn selection(&self) -> Option<&RangeSelection> {
        self.selection.as_ref()
    }

    /// Child keys of `key` in order; empty for leaves and missing nodes
    pub fn children(&self, key: &NodeKey) -> Vec<NodeKey> {
        let mut children = Vec::new();
        let Some(element) = self.get_node(key).and_then(LexicalNode::as_element) else {
            return children;
        };
        let mut cursor = element.first_child().cloned();
        while let Some(child) = cursor {
            // bounded so a corrupt cycle cannot hang a reader
            if children.len() > element.child_count() {
                break;
            }
            cursor = self.get_node(&child).and_then(|n| n.next_sibling().cloned());
            children.push(child);
        }
        children
    }

    /// Text of a leaf, or the concatenated text of an element's descendants.
    /// Block siblings inside the root are separated by blank lines.
    pub fn text_content(&self, key: &NodeKey) -> String {
        let mut out = String::new();
        self.collect_text(key, &mut out);
        out
    }

    fn collect_text(&self, key: &NodeKey, out: &mut String) {
        let Some(node) = self.get_node(key) else {
            return;
        };
        if let Some(text) = node.as_text() {
            out.push_str(&text.text);
            return;
        }
        let children = self.children(key);
        for (i, child) in children.iter().enumerate() {
            if node.is_root() && i > 0 {
                out.push_str("\n\n");
            }
            self.collect_text(child, out);
        }
    }

    /// Export the tree reachable from the root
    pub fn to_json(&self) -> EditorResult<SerializedEditorState> {
        let root = self
            .root()
            .ok_or_else(|| EditorError::NodeNotFound(NodeKey::root()))?;
        Ok(SerializedEditorState {
            root: export_node(self, root),
        })
    }

    /// Check every structural invariant of the node map
    pub fn validate(&self) -> EditorResult<()> {
        let mut roots = 0;
        let mut listed = 0;
        for (key, node) in &self.node_map {
            if node.key() != key {
                return Err(corrupt(key, format!("stored under key of node {}", node.key())));
            }
            if node.is_root() {
                roots += 1;
                if node.parent().is_some() {
                    return Err(corrupt(key, "root has a parent"));
                }
            } else if node.parent().is_none() {
                return Err(corrupt(key, "detached node left in the node map"));
            }
            for (link, target) in [
                ("parent", node.parent()),
                ("prev", node.prev_sibling()),
                ("next", node.next_sibling()),
            ] {
                if let Some(target) = target {
                    if !self.node_map.contains_key(target) {
                        return Err(corrupt(key, format!("dangling {} link to {}", link, target)));
                    }
                }
            }
            if let Some(element) = node.as_element() {
                self.validate_children(key, element.first_child(), element.last_child(), element.child_count())?;
                listed += element.child_count();
            }
        }
        if roots != 1 {
            return Err(corrupt(&NodeKey::root(), format!("expected exactly one root, found {}", roots)));
        }
        if listed + 1 != self.node_map.len() {
            return Err(corrupt(
                &NodeKey::root(),
                format!("{} nodes in the map but {} listed as children", self.node_map.len(), listed),
            ));
        }
        Ok(())
    }

    fn validate_children(
        &self,
        key: &NodeKey,
        first: Option<&NodeKey>,
        last: Option<&NodeKey>,
        size: usize,
    ) -> EditorResult<()> {
        if (size == 0) != (first.is_none() && last.is_none()) || first.is_none() != last.is_none() {
            return Err(corrupt(key, format!("childCount {} disagrees with first/last child", size)));
        }
        let mut seen = HashSet::new();
        let mut prev: Option<&NodeKey> = None;
        let mut cursor = first;
        while let Some(child_key) = cursor {
            if !seen.insert(child_key) || seen.len() > size {
                return Err(corrupt(key, "child list is cyclic or longer than childCount"));
            }
            let child = self
                .get_node(child_key)
                .ok_or_else(|| corrupt(key, format!("missing child {}", child_key)))?;
            if child.parent() != Some(key) {
                return Err(corrupt(child_key, format!("listed under {} but parented elsewhere", key)));
            }
            if child.prev_sibling() != prev {
                return Err(corrupt(child_key, "prev link disagrees with sibling order"));
            }
            prev = Some(child_key);
            cursor = child.next_sibling();
        }
        if seen.len() != size || prev != last {
            return Err(corrupt(key, format!("child list has {} entries, childCount is {}", seen.len(), size)));
        }
        Ok(())
    }
}

fn corrupt(key: &NodeKey, reason: impl Into<String>) -> EditorError {
    EditorError::CorruptTree {
        key: key.clone(),
        reason: reason.into(),
    }
}
