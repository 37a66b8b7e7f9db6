//! # Tree Operations
//!
//! Structural edits and readers over the active state. Links are keys, so
//! every structural edit is a handful of `get_writable` calls on the node
//! being moved, its old and new siblings and both parents.

use crate::editor::{is_attached, Editor};
use crate::errors::{EditorError, EditorResult};
use crate::node::LexicalNode;
use crate::selection::RangeSelection;
use lexical_common::NodeKey;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Before,
    After,
}

impl Editor {
    /// The version of `key` visible to the running transaction, if any
    pub fn get_node(&self, key: &NodeKey) -> EditorResult<Option<&LexicalNode>> {
        Ok(self.active_state("get_node")?.get_node(key))
    }

    /// Like [`Editor::get_node`], but a missing key is a stale reference
    pub fn get_latest(&self, key: &NodeKey) -> EditorResult<&LexicalNode> {
        self.active_state("get_latest")?
            .get_node(key)
            .ok_or_else(|| EditorError::NodeNotFound(key.clone()))
    }

    pub fn get_selection(&self) -> EditorResult<Option<&RangeSelection>> {
        Ok(self.active_state("get_selection")?.selection())
    }

    pub fn root(&self) -> EditorResult<&LexicalNode> {
        self.get_latest(&NodeKey::root())
    }

    pub fn children(&self, key: &NodeKey) -> EditorResult<Vec<NodeKey>> {
        self.expect_element(key)?;
        Ok(self.active_state("children")?.children(key))
    }

    /// Ancestors of `key`, nearest first
    pub fn parent_keys(&self, key: &NodeKey) -> EditorResult<Vec<NodeKey>> {
        let state = self.active_state("parent_keys")?;
        let mut parents = Vec::new();
        let mut cursor = self.get_latest(key)?.parent().cloned();
        while let Some(parent) = cursor {
            if parents.contains(&parent) {
                return Err(EditorError::CorruptTree {
                    key: key.clone(),
                    reason: "parent chain is cyclic".to_string(),
                });
            }
            cursor = state.get_node(&parent).and_then(|node| node.parent().cloned());
            parents.push(parent);
        }
        Ok(parents)
    }

    pub fn text_content(&self, key: &NodeKey) -> EditorResult<String> {
        self.get_latest(key)?;
        Ok(self.active_state("text_content")?.text_content(key))
    }

    /// Whether `key` is reachable from the root
    pub fn is_attached(&self, key: &NodeKey) -> EditorResult<bool> {
        Ok(is_attached(self.active_state("is_attached")?, key))
    }

    /// Move `child` to the end of `parent`'s children
    pub fn append(&mut self, parent: &NodeKey, child: &NodeKey) -> EditorResult<()> {
        self.writable_txn("append")?;
        self.expect_element(parent)?;
        self.check_movable(child, parent)?;
        self.detach(child)?;

        let last = self.expect_element(parent)?.last_child().cloned();
        if let Some(last) = &last {
            self.get_writable(last)?.set_next(Some(child.clone()));
        }
        {
            let node = self.get_writable(child)?;
            node.set_parent(Some(parent.clone()));
            node.set_prev(last.clone());
            node.set_next(None);
        }
        let element = self
            .get_writable(parent)?
            .as_element_mut()
            .ok_or_else(|| EditorError::NotAnElement(parent.clone()))?;
        if element.first.is_none() {
            element.first = Some(child.clone());
        }
        element.last = Some(child.clone());
        element.size += 1;
        trace!(parent = %parent, child = %child, "Appended node");
        Ok(())
    }

    /// Append every key in `children`, in order
    pub fn append_all(&mut self, parent: &NodeKey, children: &[NodeKey]) -> EditorResult<()> {
        for child in children {
            self.append(parent, child)?;
        }
        Ok(())
    }

    pub fn insert_before(&mut self, anchor: &NodeKey, node: &NodeKey) -> EditorResult<()> {
        self.insert_next_to(anchor, node, Placement::Before)
    }

    pub fn insert_after(&mut self, anchor: &NodeKey, node: &NodeKey) -> EditorResult<()> {
        self.insert_next_to(anchor, node, Placement::After)
    }

    fn insert_next_to(&mut self, anchor: &NodeKey, key: &NodeKey, placement: Placement) -> EditorResult<()> {
        self.writable_txn("insert")?;
        if anchor == key {
            return Err(EditorError::InvalidInsertion {
                key: key.clone(),
                reason: "a node cannot be inserted next to itself".to_string(),
            });
        }
        let parent = self
            .get_latest(anchor)?
            .parent()
            .cloned()
            .ok_or_else(|| EditorError::InvalidInsertion {
                key: key.clone(),
                reason: format!("anchor {} has no parent", anchor),
            })?;
        self.check_movable(key, &parent)?;
        self.detach(key)?;

        let anchor_node = self.get_latest(anchor)?;
        let (prev, next) = match placement {
            Placement::Before => (anchor_node.prev_sibling().cloned(), Some(anchor.clone())),
            Placement::After => (Some(anchor.clone()), anchor_node.next_sibling().cloned()),
        };
        if let Some(prev) = &prev {
            self.get_writable(prev)?.set_next(Some(key.clone()));
        }
        if let Some(next) = &next {
            self.get_writable(next)?.set_prev(Some(key.clone()));
        }
        {
            let node = self.get_writable(key)?;
            node.set_parent(Some(parent.clone()));
            node.set_prev(prev.clone());
            node.set_next(next.clone());
        }
        let element = self
            .get_writable(&parent)?
            .as_element_mut()
            .ok_or_else(|| EditorError::NotAnElement(parent.clone()))?;
        if prev.is_none() {
            element.first = Some(key.clone());
        }
        if next.is_none() {
            element.last = Some(key.clone());
        }
        element.size += 1;
        trace!(anchor = %anchor, key = %key, ?placement, "Inserted node");
        Ok(())
    }

    /// Unlink `key` from its parent and siblings. The node stays in the
    /// active state; if it is still detached at commit it is dropped.
    pub fn detach(&mut self, key: &NodeKey) -> EditorResult<()> {
        self.writable_txn("detach")?;
        let node = self.get_latest(key)?;
        if node.is_root() {
            return Err(EditorError::CannotRemoveRoot);
        }
        let Some(parent) = node.parent().cloned() else {
            return Ok(());
        };
        let prev = node.prev_sibling().cloned();
        let next = node.next_sibling().cloned();

        if let Some(prev) = &prev {
            self.get_writable(prev)?.set_next(next.clone());
        }
        if let Some(next) = &next {
            self.get_writable(next)?.set_prev(prev.clone());
        }
        {
            let element = self
                .get_writable(&parent)?
                .as_element_mut()
                .ok_or_else(|| EditorError::NotAnElement(parent.clone()))?;
            if element.first.as_ref() == Some(key) {
                element.first = next.clone();
            }
            if element.last.as_ref() == Some(key) {
                element.last = prev.clone();
            }
            element.size = element.size.checked_sub(1).ok_or_else(|| EditorError::CorruptTree {
                key: parent.clone(),
                reason: "childCount underflow".to_string(),
            })?;
        }
        let node = self.get_writable(key)?;
        node.set_parent(None);
        node.set_prev(None);
        node.set_next(None);
        Ok(())
    }

    /// Detach `key` and drop it and its descendants from the active state
    pub fn remove(&mut self, key: &NodeKey) -> EditorResult<()> {
        self.detach(key)?;
        let txn = self.writable_txn("remove")?;
        let Some(pending) = txn.pending.as_mut() else {
            return Err(EditorError::ReadOnly { operation: "remove" });
        };
        let mut stack = vec![key.clone()];
        while let Some(key) = stack.pop() {
            stack.extend(pending.children(&key));
            pending.node_map.remove(&key);
            txn.dirty.elements.remove(&key);
            txn.dirty.leaves.remove(&key);
            txn.untransformed.remove(&key);
        }
        trace!(key = %key, "Removed node");
        Ok(())
    }

    /// `key` may be placed under `parent`: it is not the root and not
    /// `parent` or one of its ancestors
    fn check_movable(&self, key: &NodeKey, parent: &NodeKey) -> EditorResult<()> {
        let node = self.get_latest(key)?;
        if node.is_root() {
            return Err(EditorError::InvalidInsertion {
                key: key.clone(),
                reason: "the root cannot be moved".to_string(),
            });
        }
        if key == parent || self.parent_keys(parent)?.contains(key) {
            return Err(EditorError::InvalidInsertion {
                key: key.clone(),
                reason: format!("{} is an ancestor of {}", key, parent),
            });
        }
        Ok(())
    }
}
