//! # Copy-on-Write Mutations
//!
//! Every write goes through [`Editor::get_writable`], which hands out a node
//! private to the running update.
//!
//! ## Design Principles
//!
//! 1. **Clone once**: the first write to a key in an update clones the
//!    latest version. Later writes in the same update reuse that clone.
//! 2. **Snapshots stay intact**: the committed state keeps the version it
//!    had; only the pending map sees the clone.
//! 3. **Dirty on write**: every writable handle marks its node (and the
//!    node's ancestors) dirty for the renderer.
//! 4. **State follows the node**: a node's [`NodeState`] is copied on
//!    write separately, bound to the node instance that owns it.
//!
//! ## Validation checks
//!
//! With `EditorConfig::validation` on, a clone must keep the original's key,
//! type and links, and nodes built from a stale registration of their type
//! cannot be cloned.

use crate::editor::{Editor, Transaction};
use crate::errors::{EditorError, EditorResult};
use crate::node::{ElementData, LexicalNode, NodeVariant, TextData};
use crate::node_state::{NodeState, StateConfig, StateValue};
use crate::registry::{PARAGRAPH_TYPE, TEXT_TYPE};
use crate::selection::RangeSelection;
use lexical_common::{allocate_key, Direction, ElementFormatType, NodeKey, TextFormatType, TextMode};
use serde_json::Value;
use std::rc::Rc;
use tracing::trace;

impl Editor {
    /// A version of `key` that is safe to mutate in the running update
    pub fn get_writable(&mut self, key: &NodeKey) -> EditorResult<&mut LexicalNode> {
        let validation = self.config.validation;
        let Editor { registry, txn, .. } = self;
        let Transaction {
            pending,
            dirty,
            clone_not_needed,
            untransformed,
            ..
        } = match txn {
            None => return Err(EditorError::NoActiveEditor { operation: "get_writable" }),
            Some(txn) => txn,
        };
        let Some(pending) = pending.as_mut() else {
            return Err(EditorError::ReadOnly { operation: "get_writable" });
        };
        if let Some(selection) = &pending.selection {
            selection.invalidate_cached_nodes();
        }

        if !clone_not_needed.contains(key) {
            let latest = pending
                .node_map
                .get(key)
                .ok_or_else(|| EditorError::NodeNotFound(key.clone()))?;
            let class = registry.class(latest.node_type())?;
            if validation && !Rc::ptr_eq(latest.class(), &class) {
                return Err(EditorError::StaleNodeClass {
                    key: key.clone(),
                    node_type: latest.node_type().to_string(),
                });
            }
            let clone = class.clone_node(latest);
            if validation {
                check_clone(latest, &clone)?;
            }
            trace!(key = %key, node_type = %clone.node_type(), "Cloned node for writing");
            pending.node_map.insert(key.clone(), Rc::new(clone));
            clone_not_needed.insert(key.clone());
        } else if !pending.node_map.contains_key(key) {
            return Err(EditorError::NodeNotFound(key.clone()));
        }

        dirty.mark(&pending.node_map, key);
        untransformed.insert(key.clone());
        pending
            .node_map
            .get_mut(key)
            .and_then(Rc::get_mut)
            .ok_or_else(|| EditorError::SharedWritableNode(key.clone()))
    }

    /// Construct an empty node of `node_type` (or of the type registered to
    /// replace it) under a fresh key. The node starts detached.
    pub fn create_node(&mut self, node_type: &str) -> EditorResult<NodeKey> {
        self.writable_txn("create_node")?;
        let resolved = self.registry.resolve_replacement(node_type).to_string();
        let class = self.registry.class(&resolved)?;
        if class.variant() == NodeVariant::Root {
            return Err(EditorError::AbstractNodeType(resolved));
        }

        let key = allocate_key();
        let node = LexicalNode::instantiate(&class, key.clone());
        let txn = self.writable_txn("create_node")?;
        if let Some(pending) = txn.pending.as_mut() {
            pending.node_map.insert(key.clone(), Rc::new(node));
        }
        txn.clone_not_needed.insert(key.clone());
        txn.mark_dirty(&key);
        trace!(key = %key, node_type = %resolved, "Created node");
        Ok(key)
    }

    /// Construct an empty node of `node_type` under an explicit key, taking
    /// over the tree position of any node already stored there.
    pub fn create_node_with_key(&mut self, node_type: &str, key: NodeKey) -> EditorResult<NodeKey> {
        let validation = self.config.validation;
        self.writable_txn("create_node_with_key")?;
        let class = self.registry.class(node_type)?;
        if class.variant() == NodeVariant::Root {
            return Err(EditorError::AbstractNodeType(node_type.to_string()));
        }
        let mut node = LexicalNode::instantiate(&class, key.clone());

        let txn = self.writable_txn("create_node_with_key")?;
        let Some(pending) = txn.pending.as_mut() else {
            return Err(EditorError::ReadOnly { operation: "create_node_with_key" });
        };
        if let Some(existing) = pending.get_node(&key) {
            if validation {
                if existing.node_type() != node_type {
                    return Err(EditorError::KeyReusedWithDifferentType {
                        key,
                        existing: existing.node_type().to_string(),
                        attempted: node_type.to_string(),
                    });
                }
                if !Rc::ptr_eq(existing.class(), &class) {
                    return Err(EditorError::StaleNodeClass {
                        key,
                        node_type: node_type.to_string(),
                    });
                }
            }
            if existing.is_root() {
                return Err(EditorError::CannotRemoveRoot);
            }
            node.set_parent(existing.parent().cloned());
            node.set_prev(existing.prev_sibling().cloned());
            node.set_next(existing.next_sibling().cloned());
            match (existing.as_element(), node.as_element_mut()) {
                (Some(old), Some(new)) => {
                    new.first = old.first.clone();
                    new.last = old.last.clone();
                    new.size = old.size;
                }
                (Some(old), None) if !old.is_empty() => {
                    return Err(EditorError::InvalidInsertion {
                        key,
                        reason: format!("'{}' cannot take over the children of an element", node_type),
                    });
                }
                _ => {}
            }
        }
        pending.node_map.insert(key.clone(), Rc::new(node));
        txn.clone_not_needed.insert(key.clone());
        txn.mark_dirty(&key);
        Ok(key)
    }

    pub fn create_element(&mut self, node_type: &str) -> EditorResult<NodeKey> {
        let key = self.create_node(node_type)?;
        self.expect_element(&key)?;
        Ok(key)
    }

    pub fn create_paragraph(&mut self) -> EditorResult<NodeKey> {
        self.create_element(PARAGRAPH_TYPE)
    }

    pub fn create_text(&mut self, node_type: &str, text: impl Into<String>) -> EditorResult<NodeKey> {
        let key = self.create_node(node_type)?;
        let node = self.get_writable(&key)?;
        let data = node.as_text_mut().ok_or_else(|| EditorError::NotText(key.clone()))?;
        data.text = text.into();
        Ok(key)
    }

    pub fn create_text_node(&mut self, text: impl Into<String>) -> EditorResult<NodeKey> {
        self.create_text(TEXT_TYPE, text)
    }

    pub fn create_decorator(&mut self, node_type: &str) -> EditorResult<NodeKey> {
        let key = self.create_node(node_type)?;
        if !self.get_latest(&key)?.is_decorator() {
            return Err(EditorError::NotDecorator(key));
        }
        Ok(key)
    }

    /// The node's state, made private to the running update
    pub fn get_writable_state(&mut self, key: &NodeKey) -> EditorResult<&mut NodeState> {
        let node = self.get_writable(key)?;
        let owner = node.instance();
        let state = match node.state.take() {
            Some(state) => state.get_writable(owner),
            None => Rc::new(NodeState::new(owner, Rc::clone(node.class().shared_state()))),
        };
        Rc::get_mut(node.state.insert(state)).ok_or_else(|| EditorError::SharedWritableNode(key.clone()))
    }

    pub fn get_state<V: StateValue>(&self, key: &NodeKey, config: &StateConfig<V>) -> EditorResult<V> {
        Ok(self.get_latest(key)?.state_value(config))
    }

    /// Set a state value. Writing a value equal to the current one is a no-op.
    pub fn set_state<V: StateValue>(&mut self, key: &NodeKey, config: &StateConfig<V>, value: V) -> EditorResult<()> {
        self.update_state(key, config, |_| value)
    }

    pub fn update_state<V: StateValue>(
        &mut self,
        key: &NodeKey,
        config: &StateConfig<V>,
        f: impl FnOnce(&V) -> V,
    ) -> EditorResult<()> {
        self.writable_txn("update_state")?;
        let node = self.get_latest(key)?;
        if self.config.validation {
            check_collision(node, config)?;
        }
        let current = node.state_value(config);
        let next = f(&current);
        if config.is_equal(&current, &next) {
            return Ok(());
        }
        self.get_writable_state(key)?.set_value(config, next);
        Ok(())
    }

    /// Set a raw state value, parsed if the key is configured for the type
    pub fn set_unknown_state(&mut self, key: &NodeKey, state_key: &str, value: Value) -> EditorResult<()> {
        self.get_writable_state(key)?.update_from_unknown(state_key, value);
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Option<RangeSelection>) -> EditorResult<()> {
        let txn = self.writable_txn("set_selection")?;
        if let Some(pending) = txn.pending.as_mut() {
            pending.selection = selection;
        }
        Ok(())
    }

    pub fn set_text(&mut self, key: &NodeKey, text: impl Into<String>) -> EditorResult<()> {
        let text = text.into();
        self.modify_text(key, |data| data.text.clone_from(&text))
    }

    pub fn set_text_format(&mut self, key: &NodeKey, format: u32) -> EditorResult<()> {
        self.modify_text(key, |data| data.format = format)
    }

    pub fn toggle_format(&mut self, key: &NodeKey, format: TextFormatType) -> EditorResult<()> {
        self.modify_text(key, |data| data.toggle_format(format))
    }

    pub fn set_text_mode(&mut self, key: &NodeKey, mode: TextMode) -> EditorResult<()> {
        self.modify_text(key, |data| data.mode = mode)
    }

    pub fn set_text_detail(&mut self, key: &NodeKey, detail: u32) -> EditorResult<()> {
        self.modify_text(key, |data| data.detail = detail)
    }

    /// Inline style of a text node, or block style of an element
    pub fn set_style(&mut self, key: &NodeKey, style: impl Into<String>) -> EditorResult<()> {
        let style = style.into();
        if self.get_latest(key)?.is_element() {
            self.modify_element(key, |data| data.style.clone_from(&style))
        } else {
            self.modify_text(key, |data| data.style.clone_from(&style))
        }
    }

    pub fn set_indent(&mut self, key: &NodeKey, indent: u32) -> EditorResult<()> {
        self.modify_element(key, |data| data.indent = indent)
    }

    pub fn set_element_format(&mut self, key: &NodeKey, format: ElementFormatType) -> EditorResult<()> {
        self.modify_element(key, |data| data.format = format)
    }

    pub fn set_direction(&mut self, key: &NodeKey, direction: Option<Direction>) -> EditorResult<()> {
        self.modify_element(key, |data| data.direction = direction)
    }

    pub fn set_decorator_prop(&mut self, key: &NodeKey, prop: &str, value: Value) -> EditorResult<()> {
        let current = self
            .get_latest(key)?
            .as_decorator()
            .ok_or_else(|| EditorError::NotDecorator(key.clone()))?;
        if current.props.get(prop) == Some(&value) {
            return Ok(());
        }
        if let Some(decorator) = self.get_writable(key)?.as_decorator_mut() {
            decorator.props.insert(prop.to_string(), value);
        }
        Ok(())
    }

    /// Apply `f` to a writable copy, unless it would leave the latest
    /// version unchanged
    fn modify_text(&mut self, key: &NodeKey, f: impl Fn(&mut TextData)) -> EditorResult<()> {
        self.writable_txn("modify_text")?;
        let current = self
            .get_latest(key)?
            .as_text()
            .ok_or_else(|| EditorError::NotText(key.clone()))?;
        let mut next = current.clone();
        f(&mut next);
        if next == *current {
            return Ok(());
        }
        if let Some(data) = self.get_writable(key)?.as_text_mut() {
            f(data);
        }
        Ok(())
    }

    fn modify_element(&mut self, key: &NodeKey, f: impl Fn(&mut ElementData)) -> EditorResult<()> {
        self.writable_txn("modify_element")?;
        let current = self.expect_element(key)?;
        let mut next = current.clone();
        f(&mut next);
        if next == *current {
            return Ok(());
        }
        if let Some(data) = self.get_writable(key)?.as_element_mut() {
            f(data);
        }
        Ok(())
    }

    pub(crate) fn expect_element(&self, key: &NodeKey) -> EditorResult<&ElementData> {
        self.get_latest(key)?
            .as_element()
            .ok_or_else(|| EditorError::NotAnElement(key.clone()))
    }
}

fn check_clone(latest: &LexicalNode, clone: &LexicalNode) -> EditorResult<()> {
    if clone.key() != latest.key() {
        return Err(EditorError::CloneChangedKey {
            node_type: latest.node_type().to_string(),
            expected: latest.key().clone(),
            found: clone.key().clone(),
        });
    }
    if clone.node_type() != latest.node_type() {
        return Err(EditorError::KeyReusedWithDifferentType {
            key: latest.key().clone(),
            existing: latest.node_type().to_string(),
            attempted: clone.node_type().to_string(),
        });
    }
    let links_kept = clone.parent() == latest.parent()
        && clone.prev_sibling() == latest.prev_sibling()
        && clone.next_sibling() == latest.next_sibling();
    if !links_kept {
        return Err(EditorError::CloneChangedLinks {
            node_type: latest.node_type().to_string(),
            key: latest.key().clone(),
        });
    }
    Ok(())
}

/// Two distinct configs sharing one key on one node type
fn check_collision<V: StateValue>(node: &LexicalNode, config: &StateConfig<V>) -> EditorResult<()> {
    let registered = match node.state() {
        Some(state) => state.configured(config.key()),
        None => node.class().shared_state().borrow().get(config.key()),
    };
    match registered {
        Some(registered) if !config.is(&registered) => Err(EditorError::StateKeyCollision {
            state_key: config.key().to_string(),
            node_type: node.node_type().to_string(),
            node_key: node.key().clone(),
        }),
        _ => Ok(()),
    }
}
