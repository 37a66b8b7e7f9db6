//! # Dirty Tracking
//!
//! Per-transaction record of what changed, handed to the renderer after
//! commit. Elements are either dirty in their *own* right or only as an
//! *ancestor* of a changed descendant. Leaves are simply dirty.

use crate::editor_state::NodeMap;
use lexical_common::NodeKey;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementDirt {
    /// The element itself changed
    Own,
    /// Only a descendant changed
    Ancestor,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirtySets {
    pub elements: HashMap<NodeKey, ElementDirt>,
    pub leaves: HashSet<NodeKey>,
}

impl DirtySets {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.leaves.is_empty()
    }

    pub fn is_own_dirty(&self, key: &NodeKey) -> bool {
        self.elements.get(key) == Some(&ElementDirt::Own)
    }

    pub fn is_ancestor_dirty(&self, key: &NodeKey) -> bool {
        self.elements.get(key) == Some(&ElementDirt::Ancestor)
    }

    pub fn is_dirty(&self, key: &NodeKey) -> bool {
        self.elements.contains_key(key) || self.leaves.contains(key)
    }

    /// Every dirty key: own-dirty elements and leaves first, then ancestors
    pub fn keys(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self.leaves.iter().cloned().collect();
        keys.extend(
            self.elements
                .iter()
                .filter(|(_, dirt)| **dirt == ElementDirt::Own)
                .map(|(key, _)| key.clone()),
        );
        keys.extend(
            self.elements
                .iter()
                .filter(|(_, dirt)| **dirt == ElementDirt::Ancestor)
                .map(|(key, _)| key.clone()),
        );
        keys
    }

    pub fn len(&self) -> usize {
        self.elements.len() + self.leaves.len()
    }

    /// Mark `key` dirty in its own right and every ancestor as an ancestor of
    /// a change. Returns whether `key` was newly recorded.
    pub(crate) fn mark(&mut self, map: &NodeMap, key: &NodeKey) -> bool {
        let Some(node) = map.get(key) else {
            return false;
        };
        let newly = if node.is_element() {
            self.elements.insert(key.clone(), ElementDirt::Own) != Some(ElementDirt::Own)
        } else {
            self.leaves.insert(key.clone())
        };
        self.mark_ancestors(map, node.parent().cloned());
        newly
    }

    fn mark_ancestors(&mut self, map: &NodeMap, mut parent: Option<NodeKey>) {
        while let Some(key) = parent {
            // an ancestor already recorded has had its own chain walked
            if self.elements.contains_key(&key) {
                return;
            }
            let Some(node) = map.get(&key) else {
                return;
            };
            self.elements.insert(key, ElementDirt::Ancestor);
            parent = node.parent().cloned();
        }
    }
}
