//! # Nodes
//!
//! Nodes live in a flat `NodeMap` owned by one `EditorState`. Every relation
//! between nodes (parent, siblings, children) is a `NodeKey` resolved against
//! that map, never a reference to another node object, so a node read from
//! an older state stays valid without pinning the rest of the tree.

use crate::node_state::{NodeState, StateConfig, StateValue};
use crate::registry::NodeClass;
use lexical_common::{Direction, ElementFormatType, NodeKey, TextFormatType, TextMode, IS_DIRECTIONLESS, IS_UNMERGEABLE};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of one node *object*. Every clone gets a fresh instance id while
/// keeping the node's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        InstanceId(INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The structural family a node type belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeVariant {
    Root,
    Element,
    Text,
    Decorator,
}

impl NodeVariant {
    pub fn is_element(self) -> bool {
        matches!(self, NodeVariant::Root | NodeVariant::Element)
    }
}

/// Container fields shared by the root and every element type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementData {
    pub(crate) first: Option<NodeKey>,
    pub(crate) last: Option<NodeKey>,
    pub(crate) size: usize,
    pub format: ElementFormatType,
    pub indent: u32,
    pub direction: Option<Direction>,
    pub style: String,
    pub text_format: u32,
    pub text_style: String,
}

impl ElementData {
    pub fn first_child(&self) -> Option<&NodeKey> {
        self.first.as_ref()
    }

    pub fn last_child(&self) -> Option<&NodeKey> {
        self.last.as_ref()
    }

    pub fn child_count(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Leaf text content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextData {
    pub text: String,
    pub format: u32,
    pub style: String,
    pub mode: TextMode,
    pub detail: u32,
}

impl TextData {
    pub fn has_format(&self, format: TextFormatType) -> bool {
        format.is_set(self.format)
    }

    pub fn toggle_format(&mut self, format: TextFormatType) {
        self.format = format.toggle(self.format);
    }

    pub fn is_directionless(&self) -> bool {
        self.detail & IS_DIRECTIONLESS != 0
    }

    pub fn is_unmergeable(&self) -> bool {
        self.detail & IS_UNMERGEABLE != 0
    }

    pub fn is_simple_text(&self) -> bool {
        self.mode == TextMode::Normal
    }
}

/// Opaque, externally rendered content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecoratorData {
    pub props: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root(ElementData),
    Element(ElementData),
    Text(TextData),
    Decorator(DecoratorData),
}

impl NodeKind {
    pub(crate) fn blank(variant: NodeVariant) -> Self {
        match variant {
            NodeVariant::Root => NodeKind::Root(ElementData::default()),
            NodeVariant::Element => NodeKind::Element(ElementData::default()),
            NodeVariant::Text => NodeKind::Text(TextData::default()),
            NodeVariant::Decorator => NodeKind::Decorator(DecoratorData::default()),
        }
    }

    pub fn variant(&self) -> NodeVariant {
        match self {
            NodeKind::Root(_) => NodeVariant::Root,
            NodeKind::Element(_) => NodeVariant::Element,
            NodeKind::Text(_) => NodeVariant::Text,
            NodeKind::Decorator(_) => NodeVariant::Decorator,
        }
    }
}

/// One version of one node
pub struct LexicalNode {
    class: Rc<NodeClass>,
    key: NodeKey,
    parent: Option<NodeKey>,
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
    pub(crate) state: Option<Rc<NodeState>>,
    instance: InstanceId,
    kind: NodeKind,
}

impl LexicalNode {
    /// An empty instance of `class` under `key`
    pub(crate) fn instantiate(class: &Rc<NodeClass>, key: NodeKey) -> Self {
        Self {
            class: Rc::clone(class),
            key,
            parent: None,
            prev: None,
            next: None,
            state: None,
            instance: InstanceId::next(),
            kind: NodeKind::blank(class.variant()),
        }
    }

    /// An empty instance of the same class sharing the original's key.
    /// Custom clone functions start from here.
    pub fn blank_from(original: &LexicalNode) -> Self {
        Self::instantiate(&original.class, original.key.clone())
    }

    /// An empty instance of the same class under a different key
    pub fn blank_with_key(original: &LexicalNode, key: NodeKey) -> Self {
        Self::instantiate(&original.class, key)
    }

    /// Default after-clone step: copy links and variant fields from the
    /// version this node was cloned from, and share its state when the key
    /// was kept.
    pub fn copy_from_original(&mut self, original: &LexicalNode) {
        self.parent = original.parent.clone();
        self.prev = original.prev.clone();
        self.next = original.next.clone();
        if self.key == original.key {
            self.state = original.state.clone();
        }
        match (&mut self.kind, &original.kind) {
            (NodeKind::Root(this), NodeKind::Root(that))
            | (NodeKind::Element(this), NodeKind::Element(that)) => this.clone_from(that),
            (NodeKind::Text(this), NodeKind::Text(that)) => this.clone_from(that),
            (NodeKind::Decorator(this), NodeKind::Decorator(that)) => this.clone_from(that),
            _ => {}
        }
    }

    pub fn node_type(&self) -> &str {
        self.class.node_type()
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn parent(&self) -> Option<&NodeKey> {
        self.parent.as_ref()
    }

    pub fn prev_sibling(&self) -> Option<&NodeKey> {
        self.prev.as_ref()
    }

    pub fn next_sibling(&self) -> Option<&NodeKey> {
        self.next.as_ref()
    }

    pub fn state(&self) -> Option<&NodeState> {
        self.state.as_deref()
    }

    /// Read a state value from this version of the node
    pub fn state_value<V: StateValue>(&self, config: &StateConfig<V>) -> V {
        match &self.state {
            Some(state) => state.get_value(config),
            None => config.default_value().clone(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn variant(&self) -> NodeVariant {
        self.kind.variant()
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root(_))
    }

    pub fn is_element(&self) -> bool {
        self.variant().is_element()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    pub fn is_decorator(&self) -> bool {
        matches!(self.kind, NodeKind::Decorator(_))
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Root(e) | NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Root(e) | NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextData> {
        match &self.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextData> {
        match &mut self.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_decorator(&self) -> Option<&DecoratorData> {
        match &self.kind {
            NodeKind::Decorator(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_decorator_mut(&mut self) -> Option<&mut DecoratorData> {
        match &mut self.kind {
            NodeKind::Decorator(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn class(&self) -> &Rc<NodeClass> {
        &self.class
    }

    pub(crate) fn instance(&self) -> InstanceId {
        self.instance
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeKey>) {
        self.parent = parent;
    }

    pub(crate) fn set_prev(&mut self, prev: Option<NodeKey>) {
        self.prev = prev;
    }

    pub(crate) fn set_next(&mut self, next: Option<NodeKey>) {
        self.next = next;
    }
}

impl fmt::Debug for LexicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LexicalNode")
            .field("type", &self.node_type())
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeConfig;

    fn text_class() -> Rc<NodeClass> {
        Rc::new(NodeConfig::text("text").into_class())
    }

    #[test]
    fn test_blank_from_keeps_key_and_class() {
        let class = text_class();
        let mut original = LexicalNode::instantiate(&class, NodeKey::from("7"));
        original.as_text_mut().unwrap().text = "hello".to_string();

        let blank = LexicalNode::blank_from(&original);
        assert_eq!(blank.key(), original.key());
        assert_eq!(blank.node_type(), "text");
        assert_eq!(blank.as_text().unwrap().text, "");
        assert_ne!(blank.instance(), original.instance());
    }

    #[test]
    fn test_copy_from_original_copies_links_and_fields() {
        let class = text_class();
        let mut original = LexicalNode::instantiate(&class, NodeKey::from("7"));
        original.set_parent(Some(NodeKey::from("1")));
        original.set_next(Some(NodeKey::from("8")));
        original.as_text_mut().unwrap().text = "hello".to_string();
        original.as_text_mut().unwrap().toggle_format(TextFormatType::Bold);

        let mut clone = LexicalNode::blank_from(&original);
        clone.copy_from_original(&original);
        assert_eq!(clone.parent(), original.parent());
        assert_eq!(clone.next_sibling(), original.next_sibling());
        assert_eq!(clone.prev_sibling(), None);
        assert_eq!(clone.kind(), original.kind());
    }

    #[test]
    fn test_state_not_shared_when_key_changes() {
        let class = text_class();
        let mut original = LexicalNode::instantiate(&class, NodeKey::from("7"));
        original.state = Some(Rc::new(NodeState::new(original.instance(), Rc::default())));

        let mut same = LexicalNode::blank_from(&original);
        same.copy_from_original(&original);
        assert!(same.state().is_some());

        let mut other = LexicalNode::blank_with_key(&original, NodeKey::from("99"));
        other.copy_from_original(&original);
        assert!(other.state().is_none());
    }

    #[test]
    fn test_text_flags() {
        let mut text = TextData {
            detail: IS_UNMERGEABLE,
            mode: TextMode::Token,
            ..TextData::default()
        };
        assert!(text.is_unmergeable());
        assert!(!text.is_directionless());
        assert!(!text.is_simple_text());
        text.toggle_format(TextFormatType::Italic);
        assert!(text.has_format(TextFormatType::Italic));
    }
}
