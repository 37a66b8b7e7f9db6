//! # Node Registry
//!
//! Every concrete node type is declared up front with a [`NodeConfig`]
//! record: type tag, variant, optional clone / after-clone / import / export
//! hooks, and the state keys it knows about. Registration resolves the
//! record into a [`NodeClass`], filling in default behavior for missing
//! hooks:
//!
//! - no clone: an empty instance of the class under the original's key
//! - no after-clone: [`LexicalNode::copy_from_original`]
//! - no import: create an empty instance, then apply the envelope's fields
//!   and state
//!
//! Nodes keep an `Rc<NodeClass>` to the registration they were built from.

use crate::editor::Editor;
use crate::errors::{EditorError, EditorResult};
use crate::node::{LexicalNode, NodeVariant};
use crate::node_state::{AnyStateConfig, SharedNodeState, SharedNodeStateRef, StateConfig, StateValue};
use crate::serialization::SerializedNode;
use lexical_common::NodeKey;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

pub type CloneFn = fn(&LexicalNode) -> LexicalNode;
pub type AfterCloneFn = fn(&mut LexicalNode, &LexicalNode);
pub type ImportFn = fn(&mut Editor, &SerializedNode) -> EditorResult<NodeKey>;
pub type ExportFn = fn(&LexicalNode, &mut SerializedNode);
pub type NodeTransform = Rc<dyn Fn(&mut Editor, &NodeKey) -> EditorResult<()>>;

pub const ROOT_TYPE: &str = "root";
pub const PARAGRAPH_TYPE: &str = "paragraph";
pub const TEXT_TYPE: &str = "text";

/// Base types that only exist to be specialized
const ABSTRACT_TYPES: &[&str] = &["node", "element", "decorator"];

/// Up-front declaration of one node type
pub struct NodeConfig {
    node_type: String,
    variant: NodeVariant,
    version: u32,
    clone: Option<CloneFn>,
    after_clone: Option<AfterCloneFn>,
    import_json: Option<ImportFn>,
    export_json: Option<ExportFn>,
    state: Vec<(Rc<dyn AnyStateConfig>, bool)>,
    replaces: Option<String>,
}

impl NodeConfig {
    fn new(node_type: impl Into<String>, variant: NodeVariant) -> Self {
        Self {
            node_type: node_type.into(),
            variant,
            version: 1,
            clone: None,
            after_clone: None,
            import_json: None,
            export_json: None,
            state: Vec::new(),
            replaces: None,
        }
    }

    pub fn element(node_type: impl Into<String>) -> Self {
        Self::new(node_type, NodeVariant::Element)
    }

    pub fn text(node_type: impl Into<String>) -> Self {
        Self::new(node_type, NodeVariant::Text)
    }

    pub fn decorator(node_type: impl Into<String>) -> Self {
        Self::new(node_type, NodeVariant::Decorator)
    }

    pub(crate) fn root() -> Self {
        Self::new(ROOT_TYPE, NodeVariant::Root)
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_clone(mut self, clone: CloneFn) -> Self {
        self.clone = Some(clone);
        self
    }

    /// Replace the default after-clone step. The hook is responsible for
    /// copying links; [`LexicalNode::copy_from_original`] does that.
    pub fn with_after_clone(mut self, after_clone: AfterCloneFn) -> Self {
        self.after_clone = Some(after_clone);
        self
    }

    pub fn with_import(mut self, import_json: ImportFn) -> Self {
        self.import_json = Some(import_json);
        self
    }

    pub fn with_export(mut self, export_json: ExportFn) -> Self {
        self.export_json = Some(export_json);
        self
    }

    pub fn with_state<V: StateValue>(mut self, config: &StateConfig<V>) -> Self {
        self.state.push((config.erased(), false));
        self
    }

    /// Declare a state key serialized at the top level of the envelope
    pub fn with_flat_state<V: StateValue>(mut self, config: &StateConfig<V>) -> Self {
        self.state.push((config.erased(), true));
        self
    }

    /// Construct this type wherever `original_type` would be constructed
    pub fn replaces(mut self, original_type: impl Into<String>) -> Self {
        self.replaces = Some(original_type.into());
        self
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub(crate) fn into_class(self) -> NodeClass {
        let mut shared = SharedNodeState::default();
        for (config, flat) in self.state {
            shared.register(config, flat);
        }
        NodeClass {
            node_type: self.node_type,
            variant: self.variant,
            version: self.version,
            clone: self.clone,
            after_clone: self.after_clone.unwrap_or(LexicalNode::copy_from_original),
            import_json: self.import_json,
            export_json: self.export_json,
            shared_state: Rc::new(RefCell::new(shared)),
        }
    }
}

/// Resolved static behavior of one registered node type
pub struct NodeClass {
    node_type: String,
    variant: NodeVariant,
    version: u32,
    clone: Option<CloneFn>,
    after_clone: AfterCloneFn,
    import_json: Option<ImportFn>,
    export_json: Option<ExportFn>,
    shared_state: SharedNodeStateRef,
}

impl NodeClass {
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn variant(&self) -> NodeVariant {
        self.variant
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn shared_state(&self) -> &SharedNodeStateRef {
        &self.shared_state
    }

    /// Clone step of copy-on-write: the variant's clone, then its
    /// after-clone hook
    pub(crate) fn clone_node(self: &Rc<Self>, latest: &LexicalNode) -> LexicalNode {
        let mut clone = match self.clone {
            Some(clone) => clone(latest),
            None => LexicalNode::instantiate(self, latest.key().clone()),
        };
        (self.after_clone)(&mut clone, latest);
        clone
    }

    pub(crate) fn import_fn(&self) -> Option<ImportFn> {
        self.import_json
    }

    pub(crate) fn export_fn(&self) -> Option<ExportFn> {
        self.export_json
    }
}

impl fmt::Debug for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeClass")
            .field("node_type", &self.node_type)
            .field("variant", &self.variant)
            .field("version", &self.version)
            .field("shared_state", &self.shared_state)
            .finish()
    }
}

/// Per-type registration held by an editor
pub struct RegisteredNode {
    class: Rc<NodeClass>,
    transforms: Vec<NodeTransform>,
    replaced_by: Option<String>,
}

impl RegisteredNode {
    pub fn class(&self) -> &Rc<NodeClass> {
        &self.class
    }

    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }

    pub fn replaced_by(&self) -> Option<&str> {
        self.replaced_by.as_deref()
    }
}

/// Type tag → registration
pub struct Registry {
    nodes: HashMap<String, RegisteredNode>,
    root: Rc<NodeClass>,
}

impl Registry {
    /// A registry holding the root, paragraph and text types
    pub(crate) fn with_builtins() -> Self {
        let root = Rc::new(NodeConfig::root().into_class());
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_TYPE.to_string(),
            RegisteredNode {
                class: Rc::clone(&root),
                transforms: Vec::new(),
                replaced_by: None,
            },
        );
        for config in [NodeConfig::element(PARAGRAPH_TYPE), NodeConfig::text(TEXT_TYPE)] {
            nodes.insert(
                config.node_type.clone(),
                RegisteredNode {
                    class: Rc::new(config.into_class()),
                    transforms: Vec::new(),
                    replaced_by: None,
                },
            );
        }
        Self { nodes, root }
    }

    pub fn register(&mut self, config: NodeConfig) -> EditorResult<Rc<NodeClass>> {
        check_concrete(&config)?;
        if self.nodes.contains_key(&config.node_type) {
            return Err(EditorError::DuplicateNodeType(config.node_type));
        }
        if let Some(original) = &config.replaces {
            let target = self
                .nodes
                .get(original)
                .ok_or_else(|| EditorError::UnregisteredNodeType(original.clone()))?;
            if target.class.variant != config.variant {
                return Err(EditorError::InvalidReplacement {
                    original: original.clone(),
                    replacement: config.node_type.clone(),
                    reason: format!(
                        "variant {:?} does not match {:?}",
                        config.variant, target.class.variant
                    ),
                });
            }
        }

        debug!(node_type = %config.node_type, variant = ?config.variant, "Registering node type");
        let replaces = config.replaces.clone();
        let class = Rc::new(config.into_class());
        if let Some(original) = replaces {
            if let Some(target) = self.nodes.get_mut(&original) {
                target.replaced_by = Some(class.node_type.clone());
            }
        }
        self.nodes.insert(
            class.node_type.clone(),
            RegisteredNode {
                class: Rc::clone(&class),
                transforms: Vec::new(),
                replaced_by: None,
            },
        );
        Ok(class)
    }

    /// Swap in a new registration for an already registered type, keeping
    /// its transforms. Nodes built from the previous registration can no
    /// longer be cloned under their keys. The variant must stay the same.
    pub fn reregister(&mut self, config: NodeConfig) -> EditorResult<Rc<NodeClass>> {
        check_concrete(&config)?;
        let entry = self
            .nodes
            .get_mut(&config.node_type)
            .ok_or_else(|| EditorError::UnregisteredNodeType(config.node_type.clone()))?;
        if entry.class.variant != config.variant {
            return Err(EditorError::InvalidReplacement {
                original: config.node_type.clone(),
                replacement: config.node_type.clone(),
                reason: format!(
                    "re-registration changes variant {:?} to {:?}",
                    entry.class.variant, config.variant
                ),
            });
        }
        debug!(node_type = %config.node_type, "Re-registering node type");
        let class = Rc::new(config.into_class());
        entry.class = Rc::clone(&class);
        Ok(class)
    }

    pub fn get(&self, node_type: &str) -> EditorResult<&RegisteredNode> {
        self.nodes
            .get(node_type)
            .ok_or_else(|| EditorError::UnregisteredNodeType(node_type.to_string()))
    }

    pub fn class(&self, node_type: &str) -> EditorResult<Rc<NodeClass>> {
        self.get(node_type).map(|registered| Rc::clone(&registered.class))
    }

    pub(crate) fn root_class(&self) -> &Rc<NodeClass> {
        &self.root
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.nodes.contains_key(node_type)
    }

    /// Follow replace-by-type rules from `node_type`
    pub fn resolve_replacement<'a>(&'a self, node_type: &'a str) -> &'a str {
        let mut current = node_type;
        // a chain longer than the registry means a cycle
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(current).and_then(|n| n.replaced_by.as_deref()) {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    pub(crate) fn add_transform(&mut self, node_type: &str, transform: NodeTransform) -> EditorResult<()> {
        let entry = self
            .nodes
            .get_mut(node_type)
            .ok_or_else(|| EditorError::UnregisteredNodeType(node_type.to_string()))?;
        entry.transforms.push(transform);
        Ok(())
    }

    pub(crate) fn has_transforms(&self) -> bool {
        self.nodes.values().any(|n| !n.transforms.is_empty())
    }

    pub(crate) fn transforms(&self, node_type: &str) -> Vec<NodeTransform> {
        self.nodes
            .get(node_type)
            .map(|n| n.transforms.clone())
            .unwrap_or_default()
    }

    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

fn check_concrete(config: &NodeConfig) -> EditorResult<()> {
    let is_abstract = ABSTRACT_TYPES.contains(&config.node_type.as_str())
        || config.node_type.is_empty()
        || config.node_type == ROOT_TYPE
        || config.variant == NodeVariant::Root;
    if is_abstract {
        return Err(EditorError::AbstractNodeType(config.node_type.clone()));
    }
    Ok(())
}
