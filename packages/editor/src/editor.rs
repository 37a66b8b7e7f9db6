//! # Editor
//!
//! The mutable session around a document. An `Editor` owns the node
//! registry, the committed [`EditorState`] and, while an update or read is
//! running, the transaction scratch state:
//!
//! - the pending state (a copy-on-write overlay of the committed node map)
//! - the dirty sets handed to the renderer after commit
//! - the set of keys already cloned during this transaction
//!
//! Every node operation takes `&mut Editor` and fails with a context error
//! when no transaction is active, so there is no ambient "active editor".

use crate::dirty::{DirtySets, ElementDirt};
use crate::editor_state::EditorState;
use crate::errors::{EditorError, EditorResult};
use crate::node::LexicalNode;
use crate::registry::{NodeClass, NodeConfig, NodeTransform, Registry};
use lexical_common::NodeKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use tracing::{debug, instrument, trace};

pub const DEFAULT_MAX_TRANSFORM_PASSES: usize = 100;

/// Editor-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    pub namespace: String,
    /// Run the clone-contract, state-collision and tree checks
    pub validation: bool,
    pub max_transform_passes: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            validation: cfg!(debug_assertions),
            max_transform_passes: DEFAULT_MAX_TRANSFORM_PASSES,
        }
    }
}

/// What a committed update hands to the renderer
#[derive(Debug, Clone)]
pub struct UpdatePayload {
    pub editor_state: Rc<EditorState>,
    pub prev_editor_state: Rc<EditorState>,
    pub dirty_elements: HashMap<NodeKey, ElementDirt>,
    pub dirty_leaves: HashSet<NodeKey>,
    pub tags: BTreeSet<String>,
}

impl UpdatePayload {
    pub fn own_dirty_elements(&self) -> Vec<&NodeKey> {
        self.elements_with(ElementDirt::Own)
    }

    pub fn ancestor_dirty_elements(&self) -> Vec<&NodeKey> {
        self.elements_with(ElementDirt::Ancestor)
    }

    fn elements_with(&self, dirt: ElementDirt) -> Vec<&NodeKey> {
        let mut keys: Vec<&NodeKey> = self
            .dirty_elements
            .iter()
            .filter(|(_, d)| **d == dirt)
            .map(|(key, _)| key)
            .collect();
        keys.sort();
        keys
    }
}

pub type UpdateListener = Box<dyn Fn(&UpdatePayload)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// Scratch state of the running update or read
pub(crate) struct Transaction {
    /// `None` for reads
    pub(crate) pending: Option<EditorState>,
    pub(crate) dirty: DirtySets,
    pub(crate) clone_not_needed: HashSet<NodeKey>,
    /// Keys marked dirty since the last transform pass
    pub(crate) untransformed: HashSet<NodeKey>,
    pub(crate) tags: BTreeSet<String>,
}

impl Transaction {
    fn writable(pending: EditorState) -> Self {
        Self {
            pending: Some(pending),
            dirty: DirtySets::default(),
            clone_not_needed: HashSet::new(),
            untransformed: HashSet::new(),
            tags: BTreeSet::new(),
        }
    }

    fn read_only() -> Self {
        Self {
            pending: None,
            dirty: DirtySets::default(),
            clone_not_needed: HashSet::new(),
            untransformed: HashSet::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Record `key` as changed in the pending state
    pub(crate) fn mark_dirty(&mut self, key: &NodeKey) {
        if let Some(pending) = &self.pending {
            self.dirty.mark(&pending.node_map, key);
            self.untransformed.insert(key.clone());
        }
    }
}

pub struct Editor {
    pub(crate) config: EditorConfig,
    pub(crate) registry: Registry,
    state: Rc<EditorState>,
    pub(crate) txn: Option<Transaction>,
    listeners: Vec<(ListenerId, UpdateListener)>,
    next_listener: usize,
    last_update: Option<UpdatePayload>,
}

/// Holds a transaction open for the duration of a callback. Dropping it
/// without committing, including during a panic, discards the pending state.
struct UpdateScope<'a> {
    editor: &'a mut Editor,
}

impl Deref for UpdateScope<'_> {
    type Target = Editor;

    fn deref(&self) -> &Editor {
        self.editor
    }
}

impl DerefMut for UpdateScope<'_> {
    fn deref_mut(&mut self) -> &mut Editor {
        self.editor
    }
}

impl Drop for UpdateScope<'_> {
    fn drop(&mut self) {
        if let Some(Transaction { pending: Some(_), .. }) = self.editor.txn.take() {
            debug!(namespace = %self.editor.config.namespace, "Update rolled back");
        }
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let registry = Registry::with_builtins();
        let root = LexicalNode::instantiate(registry.root_class(), NodeKey::root());
        Self {
            config,
            registry,
            state: Rc::new(EditorState::with_root(root)),
            txn: None,
            listeners: Vec::new(),
            next_listener: 0,
            last_update: None,
        }
    }

    /// An editor with `nodes` registered on top of the built-in types
    pub fn with_nodes(config: EditorConfig, nodes: Vec<NodeConfig>) -> EditorResult<Self> {
        let mut editor = Self::new(config);
        for node in nodes {
            editor.register_node(node)?;
        }
        Ok(editor)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn register_node(&mut self, config: NodeConfig) -> EditorResult<Rc<NodeClass>> {
        self.registry.register(config)
    }

    /// Replace the registration of an existing type, as a code reload would
    pub fn reregister_node(&mut self, config: NodeConfig) -> EditorResult<Rc<NodeClass>> {
        self.registry.reregister(config)
    }

    pub fn register_node_transform(
        &mut self,
        node_type: &str,
        transform: impl Fn(&mut Editor, &NodeKey) -> EditorResult<()> + 'static,
    ) -> EditorResult<()> {
        let transform: NodeTransform = Rc::new(transform);
        self.registry.add_transform(node_type, transform)
    }

    pub fn register_update_listener(&mut self, listener: impl Fn(&UpdatePayload) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_update_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// The committed state. Readable from any context.
    pub fn editor_state(&self) -> Rc<EditorState> {
        Rc::clone(&self.state)
    }

    pub fn last_update(&self) -> Option<&UpdatePayload> {
        self.last_update.as_ref()
    }

    /// Whether an update or read is running
    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        matches!(&self.txn, Some(txn) if txn.pending.is_none())
    }

    /// Run `f` as one update. On success the pending state is committed and
    /// listeners are notified; on error or panic nothing is committed.
    #[instrument(skip_all, fields(namespace = %self.config.namespace))]
    pub fn update<T>(&mut self, f: impl FnOnce(&mut Editor) -> EditorResult<T>) -> EditorResult<T> {
        if self.txn.is_some() {
            return Err(EditorError::NestedUpdate);
        }
        trace!("Transaction begin");
        self.txn = Some(Transaction::writable((*self.state).clone()));
        let mut scope = UpdateScope { editor: self };
        let value = match f(&mut *scope) {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "Update failed, rolling back");
                return Err(err);
            }
        };
        scope.commit()?;
        Ok(value)
    }

    /// Run `f` against the committed state. Mutations fail with
    /// [`EditorError::ReadOnly`].
    pub fn read<T>(&mut self, f: impl FnOnce(&mut Editor) -> EditorResult<T>) -> EditorResult<T> {
        if self.txn.is_some() {
            return Err(EditorError::NestedUpdate);
        }
        self.txn = Some(Transaction::read_only());
        let mut scope = UpdateScope { editor: self };
        f(&mut *scope)
    }

    /// Tag the running update; tags are passed to listeners
    pub fn add_update_tag(&mut self, tag: impl Into<String>) -> EditorResult<()> {
        self.writable_txn("add_update_tag")?.tags.insert(tag.into());
        Ok(())
    }

    /// Install a state built elsewhere, e.g. by [`Editor::parse_editor_state`]
    pub fn set_editor_state(&mut self, state: EditorState) -> EditorResult<()> {
        if self.txn.is_some() {
            return Err(EditorError::NestedUpdate);
        }
        if self.config.validation {
            state.validate()?;
        }
        debug!(nodes = state.len(), "Editor state replaced");
        self.state = Rc::new(state);
        self.last_update = None;
        Ok(())
    }

    /// The state visible to the running transaction
    pub(crate) fn active_state(&self, operation: &'static str) -> EditorResult<&EditorState> {
        match &self.txn {
            None => Err(EditorError::NoActiveEditor { operation }),
            Some(Transaction { pending: Some(pending), .. }) => Ok(pending),
            Some(_) => Ok(&self.state),
        }
    }

    pub(crate) fn writable_txn(&mut self, operation: &'static str) -> EditorResult<&mut Transaction> {
        match &mut self.txn {
            None => Err(EditorError::NoActiveEditor { operation }),
            Some(txn) if txn.pending.is_none() => Err(EditorError::ReadOnly { operation }),
            Some(txn) => Ok(txn),
        }
    }

    /// Open a writable transaction over `state` for the duration of `f`
    /// and return the resulting state without committing it
    pub(crate) fn with_private_state(
        &mut self,
        state: EditorState,
        f: impl FnOnce(&mut Editor) -> EditorResult<()>,
    ) -> EditorResult<EditorState> {
        if self.txn.is_some() {
            return Err(EditorError::NestedUpdate);
        }
        self.txn = Some(Transaction::writable(state));
        let mut scope = UpdateScope { editor: self };
        f(&mut *scope)?;
        let pending = scope
            .txn
            .take()
            .and_then(|txn| txn.pending)
            .ok_or(EditorError::NoActiveEditor {
                operation: "parse_editor_state",
            })?;
        if scope.config.validation {
            pending.validate()?;
        }
        Ok(pending)
    }

    fn commit(&mut self) -> EditorResult<()> {
        self.apply_transforms()?;
        self.collect_detached()?;

        let Some(txn) = self.txn.as_ref() else {
            return Err(EditorError::NoActiveEditor { operation: "commit" });
        };
        let Some(pending) = txn.pending.as_ref() else {
            return Err(EditorError::ReadOnly { operation: "commit" });
        };
        if txn.dirty.is_empty() && pending.selection == self.state.selection {
            trace!("Nothing changed, skipping commit");
            self.txn = None;
            return Ok(());
        }
        if self.config.validation {
            pending.validate()?;
        }

        let Some(Transaction {
            pending: Some(pending),
            dirty,
            tags,
            ..
        }) = self.txn.take()
        else {
            return Err(EditorError::NoActiveEditor { operation: "commit" });
        };
        let prev = std::mem::replace(&mut self.state, Rc::new(pending));
        debug!(
            dirty_elements = dirty.elements.len(),
            dirty_leaves = dirty.leaves.len(),
            nodes = self.state.len(),
            "Transaction committed"
        );

        let payload = UpdatePayload {
            editor_state: Rc::clone(&self.state),
            prev_editor_state: prev,
            dirty_elements: dirty.elements,
            dirty_leaves: dirty.leaves,
            tags,
        };
        for (_, listener) in &self.listeners {
            listener(&payload);
        }
        self.last_update = Some(payload);
        Ok(())
    }

    /// Drop nodes changed in this transaction that ended up outside the tree,
    /// along with their subtrees
    fn collect_detached(&mut self) -> EditorResult<()> {
        let txn = self.writable_txn("commit")?;
        let Some(pending) = txn.pending.as_mut() else {
            return Ok(());
        };
        let view: &EditorState = pending;
        let detached: Vec<NodeKey> = txn
            .dirty
            .keys()
            .into_iter()
            .filter(|key| view.contains(key) && !is_attached(view, key))
            .collect();
        for key in detached {
            let mut stack = vec![key];
            while let Some(key) = stack.pop() {
                stack.extend(pending.children(&key));
                if pending.node_map.remove(&key).is_some() {
                    trace!(key = %key, "Collected detached node");
                }
                txn.dirty.elements.remove(&key);
                txn.dirty.leaves.remove(&key);
            }
        }
        Ok(())
    }
}

/// Whether the parent chain of `key` reaches the root
pub(crate) fn is_attached(state: &EditorState, key: &NodeKey) -> bool {
    let mut cursor = state.get_node(key);
    let mut steps = 0;
    while let Some(node) = cursor {
        if node.is_root() {
            return true;
        }
        steps += 1;
        if steps > state.len() {
            return false;
        }
        cursor = node.parent().and_then(|parent| state.get_node(parent));
    }
    false
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("config", &self.config)
            .field("node_types", &self.registry.node_types())
            .field("nodes", &self.state.len())
            .field("in_transaction", &self.txn.is_some())
            .finish()
    }
}
