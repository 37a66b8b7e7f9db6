//! Error types for the editor
//!
//! Every variant is a contract violation. None of them is retried or
//! downgraded: once one is raised the current update is rolled back.

use lexical_common::NodeKey;
use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    // Context errors
    #[error("{operation}: no active editor update or read")]
    NoActiveEditor { operation: &'static str },

    #[error("{operation}: cannot mutate the editor state inside a read-only transaction")]
    ReadOnly { operation: &'static str },

    #[error("Nested updates on the same editor are not allowed")]
    NestedUpdate,

    // Registry errors
    #[error("Node type '{0}' is not registered on this editor")]
    UnregisteredNodeType(String),

    #[error("Node type '{0}' is already registered")]
    DuplicateNodeType(String),

    #[error("Node type '{0}' is an abstract base and cannot be registered or instantiated")]
    AbstractNodeType(String),

    #[error("Type '{replacement}' cannot replace '{original}': {reason}")]
    InvalidReplacement {
        original: String,
        replacement: String,
        reason: String,
    },

    #[error("Node {key} has type '{found}', expected '{expected}'")]
    NodeTypeMismatch {
        key: NodeKey,
        expected: String,
        found: String,
    },

    #[error("Node of type '{attempted}' attempted to re-use key {key} of a '{existing}' node; keys must not be re-used when the type changes")]
    KeyReusedWithDifferentType {
        key: NodeKey,
        existing: String,
        attempted: String,
    },

    #[error("Node {key} of type '{node_type}' was built from a different registration of the same type (stale re-registration); keys must not be re-used across registrations")]
    StaleNodeClass { key: NodeKey, node_type: String },

    // Clone-contract errors
    #[error("Clone of '{node_type}' changed its key from {expected} to {found}")]
    CloneChangedKey {
        node_type: String,
        expected: NodeKey,
        found: NodeKey,
    },

    #[error("Clone of '{node_type}' node {key} did not preserve parent/prev/next; the after-clone hook must copy them")]
    CloneChangedLinks { node_type: String, key: NodeKey },

    // Stale-reference errors
    #[error("Node {0} does not exist in the active editor state")]
    NodeNotFound(NodeKey),

    #[error("Writable node {0} is still shared with another editor state")]
    SharedWritableNode(NodeKey),

    // Structural errors
    #[error("Node {0} is not an element")]
    NotAnElement(NodeKey),

    #[error("Node {0} is not a text node")]
    NotText(NodeKey),

    #[error("Node {0} is not a decorator")]
    NotDecorator(NodeKey),

    #[error("Cannot insert node {key}: {reason}")]
    InvalidInsertion { key: NodeKey, reason: String },

    #[error("The root node cannot be removed or moved")]
    CannotRemoveRoot,

    #[error("Corrupt tree at node {key}: {reason}")]
    CorruptTree { key: NodeKey, reason: String },

    // State errors
    #[error("State key collision: '{state_key}' in '{node_type}' node {node_key}; only one StateConfig with a given key may be used on a node type")]
    StateKeyCollision {
        state_key: String,
        node_type: String,
        node_key: NodeKey,
    },

    // Transforms
    #[error("Node transforms did not settle after {passes} passes")]
    TransformLoop { passes: usize },

    // Serialization
    #[error("Invalid serialized node: {0}")]
    InvalidSerializedNode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EditorError {
    /// Errors caused by calling an operation in the wrong transaction context
    pub fn is_context_error(&self) -> bool {
        matches!(
            self,
            EditorError::NoActiveEditor { .. } | EditorError::ReadOnly { .. } | EditorError::NestedUpdate
        )
    }
}
