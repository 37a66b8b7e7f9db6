//! # Lexical Editor
//!
//! Document and state engine for a structured rich-text editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ registry: node types → NodeClass            │
//! │  - clone / after-clone / import / export    │
//! │  - per-type SharedNodeState, transforms     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: one update at a time                │
//! │  - pending state over the committed one     │
//! │  - copy-on-write via get_writable           │
//! │  - dirty elements / dirty leaves            │
//! │  - transforms, then commit or roll back     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor_state: immutable snapshot            │
//! │  - NodeMap (key → node) + selection         │
//! │  - JSON export, structural validation       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Keys, not pointers**: parent/sibling/child links are `NodeKey`s
//!    resolved against the snapshot being read
//! 2. **Clone once per update**: a node is copied on its first write and
//!    reused for every later write in the same update
//! 3. **All or nothing**: an update that fails or panics commits nothing
//! 4. **Forward-compatible metadata**: `NodeState` carries keys it does not
//!    understand through import and export unchanged
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lexical_editor::{Editor, EditorConfig, NodeConfig, StateConfig};
//!
//! let lang = StateConfig::new("lang", |raw| {
//!     raw.and_then(|v| v.as_str()).unwrap_or("en").to_string()
//! });
//! let mut editor = Editor::with_nodes(
//!     EditorConfig::default(),
//!     vec![NodeConfig::text("code-text").with_state(&lang)],
//! )?;
//!
//! editor.update(|editor| {
//!     let paragraph = editor.create_paragraph()?;
//!     let text = editor.create_text("code-text", "fn main() {}")?;
//!     editor.set_state(&text, &lang, "rust".to_string())?;
//!     editor.append(&paragraph, &text)?;
//!     editor.append(&lexical_common::NodeKey::root(), &paragraph)
//! })?;
//!
//! let json = editor.export_json()?;
//! ```

mod dirty;
mod editor;
mod editor_state;
mod errors;
mod mutations;
mod node;
mod node_state;
mod registry;
mod selection;
mod serialization;
mod transforms;
mod tree;

pub use dirty::{DirtySets, ElementDirt};
pub use editor::{Editor, EditorConfig, ListenerId, UpdateListener, UpdatePayload, DEFAULT_MAX_TRANSFORM_PASSES};
pub use editor_state::{EditorState, NodeMap};
pub use errors::{EditorError, EditorResult};
pub use node::{DecoratorData, ElementData, InstanceId, LexicalNode, NodeKind, NodeVariant, TextData};
pub use node_state::{states_equivalent, NodeState, SharedNodeState, SharedNodeStateRef, StateConfig, StateRecord, StateValue, NODE_STATE_KEY};
pub use registry::{
    AfterCloneFn, CloneFn, ExportFn, ImportFn, NodeClass, NodeConfig, NodeTransform, RegisteredNode, Registry,
    PARAGRAPH_TYPE, ROOT_TYPE, TEXT_TYPE,
};
pub use selection::{Point, PointType, RangeSelection};
pub use serialization::{export_node, SerializedEditorState, SerializedNode};

// Re-export common types for convenience
pub use lexical_common::{
    allocate_key, Direction, ElementFormatType, NodeKey, TextFormatType, TextMode,
};
