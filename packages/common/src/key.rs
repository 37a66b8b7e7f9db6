//! # Node Keys
//!
//! A `NodeKey` names one logical node across every version of the document.
//! Keys come from a process-wide counter: they are unique within one running
//! process and are never persisted.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Key reserved for the root node of every editor state
pub const ROOT_KEY: &str = "root";

static KEY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of a node, stable across clones
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// The root node's key
    pub fn root() -> Self {
        NodeKey(ROOT_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_KEY
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        NodeKey(s.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        NodeKey(s)
    }
}

/// Allocate a fresh key. The counter is monotonic and never reset.
pub fn allocate_key() -> NodeKey {
    let next = KEY_COUNTER.fetch_add(1, Ordering::Relaxed);
    NodeKey(next.to_string())
}
