//! # Node Transforms
//!
//! Transforms are registered per node type and run just before commit, on
//! every node that was written during the update. A transform may write to
//! other nodes (or its own), which schedules those nodes for the next pass.
//!
//! Transforms are:
//! - **Leaves first**: text and decorator nodes run before elements in a pass
//! - **Attached only**: nodes outside the tree are skipped
//! - **Bounded**: an update whose transforms keep dirtying nodes fails with
//!   [`EditorError::TransformLoop`] after `maxTransformPasses` passes

use crate::editor::{is_attached, Editor};
use crate::errors::{EditorError, EditorResult};
use lexical_common::NodeKey;
use tracing::debug;

impl Editor {
    pub(crate) fn apply_transforms(&mut self) -> EditorResult<()> {
        let max_passes = self.config.max_transform_passes;
        let mut passes = 0;
        loop {
            let batch = std::mem::take(&mut self.writable_txn("apply_transforms")?.untransformed);
            if batch.is_empty() || !self.registry.has_transforms() {
                return Ok(());
            }
            if passes == max_passes {
                return Err(EditorError::TransformLoop { passes });
            }
            passes += 1;

            let state = self.active_state("apply_transforms")?;
            let mut batch: Vec<(bool, NodeKey)> = batch
                .into_iter()
                .filter_map(|key| state.get_node(&key).map(|node| (node.is_element(), key)))
                .collect();
            batch.sort();
            debug!(pass = passes, nodes = batch.len(), "Running node transforms");

            for (_, key) in batch {
                let transforms = match self.get_node(&key)? {
                    Some(node) if is_attached(self.active_state("apply_transforms")?, &key) => {
                        self.registry.transforms(node.node_type())
                    }
                    _ => continue,
                };
                for transform in transforms {
                    // an earlier transform may have removed the node
                    if self.get_node(&key)?.is_none() {
                        break;
                    }
                    transform(self, &key)?;
                }
            }
        }
    }
}
