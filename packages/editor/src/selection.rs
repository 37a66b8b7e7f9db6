//! # Selection
//!
//! The engine does not implement selection semantics. A `RangeSelection`
//! only records anchor and focus points plus a cached node list, and that
//! cache is dropped on every copy-on-write.

use lexical_common::NodeKey;
use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointType {
    Text,
    Element,
}

/// A position inside the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
    pub point_type: PointType,
}

impl Point {
    pub fn text(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            point_type: PointType::Text,
        }
    }

    pub fn element(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            point_type: PointType::Element,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RangeSelection {
    pub anchor: Point,
    pub focus: Point,
    pub format: u32,
    pub style: String,
    cached_nodes: RefCell<Option<Vec<NodeKey>>>,
}

impl RangeSelection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self {
            anchor,
            focus,
            format: 0,
            style: String::new(),
            cached_nodes: RefCell::new(None),
        }
    }

    /// A caret at `point`
    pub fn collapsed(point: Point) -> Self {
        Self::new(point.clone(), point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn cached_nodes(&self) -> Option<Vec<NodeKey>> {
        self.cached_nodes.borrow().clone()
    }

    pub fn set_cached_nodes(&self, nodes: Vec<NodeKey>) {
        *self.cached_nodes.borrow_mut() = Some(nodes);
    }

    pub fn invalidate_cached_nodes(&self) {
        self.cached_nodes.borrow_mut().take();
    }
}

// The node cache is derived, so it takes no part in equality
impl PartialEq for RangeSelection {
    fn eq(&self, other: &Self) -> bool {
        self.anchor == other.anchor
            && self.focus == other.focus
            && self.format == other.format
            && self.style == other.style
    }
}
