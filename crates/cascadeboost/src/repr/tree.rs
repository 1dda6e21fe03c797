//! Weak tree storage (SoA) and read-only tree interface.
//!
//! This module provides:
//! - [`TreeView`]: Read-only trait for unified tree access
//! - [`WeakTree`]: Immutable SoA tree storage for traversal
//! - [`MutableTree`]: Arena used while a tree is grown or decoded
//! - [`TreeValidationError`]: Structural validation errors

use crate::data::SampleAccessor;

use super::NodeId;

// ============================================================================
// TreeView Trait
// ============================================================================

/// Read-only view of a tree for traversal.
///
/// Implemented for both [`WeakTree`] and [`MutableTree`], so the trainer can
/// route samples through a tree before it is frozen.
pub trait TreeView {
    fn n_nodes(&self) -> usize;

    fn is_leaf(&self, node: NodeId) -> bool;

    /// Feature index tested by a split node.
    fn split_index(&self, node: NodeId) -> u32;

    fn split_threshold(&self, node: NodeId) -> f32;

    fn left_child(&self, node: NodeId) -> NodeId;

    fn right_child(&self, node: NodeId) -> NodeId;

    /// Vote of a node. Only leaf values contribute to predictions.
    fn value(&self, node: NodeId) -> f32;

    /// Route a sample from the root to its leaf.
    ///
    /// Goes left when `response <= threshold`, right otherwise. NaN responses
    /// fail the comparison and go right.
    #[inline]
    fn traverse_to_leaf<S: SampleAccessor + ?Sized>(&self, sample: &S) -> NodeId {
        let mut node: NodeId = 0;
        while !self.is_leaf(node) {
            let response = sample.feature(self.split_index(node) as usize);
            node = if response <= self.split_threshold(node) {
                self.left_child(node)
            } else {
                self.right_child(node)
            };
        }
        node
    }

    /// Leaf value reached by `sample`.
    #[inline]
    fn predict<S: SampleAccessor + ?Sized>(&self, sample: &S) -> f32 {
        self.value(self.traverse_to_leaf(sample))
    }
}

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`WeakTree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    #[error("node {node}: {side} child {child} out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },

    #[error("node {node} references itself")]
    SelfLoop { node: NodeId },

    #[error("node {node} reached by more than one path")]
    DuplicateVisit { node: NodeId },

    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },

    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },

    #[error("node {node} splits on feature {feature}, but only {n_features} features exist")]
    FeatureOutOfRange { node: NodeId, feature: u32, n_features: usize },
}

// ============================================================================
// WeakTree
// ============================================================================

/// Structure-of-Arrays storage for a frozen weak tree.
///
/// Node 0 is the root. Every node carries a value; internal nodes keep the
/// value they would have had as a leaf, which the persisted format records.
#[derive(Debug, Clone, PartialEq)]
pub struct WeakTree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    is_leaf: Box<[bool]>,
    values: Box<[f32]>,
}

impl WeakTree {
    /// Create a tree from parallel arrays of equal length.
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        is_leaf: Vec<bool>,
        values: Vec<f32>,
    ) -> Self {
        let n_nodes = split_indices.len();
        debug_assert_eq!(n_nodes, split_thresholds.len());
        debug_assert_eq!(n_nodes, left_children.len());
        debug_assert_eq!(n_nodes, right_children.len());
        debug_assert_eq!(n_nodes, is_leaf.len());
        debug_assert_eq!(n_nodes, values.len());

        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            values: values.into_boxed_slice(),
        }
    }

    /// Single-leaf tree voting `value` for every sample.
    pub fn leaf(value: f32) -> Self {
        Self::new(vec![0], vec![0.0], vec![0], vec![0], vec![true], vec![value])
    }

    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&leaf| leaf).count()
    }

    /// Length of the longest root-to-leaf path, in splits.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack: Vec<(NodeId, usize)> = vec![(0, 0)];
        while let Some((node, depth)) = stack.pop() {
            if self.is_leaf(node) {
                max_depth = max_depth.max(depth);
            } else {
                stack.push((self.left_child(node), depth + 1));
                stack.push((self.right_child(node), depth + 1));
            }
        }
        max_depth
    }

    /// Highest feature index referenced by a split, if any.
    pub fn max_feature_index(&self) -> Option<u32> {
        self.split_indices
            .iter()
            .zip(self.is_leaf.iter())
            .filter(|&(_, &leaf)| !leaf)
            .map(|(&feature, _)| feature)
            .max()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate structural invariants: every split has two in-bounds children
    /// and every node is reachable from the root exactly once.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, bool)> = vec![(0, false)];

        while let Some((node, finished)) = stack.pop() {
            let idx = node as usize;
            if finished {
                color[idx] = 2;
                continue;
            }
            match color[idx] {
                0 => {}
                1 => return Err(TreeValidationError::CycleDetected { node }),
                _ => return Err(TreeValidationError::DuplicateVisit { node }),
            }
            color[idx] = 1;
            stack.push((node, true));

            if self.is_leaf(node) {
                continue;
            }
            let left = self.left_child(node);
            let right = self.right_child(node);
            if left == node || right == node {
                return Err(TreeValidationError::SelfLoop { node });
            }
            for (side, child) in [("left", left), ("right", right)] {
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds { node, side, child, n_nodes });
                }
            }
            stack.push((right, false));
            stack.push((left, false));
        }

        match color.iter().position(|&c| c == 0) {
            Some(node) => Err(TreeValidationError::UnreachableNode { node: node as NodeId }),
            None => Ok(()),
        }
    }

    /// Check that every split references a feature below `n_features`.
    pub fn check_features(&self, n_features: usize) -> Result<(), TreeValidationError> {
        for node in 0..self.n_nodes() as NodeId {
            if self.is_leaf(node) {
                continue;
            }
            let feature = self.split_index(node);
            if feature as usize >= n_features {
                return Err(TreeValidationError::FeatureOutOfRange { node, feature, n_features });
            }
        }
        Ok(())
    }
}

impl TreeView for WeakTree {
    #[inline]
    fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    fn value(&self, node: NodeId) -> f32 {
        self.values[node as usize]
    }
}

// ============================================================================
// MutableTree
// ============================================================================

/// Growable node arena.
///
/// Nodes are appended as splits are applied; children always get higher ids
/// than their parent. Per-node depth is bookkeeping for the grower and is
/// dropped by [`freeze`](Self::freeze).
#[derive(Debug, Clone, Default)]
pub struct MutableTree {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    is_leaf: Vec<bool>,
    values: Vec<f32>,
    depths: Vec<u32>,
}

impl MutableTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n_nodes: usize) -> Self {
        Self {
            split_indices: Vec::with_capacity(n_nodes),
            split_thresholds: Vec::with_capacity(n_nodes),
            left_children: Vec::with_capacity(n_nodes),
            right_children: Vec::with_capacity(n_nodes),
            is_leaf: Vec::with_capacity(n_nodes),
            values: Vec::with_capacity(n_nodes),
            depths: Vec::with_capacity(n_nodes),
        }
    }

    /// Reset to a single root leaf and return its id.
    pub fn init_root(&mut self) -> NodeId {
        self.split_indices.clear();
        self.split_thresholds.clear();
        self.left_children.clear();
        self.right_children.clear();
        self.is_leaf.clear();
        self.values.clear();
        self.depths.clear();
        self.push_leaf(0)
    }

    fn push_leaf(&mut self, depth: u32) -> NodeId {
        let id = self.is_leaf.len() as NodeId;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.is_leaf.push(true);
        self.values.push(0.0);
        self.depths.push(depth);
        id
    }

    /// Turn a leaf into a numeric split and return the new `(left, right)` leaves.
    pub fn apply_numeric_split(&mut self, node: NodeId, feature: u32, threshold: f32) -> (NodeId, NodeId) {
        let idx = node as usize;
        debug_assert!(self.is_leaf[idx], "node {node} already split");

        let child_depth = self.depths[idx] + 1;
        let left = self.push_leaf(child_depth);
        let right = self.push_leaf(child_depth);

        self.split_indices[idx] = feature;
        self.split_thresholds[idx] = threshold;
        self.left_children[idx] = left;
        self.right_children[idx] = right;
        self.is_leaf[idx] = false;
        (left, right)
    }

    /// Set a node's value without changing its kind.
    pub fn set_value(&mut self, node: NodeId, value: f32) {
        self.values[node as usize] = value;
    }

    /// Finalize a node as a leaf carrying `value`.
    pub fn make_leaf(&mut self, node: NodeId, value: f32) {
        let idx = node as usize;
        self.is_leaf[idx] = true;
        self.values[idx] = value;
    }

    /// Multiply every node value by `factor`.
    pub fn scale_values(&mut self, factor: f32) {
        for value in &mut self.values {
            *value *= factor;
        }
    }

    /// Number of splits between the root and `node`.
    pub fn depth(&self, node: NodeId) -> usize {
        self.depths[node as usize] as usize
    }

    /// Drop training bookkeeping and produce the immutable tree.
    pub fn freeze(self) -> WeakTree {
        WeakTree::new(
            self.split_indices,
            self.split_thresholds,
            self.left_children,
            self.right_children,
            self.is_leaf,
            self.values,
        )
    }
}

impl TreeView for MutableTree {
    #[inline]
    fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    fn value(&self, node: NodeId) -> f32 {
        self.values[node as usize]
    }
}
