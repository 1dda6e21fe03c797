//! Frozen inference types: weak trees, boosted stages and the cascade.

mod cascade;
mod stage;
mod tree;

/// Index of a node inside one tree's arena; the root is `0`.
pub type NodeId = u32;

/// Deepest root-to-leaf path, in splits, a stored tree may have.
pub const MAX_TREE_DEPTH: usize = 64;

pub use cascade::{Cascade, CascadeValidationError, Classification};
pub use stage::{BoostedStage, StageValidationError};
pub use tree::{MutableTree, TreeValidationError, TreeView, WeakTree};
