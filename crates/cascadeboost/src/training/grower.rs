//! Depth-limited weak tree growth over the feature cache.

use serde::{Deserialize, Serialize};

use crate::data::{FeatureCache, Label, Representation};
use crate::repr::{MutableTree, NodeId, TreeView};
use crate::utils::Parallelism;

use super::boost::{BoostState, BoostType};
use super::split::{NodeStats, SplitCandidate, SplitContext, SplitCriterion};

/// Why a weak tree could not be fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TreeFitError {
    #[error("no samples left after masking")]
    EmptySubsample,

    #[error("subsample contains only {0:?} samples")]
    SingleClass(Label),

    #[error("no feature yields a valid root split")]
    NoValidSplit,
}

/// Grows one tree per call.
#[derive(Debug, Clone)]
pub struct TreeGrower {
    boost_type: BoostType,
    criterion: SplitCriterion,
    max_depth: u32,
    min_samples_leaf: u32,
}

struct PendingNode {
    id: NodeId,
    samples: Vec<u32>,
    stats: NodeStats,
}

impl TreeGrower {
    pub fn new(boost_type: BoostType, criterion: SplitCriterion, max_depth: u32, min_samples_leaf: u32) -> Self {
        Self {
            boost_type,
            criterion,
            max_depth: max_depth.max(1),
            min_samples_leaf: min_samples_leaf.max(1),
        }
    }

    #[inline]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Fit a tree on the samples selected by `mask`.
    ///
    /// Nodes are expanded depth-first, left before right. Every node carries
    /// the boosting variant's leaf value for its samples, so internal nodes
    /// record the value they had before being split.
    pub fn grow<R: Representation>(
        &self,
        cache: &FeatureCache<'_, R>,
        state: &BoostState,
        mask: &[bool],
        parallelism: Parallelism,
    ) -> Result<MutableTree, TreeFitError> {
        debug_assert_eq!(mask.len(), cache.n_samples());

        let samples: Vec<u32> = mask
            .iter()
            .enumerate()
            .filter_map(|(idx, &keep)| keep.then_some(idx as u32))
            .collect();
        if samples.is_empty() {
            return Err(TreeFitError::EmptySubsample);
        }

        let ctx = SplitContext {
            criterion: self.criterion,
            min_samples_leaf: self.min_samples_leaf,
            weights: state.weights(),
            targets: state.targets(),
            labels: cache.labels(),
        };

        let root_stats = NodeStats::from_samples(&samples, ctx.weights, ctx.targets, ctx.labels);
        if root_stats.n_pos == 0 {
            return Err(TreeFitError::SingleClass(Label::Negative));
        }
        if root_stats.n_neg() == 0 {
            return Err(TreeFitError::SingleClass(Label::Positive));
        }

        let max_nodes = (1usize << (self.max_depth.min(16) + 1)) - 1;
        let mut tree = MutableTree::with_capacity(max_nodes.min(2 * samples.len()));
        let root = tree.init_root();
        let mut stack = vec![PendingNode { id: root, samples, stats: root_stats }];

        while let Some(node) = stack.pop() {
            tree.set_value(node.id, self.boost_type.leaf_value(&node.stats) as f32);

            if !self.can_split(&tree, &node) {
                continue;
            }
            let Some(split) = self.find_split(cache, &ctx, &node, parallelism) else {
                continue;
            };

            let (left_samples, right_samples): (Vec<u32>, Vec<u32>) = node
                .samples
                .iter()
                .partition(|&&idx| cache.response(split.feature as usize, idx as usize) <= split.threshold);
            debug_assert_eq!(left_samples.len() as u32, split.left.count);

            let (left, right) = tree.apply_numeric_split(node.id, split.feature, split.threshold);
            stack.push(PendingNode { id: right, samples: right_samples, stats: split.right });
            stack.push(PendingNode { id: left, samples: left_samples, stats: split.left });
        }

        // The root stayed a leaf.
        if tree.n_nodes() == 1 {
            return Err(TreeFitError::NoValidSplit);
        }
        Ok(tree)
    }

    fn can_split(&self, tree: &MutableTree, node: &PendingNode) -> bool {
        if tree.depth(node.id) >= self.max_depth as usize {
            return false;
        }
        if node.stats.count < 2 * self.min_samples_leaf {
            return false;
        }
        !(self.criterion.is_classification() && node.stats.is_pure())
    }

    /// Best split over all features, ties going to the lowest feature index.
    fn find_split<R: Representation>(
        &self,
        cache: &FeatureCache<'_, R>,
        ctx: &SplitContext<'_>,
        node: &PendingNode,
        parallelism: Parallelism,
    ) -> Option<SplitCandidate> {
        let candidates = parallelism.maybe_par_map(0..cache.n_features(), |feature| {
            let mut responses = vec![0.0f32; node.samples.len()];
            cache.responses_into(feature, &node.samples, &mut responses);
            ctx.best_for_feature(feature as u32, &node.samples, &responses, &node.stats)
        });

        candidates
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, candidate| match best {
                Some(b) if b.gain >= candidate.gain => Some(b),
                _ => Some(candidate),
            })
            .filter(|split| self.criterion.accepts_gain(split.gain, &node.stats))
    }
}
