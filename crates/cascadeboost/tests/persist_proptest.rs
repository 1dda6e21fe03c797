//! Property-based tests for the native format.
//!
//! Generates arbitrary valid cascades and checks that storing and loading
//! preserves every decision and score.

use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use cascadeboost::io::NativeCodec;
use cascadeboost::model::StageParams;
use cascadeboost::repr::{BoostedStage, Cascade, MutableTree, NodeId, WeakTree};
use cascadeboost::training::BoostType;

const N_FEATURES: usize = 5;

// =============================================================================
// Arbitrary Cascade Generators
// =============================================================================

fn arb_finite_f32() -> impl Strategy<Value = f32> {
    prop::num::f32::NORMAL.prop_map(|x| x.clamp(-1e3, 1e3))
}

fn arb_boost_type() -> impl Strategy<Value = BoostType> {
    prop_oneof![Just(BoostType::Discrete), Just(BoostType::Real), Just(BoostType::Logit), Just(BoostType::Gentle)]
}

/// Splits encoded as `(feature, threshold)`, each applied to the oldest open
/// leaf, so trees grow breadth-first.
fn arb_tree() -> impl Strategy<Value = WeakTree> {
    (
        prop_vec((0..N_FEATURES as u32, arb_finite_f32()), 0..6),
        prop_vec(arb_finite_f32(), 13),
    )
        .prop_map(|(splits, values)| {
            let mut tree = MutableTree::new();
            let root = tree.init_root();
            let mut open: std::collections::VecDeque<NodeId> = [root].into();
            for (feature, threshold) in splits {
                let Some(node) = open.pop_front() else { break };
                let (left, right) = tree.apply_numeric_split(node, feature, threshold);
                open.extend([left, right]);
            }
            for (i, node) in open.into_iter().enumerate() {
                tree.make_leaf(node, values[i]);
            }
            tree.freeze()
        })
}

fn arb_stage() -> impl Strategy<Value = BoostedStage> {
    (arb_boost_type(), 1u32..4, prop_vec(arb_tree(), 1..4), arb_finite_f32()).prop_map(
        |(boost_type, max_depth, trees, threshold)| {
            let params = StageParams { boost_type, max_depth, ..Default::default() };
            BoostedStage::new(params, trees, threshold)
        },
    )
}

fn arb_cascade() -> impl Strategy<Value = Cascade> {
    prop_vec(arb_stage(), 1..4).prop_map(|stages| Cascade::from_stages(stages, N_FEATURES))
}

fn arb_sample() -> impl Strategy<Value = Vec<f32>> {
    prop_vec(arb_finite_f32(), N_FEATURES)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn decode_preserves_decisions(cascade in arb_cascade(), samples in prop_vec(arb_sample(), 1..20)) {
        let bytes = NativeCodec::encode(&cascade).unwrap();
        let loaded = NativeCodec::decode(&bytes).unwrap();

        prop_assert_eq!(loaded.n_stages(), cascade.n_stages());
        prop_assert_eq!(loaded.n_trees(), cascade.n_trees());
        for sample in &samples {
            prop_assert_eq!(loaded.classify(sample.as_slice()), cascade.classify(sample.as_slice()));
            prop_assert_eq!(loaded.confidence(sample.as_slice(), true), cascade.confidence(sample.as_slice(), true));
        }
        prop_assert_eq!(NativeCodec::encode(&loaded).unwrap(), bytes);
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop_vec(any::<u8>(), 0..256)) {
        let _ = NativeCodec::decode(&bytes);
    }
}
