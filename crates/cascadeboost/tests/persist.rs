//! Store/load parity for trained cascades.

use std::io::Cursor;

use rstest::rstest;

use cascadeboost::io::{DeserializeError, HEADER_SIZE, NativeCodec};
use cascadeboost::model::{CascadeConfig, CascadeModel, StageParams};
use cascadeboost::testing::{ScalarRepresentation, noisy_features};
use cascadeboost::training::BoostType;

fn trained(boost_type: BoostType) -> (CascadeModel<ScalarRepresentation>, Vec<Vec<f32>>) {
    let (raws, labels) = noisy_features(120, 480, 4, 99);
    let config = CascadeConfig::builder()
        .n_stages(3)
        .stage(StageParams { boost_type, max_depth: 2, min_tar: 0.98, max_far: 0.5, max_weak_count: 12, ..Default::default() })
        .roc_mode(true)
        .build()
        .unwrap();
    let model = CascadeModel::train(ScalarRepresentation::new(4), raws.clone(), labels, config, None).unwrap();
    (model, raws)
}

#[rstest]
#[case(BoostType::Discrete)]
#[case(BoostType::Real)]
#[case(BoostType::Logit)]
#[case(BoostType::Gentle)]
fn loaded_cascade_classifies_identically(#[case] boost_type: BoostType) {
    let (model, raws) = trained(boost_type);

    let mut bytes = Vec::new();
    model.store(&mut bytes).unwrap();
    let mut loaded = CascadeModel::load(&mut Cursor::new(&bytes), ScalarRepresentation::new(4)).unwrap();
    loaded.set_roc_mode(true);

    assert_eq!(loaded.cascade().n_stages(), model.cascade().n_stages());
    assert_eq!(loaded.cascade().n_trees(), model.cascade().n_trees());
    for raw in raws {
        assert_eq!(loaded.classify(raw.clone()), model.classify(raw.clone()));
        assert_eq!(loaded.confidence(raw.clone()), model.confidence(raw));
    }

    // Stored bytes are stable.
    let mut again = Vec::new();
    loaded.store(&mut again).unwrap();
    assert_eq!(again, bytes);
}

#[test]
fn file_round_trip() {
    let (model, raws) = trained(BoostType::Gentle);
    let path = std::env::temp_dir().join(format!("cascadeboost-persist-{}.vjcb", std::process::id()));

    model.save(&path).unwrap();
    let loaded = CascadeModel::load_file(&path, ScalarRepresentation::new(4)).unwrap();
    std::fs::remove_file(&path).unwrap();

    for raw in raws.into_iter().take(50) {
        assert_eq!(loaded.classify(raw.clone()), model.classify(raw));
    }
}

#[test]
fn corrupted_streams_are_rejected() {
    let (model, _) = trained(BoostType::Real);
    let mut bytes = Vec::new();
    model.store(&mut bytes).unwrap();

    for cut in [0, HEADER_SIZE - 1, HEADER_SIZE, bytes.len() - 1] {
        let err = NativeCodec::read_from(&mut Cursor::new(&bytes[..cut])).unwrap_err();
        assert!(matches!(err, DeserializeError::Truncated), "cut {cut}: {err}");
    }

    // Any flipped payload byte trips the checksum.
    for at in [HEADER_SIZE, HEADER_SIZE + 7, bytes.len() - 2] {
        let mut bad = bytes.clone();
        bad[at] ^= 0x40;
        assert!(matches!(NativeCodec::decode(&bad), Err(DeserializeError::ChecksumMismatch { .. })));
    }

    let err = CascadeModel::load(&mut Cursor::new(&bytes), ScalarRepresentation::new(5)).unwrap_err();
    assert!(matches!(err, DeserializeError::FeatureCountMismatch { expected: 5, found: 4 }));
}
