use super::*;

fn positions(frames: usize, samples: usize) -> NDArray {
    NDArray::new(
        vec![frames, samples, 2],
        vec![0.0; frames * samples * 2],
    )
    .unwrap()
}

#[test]
fn builds_from_matching_arrays() {
    let classes = NDArray::new(vec![3], vec![0.0, 2.0, 1.0]).unwrap();
    let set = ArraySet::from_arrays(vec![positions(4, 3), positions(4, 3)], &classes).unwrap();
    assert_eq!(set.class_ids, vec![0, 2, 1]);
    assert_eq!(set.sample_count(), 3);
    assert!(set.check_class_count(3).is_ok());
    assert!(set.check_class_count(2).unwrap_err().is_load());
}

#[test]
fn rejects_sample_mismatch_and_bad_ids() {
    let classes = NDArray::new(vec![2], vec![0.0, 1.0]).unwrap();
    assert!(ArraySet::from_arrays(vec![positions(4, 3)], &classes).is_err());

    let classes = NDArray::new(vec![3], vec![0.0, 1.5, 1.0]).unwrap();
    let err = ArraySet::from_arrays(vec![positions(4, 3)], &classes).unwrap_err();
    assert!(err.to_string().contains("sample 1"));

    let classes = NDArray::new(vec![3], vec![0.0, -1.0, 1.0]).unwrap();
    assert!(ArraySet::from_arrays(vec![positions(4, 3)], &classes).is_err());
}

#[test]
fn rejects_flat_positions() {
    let classes = NDArray::new(vec![2], vec![0.0, 1.0]).unwrap();
    let flat = NDArray::new(vec![2, 2], vec![0.0; 4]).unwrap();
    assert!(ArraySet::from_arrays(vec![flat], &classes).is_err());
}
