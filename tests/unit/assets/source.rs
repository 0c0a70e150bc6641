use std::io::Read;

use super::*;

fn key(buffer: BufferKind) -> ArrayKey {
    ArrayKey {
        prefix: "captures/./mnist/".to_owned(),
        variation: "bw1-f32".to_owned(),
        buffer,
    }
}

#[test]
fn normalize_path_slash_normalization() {
    assert_eq!(normalize_rel_path("a/b.npy").unwrap(), "a/b.npy");
    assert_eq!(normalize_rel_path("a\\b.npy").unwrap(), "a/b.npy");
    assert_eq!(normalize_rel_path("./a//b.npy").unwrap(), "a/b.npy");
    assert!(normalize_rel_path("../x.npy").is_err());
    assert!(normalize_rel_path("/abs.npy").is_err());
    assert!(normalize_rel_path("./").is_err());
}

#[test]
fn keys_map_to_variation_directories() {
    assert_eq!(
        key(BufferKind::Channel("layer1".to_owned()))
            .rel_path()
            .unwrap(),
        "captures/mnist/bw1-f32/layer1.npy"
    );
    assert_eq!(
        key(BufferKind::ClassIds).rel_path().unwrap(),
        "captures/mnist/bw1-f32/labels.npy"
    );
}

#[test]
fn memory_source_serves_bytes() {
    let src = MemoryArraySource::new();
    let k = key(BufferKind::ClassIds);
    src.insert_key(&k, vec![1, 2, 3]).unwrap();
    assert_eq!(src.byte_len(&k).unwrap(), 3);

    let mut buf = Vec::new();
    src.open(&k).unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf, vec![1, 2, 3]);

    let missing = key(BufferKind::Channel("nope".to_owned()));
    assert!(src.byte_len(&missing).unwrap_err().is_load());
}

#[test]
fn fs_source_reports_missing_files_as_load_errors() {
    let src = FsArraySource::new("target/does-not-exist");
    let err = src.open(&key(BufferKind::ClassIds)).err().unwrap();
    assert!(err.is_load());
}
