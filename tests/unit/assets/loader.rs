use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::assets::source::MemoryArraySource;
use crate::catalog::model::Channel;
use crate::data::npy::write_npy_f32;

const WAIT: Duration = Duration::from_secs(5);

fn variation(name: &str) -> Variation {
    Variation {
        name: name.to_owned(),
        channels: vec![
            Channel {
                name: "layer1".to_owned(),
                bounds: [[0.0, 1.0], [0.0, 1.0]],
            },
            Channel {
                name: "layer2".to_owned(),
                bounds: [[-1.0, 1.0], [-1.0, 1.0]],
            },
        ],
    }
}

/// Two channels of `frames x samples x 2` plus class ids `0..samples`.
fn populate(src: &MemoryArraySource, var: &str, frames: usize, samples: usize) {
    for ch in ["layer1", "layer2"] {
        let data: Vec<f32> = (0..frames * samples * 2).map(|i| i as f32 * 0.01).collect();
        let bytes = write_npy_f32(&[frames, samples, 2], &data).unwrap();
        src.insert(&format!("cap/{var}/{ch}.npy"), bytes).unwrap();
    }
    let ids: Vec<f32> = (0..samples).map(|i| (i % 3) as f32).collect();
    src.insert(
        &format!("cap/{var}/labels.npy"),
        write_npy_f32(&[samples], &ids).unwrap(),
    )
    .unwrap();
}

fn loader(src: &MemoryArraySource, opts: LoaderOpts) -> AssetLoader {
    AssetLoader::new(Arc::new(src.clone()), opts)
}

fn recorder() -> (Rc<RefCell<Vec<f32>>>, impl FnMut(f32) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |p| sink.borrow_mut().push(p))
}

#[test]
fn load_reports_progress_and_reaches_100_only_at_the_end() {
    let src = MemoryArraySource::new();
    populate(&src, "v1", 20, 50);
    let l = loader(
        &src,
        LoaderOpts {
            chunk_bytes: 256,
            ..LoaderOpts::default()
        },
    );

    let mut started = false;
    let (seen, on_progress) = recorder();
    let mut pending = l.load(
        ViewId(1),
        &variation("v1"),
        "cap",
        || started = true,
        on_progress,
    );
    assert!(started);

    let set = match pending.wait(WAIT) {
        LoadPoll::Loaded(set) => set,
        other => panic!("expected Loaded, got {other:?}"),
    };
    assert_eq!(set.positions.len(), 2);
    assert_eq!(set.sample_count(), 50);
    assert_eq!(set.positions[0].shape(), &[20, 50, 2]);

    let seen = seen.borrow();
    assert!(seen.len() > 2, "expected several progress reports");
    assert_eq!(seen.last().copied(), Some(100.0));
    assert_eq!(seen.iter().filter(|&&p| p >= 100.0).count(), 1);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!(pending.is_finished());
}

#[test]
fn missing_buffer_fails_with_load_error() {
    let src = MemoryArraySource::new();
    populate(&src, "v1", 2, 4);
    let l = loader(&src, LoaderOpts::default());

    let (seen, on_progress) = recorder();
    let mut pending = l.load(ViewId(2), &variation("v2"), "cap", || {}, on_progress);
    match pending.wait(WAIT) {
        LoadPoll::Failed(e) => assert!(e.is_load(), "{e}"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(!seen.borrow().contains(&100.0));
}

#[test]
fn mismatched_class_ids_fail_the_load() {
    let src = MemoryArraySource::new();
    populate(&src, "v1", 2, 4);
    src.insert("cap/v1/labels.npy", write_npy_f32(&[3], &[0.0, 1.0, 2.0]).unwrap())
        .unwrap();
    let l = loader(&src, LoaderOpts::default());

    let mut pending = l.load(ViewId(3), &variation("v1"), "cap", || {}, |_| {});
    assert!(matches!(pending.wait(WAIT), LoadPoll::Failed(e) if e.is_load()));
}

#[test]
fn second_load_of_same_variation_is_served_from_cache() {
    let src = MemoryArraySource::new();
    populate(&src, "v1", 3, 8);
    let l = loader(&src, LoaderOpts::default());

    let first = match l
        .load(ViewId(4), &variation("v1"), "cap", || {}, |_| {})
        .wait(WAIT)
    {
        LoadPoll::Loaded(set) => set,
        other => panic!("expected Loaded, got {other:?}"),
    };

    // Holding the variation would block any real read.
    src.hold("v1");
    let (seen, on_progress) = recorder();
    let mut pending = l.load(ViewId(5), &variation("v1"), "/cap/", || {}, on_progress);
    let second = match pending.poll() {
        LoadPoll::Loaded(set) => set,
        other => panic!("expected cached Loaded, got {other:?}"),
    };
    src.release("v1");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(*seen.borrow(), vec![100.0]);
    assert!(matches!(pending.poll(), LoadPoll::Aborted));
}

#[test]
fn cache_capacity_zero_disables_caching() {
    let src = MemoryArraySource::new();
    populate(&src, "v1", 2, 4);
    let l = loader(
        &src,
        LoaderOpts {
            cache_capacity: 0,
            ..LoaderOpts::default()
        },
    );

    let a = l.load(ViewId(6), &variation("v1"), "cap", || {}, |_| {}).wait(WAIT);
    let b = l.load(ViewId(6), &variation("v1"), "cap", || {}, |_| {}).wait(WAIT);
    match (a, b) {
        (LoadPoll::Loaded(a), LoadPoll::Loaded(b)) => assert!(!Arc::ptr_eq(&a, &b)),
        other => panic!("expected two loads, got {other:?}"),
    }
}

#[test]
fn superseded_load_is_aborted() {
    let src = MemoryArraySource::new();
    populate(&src, "slow", 2, 4);
    populate(&src, "fast", 2, 4);
    src.hold("slow");
    let l = loader(&src, LoaderOpts::default());

    let view = ViewId(7);
    let mut slow = l.load(view, &variation("slow"), "cap", || {}, |_| {});
    let mut fast = l.load(view, &variation("fast"), "cap", || {}, |_| {});
    assert!(matches!(fast.wait(WAIT), LoadPoll::Loaded(_)));

    src.release("slow");
    assert!(matches!(slow.wait(WAIT), LoadPoll::Aborted));
}

#[test]
fn loads_for_different_views_do_not_supersede_each_other() {
    let src = MemoryArraySource::new();
    populate(&src, "a", 2, 4);
    populate(&src, "b", 2, 4);
    src.hold("a");
    let l = loader(&src, LoaderOpts::default());

    let mut a = l.load(ViewId(8), &variation("a"), "cap", || {}, |_| {});
    let mut b = l.load(ViewId(9), &variation("b"), "cap", || {}, |_| {});
    assert!(matches!(b.wait(WAIT), LoadPoll::Loaded(_)));
    assert!(matches!(a.poll(), LoadPoll::Pending));

    src.release("a");
    assert!(matches!(a.wait(WAIT), LoadPoll::Loaded(_)));
}

#[test]
fn non_aborting_loader_completes_superseded_loads() {
    let src = MemoryArraySource::new();
    populate(&src, "old", 2, 4);
    populate(&src, "new", 2, 4);
    src.hold("old");
    let l = loader(
        &src,
        LoaderOpts {
            abort_superseded: false,
            ..LoaderOpts::default()
        },
    );

    let view = ViewId(10);
    let mut old = l.load(view, &variation("old"), "cap", || {}, |_| {});
    let mut new = l.load(view, &variation("new"), "cap", || {}, |_| {});
    assert!(matches!(new.wait(WAIT), LoadPoll::Loaded(_)));
    src.release("old");
    assert!(matches!(old.wait(WAIT), LoadPoll::Loaded(_)));
}
