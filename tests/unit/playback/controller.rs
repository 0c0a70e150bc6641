use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::catalog::model::{Channel, ClassInfo, Variation};

#[derive(Default)]
struct Recorder {
    draws: Vec<f64>,
    masks: Vec<ClassMask>,
    scalings: Vec<ViewportMetrics>,
    polls: usize,
}

impl PlaybackView for Recorder {
    fn draw(&mut self, frame: &FrameState<'_>) {
        self.draws.push(frame.time);
        self.masks.push(frame.class_mask.clone());
    }

    fn correct_scaling(&mut self, metrics: ViewportMetrics, frame: &FrameState<'_>) {
        self.scalings.push(metrics);
        self.draw(frame);
    }

    fn poll(&mut self, _frame: &FrameState<'_>) {
        self.polls += 1;
    }
}

fn capture(frames: u64, classes: usize) -> Capture {
    Capture {
        name: "cap".to_owned(),
        path: "captures/cap".to_owned(),
        frame_count: frames,
        has_x_preview: false,
        variations: vec![Variation {
            name: "v".to_owned(),
            channels: vec![Channel {
                name: "c".to_owned(),
                bounds: [[0.0, 1.0], [0.0, 1.0]],
            }],
        }],
        classes: (classes > 0).then(|| {
            (0..classes)
                .map(|i| ClassInfo {
                    name: format!("class {i}"),
                    image: None,
                })
                .collect()
        }),
    }
}

fn with_view(frames: u64) -> (Controller, Rc<RefCell<Recorder>>) {
    let mut c = Controller::new();
    c.set_capture(capture(frames, 3));
    let rec = Rc::new(RefCell::new(Recorder::default()));
    c.register(ViewId(1), rec.clone());
    (c, rec)
}

#[test]
fn constant_fps_ticking_accumulates_and_wraps() {
    let (mut c, _) = with_view(100);
    for _ in 0..10 {
        c.tick(0.1);
    }
    assert!((c.time() - 30.0).abs() < 1e-9, "time {}", c.time());
    for _ in 0..40 {
        c.tick(0.1);
    }
    assert!((c.time() - 50.0).abs() < 1e-9, "time {}", c.time());
}

#[test]
fn tick_draws_before_advancing() {
    let (mut c, rec) = with_view(100);
    c.tick(0.1);
    c.tick(0.1);
    let draws = rec.borrow().draws.clone();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0], 0.0);
    assert!((draws[1] - 3.0).abs() < 1e-9);
}

#[test]
fn paused_set_time_redraws_wrapped_frame_and_never_advances() {
    let (mut c, rec) = with_view(100);
    c.set_is_playing(false);
    c.set_time(105.0);
    assert_eq!(c.time(), 5.0);
    assert_eq!(rec.borrow().draws, vec![0.0, 5.0]);

    c.tick(1.0);
    c.tick(1.0);
    assert_eq!(c.time(), 5.0);
    assert_eq!(rec.borrow().draws.len(), 2);
}

#[test]
fn negative_times_wrap_into_range() {
    let (mut c, _) = with_view(100);
    c.set_time(-1.0);
    assert_eq!(c.time(), 99.0);
    c.set_time(-250.5);
    assert!((c.time() - 49.5).abs() < 1e-9);
}

#[test]
fn non_finite_delta_does_not_advance() {
    let (mut c, rec) = with_view(100);
    c.set_time(4.0);
    c.tick(f64::NAN);
    c.tick(f64::INFINITY);
    assert_eq!(c.time(), 4.0);
    assert_eq!(rec.borrow().draws.len(), 2);
    c.set_time(f64::NAN);
    assert_eq!(c.time(), 0.0);
}

#[test]
fn zero_frames_pins_time_at_zero() {
    let mut c = Controller::new();
    let rec = Rc::new(RefCell::new(Recorder::default()));
    c.register(ViewId(1), rec.clone());
    c.tick(1.0);
    assert!(rec.borrow().draws.is_empty());
    c.set_time(12.0);
    assert_eq!(c.time(), 0.0);
    assert_eq!(c.frame_count(), 0);
}

#[test]
fn registry_swap_remove_keeps_remaining_views() {
    let mut c = Controller::new();
    c.set_capture(capture(10, 0));
    let views: Vec<_> = (0..3)
        .map(|_| Rc::new(RefCell::new(Recorder::default())))
        .collect();
    for (i, v) in views.iter().enumerate() {
        c.register(ViewId(i as u64), v.clone());
    }
    assert!(c.unregister(ViewId(0)));
    assert!(!c.unregister(ViewId(0)));
    assert!(!c.unregister(ViewId(42)));
    assert_eq!(c.view_count(), 2);

    c.draw_all();
    assert!(views[0].borrow().draws.is_empty());
    assert_eq!(views[1].borrow().draws.len(), 1);
    assert_eq!(views[2].borrow().draws.len(), 1);

    // The moved entry is still addressable.
    assert!(c.unregister(ViewId(2)));
    assert!(c.is_registered(ViewId(1)));
    assert!(!c.is_registered(ViewId(2)));
}

#[test]
fn registering_an_existing_id_replaces_the_view() {
    let (mut c, old) = with_view(10);
    let new = Rc::new(RefCell::new(Recorder::default()));
    c.register(ViewId(1), new.clone());
    assert_eq!(c.view_count(), 1);
    c.draw_all();
    assert!(old.borrow().draws.is_empty());
    assert_eq!(new.borrow().draws.len(), 1);
}

#[test]
fn observers_receive_time_and_playing() {
    let (mut c, _) = with_view(10);
    let times = Rc::new(RefCell::new(Vec::new()));
    let playing = Rc::new(RefCell::new(Vec::new()));
    let t = Rc::clone(&times);
    let sub = c.subscribe_time(move |v| t.borrow_mut().push(*v));
    let p = Rc::clone(&playing);
    c.subscribe_playing(move |v| p.borrow_mut().push(*v));

    c.set_time(3.0);
    c.toggle_playing();
    c.toggle_playing();
    assert!(c.unsubscribe(sub));
    c.set_time(4.0);

    assert_eq!(*times.borrow(), vec![3.0]);
    assert_eq!(*playing.borrow(), vec![false, true]);
}

#[test]
fn step_moves_whole_frames_and_pauses() {
    let (mut c, rec) = with_view(10);
    c.set_time(3.7);
    c.step(1);
    assert_eq!(c.time(), 4.0);
    assert!(!c.is_playing());
    c.step(-5);
    assert_eq!(c.time(), 9.0);
    assert_eq!(rec.borrow().draws.last().copied(), Some(9.0));
}

#[test]
fn set_capture_resets_mask_and_rewraps_time() {
    let (mut c, _) = with_view(100);
    c.set_time(75.0);
    c.set_class_enabled(1, false).unwrap();
    assert!(!c.class_mask().is_enabled(1));

    c.set_capture(capture(50, 4));
    assert_eq!(c.time(), 25.0);
    assert_eq!(c.class_mask(), &ClassMask::all_enabled(4));
}

#[test]
fn class_mask_changes_redraw_and_validate_length() {
    let (mut c, rec) = with_view(10);
    c.set_class_mask(ClassMask(vec![true, false, true])).unwrap();
    assert_eq!(rec.borrow().masks.last(), Some(&ClassMask(vec![true, false, true])));

    let err = c.set_class_mask(ClassMask(vec![true])).unwrap_err();
    assert!(matches!(err, PointreelError::Validation(_)));
    assert!(c.set_class_enabled(9, true).is_err());
}

#[test]
fn correct_scaling_redraws_without_touching_playback() {
    let (mut c, rec) = with_view(10);
    c.set_time(2.5);
    let metrics = ViewportMetrics {
        device_pixel_ratio: 2.0,
        zoom: 1.25,
    };
    c.correct_scaling(metrics);
    assert_eq!(c.time(), 2.5);
    assert!(c.is_playing());
    let rec = rec.borrow();
    assert_eq!(rec.scalings, vec![metrics]);
    assert_eq!(rec.draws, vec![2.5]);
}

#[test]
fn poll_views_reaches_every_view() {
    let (mut c, rec) = with_view(10);
    c.set_is_playing(false);
    c.poll_views();
    c.poll_views();
    assert_eq!(rec.borrow().polls, 2);
}

#[test]
fn fps_must_be_finite_and_non_negative() {
    let mut c = Controller::new();
    assert_eq!(c.fps(), DEFAULT_FPS);
    assert!(c.set_fps(f64::NAN).is_err());
    assert!(c.set_fps(-1.0).is_err());
    c.set_fps(60.0).unwrap();
    assert_eq!(c.fps(), 60.0);
}
