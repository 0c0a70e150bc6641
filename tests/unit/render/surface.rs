use super::*;

#[test]
fn backing_size_follows_ratio_and_zoom() {
    let s = Surface::new(
        100.0,
        50.0,
        ViewportMetrics {
            device_pixel_ratio: 2.0,
            zoom: 1.5,
        },
    )
    .unwrap();
    assert_eq!(s.pixel_size(), (300, 150));
    assert_eq!(s.display_size(), (100.0, 50.0));
    assert!(s.is_blank());
}

#[test]
fn backing_len_rounds_and_clamps() {
    let m = ViewportMetrics::default();
    assert_eq!(backing_len(10.4, m), 10);
    assert_eq!(backing_len(10.5, m), 11);
    assert_eq!(backing_len(0.1, m), 1);
    assert_eq!(backing_len(1.0e9, m), u16::MAX);
    let bad = ViewportMetrics {
        device_pixel_ratio: f64::NAN,
        zoom: 1.0,
    };
    assert_eq!(backing_len(64.0, bad), 64);
}

#[test]
fn correct_scaling_reallocates_only_on_change() {
    let mut s = Surface::new(64.0, 64.0, ViewportMetrics::default()).unwrap();
    let epoch = s.epoch();
    assert!(!s.correct_scaling(ViewportMetrics::default()));
    assert_eq!(s.epoch(), epoch);

    assert!(s.correct_scaling(ViewportMetrics {
        device_pixel_ratio: 2.0,
        zoom: 1.0,
    }));
    assert_eq!(s.pixel_size(), (128, 128));
    assert!(s.epoch() > epoch);
}

#[test]
fn invalid_display_sizes_are_rejected() {
    assert!(Surface::new(0.0, 10.0, ViewportMetrics::default()).is_err());
    let mut s = Surface::new(10.0, 10.0, ViewportMetrics::default()).unwrap();
    assert!(s.set_display_size(f64::INFINITY, 10.0).is_err());
    assert_eq!(s.display_size(), (10.0, 10.0));
}

#[test]
fn blank_surface_exports_background() {
    let s = Surface::new(2.0, 1.0, ViewportMetrics::default()).unwrap();
    assert_eq!(s.to_rgba8(Some(Rgba8::opaque(1, 2, 3))), vec![1, 2, 3, 255, 1, 2, 3, 255]);
    assert_eq!(s.to_rgba8(None), vec![0; 8]);
    assert_eq!(s.pixel(1, 0), Some([0, 0, 0, 0]));
    assert_eq!(s.pixel(2, 0), None);
}
