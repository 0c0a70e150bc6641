use super::*;

#[test]
fn premul_then_unpremultiply_is_stable_for_opaque_colors() {
    let c = Rgba8::opaque(12, 200, 99);
    assert_eq!(premul_rgba8(c), [12, 200, 99, 255]);
    assert_eq!(unpremultiply(premul_rgba8(c)), c);
}

#[test]
fn transparent_pixels_unpremultiply_to_zero() {
    assert_eq!(unpremultiply([10, 10, 10, 0]), Rgba8::new(0, 0, 0, 0));
}

#[test]
fn over_with_opaque_source_replaces_destination() {
    assert_eq!(over([1, 2, 3, 255], [9, 8, 7, 255]), [9, 8, 7, 255]);
    assert_eq!(over([1, 2, 3, 255], [0, 0, 0, 0]), [1, 2, 3, 255]);
}

#[test]
fn half_transparent_background_fades_destination() {
    let mut buf = vec![255, 0, 0, 255];
    over_color_in_place(&mut buf, Rgba8::WHITE.with_alpha(0.5));
    assert_eq!(buf[3], 255);
    assert_eq!(buf[0], 255);
    assert!((126..=129).contains(&buf[1]), "{buf:?}");
}

#[test]
fn over_in_place_rejects_mismatched_buffers() {
    let mut dst = vec![0u8; 8];
    assert!(premul_over_in_place(&mut dst, &[0u8; 4]).is_err());
}
