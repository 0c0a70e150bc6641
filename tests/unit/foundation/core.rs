use super::*;

#[test]
fn with_alpha_clamps_and_rounds() {
    let c = Rgba8::opaque(10, 20, 30);
    assert_eq!(c.with_alpha(0.5).a, 128);
    assert_eq!(c.with_alpha(2.0).a, 255);
    assert_eq!(c.with_alpha(-1.0).a, 0);
    assert_eq!(c.with_alpha(f32::NAN).a, 0);
    assert_eq!(c.with_alpha(0.5).r, 10);
}

#[test]
fn view_ids_are_unique() {
    let a = ViewId::next();
    let b = ViewId::next();
    assert_ne!(a, b);
    assert!(a.to_string().starts_with("view#"));
}

#[test]
fn class_mask_defaults_missing_classes_to_enabled() {
    let mask = ClassMask(vec![true, false]);
    assert!(mask.is_enabled(0));
    assert!(!mask.is_enabled(1));
    assert!(mask.is_enabled(7));
    assert_eq!(ClassMask::all_enabled(3).len(), 3);
    assert!(ClassMask::default().is_empty());
}
