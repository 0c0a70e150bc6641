/// Linearly map `x` from `[from.0, from.1]` onto `[to.0, to.1]`.
///
/// No clamping: values outside the source range extrapolate.
pub fn remap(x: f64, from: [f64; 2], to: [f64; 2]) -> f64 {
    let a = (to[1] - to[0]) / (from[1] - from[0]);
    a * (x - from[0]) + to[0]
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// Split a continuous frame cursor into `(floor_frame, next_frame, fraction)`.
///
/// `next_frame` is clamped to the last frame, in which case the fraction is irrelevant.
pub fn frame_pair(time: f64, frame_count: usize) -> (usize, usize, f64) {
    if frame_count == 0 || !time.is_finite() {
        return (0, 0, 0.0);
    }
    let last = frame_count - 1;
    let floor = time.max(0.0).floor();
    let frame = (floor as usize).min(last);
    let next = (frame + 1).min(last);
    (frame, next, time.max(0.0) - floor)
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
