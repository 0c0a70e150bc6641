use crate::foundation::core::Rgba8;
use crate::foundation::error::{PointreelError, PointreelResult};
use crate::foundation::math::mul_div255_u8;

pub type PremulRgba8 = [u8; 4];

pub fn premul_rgba8(c: Rgba8) -> PremulRgba8 {
    let a = u16::from(c.a);
    [
        mul_div255_u8(u16::from(c.r), a),
        mul_div255_u8(u16::from(c.g), a),
        mul_div255_u8(u16::from(c.b), a),
        c.a,
    ]
}

pub fn unpremultiply(px: PremulRgba8) -> Rgba8 {
    let a = px[3];
    if a == 0 {
        return Rgba8::new(0, 0, 0, 0);
    }
    let a32 = u32::from(a);
    let un = |c: u8| -> u8 { ((u32::from(c) * 255 + a32 / 2) / a32).min(255) as u8 };
    Rgba8::new(un(px[0]), un(px[1]), un(px[2]), a)
}

/// Source-over of one premultiplied pixel.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = u16::from(src[3]);
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
    }
    out
}

/// Source-over of a whole premultiplied buffer onto another of equal size.
pub fn premul_over_in_place(dst: &mut [u8], src: &[u8]) -> PointreelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(PointreelError::render(
            "premul_over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Source-over of a single straight color across the whole buffer.
pub fn over_color_in_place(dst: &mut [u8], color: Rgba8) {
    let src = premul_rgba8(color);
    if src[3] == 0 {
        return;
    }
    for d in dst.chunks_exact_mut(4) {
        let out = over([d[0], d[1], d[2], d[3]], src);
        d.copy_from_slice(&out);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
