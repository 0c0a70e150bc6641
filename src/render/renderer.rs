use std::sync::Arc;

use kurbo::{BezPath, Cap, Circle, Line, PathEl, Shape, Stroke, StrokeOpts};
use serde::{Deserialize, Serialize};

use crate::catalog::model::Variation;
use crate::data::set::ArraySet;
use crate::foundation::core::{ClassMask, Point, Rgba8};
use crate::foundation::error::{PointreelError, PointreelResult};
use crate::foundation::math::remap;
use crate::render::composite::{over_color_in_place, premul_over_in_place};
use crate::render::surface::Surface;

/// Radii and stroke widths are expressed against a 512 px wide reference surface.
pub const REFERENCE_WIDTH: f64 = 512.0;

const TOLERANCE: f64 = 0.1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderStyle {
    /// One dot per sample, cleared every frame.
    #[default]
    #[serde(rename = "dots")]
    Dots,
    /// Fading segments from the previous to the current position.
    #[serde(rename = "dots-tail", alias = "tail")]
    Tail,
    /// Fading segments with a dot on the current position.
    #[serde(rename = "lines-tail", alias = "tail-with-dots")]
    TailWithDots,
}

impl RenderStyle {
    pub fn is_tail(self) -> bool {
        matches!(self, Self::Tail | Self::TailWithDots)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dots => "dots",
            Self::Tail => "dots-tail",
            Self::TailWithDots => "lines-tail",
        }
    }
}

impl std::fmt::Display for RenderStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RenderStyle {
    type Err = PointreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dots" => Ok(Self::Dots),
            "dots-tail" | "tail" => Ok(Self::Tail),
            "lines-tail" | "tail-with-dots" => Ok(Self::TailWithDots),
            other => Err(PointreelError::validation(format!(
                "unknown render style \"{other}\" (expected dots, dots-tail or lines-tail)"
            ))),
        }
    }
}

/// Everything a single frame draw depends on besides the data.
#[derive(Clone, Copy, Debug)]
pub struct RenderRequest<'a> {
    pub time: f64,
    pub channel: usize,
    /// Dot radius in reference pixels.
    pub radius: f64,
    /// Alpha-applied palette, indexed by `class_id % len`.
    pub palette: &'a [Rgba8],
    pub style: RenderStyle,
    /// Background overlay opacity in percent, applied once per played tail frame.
    pub tail_falloff: f32,
    pub is_playing: bool,
    pub class_mask: &'a ClassMask,
    pub background: Rgba8,
    /// Alpha of masked samples is `masked_alpha_scale / sample_count`.
    pub masked_alpha_scale: f32,
    pub hovered: Option<usize>,
}

/// Draws frames of one loaded variation onto a [`Surface`].
pub struct Renderer {
    arrays: Arc<ArraySet>,
    variation: Variation,
    ctx: Option<vello_cpu::RenderContext>,
    scratch: Option<vello_cpu::Pixmap>,
    last_epoch: Option<u64>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("variation", &self.variation.name)
            .field("channels", &self.arrays.positions.len())
            .field("samples", &self.arrays.sample_count())
            .finish_non_exhaustive()
    }
}

impl Renderer {
    pub fn new(arrays: Arc<ArraySet>, variation: Variation) -> PointreelResult<Self> {
        if arrays.positions.len() != variation.channels.len() {
            return Err(PointreelError::render(format!(
                "variation '{}' declares {} channels but {} position arrays were loaded",
                variation.name,
                variation.channels.len(),
                arrays.positions.len()
            )));
        }
        Ok(Self {
            arrays,
            variation,
            ctx: None,
            scratch: None,
            last_epoch: None,
        })
    }

    pub fn arrays(&self) -> &Arc<ArraySet> {
        &self.arrays
    }

    pub fn variation(&self) -> &Variation {
        &self.variation
    }

    /// Frame index drawn for `time`: `floor(time)` clamped into the array.
    pub fn frame_for(&self, time: f64, channel: usize) -> usize {
        let frames = self
            .arrays
            .positions
            .get(channel)
            .map_or(0, |p| p.frame_count());
        if frames == 0 || !time.is_finite() {
            return 0;
        }
        (time.max(0.0).floor() as usize).min(frames - 1)
    }

    /// Draw the frame at `req.time`.
    ///
    /// Tail styles keep the surface's previous pixels unless it was cleared or reallocated
    /// since this renderer last drew on it.
    #[tracing::instrument(level = "trace", skip_all, fields(time = req.time, channel = req.channel))]
    pub fn render(
        &mut self,
        surface: &mut Surface,
        req: &RenderRequest<'_>,
    ) -> PointreelResult<()> {
        let positions = self.arrays.positions.get(req.channel).ok_or_else(|| {
            PointreelError::render(format!(
                "channel {} out of range ({} channels)",
                req.channel,
                self.arrays.positions.len()
            ))
        })?;
        let channel = &self.variation.channels[req.channel];
        let frame = self.frame_for(req.time, req.channel);
        let (pw, ph) = surface.pixel_size();
        let (w, h) = (f64::from(pw), f64::from(ph));

        // Frame 0 has no previous frame, so tail styles draw it like dots.
        let tail = req.style.is_tail() && frame != 0;
        let keep = tail && self.last_epoch == Some(surface.epoch());
        if !keep {
            surface.data_mut().fill(0);
        } else if req.is_playing {
            over_color_in_place(
                surface.data_mut(),
                req.background.with_alpha(req.tail_falloff / 100.0),
            );
        }

        let samples = self.arrays.sample_count();
        let masked_alpha = (req.masked_alpha_scale / samples.max(1) as f32).clamp(0.0, 1.0);
        let dot_r = req.radius * w / REFERENCE_WIDTH;
        let to_px = |xy: (f64, f64)| -> Point {
            Point::new(
                remap(xy.0, channel.x_range(), [0.0, 1.0]) * w,
                remap(xy.1, channel.y_range(), [0.0, 1.0]) * h,
            )
        };
        let segment_stroke =
            Stroke::new(2.0 * req.radius * w / REFERENCE_WIDTH).with_caps(Cap::Butt);

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == pw && ctx.height() == ph => ctx,
            _ => vello_cpu::RenderContext::new(pw, ph),
        };
        ctx.reset();
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);

        for (i, &class_id) in self.arrays.class_ids.iter().enumerate() {
            let Some(cur) = positions.xy(frame, i) else {
                continue;
            };
            let base = match req.palette.len() {
                0 => Rgba8::WHITE,
                n => req.palette[class_id as usize % n],
            };
            let color = if req.class_mask.is_enabled(class_id) {
                base
            } else {
                base.with_alpha(masked_alpha)
            };
            ctx.set_paint(color.to_cpu());

            let cur = to_px(cur);
            if tail {
                if let Some(prev) = positions.xy(frame - 1, i) {
                    let seg = Line::new(to_px(prev), cur);
                    ctx.fill_path(&stroked_to_cpu(&seg, &segment_stroke));
                }
                if req.style == RenderStyle::TailWithDots {
                    ctx.fill_path(&shape_to_cpu(&Circle::new(cur, dot_r)));
                }
            } else {
                ctx.fill_path(&shape_to_cpu(&Circle::new(cur, dot_r)));
            }
        }

        if let Some(idx) = req.hovered
            && let Some(xy) = positions.xy(frame, idx)
        {
            let ring = Circle::new(to_px(xy), dot_r * 2.0);
            ctx.set_paint(Rgba8::BLACK.to_cpu());
            ctx.fill_path(&stroked_to_cpu(&ring, &Stroke::new((dot_r * 0.5).max(1.0))));
        }

        ctx.flush();
        let mut scratch = match self.scratch.take() {
            Some(p) if p.width() == pw && p.height() == ph => p,
            _ => vello_cpu::Pixmap::new(pw, ph),
        };
        scratch.data_as_u8_slice_mut().fill(0);
        ctx.render_to_pixmap(&mut scratch);
        let composed = premul_over_in_place(surface.data_mut(), scratch.data_as_u8_slice());

        self.ctx = Some(ctx);
        self.scratch = Some(scratch);
        self.last_epoch = Some(surface.epoch());
        composed
    }
}

fn shape_to_cpu(shape: &impl Shape) -> vello_cpu::kurbo::BezPath {
    path_to_cpu(shape.path_elements(TOLERANCE))
}

fn stroked_to_cpu(shape: &impl Shape, stroke: &Stroke) -> vello_cpu::kurbo::BezPath {
    let outline: BezPath = kurbo::stroke(
        shape.path_elements(TOLERANCE),
        stroke,
        &StrokeOpts::default(),
        TOLERANCE,
    );
    path_to_cpu(outline.elements().iter().copied())
}

fn path_to_cpu(els: impl IntoIterator<Item = PathEl>) -> vello_cpu::kurbo::BezPath {
    let pt = |p: Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for el in els {
        match el {
            PathEl::MoveTo(p) => out.move_to(pt(p)),
            PathEl::LineTo(p) => out.line_to(pt(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(pt(p1), pt(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(pt(p1), pt(p2), pt(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
