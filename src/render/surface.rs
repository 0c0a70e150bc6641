use serde::{Deserialize, Serialize};

use crate::foundation::core::Rgba8;
use crate::foundation::error::{PointreelError, PointreelResult};
use crate::render::composite::{over, premul_rgba8, unpremultiply};

/// Host-reported scale factors applied on top of the displayed size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportMetrics {
    pub device_pixel_ratio: f64,
    pub zoom: f64,
}

impl Default for ViewportMetrics {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            zoom: 1.0,
        }
    }
}

impl ViewportMetrics {
    fn scale(self) -> f64 {
        let s = self.device_pixel_ratio * self.zoom;
        if s.is_finite() && s > 0.0 { s } else { 1.0 }
    }
}

/// Backing pixel count for one axis, clamped to what a pixmap can hold.
pub fn backing_len(display: f64, metrics: ViewportMetrics) -> u16 {
    let px = (display * metrics.scale()).round();
    if px.is_finite() {
        px.clamp(1.0, f64::from(u16::MAX)) as u16
    } else {
        1
    }
}

/// Raster target of one view.
///
/// The display size is what the host lays out (and what pointer coordinates refer to); the
/// backing pixmap is `display * device_pixel_ratio * zoom`. Pixels are premultiplied RGBA8 and
/// start transparent.
pub struct Surface {
    display: (f64, f64),
    metrics: ViewportMetrics,
    pixmap: vello_cpu::Pixmap,
    epoch: u64,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("display", &self.display)
            .field("metrics", &self.metrics)
            .field("pixel_size", &self.pixel_size())
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl Surface {
    pub fn new(
        display_width: f64,
        display_height: f64,
        metrics: ViewportMetrics,
    ) -> PointreelResult<Self> {
        check_display(display_width, display_height)?;
        let w = backing_len(display_width, metrics);
        let h = backing_len(display_height, metrics);
        Ok(Self {
            display: (display_width, display_height),
            metrics,
            pixmap: vello_cpu::Pixmap::new(w, h),
            epoch: 0,
        })
    }

    pub fn display_size(&self) -> (f64, f64) {
        self.display
    }

    pub fn metrics(&self) -> ViewportMetrics {
        self.metrics
    }

    /// Backing size in pixels.
    pub fn pixel_size(&self) -> (u16, u16) {
        (self.pixmap.width(), self.pixmap.height())
    }

    /// Bumped whenever previous pixels stop being meaningful (clear or reallocation).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Recompute the backing size for new viewport metrics. Returns whether it changed.
    pub fn correct_scaling(&mut self, metrics: ViewportMetrics) -> bool {
        self.metrics = metrics;
        self.reallocate()
    }

    /// Change the displayed size. Returns whether the backing size changed.
    pub fn set_display_size(&mut self, width: f64, height: f64) -> PointreelResult<bool> {
        check_display(width, height)?;
        self.display = (width, height);
        Ok(self.reallocate())
    }

    fn reallocate(&mut self) -> bool {
        let w = backing_len(self.display.0, self.metrics);
        let h = backing_len(self.display.1, self.metrics);
        if (w, h) == self.pixel_size() {
            return false;
        }
        tracing::debug!(width = w, height = h, "surface reallocated");
        self.pixmap = vello_cpu::Pixmap::new(w, h);
        self.epoch += 1;
        true
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        self.pixmap.data_as_u8_slice_mut().fill(0);
        self.epoch += 1;
    }

    /// `true` when no pixel has any coverage.
    pub fn is_blank(&self) -> bool {
        self.pixmap.data_as_u8_slice().chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Premultiplied pixel at backing coordinates.
    pub fn pixel(&self, x: u16, y: u16) -> Option<[u8; 4]> {
        let (w, h) = self.pixel_size();
        if x >= w || y >= h {
            return None;
        }
        let i = (usize::from(y) * usize::from(w) + usize::from(x)) * 4;
        let d = self.pixmap.data_as_u8_slice();
        Some([d[i], d[i + 1], d[i + 2], d[i + 3]])
    }

    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        self.pixmap.data_as_u8_slice_mut()
    }

    /// Straight RGBA8 image, composited over `background` when given.
    pub fn to_rgba8(&self, background: Option<Rgba8>) -> Vec<u8> {
        let bg = background.map(premul_rgba8);
        let mut out = Vec::with_capacity(self.data().len());
        for px in self.data().chunks_exact(4) {
            let px = [px[0], px[1], px[2], px[3]];
            let px = match bg {
                Some(bg) => over(bg, px),
                None => px,
            };
            let c = unpremultiply(px);
            out.extend_from_slice(&[c.r, c.g, c.b, c.a]);
        }
        out
    }
}

fn check_display(width: f64, height: f64) -> PointreelResult<()> {
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(PointreelError::validation(format!(
            "display size must be finite and positive, got {width}x{height}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
