use serde::{Deserialize, Serialize};

use crate::assets::color::parse_color;
use crate::foundation::error::{PointreelError, PointreelResult};
use crate::render::renderer::RenderStyle;

/// d3 "category10".
pub const DEFAULT_COLORS: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Initial per-view settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    pub channel: usize,
    pub render_style: RenderStyle,
    /// Percent of background laid over the previous frame while a tail style plays.
    pub tail_falloff: f32,
    /// Dot radius in reference pixels (512 px wide surface).
    pub radius: f64,
    /// Palette opacity in percent.
    pub opacity: f32,
    pub background: String,
    /// Class palette, indexed by `class_id % len`.
    pub colors: Vec<String>,
    /// Masked samples are drawn with alpha `masked_alpha_scale / sample_count`.
    pub masked_alpha_scale: f32,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            channel: 0,
            render_style: RenderStyle::Dots,
            tail_falloff: 10.0,
            radius: 2.5,
            opacity: 100.0,
            background: "#ffffff".to_owned(),
            colors: DEFAULT_COLORS.iter().map(|s| (*s).to_owned()).collect(),
            masked_alpha_scale: 10.0,
        }
    }
}

impl ViewOptions {
    pub fn validate(&self) -> PointreelResult<()> {
        check_percent("tail_falloff", self.tail_falloff)?;
        check_percent("opacity", self.opacity)?;
        check_radius(self.radius)?;
        if !self.masked_alpha_scale.is_finite() || self.masked_alpha_scale < 0.0 {
            return Err(PointreelError::validation(format!(
                "masked_alpha_scale must be finite and non-negative, got {}",
                self.masked_alpha_scale
            )));
        }
        parse_color(&self.background)?;
        for c in &self.colors {
            parse_color(c)?;
        }
        Ok(())
    }
}

pub(crate) fn check_percent(name: &str, v: f32) -> PointreelResult<()> {
    if !(0.0..=100.0).contains(&v) {
        return Err(PointreelError::validation(format!(
            "{name} must be within [0, 100], got {v}"
        )));
    }
    Ok(())
}

pub(crate) fn check_radius(r: f64) -> PointreelResult<()> {
    if !r.is_finite() || r < 0.0 {
        return Err(PointreelError::validation(format!(
            "radius must be finite and non-negative, got {r}"
        )));
    }
    Ok(())
}
