use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{PointreelError, PointreelResult};

/// One pipeline stage of a variation with its coordinate bounding box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    /// `[[x_min, x_max], [y_min, y_max]]` in raw coordinate space.
    pub bounds: [[f64; 2]; 2],
}

impl Channel {
    pub fn x_range(&self) -> [f64; 2] {
        self.bounds[0]
    }

    pub fn y_range(&self) -> [f64; 2] {
        self.bounds[1]
    }

    fn validate(&self) -> PointreelResult<()> {
        for (axis, [lo, hi]) in ["x", "y"].iter().zip(self.bounds) {
            if !lo.is_finite() || !hi.is_finite() || lo == hi {
                return Err(PointreelError::validation(format!(
                    "channel '{}' has degenerate {axis} bounds [{lo}, {hi}]",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// One smoothing/precision configuration of a capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Variation {
    /// Number of buffers a load has to fetch: one per channel plus the class ids.
    pub fn buffer_count(&self) -> usize {
        self.channels.len() + 1
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A recorded dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub name: String,
    /// Path prefix under which the variation arrays live.
    pub path: String,
    pub frame_count: u64,
    /// Whether per-sample preview images exist (`{path}/anim_x/{idx}.png`).
    #[serde(default)]
    pub has_x_preview: bool,
    pub variations: Vec<Variation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<ClassInfo>>,
}

impl Capture {
    pub fn class_count(&self) -> usize {
        self.classes.as_ref().map_or(0, Vec::len)
    }

    pub fn variation(&self, name: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.name == name)
    }

    /// Preview image of a sample, when the capture ships previews.
    pub fn preview_image_path(&self, sample_idx: usize) -> Option<String> {
        self.has_x_preview
            .then(|| format!("{}/anim_x/{sample_idx}.png", self.path.trim_end_matches('/')))
    }

    fn validate(&self) -> PointreelResult<()> {
        if self.name.is_empty() {
            return Err(PointreelError::validation("capture name must be non-empty"));
        }
        if self.variations.is_empty() {
            return Err(PointreelError::validation(format!(
                "capture '{}' has no variations",
                self.name
            )));
        }
        for v in &self.variations {
            if v.channels.is_empty() {
                return Err(PointreelError::validation(format!(
                    "variation '{}' of capture '{}' has no channels",
                    v.name, self.name
                )));
            }
            for c in &v.channels {
                c.validate()?;
            }
        }
        Ok(())
    }
}

/// Ordered, read-only list of captures available at startup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub captures: Vec<Capture>,
}

impl Catalog {
    pub fn from_json_str(s: &str) -> PointreelResult<Self> {
        let catalog: Self =
            serde_json::from_str(s).map_err(|e| PointreelError::serde(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> PointreelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PointreelError::validation(format!("failed to read catalog '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> PointreelResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PointreelError::serde(e.to_string()))
    }

    pub fn validate(&self) -> PointreelResult<()> {
        let mut seen = std::collections::HashSet::new();
        for c in &self.captures {
            if !seen.insert(c.name.as_str()) {
                return Err(PointreelError::validation(format!(
                    "duplicate capture name '{}'",
                    c.name
                )));
            }
            c.validate()?;
        }
        Ok(())
    }

    pub fn capture(&self, name: &str) -> Option<&Capture> {
        self.captures.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/catalog/model.rs"]
mod tests;
