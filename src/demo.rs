//! Synthetic spiral dataset used by `pointreel demo` and by tests.

use std::f64::consts::TAU;
use std::path::Path;

use crate::assets::source::MemoryArraySource;
use crate::catalog::model::{Capture, Catalog, Channel, ClassInfo, Variation};
use crate::data::npy::write_npy_f32;
use crate::foundation::error::{PointreelError, PointreelResult};

/// Shape of the generated dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct DemoSpec {
    pub capture: String,
    pub frames: usize,
    pub samples: usize,
    pub classes: usize,
    pub channels: usize,
    pub has_x_preview: bool,
}

impl Default for DemoSpec {
    fn default() -> Self {
        Self {
            capture: "spiral".to_owned(),
            frames: 60,
            samples: 300,
            classes: 5,
            channels: 2,
            has_x_preview: true,
        }
    }
}

/// Catalog plus every array file, keyed by storage-relative path.
#[derive(Clone, Debug)]
pub struct DemoDataset {
    pub catalog: Catalog,
    pub files: Vec<(String, Vec<u8>)>,
}

/// Variation names and the per-frame jitter each one carries.
const VARIATIONS: [(&str, f64); 2] = [("smooth", 0.0), ("raw", 0.04)];

/// Generate `spec.classes` interleaved spiral arms that unwind over time.
pub fn build(spec: &DemoSpec) -> PointreelResult<DemoDataset> {
    if spec.frames == 0 || spec.samples == 0 || spec.classes == 0 || spec.channels == 0 {
        return Err(PointreelError::validation(
            "demo dataset needs at least one frame, sample, class and channel",
        ));
    }

    let path = format!("captures/{}", spec.capture);
    let mut files = Vec::new();
    let mut variations = Vec::new();
    let labels: Vec<f32> = (0..spec.samples).map(|i| (i % spec.classes) as f32).collect();

    for (name, jitter) in VARIATIONS {
        let mut channels = Vec::with_capacity(spec.channels);
        for c in 0..spec.channels {
            let channel = format!("layer{}", c + 1);
            let data = spiral(spec, c, jitter);
            files.push((
                format!("{path}/{name}/{channel}.npy"),
                write_npy_f32(&[spec.frames, spec.samples, 2], &data)?,
            ));
            channels.push(Channel {
                name: channel,
                bounds: [[-1.2, 1.2], [-1.2, 1.2]],
            });
        }
        files.push((
            format!("{path}/{name}/labels.npy"),
            write_npy_f32(&[spec.samples], &labels)?,
        ));
        variations.push(Variation {
            name: name.to_owned(),
            channels,
        });
    }

    let capture = Capture {
        name: spec.capture.clone(),
        path,
        frame_count: spec.frames as u64,
        has_x_preview: spec.has_x_preview,
        variations,
        classes: Some(
            (0..spec.classes)
                .map(|k| ClassInfo {
                    name: format!("arm {k}"),
                    image: None,
                })
                .collect(),
        ),
    };
    let catalog = Catalog {
        captures: vec![capture],
    };
    catalog.validate()?;
    Ok(DemoDataset { catalog, files })
}

fn spiral(spec: &DemoSpec, channel: usize, jitter: f64) -> Vec<f32> {
    let per_class = spec.samples.div_ceil(spec.classes).max(1) as f64;
    let mut out = Vec::with_capacity(spec.frames * spec.samples * 2);
    for f in 0..spec.frames {
        let t = f as f64 / spec.frames as f64;
        for i in 0..spec.samples {
            let k = i % spec.classes;
            let rank = (i / spec.classes) as f64 / per_class;
            let r = 0.1 + 0.9 * rank * (0.4 + 0.6 * t);
            let twist = (1.0 - t) * 3.0 * rank * (channel + 1) as f64;
            let angle = TAU * k as f64 / spec.classes as f64 + twist;
            // Deterministic wobble so "raw" looks noisier than "smooth".
            let wobble = jitter * ((i * 7919 + f * 104_729) as f64).sin();
            out.push(((r + wobble) * angle.cos()) as f32);
            out.push(((r + wobble) * angle.sin()) as f32);
        }
    }
    out
}

impl DemoDataset {
    pub fn capture(&self) -> &Capture {
        &self.catalog.captures[0]
    }

    /// Write `catalog.json` and every array below `root`.
    pub fn write_to(&self, root: &Path) -> PointreelResult<()> {
        let io = |p: &Path, e: std::io::Error| {
            PointreelError::Other(anyhow::anyhow!("failed to write '{}': {e}", p.display()))
        };
        for (rel, bytes) in &self.files {
            let p = root.join(rel);
            if let Some(dir) = p.parent() {
                std::fs::create_dir_all(dir).map_err(|e| io(dir, e))?;
            }
            std::fs::write(&p, bytes).map_err(|e| io(&p, e))?;
        }
        let p = root.join("catalog.json");
        std::fs::create_dir_all(root).map_err(|e| io(root, e))?;
        std::fs::write(&p, self.catalog.to_json_pretty()?).map_err(|e| io(&p, e))?;
        Ok(())
    }

    pub fn memory_source(&self) -> PointreelResult<MemoryArraySource> {
        let src = MemoryArraySource::new();
        for (rel, bytes) in &self.files {
            src.insert(rel, bytes.clone())?;
        }
        Ok(src)
    }
}
