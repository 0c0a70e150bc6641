use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assets::loader::LoaderOpts;
use crate::foundation::error::{PointreelError, PointreelResult};
use crate::playback::controller::{Controller, DEFAULT_FPS};
use crate::view::options::ViewOptions;

/// Player settings file. Every field is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub fps: f64,
    pub loader: LoaderOpts,
    pub view: ViewOptions,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            loader: LoaderOpts::default(),
            view: ViewOptions::default(),
        }
    }
}

impl PlayerConfig {
    /// Parse a config from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> PointreelResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| PointreelError::serde(format!("parse player config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> PointreelResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PointreelError::validation(format!("open player config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> PointreelResult<()> {
        if !self.fps.is_finite() || self.fps < 0.0 {
            return Err(PointreelError::validation(format!(
                "fps must be finite and non-negative, got {}",
                self.fps
            )));
        }
        if self.loader.chunk_bytes == 0 {
            return Err(PointreelError::validation("loader.chunk_bytes must be > 0"));
        }
        self.view.validate()
    }

    /// A controller running at the configured frame rate.
    pub fn controller(&self) -> PointreelResult<Controller> {
        let mut c = Controller::new();
        c.set_fps(self.fps)?;
        Ok(c)
    }
}
