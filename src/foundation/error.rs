/// Result alias used across the crate.
pub type PointreelResult<T> = Result<T, PointreelError>;

/// Error taxonomy for the playback engine.
///
/// Stale load results and pointer misses are not errors and never show up here.
#[derive(thiserror::Error, Debug)]
pub enum PointreelError {
    /// Invalid input: catalog entries, options, shapes, out-of-range indices.
    #[error("validation error: {0}")]
    Validation(String),

    /// Asset fetch or decode failure.
    #[error("load error: {0}")]
    Load(String),

    /// Rasterization failure inside one view.
    #[error("render error: {0}")]
    Render(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PointreelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for asset fetch/decode failures.
    pub fn is_load(&self) -> bool {
        matches!(self, Self::Load(_))
    }
}
