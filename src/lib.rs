#![forbid(unsafe_code)]
//! Synchronized playback and CPU rendering of time-series 2D point-cloud embeddings.
//!
//! A [`Driver`] ticks one or more [`Controller`] clocks; each controller keeps its registered
//! [`Visualization`] views in sync. Views load their arrays through an [`AssetLoader`] on a
//! worker thread and draw with a `vello_cpu` backed [`Renderer`].

pub mod assets;
pub mod catalog;
pub mod config;
pub mod data;
pub mod demo;
pub mod foundation;
pub mod playback;
pub mod render;
pub mod view;

pub use assets::color::{parse_color, parse_palette};
pub use assets::loader::{AssetLoader, LoadPoll, LoaderOpts, PendingLoad};
pub use assets::source::{ArrayKey, ArraySource, BufferKind, FsArraySource, MemoryArraySource};
pub use catalog::model::{Capture, Catalog, Channel, ClassInfo, Variation};
pub use config::PlayerConfig;
pub use data::ndarray::NDArray;
pub use data::npy::{decode_npy, write_npy_f32};
pub use data::set::ArraySet;
pub use foundation::core::{ClassMask, Point, Rgba8, ViewId};
pub use foundation::error::{PointreelError, PointreelResult};
pub use playback::controller::{Controller, FrameState, PlaybackView, SharedController};
pub use playback::driver::{Driver, ResizeSource};
pub use playback::observer::Subscription;
pub use render::renderer::{RenderRequest, RenderStyle, Renderer};
pub use render::surface::{Surface, ViewportMetrics};
pub use view::hit_test::MouseCollision;
pub use view::options::ViewOptions;
pub use view::visualization::{SharedVisualization, ViewState, Visualization};
