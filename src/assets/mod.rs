pub mod color;
pub mod loader;
pub mod source;
