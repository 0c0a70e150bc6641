pub mod composite;
pub mod renderer;
pub mod surface;
