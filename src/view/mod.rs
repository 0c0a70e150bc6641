pub mod options;
pub mod visualization;
