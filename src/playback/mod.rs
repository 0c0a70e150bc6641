pub mod controller;
pub mod driver;
pub mod observer;
