pub mod ndarray;
pub mod npy;
pub mod set;
