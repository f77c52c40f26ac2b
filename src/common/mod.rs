pub mod frame;
pub mod region;

pub use frame::Frame;
pub use region::{Point, Region};
