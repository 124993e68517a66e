pub mod segmentation;
pub mod shape;
pub mod color;

pub use segmentation::*;
pub use shape::*;
pub use color::*;
