pub mod color;
pub mod curve;
pub mod point;
