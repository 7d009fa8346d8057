pub mod point;

pub use point::{component, squared_distance};

/// Point in `D`-dimensional space.
pub type Point<const D: usize> = nalgebra::Point<f64, D>;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Default squared distance below which two corners are the same vertex.
///
/// Corresponds to a linear tolerance of `1.0e-4` in input units.
pub const MERGE_TOLERANCE_SQUARED: f64 = 1.0e-8;
