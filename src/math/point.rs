use super::Point;

/// Returns coordinate `axis` of `p`.
///
/// # Panics
///
/// Panics if `axis >= D`.
#[must_use]
pub fn component<const D: usize>(p: &Point<D>, axis: usize) -> f64 {
    assert!(axis < D, "axis {axis} out of range for {D}-dimensional point");
    p[axis]
}

/// Sum of squared per-axis differences between `a` and `b`.
#[must_use]
pub fn squared_distance<const D: usize>(a: &Point<D>, b: &Point<D>) -> f64 {
    nalgebra::distance_squared(a, b)
}

/// Signed offset of `q` from `p` along `axis`.
#[must_use]
pub(crate) fn axis_offset<const D: usize>(q: &Point<D>, p: &Point<D>, axis: usize) -> f64 {
    component(q, axis) - component(p, axis)
}
