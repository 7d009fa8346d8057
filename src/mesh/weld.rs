use tracing::debug;

use crate::error::{MeshError, Result};
use crate::io::SoupSource;
use crate::math::{Point3, MERGE_TOLERANCE_SQUARED};
use crate::spatial::KdTree;

use super::{IndexedMesh, Triangle};

/// Upper bound on storage reserved up front from a source's size hint.
const MAX_PREALLOCATED_TRIANGLES: usize = 1 << 22;

/// Parameters controlling vertex welding.
#[derive(Debug, Clone, Copy)]
pub struct WeldParams {
    /// Corners whose squared distance to an existing vertex is at most this
    /// value reuse that vertex.
    pub tolerance_squared: f64,
}

impl Default for WeldParams {
    fn default() -> Self {
        Self {
            tolerance_squared: MERGE_TOLERANCE_SQUARED,
        }
    }
}

/// Counters describing a weld run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeldStats {
    /// Triangles consumed.
    pub triangles: usize,
    /// Corners consumed (three per triangle, plus any pushed individually).
    pub corners: usize,
    /// Distinct vertices kept after merging.
    pub vertices: usize,
}

/// Turns triangle-soup corners into shared, indexed vertices.
///
/// Each corner is looked up in a k-d tree of the vertices accepted so far.
/// If the closest one lies within the tolerance its index is reused,
/// otherwise the corner becomes a new vertex. The first corner seen at a
/// location defines that vertex.
#[derive(Debug, Clone, Default)]
pub struct VertexWelder {
    params: WeldParams,
    tree: KdTree<3>,
    mesh: IndexedMesh,
    triangles: usize,
    corners: usize,
}

impl VertexWelder {
    /// Creates an empty welder.
    #[must_use]
    pub fn new(params: WeldParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Creates an empty welder sized for roughly `triangles` input triangles.
    #[must_use]
    pub fn with_capacity(params: WeldParams, triangles: usize) -> Self {
        // Closed meshes have about half as many vertices as triangles.
        let vertices = triangles / 2;
        Self {
            params,
            tree: KdTree::with_capacity(vertices),
            mesh: IndexedMesh::with_capacity(vertices, triangles),
            triangles: 0,
            corners: 0,
        }
    }

    /// Resolves a single corner to a vertex index, inserting it if no stored
    /// vertex is within tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::TooManyVertices`] if a new vertex would not fit
    /// in a `u32` index.
    pub fn push_corner(&mut self, corner: Point3) -> Result<u32> {
        self.corners += 1;

        if let Some(nearest) = self.tree.find_nearest(&corner) {
            if nearest.squared_distance <= self.params.tolerance_squared {
                return Ok(to_index(nearest.index)?);
            }
        }

        let index = to_index(self.tree.len())?;
        self.tree.insert(corner);
        self.mesh.vertices.push(corner);
        debug_assert_eq!(self.tree.len(), self.mesh.vertices.len());
        Ok(index)
    }

    /// Resolves all three corners of `triangle` and appends the face.
    ///
    /// The normal is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::TooManyVertices`] if the vertex count overflows
    /// `u32`. The face is not appended in that case.
    pub fn push_triangle(&mut self, triangle: &Triangle) -> Result<[u32; 3]> {
        let [a, b, c] = triangle.corners;
        let face = [
            self.push_corner(a)?,
            self.push_corner(b)?,
            self.push_corner(c)?,
        ];
        self.mesh.faces.push(face);
        self.triangles += 1;
        Ok(face)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> WeldStats {
        WeldStats {
            triangles: self.triangles,
            corners: self.corners,
            vertices: self.mesh.vertex_count(),
        }
    }

    /// The spatial index over the accepted vertices.
    #[must_use]
    pub fn tree(&self) -> &KdTree<3> {
        &self.tree
    }

    /// The mesh accumulated so far.
    #[must_use]
    pub fn mesh(&self) -> &IndexedMesh {
        &self.mesh
    }

    /// Consumes the welder and returns the accumulated mesh.
    #[must_use]
    pub fn finish(self) -> IndexedMesh {
        self.mesh
    }
}

fn to_index(index: usize) -> std::result::Result<u32, MeshError> {
    u32::try_from(index).map_err(|_| MeshError::TooManyVertices { count: index + 1 })
}

/// Welds an entire triangle soup into an indexed mesh.
pub struct WeldSoup {
    params: WeldParams,
}

impl WeldSoup {
    /// Creates a new `WeldSoup` operation.
    #[must_use]
    pub fn new(params: WeldParams) -> Self {
        Self { params }
    }

    /// Executes the weld over every triangle produced by `source`.
    ///
    /// # Errors
    ///
    /// Returns the first read error from `source`, or a [`MeshError`] if the
    /// mesh outgrows `u32` indices. Any partially built mesh is dropped.
    pub fn execute<S: SoupSource>(&self, source: S) -> Result<(IndexedMesh, WeldStats)> {
        let (lower, upper) = source.size_hint();
        let hint = upper.unwrap_or(lower).min(MAX_PREALLOCATED_TRIANGLES);
        let mut welder = VertexWelder::with_capacity(self.params, hint);

        for triangle in source {
            welder.push_triangle(&triangle?)?;
        }

        let stats = welder.stats();
        debug!(
            triangles = stats.triangles,
            vertices = stats.vertices,
            tree_height = welder.tree().height(),
            "weld finished"
        );
        Ok((welder.finish(), stats))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::error::{ReadError, Stl2ObjError};
    use crate::math::squared_distance;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn weld(triangles: &[Triangle]) -> IndexedMesh {
        let (mesh, _) = WeldSoup::new(WeldParams::default())
            .execute(triangles.iter().copied().map(Ok::<Triangle, ReadError>))
            .unwrap();
        mesh
    }

    #[test]
    fn degenerate_triangle_collapses_to_one_vertex() {
        let origin = p(0.0, 0.0, 0.0);
        let mesh = weld(&[Triangle::new(origin, origin, origin)]);
        assert_eq!(mesh.vertices, vec![origin]);
        assert_eq!(mesh.faces, vec![[0, 0, 0]]);
    }

    #[test]
    fn shared_edge_reuses_vertices() {
        let mesh = weld(&[
            Triangle::new(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)),
            Triangle::new(p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(1.0, 1.0, 0.0)),
        ]);
        assert_eq!(mesh.vertex_count(), 4);
        let flat: Vec<u32> = mesh.corner_indices().collect();
        assert_eq!(flat, vec![0, 1, 2, 1, 2, 3]);
    }

    #[test]
    fn corner_within_tolerance_merges() {
        let mut welder = VertexWelder::new(WeldParams::default());
        assert_eq!(welder.push_corner(p(0.0, 0.0, 0.0)).unwrap(), 0);
        assert_eq!(welder.push_corner(p(1e-5, 0.0, 0.0)).unwrap(), 0);
        assert_eq!(welder.mesh().vertex_count(), 1);
    }

    #[test]
    fn corner_beyond_tolerance_is_new() {
        let mut welder = VertexWelder::new(WeldParams::default());
        assert_eq!(welder.push_corner(p(0.0, 0.0, 0.0)).unwrap(), 0);
        assert_eq!(welder.push_corner(p(1e-3, 0.0, 0.0)).unwrap(), 1);
        assert_eq!(welder.mesh().vertex_count(), 2);
    }

    #[test]
    fn empty_soup_gives_empty_mesh() {
        let (mesh, stats) = WeldSoup::new(WeldParams::default())
            .execute(std::iter::empty::<std::result::Result<Triangle, ReadError>>())
            .unwrap();
        assert!(mesh.vertices.is_empty());
        assert!(mesh.faces.is_empty());
        assert_eq!(stats, WeldStats::default());
    }

    #[test]
    fn first_seen_corner_defines_vertex() {
        let mut welder = VertexWelder::new(WeldParams::default());
        welder.push_corner(p(1.0, 1.0, 1.0)).unwrap();
        welder.push_corner(p(1.0 + 5e-5, 1.0, 1.0)).unwrap();
        assert_eq!(welder.mesh().vertices, vec![p(1.0, 1.0, 1.0)]);
    }

    #[test]
    fn custom_tolerance_is_honoured() {
        let params = WeldParams {
            tolerance_squared: 0.01,
        };
        let mut welder = VertexWelder::new(params);
        welder.push_corner(p(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(welder.push_corner(p(0.05, 0.0, 0.0)).unwrap(), 0);
        assert_eq!(welder.push_corner(p(0.2, 0.0, 0.0)).unwrap(), 1);
    }

    #[test]
    fn tree_and_mesh_stay_in_lockstep() {
        let mut welder = VertexWelder::new(WeldParams::default());
        let corners = [
            p(0.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(0.0, 0.0, 1e-6),
            p(0.0, 3.0, 0.0),
            p(2.0, 1e-7, 0.0),
            p(-1.0, -1.0, -1.0),
        ];
        for corner in corners {
            let index = welder.push_corner(corner).unwrap();
            assert!((index as usize) < welder.mesh().vertex_count());
            assert_eq!(welder.tree().len(), welder.mesh().vertex_count());
            for (i, v) in welder.mesh().vertices.iter().enumerate() {
                assert_eq!(welder.tree().point_at(i).unwrap(), v);
            }
        }
        assert_eq!(welder.mesh().vertex_count(), 4);
    }

    #[test]
    fn kept_vertices_are_pairwise_distinct() {
        let mut welder = VertexWelder::new(WeldParams::default());
        for i in 0..10 {
            for j in 0..10 {
                let x = f64::from(i) * 0.5;
                let y = f64::from(j) * 0.5;
                welder
                    .push_triangle(&Triangle::new(
                        p(x, y, 0.0),
                        p(x + 0.5, y, 0.0),
                        p(x, y + 0.5 + 1e-6, 0.0),
                    ))
                    .unwrap();
            }
        }
        let vertices = &welder.mesh().vertices;
        for (i, a) in vertices.iter().enumerate() {
            for b in &vertices[i + 1..] {
                assert!(squared_distance(a, b) > MERGE_TOLERANCE_SQUARED);
            }
        }
        assert_eq!(welder.stats().triangles, 100);
        assert_eq!(welder.stats().corners, 300);
    }

    #[test]
    fn distinct_points_in_any_order_keep_their_count() {
        let points: Vec<Point3> = (0..27)
            .map(|i| p(f64::from(i % 3), f64::from((i / 3) % 3), f64::from(i / 9)))
            .collect();

        let mut forward = VertexWelder::new(WeldParams::default());
        for q in &points {
            forward.push_corner(*q).unwrap();
        }
        let mut backward = VertexWelder::new(WeldParams::default());
        for q in points.iter().rev() {
            backward.push_corner(*q).unwrap();
        }

        assert_eq!(forward.mesh().vertex_count(), points.len());
        assert_eq!(backward.mesh().vertex_count(), points.len());
        for q in &points {
            let nearest = backward.tree().find_nearest(q).unwrap();
            assert_eq!(nearest.squared_distance, 0.0);
            assert_eq!(backward.tree().point_at(nearest.index).unwrap(), q);
        }
    }

    #[test]
    fn read_error_aborts_weld() {
        let origin = p(0.0, 0.0, 0.0);
        let source = vec![
            Ok(Triangle::new(origin, origin, origin)),
            Err(ReadError::Truncated {
                expected: 3,
                got: 1,
            }),
            Ok(Triangle::new(origin, origin, origin)),
        ];
        let err = WeldSoup::new(WeldParams::default())
            .execute(source.into_iter())
            .unwrap_err();
        assert!(matches!(
            err,
            Stl2ObjError::Read(ReadError::Truncated { expected: 3, got: 1 })
        ));
    }
}
