mod weld;

pub use weld::{VertexWelder, WeldParams, WeldSoup, WeldStats};

use crate::math::{Point3, Vector3};

/// One triangle of a triangle soup, as produced by a soup source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// Facet normal as stored in the source. Carried along but never used.
    pub normal: Vector3,
    /// Corner positions in source order.
    pub corners: [Point3; 3],
}

impl Triangle {
    /// Creates a triangle with a zero normal.
    #[must_use]
    pub fn new(a: Point3, b: Point3, c: Point3) -> Self {
        Self {
            normal: Vector3::zeros(),
            corners: [a, b, c],
        }
    }

    /// Creates a triangle carrying the given facet normal.
    #[must_use]
    pub fn with_normal(normal: Vector3, corners: [Point3; 3]) -> Self {
        Self { normal, corners }
    }
}

/// A triangle mesh with shared vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedMesh {
    /// Vertex positions, each distinct beyond the weld tolerance.
    pub vertices: Vec<Point3>,
    /// Triangle indices into `vertices` (each triple defines a triangle).
    pub faces: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// Creates an empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty mesh with reserved storage.
    #[must_use]
    pub fn with_capacity(vertices: usize, faces: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            faces: Vec::with_capacity(faces),
        }
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns `true` if the mesh has no faces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Flattened face indices, three per triangle, in face order.
    pub fn corner_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.faces.iter().flatten().copied()
    }

    /// Axis-aligned bounds of the vertices, or `None` for an empty mesh.
    #[must_use]
    pub fn bounds(&self) -> Option<(Point3, Point3)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().skip(1).fold((first, first), |(min, max), v| {
            (min.inf(v), max.sup(v))
        }))
    }
}
