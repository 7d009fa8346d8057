//! Mesh file formats at either end of the conversion.
//!
//! A [`SoupSource`] yields raw triangles one at a time; an
//! [`IndexedMeshSink`] receives the finished shared-vertex mesh.

mod obj;
mod stl;

pub use obj::{save_obj, ObjWriter};
pub use stl::{StlFormat, StlReader};

use crate::error::{ReadError, WriteError};
use crate::mesh::{IndexedMesh, Triangle};

/// A lazy sequence of triangle-soup triangles.
///
/// The sequence ends at end of input. A malformed input yields a single
/// `Err` after which the source is exhausted.
pub trait SoupSource: Iterator<Item = Result<Triangle, ReadError>> {}

impl<T> SoupSource for T where T: Iterator<Item = Result<Triangle, ReadError>> {}

/// Consumer of a finished indexed mesh.
pub trait IndexedMeshSink {
    /// Serializes `mesh`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh references missing vertices or the
    /// underlying writer fails.
    fn write_mesh(&mut self, mesh: &IndexedMesh) -> Result<(), WriteError>;
}
