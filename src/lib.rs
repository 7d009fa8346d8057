//! Conversion of triangle-soup meshes (STL) into indexed meshes (OBJ).
//!
//! Every triangle corner is matched against the vertices seen so far with an
//! incremental k-d tree; corners within the weld tolerance of an existing
//! vertex reuse its index instead of adding a duplicate.

pub mod convert;
pub mod error;
pub mod io;
pub mod math;
pub mod mesh;
pub mod spatial;

pub use convert::{ConversionReport, ConvertStlToObj};
pub use error::{Result, Stl2ObjError};
