use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for STL to OBJ conversion.
#[derive(Debug, Error)]
pub enum Stl2ObjError {
    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Errors raised by the spatial index.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("point index {index} is out of range for an index holding {len} points")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Errors raised while building an indexed mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("vertex count {count} exceeds the u32 index range")]
    TooManyVertices { count: usize },
}

/// Errors raised while reading a triangle soup.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("STL data truncated: expected {expected} triangles, got {got}")]
    Truncated { expected: u32, got: u32 },

    #[error("STL header truncated: expected {expected} bytes, got {got}")]
    ShortHeader { expected: usize, got: usize },

    #[error("malformed STL at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("invalid number at line {line}: {source}")]
    ParseFloat {
        line: usize,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }
}

/// Errors raised while writing an indexed mesh.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("face {face} references vertex {index}, but only {vertex_count} vertices exist")]
    IndexOutOfRange {
        face: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for results using [`Stl2ObjError`].
pub type Result<T> = std::result::Result<T, Stl2ObjError>;
