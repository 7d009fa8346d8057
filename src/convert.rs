use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::Result;
use crate::io::{save_obj, StlReader};
use crate::math::Point3;
use crate::mesh::{WeldParams, WeldSoup};

/// Summary of a finished conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionReport {
    /// Triangles read from the input.
    pub triangles: usize,
    /// Corners read from the input, before merging.
    pub corners: usize,
    /// Vertices written to the output, after merging.
    pub vertices: usize,
    /// Axis-aligned `(min, max)` corners of the output, `None` when empty.
    pub bounds: Option<(Point3, Point3)>,
    /// Wall-clock time spent reading and welding.
    pub elapsed: Duration,
}

/// Converts an STL file into an OBJ file with shared vertices.
pub struct ConvertStlToObj {
    input: PathBuf,
    output: PathBuf,
    params: WeldParams,
}

impl ConvertStlToObj {
    /// Creates a new `ConvertStlToObj` operation.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, params: WeldParams) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            params,
        }
    }

    /// Input path.
    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Output path.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Executes the conversion.
    ///
    /// The whole input is read and welded before the output is created, so a
    /// read error leaves no output file behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read or parsed, or the output
    /// cannot be written.
    pub fn execute(&self) -> Result<ConversionReport> {
        let start = Instant::now();

        let reader = StlReader::open(&self.input)?;
        debug!(
            path = %self.input.display(),
            format = ?reader.format(),
            triangles = ?reader.triangle_count_hint(),
            "reading STL"
        );

        let (mesh, stats) = WeldSoup::new(self.params).execute(reader)?;
        let elapsed = start.elapsed();

        info!(
            "Points reduced from {} to {} after merging",
            stats.corners, stats.vertices
        );
        info!(
            "Finished reading STL in {:.3} seconds",
            elapsed.as_secs_f64()
        );

        let bounds = mesh.bounds();
        if let Some((min, max)) = bounds {
            debug!(
                min = ?[min.x, min.y, min.z],
                max = ?[max.x, max.y, max.z],
                "mesh bounds"
            );
        }

        save_obj(&mesh, &self.output)?;
        info!(path = %self.output.display(), faces = mesh.face_count(), "wrote OBJ");

        Ok(ConversionReport {
            triangles: stats.triangles,
            corners: stats.corners,
            vertices: stats.vertices,
            bounds,
            elapsed,
        })
    }
}

/// Default output path for `input`: the same path with an `.obj` extension.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("obj")
}
