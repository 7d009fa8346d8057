use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::WriteError;
use crate::mesh::IndexedMesh;

use super::IndexedMeshSink;

/// Writes an indexed mesh as Wavefront OBJ.
///
/// Vertices are written once as `v x y z` lines and faces as `f a b c`
/// lines with OBJ's 1-based indices.
#[derive(Debug)]
pub struct ObjWriter<W: Write> {
    writer: W,
}

impl<W: Write> ObjWriter<W> {
    /// Creates a writer emitting to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> IndexedMeshSink for ObjWriter<W> {
    fn write_mesh(&mut self, mesh: &IndexedMesh) -> Result<(), WriteError> {
        check_indices(mesh)?;

        let w = &mut self.writer;
        writeln!(w, "# Vertices: {}", mesh.vertex_count())?;
        writeln!(w, "# Faces: {}", mesh.face_count())?;

        for v in &mesh.vertices {
            writeln!(w, "v {} {} {}", v.x, v.y, v.z)?;
        }
        for &[a, b, c] in &mesh.faces {
            writeln!(
                w,
                "f {} {} {}",
                u64::from(a) + 1,
                u64::from(b) + 1,
                u64::from(c) + 1
            )?;
        }

        w.flush()?;
        Ok(())
    }
}

/// Writes `mesh` to a new OBJ file at `path`.
///
/// The mesh is written to a hidden sibling file first and renamed over `path`
/// once complete, so a failed write never leaves a truncated OBJ behind.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written, or if a face
/// references a vertex that does not exist.
pub fn save_obj<P: AsRef<Path>>(mesh: &IndexedMesh, path: P) -> Result<(), WriteError> {
    check_indices(mesh)?;
    let path = path.as_ref();
    let staging = staging_path(path);

    let written = File::create(&staging)
        .map_err(WriteError::from)
        .and_then(|file| ObjWriter::new(BufWriter::new(file)).write_mesh(mesh))
        .and_then(|()| fs::rename(&staging, path).map_err(WriteError::from));
    if written.is_err() {
        // The staging file may not exist if creation itself failed.
        let _ = fs::remove_file(&staging);
    }
    written
}

/// `dir/.name.<pid>.tmp` next to `path`, on the same filesystem for the rename.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| OsStr::new("mesh.obj")));
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

fn check_indices(mesh: &IndexedMesh) -> Result<(), WriteError> {
    let vertex_count = mesh.vertex_count();
    for (face, indices) in mesh.faces.iter().enumerate() {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(WriteError::IndexOutOfRange {
                face,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::math::Point3;

    fn render(mesh: &IndexedMesh) -> String {
        let mut writer = ObjWriter::new(Vec::new());
        writer.write_mesh(mesh).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn writes_one_based_faces() {
        let mesh = IndexedMesh {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.5, -2.0),
            ],
            faces: vec![[0, 1, 2]],
        };
        let text = render(&mesh);
        assert_eq!(
            text,
            "# Vertices: 3\n# Faces: 1\nv 0 0 0\nv 1 0 0\nv 0 1.5 -2\nf 1 2 3\n"
        );
    }

    #[test]
    fn empty_mesh_writes_only_header() {
        assert_eq!(render(&IndexedMesh::new()), "# Vertices: 0\n# Faces: 0\n");
    }

    #[test]
    fn rejects_dangling_index() {
        let mesh = IndexedMesh {
            vertices: vec![Point3::origin()],
            faces: vec![[0, 0, 0], [0, 1, 0]],
        };
        let mut writer = ObjWriter::new(Vec::new());
        let err = writer.write_mesh(&mesh).unwrap_err();
        assert!(matches!(
            err,
            WriteError::IndexOutOfRange {
                face: 1,
                index: 1,
                vertex_count: 1
            }
        ));
        assert!(writer.into_inner().is_empty());
    }

    fn square() -> IndexedMesh {
        IndexedMesh {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            faces: vec![[0, 1, 2], [1, 2, 3]],
        }
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn save_replaces_existing_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.obj");
        fs::write(&path, "stale contents that are longer than nothing").unwrap();

        let mesh = square();
        save_obj(&mesh, &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), render(&mesh));
        assert_eq!(entries(dir.path()), vec![path]);
    }

    #[test]
    fn failed_save_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the final rename fail after the body is written.
        let path = dir.path().join("blocked.obj");
        fs::create_dir(&path).unwrap();

        let err = save_obj(&square(), &path).unwrap_err();
        assert!(matches!(err, WriteError::Io(_)));
        assert!(path.is_dir());
        assert_eq!(entries(dir.path()), vec![path]);
    }

    #[test]
    fn save_rejects_dangling_index_before_creating_anything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.obj");
        let mesh = IndexedMesh {
            vertices: vec![Point3::origin()],
            faces: vec![[0, 0, 1]],
        };

        assert!(matches!(
            save_obj(&mesh, &path),
            Err(WriteError::IndexOutOfRange { .. })
        ));
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn staging_file_is_a_hidden_sibling() {
        let staging = staging_path(Path::new("meshes/part.obj"));
        assert_eq!(staging.parent(), Some(Path::new("meshes")));
        let name = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".part.obj."));
        assert!(name.ends_with(".tmp"));
    }

    #[test]
    fn coordinates_round_trip_through_text() {
        let v = Point3::new(0.1, 1e-7, 123_456.789);
        let mesh = IndexedMesh {
            vertices: vec![v],
            faces: vec![],
        };
        let text = render(&mesh);
        let line = text.lines().find(|l| l.starts_with("v ")).unwrap();
        let coords: Vec<f64> = line[2..]
            .split(' ')
            .map(|t| t.parse().unwrap())
            .collect();
        assert_eq!(coords, vec![v.x, v.y, v.z]);
    }
}
