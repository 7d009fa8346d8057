//! Streaming STL reader for both binary and ASCII files.
//!
//! ```text
//! binary:  UINT8[80] header | UINT32 count | count × (REAL32[3] normal,
//!          REAL32[3] × 3 corners, UINT16 attribute)
//! ascii:   solid name
//!            facet normal ni nj nk
//!              outer loop
//!                vertex x y z   (× 3)
//!              endloop
//!            endfacet
//!          endsolid name
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::ReadError;
use crate::math::{Point3, Vector3};
use crate::mesh::Triangle;

/// Binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Header plus the triangle count.
const PREFIX_SIZE: usize = HEADER_SIZE + 4;

/// Size of one binary triangle record.
const TRIANGLE_SIZE: usize = 50;

/// Number of leading bytes inspected to tell ASCII from binary.
const SNIFF_SIZE: usize = 512;

/// Encoding of an STL file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StlFormat {
    Ascii,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AsciiState {
    Outside,
    InSolid,
    InFacet,
    InLoop,
    AfterLoop,
}

/// Reads triangles from an STL stream one at a time.
///
/// Implements [`SoupSource`](super::SoupSource): each item is one triangle,
/// and the first error ends the sequence.
#[derive(Debug)]
pub struct StlReader<R> {
    reader: R,
    format: StlFormat,
    declared: u32,
    read: u32,
    ascii_state: AsciiState,
    line: usize,
    line_buf: Vec<u8>,
    done: bool,
}

impl StlReader<BufReader<File>> {
    /// Opens the STL file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::FileNotFound`] if the file does not exist, or
    /// another [`ReadError`] if its header cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ReadError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ReadError::Io(e)
            }
        })?;
        let len = file.metadata()?.len();
        Self::with_len(BufReader::new(file), Some(len))
    }
}

impl<R: BufRead> StlReader<R> {
    /// Wraps a buffered reader positioned at the start of STL data.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary header is incomplete or the stream
    /// cannot be read.
    pub fn new(reader: R) -> Result<Self, ReadError> {
        Self::with_len(reader, None)
    }

    fn with_len(mut reader: R, len: Option<u64>) -> Result<Self, ReadError> {
        let head = reader.fill_buf()?;
        let format = detect_format(&head[..head.len().min(SNIFF_SIZE)], len);
        debug!(?format, "detected STL encoding");

        let mut this = Self {
            reader,
            format,
            declared: 0,
            read: 0,
            ascii_state: AsciiState::Outside,
            line: 0,
            line_buf: Vec::new(),
            done: false,
        };

        if format == StlFormat::Binary {
            let mut prefix = [0u8; PREFIX_SIZE];
            let got = read_full(&mut this.reader, &mut prefix)?;
            if got < PREFIX_SIZE {
                return Err(ReadError::ShortHeader {
                    expected: PREFIX_SIZE,
                    got,
                });
            }
            this.declared = declared_count(&prefix).unwrap_or(0);
            debug!(triangles = this.declared, "binary STL header read");
        }

        Ok(this)
    }

    /// Encoding detected when the reader was created.
    #[must_use]
    pub fn format(&self) -> StlFormat {
        self.format
    }

    /// Triangle count declared in a binary header; `None` for ASCII input.
    #[must_use]
    pub fn triangle_count_hint(&self) -> Option<u32> {
        match self.format {
            StlFormat::Binary => Some(self.declared),
            StlFormat::Ascii => None,
        }
    }

    fn next_binary(&mut self) -> Result<Option<Triangle>, ReadError> {
        if self.read == self.declared {
            if !self.reader.fill_buf()?.is_empty() {
                warn!(
                    triangles = self.declared,
                    "ignoring data after the declared triangle records"
                );
            }
            return Ok(None);
        }

        let mut record = [0u8; TRIANGLE_SIZE];
        let got = read_full(&mut self.reader, &mut record)?;
        let triangle = decode_triangle(&record[..got]).ok_or(ReadError::Truncated {
            expected: self.declared,
            got: self.read,
        })?;
        self.read += 1;
        Ok(Some(triangle))
    }

    fn next_ascii(&mut self) -> Result<Option<Triangle>, ReadError> {
        let mut normal = Vector3::zeros();
        let mut corners = [Point3::origin(); 3];
        let mut count = 0;

        loop {
            self.line_buf.clear();
            if self.reader.read_until(b'\n', &mut self.line_buf)? == 0 {
                return match self.ascii_state {
                    AsciiState::Outside => Ok(None),
                    AsciiState::InSolid => {
                        warn!(line = self.line, "ASCII STL ends without `endsolid`");
                        Ok(None)
                    }
                    _ => Err(ReadError::malformed(
                        self.line,
                        "unexpected end of file inside a facet",
                    )),
                };
            }
            self.line += 1;
            let line = self.line;

            // Solid names and comments may carry any encoding; keywords and numbers are ASCII.
            let text = String::from_utf8_lossy(&self.line_buf);
            let mut tokens = text.split_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };
            let keyword = keyword.to_ascii_lowercase();

            match (self.ascii_state, keyword.as_str()) {
                (AsciiState::Outside, "solid") => self.ascii_state = AsciiState::InSolid,
                (AsciiState::InSolid, "endsolid") => self.ascii_state = AsciiState::Outside,
                (AsciiState::InSolid, "facet") => {
                    match tokens.next() {
                        Some(word) if word.eq_ignore_ascii_case("normal") => {
                            let [x, y, z] = parse_triple(&mut tokens, line)?;
                            normal = Vector3::new(x, y, z);
                        }
                        Some(word) => {
                            return Err(ReadError::malformed(
                                line,
                                format!("expected `normal` after `facet`, found `{word}`"),
                            ));
                        }
                        None => normal = Vector3::zeros(),
                    }
                    self.ascii_state = AsciiState::InFacet;
                }
                (AsciiState::InFacet, "outer") => {
                    if !tokens.next().is_some_and(|w| w.eq_ignore_ascii_case("loop")) {
                        return Err(ReadError::malformed(line, "expected `outer loop`"));
                    }
                    self.ascii_state = AsciiState::InLoop;
                }
                (AsciiState::InLoop, "vertex") => {
                    if count == 3 {
                        return Err(ReadError::malformed(
                            line,
                            "facet has more than three vertices",
                        ));
                    }
                    let [x, y, z] = parse_triple(&mut tokens, line)?;
                    corners[count] = Point3::new(x, y, z);
                    count += 1;
                }
                (AsciiState::InLoop, "endloop") => {
                    if count != 3 {
                        return Err(ReadError::malformed(
                            line,
                            format!("facet has {count} vertices, expected 3"),
                        ));
                    }
                    self.ascii_state = AsciiState::AfterLoop;
                }
                (AsciiState::AfterLoop, "endfacet") => {
                    self.ascii_state = AsciiState::InSolid;
                    return Ok(Some(Triangle::with_normal(normal, corners)));
                }
                (_, other) => {
                    return Err(ReadError::malformed(
                        line,
                        format!("unexpected `{other}`"),
                    ));
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for StlReader<R> {
    type Item = Result<Triangle, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = match self.format {
            StlFormat::Binary => self.next_binary(),
            StlFormat::Ascii => self.next_ascii(),
        };

        match result {
            Ok(Some(triangle)) => Some(Ok(triangle)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.format {
            _ if self.done => (0, Some(0)),
            StlFormat::Binary => (0, usize::try_from(self.declared - self.read).ok()),
            StlFormat::Ascii => (0, None),
        }
    }
}

/// Decides the encoding from the leading bytes and, when known, the total length.
fn detect_format(head: &[u8], len: Option<u64>) -> StlFormat {
    if let (Some(len), Some(count)) = (len, declared_count(head)) {
        let expected = PREFIX_SIZE as u64 + u64::from(count) * TRIANGLE_SIZE as u64;
        if len == expected {
            return StlFormat::Binary;
        }
    }

    let text = head.trim_ascii_start();
    let starts_with_solid = text.len() >= 5 && text[..5].eq_ignore_ascii_case(b"solid");
    let textual = head
        .iter()
        .all(|b| !b.is_ascii_control() || b.is_ascii_whitespace());

    if starts_with_solid && textual {
        StlFormat::Ascii
    } else {
        StlFormat::Binary
    }
}

/// Triangle count stored after the binary header, if enough bytes are present.
fn declared_count(prefix: &[u8]) -> Option<u32> {
    let bytes = prefix.get(HEADER_SIZE..PREFIX_SIZE)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

/// Decodes one binary triangle record; `None` if `record` is too short.
fn decode_triangle(record: &[u8]) -> Option<Triangle> {
    if record.len() < TRIANGLE_SIZE {
        return None;
    }
    let normal = decode_vec3(record, 0)?;
    let a = decode_vec3(record, 12)?;
    let b = decode_vec3(record, 24)?;
    let c = decode_vec3(record, 36)?;
    Some(Triangle::with_normal(
        normal,
        [Point3::from(a), Point3::from(b), Point3::from(c)],
    ))
}

fn decode_vec3(record: &[u8], offset: usize) -> Option<Vector3> {
    Some(Vector3::new(
        decode_f32(record, offset)?,
        decode_f32(record, offset + 4)?,
        decode_f32(record, offset + 8)?,
    ))
}

fn decode_f32(record: &[u8], offset: usize) -> Option<f64> {
    let bytes = record.get(offset..offset + 4)?;
    Some(f64::from(f32::from_le_bytes(bytes.try_into().ok()?)))
}

fn parse_triple<'a, I>(tokens: &mut I, line: usize) -> Result<[f64; 3], ReadError>
where
    I: Iterator<Item = &'a str>,
{
    let mut values = [0.0; 3];
    for value in &mut values {
        let token = tokens
            .next()
            .ok_or_else(|| ReadError::malformed(line, "expected three coordinates"))?;
        *value = token
            .parse()
            .map_err(|source| ReadError::ParseFloat { line, source })?;
    }
    if tokens.next().is_some() {
        return Err(ReadError::malformed(line, "too many coordinates"));
    }
    Ok(values)
}

/// Reads until `buf` is full or the stream ends, returning the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
