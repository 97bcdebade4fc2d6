/// OFF mesh file parser
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nalgebra::Point3;
use nom::{
    branch::alt,
    bytes::complete::take_till1,
    character::complete::{multispace0, multispace1, u32 as decimal},
    combinator::{eof, peek},
    number::complete::float,
    sequence::terminated,
    IResult,
};

use crate::mesh::{Mesh, MeshError, NormalWeighting};

/// Format tag expected on the first line of an OFF file.
pub const OFF_TAG: &str = "OFF";

#[derive(thiserror::Error, Debug)]
pub enum OffError {
    #[error("Cannot read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unexpected end of file on line {line}, expected {expected}")]
    UnexpectedEof { expected: &'static str, line: usize },
    #[error("Invalid token {found:?} on line {line}, expected {expected}")]
    InvalidToken {
        expected: &'static str,
        found: String,
        line: usize,
    },
    #[error("Non-finite coordinate on line {line}")]
    NonFiniteCoordinate { line: usize },
    #[error("Face {face} has {size} vertices, at least 3 are required")]
    DegenerateFace { face: usize, size: u32 },
    #[error("Face {face} references vertex {index}, but the file declares {vertex_count} vertices")]
    IndexOutOfRange {
        face: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("Invalid mesh: {0}")]
    Mesh(#[from] MeshError),
}

/// Geometry read from an OFF document, before any attribute derivation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffData {
    pub format: String,
    pub positions: Vec<Point3<f32>>,
    /// Faces with more than three corners are fan-triangulated.
    pub triangles: Vec<[u32; 3]>,
    /// Number of face records in the file, before triangulation.
    pub face_count: usize,
}

impl OffData {
    /// Install the geometry into `mesh` and derive normals (uniform
    /// weighting) and planar texture coordinates.
    pub fn into_mesh(self, mesh: &mut Mesh) -> Result<(), OffError> {
        mesh.set_geometry(self.positions, self.triangles)?;
        mesh.derive_attributes(NormalWeighting::Uniform);
        Ok(())
    }
}

/// Load an OFF file into `mesh`.
///
/// The store is cleared first and stays empty if anything goes wrong.
pub fn load_off<P: AsRef<Path>>(path: P, mesh: &mut Mesh) -> Result<(), OffError> {
    let path = path.as_ref();
    log::info!("Start loading mesh <{}>", path.display());
    mesh.clear();

    let text = fs::read_to_string(path).map_err(|source| OffError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_off(&text)?.into_mesh(mesh)?;

    log::info!(
        "Mesh <{}> loaded: {} vertices, {} triangles",
        path.display(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(())
}

/// Read an OFF file into a fresh mesh.
pub fn read_off<P: AsRef<Path>>(path: P) -> Result<Mesh, OffError> {
    let mut mesh = Mesh::new();
    load_off(path, &mut mesh)?;
    Ok(mesh)
}

/// Parse an OFF document held in memory.
pub fn parse_off(input: &str) -> Result<OffData, OffError> {
    let mut tokens = Tokens::new(input);

    let format = tokens.next("format tag", take_till1(char::is_whitespace))?;
    if format != OFF_TAG {
        log::warn!("Unexpected format tag {:?}, reading as {}", format, OFF_TAG);
    }
    let vertex_count = tokens.next("vertex count", decimal)? as usize;
    let face_count = tokens.next("face count", decimal)? as usize;
    let _edge_count = tokens.next("edge count", decimal)?;
    log::debug!("OFF header: {} vertices, {} faces", vertex_count, face_count);

    let mut positions = Vec::with_capacity(vertex_count.min(1 << 20));
    for _ in 0..vertex_count {
        positions.push(tokens.point()?);
    }

    let mut triangles = Vec::with_capacity(face_count.min(1 << 20));
    let mut corners = Vec::with_capacity(3);
    for face in 0..face_count {
        let size = tokens.next("polygon size", decimal)?;
        if size < 3 {
            return Err(OffError::DegenerateFace { face, size });
        }

        corners.clear();
        for _ in 0..size {
            let index = tokens.next("vertex index", decimal)?;
            if index as usize >= vertex_count {
                return Err(OffError::IndexOutOfRange {
                    face,
                    index,
                    vertex_count,
                });
            }
            corners.push(index);
        }

        for k in 1..corners.len() - 1 {
            triangles.push([corners[0], corners[k], corners[k + 1]]);
        }
    }

    Ok(OffData {
        format: format.to_string(),
        positions,
        triangles,
        face_count,
    })
}

/// Whitespace-separated token stream that remembers where it is in the source,
/// so errors can point at a line.
struct Tokens<'a> {
    source: &'a str,
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            rest: source,
        }
    }

    fn line(&self) -> usize {
        let consumed = self.source.len() - self.rest.len();
        self.source[..consumed].matches('\n').count() + 1
    }

    fn skip_whitespace(&mut self) {
        let skipped: IResult<&str, &str> = multispace0(self.rest);
        if let Ok((rest, _)) = skipped {
            self.rest = rest;
        }
    }

    /// Run `parser` on the next token. The token must be consumed entirely.
    fn next<O, F>(&mut self, expected: &'static str, parser: F) -> Result<O, OffError>
    where
        F: FnMut(&'a str) -> IResult<&'a str, O>,
    {
        self.skip_whitespace();
        if self.rest.is_empty() {
            return Err(OffError::UnexpectedEof {
                expected,
                line: self.line(),
            });
        }

        match terminated(parser, peek(alt((multispace1, eof))))(self.rest) {
            Ok((rest, value)) => {
                self.rest = rest;
                Ok(value)
            }
            Err(_) => Err(OffError::InvalidToken {
                expected,
                found: self.rest.split_whitespace().next().unwrap_or_default().to_string(),
                line: self.line(),
            }),
        }
    }

    fn coordinate(&mut self) -> Result<f32, OffError> {
        let value = self.next("coordinate", float)?;
        if !value.is_finite() {
            return Err(OffError::NonFiniteCoordinate { line: self.line() });
        }
        Ok(value)
    }

    fn point(&mut self) -> Result<Point3<f32>, OffError> {
        let x = self.coordinate()?;
        let y = self.coordinate()?;
        let z = self.coordinate()?;
        Ok(Point3::new(x, y, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshState;

    const QUAD: &str = "OFF
4 2 0
0 0 0
1 0 0
1 1 0
0 1 0
3 0 1 2
3 0 2 3
";

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("offview-{}-{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_quad() {
        let data = parse_off(QUAD).unwrap();
        assert_eq!(data.format, "OFF");
        assert_eq!(data.positions.len(), 4);
        assert_eq!(data.triangles, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(data.face_count, 2);
        assert_eq!(data.positions[2], Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_load_quad_from_disk() {
        let path = temp_file("quad.off", QUAD);
        let mut mesh = Mesh::new();
        load_off(&path, &mut mesh).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.triangles().iter().flatten().all(|&i| i < 4));
        assert_eq!(mesh.normals().len(), 4);
        assert_eq!(mesh.tex_coords().len(), 4);
        assert_eq!(mesh.state(), MeshState::Derived);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut mesh = read_off_quad();
        let result = load_off("/definitely/not/here.off", &mut mesh);
        assert!(matches!(result, Err(OffError::Io { .. })));
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_non_utf8_file_reports_read_error() {
        let path = std::env::temp_dir().join(format!("offview-{}-latin1.off", std::process::id()));
        fs::write(&path, b"OFF\n1 0 0\n0 0 \xe9\n").unwrap();
        let mut mesh = read_off_quad();
        let result = load_off(&path, &mut mesh);
        fs::remove_file(&path).ok();

        let err = result.unwrap_err();
        assert!(matches!(err, OffError::Io { .. }));
        assert!(err.to_string().starts_with("Cannot read "));
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_malformed_file_leaves_store_empty() {
        let path = temp_file("broken.off", "OFF\n3 1 0\n0 0 0\n1 zero 0\n0 1 0\n3 0 1 2\n");
        let mut mesh = read_off_quad();
        let result = load_off(&path, &mut mesh);
        fs::remove_file(&path).ok();

        match result {
            Err(OffError::InvalidToken { found, line, .. }) => {
                assert_eq!(found, "zero");
                assert_eq!(line, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(mesh.is_empty());
        assert_eq!(mesh.state(), MeshState::Empty);
    }

    #[test]
    fn test_truncated_file() {
        let result = parse_off("OFF\n3 1 0\n0 0 0\n1 0 0\n");
        assert!(matches!(
            result,
            Err(OffError::UnexpectedEof {
                expected: "coordinate",
                ..
            })
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let result = parse_off("OFF 3 1 0  0 0 0  1 0 0  0 1 0  3 0 1 3");
        assert!(matches!(
            result,
            Err(OffError::IndexOutOfRange {
                face: 0,
                index: 3,
                vertex_count: 3
            })
        ));
    }

    #[test]
    fn test_fractional_index_is_rejected() {
        let result = parse_off("OFF 3 1 0  0 0 0  1 0 0  0 1 0  3 0 1.5 2");
        assert!(matches!(result, Err(OffError::InvalidToken { .. })));
    }

    #[test]
    fn test_polygons_are_fan_triangulated() {
        let data = parse_off("OFF\n5 1 0\n0 0 0\n1 0 0\n2 1 0\n1 2 0\n0 1 0\n5 0 1 2 3 4\n").unwrap();
        assert_eq!(data.face_count, 1);
        assert_eq!(data.triangles, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn test_degenerate_face() {
        let result = parse_off("OFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n2 0 1\n");
        assert!(matches!(
            result,
            Err(OffError::DegenerateFace { face: 0, size: 2 })
        ));
    }

    #[test]
    fn test_non_finite_coordinate() {
        let result = parse_off("OFF\n3 1 0\n0 0 0\ninf 0 0\n0 1 0\n3 0 1 2\n");
        assert!(matches!(
            result,
            Err(OffError::NonFiniteCoordinate { line: 4 })
        ));
    }

    #[test]
    fn test_scientific_notation_and_tabs() {
        let data = parse_off("OFF\t3 1 0\r\n1e-1 -2.5E2 .5\n0 0 0\n1 1 1\n3\t0 1 2").unwrap();
        assert_eq!(data.positions[0], Point3::new(0.1, -250.0, 0.5));
    }

    #[test]
    fn test_unknown_tag_is_accepted() {
        let data = parse_off("NOFF 3 1 0 0 0 0 1 0 0 0 1 0 3 0 1 2").unwrap();
        assert_eq!(data.format, "NOFF");
        assert_eq!(data.triangles.len(), 1);
    }

    fn read_off_quad() -> Mesh {
        let mut mesh = Mesh::new();
        parse_off(QUAD).unwrap().into_mesh(&mut mesh).unwrap();
        mesh
    }
}
