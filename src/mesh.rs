use std::fs;
use std::mem;
use std::path::Path;
use std::str::SplitWhitespace;

use bytemuck::{Pod, Zeroable};
use gl::types::*;
use log::{error, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: `{pool}` index {index} is out of range (pool holds {len})")]
    OutOfRangeReference {
        line: usize,
        pool: &'static str,
        index: usize,
        len: usize,
    },

    #[error("line {line}: face has {corners} corners, only triangles are supported")]
    NonTriangleFace { line: usize, corners: usize },

    #[error("line {line}: malformed `{tag}` record")]
    Malformed { line: usize, tag: String },

    #[error("no vertices produced (empty file or unsupported format)")]
    EmptyMesh,
}

/// One corner of a triangle, laid out exactly as the vertex shader expects
/// it: position at location 0, normal at 1, texture coordinate at 2.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// CPU-side result of parsing an OBJ source. Vertices are in face-traversal
/// order, duplicated per corner; there is no index buffer.
#[derive(Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub has_normals: bool,
}

impl MeshData {
    /// Parses an OBJ-subset source text.
    ///
    /// Recognized records are `v`, `vn`, `vt` and `f`; everything else
    /// (comments, groups, materials, smoothing) is skipped. Face corners may
    /// use any of the four reference shapes `p`, `p/t`, `p//n` and `p/t/n`,
    /// with 1-based indices into the attribute pools in their original file
    /// order. An index of 0 in an optional slot means the attribute is
    /// absent and the corresponding vertex field stays zeroed.
    pub fn parse(source: &str) -> Result<Self, MeshError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();

        let mut vertices = Vec::new();
        let mut has_normals = false;

        for (index, text) in source.lines().enumerate() {
            let line = index + 1;
            let mut fields = text.split_whitespace();
            match fields.next() {
                Some("v") => positions.push(read_floats(&mut fields, line, "v")?),
                Some("vn") => normals.push(read_floats(&mut fields, line, "vn")?),
                Some("vt") => tex_coords.push(read_floats(&mut fields, line, "vt")?),
                Some("f") => {
                    let corners: Vec<&str> = fields.collect();
                    if corners.len() != 3 {
                        return Err(MeshError::NonTriangleFace {
                            line,
                            corners: corners.len(),
                        });
                    }
                    for corner in corners {
                        let (vertex, corner_has_normal) =
                            resolve_corner(corner, &positions, &tex_coords, &normals, line)?;
                        has_normals |= corner_has_normal;
                        vertices.push(vertex);
                    }
                }
                _ => {}
            }
        }

        if vertices.is_empty() {
            return Err(MeshError::EmptyMesh);
        }

        Ok(Self {
            vertices,
            has_normals,
        })
    }
}

fn read_floats<const N: usize>(
    fields: &mut SplitWhitespace<'_>,
    line: usize,
    tag: &str,
) -> Result<[f32; N], MeshError> {
    let mut out = [0.0; N];
    for slot in &mut out {
        *slot = fields
            .next()
            .and_then(|field| field.parse().ok())
            .ok_or_else(|| MeshError::Malformed {
                line,
                tag: tag.to_string(),
            })?;
    }
    Ok(out)
}

/// Decodes one `/`-separated corner reference into a vertex, returning
/// whether the corner supplied a normal.
///
/// The four grammar shapes collapse into "position index, then optional
/// texture and normal indices": a missing or empty slot reads as 0, and 0 in
/// an optional slot is never dereferenced. The position slot is mandatory,
/// so 0 there is out of range like any other bad index.
fn resolve_corner(
    corner: &str,
    positions: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    normals: &[[f32; 3]],
    line: usize,
) -> Result<(Vertex, bool), MeshError> {
    let slots: Vec<&str> = corner.split('/').collect();
    if slots.len() > 3 {
        return Err(MeshError::Malformed {
            line,
            tag: corner.to_string(),
        });
    }

    let p = parse_index(slots[0], line, corner)?;
    let t = match slots.get(1) {
        Some(slot) => parse_index(slot, line, corner)?,
        None => 0,
    };
    let n = match slots.get(2) {
        Some(slot) => parse_index(slot, line, corner)?,
        None => 0,
    };

    let vertex = Vertex {
        position: *lookup(positions, p, "v", line)?,
        normal: if n > 0 {
            *lookup(normals, n, "vn", line)?
        } else {
            [0.0; 3]
        },
        tex_coord: if t > 0 {
            *lookup(tex_coords, t, "vt", line)?
        } else {
            [0.0; 2]
        },
    };
    Ok((vertex, n > 0))
}

fn parse_index(slot: &str, line: usize, corner: &str) -> Result<usize, MeshError> {
    if slot.is_empty() {
        return Ok(0);
    }
    slot.parse().map_err(|_| MeshError::Malformed {
        line,
        tag: corner.to_string(),
    })
}

/// 1-based pool lookup. Index 0 and anything past the end of the pool land
/// here as `OutOfRangeReference` instead of reaching the slice unchecked.
fn lookup<'a, T>(
    pool: &'a [T],
    index: usize,
    pool_tag: &'static str,
    line: usize,
) -> Result<&'a T, MeshError> {
    index
        .checked_sub(1)
        .and_then(|slot| pool.get(slot))
        .ok_or(MeshError::OutOfRangeReference {
            line,
            pool: pool_tag,
            index,
            len: pool.len(),
        })
}

struct GpuMesh {
    vao: GLuint,
    vbo: GLuint,
}

impl GpuMesh {
    /// Uploads the vertex stream into a fresh VAO/VBO pair. Must run on a
    /// thread with a current GL context.
    fn upload(vertices: &[Vertex]) -> Self {
        let mut vao = 0;
        let mut vbo = 0;
        let stride = mem::size_of::<Vertex>() as GLsizei;

        unsafe {
            gl::GenVertexArrays(1, &mut vao);
            gl::GenBuffers(1, &mut vbo);

            gl::BindVertexArray(vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, vbo);
            gl::BufferData(
                gl::ARRAY_BUFFER,
                mem::size_of_val(vertices) as GLsizeiptr,
                bytemuck::cast_slice::<Vertex, u8>(vertices).as_ptr() as *const _,
                gl::STATIC_DRAW,
            );

            gl::EnableVertexAttribArray(0);
            gl::VertexAttribPointer(0, 3, gl::FLOAT, gl::FALSE, stride, std::ptr::null());

            gl::EnableVertexAttribArray(1);
            gl::VertexAttribPointer(
                1,
                3,
                gl::FLOAT,
                gl::FALSE,
                stride,
                (3 * mem::size_of::<f32>()) as *const _,
            );

            gl::EnableVertexAttribArray(2);
            gl::VertexAttribPointer(
                2,
                2,
                gl::FLOAT,
                gl::FALSE,
                stride,
                (6 * mem::size_of::<f32>()) as *const _,
            );

            gl::BindVertexArray(0);
        }

        Self { vao, vbo }
    }
}

impl Drop for GpuMesh {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteBuffers(1, &self.vbo);
            gl::DeleteVertexArrays(1, &self.vao);
        }
    }
}

/// A renderable mesh. Holds the parsed vertex stream plus the GPU buffers
/// backing it; a failed load leaves the mesh without buffers, and drawing a
/// buffer-less mesh is a no-op.
pub struct Mesh {
    data: MeshData,
    gpu: Option<GpuMesh>,
}

impl Mesh {
    /// Reads, parses and uploads a model file. Never panics: any failure is
    /// logged and produces a non-drawable mesh.
    pub fn load(path: &Path) -> Self {
        let parsed = fs::read_to_string(path)
            .map_err(|source| MeshError::Io {
                path: path.display().to_string(),
                source,
            })
            .and_then(|text| MeshData::parse(&text));

        match parsed {
            Ok(data) => {
                info!(
                    "loaded {}: {} vertices, normals: {}",
                    path.display(),
                    data.vertices.len(),
                    data.has_normals
                );
                let gpu = GpuMesh::upload(&data.vertices);
                Self {
                    data,
                    gpu: Some(gpu),
                }
            }
            Err(err) => {
                error!("failed to load mesh {}: {}", path.display(), err);
                Self {
                    data: MeshData::default(),
                    gpu: None,
                }
            }
        }
    }

    pub fn is_drawable(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn has_normals(&self) -> bool {
        self.data.has_normals
    }

    pub fn vertex_count(&self) -> usize {
        self.data.vertices.len()
    }

    /// Issues one triangle-list draw over the full vertex stream.
    pub fn draw(&self) {
        if let Some(gpu) = &self.gpu {
            unsafe {
                gl::BindVertexArray(gpu.vao);
                gl::DrawArrays(gl::TRIANGLES, 0, self.data.vertices.len() as GLsizei);
                gl::BindVertexArray(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_only_face() {
        let data = MeshData::parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3").unwrap();
        assert_eq!(data.vertices.len(), 3);
        assert_eq!(data.vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(data.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(data.vertices[2].position, [0.0, 1.0, 0.0]);
        for vertex in &data.vertices {
            assert_eq!(vertex.normal, [0.0; 3]);
            assert_eq!(vertex.tex_coord, [0.0; 2]);
        }
        assert!(!data.has_normals);
    }

    #[test]
    fn position_normal_face() {
        let data =
            MeshData::parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1").unwrap();
        assert_eq!(data.vertices.len(), 3);
        for vertex in &data.vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
            assert_eq!(vertex.tex_coord, [0.0; 2]);
        }
        assert!(data.has_normals);
    }

    #[test]
    fn position_texcoord_face() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3";
        let data = MeshData::parse(source).unwrap();
        assert_eq!(data.vertices[1].tex_coord, [1.0, 0.0]);
        assert_eq!(data.vertices[2].tex_coord, [0.0, 1.0]);
        assert_eq!(data.vertices[1].normal, [0.0; 3]);
        assert!(!data.has_normals);
    }

    #[test]
    fn full_reference_face() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0.5 0.5
vn 0 1 0
f 1/1/1 2/1/1 3/1/1";
        let data = MeshData::parse(source).unwrap();
        assert_eq!(data.vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(data.vertices[2].position, [0.0, 1.0, 0.0]);
        for vertex in &data.vertices {
            assert_eq!(vertex.tex_coord, [0.5, 0.5]);
            assert_eq!(vertex.normal, [0.0, 1.0, 0.0]);
        }
        assert!(data.has_normals);
    }

    #[test]
    fn zero_optional_index_means_absent() {
        // Index 0 in the texture or normal slot must not be dereferenced.
        let data = MeshData::parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/0/0 2/0/0 3/0/0").unwrap();
        for vertex in &data.vertices {
            assert_eq!(vertex.normal, [0.0; 3]);
            assert_eq!(vertex.tex_coord, [0.0; 2]);
        }
        assert!(!data.has_normals);
    }

    #[test]
    fn indices_are_one_based() {
        let data = MeshData::parse("v 9 9 9\nv 0 0 0\nv 1 1 1\nf 1 2 3").unwrap();
        assert_eq!(data.vertices[0].position, [9.0, 9.0, 9.0]);
    }

    #[test]
    fn pools_index_by_file_order_not_output_order() {
        // Face corners reference pool slots, which keep their original file
        // positions even though the output stream is in traversal order.
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 3 1 2";
        let data = MeshData::parse(source).unwrap();
        assert_eq!(data.vertices[0].position, [0.0, 1.0, 0.0]);
        assert_eq!(data.vertices[1].position, [0.0, 0.0, 0.0]);
        assert_eq!(data.vertices[2].position, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn out_of_range_position_index() {
        let err = MeshData::parse("v 0 0 0\nf 1 2 3").unwrap_err();
        assert!(matches!(
            err,
            MeshError::OutOfRangeReference { pool: "v", index: 2, .. }
        ));
    }

    #[test]
    fn out_of_range_normal_index() {
        let err = MeshData::parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//2 2//2 3//2")
            .unwrap_err();
        assert!(matches!(
            err,
            MeshError::OutOfRangeReference { pool: "vn", index: 2, len: 1, .. }
        ));
    }

    #[test]
    fn zero_position_index_is_out_of_range() {
        let err = MeshData::parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2").unwrap_err();
        assert!(matches!(
            err,
            MeshError::OutOfRangeReference { pool: "v", index: 0, .. }
        ));
    }

    #[test]
    fn empty_source_is_empty_mesh() {
        assert!(matches!(MeshData::parse("").unwrap_err(), MeshError::EmptyMesh));
    }

    #[test]
    fn attributes_without_faces_is_empty_mesh() {
        let err = MeshData::parse("v 0 0 0\nvn 0 0 1\nvt 0 0").unwrap_err();
        assert!(matches!(err, MeshError::EmptyMesh));
    }

    #[test]
    fn unrecognized_tags_are_ignored() {
        let source = "\
# teapot fragment
mtllib scene.mtl
o body
v 0 0 0
v 1 0 0
v 0 1 0
s off
usemtl porcelain
f 1 2 3";
        let data = MeshData::parse(source).unwrap();
        assert_eq!(data.vertices.len(), 3);
    }

    #[test]
    fn quad_face_is_rejected() {
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4";
        let err = MeshData::parse(source).unwrap_err();
        assert!(matches!(
            err,
            MeshError::NonTriangleFace { corners: 4, .. }
        ));
    }

    #[test]
    fn malformed_position_record() {
        let err = MeshData::parse("v 0 zero 0\nf 1 1 1").unwrap_err();
        assert!(matches!(err, MeshError::Malformed { line: 1, .. }));
    }

    #[test]
    fn malformed_corner_reference() {
        let err = MeshData::parse("v 0 0 0\nf 1/x 1 1").unwrap_err();
        assert!(matches!(err, MeshError::Malformed { line: 2, .. }));
    }

    #[test]
    fn mixed_corner_shapes_in_one_mesh() {
        // A mesh may mix corners with and without normals; has_normals is
        // true as soon as any corner supplies one.
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
f 1 2 3
f 1//1 2//1 3//1";
        let data = MeshData::parse(source).unwrap();
        assert_eq!(data.vertices.len(), 6);
        assert_eq!(data.vertices[0].normal, [0.0; 3]);
        assert_eq!(data.vertices[3].normal, [0.0, 0.0, 1.0]);
        assert!(data.has_normals);
    }

    #[test]
    fn negative_floats_parse() {
        let data = MeshData::parse("v -1.5 2.25 -0.125\nv 0 0 0\nv 1 1 1\nf 1 2 3").unwrap();
        assert_eq!(data.vertices[0].position, [-1.5, 2.25, -0.125]);
    }
}
