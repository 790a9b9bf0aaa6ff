//! Minimal OBJ parser supporting positions, normals and texture coordinates.
//!
//! Faces must be triangles. Corners are expanded into flat attribute arrays
//! (no index buffer), so shared vertices are duplicated.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::{
    AssetError, AssetResult,
    mesh::VertexAttributes,
};

/// Loader switches.
#[derive(Clone, Debug, Default)]
pub struct ObjOptions {
    /// Negate V on every `vt` line (DDS textures are stored V-inverted).
    pub flip_v: bool,
    /// Directory `mtllib` references are resolved against.
    pub material_dir: Option<PathBuf>,
}

impl ObjOptions {
    pub fn flipped_v() -> Self {
        Self {
            flip_v: true,
            ..Default::default()
        }
    }
}

/// Load an OBJ mesh from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>, options: &ObjOptions) -> AssetResult<VertexAttributes> {
    let path = path.as_ref();
    log::info!("Loading mesh in OBJ format: {}", path.display());
    let file = File::open(path).map_err(|e| {
        log::error!("Could not open {}", path.display());
        AssetError::not_found(path, e)
    })?;
    load_obj_from_reader(BufReader::new(file), options)
}

/// Load an OBJ mesh from a [`BufRead`] implementation.
pub fn load_obj_from_reader<R: BufRead>(reader: R, options: &ObjOptions) -> AssetResult<VertexAttributes> {
    parse_obj(reader, options)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str, options: &ObjOptions) -> AssetResult<VertexAttributes> {
    parse_obj(io::Cursor::new(contents), options)
}

/// One face corner; indices are already 0-based and bounds-checked.
#[derive(Clone, Copy, Debug)]
struct Corner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
    line_no: usize,
}

fn parse_obj<R: BufRead>(reader: R, options: &ObjOptions) -> AssetResult<VertexAttributes> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();
    let mut corners: Vec<Corner> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AssetError::parse(line_no, format!("read failed: {e}")))?;
        // `#` starts a comment anywhere on the line.
        let content = line.split_once('#').map_or(line.as_str(), |(head, _)| head);
        let trimmed = content.trim();
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                positions.push([x, y, z]);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                let v = parse_f32(parts.next(), line_no, "v coordinate")?;
                let v = if options.flip_v { -v } else { v };
                texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                normals.push([nx, ny, nz]);
            }
            "f" => {
                let tokens: Vec<&str> = parts.collect();
                if tokens.len() != 3 {
                    log::error!("Face on line {} is not a triangle", line_no + 1);
                    return Err(AssetError::UnsupportedGeometry {
                        line: line_no + 1,
                        corners: tokens.len(),
                    });
                }
                for token in tokens {
                    corners.push(parse_face_vertex(
                        token,
                        positions.len(),
                        texcoords.len(),
                        normals.len(),
                        line_no,
                    )?);
                }
            }
            "mtllib" => {
                let name = trimmed[tag.len()..].trim();
                let resolved = match &options.material_dir {
                    Some(dir) => dir.join(name),
                    None => PathBuf::from(name),
                };
                log::info!("Mesh material library: {}", resolved.display());
            }
            _ => {
                // Comments and unhandled directives (o/g/s/usemtl/etc.)
            }
        }
    }

    let mut out = VertexAttributes::new(Vec::with_capacity(corners.len()));
    if !texcoords.is_empty() {
        out.uvs.reserve(corners.len());
    }
    if !normals.is_empty() {
        out.normals.reserve(corners.len());
    }

    for corner in &corners {
        out.positions.push(positions[corner.position]);
        if !texcoords.is_empty() {
            let i = corner.uv.ok_or_else(|| {
                AssetError::parse(corner.line_no, "face corner has no texture coordinate index")
            })?;
            out.uvs.push(texcoords[i]);
        }
        if !normals.is_empty() {
            let i = corner.normal.ok_or_else(|| {
                AssetError::parse(corner.line_no, "face corner has no normal index")
            })?;
            out.normals.push(normals[i]);
        }
    }

    log::info!(
        "Loaded OBJ: {} triangles, {} vertices (uvs: {}, normals: {})",
        corners.len() / 3,
        out.vertex_count(),
        out.uvs.len(),
        out.normals.len()
    );

    Ok(out)
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> AssetResult<f32> {
    let token = value.ok_or_else(|| AssetError::parse(line_no, format!("missing {what}")))?;
    token
        .parse::<f32>()
        .map_err(|e| AssetError::parse(line_no, format!("invalid {what} '{token}': {e}")))
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> AssetResult<Corner> {
    let mut split = token.split('/');
    let pos = split.next().unwrap_or_default();
    let position = resolve_index(pos, pos_count, line_no, "position")?.ok_or_else(|| {
        AssetError::parse(line_no, format!("face element '{token}' has no position index"))
    })?;

    let uv = match split.next() {
        Some(value) if !value.is_empty() => resolve_index(value, tex_count, line_no, "texture")?,
        _ => None,
    };

    let normal = match split.next() {
        Some(value) if !value.is_empty() => resolve_index(value, norm_count, line_no, "normal")?,
        _ => None,
    };

    if split.next().is_some() {
        return Err(AssetError::parse(
            line_no,
            format!("malformed face element '{token}'"),
        ));
    }

    Ok(Corner {
        position,
        uv,
        normal,
        line_no,
    })
}

/// 1-based (or negative, relative) index to a 0-based pool index.
/// `0` means "not given".
fn resolve_index(token: &str, len: usize, line_no: usize, pool: &str) -> AssetResult<Option<usize>> {
    let raw = token
        .parse::<i64>()
        .map_err(|_| AssetError::parse(line_no, format!("invalid {pool} index '{token}'")))?;
    if raw == 0 {
        return Ok(None);
    }

    let idx = if raw > 0 { raw - 1 } else { len as i64 + raw };

    if idx < 0 || idx as usize >= len {
        return Err(AssetError::parse(
            line_no,
            format!("{pool} index {raw} out of bounds ({len} declared so far)"),
        ));
    }

    Ok(Some(idx as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXTURED_QUAD: &str = r#"
        # two triangles sharing an edge
        o quad
        v 0.0 0.0 0.0
        v 1.0 0.0 0.0
        v 0.0 1.0 0.0
        v 1.0 1.0 0.0
        vt 0.0 0.0
        vt 1.0 0.0
        vt 0.0 1.0
        vt 1.0 1.0
        vn 0.0 0.0 1.0
        s off
        f 1/1/1 2/2/1 3/3/1
        f 4/4/1 3/3/1 2/2/1
    "#;

    fn parse(src: &str) -> AssetResult<VertexAttributes> {
        load_obj_from_str(src, &ObjOptions::default())
    }

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let mesh = parse(src).expect("parse triangle");
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.uvs.len(), 3);
        assert_eq!(mesh.normals.len(), 3);
        assert_eq!(mesh.uvs[1], [1.0, 0.0]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn counts_are_three_per_face() {
        let mesh = parse(TEXTURED_QUAD).expect("parse quad");
        assert_eq!(mesh.positions.len(), 6);
        assert_eq!(mesh.uvs.len(), 6);
        assert_eq!(mesh.normals.len(), 6);
        // Shared corners are duplicated, not indexed.
        assert_eq!(mesh.positions[2], mesh.positions[4]);
    }

    #[test]
    fn triangle_without_uvs_or_normals() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/0/0 2/0/0 3/0/0\n";
        let mesh = parse(src).expect("parse");
        assert_eq!(mesh.positions, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert!(mesh.uvs.is_empty());
        assert!(mesh.normals.is_empty());
    }

    #[test]
    fn trailing_comments_are_ignored() {
        let src = "v 0 0 0 # origin\nv 1 0 0\nv 0 1 0\nf 1 2 3 # tri\nf 3 2 1#back\n";
        let mesh = parse(src).expect("parse");
        assert_eq!(mesh.positions.len(), 6);
        assert_eq!(mesh.positions[0], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn position_only_and_double_slash_corners() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        let mesh = parse(src).expect("parse");
        assert_eq!(mesh.normals.len(), 3);
        assert!(mesh.uvs.is_empty());

        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").expect("parse");
        assert_eq!(mesh.positions.len(), 3);
    }

    #[test]
    fn quad_face_is_unsupported_geometry() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf 1 2 3\nf 1 2 3 4\n";
        let err = parse(src).unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedGeometry { line: 6, corners: 4 }));
    }

    #[test]
    fn short_face_is_unsupported_geometry() {
        let err = parse("v 0 0 0\nv 1 0 0\nf 1 2\n").unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedGeometry { corners: 2, .. }));
    }

    #[test]
    fn out_of_range_index_is_parse_error() {
        let err = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n").unwrap_err();
        assert!(matches!(err, AssetError::Parse { line: 4, .. }));
    }

    #[test]
    fn face_before_declaration_is_rejected() {
        let err = parse("v 0 0 0\nf 1 2 3\nv 1 0 0\nv 0 1 0\n").unwrap_err();
        assert!(matches!(err, AssetError::Parse { line: 2, .. }));
    }

    #[test]
    fn missing_uv_index_with_uv_pool_is_rejected() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2 3/1\n";
        let err = parse(src).unwrap_err();
        assert!(matches!(err, AssetError::Parse { line: 5, .. }));
    }

    #[test]
    fn malformed_number_is_parse_error() {
        let err = parse("v 0 zero 0\n").unwrap_err();
        assert!(matches!(err, AssetError::Parse { line: 1, .. }));
    }

    #[test]
    fn negative_indices_are_relative() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = parse(src).expect("parse");
        assert_eq!(mesh.positions[0], [0.0, 0.0, 0.0]);
        assert_eq!(mesh.positions[2], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn flip_v_negates_texcoords() {
        let mesh = load_obj_from_str(TEXTURED_QUAD, &ObjOptions::flipped_v()).expect("parse");
        assert_eq!(mesh.uvs[2], [0.0, -1.0]);
    }

    #[test]
    fn reparsing_is_deterministic() {
        let a = parse(TEXTURED_QUAD).expect("first");
        let b = parse(TEXTURED_QUAD).expect("second");
        assert_eq!(a, b);
    }

    #[test]
    fn mtllib_is_resolved_but_not_read() {
        let options = ObjOptions {
            material_dir: Some(PathBuf::from("/nonexistent/materials")),
            ..Default::default()
        };
        let src = format!("mtllib road.mtl\nusemtl road\n{TEXTURED_QUAD}");
        let mesh = load_obj_from_str(&src, &options).expect("parse");
        assert_eq!(mesh.vertex_count(), 6);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_obj_from_path("/no/such/mesh.obj", &ObjOptions::default()).unwrap_err();
        assert!(matches!(err, AssetError::ResourceNotFound { .. }));
    }
}
