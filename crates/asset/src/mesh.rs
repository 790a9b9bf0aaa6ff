//! CPU-side vertex data used by loaders and the renderer.

use thiserror::Error;

/// Non-indexed vertex attributes: one entry per drawn vertex in every
/// populated sequence. Empty optional sequences mean "attribute absent".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexAttributes {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{attribute} has {len} entries but there are {expected} positions")]
pub struct AttributeMismatch {
    pub attribute: &'static str,
    pub len: usize,
    pub expected: usize,
}

impl VertexAttributes {
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            ..Default::default()
        }
    }

    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_colors(mut self, colors: Vec<[f32; 3]>) -> Self {
        self.colors = colors;
        self
    }

    /// Draw count; always the number of positions.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    #[inline]
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    #[inline]
    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    /// Every populated optional sequence must match the position count.
    pub fn validate(&self) -> Result<(), AttributeMismatch> {
        let expected = self.positions.len();
        let lens = [
            ("uvs", self.uvs.len()),
            ("normals", self.normals.len()),
            ("colors", self.colors.len()),
        ];
        for (attribute, len) in lens {
            if len != 0 && len != expected {
                return Err(AttributeMismatch {
                    attribute,
                    len,
                    expected,
                });
            }
        }
        Ok(())
    }
}
