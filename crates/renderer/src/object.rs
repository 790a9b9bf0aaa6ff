//! Renderable object: CPU-side attributes + program + optional texture +
//! transform, with GPU buffers that are created once and rewritten only when
//! the CPU data changes.

use std::sync::Arc;

use asset::mesh::{AttributeMismatch, VertexAttributes};
use bytemuck::{Pod, Zeroable};
use corelib::{Vec3, transform::Transform};
use thiserror::Error;
use wgpu::{BindGroup, Buffer, BufferUsages, Device, util::DeviceExt};

use crate::{
    Frame, GpuContext,
    program::{AttributeSlot, Program, ProgramLayout},
    texture::GpuTexture,
};

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error(transparent)]
    Attributes(#[from] AttributeMismatch),
    #[error("object has no vertices")]
    Empty,
    #[error("program expects {expected:?} but the object provides {actual:?}")]
    LayoutMismatch {
        expected: ProgramLayout,
        actual: ProgramLayout,
    },
}

/// Transform UBO (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct TransformUniform {
    mvp: [[f32; 4]; 4],
}

impl From<&Transform> for TransformUniform {
    fn from(t: &Transform) -> Self {
        Self {
            mvp: t.matrix().to_cols_array_2d(),
        }
    }
}

/// Which GPU-side copies are stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Dirty {
    transform: bool,
    attributes: bool,
}

impl Dirty {
    /// Current flags; leaves everything clean.
    fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// What to do with the vertex buffers before a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VertexSync {
    Keep,
    /// Same vertex count: write into the existing buffers.
    Rewrite,
    /// Vertex count changed: allocate new buffers.
    Reallocate,
}

fn plan_vertex_sync(dirty: Dirty, allocated: usize, current: usize) -> VertexSync {
    if !dirty.attributes {
        VertexSync::Keep
    } else if allocated == current {
        VertexSync::Rewrite
    } else {
        VertexSync::Reallocate
    }
}

/// Vertex buffers in [`ProgramLayout::slots`] order.
struct VertexBuffers {
    buffers: Vec<Buffer>,
    vertex_count: usize,
}

impl VertexBuffers {
    fn create(device: &Device, attributes: &VertexAttributes, layout: ProgramLayout) -> Self {
        let buffers = layout
            .slots()
            .into_iter()
            .map(|slot| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(slot_label(slot)),
                    contents: slot_bytes(attributes, slot),
                    usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
                })
            })
            .collect();
        Self {
            buffers,
            vertex_count: attributes.vertex_count(),
        }
    }
}

fn slot_label(slot: AttributeSlot) -> &'static str {
    match slot {
        AttributeSlot::Position => "Position VB",
        AttributeSlot::Color => "Color VB",
        AttributeSlot::Uv => "UV VB",
    }
}

fn slot_bytes(attributes: &VertexAttributes, slot: AttributeSlot) -> &[u8] {
    match slot {
        AttributeSlot::Position => bytemuck::cast_slice(&attributes.positions),
        AttributeSlot::Color => bytemuck::cast_slice(&attributes.colors),
        AttributeSlot::Uv => bytemuck::cast_slice(&attributes.uvs),
    }
}

pub struct RenderObject {
    attributes: VertexAttributes,
    transform: Transform,
    program: Arc<Program>,
    #[allow(dead_code)]
    texture: Option<Arc<GpuTexture>>,

    vertex: VertexBuffers,
    transform_buf: Buffer,
    transform_bg: BindGroup,
    texture_bg: Option<BindGroup>,
    dirty: Dirty,
}

impl RenderObject {
    /// Validate the attributes against the program and allocate every GPU
    /// buffer the object will use.
    pub fn new(
        gpu: &GpuContext,
        program: Arc<Program>,
        texture: Option<Arc<GpuTexture>>,
        attributes: VertexAttributes,
        transform: Transform,
    ) -> Result<Self, ObjectError> {
        check_attributes(&attributes, program.layout(), texture.is_some())?;
        let device = gpu.device();

        let vertex = VertexBuffers::create(device, &attributes, program.layout());

        let transform_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Transform UBO"),
            contents: bytemuck::bytes_of(&TransformUniform::from(&transform)),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let transform_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Transform BG"),
            layout: program.transform_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: transform_buf.as_entire_binding(),
            }],
        });

        let texture_bg = match (program.texture_layout(), &texture) {
            (Some(layout), Some(tex)) => Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Texture BG"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(tex.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(tex.sampler()),
                    },
                ],
            })),
            _ => None,
        };

        log::debug!(
            "RenderObject: {} vertices, layout {:?}",
            attributes.vertex_count(),
            program.layout()
        );

        Ok(Self {
            attributes,
            transform,
            program,
            texture,
            vertex,
            transform_buf,
            transform_bg,
            texture_bg,
            dirty: Dirty::default(),
        })
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.attributes.vertex_count()
    }

    /// Compose a translation into the transform. Accumulates across calls.
    pub fn translate(&mut self, v: Vec3) {
        self.transform.translate(v);
        self.dirty.transform = true;
    }

    /// Replace the CPU-side attributes; buffers are refreshed on next draw.
    pub fn set_attributes(&mut self, attributes: VertexAttributes) -> Result<(), ObjectError> {
        check_attributes(&attributes, self.program.layout(), self.texture_bg.is_some())?;
        self.attributes = attributes;
        self.dirty.attributes = true;
        Ok(())
    }

    /// Push stale CPU data to the GPU.
    fn sync(&mut self, gpu: &GpuContext) {
        let dirty = self.dirty.take();
        if dirty.transform {
            gpu.queue().write_buffer(
                &self.transform_buf,
                0,
                bytemuck::bytes_of(&TransformUniform::from(&self.transform)),
            );
        }
        match plan_vertex_sync(dirty, self.vertex.vertex_count, self.attributes.vertex_count()) {
            VertexSync::Keep => {}
            VertexSync::Rewrite => {
                for (buf, slot) in self.vertex.buffers.iter().zip(self.program.layout().slots()) {
                    gpu.queue()
                        .write_buffer(buf, 0, slot_bytes(&self.attributes, slot));
                }
            }
            VertexSync::Reallocate => {
                log::debug!(
                    "RenderObject: reallocating vertex buffers ({} -> {} vertices)",
                    self.vertex.vertex_count,
                    self.attributes.vertex_count()
                );
                self.vertex =
                    VertexBuffers::create(gpu.device(), &self.attributes, self.program.layout());
            }
        }
    }

    /// Bind program, transform, texture and vertex buffers, then issue one
    /// non-indexed triangle-list draw.
    pub fn draw(&mut self, gpu: &GpuContext, frame: &mut Frame) {
        self.sync(gpu);

        let mut pass = frame.pass(gpu, "ObjectPass", false);
        pass.set_pipeline(self.program.pipeline());
        pass.set_bind_group(0, &self.transform_bg, &[]);
        if let Some(bg) = &self.texture_bg {
            pass.set_bind_group(1, bg, &[]);
        }
        for (slot, buf) in self.vertex.buffers.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, buf.slice(..));
        }
        pass.draw(0..self.vertex.vertex_count as u32, 0..1);
    }
}

/// Length checks plus agreement between the attributes and what the
/// program was linked for.
fn check_attributes(
    attributes: &VertexAttributes,
    expected: ProgramLayout,
    textured: bool,
) -> Result<(), ObjectError> {
    attributes.validate()?;
    if attributes.vertex_count() == 0 {
        return Err(ObjectError::Empty);
    }
    let actual = ProgramLayout::for_attributes(attributes, textured);
    if actual != expected {
        return Err(ObjectError::LayoutMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::{camera::Camera, vec3};

    fn quad() -> VertexAttributes {
        VertexAttributes::new(vec![[0.0; 3]; 6]).with_uvs(vec![[0.0; 2]; 6])
    }

    #[test]
    fn accepts_matching_layout() {
        let layout = ProgramLayout {
            color: false,
            uv: true,
            textured: true,
        };
        assert!(check_attributes(&quad(), layout, true).is_ok());
    }

    #[test]
    fn rejects_missing_texture() {
        let layout = ProgramLayout {
            color: false,
            uv: true,
            textured: true,
        };
        let err = check_attributes(&quad(), layout, false).unwrap_err();
        assert!(matches!(err, ObjectError::LayoutMismatch { .. }));
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let attrs = VertexAttributes::new(vec![[0.0; 3]; 3]).with_colors(vec![[1.0; 3]; 2]);
        let layout = ProgramLayout {
            color: true,
            ..Default::default()
        };
        assert!(matches!(
            check_attributes(&attrs, layout, false),
            Err(ObjectError::Attributes(_))
        ));
    }

    #[test]
    fn rejects_empty_mesh() {
        let attrs = VertexAttributes::default();
        assert!(matches!(
            check_attributes(&attrs, ProgramLayout::default(), false),
            Err(ObjectError::Empty)
        ));
    }

    #[test]
    fn slot_bytes_follow_attribute_data() {
        let attrs = VertexAttributes::new(vec![[1.0, 2.0, 3.0]])
            .with_colors(vec![[0.5; 3]])
            .with_uvs(vec![[0.25, 0.75]]);
        assert_eq!(slot_bytes(&attrs, AttributeSlot::Position).len(), 12);
        assert_eq!(slot_bytes(&attrs, AttributeSlot::Color).len(), 12);
        let uv: &[f32] = bytemuck::cast_slice(slot_bytes(&attrs, AttributeSlot::Uv));
        assert_eq!(uv, &[0.25, 0.75]);
    }

    #[test]
    fn clean_object_keeps_buffers() {
        assert_eq!(plan_vertex_sync(Dirty::default(), 6, 6), VertexSync::Keep);
        let transform_only = Dirty {
            transform: true,
            attributes: false,
        };
        assert_eq!(plan_vertex_sync(transform_only, 6, 3), VertexSync::Keep);
    }

    #[test]
    fn same_vertex_count_rewrites_in_place() {
        let dirty = Dirty {
            transform: false,
            attributes: true,
        };
        assert_eq!(plan_vertex_sync(dirty, 6, 6), VertexSync::Rewrite);
    }

    #[test]
    fn changed_vertex_count_reallocates() {
        let dirty = Dirty {
            transform: false,
            attributes: true,
        };
        assert_eq!(plan_vertex_sync(dirty, 6, 36), VertexSync::Reallocate);
        assert_eq!(plan_vertex_sync(dirty, 6, 3), VertexSync::Reallocate);
    }

    #[test]
    fn taking_flags_leaves_them_clean() {
        let mut dirty = Dirty {
            transform: true,
            attributes: true,
        };
        let taken = dirty.take();
        assert!(taken.transform && taken.attributes);
        assert_eq!(dirty, Dirty::default());
        // A second sync in the same state has nothing to upload.
        assert_eq!(plan_vertex_sync(dirty.take(), 6, 36), VertexSync::Keep);
    }

    #[test]
    fn uniform_is_column_major_mvp() {
        let mut t = Transform::from_camera(&Camera::game_default(1.0));
        t.translate(vec3(0.0, -1.0, 0.0));
        let u = TransformUniform::from(&t);
        assert_eq!(u.mvp, t.matrix().to_cols_array_2d());
        assert_eq!(size_of::<TransformUniform>(), 64);
    }
}
