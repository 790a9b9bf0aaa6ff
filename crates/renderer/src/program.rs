//! Shader programs: compile a GLSL vertex/fragment pair and link them into a
//! render pipeline.
//!
//! Bindings the shaders must declare:
//! - `set = 0, binding = 0`: uniform block holding `mat4 MVP`
//! - `set = 1, binding = 0/1`: `texture2D` + `sampler` (textured programs only)
//! - vertex inputs: location 0 position, 1 color, 2 uv

use std::borrow::Cow;

use asset::{mesh::VertexAttributes, shader::ShaderSources};
use thiserror::Error;
use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BlendState,
    BufferBindingType, ColorTargetState, ColorWrites, CompilationMessageType, DepthBiasState,
    DepthStencilState, Device, ErrorFilter, FragmentState, PipelineLayoutDescriptor,
    RenderPipeline, RenderPipelineDescriptor, SamplerBindingType, ShaderModule,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, TextureSampleType, TextureViewDimension,
    VertexBufferLayout, VertexState, VertexStepMode, naga::ShaderStage,
};

use crate::{DEPTH_FORMAT, GpuContext};

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader {label} failed to compile:\n{log}")]
    Compile {
        stage: &'static str,
        label: String,
        log: String,
    },
    #[error("program linking failed:\n{log}")]
    Link { log: String },
}

/// Fixed vertex attribute slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeSlot {
    Position,
    Color,
    Uv,
}

impl AttributeSlot {
    #[inline]
    pub fn location(self) -> u32 {
        match self {
            Self::Position => 0,
            Self::Color => 1,
            Self::Uv => 2,
        }
    }

    pub fn buffer_layout(self) -> VertexBufferLayout<'static> {
        const POSITION: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
        const COLOR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
        const UV: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x2];
        let (stride, attributes): (usize, &'static [wgpu::VertexAttribute]) = match self {
            Self::Position => (size_of::<[f32; 3]>(), &POSITION),
            Self::Color => (size_of::<[f32; 3]>(), &COLOR),
            Self::Uv => (size_of::<[f32; 2]>(), &UV),
        };
        VertexBufferLayout {
            array_stride: stride as u64,
            step_mode: VertexStepMode::Vertex,
            attributes,
        }
    }
}

/// What a program's pipeline expects from the objects drawn with it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    pub color: bool,
    pub uv: bool,
    pub textured: bool,
}

impl ProgramLayout {
    pub fn for_attributes(attributes: &VertexAttributes, textured: bool) -> Self {
        Self {
            color: attributes.has_colors(),
            uv: attributes.has_uvs(),
            textured,
        }
    }

    /// Vertex buffer order; buffer `i` is bound at pipeline slot `i`.
    pub fn slots(&self) -> Vec<AttributeSlot> {
        let mut slots = vec![AttributeSlot::Position];
        if self.color {
            slots.push(AttributeSlot::Color);
        }
        if self.uv {
            slots.push(AttributeSlot::Uv);
        }
        slots
    }
}

/// A linked program. Holds only GPU handles.
pub struct Program {
    pipeline: RenderPipeline,
    transform_layout: BindGroupLayout,
    texture_layout: Option<BindGroupLayout>,
    layout: ProgramLayout,
}

impl Program {
    /// Compile both stages, then link. Diagnostics are logged whenever the
    /// compiler or linker reports any, even on success.
    pub fn compile(
        gpu: &GpuContext,
        sources: &ShaderSources,
        layout: ProgramLayout,
    ) -> Result<Self, ShaderError> {
        let device = gpu.device();
        let vs = compile_stage(device, &sources.vertex, &sources.vertex_label, ShaderStage::Vertex)?;
        let fs = compile_stage(
            device,
            &sources.fragment,
            &sources.fragment_label,
            ShaderStage::Fragment,
        )?;

        log::info!("Linking program");
        let transform_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Transform BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = layout.textured.then(|| texture_bind_group_layout(device));

        let mut bind_group_layouts = vec![&transform_layout];
        if let Some(tl) = &texture_layout {
            bind_group_layouts.push(tl);
        }
        let buffers: Vec<VertexBufferLayout<'static>> =
            layout.slots().into_iter().map(AttributeSlot::buffer_layout).collect();

        device.push_error_scope(ErrorFilter::Validation);
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Program PipelineLayout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Program Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &vs,
                entry_point: Some("main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &fs,
                entry_point: Some("main"),
                targets: &[Some(ColorTargetState {
                    format: gpu.surface_format(),
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: gpu.sample_count(),
                ..Default::default()
            },
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            let log = err.to_string();
            log::error!("{log}");
            return Err(ShaderError::Link { log });
        }

        Ok(Self {
            pipeline,
            transform_layout,
            texture_layout,
            layout,
        })
    }

    #[inline]
    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    #[inline]
    pub fn transform_layout(&self) -> &BindGroupLayout {
        &self.transform_layout
    }

    #[inline]
    pub fn texture_layout(&self) -> Option<&BindGroupLayout> {
        self.texture_layout.as_ref()
    }

    #[inline]
    pub fn layout(&self) -> ProgramLayout {
        self.layout
    }
}

fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        _ => "compute",
    }
}

fn compile_stage(
    device: &Device,
    source: &str,
    label: &str,
    stage: ShaderStage,
) -> Result<ShaderModule, ShaderError> {
    log::info!("Compiling shader: {label}");
    device.push_error_scope(ErrorFilter::Validation);
    let module = device.create_shader_module(ShaderModuleDescriptor {
        label: Some(label),
        source: ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: Default::default(),
        },
    });
    let info = pollster::block_on(module.get_compilation_info());
    let scope_error = pollster::block_on(device.pop_error_scope());

    let mut has_error = false;
    let mut lines = Vec::new();
    for msg in &info.messages {
        has_error |= matches!(msg.message_type, CompilationMessageType::Error);
        let line = msg
            .location
            .as_ref()
            .map(|loc| format!("{label}:{}:{}: ", loc.line_number, loc.line_position))
            .unwrap_or_default();
        lines.push(format!("{line}{:?}: {}", msg.message_type, msg.message));
    }
    if let Some(err) = &scope_error {
        has_error = true;
        lines.push(err.to_string());
    }

    let log = lines.join("\n");
    if !log.is_empty() {
        if has_error {
            log::error!("{log}");
        } else {
            log::warn!("{log}");
        }
    }
    if has_error {
        return Err(ShaderError::Compile {
            stage: stage_name(stage),
            label: label.to_string(),
            log,
        });
    }
    Ok(module)
}

fn texture_bind_group_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("Texture BGL"),
        entries: &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    multisampled: false,
                    view_dimension: TextureViewDimension::D2,
                    sample_type: TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}
