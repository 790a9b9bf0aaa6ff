//! Renderer: wgpu context, shader programs, textures and renderable objects.
//! wgpu = 26.x, winit = 0.30.x
//!
//! [`GpuContext`] owns the surface, device/queue and the per-frame targets
//! (depth, optional MSAA). A frame is `begin_frame` -> any number of
//! [`object::RenderObject::draw`] calls -> `end_frame`.

use std::sync::Arc;

use thiserror::Error;
use wgpu::{
    CommandEncoder, CommandEncoderDescriptor, Device, DeviceDescriptor, Extent3d, Features,
    Instance, InstanceDescriptor, Limits, LoadOp, Operations, PowerPreference, PresentMode, Queue,
    RenderPass, RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    StoreOp, Surface, SurfaceConfiguration, SurfaceError, SurfaceTexture, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
};
use winit::{dpi::PhysicalSize, window::Window};

pub mod object;
pub mod program;
pub mod texture;

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Dark blue background.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.4,
    a: 1.0,
};

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("could not create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("could not open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}

/// Knobs taken from the command line and `Game.ini`.
#[derive(Clone, Copy, Debug)]
pub struct GpuSettings {
    pub backends: wgpu::Backends,
    /// Requested MSAA sample count; lowered to 1 if the adapter can't do it.
    pub samples: u32,
}

pub struct GpuContext {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,
    features: Features,

    // Per-frame targets
    depth_view: TextureView,
    msaa_view: Option<TextureView>,
    sample_count: u32,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuContext {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, settings: GpuSettings) -> Result<Self, GpuError> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends: settings.backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let info = adapter.get_info();
        log::info!("Adapter: {} ({:?})", info.name, info.backend);

        // DDS textures need BC; everything else works without it.
        let features = adapter.features() & Features::TEXTURE_COMPRESSION_BC;
        if !features.contains(Features::TEXTURE_COMPRESSION_BC) {
            log::warn!("Adapter has no BC texture compression; DDS textures will fail to upload");
        }

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Ngine Device"),
                required_features: features,
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await?;

        // Raw shader outputs, like a default GL framebuffer: prefer non-sRGB.
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(GpuError::NoSurfaceFormat)?;

        let sample_count = pick_sample_count(settings.samples, |n| {
            adapter
                .get_texture_format_features(surface_format)
                .flags
                .sample_count_supported(n)
                && adapter
                    .get_texture_format_features(DEPTH_FORMAT)
                    .flags
                    .sample_count_supported(n)
        });

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config, sample_count);
        let msaa_view = create_msaa_view(&device, &surface_config, sample_count);

        log::info!(
            "Surface {:?} {}x{}, {}x MSAA",
            surface_format,
            width,
            height,
            sample_count
        );

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            features,
            depth_view,
            msaa_view,
            sample_count,
            width,
            height,
        })
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    #[inline]
    pub fn surface_format(&self) -> TextureFormat {
        self.surface_config.format
    }

    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    #[inline]
    pub fn supports_bc(&self) -> bool {
        self.features.contains(Features::TEXTURE_COMPRESSION_BC)
    }

    /// Resize: reconfigure surface & recreate depth/MSAA views.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config, self.sample_count);
        self.msaa_view = create_msaa_view(&self.device, &self.surface_config, self.sample_count);
    }

    /// Acquire the next surface texture and clear color + depth.
    pub fn begin_frame(&mut self) -> Result<Frame, SurfaceError> {
        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture.texture.create_view(&TextureViewDescriptor::default());

        let encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        let mut frame = Frame {
            surface_texture,
            view,
            encoder,
        };
        // Clear-only pass; object passes load what it leaves behind.
        drop(frame.pass(self, "ClearPass", true));
        Ok(frame)
    }

    /// Submit the frame's commands and present.
    pub fn end_frame(&self, frame: Frame) {
        let Frame {
            surface_texture,
            encoder,
            ..
        } = frame;
        self.queue.submit(Some(encoder.finish()));
        surface_texture.present();
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

/// One frame in flight: the acquired surface texture and its command encoder.
pub struct Frame {
    surface_texture: SurfaceTexture,
    view: TextureView,
    encoder: CommandEncoder,
}

impl Frame {
    /// Open a render pass on the frame's targets. With `clear`, color and
    /// depth are reset; otherwise previous contents are kept.
    pub fn pass(&mut self, gpu: &GpuContext, label: &str, clear: bool) -> RenderPass<'_> {
        let (color_view, resolve_target) = match &gpu.msaa_view {
            Some(msaa) => (msaa, Some(&self.view)),
            None => (&self.view, None),
        };
        let color_load = if clear {
            LoadOp::Clear(CLEAR_COLOR)
        } else {
            LoadOp::Load
        };
        let depth_load = if clear { LoadOp::Clear(1.0) } else { LoadOp::Load };

        self.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: color_view,
                depth_slice: None,
                resolve_target,
                ops: Operations {
                    load: color_load,
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &gpu.depth_view,
                depth_ops: Some(Operations {
                    load: depth_load,
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        })
    }
}

/// Largest MSAA count any backend offers.
const MAX_SAMPLES: u32 = 16;

/// Highest power of two not above `requested` (capped at [`MAX_SAMPLES`])
/// that `supported` accepts.
fn pick_sample_count(requested: u32, supported: impl Fn(u32) -> bool) -> u32 {
    let wanted = requested.clamp(1, MAX_SAMPLES);
    let mut n = 1u32 << (u32::BITS - 1 - wanted.leading_zeros());
    while n > 1 && !supported(n) {
        n /= 2;
    }
    if n != requested.max(1) {
        log::warn!("{}x MSAA is not supported, using {}x", requested, n);
    }
    n
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration, samples: u32) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: samples,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

/// Multisampled color target, resolved into the surface each pass.
fn create_msaa_view(
    device: &Device,
    sc: &SurfaceConfiguration,
    samples: u32,
) -> Option<TextureView> {
    if samples <= 1 {
        return None;
    }
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("MsaaColorTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: samples,
        dimension: TextureDimension::D2,
        format: sc.format,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Some(tex.create_view(&TextureViewDescriptor::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_keeps_supported_request() {
        assert_eq!(pick_sample_count(4, |_| true), 4);
        assert_eq!(pick_sample_count(1, |_| true), 1);
        assert_eq!(pick_sample_count(0, |_| true), 1);
    }

    #[test]
    fn sample_count_falls_back() {
        assert_eq!(pick_sample_count(8, |n| n <= 4), 4);
        assert_eq!(pick_sample_count(16, |_| false), 1);
    }

    #[test]
    fn sample_count_rounds_down_to_power_of_two() {
        assert_eq!(pick_sample_count(6, |_| true), 4);
    }

    #[test]
    fn huge_sample_request_is_capped() {
        assert_eq!(pick_sample_count(u32::MAX, |_| true), 16);
        assert_eq!(pick_sample_count((1 << 31) + 1, |n| n <= 4), 4);
        assert_eq!(pick_sample_count(32, |_| true), 16);
    }
}
