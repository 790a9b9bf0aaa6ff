//! GPU upload of decoded textures.

use asset::{
    dds::BlockFormat,
    texture::{TextureData, TextureFormat},
};
use thiserror::Error;

use crate::GpuContext;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("texture has no mip levels")]
    Empty,
    #[error("adapter does not support BC texture compression")]
    CompressionUnsupported,
    #[error("compressed texture {width}x{height} is not a multiple of the 4x4 block size")]
    UnalignedCompressed { width: u32, height: u32 },
}

/// A sampled 2D texture: repeat wrap, trilinear filtering.
pub struct GpuTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// How one mip level is copied: bytes per row, rows, and the copy extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LevelCopy {
    pub bytes_per_row: u32,
    pub rows: u32,
    pub extent_width: u32,
    pub extent_height: u32,
}

pub(crate) fn level_copy(format: TextureFormat, width: u32, height: u32) -> LevelCopy {
    match format {
        TextureFormat::Rgba8 => LevelCopy {
            bytes_per_row: width * 4,
            rows: height,
            extent_width: width,
            extent_height: height,
        },
        // Compressed copies cover whole blocks, even for 2x2 and 1x1 levels.
        TextureFormat::Compressed(block) => {
            let blocks_wide = width.div_ceil(4);
            let blocks_high = height.div_ceil(4);
            LevelCopy {
                bytes_per_row: blocks_wide * block.block_bytes(),
                rows: blocks_high,
                extent_width: blocks_wide * 4,
                extent_height: blocks_high * 4,
            }
        }
    }
}

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Compressed(BlockFormat::Dxt1) => wgpu::TextureFormat::Bc1RgbaUnorm,
        TextureFormat::Compressed(BlockFormat::Dxt3) => wgpu::TextureFormat::Bc2RgbaUnorm,
        TextureFormat::Compressed(BlockFormat::Dxt5) => wgpu::TextureFormat::Bc3RgbaUnorm,
    }
}

impl GpuTexture {
    /// Create the texture and upload every mip level.
    pub fn upload(gpu: &GpuContext, data: &TextureData, label: &str) -> Result<Self, TextureError> {
        if data.mips.is_empty() {
            return Err(TextureError::Empty);
        }
        if data.is_compressed() {
            if !gpu.supports_bc() {
                return Err(TextureError::CompressionUnsupported);
            }
            if data.width % 4 != 0 || data.height % 4 != 0 {
                return Err(TextureError::UnalignedCompressed {
                    width: data.width,
                    height: data.height,
                });
            }
        }

        let device = gpu.device();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: data.width,
                height: data.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: data.mip_level_count(),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(data.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, mip) in data.mips.iter().enumerate() {
            let copy = level_copy(data.format, mip.width, mip.height);
            gpu.queue().write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                },
                &mip.bytes,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(copy.bytes_per_row),
                    rows_per_image: Some(copy.rows),
                },
                wgpu::Extent3d {
                    width: copy.extent_width,
                    height: copy.extent_height,
                    depth_or_array_layers: 1,
                },
            );
            log::trace!("{label}: uploaded mip {level} ({}x{})", mip.width, mip.height);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        log::info!(
            "Uploaded texture {label}: {}x{}, {} mip levels",
            data.width,
            data.height,
            data.mip_level_count()
        );

        Ok(Self {
            texture,
            view,
            sampler,
        })
    }

    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    #[inline]
    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}
