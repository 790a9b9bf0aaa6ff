//! Texture data in CPU-friendly form before GPU upload.

use std::path::Path;

use image::{RgbaImage, imageops};

use crate::{
    AssetError, AssetResult,
    bmp::{self, BmpImage},
    dds::{self, BlockFormat, DdsImage},
};

/// Pixel formats a [`TextureData`] can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
    Compressed(BlockFormat),
}

/// One level of a mip chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MipData {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Texture with its full mip chain, level 0 first.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub mips: Vec<MipData>,
}

impl TextureData {
    /// RGBA8 texture from raw pixels, with a generated mip chain down to 1x1.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> AssetResult<Self> {
        let base = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
            AssetError::corrupt("RGBA8 pixels", format!("data size does not match {width}x{height}"))
        })?;
        let mips = generate_mips(base);
        Ok(Self {
            width,
            height,
            format: TextureFormat::Rgba8,
            mips,
        })
    }

    pub fn from_bmp(image: &BmpImage) -> AssetResult<Self> {
        Self::from_rgba8(image.width, image.height, image.to_rgba8())
    }

    pub fn from_dds(image: &DdsImage) -> Self {
        let mips = image
            .levels
            .iter()
            .map(|level| MipData {
                width: level.width,
                height: level.height,
                bytes: image.level_bytes(level).to_vec(),
            })
            .collect();
        Self {
            width: image.width,
            height: image.height,
            format: TextureFormat::Compressed(image.format),
            mips,
        }
    }

    /// Load a `.bmp` or `.dds` file, chosen by extension.
    pub fn load(path: impl AsRef<Path>) -> AssetResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let texture = match ext.as_str() {
            "bmp" => Self::from_bmp(&bmp::load_bmp(path)?)?,
            "dds" => Self::from_dds(&dds::load_dds(path)?),
            other => {
                return Err(AssetError::UnsupportedFormat {
                    what: path.display().to_string(),
                    format: format!("'.{other}' texture"),
                });
            }
        };
        log::info!(
            "Loaded texture {}x{} {:?} with {} mip levels",
            texture.width,
            texture.height,
            texture.format,
            texture.mip_level_count()
        );
        Ok(texture)
    }

    #[inline]
    pub fn mip_level_count(&self) -> u32 {
        self.mips.len() as u32
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.format, TextureFormat::Compressed(_))
    }
}

/// Number of levels in a full chain for the given size.
pub fn full_mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn generate_mips(base: RgbaImage) -> Vec<MipData> {
    let count = full_mip_count(base.width(), base.height());
    let mut mips = Vec::with_capacity(count as usize);
    let mut current = base;
    for _ in 1..count {
        let w = (current.width() / 2).max(1);
        let h = (current.height() / 2).max(1);
        let next = imageops::resize(&current, w, h, imageops::FilterType::Triangle);
        mips.push(into_mip(current));
        current = next;
    }
    mips.push(into_mip(current));
    mips
}

fn into_mip(image: RgbaImage) -> MipData {
    let (width, height) = image.dimensions();
    MipData {
        width,
        height,
        bytes: image.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_chain_lengths() {
        assert_eq!(full_mip_count(1, 1), 1);
        assert_eq!(full_mip_count(2, 2), 2);
        assert_eq!(full_mip_count(256, 64), 9);
        assert_eq!(full_mip_count(5, 3), 3);
    }

    #[test]
    fn rgba_mips_halve_to_one() {
        let tex = TextureData::from_rgba8(4, 2, vec![200; 4 * 2 * 4]).expect("texture");
        let dims: Vec<(u32, u32)> = tex.mips.iter().map(|m| (m.width, m.height)).collect();
        assert_eq!(dims, vec![(4, 2), (2, 1), (1, 1)]);
        for mip in &tex.mips {
            assert_eq!(mip.bytes.len(), (mip.width * mip.height * 4) as usize);
        }
        // A flat image stays flat when downsampled.
        assert!(tex.mips[2].bytes.iter().all(|&b| b == 200));
    }

    #[test]
    fn wrong_rgba_length_is_corrupt() {
        assert!(matches!(
            TextureData::from_rgba8(2, 2, vec![0; 3]),
            Err(AssetError::CorruptAsset { .. })
        ));
    }

    #[test]
    fn bmp_file_becomes_rgba_chain() {
        let mut bytes = crate::bmp::tests::header(2, 2, 0, 0);
        bytes.extend_from_slice(&[0, 0, 255, 0, 0, 255, 0, 0, 255, 0, 0, 255]);
        let mut file = tempfile::Builder::new()
            .suffix(".bmp")
            .tempfile()
            .expect("tempfile");
        file.write_all(&bytes).expect("write");

        let tex = TextureData::load(file.path()).expect("load");
        assert_eq!(tex.format, TextureFormat::Rgba8);
        assert_eq!(tex.mip_level_count(), 2);
        assert_eq!(&tex.mips[0].bytes[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn dds_keeps_compressed_levels() {
        let bytes = crate::dds::tests::dds_bytes(8, 8, 32, 3, b"DXT1", 64);
        let image = crate::dds::decode_dds(&bytes, "test").expect("decode");
        let tex = TextureData::from_dds(&image);
        assert!(tex.is_compressed());
        assert_eq!(tex.mip_level_count(), 3);
        assert_eq!(tex.mips[1].bytes.len(), 8);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        assert!(matches!(
            TextureData::load("road.tga"),
            Err(AssetError::UnsupportedFormat { .. })
        ));
    }
}
