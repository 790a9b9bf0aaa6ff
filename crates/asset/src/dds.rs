//! DDS reader for DXT1/DXT3/DXT5 block-compressed textures.
//!
//! Layout: 4-byte magic `"DDS "`, a 124-byte header, then the mip chain.
//! Only height, width, linear size, mip count and the fourCC are read.

use std::{fs, path::Path};

use crate::{AssetError, AssetResult};

pub const MAGIC: &[u8; 4] = b"DDS ";
pub const HEADER_LEN: usize = 124;

const OFFSET_HEIGHT: usize = 8;
const OFFSET_WIDTH: usize = 12;
const OFFSET_LINEAR_SIZE: usize = 16;
const OFFSET_MIP_COUNT: usize = 24;
const OFFSET_FOURCC: usize = 80;

/// Block-compressed formats a DDS file may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockFormat {
    /// DXT1 / BC1.
    Dxt1,
    /// DXT3 / BC2.
    Dxt3,
    /// DXT5 / BC3.
    Dxt5,
}

impl BlockFormat {
    pub fn from_fourcc(code: [u8; 4]) -> Option<Self> {
        match &code {
            b"DXT1" => Some(Self::Dxt1),
            b"DXT3" => Some(Self::Dxt3),
            b"DXT5" => Some(Self::Dxt5),
            _ => None,
        }
    }

    /// Bytes per 4x4 block.
    #[inline]
    pub fn block_bytes(self) -> u32 {
        match self {
            Self::Dxt1 => 8,
            Self::Dxt3 | Self::Dxt5 => 16,
        }
    }
}

/// Raw header fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DdsHeader {
    pub height: u32,
    pub width: u32,
    pub linear_size: u32,
    pub mip_count: u32,
    pub fourcc: [u8; 4],
}

impl DdsHeader {
    /// `bytes` starts at the magic.
    pub fn parse(bytes: &[u8], what: &str) -> AssetResult<Self> {
        if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
            return Err(AssetError::corrupt(what, "missing DDS signature"));
        }
        let header = bytes
            .get(MAGIC.len()..MAGIC.len() + HEADER_LEN)
            .ok_or_else(|| AssetError::corrupt(what, "truncated DDS header"))?;
        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(&header[OFFSET_FOURCC..OFFSET_FOURCC + 4]);
        Ok(Self {
            height: read_u32(header, OFFSET_HEIGHT),
            width: read_u32(header, OFFSET_WIDTH),
            linear_size: read_u32(header, OFFSET_LINEAR_SIZE),
            mip_count: read_u32(header, OFFSET_MIP_COUNT),
            fourcc,
        })
    }

    /// Bytes reserved for the mip chain: `linear_size`, doubled when more
    /// than one level is declared.
    pub fn buffer_size(&self) -> usize {
        let linear = self.linear_size as usize;
        if self.mip_count > 1 { linear * 2 } else { linear }
    }
}

/// One mip level inside the chain buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipLevel {
    pub level: u32,
    pub width: u32,
    pub height: u32,
    pub offset: usize,
    pub size: usize,
}

/// Byte size of a `width` x `height` level rounded up to whole 4x4 blocks.
/// `None` when the size does not fit in `usize`.
#[inline]
pub fn level_size(width: u32, height: u32, block_bytes: u32) -> Option<usize> {
    (width.div_ceil(4) as usize)
        .checked_mul(height.div_ceil(4) as usize)?
        .checked_mul(block_bytes as usize)
}

/// Lay out up to `mip_count` levels, halving each dimension with a floor of
/// one. Stops after the 1x1 level and before any level that would run past
/// `buffer_len`.
pub fn plan_mip_levels(
    width: u32,
    height: u32,
    mip_count: u32,
    block_bytes: u32,
    buffer_len: usize,
) -> Vec<MipLevel> {
    let mut levels = Vec::new();
    let (mut w, mut h) = (width, height);
    let mut offset = 0usize;
    if w == 0 || h == 0 {
        return levels;
    }

    for level in 0..mip_count.max(1) {
        let Some(size) = level_size(w, h, block_bytes) else {
            break;
        };
        if offset.checked_add(size).is_none_or(|end| end > buffer_len) {
            break;
        }
        levels.push(MipLevel {
            level,
            width: w,
            height: h,
            offset,
            size,
        });
        offset += size;
        if w == 1 && h == 1 {
            break;
        }
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    levels
}

/// Decoded DDS: compressed chain plus its level layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DdsImage {
    pub width: u32,
    pub height: u32,
    pub format: BlockFormat,
    pub data: Vec<u8>,
    pub levels: Vec<MipLevel>,
}

impl DdsImage {
    pub fn level_bytes(&self, level: &MipLevel) -> &[u8] {
        &self.data[level.offset..level.offset + level.size]
    }
}

/// Load a DDS file from disk.
pub fn load_dds(path: impl AsRef<Path>) -> AssetResult<DdsImage> {
    let path = path.as_ref();
    log::info!("Loading texture in DDS format: {}", path.display());
    let bytes = fs::read(path).map_err(|e| {
        log::error!("Could not open {}", path.display());
        AssetError::not_found(path, e)
    })?;
    decode_dds(&bytes, &path.display().to_string())
}

/// Decode an in-memory DDS. `what` names the asset in errors.
pub fn decode_dds(bytes: &[u8], what: &str) -> AssetResult<DdsImage> {
    let header = DdsHeader::parse(bytes, what).inspect_err(|_| {
        log::error!("{what} is corrupted");
    })?;

    let format = BlockFormat::from_fourcc(header.fourcc).ok_or_else(|| {
        log::error!("Could not establish format of {what}");
        AssetError::UnsupportedFormat {
            what: what.to_string(),
            format: String::from_utf8_lossy(&header.fourcc).into_owned(),
        }
    })?;

    if header.width == 0 || header.height == 0 {
        return Err(AssetError::corrupt(
            what,
            format!("invalid dimensions {}x{}", header.width, header.height),
        ));
    }

    // The file may end before the reserved size; keep what is there.
    let body = &bytes[MAGIC.len() + HEADER_LEN..];
    let data = body[..header.buffer_size().min(body.len())].to_vec();

    let levels = plan_mip_levels(
        header.width,
        header.height,
        header.mip_count,
        format.block_bytes(),
        data.len(),
    );
    if levels.is_empty() {
        return Err(AssetError::corrupt(
            what,
            format!(
                "{} bytes of block data is too small for a {}x{} base level",
                data.len(),
                header.width,
                header.height
            ),
        ));
    }
    if (levels.len() as u32) < header.mip_count.max(1) {
        log::warn!(
            "{what}: {} of {} declared mip levels fit the {}-byte chain",
            levels.len(),
            header.mip_count,
            data.len()
        );
    }

    log::info!(
        "Decoded DDS {}x{} {:?}, {} mip levels",
        header.width,
        header.height,
        format,
        levels.len()
    );

    Ok(DdsImage {
        width: header.width,
        height: header.height,
        format,
        data,
        levels,
    })
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
