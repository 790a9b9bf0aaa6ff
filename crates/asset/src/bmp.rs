//! Uncompressed 24-bit BMP reader.
//!
//! Only the fixed 54-byte header is interpreted. Pixel data is raw BGR,
//! bottom-up, exactly as stored.

use std::{fs, path::Path};

use crate::{AssetError, AssetResult};

pub const HEADER_LEN: usize = 54;

const OFFSET_DATA_POS: usize = 0x0A;
const OFFSET_WIDTH: usize = 0x12;
const OFFSET_HEIGHT: usize = 0x16;
const OFFSET_BPP: usize = 0x1C;
const OFFSET_COMPRESSION: usize = 0x1E;
const OFFSET_IMAGE_SIZE: usize = 0x22;

/// Header fields after the zero-value fallbacks have been applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BmpHeader {
    pub width: u32,
    pub height: u32,
    pub data_pos: u32,
    pub image_size: u32,
}

impl BmpHeader {
    /// Validate and read the header at the start of `bytes`.
    ///
    /// Some writers leave the image size and data offset at zero; they are
    /// replaced by `width * height * 3` and `54`.
    pub fn parse(bytes: &[u8], what: &str) -> AssetResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(AssetError::corrupt(
                what,
                format!("header is {} bytes, expected {HEADER_LEN}", bytes.len()),
            ));
        }
        if &bytes[0..2] != b"BM" {
            return Err(AssetError::corrupt(what, "missing BM signature"));
        }
        let compression = read_u32(bytes, OFFSET_COMPRESSION);
        if compression != 0 {
            return Err(AssetError::corrupt(
                what,
                format!("compression {compression} is not supported"),
            ));
        }
        let bpp = read_u16(bytes, OFFSET_BPP);
        if bpp != 24 {
            return Err(AssetError::corrupt(
                what,
                format!("{bpp} bits per pixel, expected 24"),
            ));
        }

        let width = read_i32(bytes, OFFSET_WIDTH);
        let height = read_i32(bytes, OFFSET_HEIGHT);
        if width <= 0 || height <= 0 {
            return Err(AssetError::corrupt(
                what,
                format!("unsupported dimensions {width}x{height}"),
            ));
        }
        let (width, height) = (width as u32, height as u32);

        let mut image_size = read_u32(bytes, OFFSET_IMAGE_SIZE);
        let mut data_pos = read_u32(bytes, OFFSET_DATA_POS);
        if image_size == 0 {
            image_size = width
                .checked_mul(height)
                .and_then(|n| n.checked_mul(3))
                .ok_or_else(|| AssetError::corrupt(what, "image size overflows"))?;
        }
        if data_pos == 0 {
            data_pos = HEADER_LEN as u32;
        }

        Ok(Self {
            width,
            height,
            data_pos,
            image_size,
        })
    }

    /// Bytes per stored row. Rows are padded to 4 bytes when the declared
    /// image size has room for the padding, tightly packed otherwise.
    pub fn row_stride(&self) -> usize {
        let packed = self.width as usize * 3;
        let padded = (packed + 3) & !3;
        if self.image_size as usize >= padded * self.height as usize {
            padded
        } else {
            packed
        }
    }
}

/// Decoded BMP: BGR rows in file order (bottom row first).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BmpImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed BGR, `width * height * 3` bytes.
    pub bgr: Vec<u8>,
}

impl BmpImage {
    /// Expand to RGBA8 keeping the row order, alpha = 255.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.bgr
            .chunks_exact(3)
            .flat_map(|px| [px[2], px[1], px[0], 255])
            .collect()
    }
}

/// Load a BMP file from disk.
pub fn load_bmp(path: impl AsRef<Path>) -> AssetResult<BmpImage> {
    let path = path.as_ref();
    log::info!("Loading texture in BMP format: {}", path.display());
    let bytes = fs::read(path).map_err(|e| {
        log::error!("Could not open {}", path.display());
        AssetError::not_found(path, e)
    })?;
    decode_bmp(&bytes, &path.display().to_string())
}

/// Decode an in-memory BMP. `what` names the asset in errors.
pub fn decode_bmp(bytes: &[u8], what: &str) -> AssetResult<BmpImage> {
    let header = BmpHeader::parse(bytes, what).inspect_err(|_| {
        log::error!("{what} is corrupted");
    })?;

    let start = header.data_pos as usize;
    let end = start + header.image_size as usize;
    let pixels = bytes.get(start..end).ok_or_else(|| {
        AssetError::corrupt(
            what,
            format!(
                "pixel data {start}..{end} runs past end of file ({} bytes)",
                bytes.len()
            ),
        )
    })?;

    let stride = header.row_stride();
    let row_len = header.width as usize * 3;
    let rows = header.height as usize;
    if pixels.len() < stride * (rows - 1) + row_len {
        return Err(AssetError::corrupt(
            what,
            format!(
                "{} bytes of pixel data is too small for {}x{}",
                pixels.len(),
                header.width,
                header.height
            ),
        ));
    }

    let mut bgr = Vec::with_capacity(row_len * rows);
    for row in 0..rows {
        let at = row * stride;
        bgr.extend_from_slice(&pixels[at..at + row_len]);
    }

    log::info!("Decoded BMP {}x{} ({} bytes)", header.width, header.height, bgr.len());

    Ok(BmpImage {
        width: header.width,
        height: header.height,
        bgr,
    })
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[inline]
fn read_i32(bytes: &[u8], at: usize) -> i32 {
    read_u32(bytes, at) as i32
}

#[inline]
fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a header; zero `image_size` / `data_pos` are written as-is.
    pub(crate) fn header(width: i32, height: i32, image_size: u32, data_pos: u32) -> Vec<u8> {
        let mut h = vec![0u8; HEADER_LEN];
        h[0] = b'B';
        h[1] = b'M';
        h[OFFSET_DATA_POS..OFFSET_DATA_POS + 4].copy_from_slice(&data_pos.to_le_bytes());
        h[0x0E..0x12].copy_from_slice(&40u32.to_le_bytes());
        h[OFFSET_WIDTH..OFFSET_WIDTH + 4].copy_from_slice(&width.to_le_bytes());
        h[OFFSET_HEIGHT..OFFSET_HEIGHT + 4].copy_from_slice(&height.to_le_bytes());
        h[0x1A..0x1C].copy_from_slice(&1u16.to_le_bytes());
        h[OFFSET_BPP..OFFSET_BPP + 2].copy_from_slice(&24u16.to_le_bytes());
        h[OFFSET_IMAGE_SIZE..OFFSET_IMAGE_SIZE + 4].copy_from_slice(&image_size.to_le_bytes());
        h
    }

    #[test]
    fn zero_size_and_offset_get_defaults() {
        let h = BmpHeader::parse(&header(2, 2, 0, 0), "test").expect("header");
        assert_eq!(h.image_size, 12);
        assert_eq!(h.data_pos, 54);
        assert_eq!((h.width, h.height), (2, 2));
    }

    #[test]
    fn decodes_with_defaulted_fields() {
        let mut bytes = header(2, 2, 0, 0);
        bytes.extend_from_slice(&[
            1, 2, 3, 4, 5, 6, // bottom row
            7, 8, 9, 10, 11, 12, // top row
        ]);
        let img = decode_bmp(&bytes, "test").expect("decode");
        assert_eq!(img.bgr.len(), 12);
        assert_eq!(&img.to_rgba8()[0..4], &[3, 2, 1, 255]);
    }

    #[test]
    fn padded_rows_are_stripped() {
        // 1x2 image: 3 bytes per row padded to 4.
        let mut bytes = header(1, 2, 8, 0);
        bytes.extend_from_slice(&[10, 20, 30, 0, 40, 50, 60, 0]);
        let img = decode_bmp(&bytes, "test").expect("decode");
        assert_eq!(img.bgr, vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn honours_data_offset() {
        let mut bytes = header(1, 1, 3, 58);
        bytes.extend_from_slice(&[0xAA; 4]);
        bytes.extend_from_slice(&[1, 2, 3]);
        let img = decode_bmp(&bytes, "test").expect("decode");
        assert_eq!(img.bgr, vec![1, 2, 3]);
    }

    #[test]
    fn wrong_magic_is_corrupt() {
        let mut bytes = header(2, 2, 0, 0);
        bytes[0] = b'X';
        let err = BmpHeader::parse(&bytes, "test").unwrap_err();
        assert!(matches!(err, AssetError::CorruptAsset { .. }));
    }

    #[test]
    fn non_24_bit_is_corrupt() {
        let mut bytes = header(2, 2, 0, 0);
        bytes[OFFSET_BPP] = 32;
        assert!(matches!(
            BmpHeader::parse(&bytes, "test"),
            Err(AssetError::CorruptAsset { .. })
        ));
    }

    #[test]
    fn compressed_is_corrupt() {
        let mut bytes = header(2, 2, 0, 0);
        bytes[OFFSET_COMPRESSION] = 1;
        assert!(matches!(
            BmpHeader::parse(&bytes, "test"),
            Err(AssetError::CorruptAsset { .. })
        ));
    }

    #[test]
    fn short_header_is_corrupt() {
        let err = BmpHeader::parse(&[b'B', b'M', 0, 0], "test").unwrap_err();
        assert!(matches!(err, AssetError::CorruptAsset { .. }));
    }

    #[test]
    fn truncated_pixels_are_corrupt() {
        let mut bytes = header(2, 2, 0, 0);
        bytes.extend_from_slice(&[0; 5]);
        assert!(matches!(
            decode_bmp(&bytes, "test"),
            Err(AssetError::CorruptAsset { .. })
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        assert!(matches!(
            load_bmp("/no/such/road.bmp"),
            Err(AssetError::ResourceNotFound { .. })
        ));
    }
}
