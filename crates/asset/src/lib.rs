//! Asset loading/parsers (meshes, textures, shaders).
//!
//! Everything here is CPU-side and GPU-agnostic: loaders return plain data
//! or an [`AssetError`], and the caller decides whether a failure is fatal.

pub mod bmp;
pub mod dds;
pub mod error;
pub mod mesh;
pub mod obj;
pub mod shader;
pub mod texture;

pub use error::{AssetError, AssetResult};
