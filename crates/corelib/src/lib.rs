//! Core types: math re-exports, Transform, Camera, game configuration.

pub use glam::{Mat4, Vec3, vec3};

pub mod camera;
pub mod config;
pub mod transform;
