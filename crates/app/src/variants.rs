//! Demo scenes: one object each, drawn every frame.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use asset::{
    mesh::VertexAttributes,
    obj::{self, ObjOptions},
    shader::ShaderSources,
    texture::TextureData,
};
use corelib::{Vec3, camera::Camera, config::GameConfig, transform::Transform};
use platform::Scene;
use renderer::{
    Frame, GpuContext,
    object::RenderObject,
    program::{Program, ProgramLayout},
    texture::GpuTexture,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Two-triangle road quad, BMP texture.
    Quad,
    /// OBJ mesh with a DDS texture.
    Mesh,
    /// Vertex-colored triangle.
    Triangle,
}

impl Variant {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quad" | "road" => Some(Self::Quad),
            "mesh" | "obj" => Some(Self::Mesh),
            "triangle" | "tri" => Some(Self::Triangle),
            _ => None,
        }
    }

    fn shader_names(self) -> (&'static str, &'static str) {
        match self {
            Self::Quad | Self::Mesh => ("textured.vert", "textured.frag"),
            Self::Triangle => ("colored.vert", "colored.frag"),
        }
    }
}

/// Everything a scene needs from disk, loaded before the window opens.
pub struct SceneAssets {
    shaders: ShaderSources,
    texture: Option<(String, TextureData)>,
    attributes: VertexAttributes,
}

impl SceneAssets {
    pub fn load(variant: Variant, assets: &Path) -> Result<Self> {
        let (vs, fs) = variant.shader_names();
        let shaders_dir = assets.join("shaders");
        let shaders = ShaderSources::load(shaders_dir.join(vs), shaders_dir.join(fs))?;

        let (attributes, texture_path) = match variant {
            Variant::Quad => (road_quad(), Some(assets.join("textures").join("road.bmp"))),
            Variant::Mesh => {
                let path = assets.join("models").join("cube.obj");
                let attrs = obj::load_obj_from_path(&path, &ObjOptions::flipped_v())
                    .with_context(|| format!("loading mesh {}", path.display()))?;
                (attrs, Some(assets.join("textures").join("cube.dds")))
            }
            Variant::Triangle => (colored_triangle(), None),
        };

        let texture = texture_path.map(|path| load_texture(&path)).transpose()?;

        Ok(Self {
            shaders,
            texture,
            attributes,
        })
    }
}

fn load_texture(path: &Path) -> Result<(String, TextureData)> {
    let data =
        TextureData::load(path).with_context(|| format!("loading texture {}", path.display()))?;
    Ok((path.display().to_string(), data))
}

/// Camera-only transform from the config's aspect ratio.
pub fn initial_transform(config: &GameConfig) -> Transform {
    Transform::from_camera(&Camera::game_default(config.aspect()))
}

pub struct VariantScene {
    assets: Option<SceneAssets>,
    transform: Transform,
    drift: Vec3,
    object: Option<RenderObject>,
}

impl VariantScene {
    /// `drift` is composed into the object's transform every frame.
    pub fn new(assets: SceneAssets, transform: Transform, drift: Vec3) -> Self {
        Self {
            assets: Some(assets),
            transform,
            drift,
            object: None,
        }
    }
}

impl Scene for VariantScene {
    fn init(&mut self, gpu: &GpuContext) -> Result<()> {
        let Some(assets) = self.assets.take() else {
            return Ok(());
        };
        let texture = assets
            .texture
            .map(|(label, data)| GpuTexture::upload(gpu, &data, &label).map(Arc::new))
            .transpose()
            .context("uploading texture")?;

        let layout = ProgramLayout::for_attributes(&assets.attributes, texture.is_some());
        let program = Arc::new(Program::compile(gpu, &assets.shaders, layout)?);

        let object = RenderObject::new(gpu, program, texture, assets.attributes, self.transform)
            .context("creating render object")?;
        log::info!("Scene ready: {} vertices", object.vertex_count());
        self.object = Some(object);
        Ok(())
    }

    fn frame(&mut self, gpu: &GpuContext, frame: &mut Frame) -> Result<()> {
        if let Some(object) = self.object.as_mut() {
            if self.drift != Vec3::ZERO {
                object.translate(self.drift);
            }
            object.draw(gpu, frame);
        }
        Ok(())
    }
}

/// 4x4 quad in the z = 0 plane, two triangles.
fn road_quad() -> VertexAttributes {
    VertexAttributes::new(vec![
        [-2.0, -2.0, 0.0],
        [2.0, -2.0, 0.0],
        [-2.0, 2.0, 0.0],
        [2.0, 2.0, 0.0],
        [2.0, -2.0, 0.0],
        [-2.0, 2.0, 0.0],
    ])
    .with_uvs(vec![
        [0.0, 0.0],
        [1.0, 0.0],
        [0.0, 1.0],
        [1.0, 1.0],
        [1.0, 0.0],
        [0.0, 1.0],
    ])
}

fn colored_triangle() -> VertexAttributes {
    VertexAttributes::new(vec![[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 0.0]]).with_colors(
        vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    )
}
