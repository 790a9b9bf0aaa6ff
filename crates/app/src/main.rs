//! Entry point for NightDrive.
//! Logging, CLI flags, `Game.ini`, then one demo variant until the window closes.

mod variants;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use corelib::{Vec3, config::GameConfig};
use platform::RunOptions;

use variants::{SceneAssets, Variant, VariantScene};

const TITLE: &str = "NightDrive test build";

#[derive(Debug)]
struct Args {
    config: PathBuf,
    backends: Option<wgpu::Backends>,
    variant: Variant,
    assets: PathBuf,
    show_fps: bool,
    drift: Vec3,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from("Game.ini"),
            backends: None,
            variant: Variant::Quad,
            assets: PathBuf::from("assets"),
            show_fps: false,
            drift: Vec3::ZERO,
        }
    }
}

fn parse_backend(val: &str) -> wgpu::Backends {
    // auto|vulkan|dx12|metal|gl
    match val.to_ascii_lowercase().as_str() {
        "auto" => wgpu::Backends::all(),
        "vulkan" | "vk" => wgpu::Backends::VULKAN,
        "dx12" | "d3d12" => wgpu::Backends::DX12,
        "metal" | "mtl" => wgpu::Backends::METAL,
        "gl" | "opengl" | "gles" => wgpu::Backends::GL,
        other => {
            log::warn!("Unknown backend '{other}', falling back to auto.");
            wgpu::Backends::all()
        }
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes")
}

/// `x,y,z` per-frame translation.
fn parse_vec3(val: &str) -> Option<Vec3> {
    let mut parts = val.split(',').map(|p| p.trim().parse::<f32>());
    let v = Vec3::new(parts.next()?.ok()?, parts.next()?.ok()?, parts.next()?.ok()?);
    parts.next().is_none().then_some(v)
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    let mut out = Args::default();
    for arg in args {
        if let Some(val) = arg.strip_prefix("--config=") {
            out.config = PathBuf::from(val);
        } else if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            out.backends = Some(parse_backend(val));
        } else if let Some(val) = arg.strip_prefix("--variant=") {
            match Variant::parse(val) {
                Some(v) => out.variant = v,
                None => log::warn!("Unknown variant '{val}', using {:?}.", out.variant),
            }
        } else if let Some(val) = arg.strip_prefix("--assets=") {
            out.assets = PathBuf::from(val);
        } else if arg == "--show-fps" {
            out.show_fps = true;
        } else if let Some(val) = arg.strip_prefix("--show-fps=") {
            out.show_fps = parse_flag(val);
        } else if let Some(val) = arg.strip_prefix("--drift=") {
            match parse_vec3(val) {
                Some(v) => out.drift = v,
                None => log::warn!("Ignoring malformed --drift '{val}' (expected x,y,z)."),
            }
        }
    }
    out
}

fn run(args: Args) -> Result<()> {
    let config = GameConfig::load(&args.config)
        .with_context(|| format!("Could not read configuration file {}", args.config.display()))?;

    // `API=OpenGL` maps onto wgpu's GL backend unless the CLI says otherwise.
    let backends = args.backends.unwrap_or(wgpu::Backends::GL);
    log::info!(
        "Starting NightDrive. Variant: {:?}, backend: {:?}, window: {}x{}, samples: {}",
        args.variant,
        backends,
        config.width,
        config.height,
        config.samples
    );

    let assets = SceneAssets::load(args.variant, &args.assets)?;
    let scene = VariantScene::new(assets, variants::initial_transform(&config), args.drift);

    platform::run(
        &config,
        RunOptions {
            title: TITLE.to_string(),
            backends,
            show_fps: args.show_fps,
        },
        scene,
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args(std::env::args().skip(1));
    match run(args) {
        Ok(()) => {
            log::info!("Graceful shutdown. Bye!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Args {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults() {
        let a = args(&[]);
        assert_eq!(a.config, PathBuf::from("Game.ini"));
        assert_eq!(a.variant, Variant::Quad);
        assert!(a.backends.is_none());
        assert!(!a.show_fps);
        assert_eq!(a.drift, Vec3::ZERO);
    }

    #[test]
    fn parses_all_flags() {
        let a = args(&[
            "--config=cfg/Other.ini",
            "--gpu-backend=vk",
            "--variant=triangle",
            "--assets=data",
            "--show-fps",
            "--drift=0,-0.01,0",
        ]);
        assert_eq!(a.config, PathBuf::from("cfg/Other.ini"));
        assert_eq!(a.backends, Some(wgpu::Backends::VULKAN));
        assert_eq!(a.variant, Variant::Triangle);
        assert_eq!(a.assets, PathBuf::from("data"));
        assert!(a.show_fps);
        assert_eq!(a.drift, Vec3::new(0.0, -0.01, 0.0));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let a = args(&["--variant=cube", "--drift=1,2", "--show-fps=off"]);
        assert_eq!(a.variant, Variant::Quad);
        assert_eq!(a.drift, Vec3::ZERO);
        assert!(!a.show_fps);
    }

    #[test]
    fn unknown_backend_is_auto() {
        assert_eq!(parse_backend("glide"), wgpu::Backends::all());
        assert_eq!(parse_backend("OpenGL"), wgpu::Backends::GL);
    }

    #[test]
    fn vec3_needs_exactly_three_parts() {
        assert_eq!(parse_vec3("1, 2, 3"), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(parse_vec3("1,2,3,4"), None);
        assert_eq!(parse_vec3("a,b,c"), None);
    }
}
