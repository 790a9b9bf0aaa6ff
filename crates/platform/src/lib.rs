//! Platform layer: window, event loop and the per-frame drive of a [`Scene`].
//!
//! Loop shape per redraw: `begin_frame` (acquire + clear) -> `Scene::frame`
//! -> `end_frame` (submit + present) -> request the next redraw. Closing the
//! window ends the loop; the first init or frame error ends it too and is
//! returned from [`run`].

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use corelib::config::GameConfig;
use renderer::{Frame, GpuContext, GpuSettings};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

/// What the frame driver runs. `init` is called once the GPU is up; `frame`
/// once per redraw between the clear and the present.
pub trait Scene {
    fn init(&mut self, gpu: &GpuContext) -> Result<()>;
    fn frame(&mut self, gpu: &GpuContext, frame: &mut Frame) -> Result<()>;
}

/// Knobs that don't live in `Game.ini`.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub title: String,
    pub backends: wgpu::Backends,
    pub show_fps: bool,
}

/// Open the window and drive `scene` until the window closes.
pub fn run<S: Scene>(config: &GameConfig, options: RunOptions, scene: S) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut driver = Driver {
        config: config.clone(),
        options,
        scene,
        window: None,
        gpu: None,
        fps: FpsCounter::new(),
        error: None,
    };
    event_loop
        .run_app(&mut driver)
        .context("event loop terminated abnormally")?;

    match driver.error {
        Some(err) => Err(err),
        None => {
            log::info!("Window closed");
            Ok(())
        }
    }
}

struct Driver<S> {
    config: GameConfig,
    options: RunOptions,
    scene: S,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    fps: FpsCounter,
    error: Option<anyhow::Error>,
}

impl<S: Scene> Driver<S> {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let settings = GpuSettings {
            backends: self.options.backends,
            samples: self.config.samples,
        };
        let gpu = pollster::block_on(GpuContext::new(window.clone(), settings))
            .context("failed to initialise GPU")?;
        self.scene.init(&gpu).context("scene setup failed")?;

        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };
        let mut frame = match gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) if GpuContext::is_surface_lost(&err) => {
                log::warn!("Surface lost ({err}); reconfiguring");
                gpu.recreate_surface();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("Surface acquire timed out; skipping frame");
                return Ok(());
            }
            Err(err) => return Err(err).context("failed to acquire surface texture"),
        };
        self.scene.frame(gpu, &mut frame)?;
        gpu.end_frame(frame);

        if let Some(fps) = self.fps.tick(Instant::now())
            && self.options.show_fps
        {
            log::info!("FPS: {fps:.1}");
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl<S: Scene> ApplicationHandler for Driver<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::debug!("Resized: {}x{}", size.width, size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, err);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Frames per second, reported about once a second.
struct FpsCounter {
    window_start: Option<Instant>,
    frames: u32,
}

impl FpsCounter {
    const PERIOD: Duration = Duration::from_secs(1);

    fn new() -> Self {
        Self {
            window_start: None,
            frames: 0,
        }
    }

    fn tick(&mut self, now: Instant) -> Option<f64> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.duration_since(start);
        if elapsed < Self::PERIOD {
            return None;
        }
        let fps = f64::from(self.frames) / elapsed.as_secs_f64();
        self.window_start = Some(now);
        self.frames = 0;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_reports_after_a_second() {
        let mut fps = FpsCounter::new();
        let t0 = Instant::now();
        assert_eq!(fps.tick(t0), None);
        for i in 1..60 {
            assert_eq!(fps.tick(t0 + Duration::from_millis(i * 10)), None);
        }
        let reported = fps.tick(t0 + Duration::from_secs(1)).expect("report");
        assert!((reported - 61.0).abs() < 1e-6);
    }

    #[test]
    fn fps_window_restarts() {
        let mut fps = FpsCounter::new();
        let t0 = Instant::now();
        fps.tick(t0);
        assert!(fps.tick(t0 + Duration::from_secs(2)).is_some());
        assert_eq!(fps.tick(t0 + Duration::from_millis(2500)), None);
    }
}
