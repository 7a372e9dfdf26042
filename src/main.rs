use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use glam::{UVec2, Vec2, Vec3};
use log::{error, info};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::PhysicalKey;
use winit::window::WindowBuilder;

use pathtracer::app::{print_scene_summary, CameraController};
use pathtracer::{obj, Camera, Renderer, Scene};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let scene = options.load_scene();
    print_scene_summary(&scene);

    if options.summary_only {
        return Ok(());
    }

    match run_interactive(&scene) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!("{err}. Set DISPLAY or pass --summary-only to run headless.");
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn run_interactive(scene: &Scene) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| WindowInitError::from_error("event loop", err))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("PathTracer")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let size = window.inner_size();
    let mut camera = Camera::new(
        Vec3::ZERO,
        Vec3::new(0.0, 0.0, 5.0),
        UVec2::new(size.width, size.height),
    );
    let renderer = block_on(Renderer::new(Arc::clone(&window), scene, &mut camera))?;

    let mut app = AppState {
        renderer,
        camera,
        controller: CameraController::new(),
        last_error: None,
    };

    event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { window_id, event } if window_id == app.renderer.window_id() => {
                app.handle_window_event(event, elwt);
            }
            Event::AboutToWait => app.renderer.window().request_redraw(),
            _ => {}
        }
    })?;

    if let Some(err) = app.last_error.take() {
        return Err(err);
    }
    Ok(())
}

struct AppState {
    renderer: Renderer,
    camera: Camera,
    controller: CameraController,
    last_error: Option<anyhow::Error>,
}

impl AppState {
    fn handle_window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<()>) {
        match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => {
                self.renderer.resize(&mut self.camera, size);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                if let Some(offset) = self.controller.key_offset(code, &self.camera) {
                    self.camera.move_by(offset);
                    self.renderer.update_camera(&mut self.camera);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.controller
                    .set_button(button, state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                if self.controller.cursor_moved(position, &mut self.camera) {
                    self.renderer.update_camera(&mut self.camera);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 60.0,
                };
                if amount != 0.0 && self.controller.scroll(amount, &mut self.camera) {
                    self.renderer.update_camera(&mut self.camera);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(elwt),
            _ => {}
        }
    }

    fn redraw(&mut self, elwt: &EventLoopWindowTarget<()>) {
        if let Err(err) = self.renderer.draw() {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(&mut self.camera, size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    self.last_error = Some(anyhow!("GPU is out of memory"));
                    elwt.exit();
                }
                wgpu::SurfaceError::Timeout => {
                    info!("Surface timeout; retrying next frame");
                }
            }
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

struct CliOptions {
    mesh: Option<PathBuf>,
    material_dir: Option<PathBuf>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut options = Self {
            mesh: None,
            material_dir: None,
            summary_only: false,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => options.summary_only = true,
                "--material-dir" => {
                    let dir = args
                        .next()
                        .ok_or_else(|| anyhow!("--material-dir requires a path"))?;
                    options.material_dir = Some(PathBuf::from(dir));
                }
                other if other.starts_with('-') => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: pathtracer [mesh.obj] [--material-dir <dir>] [--summary-only]"
                    ));
                }
                path => {
                    if options.mesh.is_some() {
                        return Err(anyhow!("only one mesh file may be given"));
                    }
                    options.mesh = Some(PathBuf::from(path));
                }
            }
        }
        Ok(options)
    }

    /// Loads the requested mesh, falling back to the built-in triangle when
    /// no mesh was given or the file cannot be loaded.
    fn load_scene(&self) -> Scene {
        let Some(path) = &self.mesh else {
            return Scene::default();
        };
        match obj::load_scene(path, self.material_dir.as_deref()) {
            Ok(scene) => scene,
            Err(err) => {
                error!("failed to load {}: {err}", path.display());
                Scene::default()
            }
        }
    }
}
