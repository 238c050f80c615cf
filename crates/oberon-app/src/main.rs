// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;
mod scene;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use oberon_core::init_tracing;
use oberon_math::{perspective, Vec3};
use oberon_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    raw_window_handle::HasDisplayHandle,
    window::{Window, WindowId},
};
use oberon_platform::{Event, Key};
use oberon_render::VertexType;
use oberon_render_vk::{
    physical::format_uuid, Camera, ContextInfo, DeviceFilter, DeviceInfo, GraphicsContext,
    GraphicsDevice, Mesh, PhysicalGraphicsDevice, RenderWindow, Renderer,
};
use tracing::{error, info, warn};

use config::{load_cfg, AppCfg};
use scene::{
    cube_vertices, frame_resize, on_key_press, spin, SceneKind, ASPECT, CAMERA_SPEED, FAR,
    FOV_DEGREES, NEAR,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "oberon.toml")]
    config: PathBuf,
    /// Use only the device with this UUID (overrides the config file)
    #[arg(long)]
    device_uuid: Option<String>,
    /// Exit after this many presented frames
    #[arg(long)]
    frames: Option<u64>,
    #[command(subcommand)]
    scene: Option<SceneKind>,
}

struct CubeScene {
    mesh: Mesh,
    /// One per window, same order.
    cameras: Vec<Camera>,
    eye: Vec3,
}

/// Field order is teardown order.
struct Gpu {
    renderer: Renderer,
    cube: Option<CubeScene>,
    windows: Vec<RenderWindow>,
    device: Arc<GraphicsDevice>,
}

struct App {
    cfg: AppCfg,
    scene: SceneKind,
    device_uuid: Option<String>,
    frame_limit: Option<u64>,

    gpu: Option<Gpu>,
    failure: Option<anyhow::Error>,
    exiting: bool,
    frames: u32,
    presented: u64,
    last_fps_instant: Instant,
    last_tick: Instant,
}

impl App {
    fn init(&self, event_loop: &ActiveEventLoop) -> Result<Gpu> {
        let wcfg = &self.cfg.window;
        let mut sizes = vec![(wcfg.title.clone(), wcfg.width, wcfg.height)];
        if self.scene == SceneKind::Multiwindow {
            sizes.push((format!("{} (2)", wcfg.title), 640, 360));
        }
        let mut native = Vec::with_capacity(sizes.len());
        for (title, width, height) in sizes {
            let attrs = Window::default_attributes()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height));
            let window = event_loop.create_window(attrs).context("create_window")?;
            native.push(Arc::new(window));
        }

        let info = ContextInfo {
            diagnostics: self.cfg.device.diagnostics,
            ..Default::default()
        };
        let display = native[0].display_handle().context("display_handle")?.as_raw();
        let context = GraphicsContext::new(&info, display).context("graphics context")?;

        let uuid = self.device_uuid.as_deref().or(self.cfg.device.uuid());
        let filter = DeviceFilter::resolve(uuid);
        let physical = PhysicalGraphicsDevice::enumerate(&context, native[0].as_ref(), filter)
            .context("enumerate physical devices")?;
        let physical = PhysicalGraphicsDevice::into_preferred(physical)
            .context("no usable Vulkan 1.3 device")?;
        info!(
            "device: {} ({:?}, {}) uuid={}",
            physical.name(),
            physical.device_type(),
            physical.driver_name(),
            format_uuid(physical.uuid())
        );
        let device_info = DeviceInfo {
            pipeline_cache_dir: Some(self.cfg.device.pipeline_cache_dir.clone()),
            ..Default::default()
        };
        let device = GraphicsDevice::new(physical, &device_info).context("graphics device")?;

        let mut windows = Vec::with_capacity(native.len());
        for window in native {
            let mut rw = RenderWindow::new(&device, window).context("render window")?;
            rw.request_presentation_mode(self.cfg.render.present_mode);
            rw.request_image_count(self.cfg.render.image_count);
            rw.show();
            windows.push(rw);
        }

        let renderer = Renderer::for_window(&device, &windows[0], self.cfg.render.sample_count())
            .context("renderer")?;

        let cube = match self.scene {
            SceneKind::TestImage => None,
            SceneKind::Cube | SceneKind::Multiwindow => {
                let mesh =
                    Mesh::from_vertices(&device, VertexType::PositionColor, &cube_vertices())
                        .context("cube mesh")?;
                let proj = perspective(FOV_DEGREES.to_radians(), ASPECT, NEAR, FAR);
                let eye = Vec3::new(0.0, 0.0, 5.0);
                let mut cameras = vec![Camera::new(&device, proj, eye).context("camera")?];
                if windows.len() > 1 {
                    cameras.push(
                        Camera::new(&device, proj, Vec3::new(0.0, 0.0, 2.0)).context("camera")?,
                    );
                }
                for (win, cam) in windows.iter_mut().zip(&cameras) {
                    win.bind_camera(cam);
                }
                Some(CubeScene { mesh, cameras, eye })
            }
        };

        Ok(Gpu {
            renderer,
            cube,
            windows,
            device,
        })
    }

    /// Drains every window's events, advances the scene and draws one frame
    /// per visible window. `false` when the app should exit.
    fn tick(&mut self) -> Result<bool> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(false);
        };

        let mut quit = false;
        for (i, win) in gpu.windows.iter_mut().enumerate() {
            loop {
                match win.poll_events() {
                    Event::None => break,
                    Event::WindowClose => {
                        win.hide();
                        quit |= i == 0;
                    }
                    Event::KeyPress { .. } => {
                        quit |= on_key_press(win) && i == 0;
                        if let (0, Some(cube)) = (i, gpu.cube.as_mut()) {
                            let ev = win.events();
                            let step = CAMERA_SPEED * dt;
                            if ev.is_key_pressed(Key::W) {
                                cube.eye.y -= step;
                            }
                            if ev.is_key_pressed(Key::S) {
                                cube.eye.y += step;
                            }
                            if ev.is_key_pressed(Key::A) {
                                cube.eye.z -= step;
                            }
                            if ev.is_key_pressed(Key::D) {
                                cube.eye.z += step;
                            }
                            cube.cameras[0].look_at(cube.eye, Vec3::ZERO);
                        }
                    }
                    _ => {}
                }
            }
        }
        if quit {
            return Ok(false);
        }

        if let Some(cube) = gpu.cube.as_mut() {
            cube.mesh.set_transform(spin(cube.mesh.transform(), dt));
        }

        if let Some(primary) = gpu.windows.first() {
            let drawable = primary.current_drawable_rect().extent;
            if let Some(extent) = frame_resize(gpu.renderer.extent(), drawable) {
                gpu.renderer.resize(extent)?;
            }
        }

        for (i, win) in gpu.windows.iter_mut().enumerate() {
            if !win.is_shown() {
                continue;
            }
            let Some(mut frame) = gpu.renderer.begin_frame(win)? else {
                continue;
            };
            match gpu.cube.as_mut() {
                None => frame.draw_test_image()?,
                Some(cube) => {
                    let cam = cube.cameras.len().saturating_sub(1).min(i);
                    frame.draw(&mut cube.cameras[cam], &mut cube.mesh)?;
                }
            }
            frame.end_frame(win)?;
            if i == 0 {
                self.frames = self.frames.saturating_add(1);
                self.presented += 1;
            }
        }

        Ok(self.frame_limit.map_or(true, |n| self.presented < n))
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        if let Some(gpu) = self.gpu.take() {
            let device = Arc::clone(&gpu.device);
            drop(gpu);
            match device.live_allocations() {
                0 => info!("teardown complete, no live allocations"),
                n => warn!("teardown complete, {n} allocation(s) still live"),
            }
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_none() && !self.exiting {
            match self.init(event_loop) {
                Ok(gpu) => {
                    info!("scene = {:?}", self.scene);
                    self.gpu = Some(gpu);
                    self.last_tick = Instant::now();
                }
                Err(e) => {
                    error!("init failed: {e:#}");
                    self.failure = Some(e);
                    self.shutdown(event_loop);
                    return;
                }
            }
        }
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let primary = gpu.windows.first().map(RenderWindow::id);
        if let Some(win) = gpu.windows.iter_mut().find(|w| w.id() == window_id) {
            win.handle_window_event(&event);
        }

        if matches!(event, WindowEvent::RedrawRequested) && primary == Some(window_id) {
            if self.exiting {
                return;
            }
            match self.tick() {
                Ok(true) => {}
                Ok(false) => self.shutdown(event_loop),
                Err(e) => {
                    error!("render error: {e:#}");
                    self.failure = Some(e);
                    self.shutdown(event_loop);
                }
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if let Some(w) = self.gpu.as_ref().and_then(|g| g.windows.first()) {
            w.window().request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = load_cfg(&args.config);
    let event_loop: EventLoop<()> = EventLoop::new()?;

    let mut app = App {
        cfg,
        scene: args.scene.unwrap_or_default(),
        device_uuid: args.device_uuid,
        frame_limit: args.frames,
        gpu: None,
        failure: None,
        exiting: false,
        frames: 0,
        presented: 0,
        last_fps_instant: Instant::now(),
        last_tick: Instant::now(),
    };

    event_loop.run_app(&mut app)?;
    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
