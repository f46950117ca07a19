// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;
mod scene;

use anyhow::{Context as _, Result};
use clap::Parser;
use config::AppCfg;
use prism_core::{init_tracing, FpsCounter, FrameClock, ShutdownSignal};
use prism_math::{integrate, CameraState, LightRig, Projection};
use prism_platform::{Action, InputTracker, ShadingKey};
use prism_render::{
    FrameError, FrameStatus, LightUniform, RenderSize, Renderer, SceneUniform, Technique, VsyncMode,
};
use prism_render_vk::VkRenderer;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use prism_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, default_value = "prism.toml")]
    config: PathBuf,
    /// Shading model: normal | view | light | blinn-phong | pbr
    #[arg(long)]
    technique: Option<String>,
    /// Present without waiting for vertical blank
    #[arg(long)]
    no_vsync: bool,
}

fn technique_for(key: ShadingKey) -> Technique {
    match key {
        ShadingKey::NormalDirection => Technique::NormalDirection,
        ShadingKey::ViewDirection => Technique::ViewDirection,
        ShadingKey::LightDirection => Technique::LightDirection,
        ShadingKey::BlinnPhong => Technique::BlinnPhong,
        ShadingKey::Pbr => Technique::Pbr,
    }
}

/// Swapchain creation needs a non-zero extent. A window that starts with
/// zero area is built at 1x1 and paused until a real size arrives.
fn initial_size(width: u32, height: u32) -> (RenderSize, bool) {
    let size = RenderSize {
        width: width.max(1),
        height: height.max(1),
    };
    (size, width == 0 || height == 0)
}

// Field order matters: the renderer must drop before the window it draws to.
struct App {
    cfg: AppCfg,
    renderer: Option<VkRenderer>,
    window: Option<Window>,
    render_size: RenderSize,
    shutdown: ShutdownSignal,

    input: InputTracker,
    camera: CameraState,
    projection: Projection,
    lights: LightRig,
    technique: Technique,

    clock: FrameClock,
    fps: FpsCounter,
    paused: bool,
    exiting: bool,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppCfg) -> Self {
        App {
            renderer: None,
            window: None,
            render_size: RenderSize {
                width: 1,
                height: 1,
            },
            shutdown: ShutdownSignal::new(),
            input: InputTracker::new(),
            camera: cfg.camera(),
            projection: cfg.projection(),
            lights: cfg.light_rig(),
            technique: cfg.technique(),
            clock: FrameClock::new(),
            fps: FpsCounter::new(Duration::from_secs(1)),
            paused: false,
            exiting: false,
            fatal: None,
            cfg,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = event_loop
            .create_window(Window::default_attributes().with_title("prism"))
            .context("create_window")?;
        let size = window.inner_size();
        let (initial, zero_area) = initial_size(size.width, size.height);
        self.render_size = RenderSize {
            width: size.width,
            height: size.height,
        };

        let settings = self.cfg.frame_config();
        let mut renderer = VkRenderer::new(
            &window,
            &window,
            initial,
            &settings,
            self.shutdown.clone(),
        )?;
        if zero_area {
            info!("window has zero area; rendering paused");
            renderer.resize(self.render_size);
        }
        let scene = scene::build();
        renderer
            .load_scene(&scene.mesh, &scene.materials)
            .context("load_scene")?;
        info!(
            "scene: {} triangles, {} materials, {} path, technique {}, vsync {:?}",
            scene.mesh.face_materials.len(),
            scene.materials.len(),
            settings.path,
            self.technique,
            settings.vsync
        );

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.clock = FrameClock::new();
        Ok(())
    }

    fn shut_down(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        self.exiting = true;
        self.shutdown.request();
        if let Some(r) = &self.renderer {
            if let Err(e) = r.wait_idle() {
                warn!("wait_idle on shutdown: {e}");
            }
        }
        self.renderer = None;
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("fatal: {err:#}");
        self.fatal = Some(err);
        self.shut_down(event_loop);
    }

    fn frame_failed(&mut self, event_loop: &ActiveEventLoop, err: FrameError) {
        error!(
            "{} failed{}",
            err.operation(),
            if err.is_device_lost() { " (device lost)" } else { "" }
        );
        self.fail(event_loop, err.into());
    }

    fn on_action(&mut self, event_loop: &ActiveEventLoop, action: Action) {
        match action {
            Action::Quit => {
                info!("quit requested");
                self.shut_down(event_loop);
            }
            Action::SetLightCount(n) => {
                self.lights.set_active(n);
                info!("active lights = {}", self.lights.active);
            }
            Action::ToggleLightOrbit => {
                self.lights.toggle_moveable();
                info!("light orbit = {}", self.lights.moveable);
            }
            Action::Shading(key) => {
                let t = technique_for(key);
                if t != self.technique {
                    self.technique = t;
                    if let Some(r) = &mut self.renderer {
                        r.set_technique(t);
                    }
                    info!("technique = {t}");
                }
            }
        }
    }

    fn scene_uniform(&self) -> SceneUniform {
        let lights = self.lights.lights.map(|l| LightUniform {
            position: l.position.to_array(),
            colour: l.colour.to_array(),
        });
        SceneUniform::new(
            self.camera.view(),
            self.projection.matrix(self.render_size.width, self.render_size.height),
            self.camera.position,
            lights,
            self.lights.active,
            self.technique.code(),
        )
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let dt = self.clock.tick();
        let input = self.input.take_frame();
        self.camera = integrate(self.camera, &input, dt);
        self.lights = self.lights.advance(dt);
        let uniform = self.scene_uniform();

        let Some(renderer) = &mut self.renderer else {
            return;
        };
        match renderer.render(&uniform) {
            Ok(FrameStatus::Presented) => self.fps.frame(),
            Ok(FrameStatus::Skipped) => debug!("frame skipped; swapchain rebuilt"),
            Ok(FrameStatus::Paused) => {}
            Ok(FrameStatus::TimedOut) => debug!("frame wait timed out; back to the event loop"),
            Ok(FrameStatus::Cancelled) => self.shut_down(event_loop),
            Err(e) => self.frame_failed(event_loop, e),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && !self.exiting {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        }

        self.paused = self.render_size.width == 0 || self.render_size.height == 0;
        info!("resumed → paused={}", self.paused);
        if !self.paused {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        match &self.window {
            Some(window) if window_id == window.id() => {}
            _ => return,
        }

        if let Some(action) = self.input.handle(&event) {
            self.on_action(event_loop, action);
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shut_down(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                self.render_size = RenderSize {
                    width: new_size.width,
                    height: new_size.height,
                };
                self.paused = new_size.width == 0 || new_size.height == 0;
                debug!(
                    "Resized → {}x{} (paused={})",
                    new_size.width, new_size.height, self.paused
                );
                if let Some(r) = &mut self.renderer {
                    r.resize(self.render_size);
                }
                if !self.paused {
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }

            WindowEvent::Occluded(occluded) => {
                let now_paused =
                    occluded || self.render_size.width == 0 || self.render_size.height == 0;
                if self.paused != now_paused {
                    self.paused = now_paused;
                    info!("Occluded={} → paused={}", occluded, self.paused);
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting || self.paused {
                    return;
                }
                self.redraw(event_loop);
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }

        if self.paused {
            event_loop.set_control_flow(ControlFlow::Wait);
            self.fps.reset();
            return;
        }

        // Vsync paces through the acquire; without it keep the loop spinning.
        event_loop.set_control_flow(match self.cfg.vsync() {
            VsyncMode::Off => ControlFlow::Poll,
            VsyncMode::Fifo | VsyncMode::Mailbox => ControlFlow::Wait,
        });
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        if let Some(n) = self.fps.poll(Instant::now()) {
            info!("fps ~ {n}");
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut cfg = config::load_cfg(&args.config);
    cfg.apply_overrides(args.technique.as_deref(), args.no_vsync);

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
