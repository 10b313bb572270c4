use anyhow::Context;
use ash::vk;
use kiln_renderer::renderer::{FrameOutcome, Renderer};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{app_config::AppConfig, demo_scene::DemoScene, frame_timer::FrameTimer, stats_overlay::StatsOverlay};

/// Logs a fatal error and aborts; renderer errors leave the GPU in a state nothing can recover.
pub fn fatal(err: anyhow::Error) -> ! {
    log::error!("{:?}", err);
    std::process::abort()
}

fn window_extent(window: &Window) -> vk::Extent2D {
    let size = window.inner_size();
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

/// Lives between `resumed` and the end of the event loop.
struct AppState {
    scene: DemoScene,
    renderer: Renderer,
    // dropped after the renderer has released the surface
    window: Window,
}

impl AppState {
    fn new(event_loop: &ActiveEventLoop, config: &AppConfig) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("AppState::new");
        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title("kiln")
                    .with_inner_size(winit::dpi::LogicalSize::new(1280.0, 800.0)),
            )
            .context("failed to create the window")?;

        let mut renderer = Renderer::new(
            window.display_handle()?.as_raw(),
            window.window_handle()?.as_raw(),
            window_extent(&window),
            config.settings.clone(),
        )?;
        renderer.set_ui_overlay(Some(Box::new(StatsOverlay::default())));
        let scene = DemoScene::new(&mut renderer, config.texture_path.as_deref())?;

        Ok(Self { scene, renderer, window })
    }

    fn redraw(&mut self, timer: &FrameTimer) -> anyhow::Result<()> {
        let _span = tracy_client::span!("AppState::redraw");
        self.scene.update(timer.delta_time_s());
        let items = self.scene.render_items()?;
        let camera = self.scene.camera(self.renderer.extent());

        match self.renderer.render(&items, &camera)? {
            FrameOutcome::Presented => (),
            outcome => log::trace!("frame skipped: {:?}", outcome),
        }
        Ok(())
    }

    /// Scene first, then the renderer, then the window.
    fn destroy(self) -> anyhow::Result<()> {
        let Self {
            scene,
            mut renderer,
            window,
        } = self;
        renderer.wait_for_device_idle()?;
        scene.destroy(&mut renderer)?;
        renderer.destroy()?;
        drop(window);
        Ok(())
    }
}

pub struct WinitApp {
    config: AppConfig,
    timer: FrameTimer,
    state: Option<AppState>,
}
// run
impl WinitApp {
    /// Runs the demo until the window closes.
    pub fn run() -> anyhow::Result<()> {
        kiln_crate_tools::init_log::init_log();
        let _tracy = tracy_client::Client::start();

        let config = AppConfig::from_env()?;
        log::info!("settings: {:?}", config.settings);

        let event_loop = EventLoop::new().context("failed to create the event loop")?;
        let mut app = Self {
            config,
            timer: FrameTimer::default(),
            state: None,
        };
        event_loop.run_app(&mut app)?;
        log::info!("event loop finished");

        app.destroy()
    }

    fn destroy(&mut self) -> anyhow::Result<()> {
        match self.state.take() {
            Some(state) => state.destroy(),
            None => Ok(()),
        }
    }
}
impl ApplicationHandler for WinitApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            log::warn!("resumed with a live window, ignoring");
            return;
        }
        match AppState::new(event_loop, &self.config) {
            Ok(state) => self.state = Some(state),
            Err(e) => fatal(e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.renderer.notify_resized(vk::Extent2D {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::KeyN => state.scene.toggle_nearest(),
                KeyCode::Escape => event_loop.exit(),
                _ => (),
            },
            WindowEvent::RedrawRequested => {
                if self.timer.time_to_render(state.renderer.settings().frame_limit) {
                    self.timer.tick();
                    if let Err(e) = state.redraw(&self.timer) {
                        fatal(e);
                    }
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_ref() {
            state.window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("exiting");
    }
}
