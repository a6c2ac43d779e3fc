// app.rs
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::error::{DemoError, Result};
use crate::input::{command_for_key, Command};
use crate::renderer::scene_renderer::SceneRenderer;
use crate::renderer::wgpu_device::WgpuDevice;
use crate::scene::demo::build_demo_scene;
use crate::settings::RenderSettings;
use crate::time::Clock;

const TITLE: &str = "Planar shadows";

pub struct App {
    settings: RenderSettings,
    window: Option<Arc<Window>>,
    renderer: Option<SceneRenderer<WgpuDevice>>,
    clock: Clock,
    error: Option<DemoError>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            window: None,
            renderer: None,
            clock: Clock::start(),
            error: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let size = self.settings.window_size;
        let attributes = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(size, size));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let device = pollster::block_on(WgpuDevice::new(Arc::clone(&window), &self.settings))
            .map_err(|source| DemoError::init("graphics device", source))?;
        let (width, height) = device.surface_size();

        let mut renderer = SceneRenderer::new(device, width, height, &self.settings)?;
        build_demo_scene(&mut renderer)?;
        renderer.ensure_ready()?;

        self.clock = Clock::start();
        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: DemoError) {
        log::error!("{}", err);
        self.error = Some(err);
        // release device resources before the loop winds down
        self.renderer = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.error.is_some() {
            return;
        }
        if let Err(err) = self.initialize(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|w| w.id()) != Some(id) {
            return;
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                renderer.device_mut().resize(size.width, size.height);
                renderer.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = renderer.render_frame(self.clock.seconds()) {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match command_for_key(code) {
                Some(Command::Quit) => event_loop.exit(),
                Some(command) => {
                    if let Err(err) = renderer.apply(command) {
                        self.fail(event_loop, err);
                    }
                }
                None => {}
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.renderer = None;
        log::info!("Scene resources released");
    }
}
