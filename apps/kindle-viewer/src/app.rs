//! Viewer application state and winit event handling.

use std::sync::Arc;

use kindle_core::EventBus;
use kindle_gpu::{DeviceConfig, DiagnosticsSink, RenderDevice, Swapchain};
use kindle_platform::{forward_event, WindowConfig, WindowProvider};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::WindowId;

use crate::ViewerConfig;

/// winit handler owning the viewer state once the window exists.
pub struct Viewer {
    config: ViewerConfig,
    state: Option<ViewerState>,
}

/// Fields drop in declaration order: swapchain before device, device before
/// the window it presents to.
struct ViewerState {
    swapchain: Option<Swapchain>,
    device: Arc<RenderDevice>,
    bus: Arc<EventBus>,
    window: WindowProvider,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self { config, state: None }
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<ViewerState> {
        let window = WindowProvider::create(
            event_loop,
            &WindowConfig::new("Kindle Viewer").with_size(self.config.width, self.config.height),
        )?;
        let bus = Arc::new(EventBus::new());

        let mut device_config = DeviceConfig::new();
        device_config
            .app_name("Kindle Viewer")
            .app_version(0, 1, 0)
            .validation(self.config.validation)
            .diagnostics_sink(DiagnosticsSink::tracing())
            .event_bus(Arc::clone(&bus));
        window.configure(&mut device_config)?;

        let device = Arc::new(RenderDevice::new(&device_config)?);
        let swapchain = if window.current_pixel_dimensions().is_empty() {
            None
        } else {
            Some(device.create_swapchain()?)
        };

        Ok(ViewerState {
            swapchain,
            device,
            bus,
            window,
        })
    }
}

impl ViewerState {
    /// Rebuild the swapchain when the window changed size, skipping while
    /// minimized.
    fn refresh_swapchain(&mut self) -> kindle_gpu::Result<()> {
        if self.swapchain.is_some() && !self.device.is_resized() {
            return Ok(());
        }
        if self.device.dimensions().is_empty() {
            debug!("Window minimized, deferring swapchain recreation");
            return Ok(());
        }

        let swapchain = match self.swapchain.take() {
            Some(old) => self.device.recreate_swapchain(old)?,
            None => {
                self.device.take_resized();
                self.device.create_swapchain()?
            }
        };
        self.swapchain = Some(swapchain);
        Ok(())
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating viewer state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                info!("Viewer ready on {}", state.device.physical().summary());
                self.state = Some(state);
            }
            Err(e) => {
                error!("Failed to initialize viewer: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        if forward_event(&state.bus, &event) {
            state.window.window().request_redraw();
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    drop(state.swapchain.take());
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = state.refresh_swapchain() {
                    error!("Swapchain recreation failed: {e}");
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }
}
