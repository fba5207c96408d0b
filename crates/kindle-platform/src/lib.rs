//! Platform integration for the Kindle engine.
//!
//! Adapts a winit window to the collaborators a
//! [`DeviceConfig`](kindle_gpu::DeviceConfig) needs: pixel dimensions,
//! surface creation and the instance extensions the display server
//! requires. Window events are forwarded onto a [`kindle_core::EventBus`].

use std::ffi::CString;
use std::sync::Arc;

use kindle_core::{Dimensions, Event, EventBus};
use kindle_gpu::DeviceConfig;
use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Window handle unavailable: {0}")]
    Handle(#[from] kindle_gpu::GpuError),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Window configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Kindle".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

impl WindowConfig {
    /// Create a config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the initial inner size in pixels.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// winit attributes for this configuration.
    pub fn attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }
}

/// A winit window acting as the device's window collaborator.
#[derive(Clone, Debug)]
pub struct WindowProvider {
    window: Arc<Window>,
}

impl WindowProvider {
    /// Open a window on `event_loop`.
    pub fn create(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let window = event_loop
            .create_window(config.attributes())
            .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;
        tracing::info!(
            "Created window {:?} ({}x{})",
            config.title,
            config.width,
            config.height
        );
        Ok(Self::new(Arc::new(window)))
    }

    /// Wrap an existing window.
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    /// The wrapped window.
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Current framebuffer size in pixels.
    pub fn current_pixel_dimensions(&self) -> Dimensions {
        to_dimensions(self.window.inner_size())
    }

    /// Instance extensions the window's display server needs.
    pub fn required_instance_extensions(&self) -> Result<Vec<CString>> {
        Ok(kindle_gpu::window_instance_extensions(self.window.as_ref())?)
    }

    /// Install the dimensions and surface callbacks plus the required
    /// instance extensions (merged with any already configured).
    ///
    /// The window must stay open until the device built from `config` is
    /// dropped.
    pub fn configure(&self, config: &mut DeviceConfig) -> Result<()> {
        let mut extensions = config.required_instance_extensions().to_vec();
        for name in self.required_instance_extensions()? {
            if !extensions.contains(&name) {
                extensions.push(name);
            }
        }

        let dims_window = Arc::clone(&self.window);
        let surface_window = Arc::clone(&self.window);
        config
            .instance_extensions(extensions)
            .dimensions(move || to_dimensions(dims_window.inner_size()))
            .surface(move |entry, instance| {
                // SAFETY: the provider's owner keeps the window open until
                // the device, and with it the surface, is dropped.
                unsafe {
                    kindle_gpu::create_window_surface(entry, instance, surface_window.as_ref())
                }
            });
        Ok(())
    }
}

/// Translate window events the engine cares about onto `bus`. Returns
/// whether anything was emitted.
pub fn forward_event(bus: &EventBus, event: &WindowEvent) -> bool {
    match event {
        WindowEvent::Resized(size) => {
            bus.emit(&Event::Resized(to_dimensions(*size)));
            true
        }
        _ => false,
    }
}

fn to_dimensions(size: PhysicalSize<u32>) -> Dimensions {
    Dimensions::new(size.width, size.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindle_core::EventKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn resize_is_forwarded_with_pixel_size() {
        let bus = EventBus::new();
        let width = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&width);
        bus.add(EventKind::Resized, move |event| {
            let Event::Resized(dims) = event;
            seen.store(dims.width * 10_000 + dims.height, Ordering::SeqCst);
        });

        let forwarded = forward_event(
            &bus,
            &WindowEvent::Resized(PhysicalSize::new(800, 600)),
        );
        assert!(forwarded);
        assert_eq!(width.load(Ordering::SeqCst), 8_000_600);
    }

    #[test]
    fn other_events_are_ignored() {
        let bus = EventBus::new();
        assert!(!forward_event(&bus, &WindowEvent::CloseRequested));
        assert!(!forward_event(&bus, &WindowEvent::Focused(true)));
    }

    #[test]
    fn window_config_builder() {
        let config = WindowConfig::new("viewer").with_size(640, 480);
        assert_eq!(config.title, "viewer");
        assert_eq!((config.width, config.height), (640, 480));
        assert!(config.resizable);
        assert_eq!(to_dimensions(PhysicalSize::new(3, 4)), Dimensions::new(3, 4));
    }
}
