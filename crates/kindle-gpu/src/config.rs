//! Device configuration.

use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::Result;
use crate::version::VersionInfo;
use ash::vk;
use kindle_core::{Dimensions, EventBus};
use std::ffi::{CStr, CString};
use std::sync::Arc;

/// Yields the window's current framebuffer size in pixels.
pub type DimensionsCallback = Arc<dyn Fn() -> Dimensions + Send + Sync>;

/// Creates a surface for the window against a live instance.
pub type SurfaceCallback = Box<dyn Fn(&ash::Entry, &ash::Instance) -> Result<vk::SurfaceKHR>>;

/// Engine identity reported in the application info.
pub const ENGINE_NAME: &CStr = c"Kindle";
pub const ENGINE_VERSION: VersionInfo = VersionInfo::from_semver(0, 1, 0);

/// Validation layers enabled when validation is on.
pub const VALIDATION_LAYERS: &[&CStr] = &[c"VK_LAYER_KHRONOS_validation"];

/// Everything [`RenderDevice::new`](crate::context::RenderDevice::new)
/// needs. Populate with the chained setters, then pass by reference.
pub struct DeviceConfig {
    pub(crate) app_name: String,
    pub(crate) app_version: VersionInfo,
    pub(crate) api_version: VersionInfo,
    pub(crate) instance_extensions: Vec<CString>,
    pub(crate) device_extensions: Vec<CString>,
    pub(crate) validation: bool,
    pub(crate) validation_features: Vec<vk::ValidationFeatureEnableEXT>,
    pub(crate) diagnostics: DiagnosticsSink,
    pub(crate) dimensions: Option<DimensionsCallback>,
    pub(crate) surface: Option<SurfaceCallback>,
    pub(crate) event_bus: Option<Arc<EventBus>>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("Kindle"),
            app_version: VersionInfo::from_semver(0, 1, 0),
            api_version: VersionInfo::V1_2,
            instance_extensions: Vec::new(),
            device_extensions: vec![ash::khr::swapchain::NAME.to_owned()],
            validation: cfg!(debug_assertions),
            validation_features: vec![vk::ValidationFeatureEnableEXT::SYNCHRONIZATION_VALIDATION],
            diagnostics: DiagnosticsSink::discard(),
            dimensions: None,
            surface: None,
            event_bus: None,
        }
    }
}

impl DeviceConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.app_name = name.into();
        self
    }

    /// Set the application version.
    pub fn app_version(&mut self, major: u32, minor: u32, patch: u32) -> &mut Self {
        self.app_version = VersionInfo::from_semver(major, minor, patch);
        self
    }

    /// Set the API version requested from the instance and required of
    /// physical devices.
    pub fn api_version(&mut self, version: VersionInfo) -> &mut Self {
        self.api_version = version;
        self
    }

    /// Set the instance extensions the window system needs.
    pub fn instance_extensions(&mut self, extensions: Vec<CString>) -> &mut Self {
        self.instance_extensions = extensions;
        self
    }

    /// Set the device extensions every candidate GPU must support.
    pub fn device_extensions(&mut self, extensions: Vec<CString>) -> &mut Self {
        self.device_extensions = extensions;
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(&mut self, enable: bool) -> &mut Self {
        self.validation = enable;
        self
    }

    /// Set the extra validation features to enable. Empty disables the
    /// validation-features block.
    pub fn validation_features(
        &mut self,
        features: Vec<vk::ValidationFeatureEnableEXT>,
    ) -> &mut Self {
        self.validation_features = features;
        self
    }

    /// Receive debug messenger output.
    pub fn diagnostics<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        self.diagnostics = DiagnosticsSink::new(handler);
        self
    }

    /// Use a prepared sink for debug messenger output.
    pub fn diagnostics_sink(&mut self, sink: DiagnosticsSink) -> &mut Self {
        self.diagnostics = sink;
        self
    }

    /// Set the window dimensions callback.
    pub fn dimensions<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn() -> Dimensions + Send + Sync + 'static,
    {
        self.dimensions = Some(Arc::new(callback));
        self
    }

    /// Set the surface creation callback.
    pub fn surface<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&ash::Entry, &ash::Instance) -> Result<vk::SurfaceKHR> + 'static,
    {
        self.surface = Some(Box::new(callback));
        self
    }

    /// Subscribe the device to resize notifications on `bus`. The listener
    /// is removed when the device drops, so one bus can serve successive
    /// devices.
    pub fn event_bus(&mut self, bus: Arc<EventBus>) -> &mut Self {
        self.event_bus = Some(bus);
        self
    }

    /// Whether validation is requested.
    #[must_use]
    pub const fn validation_enabled(&self) -> bool {
        self.validation
    }

    /// Configured instance extensions, before validation and platform
    /// additions.
    #[must_use]
    pub fn required_instance_extensions(&self) -> &[CString] {
        &self.instance_extensions
    }

    /// Required device extensions.
    #[must_use]
    pub fn required_device_extensions(&self) -> &[CString] {
        &self.device_extensions
    }
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("app_name", &self.app_name)
            .field("app_version", &self.app_version)
            .field("api_version", &self.api_version)
            .field("instance_extensions", &self.instance_extensions)
            .field("device_extensions", &self.device_extensions)
            .field("validation", &self.validation)
            .field("diagnostics", &self.diagnostics)
            .field("dimensions", &self.dimensions.is_some())
            .field("surface", &self.surface.is_some())
            .finish_non_exhaustive()
    }
}
