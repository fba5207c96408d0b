//! GPU error types.

use ash::vk;
use thiserror::Error;

/// Errors raised while bootstrapping the GPU context.
///
/// Every variant is fatal to the step that produced it.
#[derive(Error, Debug)]
pub enum GpuError {
    /// The Vulkan loader could not be opened.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// A requested validation layer is not installed.
    #[error("Validation layer not available: {0}")]
    ValidationLayerUnavailable(String),

    /// A required instance extension is not available.
    #[error("Required extension not available: {0}")]
    ExtensionUnavailable(String),

    /// A configuration value cannot be passed to Vulkan.
    #[error("Invalid device configuration: {0}")]
    InvalidConfig(String),

    /// A collaborator callback was not supplied to the configuration.
    #[error("Missing {0} callback in device configuration")]
    MissingCollaborator(&'static str),

    /// Enumeration returned no physical devices at all.
    #[error("No supported GPUs found")]
    NoSupportedGpus,

    /// Devices exist but none passed the suitability checks.
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A Vulkan object could not be created.
    #[error("Failed to create {object}: {result}")]
    Creation {
        object: &'static str,
        result: vk::Result,
    },

    /// `vkCreateDebugUtilsMessengerEXT` could not be resolved.
    #[error("Debug handler create failed: vkCreateDebugUtilsMessengerEXT not available")]
    DebugHandlerUnavailable,

    /// The window collaborator could not create a surface.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// The surface reported no formats or no present modes.
    #[error("Unable to retrieve swapchain support")]
    SwapchainSupportUnavailable,

    /// A query call returned an error status.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

impl GpuError {
    /// Wrap a failed creation status.
    pub(crate) const fn creation(object: &'static str, result: vk::Result) -> Self {
        Self::Creation { object, result }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
