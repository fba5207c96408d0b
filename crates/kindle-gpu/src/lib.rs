//! Vulkan bootstrap for the Kindle engine.
//!
//! This crate provides:
//! - Instance creation with optional validation and a debug messenger
//! - Physical device selection and queue family resolution
//! - Logical device, queue and command pool creation
//! - Swapchain creation and recreation on resize

pub mod config;
pub mod context;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod instance;
pub mod physical;
pub mod queue;
pub mod surface;
pub mod swapchain;
pub mod version;

pub use config::{DeviceConfig, DimensionsCallback, SurfaceCallback};
pub use context::RenderDevice;
pub use device::{CommandPools, LogicalDevice, Queues};
pub use diagnostics::{Category, Diagnostic, DiagnosticsSink, Severity};
pub use error::{GpuError, Result};
pub use instance::Instance;
pub use physical::{
    select_physical_device, DeviceProbe, DeviceRequirements, PhysicalDeviceDescriptor,
    SelectedDevice, Unsuitable, VulkanProbe,
};
pub use queue::{QueueFamilies, QueueFamilyIndices};
pub use surface::{create_window_surface, window_instance_extensions, Surface, SwapchainSupport};
pub use swapchain::Swapchain;
pub use version::VersionInfo;

pub use ash;
pub use ash::vk;
