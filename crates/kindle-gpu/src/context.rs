//! GPU context management.

use crate::config::{DeviceConfig, DimensionsCallback};
use crate::device::{CommandPools, LogicalDevice, Queues};
use crate::error::{GpuError, Result};
use crate::instance::Instance;
use crate::physical::{
    select_physical_device, DeviceRequirements, PhysicalDeviceDescriptor, VulkanProbe,
};
use crate::queue::QueueFamilies;
use crate::surface::Surface;
use crate::swapchain::Swapchain;
use ash::vk;
use kindle_core::{Dimensions, EventKind, Subscription};
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything needed to render into one window.
///
/// Fields drop in declaration order: resize listener, command pools,
/// logical device, surface, then the instance with its debug messenger.
pub struct RenderDevice {
    _resize_subscription: Option<Subscription>,
    pools: CommandPools,
    swapchain_loader: ash::khr::swapchain::Device,
    queues: Queues,
    device: LogicalDevice,
    surface: Surface,
    physical: PhysicalDeviceDescriptor,
    queue_families: QueueFamilies,
    enabled_extensions: Vec<CString>,
    resized: Arc<AtomicBool>,
    dimensions: DimensionsCallback,
    instance: Instance,
}

impl RenderDevice {
    /// Bring up instance, surface, physical and logical device, queues and
    /// command pools from `config`.
    ///
    /// The dimensions and surface callbacks are required. When an event bus
    /// is configured the device marks itself resized on every
    /// [`EventKind::Resized`] event until it is dropped.
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let dimensions = config
            .dimensions
            .clone()
            .ok_or(GpuError::MissingCollaborator("dimensions"))?;
        let create_surface = config
            .surface
            .as_ref()
            .ok_or(GpuError::MissingCollaborator("surface"))?;

        // SAFETY: the entry is kept alive by `Instance` for as long as any
        // object created through it.
        let entry =
            unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let instance = Instance::new(entry, config)?;

        let surface_handle = create_surface(instance.entry(), instance.handle())?;
        // SAFETY: the callback created the surface against this instance and
        // hands ownership to us.
        let surface =
            unsafe { Surface::from_raw(instance.entry(), instance.handle(), surface_handle) };

        let requirements = DeviceRequirements {
            api_version: config.api_version,
            extensions: config.device_extensions.clone(),
        };
        let probe = VulkanProbe::new(instance.handle(), &surface);
        let selected = select_physical_device(&probe, &requirements)?;

        let device = LogicalDevice::new(instance.handle(), &selected)?;
        let queues = device.queues(&selected.queue_families);
        let pools = CommandPools::new(&device, &selected.queue_families)?;
        let swapchain_loader =
            ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        let resized = Arc::new(AtomicBool::new(false));
        let resize_subscription = config.event_bus.as_ref().map(|bus| {
            let flag = Arc::clone(&resized);
            bus.subscribe(EventKind::Resized, move |_| {
                flag.store(true, Ordering::Release);
            })
        });

        tracing::info!(
            "Render device ready on {} (queue families {:?})",
            selected.descriptor.name(),
            selected.queue_families
        );

        Ok(Self {
            _resize_subscription: resize_subscription,
            pools,
            swapchain_loader,
            queues,
            device,
            surface,
            physical: selected.descriptor,
            queue_families: selected.queue_families,
            enabled_extensions: selected.enabled_extensions,
            resized,
            dimensions,
            instance,
        })
    }

    /// The owned instance.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The presentation surface.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Cached information about the selected GPU.
    pub fn physical(&self) -> &PhysicalDeviceDescriptor {
        &self.physical
    }

    /// The `ash` logical device.
    pub fn device(&self) -> &ash::Device {
        self.device.handle()
    }

    pub fn queues(&self) -> &Queues {
        &self.queues
    }

    pub fn queue_families(&self) -> &QueueFamilies {
        &self.queue_families
    }

    pub fn command_pools(&self) -> &CommandPools {
        &self.pools
    }

    /// Device extensions enabled on the logical device.
    pub fn enabled_extensions(&self) -> &[CString] {
        &self.enabled_extensions
    }

    /// Swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Current window size in pixels, from the window collaborator.
    pub fn dimensions(&self) -> Dimensions {
        (self.dimensions)()
    }

    /// Flag the swapchain as stale.
    pub fn mark_resized(&self) {
        self.resized.store(true, Ordering::Release);
    }

    /// Whether a resize happened since the last swapchain recreation.
    pub fn is_resized(&self) -> bool {
        self.resized.load(Ordering::Acquire)
    }

    /// Read and clear the resize flag.
    pub fn take_resized(&self) -> bool {
        self.resized.swap(false, Ordering::AcqRel)
    }

    /// Wait for the device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        // SAFETY: the device is alive.
        unsafe { self.device().device_wait_idle() }?;
        Ok(())
    }

    /// Create a swapchain sized to the window's current dimensions.
    pub fn create_swapchain(self: &Arc<Self>) -> Result<Swapchain> {
        Swapchain::new(Arc::clone(self), self.dimensions())
    }

    /// Destroy `old` and build a fresh swapchain, clearing the resize flag.
    pub fn recreate_swapchain(self: &Arc<Self>, old: Swapchain) -> Result<Swapchain> {
        drop(old);
        let swapchain = self.create_swapchain()?;
        self.resized.store(false, Ordering::Release);
        Ok(swapchain)
    }

    /// Raw physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical.handle
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            tracing::warn!("Device wait idle failed during shutdown: {e}");
        }
    }
}

impl std::fmt::Debug for RenderDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDevice")
            .field("physical", &self.physical)
            .field("queue_families", &self.queue_families)
            .field("enabled_extensions", &self.enabled_extensions)
            .field("resized", &self.is_resized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dimensions_callback_is_reported_first() {
        let config = DeviceConfig::new();
        let err = RenderDevice::new(&config).unwrap_err();
        assert!(matches!(err, GpuError::MissingCollaborator("dimensions")));
    }

    #[test]
    fn missing_surface_callback_is_reported() {
        let mut config = DeviceConfig::new();
        config.dimensions(|| Dimensions::new(640, 480));
        let err = RenderDevice::new(&config).unwrap_err();
        assert!(matches!(err, GpuError::MissingCollaborator("surface")));
    }
}
