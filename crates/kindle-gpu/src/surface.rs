//! Presentation surface ownership and support queries.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Owned `VkSurfaceKHR`, destroyed on drop.
pub struct Surface {
    loader: ash::khr::surface::Instance,
    handle: vk::SurfaceKHR,
}

impl Surface {
    /// Take ownership of a surface created against `instance`.
    ///
    /// # Safety
    /// `handle` must have been created from `instance` and must not be
    /// destroyed elsewhere.
    pub(crate) unsafe fn from_raw(
        entry: &ash::Entry,
        instance: &ash::Instance,
        handle: vk::SurfaceKHR,
    ) -> Self {
        Self {
            loader: ash::khr::surface::Instance::new(entry, instance),
            handle,
        }
    }

    /// Raw surface handle.
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Surface extension loader.
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }

    /// Whether queue family `family` of `physical_device` can present here.
    ///
    /// Query failures count as "no".
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, family: u32) -> bool {
        // SAFETY: the surface is alive and the device belongs to its instance.
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, family, self.handle)
        }
        .unwrap_or(false)
    }

    /// Query capabilities, formats and present modes.
    pub fn swapchain_support(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<SwapchainSupport> {
        // SAFETY: the surface is alive and the device belongs to its instance.
        unsafe {
            let capabilities = self
                .loader
                .get_physical_device_surface_capabilities(physical_device, self.handle)?;
            let formats = self
                .loader
                .get_physical_device_surface_formats(physical_device, self.handle)?;
            let present_modes = self
                .loader
                .get_physical_device_surface_present_modes(physical_device, self.handle)?;

            Ok(SwapchainSupport {
                capabilities,
                formats,
                present_modes,
            })
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        tracing::debug!("Destroying surface {:?}", self.handle);
        // SAFETY: we own the surface. Swapchains keep the device (and so
        // this surface) alive, so none remain.
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

/// Surface support query result. Always queried fresh.
#[derive(Clone, Debug, Default)]
pub struct SwapchainSupport {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats, in driver order.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes, in driver order.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// At least one format and one present mode.
    #[must_use]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Create a surface for any window exposing raw handles.
///
/// Usable directly as the surface callback of a
/// [`DeviceConfig`](crate::config::DeviceConfig).
///
/// # Safety
/// The window must outlive the returned surface.
pub unsafe fn create_window_surface<W>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR>
where
    W: HasDisplayHandle + HasWindowHandle + ?Sized,
{
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
    let window_handle = window
        .window_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

    // SAFETY: caller guarantees the window outlives the surface.
    unsafe {
        ash_window::create_surface(
            entry,
            instance,
            display.as_raw(),
            window_handle.as_raw(),
            None,
        )
    }
    .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
}

/// Instance extensions a window's display server needs.
pub fn window_instance_extensions<W>(window: &W) -> Result<Vec<std::ffi::CString>>
where
    W: HasDisplayHandle + ?Sized,
{
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
    let names = ash_window::enumerate_required_extensions(display.as_raw())?;

    Ok(names
        .iter()
        // SAFETY: ash-window returns static NUL-terminated extension names.
        .map(|&name| unsafe { std::ffi::CStr::from_ptr(name) }.to_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adequacy_requires_formats_and_modes() {
        let mut support = SwapchainSupport::default();
        assert!(!support.is_adequate());

        support.formats.push(vk::SurfaceFormatKHR::default());
        assert!(!support.is_adequate());

        support.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(support.is_adequate());
    }
}
