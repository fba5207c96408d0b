//! Swapchain management.

use crate::context::RenderDevice;
use crate::error::{GpuError, Result};
use crate::queue::QueueFamilies;
use ash::vk;
use kindle_core::Dimensions;
use std::sync::Arc;

/// Swapchain with its images and one view per image.
///
/// Holds the device it was created from, so it can never outlive it.
/// Dropping waits for the device to go idle, then destroys the views and
/// the swapchain.
pub struct Swapchain {
    device: Arc<RenderDevice>,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Create a swapchain sized to `dimensions` on `device`'s surface.
    pub fn new(device: Arc<RenderDevice>, dimensions: Dimensions) -> Result<Self> {
        let support = device.surface().swapchain_support(device.physical().handle)?;
        let format = select_surface_format(&support.formats)
            .ok_or(GpuError::SwapchainSupportUnavailable)?;
        if support.present_modes.is_empty() {
            return Err(GpuError::SwapchainSupportUnavailable);
        }
        let present_mode = select_present_mode(&support.present_modes);
        let extent = calculate_extent(&support.capabilities, dimensions);
        let image_count = select_image_count(&support.capabilities);
        let (sharing_mode, family_indices) = sharing(device.queue_families());

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(device.surface().handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        // SAFETY: the surface and device are alive for the duration of the
        // call and the create info references locals only.
        let handle = unsafe { device.swapchain_loader().create_swapchain(&create_info, None) }
            .map_err(|result| GpuError::creation("swapchain", result))?;

        // From here on, `Drop` releases whatever has been created.
        let mut swapchain = Self {
            device,
            handle,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            extent,
            present_mode,
        };

        // SAFETY: `handle` was just created by this loader.
        swapchain.images =
            unsafe { swapchain.device.swapchain_loader().get_swapchain_images(handle) }?;

        for index in 0..swapchain.images.len() {
            let view = swapchain.create_view(swapchain.images[index])?;
            swapchain.image_views.push(view);
        }

        tracing::info!(
            "Created swapchain: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            swapchain.images.len(),
            format.format,
            present_mode
        );

        Ok(swapchain)
    }

    fn create_view(&self, image: vk::Image) -> Result<vk::ImageView> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format.format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        // SAFETY: `image` belongs to this swapchain on this device.
        unsafe { self.device.device().create_image_view(&view_info, None) }
            .map_err(|result| GpuError::creation("swapchain image view", result))
    }

    /// Raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// The device this swapchain belongs to.
    pub fn device(&self) -> &Arc<RenderDevice> {
        &self.device
    }

    /// Presentable images, in swapchain order.
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One color view per image.
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let device = self.device.device();
        // SAFETY: the device outlives us through the Arc; after the idle
        // wait nothing references the views or swapchain.
        unsafe {
            if let Err(e) = device.device_wait_idle() {
                tracing::warn!("Device wait idle failed before swapchain teardown: {e}");
            }
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            self.device
                .swapchain_loader()
                .destroy_swapchain(self.handle, None);
        }
        tracing::debug!("Destroyed swapchain {:?}", self.handle);
    }
}

impl std::fmt::Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("handle", &self.handle)
            .field("images", &self.images.len())
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("present_mode", &self.present_mode)
            .finish_non_exhaustive()
    }
}

/// Prefer B8G8R8A8 sRGB with the nonlinear sRGB color space, else the first
/// listed format. `None` when nothing is listed.
pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// Mailbox when listed, otherwise FIFO (always supported).
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or `desired` clamped to the supported
/// range when the surface leaves the choice to us.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: Dimensions,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One more than the minimum, capped by the maximum when there is one.
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Concurrent sharing across graphics and present when they differ.
pub fn sharing(families: &QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.split_present() {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    } else {
        (vk::SharingMode::EXCLUSIVE, vec![families.graphics])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn prefers_srgb_format() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(select_surface_format(&available), Some(available[2]));
    }

    #[test]
    fn falls_back_to_first_format() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(select_surface_format(&available), Some(available[0]));
        assert_eq!(select_surface_format(&[]), None);
    }

    #[test]
    fn present_mode_preference() {
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn current_extent_wins_unless_sentinel() {
        let mut caps = capabilities(2, 0);
        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert_eq!(
            calculate_extent(&caps, Dimensions::new(1024, 768)),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn desired_extent_is_clamped_per_axis() {
        let caps = capabilities(2, 0);
        assert_eq!(
            calculate_extent(&caps, Dimensions::new(1280, 720)),
            vk::Extent2D {
                width: 1280,
                height: 720
            }
        );
        assert_eq!(
            calculate_extent(&caps, Dimensions::new(10_000, 0)),
            vk::Extent2D {
                width: 4096,
                height: 1
            }
        );
    }

    #[test]
    fn image_count() {
        assert_eq!(select_image_count(&capabilities(2, 0)), 3);
        assert_eq!(select_image_count(&capabilities(2, 2)), 2);
        assert_eq!(select_image_count(&capabilities(2, 8)), 3);
    }

    #[test]
    fn sharing_mode_follows_present_family() {
        let mut families = QueueFamilies {
            graphics: 0,
            compute: 1,
            transfer: 2,
            present: 0,
        };
        assert_eq!(sharing(&families), (vk::SharingMode::EXCLUSIVE, vec![0]));

        families.present = 3;
        assert_eq!(
            sharing(&families),
            (vk::SharingMode::CONCURRENT, vec![0, 3])
        );
    }
}
