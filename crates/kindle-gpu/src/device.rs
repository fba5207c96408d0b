//! Logical device, queue and command pool creation.

use crate::error::{GpuError, Result};
use crate::physical::SelectedDevice;
use crate::queue::QueueFamilies;
use ash::vk;
use std::ffi::c_char;

/// Owned `VkDevice`, destroyed on drop.
pub struct LogicalDevice {
    handle: ash::Device,
}

impl LogicalDevice {
    /// Create the logical device for `selected` with one queue per distinct
    /// family and the selected extension list enabled.
    pub fn new(instance: &ash::Instance, selected: &SelectedDevice) -> Result<Self> {
        let queue_priority = [1.0_f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = selected
            .queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priority)
            })
            .collect();

        let extension_names: Vec<*const c_char> = selected
            .enabled_extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names);

        // SAFETY: the physical device was enumerated from `instance` and all
        // pointers in `create_info` reference locals alive for this call.
        let handle = unsafe {
            instance.create_device(selected.descriptor.handle, &create_info, None)
        }
        .map_err(|result| GpuError::creation("logical device", result))?;

        tracing::debug!(
            "Created logical device with queue families {:?}",
            selected.queue_families.unique()
        );

        Ok(Self { handle })
    }

    /// The `ash` device.
    pub fn handle(&self) -> &ash::Device {
        &self.handle
    }

    /// Fetch queue 0 of every role.
    pub fn queues(&self, families: &QueueFamilies) -> Queues {
        // SAFETY: each family had exactly one queue requested at creation.
        unsafe {
            Queues {
                graphics: self.handle.get_device_queue(families.graphics, 0),
                compute: self.handle.get_device_queue(families.compute, 0),
                transfer: self.handle.get_device_queue(families.transfer, 0),
                present: self.handle.get_device_queue(families.present, 0),
            }
        }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        tracing::debug!("Destroying logical device");
        // SAFETY: pools and swapchains are released before the device.
        unsafe { self.handle.destroy_device(None) };
    }
}

/// Queue handles, one per role. Handles may alias when families coincide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Queues {
    pub graphics: vk::Queue,
    pub compute: vk::Queue,
    pub transfer: vk::Queue,
    pub present: vk::Queue,
}

/// Command pools for the graphics, transfer and compute families.
///
/// Destroyed compute first, then transfer, then graphics.
pub struct CommandPools {
    device: ash::Device,
    graphics: vk::CommandPool,
    transfer: vk::CommandPool,
    compute: vk::CommandPool,
}

impl CommandPools {
    /// Create the three pools with resettable command buffers. Pools made
    /// before a failing one are destroyed.
    pub fn new(device: &LogicalDevice, families: &QueueFamilies) -> Result<Self> {
        let device = device.handle().clone();
        let mut created: Vec<vk::CommandPool> = Vec::with_capacity(3);

        let roles = [
            ("graphics command pool", families.graphics),
            ("transfer command pool", families.transfer),
            ("compute command pool", families.compute),
        ];
        for (object, family) in roles {
            match create_pool(&device, family) {
                Ok(pool) => created.push(pool),
                Err(result) => {
                    for pool in created.into_iter().rev() {
                        // SAFETY: the pool was created above and never used.
                        unsafe { device.destroy_command_pool(pool, None) };
                    }
                    return Err(GpuError::creation(object, result));
                }
            }
        }

        Ok(Self {
            graphics: created[0],
            transfer: created[1],
            compute: created[2],
            device,
        })
    }

    pub fn graphics(&self) -> vk::CommandPool {
        self.graphics
    }

    pub fn transfer(&self) -> vk::CommandPool {
        self.transfer
    }

    pub fn compute(&self) -> vk::CommandPool {
        self.compute
    }
}

impl Drop for CommandPools {
    fn drop(&mut self) {
        tracing::debug!("Destroying command pools");
        // SAFETY: the device is still alive (`RenderDevice` drops pools
        // first) and no command buffers are pending after the idle wait.
        unsafe {
            self.device.destroy_command_pool(self.compute, None);
            self.device.destroy_command_pool(self.transfer, None);
            self.device.destroy_command_pool(self.graphics, None);
        }
    }
}

fn create_pool(
    device: &ash::Device,
    family: u32,
) -> std::result::Result<vk::CommandPool, vk::Result> {
    let create_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(family)
        .flags(pool_flags());
    // SAFETY: `family` had a queue requested when the device was created.
    unsafe { device.create_command_pool(&create_info, None) }
}

const fn pool_flags() -> vk::CommandPoolCreateFlags {
    vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_allow_individual_reset() {
        assert_eq!(pool_flags(), vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    }

    #[test]
    fn one_queue_request_per_distinct_family() {
        let families = QueueFamilies {
            graphics: 0,
            compute: 2,
            transfer: 1,
            present: 0,
        };
        assert_eq!(families.unique(), vec![0, 1, 2]);
    }
}
