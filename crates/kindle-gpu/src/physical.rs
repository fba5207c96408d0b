//! Physical device selection.
//!
//! Candidates are checked in enumeration order and the first one passing
//! every requirement wins. There is no ranking by device type or memory.

use crate::error::{GpuError, Result};
use crate::queue::QueueFamilies;
use crate::surface::{Surface, SwapchainSupport};
use crate::version::VersionInfo;
use ash::vk;
use std::ffi::{CStr, CString};
use thiserror::Error;

/// Enabled opportunistically so non-conformant implementations accept the
/// device.
pub const PORTABILITY_SUBSET: &CStr = ash::khr::portability_subset::NAME;

/// Read-only view of the GPUs reachable from an instance and surface.
pub trait DeviceProbe {
    /// Physical devices in driver order.
    fn enumerate(&self) -> Result<Vec<vk::PhysicalDevice>>;
    fn properties(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceProperties;
    fn features(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures;
    fn memory_properties(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceMemoryProperties;
    /// Names of the device extensions the driver exposes.
    fn extensions(&self, device: vk::PhysicalDevice) -> Result<Vec<CString>>;
    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    /// Whether `family` can present to the target surface.
    fn supports_present(&self, device: vk::PhysicalDevice, family: u32) -> bool;
    fn swapchain_support(&self, device: vk::PhysicalDevice) -> Result<SwapchainSupport>;
}

/// Probe backed by a live instance and surface.
pub struct VulkanProbe<'a> {
    instance: &'a ash::Instance,
    surface: &'a Surface,
}

impl<'a> VulkanProbe<'a> {
    pub fn new(instance: &'a ash::Instance, surface: &'a Surface) -> Self {
        Self { instance, surface }
    }
}

impl DeviceProbe for VulkanProbe<'_> {
    fn enumerate(&self) -> Result<Vec<vk::PhysicalDevice>> {
        // SAFETY: the borrowed instance is alive.
        Ok(unsafe { self.instance.enumerate_physical_devices() }?)
    }

    fn properties(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceProperties {
        // SAFETY: `device` was enumerated from this instance.
        unsafe { self.instance.get_physical_device_properties(device) }
    }

    fn features(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures {
        // SAFETY: `device` was enumerated from this instance.
        unsafe { self.instance.get_physical_device_features(device) }
    }

    fn memory_properties(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceMemoryProperties {
        // SAFETY: `device` was enumerated from this instance.
        unsafe { self.instance.get_physical_device_memory_properties(device) }
    }

    fn extensions(&self, device: vk::PhysicalDevice) -> Result<Vec<CString>> {
        // SAFETY: `device` was enumerated from this instance.
        let properties = unsafe { self.instance.enumerate_device_extension_properties(device) }?;
        Ok(properties
            .iter()
            .filter_map(|p| p.extension_name_as_c_str().ok().map(CStr::to_owned))
            .collect())
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        // SAFETY: `device` was enumerated from this instance.
        unsafe { self.instance.get_physical_device_queue_family_properties(device) }
    }

    fn supports_present(&self, device: vk::PhysicalDevice, family: u32) -> bool {
        self.surface.supports_present(device, family)
    }

    fn swapchain_support(&self, device: vk::PhysicalDevice) -> Result<SwapchainSupport> {
        self.surface.swapchain_support(device)
    }
}

/// What a device must offer to be selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceRequirements {
    pub api_version: VersionInfo,
    pub extensions: Vec<CString>,
}

/// Cached information about the selected GPU.
#[derive(Clone, Copy)]
pub struct PhysicalDeviceDescriptor {
    pub handle: vk::PhysicalDevice,
    pub features: vk::PhysicalDeviceFeatures,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl PhysicalDeviceDescriptor {
    /// Driver-reported device name.
    #[must_use]
    pub fn name(&self) -> String {
        self.properties
            .device_name_as_c_str()
            .map_or_else(|_| String::from("<unnamed>"), |n| n.to_string_lossy().into_owned())
    }

    /// Supported API version.
    #[must_use]
    pub const fn api_version(&self) -> VersionInfo {
        VersionInfo::from_packed(self.properties.api_version)
    }

    /// Total device-local heap size in MB.
    #[must_use]
    pub fn device_local_memory_mb(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum()
    }

    /// One-line summary for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {} - {} MB VRAM",
            self.name(),
            self.properties.device_type,
            self.api_version(),
            self.device_local_memory_mb(),
        )
    }
}

impl std::fmt::Debug for PhysicalDeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceDescriptor")
            .field("handle", &self.handle)
            .field("name", &self.name())
            .field("api_version", &self.api_version())
            .finish_non_exhaustive()
    }
}

/// The chosen GPU plus everything derived while checking it.
#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub descriptor: PhysicalDeviceDescriptor,
    pub queue_families: QueueFamilies,
    /// Required extensions plus any opportunistic ones, to enable on the
    /// logical device.
    pub enabled_extensions: Vec<CString>,
}

/// Why a candidate was skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unsuitable {
    #[error("API version {found} is older than required {required}")]
    ApiVersion {
        found: VersionInfo,
        required: VersionInfo,
    },
    #[error("missing extensions {0:?}")]
    MissingExtensions(Vec<CString>),
    #[error("surface reports no formats or present modes")]
    SwapchainSupport,
    #[error("no complete set of graphics/compute/transfer/present queue families")]
    QueueFamilies,
    #[error("query failed: {0}")]
    Query(vk::Result),
}

/// Return the first enumerated device meeting `requirements`.
pub fn select_physical_device<P>(
    probe: &P,
    requirements: &DeviceRequirements,
) -> Result<SelectedDevice>
where
    P: DeviceProbe + ?Sized,
{
    let devices = probe.enumerate()?;
    if devices.is_empty() {
        return Err(GpuError::NoSupportedGpus);
    }

    for device in devices {
        match check_device(probe, device, requirements) {
            Ok(selected) => {
                tracing::info!("Selected GPU: {}", selected.descriptor.summary());
                return Ok(selected);
            }
            Err(reason) => {
                tracing::debug!("Skipping GPU {:?}: {reason}", device);
            }
        }
    }

    Err(GpuError::NoSuitableGpu)
}

/// Run the suitability checks against one device.
pub fn check_device<P>(
    probe: &P,
    device: vk::PhysicalDevice,
    requirements: &DeviceRequirements,
) -> std::result::Result<SelectedDevice, Unsuitable>
where
    P: DeviceProbe + ?Sized,
{
    let properties = probe.properties(device);
    let found = VersionInfo::from_packed(properties.api_version);
    if properties.api_version < requirements.api_version.to_packed() {
        return Err(Unsuitable::ApiVersion {
            found,
            required: requirements.api_version,
        });
    }

    let available = probe.extensions(device).map_err(query_failure)?;
    let enabled_extensions = enabled_extensions(&available, &requirements.extensions)?;

    let support = probe.swapchain_support(device).map_err(query_failure)?;
    if !support.is_adequate() {
        return Err(Unsuitable::SwapchainSupport);
    }

    let families = probe.queue_families(device);
    let queue_families = QueueFamilies::find(&families, |i| probe.supports_present(device, i))
        .ok_or(Unsuitable::QueueFamilies)?;

    Ok(SelectedDevice {
        descriptor: PhysicalDeviceDescriptor {
            handle: device,
            features: probe.features(device),
            properties,
            memory_properties: probe.memory_properties(device),
        },
        queue_families,
        enabled_extensions,
    })
}

/// Required extensions, plus the portability subset when the device exposes
/// it. Fails listing every required name the device lacks.
pub fn enabled_extensions(
    available: &[CString],
    required: &[CString],
) -> std::result::Result<Vec<CString>, Unsuitable> {
    let missing: Vec<CString> = required
        .iter()
        .filter(|name| !available.contains(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Unsuitable::MissingExtensions(missing));
    }

    let mut enabled = required.to_vec();
    let has_portability = available.iter().any(|name| name.as_c_str() == PORTABILITY_SUBSET);
    if has_portability && !enabled.iter().any(|name| name.as_c_str() == PORTABILITY_SUBSET) {
        enabled.push(PORTABILITY_SUBSET.to_owned());
    }
    Ok(enabled)
}

fn query_failure(error: GpuError) -> Unsuitable {
    match error {
        GpuError::Vulkan(result) => Unsuitable::Query(result),
        _ => Unsuitable::Query(vk::Result::ERROR_UNKNOWN),
    }
}
