//! Vulkan instance creation.

use crate::config::{DeviceConfig, ENGINE_NAME, ENGINE_VERSION, VALIDATION_LAYERS};
use crate::diagnostics::{messenger_callback, sink_user_data, DiagnosticsSink};
use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::Arc;

/// Severities the messenger subscribes to.
const MESSENGER_SEVERITIES: vk::DebugUtilsMessageSeverityFlagsEXT =
    vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw()
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR.as_raw(),
    );

/// Message types the messenger subscribes to.
const MESSENGER_TYPES: vk::DebugUtilsMessageTypeFlagsEXT =
    vk::DebugUtilsMessageTypeFlagsEXT::from_raw(
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE.as_raw(),
    );

struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Owned Vulkan instance with its optional debug messenger.
///
/// Dropping destroys the messenger first, then the instance. The sink
/// outlives both because the creation-time messenger also reports during
/// `vkDestroyInstance`.
pub struct Instance {
    debug: Option<DebugMessenger>,
    handle: ash::Instance,
    entry: ash::Entry,
    // Address handed to the driver as `p_user_data`.
    _sink: Arc<DiagnosticsSink>,
}

impl Instance {
    /// Create the instance described by `config`.
    ///
    /// With validation enabled the validation layer and debug-utils
    /// extension must be available, and a debug messenger routed to the
    /// configured diagnostics sink is installed both during instance
    /// creation and afterwards.
    pub fn new(entry: ash::Entry, config: &DeviceConfig) -> Result<Self> {
        if config.validation {
            check_validation_available(&entry)?;
        }

        let extensions = instance_extensions(config);
        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

        let layer_ptrs: Vec<*const c_char> = if config.validation {
            VALIDATION_LAYERS.iter().map(|l| l.as_ptr()).collect()
        } else {
            Vec::new()
        };

        let app_name = CString::new(config.app_name.as_str()).map_err(|_| {
            GpuError::InvalidConfig(format!("app name {:?} contains NUL", config.app_name))
        })?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(config.app_version.to_packed())
            .engine_name(ENGINE_NAME)
            .engine_version(ENGINE_VERSION.to_packed())
            .api_version(config.api_version.to_packed());

        // Required for MoltenVK on macOS
        #[cfg(target_os = "macos")]
        let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        #[cfg(not(target_os = "macos"))]
        let create_flags = vk::InstanceCreateFlags::empty();

        let sink = Arc::new(config.diagnostics.clone());
        let sink_ptr = sink_user_data(&sink);

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .flags(create_flags);

        let mut creation_messenger = messenger_create_info(sink_ptr);
        let mut validation_features = vk::ValidationFeaturesEXT::default()
            .enabled_validation_features(&config.validation_features);
        if config.validation {
            create_info = create_info.push_next(&mut creation_messenger);
            if !config.validation_features.is_empty() {
                create_info = create_info.push_next(&mut validation_features);
            }
        }

        // SAFETY: every pointer in `create_info` references locals that
        // outlive this call.
        let handle = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|result| GpuError::creation("instance", result))?;

        let mut instance = Self {
            debug: None,
            handle,
            entry,
            _sink: sink,
        };

        if config.validation {
            // On failure `instance` drops here and destroys the handle.
            instance.debug = Some(instance.create_messenger(sink_ptr)?);
        }

        tracing::debug!(
            "Created Vulkan instance (API {}, validation: {})",
            config.api_version,
            config.validation
        );

        Ok(instance)
    }

    fn create_messenger(&self, sink_ptr: *mut c_void) -> Result<DebugMessenger> {
        // SAFETY: the instance handle is live; the name is NUL-terminated.
        let entry_point = unsafe {
            self.entry.get_instance_proc_addr(
                self.handle.handle(),
                c"vkCreateDebugUtilsMessengerEXT".as_ptr(),
            )
        };
        if entry_point.is_none() {
            return Err(GpuError::DebugHandlerUnavailable);
        }

        let loader = ash::ext::debug_utils::Instance::new(&self.entry, &self.handle);
        let create_info = messenger_create_info(sink_ptr);
        // SAFETY: the entry point exists and `sink_ptr` points into
        // `self._sink`, which outlives the messenger.
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .map_err(|result| GpuError::creation("debug messenger", result))?;

        Ok(DebugMessenger { loader, messenger })
    }

    /// The loaded entry points.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// The `ash` instance.
    pub fn handle(&self) -> &ash::Instance {
        &self.handle
    }

    /// Whether a debug messenger is installed.
    pub fn has_debug_messenger(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some(debug) = self.debug.take() {
            tracing::debug!("Destroying debug messenger");
            // SAFETY: we created the messenger from this instance and it is
            // destroyed exactly once, before the instance.
            unsafe {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
        }
        tracing::debug!("Destroying Vulkan instance");
        // SAFETY: every child object is owned by fields dropped earlier in
        // `RenderDevice`.
        unsafe { self.handle.destroy_instance(None) };
    }
}

/// Create info shared by instance-creation chaining and the standalone
/// messenger.
fn messenger_create_info(
    sink_ptr: *mut c_void,
) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(MESSENGER_SEVERITIES)
        .message_type(MESSENGER_TYPES)
        .pfn_user_callback(Some(messenger_callback))
        .user_data(sink_ptr)
}

/// Configured extensions, plus debug utils with validation and portability
/// enumeration on macOS. Duplicates are dropped.
pub(crate) fn instance_extensions(config: &DeviceConfig) -> Vec<CString> {
    let mut extensions = config.instance_extensions.clone();
    let mut push = |name: &CStr| {
        if !extensions.iter().any(|e| e.as_c_str() == name) {
            extensions.push(name.to_owned());
        }
    };

    if config.validation {
        push(ash::ext::debug_utils::NAME);
    }
    #[cfg(target_os = "macos")]
    push(ash::khr::portability_enumeration::NAME);

    extensions
}

/// Fail unless every validation layer and the debug-utils extension exist.
fn check_validation_available(entry: &ash::Entry) -> Result<()> {
    // SAFETY: the entry is loaded.
    let layers = unsafe { entry.enumerate_instance_layer_properties() }?;
    // SAFETY: the entry is loaded.
    let extensions = unsafe { entry.enumerate_instance_extension_properties(None) }?;
    missing_validation_support(&layers, &extensions)
}

/// Match the installed layers and instance extensions against what
/// validation needs.
fn missing_validation_support(
    layers: &[vk::LayerProperties],
    extensions: &[vk::ExtensionProperties],
) -> Result<()> {
    for wanted in VALIDATION_LAYERS {
        let found = layers
            .iter()
            .any(|props| props.layer_name_as_c_str() == Ok(*wanted));
        if !found {
            return Err(GpuError::ValidationLayerUnavailable(
                wanted.to_string_lossy().into_owned(),
            ));
        }
    }

    let debug_utils = ash::ext::debug_utils::NAME;
    if !extensions
        .iter()
        .any(|props| props.extension_name_as_c_str() == Ok(debug_utils))
    {
        return Err(GpuError::ExtensionUnavailable(
            debug_utils.to_string_lossy().into_owned(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_name<const N: usize>(name: &CStr) -> [c_char; N] {
        let mut out = [0; N];
        for (dst, &src) in out.iter_mut().zip(name.to_bytes()) {
            *dst = src as c_char;
        }
        out
    }

    fn layer(name: &CStr) -> vk::LayerProperties {
        vk::LayerProperties {
            layer_name: fixed_name(name),
            ..Default::default()
        }
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        vk::ExtensionProperties {
            extension_name: fixed_name(name),
            ..Default::default()
        }
    }

    #[test]
    fn validation_support_present() {
        let layers = [
            layer(c"VK_LAYER_MESA_overlay"),
            layer(c"VK_LAYER_KHRONOS_validation"),
        ];
        let extensions = [
            extension(ash::khr::surface::NAME),
            extension(ash::ext::debug_utils::NAME),
        ];
        assert!(missing_validation_support(&layers, &extensions).is_ok());
    }

    #[test]
    fn missing_validation_layer() {
        let layers = [layer(c"VK_LAYER_MESA_overlay")];
        let extensions = [extension(ash::ext::debug_utils::NAME)];
        let err = missing_validation_support(&layers, &extensions).unwrap_err();
        let GpuError::ValidationLayerUnavailable(name) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(name, "VK_LAYER_KHRONOS_validation");
    }

    #[test]
    fn missing_debug_utils_extension() {
        let layers = [layer(c"VK_LAYER_KHRONOS_validation")];
        let extensions = [extension(ash::khr::surface::NAME)];
        let err = missing_validation_support(&layers, &extensions).unwrap_err();
        let GpuError::ExtensionUnavailable(name) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(name, "VK_EXT_debug_utils");
    }

    #[test]
    fn layer_check_runs_before_extension_check() {
        let err = missing_validation_support(&[], &[]).unwrap_err();
        assert!(matches!(err, GpuError::ValidationLayerUnavailable(_)));
    }

    #[test]
    fn debug_utils_only_with_validation() {
        let mut config = DeviceConfig::new();
        config
            .instance_extensions(vec![ash::khr::surface::NAME.to_owned()])
            .validation(false);
        let without = instance_extensions(&config);
        assert!(!without.iter().any(|e| e.as_c_str() == ash::ext::debug_utils::NAME));
        assert_eq!(without[0].as_c_str(), ash::khr::surface::NAME);

        config.validation(true);
        let with = instance_extensions(&config);
        assert!(with.iter().any(|e| e.as_c_str() == ash::ext::debug_utils::NAME));
    }

    #[test]
    fn extensions_are_not_duplicated() {
        let mut config = DeviceConfig::new();
        config
            .instance_extensions(vec![ash::ext::debug_utils::NAME.to_owned()])
            .validation(true);
        let extensions = instance_extensions(&config);
        let count = extensions
            .iter()
            .filter(|e| e.as_c_str() == ash::ext::debug_utils::NAME)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn messenger_filters() {
        let info = messenger_create_info(std::ptr::null_mut());
        assert!(info.message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
        assert!(info.message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
        assert!(!info.message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
        assert_eq!(info.message_type, MESSENGER_TYPES);
        assert!(info.pfn_user_callback.is_some());
    }
}
