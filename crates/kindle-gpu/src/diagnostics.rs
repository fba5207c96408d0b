//! Validation and performance diagnostics from the debug messenger.
//!
//! The driver hands us raw callback data; [`Diagnostic::from_raw`] turns it
//! into an owned record and [`DiagnosticsSink`] forwards that record to the
//! embedding application's handler. Without a handler messages are dropped.

use ash::vk;
use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr};
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Message severity, lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Classify raw severity bits.
    ///
    /// Warning is checked before info, info before verbose; when none of
    /// those bits is present the message is an error.
    #[must_use]
    pub fn from_flags(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Self::Warning
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Self::Info
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE) {
            Self::Verbose
        } else {
            Self::Error
        }
    }
}

/// Message category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    General,
    Validation,
    Performance,
}

impl Category {
    /// Classify raw type bits: performance, then validation, else general.
    #[must_use]
    pub fn from_flags(flags: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            Self::Performance
        } else if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            Self::Validation
        } else {
            Self::General
        }
    }
}

/// A normalized diagnostic message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.severity, self.category, self.message)
    }
}

impl Diagnostic {
    /// Build a diagnostic from messenger callback arguments.
    ///
    /// The message text is the raw message followed, when present, by the
    /// message id, queue labels, command buffer labels and involved objects,
    /// one entry per line.
    ///
    /// # Safety
    /// Every pointer in `data` must be null or valid for its declared count,
    /// and every string pointer must be null or NUL-terminated.
    pub unsafe fn from_raw(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        types: vk::DebugUtilsMessageTypeFlagsEXT,
        data: &vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    ) -> Self {
        let mut message = String::new();
        // SAFETY: caller guarantees string pointers are null or NUL-terminated.
        message.push_str(&unsafe { lossy(data.p_message) }.unwrap_or(Cow::Borrowed("")));

        // SAFETY: as above.
        if let Some(id_name) = unsafe { lossy(data.p_message_id_name) } {
            let _ = write!(message, "\nmessage id: {id_name} ({})", data.message_id_number);
        }

        // SAFETY: caller guarantees pointer/count pairs are valid.
        let queue_labels = unsafe { slice(data.p_queue_labels, data.queue_label_count) };
        if !queue_labels.is_empty() {
            message.push_str("\nqueue labels:");
            for label in queue_labels {
                // SAFETY: label names are NUL-terminated or null.
                let name = unsafe { lossy(label.p_label_name) }.unwrap_or(Cow::Borrowed("?"));
                let _ = write!(message, "\n  - {name}");
            }
        }

        // SAFETY: as above.
        let cmd_labels = unsafe { slice(data.p_cmd_buf_labels, data.cmd_buf_label_count) };
        if !cmd_labels.is_empty() {
            message.push_str("\ncommand buffer labels:");
            for label in cmd_labels {
                // SAFETY: label names are NUL-terminated or null.
                let name = unsafe { lossy(label.p_label_name) }.unwrap_or(Cow::Borrowed("?"));
                let _ = write!(message, "\n  - {name}");
            }
        }

        // SAFETY: as above.
        let objects = unsafe { slice(data.p_objects, data.object_count) };
        if !objects.is_empty() {
            message.push_str("\nobjects:");
            for object in objects {
                let _ = write!(
                    message,
                    "\n  - {} 0x{:x}",
                    object_type_name(object.object_type),
                    object.object_handle
                );
                // SAFETY: object names are NUL-terminated or null.
                if let Some(name) = unsafe { lossy(object.p_object_name) } {
                    let _ = write!(message, " \"{name}\"");
                }
            }
        }

        Self {
            severity: Severity::from_flags(severity),
            category: Category::from_flags(types),
            message,
        }
    }
}

/// Handler invoked for every diagnostic. Captures whatever context the
/// application needs.
pub type DiagnosticsHandler = dyn Fn(&Diagnostic) + Send + Sync;

/// Destination for debug messenger output.
#[derive(Clone, Default)]
pub struct DiagnosticsSink {
    handler: Option<Arc<DiagnosticsHandler>>,
}

impl DiagnosticsSink {
    /// A sink that drops every message.
    #[must_use]
    pub fn discard() -> Self {
        Self::default()
    }

    /// A sink that forwards to `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        Self {
            handler: Some(Arc::new(handler)),
        }
    }

    /// A sink that re-emits diagnostics as `tracing` events.
    #[must_use]
    pub fn tracing() -> Self {
        Self::new(|diagnostic| {
            let category = diagnostic.category;
            let message = &diagnostic.message;
            match diagnostic.severity {
                Severity::Verbose => {
                    tracing::trace!(target: "kindle::vulkan", ?category, "{message}");
                }
                Severity::Info => tracing::info!(target: "kindle::vulkan", ?category, "{message}"),
                Severity::Warning => {
                    tracing::warn!(target: "kindle::vulkan", ?category, "{message}");
                }
                Severity::Error => {
                    tracing::error!(target: "kindle::vulkan", ?category, "{message}");
                }
            }
        })
    }

    /// Whether a handler is registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handler.is_some()
    }

    /// Forward a diagnostic to the handler, if any.
    pub fn dispatch(&self, diagnostic: &Diagnostic) {
        if let Some(handler) = &self.handler {
            handler(diagnostic);
        }
    }
}

impl fmt::Debug for DiagnosticsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsSink")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Debug messenger callback. `p_user_data` must point at a live
/// [`DiagnosticsSink`].
pub(crate) unsafe extern "system" fn messenger_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_user_data.is_null() || p_callback_data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the instance registers `sink_user_data` of a sink it keeps
    // alive until the messenger is destroyed.
    let sink = unsafe { &*p_user_data.cast::<DiagnosticsSink>() };
    if !sink.is_active() {
        return vk::FALSE;
    }
    // SAFETY: Vulkan guarantees the callback data is valid for this call.
    let diagnostic = unsafe { Diagnostic::from_raw(severity, types, &*p_callback_data) };
    sink.dispatch(&diagnostic);
    vk::FALSE
}

/// User data pointer for [`messenger_callback`]. Stays valid while any
/// clone of `sink` is alive, wherever the `Arc` itself is moved.
pub(crate) fn sink_user_data(sink: &Arc<DiagnosticsSink>) -> *mut c_void {
    Arc::as_ptr(sink).cast_mut().cast::<c_void>()
}

/// Human-readable name of an object type.
#[must_use]
pub fn object_type_name(object_type: vk::ObjectType) -> &'static str {
    match object_type {
        vk::ObjectType::INSTANCE => "instance",
        vk::ObjectType::PHYSICAL_DEVICE => "physical_device",
        vk::ObjectType::DEVICE => "device",
        vk::ObjectType::QUEUE => "queue",
        vk::ObjectType::SEMAPHORE => "semaphore",
        vk::ObjectType::COMMAND_BUFFER => "command_buffer",
        vk::ObjectType::FENCE => "fence",
        vk::ObjectType::DEVICE_MEMORY => "device_memory",
        vk::ObjectType::BUFFER => "buffer",
        vk::ObjectType::IMAGE => "image",
        vk::ObjectType::EVENT => "event",
        vk::ObjectType::QUERY_POOL => "query_pool",
        vk::ObjectType::BUFFER_VIEW => "buffer_view",
        vk::ObjectType::IMAGE_VIEW => "image_view",
        vk::ObjectType::SHADER_MODULE => "shader_module",
        vk::ObjectType::PIPELINE_CACHE => "pipeline_cache",
        vk::ObjectType::PIPELINE_LAYOUT => "pipeline_layout",
        vk::ObjectType::RENDER_PASS => "render_pass",
        vk::ObjectType::PIPELINE => "pipeline",
        vk::ObjectType::DESCRIPTOR_SET_LAYOUT => "descriptor_set_layout",
        vk::ObjectType::SAMPLER => "sampler",
        vk::ObjectType::DESCRIPTOR_POOL => "descriptor_pool",
        vk::ObjectType::DESCRIPTOR_SET => "descriptor_set",
        vk::ObjectType::FRAMEBUFFER => "framebuffer",
        vk::ObjectType::COMMAND_POOL => "command_pool",
        vk::ObjectType::SAMPLER_YCBCR_CONVERSION => "sampler_ycbcr_conversion",
        vk::ObjectType::DESCRIPTOR_UPDATE_TEMPLATE => "descriptor_update_template",
        vk::ObjectType::PRIVATE_DATA_SLOT => "private_data_slot",
        vk::ObjectType::SURFACE_KHR => "surface",
        vk::ObjectType::SWAPCHAIN_KHR => "swapchain",
        vk::ObjectType::DISPLAY_KHR => "display",
        vk::ObjectType::DISPLAY_MODE_KHR => "display_mode",
        vk::ObjectType::DEBUG_REPORT_CALLBACK_EXT => "debug_report_callback",
        vk::ObjectType::DEBUG_UTILS_MESSENGER_EXT => "debug_utils_messenger",
        vk::ObjectType::ACCELERATION_STRUCTURE_KHR | vk::ObjectType::ACCELERATION_STRUCTURE_NV => {
            "acceleration_structure"
        }
        vk::ObjectType::VALIDATION_CACHE_EXT => "validation_cache",
        vk::ObjectType::DEFERRED_OPERATION_KHR => "deferred_operation",
        vk::ObjectType::INDIRECT_COMMANDS_LAYOUT_NV => "indirect_commands_layout",
        vk::ObjectType::PERFORMANCE_CONFIGURATION_INTEL => "performance_configuration",
        _ => "unknown",
    }
}

unsafe fn lossy<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: caller guarantees NUL termination.
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy())
    }
}

unsafe fn slice<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if ptr.is_null() || count == 0 {
        &[]
    } else {
        // SAFETY: caller guarantees `count` valid elements at `ptr`.
        unsafe { std::slice::from_raw_parts(ptr, count as usize) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type SeverityFlags = vk::DebugUtilsMessageSeverityFlagsEXT;
    type TypeFlags = vk::DebugUtilsMessageTypeFlagsEXT;

    #[test]
    fn severity_cascade() {
        assert_eq!(
            Severity::from_flags(SeverityFlags::WARNING | SeverityFlags::INFO),
            Severity::Warning
        );
        assert_eq!(
            Severity::from_flags(SeverityFlags::INFO | SeverityFlags::VERBOSE),
            Severity::Info
        );
        assert_eq!(Severity::from_flags(SeverityFlags::VERBOSE), Severity::Verbose);
        assert_eq!(Severity::from_flags(SeverityFlags::ERROR), Severity::Error);
        assert_eq!(Severity::from_flags(SeverityFlags::empty()), Severity::Error);
    }

    #[test]
    fn category_cascade() {
        assert_eq!(
            Category::from_flags(TypeFlags::PERFORMANCE | TypeFlags::VALIDATION),
            Category::Performance
        );
        assert_eq!(
            Category::from_flags(TypeFlags::VALIDATION | TypeFlags::GENERAL),
            Category::Validation
        );
        assert_eq!(Category::from_flags(TypeFlags::GENERAL), Category::General);
        assert_eq!(Category::from_flags(TypeFlags::empty()), Category::General);
    }

    #[test]
    fn plain_message() {
        let data =
            vk::DebugUtilsMessengerCallbackDataEXT::default().message(c"swapchain out of date");
        // SAFETY: all pointers come from live CStr literals.
        let diagnostic =
            unsafe { Diagnostic::from_raw(SeverityFlags::WARNING, TypeFlags::GENERAL, &data) };
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.category, Category::General);
        assert_eq!(diagnostic.message, "swapchain out of date");
    }

    #[test]
    fn message_lists_labels_and_objects() {
        let queue_labels = [vk::DebugUtilsLabelEXT::default().label_name(c"frame submit")];
        let cmd_labels = [
            vk::DebugUtilsLabelEXT::default().label_name(c"shadow pass"),
            vk::DebugUtilsLabelEXT::default().label_name(c"main pass"),
        ];
        let objects = [
            vk::DebugUtilsObjectNameInfoEXT {
                object_type: vk::ObjectType::IMAGE,
                object_handle: 0xbeef,
                ..Default::default()
            }
            .object_name(c"albedo"),
            vk::DebugUtilsObjectNameInfoEXT {
                object_type: vk::ObjectType::from_raw(-42),
                object_handle: 0x10,
                ..Default::default()
            },
        ];
        let data = vk::DebugUtilsMessengerCallbackDataEXT::default()
            .message(c"layout mismatch")
            .message_id_name(c"VUID-vkCmdDraw-None-09600")
            .message_id_number(7)
            .queue_labels(&queue_labels)
            .cmd_buf_labels(&cmd_labels)
            .objects(&objects);

        // SAFETY: all pointers reference the arrays and literals above.
        let diagnostic =
            unsafe { Diagnostic::from_raw(SeverityFlags::ERROR, TypeFlags::VALIDATION, &data) };

        let expected = "layout mismatch\n\
                        message id: VUID-vkCmdDraw-None-09600 (7)\n\
                        queue labels:\n  - frame submit\n\
                        command buffer labels:\n  - shadow pass\n  - main pass\n\
                        objects:\n  - image 0xbeef \"albedo\"\n  - unknown 0x10";
        assert_eq!(diagnostic.message, expected);
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.category, Category::Validation);
    }

    #[test]
    fn object_type_lookup() {
        assert_eq!(object_type_name(vk::ObjectType::SWAPCHAIN_KHR), "swapchain");
        assert_eq!(object_type_name(vk::ObjectType::COMMAND_POOL), "command_pool");
        assert_eq!(object_type_name(vk::ObjectType::UNKNOWN), "unknown");
        assert_eq!(object_type_name(vk::ObjectType::from_raw(i32::MAX)), "unknown");
    }

    #[test]
    fn sink_forwards_to_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = DiagnosticsSink::new(move |d: &Diagnostic| {
            captured.lock().unwrap().push(d.severity);
        });
        assert!(sink.is_active());

        let data = vk::DebugUtilsMessengerCallbackDataEXT::default().message(c"hello");
        let ptr = std::ptr::addr_of!(sink).cast_mut().cast::<c_void>();
        // SAFETY: `ptr` points at the live sink above and `data` is valid.
        let result = unsafe {
            messenger_callback(SeverityFlags::INFO, TypeFlags::GENERAL, &data, ptr)
        };

        assert_eq!(result, vk::FALSE);
        assert_eq!(*seen.lock().unwrap(), vec![Severity::Info]);
    }

    #[test]
    fn shared_sink_survives_owner_move() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = Arc::new(DiagnosticsSink::new(move |d: &Diagnostic| {
            captured.lock().unwrap().push(d.message.clone());
        }));
        let ptr = sink_user_data(&sink);

        let owners = vec![sink];
        let data = vk::DebugUtilsMessengerCallbackDataEXT::default().message(c"moved");
        // SAFETY: `owners` keeps the sink alive and `data` is valid.
        let result = unsafe {
            messenger_callback(SeverityFlags::WARNING, TypeFlags::VALIDATION, &data, ptr)
        };

        assert_eq!(result, vk::FALSE);
        assert_eq!(*seen.lock().unwrap(), vec![String::from("moved")]);
        assert_eq!(Arc::strong_count(&owners[0]), 1);
    }

    #[test]
    fn discard_sink_drops_messages() {
        let sink = DiagnosticsSink::discard();
        assert!(!sink.is_active());
        sink.dispatch(&Diagnostic {
            severity: Severity::Error,
            category: Category::General,
            message: String::from("ignored"),
        });
    }
}
