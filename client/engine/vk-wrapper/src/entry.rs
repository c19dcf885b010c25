use crate::utils;
use crate::Instance;
use ash::vk;
use common::log::{debug, error, info, warn};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::{c_char, c_void};
use std::sync::Arc;

pub(crate) const VK_API_VERSION: u32 = vk::API_VERSION_1_1;

#[derive(Debug)]
pub enum InstanceError {
    AshError(ash::LoadingError),
    VkError(vk::Result),
    MissingNames(Vec<String>),
}

impl From<ash::LoadingError> for InstanceError {
    fn from(err: ash::LoadingError) -> Self {
        InstanceError::AshError(err)
    }
}

impl From<vk::Result> for InstanceError {
    fn from(err: vk::Result) -> Self {
        InstanceError::VkError(err)
    }
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceError::AshError(e) => write!(f, "failed to load Vulkan: {}", e),
            InstanceError::VkError(e) => write!(f, "Vulkan error: {}", e),
            InstanceError::MissingNames(names) => write!(f, "missing layers/extensions: {:?}", names),
        }
    }
}

impl std::error::Error for InstanceError {}

pub struct Entry {
    pub(crate) ash_entry: ash::Entry,
}

unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let msg = CStr::from_ptr((*p_callback_data).p_message);

    let msg_type = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "VAL",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "PERF",
        _ => "",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!(target: "vulkan", "[{}] {:?}", msg_type, msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!(target: "vulkan", "[{}] {:?}", msg_type, msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!(target: "vulkan", "[{}] {:?}", msg_type, msg),
        _ => debug!(target: "vulkan", "[{}] {:?}", msg_type, msg),
    }

    vk::FALSE
}

impl Entry {
    pub fn new() -> Result<Arc<Entry>, ash::LoadingError> {
        Ok(Arc::new(Entry {
            ash_entry: unsafe { ash::Entry::load()? },
        }))
    }

    fn enumerate_instance_layer_names(&self) -> Result<Vec<String>, vk::Result> {
        Ok(self
            .ash_entry
            .enumerate_instance_layer_properties()?
            .iter()
            .map(|layer| unsafe { utils::c_ptr_to_string(layer.layer_name.as_ptr()) })
            .collect())
    }

    fn enumerate_instance_extension_names(&self) -> Result<Vec<String>, vk::Result> {
        Ok(self
            .ash_entry
            .enumerate_instance_extension_properties(None)?
            .iter()
            .map(|ext| unsafe { utils::c_ptr_to_string(ext.extension_name.as_ptr()) })
            .collect())
    }

    /// Creates a Vulkan instance. Window-system extensions are enabled for `display` when given.
    /// With `validation`, the Khronos validation layer is enabled if present and its messages
    /// are forwarded to the `vulkan` log target.
    pub fn create_instance(
        self: &Arc<Self>,
        app_name: &str,
        display: Option<RawDisplayHandle>,
        validation: bool,
    ) -> Result<Arc<Instance>, InstanceError> {
        let c_app_name = CString::new(app_name).unwrap_or_default();
        let c_engine_name = CString::new("frame-pipeline").unwrap_or_default();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(c_app_name.as_c_str())
            .engine_name(c_engine_name.as_c_str())
            .api_version(VK_API_VERSION);

        let window_extensions: Vec<String> = match display {
            Some(display) => ash_window::enumerate_required_extensions(display)?
                .iter()
                .map(|&name| unsafe { utils::c_ptr_to_string(name) })
                .collect(),
            None => vec![],
        };
        let available_layers = self.enumerate_instance_layer_names()?;
        let available_extensions = self.enumerate_instance_extension_names()?;

        let mut required_extensions: Vec<&str> = window_extensions.iter().map(|a| a.as_ref()).collect();
        let mut preferred_extensions: Vec<&str> = vec!["VK_KHR_portability_enumeration"];
        let mut preferred_layers: Vec<&str> = vec![];

        if validation {
            preferred_layers.push("VK_LAYER_KHRONOS_validation");
            preferred_extensions.push("VK_EXT_debug_utils");
        }
        required_extensions.push("VK_KHR_surface");

        let enabled_layers = utils::filter_names(&available_layers, &preferred_layers, false)
            .map_err(InstanceError::MissingNames)?;
        if validation && enabled_layers.is_empty() {
            warn!("Validation requested but VK_LAYER_KHRONOS_validation is not available");
        }
        let enabled_layers_raw: Vec<*const c_char> = enabled_layers.iter().map(|name| name.as_ptr()).collect();

        let mut enabled_extensions = utils::filter_names(&available_extensions, &required_extensions, true)
            .map_err(InstanceError::MissingNames)?;
        enabled_extensions.extend(
            utils::filter_names(&available_extensions, &preferred_extensions, false)
                .map_err(InstanceError::MissingNames)?,
        );
        let enabled_extensions_raw: Vec<*const c_char> =
            enabled_extensions.iter().map(|name| name.as_ptr()).collect();

        let has_extension = |name: &CStr| enabled_extensions.iter().any(|v| v.as_c_str() == name);
        let debug_utils_enabled = has_extension(ash::extensions::ext::DebugUtils::name());

        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&enabled_layers_raw)
            .enabled_extension_names(&enabled_extensions_raw);

        if enabled_extensions
            .iter()
            .any(|v| v.as_bytes() == b"VK_KHR_portability_enumeration")
        {
            info = info.flags(vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR);
        }

        let mut debug_msg_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback));

        if debug_utils_enabled {
            info = info.push_next(&mut debug_msg_info);
        }

        let native_instance = unsafe { self.ash_entry.create_instance(&info, None)? };

        let (debug_utils_ext, debug_utils_messenger) = if debug_utils_enabled {
            let debug_utils = ash::extensions::ext::DebugUtils::new(&self.ash_entry, &native_instance);
            let debug_utils_messenger = unsafe { debug_utils.create_debug_utils_messenger(&debug_msg_info, None)? };
            (Some(debug_utils), Some(debug_utils_messenger))
        } else {
            (None, None)
        };

        let surface_khr = ash::extensions::khr::Surface::new(&self.ash_entry, &native_instance);

        info!(
            "Vulkan instance created (layers: {:?})",
            enabled_layers.iter().map(|v| v.to_string_lossy()).collect::<Vec<_>>()
        );

        Ok(Arc::new(Instance {
            entry: Arc::clone(self),
            native: native_instance,
            debug_utils_ext,
            debug_utils_messenger,
            surface_khr,
        }))
    }
}
