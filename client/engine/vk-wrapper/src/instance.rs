use crate::adapter::Adapter;
use crate::entry::VK_API_VERSION;
use crate::{surface::Surface, utils, Entry};
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;

pub struct Instance {
    pub(crate) entry: Arc<Entry>,
    pub(crate) native: ash::Instance,
    pub(crate) debug_utils_ext: Option<ash::extensions::ext::DebugUtils>,
    pub(crate) debug_utils_messenger: Option<vk::DebugUtilsMessengerEXT>,
    pub(crate) surface_khr: ash::extensions::khr::Surface,
}

impl Instance {
    pub fn create_surface(
        self: &Arc<Self>,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Arc<Surface>, vk::Result> {
        let native =
            unsafe { ash_window::create_surface(&self.entry.ash_entry, &self.native, display, window, None)? };

        Ok(Arc::new(Surface {
            instance: Arc::clone(self),
            native,
        }))
    }

    fn enumerate_device_extension_names(&self, p_device: vk::PhysicalDevice) -> Result<Vec<String>, vk::Result> {
        Ok(unsafe { self.native.enumerate_device_extension_properties(p_device) }?
            .iter()
            .map(|ext| unsafe { utils::c_ptr_to_string(ext.extension_name.as_ptr()) })
            .collect())
    }

    /// Returns adapters that have a graphics queue family able to present to `surface`,
    /// discrete GPUs first.
    pub fn enumerate_adapters(self: &Arc<Self>, surface: &Surface) -> Result<Vec<Arc<Adapter>>, vk::Result> {
        let physical_devices = unsafe { self.native.enumerate_physical_devices()? };
        let mut adapters = Vec::<Arc<Adapter>>::new();

        for p_device in physical_devices {
            let props = unsafe { self.native.get_physical_device_properties(p_device) };

            if vk::api_version_major(props.api_version) != vk::api_version_major(VK_API_VERSION)
                || vk::api_version_minor(props.api_version) < vk::api_version_minor(VK_API_VERSION)
            {
                continue;
            }

            // One family must do both graphics and present: the whole frame goes through a single queue.
            let queue_families = unsafe { self.native.get_physical_device_queue_family_properties(p_device) };
            let mut graphics_family = None;

            for (i, fam_prop) in queue_families.iter().enumerate() {
                if !fam_prop.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                    continue;
                }
                let present_supported = unsafe {
                    self.surface_khr
                        .get_physical_device_surface_support(p_device, i as u32, surface.native)?
                };
                if present_supported {
                    graphics_family = Some(i as u32);
                    break;
                }
            }
            let Some(graphics_family) = graphics_family else {
                continue;
            };

            let available_extensions = self.enumerate_device_extension_names(p_device)?;
            let Ok(mut enabled_extensions) = utils::filter_names(&available_extensions, &["VK_KHR_swapchain"], true)
            else {
                continue;
            };
            if let Ok(preferred) = utils::filter_names(&available_extensions, &["VK_KHR_portability_subset"], false) {
                enabled_extensions.extend(preferred);
            }

            let features = unsafe { self.native.get_physical_device_features(p_device) };
            let mut enabled_features = vk::PhysicalDeviceFeatures::default();
            enabled_features.sampler_anisotropy = features.sampler_anisotropy;

            adapters.push(Arc::new(Adapter {
                instance: Arc::clone(self),
                native: p_device,
                props,
                enabled_extensions,
                features: enabled_features,
                graphics_family,
            }));
        }

        adapters.sort_by_key(|a| a.props.device_type != vk::PhysicalDeviceType::DISCRETE_GPU);
        Ok(adapters)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils_ext), Some(messenger)) = (&self.debug_utils_ext, self.debug_utils_messenger) {
                debug_utils_ext.destroy_debug_utils_messenger(messenger, None);
            }
            self.native.destroy_instance(None);
        };
    }
}
