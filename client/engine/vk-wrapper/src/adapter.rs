use crate::device::{Device, DeviceError, DeviceWrapper};
use crate::{surface::Surface, Instance, Queue};
use ash::vk;
use common::log::info;
use common::parking_lot::Mutex;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::os::raw::c_char;
use std::slice;
use std::sync::Arc;

pub struct Adapter {
    pub(crate) instance: Arc<Instance>,
    pub(crate) native: vk::PhysicalDevice,
    pub(crate) props: vk::PhysicalDeviceProperties,
    pub(crate) enabled_extensions: Vec<CString>,
    pub(crate) features: vk::PhysicalDeviceFeatures,
    pub(crate) graphics_family: u32,
}

unsafe impl Send for Adapter {}

unsafe impl Sync for Adapter {}

impl Adapter {
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    pub fn create_device(self: &Arc<Self>) -> Result<Arc<Device>, DeviceError> {
        let priorities = [1.0_f32];
        let queue_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(self.graphics_family)
            .queue_priorities(&priorities)
            .build();

        let enabled_extensions_raw: Vec<*const c_char> =
            self.enabled_extensions.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(slice::from_ref(&queue_info))
            .enabled_extension_names(&enabled_extensions_raw)
            .enabled_features(&self.features);

        let native_device = unsafe { self.instance.native.create_device(self.native, &create_info, None)? };

        let swapchain_khr = ash::extensions::khr::Swapchain::new(&self.instance.native, &native_device);

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: self.instance.native.clone(),
            device: native_device.clone(),
            physical_device: self.native,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(err) => {
                unsafe { native_device.destroy_device(None) };
                return Err(err.into());
            }
        };

        let device_wrapper = Arc::new(DeviceWrapper {
            native: native_device,
            adapter: Arc::clone(self),
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
        });

        let queue = Arc::new(Queue {
            device_wrapper: Arc::clone(&device_wrapper),
            swapchain_khr: swapchain_khr.clone(),
            native: Mutex::new(unsafe { device_wrapper.native.get_device_queue(self.graphics_family, 0) }),
            family_index: self.graphics_family,
        });

        info!("Logical device created on {}", self.name());

        Ok(Arc::new(Device {
            wrapper: device_wrapper,
            swapchain_khr,
            queue,
        }))
    }

    pub(crate) fn get_surface_capabilities(&self, surface: &Surface) -> Result<vk::SurfaceCapabilitiesKHR, vk::Result> {
        let mut surface_capabs = unsafe {
            self.instance
                .surface_khr
                .get_physical_device_surface_capabilities(self.native, surface.native)?
        };
        if surface_capabs.max_image_count == 0 {
            surface_capabs.max_image_count = u32::MAX;
        }
        Ok(surface_capabs)
    }

    pub(crate) fn get_surface_formats(&self, surface: &Surface) -> Result<Vec<vk::SurfaceFormatKHR>, vk::Result> {
        unsafe {
            self.instance
                .surface_khr
                .get_physical_device_surface_formats(self.native, surface.native)
        }
    }

    pub(crate) fn get_surface_present_modes(&self, surface: &Surface) -> Result<Vec<vk::PresentModeKHR>, vk::Result> {
        unsafe {
            self.instance
                .surface_khr
                .get_physical_device_surface_present_modes(self.native, surface.native)
        }
    }

    pub fn get_surface_size(&self, surface: &Surface) -> Result<(u32, u32), vk::Result> {
        let capabs = self.get_surface_capabilities(surface)?;
        Ok((capabs.current_extent.width, capabs.current_extent.height))
    }

    /// First of the candidate depth formats usable as an optimal-tiling depth attachment.
    pub(crate) fn find_depth_format(&self) -> Option<vk::Format> {
        [
            vk::Format::D32_SFLOAT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
        ]
        .into_iter()
        .find(|&format| {
            let props = unsafe {
                self.instance
                    .native
                    .get_physical_device_format_properties(self.native, format)
            };
            props
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
    }

    pub(crate) fn max_sampler_anisotropy(&self) -> Option<f32> {
        (self.features.sampler_anisotropy == vk::TRUE).then_some(self.props.limits.max_sampler_anisotropy)
    }
}
