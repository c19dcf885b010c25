use crate::image::ImageView;
use crate::{Adapter, Fence, Queue, Semaphore, Surface, Swapchain};
use ash::vk;
use common::log::{error, info};
use common::parking_lot::Mutex;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::{AllocationError, MemoryLocation};
use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::Arc;

#[derive(Debug)]
pub enum DeviceError {
    VkError(vk::Result),
    ZeroBufferSize,
    AllocationError(String),
    NotHostVisible,
    NoDepthFormat,
    SwapchainError(String),
    InvalidShader(String),
}

impl From<vk::Result> for DeviceError {
    fn from(err: vk::Result) -> Self {
        DeviceError::VkError(err)
    }
}

impl From<AllocationError> for DeviceError {
    fn from(err: AllocationError) -> Self {
        DeviceError::AllocationError(err.to_string())
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::VkError(e) => write!(f, "Vulkan error: {}", e),
            DeviceError::ZeroBufferSize => write!(f, "buffer size must be non-zero"),
            DeviceError::AllocationError(msg) => write!(f, "memory allocation: {}", msg),
            DeviceError::NotHostVisible => write!(f, "allocation is not host visible"),
            DeviceError::NoDepthFormat => write!(f, "no supported depth format"),
            DeviceError::SwapchainError(msg) => write!(f, "swapchain: {}", msg),
            DeviceError::InvalidShader(msg) => write!(f, "invalid shader: {}", msg),
        }
    }
}

impl std::error::Error for DeviceError {}

pub(crate) struct DeviceWrapper {
    pub(crate) native: ash::Device,
    pub(crate) adapter: Arc<Adapter>,
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,
}

impl DeviceWrapper {
    /// Sub-allocates memory from the device allocator's blocks.
    pub(crate) fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation, DeviceError> {
        let allocation = self.allocator.lock().allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;
        Ok(allocation)
    }

    pub(crate) fn free(&self, allocation: Allocation) {
        if let Err(err) = self.allocator.lock().free(allocation) {
            error!("Failed to free device memory: {}", err);
        }
    }
}

impl Drop for DeviceWrapper {
    fn drop(&mut self) {
        unsafe {
            // Nothing can be done about a lost device at this point.
            let _ = self.native.device_wait_idle();
            // The allocator releases its memory blocks through the device.
            ManuallyDrop::drop(&mut self.allocator);
            self.native.destroy_device(None);
        }
    }
}

/// Logical device together with its single graphics/present queue.
///
/// Every object created from the device keeps the underlying `DeviceWrapper` alive,
/// so handles never outlive the device they belong to.
pub struct Device {
    pub(crate) wrapper: Arc<DeviceWrapper>,
    pub(crate) swapchain_khr: ash::extensions::khr::Swapchain,
    pub(crate) queue: Arc<Queue>,
}

impl Device {
    pub fn adapter(&self) -> &Arc<Adapter> {
        &self.wrapper.adapter
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    pub fn create_binary_semaphore(&self) -> Result<Semaphore, DeviceError> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        Ok(Semaphore {
            device_wrapper: Arc::clone(&self.wrapper),
            native: unsafe { self.wrapper.native.create_semaphore(&create_info, None)? },
        })
    }

    pub fn create_fence(&self, signaled: bool) -> Result<Fence, DeviceError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        Ok(Fence {
            device_wrapper: Arc::clone(&self.wrapper),
            native: unsafe { self.wrapper.native.create_fence(&create_info, None)? },
        })
    }

    pub fn swapchain_min_max_images(&self, surface: &Surface) -> Result<(u32, u32), DeviceError> {
        let surface_capabs = self.wrapper.adapter.get_surface_capabilities(surface)?;
        Ok((surface_capabs.min_image_count, surface_capabs.max_image_count))
    }

    pub fn depth_format(&self) -> Result<vk::Format, DeviceError> {
        self.wrapper.adapter.find_depth_format().ok_or(DeviceError::NoDepthFormat)
    }

    pub fn create_swapchain(
        &self,
        surface: &Arc<Surface>,
        preferred_size: (u32, u32),
        vsync: bool,
        preferred_n_images: u32,
        old_swapchain: Option<&Swapchain>,
    ) -> Result<Swapchain, DeviceError> {
        let adapter = &self.wrapper.adapter;
        let surface_capabs = adapter.get_surface_capabilities(surface)?;
        let surface_formats = adapter.get_surface_formats(surface)?;
        let surface_present_modes = adapter.get_surface_present_modes(surface)?;

        let image_usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
        if !surface_capabs.supported_usage_flags.contains(image_usage) {
            return Err(DeviceError::SwapchainError(
                "Image usage flags are not supported!".to_string(),
            ));
        }

        let composite_alpha = vk::CompositeAlphaFlagsKHR::OPAQUE;
        if !surface_capabs.supported_composite_alpha.contains(composite_alpha) {
            return Err(DeviceError::SwapchainError("Composite alpha not supported!".to_string()));
        }

        let size = if surface_capabs.current_extent.width != u32::MAX {
            (surface_capabs.current_extent.width, surface_capabs.current_extent.height)
        } else {
            (
                preferred_size
                    .0
                    .clamp(surface_capabs.min_image_extent.width, surface_capabs.max_image_extent.width),
                preferred_size
                    .1
                    .clamp(surface_capabs.min_image_extent.height, surface_capabs.max_image_extent.height),
            )
        };
        if size.0 == 0 || size.1 == 0 {
            return Err(DeviceError::SwapchainError("Surface has zero extent".to_string()));
        }

        let s_format = surface_formats
            .iter()
            .find(|&s_format| {
                matches!(s_format.format, vk::Format::R8G8B8A8_SRGB | vk::Format::B8G8R8A8_SRGB)
                    && s_format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| surface_formats.first())
            .ok_or_else(|| DeviceError::SwapchainError("Swapchain format not found!".to_string()))?;

        let min_image_count = preferred_n_images.clamp(surface_capabs.min_image_count, surface_capabs.max_image_count);

        let present_mode = if vsync {
            vk::PresentModeKHR::FIFO
        } else {
            surface_present_modes
                .iter()
                .copied()
                .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
                .or_else(|| {
                    surface_present_modes
                        .iter()
                        .copied()
                        .find(|&mode| mode == vk::PresentModeKHR::IMMEDIATE)
                })
                .unwrap_or(vk::PresentModeKHR::FIFO)
        };

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.native)
            .min_image_count(min_image_count)
            .image_format(s_format.format)
            .image_color_space(s_format.color_space)
            .image_extent(vk::Extent2D {
                width: size.0,
                height: size.1,
            })
            .image_array_layers(1)
            .image_usage(image_usage)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_capabs.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(present_mode)
            .clipped(true);

        if let Some(old_swapchain) = old_swapchain {
            create_info = create_info.old_swapchain(old_swapchain.native);
        }

        let native = unsafe { self.swapchain_khr.create_swapchain(&create_info, None)? };
        let images = unsafe { self.swapchain_khr.get_swapchain_images(native)? };

        let mut views = Vec::with_capacity(images.len());
        for &image in &images {
            views.push(Arc::new(ImageView::new(
                &self.wrapper,
                image,
                None,
                s_format.format,
                vk::ImageAspectFlags::COLOR,
            )?));
        }

        info!(
            "Swapchain created: {}x{}, {} images, {:?}",
            size.0,
            size.1,
            images.len(),
            present_mode
        );

        Ok(Swapchain {
            device_wrapper: Arc::clone(&self.wrapper),
            swapchain_khr: self.swapchain_khr.clone(),
            surface: Arc::clone(surface),
            native,
            format: s_format.format,
            size,
            images,
            views,
        })
    }

    /// Blocks until the device finishes all submitted work.
    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        let _queue = self.queue.native.lock();
        unsafe { self.wrapper.native.device_wait_idle() }
    }
}

unsafe impl Send for Device {}

unsafe impl Sync for Device {}
