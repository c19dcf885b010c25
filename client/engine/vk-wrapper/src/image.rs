use crate::device::DeviceWrapper;
use crate::utils::vk_bitflags_impl;
use crate::{Device, DeviceError};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ImageUsageFlags(pub(crate) vk::ImageUsageFlags);
vk_bitflags_impl!(ImageUsageFlags, vk::ImageUsageFlags);

impl ImageUsageFlags {
    pub const TRANSFER_SRC: Self = Self(vk::ImageUsageFlags::TRANSFER_SRC);
    pub const TRANSFER_DST: Self = Self(vk::ImageUsageFlags::TRANSFER_DST);
    pub const SAMPLED: Self = Self(vk::ImageUsageFlags::SAMPLED);
    pub const COLOR_ATTACHMENT: Self = Self(vk::ImageUsageFlags::COLOR_ATTACHMENT);
    pub const DEPTH_STENCIL_ATTACHMENT: Self = Self(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ImageLayout(pub(crate) vk::ImageLayout);

impl ImageLayout {
    pub const UNDEFINED: Self = Self(vk::ImageLayout::UNDEFINED);
    pub const TRANSFER_DST: Self = Self(vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    pub const SHADER_READ: Self = Self(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
}

/// Device-local 2D image backed by a sub-allocation of the device allocator.
pub struct Image {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::Image,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) format: vk::Format,
    pub(crate) aspect: vk::ImageAspectFlags,
    pub(crate) size: (u32, u32),
}

impl Image {
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn create_view(self: &Arc<Self>) -> Result<ImageView, DeviceError> {
        ImageView::new(
            &self.device_wrapper,
            self.native,
            Some(Arc::clone(self)),
            self.format,
            self.aspect,
        )
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_image(self.native, None) };
        if let Some(allocation) = self.allocation.take() {
            self.device_wrapper.free(allocation);
        }
    }
}

unsafe impl Send for Image {}

unsafe impl Sync for Image {}

pub struct ImageView {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::ImageView,
    pub(crate) _image: Option<Arc<Image>>,
}

impl ImageView {
    /// `image` keeps an owned image alive for as long as the view exists.
    /// Swapchain images are not owned and pass `None`.
    pub(crate) fn new(
        device_wrapper: &Arc<DeviceWrapper>,
        native_image: vk::Image,
        image: Option<Arc<Image>>,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<ImageView, DeviceError> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(native_image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        Ok(ImageView {
            device_wrapper: Arc::clone(device_wrapper),
            native: unsafe { device_wrapper.native.create_image_view(&create_info, None)? },
            _image: image,
        })
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_image_view(self.native, None) };
    }
}

unsafe impl Send for ImageView {}

unsafe impl Sync for ImageView {}

impl Device {
    pub fn create_image_2d(
        &self,
        format: vk::Format,
        usage: ImageUsageFlags,
        size: (u32, u32),
    ) -> Result<Arc<Image>, DeviceError> {
        let aspect = match format {
            vk::Format::D32_SFLOAT => vk::ImageAspectFlags::DEPTH,
            vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::COLOR,
        };

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: size.0,
                height: size.1,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage.0)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let native = unsafe { self.wrapper.native.create_image(&image_info, None)? };
        let requirements = unsafe { self.wrapper.native.get_image_memory_requirements(native) };

        let allocation = match self
            .wrapper
            .allocate("image_2d", requirements, MemoryLocation::GpuOnly, false)
        {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.wrapper.native.destroy_image(native, None) };
                return Err(e);
            }
        };
        let (memory, offset) = unsafe { (allocation.memory(), allocation.offset()) };

        let image = Image {
            device_wrapper: Arc::clone(&self.wrapper),
            native,
            allocation: Some(allocation),
            format,
            aspect,
            size,
        };
        unsafe { self.wrapper.native.bind_image_memory(native, memory, offset)? };

        Ok(Arc::new(image))
    }
}
