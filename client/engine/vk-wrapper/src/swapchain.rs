use crate::device::DeviceWrapper;
use crate::image::ImageView;
use crate::{Semaphore, Surface};
use ash::vk;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum Error {
    VkError(vk::Result),
    IncompatibleSurface,
}

impl From<vk::Result> for Error {
    fn from(err: vk::Result) -> Self {
        Self::VkError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::VkError(e) => write!(f, "Vulkan error: {}", e),
            Error::IncompatibleSurface => write!(f, "swapchain is out of date"),
        }
    }
}

impl std::error::Error for Error {}

pub struct Swapchain {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) swapchain_khr: ash::extensions::khr::Swapchain,
    pub(crate) surface: Arc<Surface>,
    pub(crate) native: vk::SwapchainKHR,
    pub(crate) format: vk::Format,
    pub(crate) size: (u32, u32),
    pub(crate) images: Vec<vk::Image>,
    pub(crate) views: Vec<Arc<ImageView>>,
}

impl Swapchain {
    pub fn surface(&self) -> &Arc<Surface> {
        &self.surface
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image_views(&self) -> &[Arc<ImageView>] {
        &self.views
    }

    /// Acquires the next presentable image, signaling `semaphore` when it is ready.
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_image(&self, semaphore: &Semaphore) -> Result<(u32, bool), Error> {
        let result = unsafe {
            self.swapchain_khr
                .acquire_next_image(self.native, u64::MAX, semaphore.native, vk::Fence::null())
        };

        match result {
            Ok(a) => Ok(a),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::IncompatibleSurface),
            Err(e) => Err(Error::VkError(e)),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.views.clear();
        unsafe {
            let _ = self.device_wrapper.native.device_wait_idle();
            self.swapchain_khr.destroy_swapchain(self.native, None);
        }
    }
}
