use crate::device::DeviceWrapper;
use ash::vk;
use std::sync::Arc;

/// Binary semaphore used to order acquire, render and present on the GPU.
pub struct Semaphore {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::Semaphore,
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_semaphore(self.native, None) };
    }
}
