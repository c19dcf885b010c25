use crate::device::DeviceWrapper;
use ash::vk;
use std::sync::Arc;

pub struct Fence {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::Fence,
}

impl Fence {
    pub fn reset(&self) -> Result<(), vk::Result> {
        unsafe { self.device_wrapper.native.reset_fences(&[self.native]) }
    }

    pub fn wait(&self) -> Result<(), vk::Result> {
        unsafe {
            self.device_wrapper
                .native
                .wait_for_fences(&[self.native], true, u64::MAX)
        }
    }

    pub fn is_signaled(&self) -> Result<bool, vk::Result> {
        unsafe { self.device_wrapper.native.get_fence_status(self.native) }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_fence(self.native, None) };
    }
}
