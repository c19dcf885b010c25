use crate::device::DeviceWrapper;
use crate::{ImageView, RenderPass};
use ash::vk;
use std::sync::Arc;

pub struct Framebuffer {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) render_pass: Arc<RenderPass>,
    pub(crate) native: vk::Framebuffer,
    pub(crate) _image_views: Vec<Arc<ImageView>>,
    pub(crate) size: (u32, u32),
}

impl Framebuffer {
    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_framebuffer(self.native, None) };
    }
}

unsafe impl Send for Framebuffer {}

unsafe impl Sync for Framebuffer {}
