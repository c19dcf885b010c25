use crate::device::DeviceWrapper;
use crate::{Device, DeviceError, Framebuffer, ImageView};
use ash::vk;
use std::slice;
use std::sync::Arc;

pub enum ClearValue {
    ColorF32([f32; 4]),
    Depth(f32),
}

pub(crate) fn vk_clear_value(clear_value: &ClearValue) -> vk::ClearValue {
    match clear_value {
        ClearValue::ColorF32(c) => vk::ClearValue {
            color: vk::ClearColorValue { float32: *c },
        },
        ClearValue::Depth(d) => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: *d, stencil: 0 },
        },
    }
}

/// Single-subpass pass with one presentable color attachment (index 0)
/// and one transient depth attachment (index 1).
pub struct RenderPass {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::RenderPass,
    pub(crate) color_format: vk::Format,
    pub(crate) depth_format: vk::Format,
}

impl RenderPass {
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn create_framebuffer(
        self: &Arc<Self>,
        size: (u32, u32),
        color: &Arc<ImageView>,
        depth: &Arc<ImageView>,
    ) -> Result<Arc<Framebuffer>, DeviceError> {
        let native_views = [color.native, depth.native];

        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(self.native)
            .attachments(&native_views)
            .width(size.0)
            .height(size.1)
            .layers(1);

        Ok(Arc::new(Framebuffer {
            device_wrapper: Arc::clone(&self.device_wrapper),
            render_pass: Arc::clone(self),
            native: unsafe { self.device_wrapper.native.create_framebuffer(&create_info, None)? },
            _image_views: vec![Arc::clone(color), Arc::clone(depth)],
            size,
        }))
    }
}

impl PartialEq for RenderPass {
    fn eq(&self, other: &Self) -> bool {
        self.native == other.native
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_render_pass(self.native, None) };
    }
}

impl Device {
    pub fn create_render_pass(
        &self,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<Arc<RenderPass>, DeviceError> {
        let attachments = [
            vk::AttachmentDescription::builder()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                .build(),
            vk::AttachmentDescription::builder()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        ];

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(slice::from_ref(&color_ref))
            .depth_stencil_attachment(&depth_ref)
            .build();

        let stages =
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .dst_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .build();

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(slice::from_ref(&subpass))
            .dependencies(slice::from_ref(&dependency));

        Ok(Arc::new(RenderPass {
            device_wrapper: Arc::clone(&self.wrapper),
            native: unsafe { self.wrapper.native.create_render_pass(&create_info, None)? },
            color_format,
            depth_format,
        }))
    }
}
