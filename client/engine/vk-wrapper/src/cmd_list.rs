use crate::descriptor_pool::DescriptorSet;
use crate::device::DeviceWrapper;
use crate::image::ImageLayout;
use crate::render_pass::{vk_clear_value, ClearValue};
use crate::{Buffer, Framebuffer, Image, Pipeline, PipelineLayout, RenderPass};
use ash::vk;
use smallvec::SmallVec;
use std::sync::Arc;
use std::{mem, slice};

/// Plain handle to a recorded command buffer, used to hand secondary buffers
/// from recording threads to the thread that executes them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CmdListHandle(pub(crate) vk::CommandBuffer);

unsafe impl Send for CmdListHandle {}

unsafe impl Sync for CmdListHandle {}

/// Command buffer with a dedicated pool. Resetting the list resets its pool.
pub struct CmdList {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) pool: vk::CommandPool,
    pub(crate) native: vk::CommandBuffer,
}

unsafe impl Send for CmdList {}

impl CmdList {
    pub fn handle(&self) -> CmdListHandle {
        CmdListHandle(self.native)
    }

    /// With `release_resources`, memory held by the pool is returned to the system.
    pub fn reset(&mut self, release_resources: bool) -> Result<(), vk::Result> {
        let flags = if release_resources {
            vk::CommandPoolResetFlags::RELEASE_RESOURCES
        } else {
            vk::CommandPoolResetFlags::empty()
        };
        unsafe { self.device_wrapper.native.reset_command_pool(self.pool, flags) }
    }

    pub fn begin(&mut self, one_time_execution: bool) -> Result<(), vk::Result> {
        let mut begin_info = vk::CommandBufferBeginInfo::builder();
        if one_time_execution {
            begin_info = begin_info.flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        }

        unsafe {
            self.device_wrapper
                .native
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())?;
            self.device_wrapper.native.begin_command_buffer(self.native, &begin_info)
        }
    }

    /// Begins a secondary list that continues `subpass` of `render_pass`.
    /// The framebuffer is left unspecified, so the list can run inside any compatible framebuffer.
    /// Does not reset the pool, see [`CmdList::reset`].
    pub fn begin_secondary_graphics(
        &mut self,
        render_pass: &RenderPass,
        subpass: u32,
        viewport_size: (u32, u32),
    ) -> Result<(), vk::Result> {
        let inheritance_info = vk::CommandBufferInheritanceInfo::builder()
            .render_pass(render_pass.native)
            .subpass(subpass)
            .framebuffer(vk::Framebuffer::null());

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(
                vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE | vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            )
            .inheritance_info(&inheritance_info);

        unsafe { self.device_wrapper.native.begin_command_buffer(self.native, &begin_info)? };

        self.set_viewport(viewport_size);
        self.set_scissor(viewport_size);
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), vk::Result> {
        unsafe { self.device_wrapper.native.end_command_buffer(self.native) }
    }

    pub fn begin_render_pass(
        &mut self,
        render_pass: &RenderPass,
        framebuffer: &Framebuffer,
        clear_values: &[ClearValue],
        secondary_cmd_lists: bool,
    ) {
        let clear_values: SmallVec<[vk::ClearValue; 4]> = clear_values.iter().map(vk_clear_value).collect();

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass.native)
            .framebuffer(framebuffer.native)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: framebuffer.size.0,
                    height: framebuffer.size.1,
                },
            })
            .clear_values(&clear_values);

        unsafe {
            self.device_wrapper.native.cmd_begin_render_pass(
                self.native,
                &begin_info,
                if secondary_cmd_lists {
                    vk::SubpassContents::SECONDARY_COMMAND_BUFFERS
                } else {
                    vk::SubpassContents::INLINE
                },
            )
        }

        if !secondary_cmd_lists {
            self.set_viewport(framebuffer.size);
            self.set_scissor(framebuffer.size);
        }
    }

    pub fn end_render_pass(&mut self) {
        unsafe { self.device_wrapper.native.cmd_end_render_pass(self.native) };
    }

    pub fn execute_secondary(&mut self, cmd_lists: &[CmdListHandle]) {
        if cmd_lists.is_empty() {
            return;
        }
        let natives: SmallVec<[vk::CommandBuffer; 8]> = cmd_lists.iter().map(|cl| cl.0).collect();
        unsafe { self.device_wrapper.native.cmd_execute_commands(self.native, &natives) };
    }

    pub fn set_viewport(&mut self, size: (u32, u32)) {
        unsafe {
            self.device_wrapper.native.cmd_set_viewport(
                self.native,
                0,
                &[vk::Viewport {
                    x: 0f32,
                    y: size.1 as f32,
                    width: size.0 as f32,
                    height: -(size.1 as f32),
                    min_depth: 0f32,
                    max_depth: 1f32,
                }],
            )
        };
    }

    pub fn set_scissor(&mut self, size: (u32, u32)) {
        unsafe {
            self.device_wrapper.native.cmd_set_scissor(
                self.native,
                0,
                &[vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: vk::Extent2D {
                        width: size.0,
                        height: size.1,
                    },
                }],
            )
        };
    }

    pub fn bind_pipeline(&mut self, pipeline: &Pipeline) {
        unsafe {
            self.device_wrapper
                .native
                .cmd_bind_pipeline(self.native, vk::PipelineBindPoint::GRAPHICS, pipeline.native)
        };
    }

    pub fn bind_descriptor_sets(&mut self, layout: &PipelineLayout, first_set: u32, sets: &[DescriptorSet]) {
        let natives: SmallVec<[vk::DescriptorSet; 4]> = sets.iter().map(|s| s.0).collect();
        unsafe {
            self.device_wrapper.native.cmd_bind_descriptor_sets(
                self.native,
                vk::PipelineBindPoint::GRAPHICS,
                layout.native,
                first_set,
                &natives,
                &[],
            )
        };
    }

    /// buffers (max: 16): [buffer, offset]
    pub fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[(&Buffer, u64)]) {
        let mut native_buffers = [vk::Buffer::default(); 16];
        let mut offsets = [0u64; 16];

        for (i, (buffer, offset)) in buffers.iter().take(16).enumerate() {
            native_buffers[i] = buffer.native;
            offsets[i] = *offset;
        }
        let count = buffers.len().min(16);

        unsafe {
            self.device_wrapper.native.cmd_bind_vertex_buffers(
                self.native,
                first_binding,
                &native_buffers[0..count],
                &offsets[0..count],
            )
        };
    }

    pub fn bind_index_buffer(&mut self, buffer: &Buffer, offset: u64) {
        unsafe {
            self.device_wrapper
                .native
                .cmd_bind_index_buffer(self.native, buffer.native, offset, vk::IndexType::UINT32)
        };
    }

    pub fn push_constants<T: Copy>(&mut self, layout: &PipelineLayout, data: &T) {
        let size = mem::size_of_val(data);
        assert!(size as u32 <= layout.push_constants_size);

        unsafe {
            self.device_wrapper.native.cmd_push_constants(
                self.native,
                layout.native,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                slice::from_raw_parts(data as *const T as *const u8, size),
            )
        };
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device_wrapper
                .native
                .cmd_draw(self.native, vertex_count, instance_count, first_vertex, first_instance)
        };
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, first_instance: u32) {
        unsafe {
            self.device_wrapper.native.cmd_draw_indexed(
                self.native,
                index_count,
                instance_count,
                first_index,
                0,
                first_instance,
            )
        };
    }

    pub fn barrier_image(
        &mut self,
        image: &Image,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) {
        let (src_access, dst_access) = match (old_layout, new_layout) {
            (ImageLayout::UNDEFINED, ImageLayout::TRANSFER_DST) => {
                (vk::AccessFlags::empty(), vk::AccessFlags::TRANSFER_WRITE)
            }
            (ImageLayout::TRANSFER_DST, ImageLayout::SHADER_READ) => {
                (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::SHADER_READ)
            }
            _ => (vk::AccessFlags::MEMORY_WRITE, vk::AccessFlags::MEMORY_READ),
        };

        let barrier = vk::ImageMemoryBarrier::builder()
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .old_layout(old_layout.0)
            .new_layout(new_layout.0)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image.native)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: image.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build();

        unsafe {
            self.device_wrapper.native.cmd_pipeline_barrier(
                self.native,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                slice::from_ref(&barrier),
            )
        };
    }

    /// Copies tightly packed texel data from `src_buffer` into the whole of `dst_image`,
    /// which must be in `TRANSFER_DST` layout.
    pub fn copy_buffer_to_image(&mut self, src_buffer: &Buffer, dst_image: &Image) {
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: dst_image.aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: dst_image.size.0,
                height: dst_image.size.1,
                depth: 1,
            },
        };

        unsafe {
            self.device_wrapper.native.cmd_copy_buffer_to_image(
                self.native,
                src_buffer.native,
                dst_image.native,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                slice::from_ref(&region),
            )
        };
    }
}

impl Drop for CmdList {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_command_pool(self.pool, None) };
    }
}
