use crate::device::DeviceWrapper;
use crate::{swapchain, CmdList, CmdListHandle, DeviceError, Fence, Semaphore, Swapchain};
use ash::vk;
use common::parking_lot::Mutex;
use smallvec::SmallVec;
use std::slice;
use std::sync::Arc;

/// The device queue. Vulkan requires external synchronization of queue access,
/// so submission, presentation and idle waits all go through one mutex.
pub struct Queue {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) swapchain_khr: ash::extensions::khr::Swapchain,
    pub(crate) native: Mutex<vk::Queue>,
    pub(crate) family_index: u32,
}

#[derive(Default)]
pub struct SubmitInfo<'a> {
    pub wait_semaphores: Vec<(&'a Semaphore, vk::PipelineStageFlags)>,
    pub cmd_lists: Vec<CmdListHandle>,
    pub signal_semaphores: Vec<&'a Semaphore>,
}

impl Queue {
    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    fn create_cmd_list(&self, level: vk::CommandBufferLevel) -> Result<CmdList, DeviceError> {
        let create_info = vk::CommandPoolCreateInfo::builder().queue_family_index(self.family_index);
        let native_pool = unsafe { self.device_wrapper.native.create_command_pool(&create_info, None)? };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(native_pool)
            .level(level)
            .command_buffer_count(1);
        let native = match unsafe { self.device_wrapper.native.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { self.device_wrapper.native.destroy_command_pool(native_pool, None) };
                return Err(e.into());
            }
        };

        Ok(CmdList {
            device_wrapper: Arc::clone(&self.device_wrapper),
            pool: native_pool,
            native,
        })
    }

    pub fn create_primary_cmd_list(&self) -> Result<CmdList, DeviceError> {
        self.create_cmd_list(vk::CommandBufferLevel::PRIMARY)
    }

    pub fn create_secondary_cmd_list(&self) -> Result<CmdList, DeviceError> {
        self.create_cmd_list(vk::CommandBufferLevel::SECONDARY)
    }

    /// # Safety
    /// All resources used in command lists must be valid until all pending operations are complete.
    pub unsafe fn submit(&self, submit_infos: &[SubmitInfo], fence: Option<&Fence>) -> Result<(), DeviceError> {
        let mut wait_semaphores = SmallVec::<[vk::Semaphore; 4]>::new();
        let mut wait_masks = SmallVec::<[vk::PipelineStageFlags; 4]>::new();
        let mut signal_semaphores = SmallVec::<[vk::Semaphore; 4]>::new();
        let mut command_buffers = SmallVec::<[vk::CommandBuffer; 8]>::new();
        let mut ranges = SmallVec::<[(usize, usize, usize); 4]>::new();

        for info in submit_infos {
            ranges.push((wait_semaphores.len(), signal_semaphores.len(), command_buffers.len()));
            for (sp, mask) in &info.wait_semaphores {
                wait_semaphores.push(sp.native);
                wait_masks.push(*mask);
            }
            signal_semaphores.extend(info.signal_semaphores.iter().map(|sp| sp.native));
            command_buffers.extend(info.cmd_lists.iter().map(|cl| cl.0));
        }

        let native_submit_infos: SmallVec<[vk::SubmitInfo; 4]> = submit_infos
            .iter()
            .zip(&ranges)
            .map(|(info, &(wait_idx, signal_idx, cmd_idx))| {
                let wait_range = wait_idx..wait_idx + info.wait_semaphores.len();
                vk::SubmitInfo::builder()
                    .wait_semaphores(&wait_semaphores[wait_range.clone()])
                    .wait_dst_stage_mask(&wait_masks[wait_range])
                    .command_buffers(&command_buffers[cmd_idx..cmd_idx + info.cmd_lists.len()])
                    .signal_semaphores(&signal_semaphores[signal_idx..signal_idx + info.signal_semaphores.len()])
                    .build()
            })
            .collect();

        let queue = self.native.lock();
        self.device_wrapper.native.queue_submit(
            *queue,
            &native_submit_infos,
            fence.map_or(vk::Fence::null(), |f| f.native),
        )?;

        Ok(())
    }

    /// Submits a one-off command list and blocks until the queue is idle.
    pub fn submit_and_wait(&self, cmd_list: &CmdList) -> Result<(), DeviceError> {
        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(slice::from_ref(&cmd_list.native))
            .build();

        let queue = self.native.lock();
        unsafe {
            self.device_wrapper
                .native
                .queue_submit(*queue, slice::from_ref(&submit_info), vk::Fence::null())?;
            self.device_wrapper.native.queue_wait_idle(*queue)?;
        }
        Ok(())
    }

    /// Returns whether the swapchain is in suboptimal state.
    pub fn present(&self, swapchain: &Swapchain, image_index: u32, wait_semaphore: &Semaphore) -> Result<bool, swapchain::Error> {
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(slice::from_ref(&wait_semaphore.native))
            .swapchains(slice::from_ref(&swapchain.native))
            .image_indices(slice::from_ref(&image_index));

        let queue = self.native.lock();
        let result = unsafe { self.swapchain_khr.queue_present(*queue, &present_info) };

        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(swapchain::Error::IncompatibleSurface),
            Err(e) => Err(swapchain::Error::VkError(e)),
        }
    }

    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        let queue = self.native.lock();
        unsafe { self.device_wrapper.native.queue_wait_idle(*queue) }
    }
}
