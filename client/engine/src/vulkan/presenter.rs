use crate::render::{AcquireOutcome, FramePresenter, PresentOutcome, RenderError};
use crate::settings::RenderSettings;
use crate::vulkan::backend::VulkanBackend;
use common::log::{debug, info};
use std::sync::Arc;
use vk_wrapper::{
    swapchain, vk, ClearValue, CmdList, CmdListHandle, Device, DeviceError, Fence, Framebuffer, ImageUsageFlags,
    ImageView, Semaphore, SubmitInfo, Surface, Swapchain,
};

/// Synchronization and the primary command list of one frame in flight.
struct FrameSlot {
    /// Signaled when the slot's last submission retired.
    fence: Fence,
    acquire_semaphore: Semaphore,
    present_semaphore: Semaphore,
    cmd_list: CmdList,
}

impl FrameSlot {
    fn new(device: &Device) -> Result<Self, DeviceError> {
        Ok(Self {
            fence: device.create_fence(true)?,
            acquire_semaphore: device.create_binary_semaphore()?,
            present_semaphore: device.create_binary_semaphore()?,
            cmd_list: device.queue().create_primary_cmd_list()?,
        })
    }
}

struct SwapchainTargets {
    framebuffers: Vec<Arc<Framebuffer>>,
    _depth_view: Arc<ImageView>,
    swapchain: Swapchain,
}

/// Owns the swapchain, its framebuffers and the frame slots.
pub struct VulkanPresenter {
    backend: Arc<VulkanBackend>,
    surface: Arc<Surface>,
    slots: Vec<FrameSlot>,
    targets: Option<SwapchainTargets>,
    extent_hint: (u32, u32),
    clear_color: [f32; 4],
    vsync: bool,
}

impl VulkanPresenter {
    pub fn new(backend: Arc<VulkanBackend>, surface: Arc<Surface>, settings: &RenderSettings) -> Result<Self, RenderError> {
        let slots = create_slots(backend.device(), backend.frame_count())?;

        Ok(Self {
            backend,
            surface,
            slots,
            targets: None,
            extent_hint: (0, 0),
            clear_color: settings.clear_color,
            vsync: settings.vsync,
        })
    }

    pub fn extent(&self) -> Option<(u32, u32)> {
        self.targets.as_ref().map(|t| t.swapchain.size())
    }
}

fn create_slots(device: &Device, count: usize) -> Result<Vec<FrameSlot>, DeviceError> {
    (0..count).map(|_| FrameSlot::new(device)).collect()
}

impl FramePresenter for VulkanPresenter {
    type CommandBuffer = CmdListHandle;

    fn frame_count(&self) -> usize {
        self.slots.len()
    }

    fn wait_frame(&mut self, slot: usize) -> Result<(), RenderError> {
        self.slots[slot].fence.wait()?;
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome, RenderError> {
        let Some(targets) = &self.targets else {
            return Ok(AcquireOutcome::OutOfDate);
        };

        match targets.swapchain.acquire_image(&self.slots[slot].acquire_semaphore) {
            Ok((image, suboptimal)) => Ok(AcquireOutcome::Acquired { image, suboptimal }),
            Err(swapchain::Error::IncompatibleSurface) => Ok(AcquireOutcome::OutOfDate),
            Err(err) => Err(err.into()),
        }
    }

    fn submit_and_present(
        &mut self,
        slot: usize,
        image: u32,
        buffers: &[CmdListHandle],
    ) -> Result<PresentOutcome, RenderError> {
        let Some(targets) = &self.targets else {
            return Ok(PresentOutcome::OutOfDate);
        };
        let framebuffer = &targets.framebuffers[image as usize];
        let frame = &mut self.slots[slot];

        let cl = &mut frame.cmd_list;
        cl.reset(false)?;
        cl.begin(true)?;
        cl.begin_render_pass(
            framebuffer.render_pass(),
            framebuffer,
            &[ClearValue::ColorF32(self.clear_color), ClearValue::Depth(1.0)],
            true,
        );
        cl.execute_secondary(buffers);
        cl.end_render_pass();
        cl.end()?;

        let queue = self.backend.device().queue();
        frame.fence.reset()?;
        unsafe {
            queue.submit(
                &[SubmitInfo {
                    wait_semaphores: vec![(
                        &frame.acquire_semaphore,
                        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    )],
                    cmd_lists: vec![frame.cmd_list.handle()],
                    signal_semaphores: vec![&frame.present_semaphore],
                }],
                Some(&frame.fence),
            )?
        };

        match queue.present(&targets.swapchain, image, &frame.present_semaphore) {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(swapchain::Error::IncompatibleSurface) => Ok(PresentOutcome::OutOfDate),
            Err(err) => Err(err.into()),
        }
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        self.backend.device().wait_idle()?;
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<bool, RenderError> {
        let device = self.backend.device();
        device.wait_idle()?;

        let mut size = device.adapter().get_surface_size(&self.surface)?;
        // The surface leaves its extent to the swapchain.
        if size.0 == u32::MAX {
            size = self.extent_hint;
        }
        if size.0 == 0 || size.1 == 0 {
            self.targets = None;
            debug!("Surface extent is zero, swapchain not created");
            return Ok(false);
        }

        let old = self.targets.take();
        let swapchain = device.create_swapchain(
            &self.surface,
            size,
            self.vsync,
            self.slots.len() as u32,
            old.as_ref().map(|t| &t.swapchain),
        )?;
        drop(old);

        let extent = swapchain.size();
        let target = self.backend.update_target(swapchain.format(), extent)?;

        let depth = device.create_image_2d(
            target.render_pass.depth_format(),
            ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            extent,
        )?;
        let depth_view = Arc::new(depth.create_view()?);

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|view| target.render_pass.create_framebuffer(extent, view, &depth_view))
            .collect::<Result<Vec<_>, _>>()?;

        self.slots = create_slots(device, self.slots.len())?;
        self.targets = Some(SwapchainTargets {
            framebuffers,
            _depth_view: depth_view,
            swapchain,
        });

        info!(
            "Swapchain created: {}x{}, {} images",
            extent.0,
            extent.1,
            self.targets.as_ref().map_or(0, |t| t.framebuffers.len())
        );
        Ok(true)
    }

    fn set_extent_hint(&mut self, size: (u32, u32)) {
        self.extent_hint = size;
    }

    fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.extent().unwrap_or(self.extent_hint);
        width as f32 / height.max(1) as f32
    }
}
