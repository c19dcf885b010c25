use crate::asset::{AssetError, TextureCreateArgs, TextureFilter};
use crate::render::{FrameUniforms, RenderBackend, RenderError};
use crate::settings::RenderSettings;
use crate::vulkan::asset_worker::VulkanAssetWorker;
use crate::vulkan::descriptor_set_manager::DescriptorSetManager;
use crate::vulkan::pipelines::{PipelineSet, RenderTarget, ShaderSet};
use crate::vulkan::render_worker::VulkanRenderWorker;
use crate::vulkan::resources::{VulkanModel, VulkanTexture};
use common::log::{debug, info};
use common::parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use vk_wrapper::{vk, BufferUsageFlags, CmdListHandle, Device, DeviceError, HostBuffer, Sampler, SamplerFilter};

/// The device context plus the GPU state shared by all worker threads.
pub struct VulkanBackend {
    device: Arc<Device>,
    shaders: ShaderSet,
    descriptors: DescriptorSetManager,
    /// One uniform block per frame slot.
    uniforms: Vec<Mutex<HostBuffer<FrameUniforms>>>,
    /// Indexed by `filter * 2 + repeat`.
    samplers: Vec<Arc<Sampler>>,
    target: RwLock<Option<Arc<RenderTarget>>>,
}

impl VulkanBackend {
    pub fn new(device: Arc<Device>, settings: &RenderSettings) -> Result<Self, RenderError> {
        let shaders = ShaderSet::load(&settings.shader_dir)?;
        let descriptors = DescriptorSetManager::new(&device)?;

        let uniforms = (0..settings.frames_in_flight.max(1))
            .map(|_| {
                let mut buffer = device.create_host_buffer::<FrameUniforms>(BufferUsageFlags::UNIFORM, 1)?;
                buffer.write(0, &[FrameUniforms::default()]);
                Ok(Mutex::new(buffer))
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;

        let mut samplers = Vec::with_capacity(4);
        for filter in [SamplerFilter::NEAREST, SamplerFilter::LINEAR] {
            for repeat in [false, true] {
                samplers.push(device.create_sampler(filter, repeat)?);
            }
        }

        Ok(Self {
            device,
            shaders,
            descriptors,
            uniforms,
            samplers,
            target: RwLock::new(None),
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn descriptors(&self) -> &DescriptorSetManager {
        &self.descriptors
    }

    pub fn frame_count(&self) -> usize {
        self.uniforms.len()
    }

    pub fn sampler(&self, args: &TextureCreateArgs) -> &Arc<Sampler> {
        let filter = match args.filter {
            TextureFilter::Nearest => 0,
            TextureFilter::Linear => 1,
        };
        &self.samplers[filter * 2 + args.repeat as usize]
    }

    pub(crate) fn uniforms(&self, slot: usize) -> &Mutex<HostBuffer<FrameUniforms>> {
        &self.uniforms[slot % self.uniforms.len()]
    }

    pub fn target(&self) -> Option<Arc<RenderTarget>> {
        self.target.read().clone()
    }

    /// Publishes the render target for a new swapchain. The render pass and the pipelines
    /// are rebuilt only when the color format changed.
    pub(crate) fn update_target(
        &self,
        color_format: vk::Format,
        extent: (u32, u32),
    ) -> Result<Arc<RenderTarget>, RenderError> {
        let mut target = self.target.write();

        let (render_pass, pipelines) = match target.as_ref() {
            Some(t) if t.render_pass.color_format() == color_format => {
                (Arc::clone(&t.render_pass), t.pipelines.clone())
            }
            _ => {
                info!("Building render pass and pipelines for {:?}", color_format);
                let render_pass = self
                    .device
                    .create_render_pass(color_format, self.device.depth_format()?)?;
                let pipelines = PipelineSet::new(
                    &self.device,
                    &self.shaders,
                    &render_pass,
                    self.descriptors.frame_layout(),
                    self.descriptors.texture_layout(),
                )?;
                (render_pass, pipelines)
            }
        };

        let new_target = Arc::new(RenderTarget {
            render_pass,
            pipelines,
            extent,
        });
        *target = Some(Arc::clone(&new_target));
        debug!("Render target extent is {}x{}", extent.0, extent.1);
        Ok(new_target)
    }
}

impl RenderBackend for VulkanBackend {
    type CommandBuffer = CmdListHandle;
    type Texture = VulkanTexture;
    type Model = VulkanModel;
    type RenderWorker = VulkanRenderWorker;
    type AssetWorker = VulkanAssetWorker;

    fn create_render_worker(self: &Arc<Self>, _index: usize) -> Result<VulkanRenderWorker, RenderError> {
        VulkanRenderWorker::new(Arc::clone(self))
    }

    fn create_asset_worker(self: &Arc<Self>, _index: usize) -> Result<VulkanAssetWorker, AssetError> {
        VulkanAssetWorker::new(Arc::clone(self))
    }
}
