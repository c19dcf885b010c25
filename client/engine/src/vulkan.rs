//! `ash` implementation of the render backend traits.

mod asset_worker;
mod backend;
mod descriptor_set_manager;
mod pipelines;
mod presenter;
mod render_worker;
mod resources;

use crate::render::{FramePresenter, RenderError, RenderSystem};
use crate::settings::RenderSettings;
pub use asset_worker::VulkanAssetWorker;
pub use backend::VulkanBackend;
use common::log::info;
pub use descriptor_set_manager::{DescriptorSetManager, FrameDescriptors};
pub use pipelines::{ModelInstance, ModelVertex, PipelineSet, QuadInstance, QuadMode, RenderTarget};
pub use presenter::VulkanPresenter;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
pub use render_worker::VulkanRenderWorker;
pub use resources::{VulkanModel, VulkanTexture};
use std::sync::Arc;
use vk_wrapper as vkw;

pub type VulkanRenderSystem = RenderSystem<VulkanBackend, VulkanPresenter>;

impl RenderSystem<VulkanBackend, VulkanPresenter> {
    /// Creates the device context for `window` and everything the frame loop needs.
    pub fn initialize(
        display: RawDisplayHandle,
        window: RawWindowHandle,
        size: (u32, u32),
        settings: &RenderSettings,
    ) -> Result<Self, RenderError> {
        let settings = settings.clone().sanitized();

        let entry = vkw::Entry::new().map_err(vkw::InstanceError::from)?;
        let instance = entry.create_instance("frame-pipeline", Some(display), settings.validation)?;
        let surface = instance.create_surface(display, window)?;

        let adapter = instance
            .enumerate_adapters(&surface)?
            .into_iter()
            .next()
            .ok_or(RenderError::NoSuitableAdapter)?;
        info!("Using adapter {}", adapter.name());

        let device = adapter.create_device()?;
        let backend = Arc::new(VulkanBackend::new(device, &settings)?);

        let mut presenter = VulkanPresenter::new(Arc::clone(&backend), surface, &settings)?;
        presenter.set_extent_hint(size);
        presenter.recreate_swapchain()?;

        RenderSystem::new(backend, presenter, &settings)
    }
}
