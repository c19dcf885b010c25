pub mod backend;
pub mod batch;
pub mod system;
mod task_ledger;
pub mod task_manager;

use crate::asset::AssetError;
pub use backend::{
    AcquireOutcome, AssetWorker, FramePresenter, FrameTarget, GpuTexture, PresentOutcome, RenderBackend,
    RenderWorker,
};
pub use batch::{FrameUniforms, GlyphBatch, ModelBatch, RenderTask, SpineSpriteBatch, SpriteBatch, TaskKind};
use common::glm::Mat4;
use std::{fmt, io};
pub use system::RenderSystem;
pub use task_manager::RenderTaskManager;
use vk_wrapper as vkw;

#[derive(Debug)]
pub enum RenderError {
    Device(vkw::DeviceError),
    Instance(vkw::InstanceError),
    Asset(AssetError),
    MissingTexture(u32),
    MissingModel(u32),
    MissingSpine(u32),
    Shader(String),
    WorkerSpawn(io::Error),
    /// A render worker panicked while recording a task.
    WorkerPanic(String),
    NoSuitableAdapter,
}

impl From<vkw::DeviceError> for RenderError {
    fn from(err: vkw::DeviceError) -> Self {
        RenderError::Device(err)
    }
}

impl From<vkw::vk::Result> for RenderError {
    fn from(err: vkw::vk::Result) -> Self {
        RenderError::Device(vkw::DeviceError::VkError(err))
    }
}

impl From<vkw::InstanceError> for RenderError {
    fn from(err: vkw::InstanceError) -> Self {
        RenderError::Instance(err)
    }
}

impl From<vkw::swapchain::Error> for RenderError {
    fn from(err: vkw::swapchain::Error) -> Self {
        match err {
            vkw::swapchain::Error::VkError(e) => e.into(),
            vkw::swapchain::Error::IncompatibleSurface => vkw::vk::Result::ERROR_OUT_OF_DATE_KHR.into(),
        }
    }
}

impl From<AssetError> for RenderError {
    fn from(err: AssetError) -> Self {
        RenderError::Asset(err)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Device(e) => write!(f, "device error: {}", e),
            RenderError::Instance(e) => write!(f, "instance error: {}", e),
            RenderError::Asset(e) => write!(f, "asset error: {}", e),
            RenderError::MissingTexture(id) => write!(f, "texture {} is not registered", id),
            RenderError::MissingModel(id) => write!(f, "model {} is not registered", id),
            RenderError::MissingSpine(id) => write!(f, "spine skeleton {} is not registered", id),
            RenderError::Shader(msg) => write!(f, "shader error: {}", msg),
            RenderError::WorkerSpawn(e) => write!(f, "failed to spawn worker thread: {}", e),
            RenderError::WorkerPanic(msg) => write!(f, "render worker panicked: {}", msg),
            RenderError::NoSuitableAdapter => write!(f, "no suitable graphics adapter"),
        }
    }
}

impl std::error::Error for RenderError {}

/// State of the current frame. Reset by every `begin_frame`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    None,
    Busy,
    Ready,
    Discarded,
}

/// The per-frame drawing interface driven by the game loop.
///
/// Draw calls outside of a `Busy` frame are ignored.
pub trait Renderer {
    fn begin_frame(&mut self) -> Result<FrameStatus, RenderError>;

    fn end_frame(&mut self) -> Result<(), RenderError>;

    fn draw_models(&mut self, batches: Vec<ModelBatch>);

    fn draw_sprites(&mut self, batches: Vec<SpriteBatch>);

    fn draw_billboards(&mut self, batches: Vec<SpriteBatch>);

    fn draw_glyphs(&mut self, batches: Vec<GlyphBatch>);

    fn draw_spines(&mut self, batches: Vec<SpineSpriteBatch>);

    fn update_frame_uniforms(&mut self, view: &Mat4, proj: &Mat4, ortho_view: &Mat4, ortho_proj: &Mat4);

    /// Schedules swapchain recreation after the next presented frame.
    fn resize(&mut self, size: (u32, u32));

    fn aspect_ratio(&self) -> f32;

    fn shutdown(&mut self);
}
