pub mod manager;
pub mod mesh;
pub mod promise;
pub mod registry;
pub mod spine;
pub mod task_manager;

use crate::render::RenderBackend;
pub use manager::AssetManager;
pub use mesh::{MeshData, MeshLoadError};
pub use promise::{promise, AssetFuture, Promise};
pub use registry::{ModelManager, ResourceRegistry, SpineManager, TextureManager, WaitOutcome};
pub use spine::SpineAsset;
use std::path::PathBuf;
use std::sync::Arc;
use std::{fmt, io};
pub use task_manager::AssetTaskManager;
use vk_wrapper as vkw;

/// Cloneable so that one failure can be delivered to several waiters.
#[derive(Debug, Clone)]
pub enum AssetError {
    Io(Arc<io::Error>),
    Image(Arc<image::ImageError>),
    Mesh(Arc<MeshLoadError>),
    Spine(String),
    Device(Arc<vkw::DeviceError>),
    DuplicateId(u32),
    Canceled,
}

impl From<io::Error> for AssetError {
    fn from(err: io::Error) -> Self {
        AssetError::Io(Arc::new(err))
    }
}

impl From<image::ImageError> for AssetError {
    fn from(err: image::ImageError) -> Self {
        AssetError::Image(Arc::new(err))
    }
}

impl From<MeshLoadError> for AssetError {
    fn from(err: MeshLoadError) -> Self {
        AssetError::Mesh(Arc::new(err))
    }
}

impl From<vkw::DeviceError> for AssetError {
    fn from(err: vkw::DeviceError) -> Self {
        AssetError::Device(Arc::new(err))
    }
}

impl From<vkw::vk::Result> for AssetError {
    fn from(err: vkw::vk::Result) -> Self {
        vkw::DeviceError::VkError(err).into()
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::Io(e) => write!(f, "I/O error: {}", e),
            AssetError::Image(e) => write!(f, "image decode error: {}", e),
            AssetError::Mesh(e) => write!(f, "mesh error: {}", e),
            AssetError::Spine(msg) => write!(f, "spine error: {}", msg),
            AssetError::Device(e) => write!(f, "device error: {}", e),
            AssetError::DuplicateId(id) => write!(f, "asset id {} is already loaded or loading", id),
            AssetError::Canceled => write!(f, "load canceled"),
        }
    }
}

impl std::error::Error for AssetError {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureInfo {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpineInfo {
    pub spine_id: u32,
    pub texture_id: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureCreateArgs {
    pub filter: TextureFilter,
    pub repeat: bool,
}

pub struct TextureLoadArgs {
    pub path: PathBuf,
    pub promise: Option<Promise<TextureInfo>>,
}

pub struct SpineLoadArgs {
    pub atlas_path: PathBuf,
    pub skeleton_path: PathBuf,
    /// Id the atlas page texture is registered under.
    pub texture_id: u32,
    pub promise: Option<Promise<SpineInfo>>,
}

/// Registries shared by the asset pool (writer) and the render pool (reader).
pub struct Assets<B: RenderBackend> {
    pub textures: TextureManager<B::Texture>,
    pub models: ModelManager<B::Model>,
    pub spines: SpineManager,
}

impl<B: RenderBackend> Assets<B> {
    pub fn new() -> Self {
        Self {
            textures: ResourceRegistry::new(),
            models: ResourceRegistry::new(),
            spines: ResourceRegistry::new(),
        }
    }
}

impl<B: RenderBackend> Default for Assets<B> {
    fn default() -> Self {
        Self::new()
    }
}
