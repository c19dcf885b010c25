pub mod asset;
pub mod render;
pub mod settings;
#[cfg(test)]
mod tests;
pub mod vulkan;

pub use common::glm;
pub use raw_window_handle;
pub use render::{FrameStatus, RenderError, Renderer};
pub use settings::RenderSettings;
pub use vk_wrapper as vkw;
pub use vulkan::VulkanRenderSystem;
