pub mod adapter;
pub mod buffer;
pub mod cmd_list;
pub mod descriptor_pool;
pub mod device;
pub mod entry;
pub mod fence;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod pipeline;
pub mod queue;
pub mod render_pass;
pub mod sampler;
pub mod semaphore;
pub mod surface;
pub mod swapchain;
mod utils;

pub use adapter::Adapter;
pub use ash::vk;
pub use buffer::{Buffer, BufferUsageFlags, HostBuffer};
pub use cmd_list::{CmdList, CmdListHandle};
pub use descriptor_pool::{
    DescriptorCopy, DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorWrite, LayoutBinding, WriteData,
};
pub use device::{Device, DeviceError};
pub use entry::{Entry, InstanceError};
pub use fence::Fence;
pub use framebuffer::Framebuffer;
pub use image::{Image, ImageLayout, ImageUsageFlags, ImageView};
pub use instance::Instance;
pub use pipeline::{GraphicsPipelineDesc, Pipeline, PipelineLayout, VertexInputBinding};
pub use queue::{Queue, SubmitInfo};
pub use render_pass::{ClearValue, RenderPass};
pub use sampler::{Sampler, SamplerFilter};
pub use semaphore::Semaphore;
pub use surface::Surface;
pub use swapchain::Swapchain;
