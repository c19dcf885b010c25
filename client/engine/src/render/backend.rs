use crate::asset::{AssetError, Assets, TextureCreateArgs};
use crate::render::{RenderError, RenderTask};
use common::types::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Identifies the frame a job belongs to: the rotating slot and the unique frame serial.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameTarget {
    pub slot: usize,
    pub serial: u64,
}

pub trait GpuTexture: Send + Sync + 'static {
    fn size(&self) -> (u32, u32);
}

/// Shared GPU state that both worker pools are created from.
pub trait RenderBackend: Send + Sync + Sized + 'static {
    /// A recorded secondary command buffer handed back to the main thread.
    type CommandBuffer: Send + 'static;
    type Texture: GpuTexture;
    type Model: Send + Sync + 'static;
    type RenderWorker: RenderWorker<Self>;
    type AssetWorker: AssetWorker<Self>;

    /// Called on the thread that starts the pool; the worker is then moved to its own thread.
    fn create_render_worker(self: &Arc<Self>, index: usize) -> Result<Self::RenderWorker, RenderError>;

    fn create_asset_worker(self: &Arc<Self>, index: usize) -> Result<Self::AssetWorker, AssetError>;
}

/// Owned by exactly one render thread together with all of its per-slot frame data.
pub trait RenderWorker<B: RenderBackend>: Send + 'static {
    /// Texture registry timestamp the descriptor sets of `slot` were last built from.
    /// Includes rebuilds the worker did on its own while executing a task.
    fn descriptor_timestamp(&self, slot: usize) -> Option<u64>;

    /// Refreshes the thread's descriptor sets of `frame.slot` from a texture registry snapshot
    /// taken at `timestamp`.
    fn rebuild_descriptor_sets(
        &mut self,
        frame: FrameTarget,
        timestamp: u64,
        textures: &HashMap<u32, Arc<B::Texture>>,
    ) -> Result<(), RenderError>;

    /// Records `task`. Returns `None` for tasks that produce no draw commands.
    fn execute(
        &mut self,
        frame: FrameTarget,
        task: &RenderTask,
        assets: &Assets<B>,
    ) -> Result<Option<B::CommandBuffer>, RenderError>;
}

/// Owned by exactly one asset thread together with its upload command pool.
pub trait AssetWorker<B: RenderBackend>: Send + 'static {
    fn load_texture(&mut self, path: &Path, args: &TextureCreateArgs) -> Result<B::Texture, AssetError>;

    fn load_model(&mut self, path: &Path) -> Result<B::Model, AssetError>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Frame slots and the swapchain. Used from the main thread only.
pub trait FramePresenter {
    type CommandBuffer;

    fn frame_count(&self) -> usize;

    /// Blocks until the last submission that used `slot` has retired.
    fn wait_frame(&mut self, slot: usize) -> Result<(), RenderError>;

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome, RenderError>;

    /// Assembles the primary buffer of `slot` from `buffers` (in the given order),
    /// submits it and presents `image`.
    fn submit_and_present(
        &mut self,
        slot: usize,
        image: u32,
        buffers: &[Self::CommandBuffer],
    ) -> Result<PresentOutcome, RenderError>;

    fn wait_idle(&self) -> Result<(), RenderError>;

    /// Returns `false` if the surface currently has zero extent and no swapchain was created.
    fn recreate_swapchain(&mut self) -> Result<bool, RenderError>;

    fn set_extent_hint(&mut self, size: (u32, u32));

    fn aspect_ratio(&self) -> f32;
}
