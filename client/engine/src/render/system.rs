use crate::asset::{AssetManager, AssetTaskManager, Assets};
use crate::render::backend::{AcquireOutcome, FramePresenter, PresentOutcome, RenderBackend};
use crate::render::batch::{FrameUniforms, GlyphBatch, ModelBatch, SpineSpriteBatch, SpriteBatch};
use crate::render::{FrameStatus, RenderError, RenderTaskManager, Renderer};
use crate::settings::RenderSettings;
use common::glm::Mat4;
use common::log::{debug, error, info, warn};
use std::mem;
use std::sync::Arc;

/// Drives frames through `None -> Busy -> Ready | Discarded`.
///
/// Frame slots are used in round-robin order. A slot is reused only after the presenter
/// reports that its previous submission retired.
pub struct RenderSystem<B, P>
where
    B: RenderBackend,
    P: FramePresenter<CommandBuffer = B::CommandBuffer>,
{
    render_tasks: RenderTaskManager<B>,
    asset_manager: AssetManager<B>,
    asset_tasks: Arc<AssetTaskManager<B>>,
    presenter: P,
    assets: Arc<Assets<B>>,
    backend: Arc<B>,
    status: FrameStatus,
    slot: usize,
    serial: u64,
    image_index: Option<u32>,
    has_swapchain: bool,
    resize_requested: bool,
    shut_down: bool,
}

impl<B, P> RenderSystem<B, P>
where
    B: RenderBackend,
    P: FramePresenter<CommandBuffer = B::CommandBuffer>,
{
    /// Starts the asset threads. Render threads start with the first renderable frame.
    pub fn new(backend: Arc<B>, presenter: P, settings: &RenderSettings) -> Result<Self, RenderError> {
        let assets = Arc::new(Assets::new());
        let asset_tasks = Arc::new(AssetTaskManager::new(
            Arc::clone(&backend),
            Arc::clone(&assets),
            settings.asset_threads,
        ));
        asset_tasks.start_threads()?;

        let render_tasks = RenderTaskManager::new(Arc::clone(&backend), Arc::clone(&assets), settings.render_threads);

        Ok(Self {
            render_tasks,
            asset_manager: AssetManager::new(Arc::clone(&asset_tasks)),
            asset_tasks,
            presenter,
            assets,
            backend,
            status: FrameStatus::None,
            slot: 0,
            serial: 0,
            image_index: None,
            has_swapchain: true,
            resize_requested: false,
            shut_down: false,
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn assets(&self) -> &Arc<Assets<B>> {
        &self.assets
    }

    pub fn asset_tasks(&self) -> &Arc<AssetTaskManager<B>> {
        &self.asset_tasks
    }

    pub fn asset_manager(&self) -> &AssetManager<B> {
        &self.asset_manager
    }

    pub fn render_tasks(&self) -> &RenderTaskManager<B> {
        &self.render_tasks
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn status(&self) -> FrameStatus {
        self.status
    }

    pub fn frame_slot(&self) -> usize {
        self.slot
    }

    pub fn frame_serial(&self) -> u64 {
        self.serial
    }

    fn discard_frame(&mut self) -> Result<FrameStatus, RenderError> {
        self.render_tasks.begin_frame(self.slot, self.serial, true)?;
        self.status = FrameStatus::Discarded;
        Ok(self.status)
    }

    fn try_begin_frame(&mut self) -> Result<FrameStatus, RenderError> {
        if self.assets.textures.is_empty() {
            debug!("Frame {} discarded: no textures registered", self.serial);
            return self.discard_frame();
        }

        if !self.has_swapchain {
            // Nothing references a swapchain, so it can be rebuilt without stopping the pools.
            self.has_swapchain = self.presenter.recreate_swapchain()?;
            if !self.has_swapchain {
                return self.discard_frame();
            }
            self.slot = 0;
            info!("Rendering resumed (aspect ratio {:.3})", self.presenter.aspect_ratio());
        }

        self.presenter.wait_frame(self.slot)?;

        match self.presenter.acquire_image(self.slot)? {
            AcquireOutcome::OutOfDate => {
                debug!("Frame {} discarded: swapchain out of date", self.serial);
                self.recreate_swapchain()?;
                self.discard_frame()
            }
            AcquireOutcome::Acquired { image, suboptimal } => {
                if suboptimal {
                    self.resize_requested = true;
                }
                self.image_index = Some(image);
                self.render_tasks.begin_frame(self.slot, self.serial, false)?;
                self.status = FrameStatus::Busy;
                Ok(self.status)
            }
        }
    }

    /// Stops both pools, rebuilds the swapchain and everything depending on it,
    /// then restarts the asset pool. Render threads restart with the next frame.
    fn recreate_swapchain(&mut self) -> Result<(), RenderError> {
        info!("Recreating swapchain");

        self.presenter.wait_idle()?;
        self.render_tasks.stop_threads();
        self.asset_tasks.stop_threads();

        let recreated = self.presenter.recreate_swapchain();
        self.asset_tasks.start_threads()?;

        self.has_swapchain = recreated?;
        self.slot = 0;

        if self.has_swapchain {
            info!("Swapchain recreated (aspect ratio {:.3})", self.presenter.aspect_ratio());
        } else {
            info!("Surface has zero extent, rendering is paused");
        }
        Ok(())
    }
}

impl<B, P> Renderer for RenderSystem<B, P>
where
    B: RenderBackend,
    P: FramePresenter<CommandBuffer = B::CommandBuffer>,
{
    fn begin_frame(&mut self) -> Result<FrameStatus, RenderError> {
        assert!(
            self.status != FrameStatus::Busy,
            "begin_frame called before end_frame of frame {}",
            self.serial
        );
        self.serial += 1;
        self.image_index = None;

        self.try_begin_frame().map_err(|err| {
            // Drop calls until the next successful begin.
            self.render_tasks.close_frame();
            self.status = FrameStatus::Discarded;
            err
        })
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        if self.status != FrameStatus::Busy {
            return Ok(());
        }

        self.render_tasks.wait_tasks_complete();
        self.status = FrameStatus::Ready;

        let mut buffers = self.render_tasks.take_command_buffers();
        if self.render_tasks.frame_failed() {
            warn!("Frame {} failed to record, presenting it empty", self.serial);
            buffers.clear();
        }
        self.render_tasks.close_frame();

        let Some(image) = self.image_index.take() else {
            return Ok(());
        };
        let outcome = self.presenter.submit_and_present(self.slot, image, &buffers)?;
        self.slot = (self.slot + 1) % self.presenter.frame_count();

        let resize_requested = mem::take(&mut self.resize_requested);
        if outcome != PresentOutcome::Presented || resize_requested {
            self.recreate_swapchain()?;
        }
        Ok(())
    }

    fn draw_models(&mut self, batches: Vec<ModelBatch>) {
        self.render_tasks.draw_models(batches);
    }

    fn draw_sprites(&mut self, batches: Vec<SpriteBatch>) {
        self.render_tasks.draw_sprites(batches);
    }

    fn draw_billboards(&mut self, batches: Vec<SpriteBatch>) {
        self.render_tasks.draw_billboards(batches);
    }

    fn draw_glyphs(&mut self, batches: Vec<GlyphBatch>) {
        self.render_tasks.draw_glyphs(batches);
    }

    fn draw_spines(&mut self, batches: Vec<SpineSpriteBatch>) {
        self.render_tasks.draw_spines(batches);
    }

    fn update_frame_uniforms(&mut self, view: &Mat4, proj: &Mat4, ortho_view: &Mat4, ortho_proj: &Mat4) {
        self.render_tasks.update_frame_uniforms(FrameUniforms {
            view: *view,
            proj: *proj,
            ortho_view: *ortho_view,
            ortho_proj: *ortho_proj,
        });
    }

    fn resize(&mut self, size: (u32, u32)) {
        self.presenter.set_extent_hint(size);
        self.resize_requested = true;
    }

    fn aspect_ratio(&self) -> f32 {
        self.presenter.aspect_ratio()
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        if let Err(err) = self.presenter.wait_idle() {
            error!("Failed to wait for device idle on shutdown: {}", err);
        }
        self.render_tasks.stop_threads();
        self.asset_tasks.cancel_threads();
        self.status = FrameStatus::None;
        self.shut_down = true;
        info!("Renderer shut down");
    }
}

impl<B, P> Drop for RenderSystem<B, P>
where
    B: RenderBackend,
    P: FramePresenter<CommandBuffer = B::CommandBuffer>,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
