use crate::asset::promise::Promise;
use crate::asset::spine::{self, SpineAsset};
use crate::asset::{
    AssetError, Assets, ModelInfo, SpineInfo, SpineLoadArgs, TextureCreateArgs, TextureInfo, TextureLoadArgs,
};
use crate::render::{AssetWorker, GpuTexture, RenderBackend};
use common::log::{debug, error, warn};
use common::parking_lot::Mutex;
use common::threading::JobQueue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, thread};

enum AssetJob {
    Model {
        id: u32,
        path: PathBuf,
    },
    Texture {
        id: u32,
        path: PathBuf,
        create_args: TextureCreateArgs,
    },
    Spine {
        id: u32,
        atlas_path: PathBuf,
        skeleton_path: PathBuf,
        texture_id: u32,
        create_args: TextureCreateArgs,
    },
}

/// Pool of asset threads loading textures, models and Spine skeletons.
///
/// Results are published to the shared [`Assets`] registries. Requesters are notified through
/// the promises registered as waiters of the loading id. Requests are not deduplicated here,
/// see [`AssetManager`](crate::asset::AssetManager).
pub struct AssetTaskManager<B: RenderBackend> {
    backend: Arc<B>,
    assets: Arc<Assets<B>>,
    queue: Arc<JobQueue<AssetJob>>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
    thread_count: usize,
}

impl<B: RenderBackend> AssetTaskManager<B> {
    pub fn new(backend: Arc<B>, assets: Arc<Assets<B>>, thread_count: usize) -> Self {
        Self {
            backend,
            assets,
            queue: Arc::new(JobQueue::new()),
            threads: Mutex::new(vec![]),
            thread_count: thread_count.max(1),
        }
    }

    pub fn assets(&self) -> &Arc<Assets<B>> {
        &self.assets
    }

    pub fn load_model(&self, id: u32, path: impl Into<PathBuf>) -> Result<(), AssetError> {
        self.load_model_with_promise(id, path, None)
    }

    pub fn load_model_with_promise(
        &self,
        id: u32,
        path: impl Into<PathBuf>,
        promise: Option<Promise<ModelInfo>>,
    ) -> Result<(), AssetError> {
        self.assets.models.begin_load(id, promise)?;
        self.queue.push(AssetJob::Model { id, path: path.into() });
        Ok(())
    }

    pub fn load_texture(
        &self,
        id: u32,
        load_args: TextureLoadArgs,
        create_args: TextureCreateArgs,
    ) -> Result<(), AssetError> {
        self.assets.textures.begin_load(id, load_args.promise)?;
        self.queue.push(AssetJob::Texture {
            id,
            path: load_args.path,
            create_args,
        });
        Ok(())
    }

    /// Loads a skeleton and registers its atlas page under `load_args.texture_id`.
    pub fn load_spine(
        &self,
        id: u32,
        load_args: SpineLoadArgs,
        create_args: TextureCreateArgs,
    ) -> Result<(), AssetError> {
        self.assets.spines.begin_load(id, load_args.promise)?;
        if let Err(err) = self.assets.textures.begin_load(load_args.texture_id, None) {
            self.assets.spines.abort_load(id, err.clone());
            return Err(err);
        }
        self.queue.push(AssetJob::Spine {
            id,
            atlas_path: load_args.atlas_path,
            skeleton_path: load_args.skeleton_path,
            texture_id: load_args.texture_id,
            create_args,
        });
        Ok(())
    }

    /// Number of queued jobs not yet picked up by a thread.
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self) -> bool {
        !self.threads.lock().is_empty()
    }

    /// Starts the pool unless it is already running. Jobs queued while it was stopped are kept.
    pub fn start_threads(&self) -> Result<(), AssetError> {
        let mut threads = self.threads.lock();
        if !threads.is_empty() {
            return Ok(());
        }
        self.queue.resume();

        for i in 0..self.thread_count {
            let worker = self.backend.create_asset_worker(i)?;
            let queue = Arc::clone(&self.queue);
            let assets = Arc::clone(&self.assets);

            let handle = thread::Builder::new()
                .name(format!("asset-worker-{}", i))
                .spawn(move || worker_loop(worker, &queue, &assets))?;
            threads.push(handle);
        }

        debug!("Started {} asset threads", self.thread_count);
        Ok(())
    }

    /// Joins the threads after their current job. Queued jobs stay queued.
    pub fn stop_threads(&self) {
        let mut threads = self.threads.lock();
        if threads.is_empty() {
            return;
        }
        self.queue.cancel();
        for handle in threads.drain(..) {
            if handle.join().is_err() {
                warn!("An asset thread panicked");
            }
        }
        debug!("Stopped asset threads ({} jobs kept)", self.queue.len());
    }

    /// Stops the pool and cancels every queued job; their waiters receive [`AssetError::Canceled`].
    pub fn cancel_threads(&self) {
        self.stop_threads();
        self.queue.cancel();

        let jobs = self.queue.drain();
        if !jobs.is_empty() {
            debug!("Canceled {} asset jobs", jobs.len());
        }
        for job in jobs {
            match job {
                AssetJob::Model { id, .. } => self.assets.models.abort_load(id, AssetError::Canceled),
                AssetJob::Texture { id, .. } => self.assets.textures.abort_load(id, AssetError::Canceled),
                AssetJob::Spine { id, texture_id, .. } => {
                    self.assets.textures.abort_load(texture_id, AssetError::Canceled);
                    self.assets.spines.abort_load(id, AssetError::Canceled);
                }
            }
        }
    }
}

impl<B: RenderBackend> Drop for AssetTaskManager<B> {
    fn drop(&mut self) {
        self.cancel_threads();
    }
}

fn worker_loop<B: RenderBackend>(mut worker: B::AssetWorker, queue: &JobQueue<AssetJob>, assets: &Assets<B>) {
    while let Some(job) = queue.wait_and_pop() {
        match job {
            AssetJob::Model { id, path } => load_model(&mut worker, assets, id, &path),
            AssetJob::Texture { id, path, create_args } => load_texture(&mut worker, assets, id, &path, &create_args),
            AssetJob::Spine {
                id,
                atlas_path,
                skeleton_path,
                texture_id,
                create_args,
            } => load_spine(
                &mut worker,
                assets,
                id,
                texture_id,
                &atlas_path,
                &skeleton_path,
                &create_args,
            ),
        }
    }
    debug!("Asset thread exits");
}

fn load_model<B: RenderBackend>(worker: &mut B::AssetWorker, assets: &Assets<B>, id: u32, path: &Path) {
    match worker.load_model(path) {
        Ok(model) => {
            assets.models.finish_load(id, model, ModelInfo { id });
            debug!("Loaded model {} from {}", id, path.display());
        }
        Err(err) => {
            error!("Failed to load model {} from {}: {}", id, path.display(), err);
            assets.models.abort_load(id, err);
        }
    }
}

fn load_texture<B: RenderBackend>(
    worker: &mut B::AssetWorker,
    assets: &Assets<B>,
    id: u32,
    path: &Path,
    create_args: &TextureCreateArgs,
) {
    match worker.load_texture(path, create_args) {
        Ok(texture) => {
            let (width, height) = texture.size();
            assets.textures.finish_load(id, texture, TextureInfo { id, width, height });
            debug!("Loaded texture {} ({}x{}) from {}", id, width, height, path.display());
        }
        Err(err) => {
            error!("Failed to load texture {} from {}: {}", id, path.display(), err);
            assets.textures.abort_load(id, err);
        }
    }
}

fn load_spine<B: RenderBackend>(
    worker: &mut B::AssetWorker,
    assets: &Assets<B>,
    id: u32,
    texture_id: u32,
    atlas_path: &Path,
    skeleton_path: &Path,
    create_args: &TextureCreateArgs,
) {
    let loaded = (|| {
        let atlas = spine::parse_atlas(&fs::read_to_string(atlas_path)?)?;
        let skeleton = spine::parse_skeleton(&fs::read(skeleton_path)?)?;
        let page_path = atlas_path.with_file_name(&atlas.pages[0].file);
        let texture = worker.load_texture(&page_path, create_args)?;
        Ok::<_, AssetError>((atlas, skeleton, texture))
    })();

    match loaded {
        Ok((atlas, skeleton, texture)) => {
            let (tex_width, tex_height) = texture.size();
            assets.textures.finish_load(
                texture_id,
                texture,
                TextureInfo {
                    id: texture_id,
                    width: tex_width,
                    height: tex_height,
                },
            );

            let spine = SpineAsset {
                atlas,
                skeleton,
                texture_id,
            };
            let (width, height) = spine.size();
            assets.spines.finish_load(
                id,
                spine,
                SpineInfo {
                    spine_id: id,
                    texture_id,
                    width,
                    height,
                },
            );
            debug!("Loaded spine {} from {}", id, skeleton_path.display());
        }
        Err(err) => {
            error!("Failed to load spine {} from {}: {}", id, skeleton_path.display(), err);
            assets.textures.abort_load(texture_id, err.clone());
            assets.spines.abort_load(id, err);
        }
    }
}
