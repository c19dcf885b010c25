use crate::asset::promise::{promise, AssetFuture};
use crate::asset::registry::{ResourceRegistry, WaitOutcome};
use crate::asset::{
    AssetError, AssetTaskManager, ModelInfo, SpineInfo, SpineLoadArgs, TextureCreateArgs, TextureInfo,
    TextureLoadArgs,
};
use crate::render::{GpuTexture, RenderBackend};
use common::parking_lot::Mutex;
use common::types::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct PathIds {
    textures: HashMap<PathBuf, u32>,
    models: HashMap<PathBuf, u32>,
    spines: HashMap<PathBuf, u32>,
}

fn free_id<T, I: Clone>(registry: &ResourceRegistry<T, I>, used: &HashMap<PathBuf, u32>) -> u32 {
    let mut id = 0;
    while registry.is_occupied(id) || used.values().any(|&v| v == id) {
        id += 1;
    }
    id
}

/// Path-keyed front end of [`AssetTaskManager`].
///
/// Requesting a path that is already loaded or loading returns the existing id and a future
/// of the existing load instead of starting a second one.
pub struct AssetManager<B: RenderBackend> {
    tasks: Arc<AssetTaskManager<B>>,
    ids: Mutex<PathIds>,
}

impl<B: RenderBackend> AssetManager<B> {
    pub fn new(tasks: Arc<AssetTaskManager<B>>) -> Self {
        Self {
            tasks,
            ids: Mutex::new(PathIds::default()),
        }
    }

    pub fn request_texture(
        &self,
        path: impl AsRef<Path>,
        create_args: TextureCreateArgs,
    ) -> Result<(u32, AssetFuture<TextureInfo>), AssetError> {
        let path = path.as_ref();
        let textures = &self.tasks.assets().textures;
        let mut ids = self.ids.lock();

        let (p, future) = promise();
        let id = match ids.textures.get(path).copied() {
            Some(id) => {
                match textures.add_waiter(id, p) {
                    WaitOutcome::Waiting => {}
                    WaitOutcome::Loaded(texture, p) => {
                        let (width, height) = texture.size();
                        p.fulfill(Ok(TextureInfo { id, width, height }));
                    }
                    // An earlier attempt failed; try again under the same id.
                    WaitOutcome::Idle(p) => self.tasks.load_texture(
                        id,
                        TextureLoadArgs {
                            path: path.to_owned(),
                            promise: Some(p),
                        },
                        create_args,
                    )?,
                }
                id
            }
            None => {
                let id = free_id(textures, &ids.textures);
                self.tasks.load_texture(
                    id,
                    TextureLoadArgs {
                        path: path.to_owned(),
                        promise: Some(p),
                    },
                    create_args,
                )?;
                ids.textures.insert(path.to_owned(), id);
                id
            }
        };

        Ok((id, future))
    }

    pub fn request_model(&self, path: impl AsRef<Path>) -> Result<(u32, AssetFuture<ModelInfo>), AssetError> {
        let path = path.as_ref();
        let models = &self.tasks.assets().models;
        let mut ids = self.ids.lock();

        let id = match ids.models.get(path).copied() {
            Some(id) => id,
            None => {
                let id = free_id(models, &ids.models);
                ids.models.insert(path.to_owned(), id);
                id
            }
        };

        let (p, future) = promise();
        match models.add_waiter(id, p) {
            WaitOutcome::Waiting => {}
            WaitOutcome::Loaded(_, p) => p.fulfill(Ok(ModelInfo { id })),
            WaitOutcome::Idle(p) => self.tasks.load_model_with_promise(id, path, Some(p))?,
        }

        Ok((id, future))
    }

    /// Loads a skeleton keyed by its skeleton file. The atlas page gets a fresh texture id.
    pub fn request_spine(
        &self,
        atlas_path: impl AsRef<Path>,
        skeleton_path: impl AsRef<Path>,
        create_args: TextureCreateArgs,
    ) -> Result<(u32, AssetFuture<SpineInfo>), AssetError> {
        let skeleton_path = skeleton_path.as_ref();
        let assets = self.tasks.assets();
        let mut ids = self.ids.lock();

        let (p, future) = promise();
        let existing = ids.spines.get(skeleton_path).copied();

        let p = match existing {
            Some(id) => match assets.spines.add_waiter(id, p) {
                WaitOutcome::Waiting => return Ok((id, future)),
                WaitOutcome::Loaded(spine, p) => {
                    let (width, height) = spine.size();
                    p.fulfill(Ok(SpineInfo {
                        spine_id: id,
                        texture_id: spine.texture_id,
                        width,
                        height,
                    }));
                    return Ok((id, future));
                }
                WaitOutcome::Idle(p) => p,
            },
            None => p,
        };

        let id = existing.unwrap_or_else(|| free_id(&assets.spines, &ids.spines));
        let texture_id = free_id(&assets.textures, &ids.textures);
        self.tasks.load_spine(
            id,
            SpineLoadArgs {
                atlas_path: atlas_path.as_ref().to_owned(),
                skeleton_path: skeleton_path.to_owned(),
                texture_id,
                promise: Some(p),
            },
            create_args,
        )?;
        ids.spines.insert(skeleton_path.to_owned(), id);

        Ok((id, future))
    }
}
