use crate::asset::{AssetError, Assets, TextureCreateArgs};
use crate::render::{
    AcquireOutcome, AssetWorker, FramePresenter, FrameTarget, GpuTexture, PresentOutcome, RenderBackend, RenderError,
    RenderTask, RenderWorker, TaskKind,
};
use common::parking_lot::Mutex;
use common::types::{HashMap, HashSet};
use common::MO_RELAXED;
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockCommand {
    pub serial: u64,
    pub kind: TaskKind,
    /// Texture id of the first batch.
    pub tag: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    WaitFrame(usize),
    Submit { slot: usize, buffers: usize },
    Rebuild { slot: usize, serial: u64, textures: usize },
    Execute { slot: usize, serial: u64 },
}

pub struct MockTexture {
    pub size: (u32, u32),
}

impl GpuTexture for MockTexture {
    fn size(&self) -> (u32, u32) {
        self.size
    }
}

pub struct MockModel;

#[derive(Default)]
pub struct MockBackend {
    pub events: Mutex<Vec<Event>>,
    pub slow_kind: Mutex<Option<(TaskKind, Duration)>>,
    pub jitter: AtomicBool,
    /// Recording a batch with this texture id panics.
    pub panic_tag: Mutex<Option<u32>>,
    pub load_delay: Mutex<Duration>,
    pub texture_loads: AtomicUsize,
    pub loaded_paths: Mutex<Vec<PathBuf>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl RenderBackend for MockBackend {
    type CommandBuffer = MockCommand;
    type Texture = MockTexture;
    type Model = MockModel;
    type RenderWorker = MockRenderWorker;
    type AssetWorker = MockAssetWorker;

    fn create_render_worker(self: &Arc<Self>, _index: usize) -> Result<MockRenderWorker, RenderError> {
        Ok(MockRenderWorker {
            backend: Arc::clone(self),
            built: Default::default(),
        })
    }

    fn create_asset_worker(self: &Arc<Self>, _index: usize) -> Result<MockAssetWorker, AssetError> {
        Ok(MockAssetWorker {
            backend: Arc::clone(self),
        })
    }
}

fn texture_ids(task: &RenderTask) -> Vec<u32> {
    match task {
        RenderTask::UpdateUniforms(_) => vec![],
        RenderTask::Models(b) => b.iter().map(|v| v.texture_id).collect(),
        RenderTask::Billboards(b) | RenderTask::Sprites(b) => b.iter().map(|v| v.texture_id).collect(),
        RenderTask::Glyphs(b) => b.iter().map(|v| v.texture_id).collect(),
        RenderTask::Spines(b) => b.iter().map(|v| v.texture_id).collect(),
    }
}

pub struct MockRenderWorker {
    backend: Arc<MockBackend>,
    /// Registry timestamp and texture ids each frame slot's descriptor sets were built with.
    built: HashMap<usize, (u64, HashSet<u32>)>,
}

impl MockRenderWorker {
    fn is_bound(&self, slot: usize, id: u32) -> bool {
        self.built.get(&slot).map_or(false, |(_, ids)| ids.contains(&id))
    }
}

impl RenderWorker<MockBackend> for MockRenderWorker {
    fn descriptor_timestamp(&self, slot: usize) -> Option<u64> {
        self.built.get(&slot).map(|(timestamp, _)| *timestamp)
    }

    fn rebuild_descriptor_sets(
        &mut self,
        frame: FrameTarget,
        timestamp: u64,
        textures: &HashMap<u32, Arc<MockTexture>>,
    ) -> Result<(), RenderError> {
        self.built
            .insert(frame.slot, (timestamp, textures.keys().copied().collect()));
        self.backend.log(Event::Rebuild {
            slot: frame.slot,
            serial: frame.serial,
            textures: textures.len(),
        });
        Ok(())
    }

    fn execute(
        &mut self,
        frame: FrameTarget,
        task: &RenderTask,
        assets: &Assets<MockBackend>,
    ) -> Result<Option<MockCommand>, RenderError> {
        self.backend.log(Event::Execute {
            slot: frame.slot,
            serial: frame.serial,
        });

        let slow = *self.backend.slow_kind.lock();
        if let Some((kind, delay)) = slow {
            if kind == task.kind() {
                thread::sleep(delay);
            }
        }
        if self.backend.jitter.load(MO_RELAXED) {
            thread::sleep(Duration::from_micros(rand::thread_rng().gen_range(0..2000)));
        }

        let ids = texture_ids(task);
        let panic_tag = *self.backend.panic_tag.lock();
        if let Some(tag) = panic_tag {
            if ids.contains(&tag) {
                panic!("mock worker asked to panic on texture {}", tag);
            }
        }

        // Textures registered after the last snapshot are picked up in place.
        let stale = ids.iter().any(|&id| !self.is_bound(frame.slot, id));
        if stale {
            let (timestamp, textures) = assets.textures.snapshot();
            self.rebuild_descriptor_sets(frame, timestamp, &textures)?;
        }
        if let Some(&id) = ids.iter().find(|&&id| !self.is_bound(frame.slot, id)) {
            return Err(RenderError::MissingTexture(id));
        }

        Ok(match task {
            RenderTask::UpdateUniforms(_) => None,
            _ => Some(MockCommand {
                serial: frame.serial,
                kind: task.kind(),
                tag: ids.first().copied().unwrap_or(u32::MAX),
            }),
        })
    }
}

pub struct MockAssetWorker {
    backend: Arc<MockBackend>,
}

impl MockAssetWorker {
    fn simulate_load(&self, path: &Path) -> Result<(), AssetError> {
        let delay = *self.backend.load_delay.lock();
        thread::sleep(delay);
        if path.to_string_lossy().contains("missing") {
            return Err(io::Error::new(io::ErrorKind::NotFound, "missing file").into());
        }
        self.backend.loaded_paths.lock().push(path.to_owned());
        Ok(())
    }
}

impl AssetWorker<MockBackend> for MockAssetWorker {
    fn load_texture(&mut self, path: &Path, _args: &TextureCreateArgs) -> Result<MockTexture, AssetError> {
        self.simulate_load(path)?;
        self.backend.texture_loads.fetch_add(1, MO_RELAXED);
        Ok(MockTexture { size: (16, 8) })
    }

    fn load_model(&mut self, path: &Path) -> Result<MockModel, AssetError> {
        self.simulate_load(path)?;
        Ok(MockModel)
    }
}

/// Frame slots whose "GPU work" retires as soon as the slot is waited on.
pub struct MockPresenter {
    backend: Arc<MockBackend>,
    in_flight: Vec<bool>,
    pub extent: (u32, u32),
    pub out_of_date_acquires: usize,
    /// Number of upcoming `wait_frame` calls that fail.
    pub failed_waits: usize,
    pub submissions: Vec<Vec<MockCommand>>,
    pub submitted_slots: Vec<usize>,
    pub fence_resets: usize,
    pub recreations: usize,
}

impl MockPresenter {
    pub fn new(backend: &Arc<MockBackend>, frame_count: usize) -> Self {
        Self {
            backend: Arc::clone(backend),
            in_flight: vec![false; frame_count],
            extent: (800, 600),
            out_of_date_acquires: 0,
            failed_waits: 0,
            submissions: vec![],
            submitted_slots: vec![],
            fence_resets: 0,
            recreations: 0,
        }
    }
}

impl FramePresenter for MockPresenter {
    type CommandBuffer = MockCommand;

    fn frame_count(&self) -> usize {
        self.in_flight.len()
    }

    fn wait_frame(&mut self, slot: usize) -> Result<(), RenderError> {
        if self.failed_waits > 0 {
            self.failed_waits -= 1;
            return Err(vk_wrapper::vk::Result::ERROR_DEVICE_LOST.into());
        }
        self.in_flight[slot] = false;
        self.backend.log(Event::WaitFrame(slot));
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome, RenderError> {
        if self.out_of_date_acquires > 0 {
            self.out_of_date_acquires -= 1;
            return Ok(AcquireOutcome::OutOfDate);
        }
        Ok(AcquireOutcome::Acquired {
            image: slot as u32,
            suboptimal: false,
        })
    }

    fn submit_and_present(
        &mut self,
        slot: usize,
        _image: u32,
        buffers: &[MockCommand],
    ) -> Result<PresentOutcome, RenderError> {
        assert!(!self.in_flight[slot], "slot {} reused while in flight", slot);
        self.in_flight[slot] = true;
        self.fence_resets += 1;
        self.backend.log(Event::Submit {
            slot,
            buffers: buffers.len(),
        });
        self.submissions.push(buffers.to_vec());
        self.submitted_slots.push(slot);
        Ok(PresentOutcome::Presented)
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<bool, RenderError> {
        self.recreations += 1;
        self.in_flight.iter_mut().for_each(|v| *v = false);
        Ok(self.extent.0 > 0 && self.extent.1 > 0)
    }

    fn set_extent_hint(&mut self, size: (u32, u32)) {
        self.extent = size;
    }

    fn aspect_ratio(&self) -> f32 {
        self.extent.0 as f32 / self.extent.1.max(1) as f32
    }
}
