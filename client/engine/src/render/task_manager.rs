use crate::asset::Assets;
use crate::render::backend::{FrameTarget, RenderBackend, RenderWorker};
use crate::render::batch::{FrameUniforms, GlyphBatch, ModelBatch, SpineSpriteBatch, SpriteBatch};
use crate::render::task_ledger::TaskLedger;
use crate::render::{RenderError, RenderTask, TaskKind};
use common::log::{debug, error, warn};
use common::parking_lot::{Condvar, Mutex};
use common::threading::JobQueue;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

pub(crate) struct RenderJob {
    frame: FrameTarget,
    order: u32,
    task: RenderTask,
}

struct LedgerShared<CB> {
    ledger: Mutex<TaskLedger<CB>>,
    settled: Condvar,
}

/// Pool of render threads recording one secondary command buffer per task.
///
/// The main thread opens a frame with [`begin_frame`](Self::begin_frame), issues tasks,
/// waits for all of them with [`wait_tasks_complete`](Self::wait_tasks_complete) and
/// collects the buffers in issue order with [`take_command_buffers`](Self::take_command_buffers).
pub struct RenderTaskManager<B: RenderBackend> {
    backend: Arc<B>,
    assets: Arc<Assets<B>>,
    queue: Arc<JobQueue<RenderJob>>,
    shared: Arc<LedgerShared<B::CommandBuffer>>,
    threads: Vec<thread::JoinHandle<()>>,
    thread_count: usize,
}

impl<B: RenderBackend> RenderTaskManager<B> {
    pub fn new(backend: Arc<B>, assets: Arc<Assets<B>>, thread_count: usize) -> Self {
        Self {
            backend,
            assets,
            queue: Arc::new(JobQueue::new()),
            shared: Arc::new(LedgerShared {
                ledger: Mutex::new(TaskLedger::new()),
                settled: Condvar::new(),
            }),
            threads: Vec::with_capacity(thread_count),
            thread_count: thread_count.max(1),
        }
    }

    fn start_threads(&mut self) -> Result<(), RenderError> {
        self.queue.resume();

        for i in 0..self.thread_count {
            let worker = self.backend.create_render_worker(i)?;
            let ctx = WorkerContext {
                queue: Arc::clone(&self.queue),
                shared: Arc::clone(&self.shared),
                assets: Arc::clone(&self.assets),
            };

            let handle = thread::Builder::new()
                .name(format!("render-worker-{}", i))
                .spawn(move || ctx.run(worker))
                .map_err(RenderError::WorkerSpawn)?;
            self.threads.push(handle);
        }

        debug!("Started {} render threads", self.thread_count);
        Ok(())
    }

    /// Cancels the pool, joins its threads and drops unstarted jobs.
    /// Threads are started again by the next non-discarded frame.
    pub fn stop_threads(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.queue.cancel();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("A render thread panicked");
            }
        }
        let dropped = self.queue.drain().len();
        self.queue.resume();
        debug!("Stopped render threads ({} queued jobs dropped)", dropped);
    }

    /// Opens frame `serial` on `slot`. Tasks issued into a discarded frame are dropped.
    pub fn begin_frame(&mut self, slot: usize, serial: u64, discard: bool) -> Result<(), RenderError> {
        self.shared.ledger.lock().reset(FrameTarget { slot, serial }, discard);

        if !discard && self.threads.is_empty() {
            self.start_threads()?;
        }
        Ok(())
    }

    /// Drops every task issued from now until the next `begin_frame`.
    pub fn close_frame(&self) {
        self.shared.ledger.lock().close();
    }

    fn enqueue(&self, task: RenderTask) {
        let (frame, order) = {
            let mut ledger = self.shared.ledger.lock();
            match ledger.record_call(task.kind()) {
                Some(order) => (ledger.frame(), order),
                None => return,
            }
        };
        self.queue.push(RenderJob { frame, order, task });
    }

    pub fn draw_models(&self, batches: Vec<ModelBatch>) {
        self.enqueue(RenderTask::Models(batches));
    }

    pub fn draw_billboards(&self, batches: Vec<SpriteBatch>) {
        self.enqueue(RenderTask::Billboards(batches));
    }

    pub fn draw_sprites(&self, batches: Vec<SpriteBatch>) {
        self.enqueue(RenderTask::Sprites(batches));
    }

    pub fn draw_glyphs(&self, batches: Vec<GlyphBatch>) {
        self.enqueue(RenderTask::Glyphs(batches));
    }

    pub fn draw_spines(&self, batches: Vec<SpineSpriteBatch>) {
        self.enqueue(RenderTask::Spines(batches));
    }

    pub fn update_frame_uniforms(&self, uniforms: FrameUniforms) {
        self.enqueue(RenderTask::UpdateUniforms(uniforms));
    }

    pub fn queued_jobs(&self) -> usize {
        self.queue.len()
    }

    /// True if the frame is not discarded and every issued task has reported back.
    pub fn check_tasks_complete(&self) -> bool {
        self.shared.ledger.lock().is_complete()
    }

    /// Blocks until every task of the current frame has reported back.
    /// Returns immediately for a discarded frame.
    pub fn wait_tasks_complete(&self) {
        let mut ledger = self.shared.ledger.lock();
        while !ledger.is_discarded() && !ledger.is_settled() {
            self.shared.settled.wait(&mut ledger);
        }
    }

    /// Whether a worker failed on a task of the current frame.
    pub fn frame_failed(&self) -> bool {
        self.shared.ledger.lock().is_failed()
    }

    pub fn take_command_buffers(&self) -> Vec<B::CommandBuffer> {
        self.shared.ledger.lock().take_buffers()
    }
}

impl<B: RenderBackend> Drop for RenderTaskManager<B> {
    fn drop(&mut self) {
        self.stop_threads();
    }
}

struct WorkerContext<B: RenderBackend> {
    queue: Arc<JobQueue<RenderJob>>,
    shared: Arc<LedgerShared<B::CommandBuffer>>,
    assets: Arc<Assets<B>>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}

impl<B: RenderBackend> WorkerContext<B> {
    fn run(self, mut worker: B::RenderWorker) {
        while let Some(job) = self.queue.wait_and_pop() {
            let kind = job.task.kind();
            // A panic counts as a failed task.
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.process(&mut worker, &job)))
                .unwrap_or_else(|payload| {
                    let msg = panic_message(payload.as_ref());
                    error!("Render task {:?} of frame {} panicked: {}", kind, job.frame.serial, msg);
                    Err(RenderError::WorkerPanic(msg))
                });

            let mut ledger = self.shared.ledger.lock();
            match result {
                Ok(buffer) => ledger.record_complete(job.frame.serial, kind, job.order, buffer),
                Err(err) => {
                    warn!(
                        "Render task {:?} of frame {} failed: {}",
                        kind, job.frame.serial, err
                    );
                    ledger.record_failure(job.frame.serial, kind);
                }
            }
            if ledger.is_settled() {
                self.shared.settled.notify_all();
            }
        }
        debug!("Render thread exits");
    }

    fn process(
        &self,
        worker: &mut B::RenderWorker,
        job: &RenderJob,
    ) -> Result<Option<B::CommandBuffer>, RenderError> {
        if worker.descriptor_timestamp(job.frame.slot) != Some(self.assets.textures.timestamp()) {
            let (timestamp, textures) = self.assets.textures.snapshot();
            worker.rebuild_descriptor_sets(job.frame, timestamp, &textures)?;
        }

        worker.execute(job.frame, &job.task, &self.assets)
    }
}
