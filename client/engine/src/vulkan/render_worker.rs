use crate::asset::Assets;
use crate::render::{
    FrameTarget, GlyphBatch, ModelBatch, RenderError, RenderTask, RenderWorker, SpineSpriteBatch, SpriteBatch,
};
use crate::vulkan::backend::VulkanBackend;
use crate::vulkan::descriptor_set_manager::FrameDescriptors;
use crate::vulkan::pipelines::{ModelInstance, QuadInstance, QuadMode, QuadPushConstants, RenderTarget};
use crate::vulkan::resources::{InstanceArena, VulkanTexture};
use common::glm::{Vec2, Vec3, Vec4};
use common::types::HashMap;
use common::log::debug;
use smallvec::SmallVec;
use std::sync::Arc;
use vk_wrapper::{BufferUsageFlags, CmdList, CmdListHandle, Device, DeviceError};

/// Thread-local data of one frame slot.
struct SlotData {
    serial: u64,
    cmd_lists: Vec<CmdList>,
    next_cmd_list: usize,
    descriptors: Option<FrameDescriptors>,
    /// Texture registry timestamp `descriptors` were built from.
    timestamp: Option<u64>,
    /// Bundles replaced mid-frame. Commands recorded earlier in the frame still reference them.
    retired: Vec<FrameDescriptors>,
    model_instances: InstanceArena<ModelInstance>,
    quad_instances: InstanceArena<QuadInstance>,
}

impl SlotData {
    fn new() -> Self {
        Self {
            serial: 0,
            cmd_lists: vec![],
            next_cmd_list: 0,
            descriptors: None,
            timestamp: None,
            retired: vec![],
            model_instances: InstanceArena::new(BufferUsageFlags::VERTEX),
            quad_instances: InstanceArena::new(BufferUsageFlags::VERTEX),
        }
    }

    /// The slot's previous frame has retired, so everything it used can be recycled.
    fn begin(&mut self, serial: u64) {
        self.serial = serial;
        self.next_cmd_list = 0;
        self.retired.clear();
        self.model_instances.reset();
        self.quad_instances.reset();
    }
}

fn take_cmd_list<'a>(
    device: &Device,
    cmd_lists: &'a mut Vec<CmdList>,
    next: &mut usize,
) -> Result<&'a mut CmdList, DeviceError> {
    if *next == cmd_lists.len() {
        cmd_lists.push(device.queue().create_secondary_cmd_list()?);
    }
    let cl = &mut cmd_lists[*next];
    *next += 1;
    Ok(cl)
}

fn quad(position: &Vec3, size: &Vec2, uv_rect: Vec4, fg_color: Vec4, bg_color: Vec4) -> QuadInstance {
    QuadInstance {
        position: Vec4::new(position.x, position.y, position.z, 1.0),
        size: Vec4::new(size.x, size.y, 0.0, 0.0),
        uv_rect,
        fg_color,
        bg_color,
    }
}

const FULL_UV: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);
const WHITE: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);

/// Owns one command pool per recorded task and a descriptor set bundle per frame slot.
pub struct VulkanRenderWorker {
    backend: Arc<VulkanBackend>,
    target: Arc<RenderTarget>,
    slots: Vec<SlotData>,
}

impl VulkanRenderWorker {
    pub(crate) fn new(backend: Arc<VulkanBackend>) -> Result<Self, RenderError> {
        let target = backend
            .target()
            .ok_or_else(|| DeviceError::SwapchainError("render target is not created".to_owned()))?;
        let slots = (0..backend.frame_count()).map(|_| SlotData::new()).collect();

        Ok(Self {
            backend,
            target,
            slots,
        })
    }

    fn rebuild(
        &mut self,
        slot: usize,
        timestamp: u64,
        textures: &HashMap<u32, Arc<VulkanTexture>>,
    ) -> Result<(), RenderError> {
        let descriptors = {
            let uniforms = self.backend.uniforms(slot).lock();
            self.backend
                .descriptors()
                .create_frame_descriptors(uniforms.raw(), textures)?
        };

        let slot_data = &mut self.slots[slot];
        if let Some(old) = slot_data.descriptors.replace(descriptors) {
            slot_data.retired.push(old);
        }
        slot_data.timestamp = Some(timestamp);
        Ok(())
    }

    /// Rebuilds in place when a batch references a texture registered after the last snapshot.
    fn ensure_textures(
        &mut self,
        slot: usize,
        texture_ids: impl Iterator<Item = u32>,
        assets: &Assets<VulkanBackend>,
    ) -> Result<(), RenderError> {
        let mut stale = false;
        for id in texture_ids {
            let bound = self.slots[slot]
                .descriptors
                .as_ref()
                .and_then(|d| d.texture_set(id))
                .is_some();
            if !bound {
                if assets.textures.get(id).is_none() {
                    return Err(RenderError::MissingTexture(id));
                }
                stale = true;
            }
        }

        if stale {
            debug!("Render thread refreshes descriptor sets of slot {} mid-frame", slot);
            let (timestamp, textures) = assets.textures.snapshot();
            self.rebuild(slot, timestamp, &textures)?;
        }
        Ok(())
    }

    fn record(
        &mut self,
        slot: usize,
        task: &RenderTask,
        assets: &Assets<VulkanBackend>,
    ) -> Result<CmdListHandle, RenderError> {
        let device = self.backend.device();
        let target = &self.target;
        let pipelines = &target.pipelines;
        let layout = &pipelines.layout;

        let SlotData {
            cmd_lists,
            next_cmd_list,
            descriptors,
            model_instances,
            quad_instances,
            ..
        } = &mut self.slots[slot];
        let descriptors = descriptors
            .as_ref()
            .ok_or_else(|| DeviceError::SwapchainError("descriptor sets are not built".to_owned()))?;

        let cl = take_cmd_list(device, cmd_lists, next_cmd_list)?;
        cl.reset(true)?;
        cl.begin_secondary_graphics(&target.render_pass, 0, target.extent)?;
        cl.bind_descriptor_sets(layout, 0, &[descriptors.frame_set()]);

        let texture_set = |id: u32| descriptors.texture_set(id).ok_or(RenderError::MissingTexture(id));

        match task {
            RenderTask::UpdateUniforms(_) => {}
            RenderTask::Models(batches) => {
                cl.bind_pipeline(&pipelines.model);
                for batch in batches.iter().filter(|b| b.instance_count() > 0) {
                    let model = assets
                        .models
                        .get(batch.model_id)
                        .ok_or(RenderError::MissingModel(batch.model_id))?;
                    let instances: Vec<ModelInstance> = batch
                        .positions
                        .iter()
                        .map(|p| ModelInstance {
                            position: Vec4::new(p.x, p.y, p.z, 1.0),
                        })
                        .collect();
                    let (buffer, offset) = model_instances.push(device, &instances)?;

                    cl.bind_descriptor_sets(layout, 1, &[texture_set(batch.texture_id)?]);
                    cl.bind_vertex_buffers(0, &[(model.vertices.raw(), 0), (buffer, offset)]);
                    cl.bind_index_buffer(model.indices.raw(), 0);
                    cl.draw_indexed(model.index_count, instances.len() as u32, 0, 0);
                }
            }
            RenderTask::Billboards(batches) | RenderTask::Sprites(batches) => {
                let mode = if matches!(task, RenderTask::Billboards(_)) {
                    QuadMode::Billboard
                } else {
                    QuadMode::Sprite
                };
                cl.bind_pipeline(&pipelines.quad);
                cl.push_constants(layout, &QuadPushConstants::new(mode));

                for batch in batches.iter().filter(|b| b.instance_count() > 0) {
                    let instances: Vec<QuadInstance> = batch
                        .positions
                        .iter()
                        .zip(&batch.sizes)
                        .map(|(p, s)| quad(p, s, FULL_UV, WHITE, Vec4::zeros()))
                        .collect();
                    let (buffer, offset) = quad_instances.push(device, &instances)?;

                    cl.bind_descriptor_sets(layout, 1, &[texture_set(batch.texture_id)?]);
                    cl.bind_vertex_buffers(0, &[(buffer, offset)]);
                    cl.draw(6, instances.len() as u32, 0, 0);
                }
            }
            RenderTask::Glyphs(batches) => {
                cl.bind_pipeline(&pipelines.quad);
                cl.push_constants(layout, &QuadPushConstants::new(QuadMode::Glyph));

                for batch in batches.iter().filter(|b| b.instance_count() > 0) {
                    let instances: Vec<QuadInstance> = (0..batch.instance_count())
                        .map(|i| {
                            let uv = batch.uv_rects.get(i).copied().unwrap_or(FULL_UV);
                            quad(
                                &batch.positions[i],
                                &batch.sizes[i],
                                uv,
                                batch.fg_colors[i],
                                batch.bg_colors[i],
                            )
                        })
                        .collect();
                    let (buffer, offset) = quad_instances.push(device, &instances)?;

                    cl.bind_descriptor_sets(layout, 1, &[texture_set(batch.texture_id)?]);
                    cl.bind_vertex_buffers(0, &[(buffer, offset)]);
                    cl.draw(6, instances.len() as u32, 0, 0);
                }
            }
            RenderTask::Spines(batches) => {
                cl.bind_pipeline(&pipelines.quad);
                cl.push_constants(layout, &QuadPushConstants::new(QuadMode::Spine));

                for batch in batches.iter().filter(|b| b.instance_count() > 0) {
                    let spine = assets
                        .spines
                        .get(batch.spine_id)
                        .ok_or(RenderError::MissingSpine(batch.spine_id))?;
                    let uv = spine.default_region_uv();
                    let instances: Vec<QuadInstance> = batch
                        .positions
                        .iter()
                        .zip(&batch.sizes)
                        .map(|(p, s)| quad(p, s, uv, WHITE, Vec4::zeros()))
                        .collect();
                    let (buffer, offset) = quad_instances.push(device, &instances)?;

                    cl.bind_descriptor_sets(layout, 1, &[texture_set(batch.texture_id)?]);
                    cl.bind_vertex_buffers(0, &[(buffer, offset)]);
                    cl.draw(6, instances.len() as u32, 0, 0);
                }
            }
        }

        cl.end()?;
        Ok(cl.handle())
    }
}

fn referenced_textures(task: &RenderTask) -> SmallVec<[u32; 8]> {
    match task {
        RenderTask::UpdateUniforms(_) => SmallVec::new(),
        RenderTask::Models(b) => b.iter().map(|v: &ModelBatch| v.texture_id).collect(),
        RenderTask::Billboards(b) | RenderTask::Sprites(b) => b.iter().map(|v: &SpriteBatch| v.texture_id).collect(),
        RenderTask::Glyphs(b) => b.iter().map(|v: &GlyphBatch| v.texture_id).collect(),
        RenderTask::Spines(b) => b.iter().map(|v: &SpineSpriteBatch| v.texture_id).collect(),
    }
}

impl RenderWorker<VulkanBackend> for VulkanRenderWorker {
    fn descriptor_timestamp(&self, slot: usize) -> Option<u64> {
        self.slots[slot % self.slots.len()].timestamp
    }

    fn rebuild_descriptor_sets(
        &mut self,
        frame: FrameTarget,
        timestamp: u64,
        textures: &HashMap<u32, Arc<VulkanTexture>>,
    ) -> Result<(), RenderError> {
        let slot = frame.slot % self.slots.len();
        if self.slots[slot].serial != frame.serial {
            self.slots[slot].begin(frame.serial);
        }
        self.rebuild(slot, timestamp, textures)
    }

    fn execute(
        &mut self,
        frame: FrameTarget,
        task: &RenderTask,
        assets: &Assets<VulkanBackend>,
    ) -> Result<Option<CmdListHandle>, RenderError> {
        let slot = frame.slot % self.slots.len();
        if self.slots[slot].serial != frame.serial {
            self.slots[slot].begin(frame.serial);
        }

        if let RenderTask::UpdateUniforms(uniforms) = task {
            self.backend.uniforms(slot).lock().write(0, &[*uniforms]);
            return Ok(None);
        }

        self.ensure_textures(slot, referenced_textures(task).into_iter(), assets)?;
        self.record(slot, task, assets).map(Some)
    }
}
