use crate::render::FrameUniforms;
use crate::vulkan::resources::VulkanTexture;
use common::parking_lot::Mutex;
use common::types::HashMap;
use std::mem;
use std::sync::Arc;
use vk_wrapper::{
    vk, Buffer, DescriptorCopy, DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorWrite, Device,
    DeviceError, ImageView, LayoutBinding, Sampler, WriteData,
};

const TEXTURE_POOL_CHUNK: u32 = 64;

/// Descriptor sets a render thread binds while recording one frame slot.
///
/// Owned by exactly one thread. Texture sets are copies of the canonical per-texture sets,
/// keyed by texture id. Ids without a texture at snapshot time have no entry.
pub struct FrameDescriptors {
    _frame_pool: DescriptorPool,
    _texture_pool: Option<DescriptorPool>,
    frame_set: DescriptorSet,
    texture_sets: HashMap<u32, DescriptorSet>,
}

impl FrameDescriptors {
    pub fn frame_set(&self) -> DescriptorSet {
        self.frame_set
    }

    pub fn texture_set(&self, texture_id: u32) -> Option<DescriptorSet> {
        self.texture_sets.get(&texture_id).copied()
    }
}

/// Owns the set layouts and the canonical texture descriptor sets.
///
/// Every loaded texture gets one canonical set, written once by the asset thread that
/// uploaded it. Render threads never bind canonical sets: they copy them into thread-owned
/// pools with [`create_frame_descriptors`](Self::create_frame_descriptors), so no pool or set
/// is ever used from two threads.
pub struct DescriptorSetManager {
    device: Arc<Device>,
    frame_layout: Arc<DescriptorSetLayout>,
    texture_layout: Arc<DescriptorSetLayout>,
    texture_pools: Mutex<Vec<DescriptorPool>>,
}

impl DescriptorSetManager {
    pub fn new(device: &Arc<Device>) -> Result<Self, DeviceError> {
        let frame_layout = device.create_descriptor_set_layout(&[LayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            stages: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        }])?;
        let texture_layout = device.create_descriptor_set_layout(&[LayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stages: vk::ShaderStageFlags::FRAGMENT,
        }])?;

        Ok(Self {
            device: Arc::clone(device),
            frame_layout,
            texture_layout,
            texture_pools: Mutex::new(vec![]),
        })
    }

    pub fn frame_layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.frame_layout
    }

    pub fn texture_layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.texture_layout
    }

    /// Allocates and writes the canonical set of a new texture.
    pub fn create_texture_set(&self, view: &ImageView, sampler: &Sampler) -> Result<DescriptorSet, DeviceError> {
        let set = {
            let mut pools = self.texture_pools.lock();
            let full = pools.last().map_or(true, |p| p.allocated() >= p.capacity());
            if full {
                pools.push(
                    self.device
                        .create_descriptor_pool(&self.texture_layout, TEXTURE_POOL_CHUNK)?,
                );
            }
            let pool = pools.last_mut().ok_or(DeviceError::VkError(vk::Result::ERROR_OUT_OF_POOL_MEMORY))?;
            pool.allocate(&self.texture_layout, 1)?[0]
        };

        unsafe {
            self.device.update_descriptor_sets(
                &[DescriptorWrite {
                    set,
                    binding: 0,
                    data: WriteData::CombinedImageSampler { view, sampler },
                }],
                &[],
            )
        };
        Ok(set)
    }

    /// Builds a thread-owned bundle: the frame set pointing at `uniforms` and a copy of the
    /// canonical set of every texture in `textures`.
    pub fn create_frame_descriptors(
        &self,
        uniforms: &Buffer,
        textures: &HashMap<u32, Arc<VulkanTexture>>,
    ) -> Result<FrameDescriptors, DeviceError> {
        let mut frame_pool = self.device.create_descriptor_pool(&self.frame_layout, 1)?;
        let frame_set = frame_pool.allocate(&self.frame_layout, 1)?[0];

        let count = textures.len() as u32;
        let mut texture_pool = if count > 0 {
            Some(self.device.create_descriptor_pool(&self.texture_layout, count)?)
        } else {
            None
        };

        let mut texture_sets = HashMap::with_capacity(textures.len());
        let mut copies = Vec::with_capacity(textures.len());

        if let Some(pool) = &mut texture_pool {
            let sets = pool.allocate(&self.texture_layout, count)?;
            for ((&id, texture), dst_set) in textures.iter().zip(sets) {
                texture_sets.insert(id, dst_set);
                copies.push(DescriptorCopy {
                    src_set: texture.descriptor,
                    src_binding: 0,
                    dst_set,
                    dst_binding: 0,
                    count: 1,
                });
            }
        }

        unsafe {
            self.device.update_descriptor_sets(
                &[DescriptorWrite {
                    set: frame_set,
                    binding: 0,
                    data: WriteData::UniformBuffer {
                        buffer: uniforms,
                        offset: 0,
                        range: mem::size_of::<FrameUniforms>() as u64,
                    },
                }],
                &copies,
            )
        };

        Ok(FrameDescriptors {
            _frame_pool: frame_pool,
            _texture_pool: texture_pool,
            frame_set,
            texture_sets,
        })
    }
}
