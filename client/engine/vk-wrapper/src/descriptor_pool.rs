use crate::device::DeviceWrapper;
use crate::{Buffer, Device, DeviceError, ImageView, Sampler};
use ash::vk;
use smallvec::SmallVec;
use std::slice;
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub struct LayoutBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub stages: vk::ShaderStageFlags,
}

pub struct DescriptorSetLayout {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::DescriptorSetLayout,
    pub(crate) bindings: Vec<LayoutBinding>,
}

impl DescriptorSetLayout {
    pub fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device_wrapper
                .native
                .destroy_descriptor_set_layout(self.native, None)
        };
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorSet(pub(crate) vk::DescriptorSet);

unsafe impl Send for DescriptorSet {}

unsafe impl Sync for DescriptorSet {}

/// Fixed-capacity pool. Sets are freed all at once by `reset` or when the pool is dropped.
pub struct DescriptorPool {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::DescriptorPool,
    pub(crate) max_sets: u32,
    pub(crate) allocated: u32,
}

impl DescriptorPool {
    pub fn capacity(&self) -> u32 {
        self.max_sets
    }

    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    pub fn allocate(&mut self, layout: &DescriptorSetLayout, count: u32) -> Result<Vec<DescriptorSet>, DeviceError> {
        let layouts: SmallVec<[vk::DescriptorSetLayout; 8]> = (0..count).map(|_| layout.native).collect();
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.native)
            .set_layouts(&layouts);

        let sets = unsafe { self.device_wrapper.native.allocate_descriptor_sets(&alloc_info)? };
        self.allocated += count;

        Ok(sets.into_iter().map(DescriptorSet).collect())
    }

    pub fn reset(&mut self) -> Result<(), DeviceError> {
        unsafe {
            self.device_wrapper
                .native
                .reset_descriptor_pool(self.native, vk::DescriptorPoolResetFlags::empty())?
        };
        self.allocated = 0;
        Ok(())
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_descriptor_pool(self.native, None) };
    }
}

pub enum WriteData<'a> {
    UniformBuffer { buffer: &'a Buffer, offset: u64, range: u64 },
    CombinedImageSampler { view: &'a ImageView, sampler: &'a Sampler },
}

pub struct DescriptorWrite<'a> {
    pub set: DescriptorSet,
    pub binding: u32,
    pub data: WriteData<'a>,
}

#[derive(Clone, Copy)]
pub struct DescriptorCopy {
    pub src_set: DescriptorSet,
    pub src_binding: u32,
    pub dst_set: DescriptorSet,
    pub dst_binding: u32,
    pub count: u32,
}

impl Device {
    pub fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
    ) -> Result<Arc<DescriptorSetLayout>, DeviceError> {
        let native_bindings: SmallVec<[vk::DescriptorSetLayoutBinding; 8]> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(1)
                    .stage_flags(b.stages)
                    .build()
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&native_bindings);

        Ok(Arc::new(DescriptorSetLayout {
            device_wrapper: Arc::clone(&self.wrapper),
            native: unsafe {
                self.wrapper
                    .native
                    .create_descriptor_set_layout(&create_info, None)?
            },
            bindings: bindings.to_vec(),
        }))
    }

    /// Creates a pool able to hold `max_sets` sets of `layout`.
    pub fn create_descriptor_pool(
        &self,
        layout: &DescriptorSetLayout,
        max_sets: u32,
    ) -> Result<DescriptorPool, DeviceError> {
        let mut pool_sizes: SmallVec<[vk::DescriptorPoolSize; 4]> = SmallVec::new();
        for binding in &layout.bindings {
            match pool_sizes.iter_mut().find(|s| s.ty == binding.descriptor_type) {
                Some(size) => size.descriptor_count += max_sets,
                None => pool_sizes.push(vk::DescriptorPoolSize {
                    ty: binding.descriptor_type,
                    descriptor_count: max_sets,
                }),
            }
        }

        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        Ok(DescriptorPool {
            device_wrapper: Arc::clone(&self.wrapper),
            native: unsafe { self.wrapper.native.create_descriptor_pool(&create_info, None)? },
            max_sets,
            allocated: 0,
        })
    }

    /// # Safety
    /// Written sets must not be in use by pending command buffers.
    pub unsafe fn update_descriptor_sets(&self, writes: &[DescriptorWrite], copies: &[DescriptorCopy]) {
        let mut buffer_infos = Vec::with_capacity(writes.len());
        let mut image_infos = Vec::with_capacity(writes.len());

        for write in writes {
            match &write.data {
                WriteData::UniformBuffer { buffer, offset, range } => buffer_infos.push(vk::DescriptorBufferInfo {
                    buffer: buffer.native,
                    offset: *offset,
                    range: *range,
                }),
                WriteData::CombinedImageSampler { view, sampler } => image_infos.push(vk::DescriptorImageInfo {
                    sampler: sampler.native,
                    image_view: view.native,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }),
            }
        }

        let mut buffer_idx = 0;
        let mut image_idx = 0;
        let native_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .map(|write| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(write.set.0)
                    .dst_binding(write.binding)
                    .dst_array_element(0);

                match write.data {
                    WriteData::UniformBuffer { .. } => {
                        buffer_idx += 1;
                        builder
                            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                            .buffer_info(slice::from_ref(&buffer_infos[buffer_idx - 1]))
                            .build()
                    }
                    WriteData::CombinedImageSampler { .. } => {
                        image_idx += 1;
                        builder
                            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                            .image_info(slice::from_ref(&image_infos[image_idx - 1]))
                            .build()
                    }
                }
            })
            .collect();

        let native_copies: Vec<vk::CopyDescriptorSet> = copies
            .iter()
            .map(|copy| {
                vk::CopyDescriptorSet::builder()
                    .src_set(copy.src_set.0)
                    .src_binding(copy.src_binding)
                    .dst_set(copy.dst_set.0)
                    .dst_binding(copy.dst_binding)
                    .descriptor_count(copy.count)
                    .build()
            })
            .collect();

        self.wrapper.native.update_descriptor_sets(&native_writes, &native_copies);
    }
}
