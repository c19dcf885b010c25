use crate::render::GpuTexture;
use crate::vulkan::pipelines::ModelVertex;
use std::mem;
use std::sync::Arc;
use vk_wrapper::{Buffer, BufferUsageFlags, DescriptorSet, Device, DeviceError, HostBuffer, ImageView, Sampler};

pub struct VulkanTexture {
    pub view: Arc<ImageView>,
    pub sampler: Arc<Sampler>,
    /// Canonical set, see [`DescriptorSetManager`](crate::vulkan::DescriptorSetManager).
    pub descriptor: DescriptorSet,
    pub size: (u32, u32),
}

impl GpuTexture for VulkanTexture {
    fn size(&self) -> (u32, u32) {
        self.size
    }
}

pub struct VulkanModel {
    pub vertices: HostBuffer<ModelVertex>,
    pub indices: HostBuffer<u32>,
    pub index_count: u32,
}

const ARENA_CHUNK_LEN: u64 = 4096;

/// Host-visible per-instance data of one frame slot of one render thread.
///
/// Grows by whole chunks. Chunks are never reallocated, so buffers bound by earlier
/// commands of the frame stay valid until [`reset`](Self::reset).
pub struct InstanceArena<T: Copy> {
    usage: BufferUsageFlags,
    chunks: Vec<HostBuffer<T>>,
    chunk: usize,
    used: u64,
}

impl<T: Copy> InstanceArena<T> {
    pub fn new(usage: BufferUsageFlags) -> Self {
        Self {
            usage,
            chunks: vec![],
            chunk: 0,
            used: 0,
        }
    }

    pub fn reset(&mut self) {
        self.chunk = 0;
        self.used = 0;
    }

    /// Copies `data` into the arena. Returns the buffer and the byte offset to bind.
    pub fn push(&mut self, device: &Device, data: &[T]) -> Result<(&Buffer, u64), DeviceError> {
        let len = data.len() as u64;

        while self.chunk < self.chunks.len() && self.used + len > self.chunks[self.chunk].len() {
            self.chunk += 1;
            self.used = 0;
        }
        if self.chunk == self.chunks.len() {
            self.chunks
                .push(device.create_host_buffer(self.usage, len.max(ARENA_CHUNK_LEN))?);
            self.used = 0;
        }

        let first = self.used;
        let chunk = &mut self.chunks[self.chunk];
        chunk.write(first, data);
        self.used += len;

        Ok((chunk.raw(), first * mem::size_of::<T>() as u64))
    }
}
