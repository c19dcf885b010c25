use crate::device::DeviceWrapper;
use crate::utils::vk_bitflags_impl;
use crate::{Device, DeviceError};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::marker::PhantomData;
use std::sync::Arc;
use std::{mem, ptr};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferUsageFlags(pub(crate) vk::BufferUsageFlags);
vk_bitflags_impl!(BufferUsageFlags, vk::BufferUsageFlags);

impl BufferUsageFlags {
    pub const TRANSFER_SRC: Self = Self(vk::BufferUsageFlags::TRANSFER_SRC);
    pub const TRANSFER_DST: Self = Self(vk::BufferUsageFlags::TRANSFER_DST);
    pub const VERTEX: Self = Self(vk::BufferUsageFlags::VERTEX_BUFFER);
    pub const INDEX: Self = Self(vk::BufferUsageFlags::INDEX_BUFFER);
    pub const UNIFORM: Self = Self(vk::BufferUsageFlags::UNIFORM_BUFFER);
    pub const STORAGE: Self = Self(vk::BufferUsageFlags::STORAGE_BUFFER);
}

pub struct Buffer {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::Buffer,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) bytesize: u64,
}

impl Buffer {
    pub fn bytesize(&self) -> u64 {
        self.bytesize
    }

    /// The memory block backing this buffer and the buffer's offset in it.
    pub fn memory_range(&self) -> (vk::DeviceMemory, u64) {
        self.allocation
            .as_ref()
            .map_or((vk::DeviceMemory::null(), 0), |a| unsafe { (a.memory(), a.offset()) })
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_buffer(self.native, None) };
        if let Some(allocation) = self.allocation.take() {
            self.device_wrapper.free(allocation);
        }
    }
}

unsafe impl Send for Buffer {}

unsafe impl Sync for Buffer {}

/// Persistently mapped, host-coherent buffer of `T` elements.
///
/// The mapping belongs to the allocator's memory block and stays valid until the buffer is dropped.
pub struct HostBuffer<T: Copy> {
    pub(crate) _type_marker: PhantomData<T>,
    pub(crate) buffer: Buffer,
    pub(crate) p_data: *mut T,
    pub(crate) len: u64,
}

unsafe impl<T: Copy + Send> Send for HostBuffer<T> {}

unsafe impl<T: Copy + Sync> Sync for HostBuffer<T> {}

impl<T: Copy> HostBuffer<T> {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn element_size(&self) -> u64 {
        mem::size_of::<T>() as u64
    }

    pub fn raw(&self) -> &Buffer {
        &self.buffer
    }

    /// Copies `data` into the buffer starting at element `first_element`.
    pub fn write(&mut self, first_element: u64, data: &[T]) {
        let end = first_element + data.len() as u64;
        if end > self.len {
            panic!(
                "VkBuffer: write out of bounds: the len is {} but the write ends at {}",
                self.len, end
            );
        }

        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.p_data.add(first_element as usize), data.len());
        }
    }
}

impl Device {
    fn create_buffer(
        &self,
        name: &str,
        usage: BufferUsageFlags,
        bytesize: u64,
        location: MemoryLocation,
    ) -> Result<Buffer, DeviceError> {
        if bytesize == 0 {
            return Err(DeviceError::ZeroBufferSize);
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .usage(usage.0)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .size(bytesize as vk::DeviceSize);

        let native = unsafe { self.wrapper.native.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { self.wrapper.native.get_buffer_memory_requirements(native) };

        let allocation = match self.wrapper.allocate(name, requirements, location, true) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.wrapper.native.destroy_buffer(native, None) };
                return Err(e);
            }
        };
        let (memory, offset) = unsafe { (allocation.memory(), allocation.offset()) };

        let buffer = Buffer {
            device_wrapper: Arc::clone(&self.wrapper),
            native,
            allocation: Some(allocation),
            bytesize,
        };
        unsafe { self.wrapper.native.bind_buffer_memory(native, memory, offset)? };

        Ok(buffer)
    }

    pub fn create_host_buffer<T: Copy>(&self, usage: BufferUsageFlags, len: u64) -> Result<HostBuffer<T>, DeviceError> {
        let buffer = self.create_buffer(
            "host_buffer",
            usage,
            len * mem::size_of::<T>() as u64,
            MemoryLocation::CpuToGpu,
        )?;

        let p_data = buffer
            .allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .ok_or(DeviceError::NotHostVisible)?;

        Ok(HostBuffer {
            _type_marker: PhantomData,
            buffer,
            p_data: p_data.as_ptr() as *mut T,
            len,
        })
    }
}
