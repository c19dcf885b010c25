use crate::device::DeviceWrapper;
use crate::{Device, DeviceError};
use ash::vk;
use std::sync::Arc;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SamplerFilter(pub(crate) vk::Filter);

impl SamplerFilter {
    pub const NEAREST: Self = Self(vk::Filter::NEAREST);
    pub const LINEAR: Self = Self(vk::Filter::LINEAR);
}

pub struct Sampler {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::Sampler,
    pub(crate) filter: SamplerFilter,
}

impl Sampler {
    pub fn filter(&self) -> SamplerFilter {
        self.filter
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_sampler(self.native, None) };
    }
}

impl Device {
    pub fn create_sampler(&self, filter: SamplerFilter, repeat: bool) -> Result<Arc<Sampler>, DeviceError> {
        let address_mode = if repeat {
            vk::SamplerAddressMode::REPEAT
        } else {
            vk::SamplerAddressMode::CLAMP_TO_EDGE
        };
        let anisotropy = self.wrapper.adapter.max_sampler_anisotropy();

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(filter.0)
            .min_filter(filter.0)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .unnormalized_coordinates(false);

        Ok(Arc::new(Sampler {
            device_wrapper: Arc::clone(&self.wrapper),
            native: unsafe { self.wrapper.native.create_sampler(&sampler_info, None)? },
            filter,
        }))
    }
}
