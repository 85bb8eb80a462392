use ash::vk;

use super::utility;
use crate::errors::{Result, RhiError};
use crate::resources::{MAX_DEVICES, NativeHandle, PerDevice};
use crate::state::{NativeStateFactory, SamplerDesc};

/// Creates `VkSampler` objects for core sampler states.
#[derive(Default)]
pub struct AshStateFactory {
    devices: PerDevice<Option<ash::Device>>,
}

impl AshStateFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the logical device at `index`.
    pub fn add_device(&mut self, index: usize, device: ash::Device) -> Result<()> {
        if index >= MAX_DEVICES {
            return Err(RhiError::DeviceUnavailable(index));
        }
        self.devices[index] = Some(device);
        Ok(())
    }

    fn device(&self, index: usize) -> Result<&ash::Device> {
        self.devices
            .get(index)
            .and_then(Option::as_ref)
            .ok_or(RhiError::DeviceUnavailable(index))
    }
}

impl NativeStateFactory for AshStateFactory {
    fn create_sampler(&self, desc: &SamplerDesc, device_idx: usize) -> Result<NativeHandle> {
        let device = self.device(device_idx)?;
        let info = utility::sampler_create_info(desc);
        let sampler: vk::Sampler = unsafe { device.create_sampler(&info, None) }
            .map_err(|e| RhiError::NativeStateCreation(format!("vkCreateSampler failed: {e}")))?;
        Ok(utility::from_vk(sampler))
    }

    fn destroy_sampler(&self, device_idx: usize, handle: NativeHandle) {
        if handle.is_null() {
            return;
        }
        match self.device(device_idx) {
            Ok(device) => unsafe { device.destroy_sampler(utility::to_vk(handle), None) },
            Err(err) => log::error!("Leaking sampler: {err}"),
        }
    }
}
