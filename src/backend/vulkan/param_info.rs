//! Vulkan view of a pipeline's parameter layout.
//!
//! Extends [`PipelineParamInfo`] with per-set layout bindings, the native
//! descriptor set layouts on every device the pipeline targets, and a
//! sequential-index lookup from each category to the (set, binding index)
//! position used when filling descriptor writes.

use std::sync::Arc;

use ash::vk;

use super::descriptor::DescriptorLayout;
use super::device::{DeviceLimits, LayoutBinding, VulkanDevice, VulkanDeviceSet};
use super::utility;
use crate::errors::{Result, RhiError};
use crate::params::{GpuBufferFormat, GpuParamObjectType, ParamType, PipelineParamInfo};
use crate::resources::{DeviceMask, PerDevice};

/// Where the `n`-th binding of a category lives in the layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingLocation {
    pub set: u32,
    /// Position of the binding within the set's [`LayoutBinding`] list.
    pub index: usize,
    pub object_type: Option<GpuParamObjectType>,
    pub element_type: GpuBufferFormat,
    /// Pipeline stages that access the binding.
    pub stages: vk::PipelineStageFlags,
}

/// Descriptor totals of a pipeline layout, per device limit category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DescriptorCounts {
    uniform_buffers: u32,
    storage_buffers: u32,
    sampled_images: u32,
    storage_images: u32,
    samplers: u32,
}

impl DescriptorCounts {
    fn of(set_bindings: &[Vec<LayoutBinding>]) -> Self {
        let mut out = Self::default();
        for binding in set_bindings.iter().flatten() {
            let n = binding.count;
            match binding.descriptor_type {
                vk::DescriptorType::UNIFORM_BUFFER => out.uniform_buffers += n,
                vk::DescriptorType::STORAGE_BUFFER => out.storage_buffers += n,
                vk::DescriptorType::SAMPLED_IMAGE | vk::DescriptorType::UNIFORM_TEXEL_BUFFER => out.sampled_images += n,
                vk::DescriptorType::STORAGE_IMAGE | vk::DescriptorType::STORAGE_TEXEL_BUFFER => out.storage_images += n,
                vk::DescriptorType::SAMPLER => out.samplers += n,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER => {
                    out.sampled_images += n;
                    out.samplers += n;
                }
                _ => {}
            }
        }
        out
    }

    fn validate(&self, num_sets: u32, limits: &DeviceLimits) -> Result<()> {
        let checks = [
            ("descriptor sets", num_sets, limits.max_bound_descriptor_sets),
            ("uniform buffers", self.uniform_buffers, limits.max_descriptor_set_uniform_buffers),
            ("storage buffers", self.storage_buffers, limits.max_descriptor_set_storage_buffers),
            ("sampled images", self.sampled_images, limits.max_descriptor_set_sampled_images),
            ("storage images", self.storage_images, limits.max_descriptor_set_storage_images),
            ("samplers", self.samplers, limits.max_descriptor_set_samplers),
        ];
        for (what, requested, limit) in checks {
            if requested > limit {
                return Err(RhiError::DeviceLimitsExceeded { what, requested, limit });
            }
        }
        Ok(())
    }
}

/// Parameter layout of a pipeline, resolved against the Vulkan devices.
#[derive(Debug)]
pub struct VulkanPipelineParamInfo {
    base: Arc<PipelineParamInfo>,
    set_bindings: Vec<Vec<LayoutBinding>>,
    locations: [Vec<BindingLocation>; ParamType::COUNT],
    devices: PerDevice<Option<Arc<VulkanDevice>>>,
    layouts: PerDevice<Vec<Arc<DescriptorLayout>>>,
    pipeline_layouts: PerDevice<Option<vk::PipelineLayout>>,
    device_mask: DeviceMask,
}

impl VulkanPipelineParamInfo {
    /// Builds set layouts on every device in `mask`.
    ///
    /// Fails if any device cannot hold the resulting pipeline layout.
    pub fn new(base: Arc<PipelineParamInfo>, devices: &VulkanDeviceSet, mask: DeviceMask) -> Result<Self> {
        let mut set_bindings = Vec::with_capacity(base.sets().len());
        let mut locations: [Vec<BindingLocation>; ParamType::COUNT] = Default::default();
        for ty in ParamType::ALL {
            locations[ty.index()] = vec![BindingLocation::default(); base.num_elements(ty) as usize];
        }

        for (set_idx, set) in base.sets().iter().enumerate() {
            let mut bindings = Vec::with_capacity(set.num_bindings());
            for (index, slot) in set.slots().iter().enumerate() {
                let stages = utility::shader_stage_flags(slot.stages);
                bindings.push(LayoutBinding {
                    binding: slot.slot,
                    descriptor_type: utility::descriptor_type(slot),
                    count: 1,
                    stages,
                });

                let location = BindingLocation {
                    set: set_idx as u32,
                    index,
                    object_type: slot.object_type,
                    element_type: slot.element_type,
                    stages: utility::shader_to_pipeline_stage(stages),
                };
                locations[slot.ty.index()][slot.sequential_idx as usize] = location;
                if let Some(sampler_idx) = slot.combined_sampler {
                    locations[ParamType::SamplerState.index()][sampler_idx as usize] = location;
                }
            }
            set_bindings.push(bindings);
        }

        let counts = DescriptorCounts::of(&set_bindings);
        let mut info = Self {
            base,
            set_bindings,
            locations,
            devices: Default::default(),
            layouts: Default::default(),
            pipeline_layouts: Default::default(),
            device_mask: mask,
        };

        for device in devices.devices_for(mask) {
            counts.validate(info.base.num_sets(), device.limits())?;

            let idx = device.index();
            let layouts = info
                .set_bindings
                .iter()
                .map(|bindings| device.descriptors().layout(bindings))
                .collect::<Result<Vec<_>>>()?;
            info.pipeline_layouts[idx] = Some(device.descriptors().pipeline_layout(&layouts)?);
            info.layouts[idx] = layouts;
            info.devices[idx] = Some(Arc::clone(device));
        }

        Ok(info)
    }

    #[inline]
    #[must_use]
    pub fn base(&self) -> &Arc<PipelineParamInfo> {
        &self.base
    }

    #[inline]
    #[must_use]
    pub fn device_mask(&self) -> DeviceMask {
        self.device_mask
    }

    #[inline]
    #[must_use]
    pub fn num_sets(&self) -> u32 {
        self.set_bindings.len() as u32
    }

    /// Layout bindings of `set`, sorted by binding slot.
    #[must_use]
    pub fn bindings(&self, set: u32) -> &[LayoutBinding] {
        self.set_bindings.get(set as usize).map_or(&[], Vec::as_slice)
    }

    /// Position of `slot` within [`bindings`](Self::bindings) of `set`.
    #[must_use]
    pub fn binding_index(&self, set: u32, slot: u32) -> Option<usize> {
        self.base.set(set).and_then(|s| s.binding_index(slot))
    }

    /// Location of the `sequential_idx`-th binding of `ty`.
    #[inline]
    #[must_use]
    pub fn location(&self, ty: ParamType, sequential_idx: u32) -> Option<&BindingLocation> {
        self.locations[ty.index()].get(sequential_idx as usize)
    }

    #[must_use]
    pub fn locations(&self, ty: ParamType) -> &[BindingLocation] {
        &self.locations[ty.index()]
    }

    /// Device this layout was created on.
    #[must_use]
    pub fn device(&self, device_idx: usize) -> Option<&Arc<VulkanDevice>> {
        self.devices.get(device_idx).and_then(Option::as_ref)
    }

    /// Devices this layout was created on, ascending by index.
    pub fn devices(&self) -> impl Iterator<Item = &Arc<VulkanDevice>> {
        self.devices.iter().flatten()
    }

    /// Native set layout of `set` on `device_idx`.
    #[must_use]
    pub fn layout(&self, device_idx: usize, set: u32) -> Option<&Arc<DescriptorLayout>> {
        self.layouts.get(device_idx).and_then(|l| l.get(set as usize))
    }

    /// Native pipeline layout on `device_idx`.
    #[must_use]
    pub fn pipeline_layout(&self, device_idx: usize) -> Option<vk::PipelineLayout> {
        self.pipeline_layouts.get(device_idx).copied().flatten()
    }
}
