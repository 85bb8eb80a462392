//! Native descriptor API seam and its `ash` implementation.
//!
//! Everything above this module talks to a [`DescriptorDevice`], so the
//! binding logic can run against a counting mock in tests and against a real
//! `ash::Device` in an application.

use std::fmt::Debug;
use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::descriptor::DescriptorManager;
use super::dummy::DummyResources;
use crate::errors::{Result, RhiError};
use crate::resources::{DeviceMask, MAX_DEVICES, PerDevice};
use crate::settings::{DescriptorPoolSettings, RhiSettings};

// ─── Types ────────────────────────────────────────────────────────────────────

/// One binding of a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

/// Resource written into one descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePayload {
    /// Sampled/storage image, standalone sampler or combined image-sampler.
    Image {
        sampler: vk::Sampler,
        view: vk::ImageView,
        layout: vk::ImageLayout,
    },
    /// Uniform or storage buffer, whole range.
    Buffer { buffer: vk::Buffer },
    /// Uniform or storage texel buffer.
    TexelBuffer { view: vk::BufferView },
}

/// A single descriptor write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub payload: WritePayload,
}

/// Device capabilities that constrain pipeline layouts.
///
/// Descriptor limits are summed over all sets of a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_bound_descriptor_sets: u32,
    pub max_descriptor_set_uniform_buffers: u32,
    pub max_descriptor_set_storage_buffers: u32,
    pub max_descriptor_set_sampled_images: u32,
    pub max_descriptor_set_storage_images: u32,
    pub max_descriptor_set_samplers: u32,
}

impl Default for DeviceLimits {
    /// The minimums every conformant Vulkan implementation guarantees.
    fn default() -> Self {
        Self {
            max_bound_descriptor_sets: 4,
            max_descriptor_set_uniform_buffers: 72,
            max_descriptor_set_storage_buffers: 24,
            max_descriptor_set_sampled_images: 96,
            max_descriptor_set_storage_images: 24,
            max_descriptor_set_samplers: 96,
        }
    }
}

impl From<&vk::PhysicalDeviceLimits> for DeviceLimits {
    fn from(limits: &vk::PhysicalDeviceLimits) -> Self {
        Self {
            max_bound_descriptor_sets: limits.max_bound_descriptor_sets,
            max_descriptor_set_uniform_buffers: limits.max_descriptor_set_uniform_buffers,
            max_descriptor_set_storage_buffers: limits.max_descriptor_set_storage_buffers,
            max_descriptor_set_sampled_images: limits.max_descriptor_set_sampled_images,
            max_descriptor_set_storage_images: limits.max_descriptor_set_storage_images,
            max_descriptor_set_samplers: limits.max_descriptor_set_samplers,
        }
    }
}

/// Native descriptor operations of one device.
pub trait DescriptorDevice: Send + Sync + Debug {
    fn limits(&self) -> DeviceLimits;

    fn create_set_layout(&self, bindings: &[LayoutBinding]) -> Result<vk::DescriptorSetLayout>;

    fn destroy_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_pipeline_layout(&self, set_layouts: &[vk::DescriptorSetLayout]) -> Result<vk::PipelineLayout>;

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    fn allocate_set(&self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet>;

    fn free_set(&self, set: vk::DescriptorSet);

    /// Writes every entry of `writes` into `set` in one batched update.
    fn write_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]);
}

// ─── Ash Implementation ───────────────────────────────────────────────────────

struct PoolState {
    pools: Vec<vk::DescriptorPool>,
    owners: FxHashMap<vk::DescriptorSet, vk::DescriptorPool>,
}

/// [`DescriptorDevice`] on top of an `ash::Device`.
///
/// Pools are created with `FREE_DESCRIPTOR_SET` so individual sets can be
/// returned. When the newest pool runs out a new one is appended.
pub struct AshDescriptorDevice {
    device: ash::Device,
    limits: DeviceLimits,
    pool_settings: DescriptorPoolSettings,
    state: Mutex<PoolState>,
}

impl AshDescriptorDevice {
    pub fn new(device: ash::Device, limits: DeviceLimits, pool_settings: DescriptorPoolSettings) -> Result<Self> {
        let first = Self::create_pool(&device, &pool_settings)?;
        Ok(Self {
            device,
            limits,
            pool_settings,
            state: Mutex::new(PoolState {
                pools: vec![first],
                owners: FxHashMap::default(),
            }),
        })
    }

    fn create_pool(device: &ash::Device, settings: &DescriptorPoolSettings) -> Result<vk::DescriptorPool> {
        let sizes = [
            (vk::DescriptorType::UNIFORM_BUFFER, settings.uniform_buffers),
            (vk::DescriptorType::SAMPLED_IMAGE, settings.sampled_images),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, settings.sampled_images),
            (vk::DescriptorType::STORAGE_IMAGE, settings.storage_images),
            (vk::DescriptorType::SAMPLER, settings.samplers),
            (vk::DescriptorType::UNIFORM_TEXEL_BUFFER, settings.uniform_texel_buffers),
            (vk::DescriptorType::STORAGE_TEXEL_BUFFER, settings.storage_texel_buffers),
            (vk::DescriptorType::STORAGE_BUFFER, settings.storage_buffers),
        ];
        let pool_sizes: SmallVec<[vk::DescriptorPoolSize; 8]> = sizes
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|&(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
            .collect();

        let info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(settings.max_sets);

        let pool = unsafe { device.create_descriptor_pool(&info, None)? };
        Ok(pool)
    }

    #[must_use]
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    #[must_use]
    pub fn num_pools(&self) -> usize {
        self.state.lock().pools.len()
    }
}

impl Debug for AshDescriptorDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AshDescriptorDevice")
            .field("limits", &self.limits)
            .field("pools", &self.num_pools())
            .finish_non_exhaustive()
    }
}

impl DescriptorDevice for AshDescriptorDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_set_layout(&self, bindings: &[LayoutBinding]) -> Result<vk::DescriptorSetLayout> {
        let vk_bindings: SmallVec<[vk::DescriptorSetLayoutBinding; 16]> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(b.count)
                    .stage_flags(b.stages)
            })
            .collect();
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe { self.device.create_descriptor_set_layout(&info, None)? };
        Ok(layout)
    }

    fn destroy_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) };
    }

    fn create_pipeline_layout(&self, set_layouts: &[vk::DescriptorSetLayout]) -> Result<vk::PipelineLayout> {
        let info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);
        let layout = unsafe { self.device.create_pipeline_layout(&info, None)? };
        Ok(layout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) };
    }

    fn allocate_set(&self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        let mut state = self.state.lock();
        let Some(&current) = state.pools.last() else {
            return Err(RhiError::Vulkan(vk::Result::ERROR_INITIALIZATION_FAILED));
        };

        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(current)
            .set_layouts(&layouts);

        let (pool, sets) = match unsafe { self.device.allocate_descriptor_sets(&info) } {
            Ok(sets) => (current, sets),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                let pool = Self::create_pool(&self.device, &self.pool_settings)?;
                state.pools.push(pool);
                log::debug!("Descriptor pool exhausted, created new pool (total: {})", state.pools.len());

                let retry = vk::DescriptorSetAllocateInfo::default()
                    .descriptor_pool(pool)
                    .set_layouts(&layouts);
                (pool, unsafe { self.device.allocate_descriptor_sets(&retry)? })
            }
            Err(err) => return Err(err.into()),
        };

        let set = sets[0];
        state.owners.insert(set, pool);
        Ok(set)
    }

    fn free_set(&self, set: vk::DescriptorSet) {
        let mut state = self.state.lock();
        if let Some(pool) = state.owners.remove(&set) {
            // Freeing only fails on invalid usage; nothing to recover.
            if let Err(err) = unsafe { self.device.free_descriptor_sets(pool, &[set]) } {
                log::warn!("Failed to free descriptor set: {err}");
            }
        }
    }

    fn write_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
        // Payloads are collected first so the write structs can borrow them.
        let mut image_infos: SmallVec<[vk::DescriptorImageInfo; 16]> = SmallVec::new();
        let mut buffer_infos: SmallVec<[vk::DescriptorBufferInfo; 16]> = SmallVec::new();
        let mut texel_views: SmallVec<[vk::BufferView; 16]> = SmallVec::new();

        for write in writes {
            match write.payload {
                WritePayload::Image { sampler, view, layout } => image_infos.push(
                    vk::DescriptorImageInfo::default()
                        .sampler(sampler)
                        .image_view(view)
                        .image_layout(layout),
                ),
                WritePayload::Buffer { buffer } => buffer_infos.push(
                    vk::DescriptorBufferInfo::default()
                        .buffer(buffer)
                        .offset(0)
                        .range(vk::WHOLE_SIZE),
                ),
                WritePayload::TexelBuffer { view } => texel_views.push(view),
            }
        }

        let (mut image_idx, mut buffer_idx, mut texel_idx) = (0, 0, 0);
        let vk_writes: SmallVec<[vk::WriteDescriptorSet; 16]> = writes
            .iter()
            .map(|write| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(write.binding)
                    .dst_array_element(0)
                    .descriptor_type(write.descriptor_type);
                match write.payload {
                    WritePayload::Image { .. } => {
                        image_idx += 1;
                        base.image_info(std::slice::from_ref(&image_infos[image_idx - 1]))
                    }
                    WritePayload::Buffer { .. } => {
                        buffer_idx += 1;
                        base.buffer_info(std::slice::from_ref(&buffer_infos[buffer_idx - 1]))
                    }
                    WritePayload::TexelBuffer { .. } => {
                        texel_idx += 1;
                        base.texel_buffer_view(std::slice::from_ref(&texel_views[texel_idx - 1]))
                    }
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) };
    }
}

impl Drop for AshDescriptorDevice {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for pool in state.pools.drain(..) {
            unsafe { self.device.destroy_descriptor_pool(pool, None) };
        }
        state.owners.clear();
    }
}

// ─── Devices ──────────────────────────────────────────────────────────────────

/// Per-device services of the Vulkan backend.
#[derive(Debug)]
pub struct VulkanDevice {
    index: usize,
    limits: DeviceLimits,
    descriptors: DescriptorManager,
    dummies: DummyResources,
}

impl VulkanDevice {
    #[must_use]
    pub fn new(index: usize, device: Arc<dyn DescriptorDevice>, dummies: DummyResources) -> Self {
        Self {
            index,
            limits: device.limits(),
            descriptors: DescriptorManager::new(device),
            dummies,
        }
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    #[inline]
    #[must_use]
    pub fn descriptors(&self) -> &DescriptorManager {
        &self.descriptors
    }

    #[inline]
    #[must_use]
    pub fn dummies(&self) -> &DummyResources {
        &self.dummies
    }
}

/// All devices the backend renders with, indexed by device slot.
#[derive(Debug, Default)]
pub struct VulkanDeviceSet {
    devices: PerDevice<Option<Arc<VulkanDevice>>>,
    settings: RhiSettings,
}

impl VulkanDeviceSet {
    #[must_use]
    pub fn new(settings: RhiSettings) -> Self {
        Self {
            devices: Default::default(),
            settings,
        }
    }

    /// Registers `device` at its own index, replacing any previous device there.
    pub fn add_device(&mut self, device: VulkanDevice) -> Result<Arc<VulkanDevice>> {
        let index = device.index();
        if index >= MAX_DEVICES {
            return Err(RhiError::DeviceUnavailable(index));
        }
        let device = Arc::new(device);
        self.devices[index] = Some(Arc::clone(&device));
        Ok(device)
    }

    #[must_use]
    pub fn device(&self, index: usize) -> Option<&Arc<VulkanDevice>> {
        self.devices.get(index).and_then(Option::as_ref)
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RhiSettings {
        &self.settings
    }

    /// Devices selected by `mask`. An empty mask uses the configured default.
    ///
    /// Selected slots without a device are logged and skipped.
    pub fn devices_for(&self, mask: DeviceMask) -> impl Iterator<Item = &Arc<VulkanDevice>> {
        let mask = if mask.is_empty() { self.settings.default_device_mask } else { mask };
        mask.indices().filter_map(move |idx| {
            let device = self.device(idx);
            if device.is_none() {
                log::warn!("Device mask selects device {idx}, which is not available");
            }
            device
        })
    }
}
