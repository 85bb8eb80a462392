//! Vulkan binding table.
//!
//! [`VulkanGpuParams`] wraps a [`GpuParams`] and keeps, per device, the
//! descriptor writes of every set together with the native handles they were
//! last written with. Right before a draw or dispatch,
//! [`prepare_for_bind`](VulkanGpuParams::prepare_for_bind) registers every
//! bound resource with the command recorder, rewrites only the sets whose
//! contents changed, and returns one descriptor set handle per set index.
//!
//! Rewritten sets never touch a descriptor set the GPU may still be reading:
//! each set index owns a ring of physical sets and a bound one is skipped in
//! favor of a free one, or a freshly allocated one.

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::command::{BufferUse, VulkanCommandRecorder};
use super::descriptor::DescriptorSet;
use super::device::{DescriptorWrite, VulkanDevice, WritePayload};
use super::dummy::DummyResources;
use super::param_info::{BindingLocation, VulkanPipelineParamInfo};
use super::utility::{self, to_vk, to_vk_or_null};
use crate::errors::{Result, RhiError};
use crate::params::{BoundTexture, GpuBufferFormat, GpuParamObjectType, GpuParams, GpuProgramType, ParamType};
use crate::resources::{
    AccessFlags, BufferUsage, GpuBuffer, GpuParamBlockBuffer, NativeHandle, PerDevice, Texture, TextureSurface,
    TextureUsage,
};
use crate::settings::RhiSettings;
use crate::state::CoreSamplerState;

// ─── Per-device Data ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct PerSetData {
    ring: Vec<Arc<DescriptorSet>>,
    latest: usize,
    writes: Vec<DescriptorWrite>,
    dirty: bool,
}

/// Descriptor state of one device. Handle vectors are indexed by sequential
/// index and hold what the latest descriptor writes reference.
#[derive(Debug)]
struct PerDeviceData {
    device: Arc<VulkanDevice>,
    sets: Vec<PerSetData>,
    uniform_buffers: Vec<vk::Buffer>,
    sampled_images: Vec<vk::Image>,
    storage_images: Vec<vk::Image>,
    buffers: Vec<vk::Buffer>,
    samplers: Vec<vk::Sampler>,
}

impl PerDeviceData {
    fn new(device: Arc<VulkanDevice>, info: &VulkanPipelineParamInfo, ring_size: usize) -> Result<Self> {
        let idx = device.index();
        let dummies = device.dummies();

        let mut sets = Vec::with_capacity(info.num_sets() as usize);
        for set in 0..info.num_sets() {
            let layout = info.layout(idx, set).ok_or(RhiError::DeviceUnavailable(idx))?;
            let ring = (0..ring_size)
                .map(|_| device.descriptors().create_set(layout))
                .collect::<Result<Vec<_>>>()?;

            let slots = info.base().set(set).map(|s| s.slots()).unwrap_or_default();
            let writes = info
                .bindings(set)
                .iter()
                .zip(slots)
                .map(|(binding, slot)| DescriptorWrite {
                    binding: binding.binding,
                    descriptor_type: binding.descriptor_type,
                    payload: dummy_payload(dummies, idx, binding.descriptor_type, slot.object_type),
                })
                .collect();

            sets.push(PerSetData {
                ring,
                latest: 0,
                writes,
                dirty: true,
            });
        }

        let dummy_block = to_vk_or_null(dummies.param_block.buffer(idx));
        let dummy_image = |loc: &BindingLocation| to_vk_or_null(dummies.texture(loc.object_type).image(idx));
        let dummy_buffer = |loc: &BindingLocation| to_vk_or_null(dummies.buffer(loc.object_type).buffer(idx));
        let dummy_sampler = sampler_handle(&dummies.sampler, idx).unwrap_or_default();

        let base = info.base();
        Ok(Self {
            uniform_buffers: vec![dummy_block; base.num_elements(ParamType::ParamBlock) as usize],
            sampled_images: info.locations(ParamType::Texture).iter().map(dummy_image).collect(),
            storage_images: info.locations(ParamType::LoadStoreTexture).iter().map(dummy_image).collect(),
            buffers: info.locations(ParamType::Buffer).iter().map(dummy_buffer).collect(),
            samplers: vec![dummy_sampler; base.num_elements(ParamType::SamplerState) as usize],
            sets,
            device,
        })
    }

    fn mark(&mut self, loc: &BindingLocation) -> &mut DescriptorWrite {
        let set = &mut self.sets[loc.set as usize];
        set.dirty = true;
        &mut set.writes[loc.index]
    }
}

// ─── Resolution ───────────────────────────────────────────────────────────────

/// Payload written into a slot before anything is bound to it.
fn dummy_payload(
    dummies: &DummyResources,
    device_idx: usize,
    ty: vk::DescriptorType,
    object_type: Option<GpuParamObjectType>,
) -> WritePayload {
    let dummy_view = || to_vk_or_null(dummies.texture(object_type).view(device_idx, &TextureSurface::COMPLETE));
    let dummy_sampler = || sampler_handle(&dummies.sampler, device_idx).unwrap_or_default();

    match ty {
        vk::DescriptorType::UNIFORM_BUFFER => WritePayload::Buffer {
            buffer: to_vk_or_null(dummies.param_block.buffer(device_idx)),
        },
        vk::DescriptorType::STORAGE_BUFFER => WritePayload::Buffer {
            buffer: to_vk_or_null(dummies.structured_buffer.buffer(device_idx)),
        },
        vk::DescriptorType::UNIFORM_TEXEL_BUFFER | vk::DescriptorType::STORAGE_TEXEL_BUFFER => {
            WritePayload::TexelBuffer {
                view: to_vk_or_null(dummies.buffer(object_type).view(device_idx)),
            }
        }
        vk::DescriptorType::SAMPLED_IMAGE => WritePayload::Image {
            sampler: vk::Sampler::null(),
            view: dummy_view(),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        },
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER => WritePayload::Image {
            sampler: dummy_sampler(),
            view: dummy_view(),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        },
        vk::DescriptorType::STORAGE_IMAGE => WritePayload::Image {
            sampler: vk::Sampler::null(),
            view: dummy_view(),
            layout: vk::ImageLayout::GENERAL,
        },
        _ => WritePayload::Image {
            sampler: dummy_sampler(),
            view: vk::ImageView::null(),
            layout: vk::ImageLayout::UNDEFINED,
        },
    }
}

fn sampler_handle(state: &CoreSamplerState, device_idx: usize) -> Option<vk::Sampler> {
    state
        .native()
        .get(device_idx)
        .filter(|h| !h.is_null())
        .map(to_vk)
}

#[derive(Debug, Clone, Copy)]
struct ResolvedImage {
    image: vk::Image,
    view: vk::ImageView,
    range: vk::ImageSubresourceRange,
    layout: vk::ImageLayout,
}

/// Image to bind at a texture slot: the bound texture, or the dummy if the
/// slot is empty or the texture has no image or view on the device.
fn resolve_image(
    bound: Option<&BoundTexture>,
    dummies: &DummyResources,
    loc: &BindingLocation,
    device_idx: usize,
    load_store: bool,
) -> Option<ResolvedImage> {
    if let Some(bound) = bound
        && let Some(image) = bound.texture.image(device_idx)
        && let Some(view) = live_handle(bound.texture.view(device_idx, &bound.surface))
    {
        let props = bound.texture.properties();
        // Dynamic textures stay in GENERAL so the CPU can map them.
        let layout = if load_store || props.usage.contains(TextureUsage::DYNAMIC) {
            vk::ImageLayout::GENERAL
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        };
        return Some(ResolvedImage {
            image: to_vk(image),
            view: to_vk(view),
            range: utility::subresource_range(&bound.surface.resolve(props), props.usage),
            layout,
        });
    }

    let dummy = dummies.texture(loc.object_type);
    let image = dummy.image(device_idx)?;
    let props = dummy.properties();
    Some(ResolvedImage {
        image: to_vk(image),
        view: to_vk_or_null(dummy.view(device_idx, &TextureSurface::COMPLETE)),
        range: utility::subresource_range(&TextureSurface::COMPLETE.resolve(props), props.usage),
        layout: if load_store {
            vk::ImageLayout::GENERAL
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        },
    })
}

#[derive(Debug, Clone, Copy)]
struct ResolvedBuffer {
    buffer: vk::Buffer,
    payload: WritePayload,
    access: AccessFlags,
}

fn resolve_buffer(
    bound: Option<&Arc<dyn GpuBuffer>>,
    dummies: &DummyResources,
    loc: &BindingLocation,
    device_idx: usize,
) -> Option<ResolvedBuffer> {
    let declared = loc.object_type;
    let structured = declared.is_some_and(GpuParamObjectType::is_structured_buffer);
    let writable = declared.is_some_and(|t| t.is_writable_buffer() || t.is_structured_buffer());

    let usable = |buffer: &&Arc<dyn GpuBuffer>| {
        buffer.buffer(device_idx).is_some()
            && (structured
                || (live_handle(buffer.view(device_idx)).is_some()
                    && texel_format_matches(buffer.properties().format, loc.element_type)))
    };
    let source = match bound.filter(usable) {
        Some(buffer) => buffer,
        None => dummies.buffer(declared),
    };

    let mut access = AccessFlags::READ;
    if writable || source.properties().usage.contains(BufferUsage::LOAD_STORE) {
        access |= AccessFlags::WRITE;
    }

    let buffer: vk::Buffer = to_vk(source.buffer(device_idx)?);
    let payload = if structured {
        WritePayload::Buffer { buffer }
    } else {
        WritePayload::TexelBuffer {
            view: to_vk_or_null(source.view(device_idx)),
        }
    };
    Some(ResolvedBuffer { buffer, payload, access })
}

/// A texel view reinterprets the buffer in its own format, which must be the
/// format the shader declared. `Unknown` accepts any format.
fn texel_format_matches(buffer: GpuBufferFormat, declared: GpuBufferFormat) -> bool {
    declared == GpuBufferFormat::Unknown || utility::buffer_format(buffer) == utility::buffer_format(declared)
}

fn live_handle(handle: Option<NativeHandle>) -> Option<NativeHandle> {
    handle.filter(|h| !h.is_null())
}

fn set_image(write: &mut DescriptorWrite, new_view: vk::ImageView, new_layout: vk::ImageLayout) {
    if let WritePayload::Image { view, layout, .. } = &mut write.payload {
        *view = new_view;
        *layout = new_layout;
    }
}

fn set_sampler(write: &mut DescriptorWrite, new_sampler: vk::Sampler) {
    if let WritePayload::Image { sampler, .. } = &mut write.payload {
        *sampler = new_sampler;
    }
}

// ─── VulkanGpuParams ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct Inner {
    params: GpuParams,
    devices: PerDevice<Option<PerDeviceData>>,
}

/// Binding table with per-device descriptor sets.
///
/// All methods take `&self`; a single lock serializes setters against
/// [`prepare_for_bind`](Self::prepare_for_bind).
#[derive(Debug)]
pub struct VulkanGpuParams {
    info: Arc<VulkanPipelineParamInfo>,
    inner: Mutex<Inner>,
}

impl VulkanGpuParams {
    /// Creates a table with every slot bound to a dummy resource, and
    /// preallocates `initial_sets_per_ring` physical sets per set index.
    pub fn new(info: Arc<VulkanPipelineParamInfo>, settings: &RhiSettings) -> Result<Self> {
        let mut devices: PerDevice<Option<PerDeviceData>> = Default::default();
        for device in info.devices() {
            let data = PerDeviceData::new(Arc::clone(device), &info, settings.initial_ring_size())?;
            devices[device.index()] = Some(data);
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                params: GpuParams::new(Arc::clone(info.base())),
                devices,
            }),
            info,
        })
    }

    #[inline]
    #[must_use]
    pub fn param_info(&self) -> &Arc<VulkanPipelineParamInfo> {
        &self.info
    }

    /// Runs `f` with read access to the generic binding table.
    pub fn with_params<T>(&self, f: impl FnOnce(&GpuParams) -> T) -> T {
        f(&self.inner.lock().params)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.lock().params.version()
    }

    /// Physical descriptor sets currently owned by set index `set` on a device.
    #[must_use]
    pub fn num_allocated_sets(&self, device_idx: usize, set: u32) -> usize {
        let inner = self.inner.lock();
        inner
            .devices
            .get(device_idx)
            .and_then(Option::as_ref)
            .and_then(|d| d.sets.get(set as usize))
            .map_or(0, |s| s.ring.len())
    }

    fn locate(&self, ty: ParamType, set: u32, slot: u32) -> Option<(u32, BindingLocation)> {
        let seq = self.info.base().sequential_slot(ty, set, slot)?;
        self.info.location(ty, seq).map(|loc| (seq, *loc))
    }

    // ========================================================================
    // Setters
    // ========================================================================

    pub fn set_param_block_buffer(&self, set: u32, slot: u32, buffer: Option<Arc<dyn GpuParamBlockBuffer>>) {
        let mut guard = self.inner.lock();
        let Inner { params, devices } = &mut *guard;
        if !params.set_param_block_buffer(set, slot, buffer) {
            return;
        }
        let Some((seq, loc)) = self.locate(ParamType::ParamBlock, set, slot) else {
            return;
        };

        let bound = params.param_block_buffer_at(seq);
        for data in devices.iter_mut().flatten() {
            let idx = data.device.index();
            let handle = bound
                .and_then(|b| b.buffer(idx))
                .or_else(|| data.device.dummies().param_block.buffer(idx));
            let Some(handle) = handle else { continue };

            let buffer = to_vk(handle);
            data.uniform_buffers[seq as usize] = buffer;
            data.mark(&loc).payload = WritePayload::Buffer { buffer };
        }
    }

    pub fn set_texture(&self, set: u32, slot: u32, texture: Option<Arc<dyn Texture>>, surface: TextureSurface) {
        self.set_image_slot(ParamType::Texture, set, slot, texture, surface);
    }

    pub fn set_load_store_texture(
        &self,
        set: u32,
        slot: u32,
        texture: Option<Arc<dyn Texture>>,
        surface: TextureSurface,
    ) {
        self.set_image_slot(ParamType::LoadStoreTexture, set, slot, texture, surface);
    }

    fn set_image_slot(
        &self,
        ty: ParamType,
        set: u32,
        slot: u32,
        texture: Option<Arc<dyn Texture>>,
        surface: TextureSurface,
    ) {
        let load_store = ty == ParamType::LoadStoreTexture;
        let mut guard = self.inner.lock();
        let Inner { params, devices } = &mut *guard;
        let accepted = if load_store {
            params.set_load_store_texture(set, slot, texture, surface)
        } else {
            params.set_texture(set, slot, texture, surface)
        };
        if !accepted {
            return;
        }
        let Some((seq, loc)) = self.locate(ty, set, slot) else {
            return;
        };

        let bound = if load_store {
            params.load_store_texture_at(seq)
        } else {
            params.texture_at(seq)
        };
        for data in devices.iter_mut().flatten() {
            let device = Arc::clone(&data.device);
            let Some(resolved) = resolve_image(bound, device.dummies(), &loc, device.index(), load_store) else {
                continue;
            };
            if load_store {
                data.storage_images[seq as usize] = resolved.image;
            } else {
                data.sampled_images[seq as usize] = resolved.image;
            }
            set_image(data.mark(&loc), resolved.view, resolved.layout);
        }
    }

    pub fn set_buffer(&self, set: u32, slot: u32, buffer: Option<Arc<dyn GpuBuffer>>) {
        let mut guard = self.inner.lock();
        let Inner { params, devices } = &mut *guard;
        if !params.set_buffer(set, slot, buffer) {
            return;
        }
        let Some((seq, loc)) = self.locate(ParamType::Buffer, set, slot) else {
            return;
        };

        let bound = params.buffer_at(seq);
        for data in devices.iter_mut().flatten() {
            let device = Arc::clone(&data.device);
            let Some(resolved) = resolve_buffer(bound, device.dummies(), &loc, device.index()) else {
                continue;
            };
            data.buffers[seq as usize] = resolved.buffer;
            data.mark(&loc).payload = resolved.payload;
        }
    }

    pub fn set_sampler_state(&self, set: u32, slot: u32, sampler: Option<Arc<CoreSamplerState>>) {
        let mut guard = self.inner.lock();
        let Inner { params, devices } = &mut *guard;
        if !params.set_sampler_state(set, slot, sampler) {
            return;
        }
        let Some((seq, loc)) = self.locate(ParamType::SamplerState, set, slot) else {
            return;
        };

        let bound = params.sampler_state_at(seq);
        for data in devices.iter_mut().flatten() {
            let idx = data.device.index();
            let handle = bound
                .and_then(|s| sampler_handle(s, idx))
                .or_else(|| sampler_handle(&data.device.dummies().sampler, idx));
            let Some(handle) = handle else { continue };

            data.samplers[seq as usize] = handle;
            set_sampler(data.mark(&loc), handle);
        }
    }

    /// Binds `buffer` to every stage declaring a parameter block called `name`.
    pub fn set_param_block_buffer_by_name(&self, name: &str, buffer: &Arc<dyn GpuParamBlockBuffer>) {
        let mut found = false;
        for (_, desc) in self.info.base().param_descs() {
            if let Some(block) = desc.param_block(name) {
                self.set_param_block_buffer(block.set, block.slot, Some(Arc::clone(buffer)));
                found = true;
            }
        }
        if !found {
            log::warn!("Cannot find parameter block with the name: '{name}'");
        }
    }

    pub fn set_texture_by_name(&self, stage: GpuProgramType, name: &str, texture: Option<Arc<dyn Texture>>) {
        let desc = self.info.base().param_desc(stage).and_then(|d| d.texture(name));
        match desc {
            Some(t) => self.set_texture(t.set, t.slot, texture, TextureSurface::COMPLETE),
            None => log::warn!("Cannot find texture with the name: '{name}'"),
        }
    }

    pub fn set_sampler_state_by_name(&self, stage: GpuProgramType, name: &str, sampler: Option<Arc<CoreSamplerState>>) {
        let desc = self.info.base().param_desc(stage).and_then(|d| d.sampler(name));
        match desc {
            Some(s) => self.set_sampler_state(s.set, s.slot, sampler),
            None => log::warn!("Cannot find sampler state with the name: '{name}'"),
        }
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// Prepares the descriptor sets for a draw or dispatch on the recorder's
    /// device and writes one handle per set index into `out`.
    ///
    /// Every bound resource (or its dummy) is registered with `recorder`,
    /// along with every returned descriptor set. The recorder must call
    /// [`DescriptorSet::notify_done`] on each registered set once its command
    /// buffer finishes executing.
    pub fn prepare_for_bind<R: VulkanCommandRecorder + ?Sized>(
        &self,
        recorder: &mut R,
        out: &mut SmallVec<[vk::DescriptorSet; 8]>,
    ) -> Result<()> {
        out.clear();
        let idx = recorder.device_index();

        let mut guard = self.inner.lock();
        let Inner { params, devices } = &mut *guard;
        let Some(data) = devices.get_mut(idx).and_then(Option::as_mut) else {
            log::error!("GPU params were not created on device {idx}, nothing to bind");
            return Ok(());
        };
        let device = Arc::clone(&data.device);
        let dummies = device.dummies();
        let info = &*self.info;

        // Handles are compared against what the latest writes reference, since
        // resources may swap their native object (e.g. dynamic buffers on discard).
        for (seq, loc) in info.locations(ParamType::ParamBlock).iter().enumerate() {
            let handle = params
                .param_block_buffer_at(seq as u32)
                .and_then(|b| b.buffer(idx))
                .or_else(|| dummies.param_block.buffer(idx));
            let Some(handle) = handle else { continue };

            let buffer: vk::Buffer = to_vk(handle);
            recorder.register_buffer(buffer, BufferUse::Parameter, AccessFlags::READ, loc.stages);
            if data.uniform_buffers[seq] != buffer {
                data.uniform_buffers[seq] = buffer;
                data.mark(loc).payload = WritePayload::Buffer { buffer };
            }
        }

        for (seq, loc) in info.locations(ParamType::Buffer).iter().enumerate() {
            let Some(resolved) = resolve_buffer(params.buffer_at(seq as u32), dummies, loc, idx) else {
                continue;
            };
            recorder.register_buffer(resolved.buffer, BufferUse::Generic, resolved.access, loc.stages);
            if data.buffers[seq] != resolved.buffer {
                data.buffers[seq] = resolved.buffer;
                data.mark(loc).payload = resolved.payload;
            }
        }

        for (seq, loc) in info.locations(ParamType::SamplerState).iter().enumerate() {
            let Some(sampler) = params
                .sampler_state_at(seq as u32)
                .and_then(|s| sampler_handle(s, idx))
            else {
                continue;
            };
            recorder.register_sampler(sampler);
            if data.samplers[seq] != sampler {
                data.samplers[seq] = sampler;
                set_sampler(data.mark(loc), sampler);
            }
        }

        for (seq, loc) in info.locations(ParamType::LoadStoreTexture).iter().enumerate() {
            let bound = params.load_store_texture_at(seq as u32);
            let Some(resolved) = resolve_image(bound, dummies, loc, idx, true) else {
                continue;
            };
            recorder.register_image(
                resolved.image,
                resolved.range,
                vk::ImageLayout::GENERAL,
                AccessFlags::READ | AccessFlags::WRITE,
                loc.stages,
            );
            if data.storage_images[seq] != resolved.image {
                data.storage_images[seq] = resolved.image;
                set_image(data.mark(loc), resolved.view, vk::ImageLayout::GENERAL);
            }
        }

        for (seq, loc) in info.locations(ParamType::Texture).iter().enumerate() {
            let bound = params.texture_at(seq as u32);
            let Some(resolved) = resolve_image(bound, dummies, loc, idx, false) else {
                continue;
            };
            recorder.register_image(resolved.image, resolved.range, resolved.layout, AccessFlags::READ, loc.stages);

            // May differ from the requested layout if the image is also a framebuffer attachment.
            let layout = recorder.current_layout(resolved.image, &resolved.range, resolved.layout);

            if data.sampled_images[seq] != resolved.image {
                data.sampled_images[seq] = resolved.image;
                set_image(data.mark(loc), resolved.view, layout);
            }

            let write = &data.sets[loc.set as usize].writes[loc.index];
            if matches!(write.payload, WritePayload::Image { layout: current, .. } if current != layout) {
                let write = data.mark(loc);
                if let WritePayload::Image { layout: current, .. } = &mut write.payload {
                    *current = layout;
                }
            }
        }

        for (set_idx, set) in data.sets.iter_mut().enumerate() {
            if !set.dirty {
                continue;
            }

            if set.ring[set.latest].is_bound() {
                if let Some(free) = set.ring.iter().position(|s| !s.is_bound()) {
                    set.latest = free;
                } else {
                    let layout = info
                        .layout(idx, set_idx as u32)
                        .ok_or(RhiError::DeviceUnavailable(idx))?;
                    set.ring.push(device.descriptors().create_set(layout)?);
                    set.latest = set.ring.len() - 1;
                    log::debug!(
                        "All descriptor sets for set {set_idx} in use, allocated another ({} total)",
                        set.ring.len()
                    );
                }
            }

            if !set.writes.is_empty() {
                set.ring[set.latest].write(&set.writes);
            }
            set.dirty = false;
        }

        for set in &data.sets {
            let current = &set.ring[set.latest];
            current.notify_bound();
            recorder.register_descriptor_set(Arc::clone(current));
            out.push(current.handle());
        }

        Ok(())
    }
}
