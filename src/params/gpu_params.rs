//! Resource binding table.
//!
//! [`GpuParams`] holds the resources currently bound to every slot of a
//! pipeline's [`PipelineParamInfo`]. It never owns the resources; it keeps a
//! shared reference so they stay alive while bound. Nothing here talks to the
//! GPU: backends translate the table into native bindings right before a
//! draw or dispatch.
//!
//! Setters addressing a (set, slot) the pipeline does not use log an error and
//! leave the table untouched. Shader variants routinely drop slots, so this is
//! not treated as fatal.

use std::sync::Arc;

use super::desc::{GpuParamBlockDesc, GpuProgramType};
use super::info::{ParamType, PipelineParamInfo};
use crate::resources::{ChangeTracker, GpuBuffer, GpuParamBlockBuffer, Texture, TextureSurface};
use crate::state::CoreSamplerState;

/// A texture slot: the texture plus the sub-resource range it exposes.
#[derive(Debug, Clone)]
pub struct BoundTexture {
    pub texture: Arc<dyn Texture>,
    pub surface: TextureSurface,
}

/// Mutable binding table shaped by a [`PipelineParamInfo`].
#[derive(Debug, Clone)]
pub struct GpuParams {
    info: Arc<PipelineParamInfo>,
    param_blocks: Vec<Option<Arc<dyn GpuParamBlockBuffer>>>,
    textures: Vec<Option<BoundTexture>>,
    load_store_textures: Vec<Option<BoundTexture>>,
    buffers: Vec<Option<Arc<dyn GpuBuffer>>>,
    samplers: Vec<Option<Arc<CoreSamplerState>>>,
    tracker: ChangeTracker,
}

impl GpuParams {
    /// Creates a table with every slot unbound.
    #[must_use]
    pub fn new(info: Arc<PipelineParamInfo>) -> Self {
        let len = |ty| info.num_elements(ty) as usize;
        Self {
            param_blocks: vec![None; len(ParamType::ParamBlock)],
            textures: vec![None; len(ParamType::Texture)],
            load_store_textures: vec![None; len(ParamType::LoadStoreTexture)],
            buffers: vec![None; len(ParamType::Buffer)],
            samplers: vec![None; len(ParamType::SamplerState)],
            tracker: ChangeTracker::new(),
            info,
        }
    }

    #[inline]
    #[must_use]
    pub fn param_info(&self) -> &Arc<PipelineParamInfo> {
        &self.info
    }

    /// Bumped by every successful mutation.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    /// Sequential index for a setter, logging unknown combinations.
    fn resolve(&self, ty: ParamType, set: u32, slot: u32) -> Option<usize> {
        let idx = self.info.sequential_slot(ty, set, slot);
        if idx.is_none() {
            log::error!("Provided set/slot combination is not used by the GPU program ({ty:?}): {set},{slot}");
        }
        idx.map(|i| i as usize)
    }

    fn lookup(&self, ty: ParamType, set: u32, slot: u32) -> Option<usize> {
        self.info.sequential_slot(ty, set, slot).map(|i| i as usize)
    }

    // ========================================================================
    // Setters
    // ========================================================================

    /// Binds a parameter block buffer. Returns false if the slot is unknown.
    pub fn set_param_block_buffer(
        &mut self,
        set: u32,
        slot: u32,
        buffer: Option<Arc<dyn GpuParamBlockBuffer>>,
    ) -> bool {
        let Some(idx) = self.resolve(ParamType::ParamBlock, set, slot) else {
            return false;
        };
        self.param_blocks[idx] = buffer;
        self.tracker.changed();
        true
    }

    /// Binds a sampled texture. [`TextureSurface::COMPLETE`] binds every mip and face.
    pub fn set_texture(
        &mut self,
        set: u32,
        slot: u32,
        texture: Option<Arc<dyn Texture>>,
        surface: TextureSurface,
    ) -> bool {
        let Some(idx) = self.resolve(ParamType::Texture, set, slot) else {
            return false;
        };
        self.textures[idx] = texture.map(|texture| BoundTexture { texture, surface });
        self.tracker.changed();
        true
    }

    /// Binds a texture for random read/write access.
    pub fn set_load_store_texture(
        &mut self,
        set: u32,
        slot: u32,
        texture: Option<Arc<dyn Texture>>,
        surface: TextureSurface,
    ) -> bool {
        let Some(idx) = self.resolve(ParamType::LoadStoreTexture, set, slot) else {
            return false;
        };
        self.load_store_textures[idx] = texture.map(|texture| BoundTexture { texture, surface });
        self.tracker.changed();
        true
    }

    pub fn set_buffer(&mut self, set: u32, slot: u32, buffer: Option<Arc<dyn GpuBuffer>>) -> bool {
        let Some(idx) = self.resolve(ParamType::Buffer, set, slot) else {
            return false;
        };
        self.buffers[idx] = buffer;
        self.tracker.changed();
        true
    }

    pub fn set_sampler_state(&mut self, set: u32, slot: u32, sampler: Option<Arc<CoreSamplerState>>) -> bool {
        let Some(idx) = self.resolve(ParamType::SamplerState, set, slot) else {
            return false;
        };
        self.samplers[idx] = sampler;
        self.tracker.changed();
        true
    }

    // ========================================================================
    // Getters
    // ========================================================================

    #[must_use]
    pub fn param_block_buffer(&self, set: u32, slot: u32) -> Option<&Arc<dyn GpuParamBlockBuffer>> {
        let idx = self.lookup(ParamType::ParamBlock, set, slot)?;
        self.param_blocks[idx].as_ref()
    }

    #[must_use]
    pub fn texture(&self, set: u32, slot: u32) -> Option<&Arc<dyn Texture>> {
        let idx = self.lookup(ParamType::Texture, set, slot)?;
        self.textures[idx].as_ref().map(|b| &b.texture)
    }

    /// Surface bound at a texture slot. `COMPLETE` for unknown or empty slots.
    #[must_use]
    pub fn texture_surface(&self, set: u32, slot: u32) -> TextureSurface {
        self.lookup(ParamType::Texture, set, slot)
            .and_then(|idx| self.textures[idx].as_ref())
            .map_or(TextureSurface::COMPLETE, |b| b.surface)
    }

    #[must_use]
    pub fn load_store_texture(&self, set: u32, slot: u32) -> Option<&Arc<dyn Texture>> {
        let idx = self.lookup(ParamType::LoadStoreTexture, set, slot)?;
        self.load_store_textures[idx].as_ref().map(|b| &b.texture)
    }

    #[must_use]
    pub fn load_store_surface(&self, set: u32, slot: u32) -> TextureSurface {
        self.lookup(ParamType::LoadStoreTexture, set, slot)
            .and_then(|idx| self.load_store_textures[idx].as_ref())
            .map_or(TextureSurface::COMPLETE, |b| b.surface)
    }

    #[must_use]
    pub fn buffer(&self, set: u32, slot: u32) -> Option<&Arc<dyn GpuBuffer>> {
        let idx = self.lookup(ParamType::Buffer, set, slot)?;
        self.buffers[idx].as_ref()
    }

    #[must_use]
    pub fn sampler_state(&self, set: u32, slot: u32) -> Option<&Arc<CoreSamplerState>> {
        let idx = self.lookup(ParamType::SamplerState, set, slot)?;
        self.samplers[idx].as_ref()
    }

    // ---- By sequential index, for backends ----

    #[inline]
    #[must_use]
    pub fn param_block_buffer_at(&self, idx: u32) -> Option<&Arc<dyn GpuParamBlockBuffer>> {
        self.param_blocks.get(idx as usize)?.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn texture_at(&self, idx: u32) -> Option<&BoundTexture> {
        self.textures.get(idx as usize)?.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn load_store_texture_at(&self, idx: u32) -> Option<&BoundTexture> {
        self.load_store_textures.get(idx as usize)?.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn buffer_at(&self, idx: u32) -> Option<&Arc<dyn GpuBuffer>> {
        self.buffers.get(idx as usize)?.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn sampler_state_at(&self, idx: u32) -> Option<&Arc<CoreSamplerState>> {
        self.samplers.get(idx as usize)?.as_ref()
    }

    // ========================================================================
    // Named access
    // ========================================================================

    /// Binds `buffer` to every stage that declares a parameter block called `name`.
    pub fn set_param_block_buffer_by_name(&mut self, name: &str, buffer: &Arc<dyn GpuParamBlockBuffer>) -> bool {
        let targets: Vec<(u32, u32)> = self
            .info
            .param_descs()
            .filter_map(|(_, desc)| desc.param_block(name).map(|b| (b.set, b.slot)))
            .collect();

        if targets.is_empty() {
            log::warn!("Cannot find parameter block with the name: '{name}'");
            return false;
        }
        for (set, slot) in targets {
            self.set_param_block_buffer(set, slot, Some(Arc::clone(buffer)));
        }
        true
    }

    pub fn set_texture_by_name(
        &mut self,
        stage: GpuProgramType,
        name: &str,
        texture: Option<Arc<dyn Texture>>,
        surface: TextureSurface,
    ) -> bool {
        let found = self.info.param_desc(stage).and_then(|d| d.texture(name)).map(|t| (t.set, t.slot));
        let Some((set, slot)) = found else {
            log::warn!("Cannot find texture parameter '{name}' in {stage:?} stage");
            return false;
        };
        self.set_texture(set, slot, texture, surface)
    }

    pub fn set_load_store_texture_by_name(
        &mut self,
        stage: GpuProgramType,
        name: &str,
        texture: Option<Arc<dyn Texture>>,
        surface: TextureSurface,
    ) -> bool {
        let found = self
            .info
            .param_desc(stage)
            .and_then(|d| d.load_store_texture(name))
            .map(|t| (t.set, t.slot));
        let Some((set, slot)) = found else {
            log::warn!("Cannot find load-store texture parameter '{name}' in {stage:?} stage");
            return false;
        };
        self.set_load_store_texture(set, slot, texture, surface)
    }

    pub fn set_buffer_by_name(&mut self, stage: GpuProgramType, name: &str, buffer: Option<Arc<dyn GpuBuffer>>) -> bool {
        let found = self.info.param_desc(stage).and_then(|d| d.buffer(name)).map(|b| (b.set, b.slot));
        let Some((set, slot)) = found else {
            log::warn!("Cannot find buffer parameter '{name}' in {stage:?} stage");
            return false;
        };
        self.set_buffer(set, slot, buffer)
    }

    pub fn set_sampler_state_by_name(
        &mut self,
        stage: GpuProgramType,
        name: &str,
        sampler: Option<Arc<CoreSamplerState>>,
    ) -> bool {
        let found = self.info.param_desc(stage).and_then(|d| d.sampler(name)).map(|s| (s.set, s.slot));
        let Some((set, slot)) = found else {
            log::warn!("Cannot find sampler state parameter '{name}' in {stage:?} stage");
            return false;
        };
        self.set_sampler_state(set, slot, sampler)
    }

    #[must_use]
    pub fn has_param(&self, stage: GpuProgramType, name: &str) -> bool {
        self.info.param_desc(stage).is_some_and(|d| d.param(name).is_some())
    }

    #[must_use]
    pub fn has_texture(&self, stage: GpuProgramType, name: &str) -> bool {
        self.info.param_desc(stage).is_some_and(|d| d.texture(name).is_some())
    }

    #[must_use]
    pub fn has_load_store_texture(&self, stage: GpuProgramType, name: &str) -> bool {
        self.info.param_desc(stage).is_some_and(|d| d.load_store_texture(name).is_some())
    }

    #[must_use]
    pub fn has_buffer(&self, stage: GpuProgramType, name: &str) -> bool {
        self.info.param_desc(stage).is_some_and(|d| d.buffer(name).is_some())
    }

    #[must_use]
    pub fn has_sampler_state(&self, stage: GpuProgramType, name: &str) -> bool {
        self.info.param_desc(stage).is_some_and(|d| d.sampler(name).is_some())
    }

    #[must_use]
    pub fn has_param_block(&self, stage: GpuProgramType, name: &str) -> bool {
        self.info.param_desc(stage).is_some_and(|d| d.param_block(name).is_some())
    }

    /// Description of the parameter block `name`, searched across all stages.
    #[must_use]
    pub fn param_block_desc(&self, name: &str) -> Option<&GpuParamBlockDesc> {
        self.info.param_descs().find_map(|(_, desc)| desc.param_block(name))
    }
}
