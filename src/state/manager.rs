//! State Managers
//!
//! Factories and caches for immutable state objects. There are two fully
//! independent managers:
//!
//! - [`StateManager`] lives with the simulation side and hands out
//!   [`SimState`] objects. Creation never fails.
//! - [`CoreStateManager`] lives with the render thread, owns the
//!   [`NativeStateFactory`] and hands out [`CoreState`] objects together with
//!   any native objects they need (samplers).
//!
//! Both guarantee at most one live object per distinct descriptor. Neither is
//! a global: construct them at renderer start-up and pass them around.

use std::convert::Infallible;
use std::sync::Arc;

use super::cache::{CacheStats, StateSlot};
use super::desc::{BlendDesc, DepthStencilDesc, RasterizerDesc, SamplerDesc};
use super::object::{CoreState, SimState, StateDesc};
use crate::errors::Result;
use crate::resources::{DeviceMask, NativeHandle};

// ─── Native Factory ───────────────────────────────────────────────────────────

/// Creates and destroys the native objects backing core state objects.
///
/// Blend, rasterizer and depth-stencil state are folded into native pipeline
/// objects by the backend, so only samplers have standalone native objects.
pub trait NativeStateFactory: Send + Sync {
    fn create_sampler(&self, desc: &SamplerDesc, device_idx: usize) -> Result<NativeHandle>;

    fn destroy_sampler(&self, device_idx: usize, handle: NativeHandle);
}

/// Factory for running without a GPU. Every sampler is the null handle.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessStateFactory;

impl NativeStateFactory for HeadlessStateFactory {
    fn create_sampler(&self, _desc: &SamplerDesc, _device_idx: usize) -> Result<NativeHandle> {
        Ok(NativeHandle::NULL)
    }

    fn destroy_sampler(&self, _device_idx: usize, _handle: NativeHandle) {}
}

/// Creation counters and cache occupancy for every state kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateStats {
    pub blend: CacheStats,
    pub rasterizer: CacheStats,
    pub depth_stencil: CacheStats,
    pub sampler: CacheStats,
}

impl StateStats {
    /// Live objects across all kinds.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.blend.live + self.rasterizer.live + self.depth_stencil.live + self.sampler.live
    }
}

// ─── Sim Thread Manager ───────────────────────────────────────────────────────

/// Sim-thread state factory.
#[derive(Default)]
pub struct StateManager {
    pub(crate) blend: StateSlot<BlendDesc, SimState<BlendDesc>>,
    pub(crate) rasterizer: StateSlot<RasterizerDesc, SimState<RasterizerDesc>>,
    pub(crate) depth_stencil: StateSlot<DepthStencilDesc, SimState<DepthStencilDesc>>,
    pub(crate) sampler: StateSlot<SamplerDesc, SimState<SamplerDesc>>,
}

impl StateManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live state for `desc`, creating it if needed.
    pub fn create<D: StateDesc>(&self, desc: &D) -> Arc<SimState<D>> {
        let slot = D::sim_slot(self);
        let Ok(state) = slot.cache.get_or_create::<Infallible>(desc, |id, owner| {
            log::trace!("Created sim {} state #{}", D::KIND, id.index());
            Ok(SimState::new(desc.clone(), id, owner))
        });
        state
    }

    /// State built from `D::default()`, kept alive as long as the manager.
    pub fn default_state<D: StateDesc>(&self) -> Arc<SimState<D>> {
        let slot = D::sim_slot(self);
        Arc::clone(slot.default.get_or_init(|| self.create(&D::default())))
    }

    pub fn create_blend_state(&self, desc: &BlendDesc) -> Arc<SimState<BlendDesc>> {
        self.create(desc)
    }

    pub fn create_rasterizer_state(&self, desc: &RasterizerDesc) -> Arc<SimState<RasterizerDesc>> {
        self.create(desc)
    }

    pub fn create_depth_stencil_state(&self, desc: &DepthStencilDesc) -> Arc<SimState<DepthStencilDesc>> {
        self.create(desc)
    }

    pub fn create_sampler_state(&self, desc: &SamplerDesc) -> Arc<SimState<SamplerDesc>> {
        self.create(desc)
    }

    pub fn default_blend_state(&self) -> Arc<SimState<BlendDesc>> {
        self.default_state()
    }

    pub fn default_rasterizer_state(&self) -> Arc<SimState<RasterizerDesc>> {
        self.default_state()
    }

    pub fn default_depth_stencil_state(&self) -> Arc<SimState<DepthStencilDesc>> {
        self.default_state()
    }

    pub fn default_sampler_state(&self) -> Arc<SimState<SamplerDesc>> {
        self.default_state()
    }

    #[must_use]
    pub fn stats(&self) -> StateStats {
        StateStats {
            blend: self.blend.cache.stats(),
            rasterizer: self.rasterizer.cache.stats(),
            depth_stencil: self.depth_stencil.cache.stats(),
            sampler: self.sampler.cache.stats(),
        }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.stats().live_count()
    }

    /// Makes the IDs of destroyed states reusable. Returns how many were freed.
    pub fn reclaim_ids(&self) -> usize {
        self.blend.cache.reclaim_ids()
            + self.rasterizer.cache.reclaim_ids()
            + self.depth_stencil.cache.reclaim_ids()
            + self.sampler.cache.reclaim_ids()
    }
}

// ─── Core Thread Manager ──────────────────────────────────────────────────────

/// Core-thread state factory. Owns the native factory.
pub struct CoreStateManager {
    pub(crate) blend: StateSlot<BlendDesc, CoreState<BlendDesc>>,
    pub(crate) rasterizer: StateSlot<RasterizerDesc, CoreState<RasterizerDesc>>,
    pub(crate) depth_stencil: StateSlot<DepthStencilDesc, CoreState<DepthStencilDesc>>,
    pub(crate) sampler: StateSlot<SamplerDesc, CoreState<SamplerDesc>>,
    factory: Arc<dyn NativeStateFactory>,
    devices: DeviceMask,
}

impl CoreStateManager {
    /// Creates a manager that instantiates native objects on `devices`.
    pub fn new(factory: Arc<dyn NativeStateFactory>, devices: DeviceMask) -> Self {
        Self {
            blend: StateSlot::default(),
            rasterizer: StateSlot::default(),
            depth_stencil: StateSlot::default(),
            sampler: StateSlot::default(),
            factory,
            devices,
        }
    }

    /// Manager without native objects, for tools and tests.
    #[must_use]
    pub fn headless() -> Self {
        Self::new(Arc::new(HeadlessStateFactory), DeviceMask::PRIMARY)
    }

    #[inline]
    #[must_use]
    pub fn devices(&self) -> DeviceMask {
        self.devices
    }

    /// Returns the live state for `desc`, creating it and its native objects
    /// if needed. Native objects are created only on a cache miss.
    pub fn create<D: StateDesc>(&self, desc: &D) -> Result<Arc<CoreState<D>>> {
        let slot = D::core_slot(self);
        slot.cache.get_or_create(desc, |id, owner| {
            let native = desc.create_native(&self.factory, self.devices)?;
            log::debug!("Created core {} state #{}", D::KIND, id.index());
            Ok(CoreState::new(desc.clone(), id, native, owner))
        })
    }

    /// State built from `D::default()`, kept alive as long as the manager.
    pub fn default_state<D: StateDesc>(&self) -> Result<Arc<CoreState<D>>> {
        let slot = D::core_slot(self);
        if let Some(state) = slot.default.get() {
            return Ok(Arc::clone(state));
        }
        let created = self.create(&D::default())?;
        Ok(Arc::clone(slot.default.get_or_init(|| created)))
    }

    pub fn create_blend_state(&self, desc: &BlendDesc) -> Result<Arc<CoreState<BlendDesc>>> {
        self.create(desc)
    }

    pub fn create_rasterizer_state(&self, desc: &RasterizerDesc) -> Result<Arc<CoreState<RasterizerDesc>>> {
        self.create(desc)
    }

    pub fn create_depth_stencil_state(&self, desc: &DepthStencilDesc) -> Result<Arc<CoreState<DepthStencilDesc>>> {
        self.create(desc)
    }

    pub fn create_sampler_state(&self, desc: &SamplerDesc) -> Result<Arc<CoreState<SamplerDesc>>> {
        self.create(desc)
    }

    pub fn default_blend_state(&self) -> Result<Arc<CoreState<BlendDesc>>> {
        self.default_state()
    }

    pub fn default_rasterizer_state(&self) -> Result<Arc<CoreState<RasterizerDesc>>> {
        self.default_state()
    }

    pub fn default_depth_stencil_state(&self) -> Result<Arc<CoreState<DepthStencilDesc>>> {
        self.default_state()
    }

    pub fn default_sampler_state(&self) -> Result<Arc<CoreState<SamplerDesc>>> {
        self.default_state()
    }

    #[must_use]
    pub fn stats(&self) -> StateStats {
        StateStats {
            blend: self.blend.cache.stats(),
            rasterizer: self.rasterizer.cache.stats(),
            depth_stencil: self.depth_stencil.cache.stats(),
            sampler: self.sampler.cache.stats(),
        }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.stats().live_count()
    }

    pub fn reclaim_ids(&self) -> usize {
        self.blend.cache.reclaim_ids()
            + self.rasterizer.cache.reclaim_ids()
            + self.depth_stencil.cache.reclaim_ids()
            + self.sampler.cache.reclaim_ids()
    }
}
