//! Sim-thread and core-thread immutable state objects.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, OnceLock, Weak};

use super::cache::{StateCache, StateId, StateSlot};
use super::desc::{BlendDesc, DepthStencilDesc, RasterizerDesc, SamplerDesc, hash_desc};
use super::manager::{CoreStateManager, NativeStateFactory, StateManager};
use crate::errors::Result;
use crate::resources::{DeviceMask, MAX_DEVICES, NativeHandle, PerDevice};

/// A descriptor type that can back an immutable state object.
pub trait StateDesc: Clone + Eq + Hash + Default + Debug + Send + Sync + 'static {
    /// Native objects owned by the core-thread flavor.
    type Native: Debug + Send + Sync;

    /// Human readable kind name, used in logs.
    const KIND: &'static str;

    fn create_native(
        &self,
        factory: &Arc<dyn NativeStateFactory>,
        devices: DeviceMask,
    ) -> Result<Self::Native>;

    fn sim_slot(manager: &StateManager) -> &StateSlot<Self, SimState<Self>>;

    fn core_slot(manager: &CoreStateManager) -> &StateSlot<Self, CoreState<Self>>;
}

// ─── Core Thread ──────────────────────────────────────────────────────────────

/// Core-thread state object. Immutable after construction.
///
/// At most one live instance exists per distinct descriptor within a
/// [`CoreStateManager`].
pub struct CoreState<D: StateDesc> {
    desc: D,
    hash: u64,
    id: StateId,
    native: D::Native,
    owner: Weak<StateCache<D, CoreState<D>>>,
}

impl<D: StateDesc> CoreState<D> {
    pub(crate) fn new(desc: D, id: StateId, native: D::Native, owner: Weak<StateCache<D, Self>>) -> Self {
        let hash = hash_desc(&desc);
        Self {
            desc,
            hash,
            id,
            native,
            owner,
        }
    }

    #[inline]
    #[must_use]
    pub fn properties(&self) -> &D {
        &self.desc
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Dense ID, unique among the live states of this kind.
    #[inline]
    #[must_use]
    pub fn id(&self) -> StateId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn native(&self) -> &D::Native {
        &self.native
    }
}

impl<D: StateDesc> Drop for CoreState<D> {
    fn drop(&mut self) {
        if let Some(cache) = self.owner.upgrade() {
            cache.release(&self.desc, self.id, self);
        }
    }
}

impl<D: StateDesc> Debug for CoreState<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreState")
            .field("kind", &D::KIND)
            .field("id", &self.id)
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

// ─── Sim Thread ───────────────────────────────────────────────────────────────

/// Sim-thread state object.
///
/// Owns the descriptor and lazily produces its core-thread counterpart the
/// first time the render thread asks for it. The pairing is kept for the
/// object's lifetime.
pub struct SimState<D: StateDesc> {
    desc: D,
    hash: u64,
    id: StateId,
    core: OnceLock<Arc<CoreState<D>>>,
    owner: Weak<StateCache<D, SimState<D>>>,
}

impl<D: StateDesc> SimState<D> {
    pub(crate) fn new(desc: D, id: StateId, owner: Weak<StateCache<D, Self>>) -> Self {
        let hash = hash_desc(&desc);
        Self {
            desc,
            hash,
            id,
            core: OnceLock::new(),
            owner,
        }
    }

    #[inline]
    #[must_use]
    pub fn properties(&self) -> &D {
        &self.desc
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Core-thread counterpart, created through `manager` on first call.
    pub fn core(&self, manager: &CoreStateManager) -> Result<Arc<CoreState<D>>> {
        if let Some(core) = self.core.get() {
            return Ok(Arc::clone(core));
        }
        let created = manager.create(&self.desc)?;
        Ok(Arc::clone(self.core.get_or_init(|| created)))
    }

    /// Core-thread counterpart if it was already created.
    #[must_use]
    pub fn core_if_created(&self) -> Option<&Arc<CoreState<D>>> {
        self.core.get()
    }
}

impl<D: StateDesc> Drop for SimState<D> {
    fn drop(&mut self) {
        if let Some(cache) = self.owner.upgrade() {
            cache.release(&self.desc, self.id, self);
        }
    }
}

impl<D: StateDesc> Debug for SimState<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimState")
            .field("kind", &D::KIND)
            .field("id", &self.id)
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

// ─── Native Sampler Objects ───────────────────────────────────────────────────

/// Per-device native samplers owned by a core sampler state.
///
/// Destroyed through the factory that created them.
pub struct SamplerHandles {
    handles: PerDevice<Option<NativeHandle>>,
    factory: Arc<dyn NativeStateFactory>,
}

impl SamplerHandles {
    /// Native sampler on `device_idx`, if the state was created there.
    #[inline]
    #[must_use]
    pub fn get(&self, device_idx: usize) -> Option<NativeHandle> {
        self.handles.get(device_idx).copied().flatten()
    }
}

impl Drop for SamplerHandles {
    fn drop(&mut self) {
        for (idx, handle) in self.handles.iter().enumerate() {
            if let Some(handle) = handle {
                self.factory.destroy_sampler(idx, *handle);
            }
        }
    }
}

impl Debug for SamplerHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerHandles").field("handles", &self.handles).finish()
    }
}

// ─── Kinds ────────────────────────────────────────────────────────────────────

impl StateDesc for BlendDesc {
    type Native = ();
    const KIND: &'static str = "blend";

    fn create_native(&self, _: &Arc<dyn NativeStateFactory>, _: DeviceMask) -> Result<()> {
        Ok(())
    }

    fn sim_slot(manager: &StateManager) -> &StateSlot<Self, SimState<Self>> {
        &manager.blend
    }

    fn core_slot(manager: &CoreStateManager) -> &StateSlot<Self, CoreState<Self>> {
        &manager.blend
    }
}

impl StateDesc for RasterizerDesc {
    type Native = ();
    const KIND: &'static str = "rasterizer";

    fn create_native(&self, _: &Arc<dyn NativeStateFactory>, _: DeviceMask) -> Result<()> {
        Ok(())
    }

    fn sim_slot(manager: &StateManager) -> &StateSlot<Self, SimState<Self>> {
        &manager.rasterizer
    }

    fn core_slot(manager: &CoreStateManager) -> &StateSlot<Self, CoreState<Self>> {
        &manager.rasterizer
    }
}

impl StateDesc for DepthStencilDesc {
    type Native = ();
    const KIND: &'static str = "depth-stencil";

    fn create_native(&self, _: &Arc<dyn NativeStateFactory>, _: DeviceMask) -> Result<()> {
        Ok(())
    }

    fn sim_slot(manager: &StateManager) -> &StateSlot<Self, SimState<Self>> {
        &manager.depth_stencil
    }

    fn core_slot(manager: &CoreStateManager) -> &StateSlot<Self, CoreState<Self>> {
        &manager.depth_stencil
    }
}

impl StateDesc for SamplerDesc {
    type Native = SamplerHandles;
    const KIND: &'static str = "sampler";

    fn create_native(&self, factory: &Arc<dyn NativeStateFactory>, devices: DeviceMask) -> Result<SamplerHandles> {
        // Built incrementally so a failure part-way destroys what was created.
        let mut out = SamplerHandles {
            handles: [None; MAX_DEVICES],
            factory: Arc::clone(factory),
        };
        for idx in devices.indices() {
            out.handles[idx] = Some(factory.create_sampler(self, idx)?);
        }
        Ok(out)
    }

    fn sim_slot(manager: &StateManager) -> &StateSlot<Self, SimState<Self>> {
        &manager.sampler
    }

    fn core_slot(manager: &CoreStateManager) -> &StateSlot<Self, CoreState<Self>> {
        &manager.sampler
    }
}

// ─── Aliases ──────────────────────────────────────────────────────────────────

pub type BlendState = SimState<BlendDesc>;
pub type RasterizerState = SimState<RasterizerDesc>;
pub type DepthStencilState = SimState<DepthStencilDesc>;
pub type SamplerState = SimState<SamplerDesc>;

pub type CoreBlendState = CoreState<BlendDesc>;
pub type CoreRasterizerState = CoreState<RasterizerDesc>;
pub type CoreDepthStencilState = CoreState<DepthStencilDesc>;
pub type CoreSamplerState = CoreState<SamplerDesc>;
