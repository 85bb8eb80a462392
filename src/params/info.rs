//! Pipeline parameter layout.
//!
//! [`PipelineParamInfo`] flattens the reflection tables of every stage of a
//! pipeline into one layout. For each resource category it assigns dense
//! *sequential indices* to the distinct (set, slot) pairs, in first-seen order
//! across stages (vertex, fragment, geometry, hull, domain, compute) and
//! declaration order within a stage. The mapping is a bijection per category.
//!
//! The same (set, slot) declared by several stages with the same category is
//! one binding used by all of those stages. Declaring it with different
//! categories is an error, except for a texture and a sampler sharing a slot,
//! which form a combined image-sampler binding.

use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::desc::{GpuBufferFormat, GpuParamDesc, GpuParamObjectType, GpuProgramType};
use crate::errors::{Result, RhiError};

/// Resource category of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamType {
    ParamBlock,
    Texture,
    LoadStoreTexture,
    Buffer,
    SamplerState,
}

impl ParamType {
    pub const COUNT: usize = 5;

    pub const ALL: [Self; Self::COUNT] = [
        Self::ParamBlock,
        Self::Texture,
        Self::LoadStoreTexture,
        Self::Buffer,
        Self::SamplerState,
    ];

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// Shader stages referencing a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const GEOMETRY = 1 << 2;
        const HULL = 1 << 3;
        const DOMAIN = 1 << 4;
        const COMPUTE = 1 << 5;
    }
}

impl From<GpuProgramType> for ShaderStages {
    fn from(ty: GpuProgramType) -> Self {
        match ty {
            GpuProgramType::Vertex => Self::VERTEX,
            GpuProgramType::Fragment => Self::FRAGMENT,
            GpuProgramType::Geometry => Self::GEOMETRY,
            GpuProgramType::Hull => Self::HULL,
            GpuProgramType::Domain => Self::DOMAIN,
            GpuProgramType::Compute => Self::COMPUTE,
        }
    }
}

/// Location of a binding: descriptor set index and slot within the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Binding {
    pub set: u32,
    pub slot: u32,
}

impl Binding {
    #[inline]
    #[must_use]
    pub const fn new(set: u32, slot: u32) -> Self {
        Self { set, slot }
    }
}

/// One slot of a descriptor set as seen across all stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot: u32,
    /// Category of the binding. `Texture` for combined image-samplers.
    pub ty: ParamType,
    /// Sequential index within `ty`.
    pub sequential_idx: u32,
    /// Sequential sampler index when a sampler shares this slot with a texture.
    pub combined_sampler: Option<u32>,
    /// Declared object type. `None` for parameter blocks.
    pub object_type: Option<GpuParamObjectType>,
    pub element_type: GpuBufferFormat,
    pub stages: ShaderStages,
}

impl SlotInfo {
    #[inline]
    #[must_use]
    pub fn is_combined_image_sampler(&self) -> bool {
        self.combined_sampler.is_some()
    }
}

/// All slots of one descriptor set, sorted by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSetInfo {
    slots: Vec<SlotInfo>,
}

impl ParamSetInfo {
    #[inline]
    #[must_use]
    pub fn slots(&self) -> &[SlotInfo] {
        &self.slots
    }

    #[inline]
    #[must_use]
    pub fn num_bindings(&self) -> usize {
        self.slots.len()
    }

    /// Position of `slot` in [`slots`](Self::slots).
    #[must_use]
    pub fn binding_index(&self, slot: u32) -> Option<usize> {
        self.slots.binary_search_by_key(&slot, |s| s.slot).ok()
    }

    #[must_use]
    pub fn slot(&self, slot: u32) -> Option<&SlotInfo> {
        self.binding_index(slot).map(|i| &self.slots[i])
    }
}

/// Flattened parameter layout of a whole pipeline. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct PipelineParamInfo {
    descs: [Option<Arc<GpuParamDesc>>; GpuProgramType::COUNT],
    forward: [Vec<Binding>; ParamType::COUNT],
    reverse: [FxHashMap<Binding, u32>; ParamType::COUNT],
    sets: Vec<ParamSetInfo>,
}

/// An object declaration flattened out of a reflection table.
struct Declared {
    ty: ParamType,
    binding: Binding,
    object_type: Option<GpuParamObjectType>,
    element_type: GpuBufferFormat,
}

impl PipelineParamInfo {
    /// Builds the layout from the reflection tables of the present stages.
    pub fn new(descs: &[(GpuProgramType, Arc<GpuParamDesc>)]) -> Result<Self> {
        let mut info = Self::default();
        for (ty, desc) in descs {
            info.descs[ty.index()] = Some(Arc::clone(desc));
        }

        // Slot lookup while building: (set, slot) -> position in `sets[set].slots`.
        let mut positions: FxHashMap<Binding, usize> = FxHashMap::default();

        for program in GpuProgramType::ALL {
            let Some(desc) = info.descs[program.index()].clone() else {
                continue;
            };
            let stage = ShaderStages::from(program);
            for declared in Self::declarations(&desc) {
                info.declare(&mut positions, &declared, stage)?;
            }
        }

        for set in &mut info.sets {
            set.slots.sort_by_key(|s| s.slot);
        }

        log::debug!(
            "Pipeline param info: {} sets, {} blocks, {} textures, {} storage textures, {} buffers, {} samplers",
            info.num_sets(),
            info.num_elements(ParamType::ParamBlock),
            info.num_elements(ParamType::Texture),
            info.num_elements(ParamType::LoadStoreTexture),
            info.num_elements(ParamType::Buffer),
            info.num_elements(ParamType::SamplerState),
        );
        Ok(info)
    }

    fn declarations(desc: &GpuParamDesc) -> SmallVec<[Declared; 16]> {
        let mut out = SmallVec::new();
        out.extend(desc.param_blocks.iter().map(|b| Declared {
            ty: ParamType::ParamBlock,
            binding: Binding::new(b.set, b.slot),
            object_type: None,
            element_type: GpuBufferFormat::Unknown,
        }));
        let objects = [
            (ParamType::Texture, &desc.textures),
            (ParamType::LoadStoreTexture, &desc.load_store_textures),
            (ParamType::Buffer, &desc.buffers),
            (ParamType::SamplerState, &desc.samplers),
        ];
        for (ty, list) in objects {
            out.extend(list.iter().map(|o| Declared {
                ty,
                binding: Binding::new(o.set, o.slot),
                object_type: Some(o.ty),
                element_type: o.element_type,
            }));
        }
        out
    }

    fn declare(
        &mut self,
        positions: &mut FxHashMap<Binding, usize>,
        declared: &Declared,
        stage: ShaderStages,
    ) -> Result<()> {
        let Declared { ty, binding, .. } = *declared;
        let set_idx = binding.set as usize;
        if self.sets.len() <= set_idx {
            self.sets.resize_with(set_idx + 1, ParamSetInfo::default);
        }

        // Already known in this category: another stage uses the same binding.
        if self.reverse[ty.index()].contains_key(&binding) {
            let pos = positions[&binding];
            self.sets[set_idx].slots[pos].stages |= stage;
            return Ok(());
        }

        let seq = self.forward[ty.index()].len() as u32;

        if let Some(&pos) = positions.get(&binding) {
            let entry = &mut self.sets[set_idx].slots[pos];
            match (entry.ty, ty) {
                (ParamType::Texture, ParamType::SamplerState) if entry.combined_sampler.is_none() => {
                    entry.combined_sampler = Some(seq);
                }
                (ParamType::SamplerState, ParamType::Texture) => {
                    entry.combined_sampler = Some(entry.sequential_idx);
                    entry.ty = ParamType::Texture;
                    entry.sequential_idx = seq;
                    entry.object_type = declared.object_type;
                    entry.element_type = declared.element_type;
                }
                (first, second) => {
                    return Err(RhiError::ConflictingBinding {
                        set: binding.set,
                        slot: binding.slot,
                        first,
                        second,
                    });
                }
            }
            entry.stages |= stage;
        } else {
            let slots = &mut self.sets[set_idx].slots;
            positions.insert(binding, slots.len());
            slots.push(SlotInfo {
                slot: binding.slot,
                ty,
                sequential_idx: seq,
                combined_sampler: None,
                object_type: declared.object_type,
                element_type: declared.element_type,
                stages: stage,
            });
        }

        self.forward[ty.index()].push(binding);
        self.reverse[ty.index()].insert(binding, seq);
        Ok(())
    }

    /// Sequential index of (set, slot) within `ty`, or `None` if unused.
    #[inline]
    #[must_use]
    pub fn sequential_slot(&self, ty: ParamType, set: u32, slot: u32) -> Option<u32> {
        self.reverse[ty.index()].get(&Binding::new(set, slot)).copied()
    }

    /// Like [`sequential_slot`](Self::sequential_slot), but reports the miss as an error.
    pub fn checked_sequential_slot(&self, ty: ParamType, set: u32, slot: u32) -> Result<u32> {
        self.sequential_slot(ty, set, slot)
            .ok_or(RhiError::UnknownBinding { ty, set, slot })
    }

    /// (set, slot) of the `sequential_idx`-th binding of `ty`.
    #[inline]
    #[must_use]
    pub fn binding(&self, ty: ParamType, sequential_idx: u32) -> Option<Binding> {
        self.forward[ty.index()].get(sequential_idx as usize).copied()
    }

    /// Bindings of `ty` in sequential order.
    #[inline]
    #[must_use]
    pub fn bindings(&self, ty: ParamType) -> &[Binding] {
        &self.forward[ty.index()]
    }

    #[inline]
    #[must_use]
    pub fn num_elements(&self, ty: ParamType) -> u32 {
        self.forward[ty.index()].len() as u32
    }

    /// Number of elements across all categories.
    #[must_use]
    pub fn total_elements(&self) -> u32 {
        self.forward.iter().map(|f| f.len() as u32).sum()
    }

    /// One past the highest set index used. Unused lower sets are empty.
    #[inline]
    #[must_use]
    pub fn num_sets(&self) -> u32 {
        self.sets.len() as u32
    }

    /// Distinct slots of `set`. A combined image-sampler counts once.
    #[must_use]
    pub fn num_bindings(&self, set: u32) -> u32 {
        self.sets.get(set as usize).map_or(0, |s| s.num_bindings() as u32)
    }

    #[must_use]
    pub fn set(&self, set: u32) -> Option<&ParamSetInfo> {
        self.sets.get(set as usize)
    }

    #[must_use]
    pub fn sets(&self) -> &[ParamSetInfo] {
        &self.sets
    }

    /// Reflection table of `stage`, if the pipeline has that stage.
    #[must_use]
    pub fn param_desc(&self, stage: GpuProgramType) -> Option<&Arc<GpuParamDesc>> {
        self.descs[stage.index()].as_ref()
    }

    /// Reflection tables of all present stages.
    pub fn param_descs(&self) -> impl Iterator<Item = (GpuProgramType, &Arc<GpuParamDesc>)> {
        GpuProgramType::ALL
            .into_iter()
            .filter_map(|ty| self.descs[ty.index()].as_ref().map(|d| (ty, d)))
    }
}
