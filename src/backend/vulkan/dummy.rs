//! Placeholder resources bound in place of unbound slots.

use std::fmt::Debug;
use std::sync::Arc;

use crate::params::GpuParamObjectType;
use crate::resources::{GpuBuffer, GpuParamBlockBuffer, Texture};
use crate::state::CoreSamplerState;

/// Image dimensionality of a dummy texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DummyTextureKind {
    Tex1D,
    Tex2D,
    Tex3D,
    Cube,
    Tex2DMS,
}

impl DummyTextureKind {
    pub const COUNT: usize = 5;

    /// Kind matching a declared texture or sampler object type.
    ///
    /// Array variants share the dummy of their base dimensionality.
    #[must_use]
    pub fn of(ty: GpuParamObjectType) -> Self {
        use GpuParamObjectType as T;
        match ty {
            T::Sampler1D | T::Texture1D | T::Texture1DArray | T::RwTexture1D | T::RwTexture1DArray => Self::Tex1D,
            T::Sampler3D | T::Texture3D | T::RwTexture3D => Self::Tex3D,
            T::SamplerCube | T::TextureCube | T::TextureCubeArray => Self::Cube,
            T::Sampler2DMS | T::Texture2DMS | T::Texture2DMSArray | T::RwTexture2DMS | T::RwTexture2DMSArray => {
                Self::Tex2DMS
            }
            _ => Self::Tex2D,
        }
    }

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-device placeholder resources.
///
/// Every binding slot must reference a valid native object, so unbound slots
/// fall back to one of these. Their contents are never meaningful.
#[derive(Debug, Clone)]
pub struct DummyResources {
    pub param_block: Arc<dyn GpuParamBlockBuffer>,
    /// Read-only typed/raw buffer.
    pub read_buffer: Arc<dyn GpuBuffer>,
    /// Writable typed/raw buffer.
    pub storage_buffer: Arc<dyn GpuBuffer>,
    pub structured_buffer: Arc<dyn GpuBuffer>,
    /// Indexed by [`DummyTextureKind::index`]. Created with load-store usage so
    /// they can stand in for storage images too.
    pub textures: [Arc<dyn Texture>; DummyTextureKind::COUNT],
    pub sampler: Arc<CoreSamplerState>,
}

impl DummyResources {
    /// Dummy texture for a declared texture object type.
    #[must_use]
    pub fn texture(&self, ty: Option<GpuParamObjectType>) -> &Arc<dyn Texture> {
        let kind = ty.map_or(DummyTextureKind::Tex2D, DummyTextureKind::of);
        &self.textures[kind.index()]
    }

    /// Dummy buffer for a declared buffer object type.
    #[must_use]
    pub fn buffer(&self, ty: Option<GpuParamObjectType>) -> &Arc<dyn GpuBuffer> {
        match ty {
            Some(ty) if ty.is_structured_buffer() => &self.structured_buffer,
            Some(ty) if ty.is_writable_buffer() => &self.storage_buffer,
            _ => &self.read_buffer,
        }
    }
}
