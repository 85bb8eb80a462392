use std::fmt::Debug;

use bitflags::bitflags;

use super::NativeHandle;

bitflags! {
    /// Usage flags a texture was created with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        /// Written by the CPU every so often; kept in a layout the CPU can map.
        const DYNAMIC = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
        /// Can be bound for random read/write access from shaders.
        const LOAD_STORE = 1 << 3;
    }
}

/// Creation-time properties of a texture that affect binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureProperties {
    pub usage: TextureUsage,
    /// Number of mip levels excluding the base level.
    pub num_mipmaps: u32,
    /// Number of faces (cube faces times array slices).
    pub num_faces: u32,
}

impl Default for TextureProperties {
    fn default() -> Self {
        Self {
            usage: TextureUsage::empty(),
            num_mipmaps: 0,
            num_faces: 1,
        }
    }
}

/// A sub-range of a texture's mip levels and faces.
///
/// A count of zero means "everything from the start index onwards".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSurface {
    pub mip_level: u32,
    pub num_mip_levels: u32,
    pub face: u32,
    pub num_faces: u32,
}

impl Default for TextureSurface {
    fn default() -> Self {
        Self::COMPLETE
    }
}

impl TextureSurface {
    /// The whole resource: every mip level and every face.
    pub const COMPLETE: Self = Self {
        mip_level: 0,
        num_mip_levels: 0,
        face: 0,
        num_faces: 0,
    };

    #[must_use]
    pub fn new(mip_level: u32, num_mip_levels: u32, face: u32, num_faces: u32) -> Self {
        Self {
            mip_level,
            num_mip_levels,
            face,
            num_faces,
        }
    }

    /// Replaces zero counts with the actual counts of the texture.
    #[must_use]
    pub fn resolve(&self, props: &TextureProperties) -> Self {
        let mut out = *self;
        if out.num_mip_levels == 0 {
            out.num_mip_levels = props.num_mipmaps + 1;
        }
        if out.num_faces == 0 {
            out.num_faces = props.num_faces;
        }
        out
    }
}

/// A texture owned outside the binding layer.
pub trait Texture: Send + Sync + Debug {
    fn properties(&self) -> &TextureProperties;

    /// Native image handle on the given device, if the texture exists there.
    fn image(&self, device_idx: usize) -> Option<NativeHandle>;

    /// Native view over `surface`, if the texture exists on the device.
    fn view(&self, device_idx: usize, surface: &TextureSurface) -> Option<NativeHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_surface_resolves_to_full_range() {
        let props = TextureProperties {
            num_mipmaps: 9,
            num_faces: 6,
            ..Default::default()
        };
        let resolved = TextureSurface::COMPLETE.resolve(&props);
        assert_eq!(resolved, TextureSurface::new(0, 10, 0, 6));
    }

    #[test]
    fn explicit_surface_is_kept() {
        let props = TextureProperties::default();
        let surface = TextureSurface::new(2, 1, 0, 1);
        assert_eq!(surface.resolve(&props), surface);
    }
}
