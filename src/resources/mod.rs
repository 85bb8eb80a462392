//! Externally owned GPU resources and the native-handle contract.
//!
//! The binding layer never owns buffers or textures. It holds shared
//! references to objects implementing [`Texture`], [`GpuBuffer`] and
//! [`GpuParamBlockBuffer`], and asks them for their native handle on a given
//! device whenever a descriptor needs to be written or validated.
//!
//! A resource that has no handle for a device answers `None`; the backend
//! then binds a dummy resource in its place.

pub mod buffer;
pub mod texture;
pub mod version_tracker;

pub use buffer::{BufferUsage, GpuBuffer, GpuBufferProperties, GpuBufferType, GpuParamBlockBuffer};
pub use texture::{Texture, TextureProperties, TextureSurface, TextureUsage};
pub use version_tracker::ChangeTracker;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Maximum number of devices a single object can be instantiated on.
pub const MAX_DEVICES: usize = 5;

/// One value per device slot.
pub type PerDevice<T> = [T; MAX_DEVICES];

/// An opaque native API handle (`VkImage`, `VkBuffer`, `VkSampler`, ...).
///
/// Zero is the null handle on every supported backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    pub const NULL: Self = Self(0);

    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

bitflags! {
    /// Selects the devices an object is instantiated on.
    ///
    /// An empty mask means "default", which resolves to the primary device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeviceMask: u32 {
        const PRIMARY = 1 << 0;
        const GPU2 = 1 << 1;
        const GPU3 = 1 << 2;
        const GPU4 = 1 << 3;
        const GPU5 = 1 << 4;
    }
}

impl Default for DeviceMask {
    fn default() -> Self {
        Self::PRIMARY
    }
}

impl DeviceMask {
    /// Mask containing only the device at `index`.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self::from_bits_truncate(1 << index)
    }

    /// Device indices selected by this mask, in ascending order.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        let mask = if self.is_empty() { Self::PRIMARY } else { self };
        (0..MAX_DEVICES).filter(move |&i| mask.contains(Self::from_index(i)))
    }
}

bitflags! {
    /// How a bound resource is accessed by the GPU.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}
