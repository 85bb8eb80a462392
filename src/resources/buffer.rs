use std::fmt::Debug;

use bitflags::bitflags;

use super::NativeHandle;
use crate::params::GpuBufferFormat;

bitflags! {
    /// Usage flags a generic GPU buffer was created with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const STATIC = 1 << 0;
        const DYNAMIC = 1 << 1;
        /// Can be bound for random read/write access from shaders.
        const LOAD_STORE = 1 << 2;
    }
}

/// Whether a buffer is addressed through a typed view or as an array of structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuBufferType {
    /// Typed or raw byte buffer, read through a texel view.
    #[default]
    Standard,
    /// Array of fixed-size structs, bound directly.
    Structured,
}

/// Creation-time properties of a [`GpuBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBufferProperties {
    pub buffer_type: GpuBufferType,
    pub format: GpuBufferFormat,
    pub element_count: u32,
    pub element_size: u32,
    pub usage: BufferUsage,
}

impl Default for GpuBufferProperties {
    fn default() -> Self {
        Self {
            buffer_type: GpuBufferType::Standard,
            format: GpuBufferFormat::Float4,
            element_count: 0,
            element_size: 16,
            usage: BufferUsage::STATIC,
        }
    }
}

/// A generic (typed, raw or structured) buffer owned outside the binding layer.
pub trait GpuBuffer: Send + Sync + Debug {
    fn properties(&self) -> &GpuBufferProperties;

    /// Native buffer handle on the device.
    ///
    /// Dynamic buffers may swap this handle between frames when they are
    /// discarded and reallocated.
    fn buffer(&self, device_idx: usize) -> Option<NativeHandle>;

    /// Native texel view for typed/raw buffers. `None` for structured buffers.
    fn view(&self, device_idx: usize) -> Option<NativeHandle>;
}

/// A uniform buffer holding one parameter block.
pub trait GpuParamBlockBuffer: Send + Sync + Debug {
    /// Size in bytes.
    fn size(&self) -> u32;

    fn buffer(&self, device_idx: usize) -> Option<NativeHandle>;
}
