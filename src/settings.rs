//! Backend Settings
//!
//! Tunables for the binding layer, injected at device start-up.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use pipestate::settings::{RhiSettings, DescriptorPoolSettings};
//!
//! // Defaults suit most renderers
//! let settings = RhiSettings::default();
//!
//! // Bigger pools for a scene with many materials
//! let settings = RhiSettings {
//!     descriptor_pool: DescriptorPoolSettings {
//!         max_sets: 16_384,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! ```
//!
//! Settings are plain serde structs, so they can also be loaded from a
//! configuration file. Missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};

use crate::resources::DeviceMask;

// ---------------------------------------------------------------------------
// DescriptorPoolSettings
// ---------------------------------------------------------------------------

/// Capacities of a single native descriptor pool.
///
/// When a pool runs out, a new one with the same capacities is created and
/// allocation continues there; existing pools are never resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorPoolSettings {
    /// Maximum number of descriptor sets allocated from one pool.
    pub max_sets: u32,
    pub uniform_buffers: u32,
    pub sampled_images: u32,
    pub storage_images: u32,
    pub samplers: u32,
    pub uniform_texel_buffers: u32,
    pub storage_texel_buffers: u32,
    pub storage_buffers: u32,
}

impl Default for DescriptorPoolSettings {
    fn default() -> Self {
        Self {
            max_sets: 8192,
            uniform_buffers: 16_384,
            sampled_images: 16_384,
            storage_images: 2048,
            samplers: 8192,
            uniform_texel_buffers: 2048,
            storage_texel_buffers: 2048,
            storage_buffers: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// RhiSettings
// ---------------------------------------------------------------------------

/// Top-level binding layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RhiSettings {
    /// Capacities of each descriptor pool.
    pub descriptor_pool: DescriptorPoolSettings,

    /// Devices new objects are created on when the caller does not specify.
    pub default_device_mask: DeviceMask,

    /// Physical descriptor sets preallocated per set index when a binding
    /// table is created. More sets are allocated on demand while older ones
    /// are still in flight.
    ///
    /// Values below 1 are treated as 1.
    pub initial_sets_per_ring: u32,
}

impl Default for RhiSettings {
    fn default() -> Self {
        Self {
            descriptor_pool: DescriptorPoolSettings::default(),
            default_device_mask: DeviceMask::PRIMARY,
            initial_sets_per_ring: 1,
        }
    }
}

impl RhiSettings {
    /// Number of physical sets to preallocate per ring, never zero.
    #[inline]
    #[must_use]
    pub fn initial_ring_size(&self) -> usize {
        self.initial_sets_per_ring.max(1) as usize
    }
}
