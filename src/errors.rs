//! Error Types
//!
//! This module defines the error types used throughout the binding layer.
//!
//! # Overview
//!
//! The main error type [`RhiError`] covers the failures that are allowed to
//! propagate:
//! - Structural problems in reflection data found while building a
//!   [`PipelineParamInfo`](crate::params::PipelineParamInfo)
//! - Device capability limits exceeded by a pipeline layout
//! - Native API failures (descriptor pool exhaustion, sampler creation, ...)
//!
//! Per-binding mistakes (an unknown set/slot, an unknown parameter name) are
//! *not* errors in this sense. They are logged and the call becomes a no-op,
//! so a misconfigured material shows up as a missing visual instead of a crash.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pipestate::errors::{RhiError, Result};
//!
//! fn build_layouts() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use ash::vk;
use thiserror::Error;

use crate::params::ParamType;

/// The main error type for the binding layer.
#[derive(Error, Debug)]
pub enum RhiError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A (set, slot) pair that the pipeline does not declare for the category.
    #[error("Set/slot combination {set},{slot} is not used by the GPU program as a {ty:?}")]
    UnknownBinding {
        /// Resource category that was queried
        ty: ParamType,
        /// Descriptor set index
        set: u32,
        /// Binding slot within the set
        slot: u32,
    },

    /// Two shader stages declare the same (set, slot) with different categories.
    #[error("Set/slot {set},{slot} declared as both {first:?} and {second:?}")]
    ConflictingBinding {
        /// Descriptor set index
        set: u32,
        /// Binding slot within the set
        slot: u32,
        /// Category seen first
        first: ParamType,
        /// Conflicting category seen later
        second: ParamType,
    },

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The device cannot satisfy the requested pipeline layout.
    #[error("Device limit exceeded: {what} requires {requested}, device supports {limit}")]
    DeviceLimitsExceeded {
        /// Which limit was exceeded
        what: &'static str,
        /// Requested amount
        requested: u32,
        /// Device limit
        limit: u32,
    },

    /// No device is registered at the requested index.
    #[error("No device available at index {0}")]
    DeviceUnavailable(usize),

    /// Native state object creation failed.
    #[error("Failed to create native state object: {0}")]
    NativeStateCreation(String),

    // ========================================================================
    // Native API Errors
    // ========================================================================
    /// A Vulkan call returned an error code.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

/// Alias for `Result<T, RhiError>`.
pub type Result<T> = std::result::Result<T, RhiError>;
