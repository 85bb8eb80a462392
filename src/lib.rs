//! GPU pipeline state and resource binding.
//!
//! - [`state`]: deduplicated, immutable blend/rasterizer/depth-stencil/sampler
//!   state objects for the simulation and render threads
//! - [`params`]: shader reflection tables, the flattened per-pipeline
//!   parameter layout and the generic binding table
//! - [`pipeline`]: graphics and compute pipeline states
//! - [`backend`]: Vulkan descriptor management and `wgpu` state conversion
//!
//! Buffers and textures are owned by the caller and reach this crate through
//! the traits in [`resources`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod backend;
pub mod errors;
pub mod params;
pub mod pipeline;
pub mod resources;
pub mod settings;
pub mod state;

pub use errors::{Result, RhiError};
pub use params::{GpuParamDesc, GpuParams, GpuProgramType, ParamType, PipelineParamInfo};
pub use pipeline::{ComputePipelineState, GpuProgram, GraphicsPipelineState, PipelineStateDesc};
pub use resources::{DeviceMask, NativeHandle, Texture, TextureSurface};
pub use settings::RhiSettings;
pub use state::{CoreStateManager, StateManager};
