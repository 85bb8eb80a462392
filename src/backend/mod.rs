//! Native API backends.
//!
//! - [`vulkan`]: descriptor sets and pipeline layouts through `ash`
//! - [`wgpu_state`]: fixed-function and sampler descriptors for `wgpu`

pub mod vulkan;
pub mod wgpu_state;
