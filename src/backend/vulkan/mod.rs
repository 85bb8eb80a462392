//! Vulkan descriptor backend.
//!
//! Turns a [`GpuParams`](crate::params::GpuParams) table into native
//! descriptor sets, one ring of physical sets per set index and device.
//!
//! - [`device`]: the [`DescriptorDevice`] seam, its `ash` implementation and
//!   the per-device services
//! - [`descriptor`]: set layouts, sets and the per-device layout cache
//! - [`param_info`]: a pipeline's parameter layout resolved against devices
//! - [`gpu_params`]: the binding table and prepare-for-bind
//! - [`pipeline`]: fixed-function translation and pipeline wrappers
//! - [`command`]: the command recorder seam and deferred binds

pub mod command;
pub mod descriptor;
pub mod device;
pub mod dummy;
pub mod gpu_params;
pub mod param_info;
pub mod pipeline;
pub mod sampler;
pub mod utility;

pub use command::{BufferUse, CommandBindings, DescriptorBindFlags, VulkanCommandRecorder};
pub use descriptor::{DescriptorLayout, DescriptorManager, DescriptorSet};
pub use device::{
    AshDescriptorDevice, DescriptorDevice, DescriptorWrite, DeviceLimits, LayoutBinding, VulkanDevice,
    VulkanDeviceSet, WritePayload,
};
pub use dummy::{DummyResources, DummyTextureKind};
pub use gpu_params::VulkanGpuParams;
pub use param_info::{BindingLocation, VulkanPipelineParamInfo};
pub use pipeline::{
    DYNAMIC_STATES, FixedFunctionState, ReadOnlyFlags, VulkanComputePipelineState, VulkanGraphicsPipelineState,
};
pub use sampler::AshStateFactory;
