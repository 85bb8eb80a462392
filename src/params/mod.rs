//! Shader parameter layout and binding tables.

pub mod desc;
pub mod gpu_params;
pub mod info;

pub use desc::{
    GpuBufferFormat, GpuDataParamType, GpuParamBlockDesc, GpuParamDataDesc, GpuParamDesc, GpuParamObjectDesc,
    GpuParamObjectType, GpuProgramType,
};
pub use gpu_params::{BoundTexture, GpuParams};
pub use info::{Binding, ParamSetInfo, ParamType, PipelineParamInfo, ShaderStages, SlotInfo};
