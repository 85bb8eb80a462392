//! Shader stages and pipeline state objects.

pub mod program;
pub mod state;

pub use program::GpuProgram;
pub use state::{ComputePipelineState, GraphicsPipelineState, PipelineStateDesc};
