//! Graphics and compute pipeline states.
//!
//! A pipeline state bundles fixed-function state objects with the shader
//! stages of a draw or dispatch, and derives the [`PipelineParamInfo`] from
//! the stages' reflection tables at construction.

use std::sync::Arc;

use crate::errors::Result;
use crate::params::{GpuParams, GpuProgramType, PipelineParamInfo};
use crate::state::{CoreBlendState, CoreDepthStencilState, CoreRasterizerState, CoreStateManager};

use super::program::GpuProgram;

/// Inputs of a [`GraphicsPipelineState`]. Missing states fall back to the
/// manager's defaults.
#[derive(Debug, Clone, Default)]
pub struct PipelineStateDesc {
    pub blend_state: Option<Arc<CoreBlendState>>,
    pub rasterizer_state: Option<Arc<CoreRasterizerState>>,
    pub depth_stencil_state: Option<Arc<CoreDepthStencilState>>,

    pub vertex_program: Option<Arc<GpuProgram>>,
    pub fragment_program: Option<Arc<GpuProgram>>,
    pub geometry_program: Option<Arc<GpuProgram>>,
    pub hull_program: Option<Arc<GpuProgram>>,
    pub domain_program: Option<Arc<GpuProgram>>,
}

impl PipelineStateDesc {
    fn programs(&self) -> impl Iterator<Item = &Arc<GpuProgram>> {
        [
            &self.vertex_program,
            &self.fragment_program,
            &self.geometry_program,
            &self.hull_program,
            &self.domain_program,
        ]
        .into_iter()
        .flatten()
    }
}

fn build_param_info<'a>(programs: impl Iterator<Item = &'a Arc<GpuProgram>>) -> Result<PipelineParamInfo> {
    let stages: Vec<_> = programs
        .map(|p| (p.program_type(), Arc::clone(p.param_desc())))
        .collect();
    PipelineParamInfo::new(&stages)
}

// ─── Graphics ─────────────────────────────────────────────────────────────────

/// Immutable graphics pipeline: fixed-function states plus up to five stages.
#[derive(Debug)]
pub struct GraphicsPipelineState {
    blend: Arc<CoreBlendState>,
    rasterizer: Arc<CoreRasterizerState>,
    depth_stencil: Arc<CoreDepthStencilState>,
    desc: PipelineStateDesc,
    param_info: Arc<PipelineParamInfo>,
}

impl GraphicsPipelineState {
    pub fn new(desc: PipelineStateDesc, states: &CoreStateManager) -> Result<Self> {
        let blend = match &desc.blend_state {
            Some(s) => Arc::clone(s),
            None => states.default_blend_state()?,
        };
        let rasterizer = match &desc.rasterizer_state {
            Some(s) => Arc::clone(s),
            None => states.default_rasterizer_state()?,
        };
        let depth_stencil = match &desc.depth_stencil_state {
            Some(s) => Arc::clone(s),
            None => states.default_depth_stencil_state()?,
        };

        for program in desc.programs() {
            if program.program_type() == GpuProgramType::Compute {
                log::warn!("Compute program '{}' bound to a graphics pipeline stage", program.entry_point());
            }
        }

        let param_info = Arc::new(build_param_info(desc.programs())?);
        Ok(Self {
            blend,
            rasterizer,
            depth_stencil,
            desc,
            param_info,
        })
    }

    #[inline]
    #[must_use]
    pub fn blend_state(&self) -> &Arc<CoreBlendState> {
        &self.blend
    }

    #[inline]
    #[must_use]
    pub fn rasterizer_state(&self) -> &Arc<CoreRasterizerState> {
        &self.rasterizer
    }

    #[inline]
    #[must_use]
    pub fn depth_stencil_state(&self) -> &Arc<CoreDepthStencilState> {
        &self.depth_stencil
    }

    #[must_use]
    pub fn vertex_program(&self) -> Option<&Arc<GpuProgram>> {
        self.desc.vertex_program.as_ref()
    }

    #[must_use]
    pub fn fragment_program(&self) -> Option<&Arc<GpuProgram>> {
        self.desc.fragment_program.as_ref()
    }

    #[must_use]
    pub fn geometry_program(&self) -> Option<&Arc<GpuProgram>> {
        self.desc.geometry_program.as_ref()
    }

    #[must_use]
    pub fn hull_program(&self) -> Option<&Arc<GpuProgram>> {
        self.desc.hull_program.as_ref()
    }

    #[must_use]
    pub fn domain_program(&self) -> Option<&Arc<GpuProgram>> {
        self.desc.domain_program.as_ref()
    }

    /// All present stages, vertex first.
    pub fn programs(&self) -> impl Iterator<Item = &Arc<GpuProgram>> {
        self.desc.programs()
    }

    #[inline]
    #[must_use]
    pub fn param_info(&self) -> &Arc<PipelineParamInfo> {
        &self.param_info
    }

    /// A binding table matching this pipeline, every slot unbound.
    #[must_use]
    pub fn create_gpu_params(&self) -> GpuParams {
        GpuParams::new(Arc::clone(&self.param_info))
    }
}

// ─── Compute ──────────────────────────────────────────────────────────────────

/// Immutable compute pipeline: a single compute stage.
#[derive(Debug)]
pub struct ComputePipelineState {
    program: Arc<GpuProgram>,
    param_info: Arc<PipelineParamInfo>,
}

impl ComputePipelineState {
    pub fn new(program: Arc<GpuProgram>) -> Result<Self> {
        if program.program_type() != GpuProgramType::Compute {
            log::warn!(
                "{:?} program '{}' used as a compute pipeline",
                program.program_type(),
                program.entry_point()
            );
        }
        let param_info = Arc::new(build_param_info(std::iter::once(&program))?);
        Ok(Self { program, param_info })
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> &Arc<GpuProgram> {
        &self.program
    }

    #[inline]
    #[must_use]
    pub fn param_info(&self) -> &Arc<PipelineParamInfo> {
        &self.param_info
    }

    #[must_use]
    pub fn create_gpu_params(&self) -> GpuParams {
        GpuParams::new(Arc::clone(&self.param_info))
    }
}
