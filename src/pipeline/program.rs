use std::sync::Arc;

use crate::params::{GpuParamDesc, GpuProgramType};

/// A compiled shader stage as far as binding is concerned.
///
/// Compilation itself happens elsewhere; this keeps the stage type, the entry
/// point and the reflection table produced alongside the bytecode.
#[derive(Debug, Clone)]
pub struct GpuProgram {
    ty: GpuProgramType,
    entry_point: String,
    param_desc: Arc<GpuParamDesc>,
}

impl GpuProgram {
    #[must_use]
    pub fn new(ty: GpuProgramType, entry_point: &str, param_desc: GpuParamDesc) -> Self {
        Self {
            ty,
            entry_point: entry_point.to_owned(),
            param_desc: Arc::new(param_desc),
        }
    }

    #[inline]
    #[must_use]
    pub fn program_type(&self) -> GpuProgramType {
        self.ty
    }

    #[inline]
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    #[inline]
    #[must_use]
    pub fn param_desc(&self) -> &Arc<GpuParamDesc> {
        &self.param_desc
    }
}
