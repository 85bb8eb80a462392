//! Vulkan pipeline states.
//!
//! Translates the fixed-function state objects of a [`GraphicsPipelineState`]
//! into Vulkan create-info structs once, and resolves the pipeline's parameter
//! layout on every device it targets. Native `VkPipeline` objects depend on
//! the framebuffer and vertex input and are created by the command layer from
//! the infos exposed here.

use std::sync::Arc;

use ash::vk;
use bitflags::bitflags;

use super::device::VulkanDeviceSet;
use super::gpu_params::VulkanGpuParams;
use super::param_info::VulkanPipelineParamInfo;
use super::utility;
use crate::errors::Result;
use crate::pipeline::{ComputePipelineState, GraphicsPipelineState};
use crate::resources::DeviceMask;
use crate::settings::RhiSettings;
use crate::state::{BlendDesc, DepthStencilDesc, MAX_RENDER_TARGETS, RasterizerDesc, StencilFaceDesc};

/// States set on the command buffer rather than baked into the pipeline.
pub static DYNAMIC_STATES: [vk::DynamicState; 3] = [
    vk::DynamicState::VIEWPORT,
    vk::DynamicState::SCISSOR,
    vk::DynamicState::STENCIL_REFERENCE,
];

bitflags! {
    /// Framebuffer attachments bound read-only for a draw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReadOnlyFlags: u32 {
        const DEPTH = 1 << 0;
        const STENCIL = 1 << 1;
    }
}

// ─── Fixed Function ───────────────────────────────────────────────────────────

/// Vulkan fixed-function state derived from blend, rasterizer and
/// depth-stencil descriptors.
#[derive(Debug, Clone, Copy)]
pub struct FixedFunctionState {
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_clamp_enable: bool,
    pub depth_bias_enable: bool,
    pub depth_bias_constant: f32,
    pub depth_bias_slope: f32,
    pub depth_bias_clamp: f32,

    pub alpha_to_coverage: bool,

    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: vk::CompareOp,
    pub stencil_test_enable: bool,
    pub front: vk::StencilOpState,
    pub back: vk::StencilOpState,

    pub attachments: [vk::PipelineColorBlendAttachmentState; MAX_RENDER_TARGETS],
}

fn stencil_state(face: &StencilFaceDesc, desc: &DepthStencilDesc) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: utility::stencil_op(face.fail_op),
        pass_op: utility::stencil_op(face.pass_op),
        depth_fail_op: utility::stencil_op(face.depth_fail_op),
        compare_op: utility::compare_op(face.compare),
        compare_mask: u32::from(desc.stencil_read_mask),
        write_mask: u32::from(desc.stencil_write_mask),
        // Set dynamically
        reference: 0,
    }
}

impl FixedFunctionState {
    #[must_use]
    pub fn new(blend: &BlendDesc, rasterizer: &RasterizerDesc, depth_stencil: &DepthStencilDesc) -> Self {
        let depth_clamp_enable = !rasterizer.depth_clip_enable;

        let attachments = std::array::from_fn(|i| {
            let rt = blend.target(i);
            vk::PipelineColorBlendAttachmentState {
                blend_enable: vk::Bool32::from(rt.blend_enable),
                src_color_blend_factor: utility::blend_factor(rt.src_blend),
                dst_color_blend_factor: utility::blend_factor(rt.dst_blend),
                color_blend_op: utility::blend_op(rt.blend_op),
                src_alpha_blend_factor: utility::blend_factor(rt.src_blend_alpha),
                dst_alpha_blend_factor: utility::blend_factor(rt.dst_blend_alpha),
                alpha_blend_op: utility::blend_op(rt.blend_op_alpha),
                color_write_mask: vk::ColorComponentFlags::from_raw(u32::from(rt.write_mask & 0x0F)),
            }
        });

        Self {
            polygon_mode: utility::polygon_mode(rasterizer.polygon_mode),
            cull_mode: utility::cull_mode(rasterizer.cull_mode),
            front_face: vk::FrontFace::CLOCKWISE,
            depth_clamp_enable,
            depth_bias_enable: rasterizer.depth_bias != 0.0,
            depth_bias_constant: rasterizer.depth_bias,
            depth_bias_slope: rasterizer.slope_scaled_depth_bias,
            // Clamp only applies with depth clamping on.
            depth_bias_clamp: if depth_clamp_enable { rasterizer.depth_bias_clamp } else { 0.0 },

            alpha_to_coverage: blend.alpha_to_coverage,

            depth_test_enable: depth_stencil.depth_read_enable,
            depth_write_enable: depth_stencil.depth_write_enable,
            depth_compare_op: utility::compare_op(depth_stencil.depth_comparison_func),
            stencil_test_enable: depth_stencil.stencil_enable,
            front: stencil_state(&depth_stencil.front, depth_stencil),
            back: stencil_state(&depth_stencil.back, depth_stencil),

            attachments,
        }
    }

    /// Copy with depth and/or stencil writes disabled for read-only attachments.
    #[must_use]
    pub fn with_read_only(&self, flags: ReadOnlyFlags) -> Self {
        let mut out = *self;
        if flags.contains(ReadOnlyFlags::DEPTH) {
            out.depth_write_enable = false;
        }
        if flags.contains(ReadOnlyFlags::STENCIL) {
            for face in [&mut out.front, &mut out.back] {
                face.pass_op = vk::StencilOp::KEEP;
                face.fail_op = vk::StencilOp::KEEP;
                face.depth_fail_op = vk::StencilOp::KEEP;
            }
        }
        out
    }

    /// Per attachment, whether the pipeline never writes it. Every entry is
    /// true when the framebuffer has no color attachments.
    #[must_use]
    pub fn color_read_only(&self, num_color_attachments: usize) -> [bool; MAX_RENDER_TARGETS] {
        if num_color_attachments == 0 {
            return [true; MAX_RENDER_TARGETS];
        }
        std::array::from_fn(|i| self.attachments[i].color_write_mask.is_empty())
    }

    #[must_use]
    pub fn rasterization_info(&self) -> vk::PipelineRasterizationStateCreateInfo<'static> {
        vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(self.depth_clamp_enable)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(self.depth_bias_enable)
            .depth_bias_constant_factor(self.depth_bias_constant)
            .depth_bias_slope_factor(self.depth_bias_slope)
            .depth_bias_clamp(self.depth_bias_clamp)
            .line_width(1.0)
    }

    #[must_use]
    pub fn depth_stencil_info(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test_enable)
            .depth_write_enable(self.depth_write_enable)
            .depth_compare_op(self.depth_compare_op)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(self.stencil_test_enable)
            .front(self.front)
            .back(self.back)
    }

    #[must_use]
    pub fn multisample_info(&self, samples: vk::SampleCountFlags) -> vk::PipelineMultisampleStateCreateInfo<'static> {
        vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(samples)
            .sample_shading_enable(false)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(self.alpha_to_coverage)
            .alpha_to_one_enable(false)
    }

    /// Blend info covering the first `num_attachments` color attachments.
    #[must_use]
    pub fn color_blend_info(&self, num_attachments: usize) -> vk::PipelineColorBlendStateCreateInfo<'_> {
        let count = num_attachments.min(MAX_RENDER_TARGETS);
        vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::NO_OP)
            .attachments(&self.attachments[..count])
            .blend_constants([0.0; 4])
    }

    #[must_use]
    pub fn dynamic_state_info() -> vk::PipelineDynamicStateCreateInfo<'static> {
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&DYNAMIC_STATES)
    }
}

// ─── Pipelines ────────────────────────────────────────────────────────────────

/// Graphics pipeline resolved against the Vulkan devices.
#[derive(Debug)]
pub struct VulkanGraphicsPipelineState {
    base: Arc<GraphicsPipelineState>,
    param_info: Arc<VulkanPipelineParamInfo>,
    fixed: FixedFunctionState,
}

impl VulkanGraphicsPipelineState {
    pub fn new(base: Arc<GraphicsPipelineState>, devices: &VulkanDeviceSet, mask: DeviceMask) -> Result<Self> {
        let fixed = FixedFunctionState::new(
            base.blend_state().properties(),
            base.rasterizer_state().properties(),
            base.depth_stencil_state().properties(),
        );
        let param_info = Arc::new(VulkanPipelineParamInfo::new(
            Arc::clone(base.param_info()),
            devices,
            mask,
        )?);
        Ok(Self {
            base,
            param_info,
            fixed,
        })
    }

    #[inline]
    #[must_use]
    pub fn base(&self) -> &Arc<GraphicsPipelineState> {
        &self.base
    }

    #[inline]
    #[must_use]
    pub fn param_info(&self) -> &Arc<VulkanPipelineParamInfo> {
        &self.param_info
    }

    #[inline]
    #[must_use]
    pub fn fixed_function(&self) -> &FixedFunctionState {
        &self.fixed
    }

    #[must_use]
    pub fn pipeline_layout(&self, device_idx: usize) -> Option<vk::PipelineLayout> {
        self.param_info.pipeline_layout(device_idx)
    }

    /// A binding table for this pipeline on all of its devices.
    pub fn create_gpu_params(&self, settings: &RhiSettings) -> Result<VulkanGpuParams> {
        VulkanGpuParams::new(Arc::clone(&self.param_info), settings)
    }
}

/// Compute pipeline resolved against the Vulkan devices.
#[derive(Debug)]
pub struct VulkanComputePipelineState {
    base: Arc<ComputePipelineState>,
    param_info: Arc<VulkanPipelineParamInfo>,
}

impl VulkanComputePipelineState {
    pub fn new(base: Arc<ComputePipelineState>, devices: &VulkanDeviceSet, mask: DeviceMask) -> Result<Self> {
        let param_info = Arc::new(VulkanPipelineParamInfo::new(
            Arc::clone(base.param_info()),
            devices,
            mask,
        )?);
        Ok(Self { base, param_info })
    }

    #[inline]
    #[must_use]
    pub fn base(&self) -> &Arc<ComputePipelineState> {
        &self.base
    }

    #[inline]
    #[must_use]
    pub fn param_info(&self) -> &Arc<VulkanPipelineParamInfo> {
        &self.param_info
    }

    #[must_use]
    pub fn pipeline_layout(&self, device_idx: usize) -> Option<vk::PipelineLayout> {
        self.param_info.pipeline_layout(device_idx)
    }

    pub fn create_gpu_params(&self, settings: &RhiSettings) -> Result<VulkanGpuParams> {
        VulkanGpuParams::new(Arc::clone(&self.param_info), settings)
    }
}
