//! State descriptor → `wgpu` conversions.
//!
//! `wgpu` folds fixed-function state into render pipeline descriptors, so the
//! conversions here produce the pieces a `wgpu::RenderPipelineDescriptor` is
//! assembled from. Front faces are clockwise, matching the Vulkan backend.
//!
//! `RasterizerDesc::depth_clip_enable == false` maps to `unclipped_depth`,
//! which needs `wgpu::Features::DEPTH_CLIP_CONTROL` on the device.

use crate::state::{
    BlendDesc, BlendFactor, BlendOperation, BorderColor, CompareFunction, CullingMode, DepthStencilDesc,
    FilterOptions, PolygonMode, RasterizerDesc, SamplerDesc, StencilFaceDesc, StencilOperation,
    TextureAddressingMode,
};

/// Anisotropy clamp is capped by wgpu at 16.
const MAX_ANISOTROPY: u16 = 16;

// ─── Enum Mappings ────────────────────────────────────────────────────────────

#[must_use]
pub fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::DestColor => wgpu::BlendFactor::Dst,
        BlendFactor::SourceColor => wgpu::BlendFactor::Src,
        BlendFactor::InvDestColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::InvSourceColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DestAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::SourceAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvDestAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::InvSourceAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

#[must_use]
pub fn blend_operation(op: BlendOperation) -> wgpu::BlendOperation {
    match op {
        BlendOperation::Add => wgpu::BlendOperation::Add,
        BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
        BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOperation::Min => wgpu::BlendOperation::Min,
        BlendOperation::Max => wgpu::BlendOperation::Max,
    }
}

#[must_use]
pub fn compare_function(func: CompareFunction) -> wgpu::CompareFunction {
    match func {
        CompareFunction::AlwaysFail => wgpu::CompareFunction::Never,
        CompareFunction::AlwaysPass => wgpu::CompareFunction::Always,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
    }
}

#[must_use]
pub fn stencil_operation(op: StencilOperation) -> wgpu::StencilOperation {
    match op {
        StencilOperation::Keep => wgpu::StencilOperation::Keep,
        StencilOperation::Zero => wgpu::StencilOperation::Zero,
        StencilOperation::Replace => wgpu::StencilOperation::Replace,
        StencilOperation::Increment => wgpu::StencilOperation::IncrementClamp,
        StencilOperation::Decrement => wgpu::StencilOperation::DecrementClamp,
        StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
        StencilOperation::Invert => wgpu::StencilOperation::Invert,
    }
}

#[must_use]
pub fn address_mode(mode: TextureAddressingMode) -> wgpu::AddressMode {
    match mode {
        TextureAddressingMode::Wrap => wgpu::AddressMode::Repeat,
        TextureAddressingMode::Mirror => wgpu::AddressMode::MirrorRepeat,
        TextureAddressingMode::Clamp => wgpu::AddressMode::ClampToEdge,
        TextureAddressingMode::Border => wgpu::AddressMode::ClampToBorder,
    }
}

#[must_use]
pub fn filter_mode(filter: FilterOptions) -> wgpu::FilterMode {
    match filter {
        FilterOptions::Linear | FilterOptions::Anisotropic => wgpu::FilterMode::Linear,
        FilterOptions::Point | FilterOptions::None => wgpu::FilterMode::Nearest,
    }
}

#[must_use]
pub fn mipmap_filter_mode(filter: FilterOptions) -> wgpu::MipmapFilterMode {
    match filter {
        FilterOptions::Linear | FilterOptions::Anisotropic => wgpu::MipmapFilterMode::Linear,
        FilterOptions::Point | FilterOptions::None => wgpu::MipmapFilterMode::Nearest,
    }
}

#[must_use]
pub fn border_color(color: BorderColor) -> wgpu::SamplerBorderColor {
    match color {
        BorderColor::TransparentBlack => wgpu::SamplerBorderColor::TransparentBlack,
        BorderColor::OpaqueBlack => wgpu::SamplerBorderColor::OpaqueBlack,
        BorderColor::OpaqueWhite => wgpu::SamplerBorderColor::OpaqueWhite,
    }
}

#[must_use]
pub fn cull_mode(mode: CullingMode) -> Option<wgpu::Face> {
    match mode {
        CullingMode::None => None,
        CullingMode::Clockwise => Some(wgpu::Face::Front),
        CullingMode::CounterClockwise => Some(wgpu::Face::Back),
    }
}

#[must_use]
pub fn polygon_mode(mode: PolygonMode) -> wgpu::PolygonMode {
    match mode {
        PolygonMode::Wireframe => wgpu::PolygonMode::Line,
        PolygonMode::Solid => wgpu::PolygonMode::Fill,
    }
}

// ─── Pipeline Pieces ──────────────────────────────────────────────────────────

/// One color target per entry of `formats`, blended per `desc`.
#[must_use]
pub fn color_targets(desc: &BlendDesc, formats: &[wgpu::TextureFormat]) -> Vec<Option<wgpu::ColorTargetState>> {
    formats
        .iter()
        .enumerate()
        .map(|(i, &format)| {
            let target = desc.target(i);
            let blend = target.blend_enable.then(|| wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: blend_factor(target.src_blend),
                    dst_factor: blend_factor(target.dst_blend),
                    operation: blend_operation(target.blend_op),
                },
                alpha: wgpu::BlendComponent {
                    src_factor: blend_factor(target.src_blend_alpha),
                    dst_factor: blend_factor(target.dst_blend_alpha),
                    operation: blend_operation(target.blend_op_alpha),
                },
            });
            Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::from_bits_truncate(u32::from(target.write_mask & 0x0F)),
            })
        })
        .collect()
}

#[must_use]
pub fn primitive_state(desc: &RasterizerDesc, topology: wgpu::PrimitiveTopology) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology,
        front_face: wgpu::FrontFace::Cw,
        cull_mode: cull_mode(desc.cull_mode),
        polygon_mode: polygon_mode(desc.polygon_mode),
        unclipped_depth: !desc.depth_clip_enable,
        ..Default::default()
    }
}

#[must_use]
pub fn multisample_state(blend: &BlendDesc, count: u32) -> wgpu::MultisampleState {
    wgpu::MultisampleState {
        count,
        mask: !0,
        alpha_to_coverage_enabled: blend.alpha_to_coverage,
    }
}

fn stencil_face(face: &StencilFaceDesc) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: compare_function(face.compare),
        fail_op: stencil_operation(face.fail_op),
        depth_fail_op: stencil_operation(face.depth_fail_op),
        pass_op: stencil_operation(face.pass_op),
    }
}

/// Depth-stencil state for a `format` attachment, with the rasterizer's bias.
#[must_use]
pub fn depth_stencil_state(
    desc: &DepthStencilDesc,
    rasterizer: &RasterizerDesc,
    format: wgpu::TextureFormat,
) -> wgpu::DepthStencilState {
    let stencil = if desc.stencil_enable {
        wgpu::StencilState {
            front: stencil_face(&desc.front),
            back: stencil_face(&desc.back),
            read_mask: u32::from(desc.stencil_read_mask),
            write_mask: u32::from(desc.stencil_write_mask),
        }
    } else {
        wgpu::StencilState::default()
    };

    wgpu::DepthStencilState {
        format,
        depth_write_enabled: Some(desc.depth_write_enable),
        depth_compare: Some(if desc.depth_read_enable {
            compare_function(desc.depth_comparison_func)
        } else {
            wgpu::CompareFunction::Always
        }),
        stencil,
        bias: wgpu::DepthBiasState {
            constant: rasterizer.depth_bias as i32,
            slope_scale: rasterizer.slope_scaled_depth_bias,
            clamp: rasterizer.depth_bias_clamp,
        },
    }
}

/// Sampler descriptor equivalent to `desc`.
///
/// Anisotropy only applies when every filter is linear, as wgpu requires.
#[must_use]
pub fn sampler_descriptor<'a>(desc: &SamplerDesc, label: Option<&'a str>) -> wgpu::SamplerDescriptor<'a> {
    let all_linear = [desc.min_filter, desc.mag_filter, desc.mip_filter]
        .iter()
        .all(|f| matches!(f, FilterOptions::Linear | FilterOptions::Anisotropic));
    let anisotropic = desc.min_filter == FilterOptions::Anisotropic || desc.mag_filter == FilterOptions::Anisotropic;
    let anisotropy_clamp = if anisotropic && all_linear {
        desc.max_anisotropy.clamp(1, u32::from(MAX_ANISOTROPY)) as u16
    } else {
        1
    };

    let uses_border = [desc.address_u, desc.address_v, desc.address_w].contains(&TextureAddressingMode::Border);
    let lod_min_clamp = desc.mip_min.max(0.0);

    wgpu::SamplerDescriptor {
        label,
        address_mode_u: address_mode(desc.address_u),
        address_mode_v: address_mode(desc.address_v),
        address_mode_w: address_mode(desc.address_w),
        mag_filter: filter_mode(desc.mag_filter),
        min_filter: filter_mode(desc.min_filter),
        mipmap_filter: mipmap_filter_mode(desc.mip_filter),
        lod_min_clamp,
        lod_max_clamp: desc.mip_max.clamp(lod_min_clamp, 32.0),
        compare: desc.is_comparison().then(|| compare_function(desc.comparison_func)),
        anisotropy_clamp,
        border_color: uses_border.then(|| border_color(desc.border_color)),
    }
}
