//! Enum and flag translation between the generic layer and Vulkan.

use ash::vk;
use ash::vk::Handle;

use crate::params::{GpuBufferFormat, GpuParamObjectType, ParamType, ShaderStages, SlotInfo};
use crate::resources::{NativeHandle, TextureSurface, TextureUsage};
use crate::state::{
    BlendFactor, BlendOperation, BorderColor, CompareFunction, CullingMode, FilterOptions, PolygonMode, SamplerDesc,
    StencilOperation, TextureAddressingMode,
};

// ─── Handles ──────────────────────────────────────────────────────────────────

#[inline]
#[must_use]
pub fn to_vk<H: Handle>(handle: NativeHandle) -> H {
    H::from_raw(handle.raw())
}

#[inline]
#[must_use]
pub fn from_vk<H: Handle>(handle: H) -> NativeHandle {
    NativeHandle(handle.as_raw())
}

/// Converts an optional native handle, mapping `None` to the Vulkan null handle.
#[inline]
#[must_use]
pub fn to_vk_or_null<H: Handle>(handle: Option<NativeHandle>) -> H {
    to_vk(handle.unwrap_or(NativeHandle::NULL))
}

// ─── Binding Types ────────────────────────────────────────────────────────────

/// Descriptor type of a buffer binding, by declared object type.
#[must_use]
pub fn buffer_descriptor_type(ty: GpuParamObjectType) -> vk::DescriptorType {
    if ty.is_structured_buffer() {
        vk::DescriptorType::STORAGE_BUFFER
    } else if ty.is_writable_buffer() {
        vk::DescriptorType::STORAGE_TEXEL_BUFFER
    } else {
        vk::DescriptorType::UNIFORM_TEXEL_BUFFER
    }
}

/// Descriptor type of a layout slot.
#[must_use]
pub fn descriptor_type(slot: &SlotInfo) -> vk::DescriptorType {
    match slot.ty {
        ParamType::ParamBlock => vk::DescriptorType::UNIFORM_BUFFER,
        ParamType::Texture if slot.is_combined_image_sampler() => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        ParamType::Texture => vk::DescriptorType::SAMPLED_IMAGE,
        ParamType::LoadStoreTexture => vk::DescriptorType::STORAGE_IMAGE,
        ParamType::SamplerState => vk::DescriptorType::SAMPLER,
        ParamType::Buffer => slot
            .object_type
            .map_or(vk::DescriptorType::UNIFORM_TEXEL_BUFFER, buffer_descriptor_type),
    }
}

#[must_use]
pub fn shader_stage_flags(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut out = vk::ShaderStageFlags::empty();
    let pairs = [
        (ShaderStages::VERTEX, vk::ShaderStageFlags::VERTEX),
        (ShaderStages::FRAGMENT, vk::ShaderStageFlags::FRAGMENT),
        (ShaderStages::GEOMETRY, vk::ShaderStageFlags::GEOMETRY),
        (ShaderStages::HULL, vk::ShaderStageFlags::TESSELLATION_CONTROL),
        (ShaderStages::DOMAIN, vk::ShaderStageFlags::TESSELLATION_EVALUATION),
        (ShaderStages::COMPUTE, vk::ShaderStageFlags::COMPUTE),
    ];
    for (ours, theirs) in pairs {
        if stages.contains(ours) {
            out |= theirs;
        }
    }
    out
}

/// Pipeline stages in which shaders of `stages` access resources.
#[must_use]
pub fn shader_to_pipeline_stage(stages: vk::ShaderStageFlags) -> vk::PipelineStageFlags {
    let pairs = [
        (vk::ShaderStageFlags::VERTEX, vk::PipelineStageFlags::VERTEX_SHADER),
        (vk::ShaderStageFlags::FRAGMENT, vk::PipelineStageFlags::FRAGMENT_SHADER),
        (vk::ShaderStageFlags::GEOMETRY, vk::PipelineStageFlags::GEOMETRY_SHADER),
        (
            vk::ShaderStageFlags::TESSELLATION_CONTROL,
            vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER,
        ),
        (
            vk::ShaderStageFlags::TESSELLATION_EVALUATION,
            vk::PipelineStageFlags::TESSELLATION_EVALUATION_SHADER,
        ),
        (vk::ShaderStageFlags::COMPUTE, vk::PipelineStageFlags::COMPUTE_SHADER),
    ];
    pairs
        .into_iter()
        .filter(|(shader, _)| stages.contains(*shader))
        .fold(vk::PipelineStageFlags::empty(), |acc, (_, stage)| acc | stage)
}

#[must_use]
pub fn buffer_format(format: GpuBufferFormat) -> vk::Format {
    match format {
        GpuBufferFormat::Float1 => vk::Format::R32_SFLOAT,
        GpuBufferFormat::Float2 => vk::Format::R32G32_SFLOAT,
        GpuBufferFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        GpuBufferFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
        GpuBufferFormat::Half1 => vk::Format::R16_SFLOAT,
        GpuBufferFormat::Half2 => vk::Format::R16G16_SFLOAT,
        GpuBufferFormat::Half4 => vk::Format::R16G16B16A16_SFLOAT,
        GpuBufferFormat::Int1 => vk::Format::R32_SINT,
        GpuBufferFormat::Int2 => vk::Format::R32G32_SINT,
        GpuBufferFormat::Int3 => vk::Format::R32G32B32_SINT,
        GpuBufferFormat::Int4 => vk::Format::R32G32B32A32_SINT,
        GpuBufferFormat::UInt1 => vk::Format::R32_UINT,
        GpuBufferFormat::UInt2 => vk::Format::R32G32_UINT,
        GpuBufferFormat::UInt3 => vk::Format::R32G32B32_UINT,
        GpuBufferFormat::UInt4 => vk::Format::R32G32B32A32_UINT,
        GpuBufferFormat::Unorm1 => vk::Format::R8_UNORM,
        GpuBufferFormat::Unorm2 => vk::Format::R8G8_UNORM,
        GpuBufferFormat::Unorm4 => vk::Format::R8G8B8A8_UNORM,
        GpuBufferFormat::Unknown => vk::Format::UNDEFINED,
    }
}

/// Subresource range covered by `surface`, which must already be resolved.
#[must_use]
pub fn subresource_range(surface: &TextureSurface, usage: TextureUsage) -> vk::ImageSubresourceRange {
    let aspect_mask = if usage.contains(TextureUsage::DEPTH_STENCIL) {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    };
    vk::ImageSubresourceRange::default()
        .aspect_mask(aspect_mask)
        .base_mip_level(surface.mip_level)
        .level_count(surface.num_mip_levels)
        .base_array_layer(surface.face)
        .layer_count(surface.num_faces)
}

// ─── Fixed Function ───────────────────────────────────────────────────────────

#[must_use]
pub fn blend_factor(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::DestColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::SourceColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::InvDestColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::InvSourceColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DestAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::SourceAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::InvDestAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::InvSourceAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
    }
}

#[must_use]
pub fn blend_op(op: BlendOperation) -> vk::BlendOp {
    match op {
        BlendOperation::Add => vk::BlendOp::ADD,
        BlendOperation::Subtract => vk::BlendOp::SUBTRACT,
        BlendOperation::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOperation::Min => vk::BlendOp::MIN,
        BlendOperation::Max => vk::BlendOp::MAX,
    }
}

#[must_use]
pub fn compare_op(func: CompareFunction) -> vk::CompareOp {
    match func {
        CompareFunction::AlwaysFail => vk::CompareOp::NEVER,
        CompareFunction::AlwaysPass => vk::CompareOp::ALWAYS,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
    }
}

/// Front faces are clockwise, so culling clockwise triangles culls front faces.
#[must_use]
pub fn cull_mode(mode: CullingMode) -> vk::CullModeFlags {
    match mode {
        CullingMode::None => vk::CullModeFlags::NONE,
        CullingMode::Clockwise => vk::CullModeFlags::FRONT,
        CullingMode::CounterClockwise => vk::CullModeFlags::BACK,
    }
}

#[must_use]
pub fn polygon_mode(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Wireframe => vk::PolygonMode::LINE,
        PolygonMode::Solid => vk::PolygonMode::FILL,
    }
}

#[must_use]
pub fn stencil_op(op: StencilOperation) -> vk::StencilOp {
    match op {
        StencilOperation::Keep => vk::StencilOp::KEEP,
        StencilOperation::Zero => vk::StencilOp::ZERO,
        StencilOperation::Replace => vk::StencilOp::REPLACE,
        StencilOperation::Increment => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOperation::Decrement => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOperation::IncrementWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOperation::DecrementWrap => vk::StencilOp::DECREMENT_AND_WRAP,
        StencilOperation::Invert => vk::StencilOp::INVERT,
    }
}

#[must_use]
pub fn filter(filter: FilterOptions) -> vk::Filter {
    match filter {
        FilterOptions::Linear | FilterOptions::Anisotropic => vk::Filter::LINEAR,
        FilterOptions::Point | FilterOptions::None => vk::Filter::NEAREST,
    }
}

#[must_use]
pub fn mip_filter(filter: FilterOptions) -> vk::SamplerMipmapMode {
    match filter {
        FilterOptions::Linear | FilterOptions::Anisotropic => vk::SamplerMipmapMode::LINEAR,
        FilterOptions::Point | FilterOptions::None => vk::SamplerMipmapMode::NEAREST,
    }
}

#[must_use]
pub fn address_mode(mode: TextureAddressingMode) -> vk::SamplerAddressMode {
    match mode {
        TextureAddressingMode::Wrap => vk::SamplerAddressMode::REPEAT,
        TextureAddressingMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        TextureAddressingMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        TextureAddressingMode::Border => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

#[must_use]
pub fn border_color(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        BorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

/// Sampler create info equivalent to `desc`.
#[must_use]
pub fn sampler_create_info(desc: &SamplerDesc) -> vk::SamplerCreateInfo<'static> {
    let anisotropic = desc.min_filter == FilterOptions::Anisotropic
        || desc.mag_filter == FilterOptions::Anisotropic
        || desc.mip_filter == FilterOptions::Anisotropic;

    vk::SamplerCreateInfo::default()
        .mag_filter(filter(desc.mag_filter))
        .min_filter(filter(desc.min_filter))
        .mipmap_mode(mip_filter(desc.mip_filter))
        .address_mode_u(address_mode(desc.address_u))
        .address_mode_v(address_mode(desc.address_v))
        .address_mode_w(address_mode(desc.address_w))
        .mip_lod_bias(desc.mip_bias)
        .anisotropy_enable(anisotropic)
        .max_anisotropy(desc.max_anisotropy.max(1) as f32)
        .compare_enable(desc.is_comparison())
        .compare_op(compare_op(desc.comparison_func))
        .min_lod(desc.mip_min.max(0.0))
        .max_lod(desc.mip_max.min(vk::LOD_CLAMP_NONE))
        .border_color(border_color(desc.border_color))
        .unnormalized_coordinates(false)
}
