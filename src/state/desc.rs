//! Fixed-function state descriptors.
//!
//! Plain value types describing blend, rasterizer, depth-stencil and sampler
//! state. All of them are `Eq + Hash` so they can key the state caches.
//! Floating point fields compare and hash by bit pattern: `0.0` and `-0.0`
//! are distinct keys, and a NaN equals itself.

use std::hash::{Hash, Hasher};

/// Maximum number of simultaneously bound color targets.
pub const MAX_RENDER_TARGETS: usize = 8;

// ─── Enums ────────────────────────────────────────────────────────────────────

/// Factor applied to a source or destination value during blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    #[default]
    One,
    Zero,
    DestColor,
    SourceColor,
    InvDestColor,
    InvSourceColor,
    DestAlpha,
    SourceAlpha,
    InvDestAlpha,
    InvSourceAlpha,
}

/// Operation combining the weighted source and destination values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Comparison used by depth tests, stencil tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    AlwaysFail,
    AlwaysPass,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    GreaterEqual,
    Greater,
}

/// Action performed on the stencil buffer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    #[default]
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    IncrementWrap,
    DecrementWrap,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    Wireframe,
    #[default]
    Solid,
}

/// Which winding order gets culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullingMode {
    None,
    Clockwise,
    #[default]
    CounterClockwise,
}

/// Texture filtering applied for minification, magnification or mip selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterOptions {
    /// No filtering. Only meaningful for mip filtering, where it disables mipmaps.
    None,
    Point,
    #[default]
    Linear,
    Anisotropic,
}

/// Behavior of texture coordinates outside the [0, 1] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureAddressingMode {
    #[default]
    Wrap,
    Mirror,
    Clamp,
    Border,
}

/// Color returned by border-addressed samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    #[default]
    OpaqueWhite,
}

// ─── Blend ────────────────────────────────────────────────────────────────────

/// Blending for a single render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlendDesc {
    pub blend_enable: bool,
    pub src_blend: BlendFactor,
    pub dst_blend: BlendFactor,
    pub blend_op: BlendOperation,
    pub src_blend_alpha: BlendFactor,
    pub dst_blend_alpha: BlendFactor,
    pub blend_op_alpha: BlendOperation,
    /// RGBA write bits, red in bit 0.
    pub write_mask: u8,
}

impl Default for RenderTargetBlendDesc {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_blend: BlendFactor::One,
            dst_blend: BlendFactor::Zero,
            blend_op: BlendOperation::Add,
            src_blend_alpha: BlendFactor::One,
            dst_blend_alpha: BlendFactor::Zero,
            blend_op_alpha: BlendOperation::Add,
            write_mask: 0x0F,
        }
    }
}

/// Blend state for all render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendDesc {
    pub alpha_to_coverage: bool,
    /// When false only `render_targets[0]` is used, for every target.
    pub independent_blend: bool,
    pub render_targets: [RenderTargetBlendDesc; MAX_RENDER_TARGETS],
}

impl BlendDesc {
    /// Blend settings effective for render target `index`.
    #[inline]
    #[must_use]
    pub fn target(&self, index: usize) -> &RenderTargetBlendDesc {
        if self.independent_blend {
            &self.render_targets[index]
        } else {
            &self.render_targets[0]
        }
    }
}

// ─── Rasterizer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RasterizerDesc {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullingMode,
    pub depth_bias: f32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip_enable: bool,
    pub scissor_enable: bool,
    pub multisample_enable: bool,
    pub antialiased_line_enable: bool,
}

impl Default for RasterizerDesc {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Solid,
            cull_mode: CullingMode::CounterClockwise,
            depth_bias: 0.0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip_enable: true,
            scissor_enable: false,
            multisample_enable: true,
            antialiased_line_enable: false,
        }
    }
}

impl RasterizerDesc {
    fn key(&self) -> (PolygonMode, CullingMode, [u32; 3], [bool; 4]) {
        (
            self.polygon_mode,
            self.cull_mode,
            [
                self.depth_bias.to_bits(),
                self.depth_bias_clamp.to_bits(),
                self.slope_scaled_depth_bias.to_bits(),
            ],
            [
                self.depth_clip_enable,
                self.scissor_enable,
                self.multisample_enable,
                self.antialiased_line_enable,
            ],
        )
    }
}

impl PartialEq for RasterizerDesc {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for RasterizerDesc {}

impl Hash for RasterizerDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

// ─── Depth / Stencil ──────────────────────────────────────────────────────────

/// Stencil behavior for one face orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceDesc {
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
    pub compare: CompareFunction,
}

impl Default for StencilFaceDesc {
    fn default() -> Self {
        Self {
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
            compare: CompareFunction::AlwaysPass,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDesc {
    pub depth_read_enable: bool,
    pub depth_write_enable: bool,
    pub depth_comparison_func: CompareFunction,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front: StencilFaceDesc,
    pub back: StencilFaceDesc,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_read_enable: true,
            depth_write_enable: true,
            depth_comparison_func: CompareFunction::Less,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front: StencilFaceDesc::default(),
            back: StencilFaceDesc::default(),
        }
    }
}

// ─── Sampler ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SamplerDesc {
    pub address_u: TextureAddressingMode,
    pub address_v: TextureAddressingMode,
    pub address_w: TextureAddressingMode,
    pub min_filter: FilterOptions,
    pub mag_filter: FilterOptions,
    pub mip_filter: FilterOptions,
    /// Zero disables anisotropic filtering.
    pub max_anisotropy: u32,
    pub mip_bias: f32,
    pub mip_min: f32,
    pub mip_max: f32,
    pub border_color: BorderColor,
    /// Anything other than `AlwaysPass` turns this into a comparison sampler.
    pub comparison_func: CompareFunction,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            address_u: TextureAddressingMode::Wrap,
            address_v: TextureAddressingMode::Wrap,
            address_w: TextureAddressingMode::Wrap,
            min_filter: FilterOptions::Linear,
            mag_filter: FilterOptions::Linear,
            mip_filter: FilterOptions::Linear,
            max_anisotropy: 0,
            mip_bias: 0.0,
            mip_min: f32::MIN,
            mip_max: f32::MAX,
            border_color: BorderColor::OpaqueWhite,
            comparison_func: CompareFunction::AlwaysPass,
        }
    }
}

impl SamplerDesc {
    fn key(&self) -> ([TextureAddressingMode; 3], [FilterOptions; 3], u32, [u32; 3], BorderColor, CompareFunction) {
        (
            [self.address_u, self.address_v, self.address_w],
            [self.min_filter, self.mag_filter, self.mip_filter],
            self.max_anisotropy,
            [self.mip_bias.to_bits(), self.mip_min.to_bits(), self.mip_max.to_bits()],
            self.border_color,
            self.comparison_func,
        )
    }

    #[inline]
    #[must_use]
    pub fn is_comparison(&self) -> bool {
        self.comparison_func != CompareFunction::AlwaysPass
    }
}

impl PartialEq for SamplerDesc {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SamplerDesc {}

impl Hash for SamplerDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

// ─── Hashing ──────────────────────────────────────────────────────────────────

/// Deterministic 64-bit hash of a descriptor.
///
/// FxHash has no per-process seed, so the value is stable across runs.
#[inline]
#[must_use]
pub fn hash_desc<K: Hash>(key: &K) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}
