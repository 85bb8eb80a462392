//! Shader reflection tables.
//!
//! A [`GpuParamDesc`] lists everything one shader stage declares: parameter
//! blocks, data parameters inside them, and the object parameters (textures,
//! load-store textures, buffers, samplers) with their (set, slot) locations.
//! The tables come from an external reflection step and are consumed here
//! read-only. They are serde types so they can be cached on disk next to
//! compiled shaders.

use serde::{Deserialize, Serialize};

// ─── Enums ────────────────────────────────────────────────────────────────────

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GpuProgramType {
    Vertex,
    Fragment,
    Geometry,
    Hull,
    Domain,
    Compute,
}

impl GpuProgramType {
    pub const COUNT: usize = 6;

    /// All stages, in the order bindings are discovered.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Vertex,
        Self::Fragment,
        Self::Geometry,
        Self::Hull,
        Self::Domain,
        Self::Compute,
    ];

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Kind of object parameter as declared in shader code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GpuParamObjectType {
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Sampler2DMS,
    Texture1D,
    Texture2D,
    Texture3D,
    TextureCube,
    Texture2DMS,
    Texture1DArray,
    Texture2DArray,
    Texture2DMSArray,
    TextureCubeArray,
    /// Read-only typed buffer.
    TypedBuffer,
    /// Read-only raw buffer.
    ByteBuffer,
    StructuredBuffer,
    RwTypedBuffer,
    RwByteBuffer,
    RwStructuredBuffer,
    RwStructuredBufferWithCounter,
    RwAppendBuffer,
    RwConsumeBuffer,
    RwTexture1D,
    RwTexture2D,
    RwTexture3D,
    RwTexture2DMS,
    RwTexture1DArray,
    RwTexture2DArray,
    RwTexture2DMSArray,
}

impl GpuParamObjectType {
    #[must_use]
    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            Self::Sampler1D | Self::Sampler2D | Self::Sampler3D | Self::SamplerCube | Self::Sampler2DMS
        )
    }

    /// Sampled (read-only) texture.
    #[must_use]
    pub fn is_texture(self) -> bool {
        matches!(
            self,
            Self::Texture1D
                | Self::Texture2D
                | Self::Texture3D
                | Self::TextureCube
                | Self::Texture2DMS
                | Self::Texture1DArray
                | Self::Texture2DArray
                | Self::Texture2DMSArray
                | Self::TextureCubeArray
        )
    }

    #[must_use]
    pub fn is_load_store_texture(self) -> bool {
        matches!(
            self,
            Self::RwTexture1D
                | Self::RwTexture2D
                | Self::RwTexture3D
                | Self::RwTexture2DMS
                | Self::RwTexture1DArray
                | Self::RwTexture2DArray
                | Self::RwTexture2DMSArray
        )
    }

    #[must_use]
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            Self::TypedBuffer
                | Self::ByteBuffer
                | Self::StructuredBuffer
                | Self::RwTypedBuffer
                | Self::RwByteBuffer
                | Self::RwStructuredBuffer
                | Self::RwStructuredBufferWithCounter
                | Self::RwAppendBuffer
                | Self::RwConsumeBuffer
        )
    }

    /// Buffer addressed as an array of structs rather than through a texel view.
    #[must_use]
    pub fn is_structured_buffer(self) -> bool {
        matches!(
            self,
            Self::StructuredBuffer
                | Self::RwStructuredBuffer
                | Self::RwStructuredBufferWithCounter
                | Self::RwAppendBuffer
                | Self::RwConsumeBuffer
        )
    }

    /// Buffer the shader can write to.
    #[must_use]
    pub fn is_writable_buffer(self) -> bool {
        self.is_buffer() && !matches!(self, Self::TypedBuffer | Self::ByteBuffer | Self::StructuredBuffer)
    }
}

/// Element format of typed buffers and of texture channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GpuBufferFormat {
    Float1,
    Float2,
    Float3,
    #[default]
    Float4,
    Half1,
    Half2,
    Half4,
    Int1,
    Int2,
    Int3,
    Int4,
    UInt1,
    UInt2,
    UInt3,
    UInt4,
    Unorm1,
    Unorm2,
    Unorm4,
    /// Format not known at reflection time (raw and structured buffers).
    Unknown,
}

impl GpuBufferFormat {
    /// Element size in bytes, 0 for `Unknown`.
    #[must_use]
    pub fn size(self) -> u32 {
        match self {
            Self::Float1 | Self::Int1 | Self::UInt1 | Self::Half2 | Self::Unorm4 => 4,
            Self::Float2 | Self::Int2 | Self::UInt2 | Self::Half4 => 8,
            Self::Float3 | Self::Int3 | Self::UInt3 => 12,
            Self::Float4 | Self::Int4 | Self::UInt4 => 16,
            Self::Half1 | Self::Unorm2 => 2,
            Self::Unorm1 => 1,
            Self::Unknown => 0,
        }
    }
}

/// Type of a data parameter stored inside a parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GpuDataParamType {
    Float1,
    Float2,
    Float3,
    Float4,
    Matrix3x3,
    Matrix4x4,
    Int1,
    Int2,
    Int3,
    Int4,
    Bool,
    Struct,
}

// ─── Entries ──────────────────────────────────────────────────────────────────

/// A uniform block declared by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuParamBlockDesc {
    pub name: String,
    pub set: u32,
    pub slot: u32,
    /// Size in bytes.
    pub block_size: u32,
    /// Whether the block may be shared between multiple `GpuParams`.
    pub is_shareable: bool,
}

/// A texture, buffer or sampler declared by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuParamObjectDesc {
    pub name: String,
    pub set: u32,
    pub slot: u32,
    #[serde(rename = "type")]
    pub ty: GpuParamObjectType,
    #[serde(default)]
    pub element_type: GpuBufferFormat,
    #[serde(default = "one")]
    pub array_size: u32,
}

/// A scalar, vector, matrix or struct living inside a parameter block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuParamDataDesc {
    pub name: String,
    /// Name of the block the parameter is stored in.
    pub block: String,
    #[serde(rename = "type")]
    pub ty: GpuDataParamType,
    #[serde(default = "one")]
    pub array_size: u32,
    /// Offset from the start of the block, in bytes.
    #[serde(default)]
    pub offset: u32,
}

fn one() -> u32 {
    1
}

// ─── Table ────────────────────────────────────────────────────────────────────

/// Everything one shader stage declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuParamDesc {
    pub param_blocks: Vec<GpuParamBlockDesc>,
    pub params: Vec<GpuParamDataDesc>,
    pub textures: Vec<GpuParamObjectDesc>,
    pub load_store_textures: Vec<GpuParamObjectDesc>,
    pub buffers: Vec<GpuParamObjectDesc>,
    pub samplers: Vec<GpuParamObjectDesc>,
}

impl GpuParamDesc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_param_block(mut self, name: &str, set: u32, slot: u32, block_size: u32) -> Self {
        self.param_blocks.push(GpuParamBlockDesc {
            name: name.to_owned(),
            set,
            slot,
            block_size,
            is_shareable: true,
        });
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, block: &str, ty: GpuDataParamType) -> Self {
        self.params.push(GpuParamDataDesc {
            name: name.to_owned(),
            block: block.to_owned(),
            ty,
            array_size: 1,
            offset: 0,
        });
        self
    }

    #[must_use]
    pub fn with_texture(mut self, name: &str, set: u32, slot: u32, ty: GpuParamObjectType) -> Self {
        self.textures.push(object(name, set, slot, ty));
        self
    }

    #[must_use]
    pub fn with_load_store_texture(mut self, name: &str, set: u32, slot: u32, ty: GpuParamObjectType) -> Self {
        self.load_store_textures.push(object(name, set, slot, ty));
        self
    }

    #[must_use]
    pub fn with_buffer(mut self, name: &str, set: u32, slot: u32, ty: GpuParamObjectType) -> Self {
        self.buffers.push(object(name, set, slot, ty));
        self
    }

    #[must_use]
    pub fn with_sampler(mut self, name: &str, set: u32, slot: u32, ty: GpuParamObjectType) -> Self {
        self.samplers.push(object(name, set, slot, ty));
        self
    }

    #[must_use]
    pub fn param_block(&self, name: &str) -> Option<&GpuParamBlockDesc> {
        self.param_blocks.iter().find(|b| b.name == name)
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&GpuParamDataDesc> {
        self.params.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&GpuParamObjectDesc> {
        find(&self.textures, name)
    }

    #[must_use]
    pub fn load_store_texture(&self, name: &str) -> Option<&GpuParamObjectDesc> {
        find(&self.load_store_textures, name)
    }

    #[must_use]
    pub fn buffer(&self, name: &str) -> Option<&GpuParamObjectDesc> {
        find(&self.buffers, name)
    }

    #[must_use]
    pub fn sampler(&self, name: &str) -> Option<&GpuParamObjectDesc> {
        find(&self.samplers, name)
    }

    /// True if the stage declares no resources at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.param_blocks.is_empty()
            && self.textures.is_empty()
            && self.load_store_textures.is_empty()
            && self.buffers.is_empty()
            && self.samplers.is_empty()
    }
}

fn object(name: &str, set: u32, slot: u32, ty: GpuParamObjectType) -> GpuParamObjectDesc {
    GpuParamObjectDesc {
        name: name.to_owned(),
        set,
        slot,
        ty,
        element_type: GpuBufferFormat::default(),
        array_size: 1,
    }
}

fn find<'a>(list: &'a [GpuParamObjectDesc], name: &str) -> Option<&'a GpuParamObjectDesc> {
    list.iter().find(|o| o.name == name)
}
