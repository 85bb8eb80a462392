//! Immutable fixed-function state objects.
//!
//! - [`desc`]: plain descriptors (blend, rasterizer, depth-stencil, sampler)
//! - [`object`]: sim-thread and core-thread state objects
//! - [`manager`]: deduplicating factories for both threads
//! - [`cache`]: the weak-reference cache behind the managers

pub mod cache;
pub mod desc;
pub mod manager;
pub mod object;

pub use cache::{CacheStats, StateId};
pub use desc::{
    BlendDesc, BlendFactor, BlendOperation, BorderColor, CompareFunction, CullingMode, DepthStencilDesc,
    FilterOptions, MAX_RENDER_TARGETS, PolygonMode, RasterizerDesc, RenderTargetBlendDesc, SamplerDesc,
    StencilFaceDesc, StencilOperation, TextureAddressingMode, hash_desc,
};
pub use manager::{CoreStateManager, HeadlessStateFactory, NativeStateFactory, StateManager, StateStats};
pub use object::{
    BlendState, CoreBlendState, CoreDepthStencilState, CoreRasterizerState, CoreSamplerState, CoreState,
    DepthStencilState, RasterizerState, SamplerHandles, SamplerState, SimState, StateDesc,
};
