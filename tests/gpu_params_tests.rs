//! Binding Table Tests
//!
//! Tests for:
//! - Slot setters and getters addressed by (set, slot) and by name
//! - Unknown slots leaving the table untouched
//! - Version bumps on mutation
//! - Pipelines creating tables for their own layout

mod common;

use std::sync::Arc;

use common::{MockBuffer, MockParamBlock, MockTexture};
use pipestate::params::{GpuParamDesc, GpuParamObjectType, GpuProgramType, GpuParams};
use pipestate::pipeline::{ComputePipelineState, GpuProgram, GraphicsPipelineState, PipelineStateDesc};
use pipestate::resources::{GpuParamBlockBuffer, Texture, TextureSurface};
use pipestate::state::CoreStateManager;

fn lit_pipeline(states: &CoreStateManager) -> GraphicsPipelineState {
    let vs = GpuParamDesc::new()
        .with_param_block("PerCamera", 0, 0, 128)
        .with_buffer("gBones", 0, 4, GpuParamObjectType::StructuredBuffer);
    let fs = GpuParamDesc::new()
        .with_param_block("PerCamera", 0, 0, 128)
        .with_param_block("Material", 1, 0, 48)
        .with_texture("gAlbedo", 1, 1, GpuParamObjectType::Texture2D)
        .with_sampler("gAlbedo", 1, 1, GpuParamObjectType::Sampler2D);
    let desc = PipelineStateDesc {
        vertex_program: Some(Arc::new(GpuProgram::new(GpuProgramType::Vertex, "vsMain", vs))),
        fragment_program: Some(Arc::new(GpuProgram::new(GpuProgramType::Fragment, "fsMain", fs))),
        ..Default::default()
    };
    GraphicsPipelineState::new(desc, states).unwrap()
}

fn table() -> (CoreStateManager, GpuParams) {
    let states = CoreStateManager::headless();
    let params = lit_pipeline(&states).create_gpu_params();
    (states, params)
}

// ============================================================================
// Slot Access
// ============================================================================

#[test]
fn fresh_table_is_unbound() {
    let (_states, params) = table();

    assert!(params.param_block_buffer(0, 0).is_none());
    assert!(params.texture(1, 1).is_none());
    assert!(params.sampler_state(1, 1).is_none());
    assert!(params.buffer(0, 4).is_none());
    assert_eq!(params.texture_surface(1, 1), TextureSurface::COMPLETE);
}

#[test]
fn bound_resources_are_returned() {
    let (states, mut params) = table();
    let albedo: Arc<dyn Texture> = MockTexture::new(0x3000, 0x3100);
    let sampler = states.default_sampler_state().unwrap();
    let surface = TextureSurface {
        mip_level: 1,
        num_mip_levels: 2,
        face: 0,
        num_faces: 1,
    };

    assert!(params.set_texture(1, 1, Some(Arc::clone(&albedo)), surface));
    assert!(params.set_sampler_state(1, 1, Some(Arc::clone(&sampler))));
    assert!(params.set_buffer(0, 4, Some(MockBuffer::new(0x4000, 0x4100))));

    assert!(Arc::ptr_eq(params.texture(1, 1).unwrap(), &albedo));
    assert_eq!(params.texture_surface(1, 1), surface);
    assert!(Arc::ptr_eq(params.sampler_state(1, 1).unwrap(), &sampler));
    assert!(params.buffer(0, 4).is_some());

    let seq = params.param_info().sequential_slot(pipestate::ParamType::Texture, 1, 1).unwrap();
    assert!(params.texture_at(seq).is_some());
}

#[test]
fn clearing_a_slot_unbinds_it() {
    let (_states, mut params) = table();
    params.set_buffer(0, 4, Some(MockBuffer::new(0x4000, 0x4100)));
    assert!(params.set_buffer(0, 4, None));
    assert!(params.buffer(0, 4).is_none());
}

#[test]
fn unknown_slot_changes_nothing() {
    let (_states, mut params) = table();
    let before = params.version();

    assert!(!params.set_texture(0, 4, Some(MockTexture::new(0x3000, 0x3100)), TextureSurface::COMPLETE));
    assert!(!params.set_buffer(1, 1, Some(MockBuffer::new(0x4000, 0x4100))));
    assert!(!params.set_param_block_buffer(5, 0, None));

    assert_eq!(params.version(), before);
    assert!(params.buffer(0, 4).is_none());
}

#[test]
fn every_mutation_bumps_version() {
    let (_states, mut params) = table();
    let v0 = params.version();
    params.set_param_block_buffer(1, 0, Some(MockParamBlock::new(0x1234)));
    let v1 = params.version();
    params.set_param_block_buffer(1, 0, None);
    let v2 = params.version();

    assert!(v1 > v0);
    assert!(v2 > v1);
}

// ============================================================================
// Named Access
// ============================================================================

#[test]
fn param_block_by_name_binds_every_stage() {
    let (_states, mut params) = table();
    let block: Arc<dyn GpuParamBlockBuffer> = MockParamBlock::new(0x1234);

    assert!(params.set_param_block_buffer_by_name("PerCamera", &block));
    assert!(Arc::ptr_eq(params.param_block_buffer(0, 0).unwrap(), &block));
    assert!(!params.set_param_block_buffer_by_name("PerShadow", &block));
    assert_eq!(params.param_block_desc("Material").map(|b| b.block_size), Some(48));
}

#[test]
fn named_lookups_are_per_stage() {
    let (states, mut params) = table();

    assert!(params.has_texture(GpuProgramType::Fragment, "gAlbedo"));
    assert!(!params.has_texture(GpuProgramType::Vertex, "gAlbedo"));
    assert!(params.has_buffer(GpuProgramType::Vertex, "gBones"));
    assert!(params.has_param_block(GpuProgramType::Fragment, "Material"));

    assert!(params.set_texture_by_name(
        GpuProgramType::Fragment,
        "gAlbedo",
        Some(MockTexture::new(0x3000, 0x3100)),
        TextureSurface::COMPLETE,
    ));
    assert!(!params.set_texture_by_name(GpuProgramType::Vertex, "gAlbedo", None, TextureSurface::COMPLETE));

    let sampler = states.default_sampler_state().unwrap();
    assert!(params.set_sampler_state_by_name(GpuProgramType::Fragment, "gAlbedo", Some(sampler)));
    assert!(params.texture(1, 1).is_some());
    assert!(params.sampler_state(1, 1).is_some());
}

// ============================================================================
// Pipelines
// ============================================================================

#[test]
fn graphics_pipeline_uses_default_states() {
    let states = CoreStateManager::headless();
    let pipeline = lit_pipeline(&states);

    assert!(Arc::ptr_eq(pipeline.blend_state(), &states.default_blend_state().unwrap()));
    assert!(Arc::ptr_eq(pipeline.depth_stencil_state(), &states.default_depth_stencil_state().unwrap()));
    assert_eq!(pipeline.programs().count(), 2);
}

#[test]
fn compute_pipeline_table_matches_program() -> anyhow::Result<()> {
    let cs = GpuParamDesc::new()
        .with_load_store_texture("gOut", 0, 0, GpuParamObjectType::RwTexture2D)
        .with_buffer("gIn", 0, 1, GpuParamObjectType::StructuredBuffer);
    let pipeline = ComputePipelineState::new(Arc::new(GpuProgram::new(GpuProgramType::Compute, "csMain", cs)))?;
    let mut params = pipeline.create_gpu_params();

    assert!(Arc::ptr_eq(params.param_info(), pipeline.param_info()));
    assert!(params.set_load_store_texture_by_name(
        GpuProgramType::Compute,
        "gOut",
        Some(MockTexture::new(0x3000, 0x3100)),
        TextureSurface::COMPLETE,
    ));
    assert!(params.load_store_texture(0, 0).is_some());
    assert!(!params.set_texture(0, 0, None, TextureSurface::COMPLETE));
    Ok(())
}
