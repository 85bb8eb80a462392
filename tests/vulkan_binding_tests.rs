//! Vulkan Binding Tests
//!
//! Tests for:
//! - Descriptor writes for bound, reset and never-bound slots (dummy fallback)
//! - Resources without a usable view or format falling back to dummies
//! - In-flight descriptor sets are never rewritten; rings grow and recycle
//! - Dirty tracking: clean binds write nothing, handle swaps are detected
//! - Resource registration with the command recorder
//! - Combined image-samplers, layout caching and device limit validation

mod common;

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use smallvec::SmallVec;

use common::*;
use pipestate::backend::vulkan::{
    BufferUse, DeviceLimits, VulkanComputePipelineState, VulkanGpuParams, VulkanGraphicsPipelineState, WritePayload,
};
use pipestate::errors::RhiError;
use pipestate::params::{GpuBufferFormat, GpuParamDesc, GpuParamObjectType, GpuProgramType};
use pipestate::pipeline::{ComputePipelineState, GpuProgram, GraphicsPipelineState, PipelineStateDesc};
use pipestate::resources::{AccessFlags, BufferUsage, GpuBufferProperties, TextureSurface, TextureUsage};
use pipestate::state::{FilterOptions, SamplerDesc};
use pipestate::DeviceMask;

// ============================================================================
// Helpers
// ============================================================================

/// Vertex: param block (0,0). Fragment: texture (0,2), sampler (0,3), typed buffer (1,0).
fn forward_pipeline(h: &Harness) -> VulkanGraphicsPipelineState {
    let vs = GpuParamDesc::new().with_param_block("PerObject", 0, 0, 64);
    let fs = GpuParamDesc::new()
        .with_param_block("PerObject", 0, 0, 64)
        .with_texture("gAlbedo", 0, 2, GpuParamObjectType::Texture2D)
        .with_sampler("gSampler", 0, 3, GpuParamObjectType::Sampler2D)
        .with_buffer("gLights", 1, 0, GpuParamObjectType::TypedBuffer);

    let desc = PipelineStateDesc {
        vertex_program: Some(Arc::new(GpuProgram::new(GpuProgramType::Vertex, "vsMain", vs))),
        fragment_program: Some(Arc::new(GpuProgram::new(GpuProgramType::Fragment, "fsMain", fs))),
        ..Default::default()
    };
    let base = GraphicsPipelineState::new(desc, &h.states).unwrap();
    VulkanGraphicsPipelineState::new(Arc::new(base), &h.devices, DeviceMask::PRIMARY).unwrap()
}

/// Compute: structured output (0,0), storage image (0,1), param block (0,2).
fn compute_pipeline(h: &Harness) -> VulkanComputePipelineState {
    let cs = GpuParamDesc::new()
        .with_buffer("gOutput", 0, 0, GpuParamObjectType::RwStructuredBuffer)
        .with_load_store_texture("gTarget", 0, 1, GpuParamObjectType::RwTexture2D)
        .with_param_block("Params", 0, 2, 16);
    let base = ComputePipelineState::new(Arc::new(GpuProgram::new(GpuProgramType::Compute, "csMain", cs))).unwrap();
    VulkanComputePipelineState::new(Arc::new(base), &h.devices, DeviceMask::PRIMARY).unwrap()
}

fn bind(params: &VulkanGpuParams, recorder: &mut MockRecorder) -> SmallVec<[vk::DescriptorSet; 8]> {
    let mut sets = SmallVec::new();
    params.prepare_for_bind(recorder, &mut sets).unwrap();
    sets
}

// ============================================================================
// Dummy Fallback
// ============================================================================

#[test]
fn reset_texture_binds_dummy_view() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();

    let texture = MockTexture::new(0x3000, 0x3100);
    params.set_texture(0, 2, Some(texture), TextureSurface::COMPLETE);
    params.set_texture(0, 2, None, TextureSurface::COMPLETE);

    let mut recorder = MockRecorder::default();
    let sets = bind(&params, &mut recorder);

    let write = h.device.written(sets[0], 2).unwrap();
    assert_eq!(write.descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
    assert_eq!(
        write.payload,
        WritePayload::Image {
            sampler: vk::Sampler::null(),
            view: image_view(DUMMY_VIEW_BASE + KIND_2D),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    );
}

#[test]
fn never_bound_slots_reference_dummies() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();

    let mut recorder = MockRecorder::default();
    let sets = bind(&params, &mut recorder);
    assert_eq!(sets.len(), 2);

    assert_eq!(
        h.device.written(sets[0], 0).unwrap().payload,
        WritePayload::Buffer {
            buffer: buffer(DUMMY_PARAM_BLOCK)
        }
    );
    assert_eq!(
        h.device.written(sets[1], 0).unwrap().payload,
        WritePayload::TexelBuffer {
            view: buffer_view(DUMMY_READ_BUFFER_VIEW)
        }
    );
    match h.device.written(sets[0], 3).unwrap().payload {
        WritePayload::Image { sampler, .. } => assert!(!sampler.is_null()),
        other => panic!("Expected a sampler payload, got {other:?}"),
    }

    // Dummies are registered like real resources.
    assert!(recorder
        .buffers
        .contains(&(buffer(DUMMY_PARAM_BLOCK), BufferUse::Parameter, AccessFlags::READ)));
    assert!(recorder
        .buffers
        .contains(&(buffer(DUMMY_READ_BUFFER), BufferUse::Generic, AccessFlags::READ)));
    assert!(recorder.images.iter().any(|(img, _, _)| *img == image(DUMMY_IMAGE_BASE + KIND_2D)));
}

// ============================================================================
// Unusable Resources
// ============================================================================

#[test]
fn typed_buffer_without_view_binds_dummy() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();
    params.set_buffer(1, 0, Some(MockBuffer::new(0x4000, 0)));

    let mut recorder = MockRecorder::default();
    let sets = bind(&params, &mut recorder);

    assert_eq!(
        h.device.written(sets[1], 0).unwrap().payload,
        WritePayload::TexelBuffer {
            view: buffer_view(DUMMY_READ_BUFFER_VIEW)
        }
    );
    assert!(recorder
        .buffers
        .contains(&(buffer(DUMMY_READ_BUFFER), BufferUse::Generic, AccessFlags::READ)));
    assert!(!recorder.buffers.iter().any(|(b, _, _)| *b == buffer(0x4000)));
}

#[test]
fn typed_buffer_with_mismatched_format_binds_dummy() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();
    let indices = MockBuffer::with_props(
        0x4000,
        0x4100,
        GpuBufferProperties {
            format: GpuBufferFormat::UInt1,
            ..Default::default()
        },
    );
    params.set_buffer(1, 0, Some(indices));

    let mut recorder = MockRecorder::default();
    let sets = bind(&params, &mut recorder);

    assert_eq!(
        h.device.written(sets[1], 0).unwrap().payload,
        WritePayload::TexelBuffer {
            view: buffer_view(DUMMY_READ_BUFFER_VIEW)
        }
    );
}

#[test]
fn texture_without_view_binds_dummy() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();
    params.set_texture(0, 2, Some(MockTexture::new(0x3000, 0)), TextureSurface::COMPLETE);

    let mut recorder = MockRecorder::default();
    let sets = bind(&params, &mut recorder);

    assert_eq!(
        h.device.written(sets[0], 2).unwrap().payload,
        WritePayload::Image {
            sampler: vk::Sampler::null(),
            view: image_view(DUMMY_VIEW_BASE + KIND_2D),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    );
    assert!(recorder.images.iter().any(|(img, _, _)| *img == image(DUMMY_IMAGE_BASE + KIND_2D)));
    assert!(!recorder.images.iter().any(|(img, _, _)| *img == image(0x3000)));
}

#[test]
fn writable_slot_registers_write_without_load_store_usage() {
    let h = Harness::new();
    let pipeline = compute_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();
    params.set_buffer(0, 0, Some(MockBuffer::structured(0x6000, BufferUsage::empty())));

    let mut recorder = MockRecorder::default();
    let sets = bind(&params, &mut recorder);

    assert_eq!(
        h.device.written(sets[0], 0).unwrap().payload,
        WritePayload::Buffer { buffer: buffer(0x6000) }
    );
    assert!(recorder
        .buffers
        .contains(&(buffer(0x6000), BufferUse::Generic, AccessFlags::READ | AccessFlags::WRITE)));
}

// ============================================================================
// In-flight Safety
// ============================================================================

#[test]
fn bound_set_is_not_rewritten() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();

    params.set_buffer(1, 0, Some(MockBuffer::new(0x4000, 0x4100)));
    let mut first = MockRecorder::default();
    let first_sets = bind(&params, &mut first);
    let in_flight = first_sets[1];

    params.set_buffer(1, 0, Some(MockBuffer::new(0x4001, 0x4101)));
    let mut second = MockRecorder::default();
    let second_sets = bind(&params, &mut second);

    assert_ne!(second_sets[1], in_flight);
    assert_eq!(
        h.device.written(in_flight, 0).unwrap().payload,
        WritePayload::TexelBuffer {
            view: buffer_view(0x4100)
        }
    );
    assert_eq!(
        h.device.written(second_sets[1], 0).unwrap().payload,
        WritePayload::TexelBuffer {
            view: buffer_view(0x4101)
        }
    );

    // Set 0 did not change and keeps its physical set.
    assert_eq!(second_sets[0], first_sets[0]);
    assert_eq!(params.num_allocated_sets(0, 1), 2);
    assert_eq!(params.num_allocated_sets(0, 0), 1);
}

#[test]
fn completed_sets_are_recycled() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();

    let mut first = MockRecorder::default();
    let first_sets = bind(&params, &mut first);

    params.set_buffer(1, 0, Some(MockBuffer::new(0x4000, 0x4100)));
    let mut second = MockRecorder::default();
    let second_sets = bind(&params, &mut second);
    assert_ne!(first_sets[1], second_sets[1]);

    first.complete();
    second.complete();
    let allocated = h.device.sets_allocated();

    params.set_buffer(1, 0, Some(MockBuffer::new(0x4002, 0x4102)));
    let mut third = MockRecorder::default();
    let third_sets = bind(&params, &mut third);

    assert_eq!(h.device.sets_allocated(), allocated);
    assert!(third_sets[1] == first_sets[1] || third_sets[1] == second_sets[1]);
    assert_eq!(params.num_allocated_sets(0, 1), 2);
}

// ============================================================================
// Dirty Tracking
// ============================================================================

#[test]
fn clean_bind_writes_nothing() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();
    params.set_texture(0, 2, Some(MockTexture::new(0x3000, 0x3100)), TextureSurface::COMPLETE);

    let mut recorder = MockRecorder::default();
    let sets = bind(&params, &mut recorder);
    recorder.complete();
    let writes = h.device.write_calls();

    let again = bind(&params, &mut recorder);
    assert_eq!(h.device.write_calls(), writes);
    assert_eq!(again, sets);
}

#[test]
fn only_changed_set_is_rewritten() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();

    let mut recorder = MockRecorder::default();
    bind(&params, &mut recorder);
    recorder.complete();
    let writes = h.device.write_calls();

    params.set_buffer(1, 0, Some(MockBuffer::new(0x4000, 0x4100)));
    bind(&params, &mut recorder);
    assert_eq!(h.device.write_calls(), writes + 1);
}

#[test]
fn swapped_native_buffer_is_detected() {
    let h = Harness::new();
    let pipeline = compute_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();

    let output = MockBuffer::structured(0x6000, BufferUsage::LOAD_STORE);
    params.set_buffer(0, 0, Some(output.clone()));

    let mut recorder = MockRecorder::default();
    bind(&params, &mut recorder);
    recorder.complete();

    output.swap_handle(0x6001);
    let sets = bind(&params, &mut recorder);
    assert_eq!(
        h.device.written(sets[0], 0).unwrap().payload,
        WritePayload::Buffer { buffer: buffer(0x6001) }
    );
}

#[test]
fn layout_reported_by_recorder_is_written() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();
    params.set_texture(0, 2, Some(MockTexture::new(0x3000, 0x3100)), TextureSurface::COMPLETE);

    let mut recorder = MockRecorder {
        layout_override: Some((image(0x3000), vk::ImageLayout::GENERAL)),
        ..Default::default()
    };
    let sets = bind(&params, &mut recorder);
    match h.device.written(sets[0], 2).unwrap().payload {
        WritePayload::Image { layout, .. } => assert_eq!(layout, vk::ImageLayout::GENERAL),
        other => panic!("Expected an image payload, got {other:?}"),
    }
    recorder.complete();

    // Once the attachment use ends the layout flips back, which dirties the set.
    recorder.layout_override = None;
    let writes = h.device.write_calls();
    let sets = bind(&params, &mut recorder);
    assert_eq!(h.device.write_calls(), writes + 1);
    match h.device.written(sets[0], 2).unwrap().payload {
        WritePayload::Image { layout, .. } => assert_eq!(layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        other => panic!("Expected an image payload, got {other:?}"),
    }
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn dynamic_texture_is_sampled_in_general_layout() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();
    params.set_texture(
        0,
        2,
        Some(MockTexture::with_usage(0x3000, 0x3100, TextureUsage::DYNAMIC)),
        TextureSurface::COMPLETE,
    );

    let mut recorder = MockRecorder::default();
    bind(&params, &mut recorder);
    assert!(recorder
        .images
        .contains(&(image(0x3000), vk::ImageLayout::GENERAL, AccessFlags::READ)));
}

#[test]
fn compute_resources_register_write_access() {
    let h = Harness::new();
    let pipeline = compute_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();
    params.set_load_store_texture(0, 1, Some(MockTexture::new(0x3000, 0x3100)), TextureSurface::COMPLETE);
    params.set_buffer(0, 0, Some(MockBuffer::structured(0x6000, BufferUsage::LOAD_STORE)));

    let mut recorder = MockRecorder::default();
    let sets = bind(&params, &mut recorder);

    let rw = AccessFlags::READ | AccessFlags::WRITE;
    assert!(recorder.images.contains(&(image(0x3000), vk::ImageLayout::GENERAL, rw)));
    assert!(recorder.buffers.contains(&(buffer(0x6000), BufferUse::Generic, rw)));
    assert_eq!(recorder.sets.len(), 1);
    assert!(recorder.sets[0].is_bound());
    assert_eq!(
        h.device.written(sets[0], 1).unwrap().payload,
        WritePayload::Image {
            sampler: vk::Sampler::null(),
            view: image_view(0x3100),
            layout: vk::ImageLayout::GENERAL,
        }
    );

    recorder.complete();
    assert!(!params.with_params(|p| p.load_store_texture(0, 1).is_none()));
}

#[test]
fn missing_device_binds_nothing() {
    let h = Harness::new();
    let pipeline = forward_pipeline(&h);
    let params = pipeline.create_gpu_params(&h.settings).unwrap();

    let mut recorder = MockRecorder {
        device_idx: 1,
        ..Default::default()
    };
    let sets = bind(&params, &mut recorder);
    assert!(sets.is_empty());
    assert!(recorder.sets.is_empty());
}

// ============================================================================
// Combined Image-Samplers
// ============================================================================

#[test]
fn texture_and_sampler_share_one_write() {
    let h = Harness::new();
    let fs = GpuParamDesc::new()
        .with_texture("gAlbedo", 0, 1, GpuParamObjectType::Texture2D)
        .with_sampler("gAlbedoSamp", 0, 1, GpuParamObjectType::Sampler2D);
    let desc = PipelineStateDesc {
        fragment_program: Some(Arc::new(GpuProgram::new(GpuProgramType::Fragment, "fsMain", fs))),
        ..Default::default()
    };
    let base = GraphicsPipelineState::new(desc, &h.states).unwrap();
    let pipeline = VulkanGraphicsPipelineState::new(Arc::new(base), &h.devices, DeviceMask::PRIMARY).unwrap();
    assert_eq!(
        pipeline.param_info().bindings(0)[0].descriptor_type,
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );

    let params = pipeline.create_gpu_params(&h.settings).unwrap();
    let point = h
        .states
        .create_sampler_state(&SamplerDesc {
            min_filter: FilterOptions::Point,
            mag_filter: FilterOptions::Point,
            ..Default::default()
        })
        .unwrap();
    let point_handle = point.native().get(0).unwrap();

    params.set_texture(0, 1, Some(MockTexture::new(0x3000, 0x3100)), TextureSurface::COMPLETE);
    params.set_sampler_state(0, 1, Some(point));

    let mut recorder = MockRecorder::default();
    let sets = bind(&params, &mut recorder);
    assert_eq!(
        h.device.written(sets[0], 1).unwrap().payload,
        WritePayload::Image {
            sampler: vk::Sampler::from_raw(point_handle.raw()),
            view: image_view(0x3100),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    );
    assert!(recorder.samplers.contains(&vk::Sampler::from_raw(point_handle.raw())));
}

// ============================================================================
// Layouts and Limits
// ============================================================================

#[test]
fn identical_layouts_are_shared() {
    let h = Harness::new();
    let first = forward_pipeline(&h);
    let layouts = h.device.stats.lock().layouts_created;
    assert_eq!(layouts, 2);

    let second = forward_pipeline(&h);
    assert_eq!(h.device.stats.lock().layouts_created, 2);
    assert_eq!(h.device.stats.lock().pipeline_layouts_created, 1);
    assert_eq!(h.devices.device(0).unwrap().descriptors().num_layouts(), 2);
    assert_eq!(first.pipeline_layout(0), second.pipeline_layout(0));
    assert!(first.pipeline_layout(1).is_none());
}

#[test]
fn sampled_image_limit_is_enforced() {
    let h = Harness::with_device(MockDescriptorDevice::with_limits(DeviceLimits {
        max_descriptor_set_sampled_images: 0,
        ..Default::default()
    }));
    let fs = GpuParamDesc::new().with_texture("gAlbedo", 0, 0, GpuParamObjectType::Texture2D);
    let desc = PipelineStateDesc {
        fragment_program: Some(Arc::new(GpuProgram::new(GpuProgramType::Fragment, "fsMain", fs))),
        ..Default::default()
    };
    let base = GraphicsPipelineState::new(desc, &h.states).unwrap();
    let err = VulkanGraphicsPipelineState::new(Arc::new(base), &h.devices, DeviceMask::PRIMARY).unwrap_err();

    assert!(matches!(
        err,
        RhiError::DeviceLimitsExceeded {
            what: "sampled images",
            requested: 1,
            limit: 0,
        }
    ));
}

#[test]
fn bound_set_count_limit_is_enforced() {
    let h = Harness::with_device(MockDescriptorDevice::with_limits(DeviceLimits {
        max_bound_descriptor_sets: 1,
        ..Default::default()
    }));
    let cs = GpuParamDesc::new().with_buffer("gOut", 1, 0, GpuParamObjectType::RwByteBuffer);
    let base = ComputePipelineState::new(Arc::new(GpuProgram::new(GpuProgramType::Compute, "csMain", cs))).unwrap();
    let err = VulkanComputePipelineState::new(Arc::new(base), &h.devices, DeviceMask::PRIMARY).unwrap_err();

    assert!(matches!(
        err,
        RhiError::DeviceLimitsExceeded {
            what: "descriptor sets",
            requested: 2,
            limit: 1,
        }
    ));
}
