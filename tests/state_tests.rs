//! State Object Tests
//!
//! Tests for:
//! - Descriptor deduplication on the sim and core managers
//! - Cache entries disappearing with the last reference
//! - Native sampler lifetime on the core manager
//! - Stable state IDs and explicit ID reclamation

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::CountingSamplerFactory;
use pipestate::state::{
    BlendDesc, BlendFactor, CompareFunction, CoreStateManager, CullingMode, FilterOptions, RasterizerDesc,
    RenderTargetBlendDesc, SamplerDesc, StateManager, hash_desc,
};
use pipestate::DeviceMask;

fn opaque_blend() -> BlendDesc {
    let mut desc = BlendDesc::default();
    desc.render_targets[0] = RenderTargetBlendDesc {
        blend_enable: true,
        src_blend: BlendFactor::One,
        dst_blend: BlendFactor::Zero,
        ..Default::default()
    };
    desc
}

fn shadow_sampler() -> SamplerDesc {
    SamplerDesc {
        min_filter: FilterOptions::Point,
        mag_filter: FilterOptions::Point,
        comparison_func: CompareFunction::LessEqual,
        ..Default::default()
    }
}

// ============================================================================
// Deduplication
// ============================================================================

#[test]
fn equal_descs_share_one_object() {
    let manager = StateManager::new();

    let a = manager.create_blend_state(&opaque_blend());
    let b = manager.create_blend_state(&opaque_blend());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(Arc::strong_count(&a), 2);
    assert_eq!(manager.stats().blend.created, 1);
    assert_eq!(a.properties(), &opaque_blend());
}

#[test]
fn different_descs_get_different_objects() {
    let manager = StateManager::new();

    let back = manager.create_rasterizer_state(&RasterizerDesc::default());
    let none = manager.create_rasterizer_state(&RasterizerDesc {
        cull_mode: CullingMode::None,
        ..Default::default()
    });

    assert!(!Arc::ptr_eq(&back, &none));
    assert_ne!(back.id(), none.id());
    assert_eq!(manager.stats().rasterizer.live, 2);
}

#[test]
fn state_hash_matches_desc_hash() {
    let manager = StateManager::new();
    let state = manager.create_sampler_state(&shadow_sampler());
    assert_eq!(state.hash(), hash_desc(&shadow_sampler()));
}

#[test]
fn concurrent_creation_yields_one_object() {
    let manager = StateManager::new();

    let states: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| manager.create_blend_state(&opaque_blend())))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(states.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(manager.stats().blend.created, 1);
}

// ============================================================================
// Lifetime
// ============================================================================

#[test]
fn dropping_last_reference_removes_entry() {
    let manager = StateManager::new();

    let a = manager.create_blend_state(&opaque_blend());
    let first_id = a.id();
    assert_eq!(manager.live_count(), 1);
    drop(a);
    assert_eq!(manager.live_count(), 0);

    // Rebuilt, and the retired ID is not handed out again yet.
    let b = manager.create_blend_state(&opaque_blend());
    assert_eq!(manager.stats().blend.created, 2);
    assert_ne!(b.id(), first_id);
}

#[test]
fn reclaimed_ids_are_reused() {
    let manager = StateManager::new();

    let a = manager.create_blend_state(&opaque_blend());
    let first_id = a.id();
    drop(a);

    assert_eq!(manager.reclaim_ids(), 1);
    assert_eq!(manager.reclaim_ids(), 0);

    let b = manager.create_blend_state(&BlendDesc::default());
    assert_eq!(b.id(), first_id);
}

// ============================================================================
// Core Manager
// ============================================================================

#[test]
fn core_sampler_is_created_once_per_desc() {
    let factory = Arc::new(CountingSamplerFactory::default());
    let manager = CoreStateManager::new(factory.clone(), DeviceMask::PRIMARY);

    let a = manager.create_sampler_state(&shadow_sampler()).unwrap();
    let b = manager.create_sampler_state(&shadow_sampler()).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(factory.created.load(Ordering::Relaxed), 1);
    assert!(a.native().get(0).is_some());
    assert!(a.native().get(1).is_none());

    drop(a);
    assert_eq!(factory.destroyed.load(Ordering::Relaxed), 0);
    drop(b);
    assert_eq!(factory.destroyed.load(Ordering::Relaxed), 1);
}

#[test]
fn core_sampler_is_created_on_every_device() -> anyhow::Result<()> {
    let factory = Arc::new(CountingSamplerFactory::default());
    let devices = DeviceMask::from_index(0) | DeviceMask::from_index(2);
    let manager = CoreStateManager::new(factory.clone(), devices);

    let state = manager.create_sampler_state(&SamplerDesc::default())?;
    assert_eq!(factory.created.load(Ordering::Relaxed), 2);
    assert!(state.native().get(0).is_some());
    assert!(state.native().get(1).is_none());
    assert!(state.native().get(2).is_some());
    Ok(())
}

#[test]
fn sim_state_resolves_to_shared_core_state() -> anyhow::Result<()> {
    let sim = StateManager::new();
    let core = CoreStateManager::headless();

    let a = sim.create_blend_state(&opaque_blend());
    let from_sim = a.core(&core)?;
    let direct = core.create_blend_state(&opaque_blend())?;

    assert!(Arc::ptr_eq(&from_sim, &direct));
    assert_eq!(core.stats().blend.created, 1);
    Ok(())
}

#[test]
fn default_states_match_default_descs() {
    let core = CoreStateManager::headless();

    let default = core.default_depth_stencil_state().unwrap();
    assert!(default.properties().depth_read_enable);
    assert!(default.properties().depth_write_enable);
    assert_eq!(default.properties().depth_comparison_func, CompareFunction::Less);

    let sampler = core.default_sampler_state().unwrap();
    assert_eq!(sampler.properties(), &SamplerDesc::default());
}
