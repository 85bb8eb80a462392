//! Descriptor set layouts, descriptor sets and their per-device cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use ash::vk;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::Xxh3;

use super::device::{DescriptorDevice, DescriptorWrite, LayoutBinding};
use crate::errors::Result;

// ─── Layout ───────────────────────────────────────────────────────────────────

/// A native descriptor set layout plus the bindings it was created from.
#[derive(Debug)]
pub struct DescriptorLayout {
    handle: vk::DescriptorSetLayout,
    bindings: Vec<LayoutBinding>,
    hash: u64,
    device: Arc<dyn DescriptorDevice>,
}

impl DescriptorLayout {
    #[inline]
    #[must_use]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

impl Drop for DescriptorLayout {
    fn drop(&mut self) {
        self.device.destroy_set_layout(self.handle);
    }
}

fn hash_bindings(bindings: &[LayoutBinding]) -> u64 {
    let mut hasher = Xxh3::new();
    for b in bindings {
        hasher.update(&b.binding.to_le_bytes());
        hasher.update(&b.descriptor_type.as_raw().to_le_bytes());
        hasher.update(&b.count.to_le_bytes());
        hasher.update(&b.stages.as_raw().to_le_bytes());
    }
    hasher.digest()
}

// ─── Set ──────────────────────────────────────────────────────────────────────

/// One physical descriptor set.
///
/// A set is *bound* from the moment a command buffer references it until that
/// command buffer finishes executing. A bound set must not be rewritten.
#[derive(Debug)]
pub struct DescriptorSet {
    handle: vk::DescriptorSet,
    layout: Arc<DescriptorLayout>,
    device: Arc<dyn DescriptorDevice>,
    bound: AtomicU32,
}

impl DescriptorSet {
    #[inline]
    #[must_use]
    pub fn handle(&self) -> vk::DescriptorSet {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> &Arc<DescriptorLayout> {
        &self.layout
    }

    /// Updates the set's contents. The set must not be bound.
    pub fn write(&self, writes: &[DescriptorWrite]) {
        debug_assert!(!self.is_bound(), "Writing to a descriptor set still in use by the GPU");
        self.device.write_set(self.handle, writes);
    }

    /// Whether any in-flight command buffer still references this set.
    #[inline]
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire) > 0
    }

    /// Marks the set as referenced by a command buffer being recorded.
    pub fn notify_bound(&self) {
        self.bound.fetch_add(1, Ordering::AcqRel);
    }

    /// Called once per [`notify_bound`](Self::notify_bound) when the command
    /// buffer that referenced the set finishes on the GPU.
    pub fn notify_done(&self) {
        let prev = self.bound.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "Descriptor set released more often than bound");
    }
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        self.device.free_set(self.handle);
    }
}

// ─── Manager ──────────────────────────────────────────────────────────────────

/// Per-device descriptor layout cache and set allocator.
///
/// Layouts are deduplicated by their binding list. Pipeline layouts are keyed
/// by the list of set layouts they combine and live as long as the manager.
#[derive(Debug)]
pub struct DescriptorManager {
    device: Arc<dyn DescriptorDevice>,
    layouts: Mutex<FxHashMap<u64, Vec<Arc<DescriptorLayout>>>>,
    pipeline_layouts: Mutex<FxHashMap<Vec<vk::DescriptorSetLayout>, vk::PipelineLayout>>,
}

impl DescriptorManager {
    #[must_use]
    pub fn new(device: Arc<dyn DescriptorDevice>) -> Self {
        Self {
            device,
            layouts: Mutex::new(FxHashMap::default()),
            pipeline_layouts: Mutex::new(FxHashMap::default()),
        }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &Arc<dyn DescriptorDevice> {
        &self.device
    }

    /// Returns the cached layout for `bindings`, creating it on first use.
    pub fn layout(&self, bindings: &[LayoutBinding]) -> Result<Arc<DescriptorLayout>> {
        let hash = hash_bindings(bindings);
        let mut layouts = self.layouts.lock();
        let bucket = layouts.entry(hash).or_default();
        if let Some(existing) = bucket.iter().find(|l| l.bindings == bindings) {
            return Ok(Arc::clone(existing));
        }

        let handle = self.device.create_set_layout(bindings)?;
        let layout = Arc::new(DescriptorLayout {
            handle,
            bindings: bindings.to_vec(),
            hash,
            device: Arc::clone(&self.device),
        });
        bucket.push(Arc::clone(&layout));
        log::debug!("Created descriptor set layout with {} bindings", bindings.len());
        Ok(layout)
    }

    /// Returns the cached pipeline layout combining `layouts` in set order.
    pub fn pipeline_layout(&self, layouts: &[Arc<DescriptorLayout>]) -> Result<vk::PipelineLayout> {
        let key: Vec<vk::DescriptorSetLayout> = layouts.iter().map(|l| l.handle()).collect();
        let mut cache = self.pipeline_layouts.lock();
        if let Some(&layout) = cache.get(&key) {
            return Ok(layout);
        }
        let layout = self.device.create_pipeline_layout(&key)?;
        cache.insert(key, layout);
        Ok(layout)
    }

    /// Allocates a new set for `layout`.
    pub fn create_set(&self, layout: &Arc<DescriptorLayout>) -> Result<Arc<DescriptorSet>> {
        let handle = self.device.allocate_set(layout.handle())?;
        Ok(Arc::new(DescriptorSet {
            handle,
            layout: Arc::clone(layout),
            device: Arc::clone(&self.device),
            bound: AtomicU32::new(0),
        }))
    }

    /// Number of distinct set layouts created so far.
    #[must_use]
    pub fn num_layouts(&self) -> usize {
        self.layouts.lock().values().map(Vec::len).sum()
    }
}

impl Drop for DescriptorManager {
    fn drop(&mut self) {
        for (_, layout) in self.pipeline_layouts.get_mut().drain() {
            self.device.destroy_pipeline_layout(layout);
        }
    }
}
