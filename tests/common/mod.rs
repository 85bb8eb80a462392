//! Shared mocks for the integration tests.
//!
//! Nothing here touches a GPU: the descriptor device hands out counter-based
//! handles and remembers every write, and the recorder logs what it is told.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use ash::vk;
use ash::vk::Handle;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use pipestate::backend::vulkan::{
    BufferUse, DescriptorDevice, DescriptorSet, DescriptorWrite, DeviceLimits, DummyResources, LayoutBinding,
    VulkanCommandRecorder, VulkanComputePipelineState, VulkanDevice, VulkanDeviceSet, VulkanGraphicsPipelineState,
};
use pipestate::errors::Result;
use pipestate::resources::{
    AccessFlags, BufferUsage, GpuBuffer, GpuBufferProperties, GpuBufferType, GpuParamBlockBuffer, NativeHandle,
    Texture, TextureProperties, TextureSurface, TextureUsage,
};
use pipestate::settings::RhiSettings;
use pipestate::state::{CoreStateManager, NativeStateFactory, SamplerDesc};
use pipestate::DeviceMask;

// ============================================================================
// Dummy handle values
// ============================================================================

pub const DUMMY_PARAM_BLOCK: u64 = 0x1001;
pub const DUMMY_READ_BUFFER: u64 = 0x1002;
pub const DUMMY_STORAGE_BUFFER: u64 = 0x1003;
pub const DUMMY_STRUCTURED_BUFFER: u64 = 0x1004;
pub const DUMMY_READ_BUFFER_VIEW: u64 = 0x1102;
pub const DUMMY_STORAGE_BUFFER_VIEW: u64 = 0x1103;

/// Dummy images are `DUMMY_IMAGE_BASE + kind`, views `DUMMY_VIEW_BASE + kind`.
pub const DUMMY_IMAGE_BASE: u64 = 0x2000;
pub const DUMMY_VIEW_BASE: u64 = 0x2100;

/// Kind index of the 2D dummy texture.
pub const KIND_2D: u64 = 1;

// ============================================================================
// Descriptor device
// ============================================================================

#[derive(Debug, Default)]
pub struct DeviceStats {
    pub layouts_created: usize,
    pub layouts_destroyed: usize,
    pub pipeline_layouts_created: usize,
    pub sets_allocated: usize,
    pub sets_freed: usize,
    pub write_calls: usize,
}

#[derive(Debug)]
pub struct MockDescriptorDevice {
    next_handle: AtomicU64,
    limits: DeviceLimits,
    pub stats: Mutex<DeviceStats>,
    /// Latest contents written to each set.
    pub contents: Mutex<FxHashMap<vk::DescriptorSet, Vec<DescriptorWrite>>>,
}

impl MockDescriptorDevice {
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            next_handle: AtomicU64::new(0x10_0000),
            limits,
            stats: Mutex::new(DeviceStats::default()),
            contents: Mutex::new(FxHashMap::default()),
        }
    }

    fn next(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    pub fn sets_allocated(&self) -> usize {
        self.stats.lock().sets_allocated
    }

    pub fn write_calls(&self) -> usize {
        self.stats.lock().write_calls
    }

    /// Payload last written to `binding` of `set`.
    pub fn written(&self, set: vk::DescriptorSet, binding: u32) -> Option<DescriptorWrite> {
        self.contents
            .lock()
            .get(&set)
            .and_then(|writes| writes.iter().find(|w| w.binding == binding).copied())
    }
}

impl DescriptorDevice for MockDescriptorDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_set_layout(&self, _bindings: &[LayoutBinding]) -> Result<vk::DescriptorSetLayout> {
        self.stats.lock().layouts_created += 1;
        Ok(vk::DescriptorSetLayout::from_raw(self.next()))
    }

    fn destroy_set_layout(&self, _layout: vk::DescriptorSetLayout) {
        self.stats.lock().layouts_destroyed += 1;
    }

    fn create_pipeline_layout(&self, _set_layouts: &[vk::DescriptorSetLayout]) -> Result<vk::PipelineLayout> {
        self.stats.lock().pipeline_layouts_created += 1;
        Ok(vk::PipelineLayout::from_raw(self.next()))
    }

    fn destroy_pipeline_layout(&self, _layout: vk::PipelineLayout) {}

    fn allocate_set(&self, _layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        self.stats.lock().sets_allocated += 1;
        Ok(vk::DescriptorSet::from_raw(self.next()))
    }

    fn free_set(&self, set: vk::DescriptorSet) {
        self.stats.lock().sets_freed += 1;
        self.contents.lock().remove(&set);
    }

    fn write_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
        self.stats.lock().write_calls += 1;
        self.contents.lock().insert(set, writes.to_vec());
    }
}

// ============================================================================
// Sampler factory
// ============================================================================

#[derive(Debug, Default)]
pub struct CountingSamplerFactory {
    next: AtomicU64,
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
}

impl NativeStateFactory for CountingSamplerFactory {
    fn create_sampler(&self, _desc: &SamplerDesc, _device_idx: usize) -> Result<NativeHandle> {
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(NativeHandle(0x5000 + self.next.fetch_add(1, Ordering::Relaxed)))
    }

    fn destroy_sampler(&self, _device_idx: usize, _handle: NativeHandle) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    props: TextureProperties,
    image: u64,
    view: u64,
}

impl MockTexture {
    pub fn new(image: u64, view: u64) -> Arc<Self> {
        Self::with_usage(image, view, TextureUsage::empty())
    }

    pub fn with_usage(image: u64, view: u64, usage: TextureUsage) -> Arc<Self> {
        Arc::new(Self {
            props: TextureProperties {
                usage,
                ..Default::default()
            },
            image,
            view,
        })
    }
}

impl Texture for MockTexture {
    fn properties(&self) -> &TextureProperties {
        &self.props
    }

    fn image(&self, device_idx: usize) -> Option<NativeHandle> {
        (device_idx == 0).then_some(NativeHandle(self.image))
    }

    fn view(&self, device_idx: usize, _surface: &TextureSurface) -> Option<NativeHandle> {
        (device_idx == 0).then_some(NativeHandle(self.view))
    }
}

/// Buffer whose native handle can be swapped, like a dynamic buffer discarded
/// and reallocated by its owner.
#[derive(Debug)]
pub struct MockBuffer {
    props: GpuBufferProperties,
    buffer: AtomicU64,
    view: u64,
}

impl MockBuffer {
    pub fn new(buffer: u64, view: u64) -> Arc<Self> {
        Self::with_props(buffer, view, GpuBufferProperties::default())
    }

    pub fn structured(buffer: u64, usage: BufferUsage) -> Arc<Self> {
        Self::with_props(
            buffer,
            0,
            GpuBufferProperties {
                buffer_type: GpuBufferType::Structured,
                usage,
                ..Default::default()
            },
        )
    }

    pub fn with_props(buffer: u64, view: u64, props: GpuBufferProperties) -> Arc<Self> {
        Arc::new(Self {
            props,
            buffer: AtomicU64::new(buffer),
            view,
        })
    }

    pub fn swap_handle(&self, buffer: u64) {
        self.buffer.store(buffer, Ordering::Relaxed);
    }
}

impl GpuBuffer for MockBuffer {
    fn properties(&self) -> &GpuBufferProperties {
        &self.props
    }

    fn buffer(&self, device_idx: usize) -> Option<NativeHandle> {
        (device_idx == 0).then(|| NativeHandle(self.buffer.load(Ordering::Relaxed)))
    }

    fn view(&self, device_idx: usize) -> Option<NativeHandle> {
        (device_idx == 0 && self.view != 0).then_some(NativeHandle(self.view))
    }
}

#[derive(Debug)]
pub struct MockParamBlock {
    size: u32,
    buffer: u64,
}

impl MockParamBlock {
    pub fn new(buffer: u64) -> Arc<Self> {
        Arc::new(Self { size: 256, buffer })
    }
}

impl GpuParamBlockBuffer for MockParamBlock {
    fn size(&self) -> u32 {
        self.size
    }

    fn buffer(&self, device_idx: usize) -> Option<NativeHandle> {
        (device_idx == 0).then_some(NativeHandle(self.buffer))
    }
}

// ============================================================================
// Recorder
// ============================================================================

#[derive(Debug, Default)]
pub struct MockRecorder {
    pub device_idx: usize,
    pub buffers: Vec<(vk::Buffer, BufferUse, AccessFlags)>,
    pub images: Vec<(vk::Image, vk::ImageLayout, AccessFlags)>,
    pub samplers: Vec<vk::Sampler>,
    pub sets: Vec<Arc<DescriptorSet>>,
    pub graphics_binds: usize,
    pub compute_binds: usize,
    pub set_binds: Vec<(vk::PipelineBindPoint, Vec<vk::DescriptorSet>)>,
    /// Forces the layout reported for one image.
    pub layout_override: Option<(vk::Image, vk::ImageLayout)>,
}

impl MockRecorder {
    /// Simulates the command buffer finishing on the GPU.
    pub fn complete(&mut self) {
        for set in self.sets.drain(..) {
            set.notify_done();
        }
        self.buffers.clear();
        self.images.clear();
        self.samplers.clear();
    }
}

impl VulkanCommandRecorder for MockRecorder {
    fn device_index(&self) -> usize {
        self.device_idx
    }

    fn register_buffer(
        &mut self,
        buffer: vk::Buffer,
        usage: BufferUse,
        access: AccessFlags,
        _stages: vk::PipelineStageFlags,
    ) {
        self.buffers.push((buffer, usage, access));
    }

    fn register_image(
        &mut self,
        image: vk::Image,
        _range: vk::ImageSubresourceRange,
        layout: vk::ImageLayout,
        access: AccessFlags,
        _stages: vk::PipelineStageFlags,
    ) {
        self.images.push((image, layout, access));
    }

    fn current_layout(
        &self,
        image: vk::Image,
        _range: &vk::ImageSubresourceRange,
        requested: vk::ImageLayout,
    ) -> vk::ImageLayout {
        match self.layout_override {
            Some((overridden, layout)) if overridden == image => layout,
            _ => requested,
        }
    }

    fn register_sampler(&mut self, sampler: vk::Sampler) {
        self.samplers.push(sampler);
    }

    fn register_descriptor_set(&mut self, set: Arc<DescriptorSet>) {
        self.sets.push(set);
    }

    fn bind_graphics_pipeline(&mut self, _pipeline: &VulkanGraphicsPipelineState) {
        self.graphics_binds += 1;
    }

    fn bind_compute_pipeline(&mut self, _pipeline: &VulkanComputePipelineState) {
        self.compute_binds += 1;
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
    ) {
        self.set_binds.push((bind_point, sets.to_vec()));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub fn dummy_resources(states: &CoreStateManager) -> DummyResources {
    let textures: [Arc<dyn Texture>; 5] = std::array::from_fn(|kind| {
        let kind = kind as u64;
        MockTexture::with_usage(DUMMY_IMAGE_BASE + kind, DUMMY_VIEW_BASE + kind, TextureUsage::LOAD_STORE)
            as Arc<dyn Texture>
    });
    DummyResources {
        param_block: MockParamBlock::new(DUMMY_PARAM_BLOCK),
        read_buffer: MockBuffer::new(DUMMY_READ_BUFFER, DUMMY_READ_BUFFER_VIEW),
        storage_buffer: MockBuffer::new(DUMMY_STORAGE_BUFFER, DUMMY_STORAGE_BUFFER_VIEW),
        structured_buffer: MockBuffer::structured(DUMMY_STRUCTURED_BUFFER, BufferUsage::LOAD_STORE),
        textures,
        sampler: states
            .default_sampler_state()
            .expect("dummy sampler creation cannot fail with the counting factory"),
    }
}

pub struct Harness {
    pub device: Arc<MockDescriptorDevice>,
    pub devices: VulkanDeviceSet,
    pub states: CoreStateManager,
    pub settings: RhiSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_device(MockDescriptorDevice::new())
    }

    pub fn with_device(device: MockDescriptorDevice) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let states = CoreStateManager::new(Arc::new(CountingSamplerFactory::default()), DeviceMask::PRIMARY);
        let device = Arc::new(device);
        let settings = RhiSettings::default();
        let mut devices = VulkanDeviceSet::new(settings);
        devices
            .add_device(VulkanDevice::new(
                0,
                Arc::clone(&device) as Arc<dyn DescriptorDevice>,
                dummy_resources(&states),
            ))
            .expect("device 0 is always a valid slot");

        Self {
            device,
            devices,
            states,
            settings,
        }
    }
}

pub fn image(raw: u64) -> vk::Image {
    vk::Image::from_raw(raw)
}

pub fn image_view(raw: u64) -> vk::ImageView {
    vk::ImageView::from_raw(raw)
}

pub fn buffer(raw: u64) -> vk::Buffer {
    vk::Buffer::from_raw(raw)
}

pub fn buffer_view(raw: u64) -> vk::BufferView {
    vk::BufferView::from_raw(raw)
}
