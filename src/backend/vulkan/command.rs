//! Command recording seam and bind-state tracking.
//!
//! The binding layer does not own command buffers. It talks to whatever
//! records them through [`VulkanCommandRecorder`], which receives every
//! resource a draw touches (for barriers and lifetime tracking) and the
//! actual bind calls.
//!
//! [`CommandBindings`] remembers what is bound on one command buffer and
//! defers the pipeline and descriptor binds to the next draw or dispatch, so
//! changing the table several times between draws costs a single bind.

use std::sync::Arc;

use ash::vk;
use bitflags::bitflags;
use smallvec::SmallVec;

use super::descriptor::DescriptorSet;
use super::gpu_params::VulkanGpuParams;
use super::pipeline::{VulkanComputePipelineState, VulkanGraphicsPipelineState};
use crate::errors::Result;
use crate::resources::AccessFlags;

/// Role of a buffer registered with a recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUse {
    /// Uniform buffer holding a parameter block.
    Parameter,
    /// Any other buffer read or written by shaders.
    Generic,
}

/// A command buffer being recorded on one device.
pub trait VulkanCommandRecorder {
    fn device_index(&self) -> usize;

    fn register_buffer(
        &mut self,
        buffer: vk::Buffer,
        usage: BufferUse,
        access: AccessFlags,
        stages: vk::PipelineStageFlags,
    );

    fn register_image(
        &mut self,
        image: vk::Image,
        range: vk::ImageSubresourceRange,
        layout: vk::ImageLayout,
        access: AccessFlags,
        stages: vk::PipelineStageFlags,
    );

    /// Layout `image` will actually be in when the next draw executes.
    ///
    /// Differs from `requested` when the image is also a framebuffer
    /// attachment of the current render pass.
    fn current_layout(
        &self,
        image: vk::Image,
        range: &vk::ImageSubresourceRange,
        requested: vk::ImageLayout,
    ) -> vk::ImageLayout;

    fn register_sampler(&mut self, sampler: vk::Sampler);

    /// The set is already marked bound. The recorder must call
    /// [`DescriptorSet::notify_done`] once the command buffer completes.
    fn register_descriptor_set(&mut self, set: Arc<DescriptorSet>);

    fn bind_graphics_pipeline(&mut self, pipeline: &VulkanGraphicsPipelineState);

    fn bind_compute_pipeline(&mut self, pipeline: &VulkanComputePipelineState);

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
    );
}

bitflags! {
    /// Bind points whose descriptor sets must be re-bound before the next use.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DescriptorBindFlags: u8 {
        const GRAPHICS = 1 << 0;
        const COMPUTE = 1 << 1;
    }
}

/// Pipeline and parameter bind state of one command buffer.
#[derive(Debug, Default)]
pub struct CommandBindings {
    graphics: Option<Arc<VulkanGraphicsPipelineState>>,
    compute: Option<Arc<VulkanComputePipelineState>>,
    params: Option<Arc<VulkanGpuParams>>,

    graphics_requires_bind: bool,
    compute_requires_bind: bool,
    params_dirty: bool,
    descriptor_binds: DescriptorBindFlags,
    sets: SmallVec<[vk::DescriptorSet; 8]>,
}

impl CommandBindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_graphics_pipeline(&mut self, pipeline: Arc<VulkanGraphicsPipelineState>) {
        if self.graphics.as_ref().is_some_and(|p| Arc::ptr_eq(p, &pipeline)) {
            return;
        }
        self.graphics = Some(pipeline);
        self.graphics_requires_bind = true;
    }

    pub fn set_compute_pipeline(&mut self, pipeline: Arc<VulkanComputePipelineState>) {
        if self.compute.as_ref().is_some_and(|p| Arc::ptr_eq(p, &pipeline)) {
            return;
        }
        self.compute = Some(pipeline);
        self.compute_requires_bind = true;
    }

    /// Replaces the bound parameter table. `None` unbinds all descriptor sets.
    pub fn set_gpu_params(&mut self, params: Option<Arc<VulkanGpuParams>>) {
        self.params_dirty = params.is_some();
        if params.is_none() {
            self.sets.clear();
        }
        self.params = params;
        self.descriptor_binds = DescriptorBindFlags::all();
    }

    /// Marks the current table as changed, e.g. after one of its setters ran.
    pub fn invalidate_params(&mut self) {
        if self.params.is_some() {
            self.params_dirty = true;
        }
    }

    #[inline]
    #[must_use]
    pub fn graphics_pipeline(&self) -> Option<&Arc<VulkanGraphicsPipelineState>> {
        self.graphics.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn compute_pipeline(&self) -> Option<&Arc<VulkanComputePipelineState>> {
        self.compute.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn descriptor_sets(&self) -> &[vk::DescriptorSet] {
        &self.sets
    }

    /// Marks every bind point as needing a fresh bind, e.g. after the command
    /// buffer was reset or a render pass restarted.
    pub fn reset(&mut self) {
        self.graphics_requires_bind = self.graphics.is_some();
        self.compute_requires_bind = self.compute.is_some();
        self.params_dirty = self.params.is_some();
        self.descriptor_binds = DescriptorBindFlags::all();
    }

    fn prepare_params<R: VulkanCommandRecorder + ?Sized>(&mut self, recorder: &mut R) -> Result<()> {
        if !self.params_dirty {
            return Ok(());
        }
        if let Some(params) = &self.params {
            params.prepare_for_bind(recorder, &mut self.sets)?;
        }
        self.params_dirty = false;
        self.descriptor_binds = DescriptorBindFlags::all();
        Ok(())
    }

    /// Issues pending binds before a draw. Returns false without recording
    /// anything if no graphics pipeline is set.
    pub fn flush_graphics<R: VulkanCommandRecorder + ?Sized>(&mut self, recorder: &mut R) -> Result<bool> {
        let Some(pipeline) = self.graphics.clone() else {
            log::warn!("Draw issued without a graphics pipeline, ignoring");
            return Ok(false);
        };

        self.prepare_params(recorder)?;

        if self.graphics_requires_bind {
            recorder.bind_graphics_pipeline(&pipeline);
            self.graphics_requires_bind = false;
        }

        if self.descriptor_binds.contains(DescriptorBindFlags::GRAPHICS) {
            let layout = pipeline.pipeline_layout(recorder.device_index());
            if let Some(layout) = layout
                && !self.sets.is_empty()
            {
                recorder.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, layout, &self.sets);
            }
            self.descriptor_binds.remove(DescriptorBindFlags::GRAPHICS);
        }
        Ok(true)
    }

    /// Issues pending binds before a dispatch. Returns false without
    /// recording anything if no compute pipeline is set.
    pub fn flush_compute<R: VulkanCommandRecorder + ?Sized>(&mut self, recorder: &mut R) -> Result<bool> {
        let Some(pipeline) = self.compute.clone() else {
            log::warn!("Dispatch issued without a compute pipeline, ignoring");
            return Ok(false);
        };

        self.prepare_params(recorder)?;

        if self.compute_requires_bind {
            recorder.bind_compute_pipeline(&pipeline);
            self.compute_requires_bind = false;
        }

        if self.descriptor_binds.contains(DescriptorBindFlags::COMPUTE) {
            let layout = pipeline.pipeline_layout(recorder.device_index());
            if let Some(layout) = layout
                && !self.sets.is_empty()
            {
                recorder.bind_descriptor_sets(vk::PipelineBindPoint::COMPUTE, layout, &self.sets);
            }
            self.descriptor_binds.remove(DescriptorBindFlags::COMPUTE);
        }
        Ok(true)
    }
}
