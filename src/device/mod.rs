//! The graphics device seam.
//!
//! Everything the scene needs from the GPU goes through [`GraphicsDevice`]:
//! buffer and texture allocation, pipeline selection keyed by [`Shading`] and
//! [`Topology`], bind groups, per-object pass encoding and batched submission.
//! Resources are referred to by typed ids so the core never holds backend
//! handles directly.
//!
//! Two implementations ship with the crate:
//!
//! - [`GpuDevice`] renders through wgpu into a window surface.
//! - [`HeadlessDevice`] records every call without touching a GPU, which is
//!   what the test suite and offscreen tooling use.
//!
//! # Frame protocol
//!
//! ```text
//! begin_frame()          clears colour and depth
//! encode_pass(..) × N    one pass per visible object, in scene order
//! submit(buffers)        one batch, then present
//! ```

mod gpu;
mod headless;

use std::ops::Range;

pub use gpu::GpuDevice;
pub use headless::{BufferKind, DeviceStats, HeadlessBuffer, HeadlessDevice, RecordedPass};

use crate::error::DeviceError;
use crate::geometry::Topology;
use crate::math::Matrix4;
use crate::texture::TextureData;

slotmap::new_key_type! {
    /// A vertex or uniform buffer.
    pub struct BufferId;
    /// A render pipeline for one shading variant and topology.
    pub struct PipelineId;
    /// A set of bound uniforms, samplers and textures.
    pub struct BindGroupId;
    /// A sampled 2D texture and its sampler.
    pub struct TextureId;
}

/// Shading variant; selects the shader program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shading {
    /// Unlit per-vertex colour.
    Flat,
    /// Per-vertex colour with Phong lighting.
    Lit,
    /// UV-mapped texture.
    Textured,
}

impl Shading {
    /// Number of vertex buffer slots the pipeline expects.
    pub fn vertex_slots(self) -> u32 {
        match self {
            Shading::Flat | Shading::Textured => 2,
            Shading::Lit => 3,
        }
    }
}

/// One entry of a bind group, bound at its position in the slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingResource {
    /// A uniform buffer.
    Buffer(BufferId),
    /// The sampler created alongside a texture.
    Sampler(TextureId),
    /// A texture's default view.
    TextureView(TextureId),
}

/// A command recorded into a [`PassEncoder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassCommand {
    SetPipeline(PipelineId),
    SetBindGroup(u32, BindGroupId),
    SetVertexBuffer(u32, BufferId),
    Draw { vertices: Range<u32> },
}

/// Backend-neutral render pass recording.
///
/// Tasks record into a `PassEncoder`; the device turns the recording into a
/// backend command buffer with [`GraphicsDevice::encode_pass`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassEncoder {
    commands: Vec<PassCommand>,
}

impl PassEncoder {
    /// An empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(PassCommand::SetPipeline(pipeline));
    }

    pub fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        self.commands.push(PassCommand::SetBindGroup(index, bind_group));
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId) {
        self.commands.push(PassCommand::SetVertexBuffer(slot, buffer));
    }

    pub fn draw(&mut self, vertices: Range<u32>) {
        self.commands.push(PassCommand::Draw { vertices });
    }

    /// Everything recorded so far, in order.
    pub fn commands(&self) -> &[PassCommand] {
        &self.commands
    }

    /// Total vertices drawn by this pass.
    pub fn vertex_count(&self) -> u32 {
        self.commands
            .iter()
            .map(|c| match c {
                PassCommand::Draw { vertices } => vertices.len() as u32,
                _ => 0,
            })
            .sum()
    }

    /// Number of draw commands, including empty ranges.
    pub fn draw_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PassCommand::Draw { .. }))
            .count()
    }
}

/// The opaque device service the scene renders through.
///
/// Allocation methods are called only while committing an object. The
/// per-frame methods (`write_buffer`, `encode_pass`) are called by render
/// tasks, and `begin_frame`/`submit` bracket each [`Scene::render`].
///
/// Device failures are unrecoverable for the current context and are
/// returned as [`DeviceError`]; nothing here retries.
///
/// [`Scene::render`]: crate::Scene::render
pub trait GraphicsDevice {
    /// The backend's finished command buffer for one pass.
    type CommandBuffer;

    /// Uploads one vertex attribute stream. `label` names the allocation in
    /// errors and debug tools.
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferId, DeviceError>;

    /// A zeroed uniform buffer of at least `size` bytes, written each frame.
    fn create_uniform_buffer(&mut self, label: &str, size: u64) -> Result<BufferId, DeviceError>;

    /// Uploads RGBA pixels with a sampler, bound via
    /// [`BindingResource::Sampler`] and [`BindingResource::TextureView`].
    fn create_texture(&mut self, label: &str, data: &TextureData) -> Result<TextureId, DeviceError>;

    /// Selects the pipeline for a shading variant and topology, creating it
    /// the first time the pair is requested.
    fn pipeline(&mut self, shading: Shading, topology: Topology) -> Result<PipelineId, DeviceError>;

    /// Binds `resources` at bindings `0..n` of the pipeline's first group.
    fn create_bind_group(
        &mut self,
        label: &str,
        pipeline: PipelineId,
        resources: &[BindingResource],
    ) -> Result<BindGroupId, DeviceError>;

    /// Overwrites `data.len()` bytes of `buffer` starting at `offset`.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError>;

    /// Starts a frame and clears the colour and depth targets.
    fn begin_frame(&mut self) -> Result<(), DeviceError>;

    /// Turns one recorded pass into a backend command buffer. The pass loads
    /// the targets cleared by `begin_frame` rather than clearing again.
    fn encode_pass(&mut self, pass: &PassEncoder) -> Result<Self::CommandBuffer, DeviceError>;

    /// Submits a frame's command buffers as one batch and presents.
    fn submit(&mut self, command_buffers: Vec<Self::CommandBuffer>) -> Result<(), DeviceError>;

    /// Frees a buffer. Work already submitted keeps using it until it
    /// completes. Unknown ids are ignored.
    fn release_buffer(&mut self, buffer: BufferId);

    /// Frees a bind group. Unknown ids are ignored.
    fn release_bind_group(&mut self, bind_group: BindGroupId);

    /// Frees a texture and its sampler. Unknown ids are ignored.
    fn release_texture(&mut self, texture: TextureId);

    /// Render target size in pixels.
    fn viewport(&self) -> (u32, u32);

    /// Resizes the render target. Zero sizes are ignored.
    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Maps the crate's `[-1, 1]` clip depth onto the backend's convention.
    /// Applied on the left of every uploaded model-view-projection.
    fn clip_correction(&self) -> Matrix4 {
        Matrix4::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn pass_encoder_counts_draws() {
        let mut pipelines: SlotMap<PipelineId, ()> = SlotMap::with_key();
        let pipeline = pipelines.insert(());

        let mut pass = PassEncoder::new();
        pass.set_pipeline(pipeline);
        pass.draw(0..36);
        pass.draw(10..10);

        assert_eq!(pass.draw_calls(), 2);
        assert_eq!(pass.vertex_count(), 36);
        assert_eq!(pass.commands()[0], PassCommand::SetPipeline(pipeline));
    }

    #[test]
    fn lit_shading_needs_normals_slot() {
        assert_eq!(Shading::Flat.vertex_slots(), 2);
        assert_eq!(Shading::Lit.vertex_slots(), 3);
        assert_eq!(Shading::Textured.vertex_slots(), 2);
    }
}
