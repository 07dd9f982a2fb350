//! A [`GraphicsDevice`] that records instead of rendering.

use std::collections::HashMap;

use slotmap::SlotMap;

use super::{
    BindGroupId, BindingResource, BufferId, GraphicsDevice, PassCommand, PassEncoder, PipelineId,
    Shading, TextureId,
};
use crate::error::DeviceError;
use crate::geometry::Topology;
use crate::texture::TextureData;

/// What a recorded buffer was created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Uniform,
}

/// A buffer as seen by the headless device: its creation label, kind and
/// current contents.
#[derive(Clone, Debug)]
pub struct HeadlessBuffer {
    pub label: String,
    pub kind: BufferKind,
    pub contents: Vec<u8>,
    /// Number of `write_buffer` calls since creation.
    pub writes: usize,
    size: usize,
}

#[derive(Clone, Debug)]
struct HeadlessBindGroup {
    pipeline: PipelineId,
    resources: Vec<BindingResource>,
}

#[derive(Clone, Debug)]
struct HeadlessTexture {
    bytes: usize,
}

/// The command buffer of a [`HeadlessDevice`]: a copy of the encoded pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedPass {
    pub commands: Vec<PassCommand>,
}

impl RecordedPass {
    pub fn vertex_count(&self) -> u32 {
        self.commands
            .iter()
            .map(|c| match c {
                PassCommand::Draw { vertices } => vertices.len() as u32,
                _ => 0,
            })
            .sum()
    }

    pub fn pipeline(&self) -> Option<PipelineId> {
        self.commands.iter().find_map(|c| match c {
            PassCommand::SetPipeline(id) => Some(*id),
            _ => None,
        })
    }
}

/// Running totals of everything a [`HeadlessDevice`] was asked to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub buffers_created: usize,
    pub buffers_released: usize,
    pub textures_created: usize,
    pub textures_released: usize,
    pub bind_groups_created: usize,
    pub bind_groups_released: usize,
    pub pipelines_created: usize,
    pub pipeline_requests: usize,
    pub buffer_writes: usize,
    pub passes_encoded: usize,
    /// Draw commands across every encoded pass.
    pub draw_calls: usize,
    /// Whole triangles or lines drawn, per the pipeline's topology.
    pub primitives_drawn: usize,
    pub frames_submitted: usize,
}

/// Records allocations, uniform writes, passes and submissions without a GPU.
///
/// Resource ids are validated the same way [`GpuDevice`](super::GpuDevice)
/// validates them, and the frame protocol is enforced, so code that works
/// here exercises the same calls the GPU path sees.
///
/// ```
/// use tessera::{GraphicsDevice, HeadlessDevice};
///
/// let mut device = HeadlessDevice::new(320, 240);
/// device.begin_frame().unwrap();
/// device.submit(Vec::new()).unwrap();
///
/// assert_eq!(device.frames().len(), 1);
/// assert_eq!(device.viewport(), (320, 240));
/// ```
#[derive(Debug)]
pub struct HeadlessDevice {
    width: u32,
    height: u32,
    buffers: SlotMap<BufferId, HeadlessBuffer>,
    textures: SlotMap<TextureId, HeadlessTexture>,
    pipelines: SlotMap<PipelineId, (Shading, Topology)>,
    pipeline_cache: HashMap<(Shading, Topology), PipelineId>,
    bind_groups: SlotMap<BindGroupId, HeadlessBindGroup>,
    frame_open: bool,
    frames: Vec<Vec<RecordedPass>>,
    stats: DeviceStats,
    allocated: usize,
    memory_limit: Option<usize>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl HeadlessDevice {
    /// A device with a `width × height` viewport and no memory limit.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            pipeline_cache: HashMap::new(),
            bind_groups: SlotMap::with_key(),
            frame_open: false,
            frames: Vec::new(),
            stats: DeviceStats::default(),
            allocated: 0,
            memory_limit: None,
        }
    }

    /// Fails any buffer or texture allocation that would take the total
    /// above `bytes` with [`DeviceError::OutOfMemory`].
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Totals since the device was created.
    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Bytes held by live buffers and textures.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    /// Buffers allocated and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_bind_groups(&self) -> usize {
        self.bind_groups.len()
    }

    /// A live buffer's recorded contents.
    pub fn buffer(&self, id: BufferId) -> Option<&HeadlessBuffer> {
        self.buffers.get(id)
    }

    /// What a live bind group binds, in binding order.
    pub fn bind_group_resources(&self, id: BindGroupId) -> Option<&[BindingResource]> {
        self.bind_groups.get(id).map(|g| g.resources.as_slice())
    }

    /// The (shading, topology) pair a pipeline was created for.
    pub fn pipeline_key(&self, id: PipelineId) -> Option<(Shading, Topology)> {
        self.pipelines.get(id).copied()
    }

    /// True between `begin_frame` and `submit`.
    pub fn is_frame_open(&self) -> bool {
        self.frame_open
    }

    /// Every submitted frame, oldest first.
    pub fn frames(&self) -> &[Vec<RecordedPass>] {
        &self.frames
    }

    /// The passes of the most recently submitted frame.
    pub fn last_frame(&self) -> Option<&[RecordedPass]> {
        self.frames.last().map(Vec::as_slice)
    }

    fn reserve(&mut self, label: &str, bytes: usize) -> Result<(), DeviceError> {
        if let Some(limit) = self.memory_limit
            && self.allocated + bytes > limit
        {
            return Err(DeviceError::OutOfMemory {
                label: label.to_owned(),
            });
        }
        self.allocated += bytes;
        Ok(())
    }

    fn insert_buffer(&mut self, label: &str, kind: BufferKind, contents: Vec<u8>) -> Result<BufferId, DeviceError> {
        let size = contents.len();
        self.reserve(label, size)?;
        self.stats.buffers_created += 1;
        Ok(self.buffers.insert(HeadlessBuffer {
            label: label.to_owned(),
            kind,
            contents,
            writes: 0,
            size,
        }))
    }

    fn check_resource(&self, resource: &BindingResource) -> Result<(), DeviceError> {
        let known = match *resource {
            BindingResource::Buffer(id) => self.buffers.contains_key(id),
            BindingResource::Sampler(id) | BindingResource::TextureView(id) => self.textures.contains_key(id),
        };
        if known {
            Ok(())
        } else {
            Err(DeviceError::UnknownResource {
                kind: match resource {
                    BindingResource::Buffer(_) => "buffer",
                    _ => "texture",
                },
            })
        }
    }

    fn check_command(&self, command: &PassCommand) -> Result<(), DeviceError> {
        let (known, kind) = match *command {
            PassCommand::SetPipeline(id) => (self.pipelines.contains_key(id), "pipeline"),
            PassCommand::SetBindGroup(_, id) => (self.bind_groups.contains_key(id), "bind group"),
            PassCommand::SetVertexBuffer(_, id) => (self.buffers.contains_key(id), "buffer"),
            PassCommand::Draw { .. } => (true, "draw"),
        };
        if known {
            Ok(())
        } else {
            log::warn!("pass references an unknown {kind}");
            Err(DeviceError::UnknownResource { kind })
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    type CommandBuffer = RecordedPass;

    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferId, DeviceError> {
        self.insert_buffer(label, BufferKind::Vertex, contents.to_vec())
    }

    fn create_uniform_buffer(&mut self, label: &str, size: u64) -> Result<BufferId, DeviceError> {
        self.insert_buffer(label, BufferKind::Uniform, vec![0; size as usize])
    }

    fn create_texture(&mut self, label: &str, data: &TextureData) -> Result<TextureId, DeviceError> {
        self.reserve(label, data.byte_len())?;
        self.stats.textures_created += 1;
        Ok(self.textures.insert(HeadlessTexture {
            bytes: data.byte_len(),
        }))
    }

    fn pipeline(&mut self, shading: Shading, topology: Topology) -> Result<PipelineId, DeviceError> {
        self.stats.pipeline_requests += 1;
        if let Some(&id) = self.pipeline_cache.get(&(shading, topology)) {
            return Ok(id);
        }
        let id = self.pipelines.insert((shading, topology));
        self.pipeline_cache.insert((shading, topology), id);
        self.stats.pipelines_created += 1;
        Ok(id)
    }

    fn create_bind_group(
        &mut self,
        _label: &str,
        pipeline: PipelineId,
        resources: &[BindingResource],
    ) -> Result<BindGroupId, DeviceError> {
        if !self.pipelines.contains_key(pipeline) {
            return Err(DeviceError::UnknownResource { kind: "pipeline" });
        }
        for resource in resources {
            self.check_resource(resource)?;
        }
        self.stats.bind_groups_created += 1;
        Ok(self.bind_groups.insert(HeadlessBindGroup {
            pipeline,
            resources: resources.to_vec(),
        }))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let buffer = self
            .buffers
            .get_mut(buffer)
            .ok_or(DeviceError::UnknownResource { kind: "buffer" })?;
        let start = offset as usize;
        let end = start + data.len();
        if buffer.contents.len() < end {
            buffer.contents.resize(end, 0);
        }
        buffer.contents[start..end].copy_from_slice(data);
        buffer.writes += 1;
        self.stats.buffer_writes += 1;
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<(), DeviceError> {
        if self.frame_open {
            log::warn!("previous frame was never submitted, dropping it");
        }
        self.frame_open = true;
        Ok(())
    }

    fn encode_pass(&mut self, pass: &PassEncoder) -> Result<RecordedPass, DeviceError> {
        if !self.frame_open {
            return Err(DeviceError::NoFrame);
        }
        for command in pass.commands() {
            self.check_command(command)?;
        }
        if let Some(PassCommand::SetPipeline(id)) = pass.commands().first()
            && let Some(group) = pass.commands().iter().find_map(|c| match c {
                PassCommand::SetBindGroup(_, g) => self.bind_groups.get(*g),
                _ => None,
            })
            && group.pipeline != *id
        {
            log::warn!("bind group was created for a different pipeline");
        }

        let key = pass.commands().iter().find_map(|c| match c {
            PassCommand::SetPipeline(id) => self.pipelines.get(*id).copied(),
            _ => None,
        });
        let draw_calls = pass.draw_calls();
        if let Some((shading, topology)) = key
            && draw_calls > 0
        {
            let bound = pass
                .commands()
                .iter()
                .filter(|c| matches!(c, PassCommand::SetVertexBuffer(..)))
                .count() as u32;
            if bound < shading.vertex_slots() {
                return Err(DeviceError::VertexBuffers {
                    expected: shading.vertex_slots(),
                    bound,
                });
            }
            self.stats.primitives_drawn += pass.vertex_count() as usize / topology.vertices_per_primitive();
        }
        self.stats.draw_calls += draw_calls;
        self.stats.passes_encoded += 1;
        Ok(RecordedPass {
            commands: pass.commands().to_vec(),
        })
    }

    fn submit(&mut self, command_buffers: Vec<RecordedPass>) -> Result<(), DeviceError> {
        if !self.frame_open {
            return Err(DeviceError::NoFrame);
        }
        self.frame_open = false;
        self.frames.push(command_buffers);
        self.stats.frames_submitted += 1;
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.buffers.remove(buffer) {
            self.allocated -= buffer.size;
            self.stats.buffers_released += 1;
        }
    }

    fn release_bind_group(&mut self, bind_group: BindGroupId) {
        if self.bind_groups.remove(bind_group).is_some() {
            self.stats.bind_groups_released += 1;
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(texture) = self.textures.remove(texture) {
            self.allocated -= texture.bytes;
            self.stats.textures_released += 1;
        }
    }

    fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipelines_are_cached_per_shading_and_topology() {
        let mut device = HeadlessDevice::default();
        let a = device.pipeline(Shading::Lit, Topology::TriangleList).unwrap();
        let b = device.pipeline(Shading::Lit, Topology::TriangleList).unwrap();
        let c = device.pipeline(Shading::Flat, Topology::LineList).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(device.stats().pipelines_created, 2);
        assert_eq!(device.stats().pipeline_requests, 3);
        assert_eq!(device.pipeline_key(c), Some((Shading::Flat, Topology::LineList)));
    }

    #[test]
    fn passes_require_an_open_frame() {
        let mut device = HeadlessDevice::default();
        let pass = PassEncoder::new();

        assert!(matches!(device.encode_pass(&pass), Err(DeviceError::NoFrame)));
        assert!(matches!(device.submit(Vec::new()), Err(DeviceError::NoFrame)));

        device.begin_frame().unwrap();
        let recorded = device.encode_pass(&pass).unwrap();
        device.submit(vec![recorded]).unwrap();

        assert!(!device.is_frame_open());
        assert_eq!(device.frames().len(), 1);
        assert_eq!(device.last_frame().map(|f| f.len()), Some(1));
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut device = HeadlessDevice::default();
        let buffer = device.create_vertex_buffer("positions", &[0; 12]).unwrap();
        device.release_buffer(buffer);

        assert!(matches!(
            device.write_buffer(buffer, 0, &[1]),
            Err(DeviceError::UnknownResource { kind: "buffer" })
        ));

        let pipeline = device.pipeline(Shading::Flat, Topology::TriangleList).unwrap();
        let result = device.create_bind_group("uniforms", pipeline, &[BindingResource::Buffer(buffer)]);
        assert!(result.is_err());

        // Releasing twice is harmless.
        device.release_buffer(buffer);
        assert_eq!(device.stats().buffers_released, 1);
    }

    #[test]
    fn memory_limit_reports_out_of_memory() {
        let mut device = HeadlessDevice::default().with_memory_limit(100);
        device.create_uniform_buffer("a", 64).unwrap();

        let err = device.create_vertex_buffer("b", &[0; 64]).unwrap_err();
        assert!(matches!(err, DeviceError::OutOfMemory { ref label } if label == "b"));
        assert_eq!(device.allocated_bytes(), 64);
        assert_eq!(device.live_buffers(), 1);
    }

    #[test]
    fn writes_land_at_offset() {
        let mut device = HeadlessDevice::default();
        let buffer = device.create_uniform_buffer("u", 8).unwrap();
        device.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();

        let recorded = device.buffer(buffer).unwrap();
        assert_eq!(recorded.contents, vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(recorded.writes, 1);
        assert_eq!(recorded.kind, BufferKind::Uniform);
    }

    #[test]
    fn texture_release_returns_memory() {
        let mut device = HeadlessDevice::default();
        let texture = device
            .create_texture("checker", &TextureData::checkerboard(4, 2, [0; 4], [255; 4]))
            .unwrap();
        assert_eq!(device.allocated_bytes(), 64);

        device.release_texture(texture);
        assert_eq!(device.allocated_bytes(), 0);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn draws_need_every_vertex_slot_bound() {
        let mut device = HeadlessDevice::default();
        let pipeline = device.pipeline(Shading::Lit, Topology::TriangleList).unwrap();
        let colors = device.create_vertex_buffer("colors", &[0; 72]).unwrap();
        let positions = device.create_vertex_buffer("positions", &[0; 72]).unwrap();
        let normals = device.create_vertex_buffer("normals", &[0; 72]).unwrap();

        let mut pass = PassEncoder::new();
        pass.set_pipeline(pipeline);
        pass.set_vertex_buffer(0, colors);
        pass.set_vertex_buffer(1, positions);
        pass.draw(0..6);

        device.begin_frame().unwrap();
        assert!(matches!(
            device.encode_pass(&pass),
            Err(DeviceError::VertexBuffers { expected: 3, bound: 2 })
        ));

        pass.set_vertex_buffer(2, normals);
        pass.draw(0..6);
        device.encode_pass(&pass).unwrap();

        let stats = device.stats();
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.primitives_drawn, 4);
    }

    #[test]
    fn line_passes_count_segments() {
        let mut device = HeadlessDevice::default();
        let pipeline = device.pipeline(Shading::Flat, Topology::LineList).unwrap();
        let colors = device.create_vertex_buffer("colors", &[0; 72]).unwrap();
        let positions = device.create_vertex_buffer("positions", &[0; 72]).unwrap();

        let mut pass = PassEncoder::new();
        pass.set_pipeline(pipeline);
        pass.set_vertex_buffer(0, colors);
        pass.set_vertex_buffer(1, positions);
        pass.draw(0..6);

        device.begin_frame().unwrap();
        device.encode_pass(&pass).unwrap();
        assert_eq!(device.stats().primitives_drawn, 3);
    }
}
