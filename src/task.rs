//! Compiled per-object render tasks.
//!
//! Committing an object does all the expensive work once: vertex buffers,
//! uniform buffers, textures, pipeline selection and the bind group. The
//! resulting [`RenderTask`] then does only the per-frame work: upload fresh
//! uniforms from the current model and camera, and record one draw.

use bytemuck::{Pod, Zeroable};

use crate::camera::Camera;
use crate::device::{
    BindGroupId, BindingResource, BufferId, GraphicsDevice, PassEncoder, PipelineId, Shading,
    TextureId,
};
use crate::error::DeviceError;
use crate::geometry::{Geometry, Topology};
use crate::math::{Matrix4, Vector3};
use crate::object::ObjectKind;
use crate::texture::Texture;

/// Vertex-stage uniforms for lit shading.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LitVertexUniforms {
    /// Model-view-projection, already depth-corrected for the device.
    pub mvp: Matrix4,
    /// Object to world, for the world-space fragment position.
    pub model: Matrix4,
    /// Transpose of the inverse model matrix, for transforming normals.
    pub normal_matrix: Matrix4,
}

impl LitVertexUniforms {
    /// Derives the normal matrix from `model`. A singular model (say, scaled
    /// to zero on one axis) falls back to the model itself.
    pub fn new(mvp: Matrix4, model: Matrix4) -> Self {
        let normal_matrix = model
            .try_inverse()
            .map(|inverse| inverse.transposed())
            .unwrap_or(model);
        Self {
            mvp,
            model,
            normal_matrix,
        }
    }
}

/// Fragment-stage uniforms for lit shading. `vec3` fields are padded to 16
/// bytes to match WGSL uniform layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LitFragmentUniforms {
    /// World-space eye, for the specular term.
    pub eye: [f32; 3],
    _pad0: f32,
    /// World-space light position.
    pub light: [f32; 3],
    _pad1: f32,
}

impl LitFragmentUniforms {
    pub fn new(eye: Vector3, light: Vector3) -> Self {
        Self {
            eye: eye.to_array(),
            _pad0: 0.0,
            light: light.to_array(),
            _pad1: 0.0,
        }
    }
}

/// What a task needs from the frame being rendered.
pub struct FrameContext<'a, D: GraphicsDevice> {
    /// Receives the uniform writes and the encoded pass.
    pub device: &'a mut D,
    /// Supplies the view-projection and, for lighting, the eye.
    pub camera: &'a Camera,
    /// Light position for lit shading. `None` puts the light at the eye.
    pub light: Option<Vector3>,
}

/// Ids allocated so far during a compile, released if a later step fails.
#[derive(Default)]
struct Allocations {
    buffers: Vec<BufferId>,
    texture: Option<TextureId>,
}

impl Allocations {
    fn release<D: GraphicsDevice>(self, device: &mut D) {
        for buffer in self.buffers {
            device.release_buffer(buffer);
        }
        if let Some(texture) = self.texture {
            device.release_texture(texture);
        }
    }
}

/// The per-frame half of a committed object.
///
/// Owns every device resource the object's commit created. Call
/// [`release`](Self::release) when the task is discarded; dropping it without
/// releasing leaks the device resources until the device itself is dropped.
/// [`Scene`](crate::Scene) does this bookkeeping for the objects it holds.
///
/// # Example
///
/// ```
/// use tessera::{shapes, Camera, FrameContext, GraphicsDevice, HeadlessDevice, Matrix4, ObjectKind, RenderTask};
///
/// let mut device = HeadlessDevice::default();
/// let mut task = RenderTask::compile(&mut device, &shapes::cuboid(Default::default()), &ObjectKind::Lit)?;
/// assert_eq!(task.vertex_count(), 36);
///
/// let camera = Camera::new();
/// device.begin_frame()?;
/// let mut ctx = FrameContext { device: &mut device, camera: &camera, light: None };
/// let pass = task.execute(&Matrix4::IDENTITY, &mut ctx)?;
/// device.submit(vec![pass])?;
///
/// task.release(&mut device);
/// assert_eq!(device.live_buffers(), 0);
/// # Ok::<(), tessera::DeviceError>(())
/// ```
#[derive(Debug)]
pub struct RenderTask {
    shading: Shading,
    topology: Topology,
    texture: Option<Texture>,
    pipeline: PipelineId,
    bind_group: BindGroupId,
    vertex_buffers: Vec<BufferId>,
    vertex_uniforms: BufferId,
    fragment_uniforms: Option<BufferId>,
    texture_id: Option<TextureId>,
    vertex_count: u32,
    executions: usize,
}

impl RenderTask {
    /// Allocates the resources for drawing `geometry` with `kind` shading.
    ///
    /// Empty geometry compiles to a task that draws nothing. If any
    /// allocation fails, everything allocated before it is released and the
    /// error is returned.
    pub fn compile<D: GraphicsDevice>(
        device: &mut D,
        geometry: &Geometry,
        kind: &ObjectKind,
    ) -> Result<Self, DeviceError> {
        let mut allocations = Allocations::default();
        match Self::allocate(device, geometry, kind, &mut allocations) {
            Ok(task) => Ok(task),
            Err(err) => {
                log::debug!("commit failed, releasing partial allocations: {err}");
                allocations.release(device);
                Err(err)
            }
        }
    }

    fn allocate<D: GraphicsDevice>(
        device: &mut D,
        geometry: &Geometry,
        kind: &ObjectKind,
        allocations: &mut Allocations,
    ) -> Result<Self, DeviceError> {
        let shading = kind.shading();
        let topology = geometry.topology();
        let pipeline = device.pipeline(shading, topology)?;

        let first = match kind {
            ObjectKind::Flat | ObjectKind::Lit => {
                device.create_vertex_buffer("Vertex Colors", bytemuck::cast_slice(&geometry.resolved_colors()[..]))?
            }
            ObjectKind::Textured(_) => {
                device.create_vertex_buffer("Vertex UVs", bytemuck::cast_slice(&geometry.resolved_uvs()[..]))?
            }
        };
        allocations.buffers.push(first);

        let positions = device.create_vertex_buffer("Vertex Positions", bytemuck::cast_slice(geometry.positions()))?;
        allocations.buffers.push(positions);

        let mut vertex_buffers = vec![first, positions];
        if shading == Shading::Lit {
            let normals =
                device.create_vertex_buffer("Vertex Normals", bytemuck::cast_slice(&geometry.resolved_normals()[..]))?;
            allocations.buffers.push(normals);
            vertex_buffers.push(normals);
        }

        let uniform_size = match shading {
            Shading::Lit => size_of::<LitVertexUniforms>(),
            Shading::Flat | Shading::Textured => size_of::<Matrix4>(),
        };
        let vertex_uniforms = device.create_uniform_buffer("Transform Uniforms", uniform_size as u64)?;
        allocations.buffers.push(vertex_uniforms);

        let mut resources = vec![BindingResource::Buffer(vertex_uniforms)];
        let mut fragment_uniforms = None;
        let mut texture_id = None;

        match kind {
            ObjectKind::Flat => {}
            ObjectKind::Lit => {
                let buffer =
                    device.create_uniform_buffer("Lighting Uniforms", size_of::<LitFragmentUniforms>() as u64)?;
                allocations.buffers.push(buffer);
                resources.push(BindingResource::Buffer(buffer));
                fragment_uniforms = Some(buffer);
            }
            ObjectKind::Textured(texture) => {
                let id = device.create_texture("Object Texture", texture.data())?;
                allocations.texture = Some(id);
                resources.push(BindingResource::Sampler(id));
                resources.push(BindingResource::TextureView(id));
                texture_id = Some(id);
            }
        }

        let bind_group = device.create_bind_group("Object Bind Group", pipeline, &resources)?;

        log::debug!(
            "compiled {shading:?} task: {} vertices, {} vertex buffers",
            geometry.vertex_count(),
            vertex_buffers.len()
        );

        Ok(Self {
            shading,
            topology,
            texture: kind.texture().cloned(),
            pipeline,
            bind_group,
            vertex_buffers,
            vertex_uniforms,
            fragment_uniforms,
            texture_id,
            vertex_count: geometry.vertex_count(),
            executions: 0,
        })
    }

    /// Uploads this frame's uniforms for `model` and encodes the draw.
    ///
    /// Must be called between the device's `begin_frame` and `submit`; the
    /// returned command buffer belongs in that frame's submission.
    pub fn execute<D: GraphicsDevice>(
        &mut self,
        model: &Matrix4,
        ctx: &mut FrameContext<'_, D>,
    ) -> Result<D::CommandBuffer, DeviceError> {
        let view_projection = Matrix4::mul(&ctx.device.clip_correction(), ctx.camera.matrix());
        let mvp = Matrix4::mul(&view_projection, model);

        match self.shading {
            Shading::Lit => {
                let transforms = LitVertexUniforms::new(mvp, *model);
                ctx.device
                    .write_buffer(self.vertex_uniforms, 0, bytemuck::bytes_of(&transforms))?;

                if let Some(buffer) = self.fragment_uniforms {
                    let eye = ctx.camera.position();
                    let lighting = LitFragmentUniforms::new(eye, ctx.light.unwrap_or(eye));
                    ctx.device.write_buffer(buffer, 0, bytemuck::bytes_of(&lighting))?;
                }
            }
            Shading::Flat | Shading::Textured => {
                ctx.device
                    .write_buffer(self.vertex_uniforms, 0, bytemuck::bytes_of(&mvp))?;
            }
        }

        let mut pass = PassEncoder::new();
        pass.set_pipeline(self.pipeline);
        pass.set_bind_group(0, self.bind_group);
        for (slot, buffer) in self.vertex_buffers.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, *buffer);
        }
        pass.draw(0..self.vertex_count);

        let command_buffer = ctx.device.encode_pass(&pass)?;
        self.executions += 1;
        Ok(command_buffer)
    }

    /// Whether this task still draws `kind` correctly. False once the
    /// shading variant or the texture handle has changed since compiling.
    pub fn is_compatible(&self, kind: &ObjectKind) -> bool {
        if self.shading != kind.shading() {
            return false;
        }
        match (&self.texture, kind.texture()) {
            (Some(compiled), Some(current)) => compiled.same_as(current),
            (None, None) => true,
            _ => false,
        }
    }

    /// Frees every device resource the task owns.
    pub fn release<D: GraphicsDevice>(self, device: &mut D) {
        device.release_bind_group(self.bind_group);
        for buffer in self.vertex_buffers {
            device.release_buffer(buffer);
        }
        device.release_buffer(self.vertex_uniforms);
        if let Some(buffer) = self.fragment_uniforms {
            device.release_buffer(buffer);
        }
        if let Some(texture) = self.texture_id {
            device.release_texture(texture);
        }
    }

    /// The shading variant the task was compiled for.
    pub fn shading(&self) -> Shading {
        self.shading
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// The cached pipeline selected at compile time.
    pub fn pipeline(&self) -> PipelineId {
        self.pipeline
    }

    pub fn bind_group(&self) -> BindGroupId {
        self.bind_group
    }

    /// Attribute buffers in slot order: colours (or UVs), positions, then
    /// normals for lit shading.
    pub fn vertex_buffers(&self) -> &[BufferId] {
        &self.vertex_buffers
    }

    /// The MVP buffer, or [`LitVertexUniforms`] for lit shading.
    pub fn vertex_uniforms(&self) -> BufferId {
        self.vertex_uniforms
    }

    /// The [`LitFragmentUniforms`] buffer; only lit tasks have one.
    pub fn fragment_uniforms(&self) -> Option<BufferId> {
        self.fragment_uniforms
    }

    /// Vertices drawn per execution.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// How many times [`execute`](Self::execute) has completed.
    pub fn executions(&self) -> usize {
        self.executions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{HeadlessDevice, PassCommand};
    use crate::shapes;
    use crate::texture::TextureData;
    use approx::assert_relative_eq;

    fn camera() -> Camera {
        let mut camera = Camera::new();
        camera
            .perspective(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 100.0)
            .look_at(Vector3::new(0.0, 0.0, 5.0), Vector3::ZERO, Vector3::Y);
        camera
    }

    fn read_matrix(device: &HeadlessDevice, buffer: BufferId, offset: usize) -> Matrix4 {
        let contents = &device.buffer(buffer).unwrap().contents;
        bytemuck::pod_read_unaligned(&contents[offset..offset + 64])
    }

    #[test]
    fn flat_task_binds_two_vertex_buffers() {
        let mut device = HeadlessDevice::default();
        let task = RenderTask::compile(&mut device, &shapes::grid(Default::default()), &ObjectKind::Flat).unwrap();

        assert_eq!(task.vertex_buffers().len(), 2);
        assert_eq!(task.fragment_uniforms(), None);
        assert_eq!(device.live_buffers(), 3);
        assert_eq!(
            device.bind_group_resources(task.bind_group()),
            Some(&[BindingResource::Buffer(task.vertex_uniforms())][..])
        );
        assert_eq!(
            device.pipeline_key(task.pipeline()),
            Some((Shading::Flat, Topology::TriangleList))
        );
    }

    #[test]
    fn execute_uploads_mvp_and_draws_every_vertex() {
        let mut device = HeadlessDevice::default();
        let geometry = shapes::cuboid_wireframe(Default::default());
        let mut task = RenderTask::compile(&mut device, &geometry, &ObjectKind::Flat).unwrap();
        let camera = camera();

        let mut model = Matrix4::new();
        model.translate(1.0, 2.0, 3.0);

        device.begin_frame().unwrap();
        let mut ctx = FrameContext {
            device: &mut device,
            camera: &camera,
            light: None,
        };
        let pass = task.execute(&model, &mut ctx).unwrap();

        assert_eq!(pass.vertex_count(), 24);
        assert_eq!(pass.pipeline(), Some(task.pipeline()));
        assert!(pass.commands.contains(&PassCommand::SetVertexBuffer(1, task.vertex_buffers()[1])));
        assert_eq!(task.executions(), 1);

        let uploaded = read_matrix(&device, task.vertex_uniforms(), 0);
        let expected = Matrix4::mul(camera.matrix(), &model);
        for (a, b) in uploaded.as_array().iter().zip(expected.as_array()) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn lit_task_uploads_normal_matrix_and_lighting() {
        let mut device = HeadlessDevice::default();
        let mut task = RenderTask::compile(&mut device, &shapes::sphere(Default::default()), &ObjectKind::Lit).unwrap();
        assert_eq!(task.vertex_buffers().len(), 3);
        let camera = camera();

        let mut model = Matrix4::new();
        model.scale(2.0, 1.0, 1.0);

        device.begin_frame().unwrap();
        let mut ctx = FrameContext {
            device: &mut device,
            camera: &camera,
            light: Some(Vector3::new(10.0, 0.0, 0.0)),
        };
        task.execute(&model, &mut ctx).unwrap();

        let normal_matrix = read_matrix(&device, task.vertex_uniforms(), 128);
        assert_relative_eq!(normal_matrix.as_array()[0], 0.5);
        assert_relative_eq!(normal_matrix.as_array()[5], 1.0);

        let lighting = &device.buffer(task.fragment_uniforms().unwrap()).unwrap().contents;
        let lighting: LitFragmentUniforms = bytemuck::pod_read_unaligned(&lighting[..32]);
        assert_relative_eq!(lighting.eye[2], 5.0, epsilon = 1e-5);
        assert_eq!(lighting.light, [10.0, 0.0, 0.0]);
    }

    #[test]
    fn singular_model_keeps_model_as_normal_matrix() {
        let mut model = Matrix4::new();
        model.scale(1.0, 0.0, 1.0);
        let uniforms = LitVertexUniforms::new(Matrix4::IDENTITY, model);
        assert_eq!(uniforms.normal_matrix, model);
    }

    #[test]
    fn textured_task_binds_sampler_and_view() {
        let mut device = HeadlessDevice::default();
        let texture = Texture::new(TextureData::checkerboard(8, 2, [0; 4], [255; 4]));
        let kind = ObjectKind::Textured(texture.clone());
        let task = RenderTask::compile(&mut device, &shapes::cuboid(Default::default()), &kind).unwrap();

        let resources = device.bind_group_resources(task.bind_group()).unwrap();
        assert_eq!(resources.len(), 3);
        assert!(matches!(resources[1], BindingResource::Sampler(_)));
        assert!(matches!(resources[2], BindingResource::TextureView(_)));
        assert_eq!(device.live_textures(), 1);

        assert!(task.is_compatible(&kind));
        assert!(!task.is_compatible(&ObjectKind::Textured(Texture::new(TextureData::solid([0; 4])))));
        assert!(!task.is_compatible(&ObjectKind::Lit));
    }

    #[test]
    fn empty_geometry_draws_nothing() {
        let mut device = HeadlessDevice::default();
        let geometry = shapes::sphere(shapes::SphereOptions {
            radius: 0.0,
            ..Default::default()
        });
        let mut task = RenderTask::compile(&mut device, &geometry, &ObjectKind::Lit).unwrap();
        let camera = camera();

        device.begin_frame().unwrap();
        let mut ctx = FrameContext {
            device: &mut device,
            camera: &camera,
            light: None,
        };
        let pass = task.execute(&Matrix4::IDENTITY, &mut ctx).unwrap();
        assert_eq!(pass.vertex_count(), 0);
    }

    #[test]
    fn failed_compile_releases_partial_allocations() {
        let geometry = shapes::sphere(Default::default());
        let needed = geometry.vertex_count() as usize * 12 * 2;
        let mut device = HeadlessDevice::default().with_memory_limit(needed + 16);

        let err = RenderTask::compile(&mut device, &geometry, &ObjectKind::Lit).unwrap_err();
        assert!(matches!(err, DeviceError::OutOfMemory { .. }));
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.allocated_bytes(), 0);
    }

    #[test]
    fn release_frees_everything() {
        let mut device = HeadlessDevice::default();
        let kind = ObjectKind::Textured(Texture::new(TextureData::solid([1, 2, 3, 255])));
        let task = RenderTask::compile(&mut device, &shapes::cuboid(Default::default()), &kind).unwrap();

        task.release(&mut device);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.live_bind_groups(), 0);
        assert_eq!(device.allocated_bytes(), 0);
    }
}
