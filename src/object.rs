//! Renderable objects.

use std::cell::RefCell;
use std::rc::Rc;

use crate::device::{GraphicsDevice, Shading};
use crate::error::DeviceError;
use crate::geometry::{BoundingBox, Geometry};
use crate::math::Matrix4;
use crate::task::RenderTask;
use crate::texture::Texture;

/// Whether the scene draws an object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Visible,
    /// Skipped by [`Scene::render`](crate::Scene::render); its task does no work.
    Hidden,
}

/// How an object is shaded, with the data each variant needs.
#[derive(Clone, Debug, Default)]
pub enum ObjectKind {
    /// Unlit vertex colors. Used for grids, axes and wireframes.
    #[default]
    Flat,
    /// Vertex colors with Phong lighting.
    Lit,
    /// UV-mapped texture.
    Textured(Texture),
}

impl ObjectKind {
    pub fn shading(&self) -> Shading {
        match self {
            ObjectKind::Flat => Shading::Flat,
            ObjectKind::Lit => Shading::Lit,
            ObjectKind::Textured(_) => Shading::Textured,
        }
    }

    pub fn texture(&self) -> Option<&Texture> {
        match self {
            ObjectKind::Textured(texture) => Some(texture),
            _ => None,
        }
    }

    /// Lit and textured objects are solid geometry and can be picked; flat
    /// helpers such as the grid cannot.
    pub fn is_pickable(&self) -> bool {
        !matches!(self, ObjectKind::Flat)
    }
}

/// An object shared between its owner and the scenes it was added to.
///
/// The owner keeps mutating the transform through the handle; the scene reads
/// it every frame.
pub type SharedObject = Rc<RefCell<RenderableObject>>;

/// Geometry plus an independent model transform, a visibility flag and a
/// shading variant.
///
/// Transform mutators compose onto the current model matrix in call order and
/// return `&mut Self` for chaining.
///
/// # Example
///
/// ```
/// use tessera::{shapes, RenderableObject, Vector3};
///
/// let mut cube = RenderableObject::lit(shapes::cuboid(Default::default()));
/// cube.translate(-1.5, 2.0, 0.0).scale(0.3, 0.3, 0.3);
///
/// let bounds = cube.bounding_box();
/// assert!(bounds.contains(Vector3::new(-0.45, 0.6, 0.0)));
/// ```
#[derive(Clone, Debug, Default)]
pub struct RenderableObject {
    name: Option<String>,
    model: Matrix4,
    visibility: Visibility,
    geometry: Geometry,
    kind: ObjectKind,
}

impl RenderableObject {
    /// A visible, unnamed object at the origin.
    pub fn new(geometry: Geometry, kind: ObjectKind) -> Self {
        Self {
            name: None,
            model: Matrix4::IDENTITY,
            visibility: Visibility::Visible,
            geometry,
            kind,
        }
    }

    /// Unlit, coloured per vertex.
    pub fn flat(geometry: Geometry) -> Self {
        Self::new(geometry, ObjectKind::Flat)
    }

    /// Phong-lit, coloured per vertex. Triangle geometry without normals is
    /// lit with per-face normals.
    pub fn lit(geometry: Geometry) -> Self {
        Self::new(geometry, ObjectKind::Lit)
    }

    /// Sampled from `texture` through the geometry's UVs.
    ///
    /// Pass a [`Texture`] clone to share one upload identity across objects,
    /// or [`TextureData`](crate::TextureData) to give this object its own.
    pub fn textured(geometry: Geometry, texture: impl Into<Texture>) -> Self {
        Self::new(geometry, ObjectKind::Textured(texture.into()))
    }

    /// Names the object for logs and pick reports.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Wraps the object in a [`SharedObject`] handle.
    pub fn into_shared(self) -> SharedObject {
        Rc::new(RefCell::new(self))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Object-to-world transform.
    pub fn model(&self) -> &Matrix4 {
        &self.model
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn shading(&self) -> Shading {
        self.kind.shading()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    /// World-space bounds under the current model matrix.
    pub fn bounding_box(&self) -> BoundingBox {
        self.geometry.bounding_box(&self.model)
    }

    /// Moves the object in world space.
    pub fn translate(&mut self, dx: f32, dy: f32, dz: f32) -> &mut Self {
        self.model.translate(dx, dy, dz);
        self
    }

    /// Rotates about the world X axis. Rotating after a translation swings
    /// the object around the origin; rotate first to spin it in place.
    pub fn rotate_x(&mut self, theta: f32) -> &mut Self {
        self.model.rotate_x(theta);
        self
    }

    pub fn rotate_y(&mut self, theta: f32) -> &mut Self {
        self.model.rotate_y(theta);
        self
    }

    pub fn rotate_z(&mut self, theta: f32) -> &mut Self {
        self.model.rotate_z(theta);
        self
    }

    /// Scales about the world origin.
    pub fn scale(&mut self, sx: f32, sy: f32, sz: f32) -> &mut Self {
        self.model.scale(sx, sy, sz);
        self
    }

    /// Replaces the model matrix outright.
    pub fn set_model(&mut self, model: Matrix4) -> &mut Self {
        self.model = model;
        self
    }

    pub fn set_visibility(&mut self, visibility: Visibility) -> &mut Self {
        self.visibility = visibility;
        self
    }

    pub fn show(&mut self) -> &mut Self {
        self.set_visibility(Visibility::Visible)
    }

    /// Keeps the object in its scene but stops drawing and picking it.
    pub fn hide(&mut self) -> &mut Self {
        self.set_visibility(Visibility::Hidden)
    }

    /// Switches the object to textured shading.
    ///
    /// A scene holding the object notices the change on its next render and
    /// recompiles the object's task.
    pub fn set_texture(&mut self, texture: impl Into<Texture>) -> &mut Self {
        self.kind = ObjectKind::Textured(texture.into());
        self
    }

    /// Switches shading variant; like [`set_texture`](Self::set_texture), the
    /// owning scene recompiles on its next render.
    pub fn set_kind(&mut self, kind: ObjectKind) -> &mut Self {
        self.kind = kind;
        self
    }

    /// Allocates everything the object needs on `device` and returns the
    /// task that draws it each frame.
    ///
    /// [`Scene::add`](crate::Scene::add) calls this for you. Committing
    /// directly is for driving a device without a scene; the caller then owns
    /// the task and must [`release`](RenderTask::release) it.
    ///
    /// # Errors
    ///
    /// The device's allocation error. Nothing stays allocated on failure.
    pub fn commit<D: GraphicsDevice>(&self, device: &mut D) -> Result<RenderTask, DeviceError> {
        RenderTask::compile(device, &self.geometry, &self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;
    use crate::math::Vector3;
    use crate::shapes;
    use crate::texture::TextureData;
    use approx::assert_relative_eq;

    #[test]
    fn mutators_chain_in_call_order() {
        let mut object = RenderableObject::lit(shapes::cuboid(Default::default()));
        object.translate(1.0, 0.0, 0.0).scale(2.0, 2.0, 2.0);

        // Scaling after translating scales the offset too.
        let origin = object.model().transform_point(Vector3::ZERO);
        assert_relative_eq!(origin.x, 2.0);

        let mut reordered = RenderableObject::lit(shapes::cuboid(Default::default()));
        reordered.scale(2.0, 2.0, 2.0).translate(1.0, 0.0, 0.0);
        let origin = reordered.model().transform_point(Vector3::ZERO);
        assert_relative_eq!(origin.x, 1.0);
    }

    #[test]
    fn bounding_box_follows_model() {
        let mut object = RenderableObject::lit(shapes::cuboid(Default::default()));
        object.translate(0.0, 0.0, -3.0);

        let bounds = object.bounding_box();
        assert_relative_eq!(bounds.min.z, -3.5);
        assert_relative_eq!(bounds.max.z, -2.5);
    }

    #[test]
    fn visibility_toggles() {
        let mut object = RenderableObject::default();
        assert!(object.is_visible());
        object.hide();
        assert_eq!(object.visibility(), Visibility::Hidden);
        object.show();
        assert!(object.is_visible());
    }

    #[test]
    fn set_texture_switches_shading() {
        let mut object = RenderableObject::lit(shapes::cuboid(Default::default()));
        assert_eq!(object.shading(), Shading::Lit);

        object.set_texture(TextureData::solid([255, 0, 0, 255]));
        assert_eq!(object.shading(), Shading::Textured);
        assert!(object.kind().texture().is_some());
        assert!(object.kind().is_pickable());
        assert!(!ObjectKind::Flat.is_pickable());
    }

    #[test]
    fn commit_compiles_for_current_kind() {
        let mut device = HeadlessDevice::default();
        let object = RenderableObject::flat(shapes::grid(Default::default())).with_name("grid");

        let task = object.commit(&mut device).unwrap();
        assert_eq!(task.shading(), Shading::Flat);
        assert_eq!(task.vertex_count(), object.geometry().vertex_count());
        assert_eq!(object.name(), Some("grid"));
    }
}
