//! Screen-space picking by ray casting against object bounding boxes.
//!
//! A pixel is unprojected through the inverse of the camera's combined
//! matrix into a world-space [`Ray`], which is then tested against the
//! world-space bounding box of every pickable object with the slab method.
//!
//! ```
//! use tessera::{shapes, HeadlessDevice, Raycaster, RenderableObject, Scene, ViewerConfig};
//!
//! let mut scene = Scene::with_config(HeadlessDevice::new(800, 600), &ViewerConfig::new()).unwrap();
//! let cube = scene.spawn(RenderableObject::lit(shapes::cuboid(Default::default()))).unwrap();
//!
//! let hit = Raycaster::new(&scene).intersect(400.0, 300.0).unwrap();
//! assert!(std::rc::Rc::ptr_eq(&hit.object, &cube));
//! assert!(hit.near < hit.far);
//! ```

use crate::device::GraphicsDevice;
use crate::geometry::BoundingBox;
use crate::math::{Vector3, Vector4};
use crate::object::SharedObject;
use crate::scene::{ObjectKey, Scene};

/// A ray in world space with a normalized direction.
///
/// Pick rays come from [`Raycaster::ray`]; building one by hand is useful for
/// testing boxes directly.
///
/// # Example
///
/// ```
/// use tessera::{Ray, Vector3};
///
/// let ray = Ray::new(Vector3::ZERO, Vector3::new(0.0, 0.0, -4.0));
/// assert_eq!(ray.direction, Vector3::new(0.0, 0.0, -1.0));
/// assert_eq!(ray.point_at(2.0), Vector3::new(0.0, 0.0, -2.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// Where the ray starts. For pick rays, a point on the near plane.
    pub origin: Vector3,
    /// Unit direction, or zero for a degenerate ray.
    pub direction: Vector3,
}

impl Ray {
    /// The direction is normalized; a zero direction stays zero.
    pub fn new(origin: Vector3, direction: Vector3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// The point `t` units along the ray.
    #[inline]
    pub fn point_at(&self, t: f32) -> Vector3 {
        self.origin + self.direction * t
    }

    /// Slab test against an axis-aligned box.
    ///
    /// Returns the entry and exit distances `(near, far)` along the ray, or
    /// `None` on a miss. Zero direction components divide to infinities,
    /// which the min/max reductions absorb.
    ///
    /// A hit needs `near < far` **and** `far >= 0`: a box lying entirely
    /// behind the ray origin is rejected even though the infinite line
    /// through it would cross it. When the origin is inside the box, `near`
    /// is negative. Empty boxes never hit.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::{BoundingBox, Ray, Vector3};
    ///
    /// let ray = Ray::new(Vector3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
    /// let ahead = BoundingBox::new(Vector3::splat(-1.0), Vector3::splat(1.0));
    /// assert_eq!(ray.intersect_box(&ahead), Some((4.0, 6.0)));
    ///
    /// let behind = BoundingBox::new(Vector3::new(-1.0, -1.0, 6.0), Vector3::new(1.0, 1.0, 7.0));
    /// assert_eq!(ray.intersect_box(&behind), None);
    /// ```
    pub fn intersect_box(&self, bounds: &BoundingBox) -> Option<(f32, f32)> {
        if bounds.is_empty() {
            return None;
        }
        let inv = self.direction.recip();
        let t1 = (bounds.min - self.origin).mul(inv);
        let t2 = (bounds.max - self.origin).mul(inv);

        let near = t1.min(t2).max_element();
        let far = t1.max(t2).min_element();

        (near < far && far >= 0.0).then_some((near, far))
    }
}

/// One object hit by a pick ray.
#[derive(Clone, Debug)]
pub struct RayHit {
    /// The hit object's key in the scene.
    pub key: ObjectKey,
    /// The hit object itself.
    pub object: SharedObject,
    /// Distance along the ray where it enters the box.
    pub near: f32,
    /// Distance along the ray where it leaves the box.
    pub far: f32,
    /// World-space entry point.
    pub point: Vector3,
}

/// Casts pick rays into a scene from its camera and viewport.
///
/// The raycaster borrows the scene, so build one per pick rather than keeping
/// it around. [`Scene::pick`] is shorthand for
/// `Raycaster::new(&scene).intersect(x, y)`.
///
/// # Example
///
/// ```
/// use tessera::{shapes, HeadlessDevice, Raycaster, RenderableObject, Scene, ViewerConfig};
///
/// let mut scene = Scene::with_config(HeadlessDevice::new(800, 600), &ViewerConfig::new())?;
/// let mut left = RenderableObject::lit(shapes::cuboid(Default::default()));
/// left.translate(-1.0, 0.0, 0.0);
/// scene.spawn(left)?;
///
/// let raycaster = Raycaster::new(&scene);
/// let ray = raycaster.ray(400.0, 300.0).expect("camera is invertible");
/// assert!(ray.direction.z < 0.0);
///
/// // The cube sits left of centre, so only the left half of the view hits it.
/// assert!(raycaster.intersect(300.0, 300.0).is_some());
/// assert!(raycaster.intersect(500.0, 300.0).is_none());
/// # Ok::<(), tessera::Error>(())
/// ```
pub struct Raycaster<'a, D: GraphicsDevice> {
    scene: &'a Scene<D>,
    width: f32,
    height: f32,
}

impl<'a, D: GraphicsDevice> Raycaster<'a, D> {
    /// Uses the scene's camera and the device's viewport size.
    pub fn new(scene: &'a Scene<D>) -> Self {
        let (width, height) = scene.device().viewport();
        Self::with_viewport(scene, width as f32, height as f32)
    }

    /// Uses an explicit viewport, e.g. the window size when it differs from
    /// the device's render target.
    pub fn with_viewport(scene: &'a Scene<D>, width: f32, height: f32) -> Self {
        Self {
            scene,
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    /// The world-space ray through pixel `(x, y)`, origin top-left.
    ///
    /// Starts on the near plane and points at the far plane. `None` when the
    /// camera matrix cannot be inverted.
    pub fn ray(&self, x: f32, y: f32) -> Option<Ray> {
        let ndc_x = 2.0 * x / self.width - 1.0;
        let ndc_y = 1.0 - 2.0 * y / self.height;

        let Some(inverse) = self.scene.camera().matrix().try_inverse() else {
            log::warn!("camera matrix is singular, cannot unproject ({x}, {y})");
            return None;
        };

        let near = Vector4::new(ndc_x, ndc_y, -1.0, 1.0)
            .transform(&inverse)
            .homogenize()
            .to_xyz();
        let far = Vector4::new(ndc_x, ndc_y, 1.0, 1.0)
            .transform(&inverse)
            .homogenize()
            .to_xyz();

        Some(Ray::new(near, far - near))
    }

    /// Every visible, pickable object under pixel `(x, y)`, nearest first.
    ///
    /// Hits are ordered by entry distance. Equal distances keep scene
    /// (insertion) order, so of two coincident objects the one added first
    /// wins.
    pub fn intersect_all(&self, x: f32, y: f32) -> Vec<RayHit> {
        let Some(ray) = self.ray(x, y) else {
            return Vec::new();
        };

        let mut hits: Vec<RayHit> = self
            .scene
            .objects()
            .filter_map(|(key, object)| {
                let (near, far) = {
                    let o = object.borrow();
                    if !o.kind().is_pickable() || !o.is_visible() {
                        return None;
                    }
                    ray.intersect_box(&o.bounding_box())?
                };
                Some(RayHit {
                    key,
                    object: object.clone(),
                    near,
                    far,
                    point: ray.point_at(near),
                })
            })
            .collect();

        hits.sort_by(|a, b| a.near.partial_cmp(&b.near).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    /// The nearest pickable object under pixel `(x, y)`.
    ///
    /// Only visible `Lit` and `Textured` objects are candidates, and boxes
    /// entirely behind the camera's near plane are rejected (see
    /// [`Ray::intersect_box`]). Returns `None` when nothing is hit or the
    /// camera matrix is singular.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::{shapes, HeadlessDevice, Raycaster, RenderableObject, Scene, ViewerConfig};
    ///
    /// let mut scene = Scene::with_config(HeadlessDevice::new(800, 600), &ViewerConfig::new())?;
    /// scene.spawn(RenderableObject::lit(shapes::sphere(Default::default())))?;
    ///
    /// let raycaster = Raycaster::new(&scene);
    /// assert!(raycaster.intersect(400.0, 300.0).is_some());
    /// assert!(raycaster.intersect(0.0, 0.0).is_none());
    /// # Ok::<(), tessera::Error>(())
    /// ```
    pub fn intersect(&self, x: f32, y: f32) -> Option<RayHit> {
        self.intersect_all(x, y).into_iter().next()
    }
}
