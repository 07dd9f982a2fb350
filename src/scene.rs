//! The scene: an ordered registry of committed objects, a camera and the
//! per-frame submission loop.

use std::rc::Rc;

use slotmap::SlotMap;

use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::device::GraphicsDevice;
use crate::error::DeviceError;
use crate::math::Vector3;
use crate::object::{RenderableObject, SharedObject};
use crate::picking::{RayHit, Raycaster};
use crate::shapes;
use crate::task::{FrameContext, RenderTask};

slotmap::new_key_type! {
    /// Stable handle of an object within one scene.
    pub struct ObjectKey;
}

struct Entry {
    object: SharedObject,
    task: RenderTask,
}

/// What one [`Scene::render`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Tasks executed, one per visible object.
    pub executed: usize,
    /// Hidden objects passed over.
    pub skipped: usize,
    /// Objects recompiled because their shading or texture changed.
    pub recommitted: usize,
    /// Vertices drawn across every executed task.
    pub vertices: u32,
}

/// Objects, camera and device for one view.
///
/// Objects are [`SharedObject`] handles: the caller keeps mutating transforms
/// and visibility through its own clone of the handle, and every render reads
/// the current state. Adding an object commits it right away, allocating its
/// device resources once; rendering only runs the compiled tasks.
///
/// Submission order is insertion order. Re-adding an object keeps its place.
///
/// The scene owns its device. Dropping the scene releases every task's
/// resources before the device goes away.
///
/// # Example
///
/// ```
/// use tessera::{shapes, HeadlessDevice, RenderableObject, Scene};
///
/// let mut scene = Scene::new(HeadlessDevice::default());
/// let cube = RenderableObject::lit(shapes::cuboid(Default::default())).into_shared();
/// scene.add(&cube).unwrap();
///
/// cube.borrow_mut().rotate_y(0.5);
/// let stats = scene.render().unwrap();
/// assert_eq!(stats.executed, 1);
/// ```
pub struct Scene<D: GraphicsDevice> {
    device: D,
    camera: Camera,
    light: Option<Vector3>,
    entries: SlotMap<ObjectKey, Entry>,
    order: Vec<ObjectKey>,
    commits: usize,
}

impl<D: GraphicsDevice> Scene<D> {
    /// An empty scene with an identity camera.
    pub fn new(device: D) -> Self {
        Self {
            device,
            camera: Camera::new(),
            light: None,
            entries: SlotMap::with_key(),
            order: Vec::new(),
            commits: 0,
        }
    }

    /// A scene whose camera and light come from `config`. Adds the ground
    /// grid when [`ViewerConfig::grid`] is set.
    pub fn with_config(device: D, config: &ViewerConfig) -> Result<Self, DeviceError> {
        let (width, height) = device.viewport();
        let mut scene = Self::new(device);
        scene
            .camera
            .perspective(config.fov_y, width as f32 / height.max(1) as f32, config.near, config.far)
            .look_at(config.eye, config.target, config.up);
        scene.light = config.light_position;
        if config.grid {
            scene.add_grid()?;
        }
        Ok(scene)
    }

    /// An empty scene holding only the default checkerboard ground grid.
    pub fn with_grid(device: D) -> Result<Self, DeviceError> {
        let mut scene = Self::new(device);
        scene.add_grid()?;
        Ok(scene)
    }

    fn add_grid(&mut self) -> Result<SharedObject, DeviceError> {
        let grid = RenderableObject::flat(shapes::grid(Default::default()))
            .with_name("grid")
            .into_shared();
        self.add(&grid)?;
        Ok(grid)
    }

    /// Commits `object` and appends it to the scene.
    ///
    /// Adding an object that is already present recommits it in place: the
    /// new task replaces the old one, whose resources are released, and the
    /// object keeps its position in the submission order.
    pub fn add(&mut self, object: &SharedObject) -> Result<ObjectKey, DeviceError> {
        let task = object.borrow().commit(&mut self.device)?;
        self.commits += 1;

        if let Some(key) = self.key_of(object) {
            if let Some(entry) = self.entries.get_mut(key) {
                let old = std::mem::replace(&mut entry.task, task);
                old.release(&mut self.device);
                log::debug!("re-added object {key:?}, released its previous task");
            }
            return Ok(key);
        }

        let key = self.entries.insert(Entry {
            object: Rc::clone(object),
            task,
        });
        self.order.push(key);
        log::debug!("added object {key:?} ({} in scene)", self.order.len());
        Ok(key)
    }

    /// Adds each object in turn, stopping at the first device failure.
    pub fn add_all<'a>(
        &mut self,
        objects: impl IntoIterator<Item = &'a SharedObject>,
    ) -> Result<Vec<ObjectKey>, DeviceError> {
        objects.into_iter().map(|object| self.add(object)).collect()
    }

    /// Wraps `object` in a shared handle, adds it, and returns the handle.
    pub fn spawn(&mut self, object: RenderableObject) -> Result<SharedObject, DeviceError> {
        let object = object.into_shared();
        self.add(&object)?;
        Ok(object)
    }

    /// Removes `object` and releases its task. Returns `false` if the object
    /// was not in the scene, which is not an error.
    ///
    /// The caller's handle stays valid; adding it again commits it afresh at
    /// the end of the submission order.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::{shapes, HeadlessDevice, RenderableObject, Scene};
    ///
    /// let mut scene = Scene::new(HeadlessDevice::default());
    /// let sphere = scene.spawn(RenderableObject::lit(shapes::sphere(Default::default())))?;
    ///
    /// assert!(scene.delete(&sphere));
    /// assert!(!scene.delete(&sphere));
    /// assert_eq!(scene.device().live_buffers(), 0);
    /// # Ok::<(), tessera::Error>(())
    /// ```
    pub fn delete(&mut self, object: &SharedObject) -> bool {
        match self.key_of(object) {
            Some(key) => self.remove(key).is_some(),
            None => false,
        }
    }

    /// Removes the object stored under `key`, releasing its task, and hands
    /// back its handle. `None` if the key is stale or from another scene.
    pub fn remove(&mut self, key: ObjectKey) -> Option<SharedObject> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| *k != key);
        entry.task.release(&mut self.device);
        log::debug!("removed object {key:?}");
        Some(entry.object)
    }

    /// Removes every object, releasing all tasks.
    pub fn clear(&mut self) {
        for key in self.order.drain(..) {
            if let Some(entry) = self.entries.remove(key) {
                entry.task.release(&mut self.device);
            }
        }
        log::debug!("cleared scene");
    }

    /// Draws one frame.
    ///
    /// Visible objects execute their tasks in insertion order; hidden objects
    /// are skipped without touching the device. An object whose shading or
    /// texture changed since it was committed is recommitted first. All
    /// passes are submitted together at the end.
    ///
    /// With nothing visible the frame is still begun and submitted, which
    /// clears the target.
    ///
    /// # Errors
    ///
    /// Any [`DeviceError`] from acquiring the frame, recommitting, writing
    /// uniforms or submitting. The frame is abandoned at the first failure.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::{shapes, HeadlessDevice, RenderableObject, Scene};
    ///
    /// let mut scene = Scene::new(HeadlessDevice::default());
    /// scene.spawn(RenderableObject::flat(shapes::axes(Default::default())))?;
    /// let hidden = scene.spawn(RenderableObject::lit(shapes::torus(Default::default())))?;
    /// hidden.borrow_mut().hide();
    ///
    /// let stats = scene.render()?;
    /// assert_eq!((stats.executed, stats.skipped), (1, 1));
    /// # Ok::<(), tessera::Error>(())
    /// ```
    pub fn render(&mut self) -> Result<FrameStats, DeviceError> {
        let mut stats = FrameStats::default();
        self.device.begin_frame()?;

        let mut command_buffers = Vec::with_capacity(self.order.len());
        for key in &self.order {
            let Some(entry) = self.entries.get_mut(*key) else {
                continue;
            };
            let object = entry.object.borrow();
            if !object.is_visible() {
                stats.skipped += 1;
                continue;
            }

            if !entry.task.is_compatible(object.kind()) {
                let task = object.commit(&mut self.device)?;
                let old = std::mem::replace(&mut entry.task, task);
                old.release(&mut self.device);
                self.commits += 1;
                stats.recommitted += 1;
                log::debug!("recommitted object {key:?} as {:?}", object.shading());
            }

            let mut ctx = FrameContext {
                device: &mut self.device,
                camera: &self.camera,
                light: self.light,
            };
            command_buffers.push(entry.task.execute(object.model(), &mut ctx)?);
            stats.executed += 1;
            stats.vertices += entry.task.vertex_count();
        }

        self.device.submit(command_buffers)?;
        log::trace!(
            "frame: {} executed, {} skipped, {} vertices",
            stats.executed,
            stats.skipped,
            stats.vertices
        );
        Ok(stats)
    }

    /// Resizes the device target and matches the camera's aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.device.resize(width, height);
        self.camera.set_aspect(width as f32 / height as f32);
    }

    /// The nearest pickable object under a screen pixel, measured from the
    /// top-left of the device's viewport. See [`Raycaster::intersect`].
    pub fn pick(&self, x: f32, y: f32) -> Option<RayHit> {
        Raycaster::new(self).intersect(x, y)
    }

    /// Objects in submission order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectKey, &SharedObject)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(*key).map(|entry| (*key, &entry.object)))
    }

    /// The object stored under `key`.
    pub fn get(&self, key: ObjectKey) -> Option<&SharedObject> {
        self.entries.get(key).map(|entry| &entry.object)
    }

    /// The key `object` was added under, compared by handle identity.
    pub fn key_of(&self, object: &SharedObject) -> Option<ObjectKey> {
        self.entries
            .iter()
            .find(|(_, entry)| Rc::ptr_eq(&entry.object, object))
            .map(|(key, _)| key)
    }

    /// Whether this exact handle is in the scene.
    pub fn contains(&self, object: &SharedObject) -> bool {
        self.key_of(object).is_some()
    }

    /// The compiled task for `key`, e.g. to inspect its execution count.
    pub fn task(&self, key: ObjectKey) -> Option<&RenderTask> {
        self.entries.get(key).map(|entry| &entry.task)
    }

    /// Number of objects, visible or not.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Total commits performed, including recommits.
    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// The device the scene renders through, e.g. to read
    /// [`HeadlessDevice`](crate::HeadlessDevice) statistics.
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The explicit light position, or `None` when the light follows the eye.
    pub fn light_position(&self) -> Option<Vector3> {
        self.light
    }

    /// Moves the light used by lit objects. `None` puts it back at the eye.
    pub fn set_light_position(&mut self, light: Option<Vector3>) {
        self.light = light;
    }
}

impl<D: GraphicsDevice> Drop for Scene<D> {
    fn drop(&mut self) {
        self.clear();
    }
}
