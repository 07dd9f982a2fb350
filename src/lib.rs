//! # Tessera
//!
//! **A small real-time 3D scene engine on wgpu.**
//!
//! Build geometry, add it to a scene, and render. Each object is committed
//! once, which allocates its buffers and picks its pipeline; every frame after
//! that only uploads fresh transforms and draws.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tessera::*;
//!
//! fn main() -> tessera::Result<()> {
//!     run(ViewerConfig::new().title("Shapes").grid(true), |scene| {
//!         let mut torus = RenderableObject::lit(shapes::torus(Default::default()));
//!         torus.scale(0.5, 0.5, 0.5);
//!         let torus = scene.spawn(torus)?;
//!
//!         Ok(move |frame: &mut Frame| {
//!             torus.borrow_mut().rotate_x(frame.dt);
//!         })
//!     })
//! }
//! ```
//!
//! ## Without a window
//!
//! [`Scene`] is generic over its [`GraphicsDevice`]. [`HeadlessDevice`]
//! records allocations, uniform writes and passes instead of rendering, which
//! is handy for tests and tooling:
//!
//! ```
//! use tessera::*;
//!
//! let mut scene = Scene::with_config(HeadlessDevice::new(640, 480), &ViewerConfig::new())?;
//! let sphere = scene.spawn(RenderableObject::lit(shapes::sphere(Default::default())))?;
//!
//! scene.render()?;
//! sphere.borrow_mut().translate(0.5, 0.0, 0.0);
//! scene.render()?;
//!
//! assert_eq!(scene.commits(), 1);
//! assert_eq!(scene.device().stats().passes_encoded, 2);
//! assert!(scene.pick(320.0, 240.0).is_some());
//! # Ok::<(), tessera::Error>(())
//! ```

mod app;
mod camera;
mod config;
mod controls;
mod device;
mod error;
mod geometry;
mod math;
mod object;
mod picking;
mod scene;
pub mod shapes;
mod task;
mod texture;

pub use app::{Frame, run};
pub use camera::Camera;
pub use config::ViewerConfig;
pub use controls::CameraControls;
pub use device::{
    BindGroupId, BindingResource, BufferId, BufferKind, DeviceStats, GpuDevice, GraphicsDevice,
    HeadlessBuffer, HeadlessDevice, PassCommand, PassEncoder, PipelineId, RecordedPass, Shading,
    TextureId,
};
pub use error::{DeviceError, Error, Result};
pub use geometry::{BoundingBox, Geometry, Topology};
pub use math::{Matrix4, Vector3, Vector4};
pub use object::{ObjectKind, RenderableObject, SharedObject, Visibility};
pub use picking::{Ray, RayHit, Raycaster};
pub use scene::{FrameStats, ObjectKey, Scene};
pub use task::{FrameContext, LitFragmentUniforms, LitVertexUniforms, RenderTask};
pub use texture::{Texture, TextureData};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
