use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::ViewerConfig;
use crate::controls::CameraControls;
use crate::device::GpuDevice;
use crate::error::{DeviceError, Error, Result};
use crate::scene::Scene;

/// Per-frame access handed to the frame closure before each render.
pub struct Frame<'a> {
    pub scene: &'a mut Scene<GpuDevice>,
    /// Seconds since the scene was set up.
    pub time: f32,
    /// Seconds since the previous frame.
    pub dt: f32,
}

/// Opens a window and renders a scene into it until the window closes.
///
/// `setup` receives the freshly created scene (camera and light already
/// configured from `config`), adds its objects, and returns a closure that
/// runs before every frame.
///
/// ```ignore
/// use tessera::{shapes, RenderableObject, ViewerConfig};
///
/// tessera::run(ViewerConfig::new().title("Spin"), |scene| {
///     let cube = scene.spawn(RenderableObject::lit(shapes::cuboid(Default::default())))?;
///
///     Ok(move |frame: &mut tessera::Frame| {
///         cube.borrow_mut().rotate_y(frame.dt);
///     })
/// })
/// ```
pub fn run<S, F>(config: ViewerConfig, setup: S) -> Result<()>
where
    S: FnOnce(&mut Scene<GpuDevice>) -> Result<F> + 'static,
    F: FnMut(&mut Frame) + 'static,
{
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = TesseraApp::Pending {
        config,
        setup: Some(Box::new(move |scene| {
            let frame_fn = setup(scene)?;
            Ok(Box::new(frame_fn) as Box<dyn FnMut(&mut Frame)>)
        })),
    };

    event_loop.run_app(&mut app)?;

    match app {
        TesseraApp::Failed(err) => Err(err),
        _ => Ok(()),
    }
}

type SetupFn = Box<dyn FnOnce(&mut Scene<GpuDevice>) -> Result<Box<dyn FnMut(&mut Frame)>>>;

enum TesseraApp {
    Pending {
        config: ViewerConfig,
        setup: Option<SetupFn>,
    },
    Running(Box<Running>),
    Failed(Error),
}

struct Running {
    window: Arc<Window>,
    scene: Scene<GpuDevice>,
    controls: CameraControls,
    frame_fn: Box<dyn FnMut(&mut Frame)>,
    start_time: Instant,
    last_frame: Instant,
}

impl Running {
    fn start(event_loop: &ActiveEventLoop, config: &ViewerConfig, setup: SetupFn) -> Result<Self> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let device = GpuDevice::new(Arc::clone(&window), config)?;
        let mut scene = Scene::with_config(device, config)?;
        let frame_fn = setup(&mut scene)?;
        log::info!("scene ready with {} objects", scene.len());

        window.request_redraw();
        Ok(Self {
            window,
            scene,
            controls: CameraControls::new(),
            frame_fn,
            start_time: Instant::now(),
            last_frame: Instant::now(),
        })
    }

    fn handle(&mut self, event_loop: &ActiveEventLoop, event: WindowEvent) -> Result<()> {
        let viewport = (self.window.inner_size().width, self.window.inner_size().height);
        if let Some(click) = self
            .controls
            .handle_event(&event, self.scene.camera_mut(), viewport)
        {
            self.pick(click.x, click.y);
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.scene.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let mut frame = Frame {
                    scene: &mut self.scene,
                    time: self.start_time.elapsed().as_secs_f32(),
                    dt: now.duration_since(self.last_frame).as_secs_f32(),
                };
                self.last_frame = now;
                (self.frame_fn)(&mut frame);

                match self.scene.render() {
                    Ok(_) => {}
                    // Lost and outdated surfaces were reconfigured; try again next frame.
                    Err(DeviceError::Surface(
                        err @ (wgpu::SurfaceError::Lost
                        | wgpu::SurfaceError::Outdated
                        | wgpu::SurfaceError::Timeout),
                    )) => log::warn!("skipping frame: {err}"),
                    Err(err) => return Err(err.into()),
                }
                self.window.request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    fn pick(&self, x: f32, y: f32) {
        match self.scene.pick(x, y) {
            Some(hit) => {
                let object = hit.object.borrow();
                log::info!(
                    "picked {} ({:?}) at distance {:.3}, point ({:.2}, {:.2}, {:.2})",
                    object.name().unwrap_or("object"),
                    hit.key,
                    hit.near,
                    hit.point.x,
                    hit.point.y,
                    hit.point.z
                );
            }
            None => log::info!("nothing under ({x}, {y})"),
        }
    }
}

impl ApplicationHandler for TesseraApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let TesseraApp::Pending { config, setup } = self else {
            return;
        };
        let Some(setup) = setup.take() else {
            return;
        };

        match Running::start(event_loop, config, setup) {
            Ok(running) => *self = TesseraApp::Running(Box::new(running)),
            Err(err) => {
                log::error!("failed to start: {err}");
                event_loop.exit();
                *self = TesseraApp::Failed(err);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let TesseraApp::Running(running) = self else {
            return;
        };
        if let Err(err) = running.handle(event_loop, event) {
            log::error!("{err}");
            event_loop.exit();
            *self = TesseraApp::Failed(err);
        }
    }
}
