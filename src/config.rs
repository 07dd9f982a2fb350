use crate::math::Vector3;

/// Window, projection and initial camera settings for a viewer.
///
/// Every field has a sensible default, so only what differs needs setting.
/// [`run`](crate::run) uses the window fields; [`Scene::with_config`] uses
/// the camera, light and grid fields.
///
/// [`Scene::with_config`]: crate::Scene::with_config
///
/// # Example
///
/// ```
/// use tessera::{ViewerConfig, Vector3};
///
/// let config = ViewerConfig::new()
///     .title("Shapes")
///     .size(1280, 720)
///     .field_of_view(60.0)
///     .eye(Vector3::new(0.0, 2.0, 8.0));
///
/// assert_eq!(config.aspect(), 1280.0 / 720.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    /// Window title.
    pub title: String,
    /// Initial window width in logical pixels.
    pub width: u32,
    /// Initial window height in logical pixels.
    pub height: u32,
    /// Background RGBA, linear.
    pub clear_color: [f64; 4],
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near clip plane distance; must be positive.
    pub near: f32,
    /// Far clip plane distance; must exceed `near`.
    pub far: f32,
    /// Initial camera position.
    pub eye: Vector3,
    /// Point the camera looks at.
    pub target: Vector3,
    /// Which way is up for the camera.
    pub up: Vector3,
    /// Light position for lit objects. `None` keeps the light at the eye.
    pub light_position: Option<Vector3>,
    /// Waits for vertical blank when presenting.
    pub vsync: bool,
    /// Whether new scenes start with the checkerboard ground grid.
    pub grid: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Tessera".to_string(),
            width: 800,
            height: 600,
            clear_color: [0.05, 0.05, 0.08, 1.0],
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 100.0,
            eye: Vector3::new(0.0, 0.0, 5.0),
            target: Vector3::ZERO,
            up: Vector3::Y,
            light_position: None,
            vsync: true,
            grid: false,
        }
    }
}

impl ViewerConfig {
    /// The default configuration: 800×600, camera at `(0, 0, 5)` looking at
    /// the origin, 45° field of view, vsync on, no grid.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Window size in logical pixels; also sets the initial aspect ratio.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Opaque background colour.
    pub fn clear_color(mut self, r: f64, g: f64, b: f64) -> Self {
        self.clear_color = [r, g, b, 1.0];
        self
    }

    /// Vertical field of view in degrees.
    pub fn field_of_view(mut self, degrees: f32) -> Self {
        self.fov_y = degrees.to_radians();
        self
    }

    /// Near and far clip distances.
    pub fn clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn eye(mut self, eye: Vector3) -> Self {
        self.eye = eye;
        self
    }

    pub fn target(mut self, target: Vector3) -> Self {
        self.target = target;
        self
    }

    pub fn up(mut self, up: Vector3) -> Self {
        self.up = up;
        self
    }

    /// Fixes the light for lit objects instead of letting it follow the eye.
    pub fn light_position(mut self, light: Vector3) -> Self {
        self.light_position = Some(light);
        self
    }

    pub fn vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Starts scenes with the checkerboard ground grid.
    pub fn grid(mut self, grid: bool) -> Self {
        self.grid = grid;
        self
    }

    /// Width over height. A zero height counts as one pixel.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn builder_overrides_defaults() {
        let config = ViewerConfig::new()
            .size(400, 200)
            .field_of_view(90.0)
            .clip_planes(1.0, 10.0)
            .light_position(Vector3::Y)
            .vsync(false)
            .grid(true);

        assert_eq!(config.aspect(), 2.0);
        assert_relative_eq!(config.fov_y, std::f32::consts::FRAC_PI_2);
        assert_eq!((config.near, config.far), (1.0, 10.0));
        assert_eq!(config.light_position, Some(Vector3::Y));
        assert!(!config.vsync);
        assert!(config.grid);
        assert_eq!(config.title, "Tessera");
    }

    #[test]
    fn zero_height_aspect_is_finite() {
        let config = ViewerConfig::new().size(640, 0);
        assert_eq!(config.aspect(), 640.0);
    }
}
