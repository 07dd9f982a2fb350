use crate::math::{Matrix4, Vector3, Vector4};

/// Perspective parameters kept so the projection can be rebuilt on resize.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Lens {
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

/// A perspective camera for 3D scenes.
///
/// The camera keeps its projection and view matrices separately and rebuilds
/// the combined `projection × view` matrix from them after every mutation, so
/// the combined matrix never drifts no matter how many relative transforms are
/// applied. The world-space eye position is kept in sync with the view for
/// lighting and picking.
///
/// Clip space follows the OpenGL convention (NDC depth in `[-1, 1]`); the GPU
/// device remaps depth on upload.
///
/// # Example
///
/// ```
/// use tessera::{Camera, Vector3};
///
/// let mut camera = Camera::new();
/// camera
///     .perspective(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0)
///     .look_at(Vector3::new(0.0, 0.0, 5.0), Vector3::ZERO, Vector3::Y);
///
/// assert_eq!(camera.position(), Vector3::new(0.0, 0.0, 5.0));
/// ```
#[derive(Clone, Debug)]
pub struct Camera {
    projection: Matrix4,
    view: Matrix4,
    matrix: Matrix4,
    position: Vector3,
    lens: Option<Lens>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    /// A camera with identity projection and view, sitting at the origin.
    pub fn new() -> Self {
        Self {
            projection: Matrix4::IDENTITY,
            view: Matrix4::IDENTITY,
            matrix: Matrix4::IDENTITY,
            position: Vector3::ZERO,
            lens: None,
        }
    }

    /// Right-handed perspective projection. `fov_y` is in radians.
    ///
    /// Requires `0 < near < far`; other inputs produce a degenerate matrix.
    #[rustfmt::skip]
    pub fn perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) -> &mut Self {
        let f = 1.0 / (fov_y / 2.0).tan();
        let d = 1.0 / (near - far);
        self.projection = Matrix4::from_cols_array([
            f / aspect, 0.0, 0.0,                    0.0,
            0.0,        f,   0.0,                    0.0,
            0.0,        0.0, (near + far) * d,       -1.0,
            0.0,        0.0, 2.0 * near * far * d,   0.0,
        ]);
        self.lens = Some(Lens { fov_y, aspect, near, far });
        self.update_matrix();
        self
    }

    /// Rebuilds the projection for a new aspect ratio, keeping field of view
    /// and clip planes. Does nothing before [`perspective`](Self::perspective).
    pub fn set_aspect(&mut self, aspect: f32) -> &mut Self {
        if let Some(lens) = self.lens {
            self.perspective(lens.fov_y, aspect, lens.near, lens.far);
        }
        self
    }

    /// Places the camera at `eye`, looking toward `target`.
    #[rustfmt::skip]
    pub fn look_at(&mut self, eye: Vector3, target: Vector3, up: Vector3) -> &mut Self {
        let z = (eye - target).normalize();
        let x = up.cross(z).normalize();
        let y = z.cross(x).normalize();
        self.view = Matrix4::from_cols_array([
            x.x,         y.x,         z.x,         0.0,
            x.y,         y.y,         z.y,         0.0,
            x.z,         y.z,         z.z,         0.0,
            -x.dot(eye), -y.dot(eye), -z.dot(eye), 1.0,
        ]);
        self.update_matrix();
        self.position = eye;
        self
    }

    /// Translates the world in front of the camera.
    ///
    /// Relative camera transforms apply in world space ahead of the view, so
    /// `translate(0.0, 0.0, 1.0)` on a camera looking down `-Z` brings the
    /// scene one unit closer.
    pub fn translate(&mut self, dx: f32, dy: f32, dz: f32) -> &mut Self {
        self.apply(&Matrix4::translation(dx, dy, dz))
    }

    /// Rotates the world about the X axis by `theta` radians, tilting the
    /// view up or down around the scene origin.
    pub fn rotate_x(&mut self, theta: f32) -> &mut Self {
        self.apply(&Matrix4::rotation_x(theta))
    }

    /// Rotates the world about the Y axis by `theta` radians, which orbits
    /// the camera around the scene's vertical axis.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::{Camera, Vector3};
    ///
    /// let mut camera = Camera::new();
    /// camera.look_at(Vector3::new(0.0, 0.0, 5.0), Vector3::ZERO, Vector3::Y);
    /// camera.rotate_y(std::f32::consts::FRAC_PI_2);
    ///
    /// // A quarter orbit keeps the distance and leaves the eye on the X axis.
    /// let eye = camera.position();
    /// assert!((eye.length() - 5.0).abs() < 1e-4);
    /// assert!((eye.x.abs() - 5.0).abs() < 1e-4);
    /// ```
    pub fn rotate_y(&mut self, theta: f32) -> &mut Self {
        self.apply(&Matrix4::rotation_y(theta))
    }

    /// Rotates the world about the Z axis by `theta` radians.
    pub fn rotate_z(&mut self, theta: f32) -> &mut Self {
        self.apply(&Matrix4::rotation_z(theta))
    }

    /// Rotates about X, then Y, then Z.
    pub fn rotate(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.rotate_x(x).rotate_y(y).rotate_z(z)
    }

    /// Scales the world ahead of the view. Uniform factors above one zoom
    /// in; a zero factor makes the view singular and the eye position stops
    /// updating until a new [`look_at`](Self::look_at).
    pub fn scale(&mut self, sx: f32, sy: f32, sz: f32) -> &mut Self {
        self.apply(&Matrix4::scaling(sx, sy, sz))
    }

    /// World-space eye position.
    pub fn position(&self) -> Vector3 {
        self.position
    }

    /// Camera space to clip space.
    pub fn projection(&self) -> &Matrix4 {
        &self.projection
    }

    /// World space to camera space, including every relative transform.
    pub fn view(&self) -> &Matrix4 {
        &self.view
    }

    /// The combined `projection × view` matrix, multiplied by each object's
    /// model matrix to get its model-view-projection.
    pub fn matrix(&self) -> &Matrix4 {
        &self.matrix
    }

    /// Aspect ratio of the last perspective projection, if any.
    pub fn aspect(&self) -> Option<f32> {
        self.lens.map(|lens| lens.aspect)
    }

    fn apply(&mut self, transform: &Matrix4) -> &mut Self {
        self.view.postmultiply(transform);
        self.update_matrix();
        self.sync_position();
        self
    }

    fn update_matrix(&mut self) {
        self.matrix = self.projection * self.view;
    }

    /// The eye is wherever the view maps to the camera-space origin.
    fn sync_position(&mut self) {
        match self.view.try_inverse() {
            Some(inv) => {
                self.position = Vector4::new(0.0, 0.0, 0.0, 1.0)
                    .transform(&inv)
                    .homogenize()
                    .to_xyz();
            }
            None => log::warn!("camera view became singular, keeping previous position"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_4;

    fn looking_down_z() -> Camera {
        let mut camera = Camera::new();
        camera
            .perspective(FRAC_PI_4, 1.5, 0.1, 100.0)
            .look_at(Vector3::new(0.0, 0.0, 5.0), Vector3::ZERO, Vector3::Y);
        camera
    }

    fn assert_matrix_eq(a: &Matrix4, b: &Matrix4) {
        for (x, y) in a.as_array().iter().zip(b.as_array()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-5);
        }
    }

    #[test]
    fn starts_as_identity() {
        let camera = Camera::new();
        assert_eq!(camera.matrix(), &Matrix4::IDENTITY);
        assert_eq!(camera.position(), Vector3::ZERO);
        assert_eq!(camera.aspect(), None);
    }

    #[test]
    fn matches_glam_gl_conventions() {
        let camera = looking_down_z();
        let proj = glam::Mat4::perspective_rh_gl(FRAC_PI_4, 1.5, 0.1, 100.0);
        let view = glam::Mat4::look_at_rh(glam::vec3(0.0, 0.0, 5.0), glam::Vec3::ZERO, glam::Vec3::Y);
        assert_matrix_eq(camera.projection(), &proj.into());
        assert_matrix_eq(camera.view(), &view.into());
        assert_matrix_eq(camera.matrix(), &(proj * view).into());
    }

    #[test]
    fn origin_is_in_front_and_eye_is_outside_clip_volume() {
        let camera = looking_down_z();

        let origin = Vector4::new(0.0, 0.0, 0.0, 1.0).transform(camera.matrix());
        assert!(origin.w > 0.0);
        let ndc = origin.homogenize();
        assert!((-1.0..=1.0).contains(&ndc.z));

        // The eye itself lands on the w = 0 plane; raw division leaves it
        // outside the NDC cube.
        let eye = Vector4::new(0.0, 0.0, 5.0, 1.0).transform(camera.matrix());
        assert_abs_diff_eq!(eye.w, 0.0, epsilon = 1e-5);
        let z = eye.z / eye.w;
        assert!(!(-1.0..=1.0).contains(&z));
    }

    #[test]
    fn combined_matrix_is_rebuilt_after_every_mutation() {
        let mut camera = looking_down_z();
        for _ in 0..100 {
            camera.rotate_y(0.1).translate(0.01, 0.0, 0.0);
        }
        let expected = *camera.projection() * *camera.view();
        assert_eq!(camera.matrix(), &expected);
    }

    #[test]
    fn translate_keeps_position_in_sync() {
        let mut camera = looking_down_z();
        camera.translate(0.0, 0.0, 1.0);
        let p = camera.position();
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.z, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn rotation_orbits_the_world_origin() {
        let mut camera = looking_down_z();
        camera.rotate_y(std::f32::consts::FRAC_PI_2);
        let p = camera.position();
        assert_abs_diff_eq!(p.length(), 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn set_aspect_rebuilds_projection() {
        let mut camera = looking_down_z();
        camera.set_aspect(2.0);
        assert_eq!(camera.aspect(), Some(2.0));
        let proj = glam::Mat4::perspective_rh_gl(FRAC_PI_4, 2.0, 0.1, 100.0);
        assert_matrix_eq(camera.projection(), &proj.into());

        let mut bare = Camera::new();
        bare.set_aspect(2.0);
        assert_eq!(bare.projection(), &Matrix4::IDENTITY);
    }
}
