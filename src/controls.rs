use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::camera::Camera;

/// Pointer travel, in pixels, below which a left press-release is a click.
const CLICK_SLOP: f32 = 4.0;

/// Mouse-driven camera control.
///
/// - Left drag rotates about Y; with Ctrl held, about X.
/// - Right drag pans along X; with Ctrl held, along Y.
/// - The wheel scales the view.
/// - A left click without dragging is reported back as a pick position.
#[derive(Clone, Debug)]
pub struct CameraControls {
    /// Radians per pixel of drag.
    pub rotate_speed: f32,
    /// World units per full window width (or height) of drag.
    pub pan_speed: f32,
    /// Fractional scale change per wheel line.
    pub zoom_speed: f32,
    button: Option<MouseButton>,
    ctrl: bool,
    cursor: Vec2,
    travel: f32,
}

impl Default for CameraControls {
    fn default() -> Self {
        Self {
            rotate_speed: std::f32::consts::PI / 180.0,
            pan_speed: 4.0,
            zoom_speed: 0.1,
            button: None,
            ctrl: false,
            cursor: Vec2::ZERO,
            travel: 0.0,
        }
    }
}

impl CameraControls {
    /// Controls with the default speeds and no button held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a window event to `camera`. Returns the cursor position when
    /// the event completes a click.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut Camera, viewport: (u32, u32)) -> Option<Vec2> {
        match event {
            WindowEvent::ModifiersChanged(modifiers) => {
                self.set_ctrl(modifiers.state().control_key());
                None
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.press(*button);
                    None
                }
                ElementState::Released => self.release(*button),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.move_to(Vec2::new(position.x as f32, position.y as f32), camera, viewport);
                None
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                self.scroll(lines, camera);
                None
            }
            _ => None,
        }
    }

    /// Switches drags to their Ctrl variants: rotation about X and panning
    /// along Y. Normally driven by `ModifiersChanged` in
    /// [`handle_event`](Self::handle_event).
    pub fn set_ctrl(&mut self, held: bool) {
        self.ctrl = held;
    }

    /// Starts a drag with `button`.
    pub fn press(&mut self, button: MouseButton) {
        self.button = Some(button);
        self.travel = 0.0;
    }

    /// Ends a drag. A left release that barely moved is a click.
    pub fn release(&mut self, button: MouseButton) -> Option<Vec2> {
        let was = self.button.take();
        (button == MouseButton::Left && was == Some(MouseButton::Left) && self.travel < CLICK_SLOP)
            .then_some(self.cursor)
    }

    /// Moves the pointer to `position` (window pixels), dragging the camera
    /// when a button is held. Pans are scaled by the viewport so a full-width
    /// drag moves [`pan_speed`](Self::pan_speed) units.
    pub fn move_to(&mut self, position: Vec2, camera: &mut Camera, viewport: (u32, u32)) {
        let delta = self.cursor - position;
        self.cursor = position;
        let Some(button) = self.button else {
            return;
        };
        self.travel += delta.length();

        let (width, height) = (viewport.0.max(1) as f32, viewport.1.max(1) as f32);
        match (button, self.ctrl) {
            (MouseButton::Left, false) => {
                camera.rotate(0.0, delta.x * self.rotate_speed, 0.0);
            }
            (MouseButton::Left, true) => {
                camera.rotate(delta.y * self.rotate_speed, 0.0, 0.0);
            }
            (MouseButton::Right, false) => {
                camera.translate(-delta.x * self.pan_speed / width, 0.0, 0.0);
            }
            (MouseButton::Right, true) => {
                camera.translate(0.0, delta.y * self.pan_speed / height, 0.0);
            }
            _ => {}
        }
    }

    /// Scales the view; positive lines zoom in.
    pub fn scroll(&mut self, lines: f32, camera: &mut Camera) {
        if lines == 0.0 {
            return;
        }
        let factor = (1.0 + lines * self.zoom_speed).max(0.1);
        camera.scale(factor, factor, factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;
    use approx::assert_relative_eq;

    fn camera() -> Camera {
        let mut camera = Camera::new();
        camera
            .perspective(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 100.0)
            .look_at(Vector3::new(0.0, 0.0, 5.0), Vector3::ZERO, Vector3::Y);
        camera
    }

    #[test]
    fn short_left_press_is_a_click() {
        let mut controls = CameraControls::new();
        let mut camera = camera();
        controls.move_to(Vec2::new(100.0, 50.0), &mut camera, (800, 600));
        controls.press(MouseButton::Left);
        controls.move_to(Vec2::new(101.0, 50.0), &mut camera, (800, 600));

        assert_eq!(controls.release(MouseButton::Left), Some(Vec2::new(101.0, 50.0)));
    }

    #[test]
    fn drag_is_not_a_click() {
        let mut controls = CameraControls::new();
        let mut camera = camera();
        controls.press(MouseButton::Left);
        controls.move_to(Vec2::new(50.0, 0.0), &mut camera, (800, 600));

        assert_eq!(controls.release(MouseButton::Left), None);
        assert_eq!(controls.release(MouseButton::Right), None);
    }

    #[test]
    fn left_drag_rotates_about_y() {
        let mut controls = CameraControls::new();
        let mut camera = camera();
        controls.move_to(Vec2::new(90.0, 0.0), &mut camera, (800, 600));
        controls.press(MouseButton::Left);
        controls.move_to(Vec2::ZERO, &mut camera, (800, 600));

        // A quarter turn keeps the eye five units from the origin.
        let eye = camera.position();
        assert_relative_eq!(eye.length(), 5.0, epsilon = 1e-4);
        assert_relative_eq!(eye.y, 0.0, epsilon = 1e-4);
        assert!(eye.z.abs() < 1e-3);
    }

    #[test]
    fn ctrl_left_drag_rotates_about_x() {
        let mut controls = CameraControls::new();
        let mut camera = camera();
        controls.set_ctrl(true);
        controls.move_to(Vec2::new(0.0, 90.0), &mut camera, (800, 600));
        controls.press(MouseButton::Left);
        controls.move_to(Vec2::ZERO, &mut camera, (800, 600));

        let eye = camera.position();
        assert_relative_eq!(eye.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(eye.y.abs(), 5.0, epsilon = 1e-3);
        assert!(eye.z.abs() < 1e-3);
    }

    #[test]
    fn moving_without_a_button_leaves_camera_alone() {
        let mut controls = CameraControls::new();
        let mut camera = camera();
        let before = *camera.matrix();
        controls.move_to(Vec2::new(300.0, 200.0), &mut camera, (800, 600));
        assert_eq!(*camera.matrix(), before);
    }

    #[test]
    fn wheel_scales_view() {
        let mut controls = CameraControls::new();
        let mut camera = camera();
        controls.scroll(1.0, &mut camera);
        assert_relative_eq!(camera.view().as_array()[0], 1.1, epsilon = 1e-5);

        controls.scroll(-100.0, &mut camera);
        assert!(camera.view().as_array()[0] > 0.0);
    }
}
