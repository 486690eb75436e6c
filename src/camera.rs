//! Perspective camera, its GPU uniform, and camera controllers.
//!
//! The [`Camera`] is placed by position and look-at target and carries its
//! [`Projection`]. The projection's aspect ratio is the only piece of camera
//! state that follows the viewport; [`Camera::resize`] keeps it equal to
//! `width / height`.
//!
//! Controllers implement [`CameraController`]: they get every forwarded input
//! event, reconcile the camera once per tick and release whatever they hold
//! when the scene is torn down. [`OrbitController`] orbits around a target
//! with optional damping and a clamped zoom distance.

use std::f32::consts::PI;

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use instant::Duration;
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SAFE_FRAC_PI_2: f32 = PI / 2.0 - 0.0001;

#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn near(&self) -> f32 {
        self.znear
    }

    pub fn far(&self) -> f32 {
        self.zfar
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub projection: Projection,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, projection: Projection) -> Self {
        Self {
            position: position.into(),
            target: Point3::origin(),
            up: Vector3::unit_y(),
            projection,
        }
    }

    pub fn look_at<P: Into<Point3<f32>>>(&mut self, target: P) {
        self.target = target.into();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
    }

    pub fn aspect(&self) -> f32 {
        self.projection.aspect()
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.view_matrix()
    }
}

/// Camera data as laid out in the uniform buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = camera.view_proj().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// An optional collaborator that moves the camera in response to input.
pub trait CameraController {
    /// Reconcile the camera; called once per tick, before rendering.
    fn update(&mut self, camera: &mut Camera, dt: Duration);

    /// Returns `true` if the event was consumed.
    fn handle_window_event(&mut self, _event: &WindowEvent) -> bool {
        false
    }

    fn handle_device_event(&mut self, _event: &DeviceEvent) -> bool {
        false
    }

    /// Drop any held state; called once when the controller is detached by disposal.
    fn release(&mut self);
}

/// Orbits the camera around a target.
///
/// Left drag rotates, the wheel zooms. With damping enabled the motion eases
/// out over the following ticks instead of stopping instantly.
#[derive(Clone, Debug)]
pub struct OrbitController {
    pub target: Point3<f32>,
    /// Fraction of the pending motion applied per tick; `None` applies it at once.
    pub damping: Option<f32>,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians per pixel of drag.
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    dragging: bool,
    cursor: Option<(f64, f64)>,
}

impl OrbitController {
    pub fn new<P: Into<Point3<f32>>>(target: P) -> Self {
        Self {
            target: target.into(),
            damping: None,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            rotate_speed: 0.005,
            zoom_speed: 0.95,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            dragging: false,
            cursor: None,
        }
    }

    pub fn with_damping(mut self, factor: f32) -> Self {
        self.damping = Some(factor.clamp(0.0, 1.0));
        self
    }

    /// Limits given in the wrong order are swapped.
    pub fn with_distance_limits(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min.min(max).max(0.0);
        self.max_distance = max.max(min);
        self
    }

    /// Rotate around the vertical axis and towards/away from the poles.
    pub fn rotate(&mut self, theta: f32, phi: f32) {
        self.delta_theta += theta;
        self.delta_phi += phi;
    }

    /// Positive steps move closer.
    pub fn zoom(&mut self, steps: f32) {
        self.scale *= self.zoom_speed.powf(steps);
    }

    fn is_settled(&self) -> bool {
        self.delta_theta.abs() < 1e-6 && self.delta_phi.abs() < 1e-6 && (self.scale - 1.0).abs() < 1e-6
    }
}

impl CameraController for OrbitController {
    fn update(&mut self, camera: &mut Camera, _dt: Duration) {
        let offset = camera.position - self.target;
        let mut radius = offset.magnitude();
        if radius <= f32::EPSILON {
            return;
        }
        // spherical coordinates with y up
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        let portion = self.damping.unwrap_or(1.0);
        theta -= self.delta_theta * portion;
        phi -= self.delta_phi * portion;
        phi = phi.clamp(PI / 2.0 - SAFE_FRAC_PI_2, PI / 2.0 + SAFE_FRAC_PI_2);
        radius = (radius * self.scale)
            .max(self.min_distance)
            .min(self.max_distance);

        let sin_phi = phi.sin();
        let offset = Vector3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );
        camera.position = self.target + offset;
        camera.target = self.target;

        self.scale = 1.0;
        match self.damping {
            Some(factor) => {
                self.delta_theta *= 1.0 - factor;
                self.delta_phi *= 1.0 - factor;
                if self.is_settled() {
                    self.delta_theta = 0.0;
                    self.delta_phi = 0.0;
                }
            }
            None => {
                self.delta_theta = 0.0;
                self.delta_phi = 0.0;
            }
        }
    }

    fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = (position.x, position.y);
                let consumed = match (self.dragging, self.cursor) {
                    (true, Some((x, y))) => {
                        let dx = (current.0 - x) as f32;
                        let dy = (current.1 - y) as f32;
                        self.rotate(dx * self.rotate_speed, dy * self.rotate_speed);
                        true
                    }
                    _ => false,
                };
                self.cursor = Some(current);
                consumed
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.zoom(steps);
                true
            }
            _ => false,
        }
    }

    fn release(&mut self) {
        self.dragging = false;
        self.cursor = None;
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, MetricSpace};
    use winit::{
        dpi::PhysicalPosition,
        event::{DeviceId, TouchPhase},
    };

    fn device() -> DeviceId {
        // SAFETY: only compared against other dummies, never handed to the platform
        unsafe { DeviceId::dummy() }
    }

    fn button(state: ElementState) -> WindowEvent {
        WindowEvent::MouseInput {
            device_id: device(),
            state,
            button: MouseButton::Left,
        }
    }

    fn cursor(x: f64, y: f64) -> WindowEvent {
        WindowEvent::CursorMoved {
            device_id: device(),
            position: PhysicalPosition::new(x, y),
        }
    }

    fn wheel(delta: MouseScrollDelta) -> WindowEvent {
        WindowEvent::MouseWheel {
            device_id: device(),
            delta,
            phase: TouchPhase::Moved,
        }
    }

    fn camera(w: u32, h: u32) -> Camera {
        Camera::new((5.0, 3.0, 5.0), Projection::new(w, h, Deg(75.0), 0.1, 1000.0))
    }

    #[test]
    fn resize_keeps_aspect_in_sync() {
        let mut cam = camera(800, 600);
        assert_eq!(cam.aspect(), 800.0 / 600.0);
        cam.resize(1920, 1080);
        assert_eq!(cam.aspect(), 1920.0 / 1080.0);
    }

    #[test]
    fn zero_height_resize_stays_finite() {
        let mut cam = camera(800, 600);
        cam.resize(640, 0);
        assert!(cam.aspect().is_finite());
        assert_eq!(cam.aspect(), 640.0);
    }

    #[test]
    fn swapped_distance_limits_are_normalised() {
        let orbit = OrbitController::new((0.0, 0.0, 0.0)).with_distance_limits(20.0, 3.0);
        assert_eq!((orbit.min_distance, orbit.max_distance), (3.0, 20.0));

        let mut cam = camera(800, 600);
        let mut orbit = orbit;
        orbit.zoom(100.0);
        orbit.update(&mut cam, Duration::from_millis(16));
        let distance = cam.position.distance(Point3::origin());
        assert!((distance - 3.0).abs() < 1e-4, "{distance}");
    }

    #[test]
    fn inverted_public_limits_do_not_panic_in_update() {
        let mut cam = camera(800, 600);
        let mut orbit = OrbitController::new((0.0, 0.0, 0.0));
        orbit.min_distance = 20.0;
        orbit.max_distance = 3.0;
        orbit.update(&mut cam, Duration::from_millis(16));
        assert!(cam.position.distance(Point3::origin()).is_finite());
    }

    #[test]
    fn left_drag_rotates_around_the_target() {
        let mut cam = camera(800, 600);
        let start = cam.position;
        let radius = start.distance(Point3::origin());
        let mut orbit = OrbitController::new((0.0, 0.0, 0.0));

        // hovering without a pressed button does nothing
        assert!(!orbit.handle_window_event(&cursor(100.0, 100.0)));
        assert!(!orbit.handle_window_event(&cursor(120.0, 100.0)));
        orbit.update(&mut cam, Duration::from_millis(16));
        assert!(cam.position.distance(start) < 1e-4);

        assert!(orbit.handle_window_event(&button(ElementState::Pressed)));
        assert!(orbit.handle_window_event(&cursor(170.0, 110.0)));
        orbit.update(&mut cam, Duration::from_millis(16));
        assert!(cam.position.distance(start) > 0.1);
        assert!((cam.position.distance(Point3::origin()) - radius).abs() < 1e-4);

        assert!(orbit.handle_window_event(&button(ElementState::Released)));
        let moved = cam.position;
        assert!(!orbit.handle_window_event(&cursor(300.0, 300.0)));
        orbit.update(&mut cam, Duration::from_millis(16));
        assert!(cam.position.distance(moved) < 1e-4);
    }

    #[test]
    fn wheel_zooms_in_lines_and_pixels() {
        let mut cam = camera(800, 600);
        let radius = cam.position.distance(Point3::origin());
        let mut orbit = OrbitController::new((0.0, 0.0, 0.0));

        assert!(orbit.handle_window_event(&wheel(MouseScrollDelta::LineDelta(0.0, 2.0))));
        orbit.update(&mut cam, Duration::from_millis(16));
        let closer = cam.position.distance(Point3::origin());
        assert!((closer - radius * 0.95f32.powi(2)).abs() < 1e-4, "{closer}");

        let pixels = PhysicalPosition::new(0.0, -100.0);
        assert!(orbit.handle_window_event(&wheel(MouseScrollDelta::PixelDelta(pixels))));
        orbit.update(&mut cam, Duration::from_millis(16));
        let farther = cam.position.distance(Point3::origin());
        assert!((farther - radius).abs() < 1e-3, "{farther}");
    }

    #[test]
    fn unrelated_events_are_not_consumed() {
        let mut orbit = OrbitController::new((0.0, 0.0, 0.0));
        assert!(!orbit.handle_window_event(&WindowEvent::Focused(true)));
    }

    #[test]
    fn orbit_zoom_is_clamped() {
        let mut cam = camera(800, 600);
        let mut orbit = OrbitController::new((0.0, 0.0, 0.0)).with_distance_limits(3.0, 20.0);
        orbit.zoom(100.0);
        orbit.update(&mut cam, Duration::from_millis(16));
        let distance = cam.position.distance(Point3::origin());
        assert!((distance - 3.0).abs() < 1e-4, "{distance}");

        orbit.zoom(-1000.0);
        orbit.update(&mut cam, Duration::from_millis(16));
        let distance = cam.position.distance(Point3::origin());
        assert!((distance - 20.0).abs() < 1e-3, "{distance}");
    }

    #[test]
    fn orbit_rotation_keeps_distance() {
        let mut cam = camera(800, 600);
        let before = cam.position.distance(Point3::origin());
        let mut orbit = OrbitController::new((0.0, 0.0, 0.0));
        orbit.rotate(0.7, 0.2);
        orbit.update(&mut cam, Duration::from_millis(16));
        let after = cam.position.distance(Point3::origin());
        assert!((before - after).abs() < 1e-4);
        assert_ne!(cam.position, Point3::new(5.0, 3.0, 5.0));
        assert_eq!(cam.target, Point3::origin());
    }

    #[test]
    fn damped_orbit_eases_out() {
        let mut cam = camera(800, 600);
        let mut orbit = OrbitController::new((0.0, 0.0, 0.0)).with_damping(0.5);
        orbit.rotate(1.0, 0.0);
        orbit.update(&mut cam, Duration::from_millis(16));
        let first = cam.position;
        orbit.update(&mut cam, Duration::from_millis(16));
        // still moving on the next tick without new input
        assert_ne!(first, cam.position);
        for _ in 0..200 {
            orbit.update(&mut cam, Duration::from_millis(16));
        }
        let settled = cam.position;
        orbit.update(&mut cam, Duration::from_millis(16));
        assert!(settled.distance(cam.position) < 1e-4);
    }
}
