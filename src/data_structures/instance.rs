//! Node transforms.
//!
//! An [`Instance`] is a position, rotation (quaternion) and scale. Each scene
//! node keeps a [`NodeTransform`]: its local instance, set by the caller, and
//! its world instance, derived from the parent chain before every render.

use std::ops::Mul;

use cgmath::{Matrix4, One, Quaternion, Rotation3, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Instance {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Vector3::new(x, y, z).into()
    }

    pub fn with_scale(mut self, x: f32, y: f32, z: f32) -> Self {
        self.scale = Vector3::new(x, y, z);
        self
    }

    /// Euler rotation, applied in X, Y, Z order.
    pub fn set_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quaternion::from_angle_z(cgmath::Rad(z))
            * Quaternion::from_angle_y(cgmath::Rad(y))
            * Quaternion::from_angle_x(cgmath::Rad(x));
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Rotation part only, used to move normals into world space.
    pub fn normal_matrix(&self) -> Matrix4<f32> {
        Matrix4::from(self.rotation)
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vector3<f32>> for Instance {
    fn from(position: Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

/// `parent * child` places `child` (given in parent space) into the parent's space.
impl<'a, 'b> Mul<&'b Instance> for &'a Instance {
    type Output = Instance;

    fn mul(self, rhs: &'b Instance) -> Self::Output {
        let scaled_rhs_pos = Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        Instance {
            position: self.position + (self.rotation * scaled_rhs_pos),
            rotation: self.rotation * rhs.rotation,
            scale: Vector3::new(
                self.scale.x * rhs.scale.x,
                self.scale.y * rhs.scale.y,
                self.scale.z * rhs.scale.z,
            ),
        }
    }
}

impl Mul<Instance> for Instance {
    type Output = Self;

    fn mul(self, rhs: Instance) -> Self::Output {
        &self * &rhs
    }
}

/// Local and world transform of a scene node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeTransform {
    pub local: Instance,
    pub world: Instance,
}

impl NodeTransform {
    pub fn new(local: Instance) -> Self {
        Self {
            local,
            world: local,
        }
    }
}
