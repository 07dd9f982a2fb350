//! Three- and four-component single-precision vectors.

use std::ops::{Add, Mul, Neg, Sub};

use super::Matrix4;

/// A point or direction in 3D space.
///
/// All operations are by value and never panic. Operations that would divide
/// by zero are defined explicitly: [`normalize`](Self::normalize) and
/// [`div`](Self::div) produce zero, while [`recip`](Self::recip) produces
/// IEEE-754 infinities (the slab test in picking relies on them).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Right-handed cross product `self × rhs`.
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or [`Vector3::ZERO`] for a zero vector.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len > 0.0 {
            self.scale(1.0 / len)
        } else {
            Self::ZERO
        }
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Component-wise product.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Divides every component by `s`; dividing by zero yields zero.
    pub fn div(self, s: f32) -> Self {
        if s == 0.0 {
            Self::ZERO
        } else {
            self.scale(1.0 / s)
        }
    }

    /// Component-wise reciprocal. Zero components become `±∞`.
    pub fn recip(self) -> Self {
        Self::new(1.0 / self.x, 1.0 / self.y, 1.0 / self.z)
    }

    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    pub fn min_element(self) -> f32 {
        self.x.min(self.y).min(self.z)
    }

    pub fn max_element(self) -> f32 {
        self.x.max(self.y).max(self.z)
    }

    /// Extends to a homogeneous vector with the given `w`.
    pub fn extend(self, w: f32) -> Vector4 {
        Vector4::new(self.x, self.y, self.z, w)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Vector3> for [f32; 3] {
    fn from(v: Vector3) -> Self {
        v.to_array()
    }
}

impl From<glam::Vec3> for Vector3 {
    fn from(v: glam::Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for glam::Vec3 {
    fn from(v: Vector3) -> Self {
        glam::Vec3::new(v.x, v.y, v.z)
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Vector3::add(self, rhs)
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Vector3::sub(self, rhs)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        self.scale(rhs)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// A homogeneous 4D vector.
///
/// # Example
///
/// ```
/// use tessera::{Matrix4, Vector3, Vector4};
///
/// let p = Vector4::new(1.0, 2.0, 3.0, 1.0).transform(&Matrix4::translation(1.0, 0.0, 0.0));
/// assert_eq!(p.homogenize().to_xyz(), Vector3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vector4 {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z + self.w * rhs.w
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(
            self.x - rhs.x,
            self.y - rhs.y,
            self.z - rhs.z,
            self.w - rhs.w,
        )
    }

    /// Component-wise product.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.x * rhs.x,
            self.y * rhs.y,
            self.z * rhs.z,
            self.w * rhs.w,
        )
    }

    /// Divides every component by `s`; dividing by zero yields the zero vector.
    pub fn div(self, s: f32) -> Self {
        if s == 0.0 {
            Self::default()
        } else {
            let inv = 1.0 / s;
            Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
        }
    }

    /// Full 4×4 transform `m × self`. The `w` component is kept.
    pub fn transform(self, m: &Matrix4) -> Self {
        let e = m.as_array();
        Self::new(
            e[0] * self.x + e[4] * self.y + e[8] * self.z + e[12] * self.w,
            e[1] * self.x + e[5] * self.y + e[9] * self.z + e[13] * self.w,
            e[2] * self.x + e[6] * self.y + e[10] * self.z + e[14] * self.w,
            e[3] * self.x + e[7] * self.y + e[11] * self.z + e[15] * self.w,
        )
    }

    /// Perspective divide. A zero `w` yields the zero vector.
    pub fn homogenize(self) -> Self {
        self.div(self.w)
    }

    /// Drops `w` without dividing.
    pub fn to_xyz(self) -> Vector3 {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

impl From<[f32; 4]> for Vector4 {
    fn from([x, y, z, w]: [f32; 4]) -> Self {
        Self::new(x, y, z, w)
    }
}

impl From<glam::Vec4> for Vector4 {
    fn from(v: glam::Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }
}

impl From<Vector4> for glam::Vec4 {
    fn from(v: Vector4) -> Self {
        glam::Vec4::new(v.x, v.y, v.z, v.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cross_follows_right_hand_rule() {
        assert_eq!(Vector3::X.cross(Vector3::Y), Vector3::Z);
        assert_eq!(Vector3::Y.cross(Vector3::Z), Vector3::X);
        assert_eq!(Vector3::Z.cross(Vector3::X), Vector3::Y);
    }

    #[test]
    fn normalize_zero_vector_is_zero() {
        let n = Vector3::ZERO.normalize();
        assert_eq!(n, Vector3::ZERO);
        assert!(!n.x.is_nan());
    }

    #[test]
    fn normalize_produces_unit_length() {
        let n = Vector3::new(3.0, 4.0, 12.0).normalize();
        assert_relative_eq!(n.length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(n.x, 3.0 / 13.0, epsilon = 1e-6);
    }

    #[test]
    fn div_by_zero_is_zero() {
        assert_eq!(Vector3::new(1.0, -2.0, 3.0).div(0.0), Vector3::ZERO);
        assert_eq!(
            Vector4::new(1.0, 2.0, 3.0, 4.0).div(0.0),
            Vector4::new(0.0, 0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn recip_of_zero_is_infinite() {
        let r = Vector3::new(0.0, -0.0, 2.0).recip();
        assert_eq!(r.x, f32::INFINITY);
        assert_eq!(r.y, f32::NEG_INFINITY);
        assert_eq!(r.z, 0.5);
    }

    #[test]
    fn transform_keeps_w() {
        let m = Matrix4::from_cols_array([
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, -1.0, //
            0.0, 0.0, 0.0, 0.0,
        ]);
        let v = Vector4::new(1.0, 2.0, -4.0, 1.0).transform(&m);
        assert_eq!(v, Vector4::new(1.0, 2.0, -4.0, 4.0));
        assert_eq!(v.homogenize().to_xyz(), Vector3::new(0.25, 0.5, -1.0));
    }

    #[test]
    fn component_min_max() {
        let a = Vector3::new(1.0, 5.0, -2.0);
        let b = Vector3::new(3.0, -1.0, -4.0);
        assert_eq!(a.min(b), Vector3::new(1.0, -1.0, -4.0));
        assert_eq!(a.max(b), Vector3::new(3.0, 5.0, -2.0));
        assert_eq!(a.max_element(), 5.0);
        assert_eq!(b.min_element(), -4.0);
    }
}
