//! 4×4 homogeneous transform matrix.

use std::ops::Mul;

use super::{Vector3, Vector4};

/// A 4×4 single-precision transform, stored column-major.
///
/// Element `(row, col)` lives at index `col * 4 + row`, so indices `12..15`
/// hold the translation column. This is the same layout WGSL and `glam` use,
/// which lets the matrix be uploaded as a uniform with [`bytemuck`] directly.
///
/// Vectors are transformed as `M × v`. The elementary mutators
/// ([`translate`](Self::translate), [`rotate_x`](Self::rotate_x), ...)
/// left-multiply the current matrix, `M' = E × M`, so transforms accumulate in
/// call order and never reset what came before.
///
/// # Example
///
/// ```
/// use tessera::Matrix4;
///
/// let mut m = Matrix4::new();
/// m.translate(1.0, 0.0, 0.0).scale(2.0, 2.0, 2.0);
///
/// // The translation happened first, so it is scaled too.
/// assert_eq!(m.as_array()[12], 2.0);
/// ```
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Matrix4 {
    elements: [f32; 16],
}

#[rustfmt::skip]
const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix4 {
    /// The identity transform.
    pub const IDENTITY: Self = Self { elements: IDENTITY };

    /// Creates an identity matrix.
    pub fn new() -> Self {
        Self::IDENTITY
    }

    /// Wraps 16 column-major values.
    pub const fn from_cols_array(elements: [f32; 16]) -> Self {
        Self { elements }
    }

    /// Builds a matrix from up to 16 column-major values, zero-filling the rest.
    pub fn from_slice(values: &[f32]) -> Self {
        let mut m = Self::IDENTITY;
        m.set(values);
        m
    }

    /// Replaces the contents with up to 16 column-major values.
    ///
    /// Values past the sixteenth are ignored; missing values are zero.
    pub fn set(&mut self, values: &[f32]) -> &mut Self {
        let n = values.len().min(16);
        self.elements = [0.0; 16];
        self.elements[..n].copy_from_slice(&values[..n]);
        self
    }

    /// Resets to the identity.
    pub fn identity(&mut self) -> &mut Self {
        self.elements = IDENTITY;
        self
    }

    /// The raw column-major elements.
    pub fn as_array(&self) -> &[f32; 16] {
        &self.elements
    }

    pub fn to_cols_array(&self) -> [f32; 16] {
        self.elements
    }

    /// The four columns, each as `[x, y, z, w]`.
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        let e = &self.elements;
        [
            [e[0], e[1], e[2], e[3]],
            [e[4], e[5], e[6], e[7]],
            [e[8], e[9], e[10], e[11]],
            [e[12], e[13], e[14], e[15]],
        ]
    }

    /// Returns `left × right`.
    pub fn mul(left: &Matrix4, right: &Matrix4) -> Matrix4 {
        let a = &left.elements;
        let b = &right.elements;
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            let (x, y, z, w) = (b[col * 4], b[col * 4 + 1], b[col * 4 + 2], b[col * 4 + 3]);
            for row in 0..4 {
                out[col * 4 + row] = a[row] * x + a[4 + row] * y + a[8 + row] * z + a[12 + row] * w;
            }
        }
        Matrix4 { elements: out }
    }

    /// Writes `left × right` into `out`.
    ///
    /// The product is computed into a temporary before `out` is touched. The
    /// borrow checker already rules out `out` aliasing an operand; for in-place
    /// composition use [`premultiply`](Self::premultiply) or
    /// [`postmultiply`](Self::postmultiply).
    pub fn mul_into(out: &mut Matrix4, left: &Matrix4, right: &Matrix4) {
        *out = Self::mul(left, right);
    }

    /// `self = left × self`.
    pub fn premultiply(&mut self, left: &Matrix4) -> &mut Self {
        *self = Self::mul(left, self);
        self
    }

    /// `self = self × right`.
    pub fn postmultiply(&mut self, right: &Matrix4) -> &mut Self {
        *self = Self::mul(self, right);
        self
    }

    /// A pure translation.
    #[rustfmt::skip]
    pub fn translation(dx: f32, dy: f32, dz: f32) -> Self {
        Self::from_cols_array([
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            dx,  dy,  dz,  1.0,
        ])
    }

    /// A right-handed rotation about X; `+Y` turns toward `+Z`.
    #[rustfmt::skip]
    pub fn rotation_x(theta: f32) -> Self {
        let (s, c) = theta.sin_cos();
        Self::from_cols_array([
            1.0, 0.0, 0.0, 0.0,
            0.0, c,   s,   0.0,
            0.0, -s,  c,   0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// A right-handed rotation about Y; `+Z` turns toward `+X`.
    #[rustfmt::skip]
    pub fn rotation_y(theta: f32) -> Self {
        let (s, c) = theta.sin_cos();
        Self::from_cols_array([
            c,   0.0, -s,  0.0,
            0.0, 1.0, 0.0, 0.0,
            s,   0.0, c,   0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// A right-handed rotation about Z; `+X` turns toward `+Y`.
    #[rustfmt::skip]
    pub fn rotation_z(theta: f32) -> Self {
        let (s, c) = theta.sin_cos();
        Self::from_cols_array([
            c,   s,   0.0, 0.0,
            -s,  c,   0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// A per-axis scale about the origin.
    #[rustfmt::skip]
    pub fn scaling(sx: f32, sy: f32, sz: f32) -> Self {
        Self::from_cols_array([
            sx,  0.0, 0.0, 0.0,
            0.0, sy,  0.0, 0.0,
            0.0, 0.0, sz,  0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Moves by `(dx, dy, dz)` after everything already applied.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::{Matrix4, Vector3};
    ///
    /// let mut m = Matrix4::new();
    /// m.rotate_z(std::f32::consts::FRAC_PI_2).translate(0.0, 0.0, 3.0);
    ///
    /// let p = m.transform_point(Vector3::X);
    /// assert!((p - Vector3::new(0.0, 1.0, 3.0)).length() < 1e-6);
    /// ```
    pub fn translate(&mut self, dx: f32, dy: f32, dz: f32) -> &mut Self {
        self.premultiply(&Self::translation(dx, dy, dz))
    }

    /// Rotates about the X axis by `theta` radians.
    pub fn rotate_x(&mut self, theta: f32) -> &mut Self {
        self.premultiply(&Self::rotation_x(theta))
    }

    /// Rotates about the Y axis by `theta` radians.
    pub fn rotate_y(&mut self, theta: f32) -> &mut Self {
        self.premultiply(&Self::rotation_y(theta))
    }

    /// Rotates about the Z axis by `theta` radians.
    pub fn rotate_z(&mut self, theta: f32) -> &mut Self {
        self.premultiply(&Self::rotation_z(theta))
    }

    /// Scales about the origin, including any translation already applied.
    pub fn scale(&mut self, sx: f32, sy: f32, sz: f32) -> &mut Self {
        self.premultiply(&Self::scaling(sx, sy, sz))
    }

    /// Swaps rows and columns in place.
    pub fn transpose(&mut self) -> &mut Self {
        let e = self.elements;
        for col in 0..4 {
            for row in 0..4 {
                self.elements[col * 4 + row] = e[row * 4 + col];
            }
        }
        self
    }

    pub fn transposed(&self) -> Self {
        let mut m = *self;
        m.transpose();
        m
    }

    /// Zero exactly when the matrix has no inverse.
    pub fn determinant(&self) -> f32 {
        let c = Cofactors::new(&self.elements);
        c.determinant()
    }

    /// General inverse via cofactor expansion, or `None` if the determinant is
    /// exactly zero.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::{Matrix4, Vector3};
    ///
    /// let mut m = Matrix4::new();
    /// m.scale(2.0, 4.0, 8.0).translate(1.0, 2.0, 3.0);
    /// let inv = m.try_inverse().expect("scale is non-zero");
    /// let back = inv.transform_point(m.transform_point(Vector3::ONE));
    /// assert!((back - Vector3::ONE).length() < 1e-5);
    ///
    /// assert!(Matrix4::scaling(1.0, 0.0, 1.0).try_inverse().is_none());
    /// ```
    pub fn try_inverse(&self) -> Option<Self> {
        let a = &self.elements;
        let c = Cofactors::new(a);
        let det = c.determinant();
        if det == 0.0 {
            return None;
        }
        let inv = 1.0 / det;
        let b = &c.0;

        #[rustfmt::skip]
        let out = [
            (a[5] * b[11] - a[6] * b[10] + a[7] * b[9]) * inv,
            (a[2] * b[10] - a[1] * b[11] - a[3] * b[9]) * inv,
            (a[13] * b[5] - a[14] * b[4] + a[15] * b[3]) * inv,
            (a[10] * b[4] - a[9] * b[5] - a[11] * b[3]) * inv,
            (a[6] * b[8] - a[4] * b[11] - a[7] * b[7]) * inv,
            (a[0] * b[11] - a[2] * b[8] + a[3] * b[7]) * inv,
            (a[14] * b[2] - a[12] * b[5] - a[15] * b[1]) * inv,
            (a[8] * b[5] - a[10] * b[2] + a[11] * b[1]) * inv,
            (a[4] * b[10] - a[5] * b[8] + a[7] * b[6]) * inv,
            (a[1] * b[8] - a[0] * b[10] - a[3] * b[6]) * inv,
            (a[12] * b[4] - a[13] * b[2] + a[15] * b[0]) * inv,
            (a[9] * b[2] - a[8] * b[4] - a[11] * b[0]) * inv,
            (a[5] * b[7] - a[4] * b[9] - a[6] * b[6]) * inv,
            (a[0] * b[9] - a[1] * b[7] + a[2] * b[6]) * inv,
            (a[13] * b[1] - a[12] * b[3] - a[14] * b[0]) * inv,
            (a[8] * b[3] - a[9] * b[1] + a[10] * b[0]) * inv,
        ];
        Some(Self::from_cols_array(out))
    }

    /// Inverts in place. A singular matrix is left unchanged.
    pub fn inverse(&mut self) -> &mut Self {
        match self.try_inverse() {
            Some(inv) => *self = inv,
            None => log::trace!("inverse of singular matrix requested, leaving it unchanged"),
        }
        self
    }

    /// Returns the inverse, or an unchanged copy if the matrix is singular.
    pub fn inverted(&self) -> Self {
        self.try_inverse().unwrap_or(*self)
    }

    /// Transforms a point (`w = 1`) and drops the resulting `w`.
    ///
    /// Exact for affine matrices; use [`Vector4::transform`] when the
    /// projective part matters.
    pub fn transform_point(&self, p: Vector3) -> Vector3 {
        p.extend(1.0).transform(self).to_xyz()
    }
}

/// The twelve 2×2 sub-determinants shared by the determinant and the inverse.
struct Cofactors([f32; 12]);

impl Cofactors {
    fn new(a: &[f32; 16]) -> Self {
        Self([
            a[0] * a[5] - a[1] * a[4],
            a[0] * a[6] - a[2] * a[4],
            a[0] * a[7] - a[3] * a[4],
            a[1] * a[6] - a[2] * a[5],
            a[1] * a[7] - a[3] * a[5],
            a[2] * a[7] - a[3] * a[6],
            a[8] * a[13] - a[9] * a[12],
            a[8] * a[14] - a[10] * a[12],
            a[8] * a[15] - a[11] * a[12],
            a[9] * a[14] - a[10] * a[13],
            a[9] * a[15] - a[11] * a[13],
            a[10] * a[15] - a[11] * a[14],
        ])
    }

    fn determinant(&self) -> f32 {
        let b = &self.0;
        b[0] * b[11] - b[1] * b[10] + b[2] * b[9] + b[3] * b[8] - b[4] * b[7] + b[5] * b[6]
    }
}

impl Mul for Matrix4 {
    type Output = Matrix4;

    fn mul(self, rhs: Matrix4) -> Matrix4 {
        Matrix4::mul(&self, &rhs)
    }
}

impl Mul<Vector4> for Matrix4 {
    type Output = Vector4;

    fn mul(self, rhs: Vector4) -> Vector4 {
        rhs.transform(&self)
    }
}

impl From<glam::Mat4> for Matrix4 {
    fn from(m: glam::Mat4) -> Self {
        Self::from_cols_array(m.to_cols_array())
    }
}

impl From<Matrix4> for glam::Mat4 {
    fn from(m: Matrix4) -> Self {
        glam::Mat4::from_cols_array(&m.elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[rustfmt::skip]
    fn sample() -> Matrix4 {
        Matrix4::from_cols_array([
            2.0, 0.5, -1.0, 0.0,
            0.3, 1.5, 0.7, 0.0,
            -0.4, 0.2, 3.0, 0.0,
            4.0, -2.0, 1.0, 1.0,
        ])
    }

    fn assert_matrix_eq(a: &Matrix4, b: &Matrix4, epsilon: f32) {
        for (x, y) in a.as_array().iter().zip(b.as_array()) {
            assert_abs_diff_eq!(x, y, epsilon = epsilon);
        }
    }

    #[test]
    fn defaults_to_identity() {
        assert_eq!(Matrix4::default(), Matrix4::IDENTITY);
        assert_eq!(Matrix4::new().as_array(), &IDENTITY);
    }

    #[test]
    fn set_zero_fills_and_truncates() {
        let m = Matrix4::from_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(&m.as_array()[..3], &[1.0, 2.0, 3.0]);
        assert!(m.as_array()[3..].iter().all(|&v| v == 0.0));

        let long: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let m = Matrix4::from_slice(&long);
        assert_eq!(m.as_array()[15], 15.0);
    }

    #[test]
    fn identity_is_exact_right_and_left_unit() {
        let a = sample();
        let mut out = Matrix4::new();
        Matrix4::mul_into(&mut out, &a, &Matrix4::IDENTITY);
        assert_eq!(out, a);
        assert_eq!(Matrix4::IDENTITY * a, a);
    }

    #[test]
    fn mul_matches_glam() {
        let a = sample();
        let b = *Matrix4::new().rotate_y(0.7).translate(1.0, 2.0, 3.0);
        let ours = a * b;
        let theirs: Matrix4 = (glam::Mat4::from(a) * glam::Mat4::from(b)).into();
        assert_matrix_eq(&ours, &theirs, 1e-5);
    }

    #[test]
    fn in_place_composition_uses_a_temporary() {
        let a = sample();
        let b = *Matrix4::new().rotate_x(0.3);

        let mut pre = a;
        pre.premultiply(&b);
        assert_eq!(pre, b * a);

        let mut post = a;
        post.postmultiply(&b);
        assert_eq!(post, a * b);
    }

    #[test]
    fn inverse_composes_to_identity() {
        let a = sample();
        let inv = a.try_inverse().unwrap();
        assert_matrix_eq(&(a * inv), &Matrix4::IDENTITY, 1e-5);
        assert_matrix_eq(&(inv * a), &Matrix4::IDENTITY, 1e-5);

        let theirs: Matrix4 = glam::Mat4::from(a).inverse().into();
        assert_matrix_eq(&inv, &theirs, 1e-5);
    }

    #[test]
    fn inverse_of_projective_matrix() {
        let proj: Matrix4 = glam::Mat4::perspective_rh_gl(1.0, 1.5, 0.1, 100.0).into();
        let view = *Matrix4::new().rotate_y(0.4).translate(0.0, -1.0, -5.0);
        let vp = proj * view;
        let mut inv = vp;
        inv.inverse();
        assert_matrix_eq(&(vp * inv), &Matrix4::IDENTITY, 1e-4);
    }

    #[test]
    fn singular_inverse_leaves_matrix_unchanged() {
        let mut m = Matrix4::scaling(1.0, 0.0, 1.0);
        assert_eq!(m.determinant(), 0.0);
        assert!(m.try_inverse().is_none());
        let before = m;
        m.inverse();
        assert_eq!(m, before);
        assert_eq!(before.inverted(), before);
    }

    #[test]
    fn repeated_translate_accumulates() {
        let mut stepped = Matrix4::new();
        for _ in 0..3 {
            stepped.translate(1.0, 0.0, 0.0);
        }
        let mut once = Matrix4::new();
        once.translate(3.0, 0.0, 0.0);
        assert_matrix_eq(&stepped, &once, 1e-6);
    }

    #[test]
    fn mutators_apply_in_call_order() {
        let mut m = Matrix4::new();
        m.scale(2.0, 2.0, 2.0).translate(1.0, 0.0, 0.0);
        let p = m.transform_point(Vector3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(p.x, 3.0);

        let mut m = Matrix4::new();
        m.translate(1.0, 0.0, 0.0).scale(2.0, 2.0, 2.0);
        let p = m.transform_point(Vector3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(p.x, 4.0);
    }

    #[test]
    fn rotations_match_glam() {
        let cases: [(Matrix4, glam::Mat4); 3] = [
            (Matrix4::rotation_x(0.9), glam::Mat4::from_rotation_x(0.9)),
            (Matrix4::rotation_y(-1.2), glam::Mat4::from_rotation_y(-1.2)),
            (Matrix4::rotation_z(2.5), glam::Mat4::from_rotation_z(2.5)),
        ];
        for (ours, theirs) in cases {
            assert_matrix_eq(&ours, &theirs.into(), 1e-6);
        }
    }

    #[test]
    fn transpose_twice_is_identity_op() {
        let a = sample();
        assert_eq!(a.transposed().transposed(), a);
        assert_eq!(a.transposed().as_array()[1], a.as_array()[4]);
    }
}
