//! Raw vertex attribute data and bounding volumes.
//!
//! A [`Geometry`] is what a renderable object draws: flat arrays of positions
//! plus optional per-vertex colors, normals and texture coordinates, and the
//! primitive [`Topology`] to assemble them with. Geometry is pure CPU data;
//! nothing here touches the device.
//!
//! ```
//! use tessera::{Geometry, Matrix4, Topology};
//!
//! let triangle = Geometry::new(
//!     Topology::TriangleList,
//!     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
//! )
//! .with_color([1.0, 0.5, 0.0]);
//!
//! assert_eq!(triangle.vertex_count(), 3);
//!
//! let mut model = Matrix4::new();
//! model.translate(0.0, 0.0, -2.0);
//! assert_eq!(triangle.bounding_box(&model).min.z, -2.0);
//! ```

use std::borrow::Cow;

use crate::math::{Matrix4, Vector3};

/// How vertices are assembled into primitives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Every two vertices form a line segment.
    LineList,
}

impl Topology {
    /// Vertices consumed by one triangle or line. A trailing partial
    /// primitive is not drawn.
    pub fn vertices_per_primitive(self) -> usize {
        match self {
            Topology::TriangleList => 3,
            Topology::LineList => 2,
        }
    }
}

/// Axis-aligned bounding box.
///
/// The empty box has `min = +∞` and `max = −∞`; it contains nothing and no ray
/// ever hits it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Smallest coordinate on each axis.
    pub min: Vector3,
    /// Largest coordinate on each axis.
    pub max: Vector3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: Vector3::splat(f32::INFINITY),
        max: Vector3::splat(f32::NEG_INFINITY),
    };

    pub const fn new(min: Vector3, max: Vector3) -> Self {
        Self { min, max }
    }

    /// Tight bounds of a point set. No points gives [`BoundingBox::EMPTY`].
    pub fn from_points(points: impl IntoIterator<Item = Vector3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |b, p| Self {
            min: b.min.min(p),
            max: b.max.max(p),
        })
    }

    pub fn from_positions(positions: &[[f32; 3]]) -> Self {
        Self::from_points(positions.iter().copied().map(Vector3::from))
    }

    /// True when the box encloses nothing, as with [`BoundingBox::EMPTY`].
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn center(&self) -> Vector3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector3 {
        if self.is_empty() {
            Vector3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn contains(&self, p: Vector3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// The eight corners, `min` first and `max` last.
    pub fn corners(&self) -> [Vector3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vector3::new(a.x, a.y, a.z),
            Vector3::new(b.x, a.y, a.z),
            Vector3::new(a.x, b.y, a.z),
            Vector3::new(b.x, b.y, a.z),
            Vector3::new(a.x, a.y, b.z),
            Vector3::new(b.x, a.y, b.z),
            Vector3::new(a.x, b.y, b.z),
            Vector3::new(b.x, b.y, b.z),
        ]
    }

    /// Axis-aligned bounds of this box after an affine transform.
    ///
    /// All eight corners are transformed, so rotations produce a box that
    /// still encloses the rotated contents.
    pub fn transformed(&self, m: &Matrix4) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Self::from_points(self.corners().into_iter().map(|c| m.transform_point(c)))
    }
}

/// Vertex attribute data for one drawable.
///
/// Positions are required; colors, normals and UVs are optional and are
/// filled with defaults when a shading variant needs them but they are
/// missing or shorter than the position list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    topology: Topology,
    positions: Vec<[f32; 3]>,
    colors: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    bounds: BoundingBox,
}

impl Geometry {
    pub const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

    /// Geometry from positions alone; attributes are added with the
    /// `with_*` builders.
    pub fn new(topology: Topology, positions: Vec<[f32; 3]>) -> Self {
        let bounds = BoundingBox::from_positions(&positions);
        Self {
            topology,
            positions,
            colors: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            bounds,
        }
    }

    /// Geometry with no vertices. It commits and draws nothing.
    pub fn empty(topology: Topology) -> Self {
        Self::new(topology, Vec::new())
    }

    /// Builds geometry from a flat `[x, y, z, x, y, z, ...]` array.
    ///
    /// A trailing partial triple is ignored.
    pub fn from_flat(topology: Topology, positions: &[f32]) -> Self {
        Self::new(topology, triples(positions))
    }

    pub fn with_colors(mut self, colors: Vec<[f32; 3]>) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_flat_colors(self, colors: &[f32]) -> Self {
        self.with_colors(triples(colors))
    }

    /// Gives every vertex the same color.
    pub fn with_color(mut self, rgb: [f32; 3]) -> Self {
        self.colors = vec![rgb; self.positions.len()];
        self
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_flat_normals(self, normals: &[f32]) -> Self {
        self.with_normals(triples(normals))
    }

    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn with_flat_uvs(self, uvs: &[f32]) -> Self {
        self.with_uvs(uvs.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    /// Vertices drawn per frame, one per position.
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Local-space bounds, computed once from the positions.
    pub fn local_bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// World-space bounds under `model`.
    pub fn bounding_box(&self, model: &Matrix4) -> BoundingBox {
        self.bounds.transformed(model)
    }

    /// Colors with one entry per vertex, padding with [`Self::DEFAULT_COLOR`].
    pub fn resolved_colors(&self) -> Cow<'_, [[f32; 3]]> {
        padded(&self.colors, self.positions.len(), Self::DEFAULT_COLOR)
    }

    /// UVs with one entry per vertex, padding with `(0, 0)`.
    pub fn resolved_uvs(&self) -> Cow<'_, [[f32; 2]]> {
        padded(&self.uvs, self.positions.len(), [0.0, 0.0])
    }

    /// Normals with one entry per vertex.
    ///
    /// When the geometry carries no usable normals, triangle lists get
    /// per-face normals and everything else gets `+Y`.
    pub fn resolved_normals(&self) -> Cow<'_, [[f32; 3]]> {
        if self.normals.len() >= self.positions.len() {
            return Cow::Borrowed(&self.normals[..self.positions.len()]);
        }
        if !self.normals.is_empty() {
            return padded(&self.normals, self.positions.len(), [0.0, 1.0, 0.0]);
        }
        match self.topology {
            Topology::TriangleList => Cow::Owned(face_normals(&self.positions)),
            Topology::LineList => Cow::Owned(vec![[0.0, 1.0, 0.0]; self.positions.len()]),
        }
    }
}

fn triples(flat: &[f32]) -> Vec<[f32; 3]> {
    flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

fn padded<const N: usize>(data: &[[f32; N]], len: usize, fill: [f32; N]) -> Cow<'_, [[f32; N]]> {
    if data.len() >= len {
        return Cow::Borrowed(&data[..len]);
    }
    let mut out = data.to_vec();
    out.resize(len, fill);
    Cow::Owned(out)
}

fn face_normals(positions: &[[f32; 3]]) -> Vec<[f32; 3]> {
    let mut normals = Vec::with_capacity(positions.len());
    for tri in positions.chunks(3) {
        let n = match tri {
            [a, b, c] => {
                let (a, b, c) = (Vector3::from(*a), Vector3::from(*b), Vector3::from(*c));
                (b - a).cross(c - a).normalize().to_array()
            }
            _ => [0.0, 1.0, 0.0],
        };
        normals.extend(std::iter::repeat_n(n, tri.len()));
    }
    normals
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unit_cube_corners() -> Vec<[f32; 3]> {
        BoundingBox::new(Vector3::splat(-1.0), Vector3::ONE)
            .corners()
            .iter()
            .map(|c| c.to_array())
            .collect()
    }

    #[test]
    fn bounds_are_computed_from_positions() {
        let g = Geometry::new(
            Topology::LineList,
            vec![[1.0, -2.0, 0.5], [-3.0, 4.0, 0.0]],
        );
        assert_eq!(g.local_bounds().min, Vector3::new(-3.0, -2.0, 0.0));
        assert_eq!(g.local_bounds().max, Vector3::new(1.0, 4.0, 0.5));
    }

    #[test]
    fn empty_geometry_has_empty_bounds() {
        let g = Geometry::empty(Topology::TriangleList);
        assert!(g.is_empty());
        assert_eq!(g.vertex_count(), 0);
        assert!(g.local_bounds().is_empty());
        assert!(g.bounding_box(&Matrix4::scaling(2.0, 2.0, 2.0)).is_empty());
        assert_eq!(g.local_bounds().size(), Vector3::ZERO);
    }

    #[test]
    fn rotated_box_encloses_all_corners() {
        let g = Geometry::new(Topology::TriangleList, unit_cube_corners());
        let mut model = Matrix4::new();
        model.rotate_y(std::f32::consts::FRAC_PI_4);
        let b = g.bounding_box(&model);
        let half_diagonal = std::f32::consts::SQRT_2;
        assert_abs_diff_eq!(b.max.x, half_diagonal, epsilon = 1e-5);
        assert_abs_diff_eq!(b.min.z, -half_diagonal, epsilon = 1e-5);
        assert_abs_diff_eq!(b.max.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn translated_and_scaled_bounds() {
        let g = Geometry::new(Topology::TriangleList, unit_cube_corners());
        let mut model = Matrix4::new();
        model.scale(2.0, 1.0, 1.0).translate(5.0, 0.0, 0.0);
        let b = g.bounding_box(&model);
        assert_eq!(b.min, Vector3::new(3.0, -1.0, -1.0));
        assert_eq!(b.max, Vector3::new(7.0, 1.0, 1.0));
        assert!(b.contains(Vector3::new(5.0, 0.0, 0.0)));
        assert!(!b.contains(Vector3::ZERO));
    }

    #[test]
    fn flat_arrays_ignore_partial_tail() {
        let g = Geometry::from_flat(Topology::LineList, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 9.0])
            .with_flat_uvs(&[0.0, 1.0, 1.0]);
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(g.uvs(), &[[0.0, 1.0]]);
        assert_eq!(g.resolved_uvs().as_ref(), &[[0.0, 1.0], [0.0, 0.0]]);
    }

    #[test]
    fn missing_colors_are_padded() {
        let g = Geometry::from_flat(Topology::LineList, &[0.0; 6])
            .with_colors(vec![[1.0, 0.0, 0.0]]);
        assert_eq!(
            g.resolved_colors().as_ref(),
            &[[1.0, 0.0, 0.0], Geometry::DEFAULT_COLOR]
        );
        assert!(matches!(g.with_color([0.0; 3]).resolved_colors(), Cow::Borrowed(_)));
    }

    #[test]
    fn missing_normals_become_face_normals() {
        let g = Geometry::new(
            Topology::TriangleList,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        );
        assert_eq!(g.resolved_normals().as_ref(), &[[0.0, 0.0, 1.0]; 3]);
    }

    #[test]
    fn topology_primitive_sizes() {
        assert_eq!(Topology::TriangleList.vertices_per_primitive(), 3);
        assert_eq!(Topology::LineList.vertices_per_primitive(), 2);
    }
}
