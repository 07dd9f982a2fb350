//! Procedural geometry builders.
//!
//! Every builder takes an options struct whose `Default` gives a reasonable
//! shape, and returns a [`Geometry`] with its local bounds already computed.
//! Solid shapes are triangle lists with normals (and UVs where a natural
//! parameterisation exists); wireframes and helpers are line lists.
//!
//! Out-of-range parameters never fail. They produce empty geometry, which
//! commits and draws zero vertices and is never hit by a ray.
//!
//! ```
//! use tessera::shapes::{self, SphereOptions};
//!
//! let ball = shapes::sphere(SphereOptions { radius: 2.0, ..Default::default() });
//! assert!(!ball.is_empty());
//!
//! let nothing = shapes::sphere(SphereOptions { u: 2, ..Default::default() });
//! assert!(nothing.is_empty());
//! ```

use std::f32::consts::{PI, TAU};

use crate::geometry::{Geometry, Topology};
use crate::math::Vector3;

/// Box dimensions along X (`length`), Z (`width`) and Y (`height`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CuboidOptions {
    pub length: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for CuboidOptions {
    fn default() -> Self {
        Self {
            length: 1.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

impl CuboidOptions {
    fn is_degenerate(&self) -> bool {
        !(self.length > 0.0 && self.width > 0.0 && self.height > 0.0)
    }
}

/// UV sphere. `u` rings from pole to pole, `v` segments around.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereOptions {
    pub radius: f32,
    /// Rings; fewer than 3 gives nothing.
    pub u: u32,
    /// Segments; fewer than 3 gives nothing.
    pub v: u32,
}

impl Default for SphereOptions {
    fn default() -> Self {
        Self {
            radius: 1.0,
            u: 60,
            v: 40,
        }
    }
}

impl SphereOptions {
    fn is_degenerate(&self) -> bool {
        self.u < 3 || self.v < 3 || !(self.radius > 0.0)
    }

    fn grid(&self) -> Vec<Vec<Vector3>> {
        let r = self.radius;
        (0..self.u)
            .map(|i| {
                let theta = i as f32 / (self.u - 1) as f32 * PI;
                (0..self.v)
                    .map(|j| {
                        let phi = j as f32 / (self.v - 1) as f32 * TAU;
                        Vector3::new(
                            r * theta.sin() * phi.cos(),
                            r * theta.cos(),
                            r * theta.sin() * phi.sin(),
                        )
                    })
                    .collect()
            })
            .collect()
    }
}

/// Torus around the Y axis. `major_radius` is the ring, `minor_radius` the tube.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TorusOptions {
    pub major_radius: f32,
    pub minor_radius: f32,
    /// Segments around the ring; fewer than 4 gives nothing.
    pub u: u32,
    /// Segments around the tube; fewer than 4 gives nothing.
    pub v: u32,
}

impl Default for TorusOptions {
    fn default() -> Self {
        Self {
            major_radius: 1.5,
            minor_radius: 0.5,
            u: 50,
            v: 30,
        }
    }
}

impl TorusOptions {
    fn is_degenerate(&self) -> bool {
        self.u < 4
            || self.v < 4
            || !(self.minor_radius > 0.0)
            || self.minor_radius >= self.major_radius
    }

    /// Surface points paired with their outward normals.
    fn grid(&self) -> Vec<Vec<(Vector3, Vector3)>> {
        let (big, small) = (self.major_radius, self.minor_radius);
        (0..self.u)
            .map(|i| {
                let theta = i as f32 / (self.u - 1) as f32 * TAU;
                (0..self.v)
                    .map(|j| {
                        let phi = j as f32 / (self.v - 1) as f32 * TAU;
                        let normal = Vector3::new(
                            phi.cos() * theta.cos(),
                            phi.sin(),
                            phi.cos() * theta.sin(),
                        );
                        let center = Vector3::new(big * theta.cos(), 0.0, big * theta.sin());
                        (center + normal * small, normal)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Thick-walled tube standing on the Y axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CylinderOptions {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub height: f32,
    /// Segments around the axis; fewer than 3 gives nothing.
    pub segments: u32,
}

impl Default for CylinderOptions {
    fn default() -> Self {
        Self {
            inner_radius: 0.8,
            outer_radius: 1.5,
            height: 3.0,
            segments: 60,
        }
    }
}

impl CylinderOptions {
    fn is_degenerate(&self) -> bool {
        self.segments < 3 || self.inner_radius >= self.outer_radius
    }

    /// Per segment: outer top, outer bottom, inner bottom, inner top.
    fn rings(&self) -> Vec<[Vector3; 4]> {
        let h = self.height / 2.0;
        let at = |radius: f32, angle: f32, y: f32| {
            Vector3::new(radius * angle.cos(), y, -radius * angle.sin())
        };
        (0..self.segments)
            .map(|i| {
                let angle = i as f32 / (self.segments - 1) as f32 * TAU;
                [
                    at(self.outer_radius, angle, h),
                    at(self.outer_radius, angle, -h),
                    at(self.inner_radius, angle, -h),
                    at(self.inner_radius, angle, h),
                ]
            })
            .collect()
    }
}

/// Checkerboard ground plane on `y = 0`.
///
/// `lines` is the side length in world units, split into cells of `step`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridOptions {
    pub lines: u32,
    pub step: f32,
    /// The two alternating cell colours.
    pub colors: [[f32; 3]; 2],
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            lines: 20,
            step: 0.5,
            colors: [[0.4, 0.4, 0.4], [0.8, 0.8, 0.8]],
        }
    }
}

/// Red, green and blue lines along X, Y and Z, plus grey guide lines on the
/// ground plane every `step` units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisOptions {
    /// Number of guide lines per side.
    pub lines: u32,
    /// Spacing between guide lines.
    pub step: f32,
    pub show_x: bool,
    pub show_y: bool,
    pub show_z: bool,
}

impl Default for AxisOptions {
    fn default() -> Self {
        Self {
            lines: 50,
            step: 0.5,
            show_x: true,
            show_y: true,
            show_z: true,
        }
    }
}

const GUIDE_COLOR: [f32; 3] = [0.4, 0.4, 0.4];

/// Solid box with per-face normals. Each face's UVs span its own size, so a
/// repeating texture keeps a constant texel density.
pub fn cuboid(options: CuboidOptions) -> Geometry {
    if options.is_degenerate() {
        return Geometry::empty(Topology::TriangleList);
    }
    let CuboidOptions {
        length,
        width,
        height,
    } = options;
    let (l, w, h) = (length / 2.0, width / 2.0, height / 2.0);

    // (origin, u edge, v edge, uv extent); u × v points out of the box.
    let faces = [
        ([-l, -h, w], [length, 0.0, 0.0], [0.0, height, 0.0], [length, height]),
        ([l, -h, -w], [-length, 0.0, 0.0], [0.0, height, 0.0], [length, height]),
        ([-l, -h, -w], [0.0, 0.0, width], [0.0, height, 0.0], [width, height]),
        ([l, -h, w], [0.0, 0.0, -width], [0.0, height, 0.0], [width, height]),
        ([-l, h, w], [length, 0.0, 0.0], [0.0, 0.0, -width], [length, width]),
        ([-l, -h, -w], [length, 0.0, 0.0], [0.0, 0.0, width], [length, width]),
    ];
    const QUAD: [(f32, f32); 6] = [
        (0.0, 0.0),
        (1.0, 0.0),
        (0.0, 1.0),
        (1.0, 0.0),
        (1.0, 1.0),
        (0.0, 1.0),
    ];

    let mut positions = Vec::with_capacity(36);
    let mut normals = Vec::with_capacity(36);
    let mut uvs = Vec::with_capacity(36);
    for (origin, u, v, extent) in faces {
        let (origin, u, v) = (Vector3::from(origin), Vector3::from(u), Vector3::from(v));
        let normal = u.cross(v).normalize().to_array();
        for (s, t) in QUAD {
            positions.push((origin + u * s + v * t).to_array());
            normals.push(normal);
            uvs.push([s * extent[0], t * extent[1]]);
        }
    }

    Geometry::new(Topology::TriangleList, positions)
        .with_normals(normals)
        .with_uvs(uvs)
}

/// The twelve edges of a box.
pub fn cuboid_wireframe(options: CuboidOptions) -> Geometry {
    if options.is_degenerate() {
        return Geometry::empty(Topology::LineList);
    }
    let (l, w, h) = (options.length / 2.0, options.width / 2.0, options.height / 2.0);
    let top = [[-l, h, w], [l, h, w], [l, h, -w], [-l, h, -w]];
    let bottom = [[-l, -h, w], [l, -h, w], [l, -h, -w], [-l, -h, -w]];

    let mut positions = Vec::with_capacity(24);
    for i in 0..4 {
        let next = (i + 1) % 4;
        positions.extend([top[i], top[next], bottom[i], bottom[next], top[i], bottom[i]]);
    }
    Geometry::new(Topology::LineList, positions)
}

/// Solid UV sphere centred on the origin, with smooth normals and
/// equirectangular UVs.
///
/// # Example
///
/// ```
/// use tessera::shapes::{self, SphereOptions};
///
/// let ball = shapes::sphere(SphereOptions { radius: 2.0, ..Default::default() });
/// assert_eq!(ball.local_bounds().max.y, 2.0);
/// ```
pub fn sphere(options: SphereOptions) -> Geometry {
    if options.is_degenerate() {
        return Geometry::empty(Topology::TriangleList);
    }
    let pts = options.grid();
    let (u, v) = (options.u as usize, options.v as usize);
    let uv = |i: usize, j: usize| [j as f32 / (v - 1) as f32, i as f32 / (u - 1) as f32];

    let quads = (u - 1) * (v - 1) * 6;
    let mut positions = Vec::with_capacity(quads);
    let mut normals = Vec::with_capacity(quads);
    let mut uvs = Vec::with_capacity(quads);
    for i in 0..u - 1 {
        for j in 0..v - 1 {
            let corners = [(i, j), (i + 1, j), (i, j + 1), (i, j + 1), (i + 1, j), (i + 1, j + 1)];
            for (a, b) in corners {
                let p = pts[a][b];
                positions.push(p.to_array());
                normals.push(p.normalize().to_array());
                uvs.push(uv(a, b));
            }
        }
    }

    Geometry::new(Topology::TriangleList, positions)
        .with_normals(normals)
        .with_uvs(uvs)
}

/// Meridians and parallels of a sphere.
pub fn sphere_wireframe(options: SphereOptions) -> Geometry {
    if options.is_degenerate() {
        return Geometry::empty(Topology::LineList);
    }
    let pts = options.grid();
    let (u, v) = (options.u as usize, options.v as usize);

    let mut positions = Vec::with_capacity((u - 1) * (v - 1) * 4);
    for i in 0..u - 1 {
        for j in 0..v - 1 {
            let p0 = pts[i][j].to_array();
            positions.extend([p0, pts[i + 1][j].to_array(), p0, pts[i][j + 1].to_array()]);
        }
    }
    Geometry::new(Topology::LineList, positions)
}

/// Solid torus lying in the XZ plane, with smooth normals.
/// `minor_radius >= major_radius` gives nothing.
pub fn torus(options: TorusOptions) -> Geometry {
    if options.is_degenerate() {
        return Geometry::empty(Topology::TriangleList);
    }
    let pts = options.grid();
    let (u, v) = (options.u as usize, options.v as usize);

    let quads = (u - 1) * (v - 1) * 6;
    let mut positions = Vec::with_capacity(quads);
    let mut normals = Vec::with_capacity(quads);
    let mut uvs = Vec::with_capacity(quads);
    for i in 0..u - 1 {
        for j in 0..v - 1 {
            let corners = [(i, j), (i, j + 1), (i + 1, j), (i + 1, j), (i, j + 1), (i + 1, j + 1)];
            for (a, b) in corners {
                let (p, n) = pts[a][b];
                positions.push(p.to_array());
                normals.push(n.to_array());
                uvs.push([a as f32 / (u - 1) as f32, b as f32 / (v - 1) as f32]);
            }
        }
    }

    Geometry::new(Topology::TriangleList, positions)
        .with_normals(normals)
        .with_uvs(uvs)
}

/// The `u × v` quad grid of a torus as line segments.
pub fn torus_wireframe(options: TorusOptions) -> Geometry {
    if options.is_degenerate() {
        return Geometry::empty(Topology::LineList);
    }
    let pts = options.grid();
    let (u, v) = (options.u as usize, options.v as usize);

    let mut positions = Vec::with_capacity((u - 1) * (v - 1) * 4);
    for i in 0..u - 1 {
        for j in 0..v - 1 {
            let p0 = pts[i][j].0.to_array();
            positions.extend([p0, pts[i][j + 1].0.to_array(), p0, pts[i + 1][j].0.to_array()]);
        }
    }
    Geometry::new(Topology::LineList, positions)
}

/// Tube with flat caps. Inner wall normals point toward the axis.
pub fn cylinder(options: CylinderOptions) -> Geometry {
    if options.is_degenerate() {
        return Geometry::empty(Topology::TriangleList);
    }
    let rings = options.rings();
    let radial = |p: Vector3| Vector3::new(p.x, 0.0, p.z).normalize().to_array();

    let mut positions = Vec::with_capacity(rings.len() * 24);
    let mut normals = Vec::with_capacity(rings.len() * 24);
    for pair in rings.windows(2) {
        let [p0, p1, p2, p3] = pair[0];
        let [p4, p5, p6, p7] = pair[1];

        positions.extend([p0, p4, p7, p7, p3, p0].map(Vector3::to_array));
        normals.extend([[0.0, 1.0, 0.0]; 6]);

        positions.extend([p1, p2, p6, p6, p5, p1].map(Vector3::to_array));
        normals.extend([[0.0, -1.0, 0.0]; 6]);

        for p in [p0, p1, p5, p5, p4, p0] {
            positions.push(p.to_array());
            normals.push(radial(p));
        }
        for p in [p2, p3, p7, p7, p6, p2] {
            positions.push(p.to_array());
            normals.push(radial(-p));
        }
    }

    Geometry::new(Topology::TriangleList, positions).with_normals(normals)
}

/// Rim circles plus one radial spoke and one vertical edge per segment.
pub fn cylinder_wireframe(options: CylinderOptions) -> Geometry {
    if options.is_degenerate() {
        return Geometry::empty(Topology::LineList);
    }
    let rings = options.rings();

    let mut positions = Vec::with_capacity(rings.len() * 16);
    for pair in rings.windows(2) {
        let [p0, p1, p2, p3] = pair[0];
        let [p4, p5, p6, p7] = pair[1];
        positions.extend(
            [p0, p3, p3, p7, p4, p0, p1, p2, p2, p6, p5, p1, p0, p1, p3, p2]
                .map(Vector3::to_array),
        );
    }
    Geometry::new(Topology::LineList, positions)
}

/// Checkerboard floor. Non-positive `step` or zero `lines` gives nothing.
pub fn grid(options: GridOptions) -> Geometry {
    if options.lines == 0 || !(options.step > 0.0) {
        return Geometry::empty(Topology::TriangleList);
    }
    let half = options.lines as f32 / 2.0;
    let step = options.step;
    let cells = (options.lines as f32 / step).round() as usize;

    let mut positions = Vec::with_capacity(cells * cells * 6);
    let mut colors = Vec::with_capacity(cells * cells * 6);
    for row in 0..cells {
        let x = -half + row as f32 * step;
        for col in 0..cells {
            let z = -half + col as f32 * step;
            let a = [x, 0.0, z];
            let b = [x + step, 0.0, z];
            let c = [x + step, 0.0, z + step];
            let d = [x, 0.0, z + step];
            positions.extend([b, a, d, d, c, b]);
            colors.extend([options.colors[(row + col) % 2]; 6]);
        }
    }

    Geometry::new(Topology::TriangleList, positions).with_colors(colors)
}

/// Coloured axis lines through the origin plus ground guides, for
/// orientation. Hidden axes are left out entirely.
pub fn axes(options: AxisOptions) -> Geometry {
    let half = options.lines as f32 / 2.0;
    let mut positions = Vec::new();
    let mut colors = Vec::new();

    let axes = [
        (options.show_x, [half, 0.0, 0.0], [1.0, 0.0, 0.0]),
        (options.show_y, [0.0, half, 0.0], [0.0, 1.0, 0.0]),
        (options.show_z, [0.0, 0.0, half], [0.0, 0.0, 1.0]),
    ];
    for (shown, [x, y, z], color) in axes {
        if shown {
            positions.extend([[x, y, z], [-x, -y, -z]]);
            colors.extend([color; 2]);
        }
    }

    if options.step > 0.0 {
        let count = (half / options.step).ceil() as usize;
        for k in 0..count {
            let i = k as f32 * options.step;
            positions.extend([
                [half, 0.0, -i],
                [-half, 0.0, -i],
                [half, 0.0, i],
                [-half, 0.0, i],
                [i, 0.0, half],
                [i, 0.0, -half],
                [-i, 0.0, half],
                [-i, 0.0, -half],
            ]);
            colors.extend([GUIDE_COLOR; 8]);
        }
    }

    Geometry::new(Topology::LineList, positions).with_colors(colors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_unit_normals(g: &Geometry) {
        for n in g.normals() {
            assert_abs_diff_eq!(Vector3::from(*n).length(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn cuboid_layout() {
        let g = cuboid(CuboidOptions {
            length: 2.0,
            width: 4.0,
            height: 6.0,
        });
        assert_eq!(g.topology(), Topology::TriangleList);
        assert_eq!(g.vertex_count(), 36);
        assert_eq!(g.normals().len(), 36);
        assert_eq!(g.uvs().len(), 36);
        assert_eq!(g.local_bounds().min, Vector3::new(-1.0, -3.0, -2.0));
        assert_eq!(g.local_bounds().max, Vector3::new(1.0, 3.0, 2.0));
        assert_unit_normals(&g);
    }

    #[test]
    fn cuboid_normals_point_outward() {
        let g = cuboid(CuboidOptions::default());
        for (p, n) in g.positions().iter().zip(g.normals()) {
            assert!(Vector3::from(*p).dot(Vector3::from(*n)) > 0.0);
        }
    }

    #[test]
    fn cuboid_uvs_span_face_size() {
        let g = cuboid(CuboidOptions {
            length: 3.0,
            width: 1.0,
            height: 2.0,
        });
        // The front face comes first.
        let max_u = g.uvs()[..6].iter().map(|uv| uv[0]).fold(0.0, f32::max);
        let max_v = g.uvs()[..6].iter().map(|uv| uv[1]).fold(0.0, f32::max);
        assert_eq!((max_u, max_v), (3.0, 2.0));
    }

    #[test]
    fn degenerate_inputs_produce_empty_geometry() {
        let flat = CuboidOptions {
            height: 0.0,
            ..Default::default()
        };
        assert!(cuboid(flat).is_empty());
        assert!(cuboid_wireframe(flat).is_empty());

        let coarse = SphereOptions {
            v: 2,
            ..Default::default()
        };
        assert!(sphere(coarse).is_empty());
        assert!(sphere_wireframe(coarse).is_empty());
        assert!(sphere(SphereOptions {
            radius: -1.0,
            ..Default::default()
        })
        .is_empty());

        let fat = TorusOptions {
            minor_radius: 2.0,
            ..Default::default()
        };
        assert!(torus(fat).is_empty());
        assert!(torus_wireframe(fat).is_empty());
        assert!(torus(TorusOptions {
            u: 3,
            ..Default::default()
        })
        .is_empty());

        let inverted = CylinderOptions {
            inner_radius: 2.0,
            ..Default::default()
        };
        assert!(cylinder(inverted).is_empty());
        assert!(cylinder_wireframe(inverted).is_empty());

        assert!(grid(GridOptions {
            step: 0.0,
            ..Default::default()
        })
        .is_empty());
    }

    #[test]
    fn empty_shapes_keep_their_topology() {
        let g = sphere_wireframe(SphereOptions {
            u: 0,
            ..Default::default()
        });
        assert_eq!(g.topology(), Topology::LineList);
        assert!(g.local_bounds().is_empty());
    }

    #[test]
    fn sphere_fits_its_radius() {
        let g = sphere(SphereOptions {
            radius: 2.0,
            u: 12,
            v: 9,
        });
        assert_eq!(g.vertex_count(), 11 * 8 * 6);
        for p in g.positions() {
            assert_abs_diff_eq!(Vector3::from(*p).length(), 2.0, epsilon = 1e-4);
        }
        assert_abs_diff_eq!(g.local_bounds().max.y, 2.0, epsilon = 1e-5);
        assert_unit_normals(&g);
    }

    #[test]
    fn torus_bounds() {
        let g = torus(TorusOptions::default());
        let b = g.local_bounds();
        assert_abs_diff_eq!(b.max.x, 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(b.max.y, 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(b.min.z, -2.0, epsilon = 1e-2);
        assert_unit_normals(&g);
    }

    #[test]
    fn cylinder_walls_and_caps() {
        let options = CylinderOptions {
            segments: 8,
            ..Default::default()
        };
        let g = cylinder(options);
        assert_eq!(g.vertex_count(), 7 * 24);
        assert_abs_diff_eq!(g.local_bounds().max.y, 1.5);
        assert_abs_diff_eq!(g.local_bounds().max.x, 1.5, epsilon = 1e-5);
        assert_unit_normals(&g);

        let w = cylinder_wireframe(options);
        assert_eq!(w.topology(), Topology::LineList);
        assert_eq!(w.vertex_count(), 7 * 16);
    }

    #[test]
    fn wireframes_are_even_line_lists() {
        for g in [
            cuboid_wireframe(CuboidOptions::default()),
            sphere_wireframe(SphereOptions::default()),
            torus_wireframe(TorusOptions::default()),
            cylinder_wireframe(CylinderOptions::default()),
            axes(AxisOptions::default()),
        ] {
            assert_eq!(g.topology(), Topology::LineList);
            assert_eq!(g.vertex_count() % 2, 0);
        }
        assert_eq!(cuboid_wireframe(CuboidOptions::default()).vertex_count(), 24);
    }

    #[test]
    fn grid_alternates_colors() {
        let g = grid(GridOptions {
            lines: 2,
            step: 1.0,
            ..Default::default()
        });
        assert_eq!(g.vertex_count(), 4 * 6);
        let [dark, light] = GridOptions::default().colors;
        assert_eq!(g.colors()[0], dark);
        assert_eq!(g.colors()[6], light);
        assert_eq!(g.colors()[12], light);
        assert_eq!(g.colors()[18], dark);
        assert_eq!(g.local_bounds().max, Vector3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn axes_respect_visibility_flags() {
        let only_x = axes(AxisOptions {
            show_y: false,
            show_z: false,
            step: 0.0,
            ..Default::default()
        });
        assert_eq!(only_x.vertex_count(), 2);
        assert_eq!(only_x.colors(), &[[1.0, 0.0, 0.0]; 2]);

        let all = axes(AxisOptions {
            lines: 4,
            step: 1.0,
            ..Default::default()
        });
        assert_eq!(all.vertex_count(), 6 + 2 * 8);
        assert_eq!(all.colors().len(), all.positions().len());
    }
}
