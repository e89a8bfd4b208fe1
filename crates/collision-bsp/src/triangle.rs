//! World triangle representation and the intersection primitives used by BSP queries.

use nalgebra::{Point3, Vector3};

use crate::{BspSide, PlaneEq};

/// Flags value marking a triangle that is stored in the tree but ignored by all queries.
pub const TRIANGLE_NOT_IN_BSP: u32 = 0xFF;

/// Axes shorter than this (built from unit edge directions) are treated as
/// parallel edges and skipped by the separating axis test.
const MIN_AXIS_LENGTH: f32 = 1e-5;

/// A triangle in world space together with an opaque flags word.
///
/// The layout is fixed (`repr(C)`, 40 bytes) because its size is written into
/// every saved tree and checked on load.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct WorldTriangle {
    vertices: [Point3<f32>; 3],
    flags: u32,
}

impl WorldTriangle {
    /// Creates a new triangle from three points and a flags word.
    ///
    /// The winding order determines the normal direction via the right-hand rule:
    /// normal = (v1 - v0) × (v2 - v0)
    pub fn new(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>, flags: u32) -> Self {
        Self {
            vertices: [v0, v1, v2],
            flags,
        }
    }

    /// Returns the three vertices of the triangle.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f32>; 3] {
        &self.vertices
    }

    #[inline]
    pub fn v0(&self) -> &Point3<f32> {
        &self.vertices[0]
    }

    #[inline]
    pub fn v1(&self) -> &Point3<f32> {
        &self.vertices[1]
    }

    #[inline]
    pub fn v2(&self) -> &Point3<f32> {
        &self.vertices[2]
    }

    /// Returns the opaque flags word.
    #[inline]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    #[inline]
    pub fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }

    /// Returns `false` for triangles flagged [`TRIANGLE_NOT_IN_BSP`].
    #[inline]
    pub fn is_collidable(&self) -> bool {
        self.flags != TRIANGLE_NOT_IN_BSP
    }

    /// Computes the (unnormalized) normal vector of the triangle.
    pub fn normal(&self) -> Vector3<f32> {
        let [a, b, c] = &self.vertices;
        (b - a).cross(&(c - a))
    }

    /// Returns the plane that this triangle lies on, or `None` if it has no area.
    pub fn plane(&self) -> Option<PlaneEq> {
        let [a, b, c] = &self.vertices;
        PlaneEq::from_points(a, b, c)
    }

    /// Returns true if the vertices are collinear (or nearly so).
    pub fn is_degenerate(&self) -> bool {
        self.plane().is_none()
    }

    /// Classifies this triangle relative to a plane using the BSP tolerance band.
    pub fn classify(&self, plane: &PlaneEq) -> BspSide {
        BspSide::classify_points(plane, &self.vertices)
    }

    /// Tests the segment `start + t * dir`, `0 <= t < *fraction`, against this
    /// triangle from either side.
    ///
    /// On a hit `fraction` is lowered to the hit parameter and `true` is returned.
    /// Misses leave `fraction` untouched.
    pub fn intersects_segment(
        &self,
        start: &Point3<f32>,
        dir: &Vector3<f32>,
        fraction: &mut f32,
    ) -> bool {
        let [v0, v1, v2] = &self.vertices;
        let e1 = v1 - v0;
        let e2 = v2 - v0;

        let p = dir.cross(&e2);
        let det = e1.dot(&p);

        // Segment is parallel to the triangle plane
        let scale = e1.norm() * e2.norm() * dir.norm();
        if det.abs() <= scale * 1e-7 {
            return false;
        }

        let inv_det = 1.0 / det;
        let s = start - v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return false;
        }

        let q = s.cross(&e1);
        let v = dir.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return false;
        }

        let t = e2.dot(&q) * inv_det;
        if t < 0.0 || t >= *fraction {
            return false;
        }

        *fraction = t;
        true
    }

    /// Returns true if this triangle and `other` touch or overlap.
    pub fn intersects_triangle(&self, other: &WorldTriangle) -> bool {
        self.intersects_swept(other, &Vector3::zeros())
    }

    /// Returns true if this triangle touches the volume swept by `other` while it
    /// moves by `translation`.
    ///
    /// The swept volume is the prism spanned by both positions of `other`; both
    /// shapes are convex, so a separating axis test over their face normals and
    /// edge cross products is exact.
    pub fn intersects_swept(&self, other: &WorldTriangle, translation: &Vector3<f32>) -> bool {
        let mut swept = [Point3::origin(); 6];
        for (i, v) in other.vertices.iter().enumerate() {
            swept[i] = *v;
            swept[i + 3] = v + translation;
        }
        let moving = translation.norm_squared() > 0.0;
        let swept = if moving { &swept[..] } else { &swept[..3] };

        let own_edges = unit_edges(&self.vertices);
        let other_edges = unit_edges(&other.vertices);
        let travel = translation.try_normalize(f32::EPSILON);

        let own_normal = self.normal().try_normalize(f32::EPSILON);
        let other_normal = other.normal().try_normalize(f32::EPSILON);

        let mut axes: Vec<Vector3<f32>> = Vec::with_capacity(32);
        axes.extend(own_normal);
        axes.extend(other_normal);

        let mut other_dirs: Vec<Vector3<f32>> = other_edges.iter().flatten().copied().collect();
        other_dirs.extend(travel);

        for own in own_edges.iter().flatten() {
            for dir in &other_dirs {
                axes.push(own.cross(dir));
            }
            if let Some(n) = own_normal {
                axes.push(n.cross(own));
            }
        }
        for dir in &other_dirs {
            if let Some(n) = other_normal {
                axes.push(n.cross(dir));
            }
            if let Some(t) = travel {
                axes.push(dir.cross(&t));
            }
        }

        !axes
            .iter()
            .filter(|axis| axis.norm() > MIN_AXIS_LENGTH)
            .any(|axis| separated_on_axis(axis, &self.vertices, swept))
    }
}

fn unit_edges(vertices: &[Point3<f32>; 3]) -> [Option<Vector3<f32>>; 3] {
    let [a, b, c] = vertices;
    [
        (b - a).try_normalize(f32::EPSILON),
        (c - b).try_normalize(f32::EPSILON),
        (a - c).try_normalize(f32::EPSILON),
    ]
}

fn project(axis: &Vector3<f32>, points: &[Point3<f32>]) -> (f32, f32) {
    points.iter().fold((f32::MAX, f32::MIN), |(min, max), p| {
        let d = axis.dot(&p.coords);
        (min.min(d), max.max(d))
    })
}

fn separated_on_axis(axis: &Vector3<f32>, a: &[Point3<f32>], b: &[Point3<f32>]) -> bool {
    let (min_a, max_a) = project(axis, a);
    let (min_b, max_b) = project(axis, b);
    max_a < min_b || max_b < min_a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> WorldTriangle {
        WorldTriangle::new(
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(c[0], c[1], c[2]),
            0,
        )
    }

    #[test]
    fn layout_is_forty_bytes() {
        assert_eq!(std::mem::size_of::<WorldTriangle>(), 40);
    }

    #[test]
    fn segment_hits_axis_aligned_triangle() {
        let t = tri([0.0, 0.0, 0.0], [0.0, 0.0, 5.0], [0.0, 5.0, 0.0]);
        let start = Point3::new(-5.0, 0.0, 2.0);
        let dir = Point3::new(5.0, 2.0, 0.0) - start;
        let mut fraction = 1.0;
        assert!(t.intersects_segment(&start, &dir, &mut fraction));
        assert!((fraction - 0.5).abs() < 1e-6);
    }

    #[test]
    fn segment_hits_from_back_side() {
        let t = tri([0.0, 0.0, 0.0], [0.0, 0.0, 5.0], [0.0, 5.0, 0.0]);
        let start = Point3::new(5.0, 1.0, 1.0);
        let dir = Vector3::new(-10.0, 0.0, 0.0);
        let mut fraction = 1.0;
        assert!(t.intersects_segment(&start, &dir, &mut fraction));
        assert!((fraction - 0.5).abs() < 1e-6);
    }

    #[test]
    fn segment_only_refines_when_closer() {
        let t = tri([0.0, 0.0, 0.0], [0.0, 0.0, 5.0], [0.0, 5.0, 0.0]);
        let start = Point3::new(-5.0, 1.0, 1.0);
        let dir = Vector3::new(10.0, 0.0, 0.0);
        let mut fraction = 0.4;
        assert!(!t.intersects_segment(&start, &dir, &mut fraction));
        assert_eq!(fraction, 0.4);
    }

    #[test]
    fn segment_misses_outside_triangle() {
        let t = tri([0.0, 0.0, 0.0], [0.0, 0.0, 5.0], [0.0, 5.0, 0.0]);
        let start = Point3::new(-5.0, 4.0, 4.0);
        let dir = Vector3::new(10.0, 0.0, 0.0);
        let mut fraction = 1.0;
        assert!(!t.intersects_segment(&start, &dir, &mut fraction));
    }

    #[test]
    fn crossing_triangles_intersect() {
        let a = tri([0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 4.0, 0.0]);
        let b = tri([1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [3.0, -2.0, 0.0]);
        assert!(a.intersects_triangle(&b));
        assert!(b.intersects_triangle(&a));
    }

    #[test]
    fn parallel_triangles_do_not_intersect() {
        let a = tri([0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 4.0, 0.0]);
        let b = tri([0.0, 0.0, 1.0], [4.0, 0.0, 1.0], [0.0, 4.0, 1.0]);
        assert!(!a.intersects_triangle(&b));
    }

    #[test]
    fn coplanar_disjoint_triangles_do_not_intersect() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([3.0, 3.0, 0.0], [4.0, 3.0, 0.0], [3.0, 4.0, 0.0]);
        assert!(!a.intersects_triangle(&b));
    }

    #[test]
    fn swept_triangle_reaches_wall() {
        let wall = tri([5.0, -5.0, -5.0], [5.0, 5.0, -5.0], [5.0, 0.0, 5.0]);
        let mover = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        assert!(!wall.intersects_triangle(&mover));
        assert!(wall.intersects_swept(&mover, &Vector3::new(10.0, 0.0, 0.0)));
        assert!(!wall.intersects_swept(&mover, &Vector3::new(2.0, 0.0, 0.0)));
        assert!(!wall.intersects_swept(&mover, &Vector3::new(-10.0, 0.0, 0.0)));
    }

    #[test]
    fn degenerate_triangle_has_no_plane() {
        let t = tri([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]);
        assert!(t.is_degenerate());
        assert!(t.plane().is_none());
    }
}
