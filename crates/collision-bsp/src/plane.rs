//! Plane equation and side classification for BSP partitioning.

use nalgebra::{Point3, Vector3};

/// Distance from a splitting plane within which a point is treated as lying on it.
pub const BSP_TOLERANCE: f32 = 0.01;

/// Tolerance used when comparing two plane equations for equality.
const PLANE_EQ_EPSILON: f32 = 1e-4;

/// Where a triangle or polygon lies relative to a splitting plane.
///
/// The discriminants are bit sets: `Both` is `Front | Back`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BspSide {
    /// All vertices lie within the tolerance band.
    On = 0x0,
    /// At least one vertex is in front and none behind.
    Front = 0x1,
    /// At least one vertex is behind and none in front.
    Back = 0x2,
    /// Vertices on both sides of the tolerance band.
    Both = 0x3,
}

impl BspSide {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0x0 => BspSide::On,
            0x1 => BspSide::Front,
            0x2 => BspSide::Back,
            _ => BspSide::Both,
        }
    }

    /// Classifies a set of points against `plane` using [`BSP_TOLERANCE`].
    pub fn classify_points<'a, I>(plane: &PlaneEq, points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point3<f32>>,
    {
        let mut bits = 0u8;
        for point in points {
            let dist = plane.distance_to(point);
            if dist > BSP_TOLERANCE {
                bits |= BspSide::Front as u8;
            } else if dist < -BSP_TOLERANCE {
                bits |= BspSide::Back as u8;
            }
        }
        Self::from_bits(bits)
    }
}

/// A plane in 3D space, represented as `normal · point = d`.
///
/// The normal points towards the front half-space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct PlaneEq {
    normal: Vector3<f32>,
    d: f32,
}

impl PlaneEq {
    /// Creates a plane directly from a normal and offset without normalising.
    pub fn new(normal: Vector3<f32>, d: f32) -> Self {
        Self { normal, d }
    }

    /// Creates a plane from a point on the plane and a normal vector.
    ///
    /// Returns `None` if the normal has zero length.
    pub fn from_point_and_normal(point: &Point3<f32>, normal: &Vector3<f32>) -> Option<Self> {
        let norm = normal.norm();
        if norm <= f32::EPSILON {
            return None;
        }
        let unit_normal = normal / norm;
        Some(Self {
            normal: unit_normal,
            d: unit_normal.dot(&point.coords),
        })
    }

    /// Creates a plane from three points.
    /// The normal direction follows the right-hand rule: (b - a) × (c - a).
    ///
    /// Returns `None` if the points are collinear.
    pub fn from_points(a: &Point3<f32>, b: &Point3<f32>, c: &Point3<f32>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        Self::from_point_and_normal(a, &normal)
    }

    /// The plane stored in leaves: through the origin, facing +X.
    pub fn placeholder() -> Self {
        Self {
            normal: Vector3::x(),
            d: 0.0,
        }
    }

    /// Returns the unit normal vector of the plane.
    #[inline]
    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    /// Returns the signed distance from the origin to the plane along the normal.
    #[inline]
    pub fn d(&self) -> f32 {
        self.d
    }

    /// Computes the signed distance from a point to the plane.
    /// Positive values are in front.
    #[inline]
    pub fn distance_to(&self, point: &Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) - self.d
    }

    /// Returns the parameter `t` at which `start + t * dir` meets the plane,
    /// where `normal_dot_dir` is `normal · dir`.
    ///
    /// The result is not finite when the direction is parallel to the plane.
    #[inline]
    pub fn intersect_ray_half(&self, start: &Point3<f32>, normal_dot_dir: f32) -> f32 {
        (self.d - self.normal.dot(&start.coords)) / normal_dot_dir
    }

    /// Compares two planes component-wise within a small tolerance.
    pub fn almost_equal(&self, other: &PlaneEq) -> bool {
        (self.d - other.d).abs() <= PLANE_EQ_EPSILON
            && (self.normal - other.normal).amax() <= PLANE_EQ_EPSILON
    }
}

impl Default for PlaneEq {
    fn default() -> Self {
        Self::placeholder()
    }
}
