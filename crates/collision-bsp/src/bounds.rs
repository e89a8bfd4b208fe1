//! Axis-aligned bounding box.

use nalgebra::Point3;

/// An axis-aligned bounding box.
///
/// A freshly created box is "inside out" (min = +MAX, max = -MAX) so that
/// adding the first point makes it collapse onto that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Point3<f32>,
    max: Point3<f32>,
}

impl BoundingBox {
    /// Creates a box from explicit corners.
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Creates an empty, inside-out box.
    pub fn inside_out() -> Self {
        Self {
            min: Point3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Point3::new(-f32::MAX, -f32::MAX, -f32::MAX),
        }
    }

    #[inline]
    pub fn min(&self) -> &Point3<f32> {
        &self.min
    }

    #[inline]
    pub fn max(&self) -> &Point3<f32> {
        &self.max
    }

    /// Returns true if no point has been added (any axis has min > max).
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grows the box to include `point`.
    pub fn add_point(&mut self, point: &Point3<f32>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Returns true if `point` lies inside or on the box.
    pub fn contains(&self, point: &Point3<f32>) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::inside_out()
    }
}
