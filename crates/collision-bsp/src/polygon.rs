//! Convex polygon used while building the tree to remember how much of a
//! triangle remains inside a node's region after earlier splits.

use nalgebra::Point3;

use crate::{BspSide, PlaneEq, WorldTriangle};

/// A convex polygon in 3D space, defined by an ordered list of vertices.
///
/// Clipped polygons are always a subset of the triangle they were cut from,
/// so classifying the polygon instead of the full triangle gives a tighter
/// front/back/on answer deeper in the tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldPolygon {
    vertices: Vec<Point3<f32>>,
}

impl WorldPolygon {
    /// Creates a new polygon from a list of vertices.
    pub fn new(vertices: Vec<Point3<f32>>) -> Self {
        Self { vertices }
    }

    /// Returns the vertices of the polygon.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    /// Returns the number of vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if the polygon has no vertices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Classifies this polygon relative to a plane using the BSP tolerance band.
    pub fn classify(&self, plane: &PlaneEq) -> BspSide {
        BspSide::classify_points(plane, &self.vertices)
    }
}

impl From<WorldTriangle> for WorldPolygon {
    fn from(triangle: WorldTriangle) -> Self {
        Self {
            vertices: triangle.vertices().to_vec(),
        }
    }
}

impl From<&WorldTriangle> for WorldPolygon {
    fn from(triangle: &WorldTriangle) -> Self {
        Self {
            vertices: triangle.vertices().to_vec(),
        }
    }
}
