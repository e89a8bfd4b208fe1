//! Polygon cutting/splitting operations for BSP construction.

use crate::{BSP_TOLERANCE, BspSide, PlaneEq, WorldPolygon, WorldTriangle};

/// Trait for geometry that can be cut by a plane.
pub trait Cuttable {
    /// Cuts the geometry by a plane.
    ///
    /// Returns `(front, back)`; a side is `None` when nothing of the geometry
    /// (beyond a degenerate sliver) lies on it.
    ///
    /// # Return values by classification
    ///
    /// - **Front**: `(Some(self), None)`
    /// - **Back**: `(None, Some(self))`
    /// - **On**: `(Some(self), None)` - treated as front
    /// - **Both**: `(Some(front_part), Some(back_part))`
    fn cut(&self, plane: &PlaneEq) -> (Option<WorldPolygon>, Option<WorldPolygon>);
}

impl Cuttable for WorldPolygon {
    fn cut(&self, plane: &PlaneEq) -> (Option<WorldPolygon>, Option<WorldPolygon>) {
        match self.classify(plane) {
            BspSide::Front | BspSide::On => (Some(self.clone()), None),
            BspSide::Back => (None, Some(self.clone())),
            BspSide::Both => split_polygon(self, plane),
        }
    }
}

impl Cuttable for WorldTriangle {
    fn cut(&self, plane: &PlaneEq) -> (Option<WorldPolygon>, Option<WorldPolygon>) {
        WorldPolygon::from(self).cut(plane)
    }
}

/// Splits a spanning polygon into front and back parts.
///
/// Walks the polygon edges and builds two vertex lists, adding the crossing
/// point whenever an edge goes from one side of the tolerance band to the other.
/// Vertices inside the band go to both lists.
fn split_polygon(polygon: &WorldPolygon, plane: &PlaneEq) -> (Option<WorldPolygon>, Option<WorldPolygon>) {
    let vertices = polygon.vertices();
    let n = vertices.len();

    let mut front_verts = Vec::with_capacity(n + 1);
    let mut back_verts = Vec::with_capacity(n + 1);

    let distances: Vec<f32> = vertices.iter().map(|v| plane.distance_to(v)).collect();

    for i in 0..n {
        let next = (i + 1) % n;
        let (current, d_current) = (vertices[i], distances[i]);
        let d_next = distances[next];

        if d_current > BSP_TOLERANCE {
            front_verts.push(current);
        } else if d_current < -BSP_TOLERANCE {
            back_verts.push(current);
        } else {
            front_verts.push(current);
            back_verts.push(current);
        }

        let crosses = (d_current > BSP_TOLERANCE && d_next < -BSP_TOLERANCE)
            || (d_current < -BSP_TOLERANCE && d_next > BSP_TOLERANCE);

        if crosses {
            let t = d_current / (d_current - d_next);
            let intersection = current + (vertices[next] - current) * t;
            front_verts.push(intersection);
            back_verts.push(intersection);
        }
    }

    let front = (front_verts.len() >= 3).then(|| WorldPolygon::new(front_verts));
    let back = (back_verts.len() >= 3).then(|| WorldPolygon::new(back_verts));

    (front, back)
}
