//! Plane selection strategies for BSP tree construction.
//!
//! The choice of splitting plane decides how many triangles end up shared
//! between both children of a node. Different strategies trade build time
//! against tree quality.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{BspSide, PlaneEq, WorldPolygon, WorldTriangle};

/// The triangles of one construction node.
///
/// Each triangle may carry the convex polygon left of it after earlier
/// splits; classification uses that polygon when present.
#[derive(Debug, Clone, Copy)]
pub struct NodeTriangles<'a> {
    triangles: &'a [WorldTriangle],
    indices: &'a [u32],
    polygons: &'a [Option<WorldPolygon>],
}

impl<'a> NodeTriangles<'a> {
    pub(crate) fn new(
        triangles: &'a [WorldTriangle],
        indices: &'a [u32],
        polygons: &'a [Option<WorldPolygon>],
    ) -> Self {
        debug_assert_eq!(indices.len(), polygons.len());
        Self {
            triangles,
            indices,
            polygons,
        }
    }

    /// Returns the number of triangles in the node.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns true if the node holds no triangles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns the `i`th triangle of the node.
    #[inline]
    pub fn triangle(&self, i: usize) -> &'a WorldTriangle {
        &self.triangles[self.indices[i] as usize]
    }

    /// Classifies the `i`th triangle against `plane`, using its clipped
    /// polygon if it has one.
    pub fn classify(&self, i: usize, plane: &PlaneEq) -> BspSide {
        match &self.polygons[i] {
            Some(polygon) => polygon.classify(plane),
            None => self.triangle(i).classify(plane),
        }
    }

    /// Returns the plane of the first triangle that has one.
    pub fn first_plane(&self) -> Option<PlaneEq> {
        (0..self.len()).find_map(|i| self.triangle(i).plane())
    }
}

/// Strategy for choosing the splitting plane of a construction node.
///
/// The returned plane must be the plane of one of the node's triangles.
/// Returning `None` turns the node into a leaf.
pub trait PlaneSelector {
    fn select(&mut self, node: &NodeTriangles<'_>) -> Option<PlaneEq>;
}

/// Uses the plane of the first non-degenerate triangle.
///
/// Fast, but the tree shape depends entirely on input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstTriangle;

impl PlaneSelector for FirstTriangle {
    fn select(&mut self, node: &NodeTriangles<'_>) -> Option<PlaneEq> {
        node.first_plane()
    }
}

/// Tries the planes of a sample of triangles and keeps the one that splits
/// the fewest triangles.
///
/// Nodes with fewer triangles than the sample size try every triangle in
/// order; larger nodes draw the candidates at random, possibly repeating
/// one. Earlier candidates win ties. Degenerate candidates are skipped.
#[derive(Debug, Clone)]
pub struct RandomSample {
    rng: StdRng,
    max_candidates: usize,
}

impl RandomSample {
    /// Creates a selector trying up to `max_candidates` planes per node.
    ///
    /// A fixed `seed` makes builds reproducible; `None` seeds from entropy.
    pub fn new(max_candidates: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            max_candidates: max_candidates.max(1),
        }
    }

    /// Counts the triangles split by `plane`, giving up once `limit` is reached.
    fn count_split(node: &NodeTriangles<'_>, plane: &PlaneEq, limit: usize) -> usize {
        let mut both = 0;
        for i in 0..node.len() {
            if both >= limit {
                break;
            }
            if node.classify(i, plane) == BspSide::Both {
                both += 1;
            }
        }
        both
    }
}

impl PlaneSelector for RandomSample {
    fn select(&mut self, node: &NodeTriangles<'_>) -> Option<PlaneEq> {
        let count = node.len();
        let mut best: Option<PlaneEq> = None;
        let mut best_both = count;

        for i in 0..self.max_candidates.min(count) {
            let index = if count < self.max_candidates {
                i
            } else {
                self.rng.gen_range(0..count)
            };

            let Some(candidate) = node.triangle(index).plane() else {
                continue;
            };

            let both = Self::count_split(node, &candidate, best_both);
            if both < best_both {
                best_both = both;
                best = Some(candidate);
            }
        }

        best.or_else(|| node.first_plane())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn make_triangle(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> WorldTriangle {
        WorldTriangle::new(
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(c[0], c[1], c[2]),
            0,
        )
    }

    fn all(triangles: &[WorldTriangle]) -> (Vec<u32>, Vec<Option<WorldPolygon>>) {
        ((0..triangles.len() as u32).collect(), vec![None; triangles.len()])
    }

    #[test]
    fn empty_node_has_no_plane() {
        let triangles: Vec<WorldTriangle> = vec![];
        let (indices, polygons) = all(&triangles);
        let node = NodeTriangles::new(&triangles, &indices, &polygons);
        assert!(FirstTriangle.select(&node).is_none());
        assert!(RandomSample::new(15, Some(1)).select(&node).is_none());
    }

    #[test]
    fn first_triangle_skips_degenerate() {
        let triangles = vec![
            make_triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]),
            make_triangle([0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]),
        ];
        let (indices, polygons) = all(&triangles);
        let node = NodeTriangles::new(&triangles, &indices, &polygons);
        let plane = FirstTriangle.select(&node).unwrap();
        assert!(plane.almost_equal(&triangles[1].plane().unwrap()));
    }

    #[test]
    fn random_sample_prefers_fewest_splits() {
        // A floor at z = 0 with a wall crossing it; the floor's plane splits
        // the wall while the wall's plane splits nothing.
        let triangles = vec![
            make_triangle([-5.0, -5.0, 0.0], [5.0, -5.0, 0.0], [5.0, 5.0, 0.0]),
            make_triangle([10.0, -1.0, -1.0], [10.0, 1.0, -1.0], [10.0, 0.0, 1.0]),
            make_triangle([12.0, -1.0, -1.0], [12.0, 1.0, -1.0], [12.0, 0.0, 1.0]),
        ];
        let (indices, polygons) = all(&triangles);
        let node = NodeTriangles::new(&triangles, &indices, &polygons);
        let plane = RandomSample::new(15, Some(7)).select(&node).unwrap();
        assert!(plane.almost_equal(&triangles[1].plane().unwrap()));
    }

    #[test]
    fn ties_keep_earliest_candidate() {
        let triangles = vec![
            make_triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            make_triangle([0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]),
        ];
        let (indices, polygons) = all(&triangles);
        let node = NodeTriangles::new(&triangles, &indices, &polygons);
        let plane = RandomSample::new(15, None).select(&node).unwrap();
        assert!(plane.almost_equal(&triangles[0].plane().unwrap()));
    }

    #[test]
    fn clipped_polygon_overrides_triangle() {
        let triangles = vec![make_triangle([0.0, -1.0, -1.0], [0.0, 1.0, -1.0], [0.0, 0.0, 1.0])];
        let indices = vec![0];
        // Only the part above z = 0.5 is left in this node
        let polygons = vec![Some(WorldPolygon::new(vec![
            Point3::new(0.0, -0.25, 0.5),
            Point3::new(0.0, 0.25, 0.5),
            Point3::new(0.0, 0.0, 1.0),
        ]))];
        let node = NodeTriangles::new(&triangles, &indices, &polygons);
        let plane = PlaneEq::new(nalgebra::Vector3::z(), 0.0);
        assert_eq!(node.triangle(0).classify(&plane), BspSide::Both);
        assert_eq!(node.classify(0, &plane), BspSide::Front);
    }

    #[test]
    fn seeded_selection_is_reproducible() {
        let triangles: Vec<WorldTriangle> = (0..40)
            .map(|i| {
                let x = i as f32 * 0.37;
                make_triangle([x, 0.0, 0.0], [x + 0.1, 1.0, (i % 3) as f32], [x, 0.0, 1.0])
            })
            .collect();
        let (indices, polygons) = all(&triangles);
        let node = NodeTriangles::new(&triangles, &indices, &polygons);
        let a = RandomSample::new(15, Some(99)).select(&node).unwrap();
        let b = RandomSample::new(15, Some(99)).select(&node).unwrap();
        assert_eq!(a, b);
    }
}
