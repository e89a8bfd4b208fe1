//! BSP tree node implementation.

use std::ops::Range;

use nalgebra::{Point3, Vector3};

use crate::{BSP_TOLERANCE, PlaneEq, WorldTriangle};

use super::tree::BspTree;
use super::visitor::CollisionVisitor;

/// Which child of a node a query descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildSide {
    Front,
    Back,
}

impl ChildSide {
    /// Front for non-negative distances, back otherwise.
    #[inline]
    pub(crate) fn of_distance(dist: f32) -> Self {
        if dist < 0.0 {
            ChildSide::Back
        } else {
            ChildSide::Front
        }
    }

    #[inline]
    pub(crate) fn opposite(self) -> Self {
        match self {
            ChildSide::Front => ChildSide::Back,
            ChildSide::Back => ChildSide::Front,
        }
    }
}

/// Outcome of testing a segment against the triangles stored on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeHit {
    Miss,
    /// At least one hit was accepted; the caller checks it against its sub-interval.
    Hit,
    /// A visitor accepted a hit and asked to end the query.
    Stop,
}

/// A node in the BSP tree.
///
/// Nodes live in the tree's flat node array and refer to each other and to
/// triangles by index. Each node owns a contiguous range of the tree's
/// triangle array and may also reference triangles owned by other nodes
/// through a range of the tree's shared index array.
///
/// A node without children is a leaf; its plane is a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct BspNode {
    pub(crate) front: Option<u32>,
    pub(crate) back: Option<u32>,
    pub(crate) plane: PlaneEq,
    pub(crate) first_triangle: u32,
    pub(crate) num_triangles: u32,
    pub(crate) first_shared: u32,
    pub(crate) num_shared: u32,
}

impl BspNode {
    /// Packed on-disk size: two child offsets, the plane, and two
    /// (offset, count) pairs for own and shared triangles.
    pub const PACKED_SIZE: u32 = (std::mem::size_of::<i32>() * 2
        + std::mem::size_of::<PlaneEq>()
        + std::mem::size_of::<i32>() * 2
        + std::mem::size_of::<u32>() * 2) as u32;

    pub(crate) fn leaf() -> Self {
        Self {
            front: None,
            back: None,
            plane: PlaneEq::placeholder(),
            first_triangle: 0,
            num_triangles: 0,
            first_shared: 0,
            num_shared: 0,
        }
    }

    /// Returns a reference to the splitting plane.
    #[inline]
    pub fn plane(&self) -> &PlaneEq {
        &self.plane
    }

    /// Index of the front child in the tree's node array.
    #[inline]
    pub fn front(&self) -> Option<usize> {
        self.front.map(|i| i as usize)
    }

    /// Index of the back child in the tree's node array.
    #[inline]
    pub fn back(&self) -> Option<usize> {
        self.back.map(|i| i as usize)
    }

    #[inline]
    pub(crate) fn child(&self, side: ChildSide) -> Option<usize> {
        match side {
            ChildSide::Front => self.front(),
            ChildSide::Back => self.back(),
        }
    }

    /// Checks if this node has any children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.front.is_none() && self.back.is_none()
    }

    /// Range of this node's own triangles in the tree's triangle array.
    #[inline]
    pub fn own_range(&self) -> Range<usize> {
        let first = self.first_triangle as usize;
        first..first + self.num_triangles as usize
    }

    /// Range of this node's entries in the tree's shared index array.
    #[inline]
    pub fn shared_range(&self) -> Range<usize> {
        let first = self.first_shared as usize;
        first..first + self.num_shared as usize
    }

    /// Number of triangles this node tests: own plus shared.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        (self.num_triangles + self.num_shared) as usize
    }

    /// Indices (into the tree's triangle array) of every triangle this node
    /// references, own triangles first.
    pub fn candidates<'a>(&self, tree: &'a BspTree) -> impl Iterator<Item = usize> + use<'a> {
        let shared = &tree.shared[self.shared_range()];
        self.own_range()
            .chain(shared.iter().map(|&index| index as usize))
    }

    fn collidable<'a>(&self, tree: &'a BspTree) -> impl Iterator<Item = (usize, &'a WorldTriangle)> + use<'a> {
        self.candidates(tree)
            .map(move |index| (index, &tree.triangles[index]))
            .filter(|(_, candidate)| candidate.is_collidable())
    }

    /// Returns the first triangle on this node that intersects `triangle`.
    pub(crate) fn intersects_triangle_here(&self, tree: &BspTree, triangle: &WorldTriangle) -> Option<usize> {
        self.collidable(tree)
            .find(|(_, candidate)| candidate.intersects_triangle(triangle))
            .map(|(index, _)| index)
    }

    /// Tests the segment against the triangles on this node.
    ///
    /// Each hit closer than `*dist` is offered to the visitor; rejected hits
    /// restore `*dist`, accepted ones keep it and update `hit`.
    pub(crate) fn intersects_segment_here<V: CollisionVisitor + ?Sized>(
        &self,
        tree: &BspTree,
        start: &Point3<f32>,
        end: &Point3<f32>,
        dist: &mut f32,
        hit: &mut Option<usize>,
        visitor: &mut V,
    ) -> NodeHit {
        let direction = end - start;
        let mut result = NodeHit::Miss;

        for (index, candidate) in self.collidable(tree) {
            let previous = *dist;
            if !candidate.intersects_segment(start, &direction, dist) {
                continue;
            }

            let response = visitor.visit(candidate, *dist);
            if response.stops() {
                *hit = Some(index);
                return NodeHit::Stop;
            }
            if response.accepts() {
                *hit = Some(index);
                result = NodeHit::Hit;
            } else {
                *dist = previous;
            }
        }

        result
    }

    /// Tests the volume swept by `triangle` against the triangles on this node.
    /// Returns true once the visitor accepts a hit.
    pub(crate) fn intersects_swept_here<V: CollisionVisitor + ?Sized>(
        &self,
        tree: &BspTree,
        triangle: &WorldTriangle,
        translation: &Vector3<f32>,
        visitor: &mut V,
    ) -> bool {
        self.collidable(tree).any(|(_, candidate)| {
            candidate.intersects_swept(triangle, translation) && visitor.visit(candidate, 0.0).accepts()
        })
    }

    /// Recursively tests `triangle` against this node and its subtrees.
    ///
    /// The side holding the triangle's first vertex is searched first; any side
    /// the triangle's distance range reaches is searched eventually.
    pub(crate) fn intersects_triangle(&self, tree: &BspTree, triangle: &WorldTriangle) -> Option<usize> {
        if self.is_leaf() {
            return self.intersects_triangle_here(tree, triangle);
        }

        let [d0, d1, d2] = triangle.vertices().map(|v| self.plane.distance_to(&v));
        let min = d0.min(d1).min(d2);
        let max = d0.max(d1).max(d2);

        let reaches_back = min < BSP_TOLERANCE;
        let reaches_front = max > -BSP_TOLERANCE;

        let order = if d0 < 0.0 {
            [ChildSide::Back, ChildSide::Front]
        } else {
            [ChildSide::Front, ChildSide::Back]
        };

        let search_child = |side: ChildSide| {
            let reaches = match side {
                ChildSide::Front => reaches_front,
                ChildSide::Back => reaches_back,
            };
            if !reaches {
                return None;
            }
            self.child(side)
                .and_then(|child| tree.nodes[child].intersects_triangle(tree, triangle))
        };

        search_child(order[0])
            .or_else(|| {
                if reaches_back && reaches_front {
                    self.intersects_triangle_here(tree, triangle)
                } else {
                    None
                }
            })
            .or_else(|| search_child(order[1]))
    }

    /// Recursively tests the volume swept by `triangle` against this node and its subtrees.
    pub(crate) fn intersects_swept<V: CollisionVisitor + ?Sized>(
        &self,
        tree: &BspTree,
        triangle: &WorldTriangle,
        translation: &Vector3<f32>,
        visitor: &mut V,
    ) -> bool {
        if self.is_leaf() {
            return self.intersects_swept_here(tree, triangle, translation, visitor);
        }

        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for v in triangle.vertices() {
            for dist in [self.plane.distance_to(v), self.plane.distance_to(&(v + translation))] {
                min = min.min(dist);
                max = max.max(dist);
            }
        }

        if min < BSP_TOLERANCE
            && max > -BSP_TOLERANCE
            && self.intersects_swept_here(tree, triangle, translation, visitor)
        {
            return true;
        }

        if min < BSP_TOLERANCE {
            if let Some(back) = self.back() {
                if tree.nodes[back].intersects_swept(tree, triangle, translation, visitor) {
                    return true;
                }
            }
        }

        if max > -BSP_TOLERANCE {
            if let Some(front) = self.front() {
                if tree.nodes[front].intersects_swept(tree, triangle, translation, visitor) {
                    return true;
                }
            }
        }

        false
    }
}
