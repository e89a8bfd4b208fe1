//! BSP tree container and queries.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};

use crate::{BSP_TOLERANCE, BoundingBox, WorldTriangle};

use super::node::{BspNode, ChildSide, NodeHit};
use super::visitor::{CollisionVisitor, NullVisitor};

/// Key for a user data blob attached to a tree.
///
/// Small integers chosen by the caller; [`UserDataKey::DIGEST`] and
/// [`UserDataKey::TIMESTAMP`] are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserDataKey(pub u32);

impl UserDataKey {
    /// Digest of the source geometry the tree was built from.
    pub const DIGEST: Self = Self(1);
    /// Time the tree was built.
    pub const TIMESTAMP: Self = Self(2);
}

/// The nearest accepted hit of a segment query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit<'a> {
    /// Position of the hit along the segment, 0 at the start and 1 at the end.
    pub fraction: f32,
    /// The triangle that was hit.
    pub triangle: &'a WorldTriangle,
}

/// Pending work for the iterative segment query.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    /// `None` on the first visit; otherwise the side still to be searched
    /// after this node's own triangles.
    resume: Option<ChildSide>,
    start: f32,
    end: f32,
}

/// A static Binary Space Partitioning tree over world triangles.
///
/// All storage is flat: nodes (index 0 is the root), triangles, and the
/// shared index array that backs every node's shared triangle list. Each
/// triangle is stored once and owned by exactly one node; other nodes whose
/// region it touches reference it through the shared array.
///
/// Trees are produced by [`BspBuilder`](super::BspBuilder) or by
/// [`codec::load`](crate::codec::load) and are immutable afterwards, apart
/// from [`remap_flags`](Self::remap_flags), the cached bounding box and the
/// user data map. Queries take `&self`, so a tree can be shared between
/// threads freely.
#[derive(Debug, Clone)]
pub struct BspTree {
    pub(crate) nodes: Vec<BspNode>,
    pub(crate) triangles: Vec<WorldTriangle>,
    pub(crate) shared: Vec<u32>,
    pub(crate) bounding_box: BoundingBox,
    pub(crate) user_data: BTreeMap<UserDataKey, Vec<u8>>,
}

impl BspTree {
    pub(crate) fn from_parts(
        nodes: Vec<BspNode>,
        triangles: Vec<WorldTriangle>,
        shared: Vec<u32>,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            nodes,
            triangles,
            shared,
            bounding_box,
            user_data: BTreeMap::new(),
        }
    }

    /// Returns the number of nodes (at least one, the root).
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of stored triangles, including non-collidable ones.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Returns the total number of shared triangle references.
    #[inline]
    pub fn num_shared(&self) -> usize {
        self.shared.len()
    }

    /// Returns the node array; index 0 is the root.
    #[inline]
    pub fn nodes(&self) -> &[BspNode] {
        &self.nodes
    }

    /// Returns the root node.
    #[inline]
    pub fn root(&self) -> &BspNode {
        &self.nodes[0]
    }

    /// Returns the triangle array, grouped by owning node.
    #[inline]
    pub fn triangles(&self) -> &[WorldTriangle] {
        &self.triangles
    }

    /// Returns the shared index array; entries index [`triangles`](Self::triangles).
    #[inline]
    pub fn shared_indices(&self) -> &[u32] {
        &self.shared
    }

    /// Returns the cached bounding box.
    ///
    /// Empty (inside out) for a tree without triangles.
    #[inline]
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    /// Recomputes the bounding box from the triangle array.
    pub fn generate_bounding_box(&mut self) {
        let mut bounding_box = BoundingBox::inside_out();
        for triangle in &self.triangles {
            for vertex in triangle.vertices() {
                bounding_box.add_point(vertex);
            }
        }
        self.bounding_box = bounding_box;
    }

    /// Returns the maximum depth of the tree (1 for a single leaf).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 1usize)];
        while let Some((index, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let node = &self.nodes[index];
            stack.extend(node.front().map(|child| (child, depth + 1)));
            stack.extend(node.back().map(|child| (child, depth + 1)));
        }
        max_depth
    }

    /// Returns true if at least one triangle takes part in collision queries.
    pub fn can_collide(&self) -> bool {
        self.triangles.iter().any(WorldTriangle::is_collidable)
    }

    /// Bytes used by the node, triangle and shared arrays.
    pub fn used_memory(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.nodes.len() * std::mem::size_of::<BspNode>()
            + self.triangles.len() * std::mem::size_of::<WorldTriangle>()
            + self.shared.len() * std::mem::size_of::<u32>()
    }

    /// Rewrites every triangle's flags through `mapping`, indexed by the old
    /// flags modulo the table length. An empty table leaves flags unchanged.
    pub fn remap_flags(&mut self, mapping: &[u32]) {
        if mapping.is_empty() {
            return;
        }
        for triangle in &mut self.triangles {
            let index = triangle.flags() as usize % mapping.len();
            triangle.set_flags(mapping[index]);
        }
    }

    /// Returns the user data blob stored under `key`.
    pub fn user_data(&self, key: UserDataKey) -> Option<&[u8]> {
        self.user_data.get(&key).map(Vec::as_slice)
    }

    /// Stores a user data blob, replacing any previous blob under `key`.
    pub fn set_user_data(&mut self, key: UserDataKey, data: Vec<u8>) {
        self.user_data.insert(key, data);
    }

    /// Iterates user data entries in key order.
    pub fn user_data_entries(&self) -> impl Iterator<Item = (UserDataKey, &[u8])> {
        self.user_data.iter().map(|(key, data)| (*key, data.as_slice()))
    }

    /// Returns the first stored triangle that intersects `triangle`.
    ///
    /// When the hit order matters, pass the "leading" vertex as the first vertex:
    /// the side of each splitting plane holding it is searched first.
    pub fn intersects_triangle(&self, triangle: &WorldTriangle) -> Option<&WorldTriangle> {
        self.root()
            .intersects_triangle(self, triangle)
            .map(|index| &self.triangles[index])
    }

    /// Returns the nearest hit along the segment from `start` to `end`.
    pub fn ray_cast(&self, start: &Point3<f32>, end: &Point3<f32>) -> Option<SegmentHit<'_>> {
        self.intersects_segment(start, end, 1.0, &mut NullVisitor)
    }

    /// Tests the segment `start + t * (end - start)` for `t` in `[0, max_fraction]`.
    ///
    /// Every candidate hit is offered to `visitor` (see
    /// [`HitResponse`](super::HitResponse)); the returned hit is the one the
    /// query settled on. Returns `None` if nothing was accepted within the
    /// cutoff, and for zero-length segments.
    ///
    /// Nodes are visited with an explicit stack, so deep trees do not grow the
    /// call stack.
    pub fn intersects_segment<V: CollisionVisitor + ?Sized>(
        &self,
        start: &Point3<f32>,
        end: &Point3<f32>,
        max_fraction: f32,
        visitor: &mut V,
    ) -> Option<SegmentHit<'_>> {
        let delta = end - start;
        let length = delta.norm();
        if length <= 0.0 {
            return None;
        }
        let tolerance_pct = BSP_TOLERANCE / length;

        let mut dist = max_fraction;
        let mut hit = None;

        let mut stack: Vec<Frame> = Vec::with_capacity(32);
        stack.push(Frame {
            node: 0,
            resume: None,
            start: 0.0,
            end: 1.0,
        });

        while let Some(cur) = stack.pop() {
            let node = &self.nodes[cur.node];
            let plane = node.plane();
            let mut crossing = cur.start;
            let end_side;

            if node.is_leaf() {
                end_side = None;
            } else if let Some(side) = cur.resume {
                end_side = Some(side);
                crossing = crossing_fraction(node, start, &delta, cur.start);
            } else {
                let s_out = plane.distance_to(&(start + delta * (cur.start - tolerance_pct)));
                let e_out = plane.distance_to(&(start + delta * (cur.end + tolerance_pct)));
                let s_side = ChildSide::of_distance(s_out);
                let e_side = ChildSide::of_distance(e_out);
                let start_child = node.child(s_side);

                if s_side == e_side {
                    // Triangles within the tolerance band of the plane may have
                    // been filed on either side, so near-plane segments revisit
                    // this node for the opposite side.
                    if s_out.abs() < BSP_TOLERANCE || e_out.abs() < BSP_TOLERANCE {
                        stack.push(Frame {
                            resume: Some(s_side.opposite()),
                            ..cur
                        });
                    }
                    if let Some(child) = start_child {
                        stack.push(Frame {
                            node: child,
                            resume: None,
                            ..cur
                        });
                    }
                    continue;
                }

                crossing = crossing_fraction(node, start, &delta, cur.start);

                if let Some(child) = start_child {
                    stack.push(Frame {
                        resume: Some(e_side),
                        ..cur
                    });
                    stack.push(Frame {
                        node: child,
                        resume: None,
                        start: cur.start,
                        end: crossing,
                    });
                    continue;
                }

                // Nothing on the start side: check this node's triangles now
                // and continue with the end side from the crossing point.
                end_side = Some(e_side);
            }

            match node.intersects_segment_here(self, start, end, &mut dist, &mut hit, visitor) {
                NodeHit::Stop => return self.segment_hit(dist, hit),
                NodeHit::Hit if dist <= cur.end + tolerance_pct => return self.segment_hit(dist, hit),
                _ => {}
            }

            dist = max_fraction;
            hit = None;

            if let Some(child) = end_side.and_then(|side| node.child(side)) {
                stack.push(Frame {
                    node: child,
                    resume: None,
                    start: crossing,
                    end: cur.end,
                });
            }
        }

        None
    }

    fn segment_hit(&self, fraction: f32, hit: Option<usize>) -> Option<SegmentHit<'_>> {
        hit.map(|index| SegmentHit {
            fraction,
            triangle: &self.triangles[index],
        })
    }

    /// Returns true if the volume swept by `triangle` moving by `translation`
    /// touches a stored triangle the visitor accepts.
    pub fn intersects_swept<V: CollisionVisitor + ?Sized>(
        &self,
        triangle: &WorldTriangle,
        translation: &Vector3<f32>,
        visitor: &mut V,
    ) -> bool {
        self.root().intersects_swept(self, triangle, translation, visitor)
    }

    /// Checks the structural invariants: every node is reachable from the root
    /// exactly once, and every triangle and shared range lies inside its array.
    pub fn check_structure(&self) -> Result<(), String> {
        let num_nodes = self.nodes.len();
        if num_nodes == 0 {
            return Err("tree has no nodes".to_string());
        }

        let mut shared_total = 0usize;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.own_range().end > self.triangles.len() {
                return Err(format!(
                    "node {i} triangle range {:?} exceeds {} triangles",
                    node.own_range(),
                    self.triangles.len()
                ));
            }
            if node.shared_range().end > self.shared.len() {
                return Err(format!(
                    "node {i} shared range {:?} exceeds {} shared entries",
                    node.shared_range(),
                    self.shared.len()
                ));
            }
            for child in node.front().into_iter().chain(node.back()) {
                if child >= num_nodes {
                    return Err(format!("node {i} links to missing node {child}"));
                }
            }
            shared_total += node.num_shared as usize;
        }

        if shared_total != self.shared.len() {
            return Err(format!(
                "nodes reference {shared_total} shared entries but {} are stored",
                self.shared.len()
            ));
        }

        if let Some(bad) = self.shared.iter().find(|&&t| t as usize >= self.triangles.len()) {
            return Err(format!("shared entry references missing triangle {bad}"));
        }

        let mut seen = vec![false; num_nodes];
        let mut stack = vec![0usize];
        let mut reachable = 0usize;
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut seen[index], true) {
                return Err(format!("node {index} is linked more than once"));
            }
            reachable += 1;
            let node = &self.nodes[index];
            stack.extend(node.front());
            stack.extend(node.back());
        }
        if reachable != num_nodes {
            return Err(format!(
                "{reachable} of {num_nodes} nodes are reachable from the root"
            ));
        }

        Ok(())
    }

    /// Checks that every non-leaf node's plane is the plane of one of the
    /// triangles it references. Only meaningful once
    /// [`check_structure`](Self::check_structure) has passed.
    pub fn check_split_planes(&self) -> Result<(), String> {
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }
            let found_split_plane = node
                .candidates(self)
                .filter_map(|t| self.triangles.get(t).and_then(WorldTriangle::plane))
                .any(|plane| plane.almost_equal(node.plane()));
            if !found_split_plane {
                return Err(format!("node {i} is split by a plane none of its triangles lie on"));
            }
        }
        Ok(())
    }

    /// Debug self-check of the tree invariants: [`check_structure`](Self::check_structure)
    /// and [`check_split_planes`](Self::check_split_planes). Panics on
    /// violation; compiled out of release builds.
    pub fn validate(&self) {
        #[cfg(debug_assertions)]
        {
            if let Err(message) = self.check_structure().and_then(|()| self.check_split_planes()) {
                panic!("invalid bsp tree: {message}");
            }
        }
    }
}

/// Fraction along the whole segment at which it crosses the node's plane.
/// Falls back to `fallback` when the segment is parallel to the plane.
fn crossing_fraction(node: &BspNode, start: &Point3<f32>, delta: &Vector3<f32>, fallback: f32) -> f32 {
    let plane = node.plane();
    let t = plane.intersect_ray_half(start, plane.normal().dot(delta));
    if t.is_finite() { t } else { fallback }
}
