//! BSP tree construction and export into the flat runtime layout.

use log::debug;

use crate::{BoundingBox, BspSide, Cuttable, PlaneEq, WorldPolygon, WorldTriangle};

use super::node::BspNode;
use super::selector::{NodeTriangles, PlaneSelector, RandomSample};
use super::tree::BspTree;

/// Seed used by [`BuildConfig::default`], so default builds are reproducible.
pub const DEFAULT_SEED: u64 = 0x5053_4200;

/// Tunables for [`BspBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BuildConfig {
    /// Nodes holding at most this many triangles are not split further.
    pub max_triangles_per_node: usize,
    /// Number of candidate planes tried per node.
    pub max_candidates: usize,
    /// Seed for candidate sampling; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_triangles_per_node: 10,
            max_candidates: 15,
            seed: Some(DEFAULT_SEED),
        }
    }
}

/// A node of the tree under construction.
///
/// Children are indices into the builder's node list, which grows while
/// nodes are processed breadth first. Triangles are indices into the input
/// triangle slice; `polygons` runs parallel to `triangles` until the node is
/// partitioned and is empty afterwards.
#[derive(Debug, Clone)]
pub(crate) struct ConstructionNode {
    pub(crate) front: Option<usize>,
    pub(crate) back: Option<usize>,
    pub(crate) plane: PlaneEq,
    pub(crate) triangles: Vec<u32>,
    pub(crate) polygons: Vec<Option<WorldPolygon>>,
    pub(crate) partitioned: bool,
}

impl ConstructionNode {
    fn new() -> Self {
        Self {
            front: None,
            back: None,
            plane: PlaneEq::placeholder(),
            triangles: Vec::new(),
            polygons: Vec::new(),
            partitioned: false,
        }
    }

    /// A node whose shape is already known, as read from an older file format.
    pub(crate) fn prebuilt(front: Option<usize>, back: Option<usize>, plane: PlaneEq, triangles: Vec<u32>) -> Self {
        Self {
            front,
            back,
            plane,
            triangles,
            polygons: Vec::new(),
            partitioned: front.is_some() || back.is_some(),
        }
    }

    fn push(&mut self, triangle: u32, polygon: Option<WorldPolygon>) {
        self.triangles.push(triangle);
        self.polygons.push(polygon);
    }

    fn make_leaf(&mut self) {
        self.plane = PlaneEq::placeholder();
        self.partitioned = false;
        self.polygons.clear();
    }
}

/// Builds [`BspTree`]s from triangle soups.
///
/// # Example
///
/// ```
/// use collision_bsp::{BspBuilder, WorldTriangle};
/// use nalgebra::Point3;
///
/// let triangle = WorldTriangle::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(0.0, 0.0, 5.0),
///     Point3::new(0.0, 5.0, 0.0),
///     0,
/// );
/// let tree = BspBuilder::new().build(&[triangle]);
///
/// let hit = tree
///     .ray_cast(&Point3::new(-5.0, 0.0, 2.0), &Point3::new(5.0, 2.0, 0.0))
///     .unwrap();
/// assert!((hit.fraction - 0.5).abs() < 1e-5);
/// ```
#[derive(Debug, Clone)]
pub struct BspBuilder<S = RandomSample> {
    config: BuildConfig,
    selector: S,
}

impl BspBuilder<RandomSample> {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BuildConfig::default())
    }

    /// Creates a builder sampling candidate planes as `config` describes.
    pub fn with_config(config: BuildConfig) -> Self {
        let selector = RandomSample::new(config.max_candidates, config.seed);
        Self { config, selector }
    }
}

impl Default for BspBuilder<RandomSample> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PlaneSelector + Clone> BspBuilder<S> {
    /// Creates a builder with a custom plane selector.
    ///
    /// `config.max_candidates` and `config.seed` are only read by
    /// [`RandomSample`]; other selectors ignore them.
    pub fn with_selector(config: BuildConfig, selector: S) -> Self {
        Self { config, selector }
    }

    /// Returns the configuration this builder was created with.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds a tree over `triangles`.
    ///
    /// Never fails: an empty slice gives a tree with a single empty leaf.
    /// Every build starts from the selector's initial state, so a seeded
    /// builder produces the same tree for the same input every time.
    pub fn build(&self, triangles: &[WorldTriangle]) -> BspTree {
        let nodes = self.construct(triangles);
        let tree = export(triangles, &nodes);
        tree.validate();
        tree
    }

    fn construct(&self, triangles: &[WorldTriangle]) -> Vec<ConstructionNode> {
        let mut selector = self.selector.clone();

        let mut root = ConstructionNode::new();
        root.triangles = (0..triangles.len() as u32).collect();
        root.polygons = vec![None; triangles.len()];

        let mut nodes = vec![root];
        let mut cur = 0;
        while cur < nodes.len() {
            let (front, back) = self.partition_node(&mut nodes[cur], triangles, &mut selector);

            if let Some(front) = front {
                nodes.push(front);
                nodes[cur].front = Some(nodes.len() - 1);
            }
            if let Some(back) = back {
                nodes.push(back);
                nodes[cur].back = Some(nodes.len() - 1);
            }

            cur += 1;
        }

        debug!("constructed {} bsp nodes over {} triangles", nodes.len(), triangles.len());

        #[cfg(debug_assertions)]
        validate_construction(triangles, &nodes);

        nodes
    }

    /// Splits `node` by a selected plane. Triangles on the plane stay on the
    /// node; the others move to the returned children, with triangles
    /// crossing the plane going to both, each side keeping its clipped part.
    fn partition_node(
        &self,
        node: &mut ConstructionNode,
        triangles: &[WorldTriangle],
        selector: &mut S,
    ) -> (Option<ConstructionNode>, Option<ConstructionNode>) {
        if node.triangles.len() <= self.config.max_triangles_per_node {
            node.make_leaf();
            return (None, None);
        }

        let view = NodeTriangles::new(triangles, &node.triangles, &node.polygons);
        let Some(plane) = selector.select(&view) else {
            node.make_leaf();
            return (None, None);
        };

        let mut front = ConstructionNode::new();
        let mut back = ConstructionNode::new();
        let mut on = Vec::new();

        let members = std::mem::take(&mut node.triangles);
        let polygons = std::mem::take(&mut node.polygons);

        for (index, polygon) in members.into_iter().zip(polygons) {
            let triangle = &triangles[index as usize];
            let side = match &polygon {
                Some(polygon) => polygon.classify(&plane),
                None => triangle.classify(&plane),
            };

            match side {
                BspSide::On => on.push(index),
                BspSide::Front => front.push(index, polygon),
                BspSide::Back => back.push(index, polygon),
                BspSide::Both => {
                    let (front_part, back_part) = match &polygon {
                        Some(polygon) => polygon.cut(&plane),
                        None => triangle.cut(&plane),
                    };
                    front.push(index, front_part);
                    back.push(index, back_part);
                }
            }
        }

        node.triangles = on;

        if front.triangles.is_empty() && back.triangles.is_empty() {
            node.make_leaf();
            return (None, None);
        }

        node.plane = plane;
        node.partitioned = true;

        let non_empty = |child: ConstructionNode| (!child.triangles.is_empty()).then_some(child);
        (non_empty(front), non_empty(back))
    }
}

#[cfg(debug_assertions)]
fn validate_construction(triangles: &[WorldTriangle], nodes: &[ConstructionNode]) {
    assert!(!nodes.is_empty(), "construction produced no nodes");
    for (i, node) in nodes.iter().enumerate() {
        if node.partitioned {
            let child_ok = |child: Option<usize>| child.is_some_and(|c| c > 0 && c < nodes.len());
            assert!(
                child_ok(node.front) || child_ok(node.back),
                "partitioned construction node {i} has no children"
            );
            let found_split_plane = node
                .triangles
                .iter()
                .filter_map(|&t| triangles[t as usize].plane())
                .any(|plane| plane.almost_equal(&node.plane));
            assert!(
                found_split_plane,
                "construction node {i} was split by a plane none of its triangles lie on"
            );
        } else {
            assert!(
                node.front.is_none() && node.back.is_none(),
                "leaf construction node {i} has children"
            );
            assert!(
                node.plane.almost_equal(&PlaneEq::placeholder()),
                "leaf construction node {i} has a real plane"
            );
        }
    }
}

/// Flattens construction nodes into a [`BspTree`].
///
/// Each triangle is stored once. Triangles are grouped by the sorted list
/// of nodes that reference them; the first node of that list owns the
/// triangle and every other node refers to it through the shared index
/// array. Sorting by the whole list is stable, so the same node/triangle
/// assignment always exports to the same triangle order.
///
/// Triangles no node references are kept at the front of the triangle array
/// but no query can reach them; loaders reject such input before exporting.
///
/// The result is not validated here: the builder validates its own output
/// and loaders report broken input as [`LoadError`](crate::LoadError).
pub(crate) fn export(triangles: &[WorldTriangle], nodes: &[ConstructionNode]) -> BspTree {
    let mut refs: Vec<(Vec<u32>, u32)> = (0..triangles.len() as u32).map(|i| (Vec::new(), i)).collect();
    for (node_index, node) in nodes.iter().enumerate() {
        for &triangle in &node.triangles {
            refs[triangle as usize].0.push(node_index as u32);
        }
    }
    refs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out_nodes: Vec<BspNode> = nodes
        .iter()
        .map(|node| BspNode {
            front: node.front.map(|i| i as u32),
            back: node.back.map(|i| i as u32),
            plane: node.plane,
            ..BspNode::leaf()
        })
        .collect();
    if out_nodes.is_empty() {
        out_nodes.push(BspNode::leaf());
    }

    let mut out_triangles = Vec::with_capacity(triangles.len());
    for (position, (owners, source)) in refs.iter().enumerate() {
        out_triangles.push(triangles[*source as usize]);
        let Some((&owner, others)) = owners.split_first() else {
            continue;
        };
        let node = &mut out_nodes[owner as usize];
        if node.num_triangles == 0 {
            node.first_triangle = position as u32;
        }
        node.num_triangles += 1;
        for &other in others {
            out_nodes[other as usize].num_shared += 1;
        }
    }

    let mut next_shared = 0u32;
    for node in out_nodes.iter_mut().filter(|n| n.num_shared > 0) {
        node.first_shared = next_shared;
        next_shared += node.num_shared;
    }

    let mut shared = vec![0u32; next_shared as usize];
    let mut filled = vec![0u32; out_nodes.len()];
    for (position, (owners, _)) in refs.iter().enumerate() {
        for &other in owners.iter().skip(1) {
            let node = &out_nodes[other as usize];
            shared[(node.first_shared + filled[other as usize]) as usize] = position as u32;
            filled[other as usize] += 1;
        }
    }

    let mut tree = BspTree::from_parts(out_nodes, out_triangles, shared, BoundingBox::inside_out());
    tree.generate_bounding_box();

    debug!(
        "exported bsp tree: {} nodes, {} triangles, {} shared, depth {}",
        tree.num_nodes(),
        tree.num_triangles(),
        tree.num_shared(),
        tree.depth()
    );

    tree
}
