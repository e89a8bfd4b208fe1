//! Static Binary Space Partitioning tree for collision queries.
//!
//! The tree is built once from a triangle soup (or loaded from a saved blob)
//! and is read-only afterwards. It answers three kinds of queries:
//!
//! - triangle vs. tree: does a triangle touch any stored triangle?
//! - segment vs. tree: nearest (or visitor-selected) hit along a segment
//! - swept triangle vs. tree: does a moving triangle touch anything?
//!
//! # Example
//!
//! ```
//! use collision_bsp::bsp::{BspBuilder, CollectingVisitor};
//! use collision_bsp::WorldTriangle;
//! use nalgebra::Point3;
//!
//! let triangles = vec![WorldTriangle::new(
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(0.0, 0.0, 5.0),
//!     Point3::new(0.0, 5.0, 0.0),
//!     0,
//! )];
//! let tree = BspBuilder::new().build(&triangles);
//!
//! let mut visitor = CollectingVisitor::new();
//! let start = Point3::new(-5.0, 0.0, 2.0);
//! let end = Point3::new(5.0, 2.0, 0.0);
//! tree.intersects_segment(&start, &end, 1.0, &mut visitor);
//! assert_eq!(visitor.hits().len(), 1);
//! ```
//!
//! # Architecture
//!
//! - [`BspTree`]: flat node, triangle and shared index arrays
//! - [`BspNode`]: splitting plane plus ranges into the tree's arrays
//! - [`BspBuilder`]: breadth-first construction and export
//! - [`PlaneSelector`]: strategy trait for choosing splitting planes
//! - [`CollisionVisitor`]: callback deciding which hits count

mod builder;
mod node;
mod selector;
mod tree;
mod visitor;

pub(crate) use builder::{ConstructionNode, export};

pub use builder::{BspBuilder, BuildConfig, DEFAULT_SEED};
pub use node::BspNode;
pub use selector::{FirstTriangle, NodeTriangles, PlaneSelector, RandomSample};
pub use tree::{BspTree, SegmentHit, UserDataKey};
pub use visitor::{CollectingVisitor, CollisionVisitor, FnVisitor, HitResponse, NullVisitor};
