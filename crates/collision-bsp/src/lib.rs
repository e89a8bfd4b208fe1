//! Static BSP (Binary Space Partitioning) tree over world triangles.
//!
//! Built once, queried concurrently, and saved to a relocatable binary blob.

pub mod bsp;
pub mod codec;

mod bounds;
mod cuttable;
mod error;
mod plane;
mod polygon;
mod triangle;

pub use bounds::BoundingBox;
pub use bsp::{BspBuilder, BspTree, BuildConfig, CollisionVisitor, HitResponse, UserDataKey};
pub use cuttable::Cuttable;
pub use error::LoadError;
pub use plane::{BSP_TOLERANCE, BspSide, PlaneEq};
pub use polygon::WorldPolygon;
pub use triangle::{TRIANGLE_NOT_IN_BSP, WorldTriangle};
