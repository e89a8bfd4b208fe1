//! Errors reported while loading a serialized tree.

use thiserror::Error;

/// Structural problems found while decoding a BSP blob.
///
/// Building and querying never fail; only loading can.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The buffer does not start with the BSP magic.
    #[error("bad bsp magic")]
    BadMagic,

    /// The magic is valid but the version is not one this build can read.
    #[error("unsupported bsp version {found} (expected {legacy} or {current})", legacy = crate::codec::LEGACY_VERSION, current = crate::codec::CURRENT_VERSION)]
    UnsupportedVersion {
        /// Version byte stored in the header.
        found: u8,
    },

    /// The writer's structure sizes differ from this build's.
    #[error(
        "structure size mismatch: plane {plane} (expected {expected_plane}), \
         triangle {triangle} (expected {expected_triangle}), \
         node {node} (expected {expected_node})"
    )]
    StructSizeMismatch {
        plane: u32,
        triangle: u32,
        node: u32,
        expected_plane: u32,
        expected_triangle: u32,
        expected_node: u32,
    },

    /// The buffer ended before a complete record could be read.
    #[error("truncated bsp data: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The data decoded but describes an inconsistent tree.
    #[error("corrupt bsp data: {0}")]
    Corrupt(String),
}
