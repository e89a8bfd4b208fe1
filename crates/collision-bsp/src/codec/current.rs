//! The current (version 2) format.

use std::mem::size_of;

use crate::bsp::BspNode;
use crate::{BspTree, LoadError, PlaneEq, WorldTriangle};

use super::io::{NULL_OFFSET, Reader, Writer, resolve_range};
use super::{CURRENT_VERSION, logged, read_user_data, token};

const HEADER_SIZE: usize = 4 * size_of::<u32>();
const COUNTS_SIZE: usize = 3 * size_of::<u32>();
const BOUNDING_BOX_SIZE: usize = 6 * size_of::<f32>();

/// Serializes a tree in the current format.
///
/// User data entries are written in key order.
pub fn save(tree: &BspTree) -> Vec<u8> {
    let user_data_size: usize = tree
        .user_data_entries()
        .map(|(_, data)| 2 * size_of::<u32>() + data.len())
        .sum();
    let size = HEADER_SIZE
        + COUNTS_SIZE
        + BOUNDING_BOX_SIZE
        + tree.num_triangles() * size_of::<WorldTriangle>()
        + tree.num_shared() * size_of::<i32>()
        + tree.num_nodes() * BspNode::PACKED_SIZE as usize
        + user_data_size;

    let mut writer = Writer::with_capacity(size);

    writer.write_u32(token(CURRENT_VERSION));
    writer.write_u32(size_of::<PlaneEq>() as u32);
    writer.write_u32(size_of::<WorldTriangle>() as u32);
    writer.write_u32(BspNode::PACKED_SIZE);

    writer.write_u32(tree.num_triangles() as u32);
    writer.write_u32(tree.num_nodes() as u32);
    writer.write_u32(tree.num_shared() as u32);

    writer.write_bounding_box(tree.bounding_box());

    for triangle in tree.triangles() {
        writer.write_triangle(triangle);
    }

    for &index in tree.shared_indices() {
        writer.write_i32(index as i32);
    }

    for node in tree.nodes() {
        writer.write_i32(node.front.map_or(NULL_OFFSET, |i| i as i32));
        writer.write_i32(node.back.map_or(NULL_OFFSET, |i| i as i32));
        writer.write_plane(node.plane());
        writer.write_range(node.first_triangle, node.num_triangles);
        writer.write_u32(node.num_triangles);
        writer.write_range(node.first_shared, node.num_shared);
        writer.write_u32(node.num_shared);
    }

    for (key, data) in tree.user_data_entries() {
        writer.write_u32(key.0);
        writer.write_i32(data.len() as i32);
        writer.write_bytes(data);
    }

    let data = writer.into_inner();
    debug_assert_eq!(data.len(), size);
    data
}

/// Loads a blob in the current format.
///
/// The structure sizes recorded by the writer must match this build's, and
/// the decoded tree must pass [`BspTree::check_structure`] and
/// [`BspTree::check_split_planes`].
pub fn load_current(data: &[u8]) -> Result<BspTree, LoadError> {
    logged(read_current(data))
}

fn read_current(data: &[u8]) -> Result<BspTree, LoadError> {
    let mut reader = Reader::new(data);

    let header = reader.read_u32()?;
    if header != token(CURRENT_VERSION) {
        return match super::bsp_version(data) {
            Some(found) => Err(LoadError::UnsupportedVersion { found }),
            None => Err(LoadError::BadMagic),
        };
    }

    let plane = reader.read_u32()?;
    let triangle = reader.read_u32()?;
    let node = reader.read_u32()?;
    let expected_plane = size_of::<PlaneEq>() as u32;
    let expected_triangle = size_of::<WorldTriangle>() as u32;
    let expected_node = BspNode::PACKED_SIZE;
    if plane != expected_plane || triangle != expected_triangle || node != expected_node {
        return Err(LoadError::StructSizeMismatch {
            plane,
            triangle,
            node,
            expected_plane,
            expected_triangle,
            expected_node,
        });
    }

    let num_triangles = reader.read_u32()?;
    let num_nodes = reader.read_u32()?;
    let num_shared = reader.read_u32()?;
    if num_nodes == 0 {
        return Err(LoadError::Corrupt("tree has no nodes".to_string()));
    }

    let bounding_box = reader.read_bounding_box()?;

    reader.ensure_records(num_triangles, size_of::<WorldTriangle>())?;
    let triangles = (0..num_triangles)
        .map(|_| reader.read_triangle())
        .collect::<Result<Vec<_>, _>>()?;

    reader.ensure_records(num_shared, size_of::<i32>())?;
    let shared = (0..num_shared)
        .map(|_| {
            let offset = reader.read_i32()?;
            match u32::try_from(offset) {
                Ok(index) if index < num_triangles => Ok(index),
                _ => Err(LoadError::Corrupt(format!(
                    "shared entry {offset} is not one of {num_triangles} triangles"
                ))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    reader.ensure_records(num_nodes, BspNode::PACKED_SIZE as usize)?;
    let nodes = (0..num_nodes)
        .map(|_| read_node(&mut reader, num_nodes, triangles.len(), shared.len()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut tree = BspTree::from_parts(nodes, triangles, shared, bounding_box);
    read_user_data(&mut reader, &mut tree)?;

    super::check_loaded(&tree)?;
    Ok(tree)
}

fn read_node(
    reader: &mut Reader<'_>,
    num_nodes: u32,
    num_triangles: usize,
    num_shared: usize,
) -> Result<BspNode, LoadError> {
    let mut child = || -> Result<Option<u32>, LoadError> {
        let offset = reader.read_i32()?;
        if offset == NULL_OFFSET {
            return Ok(None);
        }
        match u32::try_from(offset) {
            Ok(index) if index < num_nodes => Ok(Some(index)),
            _ => Err(LoadError::Corrupt(format!(
                "child offset {offset} is not one of {num_nodes} nodes"
            ))),
        }
    };
    let front = child()?;
    let back = child()?;

    let plane = reader.read_plane()?;

    let (first_triangle, num_own) = read_range(reader, "triangle", num_triangles)?;
    let (first_shared, num_shared_refs) = read_range(reader, "shared", num_shared)?;

    Ok(BspNode {
        front,
        back,
        plane,
        first_triangle,
        num_triangles: num_own,
        first_shared,
        num_shared: num_shared_refs,
    })
}

/// Reads an (offset, count) pair and checks it against an array of `len` entries.
fn read_range(reader: &mut Reader<'_>, what: &str, len: usize) -> Result<(u32, u32), LoadError> {
    let offset = reader.read_i32()?;
    let count = reader.read_u32()?;
    let first = resolve_range(what, offset, count, len)?;
    Ok((first, count))
}
