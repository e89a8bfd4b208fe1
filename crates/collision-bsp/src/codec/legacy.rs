//! The legacy (version 0) format.
//!
//! Nodes are stored in prefix order, each as a flags byte, the splitting
//! plane and a `u16` list of triangle indices. A node's front child, if any,
//! follows it directly; its back child follows the whole front subtree.
//!
//! ```text
//! header:     magic+version u32, triangles u32, nodes u32, max triangles u32
//! triangles:  3 vertices (3×f32 each) + flags u32
//! nodes:      flags u8, plane (normal 3×f32, d f32), count u16, count × u16
//! user data:  { key u32, length i32, bytes } until the end of the buffer
//! ```

use std::mem::size_of;

use log::info;

use crate::bsp::{ConstructionNode, export};
use crate::{BspTree, LoadError, PlaneEq, WorldTriangle};

use super::io::Reader;
use super::{LEGACY_VERSION, check_loaded, logged, read_user_data, token};

const HAS_FRONT: u8 = 0x02;
const HAS_BACK: u8 = 0x04;

struct Record {
    flags: u8,
    plane: PlaneEq,
    triangles: Vec<u32>,
}

/// Loads a blob in the legacy format, converting it to the current layout.
///
/// The node records are turned back into construction nodes and flattened
/// by the same export step the builder uses, so the result has the same
/// shape as a freshly built tree.
pub fn load_legacy(data: &[u8]) -> Result<BspTree, LoadError> {
    logged(read_legacy(data))
}

fn read_legacy(data: &[u8]) -> Result<BspTree, LoadError> {
    let mut reader = Reader::new(data);

    let header = reader.read_u32()?;
    if header != token(LEGACY_VERSION) {
        return match super::bsp_version(data) {
            Some(found) => Err(LoadError::UnsupportedVersion { found }),
            None => Err(LoadError::BadMagic),
        };
    }

    let num_triangles = reader.read_u32()?;
    let num_nodes = reader.read_u32()?;
    let _max_triangles = reader.read_u32()?;
    if num_nodes == 0 {
        return Err(LoadError::Corrupt("tree has no nodes".to_string()));
    }

    reader.ensure_records(num_triangles, size_of::<WorldTriangle>())?;
    let triangles = (0..num_triangles)
        .map(|_| reader.read_triangle())
        .collect::<Result<Vec<_>, _>>()?;

    let records = (0..num_nodes)
        .map(|_| read_record(&mut reader, num_triangles))
        .collect::<Result<Vec<_>, _>>()?;

    let nodes = link_records(records)?;

    let mut referenced = vec![false; triangles.len()];
    for node in &nodes {
        for &t in &node.triangles {
            referenced[t as usize] = true;
        }
    }
    if let Some(orphan) = referenced.iter().position(|&r| !r) {
        return Err(LoadError::Corrupt(format!(
            "triangle {orphan} is not referenced by any node"
        )));
    }

    let mut tree = export(&triangles, &nodes);
    read_user_data(&mut reader, &mut tree)?;
    check_loaded(&tree)?;

    info!(
        "converted legacy bsp: {} nodes, {} triangles",
        tree.num_nodes(),
        tree.num_triangles()
    );
    Ok(tree)
}

fn read_record(reader: &mut Reader<'_>, num_triangles: u32) -> Result<Record, LoadError> {
    let position = reader.position();
    let flags = reader.read_u8()?;
    let plane = reader.read_plane()?;
    let count = reader.read_u16()?;
    reader.ensure_records(u32::from(count), size_of::<u16>())?;
    let triangles = (0..count)
        .map(|_| {
            let index = u32::from(reader.read_u16()?);
            if index >= num_triangles {
                return Err(LoadError::Corrupt(format!(
                    "node at byte {position} references triangle {index} of {num_triangles}"
                )));
            }
            Ok(index)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut sorted = triangles.clone();
    sorted.sort_unstable();
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(LoadError::Corrupt(format!(
            "node at byte {position} lists triangle {} more than once",
            pair[0]
        )));
    }

    Ok(Record {
        flags,
        plane,
        triangles,
    })
}

/// Resolves child links from prefix order.
///
/// Subtree sizes are computed from the last record backwards: a back child
/// sits right after its sibling front subtree, whose size is already known.
fn link_records(records: Vec<Record>) -> Result<Vec<ConstructionNode>, LoadError> {
    let count = records.len();
    let mut subtree = vec![0usize; count];
    let mut links = vec![(None, None); count];

    for i in (0..count).rev() {
        let flags = records[i].flags;
        let mut next = i + 1;
        let mut child = |present: bool| -> Result<Option<usize>, LoadError> {
            if !present {
                return Ok(None);
            }
            if next >= count {
                return Err(LoadError::Corrupt(format!(
                    "node {i} has a child past the last of {count} nodes"
                )));
            }
            let index = next;
            next += subtree[index];
            Ok(Some(index))
        };
        let front = child(flags & HAS_FRONT != 0)?;
        let back = child(flags & HAS_BACK != 0)?;
        subtree[i] = next - i;
        links[i] = (front, back);
    }

    if subtree[0] != count {
        return Err(LoadError::Corrupt(format!(
            "{} of {count} nodes are not reachable from the root",
            count - subtree[0].min(count)
        )));
    }

    Ok(records
        .into_iter()
        .zip(links)
        .map(|(record, (front, back))| ConstructionNode::prebuilt(front, back, record.plane, record.triangles))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::io::Writer;
    use nalgebra::{Point3, Vector3};

    fn write_record(writer: &mut Writer, flags: u8, triangles: &[u16]) {
        writer.write_u8(flags);
        writer.write_plane(&PlaneEq::new(Vector3::z(), 0.0));
        writer.write_u16(triangles.len() as u16);
        for &t in triangles {
            writer.write_u16(t);
        }
    }

    fn header(writer: &mut Writer, num_triangles: u32, num_nodes: u32) {
        writer.write_u32(token(LEGACY_VERSION));
        writer.write_u32(num_triangles);
        writer.write_u32(num_nodes);
        writer.write_u32(10);
        for i in 0..num_triangles {
            let z = i as f32;
            writer.write_triangle(&WorldTriangle::new(
                Point3::new(0.0, 0.0, z),
                Point3::new(1.0, 0.0, z),
                Point3::new(0.0, 1.0, z),
                0,
            ));
        }
    }

    #[test]
    fn back_child_follows_front_subtree() {
        // 0 -> front 1 (-> front 2), back 3
        let records: Vec<Record> = [HAS_FRONT | HAS_BACK, HAS_FRONT, 0, 0]
            .into_iter()
            .map(|flags| Record {
                flags,
                plane: PlaneEq::placeholder(),
                triangles: vec![],
            })
            .collect();
        let nodes = link_records(records).unwrap();
        assert_eq!((nodes[0].front, nodes[0].back), (Some(1), Some(3)));
        assert_eq!((nodes[1].front, nodes[1].back), (Some(2), None));
        assert_eq!((nodes[3].front, nodes[3].back), (None, None));
    }

    #[test]
    fn back_only_child_follows_directly() {
        let records: Vec<Record> = [HAS_BACK, 0]
            .into_iter()
            .map(|flags| Record {
                flags,
                plane: PlaneEq::placeholder(),
                triangles: vec![],
            })
            .collect();
        let nodes = link_records(records).unwrap();
        assert_eq!((nodes[0].front, nodes[0].back), (None, Some(1)));
    }

    #[test]
    fn missing_child_is_corrupt() {
        let mut writer = Writer::default();
        header(&mut writer, 1, 1);
        write_record(&mut writer, HAS_FRONT, &[0]);
        let err = load_legacy(&writer.into_inner()).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn unreachable_nodes_are_corrupt() {
        let mut writer = Writer::default();
        header(&mut writer, 1, 2);
        write_record(&mut writer, 0, &[0]);
        write_record(&mut writer, 0, &[]);
        let err = load_legacy(&writer.into_inner()).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn bad_triangle_index_is_corrupt() {
        let mut writer = Writer::default();
        header(&mut writer, 1, 1);
        write_record(&mut writer, 0, &[3]);
        let err = load_legacy(&writer.into_inner()).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn repeated_triangle_index_is_corrupt() {
        let mut writer = Writer::default();
        header(&mut writer, 2, 1);
        write_record(&mut writer, 0, &[0, 1, 0]);
        let err = load_legacy(&writer.into_inner()).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn foreign_split_plane_is_corrupt() {
        // The root splits at z = 0 but only lists the triangle at z = 1.
        let mut writer = Writer::default();
        header(&mut writer, 2, 2);
        write_record(&mut writer, HAS_FRONT, &[1]);
        write_record(&mut writer, 0, &[0]);
        let err = load_legacy(&writer.into_inner()).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)), "got {err:?}");
    }

    #[test]
    fn split_plane_matching_a_triangle_loads() {
        let mut writer = Writer::default();
        header(&mut writer, 2, 2);
        write_record(&mut writer, HAS_FRONT, &[0]);
        write_record(&mut writer, 0, &[1]);
        let tree = load_legacy(&writer.into_inner()).unwrap();
        assert_eq!(tree.num_nodes(), 2);
        assert_eq!(tree.root().front(), Some(1));
        assert_eq!(tree.num_shared(), 0);
    }

    #[test]
    fn unreferenced_triangle_is_corrupt() {
        let mut writer = Writer::default();
        header(&mut writer, 2, 1);
        write_record(&mut writer, 0, &[1]);
        let err = load_legacy(&writer.into_inner()).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn single_leaf_loads_with_user_data() {
        let mut writer = Writer::default();
        header(&mut writer, 2, 1);
        write_record(&mut writer, 0, &[1, 0]);
        writer.write_u32(7);
        writer.write_i32(3);
        writer.write_bytes(b"abc");
        let tree = load_legacy(&writer.into_inner()).unwrap();
        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.num_triangles(), 2);
        assert_eq!(tree.root().own_range(), 0..2);
        assert_eq!(tree.user_data(crate::UserDataKey(7)), Some(&b"abc"[..]));
    }

    #[test]
    fn truncated_node_list() {
        let mut writer = Writer::default();
        header(&mut writer, 1, 2);
        write_record(&mut writer, HAS_FRONT, &[0]);
        let err = load_legacy(&writer.into_inner()).unwrap_err();
        assert!(matches!(err, LoadError::Truncated { .. }));
    }
}
