//! Shared scene generation, probes and a legacy-format encoder.

#![allow(dead_code)]

use collision_bsp::bsp::NullVisitor;
use collision_bsp::{BspTree, WorldTriangle};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn make_triangle(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> WorldTriangle {
    WorldTriangle::new(
        Point3::new(a[0], a[1], a[2]),
        Point3::new(b[0], b[1], b[2]),
        Point3::new(c[0], c[1], c[2]),
        0,
    )
}

fn random_point(rng: &mut StdRng, extent: f32) -> Point3<f32> {
    Point3::new(
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
    )
}

fn random_offset(rng: &mut StdRng, size: f32) -> Vector3<f32> {
    Vector3::new(
        rng.gen_range(-size..size),
        rng.gen_range(-size..size),
        rng.gen_range(-size..size),
    )
}

/// `count` random triangles of a few units across, scattered through a cube
/// of side 40 around the origin.
pub fn scene(seed: u64, count: usize) -> Vec<WorldTriangle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let base = random_point(&mut rng, 20.0);
            let a = base + random_offset(&mut rng, 3.0);
            let b = base + random_offset(&mut rng, 3.0);
            WorldTriangle::new(base, a, b, rng.gen_range(0..4))
        })
        .collect()
}

/// Segments crossing the scene cube from one random point to another.
pub fn probe_segments(seed: u64, count: usize) -> Vec<(Point3<f32>, Point3<f32>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (random_point(&mut rng, 25.0), random_point(&mut rng, 25.0)))
        .collect()
}

/// Small probe triangles placed through the scene cube.
pub fn probe_triangles(seed: u64, count: usize) -> Vec<WorldTriangle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let base = random_point(&mut rng, 20.0);
            WorldTriangle::new(
                base,
                base + random_offset(&mut rng, 2.0),
                base + random_offset(&mut rng, 2.0),
                0,
            )
        })
        .collect()
}

/// Nearest-hit fraction for every probe segment.
pub fn segment_answers(tree: &BspTree, probes: &[(Point3<f32>, Point3<f32>)]) -> Vec<Option<f32>> {
    probes
        .iter()
        .map(|(start, end)| {
            tree.intersects_segment(start, end, 1.0, &mut NullVisitor)
                .map(|hit| hit.fraction)
        })
        .collect()
}

/// Whether each probe triangle touches the tree.
pub fn triangle_answers(tree: &BspTree, probes: &[WorldTriangle]) -> Vec<bool> {
    probes
        .iter()
        .map(|probe| tree.intersects_triangle(probe).is_some())
        .collect()
}

/// Asserts that two trees answer every probe the same way.
pub fn assert_same_answers(a: &BspTree, b: &BspTree, seed: u64) {
    let segments = probe_segments(seed, 300);
    let answers_a = segment_answers(a, &segments);
    let answers_b = segment_answers(b, &segments);
    assert!(answers_a.iter().any(Option::is_some), "probe battery never hits");
    for (i, (x, y)) in answers_a.iter().zip(&answers_b).enumerate() {
        match (x, y) {
            (Some(x), Some(y)) => approx::assert_abs_diff_eq!(*x, *y, epsilon = 1e-5),
            (None, None) => {}
            _ => panic!("probe segment {i} answered {x:?} and {y:?}"),
        }
    }

    let triangles = probe_triangles(seed, 200);
    assert_eq!(triangle_answers(a, &triangles), triangle_answers(b, &triangles));
}

const LEGACY_TOKEN: u32 = 0x0050_5342;
const HAS_FRONT: u8 = 0x02;
const HAS_BACK: u8 = 0x04;

/// Encodes a tree in the legacy node-list format: nodes in prefix order,
/// each listing its own and shared triangles as `u16` indices.
pub fn encode_legacy(tree: &BspTree) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&LEGACY_TOKEN.to_le_bytes());
    out.extend_from_slice(&(tree.num_triangles() as u32).to_le_bytes());
    out.extend_from_slice(&(tree.num_nodes() as u32).to_le_bytes());
    out.extend_from_slice(&10u32.to_le_bytes());

    for triangle in tree.triangles() {
        for vertex in triangle.vertices() {
            for coord in [vertex.x, vertex.y, vertex.z] {
                out.extend_from_slice(&coord.to_le_bytes());
            }
        }
        out.extend_from_slice(&triangle.flags().to_le_bytes());
    }

    let mut stack = vec![0usize];
    while let Some(index) = stack.pop() {
        let node = &tree.nodes()[index];
        let mut flags = 0u8;
        if node.front().is_some() {
            flags |= HAS_FRONT;
        }
        if node.back().is_some() {
            flags |= HAS_BACK;
        }
        out.push(flags);

        let normal = node.plane().normal();
        for value in [normal.x, normal.y, normal.z, node.plane().d()] {
            out.extend_from_slice(&value.to_le_bytes());
        }

        let triangles: Vec<usize> = node.candidates(tree).collect();
        out.extend_from_slice(&(triangles.len() as u16).to_le_bytes());
        for t in triangles {
            out.extend_from_slice(&(t as u16).to_le_bytes());
        }

        stack.extend(node.back());
        stack.extend(node.front());
    }

    for (key, data) in tree.user_data_entries() {
        out.extend_from_slice(&key.0.to_le_bytes());
        out.extend_from_slice(&(data.len() as i32).to_le_bytes());
        out.extend_from_slice(data);
    }

    out
}
