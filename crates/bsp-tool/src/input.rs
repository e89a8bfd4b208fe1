//! Plain-text triangle lists.
//!
//! One triangle per line: nine vertex coordinates followed by optional
//! integer flags. Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result, bail};
use collision_bsp::WorldTriangle;
use log::warn;
use nalgebra::Point3;

/// Triangles whose normal is shorter than this are dropped before building.
pub const MIN_NORMAL_LENGTH: f32 = 1e-4;

/// Parses a triangle list, dropping degenerate triangles.
pub fn parse_triangles(text: &str) -> Result<Vec<WorldTriangle>> {
    let mut triangles = Vec::new();
    let mut culled = 0usize;

    for (number, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l.trim())) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let triangle = parse_line(line).with_context(|| format!("line {number}"))?;
        if triangle.normal().norm() < MIN_NORMAL_LENGTH {
            warn!("line {number}: culled degenerate triangle");
            culled += 1;
            continue;
        }
        triangles.push(triangle);
    }

    if culled > 0 {
        warn!("culled {culled} degenerate triangles");
    }
    Ok(triangles)
}

fn parse_line(line: &str) -> Result<WorldTriangle> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if !(9..=10).contains(&fields.len()) {
        bail!("expected 9 coordinates and optional flags, found {} fields", fields.len());
    }

    let mut coords = [0.0f32; 9];
    for (coord, field) in coords.iter_mut().zip(&fields) {
        *coord = field
            .parse()
            .with_context(|| format!("bad coordinate {field:?}"))?;
    }
    let flags = match fields.get(9) {
        Some(field) => field.parse().with_context(|| format!("bad flags {field:?}"))?,
        None => 0,
    };

    let point = |i: usize| Point3::new(coords[i], coords[i + 1], coords[i + 2]);
    Ok(WorldTriangle::new(point(0), point(3), point(6), flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coordinates_and_flags() {
        let text = "# floor\n0 0 0  1 0 0  0 1 0\n\n0 0 1  1 0 1  0 1 1  7\n";
        let triangles = parse_triangles(text).unwrap();
        assert_eq!(triangles.len(), 2);
        assert_eq!(triangles[0].flags(), 0);
        assert_eq!(triangles[1].flags(), 7);
        assert_eq!(*triangles[1].v2(), Point3::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn culls_degenerate_triangles() {
        let text = "0 0 0  1 0 0  2 0 0\n0 0 0  1 0 0  0 1 0\n";
        assert_eq!(parse_triangles(text).unwrap().len(), 1);
    }

    #[test]
    fn reports_the_bad_line() {
        let err = parse_triangles("0 0 0 1 0 0 0 1 0\n0 0 0 1 x 0 0 1 0\n").unwrap_err();
        assert_eq!(err.to_string(), "line 2");
        assert!(format!("{err:#}").contains("bad coordinate \"x\""));

        assert!(parse_triangles("1 2 3\n").is_err());
    }
}
