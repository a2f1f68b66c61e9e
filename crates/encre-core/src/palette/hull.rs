//! Incremental 3-D convex hull over a small point cloud.
//!
//! Palette gamuts are hulls of at most a few dozen measured colors, so a
//! plain incremental construction is enough. Arithmetic runs in f64; the
//! palette stores the resulting planes as f32.

use std::collections::HashSet;

/// A triangular hull face with an outward-pointing unit normal.
///
/// A point p is outside the face when `normal . p + offset > 0`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HullFace {
    pub normal: [f64; 3],
    pub offset: f64,
    pub vertices: [usize; 3],
}

/// The hull could not be built: fewer than four distinct points, or all
/// points (near-)coplanar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DegenerateHull;

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn length(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

impl HullFace {
    fn through(points: &[[f64; 3]], a: usize, b: usize, c: usize) -> Option<HullFace> {
        let normal = cross(sub(points[b], points[a]), sub(points[c], points[a]));
        let len = length(normal);
        if len == 0.0 {
            return None;
        }
        let normal = [normal[0] / len, normal[1] / len, normal[2] / len];
        Some(HullFace {
            normal,
            offset: -dot(normal, points[a]),
            vertices: [a, b, c],
        })
    }

    /// Signed distance of a point from the face plane (positive = outside).
    pub fn signed_distance(&self, p: [f64; 3]) -> f64 {
        dot(self.normal, p) + self.offset
    }

    fn oriented_outward(mut self, interior: [f64; 3]) -> HullFace {
        if self.signed_distance(interior) > 0.0 {
            self.normal = [-self.normal[0], -self.normal[1], -self.normal[2]];
            self.offset = -self.offset;
            self.vertices.swap(1, 2);
        }
        self
    }
}

/// Build the convex hull of `points`.
///
/// Returns the ascending indices of the points that are hull vertices and
/// the triangular faces with outward unit normals. Interior and duplicate
/// points are absent from the vertex list.
pub(crate) fn convex_hull(
    points: &[[f64; 3]],
) -> Result<(Vec<usize>, Vec<HullFace>), DegenerateHull> {
    if points.len() < 4 {
        return Err(DegenerateHull);
    }

    let scale = points
        .iter()
        .flat_map(|p| p.iter())
        .fold(0.0f64, |acc, &c| acc.max(c.abs()))
        .max(1.0);
    let epsilon = 1e-9 * scale;

    let [i0, i1, i2, i3] = initial_simplex(points, epsilon)?;
    let interior = [
        (points[i0][0] + points[i1][0] + points[i2][0] + points[i3][0]) / 4.0,
        (points[i0][1] + points[i1][1] + points[i2][1] + points[i3][1]) / 4.0,
        (points[i0][2] + points[i1][2] + points[i2][2] + points[i3][2]) / 4.0,
    ];

    let mut faces: Vec<HullFace> = [
        (i0, i1, i2),
        (i0, i1, i3),
        (i0, i2, i3),
        (i1, i2, i3),
    ]
    .into_iter()
    .filter_map(|(a, b, c)| HullFace::through(points, a, b, c))
    .map(|face| face.oriented_outward(interior))
    .collect();

    // Visibility threshold: generous enough that points sitting on a face
    // are treated as inside rather than spawning sliver faces.
    let visible_epsilon = 1e-7 * scale;

    for index in 0..points.len() {
        if index == i0 || index == i1 || index == i2 || index == i3 {
            continue;
        }
        let p = points[index];

        let visible: Vec<bool> = faces
            .iter()
            .map(|face| face.signed_distance(p) > visible_epsilon)
            .collect();
        if !visible.iter().any(|&v| v) {
            continue;
        }

        // Horizon edges: directed edges of visible faces whose reverse is
        // not covered by another visible face. Kept in face order so the
        // resulting face list is deterministic.
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for (face, _) in faces.iter().zip(&visible).filter(|(_, &v)| v) {
            let [a, b, c] = face.vertices;
            edges.push((a, b));
            edges.push((b, c));
            edges.push((c, a));
        }
        let edge_set: HashSet<(usize, usize)> = edges.iter().copied().collect();
        let horizon: Vec<(usize, usize)> = edges
            .iter()
            .filter(|&&(a, b)| !edge_set.contains(&(b, a)))
            .copied()
            .collect();

        let mut keep = visible.iter().map(|&v| !v);
        faces.retain(|_| keep.next().unwrap_or(true));

        for (a, b) in horizon {
            if let Some(face) = HullFace::through(points, a, b, index) {
                faces.push(face.oriented_outward(interior));
            }
        }
    }

    let mut vertex_indices: Vec<usize> = faces
        .iter()
        .flat_map(|face| face.vertices)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    vertex_indices.sort_unstable();

    if vertex_indices.len() < 4 {
        return Err(DegenerateHull);
    }

    Ok((vertex_indices, faces))
}

/// Pick four affinely independent points to seed the hull.
fn initial_simplex(points: &[[f64; 3]], epsilon: f64) -> Result<[usize; 4], DegenerateHull> {
    let first = 0;

    let second = (0..points.len())
        .max_by(|&a, &b| {
            length(sub(points[a], points[first]))
                .total_cmp(&length(sub(points[b], points[first])))
        })
        .ok_or(DegenerateHull)?;
    if length(sub(points[second], points[first])) <= epsilon {
        return Err(DegenerateHull);
    }

    let edge = sub(points[second], points[first]);
    let third = (0..points.len())
        .max_by(|&a, &b| {
            length(cross(edge, sub(points[a], points[first])))
                .total_cmp(&length(cross(edge, sub(points[b], points[first]))))
        })
        .ok_or(DegenerateHull)?;
    if length(cross(edge, sub(points[third], points[first]))) <= epsilon {
        return Err(DegenerateHull);
    }

    let base =
        HullFace::through(points, first, second, third).ok_or(DegenerateHull)?;
    let fourth = (0..points.len())
        .max_by(|&a, &b| {
            base.signed_distance(points[a])
                .abs()
                .total_cmp(&base.signed_distance(points[b]).abs())
        })
        .ok_or(DegenerateHull)?;
    if base.signed_distance(points[fourth]).abs() <= epsilon {
        return Err(DegenerateHull);
    }

    Ok([first, second, third, fourth])
}
