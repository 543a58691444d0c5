//! Small fixture meshes shared by unit tests.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use nalgebra::Point3;

use super::{build_from_triangles, HalfEdgeMesh};

/// Unit cube `[0,1]^3`, two outward-facing triangles per side.
pub fn cube_soup() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(1.0, 0.0, 1.0),
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(0.0, 1.0, 1.0),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    (vertices, faces)
}

/// Unit cube as a half-edge mesh.
pub fn cube() -> HalfEdgeMesh {
    let (vertices, faces) = cube_soup();
    build_from_triangles(&vertices, &faces).unwrap()
}

/// `n x n` grid of squares covering `[0,size]^2` in the `z = 0` plane.
///
/// Vertex `(i, j)` has index `j * (n + 1) + i`; faces are CCW around `+z`.
pub fn flat_grid_soup(n: usize, size: f64) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let step = size / n as f64;
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point3::new(i as f64 * step, j as f64 * step, 0.0));
        }
    }

    let mut faces = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            let a = j * (n + 1) + i;
            let b = a + 1;
            let c = a + n + 2;
            let d = a + n + 1;
            faces.push([a, b, c]);
            faces.push([a, c, d]);
        }
    }
    (vertices, faces)
}

/// Flat grid as a half-edge mesh.
pub fn flat_grid(n: usize, size: f64) -> HalfEdgeMesh {
    let (vertices, faces) = flat_grid_soup(n, size);
    build_from_triangles(&vertices, &faces).unwrap()
}

/// Open cylinder of radius 1 and height 1 with `segments` around and `rings` bands.
pub fn open_cylinder(segments: usize, rings: usize) -> HalfEdgeMesh {
    let mut vertices = Vec::new();
    for r in 0..=rings {
        for i in 0..segments {
            let theta = 2.0 * PI * i as f64 / segments as f64;
            vertices.push(Point3::new(theta.cos(), theta.sin(), r as f64 / rings as f64));
        }
    }

    let mut faces = Vec::new();
    for r in 0..rings {
        for i in 0..segments {
            let a = r * segments + i;
            let b = r * segments + (i + 1) % segments;
            let c = b + segments;
            let d = a + segments;
            faces.push([a, b, c]);
            faces.push([a, c, d]);
        }
    }
    build_from_triangles(&vertices, &faces).unwrap()
}

/// Unit icosphere obtained by `subdivisions` rounds of midpoint refinement.
pub fn icosphere(subdivisions: usize) -> HalfEdgeMesh {
    let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let mut vertices: Vec<Point3<f64>> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Point3::from(nalgebra::Vector3::new(x, y, z).normalize()))
    .collect();

    let mut faces: Vec<[usize; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Point3<f64>>| {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let m = (vertices[a].coords + vertices[b].coords).normalize();
                vertices.push(Point3::from(m));
                vertices.len() - 1
            })
        };

        let mut refined = Vec::with_capacity(faces.len() * 4);
        for &[a, b, c] in &faces {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            refined.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        faces = refined;
    }

    build_from_triangles(&vertices, &faces).unwrap()
}
