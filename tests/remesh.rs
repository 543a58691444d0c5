//! End-to-end remeshing tests.

use std::collections::HashMap;

use quadify::{remesh, RemeshError, RemeshOptions, RemeshOutput};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

type Soup = (Vec<[f64; 3]>, Vec<[i32; 3]>);

fn unit_cube() -> Soup {
    let vertices = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [2, 3, 7],
        [2, 7, 6],
        [1, 2, 6],
        [1, 6, 5],
        [0, 4, 7],
        [0, 7, 3],
    ];
    (vertices, faces)
}

/// Split every triangle into four, `levels` times, sharing edge midpoints.
fn subdivide((mut vertices, mut faces): Soup, levels: usize, project: bool) -> Soup {
    for _ in 0..levels {
        let mut midpoints: HashMap<(i32, i32), i32> = HashMap::new();
        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let mut mid = |u: i32, w: i32| -> i32 {
                let key = (u.min(w), u.max(w));
                *midpoints.entry(key).or_insert_with(|| {
                    let (p, q) = (vertices[u as usize], vertices[w as usize]);
                    vertices.push([(p[0] + q[0]) / 2.0, (p[1] + q[1]) / 2.0, (p[2] + q[2]) / 2.0]);
                    (vertices.len() - 1) as i32
                })
            };
            let ab = mid(a, b);
            let bc = mid(b, c);
            let ca = mid(c, a);
            next.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        faces = next;
    }
    if project {
        for p in &mut vertices {
            let n = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            *p = [p[0] / n, p[1] / n, p[2] / n];
        }
    }
    (vertices, faces)
}

/// Unit icosphere with 320 triangles.
fn icosphere() -> Soup {
    let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let vertices = vec![
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ];
    let faces = vec![
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
    subdivide((vertices, faces), 2, true)
}

/// `n x n` squares over the unit square, two triangles each.
fn unit_grid(n: usize) -> Soup {
    let mut vertices = Vec::new();
    for j in 0..=n {
        for i in 0..=n {
            vertices.push([i as f64 / n as f64, j as f64 / n as f64, 0.0]);
        }
    }
    let mut faces = Vec::new();
    for j in 0..n {
        for i in 0..n {
            let a = (j * (n + 1) + i) as i32;
            let (b, c, d) = (a + 1, a + n as i32 + 2, a + n as i32 + 1);
            faces.push([a, b, c]);
            faces.push([a, c, d]);
        }
    }
    (vertices, faces)
}

fn assert_valid_quads(out: &RemeshOutput) {
    assert!(!out.faces.is_empty());
    for face in &out.faces {
        for &i in face {
            assert!(i >= 0 && (i as usize) < out.vertices.len(), "index {} out of range", i);
        }
        let mut sorted = *face;
        sorted.sort_unstable();
        assert!(sorted.windows(2).all(|w| w[0] != w[1]), "repeated corner in {:?}", face);
    }
}

fn assert_near_target(out: &RemeshOutput, target: usize) {
    let n = out.faces.len() as f64;
    let t = target as f64;
    assert!(
        n >= 0.7 * t && n <= 1.3 * t,
        "{} quads for a target of {}",
        out.faces.len(),
        target
    );
}

/// Quads as triangles, for feeding an output back in.
fn triangulate(out: &RemeshOutput) -> Soup {
    let faces = out
        .faces
        .iter()
        .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
        .collect();
    (out.vertices.clone(), faces)
}

#[test]
fn test_cube_scenario() {
    init_logger();
    let (v, f) = unit_cube();
    let out = remesh(&v, &f, 6, &RemeshOptions::default().with_seed(0)).unwrap();
    assert_valid_quads(&out);
    assert!((3..=12).contains(&out.faces.len()), "{} quads", out.faces.len());
    assert!((out.report.defect_sum - 2.0).abs() < 1e-9);
}

#[test]
fn test_non_positive_target_is_rejected() {
    init_logger();
    let (v, f) = unit_cube();
    for target in [0, -1] {
        let err = remesh(&v, &f, target, &RemeshOptions::default()).unwrap_err();
        assert!(matches!(err, RemeshError::InvalidParameter { .. }));
    }
}

#[test]
fn test_malformed_input_is_rejected() {
    init_logger();
    let (v, _) = unit_cube();
    let err = remesh(&v, &[[0, 0, 1]], 6, &RemeshOptions::default()).unwrap_err();
    assert!(err.is_invalid_input());

    let err = remesh(&[[0.0, f64::NAN, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &[[0, 1, 2]], 1, &RemeshOptions::default())
        .unwrap_err();
    assert!(err.is_invalid_input());

    // Three triangles on one edge.
    let v = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]];
    let f = [[0, 1, 2], [1, 0, 3], [0, 1, 4]];
    let err = remesh(&v, &f, 2, &RemeshOptions::default()).unwrap_err();
    assert!(err.is_invalid_input());
}

#[test]
fn test_sphere_face_count_and_balance() {
    init_logger();
    let (v, f) = icosphere();
    let out = remesh(&v, &f, 100, &RemeshOptions::default()).unwrap();
    assert_valid_quads(&out);
    assert_near_target(&out, 100);
    assert_eq!(out.report.euler_characteristic, 2);
    assert!((out.report.defect_sum - 2.0).abs() < 1e-9);
}

#[test]
fn test_same_seed_same_output() {
    init_logger();
    let (v, f) = icosphere();
    let options = RemeshOptions::default().with_seed(42);
    let first = remesh(&v, &f, 100, &options).unwrap();
    let second = remesh(&v, &f, 100, &options).unwrap();
    assert_eq!(first.vertices, second.vertices);
    assert_eq!(first.faces, second.faces);
}

#[test]
fn test_different_seeds_both_valid() {
    init_logger();
    let (v, f) = icosphere();
    for seed in [1, 2] {
        let out = remesh(&v, &f, 100, &RemeshOptions::default().with_seed(seed)).unwrap();
        assert_valid_quads(&out);
        assert_near_target(&out, 100);
        assert!((out.report.defect_sum - 2.0).abs() < 1e-9);
    }
}

#[test]
fn test_output_keeps_the_input_extent() {
    init_logger();
    let (v, f) = icosphere();
    let out = remesh(&v, &f, 100, &RemeshOptions::default()).unwrap();
    let extent = out
        .vertices
        .iter()
        .flat_map(|p| p.iter().map(|c| c.abs()))
        .fold(0.0, f64::max);
    assert!((extent - 1.0).abs() < 0.3);
}

#[test]
fn test_solver_modes_are_valid() {
    init_logger();
    let (v, f) = icosphere();
    let options = RemeshOptions::default()
        .with_aggressive_sat(true)
        .with_minimum_cost_flow(true)
        .with_adaptive_scale(true);
    let out = remesh(&v, &f, 100, &options).unwrap();
    assert_valid_quads(&out);
    assert!((out.report.defect_sum - 2.0).abs() < 1e-9);
}

#[test]
fn test_subdivided_cube_with_sharp_edges() {
    init_logger();
    let (v, f) = subdivide(unit_cube(), 2, false);
    let options = RemeshOptions::default().with_preserve_sharp(true);
    let out = remesh(&v, &f, 24, &options).unwrap();
    assert_valid_quads(&out);

    // Every quad stays on one side of the cube.
    for face in &out.faces {
        let corners = face.map(|i| out.vertices[i as usize]);
        let flat = (0..3).any(|axis| {
            let c = corners[0][axis];
            (c.abs() < 1e-6 || (c - 1.0).abs() < 1e-6)
                && corners.iter().all(|p| (p[axis] - c).abs() < 1e-6)
        });
        assert!(flat, "quad {:?} crosses a crease", corners);
    }
}

#[test]
fn test_boundary_is_preserved() {
    init_logger();
    let (v, f) = unit_grid(8);
    let options = RemeshOptions::default().with_preserve_boundary(true);
    let out = remesh(&v, &f, 16, &options).unwrap();
    assert_valid_quads(&out);
    assert_near_target(&out, 16);

    let mut uses: HashMap<(i32, i32), usize> = HashMap::new();
    for face in &out.faces {
        for k in 0..4 {
            let (a, b) = (face[k], face[(k + 1) % 4]);
            *uses.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
    }
    let on_border = |p: [f64; 3]| {
        p[0].abs() < 1e-6 || (p[0] - 1.0).abs() < 1e-6 || p[1].abs() < 1e-6 || (p[1] - 1.0).abs() < 1e-6
    };
    let mut boundary_edges = 0;
    for (&(a, b), &count) in &uses {
        assert!(count <= 2);
        if count == 1 {
            boundary_edges += 1;
            assert!(on_border(out.vertices[a as usize]) && on_border(out.vertices[b as usize]));
        }
    }
    assert!(boundary_edges >= 4);
}

#[test]
fn test_remeshing_the_output_is_stable() {
    init_logger();
    let (v, f) = icosphere();
    let first = remesh(&v, &f, 100, &RemeshOptions::default()).unwrap();
    let (v2, f2) = triangulate(&first);
    let second = remesh(&v2, &f2, 100, &RemeshOptions::default()).unwrap();
    assert_valid_quads(&second);
    let ratio = second.faces.len() as f64 / first.faces.len() as f64;
    assert!((0.5..=2.0).contains(&ratio), "{} then {} quads", first.faces.len(), second.faces.len());
}
