//! Best-effort repair of triangle soups.
//!
//! These passes run on plain index arrays before a [`HalfEdgeMesh`] is built,
//! turning input that is "almost" a manifold surface into one:
//!
//! 1. [`compact_soup`] drops unreferenced vertices
//! 2. [`check_faces`] rejects degenerate triangles
//! 3. [`check_manifold_edges`] rejects edges with more than two faces
//! 4. [`orient_faces`] makes winding consistent by flipping faces
//! 5. [`split_nonmanifold_vertices`] separates face fans meeting at a vertex
//!
//! [`normalize_positions`] is independent of connectivity and maps a mesh into
//! a unit box (and back).
//!
//! [`HalfEdgeMesh`]: super::HalfEdgeMesh

use std::collections::{HashMap, VecDeque};

use nalgebra::{Point3, Vector3};

use crate::error::{RemeshError, Result};

/// Relative area below which a triangle counts as degenerate.
const DEGENERATE_AREA_EPS: f64 = 1e-12;

/// Key of an undirected edge.
#[inline]
fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Keep only vertices referenced by at least one face.
///
/// Vertices are renumbered in order of first reference. Returns the new
/// positions, the remapped faces, and for every new vertex its index in the
/// input.
pub fn compact_soup(
    positions: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> (Vec<Point3<f64>>, Vec<[usize; 3]>, Vec<usize>) {
    let mut remap = vec![usize::MAX; positions.len()];
    let mut origin = Vec::new();

    let faces = faces
        .iter()
        .map(|face| {
            face.map(|v| {
                if remap[v] == usize::MAX {
                    remap[v] = origin.len();
                    origin.push(v);
                }
                remap[v]
            })
        })
        .collect();

    let positions = origin.iter().map(|&v| positions[v]).collect();
    (positions, faces, origin)
}

/// Validate face indices and vertex coordinates.
pub fn check_indices(positions: &[Point3<f64>], faces: &[[i64; 3]]) -> Result<Vec<[usize; 3]>> {
    if positions.is_empty() || faces.is_empty() {
        return Err(RemeshError::EmptyMesh);
    }

    for (vi, p) in positions.iter().enumerate() {
        if !p.coords.iter().all(|c| c.is_finite()) {
            return Err(RemeshError::NonFiniteCoordinate { vertex: vi });
        }
    }

    faces
        .iter()
        .enumerate()
        .map(|(fi, face)| {
            let mut out = [0usize; 3];
            for (k, &vi) in face.iter().enumerate() {
                if vi < 0 || vi as usize >= positions.len() {
                    return Err(RemeshError::InvalidVertexIndex { face: fi, vertex: vi });
                }
                out[k] = vi as usize;
            }
            Ok(out)
        })
        .collect()
}

/// Reject triangles that repeat a vertex or have (near) zero area.
pub fn check_faces(positions: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<()> {
    for (fi, &[a, b, c]) in faces.iter().enumerate() {
        if a == b || b == c || a == c {
            return Err(RemeshError::DegenerateFace { face: fi });
        }

        let e0 = positions[b] - positions[a];
        let e1 = positions[c] - positions[a];
        let e2 = positions[c] - positions[b];
        let longest = e0.norm_squared().max(e1.norm_squared()).max(e2.norm_squared());
        let doubled_area = e0.cross(&e1).norm();

        if longest == 0.0 || doubled_area <= DEGENERATE_AREA_EPS * longest {
            return Err(RemeshError::DegenerateFace { face: fi });
        }
    }
    Ok(())
}

/// Map from undirected edge to its incident faces, in face order.
fn edge_faces(faces: &[[usize; 3]]) -> HashMap<(usize, usize), Vec<usize>> {
    let mut map: HashMap<(usize, usize), Vec<usize>> = HashMap::with_capacity(faces.len() * 2);
    for (fi, face) in faces.iter().enumerate() {
        for k in 0..3 {
            map.entry(edge_key(face[k], face[(k + 1) % 3]))
                .or_default()
                .push(fi);
        }
    }
    map
}

/// Reject edges shared by more than two faces.
///
/// The first offending edge in face order is reported.
pub fn check_manifold_edges(faces: &[[usize; 3]]) -> Result<()> {
    let mut counts: HashMap<(usize, usize), u32> = HashMap::with_capacity(faces.len() * 2);
    for face in faces {
        for k in 0..3 {
            let key = edge_key(face[k], face[(k + 1) % 3]);
            let count = counts.entry(key).or_insert(0);
            *count += 1;
            if *count > 2 {
                return Err(RemeshError::NonManifoldEdge {
                    v0: key.0,
                    v1: key.1,
                });
            }
        }
    }
    Ok(())
}

/// Whether `face` traverses the directed edge `a -> b`.
#[inline]
fn has_directed_edge(face: &[usize; 3], a: usize, b: usize) -> bool {
    (0..3).any(|k| face[k] == a && face[(k + 1) % 3] == b)
}

/// Make face winding consistent across shared edges.
///
/// Each connected component keeps the winding of its lowest-numbered face;
/// other faces are flipped (by swapping their last two corners) to agree with
/// it. Returns the number of flipped faces.
///
/// # Errors
///
/// [`RemeshError::InconsistentWinding`] if a component is non-orientable.
/// Requires every edge to have at most two faces.
pub fn orient_faces(faces: &mut [[usize; 3]]) -> Result<usize> {
    let adjacency = edge_faces(faces);
    let mut visited = vec![false; faces.len()];
    let mut flipped = 0;
    let mut queue = VecDeque::new();

    for root in 0..faces.len() {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        queue.push_back(root);

        while let Some(f) = queue.pop_front() {
            let face = faces[f];
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                let Some(shared) = adjacency.get(&edge_key(a, b)) else {
                    continue;
                };
                for &g in shared.iter().filter(|&&g| g != f) {
                    // A consistent neighbor traverses the edge as b -> a.
                    let agrees = !has_directed_edge(&faces[g], a, b);
                    if visited[g] {
                        if !agrees {
                            return Err(RemeshError::InconsistentWinding { face: g });
                        }
                        continue;
                    }
                    if !agrees {
                        faces[g].swap(1, 2);
                        flipped += 1;
                    }
                    visited[g] = true;
                    queue.push_back(g);
                }
            }
        }
    }

    Ok(flipped)
}

/// Split vertices at which several separate face fans meet.
///
/// Corners around a vertex are grouped into fans connected through shared
/// edges. The fan containing the vertex's first corner (in face order) keeps
/// the original index; every further fan gets a fresh copy of the vertex,
/// appended to `positions`. Returns the number of vertices added.
///
/// Requires consistently oriented faces with at most two faces per edge.
pub fn split_nonmanifold_vertices(
    positions: &mut Vec<Point3<f64>>,
    faces: &mut [[usize; 3]],
) -> usize {
    let adjacency = edge_faces(faces);

    let mut corners: Vec<Vec<(usize, usize)>> = vec![Vec::new(); positions.len()];
    for (fi, face) in faces.iter().enumerate() {
        for (k, &v) in face.iter().enumerate() {
            corners[v].push((fi, k));
        }
    }

    let mut added = 0;
    for v in 0..corners.len() {
        let fan = &corners[v];
        if fan.len() < 2 {
            continue;
        }

        // Union-find over the corners of v.
        let mut parent: Vec<usize> = (0..fan.len()).collect();
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for (i, &(fi, k)) in fan.iter().enumerate() {
            let face = faces[fi];
            for w in [face[(k + 1) % 3], face[(k + 2) % 3]] {
                let Some(shared) = adjacency.get(&edge_key(v, w)) else {
                    continue;
                };
                for &g in shared.iter().filter(|&&g| g != fi) {
                    if let Some(j) = fan.iter().position(|&(gi, _)| gi == g) {
                        let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                        // Lower root wins so the first corner's fan keeps v.
                        if ri != rj {
                            parent[ri.max(rj)] = ri.min(rj);
                        }
                    }
                }
            }
        }

        let mut copy_of_root: HashMap<usize, usize> = HashMap::new();
        for i in 0..fan.len() {
            let root = find(&mut parent, i);
            if root == 0 {
                continue;
            }
            let target = *copy_of_root.entry(root).or_insert_with(|| {
                positions.push(positions[v]);
                added += 1;
                positions.len() - 1
            });
            let (fi, k) = fan[i];
            faces[fi][k] = target;
        }
    }

    added
}

/// Similarity transform mapping a mesh into a unit box around the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Bounding-box centre of the input.
    pub center: Vector3<f64>,
    /// Largest bounding-box extent of the input.
    pub scale: f64,
}

impl Normalization {
    /// Map an input-space point into normalised space.
    #[inline]
    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from((p.coords - self.center) / self.scale)
    }

    /// Map a normalised point back into input space.
    #[inline]
    pub fn restore(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(p.coords * self.scale + self.center)
    }
}

/// Centre positions on their bounding box and divide by the largest extent.
///
/// A degenerate (single point) extent leaves the scale at 1.
pub fn normalize_positions(positions: &mut [Point3<f64>]) -> Normalization {
    let Some(first) = positions.first() else {
        return Normalization {
            center: Vector3::zeros(),
            scale: 1.0,
        };
    };

    let mut min = first.coords;
    let mut max = first.coords;
    for p in positions.iter() {
        min = min.inf(&p.coords);
        max = max.sup(&p.coords);
    }

    let extent = (max - min).max();
    let norm = Normalization {
        center: (min + max) * 0.5,
        scale: if extent > 0.0 { extent } else { 1.0 },
    };

    for p in positions.iter_mut() {
        *p = norm.apply(p);
    }
    norm
}
