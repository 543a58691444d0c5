//! Gauss-Seidel sweeps for the cross field.
//!
//! Nodes are greedily coloured so that no two neighbours share a colour.
//! A sweep visits the colours in order and updates every node of one colour
//! in parallel from the current directions of its neighbours. Nodes of one
//! colour never read each other, so the result does not depend on how rayon
//! splits the work.
//!
//! The loop stops once no direction moved by more than the angle tolerance
//! and the field energy `Σ w |q_i - R^k q_j|²` dropped by less than the
//! relative energy tolerance in the last sweep.

use std::collections::VecDeque;

use nalgebra::Vector3;
use rayon::prelude::*;

use super::rosy::{best_rotation, project_tangent, rosy_angle, rotate_quarter, transport};
use crate::algo::hierarchy::Level;
use crate::mesh::{FaceId, HalfEdgeMesh};

/// Energies below this count as zero when testing the relative decrease.
const ENERGY_FLOOR: f64 = 1e-12;

/// Stopping rule of a smoothing loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SweepLimits {
    pub max_iterations: usize,
    /// Largest per-node change (radians) of a converged sweep.
    pub tolerance: f64,
    /// Largest relative energy decrease of a converged sweep.
    pub energy_tolerance: f64,
}

/// Outcome of a bounded smoothing loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStats {
    /// Number of nodes smoothed.
    pub nodes: usize,
    /// Sweeps performed.
    pub iterations: usize,
    /// Largest per-node change (radians) in the last sweep.
    pub max_change: f64,
    /// Field energy after the last sweep.
    pub energy: f64,
    /// Whether both the change and the energy decrease fell below their
    /// tolerances.
    pub converged: bool,
}

impl SweepStats {
    pub(crate) fn empty() -> Self {
        Self {
            nodes: 0,
            iterations: 0,
            max_change: 0.0,
            energy: 0.0,
            converged: true,
        }
    }
}

/// Combine neighbour directions, each matched to the running estimate.
///
/// The first neighbour replaces the estimate outright, so the node's own
/// direction only decides how the first neighbour is matched.
fn matched_average(
    q: &Vector3<f64>,
    n: &Vector3<f64>,
    neighbours: impl Iterator<Item = (Vector3<f64>, f64)>,
) -> Vector3<f64> {
    let mut estimate = *q;
    let mut total = 0.0;
    for (t, w) in neighbours {
        let k = best_rotation(&estimate, &t, n);
        let sum = estimate * total + rotate_quarter(&t, n, k) * w;
        estimate = match project_tangent(&sum, n).try_normalize(1e-12) {
            Some(dir) => dir,
            None => estimate,
        };
        total += w;
    }
    estimate
}

/// Fill the nodes of a level that carry no information from their filled
/// neighbours, breadth first from the informed ones.
///
/// A connected part with no informed node keeps the direction of its first
/// node and fills outwards from there.
pub(crate) fn fill_uninformed(level: &Level, directions: &mut [Vector3<f64>], informed: &[bool]) {
    let n = level.len();
    let mut known = informed.to_vec();
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| known[i]).collect();

    let mut next_root = 0;
    loop {
        while let Some(u) = queue.pop_front() {
            for link in level.neighbors(u) {
                let v = link.target as usize;
                if known[v] {
                    continue;
                }
                let normal = &level.normals[v];
                let filled = level
                    .neighbors(v)
                    .iter()
                    .filter(|l| known[l.target as usize])
                    .map(|l| {
                        let j = l.target as usize;
                        (transport(&directions[j], &level.normals[j], normal), l.weight)
                    });
                let seed = transport(&directions[u], &level.normals[u], normal);
                let dir = matched_average(&seed, normal, filled);
                directions[v] = dir;
                known[v] = true;
                queue.push_back(v);
            }
        }
        while next_root < n && known[next_root] {
            next_root += 1;
        }
        if next_root == n {
            break;
        }
        known[next_root] = true;
        queue.push_back(next_root);
    }
}

/// Greedy colouring in node order.
fn greedy_colors(n: usize, neighbours: impl Fn(usize) -> Vec<usize>) -> Vec<Vec<usize>> {
    let mut color = vec![usize::MAX; n];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        let used: Vec<usize> = neighbours(i)
            .into_iter()
            .map(|j| color[j])
            .filter(|&c| c != usize::MAX)
            .collect();
        let c = (0..).find(|c| !used.contains(c)).unwrap_or(0);
        if c == groups.len() {
            groups.push(Vec::new());
        }
        groups[c].push(i);
        color[i] = c;
    }
    groups
}

/// Neighbour directions of a level node, carried into its plane.
fn level_neighbours<'a>(
    level: &'a Level,
    i: usize,
    current: &'a [Vector3<f64>],
) -> impl Iterator<Item = (Vector3<f64>, f64)> + 'a {
    let n = &level.normals[i];
    level.neighbors(i).iter().map(move |link| {
        let j = link.target as usize;
        (transport(&current[j], &level.normals[j], n), link.weight)
    })
}

/// Smooth the directions of one hierarchy level with free matchings.
pub(crate) fn smooth_level(
    level: &Level,
    directions: &mut [Vector3<f64>],
    locked: &[bool],
    limits: SweepLimits,
) -> SweepStats {
    let normals = &level.normals;
    let colors = greedy_colors(level.len(), |i| {
        level.neighbors(i).iter().map(|l| l.target as usize).collect()
    });
    run_sweeps(
        normals,
        directions,
        &colors,
        limits,
        |i, current| {
            if locked[i] {
                return current[i];
            }
            matched_average(&current[i], &normals[i], level_neighbours(level, i, current))
        },
        |i, current| {
            let (q, n) = (&current[i], &normals[i]);
            level_neighbours(level, i, current)
                .map(|(t, w)| (q - rotate_quarter(&t, n, best_rotation(q, &t, n))).norm_squared() * w)
                .sum()
        },
    )
}

/// Neighbour directions of a face, carried into its plane and rotated by the
/// fixed matching of the shared edge.
fn matched_neighbours<'a>(
    mesh: &'a HalfEdgeMesh,
    normals: &'a [Vector3<f64>],
    rotations: &'a [i32],
    i: usize,
    current: &'a [Vector3<f64>],
) -> impl Iterator<Item = Vector3<f64>> + 'a {
    let n = &normals[i];
    mesh.face_halfedges(FaceId::new(i)).filter_map(move |he| {
        let g = mesh.face_of(mesh.twin(he));
        if !g.is_valid() {
            return None;
        }
        let m = rotations[mesh.edge_of(he).index()];
        let m_fg = if mesh.is_canonical(he) { m } else { -m };
        let t = transport(&current[g.index()], &normals[g.index()], n);
        Some(rotate_quarter(&t, n, -m_fg))
    })
}

/// Smooth face directions with the matching of every interior edge held
/// fixed.
///
/// `rotations[e]` is the number of quarter turns from the face of the
/// canonical half-edge of `e` to the face across it.
pub(crate) fn smooth_with_matchings(
    mesh: &HalfEdgeMesh,
    normals: &[Vector3<f64>],
    directions: &mut [Vector3<f64>],
    locked: &[bool],
    rotations: &[i32],
    limits: SweepLimits,
) -> SweepStats {
    let colors = greedy_colors(mesh.num_faces(), |i| {
        mesh.face_halfedges(FaceId::new(i))
            .map(|he| mesh.face_of(mesh.twin(he)))
            .filter(|g| g.is_valid())
            .map(|g| g.index())
            .collect()
    });
    run_sweeps(
        normals,
        directions,
        &colors,
        limits,
        |i, current| {
            if locked[i] {
                return current[i];
            }
            let sum: Vector3<f64> = matched_neighbours(mesh, normals, rotations, i, current).sum();
            project_tangent(&sum, &normals[i])
                .try_normalize(1e-12)
                .unwrap_or(current[i])
        },
        |i, current| {
            matched_neighbours(mesh, normals, rotations, i, current)
                .map(|t| (current[i] - t).norm_squared())
                .sum()
        },
    )
}

fn run_sweeps<U, E>(
    normals: &[Vector3<f64>],
    directions: &mut [Vector3<f64>],
    colors: &[Vec<usize>],
    limits: SweepLimits,
    update: U,
    local_energy: E,
) -> SweepStats
where
    U: Fn(usize, &[Vector3<f64>]) -> Vector3<f64> + Sync,
    E: Fn(usize, &[Vector3<f64>]) -> f64 + Sync,
{
    let nodes = directions.len();
    // Summed in node order so the stopping test is reproducible.
    let energy = |current: &[Vector3<f64>]| -> f64 {
        let per_node: Vec<f64> = (0..nodes).into_par_iter().map(|i| local_energy(i, current)).collect();
        per_node.iter().sum()
    };
    let mut stats = SweepStats {
        nodes,
        iterations: 0,
        max_change: 0.0,
        energy: energy(&*directions),
        converged: nodes == 0,
    };
    if nodes == 0 {
        return stats;
    }

    for iteration in 0..limits.max_iterations {
        let mut max_change: f64 = 0.0;
        for group in colors {
            let current: &[Vector3<f64>] = &*directions;
            let updated: Vec<Vector3<f64>> = group.par_iter().map(|&i| update(i, current)).collect();
            for (&i, q) in group.iter().zip(updated) {
                max_change = max_change.max(rosy_angle(&q, &directions[i], &normals[i]));
                directions[i] = q;
            }
        }

        let previous = stats.energy;
        stats.energy = energy(&*directions);
        stats.iterations = iteration + 1;
        stats.max_change = max_change;
        let settled = (previous - stats.energy).abs() < limits.energy_tolerance * previous.max(ENERGY_FLOOR);
        if max_change < limits.tolerance && settled {
            stats.converged = true;
            break;
        }
    }
    stats
}
