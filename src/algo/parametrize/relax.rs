//! Global relaxation of the integrated charts into a seamless parametrization.
//!
//! Each vertex gets one unknown `X_v` in the chart of the first face of its
//! fan; its coordinate in any other incident face is obtained through the
//! transitions crossed on the way there. Expressed like this, the
//! parametrization agrees across every edge around every vertex whose loop
//! closes. Singular vertices are pinned to the centre of their loop rotation.
//!
//! The unknowns minimise the squared mismatch between chart edge vectors and
//! the combed frame, plus a small pull towards the integrated guess that
//! keeps the system definite on every component. Feature edges fix the grid
//! coordinate running across them to a shared integer before the solve.

use nalgebra::{DVector, Vector2};
use rayon::prelude::*;

use super::integrate::{chart_vector, ChartLayout};
use super::singularity::vertex_fan;
use super::sparse::{conjugate_gradient, CsrMatrix};
use super::transition::Transition;
use crate::algo::orientation::{FeatureConstraints, OrientationField};
use crate::algo::scale::ScaleField;
use crate::error::ConvergenceWarning;
use crate::mesh::{EdgeId, FaceId, HalfEdgeId, HalfEdgeMesh, VertexId};

/// Options for [`relax`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxOptions {
    /// Conjugate gradient iteration cap.
    pub max_iterations: usize,
    /// Relative residual at which the solve stops.
    pub tolerance: f64,
    /// Weight of the pull towards the integrated coordinates.
    pub regularization: f64,
}

impl Default for RelaxOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            tolerance: 1e-10,
            regularization: 1e-4,
        }
    }
}

impl RelaxOptions {
    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the relative residual tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Seamless chart coordinates for every face corner.
#[derive(Debug, Clone)]
pub struct Parametrization {
    uv: Vec<[Vector2<f64>; 3]>,
    seams: Vec<Transition>,
    pinned: usize,
    snapped: usize,
    converged: bool,
}

impl Parametrization {
    /// Wrap per-face charts and seams that are already known to agree.
    #[cfg(test)]
    pub(crate) fn from_charts(uv: Vec<[Vector2<f64>; 3]>, seams: Vec<Transition>) -> Self {
        Self {
            uv,
            seams,
            pinned: 0,
            snapped: 0,
            converged: true,
        }
    }

    /// Chart coordinates of the corners of `f`, in grid units.
    #[inline]
    pub fn corner_uv(&self, f: FaceId) -> &[Vector2<f64>; 3] {
        &self.uv[f.index()]
    }

    /// Transition across edge `e`, oriented like its canonical half-edge.
    #[inline]
    pub fn seam(&self, e: EdgeId) -> Transition {
        self.seams[e.index()]
    }

    /// Transition from the chart of `face_of(he)` to the chart across `he`.
    pub fn crossing(&self, mesh: &HalfEdgeMesh, he: HalfEdgeId) -> Transition {
        let seam = self.seams[mesh.edge_of(he).index()];
        if mesh.is_canonical(he) {
            seam
        } else {
            seam.inverse()
        }
    }

    /// Twice the signed area of `f` in its chart.
    pub fn signed_area(&self, f: FaceId) -> f64 {
        let [a, b, c] = &self.uv[f.index()];
        let (u, v) = (b - a, c - a);
        u.x * v.y - u.y * v.x
    }

    /// Faces mapped with zero or negative orientation.
    pub fn flipped_faces(&self) -> usize {
        (0..self.uv.len())
            .filter(|&i| self.signed_area(FaceId::new(i)) <= 0.0)
            .count()
    }

    /// Vertices pinned at a rotation centre.
    #[inline]
    pub fn num_pinned(&self) -> usize {
        self.pinned
    }

    /// Vertex coordinates fixed by feature edges.
    #[inline]
    pub fn num_snapped(&self) -> usize {
        self.snapped
    }

    /// Whether the linear solve converged.
    #[inline]
    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Solve for a seamless parametrization from an integrated layout.
///
/// Returns the parametrization together with a warning when the solve hit its
/// iteration cap; the integrated coordinates (with pins and snaps applied)
/// are used in that case.
pub fn relax(
    mesh: &HalfEdgeMesh,
    field: &OrientationField,
    scale: &ScaleField,
    layout: &ChartLayout,
    constraints: &FeatureConstraints,
    options: &RelaxOptions,
) -> (Parametrization, Option<ConvergenceWarning>) {
    let nv = mesh.num_vertices();
    let corner_maps = corner_transitions(mesh, layout);

    let start: Vec<Vector2<f64>> = (0..nv)
        .map(|i| {
            let v = VertexId::new(i);
            let fan = vertex_fan(mesh, v);
            fan.faces
                .first()
                .and_then(|&f| Some(layout.integrated_uv(f)[mesh.corner_of(f, v)?]))
                .unwrap_or_else(Vector2::zeros)
        })
        .collect();

    let mut fixed: Vec<Option<f64>> = vec![None; 2 * nv];
    let snapped = snap_features(mesh, layout, constraints, &corner_maps, &start, &mut fixed);

    let mut pinned = 0;
    for v in mesh.vertex_ids() {
        let Some(loop_map) = layout.holonomy(mesh, v) else {
            continue;
        };
        if let Some(centre) = loop_map.fixed_point() {
            fixed[2 * v.index()] = Some(centre.x);
            fixed[2 * v.index() + 1] = Some(centre.y);
            pinned += 1;
        }
    }

    let mut free_index = vec![usize::MAX; 2 * nv];
    let mut num_free = 0;
    for (node, slot) in free_index.iter_mut().enumerate() {
        if fixed[node].is_none() {
            *slot = num_free;
            num_free += 1;
        }
    }
    let initial = |node: usize| start[node / 2][node % 2];

    let mut solution: Vec<f64> = (0..2 * nv).map(|n| fixed[n].unwrap_or_else(|| initial(n))).collect();
    let mut warning = None;
    let mut converged = true;

    if num_free > 0 {
        let rows: Vec<Vec<Row>> = mesh
            .face_ids()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&f| face_rows(mesh, field, scale, layout, &corner_maps, f))
            .collect();

        let mut triplets = Vec::new();
        let mut rhs = DVector::zeros(num_free);
        for row in rows.iter().flatten() {
            let beta = row.target
                - row
                    .entries
                    .iter()
                    .filter_map(|&(n, c)| fixed[n].map(|value| c * value))
                    .sum::<f64>();
            for &(n, c) in &row.entries {
                let p = free_index[n];
                if p == usize::MAX {
                    continue;
                }
                rhs[p] += c * beta;
                for &(m, d) in &row.entries {
                    let q = free_index[m];
                    if q != usize::MAX {
                        triplets.push((p, q, c * d));
                    }
                }
            }
        }
        let lambda = options.regularization;
        let mut x0 = DVector::zeros(num_free);
        for node in 0..2 * nv {
            let p = free_index[node];
            if p != usize::MAX {
                triplets.push((p, p, lambda));
                rhs[p] += lambda * initial(node);
                x0[p] = initial(node);
            }
        }

        let matrix = CsrMatrix::from_triplets(num_free, num_free, triplets);
        match conjugate_gradient(&matrix, &rhs, Some(&x0), options.max_iterations, options.tolerance) {
            Ok(x) => {
                for node in 0..2 * nv {
                    let p = free_index[node];
                    if p != usize::MAX {
                        solution[node] = x[p];
                    }
                }
            }
            Err(err) => {
                log::warn!("chart relaxation: {}", err);
                converged = false;
                warning = Some(ConvergenceWarning::RelaxationNotConverged {
                    iterations: options.max_iterations,
                });
            }
        }
    }

    let uv = mesh
        .face_ids()
        .map(|f| {
            let tri = mesh.face_triangle(f);
            let maps = &corner_maps[f.index()];
            std::array::from_fn(|c| {
                let v = tri[c].index();
                maps[c].apply(&Vector2::new(solution[2 * v], solution[2 * v + 1]))
            })
        })
        .collect();

    let param = Parametrization {
        uv,
        seams: layout.seams().to_vec(),
        pinned,
        snapped,
        converged,
    };
    log::debug!(
        "relaxation: {} free unknowns, {} pinned vertices, {} snapped coordinates, {} flipped faces",
        num_free,
        pinned,
        snapped,
        param.flipped_faces()
    );
    (param, warning)
}

/// Per face corner, the map from the vertex unknown to the face's chart.
fn corner_transitions(mesh: &HalfEdgeMesh, layout: &ChartLayout) -> Vec<[Transition; 3]> {
    let per_vertex: Vec<Vec<(FaceId, Transition)>> = (0..mesh.num_vertices())
        .into_par_iter()
        .map(|i| {
            let fan = vertex_fan(mesh, VertexId::new(i));
            let maps = layout.fan_transitions(mesh, &fan);
            fan.faces.into_iter().zip(maps).collect()
        })
        .collect();

    let mut corners = vec![[Transition::identity(); 3]; mesh.num_faces()];
    for (i, entries) in per_vertex.into_iter().enumerate() {
        let v = VertexId::new(i);
        for (f, map) in entries {
            if let Some(c) = mesh.corner_of(f, v) {
                corners[f.index()][c] = map;
            }
        }
    }
    corners
}

/// Which unknown feeds component `c` of `R^rot X`, and with which sign.
#[inline]
fn rotated_component(rot: u8, c: usize) -> (f64, usize) {
    match (rot & 3, c) {
        (0, c) => (1.0, c),
        (1, 0) => (-1.0, 1),
        (1, _) => (1.0, 0),
        (2, c) => (-1.0, c),
        (_, 0) => (1.0, 1),
        (_, _) => (-1.0, 0),
    }
}

/// One least-squares equation `Σ coef · X[node] = target`.
struct Row {
    entries: [(usize, f64); 2],
    target: f64,
}

/// Edge-vector equations of one face, two per edge.
fn face_rows(
    mesh: &HalfEdgeMesh,
    field: &OrientationField,
    scale: &ScaleField,
    layout: &ChartLayout,
    corner_maps: &[[Transition; 3]],
    f: FaceId,
) -> Vec<Row> {
    let tri = mesh.face_triangle(f);
    let pos = mesh.face_positions(f);
    let maps = &corner_maps[f.index()];
    let mut rows = Vec::with_capacity(6);
    for i in 0..3 {
        let j = (i + 1) % 3;
        let delta = chart_vector(field, scale, layout.combing(f), f, &(pos[j] - pos[i]));
        for c in 0..2 {
            let (si, pi) = rotated_component(maps[i].rot, c);
            let (sj, pj) = rotated_component(maps[j].rot, c);
            rows.push(Row {
                entries: [(2 * tri[j].index() + pj, sj), (2 * tri[i].index() + pi, -si)],
                target: delta[c] - (maps[j].t[c] - maps[i].t[c]) as f64,
            });
        }
    }
    rows
}

/// Union-find over scalar unknowns with relations `X_n = s · X_parent + d`.
struct OffsetUnionFind {
    parent: Vec<usize>,
    sign: Vec<i64>,
    offset: Vec<i64>,
}

impl OffsetUnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            sign: vec![1; n],
            offset: vec![0; n],
        }
    }

    /// Root of `i` and the relation `X_i = s · X_root + d`.
    fn find(&mut self, i: usize) -> (usize, i64, i64) {
        let mut path = Vec::new();
        let mut root = i;
        while self.parent[root] != root {
            path.push(root);
            root = self.parent[root];
        }
        for &n in path.iter().rev() {
            let p = self.parent[n];
            if p != root {
                self.offset[n] += self.sign[n] * self.offset[p];
                self.sign[n] *= self.sign[p];
                self.parent[n] = root;
            }
        }
        if i == root {
            (root, 1, 0)
        } else {
            (root, self.sign[i], self.offset[i])
        }
    }

    /// Impose `X_i = s · X_j + d`. Returns `false` on a contradiction.
    fn union(&mut self, i: usize, j: usize, s: i64, d: i64) -> bool {
        let (ri, si, di) = self.find(i);
        let (rj, sj, dj) = self.find(j);
        let sign = si * s * sj;
        let offset = si * (s * dj + d - di);
        if ri == rj {
            return sign == 1 && offset == 0;
        }
        self.parent[ri] = rj;
        self.sign[ri] = sign;
        self.offset[ri] = offset;
        true
    }
}

/// Fix the across-edge coordinate of every feature edge to a shared integer.
///
/// Returns the number of fixed scalar unknowns.
fn snap_features(
    mesh: &HalfEdgeMesh,
    layout: &ChartLayout,
    constraints: &FeatureConstraints,
    corner_maps: &[[Transition; 3]],
    start: &[Vector2<f64>],
    fixed: &mut [Option<f64>],
) -> usize {
    let nodes = fixed.len();
    let mut groups = OffsetUnionFind::new(nodes);
    let mut member = vec![false; nodes];
    let mut conflicts = 0usize;

    for e in mesh.edge_ids().filter(|&e| constraints.is_feature(e)) {
        let mut h = mesh.edge_halfedge(e);
        if !mesh.face_of(h).is_valid() {
            h = mesh.twin(h);
        }
        let f = mesh.face_of(h);
        let (a, b) = (mesh.origin(h), mesh.dest(h));
        let (Some(ca), Some(cb)) = (mesh.corner_of(f, a), mesh.corner_of(f, b)) else {
            continue;
        };
        let uv = layout.integrated_uv(f);
        let along = uv[cb] - uv[ca];
        let c = if along.x.abs() >= along.y.abs() { 1 } else { 0 };

        let (ta, tb) = (corner_maps[f.index()][ca], corner_maps[f.index()][cb]);
        let (sa, pa) = rotated_component(ta.rot, c);
        let (sb, pb) = rotated_component(tb.rot, c);
        let (sa, sb) = (sa as i64, sb as i64);
        let na = 2 * a.index() + pa;
        let nb = 2 * b.index() + pb;
        if groups.union(na, nb, sa * sb, sa * (tb.t[c] - ta.t[c])) {
            member[na] = true;
            member[nb] = true;
        } else {
            conflicts += 1;
        }
    }
    if conflicts > 0 {
        log::debug!("feature snapping: {} contradictory edges skipped", conflicts);
    }

    // Agree on one integer per group from the integrated guesses.
    let mut sum = vec![0.0; nodes];
    let mut count = vec![0usize; nodes];
    for n in (0..nodes).filter(|&n| member[n]) {
        let (root, s, d) = groups.find(n);
        sum[root] += s as f64 * (start[n / 2][n % 2] - d as f64);
        count[root] += 1;
    }
    let mut snapped = 0;
    for n in (0..nodes).filter(|&n| member[n]) {
        let (root, s, d) = groups.find(n);
        let value = (sum[root] / count[root] as f64).round();
        fixed[n] = Some(s as f64 * value + d as f64);
        snapped += 1;
    }
    snapped
}
