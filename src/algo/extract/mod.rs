//! Quad extraction from a seamless parametrization.
//!
//! Every integer point of the parametrization becomes a quad vertex. Points
//! seen from several faces (on edges, at vertices, across seams) are merged
//! through a spatial hash. Quads are found by tracing the two unit paths
//! `p → p + a → p + a + b` and `p → p + b → p + b + a` around each lattice
//! point, for the four axis directions `a` with `b` a quarter turn from `a`;
//! a quad is kept when both paths close on the same vertex.
//!
//! The result is cleaned in a fixed order: duplicates and collapsed quads
//! are dropped, quads are oriented with the surface, and quads that would
//! make an edge non-manifold are rejected greedily.
//!
//! # Example
//!
//! ```
//! use quadify::algo::extract::{extract_quads, ExtractOptions};
//! use quadify::algo::hierarchy::Hierarchy;
//! use quadify::algo::optimize::{Optimizer, SolverConfig};
//! use quadify::algo::orientation::{FeatureConstraints, FieldOptions, OrientationField};
//! use quadify::algo::parametrize::{relax, ChartLayout, Matchings, RelaxOptions};
//! use quadify::algo::scale::{ScaleField, ScaleOptions};
//! use quadify::mesh::build_from_triangles;
//! use nalgebra::Point3;
//!
//! // A 4 x 4 grid of unit squares, two triangles each.
//! let n = 4;
//! let vertices: Vec<Point3<f64>> = (0..=n)
//!     .flat_map(|j| (0..=n).map(move |i| Point3::new(i as f64, j as f64, 0.0)))
//!     .collect();
//! let mut faces = Vec::new();
//! for j in 0..n {
//!     for i in 0..n {
//!         let a = j * (n + 1) + i;
//!         faces.push([a, a + 1, a + n + 2]);
//!         faces.push([a, a + n + 2, a + n + 1]);
//!     }
//! }
//! let mesh = build_from_triangles(&vertices, &faces)?;
//!
//! let options = FieldOptions::default();
//! let hierarchy = Hierarchy::build(&mesh, options.hierarchy_floor);
//! let constraints = FeatureConstraints::detect(&mesh, false, true, options.sharp_angle());
//! let scale = ScaleField::compute(&mesh, 16, false, &ScaleOptions::default())?;
//! let field = OrientationField::compute(&mesh, &hierarchy, &constraints, &options, 0);
//!
//! let config = SolverConfig::default();
//! let optimizer = Optimizer::new(&mesh, &scale, &constraints, &config, 0);
//! let matchings = Matchings::from_field(&mesh, &field);
//! let mut layout = ChartLayout::integrate(&mesh, &field, &scale, &matchings, 0);
//! optimizer.resolve_dislocations(&mut layout);
//! let (param, _) = relax(&mesh, &field, &scale, &layout, &constraints, &RelaxOptions::default());
//!
//! if let Ok((quads, stats)) = extract_quads(&mesh, &param, &scale, &ExtractOptions::default()) {
//!     assert_eq!(stats.quads, quads.num_quads());
//!     println!("{} quads, {} traces failed", stats.quads, stats.failed_traces);
//! }
//! # Ok::<(), quadify::RemeshError>(())
//! ```

mod spatial;
mod trace;

use std::collections::{HashMap, HashSet};

use nalgebra::{Point3, Vector2, Vector3};
use rayon::prelude::*;

use self::spatial::SpatialHash;
use self::trace::{barycentric, contains, trace, Probe};
use crate::algo::parametrize::{rotate_int, rotate_real, Parametrization};
use crate::algo::scale::ScaleField;
use crate::error::{RemeshError, Result};
use crate::mesh::{FaceId, HalfEdgeMesh};

/// Options for [`extract_quads`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Merge radius for lattice points, as a fraction of the local scale.
    pub merge_epsilon: f64,
    /// Smallest kept quad area, as a fraction of the squared local scale.
    pub min_area: f64,
    /// Face crossings allowed while tracing one unit segment.
    pub max_trace_steps: usize,
    /// Barycentric slack for point-in-triangle tests.
    pub inside_epsilon: f64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            merge_epsilon: 0.25,
            min_area: 0.05,
            max_trace_steps: 64,
            inside_epsilon: 1e-6,
        }
    }
}

impl ExtractOptions {
    /// Set the merge radius fraction.
    pub fn with_merge_epsilon(mut self, epsilon: f64) -> Self {
        self.merge_epsilon = epsilon;
        self
    }

    /// Set the minimum area fraction.
    pub fn with_min_area(mut self, fraction: f64) -> Self {
        self.min_area = fraction;
        self
    }

    /// Set the trace step cap.
    pub fn with_max_trace_steps(mut self, steps: usize) -> Self {
        self.max_trace_steps = steps;
        self
    }
}

/// An indexed quad mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadMesh {
    /// Vertex positions, each referenced by at least one quad.
    pub positions: Vec<Point3<f64>>,
    /// Corner indices into `positions`, counter-clockwise seen from outside.
    pub quads: Vec<[usize; 4]>,
}

impl QuadMesh {
    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of quads.
    pub fn num_quads(&self) -> usize {
        self.quads.len()
    }
}

/// Counters collected during extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Lattice points found in face charts, before merging.
    pub lattice_points: usize,
    /// Distinct vertices after merging.
    pub merged_vertices: usize,
    /// Distinct candidate quads found by tracing.
    pub candidates: usize,
    /// Quad corners whose paths failed or did not close.
    pub failed_traces: usize,
    /// Candidates dropped for collapsed corners or tiny area.
    pub degenerate: usize,
    /// Candidates dropped to keep every edge manifold.
    pub nonmanifold: usize,
    /// Quads in the result.
    pub quads: usize,
}

/// A lattice point as seen from one face.
#[derive(Debug, Clone, Copy)]
struct Occurrence {
    face: FaceId,
    lattice: (i64, i64),
    position: Point3<f64>,
}

/// A traced quad before cleanup.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    corners: [usize; 4],
    face: FaceId,
}

/// Extract a quad mesh from `param`.
///
/// Returns [`RemeshError::EmptyResult`] when no quad survives.
pub fn extract_quads(
    mesh: &HalfEdgeMesh,
    param: &Parametrization,
    scale: &ScaleField,
    options: &ExtractOptions,
) -> Result<(QuadMesh, ExtractStats)> {
    let mut stats = ExtractStats::default();
    let eps = options.inside_epsilon;

    // Lattice points per face.
    let faces: Vec<FaceId> = mesh.face_ids().collect();
    let occurrences: Vec<Occurrence> = faces
        .par_iter()
        .map(|&f| face_lattice_points(mesh, param, f, eps))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();
    stats.lattice_points = occurrences.len();

    // Merge them into vertices.
    let max_scale = faces
        .iter()
        .map(|&f| scale.face(f))
        .fold(scale.global(), f64::max);
    let mut hash = SpatialHash::new(options.merge_epsilon * max_scale);
    let mut lookup: HashMap<(usize, i64, i64), usize> = HashMap::with_capacity(occurrences.len());
    let mut occurrence_vertex = Vec::with_capacity(occurrences.len());
    for occ in &occurrences {
        let radius = options.merge_epsilon * scale.face(occ.face);
        let id = hash.find_or_insert(occ.position, radius);
        lookup.insert((occ.face.index(), occ.lattice.0, occ.lattice.1), id);
        occurrence_vertex.push(id);
    }
    stats.merged_vertices = hash.len();

    let resolve = |probe: &Probe| -> Option<usize> {
        let (i, j) = (probe.point.x.round() as i64, probe.point.y.round() as i64);
        if let Some(&id) = lookup.get(&(probe.face.index(), i, j)) {
            return Some(id);
        }
        let snapped = Probe {
            point: Vector2::new(i as f64, j as f64),
            ..*probe
        };
        let p = snapped.position(mesh, param)?;
        hash.nearest(&p, options.merge_epsilon * scale.face(probe.face))
    };

    // Trace the cells around every occurrence.
    let traced: Vec<(Vec<Candidate>, usize)> = occurrences
        .par_iter()
        .zip(occurrence_vertex.par_iter())
        .map(|(occ, &v0)| {
            let start = Probe::new(occ.face, Vector2::new(occ.lattice.0 as f64, occ.lattice.1 as f64));
            let mut found = Vec::new();
            let mut failed = 0;
            for k in 0..4u8 {
                let a = rotate_int(&Vector2::new(1_i64, 0), k).map(|c| c as f64);
                let b = rotate_real(&a, 1);
                // Only the sector of the cell that starts inside this face.
                if !contains(param, occ.face, &(start.point + (a + b) * 1e-3), eps) {
                    continue;
                }
                match trace_cell(mesh, param, options, start, a, b, &resolve) {
                    Some([v1, v2, v3]) => found.push(Candidate {
                        corners: [v0, v1, v2, v3],
                        face: occ.face,
                    }),
                    None => failed += 1,
                }
            }
            (found, failed)
        })
        .collect();

    let mut seen: HashSet<[usize; 4]> = HashSet::new();
    let mut candidates = Vec::new();
    for (found, failed) in traced {
        stats.failed_traces += failed;
        for c in found {
            let mut key = c.corners;
            key.sort_unstable();
            if seen.insert(key) {
                candidates.push(c);
            }
        }
    }
    stats.candidates = candidates.len();

    let positions = hash.into_points();
    let mut quads = Vec::with_capacity(candidates.len());
    for c in candidates {
        let [a, b, d, e] = c.corners;
        let distinct = a != b && a != d && a != e && b != d && b != e && d != e;
        let s = scale.face(c.face);
        if !distinct || quad_area(&positions, &c.corners) < options.min_area * s * s {
            stats.degenerate += 1;
            continue;
        }
        quads.push(orient(&positions, c.corners, &mesh.face_normal(c.face)));
    }

    let (quads, rejected) = keep_manifold(quads);
    stats.nonmanifold = rejected;
    if quads.is_empty() {
        log::warn!(
            "extraction: no quads from {} lattice points ({} traces failed)",
            stats.lattice_points,
            stats.failed_traces
        );
        return Err(RemeshError::EmptyResult);
    }

    let quad_mesh = compact(positions, quads);
    stats.quads = quad_mesh.num_quads();
    log::debug!(
        "extraction: {} lattice points, {} vertices, {} candidates, {} quads ({} failed, {} degenerate, {} non-manifold)",
        stats.lattice_points,
        stats.merged_vertices,
        stats.candidates,
        stats.quads,
        stats.failed_traces,
        stats.degenerate,
        stats.nonmanifold
    );
    Ok((quad_mesh, stats))
}

/// Integer points inside the chart triangle of `f`.
fn face_lattice_points(mesh: &HalfEdgeMesh, param: &Parametrization, f: FaceId, eps: f64) -> Vec<Occurrence> {
    if param.signed_area(f) <= 0.0 {
        return Vec::new();
    }
    let uv = param.corner_uv(f);
    let min = uv[0].inf(&uv[1]).inf(&uv[2]);
    let max = uv[0].sup(&uv[1]).sup(&uv[2]);
    let pos = mesh.face_positions(f);

    let mut out = Vec::new();
    for i in (min.x - eps).ceil() as i64..=(max.x + eps).floor() as i64 {
        for j in (min.y - eps).ceil() as i64..=(max.y + eps).floor() as i64 {
            let p = Vector2::new(i as f64, j as f64);
            let Some(l) = barycentric(uv, &p) else {
                continue;
            };
            if l.iter().any(|&x| x < -eps) {
                continue;
            }
            let position = Point3::from(pos[0].coords * l[0] + pos[1].coords * l[1] + pos[2].coords * l[2]);
            out.push(Occurrence {
                face: f,
                lattice: (i, j),
                position,
            });
        }
    }
    out
}

/// Trace both unit paths around the cell spanned by `a` and `b`; returns the
/// three corners after the start when they agree.
fn trace_cell<R>(
    mesh: &HalfEdgeMesh,
    param: &Parametrization,
    options: &ExtractOptions,
    start: Probe,
    a: Vector2<f64>,
    b: Vector2<f64>,
    resolve: &R,
) -> Option<[usize; 3]>
where
    R: Fn(&Probe) -> Option<usize>,
{
    let steps = options.max_trace_steps;
    let eps = options.inside_epsilon;
    let step = |from: Probe, d: &Vector2<f64>| trace(mesh, param, from, rotate_real(d, from.rot), steps, eps);

    let p1 = step(start, &a)?;
    let p2 = step(p1, &b)?;
    let p3 = step(start, &b)?;
    let p4 = step(p3, &a)?;

    let v1 = resolve(&p1)?;
    let v2 = resolve(&p2)?;
    let v3 = resolve(&p3)?;
    (resolve(&p4)? == v2).then_some([v1, v2, v3])
}

fn quad_area(positions: &[Point3<f64>], q: &[usize; 4]) -> f64 {
    let [a, b, c, d] = q.map(|i| positions[i]);
    0.5 * ((b - a).cross(&(c - a)).norm() + (c - a).cross(&(d - a)).norm())
}

/// Reverse `q` if it winds against `normal`.
fn orient(positions: &[Point3<f64>], q: [usize; 4], normal: &Vector3<f64>) -> [usize; 4] {
    let [a, b, c, d] = q.map(|i| positions[i]);
    let n = (c - a).cross(&(d - b));
    if n.dot(normal) < 0.0 {
        [q[0], q[3], q[2], q[1]]
    } else {
        q
    }
}

/// Keep quads in order while every undirected edge has at most two quads and
/// no directed edge repeats.
fn keep_manifold(quads: Vec<[usize; 4]>) -> (Vec<[usize; 4]>, usize) {
    let mut edge_counts: HashMap<(usize, usize), usize> = HashMap::new();
    let mut directed: HashSet<(usize, usize)> = HashSet::new();
    let mut kept = Vec::with_capacity(quads.len());
    let mut rejected = 0;

    for q in quads {
        let edges: [(usize, usize); 4] = std::array::from_fn(|i| (q[i], q[(i + 1) % 4]));
        let fits = edges.iter().all(|&(v0, v1)| {
            let edge = if v0 < v1 { (v0, v1) } else { (v1, v0) };
            edge_counts.get(&edge).copied().unwrap_or(0) < 2 && !directed.contains(&(v0, v1))
        });
        if !fits {
            rejected += 1;
            continue;
        }
        for &(v0, v1) in &edges {
            let edge = if v0 < v1 { (v0, v1) } else { (v1, v0) };
            *edge_counts.entry(edge).or_insert(0) += 1;
            directed.insert((v0, v1));
        }
        kept.push(q);
    }
    (kept, rejected)
}

/// Drop unreferenced vertices, keeping the order of the rest.
fn compact(positions: Vec<Point3<f64>>, quads: Vec<[usize; 4]>) -> QuadMesh {
    let mut remap = vec![usize::MAX; positions.len()];
    for q in &quads {
        for &v in q {
            remap[v] = 0;
        }
    }
    let mut kept = Vec::new();
    for (v, slot) in remap.iter_mut().enumerate() {
        if *slot != usize::MAX {
            *slot = kept.len();
            kept.push(positions[v]);
        }
    }
    let quads = quads.into_iter().map(|q| q.map(|v| remap[v])).collect();
    QuadMesh {
        positions: kept,
        quads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::parametrize::Transition;
    use crate::algo::scale::ScaleOptions;
    use crate::mesh::test_meshes::flat_grid;

    /// Charts of a planar grid, each face placed by its own rigid lattice map.
    fn scrambled_grid(n: usize, shuffle: bool) -> (HalfEdgeMesh, Parametrization) {
        let mesh = flat_grid(n, n as f64);
        let chart = |f: FaceId| {
            if shuffle {
                let i = f.index() as i64;
                Transition::new(f.index() as i32, Vector2::new(i % 5, -(i % 3)))
            } else {
                Transition::identity()
            }
        };
        let uv = mesh
            .face_ids()
            .map(|f| {
                let map = chart(f);
                mesh.face_positions(f).map(|p| map.apply(&Vector2::new(p.x, p.y)))
            })
            .collect();
        let seams = mesh
            .edge_ids()
            .map(|e| {
                let h = mesh.edge_halfedge(e);
                if mesh.is_boundary_edge(h) {
                    return Transition::identity();
                }
                let (f, g) = mesh.adjacent_faces(h);
                chart(f).inverse().then(&chart(g))
            })
            .collect();
        (mesh, Parametrization::from_charts(uv, seams))
    }

    fn unit_scale(mesh: &HalfEdgeMesh, target: usize) -> ScaleField {
        ScaleField::compute(mesh, target, false, &ScaleOptions::default()).unwrap()
    }

    fn assert_valid(quads: &QuadMesh) {
        for q in &quads.quads {
            for &v in q {
                assert!(v < quads.num_vertices());
            }
            let mut sorted = *q;
            sorted.sort_unstable();
            assert!(sorted.windows(2).all(|w| w[0] != w[1]));
        }
    }

    #[test]
    fn test_grid_extracts_every_cell() {
        let (mesh, param) = scrambled_grid(4, false);
        let scale = unit_scale(&mesh, 16);
        let (quads, stats) = extract_quads(&mesh, &param, &scale, &ExtractOptions::default()).unwrap();
        assert_eq!(quads.num_quads(), 16);
        assert_eq!(quads.num_vertices(), 25);
        assert_eq!(stats.merged_vertices, 25);
        assert_eq!(stats.nonmanifold, 0);
        assert_valid(&quads);

        // Counter-clockwise around +z like the input.
        for q in &quads.quads {
            let [a, b, c, _] = q.map(|i| quads.positions[i]);
            assert!((b - a).cross(&(c - a)).z > 0.0);
        }
    }

    #[test]
    fn test_seams_are_followed() {
        let (mesh, param) = scrambled_grid(4, true);
        let scale = unit_scale(&mesh, 16);
        let (quads, _) = extract_quads(&mesh, &param, &scale, &ExtractOptions::default()).unwrap();
        assert_eq!(quads.num_quads(), 16);
        assert_eq!(quads.num_vertices(), 25);
        assert_valid(&quads);
    }

    #[test]
    fn test_flipped_charts_yield_nothing() {
        let mesh = flat_grid(2, 2.0);
        let uv = mesh
            .face_ids()
            .map(|f| mesh.face_positions(f).map(|p| Vector2::new(p.y, p.x)))
            .collect();
        let param = Parametrization::from_charts(uv, vec![Transition::identity(); mesh.num_edges()]);
        let scale = unit_scale(&mesh, 4);
        let err = extract_quads(&mesh, &param, &scale, &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, RemeshError::EmptyResult));
    }

    #[test]
    fn test_keep_manifold_rejects_third_quad_on_edge() {
        let quads = vec![[0, 1, 2, 3], [1, 0, 4, 5], [0, 1, 6, 7]];
        let (kept, rejected) = keep_manifold(quads);
        assert_eq!(kept.len(), 2);
        assert_eq!(rejected, 1);
    }

    #[test]
    fn test_compact_keeps_order() {
        let positions = (0..5).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let mesh = compact(positions, vec![[4, 3, 1, 0]]);
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.quads, vec![[3, 2, 1, 0]]);
        assert_eq!(mesh.positions[3].x, 4.0);
    }
}
