//! Seeded integration of the cross field into per-face chart coordinates.
//!
//! A breadth-first walk over the face graph, starting at a face drawn from
//! the caller's seed, "combs" the field: every face's frame is rotated by a
//! whole number of quarter turns so that it agrees with its parent across the
//! edge it was reached through. Chart coordinates are then laid out face by
//! face in grid units (`scale` per unit), copying the shared corners from the
//! parent and placing the third corner from the face's own frame.
//!
//! Edges of the walk carry the identity transition. Every other interior edge
//! is a seam; its transition keeps the combed rotation and rounds the
//! translation measured between the two independently placed sides.

use nalgebra::{Vector2, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

use super::singularity::{vertex_fan, Fan, Matchings};
use super::transition::{rotate_int, rotate_real, Transition};
use crate::algo::orientation::OrientationField;
use crate::algo::scale::ScaleField;
use crate::mesh::{EdgeId, FaceId, HalfEdgeId, HalfEdgeMesh, VertexId};

/// Offset mixed into the caller seed for the walk root.
const SEED_STREAM: u64 = 0x7061_7261_6d65;

/// A regular vertex around which the grid does not close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dislocation {
    /// The vertex.
    pub vertex: VertexId,
    /// Translation left over after one loop around it, in grid units.
    pub offset: Vector2<i64>,
}

/// Combed frames, seam transitions and integrated corner coordinates.
#[derive(Debug, Clone)]
pub struct ChartLayout {
    combing: Vec<i32>,
    seams: Vec<Transition>,
    walk_edges: Vec<bool>,
    uv: Vec<[Vector2<f64>; 3]>,
}

impl ChartLayout {
    /// Integrate the field over every connected component of `mesh`.
    pub fn integrate(
        mesh: &HalfEdgeMesh,
        field: &OrientationField,
        scale: &ScaleField,
        matchings: &Matchings,
        seed: u64,
    ) -> Self {
        let num_faces = mesh.num_faces();
        let mut combing = vec![0i32; num_faces];
        let mut visited = vec![false; num_faces];
        let mut walk_edges = vec![false; mesh.num_edges()];
        let mut uv = vec![[Vector2::zeros(); 3]; num_faces];

        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ SEED_STREAM);
        let first = if num_faces > 0 {
            rng.gen_range(0..num_faces)
        } else {
            0
        };

        let mut queue = VecDeque::new();
        let mut components = 0usize;
        for root in std::iter::once(first).chain(0..num_faces) {
            if root >= num_faces || visited[root] {
                continue;
            }
            components += 1;
            visited[root] = true;
            let rf = FaceId::new(root);
            let [p0, p1, p2] = mesh.face_positions(rf);
            uv[root] = [
                Vector2::zeros(),
                chart_vector(field, scale, 0, rf, &(p1 - p0)),
                chart_vector(field, scale, 0, rf, &(p2 - p0)),
            ];
            queue.push_back(rf);

            while let Some(f) = queue.pop_front() {
                for (i, h) in mesh.face_halfedge_array(f).into_iter().enumerate() {
                    let tw = mesh.twin(h);
                    let g = mesh.face_of(tw);
                    if !g.is_valid() || visited[g.index()] {
                        continue;
                    }
                    visited[g.index()] = true;
                    walk_edges[mesh.edge_of(h).index()] = true;
                    let cg = (combing[f.index()] - matchings.rotation_across(mesh, h)).rem_euclid(4);
                    combing[g.index()] = cg;

                    // `tw` runs b -> a inside g.
                    let j = corner_index(mesh, g, tw);
                    let uv_a = uv[f.index()][i];
                    let uv_b = uv[f.index()][(i + 1) % 3];
                    let [_, _, pc] = rotate3(mesh.face_positions(g), j);
                    let pa = *mesh.position(mesh.origin(h));
                    let pb = *mesh.position(mesh.dest(h));
                    let from_a = uv_a + chart_vector(field, scale, cg, g, &(pc - pa));
                    let from_b = uv_b + chart_vector(field, scale, cg, g, &(pc - pb));

                    let mut corners = [Vector2::zeros(); 3];
                    corners[j] = uv_b;
                    corners[(j + 1) % 3] = uv_a;
                    corners[(j + 2) % 3] = (from_a + from_b) * 0.5;
                    uv[g.index()] = corners;
                    queue.push_back(g);
                }
            }
        }

        let seams = (0..mesh.num_edges())
            .map(|i| {
                let e = EdgeId::new(i);
                let h = mesh.edge_halfedge(e);
                let (f, g) = mesh.adjacent_faces(h);
                if !f.is_valid() || !g.is_valid() {
                    return Transition::identity();
                }
                let combed = matchings.rotation(e) + combing[g.index()] - combing[f.index()];
                let rot = Transition::rotation(-combed);
                if walk_edges[i] {
                    return rot;
                }
                let (a, b) = (mesh.origin(h), mesh.dest(h));
                let mut gap = Vector2::zeros();
                for v in [a, b] {
                    let (Some(cf), Some(cg)) = (mesh.corner_of(f, v), mesh.corner_of(g, v)) else {
                        continue;
                    };
                    gap += uv[g.index()][cg] - rotate_real(&uv[f.index()][cf], rot.rot);
                }
                let t = (gap * 0.5).map(|c| c.round() as i64);
                Transition { rot: rot.rot, t }
            })
            .collect();

        let layout = Self {
            combing,
            seams,
            walk_edges,
            uv,
        };
        log::debug!(
            "integration: {} components, {} seam edges",
            components,
            layout.num_seam_edges(mesh)
        );
        layout
    }

    /// Quarter turns applied to a face's field direction to obtain its
    /// chart's `u` axis.
    #[inline]
    pub fn combing(&self, f: FaceId) -> i32 {
        self.combing[f.index()]
    }

    /// Transition from the chart of the canonical half-edge's face to the
    /// chart across edge `e`.
    #[inline]
    pub fn seam(&self, e: EdgeId) -> Transition {
        self.seams[e.index()]
    }

    /// All seam transitions by edge.
    #[inline]
    pub fn seams(&self) -> &[Transition] {
        &self.seams
    }

    /// Transition from the chart of `face_of(he)` to the chart of
    /// `face_of(twin(he))`.
    pub fn crossing(&self, mesh: &HalfEdgeMesh, he: HalfEdgeId) -> Transition {
        let seam = self.seams[mesh.edge_of(he).index()];
        if mesh.is_canonical(he) {
            seam
        } else {
            seam.inverse()
        }
    }

    /// Integrated chart coordinates of the corners of `f`.
    #[inline]
    pub fn integrated_uv(&self, f: FaceId) -> &[Vector2<f64>; 3] {
        &self.uv[f.index()]
    }

    /// Whether the integration walk crossed edge `e`.
    #[inline]
    pub fn is_walk_edge(&self, e: EdgeId) -> bool {
        self.walk_edges[e.index()]
    }

    /// Interior edges not crossed by the walk.
    pub fn num_seam_edges(&self, mesh: &HalfEdgeMesh) -> usize {
        mesh.edge_ids()
            .filter(|&e| !self.walk_edges[e.index()] && !mesh.is_boundary_edge(mesh.edge_halfedge(e)))
            .count()
    }

    /// Transition accumulated by one loop around an interior vertex, starting
    /// and ending in the chart of its first fan face. `None` on the boundary.
    pub fn holonomy(&self, mesh: &HalfEdgeMesh, v: VertexId) -> Option<Transition> {
        let fan = vertex_fan(mesh, v);
        fan.closed.then(|| self.loop_transition(mesh, &fan))
    }

    fn loop_transition(&self, mesh: &HalfEdgeMesh, fan: &Fan) -> Transition {
        fan.crossings
            .iter()
            .fold(Transition::identity(), |acc, &h| acc.then(&self.crossing(mesh, h)))
    }

    /// Maps from the chart of `fan.faces[0]` to the chart of each fan face.
    pub(crate) fn fan_transitions(&self, mesh: &HalfEdgeMesh, fan: &Fan) -> Vec<Transition> {
        let mut maps = Vec::with_capacity(fan.faces.len());
        let mut acc = Transition::identity();
        maps.push(acc);
        for &h in fan.crossings.iter().take(fan.faces.len().saturating_sub(1)) {
            acc = acc.then(&self.crossing(mesh, h));
            maps.push(acc);
        }
        maps
    }

    /// Regular interior vertices whose loop leaves a translation.
    pub fn dislocations(&self, mesh: &HalfEdgeMesh) -> Vec<Dislocation> {
        mesh.vertex_ids()
            .filter_map(|v| {
                let loop_map = self.holonomy(mesh, v)?;
                (loop_map.rot == 0 && loop_map.t != Vector2::zeros()).then_some(Dislocation {
                    vertex: v,
                    offset: loop_map.t,
                })
            })
            .collect()
    }

    /// Add `delta` to the translation of the seam across `e`.
    pub(crate) fn shift_translation(&mut self, e: EdgeId, delta: Vector2<i64>) {
        self.seams[e.index()].t += delta;
    }

    /// Cancel the dislocation at `origin(he)` by changing the translation of
    /// the edge of `he`; the offset reappears at `dest(he)`.
    ///
    /// Returns `false` (and changes nothing) when `origin(he)` has no
    /// dislocation.
    pub(crate) fn push_dislocation(&mut self, mesh: &HalfEdgeMesh, he: HalfEdgeId) -> bool {
        let v = mesh.origin(he);
        let fan = vertex_fan(mesh, v);
        if !fan.closed {
            return false;
        }
        let loop_map = self.loop_transition(mesh, &fan);
        if loop_map.rot != 0 || loop_map.t == Vector2::zeros() {
            return false;
        }
        let Some(pos) = fan.crossings.iter().position(|&h| h == he) else {
            return false;
        };
        let after = fan.crossings[pos + 1..]
            .iter()
            .fold(Transition::identity(), |acc, &h| acc.then(&self.crossing(mesh, h)));
        let delta = rotate_int(&(-loop_map.t), (4 - after.rot) & 3);

        let e = mesh.edge_of(he).index();
        let seam = &mut self.seams[e];
        if mesh.is_canonical(he) {
            seam.t += delta;
        } else {
            seam.t -= rotate_int(&delta, seam.rot);
        }
        true
    }
}

/// Index of `he` among the half-edges of `f`.
fn corner_index(mesh: &HalfEdgeMesh, f: FaceId, he: HalfEdgeId) -> usize {
    mesh.face_halfedge_array(f)
        .iter()
        .position(|&h| h == he)
        .unwrap_or(0)
}

/// Rotate a corner triple so that corner `j` comes first.
fn rotate3<T: Copy>(a: [T; 3], j: usize) -> [T; 3] {
    [a[j % 3], a[(j + 1) % 3], a[(j + 2) % 3]]
}

/// Coordinates of a 3D tangent vector in the combed chart of `f`, in grid
/// units.
pub(crate) fn chart_vector(
    field: &OrientationField,
    scale: &ScaleField,
    combing: i32,
    f: FaceId,
    v: &Vector3<f64>,
) -> Vector2<f64> {
    let (d, b) = field.frame(f, combing);
    Vector2::new(d.dot(v), b.dot(v)) / scale.face(f)
}
