//! Edge matchings and vertex singularity indices.
//!
//! The matching of an interior edge is the number of quarter turns relating
//! the crosses on its two faces. Angles are measured against the shared edge
//! in each face, so the comparison needs no extra transport. Walking once
//! around a vertex, the leftover rotation plus the angle defect is a whole
//! number of quarter turns: the vertex index. Moving one unit of matching
//! along an edge moves one quarter of index between its endpoints, which is
//! what the optimizer exploits.

use std::f64::consts::{FRAC_PI_2, TAU};

use rayon::prelude::*;

use crate::algo::orientation::rosy::{angle_in_frame, quarter_turns, wrap_angle};
use crate::algo::orientation::OrientationField;
use crate::mesh::{EdgeId, FaceId, HalfEdgeId, HalfEdgeMesh, VertexId};

/// Faces around a vertex and the half-edges crossed between them.
///
/// `crossings[i]` leaves `v`, has `faces[i]` on its left and
/// `faces[(i + 1) % len]` across it. Boundary fans are open: the crossing
/// from the last face back to the first does not exist.
#[derive(Debug, Clone)]
pub(crate) struct Fan {
    pub faces: Vec<FaceId>,
    pub crossings: Vec<HalfEdgeId>,
    pub closed: bool,
}

/// Collect the fan of faces around `v`.
pub(crate) fn vertex_fan(mesh: &HalfEdgeMesh, v: VertexId) -> Fan {
    let outgoing: Vec<HalfEdgeId> = mesh.vertex_halfedges(v).collect();
    if mesh.is_boundary_vertex(v) {
        // The first outgoing half-edge is the boundary one.
        let interior = outgoing.get(1..).unwrap_or(&[]);
        let faces = interior.iter().map(|&h| mesh.face_of(h)).collect();
        let crossings = interior[..interior.len().saturating_sub(1)].to_vec();
        Fan {
            faces,
            crossings,
            closed: false,
        }
    } else {
        Fan {
            faces: outgoing.iter().map(|&h| mesh.face_of(h)).collect(),
            crossings: outgoing,
            closed: true,
        }
    }
}

/// Quarter-turn matching of every interior edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Matchings {
    rotation: Vec<i32>,
    angle: Vec<f64>,
}

impl Matchings {
    /// Round the field's angle difference across every interior edge.
    pub fn from_field(mesh: &HalfEdgeMesh, field: &OrientationField) -> Self {
        let angle = edge_angles(mesh, field);
        let rotation = angle.iter().map(|&a| quarter_turns(a)).collect();
        Self { rotation, angle }
    }

    /// Re-measure the angles after the field changed, keeping the matchings.
    ///
    /// Each angle moves to the value nearest its previous one, so vertex
    /// indices only change through the matchings.
    pub fn refresh_angles(&mut self, mesh: &HalfEdgeMesh, field: &OrientationField) {
        for (angle, fresh) in self.angle.iter_mut().zip(edge_angles(mesh, field)) {
            *angle += wrap_angle(fresh - *angle);
        }
    }

    /// Quarter turns from the face of the canonical half-edge to the face
    /// across it.
    #[inline]
    pub fn rotation(&self, e: EdgeId) -> i32 {
        self.rotation[e.index()]
    }

    /// Quarter turns across a half-edge, from its face to its twin's face.
    #[inline]
    pub fn rotation_across(&self, mesh: &HalfEdgeMesh, he: HalfEdgeId) -> i32 {
        let m = self.rotation[mesh.edge_of(he).index()];
        if mesh.is_canonical(he) {
            m
        } else {
            -m
        }
    }

    /// All matchings, indexed by edge.
    #[inline]
    pub fn rotations(&self) -> &[i32] {
        &self.rotation
    }

    /// Add `delta` quarter turns to the matching of `e`.
    pub fn shift(&mut self, e: EdgeId, delta: i32) {
        self.rotation[e.index()] += delta;
    }

    /// Angle left over after removing the matching.
    ///
    /// Not wrapped: shifting a matching by `k` moves the residual by exactly
    /// `k` quarter turns.
    #[inline]
    pub fn residual(&self, e: EdgeId) -> f64 {
        self.angle[e.index()] - self.rotation[e.index()] as f64 * FRAC_PI_2
    }
}

fn edge_angles(mesh: &HalfEdgeMesh, field: &OrientationField) -> Vec<f64> {
    (0..mesh.num_edges())
        .into_par_iter()
        .map(|i| {
            let he = mesh.edge_halfedge(EdgeId::new(i));
            let (f, g) = mesh.adjacent_faces(he);
            if !f.is_valid() || !g.is_valid() {
                return 0.0;
            }
            let Some(e) = mesh.edge_vector(he).try_normalize(1e-300) else {
                return 0.0;
            };
            let theta_f = angle_in_frame(&field.direction(f), &e, &field.normal(f));
            let theta_g = angle_in_frame(&field.direction(g), &e, &field.normal(g));
            wrap_angle(theta_g - theta_f)
        })
        .collect()
}

/// A vertex whose cross field does not close up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Singularity {
    /// The vertex.
    pub vertex: VertexId,
    /// Index in quarter turns; +1 is a valence-3 corner, -1 valence 5.
    pub quarters: i32,
}

/// Indices of every vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct SingularityReport {
    quarters: Vec<i32>,
    boundary_turning: Vec<f64>,
    boundary: Vec<bool>,
}

impl SingularityReport {
    /// Index of an interior vertex in quarter turns (0 on the boundary).
    #[inline]
    pub fn quarters(&self, v: VertexId) -> i32 {
        self.quarters[v.index()]
    }

    /// Fractional turning of the field along the boundary at `v`, in turns
    /// (0 for interior vertices).
    #[inline]
    pub fn boundary_turning(&self, v: VertexId) -> f64 {
        self.boundary_turning[v.index()]
    }

    /// Interior vertices with a non-zero index, by vertex id.
    pub fn singularities(&self) -> Vec<Singularity> {
        self.quarters
            .iter()
            .enumerate()
            .filter(|&(_, &q)| q != 0)
            .map(|(i, &q)| Singularity {
                vertex: VertexId::new(i),
                quarters: q,
            })
            .collect()
    }

    /// Number of singular interior vertices.
    pub fn count(&self) -> usize {
        self.quarters.iter().filter(|&&q| q != 0).count()
    }

    /// Sum of interior indices (in turns) plus boundary turning.
    ///
    /// Equals the Euler characteristic of the surface.
    pub fn defect_sum(&self) -> f64 {
        let interior: i64 = self.quarters.iter().map(|&q| q as i64).sum();
        let boundary: f64 = self.boundary_turning.iter().sum();
        interior as f64 / 4.0 + boundary
    }

    /// Whether `v` is a boundary vertex.
    #[inline]
    pub fn is_boundary(&self, v: VertexId) -> bool {
        self.boundary[v.index()]
    }
}

/// Rotation of the cross field around `v` left over by the matchings.
///
/// A whole number of quarter turns for interior vertices.
pub(crate) fn vertex_turning(mesh: &HalfEdgeMesh, matchings: &Matchings, fan: &Fan, v: VertexId) -> f64 {
    // The fan turns clockwise, so the residuals carry the corner angles with
    // the opposite sign to the defect.
    let residuals: f64 = fan
        .crossings
        .iter()
        .map(|&h| {
            let r = matchings.residual(mesh.edge_of(h));
            if mesh.is_canonical(h) {
                r
            } else {
                -r
            }
        })
        .sum();
    mesh.angle_defect(v) - residuals
}

/// Compute the index of every vertex from the matchings.
pub fn find_singularities(mesh: &HalfEdgeMesh, matchings: &Matchings) -> SingularityReport {
    let per_vertex: Vec<(i32, f64, bool)> = (0..mesh.num_vertices())
        .into_par_iter()
        .map(|i| {
            let v = VertexId::new(i);
            let fan = vertex_fan(mesh, v);
            let turning = vertex_turning(mesh, matchings, &fan, v);
            if fan.closed {
                ((turning / FRAC_PI_2).round() as i32, 0.0, false)
            } else {
                (0, turning / TAU, true)
            }
        })
        .collect();

    let report = SingularityReport {
        quarters: per_vertex.iter().map(|p| p.0).collect(),
        boundary_turning: per_vertex.iter().map(|p| p.1).collect(),
        boundary: per_vertex.iter().map(|p| p.2).collect(),
    };
    log::debug!(
        "singularities: {} singular vertices, defect sum {:.3}",
        report.count(),
        report.defect_sum()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::hierarchy::Hierarchy;
    use crate::algo::orientation::{FeatureConstraints, FieldOptions};
    use crate::mesh::test_meshes::{cube, flat_grid, icosphere, open_cylinder};

    fn field(mesh: &HalfEdgeMesh, boundary: bool, seed: u64) -> OrientationField {
        let options = FieldOptions::default();
        let hierarchy = Hierarchy::build(mesh, options.hierarchy_floor);
        let constraints = FeatureConstraints::detect(mesh, false, boundary, options.sharp_angle());
        OrientationField::compute(mesh, &hierarchy, &constraints, &options, seed)
    }

    #[test]
    fn test_fan_shapes() {
        let mesh = flat_grid(2, 1.0);
        let center = vertex_fan(&mesh, VertexId::new(4));
        assert!(center.closed);
        assert_eq!(center.faces.len(), center.crossings.len());

        let corner = vertex_fan(&mesh, VertexId::new(0));
        assert!(!corner.closed);
        assert_eq!(corner.crossings.len() + 1, corner.faces.len());
        for (i, &h) in corner.crossings.iter().enumerate() {
            assert_eq!(mesh.face_of(h), corner.faces[i]);
            assert_eq!(mesh.face_of(mesh.twin(h)), corner.faces[i + 1]);
        }
    }

    #[test]
    fn test_interior_turning_is_whole_quarters() {
        let mesh = icosphere(2);
        for seed in [0, 1, 2] {
            let matchings = Matchings::from_field(&mesh, &field(&mesh, false, seed));
            for v in mesh.vertex_ids() {
                let fan = vertex_fan(&mesh, v);
                let quarters = vertex_turning(&mesh, &matchings, &fan, v) / FRAC_PI_2;
                assert!((quarters - quarters.round()).abs() < 1e-9, "seed {} vertex {:?}: {}", seed, v, quarters);
            }
        }
    }

    #[test]
    fn test_refresh_keeps_indices() {
        let mesh = icosphere(1);
        let f = field(&mesh, false, 3);
        let mut matchings = Matchings::from_field(&mesh, &f);
        let before = find_singularities(&mesh, &matchings);
        matchings.refresh_angles(&mesh, &f);
        assert_eq!(find_singularities(&mesh, &matchings), before);
    }

    #[test]
    fn test_cube_corners_are_valence_three() {
        let mesh = cube();
        let matchings = Matchings::from_field(&mesh, &field(&mesh, false, 0));
        let report = find_singularities(&mesh, &matchings);

        assert_eq!(report.count(), 8);
        for s in report.singularities() {
            assert_eq!(s.quarters, 1);
        }
        assert!((report.defect_sum() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_sphere_defect_sum_for_any_seed() {
        let mesh = icosphere(2);
        for seed in [0, 1, 2] {
            let matchings = Matchings::from_field(&mesh, &field(&mesh, false, seed));
            let report = find_singularities(&mesh, &matchings);
            assert!((report.defect_sum() - 2.0).abs() < 1e-9, "seed {}", seed);
        }
    }

    #[test]
    fn test_boundary_locked_grid() {
        let mesh = flat_grid(6, 1.0);
        let matchings = Matchings::from_field(&mesh, &field(&mesh, true, 0));
        let report = find_singularities(&mesh, &matchings);

        assert_eq!(report.count(), 0);
        let corner = report.boundary_turning(VertexId::new(0));
        assert!((corner - 0.25).abs() < 1e-6);
        assert!((report.defect_sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cylinder_defect_sum_is_zero() {
        let mesh = open_cylinder(12, 4);
        let matchings = Matchings::from_field(&mesh, &field(&mesh, false, 5));
        let report = find_singularities(&mesh, &matchings);
        assert!(report.defect_sum().abs() < 1e-9);
    }

    #[test]
    fn test_shifting_a_matching_moves_index() {
        let mesh = icosphere(1);
        let mut matchings = Matchings::from_field(&mesh, &field(&mesh, false, 0));
        let before = find_singularities(&mesh, &matchings);

        let e = EdgeId::new(0);
        let he = mesh.edge_halfedge(e);
        let (a, b) = (mesh.origin(he), mesh.dest(he));
        matchings.shift(e, 1);
        let after = find_singularities(&mesh, &matchings);

        assert_eq!(after.quarters(a), before.quarters(a) + 1);
        assert_eq!(after.quarters(b), before.quarters(b) - 1);
        assert!((after.defect_sum() - before.defect_sum()).abs() < 1e-9);
    }
}
