//! Sharp-feature and boundary constraints on the orientation field.

use nalgebra::Vector3;

use crate::mesh::{EdgeId, FaceId, HalfEdgeMesh, VertexId};

/// Edges and faces whose field direction is prescribed.
#[derive(Debug, Clone, Default)]
pub struct FeatureConstraints {
    sharp: Vec<bool>,
    boundary: Vec<bool>,
    locked: Vec<Option<Vector3<f64>>>,
    preserve_boundary: bool,
}

impl FeatureConstraints {
    /// Mark feature edges and lock their incident faces.
    ///
    /// With `preserve_sharp`, every interior edge whose dihedral angle exceeds
    /// `sharp_angle` (radians) is a feature. With `preserve_boundary`, every
    /// boundary edge is. A face touching a feature edge is locked to that
    /// edge's direction; when it touches several, the sharpest wins and
    /// boundary edges win over sharp ones.
    pub fn detect(
        mesh: &HalfEdgeMesh,
        preserve_sharp: bool,
        preserve_boundary: bool,
        sharp_angle: f64,
    ) -> Self {
        let mut sharp = vec![false; mesh.num_edges()];
        let mut boundary = vec![false; mesh.num_edges()];

        for e in mesh.edge_ids() {
            let he = mesh.edge_halfedge(e);
            match mesh.dihedral_angle(he) {
                None => boundary[e.index()] = true,
                Some(angle) => sharp[e.index()] = preserve_sharp && angle > sharp_angle,
            }
        }

        let locked = mesh
            .face_ids()
            .map(|f| {
                let mut best: Option<(f64, Vector3<f64>)> = None;
                for he in mesh.face_halfedges(f) {
                    let e = mesh.edge_of(he).index();
                    let priority = if preserve_boundary && boundary[e] {
                        f64::INFINITY
                    } else if sharp[e] {
                        mesh.dihedral_angle(he).unwrap_or(0.0)
                    } else {
                        continue;
                    };
                    if best.map_or(true, |(p, _)| priority > p) {
                        best = Some((priority, mesh.edge_vector(he).normalize()));
                    }
                }
                best.map(|(_, dir)| dir)
            })
            .collect();

        Self {
            sharp,
            boundary,
            locked,
            preserve_boundary,
        }
    }

    /// No constraints at all.
    pub fn none(mesh: &HalfEdgeMesh) -> Self {
        Self::detect(mesh, false, false, f64::INFINITY)
    }

    /// Whether an edge was marked sharp.
    #[inline]
    pub fn is_sharp(&self, e: EdgeId) -> bool {
        self.sharp[e.index()]
    }

    /// Whether an edge lies on the mesh boundary.
    #[inline]
    pub fn is_boundary(&self, e: EdgeId) -> bool {
        self.boundary[e.index()]
    }

    /// Whether an edge constrains the field (and may not be crossed by a
    /// singularity re-routing).
    #[inline]
    pub fn is_feature(&self, e: EdgeId) -> bool {
        self.sharp[e.index()] || (self.preserve_boundary && self.boundary[e.index()])
    }

    /// Whether a vertex lies on a feature edge.
    pub fn is_feature_vertex(&self, mesh: &HalfEdgeMesh, v: VertexId) -> bool {
        mesh.vertex_halfedges(v)
            .any(|he| self.is_feature(mesh.edge_of(he)))
    }

    /// Locked direction of a face, if any.
    #[inline]
    pub fn locked_direction(&self, f: FaceId) -> Option<Vector3<f64>> {
        self.locked[f.index()]
    }

    /// Per-face lock flags.
    pub fn locked_mask(&self) -> Vec<bool> {
        self.locked.iter().map(Option::is_some).collect()
    }

    /// Number of feature edges.
    pub fn num_feature_edges(&self) -> usize {
        (0..self.sharp.len())
            .filter(|&i| self.is_feature(EdgeId::new(i)))
            .count()
    }
}
