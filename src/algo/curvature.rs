//! Discrete curvature computation on meshes.
//!
//! Two estimators feed the remeshing pipeline:
//!
//! - [`compute_curvature`]: per-vertex Gaussian, mean and principal curvature
//!   magnitudes. The scale field uses their curvedness to shrink the target
//!   edge length where the surface bends.
//! - [`face_principal_directions`]: per-face principal direction obtained by
//!   fitting a shape operator to the vertex normals of the face. The
//!   orientation field starts from these directions.
//!
//! # Curvature Types
//!
//! - **Gaussian curvature K**: Intrinsic curvature computed via angle defect
//! - **Mean curvature H**: Extrinsic curvature from the Laplace-Beltrami operator
//! - **Principal curvatures k1, k2**: Maximum and minimum normal curvatures
//!
//! Boundary vertices report zero curvature: neither the angle defect nor the
//! cotangent Laplacian measures surface bending there.
//!
//! # References
//!
//! - Meyer, M., et al. (2003). "Discrete Differential-Geometry Operators for
//!   Triangulated 2-Manifolds." Visualization and Mathematics III.
//! - Rusinkiewicz, S. (2004). "Estimating Curvatures and Their Derivatives on
//!   Triangle Meshes." 3DPVT.

use std::f64::consts::PI;

use nalgebra::{Matrix2, Matrix3, Point3, SymmetricEigen, Vector2, Vector3};
use rayon::prelude::*;

use crate::mesh::{FaceId, HalfEdgeMesh, VertexId};

/// Result of curvature computation.
///
/// Contains per-vertex curvature values for all vertices in the mesh.
#[derive(Debug, Clone)]
pub struct CurvatureResult {
    /// Gaussian curvature (K) per vertex.
    gaussian: Vec<f64>,
    /// Mean curvature (H) per vertex (signed).
    mean: Vec<f64>,
    /// Maximum principal curvature (k1) per vertex.
    principal_max: Vec<f64>,
    /// Minimum principal curvature (k2) per vertex.
    principal_min: Vec<f64>,
}

impl CurvatureResult {
    /// Get Gaussian curvature at a vertex.
    #[inline]
    pub fn gaussian(&self, v: VertexId) -> f64 {
        self.gaussian[v.index()]
    }

    /// Get mean curvature at a vertex.
    #[inline]
    pub fn mean(&self, v: VertexId) -> f64 {
        self.mean[v.index()]
    }

    /// Get principal curvatures at a vertex.
    ///
    /// Returns (k1, k2) where k1 >= k2.
    #[inline]
    pub fn principal(&self, v: VertexId) -> (f64, f64) {
        (self.principal_max[v.index()], self.principal_min[v.index()])
    }

    /// Get the number of vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.gaussian.len()
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.gaussian.is_empty()
    }

    /// Compute curvedness at a vertex.
    ///
    /// Curvedness measures the magnitude of curvature: sqrt((k1² + k2²) / 2)
    pub fn curvedness(&self, v: VertexId) -> f64 {
        let k1 = self.principal_max[v.index()];
        let k2 = self.principal_min[v.index()];
        ((k1 * k1 + k2 * k2) / 2.0).sqrt()
    }

    /// Curvedness of every vertex.
    pub fn curvedness_values(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.curvedness(VertexId::new(i)))
            .collect()
    }
}

/// Compute the angle at vertex `a` in triangle (a, b, c).
fn triangle_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = (b - a).normalize();
    let ac = (c - a).normalize();
    let dot = ab.dot(&ac).clamp(-1.0, 1.0);
    dot.acos()
}

/// Compute the cotangent of the angle at vertex `a` in triangle (a, b, c).
fn cotangent_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let dot = ab.dot(&ac);
    let cross_norm = ab.cross(&ac).norm();
    if cross_norm < 1e-10 {
        0.0
    } else {
        dot / cross_norm
    }
}

/// Check if a triangle is obtuse and return the index (0, 1, 2) of the obtuse vertex.
fn obtuse_vertex(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Option<usize> {
    let half_pi = PI / 2.0;
    [
        triangle_angle(p0, p1, p2),
        triangle_angle(p1, p0, p2),
        triangle_angle(p2, p0, p1),
    ]
    .iter()
    .position(|&angle| angle > half_pi)
}

/// Compute Voronoi area contribution for a vertex in a non-obtuse triangle.
fn voronoi_area_contribution(
    p_vertex: &Point3<f64>,
    p_prev: &Point3<f64>,
    p_next: &Point3<f64>,
) -> f64 {
    // Voronoi area = (1/8) * (|PR|² * cot(Q) + |PQ|² * cot(R))
    let pr = p_next - p_vertex;
    let pq = p_prev - p_vertex;

    let cot_q = cotangent_angle(p_prev, p_vertex, p_next);
    let cot_r = cotangent_angle(p_next, p_vertex, p_prev);

    0.125 * (pr.norm_squared() * cot_q + pq.norm_squared() * cot_r)
}

/// Compute mixed Voronoi area for a vertex.
///
/// Uses the Meyer et al. formulation:
/// - Non-obtuse triangles: Voronoi area
/// - Obtuse at vertex: triangle_area / 2
/// - Obtuse elsewhere: triangle_area / 4
pub(crate) fn mixed_area(mesh: &HalfEdgeMesh, v: VertexId) -> f64 {
    let mut area = 0.0;

    for f in mesh.vertex_faces(v) {
        let ps = mesh.face_positions(f);
        let tri_area = mesh.face_area(f);
        let Some(local_idx) = mesh.corner_of(f, v) else {
            continue;
        };
        let p_vertex = &ps[local_idx];
        let p_next = &ps[(local_idx + 1) % 3];
        let p_prev = &ps[(local_idx + 2) % 3];

        area += match obtuse_vertex(&ps[0], &ps[1], &ps[2]) {
            None => voronoi_area_contribution(p_vertex, p_prev, p_next),
            Some(obtuse_idx) if obtuse_idx == local_idx => tri_area / 2.0,
            Some(_) => tri_area / 4.0,
        };
    }

    if area < 1e-12 {
        // Fallback: barycentric area
        return mesh.vertex_faces(v).map(|f| mesh.face_area(f) / 3.0).sum();
    }

    area
}

/// Compute the mean curvature normal vector at a vertex.
///
/// This is the unnormalized Laplace-Beltrami: Δx = (1/2) * Σ (cot α + cot β) * (x_j - x_i)
/// Divided by the mixed area, its magnitude is 2H.
fn mean_curvature_normal(mesh: &HalfEdgeMesh, v: VertexId) -> Vector3<f64> {
    let p_v = mesh.position(v);
    let mut laplacian = Vector3::zeros();

    for he in mesh.vertex_halfedges(v) {
        let p_j = mesh.position(mesh.dest(he));

        // Opposite corners of the two triangles sharing the edge
        let mut cot_sum = 0.0;
        for side in [he, mesh.twin(he)] {
            if mesh.is_boundary_halfedge(side) {
                continue;
            }
            let p_opp = mesh.position(mesh.origin(mesh.prev(side)));
            cot_sum += cotangent_angle(p_opp, p_v, p_j);
        }

        // Clamp to avoid negative weights from degenerate triangles
        laplacian += cot_sum.max(0.0) * (p_j - p_v);
    }

    0.5 * laplacian
}

/// Per-vertex curvature data computed in parallel.
#[derive(Debug, Clone, Copy, Default)]
struct VertexCurvature {
    gaussian: f64,
    mean: f64,
    principal_max: f64,
    principal_min: f64,
}

/// Compute all curvatures (Gaussian, mean, and principal) for all vertices.
///
/// # Example
///
/// ```
/// use quadify::algo::curvature::compute_curvature;
/// use quadify::mesh::{build_from_triangles, VertexId};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
/// let result = compute_curvature(&mesh);
/// assert_eq!(result.curvedness(VertexId::new(0)), 0.0);
/// ```
pub fn compute_curvature(mesh: &HalfEdgeMesh) -> CurvatureResult {
    let n = mesh.num_vertices();

    let compute_vertex = |idx: usize| -> VertexCurvature {
        let v = VertexId::new(idx);
        if mesh.is_boundary_vertex(v) {
            return VertexCurvature::default();
        }

        let area = mixed_area(mesh, v);
        if area <= 1e-12 {
            return VertexCurvature::default();
        }

        let k = mesh.angle_defect(v) / area;

        let laplacian = mean_curvature_normal(mesh, v) / area;
        let sign = if laplacian.dot(&mesh.vertex_normal(v)) >= 0.0 {
            1.0
        } else {
            -1.0
        };
        let h = sign * laplacian.norm() / 2.0;

        // Principal curvatures: k1, k2 = H ± sqrt(H² - K)
        let discriminant = h * h - k;
        let (principal_max, principal_min) = if discriminant >= 0.0 {
            let sqrt_disc = discriminant.sqrt();
            (h + sqrt_disc, h - sqrt_disc)
        } else {
            // Numerical issues: fall back to H for both
            (h, h)
        };

        VertexCurvature {
            gaussian: k,
            mean: h,
            principal_max,
            principal_min,
        }
    };

    let results: Vec<VertexCurvature> = (0..n).into_par_iter().map(compute_vertex).collect();

    CurvatureResult {
        gaussian: results.iter().map(|c| c.gaussian).collect(),
        mean: results.iter().map(|c| c.mean).collect(),
        principal_max: results.iter().map(|c| c.principal_max).collect(),
        principal_min: results.iter().map(|c| c.principal_min).collect(),
    }
}

/// Principal curvature direction of a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacePrincipal {
    /// Unit tangent along the principal direction of largest |curvature|.
    pub direction: Vector3<f64>,
    /// `|k1 - k2|`: how well-defined the direction is.
    pub anisotropy: f64,
}

/// Estimate the principal direction of every face.
///
/// Fits a symmetric 2x2 shape operator `S` to the face so that
/// `S · e ≈ Δn` for each edge `e` and the change of vertex normal `Δn` along
/// it, then takes the eigenvector of the eigenvalue with the largest
/// magnitude. Flat faces get zero anisotropy and an arbitrary in-plane
/// direction.
pub fn face_principal_directions(mesh: &HalfEdgeMesh) -> Vec<FacePrincipal> {
    let normals: Vec<Vector3<f64>> = (0..mesh.num_vertices())
        .into_par_iter()
        .map(|i| mesh.vertex_normal(VertexId::new(i)))
        .collect();

    (0..mesh.num_faces())
        .into_par_iter()
        .map(|i| face_principal(mesh, FaceId::new(i), &normals))
        .collect()
}

fn face_principal(mesh: &HalfEdgeMesh, f: FaceId, normals: &[Vector3<f64>]) -> FacePrincipal {
    let verts = mesh.face_triangle(f);
    let ps = mesh.face_positions(f);
    let n = mesh.face_normal(f);
    let t1 = (ps[1] - ps[0]).normalize();
    let t2 = n.cross(&t1);

    // Normal equations for the unknowns (a, b, c) of S = [a b; b c].
    let mut ata = Matrix3::zeros();
    let mut atb = Vector3::zeros();
    for k in 0..3 {
        let e = ps[(k + 1) % 3] - ps[k];
        let dn = normals[verts[(k + 1) % 3].index()] - normals[verts[k].index()];
        let (u, w) = (e.dot(&t1), e.dot(&t2));
        let rows = [
            (Vector3::new(u, w, 0.0), dn.dot(&t1)),
            (Vector3::new(0.0, u, w), dn.dot(&t2)),
        ];
        for (row, rhs) in rows {
            ata += row * row.transpose();
            atb += row * rhs;
        }
    }

    let Some(coeffs) = ata.cholesky().map(|c| c.solve(&atb)) else {
        return FacePrincipal {
            direction: t1,
            anisotropy: 0.0,
        };
    };

    let shape = Matrix2::new(coeffs[0], coeffs[1], coeffs[1], coeffs[2]);
    let eigen = SymmetricEigen::new(shape);
    let (k0, k1) = (eigen.eigenvalues[0], eigen.eigenvalues[1]);
    let major = if k0.abs() >= k1.abs() { 0 } else { 1 };
    let dir2: Vector2<f64> = eigen.eigenvectors.column(major).into_owned();
    let direction = (t1 * dir2.x + t2 * dir2.y).normalize();

    FacePrincipal {
        direction,
        anisotropy: (k0 - k1).abs(),
    }
}
