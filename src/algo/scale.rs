//! Target edge length field.
//!
//! A regular quad tiling with edge length `s` uses one face per `s²` of
//! surface, so a target face count `N` on a surface of area `A` gives the
//! global scale `s = sqrt(A / N)`. With adaptive sizing the per-vertex scale
//! shrinks where the (smoothed) curvedness is high, stays within
//! `[s / max_ratio, s * max_ratio]`, and is renormalised so the expected face
//! count is still `N`.

use rayon::prelude::*;

use super::curvature::compute_curvature;
use crate::error::{RemeshError, Result};
use crate::mesh::{FaceId, HalfEdgeMesh, VertexId};

/// Options for adaptive scale computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleOptions {
    /// Strength of the curvature response (dimensionless).
    pub adaptive_strength: f64,
    /// Bound on the ratio between the local and global scale (>= 1).
    pub max_ratio: f64,
    /// One-ring averaging passes applied to the curvedness estimate.
    pub smoothing_passes: usize,
}

impl Default for ScaleOptions {
    fn default() -> Self {
        Self {
            adaptive_strength: 1.0,
            max_ratio: 3.0,
            smoothing_passes: 3,
        }
    }
}

impl ScaleOptions {
    /// Set the curvature response strength.
    pub fn with_adaptive_strength(mut self, strength: f64) -> Self {
        self.adaptive_strength = strength;
        self
    }

    /// Set the maximum scale ratio.
    pub fn with_max_ratio(mut self, ratio: f64) -> Self {
        self.max_ratio = ratio;
        self
    }

    /// Set the number of curvature smoothing passes.
    pub fn with_smoothing_passes(mut self, passes: usize) -> Self {
        self.smoothing_passes = passes;
        self
    }
}

/// Edge length of a regular quad tiling with `target_faces` faces over `area`.
pub fn global_scale(area: f64, target_faces: usize) -> Result<f64> {
    if target_faces == 0 {
        return Err(RemeshError::invalid_param(
            "target_faces",
            target_faces,
            "must be positive",
        ));
    }
    if !(area > 0.0) || !area.is_finite() {
        return Err(RemeshError::InvalidState(format!(
            "surface area {area} is not positive"
        )));
    }
    Ok((area / target_faces as f64).sqrt())
}

/// Strictly positive target edge length per vertex and per face.
#[derive(Debug, Clone)]
pub struct ScaleField {
    global: f64,
    vertex: Vec<f64>,
    face: Vec<f64>,
}

impl ScaleField {
    /// Compute the scale field for `target_faces` output faces.
    pub fn compute(
        mesh: &HalfEdgeMesh,
        target_faces: usize,
        adaptive: bool,
        options: &ScaleOptions,
    ) -> Result<Self> {
        if !(options.max_ratio >= 1.0) {
            return Err(RemeshError::invalid_param(
                "max_ratio",
                options.max_ratio,
                "must be at least 1",
            ));
        }

        let global = global_scale(mesh.surface_area(), target_faces)?;
        let vertex = if adaptive {
            adaptive_vertex_scale(mesh, global, target_faces, options)
        } else {
            vec![global; mesh.num_vertices()]
        };

        let face = (0..mesh.num_faces())
            .into_par_iter()
            .map(|i| {
                let [a, b, c] = mesh.face_triangle(FaceId::new(i));
                (vertex[a.index()] + vertex[b.index()] + vertex[c.index()]) / 3.0
            })
            .collect();

        log::debug!(
            "scale field: global {:.4e}, adaptive {}, range [{:.4e}, {:.4e}]",
            global,
            adaptive,
            vertex.iter().cloned().fold(f64::INFINITY, f64::min),
            vertex.iter().cloned().fold(0.0, f64::max)
        );

        Ok(Self {
            global,
            vertex,
            face,
        })
    }

    /// The uniform scale `sqrt(area / target)`.
    #[inline]
    pub fn global(&self) -> f64 {
        self.global
    }

    /// Scale at a vertex.
    #[inline]
    pub fn vertex(&self, v: VertexId) -> f64 {
        self.vertex[v.index()]
    }

    /// Scale of a face (mean of its vertices).
    #[inline]
    pub fn face(&self, f: FaceId) -> f64 {
        self.face[f.index()]
    }

    /// Per-vertex scales.
    #[inline]
    pub fn vertex_values(&self) -> &[f64] {
        &self.vertex
    }

    /// Expected number of output faces, `Σ A_v / s_v²` over vertex areas.
    pub fn expected_faces(&self, mesh: &HalfEdgeMesh) -> f64 {
        vertex_areas(mesh)
            .iter()
            .zip(&self.vertex)
            .map(|(a, s)| a / (s * s))
            .sum()
    }
}

/// Barycentric area of every vertex.
fn vertex_areas(mesh: &HalfEdgeMesh) -> Vec<f64> {
    (0..mesh.num_vertices())
        .into_par_iter()
        .map(|i| {
            mesh.vertex_faces(VertexId::new(i))
                .map(|f| mesh.face_area(f) / 3.0)
                .sum()
        })
        .collect()
}

fn adaptive_vertex_scale(
    mesh: &HalfEdgeMesh,
    global: f64,
    target_faces: usize,
    options: &ScaleOptions,
) -> Vec<f64> {
    let mut curvedness = compute_curvature(mesh).curvedness_values();

    for _ in 0..options.smoothing_passes {
        curvedness = (0..mesh.num_vertices())
            .into_par_iter()
            .map(|i| {
                let v = VertexId::new(i);
                let (sum, count) = mesh
                    .vertex_neighbors(v)
                    .fold((curvedness[i], 1usize), |(s, c), w| {
                        (s + curvedness[w.index()], c + 1)
                    });
                sum / count as f64
            })
            .collect();
    }

    let lo = global / options.max_ratio;
    let hi = global * options.max_ratio;
    let mut scale: Vec<f64> = curvedness
        .iter()
        .map(|&k| (global / (1.0 + options.adaptive_strength * k * global)).clamp(lo, hi))
        .collect();

    // Rescale so the expected face count matches the target.
    let areas = vertex_areas(mesh);
    let expected: f64 = areas.iter().zip(&scale).map(|(a, s)| a / (s * s)).sum();
    if expected > 0.0 {
        let factor = (expected / target_faces as f64).sqrt();
        for s in scale.iter_mut() {
            *s = (*s * factor).clamp(lo, hi);
        }
    }

    scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use crate::mesh::test_meshes::{flat_grid, icosphere};
    use nalgebra::Point3;

    /// Flat square with a smooth bump in the middle.
    fn bumpy_grid(n: usize) -> HalfEdgeMesh {
        let mut vertices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                let x = i as f64 / n as f64 - 0.5;
                let y = j as f64 / n as f64 - 0.5;
                let z = 0.2 * (-(x * x + y * y) / 0.01).exp();
                vertices.push(Point3::new(x, y, z));
            }
        }
        let mut faces = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let a = j * (n + 1) + i;
                faces.push([a, a + 1, a + n + 2]);
                faces.push([a, a + n + 2, a + n + 1]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_global_scale() {
        assert!((global_scale(1.0, 64).unwrap() - 0.125).abs() < 1e-12);
        assert!(global_scale(1.0, 0).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_uniform_scale() {
        let mesh = flat_grid(4, 1.0);
        let field = ScaleField::compute(&mesh, 16, false, &ScaleOptions::default()).unwrap();

        assert!((field.global() - 0.25).abs() < 1e-12);
        for v in mesh.vertex_ids() {
            assert_eq!(field.vertex(v), field.global());
        }
        for f in mesh.face_ids() {
            assert!((field.face(f) - 0.25).abs() < 1e-12);
        }
        assert!((field.expected_faces(&mesh) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_adaptive_is_uniform_on_a_plane() {
        let mesh = flat_grid(6, 1.0);
        let field = ScaleField::compute(&mesh, 36, true, &ScaleOptions::default()).unwrap();
        for v in mesh.vertex_ids() {
            assert!((field.vertex(v) - field.global()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_adaptive_refines_curved_regions() {
        let mesh = bumpy_grid(24);
        let options = ScaleOptions::default().with_adaptive_strength(2.0);
        let field = ScaleField::compute(&mesh, 200, true, &options).unwrap();

        let center = VertexId::new(12 * 25 + 12);
        let corner_region = VertexId::new(25 + 1);
        assert!(field.vertex(center) < field.vertex(corner_region));

        let (lo, hi) = (field.global() / 3.0, field.global() * 3.0);
        for &s in field.vertex_values() {
            assert!(s > 0.0 && s >= lo - 1e-12 && s <= hi + 1e-12);
        }
        // Clamping can only move the expected count slightly off target.
        let expected = field.expected_faces(&mesh);
        assert!((expected - 200.0).abs() < 60.0, "expected faces {}", expected);
    }

    #[test]
    fn test_sphere_scale_is_nearly_uniform() {
        let mesh = icosphere(2);
        let field = ScaleField::compute(&mesh, 100, true, &ScaleOptions::default()).unwrap();
        let min = field.vertex_values().iter().cloned().fold(f64::INFINITY, f64::min);
        let max = field.vertex_values().iter().cloned().fold(0.0, f64::max);
        assert!(max / min < 1.2);
    }

    #[test]
    fn test_invalid_ratio() {
        let mesh = flat_grid(2, 1.0);
        let options = ScaleOptions::default().with_max_ratio(0.5);
        let err = ScaleField::compute(&mesh, 4, true, &options).unwrap_err();
        assert!(err.is_invalid_input());
    }
}
