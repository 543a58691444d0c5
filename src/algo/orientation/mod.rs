//! Per-face cross field guiding the quad grid.
//!
//! Each face carries one unit tangent `q_f`; the cross is `{q, n × q, -q, -n × q}`.
//! The field is initialised from features and curvature, then smoothed on
//! every level of a [`Hierarchy`], coarsest first, each level starting from
//! the prolongation of the level above it.
//!
//! Initialisation picks, per face and in this order:
//!
//! 1. the locked direction, when [`FeatureConstraints`] locks the face;
//! 2. the direction of its sharpest incident edge, when the dihedral angle
//!    exceeds [`FieldOptions::init_feature_angle`] or the edge is a boundary;
//! 3. the principal curvature direction, when it is well defined;
//! 4. a random tangent drawn from the caller's seed.
//!
//! Faces of the last kind carry no information. They are left out when
//! children are combined into a coarse node, and on the coarsest level they
//! are filled breadth first from informed neighbours, so the seed only
//! matters on parts of the surface with no feature or curvature to follow.
//!
//! # Example
//!
//! ```
//! use quadify::algo::hierarchy::Hierarchy;
//! use quadify::algo::orientation::{FeatureConstraints, FieldOptions, OrientationField};
//! use quadify::mesh::build_from_triangles;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//! let options = FieldOptions::default();
//! let hierarchy = Hierarchy::build(&mesh, options.hierarchy_floor);
//! let constraints = FeatureConstraints::detect(&mesh, false, true, options.sharp_angle());
//! let field = OrientationField::compute(&mesh, &hierarchy, &constraints, &options, 0);
//! assert_eq!(field.directions().len(), 2);
//! ```

mod constraints;
pub mod rosy;
mod smooth;

pub use constraints::FeatureConstraints;
pub use smooth::SweepStats;

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use self::rosy::{best_rotation, project_tangent, rotate_quarter, transport};
use self::smooth::SweepLimits;
use crate::algo::curvature::face_principal_directions;
use crate::algo::hierarchy::Hierarchy;
use crate::error::ConvergenceWarning;
use crate::mesh::{FaceId, HalfEdgeMesh};

/// Offset mixed into the caller seed for the field initialisation stream.
const SEED_STREAM: u64 = 0x6f72_6965_6e74;

/// Minimum `|k1 - k2|` for a principal direction to be trusted.
const MIN_ANISOTROPY: f64 = 1e-3;

/// Options for computing the orientation field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOptions {
    /// Sweep cap per hierarchy level.
    pub max_iterations: usize,
    /// Largest per-face change (radians) of a converged sweep.
    pub tolerance: f64,
    /// Largest relative energy decrease of a converged sweep.
    pub energy_tolerance: f64,
    /// Dihedral angle (degrees) above which an edge is sharp.
    pub sharp_angle_degrees: f64,
    /// Dihedral angle (degrees) above which an edge seeds the initial field.
    pub init_feature_angle_degrees: f64,
    /// Coarsest hierarchy level size.
    pub hierarchy_floor: usize,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-3,
            energy_tolerance: 1e-5,
            sharp_angle_degrees: 60.0,
            init_feature_angle_degrees: 10.0,
            hierarchy_floor: 32,
        }
    }
}

impl FieldOptions {
    /// Set the sweep cap per level.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the per-face change tolerance in radians.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the relative energy tolerance.
    pub fn with_energy_tolerance(mut self, tolerance: f64) -> Self {
        self.energy_tolerance = tolerance;
        self
    }

    fn limits(&self) -> SweepLimits {
        SweepLimits {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            energy_tolerance: self.energy_tolerance,
        }
    }

    /// Set the sharp-edge threshold in degrees.
    pub fn with_sharp_angle(mut self, degrees: f64) -> Self {
        self.sharp_angle_degrees = degrees;
        self
    }

    /// Set the hierarchy floor.
    pub fn with_hierarchy_floor(mut self, floor: usize) -> Self {
        self.hierarchy_floor = floor;
        self
    }

    /// Sharp-edge threshold in radians.
    #[inline]
    pub fn sharp_angle(&self) -> f64 {
        self.sharp_angle_degrees.to_radians()
    }

    /// Initialisation feature threshold in radians.
    #[inline]
    pub fn init_feature_angle(&self) -> f64 {
        self.init_feature_angle_degrees.to_radians()
    }
}

/// Smoothed cross field, one direction per face.
#[derive(Debug, Clone)]
pub struct OrientationField {
    directions: Vec<Vector3<f64>>,
    normals: Vec<Vector3<f64>>,
    locked: Vec<bool>,
    levels: Vec<SweepStats>,
}

impl OrientationField {
    /// Initialise and smooth the field over every level of `hierarchy`.
    pub fn compute(
        mesh: &HalfEdgeMesh,
        hierarchy: &Hierarchy,
        constraints: &FeatureConstraints,
        options: &FieldOptions,
        seed: u64,
    ) -> Self {
        let normals: Vec<Vector3<f64>> = (0..mesh.num_faces())
            .into_par_iter()
            .map(|i| mesh.face_normal(FaceId::new(i)))
            .collect();
        let locked = constraints.locked_mask();
        let (initial, informed) = initial_directions(mesh, &normals, constraints, options, seed);
        let tiers = locked
            .iter()
            .zip(&informed)
            .map(|(&lock, &info)| Tier::of(lock, info))
            .collect();

        let num_levels = hierarchy.num_levels();
        let mut level_dirs = vec![initial];
        let mut level_tiers: Vec<Vec<Tier>> = vec![tiers];
        for l in 1..num_levels {
            let (dirs, tiers) = restrict_level(hierarchy, l, &level_dirs[l - 1], &level_tiers[l - 1]);
            level_dirs.push(dirs);
            level_tiers.push(tiers);
        }
        let level_locks: Vec<Vec<bool>> = level_tiers
            .iter()
            .map(|tiers| tiers.iter().map(|&t| t == Tier::Locked).collect())
            .collect();

        let mut levels = vec![SweepStats::empty(); num_levels];
        for l in (0..num_levels).rev() {
            if l + 1 < num_levels {
                let prolonged = prolong_level(hierarchy, l, &level_dirs[l + 1], &level_dirs[l], &level_locks[l]);
                level_dirs[l] = prolonged;
            } else {
                let known: Vec<bool> = level_tiers[l].iter().map(|&t| t != Tier::Free).collect();
                smooth::fill_uninformed(hierarchy.level(l), &mut level_dirs[l], &known);
            }
            let mut dirs = std::mem::take(&mut level_dirs[l]);
            levels[l] = smooth::smooth_level(
                hierarchy.level(l),
                &mut dirs,
                &level_locks[l],
                options.limits(),
            );
            level_dirs[l] = dirs;
            log::debug!(
                "orientation level {}: {} nodes, {} sweeps, energy {:.3e}, max change {:.2e}",
                l,
                levels[l].nodes,
                levels[l].iterations,
                levels[l].energy,
                levels[l].max_change
            );
        }

        let directions = level_dirs.into_iter().next().unwrap_or_default();
        Self {
            directions,
            normals,
            locked,
            levels,
        }
    }

    /// Re-smooth the field with every edge matching held fixed.
    ///
    /// `rotations[e]` gives the quarter turns from the face of the canonical
    /// half-edge of edge `e` to the face across it. Runs on the finest level
    /// only; locked faces keep their direction.
    pub fn resmooth_with_matchings(
        &mut self,
        mesh: &HalfEdgeMesh,
        rotations: &[i32],
        options: &FieldOptions,
    ) -> SweepStats {
        let stats = smooth::smooth_with_matchings(
            mesh,
            &self.normals,
            &mut self.directions,
            &self.locked,
            rotations,
            options.limits(),
        );
        log::debug!(
            "orientation re-smoothing: {} sweeps, max change {:.2e}",
            stats.iterations,
            stats.max_change
        );
        stats
    }

    /// Direction of a face.
    #[inline]
    pub fn direction(&self, f: FaceId) -> Vector3<f64> {
        self.directions[f.index()]
    }

    /// All face directions.
    #[inline]
    pub fn directions(&self) -> &[Vector3<f64>] {
        &self.directions
    }

    /// Unit normal of a face.
    #[inline]
    pub fn normal(&self, f: FaceId) -> Vector3<f64> {
        self.normals[f.index()]
    }

    /// Face frame `(q, n × q)` rotated by `k` quarter turns.
    pub fn frame(&self, f: FaceId, k: i32) -> (Vector3<f64>, Vector3<f64>) {
        let n = &self.normals[f.index()];
        let d = rotate_quarter(&self.directions[f.index()], n, k);
        (d, n.cross(&d))
    }

    /// Whether a face direction is locked by a feature.
    #[inline]
    pub fn is_locked(&self, f: FaceId) -> bool {
        self.locked[f.index()]
    }

    /// Smoothing statistics per hierarchy level, finest first.
    pub fn level_stats(&self) -> &[SweepStats] {
        &self.levels
    }

    /// Whether every level converged.
    pub fn converged(&self) -> bool {
        self.levels.iter().all(|s| s.converged)
    }

    /// One warning per level that hit its sweep cap.
    pub fn warnings(&self) -> Vec<ConvergenceWarning> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.converged)
            .map(|(level, s)| ConvergenceWarning::OrientationNotConverged {
                level,
                iterations: s.iterations,
                max_change: s.max_change,
            })
            .collect()
    }
}

fn initial_directions(
    mesh: &HalfEdgeMesh,
    normals: &[Vector3<f64>],
    constraints: &FeatureConstraints,
    options: &FieldOptions,
    seed: u64,
) -> (Vec<Vector3<f64>>, Vec<bool>) {
    // One angle per face, drawn in face order whether used or not.
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ SEED_STREAM);
    let angles: Vec<f64> = (0..mesh.num_faces())
        .map(|_| rng.gen_range(0.0..std::f64::consts::TAU))
        .collect();
    let principal = face_principal_directions(mesh);
    let feature_angle = options.init_feature_angle();

    (0..mesh.num_faces())
        .into_par_iter()
        .map(|i| {
            let f = FaceId::new(i);
            let n = &normals[i];
            if let Some(dir) = constraints.locked_direction(f) {
                return (dir, true);
            }

            let mut best: Option<(f64, Vector3<f64>)> = None;
            for he in mesh.face_halfedges(f) {
                let weight = match mesh.dihedral_angle(he) {
                    None => std::f64::consts::PI,
                    Some(angle) if angle >= feature_angle => angle,
                    Some(_) => continue,
                };
                if best.map_or(true, |(w, _)| weight > w) {
                    best = Some((weight, mesh.edge_vector(he)));
                }
            }
            if let Some((_, edge)) = best {
                if let Some(dir) = project_tangent(&edge, n).try_normalize(1e-12) {
                    return (dir, true);
                }
            }

            let p = &principal[i];
            if p.anisotropy > MIN_ANISOTROPY {
                if let Some(dir) = project_tangent(&p.direction, n).try_normalize(1e-12) {
                    return (dir, true);
                }
            }

            let [a, b, _] = mesh.face_positions(f);
            let e0 = project_tangent(&(b - a), n)
                .try_normalize(1e-12)
                .unwrap_or_else(|| any_tangent(n));
            let e1 = n.cross(&e0);
            (e0 * angles[i].cos() + e1 * angles[i].sin(), false)
        })
        .unzip()
}

/// How much a node's starting direction can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    /// Random start.
    Free,
    /// Feature edge or principal curvature.
    Informed,
    /// Fixed by a constraint.
    Locked,
}

impl Tier {
    fn of(locked: bool, informed: bool) -> Self {
        match (locked, informed) {
            (true, _) => Tier::Locked,
            (false, true) => Tier::Informed,
            (false, false) => Tier::Free,
        }
    }
}

/// Some unit vector orthogonal to `n`.
fn any_tangent(n: &Vector3<f64>) -> Vector3<f64> {
    let axis = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    n.cross(&axis).normalize()
}

/// Combine the children of every node of level `l`.
///
/// Only the children of the highest tier take part, so a node with a locked
/// child is locked to the combination of its locked children.
fn restrict_level(
    hierarchy: &Hierarchy,
    l: usize,
    fine_dirs: &[Vector3<f64>],
    fine_tiers: &[Tier],
) -> (Vec<Vector3<f64>>, Vec<Tier>) {
    let fine = hierarchy.level(l - 1);
    let coarse = hierarchy.level(l);
    (0..coarse.len())
        .into_par_iter()
        .map(|node| {
            let n = &coarse.normals[node];
            let tier = coarse
                .children(node)
                .map(|c| fine_tiers[c])
                .max()
                .unwrap_or(Tier::Free);
            let mut acc: Option<Vector3<f64>> = None;
            for c in coarse.children(node).filter(|&c| fine_tiers[c] == tier) {
                let t = transport(&fine_dirs[c], &fine.normals[c], n) * fine.areas[c].max(1e-300);
                acc = Some(match acc {
                    None => t,
                    Some(sum) => {
                        let k = best_rotation(&sum, &t, n);
                        sum + rotate_quarter(&t, n, k)
                    }
                });
            }
            let dir = acc
                .and_then(|v| project_tangent(&v, n).try_normalize(1e-12))
                .unwrap_or_else(|| any_tangent(n));
            (dir, tier)
        })
        .unzip()
}

/// Seed the free nodes of level `l` from their parents on level `l + 1`.
fn prolong_level(
    hierarchy: &Hierarchy,
    l: usize,
    coarse_dirs: &[Vector3<f64>],
    current: &[Vector3<f64>],
    locks: &[bool],
) -> Vec<Vector3<f64>> {
    let fine = hierarchy.level(l);
    let coarse = hierarchy.level(l + 1);
    (0..fine.len())
        .into_par_iter()
        .map(|i| {
            if locks[i] {
                return current[i];
            }
            let parent = fine.to_coarse[i] as usize;
            let n = &fine.normals[i];
            transport(&coarse_dirs[parent], &coarse.normals[parent], n)
                .try_normalize(1e-12)
                .unwrap_or(current[i])
        })
        .collect()
}
