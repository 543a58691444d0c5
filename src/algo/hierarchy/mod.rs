//! Multi-resolution hierarchy over the face graph of a mesh.
//!
//! Level 0 has one node per mesh face, linked across interior edges. Each
//! further level is built by greedily matching pairs of adjacent nodes, cheapest
//! first, where the cost of a pair is the quadric error of the merged cluster
//! evaluated at its centroid. Coarsening stops once a level falls below an
//! absolute node floor or stops shrinking, which gives a logarithmic number of
//! levels independent of the input size.
//!
//! Levels are plain structs holding geometry, a CSR adjacency, and the
//! index arrays linking them to their neighbours in the hierarchy:
//! `to_coarse` on a level maps each node to its parent on the next level,
//! `to_fine` on a level lists each node's one or two children on the previous
//! level.
//!
//! # Example
//!
//! ```
//! use quadify::algo::hierarchy::Hierarchy;
//! use quadify::mesh::build_from_triangles;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
//! let hierarchy = Hierarchy::build(&mesh, 32);
//! assert_eq!(hierarchy.num_levels(), 1);
//! ```

mod quadric;

pub use quadric::Quadric;

use std::cmp::Ordering;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::mesh::{FaceId, HalfEdgeMesh};

/// Sentinel for a missing second child.
pub const NO_CHILD: u32 = u32::MAX;

/// Hard cap on the number of levels.
const MAX_LEVELS: usize = 32;

/// A coarsening step must remove at least this fraction of nodes.
const MIN_REDUCTION: f64 = 0.1;

/// A weighted link between two nodes of a level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    /// Index of the neighbouring node.
    pub target: u32,
    /// Coupling weight (number of fine face adjacencies it aggregates).
    pub weight: f64,
}

/// One level of the hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Level {
    /// Area-weighted centroid of each node.
    pub positions: Vec<Point3<f64>>,
    /// Unit area-weighted normal of each node.
    pub normals: Vec<Vector3<f64>>,
    /// Total face area of each node.
    pub areas: Vec<f64>,
    adj_offsets: Vec<usize>,
    adj: Vec<Link>,
    /// Parent of each node on the next coarser level (empty on the coarsest).
    pub to_coarse: Vec<u32>,
    /// Children of each node on the next finer level (empty on level 0).
    pub to_fine: Vec<[u32; 2]>,
    quadrics: Vec<Quadric>,
}

impl Level {
    /// Number of nodes on this level.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the level has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Links of a node, sorted by target.
    #[inline]
    pub fn neighbors(&self, node: usize) -> &[Link] {
        &self.adj[self.adj_offsets[node]..self.adj_offsets[node + 1]]
    }

    /// Children of a node on the next finer level.
    pub fn children(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.to_fine[node]
            .iter()
            .filter(|&&c| c != NO_CHILD)
            .map(|&c| c as usize)
    }

    /// Build a level from per-node geometry and an unsorted, possibly
    /// duplicated list of directed links.
    fn from_links(
        positions: Vec<Point3<f64>>,
        normals: Vec<Vector3<f64>>,
        areas: Vec<f64>,
        quadrics: Vec<Quadric>,
        mut links: Vec<(u32, u32, f64)>,
    ) -> Self {
        links.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let n = positions.len();
        let mut adj_offsets = vec![0usize; n + 1];
        let mut adj: Vec<Link> = Vec::with_capacity(links.len());
        let mut last: Option<(u32, u32)> = None;

        for (from, to, weight) in links {
            if last == Some((from, to)) {
                if let Some(link) = adj.last_mut() {
                    link.weight += weight;
                }
                continue;
            }
            last = Some((from, to));
            adj.push(Link { target: to, weight });
            adj_offsets[from as usize + 1] += 1;
        }
        for i in 0..n {
            adj_offsets[i + 1] += adj_offsets[i];
        }

        Self {
            positions,
            normals,
            areas,
            adj_offsets,
            adj,
            to_coarse: Vec::new(),
            to_fine: Vec::new(),
            quadrics,
        }
    }
}

/// Fine-to-coarse sequence of face-graph levels.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    levels: Vec<Level>,
}

/// Candidate merge between two adjacent nodes.
#[derive(Debug, Clone, Copy)]
struct MergeCandidate {
    cost: f64,
    a: u32,
    b: u32,
}

impl MergeCandidate {
    fn order(&self, other: &Self) -> Ordering {
        self.cost
            .partial_cmp(&other.cost)
            .unwrap_or(Ordering::Equal)
            .then(self.a.cmp(&other.a))
            .then(self.b.cmp(&other.b))
    }
}

impl Hierarchy {
    /// Build the hierarchy of `mesh`, coarsening until a level has at most
    /// `floor` nodes.
    pub fn build(mesh: &HalfEdgeMesh, floor: usize) -> Self {
        let mut levels = vec![Self::finest_level(mesh)];

        while levels.len() < MAX_LEVELS {
            let Some(fine) = levels.last_mut() else {
                break;
            };
            if fine.len() <= floor.max(1) {
                break;
            }
            let (coarse, to_coarse) = Self::coarsen(fine);
            if (coarse.len() as f64) > (1.0 - MIN_REDUCTION) * fine.len() as f64 {
                break;
            }
            fine.to_coarse = to_coarse;
            levels.push(coarse);
        }

        log::debug!(
            "hierarchy: {} levels, {} -> {} nodes",
            levels.len(),
            levels.first().map_or(0, Level::len),
            levels.last().map_or(0, Level::len)
        );
        Self { levels }
    }

    /// Number of levels (at least 1 for a non-empty mesh).
    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Level `i` (0 = finest).
    #[inline]
    pub fn level(&self, i: usize) -> &Level {
        &self.levels[i]
    }

    /// All levels, finest first.
    #[inline]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Node on level `level` containing face `f`.
    pub fn node_of_face(&self, f: FaceId, level: usize) -> usize {
        let mut node = f.index();
        for l in 0..level {
            node = self.levels[l].to_coarse[node] as usize;
        }
        node
    }

    /// Area-weighted average of level `level` values onto level `level + 1`.
    pub fn restrict(&self, level: usize, values: &[f64]) -> Vec<f64> {
        let fine = &self.levels[level];
        let coarse = &self.levels[level + 1];
        (0..coarse.len())
            .map(|node| {
                let (sum, area) = coarse.children(node).fold((0.0, 0.0), |(s, a), c| {
                    (s + values[c] * fine.areas[c], a + fine.areas[c])
                });
                if area > 0.0 {
                    sum / area
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Copy level `level + 1` values down to every child on level `level`.
    pub fn prolong<T: Clone>(&self, level: usize, coarse_values: &[T]) -> Vec<T> {
        self.levels[level]
            .to_coarse
            .iter()
            .map(|&parent| coarse_values[parent as usize].clone())
            .collect()
    }

    fn finest_level(mesh: &HalfEdgeMesh) -> Level {
        let geometry: Vec<(Point3<f64>, Vector3<f64>, f64)> = (0..mesh.num_faces())
            .into_par_iter()
            .map(|i| {
                let f = FaceId::new(i);
                (mesh.face_centroid(f), mesh.face_normal(f), mesh.face_area(f))
            })
            .collect();

        let quadrics = geometry
            .iter()
            .map(|(p, n, a)| Quadric::from_point_normal(p, n, *a))
            .collect();

        let mut links = Vec::with_capacity(mesh.num_edges() * 2);
        for e in mesh.edge_ids() {
            let (f0, f1) = mesh.adjacent_faces(mesh.edge_halfedge(e));
            if f0.is_valid() && f1.is_valid() {
                let (a, b) = (f0.index() as u32, f1.index() as u32);
                links.push((a, b, 1.0));
                links.push((b, a, 1.0));
            }
        }

        Level::from_links(
            geometry.iter().map(|g| g.0).collect(),
            geometry.iter().map(|g| g.1).collect(),
            geometry.iter().map(|g| g.2).collect(),
            quadrics,
            links,
        )
    }

    /// Merge matched node pairs of `fine` into a new level.
    fn coarsen(fine: &Level) -> (Level, Vec<u32>) {
        let n = fine.len();

        let mut candidates: Vec<MergeCandidate> = (0..n)
            .into_par_iter()
            .flat_map_iter(|a| {
                fine.neighbors(a)
                    .iter()
                    .filter(move |link| (link.target as usize) > a)
                    .map(move |link| {
                        let b = link.target as usize;
                        let area = fine.areas[a] + fine.areas[b];
                        let centroid = if area > 0.0 {
                            Point3::from(
                                (fine.positions[a].coords * fine.areas[a]
                                    + fine.positions[b].coords * fine.areas[b])
                                    / area,
                            )
                        } else {
                            fine.positions[a]
                        };
                        let cost = (fine.quadrics[a] + fine.quadrics[b]).evaluate(&centroid);
                        MergeCandidate {
                            cost: cost.max(0.0),
                            a: a as u32,
                            b: b as u32,
                        }
                    })
            })
            .collect();
        candidates.sort_by(MergeCandidate::order);

        let mut to_coarse = vec![NO_CHILD; n];
        let mut to_fine: Vec<[u32; 2]> = Vec::with_capacity(n / 2 + 1);
        for c in &candidates {
            let (a, b) = (c.a as usize, c.b as usize);
            if to_coarse[a] == NO_CHILD && to_coarse[b] == NO_CHILD {
                let id = to_fine.len() as u32;
                to_coarse[a] = id;
                to_coarse[b] = id;
                to_fine.push([c.a, c.b]);
            }
        }
        for (i, parent) in to_coarse.iter_mut().enumerate() {
            if *parent == NO_CHILD {
                *parent = to_fine.len() as u32;
                to_fine.push([i as u32, NO_CHILD]);
            }
        }

        let m = to_fine.len();
        let mut positions = Vec::with_capacity(m);
        let mut normals = Vec::with_capacity(m);
        let mut areas = Vec::with_capacity(m);
        let mut quadrics = Vec::with_capacity(m);
        for children in &to_fine {
            let kids: Vec<usize> = children
                .iter()
                .filter(|&&c| c != NO_CHILD)
                .map(|&c| c as usize)
                .collect();
            let area: f64 = kids.iter().map(|&c| fine.areas[c]).sum();
            let weighted: Vector3<f64> = kids
                .iter()
                .map(|&c| fine.positions[c].coords * fine.areas[c])
                .sum();
            let normal: Vector3<f64> = kids.iter().map(|&c| fine.normals[c] * fine.areas[c]).sum();

            positions.push(if area > 0.0 {
                Point3::from(weighted / area)
            } else {
                fine.positions[kids[0]]
            });
            normals.push(normal.try_normalize(1e-12).unwrap_or(fine.normals[kids[0]]));
            areas.push(area);
            quadrics.push(
                kids.iter()
                    .fold(Quadric::zero(), |q, &c| q + fine.quadrics[c]),
            );
        }

        let mut links = Vec::new();
        for a in 0..n {
            for link in fine.neighbors(a) {
                let (ca, cb) = (to_coarse[a], to_coarse[link.target as usize]);
                if ca != cb {
                    links.push((ca, cb, link.weight));
                }
            }
        }

        let mut coarse = Level::from_links(positions, normals, areas, quadrics, links);
        coarse.to_fine = to_fine;
        (coarse, to_coarse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_meshes::{cube, flat_grid, icosphere};

    #[test]
    fn test_small_mesh_has_single_level() {
        let mesh = cube();
        let h = Hierarchy::build(&mesh, 32);
        assert_eq!(h.num_levels(), 1);
        assert_eq!(h.level(0).len(), 12);
        // Every cube face triangle touches three others.
        for node in 0..12 {
            assert_eq!(h.level(0).neighbors(node).len(), 3);
        }
    }

    #[test]
    fn test_levels_shrink_to_floor() {
        let mesh = icosphere(3);
        let h = Hierarchy::build(&mesh, 16);

        assert!(h.num_levels() > 3);
        for w in h.levels().windows(2) {
            assert!(w[1].len() < w[0].len());
            assert_eq!(w[0].to_coarse.len(), w[0].len());
            assert_eq!(w[1].to_fine.len(), w[1].len());
        }
        assert!(h.levels().last().unwrap().len() * 8 < h.level(0).len());
    }

    #[test]
    fn test_parent_child_consistency() {
        let mesh = icosphere(2);
        let h = Hierarchy::build(&mesh, 8);

        for l in 0..h.num_levels() - 1 {
            let fine = h.level(l);
            let coarse = h.level(l + 1);
            for node in 0..coarse.len() {
                for child in coarse.children(node) {
                    assert_eq!(fine.to_coarse[child] as usize, node);
                }
            }
            // Area is conserved.
            let fine_area: f64 = fine.areas.iter().sum();
            let coarse_area: f64 = coarse.areas.iter().sum();
            assert!((fine_area - coarse_area).abs() < 1e-9);
        }
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let mesh = flat_grid(8, 1.0);
        let h = Hierarchy::build(&mesh, 4);

        for level in h.levels() {
            for a in 0..level.len() {
                for link in level.neighbors(a) {
                    let back = level
                        .neighbors(link.target as usize)
                        .iter()
                        .find(|l| l.target as usize == a)
                        .expect("missing reverse link");
                    assert_eq!(back.weight, link.weight);
                    assert_ne!(link.target as usize, a);
                }
            }
        }
    }

    #[test]
    fn test_restrict_and_prolong() {
        let mesh = flat_grid(8, 1.0);
        let h = Hierarchy::build(&mesh, 4);
        assert!(h.num_levels() >= 2);

        let ones = vec![1.0; h.level(0).len()];
        let coarse = h.restrict(0, &ones);
        assert!(coarse.iter().all(|&v| (v - 1.0).abs() < 1e-12));

        let ids: Vec<usize> = (0..h.level(1).len()).collect();
        let fine = h.prolong(0, &ids);
        for (face, &parent) in fine.iter().enumerate() {
            assert_eq!(h.node_of_face(FaceId::new(face), 1), parent);
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let mesh = icosphere(2);
        let a = Hierarchy::build(&mesh, 8);
        let b = Hierarchy::build(&mesh, 8);
        assert_eq!(a.num_levels(), b.num_levels());
        for (la, lb) in a.levels().iter().zip(b.levels()) {
            assert_eq!(la.to_coarse, lb.to_coarse);
            assert_eq!(la.to_fine, lb.to_fine);
        }
    }
}
