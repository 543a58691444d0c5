//! Half-edge mesh data structure.
//!
//! This module provides a half-edge (doubly-connected edge list) representation
//! for triangle meshes. It is the adjacency backbone of every remeshing stage.
//!
//! # Structure
//!
//! - Each edge is split into two **half-edges** pointing in opposite directions
//! - Each half-edge knows its **twin**, **next**, **prev**, **origin vertex**
//!   and **incident face**
//! - Each vertex stores one outgoing half-edge
//! - Each face stores one half-edge on its boundary
//! - Each undirected edge has a canonical half-edge, recorded in an edge table
//!
//! # Boundary Handling
//!
//! Boundary half-edges have an invalid face ID. A boundary vertex stores a
//! boundary half-edge as its outgoing half-edge, so walking the one-ring with
//! [`HalfEdgeMesh::vertex_halfedges`] starts and ends at the boundary.
//!
//! # Orientation
//!
//! Faces are counter-clockwise around their normal. Walking outgoing
//! half-edges with `next(twin(he))` visits the one-ring clockwise.

use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};

use super::index::{EdgeId, FaceId, HalfEdgeId, VertexId};

/// A vertex in the half-edge mesh.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// The 3D position of this vertex.
    pub position: Point3<f64>,

    /// One outgoing half-edge from this vertex.
    /// For boundary vertices, this is guaranteed to be a boundary half-edge.
    pub halfedge: HalfEdgeId,
}

impl Vertex {
    /// Create a new vertex at the given position.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            halfedge: HalfEdgeId::invalid(),
        }
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge {
    /// The vertex this half-edge originates from.
    pub origin: VertexId,

    /// The opposite half-edge.
    pub twin: HalfEdgeId,

    /// The next half-edge around the face (counter-clockwise).
    pub next: HalfEdgeId,

    /// The previous half-edge around the face.
    pub prev: HalfEdgeId,

    /// The face this half-edge belongs to. Invalid on the boundary.
    pub face: FaceId,

    /// The undirected edge this half-edge is part of.
    pub edge: EdgeId,
}

impl HalfEdge {
    /// Create a new unlinked half-edge.
    pub fn new() -> Self {
        Self {
            origin: VertexId::invalid(),
            twin: HalfEdgeId::invalid(),
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
            face: FaceId::invalid(),
            edge: EdgeId::invalid(),
        }
    }

    /// Check if this half-edge is on the boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        !self.face.is_valid()
    }
}

impl Default for HalfEdge {
    fn default() -> Self {
        Self::new()
    }
}

/// A face in the half-edge mesh.
#[derive(Debug, Clone, Copy)]
pub struct Face {
    /// The half-edge leaving the face's first corner.
    pub halfedge: HalfEdgeId,
}

impl Face {
    /// Create a new face with the given half-edge.
    pub fn new(halfedge: HalfEdgeId) -> Self {
        Self { halfedge }
    }
}

/// A half-edge mesh for manifold, consistently oriented triangle meshes.
///
/// Instances are produced by [`build_from_triangles`](super::build_from_triangles)
/// and are immutable afterwards, apart from vertex positions.
#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    /// All vertices in the mesh.
    pub(crate) vertices: Vec<Vertex>,

    /// All half-edges in the mesh.
    pub(crate) halfedges: Vec<HalfEdge>,

    /// All faces in the mesh.
    pub(crate) faces: Vec<Face>,

    /// Canonical half-edge of every undirected edge.
    pub(crate) edges: Vec<HalfEdgeId>,
}

impl HalfEdgeMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        // Closed mesh: HE = 3F; boundaries add a few more.
        let num_halfedges = num_faces * 3 + num_faces / 2;

        Self {
            vertices: Vec::with_capacity(num_vertices),
            halfedges: Vec::with_capacity(num_halfedges),
            faces: Vec::with_capacity(num_faces),
            edges: Vec::with_capacity(num_halfedges / 2),
        }
    }

    // ==================== Accessors ====================

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of half-edges (boundary half-edges included).
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Get the number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get the number of undirected edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.halfedges[id.index()]
    }

    /// Get a mutable half-edge by ID.
    #[inline]
    pub(crate) fn halfedge_mut(&mut self, id: HalfEdgeId) -> &mut HalfEdge {
        &mut self.halfedges[id.index()]
    }

    /// Get a face by ID.
    #[inline]
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.vertex(v).position
    }

    /// Set the position of a vertex.
    #[inline]
    pub fn set_position(&mut self, v: VertexId, pos: Point3<f64>) {
        self.vertices[v.index()].position = pos;
    }

    /// Canonical half-edge of an undirected edge.
    ///
    /// For boundary edges this is always the interior half-edge.
    #[inline]
    pub fn edge_halfedge(&self, e: EdgeId) -> HalfEdgeId {
        self.edges[e.index()]
    }

    // ==================== Topology Queries ====================

    /// Get the twin (opposite) half-edge.
    #[inline]
    pub fn twin(&self, he: HalfEdgeId) -> HalfEdgeId {
        self.halfedge(he).twin
    }

    /// Get the next half-edge around the face.
    #[inline]
    pub fn next(&self, he: HalfEdgeId) -> HalfEdgeId {
        self.halfedge(he).next
    }

    /// Get the previous half-edge around the face.
    #[inline]
    pub fn prev(&self, he: HalfEdgeId) -> HalfEdgeId {
        self.halfedge(he).prev
    }

    /// Get the origin vertex of a half-edge.
    #[inline]
    pub fn origin(&self, he: HalfEdgeId) -> VertexId {
        self.halfedge(he).origin
    }

    /// Get the destination vertex of a half-edge.
    #[inline]
    pub fn dest(&self, he: HalfEdgeId) -> VertexId {
        self.origin(self.twin(he))
    }

    /// Get the face of a half-edge.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId) -> FaceId {
        self.halfedge(he).face
    }

    /// Get the undirected edge of a half-edge.
    #[inline]
    pub fn edge_of(&self, he: HalfEdgeId) -> EdgeId {
        self.halfedge(he).edge
    }

    /// Whether `he` is the canonical half-edge of its edge.
    #[inline]
    pub fn is_canonical(&self, he: HalfEdgeId) -> bool {
        self.edge_halfedge(self.edge_of(he)) == he
    }

    /// Check if a half-edge is on the boundary.
    #[inline]
    pub fn is_boundary_halfedge(&self, he: HalfEdgeId) -> bool {
        self.halfedge(he).is_boundary()
    }

    /// Check if a vertex is on the boundary.
    pub fn is_boundary_vertex(&self, v: VertexId) -> bool {
        let he = self.vertex(v).halfedge;
        // Boundary vertices store a boundary half-edge.
        !he.is_valid() || self.is_boundary_halfedge(he)
    }

    /// Check if an edge (represented by one of its half-edges) is on the boundary.
    #[inline]
    pub fn is_boundary_edge(&self, he: HalfEdgeId) -> bool {
        self.is_boundary_halfedge(he) || self.is_boundary_halfedge(self.twin(he))
    }

    /// Whether the mesh has no boundary.
    pub fn is_closed(&self) -> bool {
        self.halfedges.iter().all(|he| !he.is_boundary())
    }

    /// Euler characteristic `V - E + F`.
    pub fn euler_characteristic(&self) -> i64 {
        self.num_vertices() as i64 - self.num_edges() as i64 + self.num_faces() as i64
    }

    /// Boundary loops, each as the sequence of its boundary half-edges.
    ///
    /// Loops are reported in order of their smallest half-edge index.
    pub fn boundary_loops(&self) -> Vec<Vec<HalfEdgeId>> {
        let mut visited = vec![false; self.num_halfedges()];
        let mut loops = Vec::new();

        for he in self.halfedge_ids() {
            if visited[he.index()] || !self.is_boundary_halfedge(he) {
                continue;
            }
            let mut boundary = Vec::new();
            let mut cur = he;
            while !visited[cur.index()] {
                visited[cur.index()] = true;
                boundary.push(cur);
                cur = self.next(cur);
            }
            loops.push(boundary);
        }

        loops
    }

    // ==================== Iteration ====================

    /// Iterate over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len()).map(VertexId::new)
    }

    /// Iterate over all half-edge IDs.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
        (0..self.halfedges.len()).map(HalfEdgeId::new)
    }

    /// Iterate over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        (0..self.faces.len()).map(FaceId::new)
    }

    /// Iterate over all undirected edge IDs.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.edges.len()).map(EdgeId::new)
    }

    /// Iterate over outgoing half-edges around a vertex (clockwise).
    pub fn vertex_halfedges(&self, v: VertexId) -> VertexHalfEdgeIter<'_> {
        VertexHalfEdgeIter::new(self, v)
    }

    /// Iterate over vertices adjacent to a vertex.
    pub fn vertex_neighbors(&self, v: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.vertex_halfedges(v).map(|he| self.dest(he))
    }

    /// Iterate over faces adjacent to a vertex.
    pub fn vertex_faces(&self, v: VertexId) -> impl Iterator<Item = FaceId> + '_ {
        self.vertex_halfedges(v)
            .map(|he| self.face_of(he))
            .filter(|f| f.is_valid())
    }

    /// Iterate over half-edges around a face.
    pub fn face_halfedges(&self, f: FaceId) -> FaceHalfEdgeIter<'_> {
        FaceHalfEdgeIter::new(self, f)
    }

    /// The three half-edges of a face, starting at its first corner.
    pub fn face_halfedge_array(&self, f: FaceId) -> [HalfEdgeId; 3] {
        let he0 = self.face(f).halfedge;
        let he1 = self.next(he0);
        [he0, he1, self.next(he1)]
    }

    /// Get the three vertices of a triangular face.
    pub fn face_triangle(&self, f: FaceId) -> [VertexId; 3] {
        let [he0, he1, he2] = self.face_halfedge_array(f);
        [self.origin(he0), self.origin(he1), self.origin(he2)]
    }

    /// Get the positions of the three vertices of a triangular face.
    pub fn face_positions(&self, f: FaceId) -> [Point3<f64>; 3] {
        let [v0, v1, v2] = self.face_triangle(f);
        [*self.position(v0), *self.position(v1), *self.position(v2)]
    }

    /// Local corner index (0..3) of a vertex within a face.
    pub fn corner_of(&self, f: FaceId, v: VertexId) -> Option<usize> {
        self.face_triangle(f).iter().position(|&w| w == v)
    }

    /// Faces on both sides of a half-edge (`face_of(he)`, `face_of(twin(he))`).
    #[inline]
    pub fn adjacent_faces(&self, he: HalfEdgeId) -> (FaceId, FaceId) {
        (self.face_of(he), self.face_of(self.twin(he)))
    }

    // ==================== Geometry ====================

    /// Compute the unit normal of a face.
    pub fn face_normal(&self, f: FaceId) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        (p1 - p0).cross(&(p2 - p0)).normalize()
    }

    /// Compute the area of a face.
    pub fn face_area(&self, f: FaceId) -> f64 {
        let [p0, p1, p2] = self.face_positions(f);
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Compute the area-weighted normal at a vertex.
    pub fn vertex_normal(&self, v: VertexId) -> Vector3<f64> {
        let mut normal = Vector3::zeros();
        for f in self.vertex_faces(v) {
            let [p0, p1, p2] = self.face_positions(f);
            normal += (p1 - p0).cross(&(p2 - p0));
        }
        normal.normalize()
    }

    /// Compute the length of an edge.
    pub fn edge_length(&self, he: HalfEdgeId) -> f64 {
        self.edge_vector(he).norm()
    }

    /// Compute the edge vector (from origin to destination).
    pub fn edge_vector(&self, he: HalfEdgeId) -> Vector3<f64> {
        self.position(self.dest(he)) - self.position(self.origin(he))
    }

    /// Angle between the normals of the two faces of an edge, in radians.
    ///
    /// Zero for a flat edge, `None` on the boundary.
    pub fn dihedral_angle(&self, he: HalfEdgeId) -> Option<f64> {
        let (f0, f1) = self.adjacent_faces(he);
        if !f0.is_valid() || !f1.is_valid() {
            return None;
        }
        let cos = self.face_normal(f0).dot(&self.face_normal(f1));
        Some(cos.clamp(-1.0, 1.0).acos())
    }

    /// Interior angle of a face at the origin of `he`.
    pub fn corner_angle(&self, he: HalfEdgeId) -> f64 {
        let a = self.edge_vector(he);
        let b = -self.edge_vector(self.prev(he));
        let cos = a.dot(&b) / (a.norm() * b.norm());
        cos.clamp(-1.0, 1.0).acos()
    }

    /// Sum of the interior angles incident to a vertex.
    pub fn vertex_angle_sum(&self, v: VertexId) -> f64 {
        self.vertex_halfedges(v)
            .filter(|&he| !self.is_boundary_halfedge(he))
            .map(|he| self.corner_angle(he))
            .sum()
    }

    /// Discrete Gaussian curvature integrated over a vertex's dual cell.
    ///
    /// `2π - Σθ` for interior vertices, `π - Σθ` on the boundary. Summed over
    /// all vertices this equals `2π χ`.
    pub fn angle_defect(&self, v: VertexId) -> f64 {
        let total = if self.is_boundary_vertex(v) { PI } else { 2.0 * PI };
        total - self.vertex_angle_sum(v)
    }

    /// Compute the valence (degree) of a vertex.
    pub fn valence(&self, v: VertexId) -> usize {
        self.vertex_halfedges(v).count()
    }

    /// Compute the centroid of a face.
    pub fn face_centroid(&self, f: FaceId) -> Point3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        Point3::from((p0.coords + p1.coords + p2.coords) / 3.0)
    }

    /// Compute the bounding box of the mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let mut min = first;
        let mut max = first;

        for v in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(v.position[i]);
                max[i] = max[i].max(v.position[i]);
            }
        }

        Some((min, max))
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.face_ids().map(|f| self.face_area(f)).sum()
    }

    /// Average edge length.
    pub fn mean_edge_length(&self) -> f64 {
        if self.edges.is_empty() {
            return 0.0;
        }
        let total: f64 = self.edges.iter().map(|&he| self.edge_length(he)).sum();
        total / self.edges.len() as f64
    }

    // ==================== Construction ====================

    /// Add a new vertex and return its ID.
    pub(crate) fn add_vertex(&mut self, position: Point3<f64>) -> VertexId {
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::new(position));
        id
    }

    // ==================== Validation ====================

    /// Check if the mesh is valid (all connectivity is consistent).
    pub fn is_valid(&self) -> bool {
        for (i, v) in self.vertices.iter().enumerate() {
            if !v.halfedge.is_valid() || self.halfedge(v.halfedge).origin.index() != i {
                return false;
            }
        }

        for (i, he) in self.halfedges.iter().enumerate() {
            let id = HalfEdgeId::new(i);
            if !he.twin.is_valid() || self.halfedge(he.twin).twin != id {
                return false;
            }
            if self.halfedge(he.next).prev != id || self.halfedge(he.prev).next != id {
                return false;
            }
            if he.edge.index() >= self.edges.len() || self.edge_of(he.twin) != he.edge {
                return false;
            }
        }

        self.faces.iter().all(|f| f.halfedge.is_valid())
    }
}

/// Iterator over outgoing half-edges around a vertex.
pub struct VertexHalfEdgeIter<'a> {
    mesh: &'a HalfEdgeMesh,
    start: HalfEdgeId,
    current: HalfEdgeId,
    done: bool,
}

impl<'a> VertexHalfEdgeIter<'a> {
    fn new(mesh: &'a HalfEdgeMesh, v: VertexId) -> Self {
        let start = mesh.vertex(v).halfedge;
        Self {
            mesh,
            start,
            current: start,
            done: !start.is_valid(),
        }
    }
}

impl Iterator for VertexHalfEdgeIter<'_> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;

        // If he goes v -> w, twin(he) goes w -> v and next(twin(he)) leaves v again.
        self.current = self.mesh.next(self.mesh.twin(self.current));

        if self.current == self.start {
            self.done = true;
        }

        Some(result)
    }
}

/// Iterator over half-edges around a face.
pub struct FaceHalfEdgeIter<'a> {
    mesh: &'a HalfEdgeMesh,
    start: HalfEdgeId,
    current: HalfEdgeId,
    done: bool,
}

impl<'a> FaceHalfEdgeIter<'a> {
    fn new(mesh: &'a HalfEdgeMesh, f: FaceId) -> Self {
        let start = mesh.face(f).halfedge;
        Self {
            mesh,
            start,
            current: start,
            done: !start.is_valid(),
        }
    }
}

impl Iterator for FaceHalfEdgeIter<'_> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;
        self.current = self.mesh.next(self.current);

        if self.current == self.start {
            self.done = true;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_meshes::{cube, flat_grid, open_cylinder};

    #[test]
    fn test_empty_mesh() {
        let mesh = HalfEdgeMesh::new();
        assert_eq!(mesh.num_vertices(), 0);
        assert_eq!(mesh.num_faces(), 0);
        assert!(mesh.is_valid());
        assert!(mesh.bounding_box().is_none());
    }

    #[test]
    fn test_cube_topology() {
        let mesh = cube();
        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.num_faces(), 12);
        assert_eq!(mesh.num_edges(), 18);
        assert_eq!(mesh.euler_characteristic(), 2);
        assert!(mesh.is_closed());
        assert!(mesh.boundary_loops().is_empty());
    }

    #[test]
    fn test_grid_boundary() {
        let mesh = flat_grid(4, 1.0);
        assert_eq!(mesh.euler_characteristic(), 1);
        let loops = mesh.boundary_loops();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 16);

        let corner = VertexId::new(0);
        assert!(mesh.is_boundary_vertex(corner));
        assert!((mesh.angle_defect(corner) - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_cylinder_has_two_loops() {
        let mesh = open_cylinder(12, 3);
        assert_eq!(mesh.euler_characteristic(), 0);
        assert_eq!(mesh.boundary_loops().len(), 2);
    }

    #[test]
    fn test_gauss_bonnet_on_cube() {
        let mesh = cube();
        let total: f64 = mesh.vertex_ids().map(|v| mesh.angle_defect(v)).sum();
        assert!((total - 4.0 * PI).abs() < 1e-10);
    }

    #[test]
    fn test_one_ring_is_clockwise() {
        let mesh = flat_grid(2, 1.0);
        // Center vertex of a 2x2 grid.
        let v = VertexId::new(4);
        let p = *mesh.position(v);
        let dirs: Vec<Vector3<f64>> = mesh
            .vertex_halfedges(v)
            .map(|he| mesh.position(mesh.dest(he)) - p)
            .collect();
        for w in dirs.windows(2) {
            // Clockwise around +z: cross product points down.
            assert!(w[0].cross(&w[1]).z < 0.0);
        }
    }

    #[test]
    fn test_cube_dihedral_angles() {
        let mesh = cube();
        let mut sharp = 0;
        for e in mesh.edge_ids() {
            let angle = mesh.dihedral_angle(mesh.edge_halfedge(e)).unwrap_or(0.0);
            if angle > 1.0 {
                assert!((angle - PI / 2.0).abs() < 1e-12);
                sharp += 1;
            } else {
                assert!(angle.abs() < 1e-12);
            }
        }
        assert_eq!(sharp, 12);
    }
}
