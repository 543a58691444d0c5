//! Mesh construction utilities.
//!
//! This module builds half-edge meshes from face-vertex lists. Construction is
//! deterministic: half-edges, boundary half-edges and edges are numbered in
//! face order, so the same input always yields the same mesh.

use std::collections::HashMap;

use nalgebra::Point3;

use super::halfedge::{Face, HalfEdge, HalfEdgeMesh};
use super::index::{EdgeId, FaceId, HalfEdgeId, VertexId};
use super::repair;
use crate::error::{RemeshError, Result};

/// Build a half-edge mesh from vertices and triangle faces.
///
/// The input must already be a consistently oriented manifold: every vertex
/// referenced, every edge shared by at most two faces traversing it in
/// opposite directions, and a single fan of faces around every vertex. Use
/// [`build_from_soup`] for input that may need repair.
///
/// # Arguments
/// * `vertices` - List of vertex positions
/// * `faces` - List of triangle faces, each as [v0, v1, v2] indices
///
/// # Returns
/// A half-edge mesh, or an error if the input is invalid.
///
/// # Example
/// ```
/// use quadify::mesh::build_from_triangles;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_edges(), 3);
/// ```
pub fn build_from_triangles(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<HalfEdgeMesh> {
    if faces.is_empty() || vertices.is_empty() {
        return Err(RemeshError::EmptyMesh);
    }

    // Validate vertex indices
    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(RemeshError::InvalidVertexIndex {
                    face: fi,
                    vertex: vi as i64,
                });
            }
        }
    }
    repair::check_faces(vertices, faces)?;
    repair::check_manifold_edges(faces)?;

    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), faces.len());

    for &pos in vertices {
        mesh.add_vertex(pos);
    }

    // Map from directed edge (v0, v1) to half-edge ID
    let mut edge_map: HashMap<(usize, usize), HalfEdgeId> = HashMap::with_capacity(faces.len() * 3);
    let mut outgoing = vec![0usize; vertices.len()];

    // First pass: create all face half-edges
    for (fi, face) in faces.iter().enumerate() {
        let base = mesh.num_halfedges();
        let face_id = FaceId::new(fi);
        mesh.faces.push(Face::new(HalfEdgeId::new(base)));

        for k in 0..3 {
            let he = HalfEdgeId::new(base + k);
            mesh.halfedges.push(HalfEdge {
                origin: VertexId::new(face[k]),
                next: HalfEdgeId::new(base + (k + 1) % 3),
                prev: HalfEdgeId::new(base + (k + 2) % 3),
                face: face_id,
                ..HalfEdge::new()
            });

            let v = face[k];
            if !mesh.vertices[v].halfedge.is_valid() {
                mesh.vertices[v].halfedge = he;
            }
            outgoing[v] += 1;

            let key = (face[k], face[(k + 1) % 3]);
            if edge_map.insert(key, he).is_some() {
                // Two faces traverse the edge the same way.
                return Err(RemeshError::InconsistentWinding { face: fi });
            }
        }
    }

    if let Some(vi) = mesh.vertices.iter().position(|v| !v.halfedge.is_valid()) {
        return Err(RemeshError::InvalidState(format!(
            "vertex {vi} is not referenced by any face"
        )));
    }

    // Second pass: link twins in half-edge order, creating boundary half-edges
    let num_face_halfedges = mesh.num_halfedges();
    for i in 0..num_face_halfedges {
        let he = HalfEdgeId::new(i);
        if mesh.twin(he).is_valid() {
            continue;
        }
        let v0 = mesh.origin(he);
        let v1 = mesh.origin(mesh.next(he));

        if let Some(&twin) = edge_map.get(&(v1.index(), v0.index())) {
            mesh.halfedge_mut(he).twin = twin;
            mesh.halfedge_mut(twin).twin = he;
        } else {
            let boundary_he = HalfEdgeId::new(mesh.num_halfedges());
            mesh.halfedges.push(HalfEdge {
                origin: v1,
                twin: he,
                ..HalfEdge::new()
            });
            mesh.halfedge_mut(he).twin = boundary_he;
            outgoing[v1.index()] += 1;
        }
    }

    link_boundary_loops(&mut mesh)?;
    fix_boundary_vertex_halfedges(&mut mesh);
    index_edges(&mut mesh);

    // Every outgoing half-edge must be reachable from the stored one.
    for v in mesh.vertex_ids() {
        if mesh.valence(v) != outgoing[v.index()] {
            return Err(RemeshError::NonManifoldVertex { vertex: v.index() });
        }
    }

    Ok(mesh)
}

/// Link boundary half-edges into proper loops.
fn link_boundary_loops(mesh: &mut HalfEdgeMesh) -> Result<()> {
    let boundary_hes: Vec<HalfEdgeId> = mesh
        .halfedge_ids()
        .filter(|&he| mesh.is_boundary_halfedge(he))
        .collect();

    // Outgoing boundary half-edge per vertex
    let mut outgoing = vec![HalfEdgeId::invalid(); mesh.num_vertices()];
    for &he in &boundary_hes {
        let origin = mesh.origin(he).index();
        if outgoing[origin].is_valid() {
            return Err(RemeshError::NonManifoldVertex { vertex: origin });
        }
        outgoing[origin] = he;
    }

    // The next boundary half-edge starts where this one ends
    for &he in &boundary_hes {
        let next_he = outgoing[mesh.dest(he).index()];
        mesh.halfedge_mut(he).next = next_he;
        mesh.halfedge_mut(next_he).prev = he;
    }

    Ok(())
}

/// Ensure boundary vertices point to a boundary half-edge.
fn fix_boundary_vertex_halfedges(mesh: &mut HalfEdgeMesh) {
    let num_face_halfedges = 3 * mesh.num_faces();
    for i in num_face_halfedges..mesh.num_halfedges() {
        let he = HalfEdgeId::new(i);
        let v = mesh.origin(he);
        mesh.vertices[v.index()].halfedge = he;
    }
}

/// Number undirected edges in order of their first half-edge.
///
/// Face half-edges precede boundary half-edges, so the canonical half-edge
/// of a boundary edge is always its interior side.
fn index_edges(mesh: &mut HalfEdgeMesh) {
    mesh.edges.clear();
    for i in 0..mesh.num_halfedges() {
        let he = HalfEdgeId::new(i);
        if mesh.edge_of(he).is_valid() {
            continue;
        }
        let e = EdgeId::new(mesh.edges.len());
        mesh.edges.push(he);
        let twin = mesh.twin(he);
        mesh.halfedge_mut(he).edge = e;
        mesh.halfedge_mut(twin).edge = e;
    }
}

/// Summary of the repairs made by [`build_from_soup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoupRepair {
    /// Input vertices not referenced by any face.
    pub unreferenced_vertices: usize,
    /// Faces whose winding was flipped.
    pub flipped_faces: usize,
    /// Vertex copies created to separate face fans.
    pub split_vertices: usize,
}

/// Build a half-edge mesh from an unchecked triangle soup.
///
/// Validates indices and coordinates, drops unreferenced vertices, rejects
/// degenerate faces and non-manifold edges, repairs winding and splits
/// non-manifold vertices. Negative indices are reported as
/// [`RemeshError::InvalidVertexIndex`].
///
/// # Example
/// ```
/// use quadify::mesh::build_from_soup;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// // The second face is wound the wrong way.
/// let faces: Vec<[i64; 3]> = vec![[0, 1, 2], [2, 0, 3]];
///
/// let (mesh, repair) = build_from_soup(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_faces(), 2);
/// assert_eq!(repair.flipped_faces, 1);
/// ```
pub fn build_from_soup(
    vertices: &[Point3<f64>],
    faces: &[[i64; 3]],
) -> Result<(HalfEdgeMesh, SoupRepair)> {
    let faces = repair::check_indices(vertices, faces)?;
    repair::check_faces(vertices, &faces)?;
    repair::check_manifold_edges(&faces)?;

    let (mut positions, mut faces, origin) = repair::compact_soup(vertices, &faces);
    let unreferenced_vertices = vertices.len() - origin.len();

    let flipped_faces = repair::orient_faces(&mut faces)?;
    let split_vertices = repair::split_nonmanifold_vertices(&mut positions, &mut faces);

    let mesh = build_from_triangles(&positions, &faces)?;
    log::debug!(
        "built mesh: {} vertices, {} faces ({} unreferenced dropped, {} flipped, {} split)",
        mesh.num_vertices(),
        mesh.num_faces(),
        unreferenced_vertices,
        flipped_faces,
        split_vertices
    );

    Ok((
        mesh,
        SoupRepair {
            unreferenced_vertices,
            flipped_faces,
            split_vertices,
        },
    ))
}

/// Convert a half-edge mesh back to a face-vertex representation.
///
/// Returns (vertices, faces) tuple.
pub fn to_face_vertex(mesh: &HalfEdgeMesh) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let vertices: Vec<Point3<f64>> = mesh.vertex_ids().map(|v| *mesh.position(v)).collect();

    let faces: Vec<[usize; 3]> = mesh
        .face_ids()
        .map(|f| {
            let [v0, v1, v2] = mesh.face_triangle(f);
            [v0.index(), v1.index(), v2.index()]
        })
        .collect();

    (vertices, faces)
}
