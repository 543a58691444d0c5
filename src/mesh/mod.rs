//! Core mesh data structures.
//!
//! This module provides the half-edge mesh representation used by every
//! remeshing stage, together with the builders that turn a triangle soup into
//! one.
//!
//! # Overview
//!
//! The primary type is [`HalfEdgeMesh`], which represents a manifold triangle
//! mesh using a half-edge (doubly-connected edge list) data structure. This
//! representation provides O(1) adjacency queries.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe `u32` index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`HalfEdgeId`] - Identifies a half-edge
//! - [`FaceId`] - Identifies a face
//! - [`EdgeId`] - Identifies an undirected edge
//!
//! # Construction
//!
//! [`build_from_triangles`] accepts clean, consistently oriented input.
//! [`build_from_soup`] validates arbitrary index triples and repairs what can
//! be repaired (see [`repair`]):
//!
//! ```
//! use quadify::mesh::build_from_soup;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0_i64, 1, 2]];
//!
//! let (mesh, _repair) = build_from_soup(&vertices, &faces).unwrap();
//! assert_eq!(mesh.euler_characteristic(), 1);
//! ```

mod builder;
mod halfedge;
mod index;
pub mod repair;

#[cfg(test)]
pub(crate) mod test_meshes;

pub use builder::{build_from_soup, build_from_triangles, to_face_vertex, SoupRepair};
pub use halfedge::{Face, FaceHalfEdgeIter, HalfEdge, HalfEdgeMesh, Vertex, VertexHalfEdgeIter};
pub use index::{EdgeId, FaceId, HalfEdgeId, VertexId};
