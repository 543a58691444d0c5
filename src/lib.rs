//! # Quadify
//!
//! Field-guided quad remeshing of triangle meshes.
//!
//! Quadify turns a manifold triangle mesh into an all-quad mesh with roughly
//! a requested number of faces. The quads follow a smooth 4-fold direction
//! field, so they line up with curvature, sharp creases and boundaries.
//!
//! ## Pipeline
//!
//! - **Mesh**: half-edge structure with type-safe indices, built and repaired
//!   from a triangle soup ([`mesh`])
//! - **Hierarchy**: face clusters for multigrid smoothing
//!   ([`algo::hierarchy`])
//! - **Scale**: target edge length per vertex ([`algo::scale`])
//! - **Orientation**: smoothed cross field ([`algo::orientation`])
//! - **Parametrization**: matchings, singularities, chart integration and
//!   relaxation ([`algo::parametrize`])
//! - **Optimisation**: singularity and dislocation routing by minimum-cost
//!   flow or SAT ([`algo::optimize`])
//! - **Extraction**: tracing the integer grid into quads ([`algo::extract`])
//!
//! ## Quick Start
//!
//! ```
//! use quadify::prelude::*;
//!
//! // A unit square split into two triangles.
//! let vertices = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
//! let faces = [[0, 1, 2], [0, 2, 3]];
//!
//! let options = RemeshOptions::default().with_preserve_boundary(true).with_seed(3);
//! match remesh(&vertices, &faces, 4, &options) {
//!     Ok(output) => println!("{} quads", output.faces.len()),
//!     Err(err) => println!("remeshing failed: {}", err),
//! }
//! ```
//!
//! ## Working on the Half-Edge Mesh
//!
//! ```
//! use quadify::prelude::*;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//!
//! let faces = vec![
//!     [0, 2, 1],  // bottom
//!     [0, 1, 3],  // front
//!     [1, 2, 3],  // right
//!     [2, 0, 3],  // left
//! ];
//!
//! let mesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert_eq!(mesh.euler_characteristic(), 2);
//!
//! let v = VertexId::new(0);
//! for neighbor in mesh.vertex_neighbors(v) {
//!     println!("Neighbor: {:?}", neighbor);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;
mod remesh;

pub use error::{ConvergenceWarning, RemeshError, Result};
pub use remesh::{remesh, remesh_with_progress, RemeshOptions, RemeshOutput, RemeshReport};

/// Prelude module for convenient imports.
///
/// ```
/// use quadify::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::progress::Progress;
    pub use crate::error::{ConvergenceWarning, RemeshError, Result};
    pub use crate::mesh::{
        build_from_soup, build_from_triangles, to_face_vertex, EdgeId, FaceId, HalfEdgeId,
        HalfEdgeMesh, VertexId,
    };
    pub use crate::remesh::{remesh, remesh_with_progress, RemeshOptions, RemeshOutput, RemeshReport};
}

// Re-export nalgebra types for convenience
pub use nalgebra;
