//! Remeshing algorithms.
//!
//! Each stage of the pipeline lives in its own module, in the order
//! [`remesh`](crate::remesh) runs them:
//!
//! - **Hierarchy**: face clusters for multigrid smoothing
//! - **Curvature**: discrete curvature and principal directions
//! - **Scale**: target edge length field
//! - **Orientation**: 4-RoSy cross field and feature constraints
//! - **Parametrize**: matchings, singularities, chart integration, relaxation
//! - **Optimize**: singularity and dislocation routing
//! - **Extract**: quads from the integer grid
//!
//! [`progress`] carries the optional progress callback.

pub mod curvature;
pub mod extract;
pub mod hierarchy;
pub mod optimize;
pub mod orientation;
pub mod parametrize;
pub mod progress;
pub mod scale;
