//! Error types for quadify.
//!
//! Fatal conditions are reported through [`RemeshError`]. Only malformed input
//! (and a result with no quads at all) ever reaches the caller of
//! [`remesh`](crate::remesh); every later-stage difficulty is downgraded to a
//! [`ConvergenceWarning`] collected in the [`RemeshReport`](crate::RemeshReport).

use std::fmt;

use thiserror::Error;

/// Result type alias using [`RemeshError`].
pub type Result<T> = std::result::Result<T, RemeshError>;

/// Errors that can occur while building or remeshing a mesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemeshError {
    /// The mesh has no vertices or no faces.
    #[error("input mesh is empty")]
    EmptyMesh,

    /// A face references a vertex index outside the vertex array.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The offending vertex index (may be negative).
        vertex: i64,
    },

    /// A face repeats a vertex or has (near) zero area.
    #[error("face {face} is degenerate")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// An edge has more than two incident faces.
    #[error("edge ({v0}, {v1}) has more than two incident faces")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// Several face fans meet at a vertex.
    ///
    /// [`build_from_soup`](crate::mesh::build_from_soup) repairs this by
    /// splitting the vertex; the strict builder rejects it.
    #[error("vertex {vertex} joins more than one fan of faces")]
    NonManifoldVertex {
        /// The vertex index.
        vertex: usize,
    },

    /// Face winding cannot be made consistent (non-orientable surface).
    #[error("face {face} cannot be oriented consistently with its neighbors")]
    InconsistentWinding {
        /// A face on the conflicting cycle.
        face: usize,
    },

    /// A vertex coordinate is NaN or infinite.
    #[error("vertex {vertex} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// The vertex index.
        vertex: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// Invalid internal state for the requested operation.
    #[error("invalid mesh state: {0}")]
    InvalidState(String),

    /// An iterative solver failed to converge.
    #[error("algorithm failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// A singularity solve found no feasible assignment.
    ///
    /// Never returned by [`remesh`](crate::remesh); the optimizer recovers
    /// from it by falling back to a weaker strategy.
    #[error("singularity solve infeasible: {reason}")]
    SolverInfeasible {
        /// What made the problem infeasible.
        reason: String,
    },

    /// Extraction produced no quads.
    #[error("remeshing produced an empty mesh")]
    EmptyResult,
}

impl RemeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        RemeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create an infeasibility error.
    pub(crate) fn infeasible(reason: impl Into<String>) -> Self {
        RemeshError::SolverInfeasible {
            reason: reason.into(),
        }
    }

    /// Whether this error belongs to the invalid-input category.
    ///
    /// These are the only errors raised before any field computation runs.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            RemeshError::EmptyMesh
                | RemeshError::InvalidVertexIndex { .. }
                | RemeshError::DegenerateFace { .. }
                | RemeshError::NonManifoldEdge { .. }
                | RemeshError::NonManifoldVertex { .. }
                | RemeshError::InconsistentWinding { .. }
                | RemeshError::NonFiniteCoordinate { .. }
                | RemeshError::InvalidParameter { .. }
        )
    }
}

/// A non-fatal condition observed during remeshing.
///
/// The best available result is still returned; warnings are collected in the
/// report and also logged at `warn` level.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvergenceWarning {
    /// Orientation smoothing hit its iteration cap on a hierarchy level.
    OrientationNotConverged {
        /// Hierarchy level (0 = finest).
        level: usize,
        /// Iterations performed.
        iterations: usize,
        /// Largest per-face direction change in the last sweep (radians).
        max_change: f64,
    },
    /// Field re-smoothing after singularity cancellation hit its cap.
    FieldResmoothNotConverged {
        /// Iterations performed.
        iterations: usize,
    },
    /// The chart relaxation solve did not converge; integrated charts are kept.
    RelaxationNotConverged {
        /// Iterations attempted.
        iterations: usize,
    },
    /// Some regular vertices still carry a translational defect.
    UnresolvedDislocations {
        /// Number of affected vertices.
        count: usize,
    },
    /// A solver gave up and a weaker strategy was used instead.
    SolverFallback {
        /// Which problem was being solved.
        channel: &'static str,
        /// Why the preferred strategy was abandoned.
        reason: String,
    },
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceWarning::OrientationNotConverged {
                level,
                iterations,
                max_change,
            } => write!(
                f,
                "orientation field on level {level} not converged after {iterations} iterations (max change {max_change:.2e} rad)"
            ),
            ConvergenceWarning::FieldResmoothNotConverged { iterations } => write!(
                f,
                "field re-smoothing not converged after {iterations} iterations"
            ),
            ConvergenceWarning::RelaxationNotConverged { iterations } => write!(
                f,
                "chart relaxation not converged after {iterations} iterations"
            ),
            ConvergenceWarning::UnresolvedDislocations { count } => {
                write!(f, "{count} vertices keep an unresolved grid dislocation")
            }
            ConvergenceWarning::SolverFallback { channel, reason } => {
                write!(f, "{channel} solve fell back: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_param_display() {
        let err = RemeshError::invalid_param("target_faces", 0, "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid parameter: target_faces = 0 (must be positive)"
        );
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_internal_errors_are_not_input_errors() {
        assert!(!RemeshError::infeasible("capacity").is_invalid_input());
        assert!(!RemeshError::EmptyResult.is_invalid_input());
        assert!(!RemeshError::ConvergenceFailed { iterations: 3 }.is_invalid_input());
    }

    #[test]
    fn test_warning_display() {
        let w = ConvergenceWarning::UnresolvedDislocations { count: 2 };
        assert_eq!(w.to_string(), "2 vertices keep an unresolved grid dislocation");
    }
}
