//! Error types for fairing.
//!
//! Every numerical edge case the filters can hit is reported through
//! [`SmoothError`] instead of being allowed to leak NaN or infinite values
//! into the mesh.

use std::fmt;

use thiserror::Error;

/// Result type alias using [`SmoothError`].
pub type Result<T> = std::result::Result<T, SmoothError>;

/// Errors that can occur while building operators or smoothing a mesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmoothError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices (degenerate triangle).
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A vertex that is not pinned has no neighbors, so its Laplacian row
    /// cannot be normalized.
    #[error("vertex {vertex} has no neighbors and is not pinned")]
    InvalidTopology {
        /// The isolated vertex.
        vertex: usize,
    },

    /// A pinned vertex index is outside the mesh.
    #[error("pinned vertex {vertex} is out of range (mesh has {num_vertices} vertices)")]
    PinnedVertexOutOfRange {
        /// The requested vertex.
        vertex: usize,
        /// Number of vertices in the mesh.
        num_vertices: usize,
    },

    /// An operator or buffer does not match the mesh it is applied to.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected length (usually the vertex count).
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// The enclosed volume became zero, non-finite, or changed sign relative
    /// to the volume the filter is trying to preserve.
    #[error("degenerate volume {volume} (target volume {initial})")]
    DegenerateVolume {
        /// The offending volume.
        volume: f64,
        /// The volume captured before smoothing started.
        initial: f64,
    },

    /// A geometric quantity needed by a filter is ill-defined.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(GeometryDefect),

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

    /// The implicit integration system could not be factored, or its
    /// solution is not finite.
    #[error("linear solve failed: {reason}")]
    SolveFailed {
        /// What went wrong.
        reason: String,
    },
}

/// The specific kind of [`SmoothError::DegenerateGeometry`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryDefect {
    /// The incident face normals of a vertex cancel out (or the vertex has
    /// no incident faces).
    ZeroNormal {
        /// The vertex whose normal is undefined.
        vertex: usize,
    },

    /// Displacing the surface along its normals did not change the volume,
    /// so the dilation slope has a zero denominator.
    FlatDilation {
        /// Probe length used for the finite difference.
        epsilon: f64,
        /// Volume before the probe.
        volume: f64,
    },

    /// An iteration diverged and moved a vertex to a NaN or infinite
    /// position.
    NonFinitePosition {
        /// The first vertex with a non-finite coordinate.
        vertex: usize,
    },
}

impl fmt::Display for GeometryDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryDefect::ZeroNormal { vertex } => {
                write!(f, "vertex {vertex} has a zero-length normal")
            }
            GeometryDefect::FlatDilation { epsilon, volume } => write!(
                f,
                "volume {volume} does not respond to a normal offset of {epsilon}"
            ),
            GeometryDefect::NonFinitePosition { vertex } => {
                write!(f, "vertex {vertex} moved to a non-finite position")
            }
        }
    }
}

impl SmoothError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: fmt::Display>(name: &'static str, value: T, reason: &'static str) -> Self {
        SmoothError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

/// Reject NaN and infinite parameter values.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SmoothError::invalid_param(name, value, "must be finite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("lambda", 0.5).is_ok());
        assert!(matches!(
            ensure_finite("lambda", f64::NAN),
            Err(SmoothError::InvalidParameter { name: "lambda", .. })
        ));
        assert!(ensure_finite("nu", f64::INFINITY).is_err());
    }

    #[test]
    fn test_messages() {
        let err = SmoothError::DegenerateGeometry(GeometryDefect::ZeroNormal { vertex: 7 });
        assert_eq!(err.to_string(), "degenerate geometry: vertex 7 has a zero-length normal");

        let err = SmoothError::DegenerateGeometry(GeometryDefect::NonFinitePosition { vertex: 2 });
        assert_eq!(
            err.to_string(),
            "degenerate geometry: vertex 2 moved to a non-finite position"
        );

        let err = SmoothError::InvalidTopology { vertex: 3 };
        assert_eq!(err.to_string(), "vertex 3 has no neighbors and is not pinned");
    }
}
