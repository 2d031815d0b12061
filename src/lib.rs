//! # Fairing
//!
//! Laplacian-family smoothing for triangle meshes.
//!
//! Fairing builds a sparse, row-normalized Laplacian operator from mesh
//! connectivity and runs iterative smoothing filters with it:
//!
//! - **Plain Laplacian diffusion**, explicit or implicit, optionally
//!   rescaled to keep the enclosed volume
//! - **Humphrey's classes**, which pulls every step back toward the original
//!   shape
//! - **Taubin λ|ν**, alternating shrink and inflate steps
//! - **Mutable diffusion**, with per-vertex step sizes adapted to curvature
//!   and a volume correction along vertex normals
//!
//! Filters work against the [`SurfaceMesh`](mesh::SurfaceMesh) trait and
//! write the smoothed positions back only when every iteration succeeded.
//!
//! ## Quick Start
//!
//! ```
//! use fairing::prelude::*;
//!
//! let mut mesh = primitives::icosphere(2, 1.0);
//! let volume = mesh.volume();
//!
//! // Build the operator once and reuse it across filters.
//! let operator = laplacian_calculation(&mesh, true, &[]).unwrap();
//!
//! filter_taubin(&mut mesh, &TaubinOptions::default(), Some(&operator)).unwrap();
//! filter_laplacian(&mut mesh, &LaplacianOptions::default(), Some(&operator)).unwrap();
//!
//! assert!(((mesh.volume() - volume) / volume).abs() < 0.05);
//! ```
//!
//! ## Pinning Vertices
//!
//! Pinned vertices get identity rows in the operator, so filters that do not
//! rescale the mesh leave them in place:
//!
//! ```
//! use fairing::prelude::*;
//!
//! let mut mesh = primitives::grid(8, 0.25);
//! let boundary: Vec<usize> = (0..=8).collect();
//! let operator = laplacian_calculation(&mesh, false, &boundary).unwrap();
//!
//! let before = mesh.vertices()[3];
//! let options = LaplacianOptions::default().without_volume_constraint();
//! filter_laplacian(&mut mesh, &options, Some(&operator)).unwrap();
//! assert_eq!(mesh.vertices()[3], before);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use fairing::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::normals::{get_vertices_normals, NormalWeighting};
    pub use crate::algo::operator::{
        laplacian_calculation, LaplacianOperator, OperatorOptions, Weighting,
    };
    pub use crate::algo::progress::{Progress, ProgressStep};
    pub use crate::algo::smooth::{
        filter_humphrey, filter_laplacian, filter_mut_dif_laplacian, filter_taubin, Filter,
        HumphreyOptions, Integration, LaplacianOptions, MutableDiffusionOptions, TaubinOptions,
    };
    pub use crate::algo::volume::{dilate_slope, enclosed_volume};
    pub use crate::error::{Result, SmoothError};
    pub use crate::mesh::{primitives, SurfaceMesh, TriMesh};
}

// Re-export nalgebra types for convenience
pub use nalgebra;
