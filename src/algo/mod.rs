//! Smoothing algorithms and the numerical building blocks they share.
//!
//! - **Operator**: neighbor weights and the row-normalized Laplacian
//! - **Smoothing**: Laplacian, Humphrey, Taubin and mutable-diffusion filters
//! - **Normals**: face and vertex normals
//! - **Volume**: enclosed volume, dilation slope and volume correction
//! - **Sparse**: CSR matrix products and the sparse LU solve used by
//!   implicit integration

pub mod normals;
pub mod operator;
pub mod progress;
pub mod smooth;
pub mod sparse;
pub mod volume;

pub use progress::{Progress, ProgressStep};
