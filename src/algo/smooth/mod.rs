//! Laplacian-family smoothing filters.
//!
//! All filters share the same shape:
//!
//! * parameters are validated before the mesh is touched,
//! * the Laplacian operator is either supplied by the caller or built with
//!   equal weights and no pinned vertices,
//! * iteration runs on a private copy of the positions, which is written
//!   back to the mesh once every iteration has succeeded.
//!
//! An error therefore always leaves the mesh exactly as it was.
//!
//! # Filters
//!
//! - [`filter_laplacian`]: plain diffusion, explicit or implicit, with an
//!   optional isotropic volume constraint
//! - [`filter_humphrey`]: Laplacian step followed by a pull back toward the
//!   original and previous positions
//! - [`filter_taubin`]: alternating shrink (λ) and inflate (ν) steps
//! - [`filter_mut_dif_laplacian`]: per-vertex step sizes adapted to local
//!   curvature, with an optional volume constraint along vertex normals
//!
//! # Example
//!
//! ```
//! use fairing::algo::operator::laplacian_calculation;
//! use fairing::algo::smooth::{filter_laplacian, LaplacianOptions};
//! use fairing::mesh::{primitives, SurfaceMesh};
//!
//! let mut mesh = primitives::icosphere(2, 1.0);
//! let volume = mesh.volume();
//!
//! let operator = laplacian_calculation(&mesh, true, &[]).unwrap();
//! let options = LaplacianOptions::default().with_iterations(5);
//! filter_laplacian(&mut mesh, &options, Some(&operator)).unwrap();
//!
//! assert!(((mesh.volume() - volume) / volume).abs() < 1e-6);
//! ```

mod humphrey;
mod laplacian;
mod mutable;
mod taubin;

use std::borrow::Cow;

use nalgebra::{Point3, Vector3};

pub use humphrey::{filter_humphrey, filter_humphrey_with_progress, HumphreyOptions};
pub use laplacian::{filter_laplacian, filter_laplacian_with_progress, Integration, LaplacianOptions};
pub use mutable::{
    filter_mut_dif_laplacian, filter_mut_dif_laplacian_with_progress, MutableDiffusionOptions,
};
pub use taubin::{filter_taubin, filter_taubin_with_progress, TaubinOptions};

use super::operator::{LaplacianOperator, OperatorOptions};
use super::progress::{Progress, ProgressStep};
use crate::error::{GeometryDefect, Result, SmoothError};
use crate::mesh::SurfaceMesh;

/// One of the smoothing filters together with its options.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// [`filter_laplacian`]
    Laplacian(LaplacianOptions),
    /// [`filter_humphrey`]
    Humphrey(HumphreyOptions),
    /// [`filter_taubin`]
    Taubin(TaubinOptions),
    /// [`filter_mut_dif_laplacian`]
    MutableDiffusion(MutableDiffusionOptions),
}

impl Filter {
    /// Short name used in logs and progress reports.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Laplacian(_) => laplacian::NAME,
            Filter::Humphrey(_) => humphrey::NAME,
            Filter::Taubin(_) => taubin::NAME,
            Filter::MutableDiffusion(_) => mutable::NAME,
        }
    }

    /// Requested iteration count.
    pub fn iterations(&self) -> usize {
        match self {
            Filter::Laplacian(o) => o.iterations,
            Filter::Humphrey(o) => o.iterations,
            Filter::Taubin(o) => o.iterations,
            Filter::MutableDiffusion(o) => o.iterations,
        }
    }

    /// Check the wrapped options.
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::Laplacian(o) => o.validate(),
            Filter::Humphrey(o) => o.validate(),
            Filter::Taubin(o) => o.validate(),
            Filter::MutableDiffusion(o) => o.validate(),
        }
    }

    /// Run the filter on `mesh`.
    ///
    /// ```
    /// use fairing::algo::smooth::{Filter, TaubinOptions};
    /// use fairing::mesh::primitives;
    ///
    /// let mut mesh = primitives::icosphere(1, 1.0);
    /// let filter = Filter::Taubin(TaubinOptions::default().with_iterations(6));
    /// filter.apply(&mut mesh, None).unwrap();
    /// ```
    pub fn apply<M: SurfaceMesh + ?Sized>(
        &self,
        mesh: &mut M,
        operator: Option<&LaplacianOperator>,
    ) -> Result<()> {
        self.apply_with_progress(mesh, operator, &Progress::none())
    }

    /// Run the filter on `mesh`, reporting every iteration.
    pub fn apply_with_progress<M: SurfaceMesh + ?Sized>(
        &self,
        mesh: &mut M,
        operator: Option<&LaplacianOperator>,
        progress: &Progress,
    ) -> Result<()> {
        match self {
            Filter::Laplacian(o) => filter_laplacian_with_progress(mesh, o, operator, progress),
            Filter::Humphrey(o) => filter_humphrey_with_progress(mesh, o, operator, progress),
            Filter::Taubin(o) => filter_taubin_with_progress(mesh, o, operator, progress),
            Filter::MutableDiffusion(o) => {
                filter_mut_dif_laplacian_with_progress(mesh, o, operator, progress)
            }
        }
    }
}

impl From<LaplacianOptions> for Filter {
    fn from(options: LaplacianOptions) -> Self {
        Filter::Laplacian(options)
    }
}

impl From<HumphreyOptions> for Filter {
    fn from(options: HumphreyOptions) -> Self {
        Filter::Humphrey(options)
    }
}

impl From<TaubinOptions> for Filter {
    fn from(options: TaubinOptions) -> Self {
        Filter::Taubin(options)
    }
}

impl From<MutableDiffusionOptions> for Filter {
    fn from(options: MutableDiffusionOptions) -> Self {
        Filter::MutableDiffusion(options)
    }
}

/// Use the caller's operator if given, otherwise build the default one.
fn resolve_operator<'a, M: SurfaceMesh + ?Sized>(
    mesh: &M,
    operator: Option<&'a LaplacianOperator>,
) -> Result<Cow<'a, LaplacianOperator>> {
    match operator {
        Some(operator) => {
            operator.check_dimension(mesh.vertices().len())?;
            Ok(Cow::Borrowed(operator))
        }
        None => LaplacianOperator::new(mesh, &OperatorOptions::default()).map(Cow::Owned),
    }
}

/// `positions[i] += scale * field[i]`
fn advance(positions: &mut [Point3<f64>], field: &[Vector3<f64>], scale: f64) {
    for (p, d) in positions.iter_mut().zip(field) {
        *p += d * scale;
    }
}

/// Fail on the first vertex that a diverging step moved to NaN or infinity.
fn ensure_finite_positions(positions: &[Point3<f64>]) -> Result<()> {
    match positions
        .iter()
        .position(|p| !p.coords.iter().all(|c| c.is_finite()))
    {
        Some(vertex) => Err(SmoothError::DegenerateGeometry(
            GeometryDefect::NonFinitePosition { vertex },
        )),
        None => Ok(()),
    }
}

fn report(
    progress: &Progress,
    filter: &'static str,
    iteration: usize,
    total: usize,
    volume: Option<f64>,
) {
    match volume {
        Some(volume) => log::trace!("{}: iteration {}/{}, volume {:e}", filter, iteration, total, volume),
        None => log::trace!("{}: iteration {}/{}", filter, iteration, total),
    }
    progress.report(&ProgressStep {
        filter,
        iteration,
        total,
        volume,
    });
}

fn warn_outside_unit(filter: &str, name: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        log::warn!("{}: {} = {} is outside [0, 1]", filter, name, value);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use nalgebra::{Point3, Vector3};

    use crate::mesh::{primitives, TriMesh};

    /// Icosphere with a deterministic radial bump on every vertex.
    pub fn noisy_icosphere(subdivisions: usize) -> TriMesh {
        let mesh = primitives::icosphere(subdivisions, 1.0);
        let (vertices, faces) = mesh.into_parts();
        let vertices = vertices
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let bump = 1.0 + 0.05 * ((i * 7919 % 13) as f64 / 13.0 - 0.5);
                Point3::from(p.coords * bump)
            })
            .collect();
        TriMesh::new(vertices, faces).unwrap()
    }

    pub fn max_distance(a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(p, q)| (p - q).norm())
            .fold(0.0, f64::max)
    }

    pub fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
        let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
        Point3::from(sum / points.len() as f64)
    }
}
