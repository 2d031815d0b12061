//! Taubin λ|ν smoothing.
//!
//! Even iterations shrink with a positive factor `lambda`, odd iterations
//! inflate with `nu`. Choosing `nu` slightly larger than `lambda` turns the
//! pair into a low-pass filter that removes noise without the steady
//! shrinkage of plain Laplacian smoothing.
//!
//! Reference: Taubin, G. (1995). "A signal processing approach to fair
//! surface design." SIGGRAPH '95.

use super::{advance, ensure_finite_positions, report, resolve_operator};
use crate::algo::operator::LaplacianOperator;
use crate::algo::progress::Progress;
use crate::error::{ensure_finite, Result};
use crate::mesh::SurfaceMesh;

pub(super) const NAME: &str = "taubin";

/// Upper end of the conventional pass-band, `1/λ − 1/ν`.
const PASS_BAND: f64 = 0.1;

/// Options for [`filter_taubin`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaubinOptions {
    /// Shrink factor applied on even iterations.
    pub lambda: f64,

    /// Inflate factor applied on odd iterations.
    pub nu: f64,

    /// Number of smoothing iterations. Each counts as a single half-step.
    pub iterations: usize,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for TaubinOptions {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            nu: 0.5,
            iterations: 10,
            parallel: true,
        }
    }
}

impl TaubinOptions {
    /// Set the shrink factor.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the inflate factor.
    pub fn with_nu(mut self, nu: f64) -> Self {
        self.nu = nu;
        self
    }

    /// Set the number of iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Reject non-finite factors and warn when `nu` falls outside the
    /// pass-band `0 <= 1/λ − 1/ν <= 0.1`.
    pub fn validate(&self) -> Result<()> {
        ensure_finite("lambda", self.lambda)?;
        ensure_finite("nu", self.nu)?;

        if self.lambda > 0.0 && self.nu > 0.0 {
            let band = 1.0 / self.lambda - 1.0 / self.nu;
            if !(0.0..=PASS_BAND).contains(&band) {
                log::warn!(
                    "{}: 1/lambda - 1/nu = {} is outside [0, {}] (lambda {}, nu {})",
                    NAME,
                    band,
                    PASS_BAND,
                    self.lambda,
                    self.nu
                );
            }
        } else if self.lambda != 0.0 || self.nu != 0.0 {
            log::warn!(
                "{}: lambda {} and nu {} should both be positive",
                NAME,
                self.lambda,
                self.nu
            );
        }
        Ok(())
    }
}

/// Smooth a mesh with Taubin's alternating shrink/inflate steps.
///
/// With `d = L·v − v`, iteration `i` applies `v += λ·d` when `i` is even and
/// `v −= ν·d` when `i` is odd.
///
/// # Example
///
/// ```
/// use fairing::algo::smooth::{filter_taubin, TaubinOptions};
/// use fairing::mesh::{primitives, SurfaceMesh};
///
/// let mut mesh = primitives::icosphere(2, 1.0);
/// let volume = mesh.volume();
///
/// let options = TaubinOptions::default().with_lambda(0.5).with_nu(0.53);
/// filter_taubin(&mut mesh, &options, None).unwrap();
/// assert!((mesh.volume() - volume).abs() / volume < 0.05);
/// ```
pub fn filter_taubin<M: SurfaceMesh + ?Sized>(
    mesh: &mut M,
    options: &TaubinOptions,
    operator: Option<&LaplacianOperator>,
) -> Result<()> {
    filter_taubin_with_progress(mesh, options, operator, &Progress::none())
}

/// [`filter_taubin`] with a progress callback invoked after every iteration.
pub fn filter_taubin_with_progress<M: SurfaceMesh + ?Sized>(
    mesh: &mut M,
    options: &TaubinOptions,
    operator: Option<&LaplacianOperator>,
    progress: &Progress,
) -> Result<()> {
    options.validate()?;
    if options.iterations == 0 {
        return Ok(());
    }

    let operator = resolve_operator(mesh, operator)?;
    let mut positions = mesh.vertices().to_vec();

    log::debug!(
        "{}: {} vertices, lambda {}, nu {}, {} iterations",
        NAME,
        positions.len(),
        options.lambda,
        options.nu,
        options.iterations
    );

    for iteration in 0..options.iterations {
        let displacement = operator.displacement(&positions, options.parallel);
        let factor = if iteration % 2 == 0 {
            options.lambda
        } else {
            -options.nu
        };
        advance(&mut positions, &displacement, factor);
        ensure_finite_positions(&positions)?;

        report(progress, NAME, iteration + 1, options.iterations, None);
    }

    mesh.set_vertices(positions)?;
    log::debug!("{}: done", NAME);
    Ok(())
}
