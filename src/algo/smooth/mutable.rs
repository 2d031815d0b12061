//! Mutable-diffusion Laplacian smoothing.
//!
//! A Laplacian step whose size varies per vertex. Vertices where the
//! umbrella displacement has a small normal component (flat regions) get
//! large weights, strongly curved vertices small ones. Each vertex then steps
//! by `λ · w / mean(w)`, kept within `[0.2·λ, 1]`.
//!
//! The optional volume constraint moves vertices along their normals by an
//! amount proportional to the volume lost, using a dilation slope measured on
//! the first iteration.

use nalgebra::Vector3;

use super::{ensure_finite_positions, report, resolve_operator};
use crate::algo::normals::{vertex_normals, NormalWeighting};
use crate::algo::operator::LaplacianOperator;
use crate::algo::progress::Progress;
use crate::algo::volume::{dilation_epsilon, target_volume, NormalDilation, VolumeCorrector};
use crate::error::{ensure_finite, Result};
use crate::mesh::SurfaceMesh;

pub(super) const NAME: &str = "mutable_diffusion";

/// Floor on the normal component of the displacement.
const MIN_NORMAL_DISPLACEMENT: f64 = 1e-12;

/// Lower bound of a vertex step, as a fraction of `lambda`.
const MIN_STEP_FRACTION: f64 = 0.2;

/// Upper bound of a vertex step.
const MAX_STEP: f64 = 1.0;

/// Options for [`filter_mut_dif_laplacian`].
#[derive(Debug, Clone, PartialEq)]
pub struct MutableDiffusionOptions {
    /// Base diffusion step size.
    pub lambda: f64,

    /// Number of smoothing iterations.
    pub iterations: usize,

    /// Push vertices along their normals after every step to keep the
    /// initial volume.
    pub volume_constraint: bool,

    /// How vertex normals are accumulated from face normals.
    pub normal_weighting: NormalWeighting,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for MutableDiffusionOptions {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            iterations: 10,
            volume_constraint: true,
            normal_weighting: NormalWeighting::Equal,
            parallel: true,
        }
    }
}

impl MutableDiffusionOptions {
    /// Set the base step size.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the number of iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Enable or disable the volume constraint.
    pub fn with_volume_constraint(mut self, volume_constraint: bool) -> Self {
        self.volume_constraint = volume_constraint;
        self
    }

    /// Let the volume drift.
    pub fn without_volume_constraint(self) -> Self {
        self.with_volume_constraint(false)
    }

    /// Set the vertex normal weighting.
    pub fn with_normal_weighting(mut self, normal_weighting: NormalWeighting) -> Self {
        self.normal_weighting = normal_weighting;
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

    /// Reject a non-finite `lambda`.
    pub fn validate(&self) -> Result<()> {
        ensure_finite("lambda", self.lambda)?;
        if self.lambda > MAX_STEP {
            log::warn!(
                "{}: lambda = {} exceeds the step cap of {}",
                NAME,
                self.lambda,
                MAX_STEP
            );
        }
        if self.lambda < 0.0 {
            log::warn!("{}: negative lambda = {} inflates the mesh", NAME, self.lambda);
        }
        Ok(())
    }
}

/// Smooth a mesh with curvature-adaptive step sizes.
///
/// Per iteration:
///
/// 1. vertex normals `n` are computed from the current positions,
/// 2. `d = L·v − v` is the umbrella displacement,
/// 3. `w_j = 1 / max(|n_j · d_j|, 1e-12)`,
/// 4. `λ_j = λ · w_j / mean(w)`, capped at 1 and floored at `0.2·λ`,
/// 5. `v_j += λ_j · d_j`,
/// 6. with the volume constraint, `v_j += n_j · s · (V0 − V)`, where `V` is
///    the current volume and `s` the dilation slope measured once on the
///    first iteration with a probe of `0.01 · sqrt(max face area)`.
///
/// # Errors
///
/// * [`SmoothError::InvalidParameter`](crate::error::SmoothError::InvalidParameter)
///   for a non-finite `lambda`
/// * [`SmoothError::DegenerateGeometry`](crate::error::SmoothError::DegenerateGeometry)
///   if a vertex normal vanishes or the dilation probe does not change the
///   volume
/// * [`SmoothError::DegenerateVolume`](crate::error::SmoothError::DegenerateVolume)
///   if the constrained volume is zero, non-finite or flips sign
///
/// # Example
///
/// ```
/// use fairing::algo::smooth::{filter_mut_dif_laplacian, MutableDiffusionOptions};
/// use fairing::mesh::{primitives, SurfaceMesh};
///
/// let mut mesh = primitives::icosphere(2, 1.0);
/// let volume = mesh.volume();
///
/// filter_mut_dif_laplacian(&mut mesh, &MutableDiffusionOptions::default(), None).unwrap();
/// assert!((mesh.volume() - volume).abs() / volume < 0.01);
/// ```
pub fn filter_mut_dif_laplacian<M: SurfaceMesh + ?Sized>(
    mesh: &mut M,
    options: &MutableDiffusionOptions,
    operator: Option<&LaplacianOperator>,
) -> Result<()> {
    filter_mut_dif_laplacian_with_progress(mesh, options, operator, &Progress::none())
}

/// [`filter_mut_dif_laplacian`] with a progress callback invoked after every
/// iteration.
pub fn filter_mut_dif_laplacian_with_progress<M: SurfaceMesh + ?Sized>(
    mesh: &mut M,
    options: &MutableDiffusionOptions,
    operator: Option<&LaplacianOperator>,
    progress: &Progress,
) -> Result<()> {
    options.validate()?;
    if options.iterations == 0 {
        return Ok(());
    }

    let operator = resolve_operator(mesh, operator)?;
    let faces = mesh.faces();
    let mut positions = mesh.vertices().to_vec();

    log::debug!(
        "{}: {} vertices, {} faces, lambda {}, {} iterations, volume constraint {}",
        NAME,
        positions.len(),
        faces.len(),
        options.lambda,
        options.iterations,
        options.volume_constraint
    );

    let mut corrector = if options.volume_constraint {
        let initial = target_volume(&positions, faces)?;
        Some(NormalDilation::new(initial, dilation_epsilon(&mesh.face_areas())))
    } else {
        None
    };

    for iteration in 0..options.iterations {
        let normals = vertex_normals(&positions, faces, options.normal_weighting)?;
        let displacement = operator.displacement(&positions, options.parallel);
        let steps = step_sizes(&normals, &displacement, options.lambda);

        for ((p, d), step) in positions.iter_mut().zip(&displacement).zip(&steps) {
            *p += d * *step;
        }
        ensure_finite_positions(&positions)?;

        let volume = match corrector.as_mut() {
            Some(corrector) => Some(corrector.correct(&mut positions, faces, Some(&normals))?),
            None => None,
        };

        report(progress, NAME, iteration + 1, options.iterations, volume);
    }

    if let Some(slope) = corrector.as_ref().and_then(NormalDilation::slope) {
        log::debug!("{}: dilation slope {:e}", NAME, slope);
    }

    mesh.set_vertices(positions)?;
    log::debug!("{}: done", NAME);
    Ok(())
}

/// Per-vertex step sizes from the normal component of the displacement.
fn step_sizes(normals: &[Vector3<f64>], displacement: &[Vector3<f64>], lambda: f64) -> Vec<f64> {
    let weights: Vec<f64> = normals
        .iter()
        .zip(displacement)
        .map(|(n, d)| 1.0 / n.dot(d).abs().max(MIN_NORMAL_DISPLACEMENT))
        .collect();

    let mean = weights.iter().sum::<f64>() / weights.len() as f64;
    let floor = MIN_STEP_FRACTION * lambda;

    // min/max rather than clamp: the floor exceeds the cap once lambda > 5.
    weights
        .into_iter()
        .map(|w| (lambda * w / mean).min(MAX_STEP).max(floor))
        .collect()
}
