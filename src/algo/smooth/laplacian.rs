//! Plain Laplacian diffusion.

use nalgebra::{Point3, Vector3};

use super::{advance, ensure_finite_positions, report, resolve_operator};
use crate::algo::operator::LaplacianOperator;
use crate::algo::progress::Progress;
use crate::algo::sparse::SparseLu;
use crate::algo::volume::{IsotropicRescale, VolumeCorrector};
use crate::error::{ensure_finite, Result};
use crate::mesh::SurfaceMesh;

pub(super) const NAME: &str = "laplacian";

/// Time discretization of the diffusion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Integration {
    /// Forward Euler, `v ← v + λ(Lv − v)`. Stable for `λ ≤ 1`.
    #[default]
    Explicit,
    /// Backward Euler, `(I + λ(I − L)) v_new = v`, solved with a sparse LU
    /// factored once per call. Stable for any `λ ≥ 0`.
    Implicit,
}

/// Options for [`filter_laplacian`].
#[derive(Debug, Clone, PartialEq)]
pub struct LaplacianOptions {
    /// Diffusion step size.
    pub lambda: f64,

    /// Number of smoothing iterations.
    pub iterations: usize,

    /// Explicit or implicit time integration.
    pub integration: Integration,

    /// Rescale the mesh after every step to keep its initial volume.
    pub volume_constraint: bool,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for LaplacianOptions {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            iterations: 10,
            integration: Integration::Explicit,
            volume_constraint: true,
            parallel: true,
        }
    }
}

impl LaplacianOptions {
    /// Set the diffusion step size.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the number of iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the time integration scheme.
    pub fn with_integration(mut self, integration: Integration) -> Self {
        self.integration = integration;
        self
    }

    /// Use implicit (backward Euler) integration.
    pub fn implicit(self) -> Self {
        self.with_integration(Integration::Implicit)
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

    /// Reject non-finite parameters and warn about unstable ones.
    pub fn validate(&self) -> Result<()> {
        ensure_finite("lambda", self.lambda)?;

        if self.integration == Integration::Explicit && self.lambda > 1.0 {
            log::warn!(
                "{}: explicit lambda = {} exceeds the stability limit of 1",
                NAME,
                self.lambda
            );
        }
        if self.lambda < 0.0 {
            log::warn!("{}: negative lambda = {} inflates the mesh", NAME, self.lambda);
        }
        Ok(())
    }
}

/// Smooth a mesh by Laplacian diffusion.
///
/// Each iteration moves every vertex toward the weighted centroid of its
/// neighbors, either explicitly or by solving the backward-Euler system,
/// which is assembled once before the loop. With the volume constraint
/// enabled, every step is followed by a uniform scaling about the origin by
/// `(V0 / V)^(1/3)`, where `V0` is the volume before smoothing.
///
/// `operator` defaults to the equal-weight Laplacian of `mesh`.
///
/// # Errors
///
/// * [`SmoothError::InvalidParameter`](crate::error::SmoothError::InvalidParameter)
///   for a non-finite `lambda`
/// * [`SmoothError::DegenerateGeometry`](crate::error::SmoothError::DegenerateGeometry)
///   if an explicit step diverges to a non-finite position
/// * [`SmoothError::DegenerateVolume`](crate::error::SmoothError::DegenerateVolume)
///   if the constrained volume is zero, non-finite or flips sign
/// * [`SmoothError::SolveFailed`](crate::error::SmoothError::SolveFailed)
///   if the implicit system is singular
///
/// The mesh is only modified if every iteration succeeds.
///
/// # Example
///
/// ```
/// use fairing::algo::smooth::{filter_laplacian, LaplacianOptions};
/// use fairing::mesh::{primitives, SurfaceMesh};
///
/// let mut mesh = primitives::icosphere(2, 1.0);
/// let options = LaplacianOptions::default()
///     .implicit()
///     .with_lambda(5.0)
///     .without_volume_constraint();
/// filter_laplacian(&mut mesh, &options, None).unwrap();
/// ```
pub fn filter_laplacian<M: SurfaceMesh + ?Sized>(
    mesh: &mut M,
    options: &LaplacianOptions,
    operator: Option<&LaplacianOperator>,
) -> Result<()> {
    filter_laplacian_with_progress(mesh, options, operator, &Progress::none())
}

/// [`filter_laplacian`] with a progress callback invoked after every iteration.
pub fn filter_laplacian_with_progress<M: SurfaceMesh + ?Sized>(
    mesh: &mut M,
    options: &LaplacianOptions,
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
        "{}: {} vertices, {} faces, lambda {}, {} iterations, {:?}, volume constraint {}",
        NAME,
        positions.len(),
        faces.len(),
        options.lambda,
        options.iterations,
        options.integration,
        options.volume_constraint
    );

    let mut corrector = if options.volume_constraint {
        Some(IsotropicRescale::capture(&positions, faces)?)
    } else {
        None
    };

    let solver = match options.integration {
        Integration::Explicit => None,
        Integration::Implicit => Some(SparseLu::factorize(
            &operator.diffusion_system(options.lambda),
        )?),
    };

    for iteration in 0..options.iterations {
        match &solver {
            None => {
                let displacement = operator.displacement(&positions, options.parallel);
                advance(&mut positions, &displacement, options.lambda);
            }
            Some(solver) => {
                let rhs: Vec<Vector3<f64>> = positions.iter().map(|p| p.coords).collect();
                positions = solver
                    .solve_block(&rhs)?
                    .into_iter()
                    .map(Point3::from)
                    .collect();
            }
        }
        ensure_finite_positions(&positions)?;

        let volume = match corrector.as_mut() {
            Some(corrector) => Some(corrector.correct(&mut positions, faces, None)?),
            None => None,
        };

        report(progress, NAME, iteration + 1, options.iterations, volume);
    }

    mesh.set_vertices(positions)?;
    log::debug!("{}: done", NAME);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{max_distance, noisy_icosphere};
    use super::*;
    use crate::algo::operator::laplacian_calculation;
    use crate::error::{GeometryDefect, SmoothError};
    use crate::mesh::{primitives, TriMesh};

    fn radius(mesh: &TriMesh) -> f64 {
        mesh.vertices()
            .iter()
            .map(|p| p.coords.norm())
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let mut mesh = noisy_icosphere(1);
        let before = mesh.clone();

        let options = LaplacianOptions::default().with_iterations(0);
        filter_laplacian(&mut mesh, &options, None).unwrap();
        assert_eq!(mesh, before);

        filter_laplacian(&mut mesh, &options.implicit(), None).unwrap();
        assert_eq!(mesh, before);
    }

    #[test]
    fn test_volume_constraint_preserves_volume() {
        for integration in [Integration::Explicit, Integration::Implicit] {
            let mut mesh = primitives::icosphere(2, 1.0);
            let v0 = mesh.volume();

            let options = LaplacianOptions::default()
                .with_iterations(5)
                .with_integration(integration);
            filter_laplacian(&mut mesh, &options, None).unwrap();

            let relative = ((mesh.volume() - v0) / v0).abs();
            assert!(relative < 1e-6, "{:?}: relative error {}", integration, relative);
        }
    }

    #[test]
    fn test_unconstrained_shrinks() {
        let mut mesh = primitives::icosphere(2, 1.0);
        let v0 = mesh.volume();

        let options = LaplacianOptions::default().without_volume_constraint();
        filter_laplacian(&mut mesh, &options, None).unwrap();

        assert!(mesh.volume() < v0);
    }

    #[test]
    fn test_constrained_is_uniform_rescale_of_unconstrained() {
        let options = LaplacianOptions::default().with_iterations(5);

        let mut constrained = noisy_icosphere(2);
        filter_laplacian(&mut constrained, &options, None).unwrap();

        let mut free = noisy_icosphere(2);
        filter_laplacian(&mut free, &options.clone().without_volume_constraint(), None).unwrap();

        let scale = constrained.vertices()[0].coords.norm() / free.vertices()[0].coords.norm();
        assert!(scale > 1.0);
        for (c, f) in constrained.vertices().iter().zip(free.vertices()) {
            assert!((c.coords - f.coords * scale).norm() < 1e-9);
        }
    }

    #[test]
    fn test_explicit_step_moves_to_centroid() {
        // λ = 1 moves every vertex onto its neighbor centroid.
        let mut mesh = primitives::tetrahedron();
        let operator = laplacian_calculation(&mesh, true, &[]).unwrap();
        let expected = operator.apply(mesh.vertices(), false);

        let options = LaplacianOptions::default()
            .with_lambda(1.0)
            .with_iterations(1)
            .without_volume_constraint();
        filter_laplacian(&mut mesh, &options, Some(&operator)).unwrap();

        assert!(max_distance(mesh.vertices(), &expected) < 1e-12);
    }

    #[test]
    fn test_implicit_is_stable_for_large_lambda() {
        let mut explicit = noisy_icosphere(2);
        let mut implicit = noisy_icosphere(2);
        let options = LaplacianOptions::default()
            .with_lambda(20.0)
            .with_iterations(3)
            .without_volume_constraint();

        filter_laplacian(&mut implicit, &options.clone().implicit(), None).unwrap();
        filter_laplacian(&mut explicit, &options, None).unwrap();

        assert!(radius(&implicit) < 1.1);
        assert!(radius(&explicit) > 10.0);
    }

    #[test]
    fn test_implicit_handles_huge_lambda() {
        let original = primitives::icosphere(3, 1.0);
        let options = LaplacianOptions::default()
            .implicit()
            .with_lambda(1e8)
            .with_iterations(2);

        let mut free = original.clone();
        filter_laplacian(&mut free, &options.clone().without_volume_constraint(), None).unwrap();
        assert!(free.vertices().iter().all(|p| p.coords.iter().all(|c| c.is_finite())));
        // One step already collapses the sphere onto its center.
        assert!(radius(&free) < 1e-6);

        let mut constrained = original.clone();
        let result = filter_laplacian(&mut constrained, &options, None);
        // The collapse leaves nothing to rescale, or a finite mesh.
        match result {
            Ok(()) => assert!(constrained
                .vertices()
                .iter()
                .all(|p| p.coords.iter().all(|c| c.is_finite()))),
            Err(err) => {
                assert!(matches!(err, SmoothError::DegenerateVolume { .. }), "{:?}", err);
                assert_eq!(constrained, original);
            }
        }
    }

    #[test]
    fn test_divergent_explicit_run_leaves_mesh_unmodified() {
        let options = LaplacianOptions::default().with_lambda(1e200).with_iterations(4);

        let mut mesh = noisy_icosphere(2);
        let before = mesh.clone();
        let result = filter_laplacian(&mut mesh, &options.clone().without_volume_constraint(), None);
        assert!(matches!(
            result,
            Err(SmoothError::DegenerateGeometry(GeometryDefect::NonFinitePosition { .. }))
        ));
        assert_eq!(mesh, before);

        // The rescale sees the overflowing volume first.
        let result = filter_laplacian(&mut mesh, &options, None);
        assert!(result.is_err());
        assert_eq!(mesh, before);
    }

    #[test]
    fn test_implicit_follows_explicit_for_small_steps() {
        let options = LaplacianOptions::default()
            .with_lambda(0.01)
            .with_iterations(1)
            .without_volume_constraint();

        let original = noisy_icosphere(1);
        let mut explicit = original.clone();
        let mut implicit = original.clone();
        filter_laplacian(&mut explicit, &options, None).unwrap();
        filter_laplacian(&mut implicit, &options.clone().implicit(), None).unwrap();

        // Both move every vertex the same way, to first order in λ.
        for ((o, e), i) in original
            .vertices()
            .iter()
            .zip(explicit.vertices())
            .zip(implicit.vertices())
        {
            let de = e - o;
            let di = i - o;
            assert!((de - di).norm() <= 0.2 * de.norm() + 1e-9);
        }
    }

    #[test]
    fn test_flat_mesh_cannot_be_volume_constrained() {
        let mut mesh = primitives::grid(4, 1.0);
        let before = mesh.clone();

        let result = filter_laplacian(&mut mesh, &LaplacianOptions::default(), None);
        assert!(matches!(result, Err(SmoothError::DegenerateVolume { .. })));
        assert_eq!(mesh, before);

        filter_laplacian(&mut mesh, &LaplacianOptions::default().without_volume_constraint(), None)
            .unwrap();
    }

    #[test]
    fn test_rejects_non_finite_lambda() {
        let mut mesh = primitives::icosphere(1, 1.0);
        let before = mesh.clone();

        for lambda in [f64::NAN, f64::INFINITY] {
            let options = LaplacianOptions::default().with_lambda(lambda);
            let result = filter_laplacian(&mut mesh, &options, None);
            assert!(matches!(
                result,
                Err(SmoothError::InvalidParameter { name: "lambda", .. })
            ));
        }
        assert_eq!(mesh, before);
    }

    #[test]
    fn test_defaults() {
        let options = LaplacianOptions::default();
        assert_eq!(options.lambda, 0.5);
        assert_eq!(options.iterations, 10);
        assert_eq!(options.integration, Integration::Explicit);
        assert!(options.volume_constraint);
        assert!(options.parallel);
        assert!(!options.sequential().parallel);
    }
}
