//! Enclosed volume, dilation slope, and volume-preserving corrections.
//!
//! Two policies restore the volume a filter drifts away from:
//!
//! - [`IsotropicRescale`] scales every coordinate by `(V0 / V)^(1/3)` about
//!   the origin. Shape is preserved exactly; the mesh moves toward or away
//!   from the origin.
//! - [`NormalDilation`] pushes every vertex along its own normal by
//!   `slope * (V0 - V)`, where the slope is a finite-difference estimate of
//!   offset per unit volume, taken once and reused.
//!
//! Both implement [`VolumeCorrector`], so filters hold the policy without
//! duplicating the volume bookkeeping.

use nalgebra::{Point3, Vector3};

use crate::error::{GeometryDefect, Result, SmoothError};

/// Signed volume enclosed by a triangle surface.
///
/// Sums the signed volumes of the tetrahedra formed by each face and the
/// origin. For a closed, consistently outward-wound surface this is the
/// enclosed volume and does not depend on the origin; inward winding gives a
/// negative value.
pub fn enclosed_volume(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> f64 {
    let six_volume: f64 = faces
        .iter()
        .map(|&[a, b, c]| {
            let p0 = vertices[a].coords;
            let p1 = vertices[b].coords;
            let p2 = vertices[c].coords;
            p0.dot(&p1.cross(&p2))
        })
        .sum();
    six_volume / 6.0
}

/// Probe length for the dilation slope: 1% of the square root of the largest
/// face area.
pub fn dilation_epsilon(face_areas: &[f64]) -> f64 {
    let max_area = face_areas.iter().copied().fold(0.0_f64, f64::max);
    0.01 * max_area.sqrt()
}

/// Finite-difference estimate of normal offset per unit of enclosed volume.
///
/// Every vertex is displaced by `epsilon` along its normal, the volume `v2`
/// of the displaced surface is measured, and `epsilon / (v2 - volume)` is
/// returned. `volume` must be the volume of `vertices` as given.
///
/// # Errors
///
/// * [`SmoothError::DimensionMismatch`] if `normals` does not have one entry
///   per vertex
/// * [`SmoothError::DegenerateGeometry`] with [`GeometryDefect::FlatDilation`]
///   if the probe does not change the volume
pub fn dilate_slope(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
    normals: &[Vector3<f64>],
    volume: f64,
    epsilon: f64,
) -> Result<f64> {
    if normals.len() != vertices.len() {
        return Err(SmoothError::DimensionMismatch {
            expected: vertices.len(),
            found: normals.len(),
        });
    }

    let probed: Vec<Point3<f64>> = vertices
        .iter()
        .zip(normals)
        .map(|(p, n)| p + n * epsilon)
        .collect();
    let probed_volume = enclosed_volume(&probed, faces);

    let delta = probed_volume - volume;
    let slope = epsilon / delta;
    if delta == 0.0 || !slope.is_finite() {
        return Err(SmoothError::DegenerateGeometry(GeometryDefect::FlatDilation {
            epsilon,
            volume,
        }));
    }

    Ok(slope)
}

/// Validate a volume captured before smoothing starts.
pub fn target_volume(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<f64> {
    let volume = enclosed_volume(vertices, faces);
    if volume == 0.0 || !volume.is_finite() {
        return Err(SmoothError::DegenerateVolume {
            volume,
            initial: volume,
        });
    }
    Ok(volume)
}

/// Reject a volume that is zero, non-finite, or of the opposite sign to the
/// target.
fn check_volume(volume: f64, initial: f64) -> Result<()> {
    if volume == 0.0 || !volume.is_finite() || volume.signum() != initial.signum() {
        return Err(SmoothError::DegenerateVolume { volume, initial });
    }
    Ok(())
}

/// A strategy for pulling the enclosed volume back to its initial value after
/// a smoothing step.
pub trait VolumeCorrector {
    /// The volume the corrector restores.
    fn target(&self) -> f64;

    /// Correct `positions` in place.
    ///
    /// `normals` are the vertex normals the current step was computed with;
    /// correctors that do not move along normals ignore them. Returns the
    /// volume measured before the correction was applied.
    fn correct(
        &mut self,
        positions: &mut [Point3<f64>],
        faces: &[[usize; 3]],
        normals: Option<&[Vector3<f64>]>,
    ) -> Result<f64>;
}

/// Uniform scaling about the origin by the cube root of the volume ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicRescale {
    initial: f64,
}

impl IsotropicRescale {
    /// Create a corrector restoring `initial`.
    pub fn new(initial: f64) -> Self {
        Self { initial }
    }

    /// Capture the volume of `vertices` as the target.
    pub fn capture(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<Self> {
        target_volume(vertices, faces).map(Self::new)
    }
}

impl VolumeCorrector for IsotropicRescale {
    fn target(&self) -> f64 {
        self.initial
    }

    fn correct(
        &mut self,
        positions: &mut [Point3<f64>],
        faces: &[[usize; 3]],
        _normals: Option<&[Vector3<f64>]>,
    ) -> Result<f64> {
        let volume = enclosed_volume(positions, faces);
        check_volume(volume, self.initial)?;

        let scale = (self.initial / volume).cbrt();
        for p in positions.iter_mut() {
            p.coords *= scale;
        }

        Ok(volume)
    }
}

/// First-order correction along vertex normals with a cached dilation slope.
///
/// The slope is estimated with [`dilate_slope`] on the first call and reused
/// for every later call, even though the geometry keeps changing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalDilation {
    initial: f64,
    epsilon: f64,
    slope: Option<f64>,
}

impl NormalDilation {
    /// Create a corrector restoring `initial`, probing with `epsilon`.
    pub fn new(initial: f64, epsilon: f64) -> Self {
        Self {
            initial,
            epsilon,
            slope: None,
        }
    }

    /// The cached dilation slope, once the first correction has run.
    pub fn slope(&self) -> Option<f64> {
        self.slope
    }

    /// The finite-difference probe length.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl VolumeCorrector for NormalDilation {
    fn target(&self) -> f64 {
        self.initial
    }

    fn correct(
        &mut self,
        positions: &mut [Point3<f64>],
        faces: &[[usize; 3]],
        normals: Option<&[Vector3<f64>]>,
    ) -> Result<f64> {
        let normals = normals.unwrap_or(&[]);
        if normals.len() != positions.len() {
            return Err(SmoothError::DimensionMismatch {
                expected: positions.len(),
                found: normals.len(),
            });
        }

        let volume = enclosed_volume(positions, faces);
        check_volume(volume, self.initial)?;

        let slope = match self.slope {
            Some(slope) => slope,
            None => {
                let slope = dilate_slope(positions, faces, normals, volume, self.epsilon)?;
                log::trace!("dilation slope {:e} (epsilon {:e})", slope, self.epsilon);
                self.slope = Some(slope);
                slope
            }
        };

        let offset = slope * (self.initial - volume);
        for (p, n) in positions.iter_mut().zip(normals) {
            *p += n * offset;
        }

        Ok(volume)
    }
}
