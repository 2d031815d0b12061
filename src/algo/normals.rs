//! Face and vertex normals.
//!
//! Vertex normals are accumulated from the normals of incident faces, either
//! with equal weight per face ([`NormalWeighting::Equal`], the weighting the
//! mutable-diffusion filter uses) or proportionally to face area
//! ([`NormalWeighting::Area`]).

use nalgebra::{Point3, Vector3};

use crate::error::{GeometryDefect, Result, SmoothError};
use crate::mesh::SurfaceMesh;

/// How incident face normals are combined into a vertex normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalWeighting {
    /// Every incident face contributes its unit normal.
    #[default]
    Equal,
    /// Every incident face contributes its normal scaled by its area.
    Area,
}

/// Unit normal of the triangle `(p0, p1, p2)`, or zero if it has no area.
pub fn triangle_normal(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Vector3<f64> {
    let n = (p1 - p0).cross(&(p2 - p0));
    n.try_normalize(0.0).unwrap_or_else(Vector3::zeros)
}

/// Unit normal of every face.
pub fn face_normals(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Vec<Vector3<f64>> {
    faces
        .iter()
        .map(|&[a, b, c]| triangle_normal(&vertices[a], &vertices[b], &vertices[c]))
        .collect()
}

/// Area of every face.
pub fn face_areas(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Vec<f64> {
    faces
        .iter()
        .map(|&[a, b, c]| {
            let e1 = vertices[b] - vertices[a];
            let e2 = vertices[c] - vertices[a];
            0.5 * e1.cross(&e2).norm()
        })
        .collect()
}

/// Compute a unit normal for every vertex from the given positions.
///
/// # Errors
///
/// Returns [`SmoothError::DegenerateGeometry`] with
/// [`GeometryDefect::ZeroNormal`] for the first vertex whose incident face
/// normals cancel out, or that has no incident face at all.
pub fn vertex_normals(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
    weighting: NormalWeighting,
) -> Result<Vec<Vector3<f64>>> {
    let mut sums = vec![Vector3::zeros(); vertices.len()];
    // Total magnitude of the contributions, so cancellation is judged
    // relative to the size of what was summed.
    let mut magnitudes = vec![0.0; vertices.len()];

    for &[a, b, c] in faces {
        let cross = (vertices[b] - vertices[a]).cross(&(vertices[c] - vertices[a]));
        let contribution = match weighting {
            NormalWeighting::Equal => cross.try_normalize(0.0).unwrap_or_else(Vector3::zeros),
            NormalWeighting::Area => cross * 0.5,
        };
        let size = contribution.norm();

        for v in [a, b, c] {
            sums[v] += contribution;
            magnitudes[v] += size;
        }
    }

    sums.into_iter()
        .zip(magnitudes)
        .enumerate()
        .map(|(vertex, (sum, magnitude))| {
            let len = sum.norm();
            if magnitude > 0.0 && len > 1e-12 * magnitude {
                Ok(sum / len)
            } else {
                Err(SmoothError::DegenerateGeometry(GeometryDefect::ZeroNormal { vertex }))
            }
        })
        .collect()
}

/// Equal-weighted vertex normals of a mesh.
///
/// This is the normal field the mutable-diffusion filter consults, so it
/// shares [`vertex_normals`] and its cancellation check.
pub fn get_vertices_normals<M: SurfaceMesh + ?Sized>(mesh: &M) -> Result<Vec<Vector3<f64>>> {
    vertex_normals(mesh.vertices(), mesh.faces(), NormalWeighting::Equal)
}
