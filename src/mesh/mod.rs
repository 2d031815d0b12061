//! Mesh collaborator interface and a concrete indexed triangle mesh.
//!
//! The smoothing filters never depend on a particular mesh representation.
//! They consume the [`SurfaceMesh`] trait, which exposes exactly what the
//! filters read (positions, faces, adjacency, per-face normals and areas,
//! enclosed volume) and the single write they perform (replacing the vertex
//! positions once smoothing has finished).
//!
//! [`TriMesh`] is the reference implementation: a validated face-vertex list.
//!
//! ```
//! use fairing::mesh::{SurfaceMesh, TriMesh};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let mesh = TriMesh::new(vertices, vec![[0, 1, 2]]).unwrap();
//!
//! assert_eq!(mesh.vertex_neighbors()[0], vec![1, 2]);
//! assert!((mesh.face_areas()[0] - 0.5).abs() < 1e-12);
//! ```

pub mod primitives;
mod trimesh;

use nalgebra::{Point3, Vector3};

use crate::algo::normals;
use crate::algo::volume;
use crate::error::Result;

pub use trimesh::TriMesh;

/// The read/write contract the smoothing filters rely on.
///
/// Only [`vertices`](SurfaceMesh::vertices), [`faces`](SurfaceMesh::faces) and
/// [`set_vertices`](SurfaceMesh::set_vertices) are required. The derived
/// quantities have default implementations computed from the current
/// positions; implementors that cache them must return values that are valid
/// for the positions currently stored.
pub trait SurfaceMesh {
    /// Vertex positions, indexed `0..N`.
    fn vertices(&self) -> &[Point3<f64>];

    /// Triangle faces as vertex index triples.
    fn faces(&self) -> &[[usize; 3]];

    /// Replace every vertex position.
    ///
    /// The new buffer must have the same length as the current one; vertex
    /// order is preserved by every filter.
    fn set_vertices(&mut self, vertices: Vec<Point3<f64>>) -> Result<()>;

    /// Sorted, de-duplicated edge neighbors of every vertex.
    fn vertex_neighbors(&self) -> Vec<Vec<usize>> {
        edge_neighbors(self.vertices().len(), self.faces())
    }

    /// Unit normal of every face (zero for zero-area faces).
    fn face_normals(&self) -> Vec<Vector3<f64>> {
        normals::face_normals(self.vertices(), self.faces())
    }

    /// Area of every face.
    fn face_areas(&self) -> Vec<f64> {
        normals::face_areas(self.vertices(), self.faces())
    }

    /// Signed volume enclosed by the surface.
    fn volume(&self) -> f64 {
        volume::enclosed_volume(self.vertices(), self.faces())
    }
}

/// Build per-vertex neighbor lists from triangle edges.
///
/// Each list is sorted ascending and contains no duplicates. Vertices that no
/// face references get an empty list.
pub fn edge_neighbors(num_vertices: usize, faces: &[[usize; 3]]) -> Vec<Vec<usize>> {
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); num_vertices];

    for face in faces {
        for k in 0..3 {
            let a = face[k];
            let b = face[(k + 1) % 3];
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
    }

    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }

    neighbors
}
