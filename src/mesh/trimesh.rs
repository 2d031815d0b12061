//! Indexed triangle mesh.

use nalgebra::{Point3, Vector3};

use super::SurfaceMesh;
use crate::algo::normals::triangle_normal;
use crate::algo::volume::enclosed_volume;
use crate::error::{Result, SmoothError};

/// A triangle mesh stored as a vertex list and a face-vertex index list.
///
/// Construction validates the face indices, so every face of a `TriMesh`
/// refers to three distinct, in-range vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    vertices: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
}

impl TriMesh {
    /// Build a mesh from vertices and triangle faces.
    ///
    /// # Errors
    ///
    /// * [`SmoothError::EmptyMesh`] if `faces` is empty
    /// * [`SmoothError::InvalidVertexIndex`] if a face index is out of range
    /// * [`SmoothError::DegenerateFace`] if a face repeats a vertex
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Result<Self> {
        if faces.is_empty() {
            return Err(SmoothError::EmptyMesh);
        }

        for (fi, face) in faces.iter().enumerate() {
            for &vi in face {
                if vi >= vertices.len() {
                    return Err(SmoothError::InvalidVertexIndex { face: fi, vertex: vi });
                }
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(SmoothError::DegenerateFace { face: fi });
            }
        }

        Ok(Self { vertices, faces })
    }

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Compute the unit normal of a face.
    pub fn face_normal(&self, f: usize) -> Vector3<f64> {
        let [a, b, c] = self.faces[f];
        triangle_normal(&self.vertices[a], &self.vertices[b], &self.vertices[c])
    }

    /// Compute the area of a face.
    pub fn face_area(&self, f: usize) -> f64 {
        let [a, b, c] = self.faces[f];
        let e1 = self.vertices[b] - self.vertices[a];
        let e2 = self.vertices[c] - self.vertices[a];
        0.5 * e1.cross(&e2).norm()
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len()).map(|f| self.face_area(f)).sum()
    }

    /// Compute the axis-aligned bounding box of the mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;

        for p in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        Some((min, max))
    }

    /// Compute the centroid of the vertex positions.
    pub fn centroid(&self) -> Point3<f64> {
        let sum: Vector3<f64> = self.vertices.iter().map(|p| p.coords).sum();
        Point3::from(sum / self.vertices.len().max(1) as f64)
    }

    /// Consume the mesh and return its vertex and face buffers.
    pub fn into_parts(self) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        (self.vertices, self.faces)
    }
}

impl SurfaceMesh for TriMesh {
    fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    fn set_vertices(&mut self, vertices: Vec<Point3<f64>>) -> Result<()> {
        if vertices.len() != self.vertices.len() {
            return Err(SmoothError::DimensionMismatch {
                expected: self.vertices.len(),
                found: vertices.len(),
            });
        }
        self.vertices = vertices;
        Ok(())
    }

    fn volume(&self) -> f64 {
        enclosed_volume(&self.vertices, &self.faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives;

    #[test]
    fn test_new_rejects_empty() {
        let result = TriMesh::new(vec![Point3::origin()], Vec::new());
        assert_eq!(result, Err(SmoothError::EmptyMesh));
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        let vertices = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let result = TriMesh::new(vertices, vec![[0, 1, 2]]);
        assert_eq!(result, Err(SmoothError::InvalidVertexIndex { face: 0, vertex: 2 }));
    }

    #[test]
    fn test_new_rejects_degenerate_face() {
        let vertices = vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let result = TriMesh::new(vertices, vec![[0, 1, 2], [1, 1, 2]]);
        assert_eq!(result, Err(SmoothError::DegenerateFace { face: 1 }));
    }

    #[test]
    fn test_set_vertices_checks_length() {
        let mut mesh = primitives::tetrahedron();
        let result = mesh.set_vertices(vec![Point3::origin(); 3]);
        assert_eq!(
            result,
            Err(SmoothError::DimensionMismatch { expected: 4, found: 3 })
        );

        let moved: Vec<_> = mesh.vertices().iter().map(|p| p + Vector3::x()).collect();
        mesh.set_vertices(moved.clone()).unwrap();
        assert_eq!(mesh.vertices(), moved.as_slice());
    }

    #[test]
    fn test_geometry_queries() {
        let mesh = primitives::cube(2.0);

        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.num_faces(), 12);
        assert!((mesh.surface_area() - 24.0).abs() < 1e-12);
        assert!((mesh.volume() - 8.0).abs() < 1e-12);

        let (min, max) = mesh.bounding_box().unwrap();
        assert_eq!(min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(max, Point3::new(1.0, 1.0, 1.0));
        assert!(mesh.centroid().coords.norm() < 1e-12);
    }

    #[test]
    fn test_face_normal_points_outward() {
        let mesh = primitives::cube(1.0);
        for f in 0..mesh.num_faces() {
            let [a, b, c] = mesh.faces()[f];
            let v = mesh.vertices();
            let center = (v[a].coords + v[b].coords + v[c].coords) / 3.0;
            assert!(mesh.face_normal(f).dot(&center) > 0.0, "face {} points inward", f);
        }
    }
}
