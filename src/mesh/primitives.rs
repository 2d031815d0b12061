//! Procedural test meshes.
//!
//! Deterministic closed and open surfaces used by the tests, the doc
//! examples and the benchmarks. All closed primitives are wound
//! counter-clockwise when seen from outside, so their volume is positive.

use std::collections::HashMap;

use nalgebra::Point3;

use super::TriMesh;

/// Regular tetrahedron-like solid with volume 1/6.
pub fn tetrahedron() -> TriMesh {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.5, 1.0, 0.0),
        Point3::new(0.5, 0.5, 1.0),
    ];
    let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
    from_parts(vertices, faces)
}

/// Axis-aligned cube of edge length `size`, centered at the origin.
pub fn cube(size: f64) -> TriMesh {
    let h = 0.5 * size;
    let vertices = vec![
        Point3::new(-h, -h, -h),
        Point3::new(h, -h, -h),
        Point3::new(h, h, -h),
        Point3::new(-h, h, -h),
        Point3::new(-h, -h, h),
        Point3::new(h, -h, h),
        Point3::new(h, h, h),
        Point3::new(-h, h, h),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    from_parts(vertices, faces)
}

/// Flat `n`×`n` grid of quads in the XY plane, split into triangles.
///
/// Every interior vertex has exactly six neighbors. Requires `n >= 1`.
pub fn grid(n: usize, spacing: f64) -> TriMesh {
    let n = n.max(1);
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point3::new(i as f64 * spacing, j as f64 * spacing, 0.0));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    from_parts(vertices, faces)
}

/// Icosahedron refined `subdivisions` times with every vertex projected onto
/// the sphere of the given radius.
///
/// Vertex counts: 12, 42, 162, 642, ...
pub fn icosphere(subdivisions: usize, radius: f64) -> TriMesh {
    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let scale = 1.0 / (1.0 + phi * phi).sqrt();

    let mut vertices = vec![
        Point3::new(-1.0, phi, 0.0) * scale,
        Point3::new(1.0, phi, 0.0) * scale,
        Point3::new(-1.0, -phi, 0.0) * scale,
        Point3::new(1.0, -phi, 0.0) * scale,
        Point3::new(0.0, -1.0, phi) * scale,
        Point3::new(0.0, 1.0, phi) * scale,
        Point3::new(0.0, -1.0, -phi) * scale,
        Point3::new(0.0, 1.0, -phi) * scale,
        Point3::new(phi, 0.0, -1.0) * scale,
        Point3::new(phi, 0.0, 1.0) * scale,
        Point3::new(-phi, 0.0, -1.0) * scale,
        Point3::new(-phi, 0.0, 1.0) * scale,
    ];

    let mut faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut refined = Vec::with_capacity(faces.len() * 4);
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();

        for face in &faces {
            let mut mids = [0usize; 3];
            for k in 0..3 {
                let a = face[k];
                let b = face[(k + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };

                mids[k] = *midpoints.entry(key).or_insert_with(|| {
                    let mid = (vertices[a].coords + vertices[b].coords) * 0.5;
                    vertices.push(Point3::from(mid.normalize()));
                    vertices.len() - 1
                });
            }

            refined.push([face[0], mids[0], mids[2]]);
            refined.push([face[1], mids[1], mids[0]]);
            refined.push([face[2], mids[2], mids[1]]);
            refined.push(mids);
        }

        faces = refined;
    }

    for p in &mut vertices {
        p.coords *= radius;
    }

    from_parts(vertices, faces)
}

// The generators above only emit valid index triples.
fn from_parts(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> TriMesh {
    match TriMesh::new(vertices, faces) {
        Ok(mesh) => mesh,
        Err(err) => unreachable!("primitive generator produced an invalid mesh: {err}"),
    }
}
