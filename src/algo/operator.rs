//! Neighbor weights and the discrete Laplacian operator.
//!
//! The operator `L` maps every vertex to a weighted average of its edge
//! neighbors. Row `i` of `L` holds the weights of vertex `i`, normalized to
//! sum to one, so `L · v` is the "umbrella" centroid of each vertex and
//! `L · v - v` the displacement a full smoothing step would apply.
//!
//! Pinned vertices have their neighbor set replaced by themselves, which
//! turns their row into an identity row: the centroid of a pinned vertex is
//! the vertex itself, and no filter composed linearly with `L` moves it.
//!
//! ```
//! use fairing::algo::operator::laplacian_calculation;
//! use fairing::mesh::primitives;
//!
//! let mesh = primitives::icosphere(1, 1.0);
//! let operator = laplacian_calculation(&mesh, true, &[0]).unwrap();
//!
//! assert!(operator.is_pinned(0));
//! for sum in operator.row_sums() {
//!     assert!((sum - 1.0).abs() < 1e-12);
//! }
//! ```

use nalgebra::{Point3, Vector3};

use super::sparse::CsrMatrix;
use crate::error::{Result, SmoothError};
use crate::mesh::SurfaceMesh;

/// Guards inverse-distance weights against coincident vertices.
const MIN_NEIGHBOR_DISTANCE: f64 = 1e-6;

/// How the neighbors of a vertex are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weighting {
    /// Every neighbor weighs `1 / degree`.
    #[default]
    Equal,
    /// Neighbors weigh `1 / max(1e-6, distance)`, normalized per vertex.
    InverseDistance,
}

/// Options for building a [`LaplacianOperator`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorOptions {
    /// Neighbor weighting scheme.
    pub weighting: Weighting,

    /// Vertices that must not move. Each gets an identity row.
    pub pinned: Vec<usize>,
}

impl OperatorOptions {
    /// Set the weighting scheme.
    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Use inverse-distance weighting.
    pub fn inverse_distance(self) -> Self {
        self.with_weighting(Weighting::InverseDistance)
    }

    /// Set the pinned vertices.
    pub fn with_pinned(mut self, pinned: impl IntoIterator<Item = usize>) -> Self {
        self.pinned = pinned.into_iter().collect();
        self
    }
}

/// Per-vertex neighbor sets with unnormalized weights.
///
/// Row `i` lists `(neighbor, weight)` pairs; a pinned vertex has the single
/// entry `(i, w)`. Weights are proportional to the final operator entries
/// and become them once each row is divided by its sum.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborWeights {
    rows: Vec<Vec<(usize, f64)>>,
    pinned: Vec<bool>,
}

impl NeighborWeights {
    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no vertices.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The `(neighbor, weight)` pairs of vertex `i`.
    pub fn row(&self, i: usize) -> &[(usize, f64)] {
        &self.rows[i]
    }

    /// Whether vertex `i` was pinned.
    pub fn is_pinned(&self, i: usize) -> bool {
        self.pinned[i]
    }
}

/// Derive neighbor sets and weights from mesh adjacency.
///
/// # Errors
///
/// * [`SmoothError::PinnedVertexOutOfRange`] for a pinned index past the end
/// * [`SmoothError::InvalidTopology`] for a vertex with no neighbors that is
///   not pinned
pub fn neighbor_weights<M: SurfaceMesh + ?Sized>(
    mesh: &M,
    options: &OperatorOptions,
) -> Result<NeighborWeights> {
    let vertices = mesh.vertices();
    let num_vertices = vertices.len();
    let mut neighbors = mesh.vertex_neighbors();
    if neighbors.len() != num_vertices {
        return Err(SmoothError::DimensionMismatch {
            expected: num_vertices,
            found: neighbors.len(),
        });
    }

    let mut pinned = vec![false; num_vertices];
    for &v in &options.pinned {
        if v >= num_vertices {
            return Err(SmoothError::PinnedVertexOutOfRange {
                vertex: v,
                num_vertices,
            });
        }
        pinned[v] = true;
        neighbors[v] = vec![v];
    }

    let rows = neighbors
        .into_iter()
        .enumerate()
        .map(|(i, list)| {
            if list.is_empty() {
                return Err(SmoothError::InvalidTopology { vertex: i });
            }
            let row: Vec<(usize, f64)> = list
                .into_iter()
                .map(|j| (j, edge_weight(options.weighting, &vertices[i], &vertices[j])))
                .collect();
            Ok(row)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NeighborWeights { rows, pinned })
}

#[inline]
fn edge_weight(weighting: Weighting, p: &Point3<f64>, q: &Point3<f64>) -> f64 {
    match weighting {
        Weighting::Equal => 1.0,
        Weighting::InverseDistance => 1.0 / (p - q).norm().max(MIN_NEIGHBOR_DISTANCE),
    }
}

/// Row-normalized sparse Laplacian operator.
///
/// Immutable once built, so one operator can be shared across threads
/// smoothing meshes with the same connectivity.
#[derive(Debug, Clone, PartialEq)]
pub struct LaplacianOperator {
    matrix: CsrMatrix,
    pinned: Vec<bool>,
}

impl LaplacianOperator {
    /// Build the operator for a mesh.
    pub fn new<M: SurfaceMesh + ?Sized>(mesh: &M, options: &OperatorOptions) -> Result<Self> {
        let weights = neighbor_weights(mesh, options)?;
        let operator = Self::from_weights(&weights)?;
        log::debug!(
            "built {:?} Laplacian: {} vertices, {} entries, {} pinned",
            options.weighting,
            operator.dimension(),
            operator.nnz(),
            options.pinned.len()
        );
        Ok(operator)
    }

    /// Assemble and row-normalize the operator from neighbor weights.
    pub fn from_weights(weights: &NeighborWeights) -> Result<Self> {
        let n = weights.len();
        let triplets: Vec<(usize, usize, f64)> = weights
            .rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().map(move |&(j, w)| (i, j, w)))
            .collect();

        let mut matrix = CsrMatrix::from_triplets(n, n, triplets);
        matrix
            .normalize_rows()
            .map_err(|vertex| SmoothError::InvalidTopology { vertex })?;

        Ok(Self {
            matrix,
            pinned: weights.pinned.clone(),
        })
    }

    /// Number of vertices the operator acts on.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// The underlying sparse matrix.
    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    /// Whether vertex `i` has an identity row.
    pub fn is_pinned(&self, i: usize) -> bool {
        self.pinned[i]
    }

    /// The `(neighbor, weight)` entries of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.matrix.row(i)
    }

    /// Sum of every row (one, up to rounding).
    pub fn row_sums(&self) -> Vec<f64> {
        self.matrix.row_sums()
    }

    /// `L · positions`: the weighted neighbor centroid of every vertex.
    pub fn apply(&self, positions: &[Point3<f64>], parallel: bool) -> Vec<Point3<f64>> {
        assert_eq!(positions.len(), self.dimension(), "Position count mismatch");
        self.matrix
            .mul_rows(|j| positions[j].coords, parallel)
            .into_iter()
            .map(Point3::from)
            .collect()
    }

    /// `L · field` for a per-vertex vector field.
    pub fn apply_field(&self, field: &[Vector3<f64>], parallel: bool) -> Vec<Vector3<f64>> {
        self.matrix.mul_block(field, parallel)
    }

    /// `L · positions - positions`: the umbrella displacement of every vertex.
    pub fn displacement(&self, positions: &[Point3<f64>], parallel: bool) -> Vec<Vector3<f64>> {
        self.apply(positions, parallel)
            .into_iter()
            .zip(positions)
            .map(|(centroid, p)| centroid - p)
            .collect()
    }

    /// System matrix of one backward-Euler diffusion step, `I + λ(I - L)`.
    pub fn diffusion_system(&self, lambda: f64) -> CsrMatrix {
        self.matrix.shifted(1.0 + lambda, -lambda)
    }

    /// Check that the operator was built for `num_vertices` vertices.
    pub fn check_dimension(&self, num_vertices: usize) -> Result<()> {
        if self.dimension() != num_vertices {
            return Err(SmoothError::DimensionMismatch {
                expected: num_vertices,
                found: self.dimension(),
            });
        }
        Ok(())
    }
}

/// Build the Laplacian operator of a mesh.
///
/// `equal_weight` selects `1 / degree` weights; otherwise neighbors are
/// weighted by inverse distance. Every vertex in `pinned_vertices` gets an
/// identity row.
pub fn laplacian_calculation<M: SurfaceMesh + ?Sized>(
    mesh: &M,
    equal_weight: bool,
    pinned_vertices: &[usize],
) -> Result<LaplacianOperator> {
    let weighting = if equal_weight {
        Weighting::Equal
    } else {
        Weighting::InverseDistance
    };
    let options = OperatorOptions::default()
        .with_weighting(weighting)
        .with_pinned(pinned_vertices.iter().copied());
    LaplacianOperator::new(mesh, &options)
}
